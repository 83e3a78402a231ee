//! Notification use-case service: invitations and deadline reminders.
//!
//! # Invariants
//! - A deadline reminder is created at most once per user and task, however
//!   often the reminder sweep runs.
//! - Reminders only target assignments that are not completed yet.

use crate::model::notification::{Notification, NotificationId, NotificationKind, NotificationStatus};
use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::model::validation::ModelValidationError;
use crate::repo::error::{EntityKind, RepoError};
use crate::repo::notification_repo::{DueAssignment, NotificationRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from notification operations.
#[derive(Debug)]
pub enum NotificationServiceError {
    Validation(ModelValidationError),
    UserNotFound(UserId),
    ProjectNotFound(ProjectId),
    NotificationNotFound(NotificationId),
    Repo(RepoError),
}

impl Display for NotificationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::NotificationNotFound(id) => write!(f, "notification not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotificationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NotificationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound(EntityKind::Notification, id) => Self::NotificationNotFound(id),
            RepoError::NotFound(EntityKind::User, id) => Self::UserNotFound(id),
            RepoError::NotFound(EntityKind::Project, id) => Self::ProjectNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Notification service facade.
pub struct NotificationService<R: NotificationRepository> {
    repo: R,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Sends `recipient` an invitation carrying the project's join code.
    pub fn notify_invitation(
        &self,
        recipient: UserId,
        project_id: ProjectId,
    ) -> Result<Notification, NotificationServiceError> {
        self.require_user(recipient)?;
        let (project_name, invitation_code) = self
            .repo
            .project_invitation(project_id)?
            .ok_or(NotificationServiceError::ProjectNotFound(project_id))?;

        let notification = Notification::new(
            recipient,
            Some(project_id),
            NotificationKind::Invitation,
            format!("Invitation to {project_name}"),
            format!("You have been invited to join {project_name}. Invitation code: {invitation_code}"),
        );
        let stored = self.repo.create_notification(&notification)?;
        info!(
            "event=notify_invitation module=service status=ok notification_id={} project_id={}",
            stored.id, project_id
        );
        Ok(stored)
    }

    /// Creates deadline reminders for incomplete assignments whose task is
    /// due within `[now_ms, now_ms + horizon_ms]`. Returns how many were
    /// created. A user gets at most one reminder per task.
    pub fn send_deadline_reminders(
        &self,
        now_ms: i64,
        horizon_ms: i64,
    ) -> Result<usize, NotificationServiceError> {
        let until_ms = now_ms.saturating_add(horizon_ms.max(0));
        let due = self.repo.list_due_assignments(now_ms, until_ms)?;

        let mut created = 0usize;
        for item in &due {
            if self.repo.reminder_exists(item.user_id, item.task_id)? {
                continue;
            }

            let notification = Notification::new(
                item.user_id,
                Some(item.project_id),
                NotificationKind::Deadline,
                reminder_title(item),
                format!(
                    "Task {} in project {} is due at {} (epoch ms).",
                    item.task_name, item.project_name, item.deadline
                ),
            )
            .for_task(item.task_id);
            self.repo.create_notification(&notification)?;
            created += 1;
        }

        info!(
            "event=deadline_reminders module=service status=ok due={} created={}",
            due.len(),
            created
        );
        Ok(created)
    }

    /// Lists a user's notifications, newest first.
    pub fn list_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationServiceError> {
        self.require_user(user_id)?;
        self.repo
            .list_for_user(user_id, unread_only)
            .map_err(Into::into)
    }

    pub fn mark_read(&self, id: NotificationId) -> Result<(), NotificationServiceError> {
        self.repo
            .set_status(id, NotificationStatus::Read)
            .map_err(Into::into)
    }

    /// Marks all unread notifications of a user read; returns the count.
    pub fn mark_all_read(&self, user_id: UserId) -> Result<usize, NotificationServiceError> {
        self.require_user(user_id)?;
        self.repo.mark_all_read(user_id).map_err(Into::into)
    }

    pub fn delete_notification(&self, id: NotificationId) -> Result<(), NotificationServiceError> {
        self.repo.delete_notification(id).map_err(Into::into)
    }

    fn require_user(&self, user_id: UserId) -> Result<(), NotificationServiceError> {
        if !self.repo.user_exists(user_id)? {
            return Err(NotificationServiceError::UserNotFound(user_id));
        }
        Ok(())
    }
}

fn reminder_title(item: &DueAssignment) -> String {
    format!("Deadline approaching: {}", item.task_name)
}
