//! User notification model.

use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::model::validation::{require_text, ModelValidationError};
use crate::model::work::TaskId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Reminder that an assigned task is due soon.
    Deadline,
    /// Invitation to join a project.
    Invitation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Unread,
    Read,
}

/// Message addressed to one user, optionally scoped to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    /// Deleting the project deletes the notification too.
    pub project_id: Option<ProjectId>,
    /// Task a deadline reminder is about. Deleted with the task.
    pub task_id: Option<TaskId>,
    pub title: String,
    pub detail: String,
    pub kind: NotificationKind,
    pub status: NotificationStatus,
    pub created_at: i64,
}

impl Notification {
    /// Creates an unread notification with a generated id.
    pub fn new(
        user_id: UserId,
        project_id: Option<ProjectId>,
        kind: NotificationKind,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            project_id,
            task_id: None,
            title: title.into(),
            detail: detail.into(),
            kind,
            status: NotificationStatus::Unread,
            created_at: 0,
        }
    }

    pub fn for_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("title", &self.title)
    }

    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}
