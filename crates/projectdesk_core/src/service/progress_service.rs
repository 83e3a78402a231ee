//! Storage wiring for the completion/progress engine.
//!
//! Writes touch only the assignment flag. Task completion and project
//! progress are recomputed from current rows on every call.

use crate::model::project::{Project, ProjectId};
use crate::model::work::{AssignmentId, TaskId};
use crate::progress::{project_progress, task_completion, ProjectProgress, WORK_HOURS_PER_TASK};
use crate::repo::error::{EntityKind, RepoError};
use crate::repo::work_repo::WorkRepository;
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from progress operations.
#[derive(Debug)]
pub enum ProgressError {
    AssignmentNotFound(AssignmentId),
    TaskNotFound(TaskId),
    ProjectNotFound(ProjectId),
    Repo(RepoError),
}

impl Display for ProgressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssignmentNotFound(id) => write!(f, "assignment not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProgressError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProgressError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityKind::Assignment, id) => Self::AssignmentNotFound(id),
            RepoError::NotFound(EntityKind::Task, id) => Self::TaskNotFound(id),
            RepoError::NotFound(EntityKind::Project, id) => Self::ProjectNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Project summary for list views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectOverview {
    pub project: Project,
    pub progress: ProjectProgress,
    /// `total_tasks * WORK_HOURS_PER_TASK`.
    pub total_work_hours: u32,
}

/// Progress service facade.
pub struct ProgressService<R: WorkRepository> {
    repo: R,
}

impl<R: WorkRepository> ProgressService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Marks one assignment complete and returns whether its task is now
    /// complete. Completing an already completed assignment is a no-op.
    pub fn mark_assignment_complete(&self, id: AssignmentId) -> Result<bool, ProgressError> {
        self.set_completed(id, true)
    }

    /// Clears the completion flag and returns the task's recomputed state.
    pub fn reopen_assignment(&self, id: AssignmentId) -> Result<bool, ProgressError> {
        self.set_completed(id, false)
    }

    /// Task completion derived from the current assignment rows.
    pub fn compute_task_completion(&self, task_id: TaskId) -> Result<bool, ProgressError> {
        if self.repo.get_task(task_id)?.is_none() {
            return Err(ProgressError::TaskNotFound(task_id));
        }
        let assignments = self.repo.list_assignments(task_id)?;
        Ok(task_completion(&assignments))
    }

    /// Progress of one project with per-phase and per-unit tallies.
    pub fn compute_project_progress(
        &self,
        project_id: ProjectId,
    ) -> Result<ProjectProgress, ProgressError> {
        if !self.repo.project_exists(project_id)? {
            return Err(ProgressError::ProjectNotFound(project_id));
        }
        let tree = self.repo.load_project_tree(project_id)?;
        Ok(project_progress(&tree))
    }

    /// Progress plus estimated work hours for one project.
    pub fn project_overview(&self, project: Project) -> Result<ProjectOverview, ProgressError> {
        let progress = self.compute_project_progress(project.id)?;
        let total_work_hours = progress
            .progress
            .total_tasks
            .saturating_mul(WORK_HOURS_PER_TASK);
        Ok(ProjectOverview {
            project,
            progress,
            total_work_hours,
        })
    }

    fn set_completed(&self, id: AssignmentId, is_completed: bool) -> Result<bool, ProgressError> {
        let assignment = self
            .repo
            .get_assignment(id)?
            .ok_or(ProgressError::AssignmentNotFound(id))?;
        if assignment.is_completed != is_completed {
            self.repo.set_assignment_completed(id, is_completed)?;
        }

        let assignments = self.repo.list_assignments(assignment.task_id)?;
        let task_completed = task_completion(&assignments);
        info!(
            "event=assignment_complete module=service status=ok assignment_id={} completed={} task_completed={}",
            id, is_completed, task_completed
        );
        Ok(task_completed)
    }
}
