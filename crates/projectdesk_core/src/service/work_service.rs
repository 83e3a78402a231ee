//! Phase, unit, task and assignment use-case service.
//!
//! # Invariants
//! - Children are only created under an existing parent.
//! - Only members of a task's project can be assigned to it.
//! - A unit created with initial tasks is stored together with all of them or
//!   not at all.

use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::model::validation::ModelValidationError;
use crate::model::work::{
    NewPhase, NewTask, NewUnit, Phase, PhaseId, Task, TaskAssignment, TaskId, Unit, UnitId,
};
use crate::repo::error::{ConflictKind, EntityKind, RepoError};
use crate::repo::work_repo::WorkRepository;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from work hierarchy operations.
#[derive(Debug)]
pub enum WorkServiceError {
    Validation(ModelValidationError),
    ProjectNotFound(ProjectId),
    PhaseNotFound(PhaseId),
    UnitNotFound(UnitId),
    TaskNotFound(TaskId),
    AssignmentNotFound(Uuid),
    /// The user holds no assignment on the task.
    NotAssigned {
        task_id: TaskId,
        user_id: UserId,
    },
    /// Assignee is not a member of the task's project.
    NotProjectMember {
        project_id: ProjectId,
        user_id: UserId,
    },
    /// Duplicate `(task, user)` assignment.
    Conflict(ConflictKind),
    Repo(RepoError),
}

impl Display for WorkServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::PhaseNotFound(id) => write!(f, "phase not found: {id}"),
            Self::UnitNotFound(id) => write!(f, "unit not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::AssignmentNotFound(id) => write!(f, "assignment not found: {id}"),
            Self::NotAssigned { task_id, user_id } => {
                write!(f, "user {user_id} is not assigned to task {task_id}")
            }
            Self::NotProjectMember {
                project_id,
                user_id,
            } => write!(f, "user {user_id} is not a member of project {project_id}"),
            Self::Conflict(kind) => write!(f, "conflict: {kind}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for WorkServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for WorkServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound(EntityKind::Project, id) => Self::ProjectNotFound(id),
            RepoError::NotFound(EntityKind::Phase, id) => Self::PhaseNotFound(id),
            RepoError::NotFound(EntityKind::Unit, id) => Self::UnitNotFound(id),
            RepoError::NotFound(EntityKind::Task, id) => Self::TaskNotFound(id),
            RepoError::NotFound(EntityKind::Assignment, id) => Self::AssignmentNotFound(id),
            RepoError::NotAssigned { task_id, user_id } => Self::NotAssigned { task_id, user_id },
            RepoError::Conflict(kind) => Self::Conflict(kind),
            other => Self::Repo(other),
        }
    }
}

/// Work hierarchy service facade.
pub struct WorkService<R: WorkRepository> {
    repo: R,
}

impl<R: WorkRepository> WorkService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_phase(
        &self,
        project_id: ProjectId,
        request: NewPhase,
    ) -> Result<Phase, WorkServiceError> {
        request.validate()?;
        self.require_project(project_id)?;
        let phase = self
            .repo
            .create_phase(&request.into_phase(Uuid::new_v4(), project_id))?;
        info!(
            "event=phase_create module=service status=ok project_id={} phase_id={}",
            project_id, phase.id
        );
        Ok(phase)
    }

    pub fn get_phase(&self, id: PhaseId) -> Result<Phase, WorkServiceError> {
        self.repo
            .get_phase(id)?
            .ok_or(WorkServiceError::PhaseNotFound(id))
    }

    /// Lists phases of a project, latest start first.
    pub fn list_phases(&self, project_id: ProjectId) -> Result<Vec<Phase>, WorkServiceError> {
        self.require_project(project_id)?;
        self.repo.list_phases(project_id).map_err(Into::into)
    }

    /// Replaces editable fields of a phase and returns the stored row.
    pub fn update_phase(&self, phase: &Phase) -> Result<Phase, WorkServiceError> {
        self.repo.update_phase(phase)?;
        self.get_phase(phase.id)
    }

    pub fn delete_phase(&self, id: PhaseId) -> Result<(), WorkServiceError> {
        self.repo.delete_phase(id).map_err(Into::into)
    }

    /// Creates a unit together with its initial tasks.
    ///
    /// Task rows with a blank name are skipped, the way an unfilled form row
    /// would be.
    pub fn create_unit(
        &self,
        phase_id: PhaseId,
        request: NewUnit,
        tasks: &[NewTask],
    ) -> Result<(Unit, Vec<Task>), WorkServiceError> {
        request.validate()?;
        self.get_phase(phase_id)?;

        let unit = request.into_unit(Uuid::new_v4(), phase_id);
        let tasks: Vec<Task> = tasks
            .iter()
            .filter(|task| !task.name.trim().is_empty())
            .cloned()
            .map(|task| task.into_task(Uuid::new_v4(), unit.id))
            .collect();

        let (unit, tasks) = self.repo.create_unit_with_tasks(&unit, &tasks)?;
        info!(
            "event=unit_create module=service status=ok unit_id={} task_count={}",
            unit.id,
            tasks.len()
        );
        Ok((unit, tasks))
    }

    pub fn get_unit(&self, id: UnitId) -> Result<Unit, WorkServiceError> {
        self.repo
            .get_unit(id)?
            .ok_or(WorkServiceError::UnitNotFound(id))
    }

    /// Lists units of a phase, earliest deadline first.
    pub fn list_units(&self, phase_id: PhaseId) -> Result<Vec<Unit>, WorkServiceError> {
        self.get_phase(phase_id)?;
        self.repo.list_units(phase_id).map_err(Into::into)
    }

    pub fn update_unit(&self, unit: &Unit) -> Result<Unit, WorkServiceError> {
        self.repo.update_unit(unit)?;
        self.get_unit(unit.id)
    }

    pub fn delete_unit(&self, id: UnitId) -> Result<(), WorkServiceError> {
        self.repo.delete_unit(id).map_err(Into::into)
    }

    /// Creates a task and, when `assignee` is given, its first assignment.
    ///
    /// # Errors
    /// - `UnitNotFound` when the parent unit does not exist.
    /// - `NotProjectMember` when the assignee is not in the unit's project.
    pub fn create_task(
        &self,
        unit_id: UnitId,
        request: NewTask,
        assignee: Option<UserId>,
    ) -> Result<(Task, Option<TaskAssignment>), WorkServiceError> {
        request.validate()?;
        let unit = self.get_unit(unit_id)?;
        if let Some(user_id) = assignee {
            let phase = self.get_phase(unit.phase_id)?;
            self.require_member(phase.project_id, user_id)?;
        }

        let task = request.into_task(Uuid::new_v4(), unit_id);
        let created = self.repo.create_task(&task, assignee)?;
        info!(
            "event=task_create module=service status=ok task_id={} assigned={}",
            created.0.id,
            created.1.is_some()
        );
        Ok(created)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Task, WorkServiceError> {
        self.repo
            .get_task(id)?
            .ok_or(WorkServiceError::TaskNotFound(id))
    }

    /// Lists tasks of a unit, earliest deadline first.
    pub fn list_tasks(&self, unit_id: UnitId) -> Result<Vec<Task>, WorkServiceError> {
        self.get_unit(unit_id)?;
        self.repo.list_tasks(unit_id).map_err(Into::into)
    }

    pub fn update_task(&self, task: &Task) -> Result<Task, WorkServiceError> {
        self.repo.update_task(task)?;
        self.get_task(task.id)
    }

    pub fn delete_task(&self, id: TaskId) -> Result<(), WorkServiceError> {
        self.repo.delete_task(id).map_err(Into::into)
    }

    /// Assigns a project member to a task.
    ///
    /// # Errors
    /// - `TaskNotFound` when the task does not exist.
    /// - `NotProjectMember` when the user is not in the task's project.
    /// - `Conflict(ConflictKind::Assignment)` when already assigned.
    pub fn assign_task(
        &self,
        task_id: TaskId,
        user_id: UserId,
    ) -> Result<TaskAssignment, WorkServiceError> {
        let project_id = self
            .repo
            .task_project_id(task_id)?
            .ok_or(WorkServiceError::TaskNotFound(task_id))?;
        self.require_member(project_id, user_id)?;

        let assignment = self.repo.create_assignment(task_id, user_id)?;
        info!(
            "event=task_assign module=service status=ok task_id={} assignment_id={}",
            task_id, assignment.id
        );
        Ok(assignment)
    }

    pub fn unassign_task(&self, task_id: TaskId, user_id: UserId) -> Result<(), WorkServiceError> {
        self.repo
            .delete_assignment(task_id, user_id)
            .map_err(Into::into)
    }

    pub fn list_assignments(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<TaskAssignment>, WorkServiceError> {
        self.get_task(task_id)?;
        self.repo.list_assignments(task_id).map_err(Into::into)
    }

    /// Lists every assignment held by a user across projects.
    pub fn list_user_assignments(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TaskAssignment>, WorkServiceError> {
        self.repo.list_user_assignments(user_id).map_err(Into::into)
    }

    fn require_project(&self, project_id: ProjectId) -> Result<(), WorkServiceError> {
        if !self.repo.project_exists(project_id)? {
            return Err(WorkServiceError::ProjectNotFound(project_id));
        }
        Ok(())
    }

    fn require_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> Result<(), WorkServiceError> {
        if self.repo.member_role(project_id, user_id)?.is_none() {
            return Err(WorkServiceError::NotProjectMember {
                project_id,
                user_id,
            });
        }
        Ok(())
    }
}
