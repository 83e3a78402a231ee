//! Work hierarchy model: phases, units, tasks and task assignments.
//!
//! # Invariants
//! - A phase belongs to exactly one project, a unit to one phase, a task to
//!   one unit. Deleting a parent deletes its children.
//! - `(task_id, user_id)` appears at most once in assignments.
//! - `Phase::end_at >= Phase::start_at`.

use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::model::validation::{require_text, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PhaseId = Uuid;
pub type UnitId = Uuid;
pub type TaskId = Uuid;
pub type AssignmentId = Uuid;

/// Time-boxed grouping of units inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
    /// Epoch ms.
    pub start_at: i64,
    /// Epoch ms, never earlier than `start_at`.
    pub end_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Phase {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)?;
        validate_window(self.start_at, self.end_at)
    }
}

/// Grouping of tasks inside a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub phase_id: PhaseId,
    pub name: String,
    pub description: String,
    pub deadline: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Unit {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)
    }
}

/// Atomic unit of work. Completion is derived from its assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub unit_id: UnitId,
    pub name: String,
    pub description: String,
    pub deadline: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)
    }
}

/// One user's responsibility for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: AssignmentId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub is_completed: bool,
    /// Epoch ms.
    pub assigned_at: i64,
}

/// Create request for a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhase {
    pub name: String,
    pub description: String,
    pub start_at: i64,
    pub end_at: i64,
}

impl NewPhase {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)?;
        validate_window(self.start_at, self.end_at)
    }

    pub fn into_phase(self, id: PhaseId, project_id: ProjectId) -> Phase {
        Phase {
            id,
            project_id,
            name: self.name.trim().to_string(),
            description: self.description,
            start_at: self.start_at,
            end_at: self.end_at,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Create request for a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUnit {
    pub name: String,
    pub description: String,
    pub deadline: i64,
}

impl NewUnit {
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)
    }

    pub fn into_unit(self, id: UnitId, phase_id: PhaseId) -> Unit {
        Unit {
            id,
            phase_id,
            name: self.name.trim().to_string(),
            description: self.description,
            deadline: self.deadline,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Create request for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub deadline: i64,
}

impl NewTask {
    pub fn new(name: impl Into<String>, deadline: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            deadline,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)
    }

    pub fn into_task(self, id: TaskId, unit_id: UnitId) -> Task {
        Task {
            id,
            unit_id,
            name: self.name.trim().to_string(),
            description: self.description,
            deadline: self.deadline,
            created_at: 0,
            updated_at: 0,
        }
    }
}

fn validate_window(start_at: i64, end_at: i64) -> Result<(), ModelValidationError> {
    if end_at < start_at {
        return Err(ModelValidationError::PhaseEndsBeforeStart { start_at, end_at });
    }
    Ok(())
}
