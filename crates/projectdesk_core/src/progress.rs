//! Task completion and project progress aggregation.
//!
//! # Responsibility
//! - Derive task completion from its assignments.
//! - Fold a loaded project tree into progress tallies at project, phase and
//!   unit level.
//!
//! # Invariants
//! - Everything here is a pure function of the input rows. Nothing is cached
//!   and nothing is written back, so results can never drift from the
//!   assignment state they were computed from.
//! - A task with zero assignments is complete.
//! - A tree with zero tasks has 0% progress; empty phases/units add nothing.

use crate::model::project::ProjectId;
use crate::model::work::{Phase, PhaseId, Task, TaskAssignment, Unit, UnitId};
use serde::Serialize;

/// Estimated effort per task used for overview work-hour totals.
pub const WORK_HOURS_PER_TASK: u32 = 10;

/// One task with its current assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLeaf {
    pub task: Task,
    pub assignments: Vec<TaskAssignment>,
}

impl TaskLeaf {
    pub fn is_completed(&self) -> bool {
        task_completion(&self.assignments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitBranch {
    pub unit: Unit,
    pub tasks: Vec<TaskLeaf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseBranch {
    pub phase: Phase,
    pub units: Vec<UnitBranch>,
}

/// Phase → unit → task hierarchy of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTree {
    pub project_id: ProjectId,
    pub phases: Vec<PhaseBranch>,
}

/// Completed/total task counts with the derived percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    /// `completed / total * 100`, or `0.0` without tasks.
    pub percent: f64,
}

impl Progress {
    pub fn from_counts(total_tasks: u32, completed_tasks: u32) -> Self {
        let percent = if total_tasks == 0 {
            0.0
        } else {
            f64::from(completed_tasks) / f64::from(total_tasks) * 100.0
        };
        Self {
            total_tasks,
            completed_tasks,
            percent,
        }
    }

    /// True when there is at least one task and every task is complete.
    pub fn is_finished(&self) -> bool {
        self.total_tasks > 0 && self.completed_tasks == self.total_tasks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitProgress {
    pub unit_id: UnitId,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseProgress {
    pub phase_id: PhaseId,
    pub progress: Progress,
    pub units: Vec<UnitProgress>,
}

/// Full progress breakdown of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectProgress {
    pub project_id: ProjectId,
    pub progress: Progress,
    pub phases: Vec<PhaseProgress>,
}

impl ProjectProgress {
    pub fn percent(&self) -> f64 {
        self.progress.percent
    }
}

/// Returns whether a task with these assignments is complete.
///
/// Vacuously true for an empty slice.
pub fn task_completion(assignments: &[TaskAssignment]) -> bool {
    assignments.iter().all(|assignment| assignment.is_completed)
}

/// Walks phases → units → tasks and tallies completion at every level.
pub fn project_progress(tree: &ProjectTree) -> ProjectProgress {
    let mut total = 0u32;
    let mut completed = 0u32;
    let mut phases = Vec::with_capacity(tree.phases.len());

    for branch in &tree.phases {
        let phase = phase_progress(branch);
        total += phase.progress.total_tasks;
        completed += phase.progress.completed_tasks;
        phases.push(phase);
    }

    ProjectProgress {
        project_id: tree.project_id,
        progress: Progress::from_counts(total, completed),
        phases,
    }
}

fn phase_progress(branch: &PhaseBranch) -> PhaseProgress {
    let units: Vec<UnitProgress> = branch.units.iter().map(unit_progress).collect();
    let total = units.iter().map(|unit| unit.progress.total_tasks).sum();
    let completed = units.iter().map(|unit| unit.progress.completed_tasks).sum();
    PhaseProgress {
        phase_id: branch.phase.id,
        progress: Progress::from_counts(total, completed),
        units,
    }
}

fn unit_progress(branch: &UnitBranch) -> UnitProgress {
    let total = branch.tasks.len() as u32;
    let completed = branch.tasks.iter().filter(|leaf| leaf.is_completed()).count() as u32;
    UnitProgress {
        unit_id: branch.unit.id,
        progress: Progress::from_counts(total, completed),
    }
}
