//! Core domain logic for ProjectDesk.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod progress;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::notification::{Notification, NotificationId, NotificationKind, NotificationStatus};
pub use model::project::{
    InvitationPreview, NewProject, Project, ProjectId, ProjectMember, ProjectPatch,
    ProjectPriority, ProjectRole, ProjectStatus,
};
pub use model::user::{User, UserId};
pub use model::validation::ModelValidationError;
pub use model::work::{
    AssignmentId, NewPhase, NewTask, NewUnit, Phase, PhaseId, Task, TaskAssignment, TaskId, Unit,
    UnitId,
};
pub use progress::{project_progress, task_completion, Progress, ProjectProgress, ProjectTree};
pub use repo::error::{ConflictKind, EntityKind, RepoError, RepoResult};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use repo::project_repo::{
    ProjectListQuery, ProjectRepository, ProjectSort, SqliteProjectRepository,
};
pub use repo::work_repo::{SqliteWorkRepository, WorkRepository};
pub use service::notification_service::{NotificationService, NotificationServiceError};
pub use service::progress_service::{ProgressError, ProgressService, ProjectOverview};
pub use service::project_service::{
    InvitationCodeSource, JoinOutcome, ProjectService, ProjectServiceError, RandomInvitationCodes,
};
pub use service::work_service::{WorkService, WorkServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
