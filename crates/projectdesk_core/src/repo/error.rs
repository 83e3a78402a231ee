//! Repository error type shared by all SQLite repositories.

use crate::db::DbError;
use crate::model::validation::ModelValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Entity named by a `NotFound` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Project,
    Member,
    Phase,
    Unit,
    Task,
    Assignment,
    Notification,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Member => "project member",
            Self::Phase => "phase",
            Self::Unit => "unit",
            Self::Task => "task",
            Self::Assignment => "task assignment",
            Self::Notification => "notification",
        }
    }
}

/// Uniqueness constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// `users.username`.
    Username,
    /// `projects.invitation_code`.
    InvitationCode,
    /// `(user_id, project_id)` in `project_members`.
    Membership,
    /// `(task_id, user_id)` in `task_assignments`.
    Assignment,
}

impl Display for ConflictKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Username => "username already taken",
            Self::InvitationCode => "invitation code already in use",
            Self::Membership => "user is already a project member",
            Self::Assignment => "user is already assigned to the task",
        };
        f.write_str(label)
    }
}

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    NotFound(EntityKind, Uuid),
    /// No `task_assignments` row for this `(task_id, user_id)` pair.
    NotAssigned {
        task_id: Uuid,
        user_id: Uuid,
    },
    Conflict(ConflictKind),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(kind, id) => write!(f, "{} not found: {id}", kind.as_str()),
            Self::NotAssigned { task_id, user_id } => {
                write!(f, "user {user_id} is not assigned to task {task_id}")
            }
            Self::Conflict(kind) => write!(f, "conflict: {kind}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(..) => None,
            Self::NotAssigned { .. } => None,
            Self::Conflict(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
