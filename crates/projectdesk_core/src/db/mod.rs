//! ProjectDesk storage: connection setup and the versioned schema.
//!
//! Tables, parent first:
//! - `users`, referenced by memberships, assignments and notifications.
//! - `projects` with a unique `invitation_code` and `project_members` keyed
//!   on `(user_id, project_id)` with a role check.
//! - `phases` -> `units` -> `tasks` -> `task_assignments`, one row per
//!   `(task_id, user_id)`.
//! - `notifications`, optionally scoped to a project and a task.
//!
//! Every row under a project is declared `ON DELETE CASCADE`, so deleting a
//! project clears its members, work tree and inbox entries. A user that still
//! owns a project cannot be deleted. `open_db` turns on
//! `foreign_keys` for each connection; without it the cascades do nothing.
//! The schema version lives in `PRAGMA user_version` and repositories refuse
//! a connection that is not at `migrations::latest_version()`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
