//! User reference model.
//!
//! Authentication lives outside core. Users exist here only as stable
//! identities that memberships, assignments and notifications point at.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable user identifier.
pub type UserId = Uuid;

/// Minimal user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Unique login/display name.
    pub username: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
}
