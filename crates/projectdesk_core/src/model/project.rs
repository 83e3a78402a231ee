//! Project and membership model.
//!
//! # Responsibility
//! - Define the top-level project record and its membership link.
//! - Provide create/patch request shapes used by `ProjectService`.
//!
//! # Invariants
//! - `invitation_code` is unique across projects and matches `[A-Z0-9]{10}`.
//! - `(user_id, project_id)` appears at most once in memberships.
//! - The creator of a project is always a `Manager` member.

use crate::model::user::UserId;
use crate::model::validation::{require_text, validate_invitation_code, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable project identifier.
pub type ProjectId = Uuid;

/// Project urgency used for list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPriority {
    Low,
    Medium,
    High,
}

/// Coarse project lifecycle state, set by members by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
}

/// Role of a user inside one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    /// Owner/administrator. Project creators get this role.
    Manager,
    /// Regular contributor. Default role for invitation joins.
    Worker,
    /// Read-mostly observer.
    Stakeholder,
}

impl ProjectRole {
    /// Role granted to users joining through an invitation code.
    pub const fn join_default() -> Self {
        Self::Worker
    }
}

/// Persisted project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    /// Free-form category label.
    pub kind: String,
    /// Epoch ms.
    pub deadline: i64,
    pub priority: ProjectPriority,
    pub status: ProjectStatus,
    /// Unique join token shared with invitees.
    pub invitation_code: String,
    /// Owner who created the project.
    pub responsible_user_id: UserId,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    /// Checks field invariants before any write.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)?;
        validate_invitation_code(&self.invitation_code)
    }
}

/// Create request for a project. The invitation code and owner are supplied
/// by `ProjectService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub kind: String,
    pub deadline: i64,
    pub priority: ProjectPriority,
    pub status: ProjectStatus,
}

impl NewProject {
    /// Creates a request with medium priority, planning status and empty
    /// description/kind.
    pub fn new(name: impl Into<String>, deadline: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind: String::new(),
            deadline,
            priority: ProjectPriority::Medium,
            status: ProjectStatus::Planning,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_text("name", &self.name)
    }

    /// Builds the full record for the given identity, owner and code.
    pub fn into_project(
        self,
        id: ProjectId,
        owner: UserId,
        invitation_code: impl Into<String>,
    ) -> Project {
        Project {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            kind: self.kind,
            deadline: self.deadline,
            priority: self.priority,
            status: self.status,
            invitation_code: invitation_code.into(),
            responsible_user_id: owner,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Partial project update. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub deadline: Option<i64>,
    pub priority: Option<ProjectPriority>,
    pub status: Option<ProjectStatus>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.kind.is_none()
            && self.deadline.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }

    /// Applies provided fields onto `project`.
    ///
    /// A blank `name` is treated as "not provided" rather than as an error,
    /// so edit forms can submit untouched fields as empty strings.
    pub fn apply(&self, project: &mut Project) {
        if let Some(name) = self.name.as_deref().map(str::trim) {
            if !name.is_empty() {
                project.name = name.to_string();
            }
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(kind) = &self.kind {
            project.kind = kind.clone();
        }
        if let Some(deadline) = self.deadline {
            project.deadline = deadline;
        }
        if let Some(priority) = self.priority {
            project.priority = priority;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
    }
}

/// Membership link between a user and a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: ProjectRole,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Public details shown to a user before joining via invitation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationPreview {
    pub project_id: ProjectId,
    pub project_name: String,
    pub responsible_username: String,
}
