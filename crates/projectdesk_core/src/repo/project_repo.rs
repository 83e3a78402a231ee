//! Project, membership and user repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist projects and their memberships.
//! - Keep project creation and the owner's manager membership atomic.
//! - Provide the small user registry memberships point at.
//!
//! # Invariants
//! - `create_project_with_manager` writes both rows or neither.
//! - `invitation_code` collisions surface as `Conflict(InvitationCode)`.
//! - Deleting a project relies on `ON DELETE CASCADE` for everything below it.

use crate::model::project::{
    Project, ProjectId, ProjectMember, ProjectPriority, ProjectRole, ProjectStatus,
};
use crate::model::user::{User, UserId};
use crate::model::validation::require_text;
use crate::repo::error::{ConflictKind, EntityKind, RepoError, RepoResult};
use crate::repo::sql::{ensure_connection_ready, map_unique_violation, parse_uuid, NOW_MS_SQL};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.name AS name,
    p.description AS description,
    p.kind AS kind,
    p.deadline AS deadline,
    p.priority AS priority,
    p.status AS status,
    p.invitation_code AS invitation_code,
    p.responsible_user_id AS responsible_user_id,
    p.created_at AS created_at,
    p.updated_at AS updated_at
FROM projects p";

const MEMBER_SELECT_SQL: &str = "SELECT
    project_id,
    user_id,
    role,
    created_at,
    updated_at
FROM project_members";

/// Sort order for project lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProjectSort {
    /// Most recently created first.
    #[default]
    Newest,
    /// Oldest first.
    Created,
    /// Most recently updated first.
    Updated,
    /// Case-insensitive name order.
    Name,
}

/// Query options for listing projects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectListQuery {
    /// Case-insensitive substring match on project name.
    pub search: Option<String>,
    /// Only projects this user is a member of.
    pub member: Option<UserId>,
    pub sort: ProjectSort,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for projects, memberships and users.
pub trait ProjectRepository {
    /// Creates a user with a unique username.
    fn create_user(&self, username: &str) -> RepoResult<User>;
    /// Loads one user by id.
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Inserts the project and a `Manager` membership for its responsible
    /// user in one transaction, returning the stored project.
    fn create_project_with_manager(&self, project: &Project) -> RepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    /// Looks up a project by its exact (normalized) invitation code.
    fn find_project_by_invitation_code(&self, code: &str) -> RepoResult<Option<Project>>;
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
    /// Replaces mutable project fields. Identity, owner and code are fixed.
    fn update_project(&self, project: &Project) -> RepoResult<()>;
    /// Deletes a project and, through cascades, everything under it.
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
    /// Adds a membership; an existing pair yields `Conflict(Membership)`.
    fn add_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: ProjectRole,
    ) -> RepoResult<ProjectMember>;
    fn get_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> RepoResult<Option<ProjectMember>>;
    /// Lists members in join order.
    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<ProjectMember>>;
    fn set_member_role(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: ProjectRole,
    ) -> RepoResult<()>;
    /// Removes the membership and the user's task assignments in that
    /// project in one transaction.
    fn remove_member(&self, project_id: ProjectId, user_id: UserId) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_user(&self, username: &str) -> RepoResult<User> {
        require_text("username", username)?;
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2);",
                params![id.to_string(), username.trim()],
            )
            .map_err(|err| map_unique_violation(err, ConflictKind::Username))?;

        self.get_user(id)?
            .ok_or(RepoError::NotFound(EntityKind::User, id))
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((id_text, username, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(User {
            id: parse_uuid(&id_text, "users.id")?,
            username,
            created_at,
        }))
    }

    fn create_project_with_manager(&self, project: &Project) -> RepoResult<Project> {
        project.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let code_taken: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE invitation_code = ?1);",
            [project.invitation_code.as_str()],
            |row| row.get(0),
        )?;
        if code_taken == 1 {
            return Err(RepoError::Conflict(ConflictKind::InvitationCode));
        }

        tx.execute(
            "INSERT INTO projects (
                id,
                name,
                description,
                kind,
                deadline,
                priority,
                status,
                invitation_code,
                responsible_user_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                project.id.to_string(),
                project.name.as_str(),
                project.description.as_str(),
                project.kind.as_str(),
                project.deadline,
                priority_to_db(project.priority),
                status_to_db(project.status),
                project.invitation_code.as_str(),
                project.responsible_user_id.to_string(),
            ],
        )
        .map_err(|err| map_unique_violation(err, ConflictKind::InvitationCode))?;

        tx.execute(
            "INSERT INTO project_members (project_id, user_id, role) VALUES (?1, ?2, ?3);",
            params![
                project.id.to_string(),
                project.responsible_user_id.to_string(),
                role_to_db(ProjectRole::Manager),
            ],
        )
        .map_err(|err| map_unique_violation(err, ConflictKind::Membership))?;

        let stored = load_project(&tx, project.id)?
            .ok_or(RepoError::NotFound(EntityKind::Project, project.id))?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        load_project(self.conn, id)
    }

    fn find_project_by_invitation_code(&self, code: &str) -> RepoResult<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE p.invitation_code = ?1;"))?;
        let mut rows = stmt.query([code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_project_row(row)?));
        }
        Ok(None)
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut sql = format!("{PROJECT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            sql.push_str(" AND p.name LIKE ? ESCAPE '\\'");
            bind_values.push(Value::Text(format!("%{}%", escape_like(search))));
        }

        if let Some(member) = query.member {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1 FROM project_members m
                    WHERE m.project_id = p.id AND m.user_id = ?
                )",
            );
            bind_values.push(Value::Text(member.to_string()));
        }

        sql.push_str(match query.sort {
            ProjectSort::Newest => " ORDER BY p.created_at DESC, p.rowid DESC",
            ProjectSort::Created => " ORDER BY p.created_at ASC, p.rowid ASC",
            ProjectSort::Updated => " ORDER BY p.updated_at DESC, p.rowid DESC",
            ProjectSort::Name => " ORDER BY p.name COLLATE NOCASE ASC, p.rowid ASC",
        });

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn update_project(&self, project: &Project) -> RepoResult<()> {
        project.validate()?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE projects
                 SET
                    name = ?2,
                    description = ?3,
                    kind = ?4,
                    deadline = ?5,
                    priority = ?6,
                    status = ?7,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                project.id.to_string(),
                project.name.as_str(),
                project.description.as_str(),
                project.kind.as_str(),
                project.deadline,
                priority_to_db(project.priority),
                status_to_db(project.status),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Project, project.id));
        }
        Ok(())
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Project, id));
        }
        Ok(())
    }

    fn add_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: ProjectRole,
    ) -> RepoResult<ProjectMember> {
        self.conn
            .execute(
                "INSERT INTO project_members (project_id, user_id, role) VALUES (?1, ?2, ?3);",
                params![project_id.to_string(), user_id.to_string(), role_to_db(role)],
            )
            .map_err(|err| map_unique_violation(err, ConflictKind::Membership))?;

        self.get_member(project_id, user_id)?
            .ok_or(RepoError::NotFound(EntityKind::Member, user_id))
    }

    fn get_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> RepoResult<Option<ProjectMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL} WHERE project_id = ?1 AND user_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![project_id.to_string(), user_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }
        Ok(None)
    }

    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<ProjectMember>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBER_SELECT_SQL} WHERE project_id = ?1 ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([project_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }

    fn set_member_role(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: ProjectRole,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE project_members
                 SET role = ?3, updated_at = {NOW_MS_SQL}
                 WHERE project_id = ?1 AND user_id = ?2;"
            ),
            params![project_id.to_string(), user_id.to_string(), role_to_db(role)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Member, user_id));
        }
        Ok(())
    }

    fn remove_member(&self, project_id: ProjectId, user_id: UserId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "DELETE FROM project_members WHERE project_id = ?1 AND user_id = ?2;",
            params![project_id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Member, user_id));
        }

        tx.execute(
            "DELETE FROM task_assignments
             WHERE user_id = ?2
               AND task_id IN (
                   SELECT t.id
                   FROM tasks t
                   INNER JOIN units u ON u.id = t.unit_id
                   INNER JOIN phases ph ON ph.id = u.phase_id
                   WHERE ph.project_id = ?1
               );",
            params![project_id.to_string(), user_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn load_project(conn: &Connection, id: ProjectId) -> RepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE p.id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(row)?));
    }
    Ok(None)
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("id")?;
    let owner_text: String = row.get("responsible_user_id")?;

    let priority_text: String = row.get("priority")?;
    let priority = parse_priority(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in projects.priority"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in projects.status"))
    })?;

    let project = Project {
        id: parse_uuid(&id_text, "projects.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        kind: row.get("kind")?,
        deadline: row.get("deadline")?,
        priority,
        status,
        invitation_code: row.get("invitation_code")?,
        responsible_user_id: parse_uuid(&owner_text, "projects.responsible_user_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    project.validate()?;
    Ok(project)
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<ProjectMember> {
    let project_text: String = row.get("project_id")?;
    let user_text: String = row.get("user_id")?;
    let role_text: String = row.get("role")?;
    let role = parse_role(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in project_members.role"))
    })?;

    Ok(ProjectMember {
        project_id: parse_uuid(&project_text, "project_members.project_id")?,
        user_id: parse_uuid(&user_text, "project_members.user_id")?,
        role,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn priority_to_db(priority: ProjectPriority) -> &'static str {
    match priority {
        ProjectPriority::Low => "low",
        ProjectPriority::Medium => "medium",
        ProjectPriority::High => "high",
    }
}

fn parse_priority(value: &str) -> Option<ProjectPriority> {
    match value {
        "low" => Some(ProjectPriority::Low),
        "medium" => Some(ProjectPriority::Medium),
        "high" => Some(ProjectPriority::High),
        _ => None,
    }
}

fn status_to_db(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Planning => "planning",
        ProjectStatus::Active => "active",
        ProjectStatus::OnHold => "on_hold",
        ProjectStatus::Completed => "completed",
    }
}

fn parse_status(value: &str) -> Option<ProjectStatus> {
    match value {
        "planning" => Some(ProjectStatus::Planning),
        "active" => Some(ProjectStatus::Active),
        "on_hold" => Some(ProjectStatus::OnHold),
        "completed" => Some(ProjectStatus::Completed),
        _ => None,
    }
}

pub(crate) fn role_to_db(role: ProjectRole) -> &'static str {
    match role {
        ProjectRole::Manager => "manager",
        ProjectRole::Worker => "worker",
        ProjectRole::Stakeholder => "stakeholder",
    }
}

pub(crate) fn parse_role(value: &str) -> Option<ProjectRole> {
    match value {
        "manager" => Some(ProjectRole::Manager),
        "worker" => Some(ProjectRole::Worker),
        "stakeholder" => Some(ProjectRole::Stakeholder),
        _ => None,
    }
}
