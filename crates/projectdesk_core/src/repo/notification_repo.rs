//! Notification repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Lists are ordered `created_at DESC`, newest insert first on ties.
//! - Notifications referencing a project or task are deleted with it.

use crate::model::notification::{
    Notification, NotificationId, NotificationKind, NotificationStatus,
};
use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::model::work::TaskId;
use crate::repo::error::{EntityKind, RepoError, RepoResult};
use crate::repo::sql::{ensure_connection_ready, parse_uuid};
use rusqlite::{params, Connection, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    project_id,
    task_id,
    title,
    detail,
    kind,
    status,
    created_at
FROM notifications";

/// Incomplete assignment whose task is due inside a reminder window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueAssignment {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub project_name: String,
    pub task_id: TaskId,
    pub task_name: String,
    pub deadline: i64,
}

/// Repository interface for notifications.
pub trait NotificationRepository {
    fn create_notification(&self, notification: &Notification) -> RepoResult<Notification>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    fn list_for_user(&self, user_id: UserId, unread_only: bool) -> RepoResult<Vec<Notification>>;
    fn set_status(&self, id: NotificationId, status: NotificationStatus) -> RepoResult<()>;
    /// Marks every unread notification of the user read, returning how many
    /// changed.
    fn mark_all_read(&self, user_id: UserId) -> RepoResult<usize>;
    fn delete_notification(&self, id: NotificationId) -> RepoResult<()>;
    /// Returns whether the user already has a deadline reminder for the task.
    fn reminder_exists(&self, user_id: UserId, task_id: TaskId) -> RepoResult<bool>;
    /// Lists incomplete assignments with task deadline in `[from_ms, to_ms]`.
    fn list_due_assignments(&self, from_ms: i64, to_ms: i64) -> RepoResult<Vec<DueAssignment>>;
    fn user_exists(&self, user_id: UserId) -> RepoResult<bool>;
    /// Loads `(name, invitation_code)` of a project.
    fn project_invitation(&self, project_id: ProjectId) -> RepoResult<Option<(String, String)>>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<Notification> {
        notification.validate()?;
        self.conn.execute(
            "INSERT INTO notifications (id, user_id, project_id, task_id, title, detail, kind, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.project_id.map(|id| id.to_string()),
                notification.task_id.map(|id| id.to_string()),
                notification.title.as_str(),
                notification.detail.as_str(),
                kind_to_db(notification.kind),
                status_to_db(notification.status),
            ],
        )?;
        self.get_notification(notification.id)?
            .ok_or(RepoError::NotFound(EntityKind::Notification, notification.id))
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_notification_row(row)?));
        }
        Ok(None)
    }

    fn list_for_user(&self, user_id: UserId, unread_only: bool) -> RepoResult<Vec<Notification>> {
        let sql = if unread_only {
            format!(
                "{NOTIFICATION_SELECT_SQL}
                 WHERE user_id = ?1 AND status = 'unread'
                 ORDER BY created_at DESC, rowid DESC;"
            )
        } else {
            format!(
                "{NOTIFICATION_SELECT_SQL}
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC;"
            )
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }

    fn set_status(&self, id: NotificationId, status: NotificationStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET status = ?2 WHERE id = ?1;",
            params![id.to_string(), status_to_db(status)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Notification, id));
        }
        Ok(())
    }

    fn mark_all_read(&self, user_id: UserId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications SET status = 'read' WHERE user_id = ?1 AND status = 'unread';",
            [user_id.to_string()],
        )?;
        Ok(changed)
    }

    fn delete_notification(&self, id: NotificationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notifications WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityKind::Notification, id));
        }
        Ok(())
    }

    fn reminder_exists(&self, user_id: UserId, task_id: TaskId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM notifications
                WHERE user_id = ?1
                  AND task_id = ?2
                  AND kind = ?3
            );",
            params![
                user_id.to_string(),
                task_id.to_string(),
                kind_to_db(NotificationKind::Deadline),
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_due_assignments(&self, from_ms: i64, to_ms: i64) -> RepoResult<Vec<DueAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                a.user_id,
                p.id,
                p.name,
                t.id,
                t.name,
                t.deadline
             FROM task_assignments a
             INNER JOIN tasks t ON t.id = a.task_id
             INNER JOIN units u ON u.id = t.unit_id
             INNER JOIN phases ph ON ph.id = u.phase_id
             INNER JOIN projects p ON p.id = ph.project_id
             WHERE a.is_completed = 0
               AND t.deadline BETWEEN ?1 AND ?2
             ORDER BY t.deadline ASC, a.rowid ASC;",
        )?;
        let mut rows = stmt.query(params![from_ms, to_ms])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let user_text: String = row.get(0)?;
            let project_text: String = row.get(1)?;
            let task_text: String = row.get(3)?;
            items.push(DueAssignment {
                user_id: parse_uuid(&user_text, "task_assignments.user_id")?,
                project_id: parse_uuid(&project_text, "projects.id")?,
                project_name: row.get(2)?,
                task_id: parse_uuid(&task_text, "tasks.id")?,
                task_name: row.get(4)?,
                deadline: row.get(5)?,
            });
        }
        Ok(items)
    }

    fn user_exists(&self, user_id: UserId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn project_invitation(&self, project_id: ProjectId) -> RepoResult<Option<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, invitation_code FROM projects WHERE id = ?1;")?;
        let mut rows = stmt.query([project_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some((row.get(0)?, row.get(1)?)));
        }
        Ok(None)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    let project_id = row
        .get::<_, Option<String>>("project_id")?
        .map(|value| parse_uuid(&value, "notifications.project_id"))
        .transpose()?;
    let task_id = row
        .get::<_, Option<String>>("task_id")?
        .map(|value| parse_uuid(&value, "notifications.task_id"))
        .transpose()?;

    let kind_text: String = row.get("kind")?;
    let kind = parse_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid kind `{kind_text}` in notifications.kind"))
    })?;
    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in notifications.status"
        ))
    })?;

    Ok(Notification {
        id: parse_uuid(&id_text, "notifications.id")?,
        user_id: parse_uuid(&user_text, "notifications.user_id")?,
        project_id,
        task_id,
        title: row.get("title")?,
        detail: row.get("detail")?,
        kind,
        status,
        created_at: row.get("created_at")?,
    })
}

fn kind_to_db(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Deadline => "deadline",
        NotificationKind::Invitation => "invitation",
    }
}

fn parse_kind(value: &str) -> Option<NotificationKind> {
    match value {
        "deadline" => Some(NotificationKind::Deadline),
        "invitation" => Some(NotificationKind::Invitation),
        _ => None,
    }
}

fn status_to_db(status: NotificationStatus) -> &'static str {
    match status {
        NotificationStatus::Unread => "unread",
        NotificationStatus::Read => "read",
    }
}

fn parse_status(value: &str) -> Option<NotificationStatus> {
    match value {
        "unread" => Some(NotificationStatus::Unread),
        "read" => Some(NotificationStatus::Read),
        _ => None,
    }
}
