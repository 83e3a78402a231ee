//! Work hierarchy repository: phases, units, tasks and task assignments.
//!
//! # Responsibility
//! - Persist the project → phase → unit → task hierarchy and assignments.
//! - Load a whole project tree for progress computation in a fixed number
//!   of queries.
//!
//! # Invariants
//! - Unit + initial tasks, and task + first assignment, are written atomically.
//! - `(task_id, user_id)` collisions surface as `Conflict(Assignment)`.
//! - Phase order is `start_at DESC`; unit and task order is `deadline ASC`;
//!   ties fall back to insertion order.

use crate::model::project::{ProjectId, ProjectRole};
use crate::model::user::UserId;
use crate::model::work::{
    AssignmentId, Phase, PhaseId, Task, TaskAssignment, TaskId, Unit, UnitId,
};
use crate::progress::{PhaseBranch, ProjectTree, TaskLeaf, UnitBranch};
use crate::repo::error::{ConflictKind, EntityKind, RepoError, RepoResult};
use crate::repo::project_repo::parse_role;
use crate::repo::sql::{
    bool_to_int, ensure_connection_ready, map_unique_violation, parse_bool, parse_uuid,
    NOW_MS_SQL,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use uuid::Uuid;

const PHASE_SELECT_SQL: &str = "SELECT
    ph.id AS id,
    ph.project_id AS project_id,
    ph.name AS name,
    ph.description AS description,
    ph.start_at AS start_at,
    ph.end_at AS end_at,
    ph.created_at AS created_at,
    ph.updated_at AS updated_at
FROM phases ph";

const UNIT_SELECT_SQL: &str = "SELECT
    u.id AS id,
    u.phase_id AS phase_id,
    u.name AS name,
    u.description AS description,
    u.deadline AS deadline,
    u.created_at AS created_at,
    u.updated_at AS updated_at
FROM units u";

const TASK_SELECT_SQL: &str = "SELECT
    t.id AS id,
    t.unit_id AS unit_id,
    t.name AS name,
    t.description AS description,
    t.deadline AS deadline,
    t.created_at AS created_at,
    t.updated_at AS updated_at
FROM tasks t";

const ASSIGNMENT_SELECT_SQL: &str = "SELECT
    a.id AS id,
    a.task_id AS task_id,
    a.user_id AS user_id,
    a.is_completed AS is_completed,
    a.assigned_at AS assigned_at
FROM task_assignments a";

/// Repository interface for the work hierarchy.
pub trait WorkRepository {
    /// Returns whether the project row exists.
    fn project_exists(&self, project_id: ProjectId) -> RepoResult<bool>;
    /// Loads the role of `user_id` in `project_id`, if they are a member.
    fn member_role(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> RepoResult<Option<ProjectRole>>;

    fn create_phase(&self, phase: &Phase) -> RepoResult<Phase>;
    fn get_phase(&self, id: PhaseId) -> RepoResult<Option<Phase>>;
    fn list_phases(&self, project_id: ProjectId) -> RepoResult<Vec<Phase>>;
    fn update_phase(&self, phase: &Phase) -> RepoResult<()>;
    fn delete_phase(&self, id: PhaseId) -> RepoResult<()>;

    /// Inserts a unit and its initial tasks in one transaction.
    fn create_unit_with_tasks(&self, unit: &Unit, tasks: &[Task]) -> RepoResult<(Unit, Vec<Task>)>;
    fn get_unit(&self, id: UnitId) -> RepoResult<Option<Unit>>;
    fn list_units(&self, phase_id: PhaseId) -> RepoResult<Vec<Unit>>;
    fn update_unit(&self, unit: &Unit) -> RepoResult<()>;
    fn delete_unit(&self, id: UnitId) -> RepoResult<()>;

    /// Inserts a task and, when given, its first assignment in one transaction.
    fn create_task(
        &self,
        task: &Task,
        assignee: Option<UserId>,
    ) -> RepoResult<(Task, Option<TaskAssignment>)>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, unit_id: UnitId) -> RepoResult<Vec<Task>>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Resolves the project that owns a task.
    fn task_project_id(&self, task_id: TaskId) -> RepoResult<Option<ProjectId>>;

    fn create_assignment(&self, task_id: TaskId, user_id: UserId) -> RepoResult<TaskAssignment>;
    fn get_assignment(&self, id: AssignmentId) -> RepoResult<Option<TaskAssignment>>;
    /// Lists assignments of one task in assignment order.
    fn list_assignments(&self, task_id: TaskId) -> RepoResult<Vec<TaskAssignment>>;
    fn list_user_assignments(&self, user_id: UserId) -> RepoResult<Vec<TaskAssignment>>;
    /// Sets the completion flag. Setting the current value again is not an error.
    fn set_assignment_completed(&self, id: AssignmentId, is_completed: bool) -> RepoResult<()>;
    fn delete_assignment(&self, task_id: TaskId, user_id: UserId) -> RepoResult<()>;

    /// Loads phases, units, tasks and assignments of one project.
    fn load_project_tree(&self, project_id: ProjectId) -> RepoResult<ProjectTree>;
}

/// SQLite-backed work hierarchy repository.
pub struct SqliteWorkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWorkRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl WorkRepository for SqliteWorkRepository<'_> {
    fn project_exists(&self, project_id: ProjectId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1);",
            [project_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn member_role(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> RepoResult<Option<ProjectRole>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT role FROM project_members WHERE project_id = ?1 AND user_id = ?2;",
                params![project_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            None => Ok(None),
            Some(text) => parse_role(&text).map(Some).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid role `{text}` in project_members.role"))
            }),
        }
    }

    fn create_phase(&self, phase: &Phase) -> RepoResult<Phase> {
        phase.validate()?;
        self.conn.execute(
            "INSERT INTO phases (id, project_id, name, description, start_at, end_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                phase.id.to_string(),
                phase.project_id.to_string(),
                phase.name.as_str(),
                phase.description.as_str(),
                phase.start_at,
                phase.end_at,
            ],
        )?;
        self.get_phase(phase.id)?
            .ok_or(RepoError::NotFound(EntityKind::Phase, phase.id))
    }

    fn get_phase(&self, id: PhaseId) -> RepoResult<Option<Phase>> {
        query_optional(
            self.conn,
            &format!("{PHASE_SELECT_SQL} WHERE ph.id = ?1;"),
            id,
            parse_phase_row,
        )
    }

    fn list_phases(&self, project_id: ProjectId) -> RepoResult<Vec<Phase>> {
        query_all(
            self.conn,
            &format!(
                "{PHASE_SELECT_SQL} WHERE ph.project_id = ?1 ORDER BY ph.start_at DESC, ph.rowid ASC;"
            ),
            project_id,
            parse_phase_row,
        )
    }

    fn update_phase(&self, phase: &Phase) -> RepoResult<()> {
        phase.validate()?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE phases
                 SET name = ?2, description = ?3, start_at = ?4, end_at = ?5,
                     updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                phase.id.to_string(),
                phase.name.as_str(),
                phase.description.as_str(),
                phase.start_at,
                phase.end_at,
            ],
        )?;
        ensure_changed(changed, EntityKind::Phase, phase.id)
    }

    fn delete_phase(&self, id: PhaseId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM phases WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, EntityKind::Phase, id)
    }

    fn create_unit_with_tasks(&self, unit: &Unit, tasks: &[Task]) -> RepoResult<(Unit, Vec<Task>)> {
        unit.validate()?;
        for task in tasks {
            task.validate()?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO units (id, phase_id, name, description, deadline)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                unit.id.to_string(),
                unit.phase_id.to_string(),
                unit.name.as_str(),
                unit.description.as_str(),
                unit.deadline,
            ],
        )?;
        for task in tasks {
            insert_task(&tx, task)?;
        }

        let stored_unit = query_optional(
            &tx,
            &format!("{UNIT_SELECT_SQL} WHERE u.id = ?1;"),
            unit.id,
            parse_unit_row,
        )?
        .ok_or(RepoError::NotFound(EntityKind::Unit, unit.id))?;
        let stored_tasks = query_all(
            &tx,
            &format!("{TASK_SELECT_SQL} WHERE t.unit_id = ?1 ORDER BY t.rowid ASC;"),
            unit.id,
            parse_task_row,
        )?;
        tx.commit()?;
        Ok((stored_unit, stored_tasks))
    }

    fn get_unit(&self, id: UnitId) -> RepoResult<Option<Unit>> {
        query_optional(
            self.conn,
            &format!("{UNIT_SELECT_SQL} WHERE u.id = ?1;"),
            id,
            parse_unit_row,
        )
    }

    fn list_units(&self, phase_id: PhaseId) -> RepoResult<Vec<Unit>> {
        query_all(
            self.conn,
            &format!(
                "{UNIT_SELECT_SQL} WHERE u.phase_id = ?1 ORDER BY u.deadline ASC, u.rowid ASC;"
            ),
            phase_id,
            parse_unit_row,
        )
    }

    fn update_unit(&self, unit: &Unit) -> RepoResult<()> {
        unit.validate()?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE units
                 SET name = ?2, description = ?3, deadline = ?4, updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                unit.id.to_string(),
                unit.name.as_str(),
                unit.description.as_str(),
                unit.deadline,
            ],
        )?;
        ensure_changed(changed, EntityKind::Unit, unit.id)
    }

    fn delete_unit(&self, id: UnitId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM units WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, EntityKind::Unit, id)
    }

    fn create_task(
        &self,
        task: &Task,
        assignee: Option<UserId>,
    ) -> RepoResult<(Task, Option<TaskAssignment>)> {
        task.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_task(&tx, task)?;
        let assignment = match assignee {
            Some(user_id) => Some(insert_assignment(&tx, task.id, user_id)?),
            None => None,
        };

        let stored = query_optional(
            &tx,
            &format!("{TASK_SELECT_SQL} WHERE t.id = ?1;"),
            task.id,
            parse_task_row,
        )?
        .ok_or(RepoError::NotFound(EntityKind::Task, task.id))?;
        tx.commit()?;
        Ok((stored, assignment))
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        query_optional(
            self.conn,
            &format!("{TASK_SELECT_SQL} WHERE t.id = ?1;"),
            id,
            parse_task_row,
        )
    }

    fn list_tasks(&self, unit_id: UnitId) -> RepoResult<Vec<Task>> {
        query_all(
            self.conn,
            &format!(
                "{TASK_SELECT_SQL} WHERE t.unit_id = ?1 ORDER BY t.deadline ASC, t.rowid ASC;"
            ),
            unit_id,
            parse_task_row,
        )
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE tasks
                 SET name = ?2, description = ?3, deadline = ?4, updated_at = {NOW_MS_SQL}
                 WHERE id = ?1;"
            ),
            params![
                task.id.to_string(),
                task.name.as_str(),
                task.description.as_str(),
                task.deadline,
            ],
        )?;
        ensure_changed(changed, EntityKind::Task, task.id)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        ensure_changed(changed, EntityKind::Task, id)
    }

    fn task_project_id(&self, task_id: TaskId) -> RepoResult<Option<ProjectId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT ph.project_id
                 FROM tasks t
                 INNER JOIN units u ON u.id = t.unit_id
                 INNER JOIN phases ph ON ph.id = u.phase_id
                 WHERE t.id = ?1;",
                [task_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|text| parse_uuid(&text, "phases.project_id"))
            .transpose()
    }

    fn create_assignment(&self, task_id: TaskId, user_id: UserId) -> RepoResult<TaskAssignment> {
        insert_assignment(self.conn, task_id, user_id)
    }

    fn get_assignment(&self, id: AssignmentId) -> RepoResult<Option<TaskAssignment>> {
        query_optional(
            self.conn,
            &format!("{ASSIGNMENT_SELECT_SQL} WHERE a.id = ?1;"),
            id,
            parse_assignment_row,
        )
    }

    fn list_assignments(&self, task_id: TaskId) -> RepoResult<Vec<TaskAssignment>> {
        query_all(
            self.conn,
            &format!(
                "{ASSIGNMENT_SELECT_SQL} WHERE a.task_id = ?1 ORDER BY a.assigned_at ASC, a.rowid ASC;"
            ),
            task_id,
            parse_assignment_row,
        )
    }

    fn list_user_assignments(&self, user_id: UserId) -> RepoResult<Vec<TaskAssignment>> {
        query_all(
            self.conn,
            &format!(
                "{ASSIGNMENT_SELECT_SQL} WHERE a.user_id = ?1 ORDER BY a.assigned_at ASC, a.rowid ASC;"
            ),
            user_id,
            parse_assignment_row,
        )
    }

    fn set_assignment_completed(&self, id: AssignmentId, is_completed: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE task_assignments SET is_completed = ?2 WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_completed)],
        )?;
        ensure_changed(changed, EntityKind::Assignment, id)
    }

    fn delete_assignment(&self, task_id: TaskId, user_id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM task_assignments WHERE task_id = ?1 AND user_id = ?2;",
            params![task_id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotAssigned { task_id, user_id });
        }
        Ok(())
    }

    fn load_project_tree(&self, project_id: ProjectId) -> RepoResult<ProjectTree> {
        let phases = self.list_phases(project_id)?;
        let units = query_all(
            self.conn,
            &format!(
                "{UNIT_SELECT_SQL}
                 INNER JOIN phases ph ON ph.id = u.phase_id
                 WHERE ph.project_id = ?1
                 ORDER BY u.deadline ASC, u.rowid ASC;"
            ),
            project_id,
            parse_unit_row,
        )?;
        let tasks = query_all(
            self.conn,
            &format!(
                "{TASK_SELECT_SQL}
                 INNER JOIN units u ON u.id = t.unit_id
                 INNER JOIN phases ph ON ph.id = u.phase_id
                 WHERE ph.project_id = ?1
                 ORDER BY t.deadline ASC, t.rowid ASC;"
            ),
            project_id,
            parse_task_row,
        )?;
        let assignments = query_all(
            self.conn,
            &format!(
                "{ASSIGNMENT_SELECT_SQL}
                 INNER JOIN tasks t ON t.id = a.task_id
                 INNER JOIN units u ON u.id = t.unit_id
                 INNER JOIN phases ph ON ph.id = u.phase_id
                 WHERE ph.project_id = ?1
                 ORDER BY a.assigned_at ASC, a.rowid ASC;"
            ),
            project_id,
            parse_assignment_row,
        )?;

        let mut assignments_by_task: HashMap<TaskId, Vec<TaskAssignment>> = HashMap::new();
        for assignment in assignments {
            assignments_by_task
                .entry(assignment.task_id)
                .or_default()
                .push(assignment);
        }

        let mut tasks_by_unit: HashMap<UnitId, Vec<TaskLeaf>> = HashMap::new();
        for task in tasks {
            let assignments = assignments_by_task.remove(&task.id).unwrap_or_default();
            tasks_by_unit
                .entry(task.unit_id)
                .or_default()
                .push(TaskLeaf { task, assignments });
        }

        let mut units_by_phase: HashMap<PhaseId, Vec<UnitBranch>> = HashMap::new();
        for unit in units {
            let tasks = tasks_by_unit.remove(&unit.id).unwrap_or_default();
            units_by_phase
                .entry(unit.phase_id)
                .or_default()
                .push(UnitBranch { unit, tasks });
        }

        let phases = phases
            .into_iter()
            .map(|phase| {
                let units = units_by_phase.remove(&phase.id).unwrap_or_default();
                PhaseBranch { phase, units }
            })
            .collect();

        Ok(ProjectTree { project_id, phases })
    }
}

fn insert_task(conn: &Connection, task: &Task) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO tasks (id, unit_id, name, description, deadline)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            task.id.to_string(),
            task.unit_id.to_string(),
            task.name.as_str(),
            task.description.as_str(),
            task.deadline,
        ],
    )?;
    Ok(())
}

fn insert_assignment(
    conn: &Connection,
    task_id: TaskId,
    user_id: UserId,
) -> RepoResult<TaskAssignment> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO task_assignments (id, task_id, user_id) VALUES (?1, ?2, ?3);",
        params![id.to_string(), task_id.to_string(), user_id.to_string()],
    )
    .map_err(|err| map_unique_violation(err, ConflictKind::Assignment))?;

    query_optional(
        conn,
        &format!("{ASSIGNMENT_SELECT_SQL} WHERE a.id = ?1;"),
        id,
        parse_assignment_row,
    )?
    .ok_or(RepoError::NotFound(EntityKind::Assignment, id))
}

fn query_optional<T>(
    conn: &Connection,
    sql: &str,
    id: Uuid,
    parse: fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse(row)?));
    }
    Ok(None)
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    id: Uuid,
    parse: fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

fn ensure_changed(changed: usize, kind: EntityKind, id: Uuid) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(kind, id));
    }
    Ok(())
}

fn parse_phase_row(row: &Row<'_>) -> RepoResult<Phase> {
    let id_text: String = row.get("id")?;
    let project_text: String = row.get("project_id")?;
    let phase = Phase {
        id: parse_uuid(&id_text, "phases.id")?,
        project_id: parse_uuid(&project_text, "phases.project_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        start_at: row.get("start_at")?,
        end_at: row.get("end_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    phase.validate()?;
    Ok(phase)
}

fn parse_unit_row(row: &Row<'_>) -> RepoResult<Unit> {
    let id_text: String = row.get("id")?;
    let phase_text: String = row.get("phase_id")?;
    let unit = Unit {
        id: parse_uuid(&id_text, "units.id")?,
        phase_id: parse_uuid(&phase_text, "units.phase_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        deadline: row.get("deadline")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    unit.validate()?;
    Ok(unit)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let unit_text: String = row.get("unit_id")?;
    let task = Task {
        id: parse_uuid(&id_text, "tasks.id")?,
        unit_id: parse_uuid(&unit_text, "tasks.unit_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        deadline: row.get("deadline")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    task.validate()?;
    Ok(task)
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<TaskAssignment> {
    let id_text: String = row.get("id")?;
    let task_text: String = row.get("task_id")?;
    let user_text: String = row.get("user_id")?;
    Ok(TaskAssignment {
        id: parse_uuid(&id_text, "task_assignments.id")?,
        task_id: parse_uuid(&task_text, "task_assignments.task_id")?,
        user_id: parse_uuid(&user_text, "task_assignments.user_id")?,
        is_completed: parse_bool(row.get("is_completed")?, "task_assignments.is_completed")?,
        assigned_at: row.get("assigned_at")?,
    })
}
