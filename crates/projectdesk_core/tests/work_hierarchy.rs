use projectdesk_core::db::open_db_in_memory;
use projectdesk_core::{
    ConflictKind, ModelValidationError, NewPhase, NewProject, NewTask, NewUnit, Project,
    ProjectService, SqliteProjectRepository, SqliteWorkRepository, User, WorkService,
    WorkServiceError,
};
use rusqlite::Connection;
use uuid::Uuid;

struct Setup {
    owner: User,
    outsider: User,
    project: Project,
}

fn setup(conn: &Connection) -> Setup {
    let projects = ProjectService::new(SqliteProjectRepository::try_new(conn).unwrap());
    let owner = projects.create_user("ada").unwrap();
    let outsider = projects.create_user("eve").unwrap();
    let project = projects
        .create_project(owner.id, NewProject::new("Apollo", 0))
        .unwrap();
    Setup {
        owner,
        outsider,
        project,
    }
}

fn work(conn: &Connection) -> WorkService<SqliteWorkRepository<'_>> {
    WorkService::new(SqliteWorkRepository::try_new(conn).unwrap())
}

fn phase(name: &str, start_at: i64, end_at: i64) -> NewPhase {
    NewPhase {
        name: name.to_string(),
        description: String::new(),
        start_at,
        end_at,
    }
}

fn unit(name: &str, deadline: i64) -> NewUnit {
    NewUnit {
        name: name.to_string(),
        description: String::new(),
        deadline,
    }
}

#[test]
fn phases_are_listed_latest_start_first() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);

    let early = work
        .create_phase(setup.project.id, phase("Discovery", 100, 200))
        .unwrap();
    let late = work
        .create_phase(setup.project.id, phase("Delivery", 300, 400))
        .unwrap();

    let listed = work.list_phases(setup.project.id).unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![late.id, early.id]);
    assert_eq!(early.project_id, setup.project.id);
}

#[test]
fn phase_creation_validates_window_and_parent() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);

    let err = work
        .create_phase(setup.project.id, phase("Backwards", 500, 100))
        .unwrap_err();
    assert!(matches!(
        err,
        WorkServiceError::Validation(ModelValidationError::PhaseEndsBeforeStart { .. })
    ));

    let ghost = Uuid::new_v4();
    let err = work
        .create_phase(ghost, phase("Orphan", 0, 1))
        .unwrap_err();
    assert!(matches!(err, WorkServiceError::ProjectNotFound(id) if id == ghost));
}

#[test]
fn update_phase_persists_fields() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);

    let mut stored = work
        .create_phase(setup.project.id, phase("Discovery", 100, 200))
        .unwrap();
    stored.name = "Research".to_string();
    stored.end_at = 900;
    let updated = work.update_phase(&stored).unwrap();
    assert_eq!(updated.name, "Research");
    assert_eq!(updated.end_at, 900);

    stored.end_at = 50;
    assert!(matches!(
        work.update_phase(&stored).unwrap_err(),
        WorkServiceError::Validation(_)
    ));
}

#[test]
fn create_unit_stores_batch_tasks_and_skips_blank_rows() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);
    let stored_phase = work
        .create_phase(setup.project.id, phase("Build", 0, 1_000))
        .unwrap();

    let (stored_unit, tasks) = work
        .create_unit(
            stored_phase.id,
            unit("Backend", 500),
            &[
                NewTask::new("Schema", 300),
                NewTask::new("   ", 100),
                NewTask::new("Endpoints", 200),
            ],
        )
        .unwrap();

    assert_eq!(stored_unit.phase_id, stored_phase.id);
    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Schema", "Endpoints"]);

    let listed = work.list_tasks(stored_unit.id).unwrap();
    let names: Vec<&str> = listed.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Endpoints", "Schema"]);
}

#[test]
fn create_unit_under_missing_phase_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    setup(&conn);
    let work = work(&conn);

    let ghost = Uuid::new_v4();
    let err = work
        .create_unit(ghost, unit("Lost", 0), &[NewTask::new("Task", 0)])
        .unwrap_err();
    assert!(matches!(err, WorkServiceError::PhaseNotFound(id) if id == ghost));

    let tasks: i64 = conn
        .query_row("SELECT COUNT(*) FROM tasks;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tasks, 0);
}

#[test]
fn create_task_with_assignee_requires_membership() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);
    let stored_phase = work
        .create_phase(setup.project.id, phase("Build", 0, 1_000))
        .unwrap();
    let (stored_unit, _) = work
        .create_unit(stored_phase.id, unit("Backend", 500), &[])
        .unwrap();

    let (task, assignment) = work
        .create_task(
            stored_unit.id,
            NewTask::new("Schema", 300),
            Some(setup.owner.id),
        )
        .unwrap();
    let assignment = assignment.expect("owner is assigned");
    assert_eq!(assignment.task_id, task.id);
    assert_eq!(assignment.user_id, setup.owner.id);
    assert!(!assignment.is_completed);

    let err = work
        .create_task(
            stored_unit.id,
            NewTask::new("Sneaky", 300),
            Some(setup.outsider.id),
        )
        .unwrap_err();
    assert!(matches!(err, WorkServiceError::NotProjectMember { .. }));
    assert_eq!(work.list_tasks(stored_unit.id).unwrap().len(), 1);
}

#[test]
fn assign_task_enforces_membership_and_uniqueness() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);
    let stored_phase = work
        .create_phase(setup.project.id, phase("Build", 0, 1_000))
        .unwrap();
    let (_, tasks) = work
        .create_unit(
            stored_phase.id,
            unit("Backend", 500),
            &[NewTask::new("Schema", 300)],
        )
        .unwrap();
    let task = &tasks[0];

    let assignment = work.assign_task(task.id, setup.owner.id).unwrap();
    assert_eq!(assignment.user_id, setup.owner.id);

    let err = work.assign_task(task.id, setup.owner.id).unwrap_err();
    assert!(matches!(
        err,
        WorkServiceError::Conflict(ConflictKind::Assignment)
    ));

    let err = work.assign_task(task.id, setup.outsider.id).unwrap_err();
    assert!(matches!(
        err,
        WorkServiceError::NotProjectMember { user_id, .. } if user_id == setup.outsider.id
    ));

    let ghost = Uuid::new_v4();
    let err = work.assign_task(ghost, setup.owner.id).unwrap_err();
    assert!(matches!(err, WorkServiceError::TaskNotFound(id) if id == ghost));

    assert_eq!(work.list_assignments(task.id).unwrap().len(), 1);
    assert_eq!(work.list_user_assignments(setup.owner.id).unwrap().len(), 1);

    work.unassign_task(task.id, setup.owner.id).unwrap();
    assert!(work.list_assignments(task.id).unwrap().is_empty());
    assert!(matches!(
        work.unassign_task(task.id, setup.owner.id).unwrap_err(),
        WorkServiceError::NotAssigned { task_id, user_id }
            if task_id == task.id && user_id == setup.owner.id
    ));
}

#[test]
fn update_and_delete_units_and_tasks() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);
    let stored_phase = work
        .create_phase(setup.project.id, phase("Build", 0, 1_000))
        .unwrap();
    let (mut stored_unit, mut tasks) = work
        .create_unit(
            stored_phase.id,
            unit("Backend", 500),
            &[NewTask::new("Schema", 300)],
        )
        .unwrap();

    stored_unit.deadline = 800;
    assert_eq!(work.update_unit(&stored_unit).unwrap().deadline, 800);

    let task = &mut tasks[0];
    task.description = "tables and indexes".to_string();
    let updated = work.update_task(task).unwrap();
    assert_eq!(updated.description, "tables and indexes");

    work.delete_task(task.id).unwrap();
    assert!(matches!(
        work.get_task(task.id).unwrap_err(),
        WorkServiceError::TaskNotFound(_)
    ));

    work.delete_unit(stored_unit.id).unwrap();
    assert!(work.list_units(stored_phase.id).unwrap().is_empty());
    assert!(matches!(
        work.delete_unit(stored_unit.id).unwrap_err(),
        WorkServiceError::UnitNotFound(_)
    ));
}

#[test]
fn blank_names_written_behind_the_service_fail_on_read() {
    let conn = open_db_in_memory().unwrap();
    let setup = setup(&conn);
    let work = work(&conn);
    let stored_phase = work
        .create_phase(setup.project.id, phase("Build", 0, 1_000))
        .unwrap();
    let (stored_unit, tasks) = work
        .create_unit(
            stored_phase.id,
            unit("Backend", 500),
            &[NewTask::new("Schema", 300)],
        )
        .unwrap();

    conn.execute(
        "UPDATE tasks SET name = '   ' WHERE id = ?1;",
        [tasks[0].id.to_string()],
    )
    .unwrap();
    assert!(matches!(
        work.get_task(tasks[0].id).unwrap_err(),
        WorkServiceError::Validation(ModelValidationError::BlankField("name"))
    ));
    assert!(matches!(
        work.list_tasks(stored_unit.id).unwrap_err(),
        WorkServiceError::Validation(_)
    ));

    conn.execute(
        "UPDATE units SET name = '' WHERE id = ?1;",
        [stored_unit.id.to_string()],
    )
    .unwrap();
    assert!(matches!(
        work.get_unit(stored_unit.id).unwrap_err(),
        WorkServiceError::Validation(_)
    ));
}
