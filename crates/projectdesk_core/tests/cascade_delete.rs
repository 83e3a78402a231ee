use projectdesk_core::db::open_db_in_memory;
use projectdesk_core::{
    NewPhase, NewProject, NewTask, NewUnit, NotificationService, ProjectService,
    ProjectServiceError, SqliteNotificationRepository, SqliteProjectRepository,
    SqliteWorkRepository, WorkService, WorkServiceError,
};
use rusqlite::Connection;

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn phase(name: &str) -> NewPhase {
    NewPhase {
        name: name.to_string(),
        description: String::new(),
        start_at: 0,
        end_at: 10,
    }
}

fn unit(name: &str) -> NewUnit {
    NewUnit {
        name: name.to_string(),
        description: String::new(),
        deadline: 0,
    }
}

#[test]
fn deleting_project_removes_everything_under_it() {
    let conn = open_db_in_memory().unwrap();
    let projects = ProjectService::new(SqliteProjectRepository::try_new(&conn).unwrap());
    let work = WorkService::new(SqliteWorkRepository::try_new(&conn).unwrap());
    let notifications =
        NotificationService::new(SqliteNotificationRepository::try_new(&conn).unwrap());

    let owner = projects.create_user("ada").unwrap();
    let worker = projects.create_user("grace").unwrap();
    let doomed = projects
        .create_project(owner.id, NewProject::new("Doomed", 0))
        .unwrap();
    let kept = projects
        .create_project(owner.id, NewProject::new("Kept", 0))
        .unwrap();
    projects
        .join_project(worker.id, &doomed.invitation_code)
        .unwrap();

    for project in [&doomed, &kept] {
        let stored_phase = work.create_phase(project.id, phase("Build")).unwrap();
        let (stored_unit, _) = work
            .create_unit(stored_phase.id, unit("Backend"), &[NewTask::new("Plain", 0)])
            .unwrap();
        work.create_task(stored_unit.id, NewTask::new("Owned", 0), Some(owner.id))
            .unwrap();
        notifications.notify_invitation(worker.id, project.id).unwrap();
    }

    assert_eq!(count(&conn, "phases"), 2);
    assert_eq!(count(&conn, "tasks"), 4);
    assert_eq!(count(&conn, "task_assignments"), 2);
    assert_eq!(count(&conn, "project_members"), 3);
    assert_eq!(count(&conn, "notifications"), 2);

    projects.delete_project(doomed.id).unwrap();

    assert_eq!(count(&conn, "projects"), 1);
    assert_eq!(count(&conn, "phases"), 1);
    assert_eq!(count(&conn, "units"), 1);
    assert_eq!(count(&conn, "tasks"), 2);
    assert_eq!(count(&conn, "task_assignments"), 1);
    assert_eq!(count(&conn, "project_members"), 1);
    assert_eq!(count(&conn, "notifications"), 1);
    assert_eq!(count(&conn, "users"), 2);

    assert!(matches!(
        projects.get_project(doomed.id).unwrap_err(),
        ProjectServiceError::ProjectNotFound(_)
    ));
    assert!(matches!(
        projects.delete_project(doomed.id).unwrap_err(),
        ProjectServiceError::ProjectNotFound(_)
    ));
}

#[test]
fn deleting_phase_removes_units_tasks_and_assignments() {
    let conn = open_db_in_memory().unwrap();
    let projects = ProjectService::new(SqliteProjectRepository::try_new(&conn).unwrap());
    let work = WorkService::new(SqliteWorkRepository::try_new(&conn).unwrap());

    let owner = projects.create_user("ada").unwrap();
    let project = projects
        .create_project(owner.id, NewProject::new("Apollo", 0))
        .unwrap();
    let stored_phase = work.create_phase(project.id, phase("Build")).unwrap();
    let (stored_unit, _) = work
        .create_unit(stored_phase.id, unit("Backend"), &[NewTask::new("A", 0)])
        .unwrap();
    work.create_task(stored_unit.id, NewTask::new("B", 0), Some(owner.id))
        .unwrap();

    work.delete_phase(stored_phase.id).unwrap();

    assert_eq!(count(&conn, "units"), 0);
    assert_eq!(count(&conn, "tasks"), 0);
    assert_eq!(count(&conn, "task_assignments"), 0);
    assert_eq!(count(&conn, "project_members"), 1);
    assert!(matches!(
        work.get_unit(stored_unit.id).unwrap_err(),
        WorkServiceError::UnitNotFound(_)
    ));
}
