use projectdesk_core::db::open_db_in_memory;
use projectdesk_core::{
    ConflictKind, InvitationCodeSource, JoinOutcome, ModelValidationError, NewProject,
    ProjectListQuery, ProjectPatch, ProjectPriority, ProjectRole, ProjectService,
    ProjectServiceError, ProjectSort, ProjectStatus, SqliteProjectRepository,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::collections::HashSet;
use uuid::Uuid;

/// Hands out the given codes in order, repeating the last one.
struct ScriptedCodes {
    codes: Vec<&'static str>,
    next: Cell<usize>,
}

impl ScriptedCodes {
    fn new(codes: Vec<&'static str>) -> Self {
        Self {
            codes,
            next: Cell::new(0),
        }
    }
}

impl InvitationCodeSource for ScriptedCodes {
    fn next_code(&self) -> String {
        let index = self.next.get();
        self.next.set(index + 1);
        self.codes[index.min(self.codes.len() - 1)].to_string()
    }
}

fn service(conn: &Connection) -> ProjectService<SqliteProjectRepository<'_>> {
    ProjectService::new(SqliteProjectRepository::try_new(conn).unwrap())
}

fn member_rows(conn: &Connection, project_id: Uuid) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM project_members WHERE project_id = ?1;",
        [project_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn create_project_makes_owner_the_only_manager() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();

    let project = projects
        .create_project(owner.id, NewProject::new("  Apollo  ", 1_700_000_000_000))
        .unwrap();

    assert_eq!(project.name, "Apollo");
    assert_eq!(project.responsible_user_id, owner.id);
    assert_eq!(project.priority, ProjectPriority::Medium);
    assert_eq!(project.status, ProjectStatus::Planning);
    assert_eq!(project.invitation_code.len(), 10);
    assert!(project
        .invitation_code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert!(project.created_at > 0);

    let members = projects.list_members(project.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, owner.id);
    assert_eq!(members[0].role, ProjectRole::Manager);
}

#[test]
fn generated_invitation_codes_are_distinct() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();

    let codes: HashSet<String> = (0..20)
        .map(|i| {
            projects
                .create_project(owner.id, NewProject::new(format!("Project {i}"), 0))
                .unwrap()
                .invitation_code
        })
        .collect();
    assert_eq!(codes.len(), 20);
}

#[test]
fn create_project_retries_on_invitation_code_collision() {
    let conn = open_db_in_memory().unwrap();
    let first = ProjectService::with_code_source(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        ScriptedCodes::new(vec!["AAAAAAAAAA"]),
    );
    let owner = first.create_user("ada").unwrap();
    first
        .create_project(owner.id, NewProject::new("First", 0))
        .unwrap();

    let codes = ScriptedCodes::new(vec!["AAAAAAAAAA", "AAAAAAAAAA", "BBBBBBBBBB"]);
    let second =
        ProjectService::with_code_source(SqliteProjectRepository::try_new(&conn).unwrap(), codes);
    let project = second
        .create_project(owner.id, NewProject::new("Second", 0))
        .unwrap();

    assert_eq!(project.invitation_code, "BBBBBBBBBB");
    assert_eq!(member_rows(&conn, project.id), 1);
}

#[test]
fn create_project_gives_up_after_bounded_attempts() {
    let conn = open_db_in_memory().unwrap();
    let first = ProjectService::with_code_source(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        ScriptedCodes::new(vec!["TAKEN00000"]),
    );
    let owner = first.create_user("ada").unwrap();
    first
        .create_project(owner.id, NewProject::new("First", 0))
        .unwrap();

    let second = ProjectService::with_code_source(
        SqliteProjectRepository::try_new(&conn).unwrap(),
        ScriptedCodes::new(vec!["TAKEN00000"]),
    );
    let err = second
        .create_project(owner.id, NewProject::new("Second", 0))
        .unwrap_err();
    assert!(matches!(
        err,
        ProjectServiceError::InvitationCodeExhausted { attempts: 8 }
    ));

    let projects: i64 = conn
        .query_row("SELECT COUNT(*) FROM projects;", [], |row| row.get(0))
        .unwrap();
    let members: i64 = conn
        .query_row("SELECT COUNT(*) FROM project_members;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(projects, 1);
    assert_eq!(members, 1);
}

#[test]
fn create_project_rejects_blank_name_and_unknown_owner() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();

    let err = projects
        .create_project(owner.id, NewProject::new("   ", 0))
        .unwrap_err();
    assert!(matches!(
        err,
        ProjectServiceError::Validation(ModelValidationError::BlankField("name"))
    ));

    let ghost = Uuid::new_v4();
    let err = projects
        .create_project(ghost, NewProject::new("Ghost", 0))
        .unwrap_err();
    assert!(matches!(err, ProjectServiceError::UserNotFound(id) if id == ghost));
}

#[test]
fn join_with_valid_code_adds_worker_membership() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();
    let joiner = projects.create_user("grace").unwrap();
    let project = projects
        .create_project(owner.id, NewProject::new("Apollo", 0))
        .unwrap();

    let code = format!("  {}  ", project.invitation_code.to_lowercase());
    let outcome = projects.join_project(joiner.id, &code).unwrap();

    assert!(outcome.is_new_member());
    assert_eq!(outcome.member().user_id, joiner.id);
    assert_eq!(outcome.member().role, ProjectRole::Worker);
    assert_eq!(member_rows(&conn, project.id), 2);
}

#[test]
fn rejoining_is_a_no_op_that_keeps_the_role() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();
    let joiner = projects.create_user("grace").unwrap();
    let project = projects
        .create_project(owner.id, NewProject::new("Apollo", 0))
        .unwrap();

    projects
        .join_project(joiner.id, &project.invitation_code)
        .unwrap();
    projects
        .set_member_role(project.id, joiner.id, ProjectRole::Stakeholder)
        .unwrap();

    let outcome = projects
        .join_project(joiner.id, &project.invitation_code)
        .unwrap();
    match outcome {
        JoinOutcome::AlreadyMember(member) => assert_eq!(member.role, ProjectRole::Stakeholder),
        JoinOutcome::Joined(_) => panic!("second join must not create a membership"),
    }

    let owner_outcome = projects
        .join_project(owner.id, &project.invitation_code)
        .unwrap();
    assert_eq!(owner_outcome.member().role, ProjectRole::Manager);
    assert_eq!(member_rows(&conn, project.id), 2);
}

#[test]
fn join_with_unknown_or_malformed_code_fails() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let user = projects.create_user("grace").unwrap();

    let err = projects.join_project(user.id, "ZZZZZZZZZZ").unwrap_err();
    assert!(matches!(err, ProjectServiceError::InvitationNotFound(code) if code == "ZZZZZZZZZZ"));

    let err = projects.join_project(user.id, "short").unwrap_err();
    assert!(matches!(err, ProjectServiceError::InvitationNotFound(code) if code == "SHORT"));

    let err = projects.join_project(user.id, " nope ").unwrap_err();
    assert!(matches!(err, ProjectServiceError::InvitationNotFound(code) if code == "NOPE"));

    let err = projects.preview_invitation("not-a-code").unwrap_err();
    assert!(matches!(err, ProjectServiceError::InvitationNotFound(_)));
}

#[test]
fn preview_shows_project_and_responsible_username() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();
    let project = projects
        .create_project(owner.id, NewProject::new("Apollo", 0))
        .unwrap();

    let preview = projects
        .preview_invitation(&project.invitation_code.to_lowercase())
        .unwrap();
    assert_eq!(preview.project_id, project.id);
    assert_eq!(preview.project_name, "Apollo");
    assert_eq!(preview.responsible_username, "ada");

    let json = serde_json::to_value(&preview).unwrap();
    assert_eq!(json["responsible_username"], "ada");
}

#[test]
fn duplicate_username_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    projects.create_user("ada").unwrap();

    let err = projects.create_user("ada").unwrap_err();
    assert!(matches!(
        err,
        ProjectServiceError::Conflict(ConflictKind::Username)
    ));
}

#[test]
fn owner_cannot_be_demoted_or_removed() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();
    let project = projects
        .create_project(owner.id, NewProject::new("Apollo", 0))
        .unwrap();

    let err = projects
        .set_member_role(project.id, owner.id, ProjectRole::Worker)
        .unwrap_err();
    assert!(matches!(err, ProjectServiceError::OwnerMustStayManager(_)));
    let err = projects.remove_member(project.id, owner.id).unwrap_err();
    assert!(matches!(err, ProjectServiceError::OwnerMustStayManager(_)));
}

#[test]
fn remove_member_and_missing_member_errors() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();
    let joiner = projects.create_user("grace").unwrap();
    let project = projects
        .create_project(owner.id, NewProject::new("Apollo", 0))
        .unwrap();
    projects
        .join_project(joiner.id, &project.invitation_code)
        .unwrap();

    projects.remove_member(project.id, joiner.id).unwrap();
    assert_eq!(member_rows(&conn, project.id), 1);

    let err = projects.remove_member(project.id, joiner.id).unwrap_err();
    assert!(matches!(err, ProjectServiceError::MemberNotFound { .. }));
    let err = projects
        .set_member_role(project.id, joiner.id, ProjectRole::Manager)
        .unwrap_err();
    assert!(matches!(err, ProjectServiceError::MemberNotFound { .. }));
}

#[test]
fn update_project_only_changes_provided_fields() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let owner = projects.create_user("ada").unwrap();
    let mut request = NewProject::new("Apollo", 1_000);
    request.description = "moon".to_string();
    let project = projects.create_project(owner.id, request).unwrap();

    let patch = ProjectPatch {
        name: Some("   ".to_string()),
        status: Some(ProjectStatus::Active),
        priority: Some(ProjectPriority::High),
        ..ProjectPatch::default()
    };
    let updated = projects.update_project(project.id, &patch).unwrap();

    assert_eq!(updated.name, "Apollo");
    assert_eq!(updated.description, "moon");
    assert_eq!(updated.deadline, 1_000);
    assert_eq!(updated.status, ProjectStatus::Active);
    assert_eq!(updated.priority, ProjectPriority::High);
    assert_eq!(updated.invitation_code, project.invitation_code);

    let unchanged = projects
        .update_project(project.id, &ProjectPatch::default())
        .unwrap();
    assert_eq!(unchanged, updated);

    let ghost = Uuid::new_v4();
    let err = projects.update_project(ghost, &patch).unwrap_err();
    assert!(matches!(err, ProjectServiceError::ProjectNotFound(id) if id == ghost));
}

#[test]
fn list_projects_supports_search_member_filter_sort_and_paging() {
    let conn = open_db_in_memory().unwrap();
    let projects = service(&conn);
    let ada = projects.create_user("ada").unwrap();
    let grace = projects.create_user("grace").unwrap();

    let zeta = projects
        .create_project(ada.id, NewProject::new("Zeta rollout", 0))
        .unwrap();
    let alpha = projects
        .create_project(ada.id, NewProject::new("alpha launch", 0))
        .unwrap();
    let beta = projects
        .create_project(grace.id, NewProject::new("Beta_50% launch", 0))
        .unwrap();

    let newest = projects.list_projects(&ProjectListQuery::default()).unwrap();
    let ids: Vec<Uuid> = newest.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![beta.id, alpha.id, zeta.id]);

    let by_name = projects
        .list_projects(&ProjectListQuery {
            sort: ProjectSort::Name,
            ..ProjectListQuery::default()
        })
        .unwrap();
    let names: Vec<&str> = by_name.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["alpha launch", "Beta_50% launch", "Zeta rollout"]);

    let search = projects
        .list_projects(&ProjectListQuery {
            search: Some("LAUNCH".to_string()),
            sort: ProjectSort::Created,
            ..ProjectListQuery::default()
        })
        .unwrap();
    let ids: Vec<Uuid> = search.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![alpha.id, beta.id]);

    let literal = projects
        .list_projects(&ProjectListQuery {
            search: Some("_50%".to_string()),
            ..ProjectListQuery::default()
        })
        .unwrap();
    assert_eq!(literal.len(), 1);
    assert_eq!(literal[0].id, beta.id);

    let mine = projects
        .list_projects(&ProjectListQuery {
            member: Some(grace.id),
            ..ProjectListQuery::default()
        })
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, beta.id);

    let page = projects
        .list_projects(&ProjectListQuery {
            sort: ProjectSort::Created,
            limit: Some(1),
            offset: 1,
            ..ProjectListQuery::default()
        })
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, alpha.id);
}
