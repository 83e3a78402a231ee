//! Operator probe for the project core.
//!
//! # Responsibility
//! - Verify `projectdesk_core` linkage (ping/version).
//! - Open the configured database and print one progress line per project.
//!
//! Configuration comes from `PROJECTDESK_*` environment variables; see
//! `projectdesk_core::config`.

use projectdesk_core::{
    init_logging, open_db, CoreConfig, ProgressService, ProjectListQuery, ProjectService,
    SqliteProjectRepository, SqliteWorkRepository,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("projectdesk_core ping={}", projectdesk_core::ping());
    println!("projectdesk_core version={}", projectdesk_core::core_version());

    let config = CoreConfig::from_env();
    if let Some(log_dir) = config.log_dir.as_deref() {
        if let Err(err) = init_logging(&config.log_level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match print_overviews(&config) {
        Ok(count) => {
            log::info!("event=cli_overview module=cli status=ok projects={count}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            log::error!("event=cli_overview module=cli status=error");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn print_overviews(config: &CoreConfig) -> Result<usize, String> {
    let conn = open_db(&config.db_path)
        .map_err(|err| format!("failed to open `{}`: {err}", config.db_path.display()))?;
    let projects = ProjectService::new(
        SqliteProjectRepository::try_new(&conn).map_err(|err| err.to_string())?,
    );
    let progress = ProgressService::new(
        SqliteWorkRepository::try_new(&conn).map_err(|err| err.to_string())?,
    );

    println!("db_path={}", config.db_path.display());
    let listed = projects
        .list_projects(&ProjectListQuery::default())
        .map_err(|err| err.to_string())?;
    let count = listed.len();
    for project in listed {
        let overview = progress
            .project_overview(project)
            .map_err(|err| err.to_string())?;
        println!(
            "{} [{}] {:.2}% ({}/{} tasks, ~{}h) {}",
            overview.project.invitation_code,
            status_label(overview.project.status),
            overview.progress.percent(),
            overview.progress.progress.completed_tasks,
            overview.progress.progress.total_tasks,
            overview.total_work_hours,
            overview.project.name
        );
    }
    Ok(count)
}

fn status_label(status: projectdesk_core::ProjectStatus) -> &'static str {
    use projectdesk_core::ProjectStatus;
    match status {
        ProjectStatus::Planning => "planning",
        ProjectStatus::Active => "active",
        ProjectStatus::OnHold => "on_hold",
        ProjectStatus::Completed => "completed",
    }
}
