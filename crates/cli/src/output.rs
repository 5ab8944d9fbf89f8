//! Rendering of command results for the terminal

use chrono::NaiveDateTime;
use tern_migrate::{CommandOutput, MigrationRunResult, MigrationState, MigrationStatus};

const STATUS_HEADER: &str = "    Applied At                  Migration";
const STATUS_RULE: &str = "    =======================================";

/// Render a command result as the lines printed to stdout
pub fn render(output: &CommandOutput) -> String {
    match output {
        CommandOutput::Applied(result) => render_applied(result),
        CommandOutput::Status(statuses) => render_status(statuses),
        CommandOutput::Version(version) => format!("tern: version {}", version),
        CommandOutput::Created(path) => format!("Created new file: {}", path.display()),
    }
}

fn render_applied(result: &MigrationRunResult) -> String {
    if result.applied_migrations.is_empty() {
        return "tern: no migrations to run".to_string();
    }
    format!(
        "tern: ran {} migration(s) in {}ms",
        result.applied_count(),
        result.execution_time_ms
    )
}

pub fn render_status(statuses: &[MigrationStatus]) -> String {
    let mut lines = vec![STATUS_HEADER.to_string(), STATUS_RULE.to_string()];
    for status in statuses {
        let applied_at = match &status.state {
            MigrationState::Applied { applied_at: Some(at) } => format_timestamp(at),
            MigrationState::Applied { applied_at: None } => "Applied".to_string(),
            MigrationState::Pending => "Pending".to_string(),
        };
        lines.push(format!("    {:<24} -- {}_{}", applied_at, status.version, status.name));
    }
    lines.join("\n")
}

/// ANSI C layout, e.g. `Mon Jan  1 12:00:00 2024`
fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}
