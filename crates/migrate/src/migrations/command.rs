//! Command dispatch
//!
//! Maps a command word plus arguments onto the runner, for binaries that
//! embed their own migrations.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use super::definitions::{MigrationRunResult, MigrationStatus};
use super::manager::MigrationManager;
use super::runner::MigrationRunner;
use crate::error::{MigrateError, MigrateResult};

/// A migration command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Up,
    UpByOne,
    UpTo(i64),
    Down,
    DownTo(i64),
    Redo,
    Reset,
    Status,
    Version,
    Create(String),
}

impl Command {
    /// Parse a command word and its arguments
    pub fn parse<S: AsRef<str>>(command: &str, args: &[S]) -> MigrateResult<Self> {
        let first = args.first().map(|arg| arg.as_ref());

        match command {
            "up" => Ok(Command::Up),
            "up-by-one" => Ok(Command::UpByOne),
            "up-to" => {
                let arg = first.ok_or_else(|| usage("up-to", "VERSION"))?;
                Ok(Command::UpTo(parse_version(arg)?))
            }
            "down" => Ok(Command::Down),
            "down-to" => {
                let arg = first.ok_or_else(|| usage("down-to", "VERSION"))?;
                Ok(Command::DownTo(parse_version(arg)?))
            }
            "redo" => Ok(Command::Redo),
            "reset" => Ok(Command::Reset),
            "status" => Ok(Command::Status),
            "version" => Ok(Command::Version),
            "create" => {
                let name = first.ok_or_else(|| usage("create", "NAME"))?;
                Ok(Command::Create(name.to_string()))
            }
            other => Err(MigrateError::UnknownCommand(other.to_string())),
        }
    }

    /// Whether the command needs a database connection
    pub fn needs_database(&self) -> bool {
        !matches!(self, Command::Create(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Up => write!(f, "up"),
            Command::UpByOne => write!(f, "up-by-one"),
            Command::UpTo(version) => write!(f, "up-to {}", version),
            Command::Down => write!(f, "down"),
            Command::DownTo(version) => write!(f, "down-to {}", version),
            Command::Redo => write!(f, "redo"),
            Command::Reset => write!(f, "reset"),
            Command::Status => write!(f, "status"),
            Command::Version => write!(f, "version"),
            Command::Create(name) => write!(f, "create {}", name),
        }
    }
}

/// What a command produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommandOutput {
    Applied(MigrationRunResult),
    Status(Vec<MigrationStatus>),
    Version(i64),
    Created(PathBuf),
}

/// Run a command against the runner, or the manager for scaffolding
pub async fn run(
    command: &Command,
    runner: &MigrationRunner,
    manager: &MigrationManager,
) -> MigrateResult<CommandOutput> {
    tracing::debug!(%command, "running migration command");

    let output = match command {
        Command::Up => CommandOutput::Applied(runner.up().await?),
        Command::UpByOne => CommandOutput::Applied(runner.up_by_one().await?),
        Command::UpTo(version) => CommandOutput::Applied(runner.up_to(*version).await?),
        Command::Down => CommandOutput::Applied(runner.down().await?),
        Command::DownTo(version) => CommandOutput::Applied(runner.down_to(*version).await?),
        Command::Redo => CommandOutput::Applied(runner.redo().await?),
        Command::Reset => CommandOutput::Applied(runner.reset().await?),
        Command::Status => CommandOutput::Status(runner.status().await?),
        Command::Version => CommandOutput::Version(runner.version().await?),
        Command::Create(name) => CommandOutput::Created(manager.create_migration(name)?),
    };
    Ok(output)
}

fn parse_version(arg: &str) -> MigrateResult<i64> {
    arg.parse()
        .map_err(|_| MigrateError::InvalidVersion(arg.to_string()))
}

fn usage(command: &str, argument: &str) -> MigrateError {
    MigrateError::Usage(format!(
        "{} must be of form: tern [OPTIONS] {} {}",
        command, command, argument
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ARGS: [&str; 0] = [];

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("up", &NO_ARGS).unwrap(), Command::Up);
        assert_eq!(Command::parse("up-by-one", &NO_ARGS).unwrap(), Command::UpByOne);
        assert_eq!(Command::parse("down", &NO_ARGS).unwrap(), Command::Down);
        assert_eq!(Command::parse("redo", &NO_ARGS).unwrap(), Command::Redo);
        assert_eq!(Command::parse("reset", &NO_ARGS).unwrap(), Command::Reset);
        assert_eq!(Command::parse("status", &NO_ARGS).unwrap(), Command::Status);
        assert_eq!(Command::parse("version", &NO_ARGS).unwrap(), Command::Version);
    }

    #[test]
    fn test_parse_versioned_commands() {
        assert_eq!(Command::parse("up-to", &["42"]).unwrap(), Command::UpTo(42));
        assert_eq!(
            Command::parse("down-to", &["20240101120000"]).unwrap(),
            Command::DownTo(20240101120000)
        );
        assert!(matches!(
            Command::parse("up-to", &["latest"]),
            Err(MigrateError::InvalidVersion(v)) if v == "latest"
        ));
        assert!(matches!(Command::parse("down-to", &NO_ARGS), Err(MigrateError::Usage(_))));
    }

    #[test]
    fn test_parse_create() {
        assert_eq!(
            Command::parse("create", &["add_users"]).unwrap(),
            Command::Create("add_users".to_string())
        );
        assert!(!Command::Create("x".to_string()).needs_database());
        assert!(Command::Status.needs_database());
        assert!(Command::parse("create", &NO_ARGS).is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::parse("sideways", &NO_ARGS).unwrap_err();
        assert_eq!(err.to_string(), "\"sideways\": no such command");
    }
}
