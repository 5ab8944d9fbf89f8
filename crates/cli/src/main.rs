mod logging;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;

use tern_migrate::command::{self, Command, CommandOutput};
use tern_migrate::{
    BoxError, MigrateError, MigrateResult, MigrationConfig, MigrationManager, MigrationRunner,
    Registry,
};

use logging::{init_logging, LoggingConfig};

#[derive(Parser)]
#[command(name = "tern")]
#[command(about = "Apply, roll back and inspect database schema migrations")]
#[command(version)]
struct Cli {
    /// Database connection URL (falls back to DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// SQL dialect: postgres, mysql, sqlite3 or redshift (falls back to TERN_DIALECT)
    #[arg(long, global = true)]
    dialect: Option<String>,

    /// Directory holding migration files (falls back to TERN_MIGRATIONS_DIR)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Version ledger table (falls back to TERN_TABLE)
    #[arg(long, global = true)]
    table: Option<String>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the database to the most recent version available
    Up,

    /// Migrate the database up by one version
    UpByOne,

    /// Migrate the database to a specific version
    UpTo {
        /// Target version
        version: Option<String>,
    },

    /// Roll back the version by one
    Down,

    /// Roll back to a specific version
    DownTo {
        /// Target version
        version: Option<String>,
    },

    /// Re-run the latest migration
    Redo,

    /// Roll back all migrations
    Reset,

    /// Dump the migration status for the current database
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the current version of the database
    Version,

    /// Create a new SQL migration file
    Create {
        /// Migration name
        name: Option<String>,
    },

    #[command(external_subcommand)]
    Other(Vec<String>),
}

impl Commands {
    /// Resolve through `Command::parse` so argument errors read the same as
    /// for embedded binaries
    fn to_command(&self) -> MigrateResult<Command> {
        let (word, args): (&str, Vec<String>) = match self {
            Commands::Up => ("up", Vec::new()),
            Commands::UpByOne => ("up-by-one", Vec::new()),
            Commands::UpTo { version } => ("up-to", version.iter().cloned().collect()),
            Commands::Down => ("down", Vec::new()),
            Commands::DownTo { version } => ("down-to", version.iter().cloned().collect()),
            Commands::Redo => ("redo", Vec::new()),
            Commands::Reset => ("reset", Vec::new()),
            Commands::Status { .. } => ("status", Vec::new()),
            Commands::Version => ("version", Vec::new()),
            Commands::Create { name } => ("create", name.iter().cloned().collect()),
            Commands::Other(words) => match words.split_first() {
                Some((word, rest)) => (word.as_str(), rest.to_vec()),
                None => ("", Vec::new()),
            },
        };
        Command::parse(word, &args)
    }
}

impl Cli {
    /// Environment configuration with command line flags laid over it
    fn config(&self) -> MigrateResult<MigrationConfig> {
        let mut config = MigrationConfig::from_env()?;

        if let Some(dir) = &self.dir {
            config = config.with_migrations_dir(dir.clone());
        }
        if let Some(table) = &self.table {
            config = config.with_table_name(table.clone());
        }
        if let Some(dialect) = &self.dialect {
            config = config.with_dialect(dialect.parse()?);
        }
        if let Some(url) = &self.database_url {
            config = config.with_database_url(url.clone());
        }

        config.dialect()?;
        Ok(config)
    }

    fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::default()
            .with_level(self.log_level.clone())
            .with_json(self.log_json)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.logging_config()) {
        eprintln!("tern: failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        eprintln!("tern: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let config = cli.config()?;
    let manager = MigrationManager::with_config(config.clone());
    let command = cli.command.to_command()?;

    if !command.needs_database() {
        let output = match &command {
            Command::Create(name) => CommandOutput::Created(manager.create_migration(name)?),
            other => return Err(MigrateError::UnknownCommand(other.to_string()).into()),
        };
        println!("{}", output::render(&output));
        return Ok(());
    }

    let database_url = config.database_url.clone().ok_or_else(|| {
        MigrateError::configuration("no database url: pass --database-url or set DATABASE_URL")
    })?;

    let mut registry = Registry::new();
    let loaded = manager.register_all(&mut registry)?;
    debug!(
        loaded,
        dir = %config.migrations_dir.display(),
        "loaded migration files"
    );

    let runner = MigrationRunner::from_url(registry, &database_url, config.dialect()?).await?;
    let output = command::run(&command, &runner, &manager).await?;

    match (&cli.command, &output) {
        (Commands::Status { json: true }, CommandOutput::Status(statuses)) => {
            println!("{}", serde_json::to_string_pretty(statuses)?);
        }
        _ => println!("{}", output::render(&output)),
    }
    Ok(())
}
