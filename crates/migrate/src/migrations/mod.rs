//! Migration System
//!
//! Registry and sequencer decide *what* to run, the version store knows
//! *where* the database is, the executor runs one migration atomically and
//! the runner drives whole commands.

pub mod command;
pub mod definitions;
pub mod dialect;
pub mod executor;
pub mod manager;
pub mod registry;
pub mod runner;
pub mod sequencer;
mod statements;
pub mod store;

pub use command::{Command, CommandOutput};
pub use definitions::*;
pub use dialect::{Dialect, DialectKind, DEFAULT_TABLE_NAME};
pub use manager::MigrationManager;
pub use registry::Registry;
pub use runner::MigrationRunner;
pub use sequencer::Migrations;
pub use store::VersionStore;
