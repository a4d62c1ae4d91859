//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use keyward_core::config::AppConfig;
use keyward_core::error::AppError;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
    /// Check that the database is reachable
    Check,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    let (db, _) = super::connect(config).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            keyward_database::migration::run_migrations(db.pool()).await?;
            output::print_success("All migrations applied successfully.");
        }
        MigrateCommand::Check => {
            if db.health_check().await? {
                output::print_success("Database is reachable.");
            } else {
                output::print_warning("Database answered unexpectedly.");
            }
        }
    }

    db.close().await;
    Ok(())
}
