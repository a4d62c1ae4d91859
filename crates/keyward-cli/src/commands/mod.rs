//! CLI command definitions and dispatch.

pub mod cleanup;
pub mod migrate;
pub mod role;
pub mod seed;
pub mod session;
pub mod user;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use keyward_auth::AuthService;
use keyward_core::config::AppConfig;
use keyward_core::error::AppError;
use keyward_database::{CredentialStore, DatabasePool};
use keyward_entity::user::User;

/// Keyward credential and access administration
#[derive(Debug, Parser)]
#[command(name = "keyward", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment overlay (config/{env}.toml)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Create the system roles and permissions
    Seed,
    /// User account management
    User(user::UserArgs),
    /// Role assignment
    Role(role::RoleArgs),
    /// Session management
    Session(session::SessionArgs),
    /// Expire stale sessions and purge the token blacklist
    Cleanup(cleanup::CleanupArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Seed => seed::execute(&config).await,
            Commands::User(args) => user::execute(args, &config, self.format).await,
            Commands::Role(args) => role::execute(args, &config, self.format).await,
            Commands::Session(args) => session::execute(args, &config, self.format).await,
            Commands::Cleanup(args) => cleanup::execute(args, &config).await,
        }
    }
}

/// Helper: connect to the database and wrap the pool as a credential store
pub async fn connect(
    config: &AppConfig,
) -> Result<(DatabasePool, Arc<dyn CredentialStore>), AppError> {
    let db = DatabasePool::connect(&config.database).await?;
    let store: Arc<dyn CredentialStore> = Arc::new(db.store());
    Ok((db, store))
}

/// Helper: build the auth service over a store
pub fn auth_service(
    config: &AppConfig,
    store: Arc<dyn CredentialStore>,
) -> Result<AuthService, AppError> {
    AuthService::new(store, config.auth.clone(), config.session.clone())
}

/// Helper: resolve a user by email
pub async fn find_user(store: &dyn CredentialStore, email: &str) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User '{email}' not found")))
}

/// Helper: ask for confirmation unless `force` is set
pub fn confirm(prompt: &str, force: bool) -> Result<bool, AppError> {
    if force {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))
}
