//! User management CLI commands.

use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use keyward_auth::{Actor, AuditSink, PasswordHasher, PasswordValidator, StoreAuditSink};
use keyward_core::config::AppConfig;
use keyward_core::error::AppError;
use keyward_core::types::PageRequest;
use keyward_database::CredentialStore;
use keyward_entity::audit::NewAuditLog;
use keyward_entity::history::LoginHistory;
use keyward_entity::role::AssignRole;
use keyward_entity::user::{CreateUser, UpdateProfile, User, UserStatusChange};

/// Arguments for user commands
#[derive(Debug, Args)]
pub struct UserArgs {
    /// User subcommand
    #[command(subcommand)]
    pub command: UserCommand,
}

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// List users, newest first
    List {
        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Page size
        #[arg(long, default_value_t = 25)]
        page_size: u64,
    },
    /// Create a verified user account
    Create {
        /// Email address
        email: String,
        /// Full name
        #[arg(short, long)]
        name: Option<String>,
        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Role slug to grant
        #[arg(short, long)]
        role: Option<String>,
    },
    /// Block a user and revoke their sessions
    Block {
        /// Email address
        email: String,
    },
    /// Unblock a user
    Unblock {
        /// Email address
        email: String,
    },
    /// Deactivate a user and revoke their sessions
    Deactivate {
        /// Email address
        email: String,
    },
    /// Show login attempts, newest first
    History {
        /// Email address
        email: String,
        /// Match attempts by submitted email, including unknown accounts
        #[arg(long)]
        attempts: bool,
        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Page size
        #[arg(long, default_value_t = 25)]
        page_size: u64,
    },
    /// Update profile fields
    Profile {
        /// Email address
        email: String,
        /// Given name
        #[arg(long)]
        first_name: Option<String>,
        /// Family name
        #[arg(long)]
        last_name: Option<String>,
        /// Display name
        #[arg(long)]
        display_name: Option<String>,
        /// Avatar URL
        #[arg(long)]
        avatar: Option<String>,
    },
}

/// User display row for table output
#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    /// User ID
    id: String,
    /// Email
    email: String,
    /// Name
    name: String,
    /// Status
    status: String,
    /// Last login
    last_login: String,
    /// Created at
    created_at: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        let status = if !u.is_active {
            "inactive"
        } else if u.is_blocked {
            "blocked"
        } else {
            "active"
        };
        Self {
            id: u.id.to_string(),
            email: u.email.clone(),
            name: output::or_dash(u.name.as_deref()),
            status: status.to_string(),
            last_login: u
                .last_login_at
                .as_ref()
                .map(output::timestamp)
                .unwrap_or_else(|| "never".to_string()),
            created_at: output::timestamp(&u.created_at),
        }
    }
}

/// Login history display row
#[derive(Debug, Serialize, Tabled)]
struct LoginRow {
    /// Attempted at
    attempted_at: String,
    /// Email as submitted
    email: String,
    /// Outcome
    result: String,
    /// IP Address
    ip: String,
    /// Session ID
    session: String,
}

impl From<&LoginHistory> for LoginRow {
    fn from(h: &LoginHistory) -> Self {
        let result = if h.success {
            "success".to_string()
        } else {
            h.failure_reason.clone().unwrap_or_else(|| "failed".to_string())
        };
        Self {
            attempted_at: output::timestamp(&h.attempted_at),
            email: h.email.clone(),
            result,
            ip: output::or_dash(h.ip_address.as_deref()),
            session: h
                .session_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Execute user commands
pub async fn execute(
    args: &UserArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let (db, store) = super::connect(config).await?;

    match &args.command {
        UserCommand::List { page, page_size } => {
            let users = store
                .list_users(PageRequest::new(*page, *page_size))
                .await?;
            output::print_page(&users, format, |u| UserRow::from(u));
        }
        UserCommand::Create {
            email,
            name,
            password,
            role,
        } => {
            let email = email.trim().to_lowercase();
            if store.find_user_by_email(&email).await?.is_some() {
                return Err(AppError::already_exists(format!(
                    "User '{email}' already exists"
                )));
            }

            let password = match password {
                Some(p) => p.clone(),
                None => dialoguer::Password::new()
                    .with_prompt("Password")
                    .with_confirmation("Confirm password", "Passwords do not match")
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
            };
            PasswordValidator::new(&config.auth).validate(&password)?;
            let password_hash = PasswordHasher::new(&config.auth)?.hash(password).await?;

            let now = Utc::now();
            let user = store
                .create_user(
                    &CreateUser {
                        email: email.clone(),
                        password_hash,
                        name: name.clone(),
                        email_verified: true,
                    },
                    now,
                )
                .await?;
            store.create_profile(user.id, now).await?;

            StoreAuditSink::new(store.clone())
                .record(
                    NewAuditLog::new("user.created", "user")
                        .entity_id(user.id)
                        .values(None, Some(serde_json::json!({ "email": email }))),
                )
                .await;

            if let Some(slug) = role {
                let role = store
                    .find_role_by_slug(slug)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Role '{slug}' not found")))?;
                let service = super::auth_service(config, store.clone())?;
                service
                    .rbac_admin()
                    .assign_role(
                        AssignRole {
                            user_id: user.id,
                            role_id: role.id,
                            expires_at: None,
                        },
                        &Actor::system(),
                    )
                    .await?;
            }

            output::print_success(&format!("User '{}' created ({})", email, user.id));
        }
        UserCommand::Block { email } => {
            apply_status(config, &store, email, UserStatusChange::Block).await?;
        }
        UserCommand::Unblock { email } => {
            apply_status(config, &store, email, UserStatusChange::Unblock).await?;
        }
        UserCommand::Deactivate { email } => {
            apply_status(config, &store, email, UserStatusChange::Deactivate).await?;
        }
        UserCommand::History {
            email,
            attempts,
            page,
            page_size,
        } => {
            let service = super::auth_service(config, store.clone())?;
            let page = PageRequest::new(*page, *page_size);
            let history = if *attempts {
                service.login_attempts(email, page).await?
            } else {
                let user = super::find_user(store.as_ref(), email).await?;
                service.login_history(user.id, page).await?
            };
            output::print_page(&history, format, |h| LoginRow::from(h));
        }
        UserCommand::Profile {
            email,
            first_name,
            last_name,
            display_name,
            avatar,
        } => {
            let user = super::find_user(store.as_ref(), email).await?;
            let profile = super::auth_service(config, store.clone())?
                .update_profile(
                    user.id,
                    UpdateProfile {
                        first_name: first_name.clone(),
                        last_name: last_name.clone(),
                        display_name: display_name.clone(),
                        avatar: avatar.clone(),
                    },
                )
                .await?;

            output::print_success(&format!("Profile of '{}' updated", user.email));
            output::print_kv("First name", &output::or_dash(profile.first_name.as_deref()));
            output::print_kv("Last name", &output::or_dash(profile.last_name.as_deref()));
            output::print_kv("Display name", &output::or_dash(profile.display_name.as_deref()));
            output::print_kv("Avatar", &output::or_dash(profile.avatar.as_deref()));
        }
    }

    db.close().await;
    Ok(())
}

/// Apply a flag change, audit it, and sign the user out when access is withdrawn.
async fn apply_status(
    config: &AppConfig,
    store: &Arc<dyn CredentialStore>,
    email: &str,
    change: UserStatusChange,
) -> Result<(), AppError> {
    let user = super::find_user(store.as_ref(), email).await?;
    store
        .set_user_status(user.id, change, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found(format!("User '{email}' not found")))?;

    StoreAuditSink::new(store.clone())
        .record(NewAuditLog::new(change.audit_action(), "user").entity_id(user.id))
        .await;

    let revoked = match change {
        UserStatusChange::Block | UserStatusChange::Deactivate => {
            super::auth_service(config, store.clone())?
                .force_logout(user.id, &Actor::system(), None)
                .await?
        }
        UserStatusChange::Unblock | UserStatusChange::Reactivate => 0,
    };

    output::print_success(&format!(
        "{} applied to '{}' ({} sessions revoked)",
        change.audit_action(),
        user.email,
        revoked
    ));
    Ok(())
}
