//! Role inspection and assignment commands.

use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use keyward_auth::Actor;
use keyward_core::config::AppConfig;
use keyward_core::error::AppError;
use keyward_core::types::PageRequest;
use keyward_database::CredentialStore;
use keyward_entity::role::{AssignRole, Role};

/// Arguments for role commands
#[derive(Debug, Args)]
pub struct RoleArgs {
    /// Role subcommand
    #[command(subcommand)]
    pub command: RoleCommand,
}

/// Role subcommands
#[derive(Debug, Subcommand)]
pub enum RoleCommand {
    /// List roles by level
    List,
    /// Show a role with its permissions
    Show {
        /// Role slug
        slug: String,
    },
    /// Show the effective roles and permissions of a user
    Access {
        /// Email address
        email: String,
    },
    /// Grant a role to a user
    Assign {
        /// Email address
        email: String,
        /// Role slug
        slug: String,
        /// Expire the grant after this many days
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// Withdraw a role from a user
    Revoke {
        /// Email address
        email: String,
        /// Role slug
        slug: String,
    },
}

/// Role display row
#[derive(Debug, Serialize, Tabled)]
struct RoleRow {
    /// Slug
    slug: String,
    /// Name
    name: String,
    /// Level
    level: i32,
    /// Active
    active: String,
    /// System
    system: String,
}

impl From<&Role> for RoleRow {
    fn from(r: &Role) -> Self {
        Self {
            slug: r.slug.clone(),
            name: r.name.clone(),
            level: r.level,
            active: if r.is_active { "✓" } else { "✗" }.to_string(),
            system: if r.is_system { "✓" } else { "✗" }.to_string(),
        }
    }
}

/// Execute role commands
pub async fn execute(
    args: &RoleArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let (db, store) = super::connect(config).await?;
    let service = super::auth_service(config, store.clone())?;
    let admin = service.rbac_admin();

    match &args.command {
        RoleCommand::List => {
            let roles = admin.list_roles(PageRequest::new(1, 100)).await?;
            output::print_page(&roles, format, |r| RoleRow::from(r));
        }
        RoleCommand::Show { slug } => {
            let role = find_role(store.as_ref(), slug).await?;
            let details = admin.get_role(role.id).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&details)?),
                OutputFormat::Table => {
                    output::print_kv("Name", &details.role.name);
                    output::print_kv("Slug", &details.role.slug);
                    output::print_kv("Level", &details.role.level.to_string());
                    output::print_kv(
                        "Description",
                        &output::or_dash(details.role.description.as_deref()),
                    );
                    output::print_kv("Users", &details.user_count.to_string());
                    output::print_kv("Permissions", &details.permissions.join(", "));
                }
            }
        }
        RoleCommand::Access { email } => {
            let user = super::find_user(store.as_ref(), email).await?;
            let access = service.rbac().get_user_access(user.id).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&access)?),
                OutputFormat::Table => {
                    output::print_kv("User", &user.email);
                    output::print_kv("Roles", &access.roles.join(", "));
                    let permissions: Vec<&str> =
                        access.permissions.iter().map(String::as_str).collect();
                    output::print_kv("Permissions", &permissions.join(", "));
                }
            }
        }
        RoleCommand::Assign {
            email,
            slug,
            expires_in_days,
        } => {
            let user = super::find_user(store.as_ref(), email).await?;
            let role = find_role(store.as_ref(), slug).await?;
            let input = AssignRole {
                user_id: user.id,
                role_id: role.id,
                expires_at: expires_in_days.map(|days| Utc::now() + Duration::days(days)),
            };
            admin.assign_role(input, &Actor::system()).await?;
            output::print_success(&format!("Role '{}' granted to '{}'", role.slug, user.email));
        }
        RoleCommand::Revoke { email, slug } => {
            let user = super::find_user(store.as_ref(), email).await?;
            let role = find_role(store.as_ref(), slug).await?;
            admin.revoke_role(user.id, role.id, &Actor::system()).await?;
            output::print_success(&format!(
                "Role '{}' revoked from '{}'",
                role.slug, user.email
            ));
        }
    }

    db.close().await;
    Ok(())
}

async fn find_role(store: &dyn CredentialStore, slug: &str) -> Result<Role, AppError> {
    store
        .find_role_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Role '{slug}' not found")))
}
