//! Session management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat};
use keyward_auth::{Actor, AuditSink, StoreAuditSink};
use keyward_core::config::AppConfig;
use keyward_core::error::AppError;
use keyward_core::types::PageRequest;
use keyward_entity::audit::NewAuditLog;
use keyward_entity::session::{RevokeReason, Session};

/// Arguments for session commands
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Session subcommand
    #[command(subcommand)]
    pub command: SessionCommand,
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// List sessions, newest first
    List {
        /// Only sessions of this user
        #[arg(short, long)]
        user: Option<String>,
        /// Include revoked and expired sessions
        #[arg(long)]
        all: bool,
        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u64,
        /// Page size
        #[arg(long, default_value_t = 25)]
        page_size: u64,
    },
    /// Revoke a specific session
    Revoke {
        /// Session ID
        id: String,
        /// Recorded revocation reason
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Revoke every session of a user
    RevokeAll {
        /// Email address
        email: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

/// Session display row
#[derive(Debug, Serialize, Tabled)]
struct SessionRow {
    /// Session ID
    id: String,
    /// User ID
    user_id: String,
    /// Device
    device: String,
    /// IP Address
    ip: String,
    /// Activity count
    activity: i32,
    /// Last Activity
    last_activity: String,
    /// Expires
    expires: String,
    /// State
    state: String,
}

impl From<&Session> for SessionRow {
    fn from(s: &Session) -> Self {
        let state = if s.is_revoked {
            s.revoked_reason.as_deref().unwrap_or("revoked")
        } else if s.is_active {
            "active"
        } else {
            "inactive"
        };
        Self {
            id: s.id.to_string(),
            user_id: s.user_id.to_string()[..8].to_string(),
            device: output::or_dash(s.device_name.as_deref()),
            ip: output::or_dash(s.last_activity_ip.as_deref().or(s.ip_address.as_deref())),
            activity: s.activity_count,
            last_activity: output::timestamp(&s.last_activity_at),
            expires: output::timestamp(&s.expires_at),
            state: state.to_string(),
        }
    }
}

/// Execute session commands
pub async fn execute(
    args: &SessionArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let (db, store) = super::connect(config).await?;
    let service = super::auth_service(config, store.clone())?;

    match &args.command {
        SessionCommand::List {
            user,
            all,
            page,
            page_size,
        } => {
            let user_id = match user {
                Some(email) => Some(super::find_user(store.as_ref(), email).await?.id),
                None => None,
            };
            let sessions = service
                .sessions()
                .list_all_sessions(user_id, !all, PageRequest::new(*page, *page_size))
                .await?;
            output::print_page(&sessions, format, |s| SessionRow::from(s));
        }
        SessionCommand::Revoke { id, reason } => {
            let sid = Uuid::parse_str(id)
                .map_err(|e| AppError::validation(format!("Invalid UUID: {e}")))?;
            let reason = reason
                .as_deref()
                .unwrap_or(RevokeReason::SessionRevoked.as_str());

            if service.sessions().revoke(sid, None, reason).await? {
                StoreAuditSink::new(store.clone())
                    .record(
                        NewAuditLog::new("session.revoked", "session")
                            .entity_id(sid)
                            .values(None, Some(serde_json::json!({ "reason": reason }))),
                    )
                    .await;
                output::print_success(&format!("Session {id} revoked"));
            } else {
                output::print_warning(&format!("Session {id} is unknown or already revoked"));
            }
        }
        SessionCommand::RevokeAll { email, force } => {
            let user = super::find_user(store.as_ref(), email).await?;
            let prompt = format!("Revoke ALL sessions of '{}'?", user.email);
            if !super::confirm(&prompt, *force)? {
                println!("Cancelled.");
                return Ok(());
            }

            let count = service
                .force_logout(user.id, &Actor::system(), None)
                .await?;
            output::print_success(&format!("Revoked {count} sessions"));
        }
    }

    db.close().await;
    Ok(())
}
