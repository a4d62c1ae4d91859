//! Session and blacklist maintenance command.

use std::time::Duration;

use clap::Args;

use crate::output;
use keyward_auth::SessionCleanup;
use keyward_core::config::AppConfig;
use keyward_core::error::AppError;

/// Arguments for the cleanup command
#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Keep running on the configured interval until interrupted
    #[arg(long)]
    pub watch: bool,
}

/// Execute the cleanup command
pub async fn execute(args: &CleanupArgs, config: &AppConfig) -> Result<(), AppError> {
    let (db, store) = super::connect(config).await?;
    let cleanup = SessionCleanup::new(store);

    if args.watch {
        let interval = Duration::from_secs(config.session.cleanup_interval_minutes.max(1) * 60);
        println!(
            "Running cleanup every {} minutes. Press Ctrl+C to stop.",
            interval.as_secs() / 60
        );
        let handle = cleanup.spawn(interval);
        tokio::signal::ctrl_c().await?;
        handle.abort();
        output::print_success("Cleanup stopped.");
    } else {
        let report = cleanup.run_cleanup().await?;
        output::print_success("Cleanup complete.");
        output::print_kv("Sessions expired", &report.expired_sessions.to_string());
        output::print_kv("Blacklist entries purged", &report.purged_blacklist.to_string());
    }

    db.close().await;
    Ok(())
}
