//! Session lifecycle management including creation, rotation, and revocation.

pub mod cleanup;
pub mod manager;

pub use cleanup::{CleanupReport, SessionCleanup};
pub use manager::{SessionManager, TokenPair};
