//! # keyward-database
//!
//! Persistence for Keyward. Defines the store traits the credential core
//! is written against, a PostgreSQL implementation backed by sqlx, and an
//! in-memory implementation with the same atomicity guarantees.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use repositories::PgStore;
pub use store::{
    AuditStore, BlacklistStore, CredentialStore, DeviceStore, LoginHistoryStore,
    RbacStore, RefreshTokenStore, SessionStore, UserStore,
};
