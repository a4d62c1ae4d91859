//! Audit log entities.

pub mod model;

pub use model::{AuditLog, NewAuditLog};
