//! # keyward-entity
//!
//! Domain entity models for Keyward. Every struct in this crate represents
//! a database table row, an insert payload, or an administrative input.
//! Row types derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and
//! `sqlx::FromRow`.

pub mod audit;
pub mod device;
pub mod history;
pub mod role;
pub mod session;
pub mod user;
