//! PostgreSQL implementations of the store traits.
//!
//! [`PgStore`] is one handle over a shared pool; each file in this module
//! implements the trait for one entity group.

pub mod audit;
pub mod blacklist;
pub mod device;
pub mod history;
pub mod rbac;
pub mod refresh_token;
pub mod session;
pub mod user;

use sqlx::PgPool;

use keyward_core::error::{AppError, ErrorKind};

/// Credential store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a write error, turning unique violations into `AlreadyExists`.
pub(crate) fn write_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        let unique = e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            AppError::with_source(ErrorKind::AlreadyExists, format!("{context}: already exists"), e)
        } else {
            AppError::with_source(ErrorKind::Database, context, e)
        }
    }
}

/// Map a read error.
pub(crate) fn read_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}
