//! # keyward-auth
//!
//! The credential lifecycle and authorization engine for Keyward.
//!
//! ## Modules
//!
//! - `jwt`: access/refresh token signing, verification, and digesting
//! - `password`: Argon2id password hashing and policy enforcement
//! - `device`: device fingerprints and the per-user device registry
//! - `session`: session lifecycle, refresh rotation, and cleanup
//! - `rbac`: effective role/permission resolution and administration
//! - `service`: login, registration, logout, and password flows
//! - `authenticator`: request authentication from transport headers

pub mod audit;
pub mod authenticator;
pub mod context;
pub mod device;
pub mod history;
pub mod jwt;
pub mod password;
pub mod rbac;
pub mod service;
pub mod session;

pub use audit::{AuditSink, StoreAuditSink};
pub use authenticator::RequestAuthenticator;
pub use context::{Actor, AuthContext, ClientInfo};
pub use device::DeviceResolver;
pub use jwt::{Claims, TokenCodec};
pub use password::{PasswordHasher, PasswordValidator};
pub use rbac::{RbacAdmin, RbacResolver};
pub use service::{AuthService, LoginResponse, ResetTokenDelivery};
pub use session::{SessionCleanup, SessionManager};
