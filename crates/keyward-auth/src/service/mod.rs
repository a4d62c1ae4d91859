//! Credential flows composed from the session, device, and RBAC components.

pub mod auth;
pub mod reset;
pub mod types;

pub use auth::AuthService;
pub use reset::{LoggingResetDelivery, ResetTokenDelivery};
pub use types::{
    AuthTokens, AuthUser, LoginInput, LoginResponse, ProfileSummary, RegisterInput,
    SessionSummary,
};
