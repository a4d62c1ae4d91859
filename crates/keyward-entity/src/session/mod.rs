//! Session, refresh token, and blacklist entities.

pub mod blacklist;
pub mod model;
pub mod reason;
pub mod refresh_token;

pub use blacklist::{BlacklistEntry, NewBlacklistEntry};
pub use model::{NewSession, Session};
pub use reason::RevokeReason;
pub use refresh_token::{NewRefreshToken, RefreshToken};
