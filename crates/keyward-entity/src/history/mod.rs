//! Login history entities.

pub mod model;

pub use model::{LoginFailureReason, LoginHistory, NewLoginHistory};
