//! Device fingerprinting and the per-user device registry.

pub mod agent;
pub mod resolver;

pub use agent::{UserAgentInfo, fingerprint, parse_user_agent};
pub use resolver::DeviceResolver;
