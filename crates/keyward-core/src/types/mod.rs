//! Shared value types used across the Keyward workspace.

pub mod pagination;

pub use pagination::{PageRequest, PageResponse};
