//! Role-based access control over stored role and permission grants.

pub mod admin;
pub mod resolver;

pub use admin::{RbacAdmin, RoleDetails};
pub use resolver::{RbacResolver, UserAccess};
