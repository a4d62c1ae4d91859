//! Role, permission, and grant entities.

pub mod grant;
pub mod input;
pub mod permission;
pub mod role;

pub use grant::{AssignedRole, PermissionGrant, RolePermission, UserRole};
pub use input::{
    AssignPermission, AssignRole, CreatePermission, CreateRole, UpdatePermission, UpdateRole,
    validate_slug,
};
pub use permission::Permission;
pub use role::Role;
