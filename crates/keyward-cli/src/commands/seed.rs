//! Seeds the system permissions and roles.
//!
//! Seeding is idempotent: existing permissions and roles are left as they
//! are, and role grants are upserted.

use chrono::Utc;
use tracing::info;

use crate::output;
use keyward_core::config::AppConfig;
use keyward_core::error::AppError;
use keyward_database::CredentialStore;
use keyward_entity::role::{AssignPermission, CreatePermission, CreateRole};

/// `(slug, name, description, category)`
const PERMISSIONS: &[(&str, &str, &str, &str)] = &[
    ("user.create", "Create User", "Permission to create new users", "user"),
    ("user.read", "Read User", "Permission to view user details", "user"),
    ("user.update", "Update User", "Permission to update user information", "user"),
    ("user.delete", "Delete User", "Permission to delete users", "user"),
    ("user.manage-roles", "Manage User Roles", "Permission to assign/remove roles from users", "user"),
    ("user.block", "Block User", "Permission to block/unblock users", "user"),
    ("role.create", "Create Role", "Permission to create new roles", "role"),
    ("role.read", "Read Role", "Permission to view role details", "role"),
    ("role.update", "Update Role", "Permission to update role information", "role"),
    ("role.delete", "Delete Role", "Permission to delete roles", "role"),
    ("role.manage-permissions", "Manage Role Permissions", "Permission to assign/remove permissions from roles", "role"),
    ("permission.create", "Create Permission", "Permission to create new permissions", "permission"),
    ("permission.read", "Read Permission", "Permission to view permission details", "permission"),
    ("permission.update", "Update Permission", "Permission to update permission information", "permission"),
    ("permission.delete", "Delete Permission", "Permission to delete permissions", "permission"),
    ("session.read", "View Sessions", "Permission to view user sessions", "session"),
    ("session.revoke", "Revoke Session", "Permission to revoke user sessions", "session"),
    ("session.manage", "Manage All Sessions", "Permission to manage all user sessions", "session"),
    ("audit.read", "View Audit Logs", "Permission to view audit logs", "audit"),
    ("audit.export", "Export Audit Logs", "Permission to export audit logs", "audit"),
    ("dashboard.access", "Access Dashboard", "Permission to access admin dashboard", "dashboard"),
    ("dashboard.analytics", "View Analytics", "Permission to view dashboard analytics", "dashboard"),
    ("settings.manage", "Manage Settings", "Permission to manage system settings", "settings"),
    ("settings.read", "View Settings", "Permission to view system settings", "settings"),
];

/// Which permissions a seeded role receives.
enum Grants {
    All,
    AllExcept(&'static [&'static str]),
    Only(&'static [&'static str]),
}

impl Grants {
    fn includes(&self, slug: &str) -> bool {
        match self {
            Self::All => true,
            Self::AllExcept(excluded) => !excluded.contains(&slug),
            Self::Only(included) => included.contains(&slug),
        }
    }
}

struct SeedRole {
    slug: &'static str,
    name: &'static str,
    description: &'static str,
    level: i32,
    color: &'static str,
    grants: Grants,
}

const ROLES: &[SeedRole] = &[
    SeedRole {
        slug: "super-admin",
        name: "Super Admin",
        description: "Full system access with all permissions",
        level: 100,
        color: "#ff4d4f",
        grants: Grants::All,
    },
    SeedRole {
        slug: "admin",
        name: "Admin",
        description: "Administrator with most permissions except system-critical ones",
        level: 90,
        color: "#1890ff",
        grants: Grants::AllExcept(&["settings.manage"]),
    },
    SeedRole {
        slug: "manager",
        name: "Manager",
        description: "Manager with user management and viewing permissions",
        level: 50,
        color: "#52c41a",
        grants: Grants::Only(&[
            "user.create",
            "user.read",
            "user.update",
            "session.read",
            "audit.read",
            "dashboard.access",
            "settings.read",
        ]),
    },
    SeedRole {
        slug: "moderator",
        name: "Moderator",
        description: "Moderator with limited user management permissions",
        level: 30,
        color: "#faad14",
        grants: Grants::Only(&[
            "user.read",
            "user.update",
            "user.block",
            "session.read",
            "session.revoke",
            "audit.read",
            "dashboard.access",
        ]),
    },
    SeedRole {
        slug: "user",
        name: "User",
        description: "Regular user with basic permissions",
        level: 10,
        color: "#8c8c8c",
        grants: Grants::Only(&["user.read", "settings.read"]),
    },
];

/// Counts of rows written by one seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Permissions created.
    pub permissions_created: usize,
    /// Roles created.
    pub roles_created: usize,
    /// Grants upserted.
    pub grants: usize,
}

/// Execute the seed command
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let (db, store) = super::connect(config).await?;
    let report = seed(store.as_ref()).await?;
    db.close().await;

    output::print_success("Seeding complete.");
    output::print_kv("Permissions created", &report.permissions_created.to_string());
    output::print_kv("Roles created", &report.roles_created.to_string());
    output::print_kv("Grants applied", &report.grants.to_string());
    Ok(())
}

/// Write the system permissions, roles and grants through the store.
///
/// System rows are refused by the administration API, so this goes to the
/// store directly.
pub async fn seed(store: &dyn CredentialStore) -> Result<SeedReport, AppError> {
    let mut report = SeedReport::default();
    let now = Utc::now();

    let mut permissions = Vec::with_capacity(PERMISSIONS.len());
    for (slug, name, description, category) in PERMISSIONS {
        let permission = match store.find_permission_by_slug(slug).await? {
            Some(existing) => existing,
            None => {
                let data = CreatePermission {
                    name: (*name).to_string(),
                    slug: (*slug).to_string(),
                    description: Some((*description).to_string()),
                    category: Some((*category).to_string()),
                    metadata: None,
                    is_system: true,
                };
                report.permissions_created += 1;
                store.create_permission(&data, None, now).await?
            }
        };
        permissions.push(permission);
    }

    for seed_role in ROLES {
        let role = match store.find_role_by_slug(seed_role.slug).await? {
            Some(existing) => existing,
            None => {
                let data = CreateRole {
                    name: seed_role.name.to_string(),
                    slug: seed_role.slug.to_string(),
                    description: Some(seed_role.description.to_string()),
                    level: seed_role.level,
                    color: Some(seed_role.color.to_string()),
                    metadata: None,
                    is_system: true,
                };
                report.roles_created += 1;
                store.create_role(&data, None, now).await?
            }
        };

        for permission in permissions
            .iter()
            .filter(|p| seed_role.grants.includes(&p.slug))
        {
            let grant = AssignPermission {
                role_id: role.id,
                permission_id: permission.id,
                granted: true,
            };
            store.upsert_role_permission(&grant, None, now).await?;
            report.grants += 1;
        }
        info!(role = %role.slug, level = role.level, "Seeded role");
    }

    Ok(report)
}
