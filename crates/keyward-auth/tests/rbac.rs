mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use keyward_auth::Actor;
use keyward_core::error::ErrorKind;
use keyward_core::types::PageRequest;
use keyward_database::{AuditStore, RbacStore};
use keyward_entity::role::{
    AssignPermission, AssignRole, CreatePermission, CreateRole, Role, UpdateRole,
};

use common::{PASSWORD, client, harness, login_input};

fn role(slug: &str, level: i32) -> CreateRole {
    CreateRole {
        name: slug.to_uppercase(),
        slug: slug.into(),
        description: None,
        level,
        color: None,
        metadata: None,
        is_system: false,
    }
}

fn permission(slug: &str) -> CreatePermission {
    CreatePermission {
        name: slug.into(),
        slug: slug.into(),
        description: None,
        category: slug.split('.').next().map(str::to_string),
        metadata: None,
        is_system: false,
    }
}

#[tokio::test]
async fn test_effective_roles_and_permissions() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let admin = h.service.rbac_admin();
    let actor = Actor::system();

    let viewer = admin.create_role(role("viewer", 10), &actor).await.unwrap();
    let editor = admin.create_role(role("editor", 50), &actor).await.unwrap();
    let auditor = admin.create_role(role("auditor", 50), &actor).await.unwrap();
    let lapsed = admin.create_role(role("lapsed", 90), &actor).await.unwrap();

    let read = admin.create_permission(permission("post.read"), &actor).await.unwrap();
    let write = admin.create_permission(permission("post.write"), &actor).await.unwrap();
    let purge = admin.create_permission(permission("post.purge"), &actor).await.unwrap();

    for (role, perm) in [(&viewer, &read), (&editor, &write), (&lapsed, &purge)] {
        admin
            .assign_permission(
                AssignPermission {
                    role_id: role.id,
                    permission_id: perm.id,
                    granted: true,
                },
                &actor,
            )
            .await
            .unwrap();
    }

    for r in [&viewer, &editor, &auditor] {
        admin
            .assign_role(
                AssignRole {
                    user_id: user.id,
                    role_id: r.id,
                    expires_at: None,
                },
                &actor,
            )
            .await
            .unwrap();
    }
    admin
        .assign_role(
            AssignRole {
                user_id: user.id,
                role_id: lapsed.id,
                expires_at: Some(Utc::now() - Duration::minutes(1)),
            },
            &actor,
        )
        .await
        .unwrap();

    let rbac = h.service.rbac();
    assert_eq!(
        rbac.get_user_roles(user.id).await.unwrap(),
        vec!["auditor", "editor", "viewer"]
    );
    let perms: Vec<String> = rbac
        .get_user_permissions(user.id)
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(perms, vec!["post.read", "post.write"]);

    assert!(rbac.has_role(user.id, "editor").await.unwrap());
    assert!(!rbac.has_role(user.id, "lapsed").await.unwrap());
    assert!(rbac.has_any_role(user.id, &["owner", "viewer"]).await.unwrap());
    assert!(rbac.has_permission(user.id, "post.write").await.unwrap());
    assert!(!rbac.has_permission(user.id, "post.purge").await.unwrap());

    let err = rbac.require_permission(user.id, "post.purge").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert!(rbac.require_role(user.id, "viewer").await.is_ok());

    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    assert_eq!(login.user.roles, vec!["auditor", "editor", "viewer"]);
    assert_eq!(login.user.permissions, vec!["post.read", "post.write"]);
}

#[tokio::test]
async fn test_inactive_rows_drop_out() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let admin = h.service.rbac_admin();
    let actor = Actor::system();

    let ops = admin.create_role(role("ops", 40), &actor).await.unwrap();
    let deploy = admin.create_permission(permission("app.deploy"), &actor).await.unwrap();
    admin
        .assign_permission(
            AssignPermission {
                role_id: ops.id,
                permission_id: deploy.id,
                granted: true,
            },
            &actor,
        )
        .await
        .unwrap();
    admin
        .assign_role(
            AssignRole {
                user_id: user.id,
                role_id: ops.id,
                expires_at: None,
            },
            &actor,
        )
        .await
        .unwrap();
    assert!(h.service.rbac().has_permission(user.id, "app.deploy").await.unwrap());

    admin
        .assign_permission(
            AssignPermission {
                role_id: ops.id,
                permission_id: deploy.id,
                granted: false,
            },
            &actor,
        )
        .await
        .unwrap();
    assert!(!h.service.rbac().has_permission(user.id, "app.deploy").await.unwrap());

    admin
        .update_role(
            ops.id,
            UpdateRole {
                is_active: Some(false),
                ..UpdateRole::default()
            },
            &actor,
        )
        .await
        .unwrap();
    assert!(h.service.rbac().get_user_roles(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_system_rows_are_immutable() {
    let h = harness();
    let admin = h.service.rbac_admin();
    let actor = Actor::system();

    let err = admin
        .create_role(
            CreateRole {
                is_system: true,
                ..role("root", 100)
            },
            &actor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let system: Role = h
        .store
        .create_role(
            &CreateRole {
                is_system: true,
                ..role("super-admin", 100)
            },
            None,
            Utc::now(),
        )
        .await
        .unwrap();

    let err = admin
        .update_role(
            system.id,
            UpdateRole {
                name: Some("Renamed".into()),
                ..UpdateRole::default()
            },
            &actor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let err = admin.delete_role(system.id, &actor).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let perm = h
        .store
        .create_permission(
            &CreatePermission {
                is_system: true,
                ..permission("user.manage")
            },
            None,
            Utc::now(),
        )
        .await
        .unwrap();
    let err = admin.delete_permission(perm.id, &actor).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_conflicts_and_missing_rows() {
    let h = harness();
    let admin = h.service.rbac_admin();
    let actor = Actor::system();

    admin.create_role(role("ops", 40), &actor).await.unwrap();
    let err = admin.create_role(role("ops", 10), &actor).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyExists);

    let err = admin
        .create_role(role("Not A Slug", 10), &actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let ops = admin.list_roles(PageRequest::default()).await.unwrap().items[0].clone();
    let err = admin
        .assign_role(
            AssignRole {
                user_id: Uuid::new_v4(),
                role_id: ops.id,
                expires_at: None,
            },
            &actor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = admin
        .assign_permission(
            AssignPermission {
                role_id: ops.id,
                permission_id: Uuid::new_v4(),
                granted: true,
            },
            &actor,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = admin.get_role(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let created = admin
        .create_permission(permission("reports.read"), &actor)
        .await
        .unwrap();
    let fetched = admin.get_permission(created.id).await.unwrap();
    assert_eq!(fetched.slug, "reports.read");
    assert_eq!(fetched.category.as_deref(), Some("reports"));

    let err = admin.get_permission(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_revoke_role_is_soft_and_revoke_permission_is_hard() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let admin = h.service.rbac_admin();
    let actor = Actor::system();

    let ops = admin.create_role(role("ops", 40), &actor).await.unwrap();
    let deploy = admin.create_permission(permission("app.deploy"), &actor).await.unwrap();
    admin
        .assign_permission(
            AssignPermission {
                role_id: ops.id,
                permission_id: deploy.id,
                granted: true,
            },
            &actor,
        )
        .await
        .unwrap();
    admin
        .assign_role(
            AssignRole {
                user_id: user.id,
                role_id: ops.id,
                expires_at: None,
            },
            &actor,
        )
        .await
        .unwrap();

    let details = admin.get_role(ops.id).await.unwrap();
    assert_eq!(details.permissions, vec!["app.deploy"]);
    assert_eq!(details.user_count, 1);

    admin.revoke_role(user.id, ops.id, &actor).await.unwrap();
    let grant = h.store.find_user_role(user.id, ops.id).await.unwrap().unwrap();
    assert!(!grant.is_active);
    assert_eq!(admin.get_role(ops.id).await.unwrap().user_count, 0);

    admin.revoke_permission(ops.id, deploy.id, &actor).await.unwrap();
    let grants = h.store.list_permission_grants(&[ops.id]).await.unwrap();
    assert!(grants.is_empty());

    let err = admin
        .revoke_permission(ops.id, deploy.id, &actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    let err = admin
        .revoke_role(Uuid::new_v4(), ops.id, &actor)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    // Re-assigning re-activates the existing grant.
    admin
        .assign_role(
            AssignRole {
                user_id: user.id,
                role_id: ops.id,
                expires_at: None,
            },
            &actor,
        )
        .await
        .unwrap();
    let again = h.store.find_user_role(user.id, ops.id).await.unwrap().unwrap();
    assert_eq!(again.id, grant.id);
    assert!(again.is_active);
}

#[tokio::test]
async fn test_update_audit_records_changed_fields() {
    let h = harness();
    let admin = h.service.rbac_admin();
    let actor = Actor::user(Uuid::new_v4());

    let ops = admin.create_role(role("ops", 40), &actor).await.unwrap();
    admin
        .update_role(
            ops.id,
            UpdateRole {
                name: Some("Operations".into()),
                level: Some(40),
                ..UpdateRole::default()
            },
            &actor,
        )
        .await
        .unwrap();

    let entries = h
        .store
        .list_audit(Some("role.updated"), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(entries.total_items, 1);
    let entry = &entries.items[0];
    assert_eq!(entry.user_id, actor.user_id);
    assert_eq!(
        entry.old_values,
        Some(serde_json::json!({ "name": "OPS" }))
    );
    assert_eq!(
        entry.new_values,
        Some(serde_json::json!({ "name": "Operations" }))
    );
}
