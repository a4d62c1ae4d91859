//! In-memory implementation of the store traits.
//!
//! All state lives behind one async mutex. Every trait method takes the lock
//! once, so each call is atomic with respect to every other call, matching
//! the transactional guarantees of the PostgreSQL store.

mod identity;
mod log;
mod rbac;
mod session;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::audit::AuditLog;
use keyward_entity::device::Device;
use keyward_entity::history::LoginHistory;
use keyward_entity::role::{Permission, Role, RolePermission, UserRole};
use keyward_entity::session::{BlacklistEntry, RefreshToken, Session};
use keyward_entity::user::{Profile, User};

/// Credential store held entirely in process memory.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    devices: HashMap<Uuid, Device>,
    sessions: HashMap<Uuid, Session>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    blacklist: HashMap<String, BlacklistEntry>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    user_roles: HashMap<Uuid, UserRole>,
    role_permissions: HashMap<Uuid, RolePermission>,
    login_history: Vec<LoginHistory>,
    audit_logs: Vec<AuditLog>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Page an already-ordered list.
fn paginate<T: Clone>(items: Vec<T>, page: PageRequest) -> PageResponse<T> {
    let total = items.len() as u64;
    PageResponse::new(page.slice(&items), page, total)
}
