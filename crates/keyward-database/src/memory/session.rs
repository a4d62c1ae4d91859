//! Sessions, refresh tokens, and the access token blacklist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::session::{
    BlacklistEntry, NewBlacklistEntry, NewRefreshToken, NewSession, RefreshToken, RevokeReason,
    Session,
};

use super::{MemoryStore, State, paginate};
use crate::store::{BlacklistStore, RefreshTokenStore, SessionStore};

impl State {
    fn revoke_session_row(
        &mut self,
        id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(&id).filter(|s| s.is_active) else {
            return false;
        };
        session.is_active = false;
        session.is_revoked = true;
        session.revoked_at = Some(at);
        session.revoked_by = revoked_by;
        session.revoked_reason = Some(reason.to_string());

        self.revoke_tokens_where(|t| t.session_id == Some(id), revoked_by, reason, at);
        true
    }

    fn revoke_tokens_where(
        &mut self,
        matches: impl Fn(&RefreshToken) -> bool,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> u64 {
        let mut count = 0;
        for token in self
            .refresh_tokens
            .values_mut()
            .filter(|t| t.is_active && matches(&**t))
        {
            token.is_active = false;
            token.is_revoked = true;
            token.revoked_at = Some(at);
            token.revoked_by = revoked_by;
            token.revoked_reason = Some(reason.to_string());
            count += 1;
        }
        count
    }

    fn insert_refresh_token(&mut self, data: &NewRefreshToken, now: DateTime<Utc>) -> RefreshToken {
        let token = RefreshToken {
            id: Uuid::now_v7(),
            user_id: data.user_id,
            token_hash: data.token_hash.clone(),
            family_id: data.family_id,
            parent_token_id: data.parent_token_id,
            session_id: data.session_id,
            device_id: data.device_id,
            ip_address: data.ip_address.clone(),
            user_agent: data.user_agent.clone(),
            is_active: true,
            is_revoked: false,
            revoked_at: None,
            revoked_by: None,
            revoked_reason: None,
            rotated_at: None,
            expires_at: data.expires_at,
            created_at: now,
        };
        self.refresh_tokens.insert(token.id, token.clone());
        token
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, data: &NewSession, now: DateTime<Utc>) -> AppResult<Session> {
        let session = Session {
            id: Uuid::now_v7(),
            user_id: data.user_id,
            device_id: data.device_id,
            session_token: data.session_token.clone(),
            ip_address: data.ip_address.clone(),
            user_agent: data.user_agent.clone(),
            device_name: data.device_name.clone(),
            last_activity_at: now,
            last_activity_ip: data.ip_address.clone(),
            activity_count: 0,
            is_active: true,
            is_revoked: false,
            revoked_at: None,
            revoked_by: None,
            revoked_reason: None,
            expires_at: data.expires_at,
            created_at: now,
        };
        self.state
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> AppResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn touch_session(
        &self,
        id: Uuid,
        ip_address: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(session) = state
            .sessions
            .get_mut(&id)
            .filter(|s| s.is_active && !s.is_revoked)
        else {
            return Ok(false);
        };
        session.last_activity_at = at;
        if let Some(ip) = ip_address {
            session.last_activity_ip = Some(ip.to_string());
        }
        session.activity_count += 1;
        Ok(true)
    }

    async fn revoke_session(
        &self,
        id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.revoke_session_row(id, revoked_by, reason, at))
    }

    async fn revoke_user_sessions(
        &self,
        user_id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let ids: Vec<Uuid> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active)
            .map(|s| s.id)
            .collect();
        let mut count = 0;
        for id in ids {
            if state.revoke_session_row(id, revoked_by, reason, at) {
                count += 1;
            }
        }
        state.revoke_tokens_where(|t| t.user_id == user_id, revoked_by, reason, at);
        Ok(count)
    }

    async fn list_sessions(
        &self,
        user_id: Option<Uuid>,
        active_only: bool,
        page: PageRequest,
    ) -> AppResult<PageResponse<Session>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| user_id.is_none_or(|uid| s.user_id == uid))
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(sessions, page))
    }

    async fn expire_sessions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let expired: Vec<Uuid> = state
            .sessions
            .values()
            .filter(|s| s.is_active && s.expires_at <= now)
            .map(|s| s.id)
            .collect();
        let mut count = 0;
        for id in expired {
            if state.revoke_session_row(id, None, RevokeReason::Expired.as_str(), now) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn create_refresh_token(
        &self,
        data: &NewRefreshToken,
        now: DateTime<Utc>,
    ) -> AppResult<RefreshToken> {
        let mut state = self.state.lock().await;
        Ok(state.insert_refresh_token(data, now))
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<RefreshToken>> {
        let state = self.state.lock().await;
        Ok(state
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        next: &NewRefreshToken,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshToken>> {
        let mut state = self.state.lock().await;
        let Some(old) = state
            .refresh_tokens
            .get_mut(&old_id)
            .filter(|t| t.is_usable())
        else {
            return Ok(None);
        };
        old.is_active = false;
        old.is_revoked = true;
        old.rotated_at = Some(now);
        old.revoked_at = Some(now);
        old.revoked_reason = Some(RevokeReason::Rotated.as_str().to_string());

        Ok(Some(state.insert_refresh_token(next, now)))
    }

    async fn revoke_token_family(
        &self,
        family_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        Ok(state.revoke_tokens_where(|t| t.family_id == family_id, None, reason, at))
    }

    async fn list_token_family(&self, family_id: Uuid) -> AppResult<Vec<RefreshToken>> {
        let state = self.state.lock().await;
        let mut tokens: Vec<RefreshToken> = state
            .refresh_tokens
            .values()
            .filter(|t| t.family_id == family_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tokens)
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn blacklist_token(
        &self,
        data: &NewBlacklistEntry,
        now: DateTime<Utc>,
    ) -> AppResult<BlacklistEntry> {
        let mut state = self.state.lock().await;
        let entry = state
            .blacklist
            .entry(data.token_hash.clone())
            .or_insert_with(|| BlacklistEntry {
                id: Uuid::now_v7(),
                token_hash: data.token_hash.clone(),
                user_id: data.user_id,
                reason: data.reason.clone(),
                expires_at: data.expires_at,
                created_at: now,
            });
        Ok(entry.clone())
    }

    async fn is_token_blacklisted(&self, token_hash: &str) -> AppResult<bool> {
        Ok(self.state.lock().await.blacklist.contains_key(token_hash))
    }

    async fn purge_expired_blacklist(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.blacklist.len();
        state.blacklist.retain(|_, entry| entry.expires_at > now);
        Ok((before - state.blacklist.len()) as u64)
    }
}
