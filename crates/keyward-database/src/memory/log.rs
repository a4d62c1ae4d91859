//! Login history and audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::audit::{AuditLog, NewAuditLog};
use keyward_entity::history::{LoginHistory, NewLoginHistory};

use super::{MemoryStore, paginate};
use crate::store::{AuditStore, LoginHistoryStore};

#[async_trait]
impl LoginHistoryStore for MemoryStore {
    async fn record_login(
        &self,
        data: &NewLoginHistory,
        now: DateTime<Utc>,
    ) -> AppResult<LoginHistory> {
        let row = LoginHistory {
            id: Uuid::now_v7(),
            user_id: data.user_id,
            email: data.email.clone(),
            success: data.success,
            failure_reason: data.failure_reason.clone(),
            device_id: data.device_id,
            fingerprint: data.fingerprint.clone(),
            ip_address: data.ip_address.clone(),
            user_agent: data.user_agent.clone(),
            is_suspicious: data.is_suspicious,
            risk_score: data.risk_score,
            session_id: data.session_id,
            refresh_token_id: data.refresh_token_id,
            attempted_at: now,
        };
        self.state.lock().await.login_history.push(row.clone());
        Ok(row)
    }

    async fn list_login_history(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<LoginHistory>> {
        let state = self.state.lock().await;
        let rows: Vec<LoginHistory> = state
            .login_history
            .iter()
            .rev()
            .filter(|h| h.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn list_login_history_by_email(
        &self,
        email: &str,
        page: PageRequest,
    ) -> AppResult<PageResponse<LoginHistory>> {
        let state = self.state.lock().await;
        let rows: Vec<LoginHistory> = state
            .login_history
            .iter()
            .rev()
            .filter(|h| h.email == email)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn record_audit(&self, data: &NewAuditLog, now: DateTime<Utc>) -> AppResult<AuditLog> {
        let row = AuditLog {
            id: Uuid::now_v7(),
            action: data.action.clone(),
            entity: data.entity.clone(),
            entity_id: data.entity_id,
            user_id: data.user_id,
            user_email: data.user_email.clone(),
            old_values: data.old_values.clone(),
            new_values: data.new_values.clone(),
            ip_address: data.ip_address.clone(),
            user_agent: data.user_agent.clone(),
            created_at: now,
        };
        self.state.lock().await.audit_logs.push(row.clone());
        Ok(row)
    }

    async fn list_audit(
        &self,
        action: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let state = self.state.lock().await;
        let rows: Vec<AuditLog> = state
            .audit_logs
            .iter()
            .rev()
            .filter(|a| action.is_none_or(|act| a.action == act))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }
}
