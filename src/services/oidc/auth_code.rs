/*
 * Responsibility
 * - Issue single-use authorization codes bound to a session id
 * - Redeem a code exactly once; an expired code is consumed and reported as expired
 * - Periodic sweep of expired codes (scheduler task)
 */
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::repos::auth_code_repo::{AuthorizationCodeRecord, AuthorizationCodeRepo};
use crate::services::oidc::OidcError;
use crate::services::random;
use crate::services::scheduler::PeriodicTask;

// 36 random bytes -> 48 URL-safe characters.
const CODE_LENGTH: usize = 36;

pub struct AuthorizationCodeStore {
    repo: Arc<dyn AuthorizationCodeRepo>,
    timeout: Duration,
}

impl AuthorizationCodeStore {
    pub fn new(repo: Arc<dyn AuthorizationCodeRepo>, timeout: std::time::Duration) -> Self {
        let timeout = Duration::from_std(timeout).unwrap_or(Duration::seconds(60));
        Self { repo, timeout }
    }

    pub async fn issue(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<String, OidcError> {
        let record = AuthorizationCodeRecord {
            code: random::token_urlsafe(CODE_LENGTH)?,
            sid: session_id,
            exp: now + self.timeout,
        };
        self.repo.insert(&record).await?;

        debug!(
            session_id = %session_id,
            backend = self.repo.backend_name(),
            "authorization code issued"
        );
        Ok(record.code)
    }

    pub async fn redeem(&self, code: &str, now: DateTime<Utc>) -> Result<Uuid, OidcError> {
        let record = self.repo.take(code).await?.ok_or(OidcError::CodeNotFound)?;

        if record.exp <= now {
            debug!(session_id = %record.sid, "expired authorization code presented");
            return Err(OidcError::CodeExpired);
        }

        Ok(record.sid)
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, OidcError> {
        Ok(self.repo.delete_expired(now).await?)
    }
}

#[async_trait]
impl PeriodicTask for AuthorizationCodeStore {
    fn name(&self) -> &'static str {
        "authorization-code-sweep"
    }

    async fn tick(&self) {
        match self.sweep(Utc::now()).await {
            Ok(0) => {}
            Ok(deleted) => info!(deleted, "expired authorization codes removed"),
            Err(err) => warn!(error = %err, "authorization code sweep failed"),
        }
    }
}
