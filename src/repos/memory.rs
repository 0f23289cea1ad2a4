//! In-memory store implementations for tests.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repos::audit_repo::{AuditLog, LastLogins};
use crate::repos::auth_code_repo::{AuthorizationCodeRecord, AuthorizationCodeRepo};
use crate::repos::credentials_repo::{CredentialsProvider, CredentialsRecord, RegistrationInfo};
use crate::repos::error::{RepoError, RepoResult};
use crate::repos::session_repo::{NewSession, SessionStore};
use crate::repos::tenant_repo::{TenantRoleResolver, build_authz};
use crate::services::session::model::{Authz, LoginDescriptor};
use crate::services::session::{Session, SessionMeta};

#[derive(Default)]
pub struct MemoryAuthCodeRepo {
    records: Mutex<HashMap<String, AuthorizationCodeRecord>>,
}

impl MemoryAuthCodeRepo {
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn contains(&self, code: &str) -> bool {
        self.records.lock().await.contains_key(code)
    }
}

#[async_trait]
impl AuthorizationCodeRepo for MemoryAuthCodeRepo {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, record: &AuthorizationCodeRecord) -> RepoResult<()> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.code) {
            return Err(RepoError::Conflict);
        }
        records.insert(record.code.clone(), record.clone());
        Ok(())
    }

    async fn take(&self, code: &str) -> RepoResult<Option<AuthorizationCodeRecord>> {
        Ok(self.records.lock().await.remove(code))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.exp >= now);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub async fn insert(&self, session: Session) {
        self.sessions.lock().await.insert(session.id(), session);
    }

    async fn find(&self, pred: impl Fn(&Session) -> bool) -> Option<Session> {
        let now = Utc::now();
        self.sessions
            .lock()
            .await
            .values()
            .find(|s| s.meta.expires_at > now && pred(s))
            .cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, new: NewSession) -> RepoResult<Session> {
        let meta = SessionMeta {
            id: Uuid::new_v4(),
            session_type: new.session_type,
            parent_session_id: new.parent_session_id,
            created_at: Utc::now(),
            expires_at: new.expires_at,
        };
        let session = Session::from_parts(meta, new.draft);
        self.insert(session.clone()).await;
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Session>> {
        Ok(self.find(|s| s.id() == id).await)
    }

    async fn get_by_access_token(&self, access_token: &[u8]) -> RepoResult<Option<Session>> {
        Ok(self
            .find(|s| s.oauth2.access_token.as_deref() == Some(access_token))
            .await)
    }

    async fn get_by_cookie_id(&self, cookie_id: &[u8]) -> RepoResult<Option<Session>> {
        Ok(self.find(|s| s.cookie_id.as_deref() == Some(cookie_id)).await)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.sessions.lock().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    records: std::sync::Mutex<HashMap<String, CredentialsRecord>>,
    descriptors: HashMap<String, Vec<LoginDescriptor>>,
}

impl MemoryCredentials {
    pub fn with(record: CredentialsRecord) -> Self {
        let creds = Self::default();
        creds
            .records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
        creds
    }

    pub fn with_login_descriptors(mut self, id: &str, descriptors: Vec<LoginDescriptor>) -> Self {
        self.descriptors.insert(id.to_string(), descriptors);
        self
    }
}

#[async_trait]
impl CredentialsProvider for MemoryCredentials {
    fn provider_type(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, credentials_id: &str) -> RepoResult<Option<CredentialsRecord>> {
        Ok(self.records.lock().unwrap().get(credentials_id).cloned())
    }

    async fn register(&self, info: &RegistrationInfo) -> RepoResult<Option<String>> {
        let id = Uuid::new_v4().to_string();
        let record = CredentialsRecord {
            id: id.clone(),
            username: Some(info.username.clone()),
            email: info.email.clone(),
            phone: info.phone.clone(),
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        self.records.lock().unwrap().insert(id.clone(), record);
        Ok(Some(id))
    }

    async fn get_login_descriptors(
        &self,
        credentials_id: &str,
    ) -> RepoResult<Option<Vec<LoginDescriptor>>> {
        Ok(self.descriptors.get(credentials_id).cloned())
    }
}

#[derive(Default)]
pub struct StaticTenantRoles {
    authz: HashMap<String, Authz>,
}

impl StaticTenantRoles {
    pub fn with(credentials_id: &str, authz: Authz) -> Self {
        let mut roles = Self::default();
        roles.authz.insert(credentials_id.to_string(), authz);
        roles
    }
}

#[async_trait]
impl TenantRoleResolver for StaticTenantRoles {
    async fn credentials_authz(&self, credentials_id: &str) -> RepoResult<Authz> {
        Ok(self
            .authz
            .get(credentials_id)
            .cloned()
            .unwrap_or_else(|| build_authz(vec![], vec![])))
    }
}

#[derive(Default)]
pub struct MemoryAudit {
    pub last: Option<LastLogins>,
    pub fail: bool,
}

#[async_trait]
impl AuditLog for MemoryAudit {
    async fn last_logins(&self, _credentials_id: &str) -> RepoResult<Option<LastLogins>> {
        if self.fail {
            return Err(RepoError::Timeout(std::time::Duration::from_millis(1)));
        }
        Ok(self.last.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registration_creates_retrievable_credentials() {
        let creds = MemoryCredentials::default();
        let info = RegistrationInfo {
            username: "bob".into(),
            email: Some("bob@example.com".into()),
            phone: None,
        };
        let id = creds.register(&info).await.unwrap().unwrap();
        let record = creds.get(&id).await.unwrap().unwrap();
        assert_eq!(record.username.as_deref(), Some("bob"));
        assert_eq!(creds.get_login_descriptors(&id).await.unwrap(), None);
    }
}
