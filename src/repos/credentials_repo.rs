/*
 * Responsibility
 * - Credentials lookup for the session builders (`CredentialsProvider`)
 * - Two Postgres-backed variants:
 *   - regular credentials (registration + login descriptors)
 *   - machine-to-machine credentials: API access only, no registration,
 *     no login descriptors
 */
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult, with_deadline};
use crate::services::session::model::LoginDescriptor;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsRecord {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub external_login: Option<BTreeMap<String, String>>,
    pub totp_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationInfo {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    fn provider_type(&self) -> &'static str;

    async fn get(&self, credentials_id: &str) -> RepoResult<Option<CredentialsRecord>>;

    // Returns the new credentials id, or None when the provider does not register.
    async fn register(&self, info: &RegistrationInfo) -> RepoResult<Option<String>>;

    // None when the provider has no notion of login descriptors.
    async fn get_login_descriptors(
        &self,
        credentials_id: &str,
    ) -> RepoResult<Option<Vec<LoginDescriptor>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsKind {
    Regular,
    Machine,
}

#[derive(Debug, FromRow)]
struct CredentialsRow {
    id: String,
    username: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    created_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
    external_login: Option<Json<BTreeMap<String, String>>>,
    totp_secret: Option<String>,
}

impl From<CredentialsRow> for CredentialsRecord {
    fn from(row: CredentialsRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
            modified_at: row.modified_at,
            external_login: row.external_login.map(|j| j.0),
            totp_secret: row.totp_secret,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgCredentialsProvider {
    pool: PgPool,
    kind: CredentialsKind,
    timeout: Duration,
}

impl PgCredentialsProvider {
    pub fn new(pool: PgPool, kind: CredentialsKind, timeout: Duration) -> Self {
        Self {
            pool,
            kind,
            timeout,
        }
    }

    fn select_sql(&self) -> &'static str {
        match self.kind {
            CredentialsKind::Regular => {
                r#"
                SELECT id, username, email, phone, created_at, modified_at,
                    external_login, totp_secret
                FROM credentials
                WHERE id = $1
                "#
            }
            CredentialsKind::Machine => {
                r#"
                SELECT id, username,
                    NULL::text AS email,
                    NULL::text AS phone,
                    created_at, modified_at,
                    NULL::jsonb AS external_login,
                    NULL::text AS totp_secret
                FROM m2m_credentials
                WHERE id = $1
                "#
            }
        }
    }
}

#[async_trait]
impl CredentialsProvider for PgCredentialsProvider {
    fn provider_type(&self) -> &'static str {
        match self.kind {
            CredentialsKind::Regular => "postgres",
            CredentialsKind::Machine => "m2m",
        }
    }

    async fn get(&self, credentials_id: &str) -> RepoResult<Option<CredentialsRecord>> {
        with_deadline(self.timeout, async {
            let row = sqlx::query_as::<_, CredentialsRow>(self.select_sql())
                .bind(credentials_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, RepoError>(row.map(CredentialsRecord::from))
        })
        .await
    }

    async fn register(&self, info: &RegistrationInfo) -> RepoResult<Option<String>> {
        if self.kind == CredentialsKind::Machine {
            debug!(username = %info.username, "machine credentials do not support registration");
            return Ok(None);
        }

        let id = Uuid::new_v4().to_string();
        with_deadline(self.timeout, async {
            let id = sqlx::query_scalar::<_, String>(
                r#"
                INSERT INTO credentials (id, username, email, phone)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(&id)
            .bind(&info.username)
            .bind(info.email.as_deref())
            .bind(info.phone.as_deref())
            .fetch_one(&self.pool)
            .await?;
            Ok::<_, RepoError>(Some(id))
        })
        .await
    }

    async fn get_login_descriptors(
        &self,
        credentials_id: &str,
    ) -> RepoResult<Option<Vec<LoginDescriptor>>> {
        if self.kind == CredentialsKind::Machine {
            return Ok(None);
        }

        with_deadline(self.timeout, async {
            let descriptors = sqlx::query_scalar::<_, Option<Json<Vec<LoginDescriptor>>>>(
                r#"
                SELECT login_descriptors
                FROM credentials
                WHERE id = $1
                "#,
            )
            .bind(credentials_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, RepoError>(descriptors.flatten().map(|j| j.0))
        })
        .await
    }
}
