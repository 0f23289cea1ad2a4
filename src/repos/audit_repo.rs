/*
 * Responsibility
 * - Last successful / failed login lookup (UserInfo enrichment only)
 */
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::repos::error::{RepoError, RepoResult, with_deadline};

#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct LastLogins {
    pub failed_at: Option<DateTime<Utc>>,
    pub successful_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn last_logins(&self, credentials_id: &str) -> RepoResult<Option<LastLogins>>;
}

#[derive(Clone, Debug)]
pub struct PgAuditLog {
    pool: PgPool,
    timeout: Duration,
}

impl PgAuditLog {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn last_logins(&self, credentials_id: &str) -> RepoResult<Option<LastLogins>> {
        with_deadline(self.timeout, async {
            let row = sqlx::query_as::<_, LastLogins>(
                r#"
                SELECT
                    MAX(created_at) FILTER (WHERE NOT succeeded) AS failed_at,
                    MAX(created_at) FILTER (WHERE succeeded) AS successful_at
                FROM login_audit
                WHERE credentials_id = $1
                "#,
            )
            .bind(credentials_id)
            .fetch_one(&self.pool)
            .await?;

            let found = row.failed_at.is_some() || row.successful_at.is_some();
            Ok::<_, RepoError>(found.then_some(row))
        })
        .await
    }
}
