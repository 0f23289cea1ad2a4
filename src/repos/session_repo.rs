/*
 * Responsibility
 * - Session persistence (sessions table)
 * - Lookups by id and by the secondary keys access token / cookie_id
 * - Expired sessions are never returned
 */
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult, with_deadline};
use crate::services::session::{Session, SessionDraft, SessionMeta};

/// What the issuer hands over to be persisted.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_type: String,
    pub parent_session_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub draft: SessionDraft,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, new: NewSession) -> RepoResult<Session>;

    async fn get(&self, id: Uuid) -> RepoResult<Option<Session>>;

    async fn get_by_access_token(&self, access_token: &[u8]) -> RepoResult<Option<Session>>;

    async fn get_by_cookie_id(&self, cookie_id: &[u8]) -> RepoResult<Option<Session>>;

    /// Returns whether a session was removed.
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    session_type: String,
    parent_session_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    data: Json<SessionDraft>,
    access_token: Option<Vec<u8>>,
    cookie_id: Option<Vec<u8>>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        let meta = SessionMeta {
            id: row.id,
            session_type: row.session_type,
            parent_session_id: row.parent_session_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        };

        let mut draft = row.data.0;
        draft.oauth2.access_token = row.access_token;
        draft.cookie_id = row.cookie_id;

        Session::from_parts(meta, draft)
    }
}

const SESSION_COLUMNS: &str =
    "id, session_type, parent_session_id, created_at, expires_at, data, access_token, cookie_id";

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn fetch_one_by(&self, column: &str, value: &[u8]) -> RepoResult<Option<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE {} = $1 AND expires_at > now()",
            SESSION_COLUMNS, column
        );

        with_deadline(self.timeout, async {
            let row = sqlx::query_as::<_, SessionRow>(&sql)
                .bind(value)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, RepoError>(row.map(Session::from))
        })
        .await
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, new: NewSession) -> RepoResult<Session> {
        let sql = format!(
            r#"
            INSERT INTO sessions (
                id, session_type, parent_session_id, credentials_id,
                expires_at, data, access_token, cookie_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );

        with_deadline(self.timeout, async {
            let row = sqlx::query_as::<_, SessionRow>(&sql)
                .bind(Uuid::new_v4())
                .bind(&new.session_type)
                .bind(new.parent_session_id)
                .bind(&new.draft.credentials.id)
                .bind(new.expires_at)
                .bind(Json(&new.draft))
                .bind(new.draft.oauth2.access_token.as_deref())
                .bind(new.draft.cookie_id.as_deref())
                .fetch_one(&self.pool)
                .await?;
            Ok::<_, RepoError>(Session::from(row))
        })
        .await
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<Session>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE id = $1 AND expires_at > now()",
            SESSION_COLUMNS
        );

        with_deadline(self.timeout, async {
            let row = sqlx::query_as::<_, SessionRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, RepoError>(row.map(Session::from))
        })
        .await
    }

    async fn get_by_access_token(&self, access_token: &[u8]) -> RepoResult<Option<Session>> {
        self.fetch_one_by("access_token", access_token).await
    }

    async fn get_by_cookie_id(&self, cookie_id: &[u8]) -> RepoResult<Option<Session>> {
        self.fetch_one_by("cookie_id", cookie_id).await
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        with_deadline(self.timeout, async {
            let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok::<_, RepoError>(result.rows_affected() > 0)
        })
        .await
    }
}
