/*
 * Responsibility
 * - Persistence of authorization codes: {code, sid, exp}
 * - `take` is a single find-and-remove, so concurrent redemptions of the
 *   same code cannot both get the record
 * - Postgres (DELETE ... RETURNING) and Valkey (GETDEL) backends
 */
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult, with_deadline};
use crate::services::cache::CacheClient;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AuthorizationCodeRecord {
    pub code: String,
    pub sid: Uuid,
    pub exp: DateTime<Utc>,
}

#[async_trait]
pub trait AuthorizationCodeRepo: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn insert(&self, record: &AuthorizationCodeRecord) -> RepoResult<()>;

    // Atomically find and delete the record.
    async fn take(&self, code: &str) -> RepoResult<Option<AuthorizationCodeRecord>>;

    // Delete every record with `exp < now`; returns how many went away.
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepoResult<u64>;
}

#[derive(Clone, Debug)]
pub struct PgAuthorizationCodeRepo {
    pool: PgPool,
    timeout: Duration,
}

impl PgAuthorizationCodeRepo {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl AuthorizationCodeRepo for PgAuthorizationCodeRepo {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, record: &AuthorizationCodeRecord) -> RepoResult<()> {
        with_deadline(self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO authorization_codes (code, sid, exp)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(&record.code)
            .bind(record.sid)
            .bind(record.exp)
            .execute(&self.pool)
            .await?;
            Ok::<_, RepoError>(())
        })
        .await
    }

    async fn take(&self, code: &str) -> RepoResult<Option<AuthorizationCodeRecord>> {
        with_deadline(self.timeout, async {
            let row = sqlx::query_as::<_, AuthorizationCodeRecord>(
                r#"
                DELETE FROM authorization_codes
                WHERE code = $1
                RETURNING code, sid, exp
                "#,
            )
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, RepoError>(row)
        })
        .await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        with_deadline(self.timeout, async {
            let done = sqlx::query(
                r#"
                DELETE FROM authorization_codes
                WHERE exp < $1
                "#,
            )
            .bind(now)
            .execute(&self.pool)
            .await?;
            Ok::<_, RepoError>(done.rows_affected())
        })
        .await
    }
}

// Keys outlive `exp` by this much so that a late redemption still reports
// "expired" instead of "not found".
const EXPIRED_GRACE_SECONDS: i64 = 60;

/// Valkey-backed code store.
///
/// Value layout: `"<sid> <exp unix seconds>"`. Keys carry a native TTL, so
/// the periodic sweep has nothing to do here.
#[derive(Clone)]
pub struct ValkeyAuthorizationCodeRepo<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
    timeout: Duration,
}

impl<C: CacheClient> ValkeyAuthorizationCodeRepo<C> {
    pub fn new(cache: Arc<C>, timeout: Duration) -> Self {
        Self {
            cache,
            prefix: "oidc:ac".to_string(),
            timeout,
        }
    }

    fn key(&self, code: &str) -> String {
        format!("{}:{}", self.prefix, code)
    }
}

fn encode_value(record: &AuthorizationCodeRecord) -> String {
    format!("{} {}", record.sid, record.exp.timestamp())
}

fn decode_value(code: &str, value: &str) -> RepoResult<AuthorizationCodeRecord> {
    let (sid, exp) = value
        .split_once(' ')
        .ok_or_else(|| RepoError::Decode(format!("authorization code value {:?}", value)))?;

    let sid = Uuid::parse_str(sid).map_err(|e| RepoError::Decode(e.to_string()))?;
    let exp = exp
        .parse::<i64>()
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .ok_or_else(|| RepoError::Decode(format!("authorization code exp {:?}", exp)))?;

    Ok(AuthorizationCodeRecord {
        code: code.to_string(),
        sid,
        exp,
    })
}

#[async_trait]
impl<C: CacheClient> AuthorizationCodeRepo for ValkeyAuthorizationCodeRepo<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn insert(&self, record: &AuthorizationCodeRecord) -> RepoResult<()> {
        let ttl = (record.exp - Utc::now() + chrono::Duration::seconds(EXPIRED_GRACE_SECONDS))
            .to_std()
            .unwrap_or(Duration::from_secs(1));

        let created = with_deadline(self.timeout, async {
            Ok::<_, RepoError>(self
                .cache
                .set_if_absent_with_ttl(&self.key(&record.code), &encode_value(record), ttl)
                .await?)
        })
        .await?;

        if !created {
            return Err(RepoError::Conflict);
        }
        Ok(())
    }

    async fn take(&self, code: &str) -> RepoResult<Option<AuthorizationCodeRecord>> {
        let value = with_deadline(self.timeout, async {
            Ok::<_, RepoError>(self.cache.get_and_delete(&self.key(code)).await?)
        })
        .await?;

        value.map(|v| decode_value(code, &v)).transpose()
    }

    async fn delete_expired(&self, _now: DateTime<Utc>) -> RepoResult<u64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::services::cache::{CacheError, client::CacheResult};

    // TTLs are ignored; only the NX / GETDEL semantics matter here.
    #[derive(Clone, Default)]
    struct MapCache(Arc<Mutex<HashMap<String, String>>>);

    #[async_trait]
    impl CacheClient for MapCache {
        fn backend_name(&self) -> &'static str {
            "map"
        }

        async fn set_if_absent_with_ttl(
            &self,
            key: &str,
            value: &str,
            _ttl: Duration,
        ) -> CacheResult<bool> {
            let mut map = self
                .0
                .lock()
                .map_err(|e| CacheError::BackendCommand(e.to_string()))?;
            if map.contains_key(key) {
                return Ok(false);
            }
            map.insert(key.to_string(), value.to_string());
            Ok(true)
        }

        async fn get_and_delete(&self, key: &str) -> CacheResult<Option<String>> {
            Ok(self.0.lock().unwrap().remove(key))
        }
    }

    #[tokio::test]
    async fn valkey_repo_takes_each_code_once() {
        let cache = Arc::new(MapCache::default());
        let repo = ValkeyAuthorizationCodeRepo::new(cache.clone(), Duration::from_secs(1));
        let record = AuthorizationCodeRecord {
            code: "c0de".into(),
            sid: Uuid::new_v4(),
            exp: DateTime::from_timestamp(Utc::now().timestamp() + 60, 0).unwrap(),
        };

        repo.insert(&record).await.unwrap();
        assert!(cache.0.lock().unwrap().contains_key("oidc:ac:c0de"));
        assert!(matches!(repo.insert(&record).await, Err(RepoError::Conflict)));

        assert_eq!(repo.take("c0de").await.unwrap(), Some(record));
        assert_eq!(repo.take("c0de").await.unwrap(), None);
        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 0);
    }

    #[test]
    fn valkey_value_layout_is_stable() {
        let record = AuthorizationCodeRecord {
            code: "abc".into(),
            sid: Uuid::nil(),
            exp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        let value = encode_value(&record);
        assert_eq!(value, "00000000-0000-0000-0000-000000000000 1700000000");
        assert_eq!(decode_value("abc", &value).unwrap(), record);
    }

    #[test]
    fn garbage_valkey_value_is_a_decode_error() {
        assert!(matches!(
            decode_value("abc", "no-space-here"),
            Err(RepoError::Decode(_))
        ));
        assert!(matches!(
            decode_value("abc", "not-a-uuid 1"),
            Err(RepoError::Decode(_))
        ));
    }
}
