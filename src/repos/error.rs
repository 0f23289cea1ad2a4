/*
 * Responsibility
 * - What a repo reports upward
 * - Bounded deadlines for store calls (timeouts surface as retryable errors)
 */
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::services::cache::CacheError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("key already exists")]
    Conflict,

    #[error("invalid stored value: {0}")]
    Decode(String),
}

impl RepoError {
    /// Timeouts and backend hiccups; the caller may try again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepoError::Timeout(_) | RepoError::Cache(_) => true,
            RepoError::Db(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            RepoError::Conflict | RepoError::Decode(_) => false,
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> RepoResult<T>
where
    F: Future<Output = RepoResult<T>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| RepoError::Timeout(deadline))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_store_call_times_out_as_retryable() {
        let res: RepoResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = res.unwrap_err();
        assert!(matches!(err, RepoError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn fast_store_call_passes_through() {
        let res = with_deadline(Duration::from_secs(1), async { Ok::<_, RepoError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
