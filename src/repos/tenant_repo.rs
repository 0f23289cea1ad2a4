/*
 * Responsibility
 * - Resolve the full tenant -> resources map of a credentials id
 * - Global roles (tenant IS NULL) land under "*"; "*" is always present
 */
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::repos::error::{RepoError, RepoResult, with_deadline};
use crate::services::session::model::{Authz, GLOBAL_TENANT};

#[async_trait]
pub trait TenantRoleResolver: Send + Sync {
    async fn credentials_authz(&self, credentials_id: &str) -> RepoResult<Authz>;
}

/// Fold tenant memberships and `(tenant, resource)` grants into one map.
///
/// A membership without any granted resource still shows up as an empty set.
pub fn build_authz(tenants: Vec<String>, grants: Vec<(String, Option<String>)>) -> Authz {
    let mut authz = Authz::new();
    authz.entry(GLOBAL_TENANT.to_string()).or_default();

    for tenant in tenants {
        authz.entry(tenant).or_default();
    }
    for (tenant, resource) in grants {
        let resources = authz.entry(tenant).or_default();
        if let Some(resource) = resource {
            resources.insert(resource);
        }
    }

    authz
}

#[derive(Clone, Debug)]
pub struct PgTenantRoleResolver {
    pool: PgPool,
    timeout: Duration,
}

impl PgTenantRoleResolver {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl TenantRoleResolver for PgTenantRoleResolver {
    async fn credentials_authz(&self, credentials_id: &str) -> RepoResult<Authz> {
        with_deadline(self.timeout, async {
            let tenants = sqlx::query_scalar::<_, String>(
                r#"
                SELECT tenant
                FROM credentials_tenants
                WHERE credentials_id = $1
                "#,
            )
            .bind(credentials_id)
            .fetch_all(&self.pool)
            .await?;

            let grants = sqlx::query_as::<_, (String, Option<String>)>(
                r#"
                SELECT COALESCE(cr.tenant, '*') AS tenant, rr.resource
                FROM credentials_roles cr
                LEFT JOIN role_resources rr ON rr.role_id = cr.role_id
                WHERE cr.credentials_id = $1
                "#,
            )
            .bind(credentials_id)
            .fetch_all(&self.pool)
            .await?;

            Ok::<_, RepoError>(build_authz(tenants, grants))
        })
        .await
    }
}
