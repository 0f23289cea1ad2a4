/*
 * Responsibility
 * - Project a session into OpenID Connect UserInfo claims, scoped to one tenant
 * - Unknown tenant degrades to the global ("*") view with a warning
 * - Last-login enrichment is best effort
 * - Absent values are omitted; timestamps are integer epoch seconds
 */
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use crate::repos::audit_repo::AuditLog;
use crate::services::oidc::OidcError;
use crate::services::session::Session;
use crate::services::session::model::{Authz, GLOBAL_TENANT};

pub type Claims = Map<String, Value>;

pub struct UserInfoAssembler {
    issuer: String,
    audit: Arc<dyn AuditLog>,
}

/// The tenant whose resources are reported.
///
/// No tenant, or a tenant missing from `authz`, is `TenantUnknown`.
pub fn resolve_tenant<'a>(authz: &Authz, requested: Option<&'a str>) -> Result<&'a str, OidcError> {
    match requested {
        Some(tenant) if authz.contains_key(tenant) => Ok(tenant),
        other => Err(OidcError::TenantUnknown(other.map(str::to_string))),
    }
}

fn put<T: Into<Value>>(claims: &mut Claims, name: &str, value: Option<T>) {
    if let Some(value) = value {
        claims.insert(name.to_string(), value.into());
    }
}

fn epoch(t: DateTime<Utc>) -> i64 {
    t.timestamp()
}

impl UserInfoAssembler {
    pub fn new(issuer: String, audit: Arc<dyn AuditLog>) -> Self {
        Self { issuer, audit }
    }

    pub async fn build_userinfo(
        &self,
        session: &Session,
        tenant: Option<&str>,
        now: DateTime<Utc>,
    ) -> Claims {
        let mut claims = Claims::new();
        claims.insert("iss".into(), json!(self.issuer));
        claims.insert("sub".into(), json!(session.credentials.id));
        claims.insert("exp".into(), json!(epoch(session.meta.expires_at)));
        claims.insert("iat".into(), json!(epoch(now)));

        if let Some(client_id) = &session.oauth2.client_id {
            claims.insert("aud".into(), json!(client_id));
            claims.insert("azp".into(), json!(client_id));
        }

        let credentials = &session.credentials;
        put(&mut claims, "preferred_username", credentials.username.clone());
        put(&mut claims, "email", credentials.email.clone());
        put(&mut claims, "phone_number", credentials.phone.clone());
        put(&mut claims, "updated_at", credentials.modified_at.map(epoch));
        put(&mut claims, "created_at", credentials.created_at.map(epoch));

        let authentication = &session.authentication;
        put(&mut claims, "totp_set", authentication.totp_set);
        put(&mut claims, "available_factors", authentication.available_factors.clone());

        if let Some(ld) = &authentication.login_descriptor {
            claims.insert("ldid".into(), json!(ld.id));
            let factors: Vec<&str> = ld.factors.iter().map(|f| f.factor_type.as_str()).collect();
            claims.insert("factors".into(), json!(factors));
        }

        if let Some(options) = &authentication.external_login_options {
            let enabled: Vec<&str> = options
                .iter()
                .filter(|(_, account)| !account.is_empty())
                .map(|(provider, _)| provider.as_str())
                .collect();
            claims.insert("external_login_enabled".into(), json!(enabled));
        }

        put(&mut claims, "resources", session.authorization.resources.clone());

        if let Some(authz) = &session.authorization.authz {
            self.put_authorization(&mut claims, session, authz, tenant);
        }

        // Explicit tenant list wins over the one derived from authz.
        put(&mut claims, "tenants", session.authorization.tenants.clone());

        self.put_last_logins(&mut claims, &session.credentials.id).await;

        claims
    }

    fn put_authorization(
        &self,
        claims: &mut Claims,
        session: &Session,
        authz: &Authz,
        requested: Option<&str>,
    ) {
        claims.insert("authz".into(), json!(authz));

        let tenants: Vec<&str> = authz
            .keys()
            .map(String::as_str)
            .filter(|t| *t != GLOBAL_TENANT)
            .collect();
        if !tenants.is_empty() {
            claims.insert("tenants".into(), json!(tenants));
        }

        let tenant = resolve_tenant(authz, requested).unwrap_or_else(|err| {
            warn!(error = %err, session_id = %session.id(), "falling back to the global tenant");
            GLOBAL_TENANT
        });

        match authz.get(tenant) {
            Some(resources) => {
                claims.insert("resources".into(), json!(resources));
            }
            None => error!(
                session_id = %session.id(),
                credentials_id = %session.credentials.id,
                tenant,
                "resolved tenant missing from authz"
            ),
        }
    }

    async fn put_last_logins(&self, claims: &mut Claims, credentials_id: &str) {
        match self.audit.last_logins(credentials_id).await {
            Ok(Some(last)) => {
                put(claims, "last_failed_login", last.failed_at.map(epoch));
                put(claims, "last_successful_login", last.successful_at.map(epoch));
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, credentials_id, "last login lookup failed"),
        }
    }
}
