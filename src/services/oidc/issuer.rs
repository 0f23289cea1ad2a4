/*
 * Responsibility
 * - Derive a scope-bound session from an authenticated root session
 *   (builders run against the root's credentials, then the session store persists it)
 * - Authorization code orchestration for the code grant
 * - ID token issuance for a session
 * - Refresh / introspection: explicit NotImplemented
 */
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::repos::credentials_repo::CredentialsProvider;
use crate::repos::session_repo::{NewSession, SessionStore};
use crate::repos::tenant_repo::TenantRoleResolver;
use crate::services::oidc::OidcError;
use crate::services::oidc::auth_code::AuthorizationCodeStore;
use crate::services::oidc::id_token::IdTokenClaims;
use crate::services::oidc::keys::SigningKey;
use crate::services::session::Session;
use crate::services::session::builders::{
    assemble, authz_builder, available_factors_builder, cookie_builder, credentials_builder,
    login_descriptor_builder, oauth2_builder,
};
use crate::services::session::model::OPENID_CONNECT_SESSION_TYPE;

pub struct SessionIssuer {
    credentials: Arc<dyn CredentialsProvider>,
    tenants: Arc<dyn TenantRoleResolver>,
    sessions: Arc<dyn SessionStore>,
    codes: Arc<AuthorizationCodeStore>,
    key: Arc<SigningKey>,
    issuer: String,
    default_expiration: Duration,
}

impl SessionIssuer {
    pub fn new(
        credentials: Arc<dyn CredentialsProvider>,
        tenants: Arc<dyn TenantRoleResolver>,
        sessions: Arc<dyn SessionStore>,
        codes: Arc<AuthorizationCodeStore>,
        key: Arc<SigningKey>,
        issuer: String,
        default_expiration: std::time::Duration,
    ) -> Self {
        Self {
            credentials,
            tenants,
            sessions,
            codes,
            key,
            issuer,
            default_expiration: Duration::from_std(default_expiration)
                .unwrap_or(Duration::hours(1)),
        }
    }

    pub async fn create_derived_session(
        &self,
        root: &Session,
        client_id: &str,
        scope: &[String],
        requested_expiration: Option<DateTime<Utc>>,
    ) -> Result<Session, OidcError> {
        let credentials_id = root.credentials.id.as_str();

        let (credentials, factors, authz) = tokio::try_join!(
            credentials_builder(self.credentials.as_ref(), credentials_id),
            available_factors_builder(self.credentials.as_ref(), credentials_id),
            authz_builder(self.tenants.as_ref(), credentials_id),
        )?;

        let draft = assemble([
            credentials,
            factors,
            authz,
            login_descriptor_builder(root.authentication.login_descriptor.as_ref()),
            cookie_builder()?,
            oauth2_builder(client_id, scope)?,
        ]);

        let expires_at = derived_expiration(
            Utc::now(),
            root.meta.expires_at,
            requested_expiration,
            self.default_expiration,
        );

        let session = self
            .sessions
            .create(NewSession {
                session_type: OPENID_CONNECT_SESSION_TYPE.to_string(),
                parent_session_id: Some(root.id()),
                expires_at,
                draft,
            })
            .await?;

        info!(
            session_id = %session.id(),
            parent_session_id = %root.id(),
            client_id,
            "derived session created"
        );
        Ok(session)
    }

    /// A derived session whose code cannot be issued is unreachable, so it is deleted.
    pub async fn generate_authorization_code(&self, session_id: Uuid) -> Result<String, OidcError> {
        match self.codes.issue(session_id, Utc::now()).await {
            Ok(code) => Ok(code),
            Err(err) => {
                if let Err(delete_err) = self.sessions.delete(session_id).await {
                    warn!(
                        %session_id,
                        error = %delete_err,
                        "failed to discard session without a code"
                    );
                }
                Err(err)
            }
        }
    }

    pub async fn redeem_authorization_code(&self, code: &str) -> Result<Uuid, OidcError> {
        self.codes.redeem(code, Utc::now()).await
    }

    pub async fn session(&self, session_id: Uuid) -> Result<Session, OidcError> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or(OidcError::SessionNotFound)
    }

    pub fn issue_id_token(&self, session: &Session) -> Result<String, OidcError> {
        self.key
            .sign(&IdTokenClaims::for_session(session, &self.issuer, Utc::now()))
    }

    pub async fn refresh_token(&self, _refresh_token: &str) -> Result<Session, OidcError> {
        Err(OidcError::NotImplemented("refresh_token grant"))
    }

    pub async fn check_access_token(&self, _access_token: &str) -> Result<Session, OidcError> {
        Err(OidcError::NotImplemented("access token introspection"))
    }
}

/// A requested expiration is honored only if it is in the future and does not
/// outlive the root session. The default is clamped to the root as well.
fn derived_expiration(
    now: DateTime<Utc>,
    root_expires_at: DateTime<Utc>,
    requested: Option<DateTime<Utc>>,
    default: Duration,
) -> DateTime<Utc> {
    match requested {
        Some(requested) if requested > now && requested <= root_expires_at => requested,
        _ => (now + default).min(root_expires_at),
    }
}
