/*
 * Responsibility
 * - Bearer credential -> Session
 *   - ID token: ES256 signature + exp + iss, claims rebuilt into a session (stateless)
 *   - opaque access token: base64url bytes looked up in the session store (revocable)
 * - Which path to try is the caller's decision
 */
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use tracing::debug;

use crate::repos::session_repo::SessionStore;
use crate::services::oidc::OidcError;
use crate::services::oidc::id_token::IdTokenClaims;
use crate::services::oidc::keys::SigningKey;
use crate::services::session::Session;

pub struct TokenResolver {
    key: Arc<SigningKey>,
    validation: Validation,
    sessions: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResolver")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenResolver {
    pub fn new(
        key: Arc<SigningKey>,
        issuer: &str,
        leeway_seconds: u64,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // `aud` is the requesting client, which varies per token.
        validation.validate_aud = false;
        validation.leeway = leeway_seconds;

        Self {
            key,
            validation,
            sessions,
        }
    }

    pub fn session_from_id_token(&self, token: &str) -> Result<Session, OidcError> {
        let data = jsonwebtoken::decode::<IdTokenClaims>(
            token,
            self.key.decoding_key(),
            &self.validation,
        )
        .map_err(|e| {
            debug!(error = %e, "id token rejected");
            match e.kind() {
                ErrorKind::InvalidSignature => OidcError::TokenInvalidSignature,
                ErrorKind::ExpiredSignature => OidcError::TokenExpired,
                _ => OidcError::TokenMalformed,
            }
        })?;

        Session::try_from(data.claims)
    }

    pub async fn session_from_access_token(&self, token: &str) -> Result<Session, OidcError> {
        let access_token = decode_opaque(token)?;
        self.sessions
            .get_by_access_token(&access_token)
            .await?
            .ok_or(OidcError::SessionNotFound)
    }
}

/// URL-safe base64, with or without padding.
pub fn decode_opaque(token: &str) -> Result<Vec<u8>, OidcError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim_end_matches('='))
        .map_err(|_| OidcError::TokenMalformed)?;
    if bytes.is_empty() {
        return Err(OidcError::TokenMalformed);
    }
    Ok(bytes)
}
