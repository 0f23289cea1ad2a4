//! ID token claims and their mapping to and from a session.
//!
//! The ID token carries enough of the session to rebuild a session view
//! without a store lookup.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::oidc::OidcError;
use crate::services::session::model::{
    AuthenticationInfo, AuthorizationInfo, Authz, CredentialsInfo, LoginDescriptor, OAuth2Info,
    OPENID_CONNECT_SESSION_TYPE,
};
use crate::services::session::{Session, SessionMeta};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub exp: i64,
    pub iat: i64,

    pub sid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psid: Option<Uuid>,
    #[serde(default = "default_session_type")]
    pub styp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ld: Option<LoginDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_factors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_login_options: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_set: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authz: Option<Authz>,
}

fn default_session_type() -> String {
    OPENID_CONNECT_SESSION_TYPE.to_string()
}

fn from_epoch(seconds: i64) -> Result<DateTime<Utc>, OidcError> {
    DateTime::from_timestamp(seconds, 0).ok_or(OidcError::TokenMalformed)
}

impl IdTokenClaims {
    /// Claims for `session`; the token expires together with the session.
    pub fn for_session(session: &Session, issuer: &str, now: DateTime<Utc>) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: session.credentials.id.clone(),
            exp: session.meta.expires_at.timestamp(),
            iat: now.timestamp(),
            sid: session.id(),
            psid: session.meta.parent_session_id,
            styp: session.meta.session_type.clone(),
            aud: session.oauth2.client_id.clone(),
            azp: session.oauth2.client_id.clone(),
            scope: session.oauth2.scope.clone(),
            preferred_username: session.credentials.username.clone(),
            email: session.credentials.email.clone(),
            phone_number: session.credentials.phone.clone(),
            created_at: session.credentials.created_at.map(|t| t.timestamp()),
            updated_at: session.credentials.modified_at.map(|t| t.timestamp()),
            ld: session.authentication.login_descriptor.clone(),
            available_factors: session.authentication.available_factors.clone(),
            external_login_options: session.authentication.external_login_options.clone(),
            totp_set: session.authentication.totp_set,
            authz: session.authorization.authz.clone(),
        }
    }
}

impl TryFrom<IdTokenClaims> for Session {
    type Error = OidcError;

    fn try_from(claims: IdTokenClaims) -> Result<Self, Self::Error> {
        if claims.sub.trim().is_empty() {
            return Err(OidcError::TokenMalformed);
        }

        let meta = SessionMeta {
            id: claims.sid,
            session_type: claims.styp,
            parent_session_id: claims.psid,
            created_at: from_epoch(claims.iat)?,
            expires_at: from_epoch(claims.exp)?,
        };

        Ok(Session {
            meta,
            credentials: CredentialsInfo {
                id: claims.sub,
                username: claims.preferred_username,
                email: claims.email,
                phone: claims.phone_number,
                created_at: claims.created_at.map(from_epoch).transpose()?,
                modified_at: claims.updated_at.map(from_epoch).transpose()?,
            },
            authentication: AuthenticationInfo {
                login_descriptor: claims.ld,
                available_factors: claims.available_factors,
                external_login_options: claims.external_login_options,
                totp_set: claims.totp_set,
            },
            authorization: AuthorizationInfo {
                authz: claims.authz,
                tenants: None,
                resources: None,
            },
            oauth2: OAuth2Info {
                client_id: claims.azp.or(claims.aud),
                scope: claims.scope,
                access_token: None,
            },
            cookie_id: None,
        })
    }
}
