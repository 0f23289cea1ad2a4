//! Session builders.
//!
//! Each builder contributes a disjoint set of fields to the session being
//! constructed. `assemble` folds any number of contributions into one
//! `SessionDraft`; because no two builders touch the same field, the order
//! the contributions arrive in does not matter.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::repos::credentials_repo::CredentialsProvider;
use crate::repos::tenant_repo::TenantRoleResolver;
use crate::services::oidc::OidcError;
use crate::services::random;
use crate::services::session::model::{Authz, LoginDescriptor, SessionDraft};

// The first 16 bytes used to be a cipher IV for encrypted cookies; the
// length is kept so existing cookie consumers keep working.
const COOKIE_ID_LENGTH: usize = 16 + 32;
const ACCESS_TOKEN_LENGTH: usize = 32;

/// One `(field, value)` contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionField {
    CredentialsId(String),
    Username(Option<String>),
    Email(Option<String>),
    Phone(Option<String>),
    CredentialsCreatedAt(Option<DateTime<Utc>>),
    CredentialsModifiedAt(Option<DateTime<Utc>>),
    ExternalLoginOptions(Option<BTreeMap<String, String>>),
    TotpSet(bool),
    AvailableFactors(Vec<String>),
    Authz(Authz),
    LoginDescriptor(LoginDescriptor),
    CookieId(Vec<u8>),
    OAuth2ClientId(String),
    OAuth2Scope(Vec<String>),
    OAuth2AccessToken(Vec<u8>),
}

pub type Contributions = Vec<SessionField>;

impl SessionDraft {
    fn apply(&mut self, field: SessionField) {
        match field {
            SessionField::CredentialsId(v) => self.credentials.id = v,
            SessionField::Username(v) => self.credentials.username = v,
            SessionField::Email(v) => self.credentials.email = v,
            SessionField::Phone(v) => self.credentials.phone = v,
            SessionField::CredentialsCreatedAt(v) => self.credentials.created_at = v,
            SessionField::CredentialsModifiedAt(v) => self.credentials.modified_at = v,
            SessionField::ExternalLoginOptions(v) => {
                self.authentication.external_login_options = v
            }
            SessionField::TotpSet(v) => self.authentication.totp_set = Some(v),
            SessionField::AvailableFactors(v) => self.authentication.available_factors = Some(v),
            SessionField::Authz(v) => self.authorization.authz = Some(v),
            SessionField::LoginDescriptor(v) => self.authentication.login_descriptor = Some(v),
            SessionField::CookieId(v) => self.cookie_id = Some(v),
            SessionField::OAuth2ClientId(v) => self.oauth2.client_id = Some(v),
            SessionField::OAuth2Scope(v) => self.oauth2.scope = Some(v),
            SessionField::OAuth2AccessToken(v) => self.oauth2.access_token = Some(v),
        }
    }
}

/// Merge all builder contributions into one draft.
pub fn assemble<I>(contributions: I) -> SessionDraft
where
    I: IntoIterator<Item = Contributions>,
{
    let mut draft = SessionDraft::default();
    for field in contributions.into_iter().flatten() {
        draft.apply(field);
    }
    draft
}

/// Credentials snapshot: identity, contact data, timestamps, external logins, TOTP flag.
pub async fn credentials_builder(
    provider: &dyn CredentialsProvider,
    credentials_id: &str,
) -> Result<Contributions, OidcError> {
    let credentials = provider
        .get(credentials_id)
        .await?
        .ok_or_else(|| OidcError::CredentialsNotFound(credentials_id.to_string()))?;

    let totp_set = credentials
        .totp_secret
        .as_deref()
        .is_some_and(|secret| !secret.is_empty());

    Ok(vec![
        SessionField::CredentialsId(credentials_id.to_string()),
        SessionField::Username(credentials.username),
        SessionField::Email(credentials.email),
        SessionField::Phone(credentials.phone),
        SessionField::CredentialsCreatedAt(credentials.created_at),
        SessionField::CredentialsModifiedAt(credentials.modified_at),
        SessionField::ExternalLoginOptions(credentials.external_login),
        SessionField::TotpSet(totp_set),
    ])
}

/// Factor types the credentials could log in with, in first-seen order.
///
/// Providers without login descriptors (machine credentials) contribute nothing.
pub async fn available_factors_builder(
    provider: &dyn CredentialsProvider,
    credentials_id: &str,
) -> Result<Contributions, OidcError> {
    let Some(descriptors) = provider.get_login_descriptors(credentials_id).await? else {
        return Ok(Vec::new());
    };

    let mut factors: Vec<String> = Vec::new();
    for factor in descriptors.iter().flat_map(|d| d.factors.iter()) {
        if !factors.contains(&factor.factor_type) {
            factors.push(factor.factor_type.clone());
        }
    }

    Ok(vec![SessionField::AvailableFactors(factors)])
}

/// Full tenant -> resources view of the credentials.
pub async fn authz_builder(
    resolver: &dyn TenantRoleResolver,
    credentials_id: &str,
) -> Result<Contributions, OidcError> {
    let authz = resolver.credentials_authz(credentials_id).await?;
    Ok(vec![SessionField::Authz(authz)])
}

/// Copies the root session's login descriptor; contributes nothing when there is none.
pub fn login_descriptor_builder(login_descriptor: Option<&LoginDescriptor>) -> Contributions {
    login_descriptor
        .cloned()
        .map(SessionField::LoginDescriptor)
        .into_iter()
        .collect()
}

/// Fresh random cookie identity.
pub fn cookie_builder() -> Result<Contributions, OidcError> {
    Ok(vec![SessionField::CookieId(random::token_bytes(
        COOKIE_ID_LENGTH,
    )?)])
}

/// OAuth2 context of a grant-backed session, with a freshly minted opaque access token.
pub fn oauth2_builder(client_id: &str, scope: &[String]) -> Result<Contributions, OidcError> {
    Ok(vec![
        SessionField::OAuth2ClientId(client_id.to_string()),
        SessionField::OAuth2Scope(scope.to_vec()),
        SessionField::OAuth2AccessToken(random::token_bytes(ACCESS_TOKEN_LENGTH)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::memory::{MemoryCredentials, StaticTenantRoles};
    use crate::testing;

    #[test]
    fn merge_is_order_independent() {
        let a = vec![
            SessionField::CredentialsId("c1".into()),
            SessionField::Email(Some("a@example.com".into())),
        ];
        let b = vec![
            SessionField::Authz(testing::authz(&[("*", &["r1"])])),
            SessionField::OAuth2ClientId("client".into()),
        ];

        let ab = assemble([a.clone(), b.clone()]);
        let ba = assemble([b, a]);
        assert_eq!(ab, ba);
        assert_eq!(ab.credentials.id, "c1");
        assert_eq!(ab.oauth2.client_id.as_deref(), Some("client"));
    }

    #[test]
    fn missing_login_descriptor_contributes_nothing() {
        assert!(login_descriptor_builder(None).is_empty());

        let ld = testing::login_descriptor();
        assert_eq!(
            login_descriptor_builder(Some(&ld)),
            vec![SessionField::LoginDescriptor(ld)]
        );
    }

    #[test]
    fn cookie_identities_are_random() {
        let first = assemble([cookie_builder().unwrap()]);
        let second = assemble([cookie_builder().unwrap()]);
        assert_eq!(first.cookie_id.as_ref().map(Vec::len), Some(COOKIE_ID_LENGTH));
        assert_ne!(first.cookie_id, second.cookie_id);
    }

    #[tokio::test]
    async fn credentials_builder_snapshots_record() {
        let provider = MemoryCredentials::with(testing::credentials_record("c1"));
        let draft = assemble([credentials_builder(&provider, "c1").await.unwrap()]);

        assert_eq!(draft.credentials.id, "c1");
        assert_eq!(draft.credentials.username.as_deref(), Some("alice"));
        assert_eq!(draft.authentication.totp_set, Some(true));
        assert!(draft.authorization.authz.is_none());
    }

    #[tokio::test]
    async fn credentials_builder_fails_for_unknown_credentials() {
        let provider = MemoryCredentials::default();
        let err = credentials_builder(&provider, "ghost").await.unwrap_err();
        assert!(matches!(err, OidcError::CredentialsNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn available_factors_are_deduplicated() {
        let provider = MemoryCredentials::with(testing::credentials_record("c1"))
            .with_login_descriptors(
                "c1",
                vec![testing::login_descriptor(), testing::login_descriptor()],
            );
        let draft = assemble([available_factors_builder(&provider, "c1").await.unwrap()]);
        assert_eq!(
            draft.authentication.available_factors,
            Some(vec!["password".to_string(), "totp".to_string()])
        );
    }

    #[tokio::test]
    async fn authz_builder_sets_the_full_map() {
        let resolver =
            StaticTenantRoles::with("c1", testing::authz(&[("*", &["r1"]), ("t1", &["r2"])]));
        let draft = assemble([authz_builder(&resolver, "c1").await.unwrap()]);
        assert_eq!(draft.authorization.authz.unwrap().len(), 2);
    }
}
