//! Session record and its claim groups.
//!
//! A session is assembled from a `SessionDraft` (what the builders produced)
//! plus `SessionMeta` (what the session store assigned when persisting it).
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant name (`"*"` = global) -> resources granted in that tenant.
pub type Authz = BTreeMap<String, BTreeSet<String>>;

pub const GLOBAL_TENANT: &str = "*";
pub const SUPERUSER_RESOURCE: &str = "authz:superuser";

pub const OPENID_CONNECT_SESSION_TYPE: &str = "openidconnect";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginFactor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub factor_type: String,
}

/// Which login descriptor (and which factors, in order) the user logged in with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginDescriptor {
    pub id: String,
    #[serde(default)]
    pub factors: Vec<LoginFactor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    pub id: Uuid,
    pub session_type: String,
    pub parent_session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsInfo {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationInfo {
    pub login_descriptor: Option<LoginDescriptor>,
    pub available_factors: Option<Vec<String>>,
    // provider name -> linked account id (empty when not linked)
    pub external_login_options: Option<BTreeMap<String, String>>,
    pub totp_set: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationInfo {
    pub authz: Option<Authz>,
    pub tenants: Option<Vec<String>>,
    pub resources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Info {
    pub client_id: Option<String>,
    pub scope: Option<Vec<String>>,
    // Raw token bytes; persisted in its own indexed column, not in the JSON blob.
    #[serde(skip)]
    pub access_token: Option<Vec<u8>>,
}

/// Everything the builder pipeline produces for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub credentials: CredentialsInfo,
    pub authentication: AuthenticationInfo,
    pub authorization: AuthorizationInfo,
    pub oauth2: OAuth2Info,
    // Persisted in its own indexed column, like the access token.
    #[serde(skip)]
    pub cookie_id: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub meta: SessionMeta,
    pub credentials: CredentialsInfo,
    pub authentication: AuthenticationInfo,
    pub authorization: AuthorizationInfo,
    pub oauth2: OAuth2Info,
    pub cookie_id: Option<Vec<u8>>,
}

impl Session {
    pub fn from_parts(meta: SessionMeta, draft: SessionDraft) -> Self {
        Self {
            meta,
            credentials: draft.credentials,
            authentication: draft.authentication,
            authorization: draft.authorization,
            oauth2: draft.oauth2,
            cookie_id: draft.cookie_id,
        }
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    /// Union of the resources granted across all tenants.
    pub fn all_resources(&self) -> BTreeSet<&str> {
        self.authorization
            .authz
            .iter()
            .flat_map(|authz| authz.values())
            .flat_map(|resources| resources.iter().map(String::as_str))
            .collect()
    }

    /// Whether `resource` is granted to this session within `tenant`.
    ///
    /// A global superuser has access to everything.
    pub fn has_resource_access(&self, tenant: &str, resource: &str) -> bool {
        let Some(authz) = &self.authorization.authz else {
            return false;
        };

        if authz
            .get(GLOBAL_TENANT)
            .is_some_and(|global| global.contains(SUPERUSER_RESOURCE))
        {
            return true;
        }

        authz
            .get(tenant)
            .is_some_and(|resources| resources.contains(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn resource_union_spans_all_tenants() {
        let session = testing::session_with_authz(&[("*", &["r1"]), ("t1", &["r2", "r1"])]);
        let all: Vec<&str> = session.all_resources().into_iter().collect();
        assert_eq!(all, vec!["r1", "r2"]);
    }

    #[test]
    fn resource_access_is_tenant_scoped() {
        let session = testing::session_with_authz(&[("*", &["r1"]), ("t1", &["r2"])]);
        assert!(session.has_resource_access("t1", "r2"));
        assert!(!session.has_resource_access("t2", "r2"));
        assert!(!session.has_resource_access("t1", "r1"));
    }

    #[test]
    fn global_superuser_has_access_everywhere() {
        let session = testing::session_with_authz(&[("*", &[SUPERUSER_RESOURCE])]);
        assert!(session.has_resource_access("any-tenant", "anything"));
    }

    #[test]
    fn session_without_authz_has_no_access() {
        let mut session = testing::session_with_authz(&[]);
        session.authorization.authz = None;
        assert!(!session.has_resource_access("*", "r1"));
        assert!(session.all_resources().is_empty());
    }
}
