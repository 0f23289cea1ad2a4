//! Admission decision for private endpoints.
//!
//! Evaluated in order, first match wins:
//! 1. authentication not required: admit
//! 2. resolved session with the superuser or the configured authorization
//!    resource (in any tenant): admit
//! 3. internal API prefix: admit when the shared bearer secret matches, or when
//!    no secret is configured; deny otherwise
//! 4. deny
use crate::config::Config;
use crate::services::session::Session;
use crate::services::session::model::SUPERUSER_RESOURCE;

/// Authorization resource value that admits any authenticated session.
pub const AUTHORIZATION_DISABLED: &str = "DISABLED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Deny,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub require_authentication: bool,
    pub authorization_resource: String,
    pub internal_api_prefix: String,
    pub internal_api_bearer: Option<String>,
    pub allow_access_token_auth: bool,
    pub bearer_realm: String,
}

impl AccessPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            require_authentication: config.require_authentication,
            authorization_resource: config.authorization_resource.clone(),
            internal_api_prefix: config.internal_api_prefix.clone(),
            internal_api_bearer: config.internal_api_bearer.clone(),
            allow_access_token_auth: config.allow_access_token_auth,
            bearer_realm: config.bearer_realm.clone(),
        }
    }

    pub fn decide(
        &self,
        session: Option<&Session>,
        path: &str,
        authorization: Option<&str>,
    ) -> Decision {
        if !self.require_authentication {
            return Decision::Admit;
        }

        if let Some(session) = session {
            if self.authorization_resource == AUTHORIZATION_DISABLED {
                return Decision::Admit;
            }
            let resources = session.all_resources();
            if resources.contains(SUPERUSER_RESOURCE)
                || resources.contains(self.authorization_resource.as_str())
            {
                return Decision::Admit;
            }
        }

        if self.is_internal(path) {
            return match &self.internal_api_bearer {
                None => Decision::Admit,
                Some(secret) => {
                    let expected = format!("Bearer {}", secret);
                    if authorization == Some(expected.as_str()) {
                        Decision::Admit
                    } else {
                        Decision::Deny
                    }
                }
            };
        }

        Decision::Deny
    }

    /// `WWW-Authenticate` value sent with a 401.
    pub fn challenge(&self) -> String {
        format!("Bearer realm=\"{}\"", self.bearer_realm)
    }

    fn is_internal(&self, path: &str) -> bool {
        let prefix = self.internal_api_prefix.trim_end_matches('/');
        !prefix.is_empty()
            && path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn policy() -> AccessPolicy {
        AccessPolicy {
            require_authentication: true,
            authorization_resource: "authz:tenant:access".into(),
            internal_api_prefix: "/internal/v1".into(),
            internal_api_bearer: None,
            allow_access_token_auth: false,
            bearer_realm: "seacat".into(),
        }
    }

    #[test]
    fn superuser_is_admitted() {
        let session = testing::session_with_authz(&[("*", &[SUPERUSER_RESOURCE])]);
        assert_eq!(
            policy().decide(Some(&session), "/openidconnect/userinfo", None),
            Decision::Admit
        );
    }

    #[test]
    fn authorization_resource_in_any_tenant_is_admitted() {
        let session =
            testing::session_with_authz(&[("*", &[]), ("t1", &["authz:tenant:access"])]);
        assert_eq!(policy().decide(Some(&session), "/x", None), Decision::Admit);

        let plain = testing::session_with_authz(&[("*", &["r1"])]);
        assert_eq!(policy().decide(Some(&plain), "/x", None), Decision::Deny);
    }

    #[test]
    fn disabled_authorization_admits_any_session() {
        let mut policy = policy();
        policy.authorization_resource = AUTHORIZATION_DISABLED.into();
        let session = testing::session_with_authz(&[("*", &[])]);
        assert_eq!(policy.decide(Some(&session), "/x", None), Decision::Admit);
        assert_eq!(policy.decide(None, "/x", None), Decision::Deny);
    }

    #[test]
    fn unconfigured_internal_prefix_is_open() {
        assert_eq!(policy().decide(None, "/internal/v1/health", None), Decision::Admit);
        assert_eq!(policy().decide(None, "/internal/v10", None), Decision::Deny);
    }

    #[test]
    fn internal_prefix_requires_the_shared_secret() {
        let mut policy = policy();
        policy.internal_api_bearer = Some("s3cret".into());

        let path = "/internal/v1/health";
        assert_eq!(policy.decide(None, path, Some("Bearer s3cret")), Decision::Admit);
        assert_eq!(policy.decide(None, path, Some("Bearer wrong")), Decision::Deny);
        assert_eq!(policy.decide(None, path, None), Decision::Deny);
    }

    #[test]
    fn authentication_not_required_admits_everything() {
        let mut policy = policy();
        policy.require_authentication = false;
        assert_eq!(policy.decide(None, "/openidconnect/userinfo", None), Decision::Admit);
    }

    #[test]
    fn challenge_names_the_realm() {
        assert_eq!(policy().challenge(), "Bearer realm=\"seacat\"");
    }
}
