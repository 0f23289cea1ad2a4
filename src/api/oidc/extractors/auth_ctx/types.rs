/*
 * Responsibility
 * - What handlers see of the request's authentication
 * - Inserted into request extensions by the auth middleware (private and cookie paths)
 */
use std::sync::Arc;

use crate::services::session::Session;

/// Authentication outcome of the current request.
///
/// `session` is `None` on the cookie path when no session cookie resolved,
/// and on the private path when a request was admitted without a session
/// (internal API secret, authentication not required).
#[derive(Debug, Clone, Default)]
pub struct AuthCtx {
    pub session: Option<Arc<Session>>,
}

impl AuthCtx {
    pub fn new(session: Option<Arc<Session>>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    pub fn has_resource_access(&self, tenant: &str, resource: &str) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.has_resource_access(tenant, resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::model::SUPERUSER_RESOURCE;
    use crate::testing;

    #[test]
    fn no_session_has_no_access() {
        assert!(!AuthCtx::default().has_resource_access("*", "r1"));
    }

    #[test]
    fn access_is_scoped_to_the_tenant() {
        let session = testing::session_with_authz(&[("*", &["r1"]), ("t1", &["r2"])]);
        let ctx = AuthCtx::new(Some(Arc::new(session)));

        assert!(ctx.has_resource_access("t1", "r2"));
        assert!(ctx.has_resource_access("*", "r1"));
        assert!(!ctx.has_resource_access("t1", "r1"));
        assert!(!ctx.has_resource_access("t2", "r2"));
    }

    #[test]
    fn global_superuser_has_access_everywhere() {
        let session = testing::session_with_authz(&[("*", &[SUPERUSER_RESOURCE])]);
        let ctx = AuthCtx::new(Some(Arc::new(session)));

        assert!(ctx.has_resource_access("t9", "anything"));
    }

    #[test]
    fn superuser_outside_the_global_tenant_is_not_global() {
        let session = testing::session_with_authz(&[("t1", &[SUPERUSER_RESOURCE])]);
        let ctx = AuthCtx::new(Some(Arc::new(session)));

        assert!(ctx.has_resource_access("t1", SUPERUSER_RESOURCE));
        assert!(!ctx.has_resource_access("t2", "r1"));
    }
}
