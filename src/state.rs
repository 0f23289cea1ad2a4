/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 * - Clone is cheap: everything behind Arc
 */
use std::sync::Arc;

use crate::middleware::auth::policy::AccessPolicy;
use crate::repos::credentials_repo::CredentialsProvider;
use crate::repos::session_repo::SessionStore;
use crate::services::oidc::issuer::SessionIssuer;
use crate::services::oidc::keys::SigningKey;
use crate::services::oidc::resolver::TokenResolver;
use crate::services::oidc::userinfo::UserInfoAssembler;

#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<AccessPolicy>,
    pub resolver: Arc<TokenResolver>,
    pub issuer: Arc<SessionIssuer>,
    pub userinfo: Arc<UserInfoAssembler>,
    pub credentials: Arc<dyn CredentialsProvider>,
    pub sessions: Arc<dyn SessionStore>,
    pub key: Arc<SigningKey>,
    pub cookie_name: Arc<str>,
}
