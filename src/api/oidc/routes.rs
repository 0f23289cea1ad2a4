/*
 * Responsibility
 * - URL layout of /openidconnect and the internal API
 * - Which auth layer guards which route:
 *   - cookie (public, never rejects): authorize, token, public_keys
 *   - access (bearer + admission): userinfo, introspection, internal API
 *     (health, credentials registration)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::oidc::handlers::{
    authorize::authorize, credentials::register_credentials, health::health,
    public_keys::public_keys, token::introspect, token::token, userinfo::userinfo,
};
use crate::middleware::auth::{access, cookie};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/public_keys", get(public_keys));
    let public = cookie::apply(public, state.clone());

    let private = Router::new()
        .route("/userinfo", get(userinfo).post(userinfo))
        .route("/token/introspect", post(introspect));
    let private = access::apply(private, state);

    public.merge(private)
}

pub fn internal_routes(state: AppState) -> Router<AppState> {
    let internal = Router::new()
        .route("/health", get(health))
        .route("/credentials", post(register_credentials));
    access::apply(internal, state)
}
