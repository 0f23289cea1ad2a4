use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::api::oidc::extractors::AuthCtxExtractor;
use crate::error::AppError;
use crate::services::oidc::OidcError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserInfoQuery {
    pub tenant: Option<String>,
}

/// GET /openidconnect/userinfo?tenant=
pub async fn userinfo(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Query(query): Query<UserInfoQuery>,
) -> Result<Json<Value>, AppError> {
    // Admitted without a session (e.g. authentication not required): nothing to describe.
    let session = ctx.session().ok_or(OidcError::UnauthorizedAccess)?;

    let claims = state
        .userinfo
        .build_userinfo(session, query.tenant.as_deref(), Utc::now())
        .await;
    Ok(Json(Value::Object(claims)))
}
