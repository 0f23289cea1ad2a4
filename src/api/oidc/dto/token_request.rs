use serde::Deserialize;

/// Form body of `POST /openidconnect/token`, branched on `grant_type`.
///
/// - `authorization_code`: `code` (+ optional `client_id`, checked against the code's session)
/// - `refresh_token`: `refresh_token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionRequest {
    pub token: String,
}
