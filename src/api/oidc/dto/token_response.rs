use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// Opaque access token, URL-safe base64.
    pub access_token: String,
    pub id_token: String,
    /// Always "Bearer"
    pub token_type: &'static str,
    /// Seconds until the session (and both tokens) expire.
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}
