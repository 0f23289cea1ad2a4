/*
 * Responsibility
 * - Load settings from the environment (.env supported via dotenvy)
 * - Validate values and fail startup when something required is missing
 */
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Where authorization codes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCodeBackend {
    Postgres,
    Valkey,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub database_url: String,
    pub database_max_connections: u32,

    pub issuer: String,
    pub bearer_realm: String,

    pub auth_code_timeout: Duration,
    pub auth_code_backend: AuthCodeBackend,
    pub valkey_url: Option<String>,

    // EC P-256 private key (PKCS#8 PEM). Generated in provisioning mode if missing.
    pub private_key_path: PathBuf,
    pub provisioning: bool,

    pub allow_access_token_auth: bool,
    pub require_authentication: bool,
    pub authorization_resource: String,
    pub internal_api_prefix: String,
    pub internal_api_bearer: Option<String>,

    pub session_expiration: Duration,
    pub id_token_leeway_seconds: u64,
    pub store_timeout: Duration,
    pub request_timeout: Duration,

    pub cookie_name: String,
    pub m2m_credentials: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8900);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let database_max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10)?;

        let issuer = match non_empty_var("OIDC_ISSUER") {
            Some(issuer) => issuer,
            None => {
                let base_url = non_empty_var("PUBLIC_BASE_URL")
                    .ok_or(ConfigError::Missing("OIDC_ISSUER"))?;
                let issuer = derive_issuer(&base_url)?;
                warn!(
                    issuer = %issuer,
                    "OIDC_ISSUER not specified, derived it from PUBLIC_BASE_URL"
                );
                issuer
            }
        };

        let bearer_realm = env::var("BEARER_REALM").unwrap_or_else(|_| "seacat".to_string());

        let auth_code_timeout = Duration::from_secs(env_parse("AUTH_CODE_TIMEOUT_SECONDS", 60)?);

        let auth_code_backend = match env::var("AUTH_CODE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => AuthCodeBackend::Postgres,
            "valkey" | "redis" => AuthCodeBackend::Valkey,
            _ => return Err(ConfigError::Invalid("AUTH_CODE_BACKEND")),
        };

        let valkey_url = non_empty_var("VALKEY_URL");
        if auth_code_backend == AuthCodeBackend::Valkey && valkey_url.is_none() {
            return Err(ConfigError::Missing("VALKEY_URL"));
        }

        let private_key_path = PathBuf::from(
            non_empty_var("OIDC_PRIVATE_KEY_PATH").unwrap_or_else(|| "private-key.pem".to_string()),
        );
        let provisioning = env_bool("APP_PROVISIONING", false)?;

        let allow_access_token_auth = env_bool("ALLOW_ACCESS_TOKEN_AUTH", false)?;
        let require_authentication = env_bool("REQUIRE_AUTHENTICATION", true)?;
        let authorization_resource = env::var("AUTHORIZATION_RESOURCE")
            .unwrap_or_else(|_| "authz:superuser".to_string());

        let internal_api_prefix =
            env::var("INTERNAL_API_PREFIX").unwrap_or_else(|_| "/internal/v1".to_string());
        if !internal_api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid("INTERNAL_API_PREFIX"));
        }
        let internal_api_bearer = non_empty_var("INTERNAL_API_BEARER");

        let session_expiration =
            Duration::from_secs(env_parse("SESSION_EXPIRATION_SECONDS", 4 * 60 * 60)?);
        let id_token_leeway_seconds = env_parse("ID_TOKEN_LEEWAY_SECONDS", 0)?;
        let store_timeout = Duration::from_millis(env_parse("STORE_TIMEOUT_MS", 5_000)?);
        let request_timeout = Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECONDS", 30)?);

        let cookie_name = env::var("COOKIE_NAME").unwrap_or_else(|_| "SeaCatSCI".to_string());
        let m2m_credentials = env_bool("M2M_CREDENTIALS", false)?;

        Ok(Config {
            addr,
            app_env,
            database_url,
            database_max_connections,
            issuer,
            bearer_realm,
            auth_code_timeout,
            auth_code_backend,
            valkey_url,
            private_key_path,
            provisioning,
            allow_access_token_auth,
            require_authentication,
            authorization_resource,
            internal_api_prefix,
            internal_api_bearer,
            session_expiration,
            id_token_leeway_seconds,
            store_timeout,
            request_timeout,
            cookie_name,
            m2m_credentials,
        })
    }
}

/// Issuer fallback: the `host[:port]` part of the public base URL.
pub fn derive_issuer(base_url: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(base_url).map_err(|_| ConfigError::Invalid("PUBLIC_BASE_URL"))?;
    let host = url
        .host_str()
        .ok_or(ConfigError::Invalid("PUBLIC_BASE_URL"))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty_var(key) {
        Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_is_derived_from_host_and_port() {
        assert_eq!(
            derive_issuer("https://auth.example.com/seacat/").unwrap(),
            "auth.example.com"
        );
        assert_eq!(
            derive_issuer("http://localhost:8080").unwrap(),
            "localhost:8080"
        );
        assert!(derive_issuer("not a url").is_err());
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
