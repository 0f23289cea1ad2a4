//! Shared test fixtures.
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::app::Stores;
use crate::config::{AppEnv, AuthCodeBackend, Config};
use crate::repos::credentials_repo::CredentialsRecord;
use crate::repos::memory::{
    MemoryAudit, MemoryAuthCodeRepo, MemoryCredentials, MemorySessionStore, StaticTenantRoles,
};
use crate::services::oidc::auth_code::AuthorizationCodeStore;
use crate::services::session::model::{
    AuthenticationInfo, AuthorizationInfo, Authz, CredentialsInfo, LoginDescriptor, LoginFactor,
    OAuth2Info, OPENID_CONNECT_SESSION_TYPE,
};
use crate::services::session::{Session, SessionMeta};

// Created by the login flow, which lives outside this crate.
const ROOT_SESSION_TYPE: &str = "root";

pub fn authz(entries: &[(&str, &[&str])]) -> Authz {
    entries
        .iter()
        .map(|(tenant, resources)| {
            let resources: BTreeSet<String> = resources.iter().map(|r| r.to_string()).collect();
            (tenant.to_string(), resources)
        })
        .collect()
}

pub fn login_descriptor() -> LoginDescriptor {
    LoginDescriptor {
        id: "default".into(),
        factors: vec![
            LoginFactor {
                id: None,
                factor_type: "password".into(),
            },
            LoginFactor {
                id: Some("totp".into()),
                factor_type: "totp".into(),
            },
        ],
    }
}

pub fn credentials_record(id: &str) -> CredentialsRecord {
    CredentialsRecord {
        id: id.to_string(),
        username: Some("alice".into()),
        email: Some("alice@example.com".into()),
        phone: None,
        created_at: Some(Utc::now() - chrono::Duration::days(30)),
        modified_at: Some(Utc::now() - chrono::Duration::days(1)),
        external_login: None,
        totp_secret: Some("JBSWY3DPEHPK3PXP".into()),
    }
}

fn meta(session_type: &str, parent: Option<Uuid>, lifetime: chrono::Duration) -> SessionMeta {
    let now = Utc::now();
    SessionMeta {
        id: Uuid::new_v4(),
        session_type: session_type.to_string(),
        parent_session_id: parent,
        created_at: now,
        expires_at: now + lifetime,
    }
}

/// Derived session for credentials "c1" with the given authz.
pub fn session_with_authz(entries: &[(&str, &[&str])]) -> Session {
    Session {
        meta: meta(
            OPENID_CONNECT_SESSION_TYPE,
            Some(Uuid::new_v4()),
            chrono::Duration::hours(1),
        ),
        credentials: CredentialsInfo {
            id: "c1".into(),
            username: Some("alice".into()),
            email: Some("alice@example.com".into()),
            ..Default::default()
        },
        authentication: AuthenticationInfo::default(),
        authorization: AuthorizationInfo {
            authz: Some(authz(entries)),
            ..Default::default()
        },
        oauth2: OAuth2Info {
            client_id: Some("client-1".into()),
            scope: Some(vec!["openid".into()]),
            access_token: None,
        },
        cookie_id: None,
    }
}

pub fn derived_session() -> Session {
    let mut session = session_with_authz(&[("*", &["r1"]), ("t1", &["r2"])]);
    session.authentication.login_descriptor = Some(login_descriptor());
    session.authentication.totp_set = Some(true);
    session.oauth2.access_token = Some(vec![42; 32]);
    session
}

/// Cookie-backed root session of `credentials_id`, as a login would leave it.
pub fn root_session(credentials_id: &str) -> Session {
    Session {
        meta: meta(ROOT_SESSION_TYPE, None, chrono::Duration::hours(8)),
        credentials: CredentialsInfo {
            id: credentials_id.to_string(),
            ..Default::default()
        },
        authentication: AuthenticationInfo {
            login_descriptor: Some(login_descriptor()),
            ..Default::default()
        },
        authorization: AuthorizationInfo::default(),
        oauth2: OAuth2Info::default(),
        cookie_id: Some(vec![9; 48]),
    }
}

pub fn config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        app_env: AppEnv::Development,
        database_url: "postgres://unused@localhost/unused".into(),
        database_max_connections: 1,
        issuer: "auth.example.com".into(),
        bearer_realm: "test".into(),
        auth_code_timeout: Duration::from_secs(60),
        auth_code_backend: AuthCodeBackend::Postgres,
        valkey_url: None,
        private_key_path: PathBuf::from("unused.pem"),
        provisioning: false,
        allow_access_token_auth: false,
        require_authentication: true,
        authorization_resource: "authz:superuser".into(),
        internal_api_prefix: "/internal/v1".into(),
        internal_api_bearer: None,
        session_expiration: Duration::from_secs(3600),
        id_token_leeway_seconds: 0,
        store_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(5),
        cookie_name: "SeaCatSCI".into(),
        m2m_credentials: false,
    }
}

/// In-memory stores knowing credentials "c1"; the session store is handed back for seeding.
pub fn memory_stores() -> (Stores, Arc<MemorySessionStore>) {
    let sessions = Arc::new(MemorySessionStore::default());
    let credentials = MemoryCredentials::with(credentials_record("c1"))
        .with_login_descriptors("c1", vec![login_descriptor()]);
    let tenants = StaticTenantRoles::with("c1", authz(&[("*", &["r1"]), ("t1", &["r2"])]));

    let stores = Stores {
        credentials: Arc::new(credentials),
        tenants: Arc::new(tenants),
        sessions: sessions.clone(),
        audit: Arc::new(MemoryAudit::default()),
        codes: Arc::new(AuthorizationCodeStore::new(
            Arc::new(MemoryAuthCodeRepo::default()),
            Duration::from_secs(60),
        )),
    };
    (stores, sessions)
}
