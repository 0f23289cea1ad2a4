/*
 * Responsibility
 * - tracing / panic hook setup
 * - Config -> stores -> services -> AppState
 * - Router assembly, background sweep, graceful shutdown
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::oidc::handlers::health::health;
use crate::config::{AuthCodeBackend, Config};
use crate::middleware;
use crate::middleware::auth::policy::AccessPolicy;
use crate::repos::audit_repo::{AuditLog, PgAuditLog};
use crate::repos::auth_code_repo::{
    AuthorizationCodeRepo, PgAuthorizationCodeRepo, ValkeyAuthorizationCodeRepo,
};
use crate::repos::credentials_repo::{CredentialsKind, CredentialsProvider, PgCredentialsProvider};
use crate::repos::session_repo::{PgSessionStore, SessionStore};
use crate::repos::tenant_repo::{PgTenantRoleResolver, TenantRoleResolver};
use crate::services::cache::ValkeyClient;
use crate::services::oidc::auth_code::AuthorizationCodeStore;
use crate::services::oidc::issuer::SessionIssuer;
use crate::services::oidc::keys::SigningKey;
use crate::services::oidc::resolver::TokenResolver;
use crate::services::oidc::userinfo::UserInfoAssembler;
use crate::services::scheduler::Scheduler;
use crate::state::AppState;

const CODE_SWEEP_PERIOD: Duration = Duration::from_secs(60);

fn init_tracing() {
    // RUST_LOG=info,seacat_oidc=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr may be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

/// Everything the services persist through.
pub struct Stores {
    pub credentials: Arc<dyn CredentialsProvider>,
    pub tenants: Arc<dyn TenantRoleResolver>,
    pub sessions: Arc<dyn SessionStore>,
    pub audit: Arc<dyn AuditLog>,
    pub codes: Arc<AuthorizationCodeStore>,
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    info!("starting in {:?} mode on {}", config.app_env, config.addr);

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;

    let key = Arc::new(SigningKey::load_or_provision(
        &config.private_key_path,
        config.provisioning,
    )?);

    let code_repo: Arc<dyn AuthorizationCodeRepo> = match config.auth_code_backend {
        AuthCodeBackend::Postgres => {
            Arc::new(PgAuthorizationCodeRepo::new(pool.clone(), config.store_timeout))
        }
        AuthCodeBackend::Valkey => {
            let url = config
                .valkey_url
                .as_deref()
                .context("VALKEY_URL is required for the valkey code backend")?;
            let client = Arc::new(ValkeyClient::new(url).await?);
            Arc::new(ValkeyAuthorizationCodeRepo::new(client, config.store_timeout))
        }
    };
    info!(backend = code_repo.backend_name(), "authorization code store ready");

    let credentials_kind = if config.m2m_credentials {
        CredentialsKind::Machine
    } else {
        CredentialsKind::Regular
    };

    let stores = Stores {
        credentials: Arc::new(PgCredentialsProvider::new(
            pool.clone(),
            credentials_kind,
            config.store_timeout,
        )),
        tenants: Arc::new(PgTenantRoleResolver::new(pool.clone(), config.store_timeout)),
        sessions: Arc::new(PgSessionStore::new(pool.clone(), config.store_timeout)),
        audit: Arc::new(PgAuditLog::new(pool, config.store_timeout)),
        codes: Arc::new(AuthorizationCodeStore::new(code_repo, config.auth_code_timeout)),
    };

    info!(
        provider = stores.credentials.provider_type(),
        "credentials provider ready"
    );

    let mut scheduler = Scheduler::new();
    scheduler.register(CODE_SWEEP_PERIOD, stores.codes.clone());

    let state = build_state(&config, stores, key);
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    info!("stopped");
    Ok(())
}

pub fn build_state(config: &Config, stores: Stores, key: Arc<SigningKey>) -> AppState {
    let resolver = TokenResolver::new(
        key.clone(),
        &config.issuer,
        config.id_token_leeway_seconds,
        stores.sessions.clone(),
    );

    let issuer = SessionIssuer::new(
        stores.credentials.clone(),
        stores.tenants,
        stores.sessions.clone(),
        stores.codes,
        key.clone(),
        config.issuer.clone(),
        config.session_expiration,
    );

    AppState {
        policy: Arc::new(AccessPolicy::from_config(config)),
        resolver: Arc::new(resolver),
        issuer: Arc::new(issuer),
        userinfo: Arc::new(UserInfoAssembler::new(config.issuer.clone(), stores.audit)),
        credentials: stores.credentials,
        sessions: stores.sessions,
        key,
        cookie_name: Arc::from(config.cookie_name.as_str()),
    }
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/openidconnect", api::oidc::routes(state.clone()))
        .nest(
            &config.internal_api_prefix,
            api::oidc::internal_routes(state.clone()),
        )
        .with_state(state);

    middleware::http::apply(router, config.request_timeout)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
