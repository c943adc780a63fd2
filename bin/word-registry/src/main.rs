//! # Word Registry Binary
//!
//! The entry point that assembles the application based on compile-time
//! features.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use async_trait::async_trait;

use wr_api::handlers::AppState;
use wr_api::{configure_routes, middleware};
use wr_core::content_gate::{ContentGate, GatePolicy};
use wr_core::moderation::ModerationEngine;
use wr_core::ownership::OwnershipEngine;
use wr_core::traits::{ContentClassifier, ToxicityScores};

// Feature-gated imports
#[cfg(feature = "db-sqlite")]
use wr_db_sqlite::SqliteWordStore;

#[cfg(feature = "auth-simple")]
use wr_auth_simple::SimpleAdminAuth;

/// Application settings loaded from environment variables (and `.env`).
struct Settings {
    database_url: String,
    bind_addr: String,
    report_threshold: i64,
    admin_token_hash: String,
    ip_salt: String,
}

impl Settings {
    fn from_env() -> Self {
        let env_or = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
        Settings {
            database_url: env_or("DATABASE_URL", "sqlite:word_registry.db"),
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:8080"),
            report_threshold: env_or("REPORT_THRESHOLD", "3").parse().unwrap_or(3),
            admin_token_hash: env_or("ADMIN_TOKEN_HASH", ""),
            ip_salt: env_or("IP_HASH_SALT", "word-registry"),
        }
    }
}

/// Stand-in oracle for deployments without a toxicity scorer: every text
/// scores zero, so only the Content Gate's formal rules apply.
struct NeutralClassifier;

#[async_trait]
impl ContentClassifier for NeutralClassifier {
    async fn score(&self, _text: &str) -> anyhow::Result<ToxicityScores> {
        Ok(ToxicityScores::default())
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env();
    if settings.admin_token_hash.is_empty() {
        log::warn!("ADMIN_TOKEN_HASH not set; all admin endpoints will deny access");
    }

    // 1. Initialize database implementation
    #[cfg(feature = "db-sqlite")]
    let store = Arc::new(
        SqliteWordStore::new(&settings.database_url)
            .await
            .expect("Failed to init SQLite"),
    );

    // 2. Initialize admin auth implementation
    #[cfg(feature = "auth-simple")]
    let auth = Arc::new(SimpleAdminAuth::new(&settings.admin_token_hash));

    // 3. Construct the Content Gate with an injected classifier
    let gate = ContentGate::new(Arc::new(NeutralClassifier), GatePolicy::default());

    // 4. Wrap engines and ports in AppState
    let state = web::Data::new(AppState {
        ownership: OwnershipEngine::new(store.clone(), gate),
        moderation: ModerationEngine::new(store.clone(), store.clone(), settings.report_threshold),
        ledger: store.clone(),
        auth,
        ip_salt: settings.ip_salt.clone(),
    });

    log::info!(
        "word-registry starting on http://{} (report threshold: {})",
        settings.bind_addr,
        settings.report_threshold
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::standard_middleware())
            .wrap(middleware::cors_policy())
            .configure(configure_routes)
    })
    .bind(settings.bind_addr.as_str())?
    .run()
    .await
}
