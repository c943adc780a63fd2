//! # wr-api
//!
//! The web routing and orchestration layer for the Word Registry. Handlers
//! only adapt HTTP to engine calls; every business rule lives in `wr-core`.

pub mod admin;
pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the routes for the registry API.
///
/// Literal routes (`/words/search`, `/words/random`) are registered before
/// the `/words/{word_text}` catch-all; actix matches in registration order.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Words
            .route("/words/search", web::get().to(handlers::search_words))
            .route("/words/random", web::get().to(handlers::random_word))
            .route("/words/{word_text}", web::get().to(handlers::word_detail))
            .route(
                "/words/{word_text}/report",
                web::post().to(handlers::report_word),
            )
            // Purchases (pre-payment entry points)
            .route("/purchase/{word_text}", web::post().to(handlers::purchase_word))
            .route("/purchase/add/{word_text}", web::post().to(handlers::add_word))
            // Leaderboards
            .route(
                "/leaderboard/expensive",
                web::get().to(handlers::most_expensive),
            )
            .route(
                "/leaderboard/recent",
                web::get().to(handlers::recent_purchases),
            )
            .route("/leaderboard/stats", web::get().to(handlers::platform_stats))
            // Admin (X-Admin-Token guarded)
            .route("/admin/reset-word", web::post().to(admin::reset_word))
            .route("/admin/moderate", web::post().to(admin::moderate_word))
            .route("/admin/dashboard", web::get().to(admin::dashboard))
            .route("/admin/income", web::get().to(admin::income))
            .route("/admin/popular-words", web::get().to(admin::popular_words)),
    );
    cfg.route("/health", web::get().to(handlers::health));
}
