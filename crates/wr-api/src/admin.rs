//! Admin handlers: word resets, moderation adjudication and dashboards.
//! All of them sit behind the `X-Admin-Token` header check.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use wr_core::error::AppError;
use wr_core::models::WordSnapshot;

use crate::handlers::{ApiError, AppState, WordResponse};

const POPULAR_WORDS_WINDOW_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct ResetWordRequest {
    pub word: String,
    pub new_price: f64,
    pub owner_name: Option<String>,
    pub owner_message: Option<String>,
}

#[derive(Deserialize)]
pub struct ModerateRequest {
    pub word: String,
    pub action: String,
}

/// Consults the injected `AdminAuth` gate; handlers call this first.
async fn authorize(req: &HttpRequest, data: &AppState) -> Result<(), ApiError> {
    let token = req
        .headers()
        .get("X-Admin-Token")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if token.is_empty() || !data.auth.verify_token(token).await {
        return Err(ApiError(AppError::Unauthorized(
            "invalid or missing admin token".to_string(),
        )));
    }
    Ok(())
}

/// POST /api/admin/reset-word
pub async fn reset_word(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ResetWordRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &data).await?;

    let new_price = Decimal::from_f64(body.new_price)
        .ok_or_else(|| AppError::ValidationError("new_price is not a valid amount".to_string()))?;
    let word = data
        .ownership
        .administrative_reset(
            &body.word,
            new_price,
            body.owner_name.as_deref(),
            body.owner_message.as_deref(),
        )
        .await?;

    log::info!("admin reset word '{}' to {}", word.text, word.price);
    let snapshot = WordSnapshot {
        word,
        report_count: 0,
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": format!("Word '{}' has been reset", snapshot.word.text),
        "word": WordResponse::from_snapshot(&data.moderation, &snapshot),
    })))
}

/// POST /api/admin/moderate
pub async fn moderate_word(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ModerateRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &data).await?;

    let text = body.word.to_lowercase();
    let word = data
        .ledger
        .find_word(&text)
        .await?
        .ok_or_else(|| AppError::NotFound("word".to_string(), text.clone()))?;

    data.moderation.adjudicate(word.id, &body.action).await?;
    log::info!("admin adjudicated '{}' as {}", text, body.action);

    // Re-read so the response reflects the post-adjudication report count.
    let snapshot = data
        .ledger
        .word_snapshot(&text)
        .await?
        .ok_or_else(|| AppError::NotFound("word".to_string(), text.clone()))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "word": WordResponse::from_snapshot(&data.moderation, &snapshot),
    })))
}

/// GET /api/admin/dashboard
pub async fn dashboard(
    data: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &data).await?;

    let income = data.ledger.income_stats().await?;
    let popular = data
        .ledger
        .most_viewed(Utc::now() - Duration::days(POPULAR_WORDS_WINDOW_DAYS), 20)
        .await?;
    let stats = data.ledger.platform_stats().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "income": income,
        "popular_words": popular,
        "stats": {
            "total_words": stats.total_words,
            "available_words": stats.words_available,
            "locked_words": stats.words_owned,
        },
    })))
}

/// GET /api/admin/income
pub async fn income(
    data: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &data).await?;
    let income = data.ledger.income_stats().await?;
    Ok(HttpResponse::Ok().json(income))
}

#[derive(Deserialize)]
pub struct PopularParams {
    pub limit: Option<i64>,
}

/// GET /api/admin/popular-words
pub async fn popular_words(
    data: web::Data<AppState>,
    req: HttpRequest,
    params: web::Query<PopularParams>,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, &data).await?;
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let popular = data
        .ledger
        .most_viewed(Utc::now() - Duration::days(POPULAR_WORDS_WINDOW_DAYS), limit)
        .await?;
    Ok(HttpResponse::Ok().json(popular))
}
