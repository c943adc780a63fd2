//! # wr-api Handlers
//!
//! This module coordinates the flow between HTTP requests and core engines.

use std::fmt;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wr_core::error::AppError;
use wr_core::models::{
    AvailabilityFilter, Transaction, WordQuery, WordSnapshot, WordView,
};
use wr_core::moderation::ModerationEngine;
use wr_core::ownership::OwnershipEngine;
use wr_core::traits::{AdminAuth, WordLedger};
use wr_core::util::{ip_digest, is_available};

/// State shared across all actix-web workers.
pub struct AppState {
    pub ownership: OwnershipEngine,
    pub moderation: ModerationEngine,
    pub ledger: Arc<dyn WordLedger>,
    pub auth: Arc<dyn AdminAuth>,
    /// Salt for reporter/viewer IP digests.
    pub ip_salt: String,
}

/// Adapter giving `AppError` an HTTP shape without coupling the core to
/// actix. Bodies match the `{"detail": ...}` convention of the API.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        if let AppError::Internal(detail) = &err {
            log::error!("internal error surfaced to API: {detail}");
        }
        ApiError(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Locked { .. }
            | AppError::ValidationError(_)
            | AppError::InvalidAction(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "detail": self.0.to_string() }))
    }
}

#[derive(Serialize)]
pub struct WordResponse {
    pub id: Uuid,
    pub text: String,
    pub price: Decimal,
    pub owner_name: Option<String>,
    pub owner_message: Option<String>,
    pub lockout_ends_at: Option<DateTime<Utc>>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WordResponse {
    /// Every word leaving the API goes through the moderation filter here.
    pub fn from_snapshot(moderation: &ModerationEngine, snapshot: &WordSnapshot) -> Self {
        let word = &snapshot.word;
        WordResponse {
            id: word.id,
            text: word.text.clone(),
            price: word.price,
            owner_name: word.owner_name.clone(),
            owner_message: moderation
                .visible_message(word, snapshot.report_count)
                .map(str::to_string),
            lockout_ends_at: word.lockout_ends_at,
            is_available: is_available(word.lockout_ends_at),
            created_at: word.created_at,
            updated_at: word.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub buyer_name: String,
    pub price_paid: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(t: &Transaction) -> Self {
        TransactionResponse {
            id: t.id,
            buyer_name: t.buyer_name.clone(),
            price_paid: t.price_paid,
            timestamp: t.timestamp,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Deserialize)]
pub struct RandomParams {
    pub available_only: Option<bool>,
    pub base_price_only: Option<bool>,
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub owner_name: String,
    pub owner_message: String,
}

/// Salted digest of the peer address; raw IPs are never persisted.
fn client_digest(req: &HttpRequest, data: &AppState) -> Option<String> {
    req.peer_addr()
        .map(|addr| ip_digest(&data.ip_salt, &addr.ip().to_string()))
}

/// GET /api/words/search
pub async fn search_words(
    data: web::Data<AppState>,
    params: web::Query<SearchParams>,
) -> Result<HttpResponse, ApiError> {
    let status = match params.status.as_deref() {
        Some("available") => AvailabilityFilter::Available,
        Some("locked") => AvailabilityFilter::Locked,
        _ => AvailabilityFilter::All,
    };
    let query = WordQuery {
        text: params.q.clone().filter(|q| !q.is_empty()),
        status,
        page: params.page.unwrap_or(1).max(1),
        page_size: params.page_size.unwrap_or(20).clamp(1, 100),
    };

    let page = data.ledger.search_words(&query).await?;
    let words: Vec<WordResponse> = page
        .words
        .iter()
        .map(|snapshot| WordResponse::from_snapshot(&data.moderation, snapshot))
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "words": words,
        "total": page.total,
        "page": page.page,
        "page_size": page.page_size,
    })))
}

/// GET /api/words/random
pub async fn random_word(
    data: web::Data<AppState>,
    params: web::Query<RandomParams>,
) -> Result<HttpResponse, ApiError> {
    let snapshot = data
        .ledger
        .random_word(
            params.available_only.unwrap_or(true),
            params.base_price_only.unwrap_or(true),
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound("word".to_string(), "matching criteria".to_string())
        })?;
    Ok(HttpResponse::Ok().json(WordResponse::from_snapshot(&data.moderation, &snapshot)))
}

/// GET /api/words/{word_text}
pub async fn word_detail(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let text = path.into_inner().to_lowercase();
    let snapshot = data
        .ledger
        .word_snapshot(&text)
        .await?
        .ok_or_else(|| AppError::NotFound("word".to_string(), text.clone()))?;

    // Analytics only; a failed view write must never fail the read.
    let view = WordView {
        id: Uuid::now_v7(),
        word_id: snapshot.word.id,
        ip_address: client_digest(&req, &data),
        timestamp: Utc::now(),
    };
    if let Err(err) = data.ledger.record_view(&view).await {
        log::warn!("failed to record view for '{text}': {err}");
    }

    let transactions = data.ledger.transactions_for(snapshot.word.id).await?;
    let word = WordResponse::from_snapshot(&data.moderation, &snapshot);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": word.id,
        "text": word.text,
        "price": word.price,
        "owner_name": word.owner_name,
        "owner_message": word.owner_message,
        "lockout_ends_at": word.lockout_ends_at,
        "is_available": word.is_available,
        "created_at": word.created_at,
        "updated_at": word.updated_at,
        "transaction_count": transactions.len(),
        "transactions": transactions.iter().map(TransactionResponse::from).collect::<Vec<_>>(),
    })))
}

/// POST /api/words/{word_text}/report
pub async fn report_word(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let text = path.into_inner().to_lowercase();
    let word = data
        .ledger
        .find_word(&text)
        .await?
        .ok_or_else(|| AppError::NotFound("word".to_string(), text.clone()))?;

    let outcome = data
        .moderation
        .report(word.id, client_digest(&req, &data))
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "report_count": outcome.report_count,
        "escalated": outcome.escalated,
    })))
}

/// POST /api/purchase/{word_text}
pub async fn purchase_word(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PurchaseRequest>,
) -> Result<HttpResponse, ApiError> {
    let text = path.into_inner();
    let (word, receipt) = data
        .ownership
        .claim(&text, &body.owner_name, &body.owner_message)
        .await?;

    // A fresh claim has a clean report slate.
    let snapshot = WordSnapshot {
        word,
        report_count: 0,
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "word": WordResponse::from_snapshot(&data.moderation, &snapshot),
        "transaction_id": receipt.id,
        "message": format!(
            "Successfully purchased '{}' for ${}!",
            snapshot.word.text, receipt.price_paid
        ),
    })))
}

/// POST /api/purchase/add/{word_text}
pub async fn add_word(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PurchaseRequest>,
) -> Result<HttpResponse, ApiError> {
    let text = path.into_inner();
    let (word, receipt) = data
        .ownership
        .mint(&text, &body.owner_name, &body.owner_message)
        .await?;

    let snapshot = WordSnapshot {
        word,
        report_count: 0,
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "word": WordResponse::from_snapshot(&data.moderation, &snapshot),
        "transaction_id": receipt.id,
        "message": format!(
            "Successfully added '{}' to the registry for ${}!",
            snapshot.word.text, receipt.price_paid
        ),
    })))
}

/// GET /api/leaderboard/expensive
pub async fn most_expensive(
    data: web::Data<AppState>,
    params: web::Query<LimitParams>,
) -> Result<HttpResponse, ApiError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let words: Vec<WordResponse> = data
        .ledger
        .most_expensive(limit)
        .await?
        .iter()
        .map(|snapshot| WordResponse::from_snapshot(&data.moderation, snapshot))
        .collect();
    Ok(HttpResponse::Ok().json(words))
}

/// GET /api/leaderboard/recent
pub async fn recent_purchases(
    data: web::Data<AppState>,
    params: web::Query<LimitParams>,
) -> Result<HttpResponse, ApiError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let transactions: Vec<TransactionResponse> = data
        .ledger
        .recent_transactions(limit)
        .await?
        .iter()
        .map(TransactionResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(transactions))
}

/// GET /api/leaderboard/stats
pub async fn platform_stats(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = data.ledger.platform_stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "word-registry",
    }))
}
