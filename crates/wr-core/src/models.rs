//! # Domain Models
//!
//! These structs represent the core entities of the Word Registry.
//! We use UUID v7 for time-ordered, globally unique identification and
//! `rust_decimal` for exact currency arithmetic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// A single word in the registry, the unit of ownership and of
/// concurrency control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub id: Uuid,
    /// Unique, stored lower-cased, 1-100 ASCII alphabetic characters.
    pub text: String,
    /// Current purchase price. Non-decreasing except via admin reset.
    pub price: Decimal,
    pub owner_name: Option<String>,
    /// Message attached by the current owner (max 140 chars). May outlive
    /// the lockout: it stays visible until overwritten by the next claim.
    pub owner_message: Option<String>,
    /// None or in the past means the word is available for purchase.
    pub lockout_ends_at: Option<DateTime<Utc>>,
    pub moderation_status: ModerationStatus,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable log entry recording a single purchase, mint or admin reset.
/// Never updated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub word_id: Uuid,
    pub buyer_name: String,
    /// The price *before* the increment, i.e. what the buyer paid.
    pub price_paid: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Admin actions are excluded from revenue and leaderboard aggregates.
    pub is_admin_action: bool,
}

/// A user report against a word's owner message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub word_id: Uuid,
    /// Salted digest of the reporter's IP, never the raw address.
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Analytics read-model: one row per word page view. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordView {
    pub id: Uuid,
    pub word_id: Uuid,
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Moderation state of a word's owner message.
///
/// `Unset` persists as SQL NULL. The only non-admin transition is the
/// report-threshold auto-escalation `Unset -> Pending`; adjudication may
/// set `Approved`, `Rejected` or `Protected` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Unset,
    Pending,
    Approved,
    Rejected,
    Protected,
}

impl ModerationStatus {
    /// Database column representation (`Unset` maps to NULL).
    pub fn as_db(self) -> Option<&'static str> {
        match self {
            ModerationStatus::Unset => None,
            ModerationStatus::Pending => Some("pending"),
            ModerationStatus::Approved => Some("approved"),
            ModerationStatus::Rejected => Some("rejected"),
            ModerationStatus::Protected => Some("protected"),
        }
    }

    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("pending") => ModerationStatus::Pending,
            Some("approved") => ModerationStatus::Approved,
            Some("rejected") => ModerationStatus::Rejected,
            Some("protected") => ModerationStatus::Protected,
            _ => ModerationStatus::Unset,
        }
    }

    /// Whether the report counter may still auto-escalate this word.
    /// One-way: once any status is set, reports never escalate again.
    pub fn can_auto_escalate(self) -> bool {
        self == ModerationStatus::Unset
    }
}

/// Administrator adjudication verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
    Protect,
}

impl ModerationAction {
    /// Parses the wire-level action string; anything unrecognized is an
    /// `InvalidAction` error rather than a silent default.
    pub fn parse(action: &str) -> Result<Self, AppError> {
        match action {
            "approve" => Ok(ModerationAction::Approve),
            "reject" => Ok(ModerationAction::Reject),
            "protect" => Ok(ModerationAction::Protect),
            other => Err(AppError::InvalidAction(other.to_string())),
        }
    }

    pub fn target_status(self) -> ModerationStatus {
        match self {
            ModerationAction::Approve => ModerationStatus::Approved,
            ModerationAction::Reject => ModerationStatus::Rejected,
            ModerationAction::Protect => ModerationStatus::Protected,
        }
    }
}

/// A word joined with its live report count, as served to read paths.
/// The count feeds the moderation visibility filter.
#[derive(Debug, Clone)]
pub struct WordSnapshot {
    pub word: Word,
    pub report_count: i64,
}

/// Fully-computed claim state transition, applied atomically by the store
/// with a compare-and-swap on `expected_price`.
#[derive(Debug, Clone)]
pub struct ClaimTransition {
    pub word_id: Uuid,
    /// CAS key: the price this claim was computed against.
    pub expected_price: Decimal,
    pub new_price: Decimal,
    pub owner_name: String,
    pub owner_message: String,
    pub lockout_ends_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Administrative reset transition. Clears ownership when no owner is given.
#[derive(Debug, Clone)]
pub struct ResetTransition {
    pub word_id: Uuid,
    pub new_price: Decimal,
    pub owner_name: Option<String>,
    pub owner_message: Option<String>,
    pub lockout_ends_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Adjudication transition applied atomically by the moderation store.
#[derive(Debug, Clone)]
pub struct AdjudicationTransition {
    pub word_id: Uuid,
    pub status: ModerationStatus,
    pub moderated_at: DateTime<Utc>,
    /// `protect` purges the word's report rows so counting restarts at zero.
    pub purge_reports: bool,
    /// `protect` on a locked word re-extends the countdown.
    pub new_lockout_ends_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Availability filter for word search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvailabilityFilter {
    #[default]
    All,
    Available,
    Locked,
}

/// Paginated word search parameters.
#[derive(Debug, Clone, Default)]
pub struct WordQuery {
    pub text: Option<String>,
    pub status: AvailabilityFilter,
    pub page: i64,
    pub page_size: i64,
}

/// One page of search results plus the unpaginated total.
#[derive(Debug, Clone)]
pub struct WordPage {
    pub words: Vec<WordSnapshot>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Platform-wide statistics for the public stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub total_words: i64,
    pub words_owned: i64,
    pub words_available: i64,
    pub total_transactions: i64,
    pub total_revenue: f64,
    pub average_price: f64,
}

/// Revenue aggregates for the admin dashboard. Admin actions excluded.
#[derive(Debug, Clone, Serialize)]
pub struct IncomeStats {
    pub total_income: f64,
    pub today_income: f64,
    pub week_income: f64,
    pub total_transactions: i64,
    pub today_transactions: i64,
    pub week_transactions: i64,
}

/// A word ranked by page views over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct ViewedWord {
    pub word: String,
    pub price: Decimal,
    pub owner: Option<String>,
    pub views: i64,
}
