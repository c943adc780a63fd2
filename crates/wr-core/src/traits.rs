//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AdjudicationTransition, ClaimTransition, IncomeStats, PlatformStats, Report, ResetTransition,
    Transaction, ViewedWord, Word, WordPage, WordQuery, WordSnapshot, WordView,
};

/// Durable ledger contract for words and their transaction log.
///
/// The mutating operations are atomic: a word update and its transaction
/// row commit together or not at all. `apply_claim` is a compare-and-swap
/// keyed on the price the caller read, so two concurrent claims can never
/// both record the same pre-claim price.
#[async_trait]
pub trait WordLedger: Send + Sync {
    // Word reads
    async fn find_word(&self, text: &str) -> Result<Option<Word>>;
    async fn find_word_by_id(&self, id: Uuid) -> Result<Option<Word>>;
    /// Word plus its live report count, for read paths that must run the
    /// message through the moderation filter.
    async fn word_snapshot(&self, text: &str) -> Result<Option<WordSnapshot>>;

    // Atomic state transitions
    /// Inserts a brand-new word together with its mint transaction.
    /// The unique constraint on `text` resolves create races; a duplicate
    /// surfaces as `Conflict`.
    async fn mint_word(&self, word: &Word, receipt: &Transaction) -> Result<()>;
    /// Applies a claim if and only if the word's price still equals
    /// `claim.expected_price`. Returns whether the swap won.
    async fn apply_claim(&self, claim: &ClaimTransition, receipt: &Transaction) -> Result<bool>;
    /// Privileged reset: overwrites price/ownership and appends an
    /// admin-flagged transaction.
    async fn apply_reset(&self, reset: &ResetTransition, receipt: &Transaction) -> Result<()>;

    // Transaction log
    async fn transactions_for(&self, word_id: Uuid) -> Result<Vec<Transaction>>;
    /// Latest purchases, admin actions excluded.
    async fn recent_transactions(&self, limit: i64) -> Result<Vec<Transaction>>;

    // Query surface
    async fn search_words(&self, query: &WordQuery) -> Result<WordPage>;
    async fn random_word(
        &self,
        available_only: bool,
        base_price_only: bool,
    ) -> Result<Option<WordSnapshot>>;
    async fn most_expensive(&self, limit: i64) -> Result<Vec<WordSnapshot>>;
    async fn platform_stats(&self) -> Result<PlatformStats>;
    async fn income_stats(&self) -> Result<IncomeStats>;

    // Analytics
    async fn record_view(&self, view: &WordView) -> Result<()>;
    async fn most_viewed(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<ViewedWord>>;
}

/// Durable store of report events and per-word moderation status.
#[async_trait]
pub trait ModerationLog: Send + Sync {
    /// Appends a report and returns the word's new total report count.
    async fn append_report(&self, report: &Report) -> Result<i64>;
    async fn report_count(&self, word_id: Uuid) -> Result<i64>;
    /// Idempotent `Unset -> Pending` escalation. Returns false when some
    /// status was already set (a lost escalation race is a safe no-op).
    async fn escalate_if_unset(&self, word_id: Uuid) -> Result<bool>;
    /// Applies an adjudication: status stamp, optional report purge,
    /// optional lockout rewrite, all in one store transaction.
    async fn apply_adjudication(&self, adjudication: &AdjudicationTransition) -> Result<()>;
}

/// Toxicity scores returned by the content-acceptability oracle, one
/// probability per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToxicityScores {
    pub toxicity: f32,
    pub severe_toxicity: f32,
    pub obscene: f32,
    pub threat: f32,
    pub insult: f32,
    pub identity_attack: f32,
}

impl ToxicityScores {
    /// The worst axis, compared against the gate threshold.
    pub fn max_score(&self) -> f32 {
        [
            self.toxicity,
            self.severe_toxicity,
            self.obscene,
            self.threat,
            self.insult,
            self.identity_attack,
        ]
        .into_iter()
        .fold(0.0, f32::max)
    }
}

/// Opaque text-toxicity oracle. Constructed once at startup and injected
/// into the Content Gate; classifier availability must never block
/// legitimate submissions (the gate applies a fail-open policy around it).
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn score(&self, text: &str) -> anyhow::Result<ToxicityScores>;
}

/// Opaque admin-authorization gate consulted before privileged operations.
#[async_trait]
pub trait AdminAuth: Send + Sync {
    async fn verify_token(&self, token: &str) -> bool;
}
