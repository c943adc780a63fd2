//! # Ownership Engine
//!
//! The purchase ("claim"), creation ("mint") and administrative reset
//! operations, expressed as atomic state transitions against the ledger.
//!
//! Concurrency model: the engine never holds an in-process lock. Each claim
//! is computed from a fresh read and applied through the store's
//! compare-and-swap keyed on the price that was read; a lost swap means
//! another claim landed in between, and the engine re-reads and retries.
//! Claims on different words never contend.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::content_gate::ContentGate;
use crate::error::{AppError, Result};
use crate::models::{ClaimTransition, ModerationStatus, ResetTransition, Transaction, Word};
use crate::traits::WordLedger;
use crate::util::{is_available, lockout_for, normalize_word};

/// Every successful claim raises the price by exactly one unit.
pub fn price_increment() -> Decimal {
    Decimal::new(100, 2)
}

/// Price a freshly minted word is listed at for its next buyer.
pub fn mint_price() -> Decimal {
    Decimal::new(5100, 2)
}

/// What minting costs, and therefore what its transaction records.
pub fn mint_price_paid() -> Decimal {
    Decimal::new(5000, 2)
}

/// Minting grants a fixed 50-hour lockout.
pub const MINT_LOCKOUT_HOURS: i64 = 50;

/// Lowest price an administrator may reset a word to.
pub fn minimum_price() -> Decimal {
    Decimal::new(1, 2)
}

/// Bounded retries for the claim compare-and-swap. A word busy enough to
/// exhaust these is surfaced as a conflict the caller may retry.
const MAX_CLAIM_ATTEMPTS: u32 = 3;

/// Buyer name recorded on ownerless administrative resets.
const ADMIN_RESET_BUYER: &str = "ADMIN_RESET";

pub struct OwnershipEngine {
    ledger: Arc<dyn WordLedger>,
    gate: ContentGate,
}

impl OwnershipEngine {
    pub fn new(ledger: Arc<dyn WordLedger>, gate: ContentGate) -> Self {
        Self { ledger, gate }
    }

    /// Purchase a word (the "steal" mechanic).
    ///
    /// Raises the price by one unit, transfers ownership, and starts a
    /// lockout of one hour per unit of the price paid. The word update and
    /// the transaction row commit atomically.
    pub async fn claim(
        &self,
        word_text: &str,
        buyer_name: &str,
        message: &str,
    ) -> Result<(Word, Transaction)> {
        self.gate.validate_owner_name(buyer_name).await?;
        self.gate.validate_owner_message(message).await?;

        let text = normalize_word(word_text);
        for attempt in 0..MAX_CLAIM_ATTEMPTS {
            let word = self
                .ledger
                .find_word(&text)
                .await?
                .ok_or_else(|| AppError::NotFound("word".to_string(), text.clone()))?;

            let now = Utc::now();
            if !is_available(word.lockout_ends_at) {
                let ends_at = word.lockout_ends_at.unwrap_or(now);
                return Err(AppError::locked(ends_at - now));
            }

            let price_paid = word.price;
            let claim = ClaimTransition {
                word_id: word.id,
                expected_price: price_paid,
                new_price: price_paid + price_increment(),
                owner_name: buyer_name.to_string(),
                owner_message: message.to_string(),
                lockout_ends_at: now + lockout_for(price_paid),
                updated_at: now,
            };
            let receipt = Transaction {
                id: Uuid::now_v7(),
                word_id: word.id,
                buyer_name: buyer_name.to_string(),
                price_paid,
                timestamp: now,
                is_admin_action: false,
            };

            if self.ledger.apply_claim(&claim, &receipt).await? {
                let updated = Word {
                    price: claim.new_price,
                    owner_name: Some(claim.owner_name),
                    owner_message: Some(claim.owner_message),
                    lockout_ends_at: Some(claim.lockout_ends_at),
                    // A fresh message starts with a clean moderation slate.
                    moderation_status: ModerationStatus::Unset,
                    moderated_at: None,
                    updated_at: now,
                    ..word
                };
                return Ok((updated, receipt));
            }

            log::debug!(
                "claim on '{}' lost the price CAS (attempt {})",
                text,
                attempt + 1
            );
        }

        Err(AppError::Conflict(format!(
            "word '{text}' is being purchased concurrently, please retry"
        )))
    }

    /// Add a brand-new word to the registry.
    ///
    /// The duplicate pre-check lives in the store's unique constraint, not
    /// here: two concurrent mints of the same text race to the insert and
    /// the loser gets `Conflict`.
    pub async fn mint(
        &self,
        word_text: &str,
        owner_name: &str,
        message: &str,
    ) -> Result<(Word, Transaction)> {
        let text = self.gate.validate_word_text(word_text).await?;
        self.gate.validate_owner_name(owner_name).await?;
        self.gate.validate_owner_message(message).await?;

        let now = Utc::now();
        let word = Word {
            id: Uuid::now_v7(),
            text,
            price: mint_price(),
            owner_name: Some(owner_name.to_string()),
            owner_message: Some(message.to_string()),
            lockout_ends_at: Some(now + chrono::Duration::hours(MINT_LOCKOUT_HOURS)),
            moderation_status: ModerationStatus::Unset,
            moderated_at: None,
            created_at: now,
            updated_at: now,
        };
        let receipt = Transaction {
            id: Uuid::now_v7(),
            word_id: word.id,
            buyer_name: owner_name.to_string(),
            price_paid: mint_price_paid(),
            timestamp: now,
            is_admin_action: false,
        };

        self.ledger.mint_word(&word, &receipt).await?;
        Ok((word, receipt))
    }

    /// Admin override: set a word's price and optionally hand it to an
    /// owner, bypassing lockout and the Content Gate.
    ///
    /// The transaction is flagged as an admin action so it never counts
    /// toward revenue or leaderboards.
    pub async fn administrative_reset(
        &self,
        word_text: &str,
        new_price: Decimal,
        owner_name: Option<&str>,
        owner_message: Option<&str>,
    ) -> Result<Word> {
        if new_price < minimum_price() {
            return Err(AppError::ValidationError(format!(
                "price must be at least {}",
                minimum_price()
            )));
        }

        let text = normalize_word(word_text);
        let word = self
            .ledger
            .find_word(&text)
            .await?
            .ok_or_else(|| AppError::NotFound("word".to_string(), text.clone()))?;

        let now = Utc::now();
        let new_price = new_price.round_dp(2);
        let reset = match owner_name {
            Some(owner) => ResetTransition {
                word_id: word.id,
                new_price,
                owner_name: Some(owner.to_string()),
                owner_message: owner_message.map(str::to_string),
                lockout_ends_at: Some(now + lockout_for(new_price)),
                updated_at: now,
            },
            None => ResetTransition {
                word_id: word.id,
                new_price,
                owner_name: None,
                owner_message: None,
                lockout_ends_at: None,
                updated_at: now,
            },
        };
        let receipt = Transaction {
            id: Uuid::now_v7(),
            word_id: word.id,
            buyer_name: owner_name.unwrap_or(ADMIN_RESET_BUYER).to_string(),
            price_paid: new_price,
            timestamp: now,
            is_admin_action: true,
        };

        self.ledger.apply_reset(&reset, &receipt).await?;
        Ok(Word {
            price: reset.new_price,
            owner_name: reset.owner_name,
            owner_message: reset.owner_message,
            lockout_ends_at: reset.lockout_ends_at,
            updated_at: now,
            ..word
        })
    }
}
