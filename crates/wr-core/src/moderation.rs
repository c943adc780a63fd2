//! # Moderation Engine
//!
//! Report submission, threshold-triggered auto-flagging, and administrator
//! adjudication. Message visibility itself is decided by
//! [`crate::content_gate::filter_message_for_moderation`]; this engine owns
//! the state transitions feeding it.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::content_gate::filter_message_for_moderation;
use crate::error::{AppError, Result};
use crate::models::{AdjudicationTransition, ModerationAction, ModerationStatus, Report, Word};
use crate::traits::{ModerationLog, WordLedger};
use crate::util::{is_available, lockout_for};

/// Result of a report submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    pub report_count: i64,
    /// True when this report pushed the word into `Pending`.
    pub escalated: bool,
}

pub struct ModerationEngine {
    ledger: Arc<dyn WordLedger>,
    log: Arc<dyn ModerationLog>,
    /// Report count at which an unset word auto-escalates to `Pending`.
    threshold: i64,
}

impl ModerationEngine {
    pub fn new(ledger: Arc<dyn WordLedger>, log: Arc<dyn ModerationLog>, threshold: i64) -> Self {
        Self {
            ledger,
            log,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Submit a report against a word's owner message.
    ///
    /// Protected words are immune: the call is a no-op that reports the
    /// current (post-purge) count. Escalation is one-way and idempotent;
    /// losing the escalation race to a concurrent report is harmless.
    pub async fn report(&self, word_id: Uuid, ip_digest: Option<String>) -> Result<ReportOutcome> {
        let word = self
            .ledger
            .find_word_by_id(word_id)
            .await?
            .ok_or_else(|| AppError::NotFound("word".to_string(), word_id.to_string()))?;

        if word.owner_message.is_none() {
            return Err(AppError::ValidationError(
                "word has no message to report".to_string(),
            ));
        }
        if word.moderation_status == ModerationStatus::Protected {
            let report_count = self.log.report_count(word_id).await?;
            return Ok(ReportOutcome {
                report_count,
                escalated: false,
            });
        }

        let report = Report {
            id: Uuid::now_v7(),
            word_id,
            ip_address: ip_digest,
            timestamp: Utc::now(),
        };
        let report_count = self.log.append_report(&report).await?;

        let escalated = if report_count >= self.threshold
            && word.moderation_status.can_auto_escalate()
        {
            self.log.escalate_if_unset(word_id).await?
        } else {
            false
        };

        if escalated {
            log::info!(
                "word '{}' auto-escalated to pending after {} reports",
                word.text,
                report_count
            );
        }

        Ok(ReportOutcome {
            report_count,
            escalated,
        })
    }

    /// Administrator adjudication of a reported message.
    ///
    /// `protect` additionally purges the word's report rows (future
    /// counting restarts at zero) and, when the word is currently locked,
    /// re-extends the countdown from the price of the last claim.
    pub async fn adjudicate(&self, word_id: Uuid, action: &str) -> Result<Word> {
        let action = ModerationAction::parse(action)?;
        let word = self
            .ledger
            .find_word_by_id(word_id)
            .await?
            .ok_or_else(|| AppError::NotFound("word".to_string(), word_id.to_string()))?;

        let now = Utc::now();
        let status = action.target_status();
        let new_lockout_ends_at = match action {
            // price - 1 is the price paid on the last claim.
            ModerationAction::Protect if !is_available(word.lockout_ends_at) => {
                Some(now + lockout_for(word.price - rust_decimal::Decimal::ONE))
            }
            _ => None,
        };

        let adjudication = AdjudicationTransition {
            word_id,
            status,
            moderated_at: now,
            purge_reports: action == ModerationAction::Protect,
            new_lockout_ends_at,
            updated_at: now,
        };
        self.log.apply_adjudication(&adjudication).await?;

        Ok(Word {
            moderation_status: status,
            moderated_at: Some(now),
            lockout_ends_at: new_lockout_ends_at.or(word.lockout_ends_at),
            updated_at: now,
            ..word
        })
    }

    /// Runs a word's message through the visibility filter with this
    /// engine's configured threshold.
    pub fn visible_message<'a>(&self, word: &'a Word, report_count: i64) -> Option<&'a str> {
        filter_message_for_moderation(
            word.owner_message.as_deref(),
            word.moderation_status,
            report_count,
            self.threshold,
        )
    }
}
