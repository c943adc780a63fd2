//! # Content Gate
//!
//! Validation layer consulted before a mint or claim is committed, plus the
//! single decision point for suppressing reported owner messages.
//!
//! Two kinds of checks are combined: formal rules (URL/email/handle/phone
//! patterns, a profanity list, length and word-format limits) and an opaque
//! toxicity oracle. The oracle is injected at construction and wrapped in an
//! explicit fail-open policy: a classifier outage is logged and treated as
//! "acceptable" so it can never block legitimate submissions.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::ModerationStatus;
use crate::traits::ContentClassifier;
use crate::util::normalize_word;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://|www\.|\.com|\.net|\.org|\.io|\.ai").unwrap());
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static HANDLE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").unwrap());

/// Basic profanity check; the toxicity oracle covers the long tail.
const PROFANITY: &[&str] = &["fuck", "shit", "bitch", "asshole", "damn"];

pub const MAX_OWNER_NAME_LEN: usize = 100;
pub const MAX_OWNER_MESSAGE_LEN: usize = 140;
pub const MAX_WORD_LEN: usize = 100;

/// Tuning knobs for the gate. Thresholds and the fail-open behavior are
/// explicit parameters rather than ambient state.
#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    /// Oracle threshold for the word text itself (mint).
    pub word_toxicity_threshold: f32,
    /// Oracle threshold for user-supplied names and messages.
    pub message_toxicity_threshold: f32,
    /// When true, a classifier error is logged and treated as acceptable.
    pub fail_open: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            word_toxicity_threshold: 0.7,
            message_toxicity_threshold: 0.8,
            fail_open: true,
        }
    }
}

/// The validation front door for everything users write into the registry.
#[derive(Clone)]
pub struct ContentGate {
    classifier: Arc<dyn ContentClassifier>,
    policy: GatePolicy,
}

impl ContentGate {
    pub fn new(classifier: Arc<dyn ContentClassifier>, policy: GatePolicy) -> Self {
        Self { classifier, policy }
    }

    /// Validates an owner name: formal rules plus the oracle.
    pub async fn validate_owner_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.chars().count() > MAX_OWNER_NAME_LEN {
            return Err(AppError::ValidationError(format!(
                "owner name must be 1-{MAX_OWNER_NAME_LEN} characters"
            )));
        }
        self.validate_submission(name).await
    }

    /// Validates an owner message: formal rules plus the oracle.
    pub async fn validate_owner_message(&self, message: &str) -> Result<()> {
        if message.is_empty() || message.chars().count() > MAX_OWNER_MESSAGE_LEN {
            return Err(AppError::ValidationError(format!(
                "message must be 1-{MAX_OWNER_MESSAGE_LEN} characters"
            )));
        }
        self.validate_submission(message).await
    }

    /// Validates user-generated content: contact-info patterns, profanity,
    /// then the oracle at the message threshold.
    pub async fn validate_submission(&self, text: &str) -> Result<()> {
        check_format_rules(text)?;
        if self
            .oracle_blocks(text, self.policy.message_toxicity_threshold)
            .await?
        {
            return Err(AppError::ValidationError(
                "text was flagged as harmful".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates a prospective word text for minting and returns its
    /// canonical (normalized) form.
    ///
    /// The oracle runs at the stricter word threshold; only a positive
    /// high-confidence toxicity signal blocks creation.
    pub async fn validate_word_text(&self, text: &str) -> Result<String> {
        let normalized = normalize_word(text);
        if normalized.is_empty() || normalized.len() > MAX_WORD_LEN {
            return Err(AppError::ValidationError(format!(
                "word must be 1-{MAX_WORD_LEN} characters"
            )));
        }
        if !normalized.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::ValidationError(
                "word must contain only letters".to_string(),
            ));
        }
        if self
            .oracle_blocks(&normalized, self.policy.word_toxicity_threshold)
            .await?
        {
            return Err(AppError::ValidationError(
                "word was flagged as harmful".to_string(),
            ));
        }
        Ok(normalized)
    }

    async fn oracle_blocks(&self, text: &str, threshold: f32) -> Result<bool> {
        match self.classifier.score(text).await {
            Ok(scores) => Ok(scores.max_score() >= threshold),
            Err(err) if self.policy.fail_open => {
                log::warn!("content classifier unavailable, accepting text: {err:#}");
                Ok(false)
            }
            Err(err) => Err(AppError::Internal(format!(
                "content classifier failed: {err:#}"
            ))),
        }
    }
}

/// Formal content rules shared by names and messages.
fn check_format_rules(text: &str) -> Result<()> {
    if URL_PATTERN.is_match(text) {
        return Err(AppError::ValidationError(
            "URLs and web links are not allowed".to_string(),
        ));
    }
    if EMAIL_PATTERN.is_match(text) {
        return Err(AppError::ValidationError(
            "email addresses are not allowed".to_string(),
        ));
    }
    if HANDLE_PATTERN.is_match(text) {
        return Err(AppError::ValidationError(
            "social media handles are not allowed".to_string(),
        ));
    }
    if PHONE_PATTERN.is_match(text) {
        return Err(AppError::ValidationError(
            "phone numbers are not allowed".to_string(),
        ));
    }
    let lowered = text.to_lowercase();
    if PROFANITY.iter().any(|word| lowered.contains(word)) {
        return Err(AppError::ValidationError(
            "profanity is not allowed".to_string(),
        ));
    }
    Ok(())
}

/// The only place message suppression is decided. Every read path (detail,
/// search, random, leaderboards) must route `owner_message` through here.
///
/// The message survives when its status is `Approved`/`Protected`, or when
/// no status is set and the report count is still below the threshold.
/// `Pending` and `Rejected` suppress it, as does reaching the threshold
/// before formal adjudication.
pub fn filter_message_for_moderation(
    message: Option<&str>,
    status: ModerationStatus,
    report_count: i64,
    threshold: i64,
) -> Option<&str> {
    let message = message?;
    match status {
        ModerationStatus::Approved | ModerationStatus::Protected => Some(message),
        ModerationStatus::Pending | ModerationStatus::Rejected => None,
        ModerationStatus::Unset => {
            if report_count < threshold {
                Some(message)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ToxicityScores;
    use async_trait::async_trait;

    /// Oracle stub with a fixed verdict.
    struct FixedClassifier(ToxicityScores);

    #[async_trait]
    impl ContentClassifier for FixedClassifier {
        async fn score(&self, _text: &str) -> anyhow::Result<ToxicityScores> {
            Ok(self.0)
        }
    }

    /// Oracle stub that is always down.
    struct BrokenClassifier;

    #[async_trait]
    impl ContentClassifier for BrokenClassifier {
        async fn score(&self, _text: &str) -> anyhow::Result<ToxicityScores> {
            anyhow::bail!("model not loaded")
        }
    }

    fn clean_gate() -> ContentGate {
        ContentGate::new(
            Arc::new(FixedClassifier(ToxicityScores::default())),
            GatePolicy::default(),
        )
    }

    #[tokio::test]
    async fn accepts_ordinary_messages() {
        let gate = clean_gate();
        assert!(gate.validate_submission("my favorite word ever").await.is_ok());
    }

    #[tokio::test]
    async fn rejects_contact_info_patterns() {
        let gate = clean_gate();
        for text in [
            "visit https://example.test",
            "go to www.example.test",
            "mail me at someone@example.test",
            "follow @someone",
            "call 555-867-5309",
        ] {
            assert!(
                matches!(
                    gate.validate_submission(text).await,
                    Err(AppError::ValidationError(_))
                ),
                "expected rejection for {text:?}"
            );
        }
    }

    #[tokio::test]
    async fn rejects_profanity() {
        let gate = clean_gate();
        assert!(matches!(
            gate.validate_submission("well shit").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn oracle_blocks_above_message_threshold() {
        let gate = ContentGate::new(
            Arc::new(FixedClassifier(ToxicityScores {
                insult: 0.93,
                ..Default::default()
            })),
            GatePolicy::default(),
        );
        assert!(matches!(
            gate.validate_submission("borderline").await,
            Err(AppError::ValidationError(_))
        ));
        // 0.75 clears the 0.8 message bar but not the 0.7 word bar.
        let gate = ContentGate::new(
            Arc::new(FixedClassifier(ToxicityScores {
                toxicity: 0.75,
                ..Default::default()
            })),
            GatePolicy::default(),
        );
        assert!(gate.validate_submission("borderline").await.is_ok());
        assert!(gate.validate_word_text("borderline").await.is_err());
    }

    #[tokio::test]
    async fn classifier_outage_fails_open() {
        let gate = ContentGate::new(Arc::new(BrokenClassifier), GatePolicy::default());
        assert!(gate.validate_submission("hello there").await.is_ok());
        assert_eq!(gate.validate_word_text("Hello").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn classifier_outage_fails_closed_when_configured() {
        let gate = ContentGate::new(
            Arc::new(BrokenClassifier),
            GatePolicy {
                fail_open: false,
                ..Default::default()
            },
        );
        assert!(matches!(
            gate.validate_submission("hello there").await,
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn word_format_rules() {
        let gate = clean_gate();
        assert_eq!(gate.validate_word_text("  Serendipity ").await.unwrap(), "serendipity");
        let too_long = "a".repeat(101);
        for bad in ["", "hello123", "two words", "hyphen-ated", too_long.as_str()] {
            assert!(
                matches!(
                    gate.validate_word_text(bad).await,
                    Err(AppError::ValidationError(_))
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn filter_matrix() {
        use ModerationStatus::*;
        let msg = Some("hello");
        // Approved/protected always visible, whatever the report count.
        assert_eq!(filter_message_for_moderation(msg, Approved, 99, 3), msg);
        assert_eq!(filter_message_for_moderation(msg, Protected, 99, 3), msg);
        // Pending/rejected always suppressed.
        assert_eq!(filter_message_for_moderation(msg, Pending, 0, 3), None);
        assert_eq!(filter_message_for_moderation(msg, Rejected, 0, 3), None);
        // Unset: visible until the count reaches the threshold.
        assert_eq!(filter_message_for_moderation(msg, Unset, 2, 3), msg);
        assert_eq!(filter_message_for_moderation(msg, Unset, 3, 3), None);
        // No message, nothing to show.
        assert_eq!(filter_message_for_moderation(None, Approved, 0, 3), None);
    }
}
