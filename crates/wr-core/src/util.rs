//! Small shared utilities: the availability predicate, lockout arithmetic,
//! word normalization and the reporter-IP digest.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Check if a word is available for purchase.
///
/// This is the single source of truth for availability: every Rust-side
/// consumer (claim eligibility, response fields, stats) calls this; the
/// SQL availability filters mirror it exactly.
pub fn is_available(lockout_ends_at: Option<DateTime<Utc>>) -> bool {
    match lockout_ends_at {
        None => true,
        Some(ends_at) => Utc::now() >= ends_at,
    }
}

/// Lockout duration earned by a purchase: one hour per unit of currency.
pub fn lockout_for(price_paid: Decimal) -> Duration {
    let seconds = (price_paid * Decimal::from(3600)).to_i64().unwrap_or(0);
    Duration::seconds(seconds.max(0))
}

/// Canonical form of a word: trimmed and lower-cased.
pub fn normalize_word(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Salted SHA-256 digest of a client IP. Reports and views store this
/// instead of the raw address.
pub fn ip_digest(salt: &str, ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}
