//! word-registry/crates/wr-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the Word Registry:
//! models, port traits, the error taxonomy, and the Ownership/Moderation
//! engines with their Content Gate.

pub mod content_gate;
pub mod error;
pub mod models;
pub mod moderation;
pub mod ownership;
pub mod traits;
pub mod util;

// Re-exporting for easier access in other crates
pub use content_gate::{filter_message_for_moderation, ContentGate, GatePolicy};
pub use error::*;
pub use models::*;
pub use moderation::{ModerationEngine, ReportOutcome};
pub use ownership::OwnershipEngine;
pub use traits::*;
pub use util::*;
