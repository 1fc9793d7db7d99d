//! Canonical in-memory model for the trade note collection.
//!
//! # Responsibility
//! - Define the document/step/page/stroke shapes used by core logic.
//! - Provide constructors that already satisfy structural invariants.
//!
//! # Invariants
//! - Every step and page carries a stable string id.
//! - A freshly constructed step owns exactly one page.
//! - Timestamps are Unix epoch seconds.

pub mod document;
pub mod page;
pub mod step;

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current Unix time in seconds.
///
/// Falls back to `0` when the system clock is before the epoch.
pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

/// Generates a fresh unique identifier in canonical UUID text form.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
