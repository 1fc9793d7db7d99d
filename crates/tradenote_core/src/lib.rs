//! Core persistence and consistency engine for TradeNote.
//! This crate is the single source of truth for the note hierarchy invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;

pub use config::{RetryPolicy, StoreConfig, DEFAULT_CATEGORY, DEFAULT_DB_PATH, FORMAT_VERSION};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings, LoggingError};
pub use model::document::{Document, UiState};
pub use model::page::{ChecklistItem, ImageSlot, ImageSlotKind, Page, PageId, Point, Stroke};
pub use model::step::{Step, StepId};
pub use repo::atomic_writer::{
    list_autosaves, AtomicWriter, FileOps, StdFileOps, WriteError, WriteReport,
};
pub use repo::document_file::{read_document, LoadSource, LoadedDocument};
pub use schema::{normalize, realign_checklist};
pub use service::document_store::{
    DocumentStore, MoveDirection, PageEdit, StoreError, StoreResult, UI_STATE_LAST_SAVE_FAILED_AT,
    UI_STATE_LAST_SAVE_OK,
};
pub use service::hierarchy::{derive_category_order, is_consistent, OrderingError};
pub use service::save_policy::{SaveDebouncer, WarningThrottle};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
