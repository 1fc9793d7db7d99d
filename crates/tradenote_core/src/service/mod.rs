//! Core use-case services.
//!
//! # Responsibility
//! - Expose the document store as the single mutation entry point for UI
//!   callers.
//! - Keep hierarchy consistency rules and save scheduling out of the UI.
//!
//! # See also
//! - `crate::repo` for the persistence boundary.

pub mod document_store;
pub mod hierarchy;
pub mod save_policy;
