//! Document file loading.
//!
//! # Responsibility
//! - Read the canonical JSON file and hand the raw tree to the normalizer.
//! - Classify why a seeded document was used instead of file content.
//!
//! # Invariants
//! - Loading never modifies or removes the file on disk.
//! - Unreadable and unparseable files behave exactly like a missing file.
//! - Autosave siblings are never read.

use crate::model::document::Document;
use crate::schema::normalize;
use log::{info, warn};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

/// Where a loaded document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// Parsed from the file on disk.
    File,
    /// No file existed; seeded defaults were used.
    Missing,
    /// File existed but could not be read or parsed; seeded defaults were used.
    Unreadable(String),
}

/// Loaded document plus its origin.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    pub source: LoadSource,
}

/// Reads and normalizes the document at `path`.
///
/// Never fails: a missing, unreadable or unparseable file yields the seeded
/// default document with the reason in [`LoadSource`].
pub fn read_document(path: &Path, questions: &[String]) -> LoadedDocument {
    let started_at = Instant::now();
    let (raw, source) = match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(raw) => (raw, LoadSource::File),
            Err(err) => (Value::Null, LoadSource::Unreadable(format!("invalid json: {err}"))),
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => (Value::Null, LoadSource::Missing),
        Err(err) => (Value::Null, LoadSource::Unreadable(err.to_string())),
    };

    let document = normalize(&raw, questions);
    match &source {
        LoadSource::Unreadable(reason) => warn!(
            "event=doc_load module=repo status=fallback reason=unreadable steps={} duration_ms={} error={}",
            document.steps.len(),
            started_at.elapsed().as_millis(),
            reason
        ),
        LoadSource::Missing => info!(
            "event=doc_load module=repo status=ok origin=seeded steps={} duration_ms={}",
            document.steps.len(),
            started_at.elapsed().as_millis()
        ),
        LoadSource::File => info!(
            "event=doc_load module=repo status=ok origin=file steps={} pages={} duration_ms={}",
            document.steps.len(),
            document.page_count(),
            started_at.elapsed().as_millis()
        ),
    }

    LoadedDocument { document, source }
}
