//! Document aggregate model.
//!
//! # Responsibility
//! - Hold the whole persisted collection: steps, category order, global ideas
//!   and the opaque UI state bag.
//! - Provide the seeded default document used for first start and for
//!   unreadable files.
//!
//! # Invariants
//! - `steps` is never empty.
//! - `category_order` lists every referenced category exactly once.
//! - `ui_state` is never interpreted by core, only round-tripped.
//! - Unknown top-level keys from the file are written back unchanged.

use crate::config::{DEFAULT_CATEGORY, FORMAT_VERSION};
use crate::model::now_epoch;
use crate::model::step::Step;
use serde::Serialize;
use serde_json::{Map, Value};

/// Opaque key/value bag owned by the presentation layer.
pub type UiState = Map<String, Value>;

/// Aggregate root of the note collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub version: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub steps: Vec<Step>,
    pub category_order: Vec<String>,
    /// Rich-text markup shown outside any step.
    pub global_ideas: String,
    pub ui_state: UiState,
    /// Top-level keys this version does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Builds the default seed: `Step 1..3` in `General`, one empty page each.
    pub fn seeded(questions: &[String]) -> Self {
        let now = now_epoch();
        Self {
            version: FORMAT_VERSION.to_string(),
            created_at: now,
            updated_at: now,
            steps: (1..=3)
                .map(|n| Step::new(format!("Step {n}"), DEFAULT_CATEGORY, questions))
                .collect(),
            category_order: vec![DEFAULT_CATEGORY.to_string()],
            global_ideas: String::new(),
            ui_state: UiState::new(),
            extra: Map::new(),
        }
    }

    /// Total page count across all steps.
    pub fn page_count(&self) -> usize {
        self.steps.iter().map(|step| step.pages.len()).sum()
    }
}
