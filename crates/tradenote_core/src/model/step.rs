//! Step domain model.
//!
//! # Invariants
//! - `pages` is never empty.
//! - `last_page_index < pages.len()`.
//! - `category` is trimmed and non-blank.

use crate::config::DEFAULT_CATEGORY;
use crate::model::new_id;
use crate::model::page::Page;
use serde::Serialize;

/// Stable step identifier.
pub type StepId = String;

/// A named unit of analysis holding an ordered, non-empty page list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    /// Matching tag into the document's `category_order`, not a foreign key.
    pub category: String,
    pub last_page_index: usize,
    pub pages: Vec<Page>,
}

impl Step {
    /// Creates a step with one empty page.
    pub fn new(name: impl Into<String>, category: &str, questions: &[String]) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            category: normalize_category(category),
            last_page_index: 0,
            pages: vec![Page::new(questions)],
        }
    }

    /// Clamps `last_page_index` into the current page range.
    pub fn clamp_last_page_index(&mut self) {
        self.last_page_index = self.last_page_index.min(self.pages.len().saturating_sub(1));
    }
}

/// Trims a category name and maps blank values to the default category.
pub fn normalize_category(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_category, Step};

    #[test]
    fn blank_category_becomes_general() {
        assert_eq!(normalize_category("   "), "General");
        assert_eq!(normalize_category(" Swing "), "Swing");
    }

    #[test]
    fn clamp_keeps_index_inside_pages() {
        let mut step = Step::new("s", "", &[]);
        step.last_page_index = 9;
        step.clamp_last_page_index();
        assert_eq!(step.last_page_index, 0);
        assert_eq!(step.category, "General");
    }
}
