//! Category/step hierarchy consistency rules.
//!
//! # Responsibility
//! - Re-derive `category_order` from live step data after every edit.
//! - Validate externally supplied full orderings (drag-and-drop results).
//!
//! # Invariants
//! - The derived order keeps the previous relative order of surviving
//!   categories and appends newly referenced ones in step order.
//! - The derived order is never empty; it degenerates to `["General"]`.

use crate::config::DEFAULT_CATEGORY;
use crate::model::document::Document;
use crate::model::step::{normalize_category, Step};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::Hash;

/// Why a proposed full ordering was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    /// Proposed ordering has a different number of entries.
    LengthMismatch { expected: usize, actual: usize },
    /// Entry appears more than once.
    Duplicate(String),
    /// Entry is not part of the current set.
    Unknown(String),
}

impl Display for OrderingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, actual } => {
                write!(f, "ordering must list {expected} entries, got {actual}")
            }
            Self::Duplicate(entry) => write!(f, "ordering lists `{entry}` more than once"),
            Self::Unknown(entry) => write!(f, "ordering lists unknown entry `{entry}`"),
        }
    }
}

impl Error for OrderingError {}

/// Computes the category order implied by `steps`, keeping `previous` order.
pub fn derive_category_order(previous: &[String], steps: &[Step]) -> Vec<String> {
    let referenced: HashSet<String> = steps
        .iter()
        .map(|step| normalize_category(&step.category))
        .collect();

    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(referenced.len());
    let from_steps = steps.iter().map(|step| &step.category);
    for candidate in previous.iter().chain(from_steps) {
        let category = normalize_category(candidate);
        if referenced.contains(&category) && seen.insert(category.clone()) {
            order.push(category);
        }
    }

    if order.is_empty() {
        order.push(DEFAULT_CATEGORY.to_string());
    }
    order
}

/// Re-establishes the category invariants on a whole document.
///
/// Coerces blank step categories, clamps last-viewed page indexes and
/// re-derives `category_order`. Linear in the number of steps.
pub fn reconcile(doc: &mut Document) {
    for step in &mut doc.steps {
        let category = normalize_category(&step.category);
        if category != step.category {
            step.category = category;
        }
        step.clamp_last_page_index();
    }
    doc.category_order = derive_category_order(&doc.category_order, &doc.steps);
}

/// Returns whether `doc` satisfies the structural invariants.
pub fn is_consistent(doc: &Document) -> bool {
    if doc.steps.is_empty() || doc.steps.iter().any(|step| step.pages.is_empty()) {
        return false;
    }
    if doc
        .steps
        .iter()
        .any(|step| step.last_page_index >= step.pages.len())
    {
        return false;
    }
    let referenced: HashSet<&str> = doc.steps.iter().map(|s| s.category.as_str()).collect();
    let listed: HashSet<&str> = doc.category_order.iter().map(String::as_str).collect();
    listed.len() == doc.category_order.len() && listed == referenced
}

/// Checks that `proposed` is a permutation of `current`.
pub fn validate_permutation<T>(current: &[T], proposed: &[T]) -> Result<(), OrderingError>
where
    T: Eq + Hash + Display,
{
    if current.len() != proposed.len() {
        return Err(OrderingError::LengthMismatch {
            expected: current.len(),
            actual: proposed.len(),
        });
    }

    let known: HashSet<&T> = current.iter().collect();
    let mut seen = HashSet::with_capacity(proposed.len());
    for entry in proposed {
        if !known.contains(entry) {
            return Err(OrderingError::Unknown(entry.to_string()));
        }
        if !seen.insert(entry) {
            return Err(OrderingError::Duplicate(entry.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{derive_category_order, validate_permutation, OrderingError};
    use crate::model::step::Step;

    fn step_in(category: &str) -> Step {
        Step::new("s", category, &[])
    }

    #[test]
    fn derive_keeps_previous_order_and_appends_new() {
        let steps = vec![step_in("B"), step_in("C"), step_in("A")];
        let previous = vec!["A".to_string(), "Gone".to_string(), "B".to_string()];
        assert_eq!(derive_category_order(&previous, &steps), vec!["A", "B", "C"]);
    }

    #[test]
    fn derive_drops_duplicates_and_blank_entries() {
        let steps = vec![step_in("A"), step_in(" ")];
        let previous = vec!["A".to_string(), "A".to_string(), "".to_string()];
        assert_eq!(derive_category_order(&previous, &steps), vec!["A", "General"]);
    }

    #[test]
    fn derive_on_no_steps_is_general() {
        assert_eq!(derive_category_order(&[], &[]), vec!["General"]);
    }

    #[test]
    fn permutation_rejects_omission_duplicate_and_unknown() {
        let current = vec!["a", "b", "c"];
        assert!(validate_permutation(&current, &["c", "a", "b"]).is_ok());
        assert_eq!(
            validate_permutation(&current, &["a", "b"]),
            Err(OrderingError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            validate_permutation(&current, &["a", "a", "b"]),
            Err(OrderingError::Duplicate("a".to_string()))
        );
        assert_eq!(
            validate_permutation(&current, &["a", "b", "z"]),
            Err(OrderingError::Unknown("z".to_string()))
        );
    }
}
