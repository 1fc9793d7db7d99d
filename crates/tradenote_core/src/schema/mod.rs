//! Schema normalization from untyped JSON into the canonical model.
//!
//! # Responsibility
//! - Turn any JSON tree (current, legacy or garbage) into a valid `Document`.
//! - Keep all knowledge of historical field shapes behind this boundary.
//!
//! # Invariants
//! - `normalize` is total: it never fails and never panics on input shape.
//! - Normalizing an already-canonical document is a no-op.
//! - Checklists are realigned by position against the canonical questions.
//! - Ids are unique after normalization; duplicates get fresh ids.

mod coerce;
mod legacy;

pub(crate) use legacy::is_valid_color;

use crate::config::{DEFAULT_STEP_NAME, FORMAT_VERSION};
use crate::model::document::{Document, UiState};
use crate::model::new_id;
use crate::model::now_epoch;
use crate::model::page::{ChecklistItem, Page};
use crate::model::step::{normalize_category, Step};
use crate::service::hierarchy;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Top-level keys owned by the canonical model; everything else is carried
/// through in `Document::extra`.
const DOCUMENT_KEYS: [&str; 7] = [
    "version",
    "created_at",
    "updated_at",
    "steps",
    "category_order",
    "global_ideas",
    "ui_state",
];

/// Normalizes a raw JSON tree against the canonical checklist `questions`.
pub fn normalize(raw: &Value, questions: &[String]) -> Document {
    Normalizer::new(questions).document(raw)
}

/// Realigns stored checklist answers to `questions` by position.
///
/// Answers beyond the canonical length are discarded; missing answers are
/// unchecked with an empty note. Stored question text is ignored.
pub fn realign_checklist(stored: &[Value], questions: &[String]) -> Vec<ChecklistItem> {
    questions
        .iter()
        .enumerate()
        .map(|(position, question)| {
            let mut item = ChecklistItem::unanswered(question.as_str());
            if let Some(Value::Object(answer)) = stored.get(position) {
                item.checked = coerce::boolean(answer.get("checked")).unwrap_or(false);
                item.note = coerce::string(answer.get("note")).unwrap_or_default();
            }
            item
        })
        .collect()
}

struct Normalizer<'q> {
    questions: &'q [String],
    now: i64,
    step_ids: HashSet<String>,
    page_ids: HashSet<String>,
}

impl<'q> Normalizer<'q> {
    fn new(questions: &'q [String]) -> Self {
        Self {
            questions,
            now: now_epoch(),
            step_ids: HashSet::new(),
            page_ids: HashSet::new(),
        }
    }

    fn document(mut self, raw: &Value) -> Document {
        let root = match raw {
            Value::Object(root) if !root.is_empty() => root,
            _ => return Document::seeded(self.questions),
        };

        let mut steps: Vec<Step> = match root.get("steps") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(Value::as_object)
                .map(|entry| self.step(entry))
                .collect(),
            _ => Vec::new(),
        };
        if steps.is_empty() {
            steps = Document::seeded(self.questions).steps;
        }

        let category_order = match root.get("category_order") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| coerce::string(Some(entry)))
                .collect(),
            _ => Vec::new(),
        };

        let ui_state = match root.get("ui_state") {
            Some(Value::Object(state)) => state.clone(),
            _ => UiState::new(),
        };

        let created_at = coerce::int(root.get("created_at")).unwrap_or(self.now);
        let mut doc = Document {
            version: coerce::non_blank_string(root.get("version"))
                .unwrap_or_else(|| FORMAT_VERSION.to_string()),
            created_at,
            updated_at: coerce::int(root.get("updated_at")).unwrap_or(created_at),
            steps,
            category_order,
            global_ideas: coerce::string(root.get("global_ideas")).unwrap_or_default(),
            ui_state,
            extra: root
                .iter()
                .filter(|(key, _)| !DOCUMENT_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };
        hierarchy::reconcile(&mut doc);
        doc
    }

    fn step(&mut self, raw: &Map<String, Value>) -> Step {
        let id = unique_id(&mut self.step_ids, raw.get("id"));
        let mut pages: Vec<Page> = match raw.get("pages") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(Value::as_object)
                .map(|entry| self.page(entry))
                .collect(),
            _ => Vec::new(),
        };
        if pages.is_empty() {
            let page = Page::new(self.questions);
            self.page_ids.insert(page.id.clone());
            pages.push(page);
        }

        let last_page_index = coerce::int(raw.get("last_page_index"))
            .unwrap_or(0)
            .clamp(0, pages.len() as i64 - 1) as usize;

        Step {
            id,
            name: coerce::string(raw.get("name")).unwrap_or_else(|| DEFAULT_STEP_NAME.to_string()),
            category: normalize_category(&coerce::string(raw.get("category")).unwrap_or_default()),
            last_page_index,
            pages,
        }
    }

    fn page(&mut self, raw: &Map<String, Value>) -> Page {
        let (image_a, image_b) = legacy::decode_image_slots(raw);
        let stored_checklist: &[Value] = match raw.get("checklist") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        let created_at = coerce::int(raw.get("created_at")).unwrap_or(self.now);

        Page {
            id: unique_id(&mut self.page_ids, raw.get("id")),
            image_a,
            image_b,
            note_text: coerce::string(raw.get("note_text")).unwrap_or_default(),
            stock_name: coerce::string(raw.get("stock_name")).unwrap_or_default(),
            ticker: coerce::string(raw.get("ticker")).unwrap_or_default(),
            checklist: realign_checklist(stored_checklist, self.questions),
            created_at,
            updated_at: coerce::int(raw.get("updated_at")).unwrap_or(created_at),
        }
    }
}

fn unique_id(seen: &mut HashSet<String>, raw: Option<&Value>) -> String {
    match coerce::non_blank_string(raw) {
        Some(id) if seen.insert(id.clone()) => id,
        _ => {
            let id = new_id();
            seen.insert(id.clone());
            id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize, realign_checklist};
    use serde_json::json;

    fn questions() -> Vec<String> {
        ["q1", "q2", "q3", "q4"].iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn checklist_two_stored_against_four_questions() {
        let stored = json!([
            {"question": "old wording", "checked": true, "note": "<b>yes</b>"},
            {"question": "q2", "checked": false, "note": "later"}
        ]);
        let items = realign_checklist(stored.as_array().unwrap(), &questions());
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].question, "q1");
        assert!(items[0].checked);
        assert_eq!(items[0].note, "<b>yes</b>");
        assert_eq!(items[1].note, "later");
        assert!(!items[2].checked && items[2].note.is_empty());
        assert!(!items[3].checked && items[3].note.is_empty());
    }

    #[test]
    fn checklist_extra_items_are_discarded() {
        let stored = json!([{"checked": true}, {"checked": true}, {"checked": true}]);
        let items = realign_checklist(stored.as_array().unwrap(), &questions()[..2]);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn non_object_root_yields_seed() {
        for raw in [json!(null), json!([]), json!("text"), json!({})] {
            let doc = normalize(&raw, &questions());
            assert_eq!(doc.steps.len(), 3);
            assert_eq!(doc.category_order, vec!["General"]);
        }
    }

    #[test]
    fn empty_step_list_is_seeded_but_ui_state_survives() {
        let doc = normalize(&json!({"steps": [], "ui_state": {"split": 0.4}}), &questions());
        assert_eq!(doc.steps.len(), 3);
        assert_eq!(doc.ui_state["split"], 0.4);
    }

    #[test]
    fn duplicate_ids_are_regenerated() {
        let raw = json!({"steps": [
            {"id": "same", "pages": [{"id": "p"}, {"id": "p"}]},
            {"id": "same"}
        ]});
        let doc = normalize(&raw, &questions());
        assert_eq!(doc.steps[0].id, "same");
        assert_ne!(doc.steps[1].id, "same");
        assert_eq!(doc.steps[0].pages[0].id, "p");
        assert_ne!(doc.steps[0].pages[1].id, "p");
    }

    #[test]
    fn last_page_index_is_clamped() {
        let raw = json!({"steps": [{"last_page_index": 12, "pages": [{}, {}]}]});
        let doc = normalize(&raw, &questions());
        assert_eq!(doc.steps[0].last_page_index, 1);
    }
}
