use serde_json::{json, Value};
use tradenote_core::{is_consistent, normalize, Document, StoreConfig};

fn questions() -> Vec<String> {
    StoreConfig::default().checklist_questions
}

fn renormalize(doc: &Document) -> Document {
    let raw = serde_json::to_value(doc).unwrap();
    normalize(&raw, &questions())
}

fn legacy_fixture() -> Value {
    json!({
        "version": "0.1.0",
        "created_at": 1_700_000_000,
        "steps": [
            {
                "id": "s-1",
                "name": "Breakout",
                "category": "  ",
                "last_page_index": 7,
                "pages": [
                    {
                        "id": "p-1",
                        "image_path": "assets\\Step_1\\chart.png",
                        "caption": "weekly",
                        "annotations": [
                            [[0, 0], [10, 10]],
                            {"color": "#00ff00", "width": 4, "points": [{"x": 1, "y": 2}, {"x": 3, "y": 4}]},
                            [[1, 1]],
                            "garbage"
                        ],
                        "note_text": "<p>entry</p>",
                        "checklist": [{"question": "renamed", "checked": true, "note": "ok"}]
                    }
                ]
            },
            {"id": "s-1", "name": "Copy", "category": "Swing", "pages": []},
            "not a step"
        ],
        "category_order": ["Swing", "Ghost"],
        "ui_state": {"splitter": [1, 2], "zoom": {"level": 1.5}}
    })
}

#[test]
fn garbage_roots_yield_the_seeded_document() {
    for raw in [Value::Null, json!([]), json!({}), json!("text"), json!(42)] {
        let doc = normalize(&raw, &questions());
        assert_eq!(doc.steps.len(), 3);
        assert_eq!(doc.category_order, vec!["General".to_string()]);
        assert!(is_consistent(&doc));
    }
}

#[test]
fn legacy_single_image_fills_slot_a() {
    let doc = normalize(&legacy_fixture(), &questions());
    let page = &doc.steps[0].pages[0];

    assert_eq!(page.image_a.path, "assets/Step_1/chart.png");
    assert_eq!(page.image_a.caption, "weekly");
    assert!(!page.image_b.has_image());
    assert!(page.image_b.strokes.is_empty());
}

#[test]
fn legacy_strokes_decode_to_records_with_default_pen() {
    let doc = normalize(&legacy_fixture(), &questions());
    let strokes = &doc.steps[0].pages[0].image_a.strokes;

    assert_eq!(strokes.len(), 2);
    assert_eq!(strokes[0].color, "#ff3b30");
    assert_eq!(strokes[0].width, 2.0);
    assert_eq!(strokes[0].points, vec![[0.0, 0.0], [10.0, 10.0]]);
    assert_eq!(strokes[1].color, "#00ff00");
    assert_eq!(strokes[1].width, 4.0);
    assert_eq!(strokes[1].points, vec![[1.0, 2.0], [3.0, 4.0]]);
}

#[test]
fn checklist_is_realigned_to_canonical_questions() {
    let doc = normalize(&legacy_fixture(), &questions());
    let checklist = &doc.steps[0].pages[0].checklist;

    assert_eq!(checklist.len(), questions().len());
    assert_eq!(checklist[0].question, questions()[0]);
    assert!(checklist[0].checked);
    assert_eq!(checklist[0].note, "ok");
    assert!(checklist[1..].iter().all(|item| !item.checked && item.note.is_empty()));
}

#[test]
fn structural_repairs_are_applied() {
    let doc = normalize(&legacy_fixture(), &questions());

    assert_eq!(doc.steps.len(), 2);
    assert_eq!(doc.steps[0].category, "General");
    assert_eq!(doc.steps[0].last_page_index, 0);
    assert_eq!(doc.steps[0].id, "s-1");
    assert_ne!(doc.steps[1].id, "s-1");
    assert_eq!(doc.steps[1].pages.len(), 1);
    assert_eq!(doc.category_order, vec!["Swing".to_string(), "General".to_string()]);
    assert_eq!(doc.created_at, 1_700_000_000);
    assert!(is_consistent(&doc));
}

#[test]
fn ui_state_is_preserved_verbatim() {
    let doc = normalize(&legacy_fixture(), &questions());
    assert_eq!(
        Value::Object(doc.ui_state.clone()),
        json!({"splitter": [1, 2], "zoom": {"level": 1.5}})
    );
}

#[test]
fn dual_slot_keys_take_priority_over_legacy_fields() {
    let raw = json!({
        "steps": [{
            "name": "Gap",
            "pages": [{
                "image_path": "legacy.png",
                "image_a_path": "a.png",
                "annotations_a": [{"color": "#123456", "width": 1.5, "points": [[0, 0], [1, 1]]}],
                "image_b_path": "b.png",
                "image_b_caption": "intraday"
            }]
        }]
    });
    let doc = normalize(&raw, &questions());
    let page = &doc.steps[0].pages[0];

    assert_eq!(page.image_a.path, "a.png");
    assert_eq!(page.image_a.strokes.len(), 1);
    assert_eq!(page.image_b.path, "b.png");
    assert_eq!(page.image_b.caption, "intraday");
}

#[test]
fn serialized_document_uses_flat_page_keys() {
    let doc = normalize(&legacy_fixture(), &questions());
    let raw = serde_json::to_value(&doc).unwrap();
    let page = &raw["steps"][0]["pages"][0];

    for key in [
        "id",
        "image_a_path",
        "image_a_caption",
        "annotations_a",
        "image_b_path",
        "image_b_caption",
        "annotations_b",
        "note_text",
        "stock_name",
        "ticker",
        "checklist",
        "created_at",
        "updated_at",
    ] {
        assert!(page.get(key).is_some(), "missing page key `{key}`");
    }
    assert!(page.get("image_path").is_none());
    assert!(raw["steps"][0].get("last_page_index").is_some());
}

#[test]
fn normalization_round_trips_and_is_idempotent() {
    let first = normalize(&legacy_fixture(), &questions());
    let second = renormalize(&first);
    let third = renormalize(&second);

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn fractional_coordinates_survive_round_trip() {
    let raw = json!({
        "steps": [{
            "name": "Precision",
            "pages": [{
                "image_a_path": "a.png",
                "annotations_a": [{"color": "#abcdef", "width": 2.25, "points": [[0.1, 0.2], [123.456789, 0.3]]}]
            }]
        }]
    });
    let doc = normalize(&raw, &questions());
    assert_eq!(renormalize(&doc), doc);
    assert_eq!(doc.steps[0].pages[0].image_a.strokes[0].points[1], [123.456789, 0.3]);
}

#[test]
fn shorter_question_list_drops_extra_answers() {
    let raw = json!({
        "steps": [{
            "name": "Short",
            "pages": [{"checklist": [
                {"checked": true, "note": "a"},
                {"checked": true, "note": "b"},
                {"checked": true, "note": "c"}
            ]}]
        }]
    });
    let short = vec!["only".to_string()];
    let doc = normalize(&raw, &short);
    let checklist = &doc.steps[0].pages[0].checklist;
    assert_eq!(checklist.len(), 1);
    assert_eq!(checklist[0].note, "a");
}

#[test]
fn unknown_top_level_keys_survive_round_trip() {
    let raw = json!({
        "steps": [{"name": "Keep", "pages": [{}]}],
        "extra_top": {"theme": "dark", "panels": [1, 2]},
        "schema_hint": 3
    });
    let doc = normalize(&raw, &questions());
    assert_eq!(doc.extra["extra_top"], json!({"theme": "dark", "panels": [1, 2]}));
    assert!(!doc.extra.contains_key("steps"));

    let written = serde_json::to_value(&doc).unwrap();
    assert_eq!(written["extra_top"], raw["extra_top"]);
    assert_eq!(written["schema_hint"], 3);
    assert!(written.get("extra").is_none());
    assert_eq!(renormalize(&doc), doc);
}
