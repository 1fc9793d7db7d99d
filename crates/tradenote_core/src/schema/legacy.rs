//! Decoders for historical page field shapes.
//!
//! # Responsibility
//! - Decode stroke lists in every shape older files used.
//! - Decode image slots from the dual-slot and the single-image layouts.
//!
//! # Invariants
//! - Decoding never fails; unreadable entries are skipped.
//! - Shapes are tried in a fixed priority order: current first, then legacy.

use crate::config::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH};
use crate::model::page::{normalize_image_path, ImageSlot, Point, Stroke};
use crate::schema::coerce;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static HEX_COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("valid hex color regex")
});

const DUAL_SLOT_KEYS: [&str; 6] = [
    "image_a_path",
    "image_a_caption",
    "annotations_a",
    "image_b_path",
    "image_b_caption",
    "annotations_b",
];

/// One stroke entry as found on disk.
enum StrokeShape<'a> {
    /// `{color, width, points}`.
    Record(&'a Map<String, Value>),
    /// Bare `[[x, y], ...]` from files that predate stroke styling.
    PointList(&'a [Value]),
    Unknown,
}

impl<'a> StrokeShape<'a> {
    fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(record) => Self::Record(record),
            Value::Array(points) => Self::PointList(points),
            _ => Self::Unknown,
        }
    }

    fn decode(self) -> Option<Stroke> {
        let stroke = match self {
            Self::Record(record) => {
                let Some(Value::Array(points)) = record.get("points") else {
                    return None;
                };
                Stroke {
                    color: decode_color(record.get("color")),
                    width: coerce::float(record.get("width"))
                        .filter(|width| *width > 0.0)
                        .unwrap_or(DEFAULT_STROKE_WIDTH),
                    points: decode_points(points),
                }
            }
            Self::PointList(points) => Stroke::with_default_pen(decode_points(points)),
            Self::Unknown => return None,
        };
        stroke.is_drawable().then_some(stroke)
    }
}

/// Decodes a stroke list field. Anything that is not a list yields no strokes.
pub(crate) fn decode_strokes(value: Option<&Value>) -> Vec<Stroke> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| StrokeShape::classify(entry).decode())
        .collect()
}

/// Decodes both image slots of a page record.
///
/// When no dual-slot key is present the legacy single-image fields fill
/// slot A and slot B stays empty.
pub(crate) fn decode_image_slots(page: &Map<String, Value>) -> (ImageSlot, ImageSlot) {
    let has_dual_slot = DUAL_SLOT_KEYS.iter().any(|key| page.contains_key(*key));
    if has_dual_slot {
        return (
            decode_slot(page, "image_a_path", "image_a_caption", "annotations_a"),
            decode_slot(page, "image_b_path", "image_b_caption", "annotations_b"),
        );
    }

    let mut legacy = decode_slot(page, "image_path", "image_caption", "annotations");
    if legacy.caption.is_empty() {
        legacy.caption = coerce::string(page.get("caption")).unwrap_or_default();
    }
    (legacy, ImageSlot::default())
}

fn decode_slot(
    page: &Map<String, Value>,
    path_key: &str,
    caption_key: &str,
    strokes_key: &str,
) -> ImageSlot {
    ImageSlot {
        path: coerce::string(page.get(path_key))
            .map(|path| normalize_image_path(&path))
            .unwrap_or_default(),
        caption: coerce::string(page.get(caption_key)).unwrap_or_default(),
        strokes: decode_strokes(page.get(strokes_key)),
    }
}

fn decode_color(value: Option<&Value>) -> String {
    match coerce::string(value) {
        Some(color) if HEX_COLOR_RE.is_match(color.trim()) => color.trim().to_string(),
        _ => DEFAULT_STROKE_COLOR.to_string(),
    }
}

/// Returns whether `color` is a stroke color the store accepts as-is.
pub(crate) fn is_valid_color(color: &str) -> bool {
    HEX_COLOR_RE.is_match(color)
}

fn decode_points(values: &[Value]) -> Vec<Point> {
    values.iter().filter_map(decode_point).collect()
}

fn decode_point(value: &Value) -> Option<Point> {
    match value {
        Value::Array(pair) if pair.len() >= 2 => {
            Some([coerce::float(pair.first())?, coerce::float(pair.get(1))?])
        }
        Value::Object(record) => Some([
            coerce::float(record.get("x"))?,
            coerce::float(record.get("y"))?,
        ]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_image_slots, decode_strokes};
    use serde_json::json;

    #[test]
    fn record_strokes_keep_pen_and_drop_short_ones() {
        let strokes = decode_strokes(Some(&json!([
            {"color": "#00ff00", "width": 3.5, "points": [[0, 0], [1, 1], [2, 4]]},
            {"color": "#00ff00", "width": 3.5, "points": [[0, 0]]},
            {"color": "#00ff00", "width": 3.5, "points": "oops"}
        ])));
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].color, "#00ff00");
        assert_eq!(strokes[0].width, 3.5);
        assert_eq!(strokes[0].points, vec![[0.0, 0.0], [1.0, 1.0], [2.0, 4.0]]);
    }

    #[test]
    fn invalid_pen_values_fall_back_to_defaults() {
        let strokes = decode_strokes(Some(&json!([
            {"color": "red", "width": -1, "points": [[0, 0], [1, 1]]}
        ])));
        assert_eq!(strokes[0].color, "#ff3b30");
        assert_eq!(strokes[0].width, 2.0);
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let strokes = decode_strokes(Some(&json!([
            42,
            null,
            [[0, 0], ["x", 1], [3, 3]],
            {"points": [{"x": 1, "y": 2}, {"x": 3, "y": 4}]}
        ])));
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[0].points, vec![[0.0, 0.0], [3.0, 3.0]]);
        assert_eq!(strokes[1].points, vec![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn non_list_stroke_field_is_empty() {
        assert!(decode_strokes(Some(&json!({"points": []}))).is_empty());
        assert!(decode_strokes(None).is_empty());
    }

    #[test]
    fn legacy_single_image_fills_slot_a_only() {
        let page = json!({
            "image_path": "assets\\Step_1\\p.png",
            "annotations": [[[0, 0], [5, 5]]]
        });
        let (a, b) = decode_image_slots(page.as_object().unwrap());
        assert_eq!(a.path, "assets/Step_1/p.png");
        assert_eq!(a.strokes.len(), 1);
        assert_eq!(b, Default::default());
    }

    #[test]
    fn dual_slot_fields_win_over_legacy_fields() {
        let page = json!({
            "image_path": "old.png",
            "image_b_path": "b.png",
            "image_b_caption": "daily"
        });
        let (a, b) = decode_image_slots(page.as_object().unwrap());
        assert_eq!(a.path, "");
        assert_eq!(b.path, "b.png");
        assert_eq!(b.caption, "daily");
    }
}
