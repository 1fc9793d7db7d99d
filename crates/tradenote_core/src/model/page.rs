//! Page domain model.
//!
//! # Responsibility
//! - Define the atomic unit of note content: two image slots, note text,
//!   instrument metadata and the fixed checklist.
//! - Own the persisted page key layout.
//!
//! # Invariants
//! - `checklist.len()` equals the canonical question count of the store that
//!   produced the page.
//! - Every stored stroke has at least two points.
//! - Image paths use forward slashes.

use crate::config::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH};
use crate::model::{new_id, now_epoch};
use serde::ser::{Serialize, Serializer};
use serde::Deserialize;

/// Stable page identifier.
pub type PageId = String;

/// Annotation point in scene coordinates, persisted as `[x, y]`.
pub type Point = [f64; 2];

/// A single freehand or straight-line annotation path.
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct Stroke {
    /// `#RRGGBB` or `#RRGGBBAA`.
    pub color: String,
    /// Pen width, always `> 0`.
    pub width: f64,
    /// Ordered points.
    pub points: Vec<Point>,
}

impl Stroke {
    /// Creates a stroke with the default pen.
    pub fn with_default_pen(points: Vec<Point>) -> Self {
        Self {
            color: DEFAULT_STROKE_COLOR.to_string(),
            width: DEFAULT_STROKE_WIDTH,
            points,
        }
    }

    /// Returns whether the stroke can be drawn at all.
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 2
    }
}

/// Image slot selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlotKind {
    A,
    B,
}

/// One image with its caption and overlay strokes.
///
/// The image file itself is owned by the UI layer; only its relative path is
/// stored here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSlot {
    /// Relative path with forward slashes, or empty when no image is set.
    pub path: String,
    pub caption: String,
    pub strokes: Vec<Stroke>,
}

impl ImageSlot {
    /// Returns whether an image path is set.
    pub fn has_image(&self) -> bool {
        !self.path.is_empty()
    }
}

/// One answer on the fixed per-page checklist.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct ChecklistItem {
    pub question: String,
    pub checked: bool,
    /// Rich-text markup or plain text.
    pub note: String,
}

impl ChecklistItem {
    /// Unchecked item with an empty note.
    pub fn unanswered(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            checked: false,
            note: String::new(),
        }
    }
}

/// Atomic unit of note content.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: PageId,
    pub image_a: ImageSlot,
    pub image_b: ImageSlot,
    /// Rich-text markup.
    pub note_text: String,
    pub stock_name: String,
    pub ticker: String,
    pub checklist: Vec<ChecklistItem>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Page {
    /// Creates an empty page whose checklist follows `questions`.
    pub fn new(questions: &[String]) -> Self {
        let now = now_epoch();
        Self {
            id: new_id(),
            image_a: ImageSlot::default(),
            image_b: ImageSlot::default(),
            note_text: String::new(),
            stock_name: String::new(),
            ticker: String::new(),
            checklist: questions.iter().map(ChecklistItem::unanswered).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot(&self, kind: ImageSlotKind) -> &ImageSlot {
        match kind {
            ImageSlotKind::A => &self.image_a,
            ImageSlotKind::B => &self.image_b,
        }
    }

    pub fn slot_mut(&mut self, kind: ImageSlotKind) -> &mut ImageSlot {
        match kind {
            ImageSlotKind::A => &mut self.image_a,
            ImageSlotKind::B => &mut self.image_b,
        }
    }

    /// Marks the page as edited now.
    pub fn touch(&mut self) {
        self.updated_at = now_epoch();
    }
}

/// Normalizes a stored image path to forward slashes.
pub fn normalize_image_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

#[derive(serde::Serialize)]
struct PageRecord<'a> {
    id: &'a str,
    image_a_path: &'a str,
    image_a_caption: &'a str,
    annotations_a: &'a [Stroke],
    image_b_path: &'a str,
    image_b_caption: &'a str,
    annotations_b: &'a [Stroke],
    note_text: &'a str,
    stock_name: &'a str,
    ticker: &'a str,
    checklist: &'a [ChecklistItem],
    created_at: i64,
    updated_at: i64,
}

impl Serialize for Page {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PageRecord {
            id: &self.id,
            image_a_path: &self.image_a.path,
            image_a_caption: &self.image_a.caption,
            annotations_a: &self.image_a.strokes,
            image_b_path: &self.image_b.path,
            image_b_caption: &self.image_b.caption,
            annotations_b: &self.image_b.strokes,
            note_text: &self.note_text,
            stock_name: &self.stock_name,
            ticker: &self.ticker,
            checklist: &self.checklist,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .serialize(serializer)
    }
}
