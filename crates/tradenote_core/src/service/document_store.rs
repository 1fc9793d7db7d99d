//! Document store: the aggregate root for all note edits.
//!
//! # Responsibility
//! - Own the in-memory document and expose every structural and content edit.
//! - Delegate loading to the normalizer and saving to the atomic writer.
//!
//! # Invariants
//! - Every call is all-or-nothing: a rejected call leaves the document as it
//!   was.
//! - `steps` never becomes empty; a step never loses its last page.
//! - Every successful mutation re-derives `category_order` before returning.
//! - Persistence is a separate step; no mutation touches the disk.

use crate::config::{
    StoreConfig, DEFAULT_STEP_NAME, DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, FORMAT_VERSION,
};
use crate::model::document::{Document, UiState};
use crate::model::now_epoch;
use crate::model::page::{normalize_image_path, ImageSlotKind, Page, Stroke};
use crate::model::step::{normalize_category, Step, StepId};
use crate::repo::atomic_writer::{AtomicWriter, FileOps, WriteError, WriteReport};
use crate::repo::document_file::{read_document, LoadSource};
use crate::schema::is_valid_color;
use crate::service::hierarchy::{self, OrderingError};
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// `ui_state` key recording whether the most recent save reached the file.
pub const UI_STATE_LAST_SAVE_OK: &str = "last_save_ok";
/// `ui_state` key recording the epoch of the most recent failed save.
pub const UI_STATE_LAST_SAVE_FAILED_AT: &str = "last_save_failed_at";

pub type StoreResult<T> = Result<T, StoreError>;

/// Rejection reasons for document store edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No step has this id.
    StepNotFound(StepId),
    /// Step exists but has no page at this index.
    PageNotFound { step_id: StepId, index: usize },
    /// Page has no checklist item at this position.
    ChecklistItemNotFound { position: usize },
    /// No step references this category.
    CategoryNotFound(String),
    /// The last remaining step cannot be deleted.
    LastStep,
    /// The only page of a step cannot be deleted.
    LastPage(StepId),
    /// Deleting this category would delete every step.
    WouldRemoveAllSteps(String),
    /// Name is blank after trim.
    BlankName,
    /// Proposed full ordering is not a permutation of the current one.
    InvalidOrdering(OrderingError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StepNotFound(id) => write!(f, "step not found: {id}"),
            Self::PageNotFound { step_id, index } => {
                write!(f, "page {index} not found in step {step_id}")
            }
            Self::ChecklistItemNotFound { position } => {
                write!(f, "checklist item {position} not found")
            }
            Self::CategoryNotFound(name) => write!(f, "category not found: `{name}`"),
            Self::LastStep => write!(f, "at least one step must remain"),
            Self::LastPage(step_id) => write!(f, "step {step_id} must keep at least one page"),
            Self::WouldRemoveAllSteps(name) => {
                write!(f, "deleting category `{name}` would remove every step")
            }
            Self::BlankName => write!(f, "name must not be blank"),
            Self::InvalidOrdering(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidOrdering(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OrderingError> for StoreError {
    fn from(value: OrderingError) -> Self {
        Self::InvalidOrdering(value)
    }
}

/// Direction for moving a category one slot in `category_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Towards the front (`-1`).
    Up,
    /// Towards the back (`+1`).
    Down,
}

impl TryFrom<i32> for MoveDirection {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Up),
            1 => Ok(Self::Down),
            other => Err(other),
        }
    }
}

/// Partial page content update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageEdit {
    pub note_text: Option<String>,
    pub stock_name: Option<String>,
    pub ticker: Option<String>,
}

/// Aggregate root owning the document and its configuration.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    doc: Document,
    config: StoreConfig,
    load_source: LoadSource,
}

impl DocumentStore {
    /// Wraps an existing document, re-establishing hierarchy invariants.
    pub fn new(mut doc: Document, config: StoreConfig) -> Self {
        if doc.steps.is_empty() {
            doc.steps = Document::seeded(&config.checklist_questions).steps;
        }
        for step in doc.steps.iter_mut().filter(|step| step.pages.is_empty()) {
            step.pages.push(Page::new(&config.checklist_questions));
        }
        hierarchy::reconcile(&mut doc);
        Self {
            doc,
            config,
            load_source: LoadSource::File,
        }
    }

    /// Creates a store holding the seeded default document.
    pub fn seeded(config: StoreConfig) -> Self {
        let doc = Document::seeded(&config.checklist_questions);
        let mut store = Self::new(doc, config);
        store.load_source = LoadSource::Missing;
        store
    }

    /// Loads `path`, falling back to the seeded document when the file is
    /// missing or unreadable. The file itself is never modified here.
    pub fn load(path: &Path, config: StoreConfig) -> Self {
        let loaded = read_document(path, &config.checklist_questions);
        let mut store = Self::new(loaded.document, config);
        store.load_source = loaded.source;
        store
    }

    /// Saves through a real-file-system writer using the configured retry policy.
    pub fn save(&mut self, path: &Path) -> Result<WriteReport, WriteError> {
        let writer = AtomicWriter::new(self.config.retry);
        self.save_with(path, &writer)
    }

    /// Stamps `version`/`updated_at`, writes through `writer` and records the
    /// outcome in `ui_state`.
    ///
    /// # Errors
    /// Returns the writer error unchanged. The in-memory document stays
    /// authoritative either way.
    pub fn save_with<F: FileOps>(
        &mut self,
        path: &Path,
        writer: &AtomicWriter<F>,
    ) -> Result<WriteReport, WriteError> {
        self.doc.version = FORMAT_VERSION.to_string();
        self.doc.updated_at = now_epoch();

        let result = writer.write(path, &self.doc);
        match &result {
            Ok(report) => {
                self.doc
                    .ui_state
                    .insert(UI_STATE_LAST_SAVE_OK.to_string(), Value::Bool(true));
                info!(
                    "event=doc_save module=service status=ok steps={} attempts={}",
                    self.doc.steps.len(),
                    report.attempts
                );
            }
            Err(err) => {
                self.doc
                    .ui_state
                    .insert(UI_STATE_LAST_SAVE_OK.to_string(), Value::Bool(false));
                self.doc.ui_state.insert(
                    UI_STATE_LAST_SAVE_FAILED_AT.to_string(),
                    Value::from(now_epoch()),
                );
                warn!("event=doc_save module=service status=error error={}", err);
            }
        }
        result
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Origin of the document returned by the last [`DocumentStore::load`].
    pub fn load_source(&self) -> &LoadSource {
        &self.load_source
    }

    pub fn steps(&self) -> &[Step] {
        &self.doc.steps
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.doc.steps.iter().find(|step| step.id == step_id)
    }

    pub fn page(&self, step_id: &str, index: usize) -> Option<&Page> {
        self.step(step_id).and_then(|step| step.pages.get(index))
    }

    pub fn category_order(&self) -> &[String] {
        &self.doc.category_order
    }

    /// Steps tagged with `category`, in document order.
    pub fn steps_in_category<'a>(&'a self, category: &str) -> impl Iterator<Item = &'a Step> + 'a {
        let category = normalize_category(category);
        self.doc
            .steps
            .iter()
            .filter(move |step| step.category == category)
    }

    pub fn global_ideas(&self) -> &str {
        &self.doc.global_ideas
    }

    pub fn set_global_ideas(&mut self, text: impl Into<String>) {
        self.doc.global_ideas = text.into();
        self.reconcile();
    }

    pub fn ui_state(&self) -> &UiState {
        &self.doc.ui_state
    }

    /// Opaque UI bag; core never reads the caller's keys.
    pub fn ui_state_mut(&mut self) -> &mut UiState {
        &mut self.doc.ui_state
    }

    /// Appends a step with one empty page. A blank name becomes the default
    /// step name; an unseen category is registered at the end of the order.
    pub fn add_step(&mut self, name: &str, category: &str) -> Step {
        let name = match name.trim() {
            "" => DEFAULT_STEP_NAME,
            trimmed => trimmed,
        };
        let step = Step::new(name, category, &self.config.checklist_questions);
        self.doc.steps.push(step.clone());
        self.reconcile();
        info!(
            "event=store_mutation module=service op=add_step status=ok steps={}",
            self.doc.steps.len()
        );
        step
    }

    /// Removes a step and its pages.
    ///
    /// # Errors
    /// - `StepNotFound` for an unknown id.
    /// - `LastStep` when it is the only remaining step.
    pub fn delete_step(&mut self, step_id: &str) -> StoreResult<Step> {
        let position = self.step_position(step_id)?;
        if self.doc.steps.len() <= 1 {
            return Err(self.rejected("delete_step", StoreError::LastStep));
        }
        let removed = self.doc.steps.remove(position);
        self.reconcile();
        info!(
            "event=store_mutation module=service op=delete_step status=ok pages_removed={}",
            removed.pages.len()
        );
        Ok(removed)
    }

    pub fn rename_step(&mut self, step_id: &str, name: &str) -> StoreResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.rejected("rename_step", StoreError::BlankName));
        }
        let position = self.step_position(step_id)?;
        self.doc.steps[position].name = name.to_string();
        self.reconcile();
        Ok(())
    }

    /// Moves one step into `category`, creating the category when unseen.
    pub fn set_step_category(&mut self, step_id: &str, category: &str) -> StoreResult<()> {
        let position = self.step_position(step_id)?;
        self.doc.steps[position].category = normalize_category(category);
        self.reconcile();
        Ok(())
    }

    /// Renames `old` to `new` on every member step.
    ///
    /// When `new` already exists the two categories merge into `new`'s slot;
    /// otherwise the slot is renamed in place. Equal names are a no-op.
    pub fn rename_category(&mut self, old: &str, new: &str) -> StoreResult<()> {
        let old = normalize_category(old);
        let new = normalize_category(new);
        if old == new {
            return Ok(());
        }
        let reassigned = self.reassign_category(&old, &new, "rename_category")?;
        info!(
            "event=store_mutation module=service op=rename_category status=ok steps={}",
            reassigned
        );
        Ok(())
    }

    /// Removes `category`, moving its steps to `move_to`.
    ///
    /// Returns the number of moved steps. Moving a category onto itself is a
    /// no-op.
    pub fn delete_category_move_steps(&mut self, category: &str, move_to: &str) -> StoreResult<usize> {
        let category = normalize_category(category);
        let move_to = normalize_category(move_to);
        if category == move_to {
            self.category_position(&category, "delete_category_move_steps")?;
            return Ok(0);
        }
        self.reassign_category(&category, &move_to, "delete_category_move_steps")
    }

    /// Removes `category` together with its steps.
    ///
    /// # Errors
    /// - `CategoryNotFound` for an unknown category.
    /// - `WouldRemoveAllSteps` when every step belongs to it.
    pub fn delete_category_and_steps(&mut self, category: &str) -> StoreResult<Vec<Step>> {
        let category = normalize_category(category);
        let slot = self.category_position(&category, "delete_category_and_steps")?;
        if self.doc.steps.iter().all(|step| step.category == category) {
            return Err(self.rejected(
                "delete_category_and_steps",
                StoreError::WouldRemoveAllSteps(category),
            ));
        }

        let (removed, kept): (Vec<Step>, Vec<Step>) = std::mem::take(&mut self.doc.steps)
            .into_iter()
            .partition(|step| step.category == category);
        self.doc.steps = kept;
        self.doc.category_order.remove(slot);
        self.reconcile();
        info!(
            "event=store_mutation module=service op=delete_category_and_steps status=ok steps_removed={}",
            removed.len()
        );
        Ok(removed)
    }

    /// Swaps `category` with its neighbour. Returns `false` at either boundary.
    pub fn move_category(&mut self, category: &str, direction: MoveDirection) -> StoreResult<bool> {
        let category = normalize_category(category);
        let slot = self.category_position(&category, "move_category")?;
        let neighbour = match direction {
            MoveDirection::Up => slot.checked_sub(1),
            MoveDirection::Down => Some(slot + 1).filter(|n| *n < self.doc.category_order.len()),
        };
        let Some(neighbour) = neighbour else {
            return Ok(false);
        };
        self.doc.category_order.swap(slot, neighbour);
        self.reconcile();
        Ok(true)
    }

    /// Replaces the category order with a full permutation of the current one.
    pub fn reorder_categories(&mut self, order: &[String]) -> StoreResult<()> {
        if let Err(err) = hierarchy::validate_permutation(&self.doc.category_order, order) {
            return Err(self.rejected("reorder_categories", err.into()));
        }
        self.doc.category_order = order.to_vec();
        self.reconcile();
        Ok(())
    }

    /// Replaces the step order with a full permutation of the current step ids.
    pub fn reorder_steps(&mut self, step_ids: &[StepId]) -> StoreResult<()> {
        let current: Vec<StepId> = self.doc.steps.iter().map(|step| step.id.clone()).collect();
        if let Err(err) = hierarchy::validate_permutation(&current, step_ids) {
            return Err(self.rejected("reorder_steps", err.into()));
        }
        let mut remaining = std::mem::take(&mut self.doc.steps);
        for step_id in step_ids {
            if let Some(position) = remaining.iter().position(|step| &step.id == step_id) {
                self.doc.steps.push(remaining.swap_remove(position));
            }
        }
        self.reconcile();
        Ok(())
    }

    /// Inserts an empty page at `at_index` (clamped to the page count) and
    /// makes it the step's last viewed page. Returns the insertion index.
    pub fn add_page(&mut self, step_id: &str, at_index: usize) -> StoreResult<usize> {
        let position = self.step_position(step_id)?;
        let page = Page::new(&self.config.checklist_questions);
        let step = &mut self.doc.steps[position];
        let index = at_index.min(step.pages.len());
        step.pages.insert(index, page);
        step.last_page_index = index;
        self.reconcile();
        Ok(index)
    }

    /// Removes one page.
    ///
    /// # Errors
    /// - `PageNotFound` for an out-of-range index.
    /// - `LastPage` when it is the step's only page.
    pub fn delete_page(&mut self, step_id: &str, index: usize) -> StoreResult<Page> {
        let position = self.step_position(step_id)?;
        let pages = self.doc.steps[position].pages.len();
        if index >= pages {
            return Err(StoreError::PageNotFound {
                step_id: step_id.to_string(),
                index,
            });
        }
        if pages <= 1 {
            return Err(self.rejected("delete_page", StoreError::LastPage(step_id.to_string())));
        }
        let removed = self.doc.steps[position].pages.remove(index);
        self.reconcile();
        Ok(removed)
    }

    /// Applies a partial content edit. Returns whether anything changed;
    /// `updated_at` is only touched on change.
    pub fn update_page(&mut self, step_id: &str, index: usize, edit: PageEdit) -> StoreResult<bool> {
        let page = self.page_mut(step_id, index)?;
        let mut changed = false;
        for (target, value) in [
            (&mut page.note_text, edit.note_text),
            (&mut page.stock_name, edit.stock_name),
            (&mut page.ticker, edit.ticker),
        ] {
            if let Some(value) = value {
                if *target != value {
                    *target = value;
                    changed = true;
                }
            }
        }
        if changed {
            page.touch();
        }
        self.reconcile();
        Ok(changed)
    }

    /// Sets the image path and caption of one slot. A different image path
    /// clears the slot's strokes, whose coordinates belong to the old image.
    pub fn set_image(
        &mut self,
        step_id: &str,
        index: usize,
        slot: ImageSlotKind,
        path: &str,
        caption: &str,
    ) -> StoreResult<()> {
        let page = self.page_mut(step_id, index)?;
        let path = normalize_image_path(path);
        let target = page.slot_mut(slot);
        if target.path != path {
            target.strokes.clear();
            target.path = path;
        }
        target.caption = caption.to_string();
        page.touch();
        self.reconcile();
        Ok(())
    }

    /// Replaces a slot's strokes. Strokes with fewer than two points are
    /// dropped and invalid pens reset to defaults. Returns the kept count.
    pub fn set_strokes(
        &mut self,
        step_id: &str,
        index: usize,
        slot: ImageSlotKind,
        strokes: Vec<Stroke>,
    ) -> StoreResult<usize> {
        let page = self.page_mut(step_id, index)?;
        let kept: Vec<Stroke> = strokes
            .into_iter()
            .map(sanitize_pen)
            .filter(Stroke::is_drawable)
            .collect();
        let count = kept.len();
        page.slot_mut(slot).strokes = kept;
        page.touch();
        self.reconcile();
        Ok(count)
    }

    pub fn clear_strokes(&mut self, step_id: &str, index: usize, slot: ImageSlotKind) -> StoreResult<()> {
        self.set_strokes(step_id, index, slot, Vec::new()).map(|_| ())
    }

    /// Updates one checklist answer. The question text is fixed.
    pub fn set_checklist_item(
        &mut self,
        step_id: &str,
        index: usize,
        position: usize,
        checked: bool,
        note: &str,
    ) -> StoreResult<()> {
        let page = self.page_mut(step_id, index)?;
        let item = page
            .checklist
            .get_mut(position)
            .ok_or(StoreError::ChecklistItemNotFound { position })?;
        item.checked = checked;
        item.note = note.to_string();
        page.touch();
        self.reconcile();
        Ok(())
    }

    /// Records the last viewed page, clamped to the page range.
    pub fn set_last_page_index(&mut self, step_id: &str, index: usize) -> StoreResult<usize> {
        let position = self.step_position(step_id)?;
        let step = &mut self.doc.steps[position];
        step.last_page_index = index;
        step.clamp_last_page_index();
        let clamped = step.last_page_index;
        self.reconcile();
        Ok(clamped)
    }

    /// Moves every step of `from` to `to` and folds `from`'s slot into the
    /// order: merged into `to`'s slot when it exists, renamed in place
    /// otherwise. Returns the number of moved steps.
    fn reassign_category(&mut self, from: &str, to: &str, op: &str) -> StoreResult<usize> {
        let slot = self.category_position(from, op)?;
        let mut moved = 0;
        for step in self.doc.steps.iter_mut().filter(|step| step.category == from) {
            step.category = to.to_string();
            moved += 1;
        }
        if self.doc.category_order.iter().any(|name| name == to) {
            self.doc.category_order.remove(slot);
        } else {
            self.doc.category_order[slot] = to.to_string();
        }
        self.reconcile();
        Ok(moved)
    }

    fn reconcile(&mut self) {
        hierarchy::reconcile(&mut self.doc);
    }

    fn step_position(&self, step_id: &str) -> StoreResult<usize> {
        self.doc
            .steps
            .iter()
            .position(|step| step.id == step_id)
            .ok_or_else(|| StoreError::StepNotFound(step_id.to_string()))
    }

    fn category_position(&self, category: &str, op: &str) -> StoreResult<usize> {
        match self.doc.category_order.iter().position(|name| name == category) {
            Some(slot) => Ok(slot),
            None => Err(self.rejected(op, StoreError::CategoryNotFound(category.to_string()))),
        }
    }

    fn page_mut(&mut self, step_id: &str, index: usize) -> StoreResult<&mut Page> {
        let position = self.step_position(step_id)?;
        self.doc.steps[position]
            .pages
            .get_mut(index)
            .ok_or_else(|| StoreError::PageNotFound {
                step_id: step_id.to_string(),
                index,
            })
    }

    fn rejected(&self, op: &str, err: StoreError) -> StoreError {
        warn!(
            "event=store_mutation module=service op={} status=rejected reason={}",
            op, err
        );
        err
    }
}

fn sanitize_pen(mut stroke: Stroke) -> Stroke {
    if !is_valid_color(&stroke.color) {
        stroke.color = DEFAULT_STROKE_COLOR.to_string();
    }
    if !(stroke.width.is_finite() && stroke.width > 0.0) {
        stroke.width = DEFAULT_STROKE_WIDTH;
    }
    stroke.points.retain(|[x, y]| x.is_finite() && y.is_finite());
    stroke
}
