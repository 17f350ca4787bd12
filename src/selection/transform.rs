use std::sync::{Arc, Mutex};

use crate::canvas::layers::ProjectCanvas;
use crate::canvas::ops::{
    preview_composites, transform_clone_via_selection, transform_via_selection, TransformArgs,
};
use crate::history::executor::Step;
use crate::history::log::HistoryLog;
use crate::history::temp::TempHistory;
use crate::selection::{MultiPolygon, SelectionEngine};
use crate::utils::matrix::Mat;
use crate::utils::vector::Vec2;

/// Full state of an in-progress transform, replayable from temp history.
#[derive(Clone, Copy, Debug)]
pub struct TransformSnapshot {
    pub transform: Mat,
    pub do_clone: bool,
    pub target_layer: usize,
    pub background_is_transparent: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectMode {
    Select,
    Transform,
}

/// Drives the select <-> transform mode machine on top of a
/// [`SelectionEngine`].
///
/// In transform mode every tweak is recorded as a [`TransformSnapshot`] on a
/// shared temp history stack so Ctrl+Z walks the uncommitted tweaks before it
/// touches the main log. Nothing reaches the main log until [`commit`] runs,
/// and a commit is always exactly one entry.
///
/// [`commit`]: SelectionTransform::commit
pub struct SelectionTransform {
    pub engine: SelectionEngine,
    mode: SelectMode,
    temp: Arc<Mutex<TempHistory<TransformSnapshot>>>,
    /// Selection the transform samples from, in source-layer coordinates.
    session_selection: MultiPolygon,
    source_layer: usize,
    initial: TransformSnapshot,
    snapshot: TransformSnapshot,
    /// Transform at drag start; live drag updates re-derive from this.
    gesture_base: Option<Mat>,
    gesture_recorded: bool,
}

impl SelectionTransform {
    pub fn new(temp: Arc<Mutex<TempHistory<TransformSnapshot>>>) -> Self {
        let initial = TransformSnapshot {
            transform: Mat::IDENTITY,
            do_clone: false,
            target_layer: 0,
            background_is_transparent: true,
        };
        Self {
            engine: SelectionEngine::new(),
            mode: SelectMode::Select,
            temp,
            session_selection: MultiPolygon::default(),
            source_layer: 0,
            initial,
            snapshot: initial,
            gesture_base: None,
            gesture_recorded: false,
        }
    }

    pub fn mode(&self) -> SelectMode {
        self.mode
    }

    pub fn snapshot(&self) -> &TransformSnapshot {
        &self.snapshot
    }

    /// Enter transform mode on the active layer. With no committed selection
    /// the whole canvas is the implicit selection. Layer 0 is treated as the
    /// opaque background; moving content off it back-fills rather than
    /// leaving transparency.
    pub fn start_transform(&mut self, canvas: &mut ProjectCanvas) {
        if self.mode == SelectMode::Transform {
            return;
        }
        self.source_layer = canvas.active_layer;
        self.session_selection = match self.engine.selection() {
            Some(selection) => selection.clone(),
            None => MultiPolygon::from_rect(0.0, 0.0, canvas.width() as f32, canvas.height() as f32),
        };
        self.initial = TransformSnapshot {
            transform: Mat::IDENTITY,
            do_clone: false,
            target_layer: self.source_layer,
            background_is_transparent: self.source_layer != 0,
        };
        self.snapshot = self.initial;
        self.mode = SelectMode::Transform;
        {
            let mut temp = self.temp.lock().unwrap();
            temp.clear();
            temp.set_active(true);
        }
        self.update_composites(canvas);
    }

    /// One discrete translation step (arrow keys, nudge buttons).
    pub fn translate(&mut self, dx: f32, dy: f32, canvas: &mut ProjectCanvas) {
        self.snapshot.transform = Mat::translation(dx, dy).then(&self.snapshot.transform);
        self.record(canvas);
    }

    /// Begin a pointer drag; subsequent [`drag_translate`] calls amend one
    /// temp step instead of recording one step per mouse-move.
    ///
    /// [`drag_translate`]: SelectionTransform::drag_translate
    pub fn begin_drag(&mut self) {
        if self.mode != SelectMode::Transform {
            return;
        }
        self.gesture_base = Some(self.snapshot.transform);
        self.gesture_recorded = false;
    }

    /// Live drag update: `dx`/`dy` are the total offset since [`begin_drag`].
    ///
    /// [`begin_drag`]: SelectionTransform::begin_drag
    pub fn drag_translate(&mut self, dx: f32, dy: f32, canvas: &mut ProjectCanvas) {
        let Some(base) = self.gesture_base else {
            return;
        };
        self.snapshot.transform = Mat::translation(dx, dy).then(&base);
        {
            let mut temp = self.temp.lock().unwrap();
            if self.gesture_recorded {
                temp.replace_top(self.snapshot);
            } else {
                temp.push(self.snapshot);
                self.gesture_recorded = true;
            }
        }
        self.update_composites(canvas);
    }

    pub fn end_drag(&mut self) {
        self.gesture_base = None;
        self.gesture_recorded = false;
    }

    pub fn rotate(&mut self, rad: f32, canvas: &mut ProjectCanvas) {
        let pivot = self.pivot();
        self.snapshot.transform = Mat::rotation_about(pivot, rad).then(&self.snapshot.transform);
        self.record(canvas);
    }

    pub fn flip(&mut self, horizontal: bool, canvas: &mut ProjectCanvas) {
        let pivot = self.pivot();
        self.snapshot.transform =
            Mat::flip_about(pivot, horizontal).then(&self.snapshot.transform);
        self.record(canvas);
    }

    pub fn set_target_layer(&mut self, target: usize, canvas: &mut ProjectCanvas) {
        self.snapshot.target_layer = target;
        self.record(canvas);
    }

    pub fn set_background_transparent(&mut self, transparent: bool, canvas: &mut ProjectCanvas) {
        self.snapshot.background_is_transparent = transparent;
        self.record(canvas);
    }

    pub fn set_clone(&mut self, do_clone: bool, canvas: &mut ProjectCanvas) {
        self.snapshot.do_clone = do_clone;
        self.record(canvas);
    }

    pub fn has_changes(&self) -> bool {
        !self.snapshot.transform.is_identity()
            || self.snapshot.do_clone
            || self.snapshot.target_layer != self.source_layer
    }

    /// Apply the pending transform to the canvas and history, then drop back
    /// to select mode. Returns whether an entry was produced; an untouched
    /// transform commits nothing.
    pub fn commit(&mut self, canvas: &mut ProjectCanvas, log: &mut HistoryLog) -> bool {
        if self.mode != SelectMode::Transform {
            return false;
        }
        let mut pushed = false;
        if self.has_changes() {
            let moved = self.session_selection.transformed(&self.snapshot.transform);
            let args = TransformArgs {
                selection: &self.session_selection,
                matrix: self.snapshot.transform,
                source_layer: self.source_layer,
                target_layer: self.snapshot.target_layer,
                background_is_transparent: self.snapshot.background_is_transparent,
                selection_after: Some(moved.clone()),
            };
            pushed = if self.snapshot.do_clone {
                transform_clone_via_selection(canvas, log, &args)
            } else {
                transform_via_selection(canvas, log, &args)
            };
            self.engine.set_selection(Some(moved));
        }
        self.leave_transform(canvas);
        pushed
    }

    /// Throw the pending transform away and drop back to select mode. The
    /// committed selection is left as it was when the transform started.
    pub fn discard(&mut self, canvas: &mut ProjectCanvas) {
        if self.mode != SelectMode::Transform {
            return;
        }
        self.leave_transform(canvas);
    }

    /// Clone-stamp: commit a copy at the current position and keep
    /// transforming. The next stamp samples from wherever the previous one
    /// landed, so repeated stamps walk across the canvas.
    pub fn on_clone(&mut self, canvas: &mut ProjectCanvas, log: &mut HistoryLog) -> bool {
        if self.mode != SelectMode::Transform || !self.has_changes() {
            return false;
        }
        let moved = self.session_selection.transformed(&self.snapshot.transform);
        let args = TransformArgs {
            selection: &self.session_selection,
            matrix: self.snapshot.transform,
            source_layer: self.source_layer,
            target_layer: self.snapshot.target_layer,
            background_is_transparent: self.snapshot.background_is_transparent,
            selection_after: Some(moved.clone()),
        };
        let pushed = transform_clone_via_selection(canvas, log, &args);

        // Re-seed the session at the stamp's landing spot.
        self.source_layer = self.snapshot.target_layer;
        self.session_selection = moved.clone();
        self.initial = TransformSnapshot {
            transform: Mat::IDENTITY,
            do_clone: self.snapshot.do_clone,
            target_layer: self.snapshot.target_layer,
            background_is_transparent: self.snapshot.background_is_transparent,
        };
        self.snapshot = self.initial;
        self.engine.set_selection(Some(moved));
        self.temp.lock().unwrap().clear();
        self.update_composites(canvas);
        pushed
    }

    /// React to a unified undo/redo step. Main-log steps while a transform is
    /// live commit it first so the log operation lands on a settled canvas;
    /// temp steps replay the snapshot the temp cursor now points at.
    pub fn on_history(&mut self, step: Step, canvas: &mut ProjectCanvas, log: &mut HistoryLog) {
        if self.mode != SelectMode::Transform {
            return;
        }
        match step {
            Step::Undo | Step::Redo => {
                self.commit(canvas, log);
            }
            Step::TempUndo | Step::TempRedo => {
                self.snapshot = match self.temp.lock().unwrap().current() {
                    Some(snapshot) => *snapshot,
                    None => self.initial,
                };
                self.update_composites(canvas);
            }
        }
    }

    fn record(&mut self, canvas: &mut ProjectCanvas) {
        if self.mode != SelectMode::Transform {
            return;
        }
        self.temp.lock().unwrap().push(self.snapshot);
        self.update_composites(canvas);
    }

    /// Pivot for rotations and flips: center of the selection's current
    /// (already transformed) bounds.
    fn pivot(&self) -> Vec2 {
        match self
            .session_selection
            .transformed(&self.snapshot.transform)
            .bounds()
        {
            Some((min, max)) => Vec2::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0),
            None => Vec2::new(0.0, 0.0),
        }
    }

    fn update_composites(&self, canvas: &mut ProjectCanvas) {
        canvas.clear_composites();
        let previews = preview_composites(
            canvas,
            &self.session_selection,
            &self.snapshot.transform,
            self.snapshot.do_clone,
            self.source_layer,
            self.snapshot.target_layer,
            self.snapshot.background_is_transparent,
        );
        for (index, preview) in previews {
            canvas.set_composite(index, Some(preview));
        }
    }

    fn leave_transform(&mut self, canvas: &mut ProjectCanvas) {
        {
            let mut temp = self.temp.lock().unwrap();
            temp.clear();
            temp.set_active(false);
        }
        canvas.clear_composites();
        self.mode = SelectMode::Select;
        self.snapshot = self.initial;
        self.gesture_base = None;
        self.gesture_recorded = false;
    }
}
