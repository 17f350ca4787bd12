pub mod clip;
pub mod transform;

use crate::utils::matrix::Mat;
use crate::utils::vector::{Vec2, distance};

/// Closed ordered list of 2D points; the closing edge back to the first point
/// is implicit.
pub type Ring = Vec<Vec2>;

/// One polygon: exterior ring first, hole rings after.
pub type PolygonRings = Vec<Ring>;

/// A set of polygons representing the union of selected area.
///
/// All stored coordinates are rounded to 2 decimal places so results of
/// boolean operations stay stable and comparable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiPolygon {
    pub polygons: Vec<PolygonRings>,
}

impl MultiPolygon {
    pub fn is_empty(&self) -> bool {
        self.polygons.iter().all(|p| p.iter().all(|r| r.len() < 3))
    }

    /// Axis-aligned rectangle as a single-ring polygon.
    pub fn from_rect(x: f32, y: f32, w: f32, h: f32) -> Self {
        MultiPolygon {
            polygons: vec![vec![vec![
                Vec2::new(x, y).round2(),
                Vec2::new(x + w, y).round2(),
                Vec2::new(x + w, y + h).round2(),
                Vec2::new(x, y + h).round2(),
            ]]],
        }
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        self.mapped(|p| Vec2::new(p.x + dx, p.y + dy))
    }

    pub fn transformed(&self, mat: &Mat) -> Self {
        self.mapped(|p| mat.apply(p))
    }

    fn mapped(&self, f: impl Fn(Vec2) -> Vec2) -> Self {
        MultiPolygon {
            polygons: self
                .polygons
                .iter()
                .map(|poly| {
                    poly.iter()
                        .map(|ring| ring.iter().map(|&p| f(p).round2()).collect())
                        .collect()
                })
                .collect(),
        }
    }

    /// Even-odd containment test across every ring of every polygon, so holes
    /// count out of the selection.
    pub fn contains(&self, p: Vec2) -> bool {
        for poly in &self.polygons {
            let mut inside = false;
            for ring in poly {
                if ring.len() < 3 {
                    continue;
                }
                let mut j = ring.len() - 1;
                for i in 0..ring.len() {
                    let a = ring[i];
                    let b = ring[j];
                    if (a.y > p.y) != (b.y > p.y)
                        && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x
                    {
                        inside = !inside;
                    }
                    j = i;
                }
            }
            if inside {
                return true;
            }
        }
        false
    }

    /// Bounding box `(min, max)` over all points, `None` when empty.
    pub fn bounds(&self) -> Option<(Vec2, Vec2)> {
        let mut min = Vec2::new(f32::MAX, f32::MAX);
        let mut max = Vec2::new(f32::MIN, f32::MIN);
        let mut any = false;
        for poly in &self.polygons {
            for ring in poly {
                for p in ring {
                    min.x = min.x.min(p.x);
                    min.y = min.y.min(p.y);
                    max.x = max.x.max(p.x);
                    max.y = max.y.max(p.y);
                    any = true;
                }
            }
        }
        any.then_some((min, max))
    }
}

/// Shape of the selection tool's in-progress drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectShape {
    Rect,
    Ellipse,
    Lasso,
    Polygon,
}

/// How the live shape combines with the committed selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombineOp {
    New,
    Union,
    Difference,
}

const ELLIPSE_SEGMENTS: usize = 50;

/// Drives rectangular/elliptical/lasso/polygon selection and the boolean
/// combine policy around the clipping primitive.
pub struct SelectionEngine {
    shape: SelectShape,
    operation: CombineOp,
    committed: Option<MultiPolygon>,
    drag: Vec<Vec2>,
    dragging: bool,
    move_anchor: Option<Vec2>,
    move_base: Option<MultiPolygon>,
    move_delta: (i32, i32),
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self {
            shape: SelectShape::Rect,
            operation: CombineOp::New,
            committed: None,
            drag: Vec::new(),
            dragging: false,
            move_anchor: None,
            move_base: None,
            move_delta: (0, 0),
        }
    }

    pub fn get_shape(&self) -> SelectShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: SelectShape) {
        self.shape = shape;
    }

    pub fn set_operation(&mut self, op: CombineOp) {
        self.operation = op;
    }

    /// The committed selection, ignoring any in-progress drag.
    pub fn selection(&self) -> Option<&MultiPolygon> {
        self.committed.as_ref()
    }

    pub fn set_selection(&mut self, selection: Option<MultiPolygon>) {
        self.committed = selection.filter(|s| !s.is_empty());
    }

    /// Begin accumulating drag points. `New` clears the prior selection.
    pub fn start_select(&mut self, pos: Vec2, operation: CombineOp) {
        self.operation = operation;
        if operation == CombineOp::New {
            self.committed = None;
        }
        self.dragging = true;
        self.drag.clear();
        self.drag.push(pos);
    }

    pub fn go_select(&mut self, pos: Vec2) {
        if !self.dragging {
            return;
        }
        // Skip near-duplicate points so lasso rings stay small.
        if let Some(last) = self.drag.last() {
            if matches!(self.shape, SelectShape::Lasso) && distance(*last, pos) <= 2.0 {
                return;
            }
        }
        self.drag.push(pos);
    }

    /// Commit the live shape. Fewer than 2 drag points means the gesture is
    /// discarded.
    pub fn end_select(&mut self) {
        if self.drag.len() >= 2 {
            self.committed = self.get_selection().filter(|s| !s.is_empty());
        }
        self.dragging = false;
        self.drag.clear();
    }

    /// The effective live selection: the committed selection combined with the
    /// in-progress shape via the configured boolean operation.
    pub fn get_selection(&self) -> Option<MultiPolygon> {
        let live = if self.dragging && self.drag.len() >= 2 {
            self.live_polygon()
        } else {
            None
        };
        let Some(live) = live else {
            return self.committed.clone();
        };
        match self.operation {
            CombineOp::New => Some(live),
            CombineOp::Union => match &self.committed {
                // Union against nothing replaces.
                None => Some(live),
                Some(committed) => Some(clip::union(committed, &live)),
            },
            CombineOp::Difference => match &self.committed {
                // Difference against an empty selection is a no-op.
                None => None,
                Some(committed) => Some(clip::difference(committed, &live)),
            },
        }
    }

    fn live_polygon(&self) -> Option<MultiPolygon> {
        let first = *self.drag.first()?;
        let last = *self.drag.last()?;
        match self.shape {
            SelectShape::Rect => {
                let x0 = first.x.min(last.x).floor();
                let y0 = first.y.min(last.y).floor();
                let x1 = first.x.max(last.x).ceil();
                let y1 = first.y.max(last.y).ceil();
                Some(MultiPolygon::from_rect(x0, y0, x1 - x0, y1 - y0))
            }
            SelectShape::Ellipse => {
                let x0 = first.x.min(last.x).floor();
                let y0 = first.y.min(last.y).floor();
                let x1 = first.x.max(last.x).ceil();
                let y1 = first.y.max(last.y).ceil();
                let cx = (x0 + x1) / 2.0;
                let cy = (y0 + y1) / 2.0;
                let rx = (x1 - x0) / 2.0;
                let ry = (y1 - y0) / 2.0;
                let ring: Ring = (0..ELLIPSE_SEGMENTS)
                    .map(|i| {
                        let t = i as f32 / ELLIPSE_SEGMENTS as f32 * std::f32::consts::TAU;
                        Vec2::new(cx + rx * t.cos(), cy + ry * t.sin()).round2()
                    })
                    .collect();
                Some(MultiPolygon {
                    polygons: vec![vec![ring]],
                })
            }
            SelectShape::Lasso | SelectShape::Polygon => {
                let ring: Ring = self.drag.iter().map(|p| p.round2()).collect();
                Some(MultiPolygon {
                    polygons: vec![vec![ring]],
                })
            }
        }
    }

    pub fn select_all(&mut self, width: usize, height: usize) {
        self.committed = Some(MultiPolygon::from_rect(0.0, 0.0, width as f32, height as f32));
    }

    /// Full-canvas rectangle minus the current selection. No selection means
    /// nothing to invert.
    pub fn invert_selection(&mut self, width: usize, height: usize) {
        let Some(committed) = &self.committed else {
            return;
        };
        let full = MultiPolygon::from_rect(0.0, 0.0, width as f32, height as f32);
        let inverted = clip::difference(&full, committed);
        self.committed = (!inverted.is_empty()).then_some(inverted);
    }

    pub fn start_move_select(&mut self, pos: Vec2) {
        self.move_anchor = Some(pos);
        self.move_base = self.committed.clone();
        self.move_delta = (0, 0);
    }

    pub fn go_move_select(&mut self, pos: Vec2) {
        let Some(anchor) = self.move_anchor else {
            return;
        };
        let delta = pos - anchor;
        self.move_delta = (delta.x.round() as i32, delta.y.round() as i32);
        if let Some(base) = &self.move_base {
            self.committed =
                Some(base.translated(self.move_delta.0 as f32, self.move_delta.1 as f32));
        }
    }

    pub fn end_move_select(&mut self) {
        self.move_anchor = None;
        self.move_base = None;
    }

    /// Whether the last move gesture produced any net movement; lets callers
    /// skip pushing a history entry for a zero-distance drag.
    pub fn get_did_move(&self) -> bool {
        self.move_delta != (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_sel(engine: &mut SelectionEngine, x0: f32, y0: f32, x1: f32, y1: f32, op: CombineOp) {
        engine.set_shape(SelectShape::Rect);
        engine.start_select(Vec2::new(x0, y0), op);
        engine.go_select(Vec2::new(x1, y1));
        engine.end_select();
    }

    #[test]
    fn rect_select_commits_bbox() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 10.4, 10.6, 20.2, 30.0, CombineOp::New);
        let sel = engine.selection().unwrap();
        assert!(sel.contains(Vec2::new(15.0, 20.0)));
        assert!(!sel.contains(Vec2::new(25.0, 20.0)));
        // floor/ceil to integers
        let (min, max) = sel.bounds().unwrap();
        assert_eq!((min.x, min.y), (10.0, 10.0));
        assert_eq!((max.x, max.y), (21.0, 30.0));
    }

    #[test]
    fn single_point_drag_is_discarded() {
        let mut engine = SelectionEngine::new();
        engine.start_select(Vec2::new(5.0, 5.0), CombineOp::New);
        engine.end_select();
        assert!(engine.selection().is_none());
    }

    #[test]
    fn ellipse_is_a_fixed_step_polygon() {
        let mut engine = SelectionEngine::new();
        engine.set_shape(SelectShape::Ellipse);
        engine.start_select(Vec2::new(0.0, 0.0), CombineOp::New);
        engine.go_select(Vec2::new(100.0, 50.0));
        engine.end_select();
        let sel = engine.selection().unwrap();
        assert_eq!(sel.polygons[0][0].len(), 50);
        assert!(sel.contains(Vec2::new(50.0, 25.0)));
        assert!(!sel.contains(Vec2::new(2.0, 2.0))); // outside the inscribed ellipse
    }

    #[test]
    fn union_with_empty_replaces() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 0.0, 0.0, 10.0, 10.0, CombineOp::Union);
        let sel = engine.selection().unwrap();
        assert!(sel.contains(Vec2::new(5.0, 5.0)));
    }

    #[test]
    fn difference_from_empty_is_a_no_op() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 0.0, 0.0, 10.0, 10.0, CombineOp::Difference);
        assert!(engine.selection().is_none());
    }

    #[test]
    fn union_grows_the_selection() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 0.0, 0.0, 10.0, 10.0, CombineOp::New);
        rect_sel(&mut engine, 20.0, 0.0, 30.0, 10.0, CombineOp::Union);
        let sel = engine.selection().unwrap();
        assert!(sel.contains(Vec2::new(5.0, 5.0)));
        assert!(sel.contains(Vec2::new(25.0, 5.0)));
        assert!(!sel.contains(Vec2::new(15.0, 5.0)));
    }

    #[test]
    fn difference_cuts_a_hole() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 0.0, 0.0, 30.0, 30.0, CombineOp::New);
        rect_sel(&mut engine, 10.0, 10.0, 20.0, 20.0, CombineOp::Difference);
        let sel = engine.selection().unwrap();
        assert!(sel.contains(Vec2::new(5.0, 5.0)));
        assert!(!sel.contains(Vec2::new(15.0, 15.0)));
    }

    #[test]
    fn invert_twice_restores_original_membership() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 10.0, 10.0, 40.0, 40.0, CombineOp::New);
        engine.invert_selection(100, 100);
        let inv = engine.selection().unwrap();
        assert!(!inv.contains(Vec2::new(25.0, 25.0)));
        assert!(inv.contains(Vec2::new(80.0, 80.0)));
        engine.invert_selection(100, 100);
        let back = engine.selection().unwrap();
        // Same membership as the original, up to 2-decimal rounding.
        assert!(back.contains(Vec2::new(25.0, 25.0)));
        assert!(!back.contains(Vec2::new(80.0, 80.0)));
        assert!(!back.contains(Vec2::new(5.0, 5.0)));
    }

    #[test]
    fn invert_with_no_selection_is_a_no_op() {
        let mut engine = SelectionEngine::new();
        engine.invert_selection(100, 100);
        assert!(engine.selection().is_none());
    }

    #[test]
    fn move_translates_by_integer_delta() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 0.0, 0.0, 10.0, 10.0, CombineOp::New);
        engine.start_move_select(Vec2::new(5.0, 5.0));
        engine.go_move_select(Vec2::new(12.4, 8.6));
        engine.end_move_select();
        assert!(engine.get_did_move());
        let (min, _) = engine.selection().unwrap().bounds().unwrap();
        assert_eq!((min.x, min.y), (7.0, 4.0));
    }

    #[test]
    fn zero_distance_move_reports_no_movement() {
        let mut engine = SelectionEngine::new();
        rect_sel(&mut engine, 0.0, 0.0, 10.0, 10.0, CombineOp::New);
        engine.start_move_select(Vec2::new(5.0, 5.0));
        engine.go_move_select(Vec2::new(5.2, 4.9));
        engine.end_move_select();
        assert!(!engine.get_did_move());
    }
}
