use std::collections::{HashMap, HashSet};

use egui::Color32;

use crate::canvas::layers::{CompositePreview, LayerCanvas, ProjectCanvas};
use crate::canvas::tile::Tile;
use crate::history::entry::{HistoryEntry, LayerPatch};
use crate::history::log::HistoryLog;
use crate::selection::MultiPolygon;
use crate::utils::matrix::Mat;
use crate::utils::profiler::ScopeTimer;
use crate::utils::vector::Vec2;

/// Everything a committed selection transform needs.
pub struct TransformArgs<'a> {
    pub selection: &'a MultiPolygon,
    pub matrix: Mat,
    pub source_layer: usize,
    pub target_layer: usize,
    /// Holes left in the source fill with this off when the source is the
    /// background: false means background-fill (white), true means
    /// transparent.
    pub background_is_transparent: bool,
    /// Recorded into the produced entry as the post-transform selection.
    pub selection_after: Option<MultiPolygon>,
}

const BACKGROUND_FILL: Color32 = Color32::WHITE;

/// Move the selected content through the matrix, leaving a hole at the
/// source. Produces exactly one history entry. Returns `false` (and pushes
/// nothing) when there is nothing to transform.
pub fn transform_via_selection(
    canvas: &mut ProjectCanvas,
    log: &mut HistoryLog,
    args: &TransformArgs<'_>,
) -> bool {
    apply(canvas, log, args, false)
}

/// Stamp a transformed copy of the selected content onto the target layer,
/// leaving the source intact. Produces exactly one history entry.
pub fn transform_clone_via_selection(
    canvas: &mut ProjectCanvas,
    log: &mut HistoryLog,
    args: &TransformArgs<'_>,
) -> bool {
    apply(canvas, log, args, true)
}

fn apply(
    canvas: &mut ProjectCanvas,
    log: &mut HistoryLog,
    args: &TransformArgs<'_>,
    clone: bool,
) -> bool {
    let _timer = ScopeTimer::new("transform_via_selection");
    let Some(source) = canvas.layer(args.source_layer) else {
        log::warn!("transform: source layer {} out of range", args.source_layer);
        return false;
    };
    if canvas.layer(args.target_layer).is_none() {
        log::warn!("transform: target layer {} out of range", args.target_layer);
        return false;
    }

    let samples = sample_selected(source, args.selection);
    if samples.is_empty() {
        return false;
    }
    let Some(projected) = project(&samples, &args.matrix) else {
        log::warn!("transform: degenerate matrix, nothing applied");
        return false;
    };

    let grid = canvas.grid();
    let mut touched: HashMap<usize, HashSet<usize>> = HashMap::new();

    if !clone {
        let hole = if args.background_is_transparent {
            Color32::TRANSPARENT
        } else {
            BACKGROUND_FILL
        };
        if let Some(source) = canvas.layer_mut(args.source_layer) {
            for &(x, y, _) in &samples {
                source.set_pixel(x as usize, y as usize, hole);
                touched
                    .entry(args.source_layer)
                    .or_default()
                    .insert(slot_of(&grid, x, y));
            }
        }
    }

    if let Some(target) = canvas.layer_mut(args.target_layer) {
        for (&(x, y), &color) in &projected {
            if x < 0 || y < 0 || x as usize >= target.width() || y as usize >= target.height() {
                continue;
            }
            if color.a() > 0 {
                target.set_pixel(x as usize, y as usize, color);
                touched
                    .entry(args.target_layer)
                    .or_default()
                    .insert(slot_of(&grid, x, y));
            }
        }
    }

    // One sparse entry carrying snapshots of every touched tile.
    let total = grid.total();
    let mut layer_patches = HashMap::new();
    for (layer_index, slots) in touched {
        let Some(layer) = canvas.layer(layer_index) else {
            continue;
        };
        let mut tiles = vec![None; total];
        for slot in slots {
            tiles[slot] = Some(Tile::pixels(layer.snapshot_tile(slot, &grid)));
        }
        layer_patches.insert(
            layer.id,
            LayerPatch {
                tiles: Some(tiles),
                ..Default::default()
            },
        );
    }
    if layer_patches.is_empty() {
        return false;
    }
    log.push(
        HistoryEntry {
            selection: args.selection_after.clone().map(Some),
            layers: Some(layer_patches),
            ..Default::default()
        }
        .finish(),
    );
    true
}

fn slot_of(grid: &crate::canvas::tile::TileGrid, x: i32, y: i32) -> usize {
    (y as usize / grid.tile_size) * grid.cols + (x as usize / grid.tile_size)
}

/// Collect the non-transparent pixels of `layer` whose centers fall inside
/// the selection, clamped to the selection's bounding box.
fn sample_selected(layer: &LayerCanvas, selection: &MultiPolygon) -> Vec<(i32, i32, Color32)> {
    let Some((min, max)) = selection.bounds() else {
        return Vec::new();
    };
    let x0 = (min.x.floor().max(0.0)) as usize;
    let y0 = (min.y.floor().max(0.0)) as usize;
    let x1 = (max.x.ceil() as usize).min(layer.width());
    let y1 = (max.y.ceil() as usize).min(layer.height());

    let mut samples = Vec::new();
    for y in y0..y1 {
        for x in x0..x1 {
            let color = layer.pixel(x, y);
            if color.a() == 0 {
                continue;
            }
            if selection.contains(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)) {
                samples.push((x as i32, y as i32, color));
            }
        }
    }
    samples
}

/// Reverse-map the samples through the matrix: walk the transformed bounding
/// box and look each destination pixel up via the inverse transform, so the
/// result has no gaps. `None` when the matrix has no inverse.
fn project(
    samples: &[(i32, i32, Color32)],
    matrix: &Mat,
) -> Option<HashMap<(i32, i32), Color32>> {
    let inverse = matrix.inverse()?;
    let lookup: HashMap<(i32, i32), Color32> =
        samples.iter().map(|&(x, y, c)| ((x, y), c)).collect();

    let mut min = Vec2::new(f32::MAX, f32::MAX);
    let mut max = Vec2::new(f32::MIN, f32::MIN);
    for &(x, y, _) in samples {
        // Both corners of the pixel, so rotated bounds stay covering.
        for corner in [
            Vec2::new(x as f32, y as f32),
            Vec2::new(x as f32 + 1.0, y as f32 + 1.0),
        ] {
            let p = matrix.apply(corner);
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
    }

    let mut out = HashMap::new();
    for y in (min.y.floor() as i32)..(max.y.ceil() as i32) {
        for x in (min.x.floor() as i32)..(max.x.ceil() as i32) {
            let src = inverse.apply(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
            let key = (src.x.floor() as i32, src.y.floor() as i32);
            if let Some(&color) = lookup.get(&key) {
                out.insert((x, y), color);
            }
        }
    }
    Some(out)
}

/// Live previews of an uncommitted transform: the source layer with its hole,
/// the target layer with the floating content stamped on. The two merge into
/// one when source and target coincide.
pub fn preview_composites(
    canvas: &ProjectCanvas,
    selection: &MultiPolygon,
    matrix: &Mat,
    do_clone: bool,
    source_layer: usize,
    target_layer: usize,
    background_is_transparent: bool,
) -> Vec<(usize, CompositePreview)> {
    let Some(source) = canvas.layer(source_layer) else {
        return Vec::new();
    };
    let Some(target) = canvas.layer(target_layer) else {
        return Vec::new();
    };
    let samples = sample_selected(source, selection);
    let projected = match project(&samples, matrix) {
        Some(projected) => projected,
        None => return Vec::new(),
    };

    let hole = if background_is_transparent {
        Color32::TRANSPARENT
    } else {
        BACKGROUND_FILL
    };
    let width = canvas.width();
    let height = canvas.height();

    let mut source_pixels = source.pixels().to_vec();
    if !do_clone {
        for &(x, y, _) in &samples {
            source_pixels[y as usize * width + x as usize] = hole;
        }
    }

    let stamp = |pixels: &mut Vec<Color32>| {
        for (&(x, y), &color) in &projected {
            if x < 0 || y < 0 || x as usize >= width || y as usize >= height {
                continue;
            }
            if color.a() > 0 {
                pixels[y as usize * width + x as usize] = color;
            }
        }
    };

    if source_layer == target_layer {
        stamp(&mut source_pixels);
        return vec![(
            source_layer,
            CompositePreview {
                pixels: source_pixels,
            },
        )];
    }

    let mut target_pixels = target.pixels().to_vec();
    stamp(&mut target_pixels);
    vec![
        (
            source_layer,
            CompositePreview {
                pixels: source_pixels,
            },
        ),
        (
            target_layer,
            CompositePreview {
                pixels: target_pixels,
            },
        ),
    ]
}
