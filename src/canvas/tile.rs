use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use egui::Color32;

/// Default tile edge length in pixels. Small grids pass a custom size through
/// `ProjectCanvas`/`HistoryLog` construction instead.
pub const TILE_SIZE: usize = 512;

static NEXT_TILE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque per-tile version id.
///
/// Two tile slots hold "the same version" iff their ids match. This is
/// deliberately not a deep pixel compare: identity is what lets the delta
/// redraw skip unchanged slots without touching pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileId(u64);

impl TileId {
    fn next() -> Self {
        TileId(NEXT_TILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Raw pixel tile: `tile_size * tile_size` premultiplied RGBA values.
///
/// The buffer is immutable once created; edits allocate a replacement tile
/// with a fresh id. Sharing is by `Arc`, so cloning a tile into a composed
/// state never copies pixels.
#[derive(Clone, Debug)]
pub struct PixelTile {
    pub id: TileId,
    pub data: Arc<Vec<Color32>>,
}

/// Uniform-fill tile: a single solid color standing in for a full buffer.
///
/// Empty and background layers are almost entirely fill tiles, which keeps
/// genesis entries cheap.
#[derive(Clone, Copy, Debug)]
pub struct FillTile {
    pub id: TileId,
    pub color: Color32,
}

/// One slot of a layer's tile grid.
#[derive(Clone, Debug)]
pub enum Tile {
    Pixels(PixelTile),
    Fill(FillTile),
}

impl Tile {
    pub fn pixels(data: Vec<Color32>) -> Self {
        Tile::Pixels(PixelTile {
            id: TileId::next(),
            data: Arc::new(data),
        })
    }

    pub fn fill(color: Color32) -> Self {
        Tile::Fill(FillTile {
            id: TileId::next(),
            color,
        })
    }

    pub fn id(&self) -> TileId {
        match self {
            Tile::Pixels(t) => t.id,
            Tile::Fill(t) => t.id,
        }
    }

    /// Identity comparison. A fill tile is never the same as a pixel tile,
    /// even when the pixel tile happens to be uniform; ids are globally
    /// unique so comparing them is sufficient.
    pub fn same(a: &Tile, b: &Tile) -> bool {
        a.id() == b.id()
    }

    /// Approximate heap footprint in bytes, for eviction bookkeeping.
    pub fn memory_estimate(&self) -> usize {
        match self {
            Tile::Pixels(t) => t.data.len() * std::mem::size_of::<Color32>(),
            Tile::Fill(_) => std::mem::size_of::<FillTile>(),
        }
    }
}

/// Dimensions of the row-major tile grid covering a canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub cols: usize,
    pub rows: usize,
    pub tile_size: usize,
}

impl TileGrid {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Self {
        Self {
            cols: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
            tile_size,
        }
    }

    pub fn total(&self) -> usize {
        self.cols * self.rows
    }

    /// In-bounds pixel rect `(x, y, w, h)` of a slot. The last row/column of
    /// tiles may extend past the nominal canvas size; only the clamped
    /// sub-rectangle is meaningful.
    pub fn slot_rect(&self, slot: usize, width: usize, height: usize) -> (usize, usize, usize, usize) {
        let col = slot % self.cols;
        let row = slot / self.cols;
        let x = col * self.tile_size;
        let y = row * self.tile_size;
        let w = self.tile_size.min(width.saturating_sub(x));
        let h = self.tile_size.min(height.saturating_sub(y));
        (x, y, w, h)
    }
}

/// One fill tile per grid cell covering `width x height`.
pub fn create_fill_tiles(width: usize, height: usize, color: Color32, tile_size: usize) -> Vec<Tile> {
    let grid = TileGrid::new(width, height, tile_size);
    (0..grid.total()).map(|_| Tile::fill(color)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_tiles_cover_the_grid() {
        let tiles = create_fill_tiles(100, 100, Color32::WHITE, 64);
        assert_eq!(tiles.len(), 4); // 2x2 grid of 64px tiles
        let tiles = create_fill_tiles(64, 64, Color32::WHITE, 64);
        assert_eq!(tiles.len(), 1);
        let tiles = create_fill_tiles(65, 64, Color32::WHITE, 64);
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn identity_is_by_id_not_value() {
        let a = Tile::fill(Color32::WHITE);
        let b = Tile::fill(Color32::WHITE);
        assert!(!Tile::same(&a, &b));
        assert!(Tile::same(&a, &a.clone()));

        let uniform = Tile::pixels(vec![Color32::WHITE; 16]);
        assert!(!Tile::same(&a, &uniform));
    }

    #[test]
    fn slot_rect_clamps_partial_edge_tiles() {
        let grid = TileGrid::new(100, 70, 64);
        assert_eq!((grid.cols, grid.rows), (2, 2));
        assert_eq!(grid.slot_rect(0, 100, 70), (0, 0, 64, 64));
        assert_eq!(grid.slot_rect(1, 100, 70), (64, 0, 36, 64));
        assert_eq!(grid.slot_rect(3, 100, 70), (64, 64, 36, 6));
    }
}
