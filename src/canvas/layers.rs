use egui::Color32;

use crate::canvas::tile::{Tile, TileGrid};
use crate::history::entry::{BlendMode, LayerId};

/// Temporary rendered preview of an uncommitted transform, canvas-sized.
#[derive(Clone, Debug)]
pub struct CompositePreview {
    pub pixels: Vec<Color32>,
}

/// Live mutable drawing surface for one layer.
///
/// This is what renderers read; it reflects the composed state the surrounding
/// shell last applied via `update_layers_via_composed`, plus an optional
/// composite preview during a live transform.
pub struct LayerCanvas {
    pub id: LayerId,
    pub name: String,
    pub opacity: u8,
    pub visible: bool,
    pub blend_mode: BlendMode,
    pub index: usize,
    width: usize,
    height: usize,
    pixels: Vec<Color32>,
    pub composite: Option<CompositePreview>,
}

impl LayerCanvas {
    pub fn new(id: LayerId, width: usize, height: usize) -> Self {
        Self {
            id,
            name: String::new(),
            opacity: 255,
            visible: true,
            blend_mode: BlendMode::Normal,
            index: 0,
            width,
            height,
            pixels: vec![Color32::TRANSPARENT; width * height],
            composite: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[Color32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Color32] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Color32 {
        self.pixels[y * self.width + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color32) {
        self.pixels[y * self.width + x] = color;
    }

    /// Overwrite a rectangle with a solid color. With premultiplied storage,
    /// clear-then-fill collapses to a plain overwrite.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: Color32) {
        for row in y..(y + h).min(self.height) {
            let start = row * self.width + x;
            let end = start + w.min(self.width - x);
            self.pixels[start..end].fill(color);
        }
    }

    /// Copy a tile buffer (stride `tile_size`) into the rectangle at `(x, y)`.
    pub fn blit_tile(
        &mut self,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        data: &[Color32],
        tile_size: usize,
    ) {
        for row in 0..h.min(self.height.saturating_sub(y)) {
            let src_start = row * tile_size;
            let dst_start = (y + row) * self.width + x;
            let len = w.min(self.width - x);
            self.pixels[dst_start..dst_start + len]
                .copy_from_slice(&data[src_start..src_start + len]);
        }
    }

    /// Redraw one tile slot from its composed tile.
    pub fn draw_tile(&mut self, slot: usize, tile: &Tile, grid: &TileGrid) {
        let (x, y, w, h) = grid.slot_rect(slot, self.width, self.height);
        if w == 0 || h == 0 {
            return;
        }
        match tile {
            Tile::Fill(fill) => self.fill_rect(x, y, w, h, fill.color),
            Tile::Pixels(pixels) => self.blit_tile(x, y, w, h, &pixels.data, grid.tile_size),
        }
    }

    /// Extract one tile slot as a full `tile_size^2` buffer, transparent where
    /// the slot extends past the canvas. Shape-compatible with entry tiles.
    pub fn snapshot_tile(&self, slot: usize, grid: &TileGrid) -> Vec<Color32> {
        let (x, y, w, h) = grid.slot_rect(slot, self.width, self.height);
        let mut out = vec![Color32::TRANSPARENT; grid.tile_size * grid.tile_size];
        for row in 0..h {
            let src_start = (y + row) * self.width + x;
            let dst_start = row * grid.tile_size;
            out[dst_start..dst_start + w].copy_from_slice(&self.pixels[src_start..src_start + w]);
        }
        out
    }
}

/// The live canvas: one mutable surface per layer, in composed-index order.
pub struct ProjectCanvas {
    width: usize,
    height: usize,
    tile_size: usize,
    pub active_layer: usize,
    pub layers: Vec<LayerCanvas>,
}

impl ProjectCanvas {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Self {
        Self {
            width,
            height,
            tile_size,
            active_layer: 0,
            layers: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn grid(&self) -> TileGrid {
        TileGrid::new(self.width, self.height, self.tile_size)
    }

    pub(crate) fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    pub fn layer(&self, index: usize) -> Option<&LayerCanvas> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut LayerCanvas> {
        self.layers.get_mut(index)
    }

    pub fn layer_index(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn push_layer(&mut self, layer: LayerCanvas) {
        self.layers.push(layer);
    }

    /// Attach or clear a transform preview on a layer. Out-of-range indices
    /// are ignored with a warning.
    pub fn set_composite(&mut self, index: usize, composite: Option<CompositePreview>) {
        match self.layers.get_mut(index) {
            Some(layer) => layer.composite = composite,
            None => log::warn!("set_composite: layer index {index} out of range"),
        }
    }

    pub fn clear_composites(&mut self) {
        for layer in &mut self.layers {
            layer.composite = None;
        }
    }

    /// Flatten all visible layers bottom-up into one premultiplied image.
    /// A layer's live composite preview, when set, stands in for its pixels.
    pub fn flatten(&self) -> Vec<Color32> {
        let mut out = vec![Color32::TRANSPARENT; self.width * self.height];
        for layer in &self.layers {
            if !layer.visible {
                continue;
            }
            let pixels = layer
                .composite
                .as_ref()
                .map(|c| c.pixels.as_slice())
                .unwrap_or_else(|| layer.pixels());
            let opacity = layer.opacity as u32;
            for (dst, &src) in out.iter_mut().zip(pixels) {
                let src = if opacity == 255 {
                    src
                } else {
                    Color32::from_rgba_premultiplied(
                        ((src.r() as u32 * opacity + 127) / 255) as u8,
                        ((src.g() as u32 * opacity + 127) / 255) as u8,
                        ((src.b() as u32 * opacity + 127) / 255) as u8,
                        ((src.a() as u32 * opacity + 127) / 255) as u8,
                    )
                };
                *dst = alpha_over(src, *dst);
            }
        }
        out
    }
}

/// Standard "source over" alpha compositing for premultiplied colors.
pub fn alpha_over(src: Color32, dst: Color32) -> Color32 {
    let src_a = src.a() as u32;
    let dst_a = dst.a() as u32;
    let inv = 255 - src_a;
    let out_a = src_a + (dst_a * inv + 127) / 255;
    if out_a == 0 {
        return Color32::TRANSPARENT;
    }

    let out_r = src.r() as u32 + (dst.r() as u32 * inv + 127) / 255;
    let out_g = src.g() as u32 + (dst.g() as u32 * inv + 127) / 255;
    let out_b = src.b() as u32 + (dst.b() as u32 * inv + 127) / 255;

    Color32::from_rgba_premultiplied(
        out_r.min(255) as u8,
        out_g.min(255) as u8,
        out_b.min(255) as u8,
        out_a.min(255) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_blit() {
        let grid = TileGrid::new(100, 100, 64);
        let mut layer = LayerCanvas::new(LayerId(1), 100, 100);
        layer.fill_rect(60, 60, 20, 20, Color32::RED);

        let snap = layer.snapshot_tile(3, &grid); // bottom-right 36x36 slot
        let mut copy = LayerCanvas::new(LayerId(2), 100, 100);
        copy.blit_tile(64, 64, 36, 36, &snap, 64);
        assert_eq!(copy.pixel(70, 70), Color32::RED);
        assert_eq!(copy.pixel(65, 65), Color32::TRANSPARENT);
    }

    #[test]
    fn draw_tile_clamps_partial_slots() {
        let grid = TileGrid::new(100, 100, 64);
        let mut layer = LayerCanvas::new(LayerId(1), 100, 100);
        layer.draw_tile(3, &Tile::fill(Color32::BLUE), &grid);
        assert_eq!(layer.pixel(99, 99), Color32::BLUE);
        assert_eq!(layer.pixel(63, 63), Color32::TRANSPARENT);
    }

    #[test]
    fn flatten_honors_visibility_and_previews() {
        let mut canvas = ProjectCanvas::new(4, 4, 4);
        let mut background = LayerCanvas::new(LayerId(1), 4, 4);
        background.fill_rect(0, 0, 4, 4, Color32::WHITE);
        canvas.push_layer(background);
        let mut top = LayerCanvas::new(LayerId(2), 4, 4);
        top.set_pixel(1, 1, Color32::from_rgba_premultiplied(0, 0, 255, 255));
        canvas.push_layer(top);

        let flat = canvas.flatten();
        assert_eq!(flat[1 * 4 + 1], Color32::from_rgba_premultiplied(0, 0, 255, 255));
        assert_eq!(flat[0], Color32::WHITE);

        canvas.layers[1].visible = false;
        assert_eq!(canvas.flatten()[1 * 4 + 1], Color32::WHITE);

        // A preview stands in for the layer's own pixels.
        canvas.layers[1].visible = true;
        canvas.set_composite(
            1,
            Some(CompositePreview {
                pixels: vec![Color32::TRANSPARENT; 16],
            }),
        );
        assert_eq!(canvas.flatten()[1 * 4 + 1], Color32::WHITE);
    }

    #[test]
    fn alpha_over_is_source_over() {
        let opaque = Color32::from_rgba_premultiplied(255, 0, 0, 255);
        let clear = Color32::TRANSPARENT;
        assert_eq!(alpha_over(opaque, clear), opaque);
        assert_eq!(alpha_over(clear, opaque), opaque);
    }
}
