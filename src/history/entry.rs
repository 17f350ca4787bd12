use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canvas::tile::Tile;
use crate::selection::MultiPolygon;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProjectId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: usize,
    pub height: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

/// Sparse per-layer patch. `None` means "unchanged from the previous state";
/// the tile array, when present, is sized for the grid current at entry
/// creation time and holds `None` in unchanged slots.
#[derive(Clone, Debug, Default)]
pub struct LayerPatch {
    pub name: Option<String>,
    pub opacity: Option<u8>,
    pub is_visible: Option<bool>,
    pub blend_mode: Option<BlendMode>,
    pub index: Option<usize>,
    pub tiles: Option<Vec<Option<Tile>>>,
}

impl LayerPatch {
    /// Full scalar definition with a given tile array; what a genesis entry
    /// records for every layer.
    pub fn full(name: &str, opacity: u8, is_visible: bool, index: usize, tiles: Vec<Tile>) -> Self {
        LayerPatch {
            name: Some(name.to_string()),
            opacity: Some(opacity),
            is_visible: Some(is_visible),
            blend_mode: Some(BlendMode::Normal),
            index: Some(index),
            tiles: Some(tiles.into_iter().map(Some).collect()),
        }
    }

    fn memory_estimate(&self) -> usize {
        let tiles = self
            .tiles
            .as_ref()
            .map(|tiles| {
                tiles
                    .iter()
                    .flatten()
                    .map(Tile::memory_estimate)
                    .sum::<usize>()
            })
            .unwrap_or(0);
        tiles + self.name.as_ref().map(String::len).unwrap_or(0)
    }
}

/// One user action as a sparse patch over global state.
///
/// Every field is optional; an absent field means "unchanged". The selection
/// field is doubly optional because an entry can explicitly set the selection
/// to nothing. Entries are immutable once pushed; `HistoryLog::replace_top`
/// is the only sanctioned amend path.
#[derive(Clone, Debug, Default)]
pub struct HistoryEntry {
    pub project_id: Option<ProjectId>,
    pub size: Option<CanvasSize>,
    pub selection: Option<Option<MultiPolygon>>,
    pub active_layer_id: Option<LayerId>,
    pub layers: Option<HashMap<LayerId, LayerPatch>>,
    /// Milliseconds since the Unix epoch, for external storage policies.
    pub timestamp_ms: u64,
    /// Approximate heap footprint in bytes, for external eviction policies.
    pub memory_estimate: usize,
}

impl HistoryEntry {
    /// Stamp timestamp and memory estimate; call once after filling fields.
    pub fn finish(mut self) -> Self {
        self.timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.memory_estimate = self
            .layers
            .as_ref()
            .map(|layers| layers.values().map(LayerPatch::memory_estimate).sum())
            .unwrap_or(0);
        self
    }

    /// Whether the entry patches nothing at all.
    pub fn is_vacant(&self) -> bool {
        self.project_id.is_none()
            && self.size.is_none()
            && self.selection.is_none()
            && self.active_layer_id.is_none()
            && self.layers.as_ref().is_none_or(HashMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::tile::create_fill_tiles;
    use egui::Color32;

    #[test]
    fn finish_estimates_pixel_tiles_only() {
        let fills = create_fill_tiles(128, 128, Color32::WHITE, 64);
        let mut layers = HashMap::new();
        layers.insert(LayerId(1), LayerPatch::full("Background", 255, true, 0, fills));
        let entry = HistoryEntry {
            layers: Some(layers),
            ..Default::default()
        }
        .finish();
        // Fill tiles cost a descriptor each, far less than a pixel buffer.
        assert!(entry.memory_estimate < 64 * 64 * 4);
        assert!(entry.timestamp_ms > 0);

        let pixel_tile = Tile::pixels(vec![Color32::WHITE; 64 * 64]);
        let mut layers = HashMap::new();
        let mut patch = LayerPatch::default();
        patch.tiles = Some(vec![Some(pixel_tile), None, None, None]);
        layers.insert(LayerId(1), patch);
        let entry = HistoryEntry {
            layers: Some(layers),
            ..Default::default()
        }
        .finish();
        assert_eq!(entry.memory_estimate, 64 * 64 * 4);
    }

    #[test]
    fn vacant_entry_detection() {
        assert!(HistoryEntry::default().is_vacant());
        let entry = HistoryEntry {
            active_layer_id: Some(LayerId(3)),
            ..Default::default()
        };
        assert!(!entry.is_vacant());
    }
}
