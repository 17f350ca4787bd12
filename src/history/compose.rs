use std::collections::HashMap;

use thiserror::Error;

use crate::canvas::tile::{Tile, TileGrid};
use crate::history::entry::{
    BlendMode, CanvasSize, HistoryEntry, LayerId, LayerPatch, ProjectId,
};
use crate::selection::MultiPolygon;
use crate::utils::profiler::ScopeTimer;

/// Fatal composition failures.
///
/// These are invariant violations, not expected states: any log must begin
/// with a genesis entry that defines every top-level field and every tile of
/// every layer. Callers do not recover from these.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("no defined entry found for `{field}` up to index {target}")]
    UndefinedField { field: &'static str, target: usize },
    #[error("no defined entry found for `{field}` of layer {layer:?} up to index {target}")]
    UndefinedLayerField {
        field: &'static str,
        layer: LayerId,
        target: usize,
    },
    #[error(
        "layer {layer:?} tile slot {slot} of {total} has no defined value up to index {target}"
    )]
    UndefinedTileSlot {
        layer: LayerId,
        slot: usize,
        total: usize,
        target: usize,
    },
    #[error("active layer {layer:?} is not in the live layer set at index {target}")]
    ActiveLayerNotLive { layer: LayerId, target: usize },
    #[error("compose target index {target} out of range for {len} entries")]
    TargetOutOfRange { target: usize, len: usize },
}

/// Fully materialized state of one layer: no holes, every field concrete.
#[derive(Clone, Debug)]
pub struct ComposedLayer {
    pub id: LayerId,
    pub name: String,
    pub opacity: u8,
    pub is_visible: bool,
    pub blend_mode: BlendMode,
    pub index: usize,
    pub tiles: Vec<Tile>,
}

/// The reduction of a history prefix into one concrete state.
///
/// Derived, never stored except as a cache. Tiles are shared with the entries
/// they came from, so composing is cheap and identity comparisons across two
/// composed states are meaningful.
#[derive(Clone, Debug)]
pub struct ComposedState {
    pub project_id: ProjectId,
    pub size: CanvasSize,
    pub active_layer_id: LayerId,
    pub selection: Option<MultiPolygon>,
    pub tile_size: usize,
    /// Sorted by `index` ascending.
    pub layers: Vec<ComposedLayer>,
}

impl ComposedState {
    pub fn layer(&self, id: LayerId) -> Option<&ComposedLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Snapshot this state as a synthetic full entry.
    ///
    /// The tile arrays are shape-identical to regular entry tile arrays, so a
    /// snapshot taken via composition can be re-fed as a new log's genesis.
    pub fn to_genesis_entry(&self) -> HistoryEntry {
        let mut layers = HashMap::new();
        for layer in &self.layers {
            layers.insert(
                layer.id,
                LayerPatch {
                    name: Some(layer.name.clone()),
                    opacity: Some(layer.opacity),
                    is_visible: Some(layer.is_visible),
                    blend_mode: Some(layer.blend_mode),
                    index: Some(layer.index),
                    tiles: Some(layer.tiles.iter().cloned().map(Some).collect()),
                },
            );
        }
        HistoryEntry {
            project_id: Some(self.project_id),
            size: Some(self.size),
            selection: Some(self.selection.clone()),
            active_layer_id: Some(self.active_layer_id),
            layers: Some(layers),
            ..Default::default()
        }
        .finish()
    }
}

fn top_level<T>(
    slice: &[HistoryEntry],
    field: &'static str,
    get: impl Fn(&HistoryEntry) -> Option<T>,
) -> Result<T, ComposeError> {
    slice
        .iter()
        .rev()
        .find_map(get)
        .ok_or(ComposeError::UndefinedField {
            field,
            target: slice.len() - 1,
        })
}

fn layer_field<T>(
    slice: &[HistoryEntry],
    id: LayerId,
    field: &'static str,
    get: impl Fn(&LayerPatch) -> Option<T>,
) -> Result<T, ComposeError> {
    slice
        .iter()
        .rev()
        .find_map(|e| e.layers.as_ref().and_then(|m| m.get(&id)).and_then(&get))
        .ok_or(ComposeError::UndefinedLayerField {
            field,
            layer: id,
            target: slice.len() - 1,
        })
}

/// Reduce `entries[0..=target]` into one concrete state, newest-wins per
/// field, per layer, per tile slot.
///
/// Layer existence is governed by the key set of the newest entry that
/// defines any layer map at all; a layer a later entry's map no longer names
/// is gone. Tile slots resolve by flat index, and an older entry is never
/// consulted past the length of its own tile array, which is what scopes
/// slots exposed by a resize to entries at or after the resize.
pub fn compose_state(
    entries: &[HistoryEntry],
    target: usize,
    tile_size: usize,
) -> Result<ComposedState, ComposeError> {
    if target >= entries.len() {
        return Err(ComposeError::TargetOutOfRange {
            target,
            len: entries.len(),
        });
    }
    let _timer = ScopeTimer::new("compose_state");
    let slice = &entries[..=target];

    let project_id = top_level(slice, "project_id", |e| e.project_id)?;
    let size = top_level(slice, "size", |e| e.size)?;
    let active_layer_id = top_level(slice, "active_layer_id", |e| e.active_layer_id)?;
    let selection = top_level(slice, "selection", |e| e.selection.clone())?;

    // The newest layer map's key set is the authoritative live set.
    let mut live: Vec<LayerId> = slice
        .iter()
        .rev()
        .find_map(|e| e.layers.as_ref())
        .map(|m| m.keys().copied().collect())
        .ok_or(ComposeError::UndefinedField {
            field: "layers",
            target,
        })?;
    live.sort();

    if !live.contains(&active_layer_id) {
        return Err(ComposeError::ActiveLayerNotLive {
            layer: active_layer_id,
            target,
        });
    }

    let total = TileGrid::new(size.width, size.height, tile_size).total();
    let mut layers = Vec::with_capacity(live.len());
    for id in live {
        let name = layer_field(slice, id, "name", |p| p.name.clone())?;
        let opacity = layer_field(slice, id, "opacity", |p| p.opacity)?;
        let is_visible = layer_field(slice, id, "is_visible", |p| p.is_visible)?;
        let blend_mode = layer_field(slice, id, "blend_mode", |p| p.blend_mode)?;
        let index = layer_field(slice, id, "index", |p| p.index)?;
        layers.push(ComposedLayer {
            id,
            name,
            opacity,
            is_visible,
            blend_mode,
            index,
            tiles: compose_tiles(slice, id, total, target)?,
        });
    }
    layers.sort_by_key(|l| l.index);

    Ok(ComposedState {
        project_id,
        size,
        active_layer_id,
        selection,
        tile_size,
        layers,
    })
}

fn compose_tiles(
    slice: &[HistoryEntry],
    id: LayerId,
    total: usize,
    target: usize,
) -> Result<Vec<Tile>, ComposeError> {
    let mut slots: Vec<Option<Tile>> = vec![None; total];
    let mut filled = 0;
    'entries: for entry in slice.iter().rev() {
        let Some(tiles) = entry
            .layers
            .as_ref()
            .and_then(|m| m.get(&id))
            .and_then(|p| p.tiles.as_ref())
        else {
            continue;
        };
        // take(total): a pre-shrink entry's surplus slots are dead.
        for (slot, tile) in tiles.iter().enumerate().take(total) {
            if slots[slot].is_none() {
                if let Some(tile) = tile {
                    slots[slot] = Some(tile.clone());
                    filled += 1;
                    if filled == total {
                        break 'entries;
                    }
                }
            }
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(slot, tile)| {
            tile.ok_or(ComposeError::UndefinedTileSlot {
                layer: id,
                slot,
                total,
                target,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::canvas::tile::create_fill_tiles;
    use egui::Color32;

    pub(crate) fn genesis(width: usize, height: usize, tile_size: usize) -> HistoryEntry {
        let mut layers = HashMap::new();
        layers.insert(
            LayerId(1),
            LayerPatch::full(
                "Background",
                255,
                true,
                0,
                create_fill_tiles(width, height, Color32::WHITE, tile_size),
            ),
        );
        HistoryEntry {
            project_id: Some(ProjectId(1)),
            size: Some(CanvasSize { width, height }),
            selection: Some(None),
            active_layer_id: Some(LayerId(1)),
            layers: Some(layers),
            ..Default::default()
        }
        .finish()
    }

    fn tile_patch(slots: Vec<(usize, Tile)>, total: usize) -> LayerPatch {
        let mut tiles = vec![None; total];
        for (slot, tile) in slots {
            tiles[slot] = Some(tile);
        }
        LayerPatch {
            tiles: Some(tiles),
            ..Default::default()
        }
    }

    #[test]
    fn newest_wins_per_field() {
        let mut entries = vec![genesis(100, 100, 64)];
        // entry 1: rename only
        let mut layers = HashMap::new();
        layers.insert(
            LayerId(1),
            LayerPatch {
                name: Some("Renamed".into()),
                ..Default::default()
            },
        );
        entries.push(
            HistoryEntry {
                layers: Some(layers),
                ..Default::default()
            }
            .finish(),
        );
        // entry 2: opacity only
        let mut layers = HashMap::new();
        layers.insert(
            LayerId(1),
            LayerPatch {
                opacity: Some(128),
                ..Default::default()
            },
        );
        entries.push(
            HistoryEntry {
                layers: Some(layers),
                ..Default::default()
            }
            .finish(),
        );

        let state = compose_state(&entries, 2, 64).unwrap();
        let layer = state.layer(LayerId(1)).unwrap();
        assert_eq!(layer.name, "Renamed");
        assert_eq!(layer.opacity, 128);
        assert!(layer.is_visible); // from genesis

        // Composing at index 1 must not see entry 2's opacity.
        let state = compose_state(&entries, 1, 64).unwrap();
        assert_eq!(state.layer(LayerId(1)).unwrap().opacity, 255);
    }

    #[test]
    fn tile_slots_resolve_to_most_recent_writer() {
        let mut entries = vec![genesis(100, 100, 64)];
        let red = Tile::fill(Color32::RED);
        let blue = Tile::fill(Color32::BLUE);
        let mut layers = HashMap::new();
        layers.insert(LayerId(1), tile_patch(vec![(1, red.clone())], 4));
        entries.push(
            HistoryEntry {
                layers: Some(layers),
                ..Default::default()
            }
            .finish(),
        );
        let mut layers = HashMap::new();
        layers.insert(LayerId(1), tile_patch(vec![(1, blue.clone()), (2, red.clone())], 4));
        entries.push(
            HistoryEntry {
                layers: Some(layers),
                ..Default::default()
            }
            .finish(),
        );

        let state = compose_state(&entries, 2, 64).unwrap();
        let tiles = &state.layer(LayerId(1)).unwrap().tiles;
        assert!(Tile::same(&tiles[1], &blue));
        assert!(Tile::same(&tiles[2], &red));

        let state = compose_state(&entries, 1, 64).unwrap();
        let tiles = &state.layer(LayerId(1)).unwrap().tiles;
        assert!(Tile::same(&tiles[1], &red));
        // slot 2 untouched at index 1: genesis fill
        assert!(!Tile::same(&tiles[2], &red));
    }

    #[test]
    fn layer_set_follows_newest_layer_map() {
        let mut entries = vec![genesis(100, 100, 64)];
        // add a second layer
        let mut layers = HashMap::new();
        layers.insert(LayerId(1), LayerPatch::default());
        layers.insert(
            LayerId(2),
            LayerPatch::full(
                "Layer 2",
                255,
                true,
                1,
                create_fill_tiles(100, 100, Color32::TRANSPARENT, 64),
            ),
        );
        entries.push(
            HistoryEntry {
                layers: Some(layers),
                ..Default::default()
            }
            .finish(),
        );
        // remove it again by narrowing the map
        let mut layers = HashMap::new();
        layers.insert(LayerId(1), LayerPatch::default());
        entries.push(
            HistoryEntry {
                layers: Some(layers),
                ..Default::default()
            }
            .finish(),
        );

        let state = compose_state(&entries, 1, 64).unwrap();
        assert_eq!(state.layers.len(), 2);
        let state = compose_state(&entries, 2, 64).unwrap();
        assert_eq!(state.layers.len(), 1);
        assert_eq!(state.layers[0].id, LayerId(1));
    }

    #[test]
    fn missing_genesis_field_is_fatal() {
        let entries = vec![
            HistoryEntry {
                project_id: Some(ProjectId(1)),
                ..Default::default()
            }
            .finish(),
        ];
        let err = compose_state(&entries, 0, 64).unwrap_err();
        assert!(matches!(err, ComposeError::UndefinedField { field: "size", .. }));
    }

    #[test]
    fn resize_without_tile_redefinition_fails_fast() {
        // Genesis: 100x100, tile 64 -> 2x2 grid, all white fills.
        let mut entries = vec![genesis(100, 100, 64)];
        // Resize to 200x200 (4x4 grid) without any tile data.
        entries.push(
            HistoryEntry {
                size: Some(CanvasSize {
                    width: 200,
                    height: 200,
                }),
                ..Default::default()
            }
            .finish(),
        );
        // Old flat indices 0..4 still resolve from genesis; the 12 new slots
        // have no defined value anywhere, which is a composer invariant
        // violation.
        let err = compose_state(&entries, 1, 64).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::UndefinedTileSlot { slot, total: 16, .. } if slot >= 4
        ));

        // The same resize carrying a full tile array composes fine.
        let mut layers = HashMap::new();
        layers.insert(
            LayerId(1),
            tile_patch(
                create_fill_tiles(200, 200, Color32::WHITE, 64)
                    .into_iter()
                    .enumerate()
                    .collect(),
                16,
            ),
        );
        entries[1].layers = Some(layers);
        let state = compose_state(&entries, 1, 64).unwrap();
        assert_eq!(state.layer(LayerId(1)).unwrap().tiles.len(), 16);
    }

    #[test]
    fn shrink_ignores_surplus_slots_of_older_entries() {
        let mut entries = vec![genesis(200, 200, 64)]; // 4x4
        let mut layers = HashMap::new();
        layers.insert(
            LayerId(1),
            tile_patch(
                create_fill_tiles(100, 100, Color32::BLACK, 64)
                    .into_iter()
                    .enumerate()
                    .collect(),
                4,
            ),
        );
        entries.push(
            HistoryEntry {
                size: Some(CanvasSize {
                    width: 100,
                    height: 100,
                }),
                layers: Some(layers),
                ..Default::default()
            }
            .finish(),
        );
        let state = compose_state(&entries, 1, 64).unwrap();
        assert_eq!(state.layer(LayerId(1)).unwrap().tiles.len(), 4);
    }

    #[test]
    fn genesis_snapshot_round_trips() {
        let entries = vec![genesis(100, 100, 64)];
        let state = compose_state(&entries, 0, 64).unwrap();
        let snapshot = vec![state.to_genesis_entry()];
        let restored = compose_state(&snapshot, 0, 64).unwrap();
        assert_eq!(restored.size, state.size);
        assert_eq!(restored.layers.len(), state.layers.len());
        let (a, b) = (&state.layers[0], &restored.layers[0]);
        assert_eq!(a.tiles.len(), b.tiles.len());
        for (ta, tb) in a.tiles.iter().zip(&b.tiles) {
            assert!(Tile::same(ta, tb)); // snapshot shares tiles, not copies
        }
    }

    #[test]
    fn out_of_range_target_is_fatal() {
        let entries = vec![genesis(64, 64, 64)];
        assert!(matches!(
            compose_state(&entries, 1, 64),
            Err(ComposeError::TargetOutOfRange { target: 1, len: 1 })
        ));
    }
}
