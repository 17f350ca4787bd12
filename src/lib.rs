pub mod canvas;
pub mod history;
pub mod selection;
pub mod utils;

pub use canvas::layers::{LayerCanvas, ProjectCanvas};
pub use canvas::redraw::update_layers_via_composed;
pub use canvas::tile::{Tile, TileGrid, TILE_SIZE};
pub use history::compose::{compose_state, ComposeError, ComposedState};
pub use history::entry::{CanvasSize, HistoryEntry, LayerId, LayerPatch, ProjectId};
pub use history::executor::{HistoryExecutor, Step};
pub use history::log::{HistoryEvent, HistoryLog};
pub use history::temp::TempHistory;
pub use selection::transform::{SelectMode, SelectionTransform, TransformSnapshot};
pub use selection::{CombineOp, MultiPolygon, SelectShape, SelectionEngine};
pub use utils::matrix::Mat;
pub use utils::vector::Vec2;
