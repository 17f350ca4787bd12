pub mod layers;
pub mod ops;
pub mod redraw;
pub mod tile;
