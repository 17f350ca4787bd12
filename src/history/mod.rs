pub mod compose;
pub mod entry;
pub mod executor;
pub mod log;
pub mod temp;
