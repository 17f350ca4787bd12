pub mod matrix;
pub mod profiler;
pub mod vector;
