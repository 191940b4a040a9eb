//! Boundary services kept apart from the numeric pipeline

pub mod io;

pub use io::{ImageIOService, TensorMetadata};
