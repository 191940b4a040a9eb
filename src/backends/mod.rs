//! Engine implementations of the inference seams

pub mod mock;

pub use mock::{MockDecoder, MockEncoder, MockSaliencyModel};
