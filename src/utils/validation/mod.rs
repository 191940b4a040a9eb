//! Validation helpers for tensors and buffers crossing the inference boundary

pub mod tensor;

pub use tensor::TensorValidator;
