//! Vector operations for similarity search.
//!
//! The index stores unit-norm vectors, so dot product and cosine similarity
//! coincide on the hot path; both are provided because the store exposes the
//! scoring mode to callers. All functions are scalar and allocation-free --
//! exact scans over a few tens of thousands of 768-dim rows are fast enough
//! without SIMD, and the same code compiles unchanged to wasm.

pub mod ops;

pub use ops::{cosine_similarity, dot_product, is_unit_norm, l2_norm, normalize};
