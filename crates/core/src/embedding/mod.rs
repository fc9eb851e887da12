//! Embedder implementations.
//!
//! The runtime normally receives vectors from the host (the browser shell
//! runs its own transformer), but two implementations of the [`Embedder`]
//! trait live here: a deterministic feature-hashing embedder for tests and
//! offline smoke runs, and an ONNX Runtime embedder behind the `onnx`
//! feature for producing the real index.
//!
//! Whatever implementation is chosen, it must be the same offline and at
//! query time. Pooling and normalization happen inside the embedder, so
//! two different builds can silently disagree -- the `model` field in the
//! index artifact exists to catch exactly that.

mod hash;

#[cfg(feature = "onnx")]
mod onnx;

pub use hash::HashEmbedder;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;
