//! Model persistence
//!
//! The selected model is stored as a single JSON artifact holding its
//! fitted state together with the scores it was selected with.

mod serializer;

pub use serializer::{load_model, JsonModelStore, ModelArtifact, ModelStore};
