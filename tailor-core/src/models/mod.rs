//! Known model descriptors.

mod registry;

pub use registry::{default_models, EmbeddingModel, ModelRegistry};
