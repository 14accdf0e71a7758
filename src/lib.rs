//! tailor - hybrid retrieval and tool-calling orchestration
//!
//! This is the convenience wrapper crate that re-exports tailor components
//! with optional feature flags.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! tailor = "0.1"  # Includes core + std plugins by default
//! ```
//!
//! # Features
//!
//! - `std` (default): Include the standard plugins (knowledge-base search, arithmetic)

// Re-export core
pub use tailor_core::*;
pub use tailor_plugin;

// Re-export std plugins if feature is enabled
#[cfg(feature = "std")]
pub use tailor_std;

/// Prelude module for convenient imports
pub mod prelude {
    pub use tailor_core::*;
    pub use tailor_plugin::{Plugin, PluginError, PluginOutput, PluginRegistry};

    #[cfg(feature = "std")]
    pub use tailor_std::{arithmetic_plugins, standard_registry, RetrievePlugin, SavePlugin};
}
