mod plugin;
mod registry;

pub use plugin::{Plugin, PluginError, PluginOutput, Result};
pub use registry::PluginRegistry;
