//! Configuration module
//!
//! Static settings loaded from `config.toml` and the user preferences that
//! are written back whenever they are toggled.

#[allow(clippy::module_inception)]
pub mod config;
pub mod preferences;

pub use config::Config;
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
