pub mod config;
pub mod error;
pub mod model;
pub mod version;

pub use config::DashboardConfig;
pub use error::{DeckError, Result};
pub use model::{InstalledPluginRecord, PluginConfig, PluginMetadataDocument, RegistryManifest};
pub use version::select_latest;
