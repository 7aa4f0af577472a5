pub mod merge;
pub mod reconciler;
pub mod registry;

pub use reconciler::{AddOutcome, PluginReconciler, RemoveOutcome};
pub use registry::{PluginSource, RegistryClient, is_path_segment};
