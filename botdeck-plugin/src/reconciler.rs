//! Install, update and remove plugins against the local document.
//!
//! Each mutating operation is a single `lock → load → mutate → save` cycle
//! on the [`ConfigStore`]. Hard failures abort before the save, so the
//! persisted document is left exactly as it was. Metadata and dependency
//! lookups are soft: their failures are logged and the operation carries on
//! with less data.

use crate::merge;
use crate::registry::{PluginSource, is_path_segment};
use botdeck_core::error::{DeckError, Result};
use botdeck_core::model::{
    AddPluginRequest, InstalledPluginRecord, OperationResult, PluginConfig, PluginDependency,
    PluginMetadataDocument, PluginUpdate, PluginView,
};
use botdeck_store::ConfigStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub name: String,
    pub record: InstalledPluginRecord,
    pub dependencies_installed: usize,
    /// Declared dependencies that could not be resolved and were left out.
    pub dependencies_skipped: Vec<String>,
}

/// Result of a successful removal.
#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub name: String,
    /// Total records removed, the plugin itself included.
    pub removed: usize,
    pub dependencies_removed: Vec<String>,
}

/// Version plus whatever metadata could be fetched for it.
struct Resolved {
    version: String,
    metadata: Option<PluginMetadataDocument>,
}

impl Resolved {
    fn record(&self, installed_at: DateTime<Utc>) -> InstalledPluginRecord {
        let mut record = InstalledPluginRecord::new(self.version.clone(), installed_at);
        if let Some(meta) = &self.metadata {
            record.environment = merge::non_empty(meta.environment_defaults());
            record.settings = merge::non_empty(meta.settings_defaults());
        }
        record
    }
}

pub struct PluginReconciler {
    source: Arc<dyn PluginSource>,
    store: Arc<ConfigStore>,
}

impl PluginReconciler {
    pub fn new(source: Arc<dyn PluginSource>, store: Arc<ConfigStore>) -> Self {
        Self { source, store }
    }

    pub fn source(&self) -> &Arc<dyn PluginSource> {
        &self.source
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Current document.
    pub async fn get_config(&self) -> Result<PluginConfig> {
        let _guard = self.store.lock().await;
        self.store.load().await
    }

    /// Replace the whole document. Rejected documents leave the stored one
    /// untouched.
    pub async fn replace_config(&self, mut config: PluginConfig) -> Result<PluginConfig> {
        let _guard = self.store.lock().await;
        self.store.save(&mut config).await?;
        info!(plugins = config.plugins.len(), "Configuration replaced");
        Ok(config)
    }

    /// Install `request.name` plus any declared dependencies not yet present.
    pub async fn add_plugin(&self, request: AddPluginRequest) -> Result<AddOutcome> {
        let name = request.name.trim().to_string();
        if name.is_empty() || request.version.trim().is_empty() {
            return Err(DeckError::InvalidRequest(
                "name and version are required".into(),
            ));
        }
        if !is_path_segment(&name) || !is_path_segment(request.version.trim()) {
            return Err(DeckError::InvalidRequest(format!(
                "invalid plugin name or version: {name}@{}",
                request.version.trim()
            )));
        }

        let _guard = self.store.lock().await;
        let mut config = self.store.load().await?;
        if config.plugins.contains_key(&name) {
            return Err(DeckError::AlreadyInstalled(name));
        }

        let resolved = self.resolve_primary(&name, &request.version).await?;
        let now = Utc::now();

        let mut record = InstalledPluginRecord::new(resolved.version.clone(), now);
        record.enabled = request.enabled.unwrap_or(true);
        let (env_defaults, settings_defaults, declared_by_metadata) = match &resolved.metadata {
            Some(meta) => (
                meta.environment_defaults(),
                meta.settings_defaults(),
                meta.dependencies.clone(),
            ),
            None => Default::default(),
        };
        record.environment = merge::overlay(env_defaults, request.environment.as_ref());
        record.settings = merge::overlay(settings_defaults, request.settings.as_ref());

        let declared = match request.dependencies {
            Some(deps) if !deps.is_empty() => deps,
            _ => declared_by_metadata,
        };
        if !declared.is_empty() {
            record.dependencies = Some(declared.clone());
        }

        let (installed, skipped) = self
            .resolve_dependencies(&name, &declared, &config, now)
            .await;

        config.plugins.insert(name.clone(), record.clone());
        let dependencies_installed = installed.len();
        for (dep_name, dep_record) in installed {
            config.plugins.insert(dep_name, dep_record);
        }
        self.store.save(&mut config).await?;

        info!(
            plugin = %name,
            version = %record.version,
            dependencies = dependencies_installed,
            skipped = skipped.len(),
            "Plugin installed"
        );

        Ok(AddOutcome {
            name,
            record,
            dependencies_installed,
            dependencies_skipped: skipped,
        })
    }

    /// Apply a partial update to an installed plugin.
    pub async fn update_plugin(&self, name: &str, update: PluginUpdate) -> Result<PluginView> {
        let record = self
            .store
            .update(|config| {
                let record = config
                    .plugins
                    .get_mut(name)
                    .ok_or_else(|| DeckError::NotFound(name.to_string()))?;
                merge::apply_update(record, update);
                Ok(record.clone())
            })
            .await?;

        info!(plugin = %name, enabled = record.enabled, "Plugin updated");
        Ok(PluginView {
            name: name.to_string(),
            record,
        })
    }

    /// Remove `name` and every record installed as its dependency.
    ///
    /// Only direct dependencies are pruned; a dependency's own dependencies
    /// stay installed.
    pub async fn remove_plugin(&self, name: &str) -> Result<RemoveOutcome> {
        let outcome = self
            .store
            .update(|config| {
                if config.plugins.remove(name).is_none() {
                    return Err(DeckError::NotFound(name.to_string()));
                }
                let dependents: Vec<String> = config
                    .plugins
                    .iter()
                    .filter(|(_, record)| record.is_dependency_of(name))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &dependents {
                    config.plugins.remove(key);
                }
                Ok(RemoveOutcome {
                    name: name.to_string(),
                    removed: dependents.len() + 1,
                    dependencies_removed: dependents,
                })
            })
            .await?;

        info!(
            plugin = %name,
            dependencies_removed = outcome.dependencies_removed.len(),
            "Plugin removed"
        );
        Ok(outcome)
    }

    /// Registry version wins over the requested one; the requested version
    /// is only used when the registry has nothing installable.
    async fn resolve_primary(&self, name: &str, requested: &str) -> Result<Resolved> {
        let version = match self.source.resolve_latest_version(name).await? {
            Some(v) => v,
            None => {
                debug!(plugin = %name, requested, "No installable registry version, using requested");
                requested.trim().to_string()
            }
        };
        let metadata = fetch_metadata_soft(self.source.as_ref(), name, &version).await;
        Ok(Resolved { version, metadata })
    }

    /// Resolve every pending dependency concurrently. One failure never
    /// affects the others; unresolvable dependencies are returned as skipped.
    async fn resolve_dependencies(
        &self,
        owner: &str,
        declared: &[PluginDependency],
        config: &PluginConfig,
        installed_at: DateTime<Utc>,
    ) -> (Vec<(String, InstalledPluginRecord)>, Vec<String>) {
        let mut seen = BTreeSet::new();
        let mut set = JoinSet::new();
        for dep in declared {
            let dep_name = dep.name.trim();
            if dep_name.is_empty()
                || dep_name == owner
                || config.plugins.contains_key(dep_name)
                || !seen.insert(dep_name.to_string())
            {
                continue;
            }
            let source = Arc::clone(&self.source);
            let dep_name = dep_name.to_string();
            set.spawn(async move {
                let resolved = resolve_dependency(source.as_ref(), &dep_name).await;
                (dep_name, resolved)
            });
        }

        let mut installed = Vec::new();
        let mut skipped = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((dep_name, Ok(Some(resolved)))) => {
                    let mut record = resolved.record(installed_at);
                    record.is_dependency = Some(true);
                    record.dependent_plugin = Some(owner.to_string());
                    installed.push((dep_name, record));
                }
                Ok((dep_name, Ok(None))) => {
                    warn!(plugin = %owner, dependency = %dep_name, "Dependency has no installable version, skipping");
                    skipped.push(dep_name);
                }
                Ok((dep_name, Err(e))) => {
                    warn!(plugin = %owner, dependency = %dep_name, error = %e, "Dependency resolution failed, skipping");
                    skipped.push(dep_name);
                }
                Err(e) => {
                    warn!(plugin = %owner, error = %e, "Dependency resolution task failed");
                }
            }
        }
        installed.sort_by(|a, b| a.0.cmp(&b.0));
        skipped.sort();
        (installed, skipped)
    }
}

async fn resolve_dependency(source: &dyn PluginSource, name: &str) -> Result<Option<Resolved>> {
    let Some(version) = source.resolve_latest_version(name).await? else {
        return Ok(None);
    };
    let metadata = fetch_metadata_soft(source, name, &version).await;
    Ok(Some(Resolved { version, metadata }))
}

async fn fetch_metadata_soft(
    source: &dyn PluginSource,
    name: &str,
    version: &str,
) -> Option<PluginMetadataDocument> {
    match source.fetch_metadata(name, version).await {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(plugin = %name, version, error = %e, "Metadata unavailable, continuing without defaults");
            None
        }
    }
}

// ── Caller-facing results ─────────────────────────────────────

impl From<AddOutcome> for OperationResult {
    fn from(outcome: AddOutcome) -> Self {
        OperationResult {
            plugin: Some(PluginView {
                name: outcome.name.clone(),
                record: outcome.record,
            }),
            dependencies_installed: Some(outcome.dependencies_installed),
            dependencies_skipped: (!outcome.dependencies_skipped.is_empty())
                .then_some(outcome.dependencies_skipped),
            ..OperationResult::ok(format!("Plugin {} installed successfully", outcome.name))
        }
    }
}

impl From<RemoveOutcome> for OperationResult {
    fn from(outcome: RemoveOutcome) -> Self {
        let deps = outcome.dependencies_removed.len();
        let message = if deps > 0 {
            format!("Plugin removed successfully ({deps} dependencies also removed)")
        } else {
            "Plugin removed successfully".to_string()
        };
        OperationResult {
            removed: Some(outcome.removed),
            ..OperationResult::ok(message)
        }
    }
}
