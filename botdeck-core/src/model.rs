//! Registry, metadata and installed-plugin shapes.
//!
//! Registry documents use kebab-case keys (that is what the public registry
//! serves); the locally persisted document uses camelCase keys and omits
//! every optional field that is unset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{DeckError, Result};

/// Environment variables stored for an installed plugin.
pub type Environment = BTreeMap<String, EnvValue>;

/// Free-form plugin settings; values may nest.
pub type Settings = BTreeMap<String, Value>;

/// Version written into `metadata.version` of a fresh document.
pub const CONFIG_DOCUMENT_VERSION: &str = "1.0.0";

// =============================================================================
// Scalars
// =============================================================================

/// A scalar environment value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl EnvValue {
    pub fn empty() -> Self {
        EnvValue::Text(String::new())
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{b}"),
            EnvValue::Integer(i) => write!(f, "{i}"),
            EnvValue::Float(x) => write!(f, "{x}"),
            EnvValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::Text(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::Text(s)
    }
}

impl From<bool> for EnvValue {
    fn from(b: bool) -> Self {
        EnvValue::Bool(b)
    }
}

impl From<i64> for EnvValue {
    fn from(i: i64) -> Self {
        EnvValue::Integer(i)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One published version of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginVersionRecord {
    pub version: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatible_bot_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_reason: Option<String>,
}

impl PluginVersionRecord {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            deprecated: false,
            compatible_bot_version: None,
            deprecated_reason: None,
        }
    }

    pub fn deprecated(version: impl Into<String>) -> Self {
        Self {
            deprecated: true,
            ..Self::new(version)
        }
    }
}

/// Registry entry for a single plugin name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryPluginEntry {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub update_time: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_reason: Option<String>,
    pub versions: Vec<PluginVersionRecord>,
}

impl RegistryPluginEntry {
    pub fn with_versions(versions: Vec<PluginVersionRecord>) -> Self {
        Self {
            description: String::new(),
            update_time: String::new(),
            deprecated: false,
            deprecated_reason: None,
            versions,
        }
    }
}

/// The registry manifest (`plugins.json`).
///
/// Accepts both the bare `name → entry` mapping and the full registry
/// document that wraps it under `plugins`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ManifestBody")]
pub struct RegistryManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<String>,
    pub plugins: BTreeMap<String, RegistryPluginEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestBody {
    Document(RegistryDocument),
    Bare(BTreeMap<String, RegistryPluginEntry>),
}

#[derive(Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    maintainers: Vec<String>,
    plugins: BTreeMap<String, RegistryPluginEntry>,
}

impl From<ManifestBody> for RegistryManifest {
    fn from(body: ManifestBody) -> Self {
        match body {
            ManifestBody::Document(doc) => Self {
                name: doc.name,
                description: doc.description,
                maintainers: doc.maintainers,
                plugins: doc.plugins,
            },
            ManifestBody::Bare(plugins) => Self {
                plugins,
                ..Self::default()
            },
        }
    }
}

impl RegistryManifest {
    pub fn from_plugins(plugins: BTreeMap<String, RegistryPluginEntry>) -> Self {
        Self {
            plugins,
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegistryPluginEntry> {
        self.plugins.get(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Declaration of one environment variable in a metadata document.
///
/// The registry writes either a bare `required` flag, a detailed object, or
/// a literal default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvVarSpec {
    Flag(bool),
    Detailed {
        #[serde(default)]
        required: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<EnvValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Literal(EnvValue),
}

impl EnvVarSpec {
    pub fn is_required(&self) -> bool {
        match self {
            EnvVarSpec::Flag(required) => *required,
            EnvVarSpec::Detailed { required, .. } => *required,
            EnvVarSpec::Literal(_) => true,
        }
    }

    /// Value seeded into a fresh install, if any.
    pub fn seed_value(&self) -> Option<EnvValue> {
        match self {
            EnvVarSpec::Literal(v) => Some(v.clone()),
            EnvVarSpec::Detailed {
                default: Some(v), ..
            } => Some(v.clone()),
            _ if self.is_required() => Some(EnvValue::empty()),
            _ => None,
        }
    }
}

/// JSON-Schema-like description of a plugin's settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl SettingsSchema {
    /// Collect `default` values of every property, descending into nested
    /// object properties. Nested objects without any default are left out.
    pub fn defaults(&self) -> Settings {
        collect_defaults(&self.properties)
    }
}

fn collect_defaults(properties: &BTreeMap<String, Value>) -> Settings {
    let mut out = Settings::new();
    for (key, schema) in properties {
        if let Some(default) = schema.get("default") {
            out.insert(key.clone(), default.clone());
            continue;
        }
        if let Some(Value::Object(nested)) = schema.get("properties") {
            let nested: BTreeMap<String, Value> =
                nested.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let inner = collect_defaults(&nested);
            if !inner.is_empty() {
                out.insert(key.clone(), Value::Object(inner.into_iter().collect()));
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PluginDependency {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            url: None,
        }
    }
}

/// `<name>/<version>/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginMetadataDocument {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub version_deprecated: bool,
    #[serde(default)]
    pub plugin_deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, EnvVarSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PluginDependency>,
}

impl PluginMetadataDocument {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            authors: Vec::new(),
            license: String::new(),
            version_deprecated: false,
            plugin_deprecated: false,
            homepage: None,
            repository: None,
            tags: Vec::new(),
            environment: None,
            settings: None,
            dependencies: Vec::new(),
        }
    }

    /// Seed values for declared environment variables.
    pub fn environment_defaults(&self) -> Environment {
        self.environment
            .iter()
            .flatten()
            .filter_map(|(name, spec)| spec.seed_value().map(|v| (name.clone(), v)))
            .collect()
    }

    pub fn settings_defaults(&self) -> Settings {
        self.settings
            .as_ref()
            .map(SettingsSchema::defaults)
            .unwrap_or_default()
    }
}

// =============================================================================
// Persisted document
// =============================================================================

fn default_enabled() -> bool {
    true
}

/// Local state of one installed plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPluginRecord {
    #[serde(default)]
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "Utc::now")]
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<PluginDependency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dependency: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_plugin: Option<String>,
}

impl InstalledPluginRecord {
    pub fn new(version: impl Into<String>, installed_at: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            enabled: true,
            installed_at,
            environment: None,
            settings: None,
            dependencies: None,
            is_dependency: None,
            dependent_plugin: None,
        }
    }

    /// True when this record was pulled in as a dependency of `owner`.
    pub fn is_dependency_of(&self, owner: &str) -> bool {
        self.is_dependency == Some(true) && self.dependent_plugin.as_deref() == Some(owner)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMetadata {
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_document_version")]
    pub version: String,
}

fn default_document_version() -> String {
    CONFIG_DOCUMENT_VERSION.to_string()
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            version: default_document_version(),
        }
    }
}

/// Root persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub plugins: BTreeMap<String, InstalledPluginRecord>,
    #[serde(default)]
    pub metadata: ConfigMetadata,
}

impl PluginConfig {
    /// Check the structural invariants every stored document must hold.
    pub fn validate(&self) -> Result<()> {
        for (name, record) in &self.plugins {
            if name.trim().is_empty() {
                return Err(DeckError::InvalidConfig(
                    "plugin name must be a non-empty string".into(),
                ));
            }
            if record.version.trim().is_empty() {
                return Err(DeckError::InvalidConfig(format!(
                    "plugin {name}: version is required and must be a non-empty string"
                )));
            }
        }
        if self.metadata.version.trim().is_empty() {
            return Err(DeckError::InvalidConfig("metadata.version must not be empty".into()));
        }
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.last_updated = now;
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Tri-state field of a partial update.
///
/// `Keep` when the key is missing from the request, `Clear` for an explicit
/// `null`, `Set` otherwise. Fields must carry `#[serde(default)]` so a
/// missing key resolves to `Keep`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|value| match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        })
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldUpdate::Set(v) => v.serialize(serializer),
            FieldUpdate::Keep | FieldUpdate::Clear => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddPluginRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<PluginDependency>>,
}

impl AddPluginRequest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginUpdate {
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub environment: FieldUpdate<Environment>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub settings: FieldUpdate<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub dependencies: FieldUpdate<Vec<PluginDependency>>,
}

// =============================================================================
// Results
// =============================================================================

/// An installed record together with its name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginView {
    pub name: String,
    #[serde(flatten)]
    pub record: InstalledPluginRecord,
}

/// Transport-neutral outcome of a reconciler operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies_installed: Option<usize>,
    /// Declared dependencies left out because they could not be resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies_skipped: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failure(err: &DeckError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            kind: Some(err.kind().to_string()),
            ..Self::default()
        }
    }
}

impl From<PluginView> for OperationResult {
    fn from(view: PluginView) -> Self {
        OperationResult {
            plugin: Some(view),
            ..OperationResult::ok("Plugin updated successfully")
        }
    }
}
