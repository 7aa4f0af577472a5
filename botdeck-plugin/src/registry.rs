use async_trait::async_trait;
use botdeck_core::config::RegistryConfig;
use botdeck_core::error::{DeckError, Result};
use botdeck_core::model::{PluginMetadataDocument, RegistryManifest};
use botdeck_core::version::select_latest;

/// Where plugin manifests and metadata come from.
///
/// Implementations never cache: every call reflects the source's current
/// state.
#[async_trait]
pub trait PluginSource: Send + Sync {
    /// Full manifest. Any failure is `RegistryUnavailable`.
    async fn fetch_registry_manifest(&self) -> Result<RegistryManifest>;

    /// Metadata of one published version. Any failure is `MetadataUnavailable`.
    async fn fetch_metadata(&self, plugin: &str, version: &str) -> Result<PluginMetadataDocument>;

    /// Highest installable version of `plugin`, `None` when the plugin is
    /// unknown or every version is deprecated.
    async fn resolve_latest_version(&self, plugin: &str) -> Result<Option<String>> {
        let manifest = self.fetch_registry_manifest().await?;
        let Some(entry) = manifest.get(plugin) else {
            tracing::debug!(plugin, "registry: plugin not listed");
            return Ok(None);
        };
        if entry.deprecated {
            tracing::warn!(
                plugin,
                reason = entry.deprecated_reason.as_deref().unwrap_or(""),
                "registry: plugin is deprecated"
            );
        }
        let latest = select_latest(&entry.versions)?.map(|v| v.version);
        tracing::debug!(plugin, version = ?latest, "registry: resolved latest version");
        Ok(latest)
    }
}

/// Plugin names and versions end up as URL path segments; anything that
/// could climb out of or reshape the registry layout is refused.
pub fn is_path_segment(s: &str) -> bool {
    !s.is_empty()
        && !s.contains("..")
        && !s.chars().any(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control())
}

/// HTTP client for a static plugin registry.
///
/// Layout under `base_url`:
/// ```text
/// plugins.json
/// {plugin}/{version}/metadata.json
/// ```
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("botdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeckError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/plugins.json", self.base_url)
    }

    /// `None` when either part would not stay a single path segment.
    pub fn metadata_url(&self, plugin: &str, version: &str) -> Option<String> {
        if !is_path_segment(plugin) || !is_path_segment(version) {
            return None;
        }
        Some(format!("{}/{}/{}/metadata.json", self.base_url, plugin, version))
    }

    async fn get_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        resp.bytes().await.map(|b| b.to_vec()).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PluginSource for RegistryClient {
    async fn fetch_registry_manifest(&self) -> Result<RegistryManifest> {
        let url = self.manifest_url();
        let body = self.get_bytes(&url).await.map_err(|reason| {
            tracing::warn!(url = %url, error = %reason, "registry: manifest fetch failed");
            DeckError::RegistryUnavailable(format!("{url}: {reason}"))
        })?;
        let manifest: RegistryManifest = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(url = %url, error = %e, "registry: manifest is malformed");
            DeckError::RegistryUnavailable(format!("{url}: malformed manifest: {e}"))
        })?;
        tracing::debug!(plugins = manifest.len(), "registry: manifest fetched");
        Ok(manifest)
    }

    async fn fetch_metadata(&self, plugin: &str, version: &str) -> Result<PluginMetadataDocument> {
        let unavailable = |reason: String| DeckError::MetadataUnavailable {
            plugin: plugin.to_string(),
            version: version.to_string(),
            reason,
        };
        let url = self
            .metadata_url(plugin, version)
            .ok_or_else(|| unavailable("name or version is not a valid path segment".into()))?;
        let body = self.get_bytes(&url).await.map_err(unavailable)?;
        serde_json::from_slice(&body).map_err(|e| unavailable(format!("malformed metadata: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RegistryClient {
        RegistryClient::new(&RegistryConfig {
            base_url: base.to_string(),
            timeout_ms: 1000,
        })
        .unwrap()
    }

    #[test]
    fn urls_follow_registry_layout() {
        let c = client("https://example.org/registry/");
        assert_eq!(c.base_url(), "https://example.org/registry");
        assert_eq!(c.manifest_url(), "https://example.org/registry/plugins.json");
        assert_eq!(
            c.metadata_url("weather", "1.2.0").as_deref(),
            Some("https://example.org/registry/weather/1.2.0/metadata.json")
        );
    }

    #[test]
    fn metadata_url_refuses_traversal() {
        let c = client("https://example.org/registry");
        assert!(c.metadata_url("weather", "../../x").is_none());
        assert!(c.metadata_url("a/b", "1.0.0").is_none());
        assert!(c.metadata_url("weather", "1.0.0?raw").is_none());
        assert!(c.metadata_url("", "1.0.0").is_none());
        assert!(c.metadata_url("weather", "..").is_none());
    }

    #[test]
    fn path_segment_accepts_ordinary_names() {
        assert!(is_path_segment("weather-bot"));
        assert!(is_path_segment("@scope.name"));
        assert!(is_path_segment("1.2.0-beta.1"));
        assert!(!is_path_segment("win\\dows"));
    }

    #[tokio::test]
    async fn fetch_metadata_with_traversal_is_soft_failure() {
        let c = client("http://127.0.0.1:9");
        let err = c.fetch_metadata("weather", "../../x").await.unwrap_err();
        assert_eq!(err.kind(), "MetadataUnavailable");
        assert!(err.to_string().contains("path segment"));
    }
}
