use thiserror::Error;

/// Unified error type for botdeck.
#[derive(Error, Debug)]
pub enum DeckError {
    /// Manifest fetch failed or returned a body that is not a registry.
    #[error("Plugin registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Per-version metadata could not be fetched. Callers soft-degrade.
    #[error("Metadata unavailable for {plugin}@{version}: {reason}")]
    MetadataUnavailable {
        plugin: String,
        version: String,
        reason: String,
    },

    #[error("Invalid version format: {0}")]
    InvalidVersionFormat(String),

    #[error("Plugin already installed: {0}")]
    AlreadyInstalled(String),

    #[error("Plugin not found: {0}")]
    NotFound(String),

    /// The persisted document exists but does not have the expected shape.
    #[error("Corrupt configuration: {0}")]
    CorruptConfig(String),

    /// A document was rejected before being written.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Bot control error: {0}")]
    Bot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DeckError>;

impl DeckError {
    /// Stable machine-readable kind, surfaced to callers next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            DeckError::RegistryUnavailable(_) => "RegistryUnavailable",
            DeckError::MetadataUnavailable { .. } => "MetadataUnavailable",
            DeckError::InvalidVersionFormat(_) => "InvalidVersionFormat",
            DeckError::AlreadyInstalled(_) => "AlreadyInstalled",
            DeckError::NotFound(_) => "NotFound",
            DeckError::CorruptConfig(_) => "CorruptConfig",
            DeckError::InvalidConfig(_) => "InvalidConfig",
            DeckError::InvalidRequest(_) => "InvalidRequest",
            DeckError::Bot(_) => "Bot",
            DeckError::Io(_) => "Io",
            DeckError::Internal(_) => "Internal",
        }
    }

    /// Map to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            DeckError::InvalidRequest(_) | DeckError::InvalidConfig(_) => 400,
            DeckError::NotFound(_) => 404,
            DeckError::AlreadyInstalled(_) => 409,
            DeckError::InvalidVersionFormat(_) => 422,
            DeckError::RegistryUnavailable(_) | DeckError::MetadataUnavailable { .. } => 502,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_map_to_client_statuses() {
        assert_eq!(DeckError::NotFound("x".into()).status_code(), 404);
        assert_eq!(DeckError::AlreadyInstalled("x".into()).status_code(), 409);
        assert_eq!(DeckError::InvalidConfig("x".into()).status_code(), 400);
        assert_eq!(DeckError::InvalidRequest("x".into()).status_code(), 400);
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        assert_eq!(DeckError::RegistryUnavailable("down".into()).status_code(), 502);
        let meta = DeckError::MetadataUnavailable {
            plugin: "foo".into(),
            version: "1.0.0".into(),
            reason: "404".into(),
        };
        assert_eq!(meta.status_code(), 502);
        assert_eq!(meta.to_string(), "Metadata unavailable for foo@1.0.0: 404");
    }

    #[test]
    fn storage_errors_are_server_errors() {
        assert_eq!(DeckError::CorruptConfig("bad".into()).status_code(), 500);
        let io = DeckError::from(std::io::Error::other("disk"));
        assert_eq!(io.kind(), "Io");
        assert_eq!(io.status_code(), 500);
    }

    #[test]
    fn kind_is_stable() {
        assert_eq!(DeckError::InvalidVersionFormat("1.x".into()).kind(), "InvalidVersionFormat");
        assert_eq!(DeckError::NotFound("a".into()).kind(), "NotFound");
    }
}
