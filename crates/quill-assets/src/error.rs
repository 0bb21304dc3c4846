use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("document reference error: {0}")]
    DocRef(#[from] quill_docref::DocRefError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    /// True when an upload was refused because the document is read-only.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::DocRef(quill_docref::DocRefError::PermissionDenied { .. })
        )
    }
}

pub type AssetResult<T> = Result<T, AssetError>;
