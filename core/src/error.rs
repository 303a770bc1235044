use thiserror::Error;

/// Containr error types
#[derive(Error, Debug)]
pub enum ContainrError {
    /// package.json missing or malformed
    #[error("Manifest error: {0}")]
    ManifestError(String),

    /// Source revision could not be resolved
    #[error("Revision error: {0}")]
    RevisionError(String),

    /// Package name does not match the npm name shape
    #[error("Invalid package name: {0}")]
    InvalidNameError(String),

    /// No candidate path held the requested template
    #[error("Template not found: {0}")]
    TemplateNotFoundError(String),

    /// The templating engine rejected the template
    #[error("Render error: {0}")]
    RenderError(String),

    /// Dependency-layer build failed
    #[error("Layer build failed: {0}")]
    LayerBuildError(String),

    /// Application image build failed
    #[error("Build failed: {0}")]
    BuildError(String),

    /// Referenced image does not exist in the local store
    #[error("Image not found: {0}")]
    SourceNotFoundError(String),

    /// Builder reported success but the content-id token was missing
    #[error("Unexpected builder output: {0}")]
    UnexpectedOutputError(String),

    /// `docker tag` failed
    #[error("Tag failed: {0}")]
    TagError(String),

    /// `docker push` failed
    #[error("Push failed: {0}")]
    PushError(String),

    /// `docker run` failed
    #[error("Run failed: {0}")]
    RunError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for ContainrError {
    fn from(err: serde_json::Error) -> Self {
        ContainrError::ManifestError(err.to_string())
    }
}

/// Result type alias for containr operations
pub type Result<T> = std::result::Result<T, ContainrError>;
