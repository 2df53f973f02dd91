use std::path::PathBuf;

/// Raw input that could not be turned into a canonical tree.
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    /// The top-level value is not a JSON object
    #[error("dataset root must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    /// Nesting exceeds the configured depth cap
    #[error("dataset nesting exceeds the maximum depth of {limit}")]
    TooDeep { limit: usize },
}

/// Errors while loading a dataset. The installed dataset is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("io error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("malformed dataset: {0}")]
    Sanitize(#[from] SanitizeError),

    /// The background load thread panicked before reporting
    #[error("load worker panicked")]
    WorkerPanicked,
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Navigation requests that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    /// Empty or whitespace-only search query
    #[error("search query is empty")]
    EmptyQuery,

    #[error("no node matches \"{query}\"")]
    NotFound { query: String },

    #[error("no child named \"{segment}\" on the requested path")]
    PathNotFound { segment: String },

    #[error("path is empty")]
    EmptyPath,
}

/// Notes store failures.
#[derive(Debug, thiserror::Error)]
pub enum NotesError {
    #[error("note text is empty")]
    EmptyText,

    #[error("notes storage unavailable: {0}")]
    Storage(String),

    #[error("failed to encode notes: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<std::io::Error> for NotesError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Renderer collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("this renderer cannot export images")]
    ExportUnsupported,

    #[error("render output failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error reading config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
