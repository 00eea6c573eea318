use thiserror::Error;

use crate::evaluate::TranspileError;

/// Core error type for loadstone operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not resolve module: {0}")]
    ModuleNotFound(String),

    #[error("Invalid scoped module name: {0}")]
    InvalidScopedModuleName(String),

    #[error("'{0}' resolves to a URL and cannot be loaded synchronously; use requireAsync")]
    SyncUrlRequire(String),

    #[error("synchronous file access is not available on this platform; use requireAsync")]
    SyncIoUnsupported,

    #[error("'{0}' uses top-level await and cannot be loaded synchronously; use requireAsync")]
    TopLevelAwaitInSync(String),

    #[error("Failed to compile {path}")]
    Compile {
        path: String,
        #[source]
        source: TranspileError,
    },

    #[error("Failed to parse {path} as JSON")]
    JsonParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to load {path}")]
    Load {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Fetch of {url} failed with status {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("Fetch of {url} failed")]
    Fetch {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("cannot verify staleness of URL dependency '{0}' during a synchronous load with mode 'always'")]
    UrlStalenessUnverifiable(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
