//! Extension error types

use std::net::SocketAddr;
use std::time::Duration;

/// Extension error types
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    // Lifecycle API errors
    #[error("registration failed: {0}")]
    Registration(String),

    #[error("polling for next event failed: {0}")]
    Poll(String),

    #[error("extension is not registered")]
    NotRegistered,

    #[error("extension is already registered")]
    AlreadyRegistered,

    /// A SHUTDOWN event was already delivered; the host sends nothing after it.
    #[error("shutdown already observed, no further events")]
    Terminated,

    #[error("operation cancelled")]
    Cancelled,

    #[error("error report rejected: {0}")]
    ErrorReport(String),

    /// Remote parameter store failure.
    ///
    /// Displays as the bare message: it is handed verbatim to local callers
    /// as the body of the 500 response.
    #[error("{0}")]
    RemoteFetch(String),

    // Local endpoint errors
    #[error("failed to bind local endpoint on {addr}: {source}")]
    ServerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("server error: {0}")]
    Server(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ExtensionError {
    /// Whether this error means the extension cannot usefully run at all.
    ///
    /// Everything else is handled at request or poll scope.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtensionError::Registration(_)
                | ExtensionError::ServerBind { .. }
                | ExtensionError::Configuration(_)
        )
    }

    /// Error type string reported to the host on `init/error`.
    ///
    /// The host expects `Category.Reason`.
    pub fn error_type(&self) -> &'static str {
        match self {
            ExtensionError::Registration(_) => "Extension.RegistrationError",
            ExtensionError::Poll(_) => "Extension.PollError",
            ExtensionError::ServerBind { .. } => "Extension.ServerBindError",
            ExtensionError::Configuration(_) => "Extension.ConfigurationError",
            ExtensionError::RemoteFetch(_) => "Extension.RemoteFetchError",
            _ => "Extension.UnknownError",
        }
    }
}

/// Result type alias for extension operations
pub type Result<T> = std::result::Result<T, ExtensionError>;
