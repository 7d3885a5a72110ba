//! Error types for the bridge binary.
//!
//! Configuration and transport setup fail loudly through these enums;
//! per-frame problems never do. Those become structured `error` replies
//! on the wire instead.

use sentinel_core::RegistryError;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be interpreted.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Errors that stop the transport from serving.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint scheme is not supported by this build.
    #[error("unsupported endpoint {0:?}: only tcp:// endpoints are served")]
    UnsupportedEndpoint(String),

    /// The endpoint is not of the form `host:port`.
    #[error("invalid endpoint {0:?}: expected tcp://host:port")]
    InvalidEndpoint(String),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Top-level startup failures.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Subsystems could not be registered.
    #[error("subsystem registration failed: {0}")]
    Registry(#[from] RegistryError),

    /// The transport could not start.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
