//! Error taxonomy for the supervisor.
//!
//! Configuration errors are fatal and surface to `main` before the engine is
//! built. Everything else (process, transport, version-probe errors) is
//! recovered locally by the component that raised it.

use thiserror::Error;

/// Raised by CLI/env parsing and validated up front; always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required argument or environment variable: {0}")]
    Missing(&'static str),

    #[error("--steam-path and --install-dir are mutually exclusive; exactly one is required")]
    ConflictingInstallSource,

    #[error("--auth-type basic requires --api-username and --api-password")]
    MissingBasicAuth,

    #[error("--auth-type token requires --api-token")]
    MissingToken,
}

/// Raised by [`crate::process::ManagedProcess`].
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process already running")]
    AlreadyRunning,

    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to signal process: {0}")]
    Signal(#[source] std::io::Error),
}

/// Raised by [`crate::api_client::ServerApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GET {endpoint} failed: {source}")]
    Get {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("POST {endpoint} failed: {source}")]
    Post {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned non-success status {status}")]
    Status { endpoint: String, status: u16 },
}

/// Raised while resolving the install directory / executable ([`crate::install_resolver`]).
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("manifest not found for app id {app_id}: {path}")]
    ManifestNotFound { app_id: u32, path: String },

    #[error("failed to parse manifest {path}: {reason}")]
    ManifestParse { path: String, reason: String },

    #[error("manifest {path} has no AppState.installdir key")]
    MissingInstallDir { path: String },

    #[error("resolved game directory does not exist: {0}")]
    GameDirNotFound(String),

    #[error("game executable not found: {0}")]
    ExecutableNotFound(String),
}
