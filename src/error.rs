//! Error types for the Ceph provider
//!
//! Provides structured error types for every layer of the provider: provider
//! configuration, the dashboard HTTP client, asynchronous tasks, client-side
//! validation and post-write verification.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Malformed provider or client options, surfaced at configure time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no endpoint configured: set `endpoint` or `endpoints`")]
    MissingEndpoint,

    #[error("exactly one of `token` or `username` + `password` must be set")]
    MissingAuth,

    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("login failed on every endpoint: {0}")]
    Authentication(String),

    #[error("provider has not been configured")]
    NotConfigured,

    #[error("unknown {kind} type: {name}")]
    UnknownType { kind: String, name: String },
}

// =============================================================================
// Provider Error
// =============================================================================

/// Unified error type for the provider
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    // =========================================================================
    // Dashboard API Errors
    // =========================================================================
    #[error("authentication against {endpoint} failed: {reason}")]
    Authentication { endpoint: String, reason: String },

    #[error("Ceph API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("task {task} failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("invalid keyring: {0}")]
    InvalidKeyring(String),

    #[error("invalid ID {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("unsupported capability type {0:?}: expected one of mon, mgr, osd, mds, mds-caps")]
    UnsupportedCapability(String),

    #[error("unknown {kind} value {value:?}")]
    UnknownEnum { kind: String, value: String },

    #[error("invalid attribute {attribute}: {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    // =========================================================================
    // Reconciliation Errors
    // =========================================================================
    #[error("{resource} {id}: {attribute} is {observed} after apply, expected {expected}")]
    PostWriteDrift {
        resource: String,
        id: String,
        attribute: String,
        expected: String,
        observed: String,
    },

    #[error("{resource}: changing {} requires replacement", attributes.join(", "))]
    RequiresReplace {
        resource: String,
        attributes: Vec<String>,
    },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    // =========================================================================
    // Parse / IO Errors
    // =========================================================================
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `NotFound` error
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Whether this error means the remote object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Api { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Whether the operation was cancelled or ran past its deadline
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Check if this error is transient; the host may choose to retry these
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Api { status, .. } => matches!(*status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Rewrite an API failure that signals a missing object into `NotFound`.
    ///
    /// The dashboard is inconsistent here: some controllers answer 404, others
    /// answer 400/500 with the underlying librados or RGW error in the body.
    pub fn into_not_found(self, kind: &str, name: &str) -> Self {
        match &self {
            Error::Api { status, body } if *status == 404 || body_signals_missing(body) => {
                Error::not_found(kind, name)
            }
            _ => self,
        }
    }
}

fn body_signals_missing(body: &str) -> bool {
    const MARKERS: &[&str] = &[
        "NoSuchUser",
        "NoSuchKey",
        "does not exist",
        "doesn't exist",
        "not found",
        "ENOENT",
    ];
    MARKERS.iter().any(|m| body.contains(m))
}

/// Result type alias for the provider
pub type Result<T> = std::result::Result<T, Error>;
