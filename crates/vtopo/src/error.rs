//! Topology error types.

use thiserror::Error;
use vtopo_store::StoreError;

/// Result type alias for topology operations.
pub type TopoResult<T> = Result<T, TopoError>;

/// Errors surfaced by topology operations. Raw store errors never leak past
/// an operation boundary; see [`TopoError::from_store`].
#[derive(Debug, Error)]
pub enum TopoError {
    #[error("node not found: {0}")]
    NotFound(String),

    #[error("node already exists: {0}")]
    AlreadyExists(String),

    #[error("version conflict: {0}")]
    VersionConflict(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("inconsistent tablet {alias}: missing {missing}")]
    InconsistentTablet { alias: String, missing: String },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("interrupted while waiting for {0}")]
    Interrupted(String),

    #[error("transient store error on {path}: {reason}")]
    TransientStore { path: String, reason: String },

    #[error("{path}: {source}")]
    Wrapped {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("codec error for {path}: {reason}")]
    Codec { path: String, reason: String },

    #[error("purge of {path} incomplete: {purged} purged, {} failed", failures.len())]
    PurgeIncomplete {
        path: String,
        purged: usize,
        failures: Vec<TopoError>,
    },
}

impl TopoError {
    /// Normalize a store error observed on `path`.
    pub fn from_store(path: &str, err: StoreError) -> Self {
        match err {
            StoreError::NoNode(_) => TopoError::NotFound(path.to_string()),
            StoreError::NodeExists(_) => TopoError::AlreadyExists(path.to_string()),
            StoreError::BadVersion { .. } => TopoError::VersionConflict(path.to_string()),
            StoreError::InvalidPath(p) => TopoError::InvalidIdentifier(p),
            e if e.is_transient() => TopoError::TransientStore {
                path: path.to_string(),
                reason: e.to_string(),
            },
            source => TopoError::Wrapped {
                path: path.to_string(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TopoError::NotFound(_))
    }
}

/// Attach the path a store call was made against and normalize its error.
pub(crate) trait AtPath<T> {
    fn at(self, path: &str) -> TopoResult<T>;
}

impl<T> AtPath<T> for Result<T, StoreError> {
    fn at(self, path: &str) -> TopoResult<T> {
        self.map_err(|e| TopoError::from_store(path, e))
    }
}
