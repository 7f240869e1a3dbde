//! Crate-wide error taxonomy.
//!
//! Unseen categorical values and missing optional numeric fields at prediction
//! time are *not* errors: they resolve deterministically to the reserved
//! fallback code and the imputed median. Everything listed here is fatal to
//! the operation that raised it.

use std::path::PathBuf;

/// Errors produced by the valuation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ValuationError {
    /// Transform or predict was attempted before `fit` or `load`.
    #[error("processor is not fitted; call fit() or load a saved state first")]
    NotFitted,

    /// Resolved feature-name count diverged from the model's input width.
    ///
    /// This is a consistency violation between a processor and its paired
    /// model. It is never masked by truncating to the shorter list.
    #[error("feature schema mismatch: processor resolves {expected} features, model expects {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// I/O or decode failure while saving or loading an artifact.
    #[error("persistence failure for {path}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Training data is missing the target column.
    #[error("training data must contain the '{0}' column")]
    MissingTarget(String),

    /// Training or fitting was attempted on a table with no rows.
    #[error("dataset contains no rows")]
    EmptyDataset,

    /// Requested confidence level is outside (0, 1).
    #[error("confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),
}

impl ValuationError {
    /// Wrap an I/O or decode error with the path it occurred on.
    pub fn persistence(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ValuationError>;
