//! valora: machine-learned property valuation.
//!
//! An end-to-end pipeline from raw property listings to dollar estimates
//! with confidence intervals: deterministic feature derivation, a
//! fit/transform encoder with disk persistence, gradient boosted regression
//! trees trained on the log price, and a serving surface that pairs a model
//! with the exact encoder it was fitted alongside.
//!
//! # Key Types
//!
//! - [`ModelTrainer`] / [`TrainOptions`] - End-to-end training
//! - [`GbrtParams`] - Boosting hyperparameters
//! - [`Predictor`] / [`ValuationContext`] - Serving
//! - [`DataProcessor`] - Fit/transform encoding
//! - [`FeatureEngineer`] - Derived features over raw tables
//!
//! # Training
//!
//! Use `TrainOptions::builder()` to configure, then `ModelTrainer::train()`
//! (or `train_files` to go CSV-to-artifacts). See the [`training`] module.
//!
//! # Serving
//!
//! Load both artifacts with [`Predictor::from_files`]; the pairing is
//! validated at load time. See the [`inference`] module.

pub mod data;
pub mod error;
pub mod features;
pub mod inference;
pub mod persist;
pub mod processing;
pub mod repr;
pub mod testing;
pub mod training;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use error::{Result, ValuationError};

// Data containers
pub use data::{load_csv, Column, PropertyRecord, Table, Value};

// Pipeline stages
pub use features::FeatureEngineer;
pub use processing::{DataProcessor, EncodingState};

// Training
pub use training::{
    FeatureImportance, GbrtParams, ModelTrainer, ParamGrid, TrainOptions, TrainReport,
    TrainedArtifacts,
};

// Serving
pub use inference::{
    format_dollars, BatchPrediction, BatchSummary, PredictionExplanation, PredictionFactor,
    PredictionInterval, PredictionResult, Predictor, ValuationContext,
};

// Model representation
pub use repr::Forest;
