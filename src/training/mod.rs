//! Model fitting: boosting, tree growth, metrics, tuning, and the
//! end-to-end training pipeline.

mod gbrt;
mod grower;
pub mod metrics;
mod pipeline;
mod tuning;

pub use gbrt::{train, ColumnSampling, GbrtParams};
pub use pipeline::{
    FeatureImportance, ModelTrainer, TrainOptions, TrainReport, TrainedArtifacts,
};
pub use tuning::{cv_rmse, grid_search, kfold_indices, GridSearchResult, ParamGrid};
