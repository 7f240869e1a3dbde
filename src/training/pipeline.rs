//! End-to-end training: raw table in, fitted model plus encoder out.
//!
//! The trainer owns the full sequence the serving path depends on: feature
//! engineering, a seeded train/validation split, encoder fitting on the
//! training rows only, optional grid search, boosting, and a metrics report
//! on the dollar scale. Targets are modelled as ln(1 + price) throughout;
//! only reporting converts back.

use std::path::Path;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{load_csv, Table};
use crate::error::{Result, ValuationError};
use crate::features::FeatureEngineer;
use crate::processing::{DataProcessor, TARGET_COLUMN};
use crate::repr::Forest;

use super::gbrt::{self, GbrtParams};
use super::metrics;
use super::tuning::{self, ParamGrid};

// ============================================================================
// Options
// ============================================================================

/// Knobs for one training run.
#[derive(Debug, Clone, bon::Builder)]
pub struct TrainOptions {
    /// Run the hyperparameter grid search before the final fit.
    #[builder(default = false)]
    pub tune: bool,
    /// Grid searched when `tune` is set.
    #[builder(default)]
    pub grid: ParamGrid,
    /// Parameters for the final fit (the grid winner overrides these when
    /// tuning).
    #[builder(default)]
    pub params: GbrtParams,
    /// Fraction of rows held out for validation.
    #[builder(default = 0.2)]
    pub validation_fraction: f64,
    /// Folds for cross-validation (grid search and the report's CV score).
    #[builder(default = 5)]
    pub cv_folds: usize,
    /// Seed for the split, subsampling, and fold assignment.
    #[builder(default = 42)]
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

// ============================================================================
// Report
// ============================================================================

/// Gain share of one encoded feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f32,
}

/// Validation metrics for a finished run. Error metrics are on the dollar
/// scale; `cv_rmse_*` stay on the log scale the model is fitted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub mape: f64,
    pub cv_rmse_mean: f64,
    pub cv_rmse_std: f64,
    pub params: GbrtParams,
    /// Every encoded feature, descending by gain share.
    pub importance: Vec<FeatureImportance>,
}

/// Everything a serving process needs, plus the report.
#[derive(Debug)]
pub struct TrainedArtifacts {
    pub forest: Forest,
    pub processor: DataProcessor,
    pub report: TrainReport,
}

// ============================================================================
// Trainer
// ============================================================================

#[derive(Debug, Default)]
pub struct ModelTrainer;

impl ModelTrainer {
    pub fn new() -> Self {
        Self
    }

    /// Train on a raw table that includes the target column.
    pub fn train(&self, table: &Table, options: &TrainOptions) -> Result<TrainedArtifacts> {
        let targets_raw = table
            .numeric(TARGET_COLUMN)
            .ok_or_else(|| ValuationError::MissingTarget(TARGET_COLUMN.to_string()))?;

        // Rows without a usable price cannot contribute to the fit.
        let keep: Vec<usize> = targets_raw
            .iter()
            .enumerate()
            .filter(|(_, &t)| t.is_finite() && t >= 0.0)
            .map(|(i, _)| i)
            .collect();
        if keep.len() < 2 {
            return Err(ValuationError::EmptyDataset);
        }
        let table = table.select_rows(&keep);
        let targets_log: Vec<f32> = table
            .numeric(TARGET_COLUMN)
            .map(|t| t.iter().map(|&v| v.ln_1p() as f32).collect())
            .unwrap_or_default();

        let engineered = FeatureEngineer::new().create_all(&table.without(TARGET_COLUMN));

        // The encoder is fitted on the full table, then rows are split; the
        // persisted EncodingState must cover validation-only categories too.
        let mut processor = DataProcessor::new();
        let full_x = processor.fit_transform(&engineered)?;

        let (train_rows, val_rows) =
            split_rows(table.n_rows(), options.validation_fraction, options.seed);
        info!(
            total = table.n_rows(),
            train = train_rows.len(),
            validation = val_rows.len(),
            "split dataset"
        );

        let train_x = full_x.select(Axis(0), &train_rows);
        let val_x = full_x.select(Axis(0), &val_rows);
        let train_y: Vec<f32> = train_rows.iter().map(|&r| targets_log[r]).collect();
        let val_y: Vec<f32> = val_rows.iter().map(|&r| targets_log[r]).collect();

        let mut params = GbrtParams {
            seed: options.seed,
            ..options.params.clone()
        };
        if options.tune {
            if train_y.len() >= 4 {
                let folds = options.cv_folds.clamp(2, train_y.len());
                let result = tuning::grid_search(
                    train_x.view(),
                    &train_y,
                    &options.grid,
                    &params,
                    folds,
                    options.seed,
                );
                params = result.params;
            } else {
                warn!(
                    rows = train_y.len(),
                    "too few training rows for grid search, keeping configured parameters"
                );
            }
        }

        info!(?params, "fitting final model");
        let forest = gbrt::train(train_x.view(), &train_y, &params);

        let report = self.evaluate(&forest, &processor, &val_x, &val_y, &params, options)?;
        info!(
            rmse = report.rmse,
            mae = report.mae,
            r2 = report.r2,
            mape = report.mape,
            "training complete"
        );

        Ok(TrainedArtifacts {
            forest,
            processor,
            report,
        })
    }

    /// Train from a CSV and write both artifacts. The encoder is written
    /// before the model so a crash never leaves a model without the encoder
    /// it was fitted with.
    pub fn train_files(
        &self,
        data_path: impl AsRef<Path>,
        model_path: impl AsRef<Path>,
        processor_path: impl AsRef<Path>,
        options: &TrainOptions,
    ) -> Result<TrainReport> {
        let table = load_csv(&data_path)?;
        info!(
            path = %data_path.as_ref().display(),
            rows = table.n_rows(),
            columns = table.n_columns(),
            "loaded training data"
        );

        let artifacts = self.train(&table, options)?;
        artifacts.processor.save(&processor_path)?;
        crate::persist::save_model(&model_path, &artifacts.forest, &artifacts.report.params)?;
        info!(
            model = %model_path.as_ref().display(),
            processor = %processor_path.as_ref().display(),
            "saved artifacts"
        );
        Ok(artifacts.report)
    }

    fn evaluate(
        &self,
        forest: &Forest,
        processor: &DataProcessor,
        val_x: &Array2<f32>,
        val_y: &[f32],
        params: &GbrtParams,
        options: &TrainOptions,
    ) -> Result<TrainReport> {
        let predicted_log = forest.predict(val_x.view(), true);
        let labels: Vec<f64> = val_y.iter().map(|&v| (v as f64).exp_m1()).collect();
        let predictions: Vec<f64> = predicted_log
            .iter()
            .map(|&v| (v as f64).exp_m1())
            .collect();

        // The CV score re-fits on the held-out rows alone, so it needs at
        // least one row per fold to mean anything.
        let folds = options.cv_folds.min(val_y.len());
        let (cv_rmse_mean, cv_rmse_std) = if folds >= 2 {
            tuning::cv_rmse(val_x.view(), val_y, params, folds, options.seed)
        } else {
            (0.0, 0.0)
        };

        let names = processor.feature_names()?;
        let gains = forest.feature_importance();
        // Resolved names and model width must agree after every fit.
        if names.len() != gains.len() {
            return Err(ValuationError::SchemaMismatch {
                expected: names.len(),
                actual: gains.len(),
            });
        }
        let mut importance: Vec<FeatureImportance> = names
            .into_iter()
            .zip(gains)
            .map(|(name, importance)| FeatureImportance { name, importance })
            .collect();
        importance.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(TrainReport {
            rmse: metrics::rmse(&labels, &predictions),
            mae: metrics::mae(&labels, &predictions),
            r2: metrics::r2(&labels, &predictions),
            mape: metrics::mape(&labels, &predictions),
            cv_rmse_mean,
            cv_rmse_std,
            params: params.clone(),
            importance,
        })
    }
}

/// Seeded shuffle split. Both sides always get at least one row.
fn split_rows(n: usize, validation_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let n_val = ((n as f64) * validation_fraction).round() as usize;
    let n_val = n_val.clamp(1, n - 1);
    let validation = order.split_off(n - n_val);
    (order, validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_property_table;

    fn quick_options() -> TrainOptions {
        TrainOptions::builder()
            .params(
                GbrtParams::builder()
                    .n_trees(25)
                    .learning_rate(0.3)
                    .max_depth(3)
                    .build(),
            )
            .cv_folds(3)
            .build()
    }

    #[test]
    fn split_rows_partitions_and_is_seeded() {
        let (train, val) = split_rows(10, 0.2, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
        let mut all: Vec<usize> = train.iter().chain(val.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(split_rows(10, 0.2, 42), split_rows(10, 0.2, 42));
    }

    #[test]
    fn split_rows_never_empties_either_side() {
        let (train, val) = split_rows(2, 0.01, 1);
        assert_eq!(train.len(), 1);
        assert_eq!(val.len(), 1);
        let (train, val) = split_rows(3, 0.99, 1);
        assert_eq!(train.len(), 1);
        assert_eq!(val.len(), 2);
    }

    #[test]
    fn missing_target_column_is_rejected() {
        let table = synthetic_property_table(20, 1).without(TARGET_COLUMN);
        let err = ModelTrainer::new()
            .train(&table, &quick_options())
            .unwrap_err();
        assert!(matches!(err, ValuationError::MissingTarget(_)));
    }

    #[test]
    fn train_produces_a_usable_model_and_report() {
        let table = synthetic_property_table(120, 7);
        let artifacts = ModelTrainer::new()
            .train(&table, &quick_options())
            .unwrap();

        assert!(artifacts.forest.n_trees() > 0);
        assert!(artifacts.processor.is_fitted());

        let report = &artifacts.report;
        assert!(report.rmse.is_finite() && report.rmse >= 0.0);
        assert!(report.mape.is_finite());
        assert_eq!(
            report.importance.len(),
            artifacts.processor.feature_names().unwrap().len()
        );
        // Descending order.
        for pair in report.importance.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
    }

    #[test]
    fn encoder_is_fitted_on_the_full_table() {
        // Give every row its own neighborhood. Fitting before the split
        // puts all of them in the vocabulary; fitting on the training rows
        // alone would lose the ones that land in the validation fold.
        let mut table = synthetic_property_table(40, 9);
        let hoods: Vec<Option<String>> = (0..40).map(|i| Some(format!("Hood{i}"))).collect();
        table.insert_cat("Neighborhood", hoods);

        let artifacts = ModelTrainer::new()
            .train(&table, &quick_options())
            .unwrap();
        let vocab = &artifacts.processor.state().unwrap().vocabularies["Neighborhood"];
        assert_eq!(vocab.len(), 40);
    }

    #[test]
    fn training_is_deterministic_for_a_fixed_seed() {
        let table = synthetic_property_table(80, 3);
        let trainer = ModelTrainer::new();
        let a = trainer.train(&table, &quick_options()).unwrap();
        let b = trainer.train(&table, &quick_options()).unwrap();
        assert_eq!(a.forest, b.forest);
        assert_eq!(a.report.rmse, b.report.rmse);
    }

    #[test]
    fn rows_without_a_price_are_dropped() {
        let mut table = synthetic_property_table(30, 5);
        let mut prices = table.numeric(TARGET_COLUMN).unwrap().to_vec();
        prices[0] = f64::NAN;
        prices[1] = -5.0;
        table.insert_num(TARGET_COLUMN, prices);

        let artifacts = ModelTrainer::new()
            .train(&table, &quick_options())
            .unwrap();
        assert!(artifacts.forest.n_trees() > 0);
    }
}
