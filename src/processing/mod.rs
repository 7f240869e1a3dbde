//! Fit-once encoding pipeline: ordinal maps, imputation, vocabularies, scaling.
//!
//! [`DataProcessor`] resolves the feature schema once during `fit` and
//! freezes it in an [`EncodingState`]. `transform` replays that exact state —
//! same columns, same order, same imputation and scale parameters — so a
//! matrix produced at inference time is column-for-column compatible with the
//! matrices the paired model was trained on. Transform never mutates state.
//!
//! Unseen categorical values map to [`UNSEEN_CODE`], a sentinel outside the
//! valid vocabulary code range (vocabulary codes start at 0).

mod encoding;

pub use encoding::{ordinal_code, LabelVocabulary, ORDINAL_COLUMNS, UNSEEN_CODE};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::data::Table;
use crate::error::{Result, ValuationError};
use crate::features::FeatureEngineer;

/// Target column dropped before fitting.
pub const TARGET_COLUMN: &str = "SalePrice";

/// Raw numeric columns recognized by the pipeline.
pub const NUMERIC_SCHEMA: &[&str] = &[
    "LotFrontage", "LotArea", "OverallQual", "OverallCond",
    "YearBuilt", "YearRemodAdd", "MasVnrArea", "BsmtFinSF1",
    "BsmtFinSF2", "BsmtUnfSF", "TotalBsmtSF", "1stFlrSF",
    "2ndFlrSF", "LowQualFinSF", "GrLivArea", "BsmtFullBath",
    "BsmtHalfBath", "FullBath", "HalfBath", "BedroomAbvGr",
    "KitchenAbvGr", "TotRmsAbvGrd", "Fireplaces", "GarageYrBlt",
    "GarageCars", "GarageArea", "WoodDeckSF", "OpenPorchSF",
    "EnclosedPorch", "3SsnPorch", "ScreenPorch", "PoolArea",
    "MiscVal", "MoSold", "YrSold",
];

/// Categorical columns encoded through label vocabularies.
///
/// Quality-graded columns are *not* listed here: they carry a fixed ranking
/// and go through the ordinal maps into the numeric block instead (see
/// [`ORDINAL_COLUMNS`]).
pub const CATEGORICAL_SCHEMA: &[&str] = &[
    "MSSubClass", "MSZoning", "Street", "Alley", "LotShape",
    "LandContour", "Utilities", "LotConfig", "LandSlope",
    "Neighborhood", "Condition1", "Condition2", "BldgType",
    "HouseStyle", "RoofStyle", "RoofMatl", "Exterior1st",
    "Exterior2nd", "MasVnrType", "Foundation", "Heating",
    "CentralAir", "Electrical", "Functional", "GarageType",
    "PavedDrive", "Fence", "MiscFeature", "SaleType",
    "SaleCondition",
];

/// Sentinel substituted for missing categorical cells before encoding.
pub const MISSING_CATEGORY: &str = "None";

/// Everything `fit` learns, persisted and restored as one unit.
///
/// Vocabularies and scale parameters are assigned only during fit; transform
/// reads them and never writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingState {
    /// Resolved numeric columns (raw schema + ordinal + engineered), in order.
    pub numeric_columns: Vec<String>,
    /// Resolved categorical columns, in schema order.
    pub categorical_columns: Vec<String>,
    /// Median per numeric column, computed over non-missing training cells.
    pub medians: Vec<f64>,
    /// Mean per numeric column, computed after imputation.
    pub means: Vec<f64>,
    /// Standard deviation per numeric column (zero replaced by one).
    pub stds: Vec<f64>,
    /// Label vocabulary per categorical column.
    pub vocabularies: BTreeMap<String, LabelVocabulary>,
}

impl EncodingState {
    /// Resolved feature names: numeric block then categorical block.
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .cloned()
            .collect()
    }

    /// Width of the transformed matrix.
    pub fn n_features(&self) -> usize {
        self.numeric_columns.len() + self.categorical_columns.len()
    }
}

/// Stateful fit/transform pipeline over property tables.
#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    engineer: FeatureEngineer,
    state: Option<EncodingState>,
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a processor around a previously fitted state.
    pub fn from_state(state: EncodingState) -> Self {
        Self {
            engineer: FeatureEngineer::new(),
            state: Some(state),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// The fitted encoding state, if any.
    pub fn state(&self) -> Option<&EncodingState> {
        self.state.as_ref()
    }

    /// Resolved feature names after fitting.
    pub fn feature_names(&self) -> Result<Vec<String>> {
        self.state
            .as_ref()
            .map(EncodingState::feature_names)
            .ok_or(ValuationError::NotFitted)
    }

    /// Fit the pipeline on training data.
    ///
    /// Drops the target column if present, derives features, resolves the
    /// column schema against what the table actually carries, and learns
    /// medians, scale parameters, and per-column vocabularies.
    pub fn fit(&mut self, table: &Table) -> Result<&mut Self> {
        if table.n_rows() == 0 {
            return Err(ValuationError::EmptyDataset);
        }

        let table = table.without(TARGET_COLUMN);
        let engineered = self.engineer.create_all(&table);

        let numeric_columns = resolve_numeric_columns(&self.engineer, &engineered);
        let categorical_columns: Vec<String> = CATEGORICAL_SCHEMA
            .iter()
            .filter(|c| engineered.contains(c))
            .map(|c| c.to_string())
            .collect();

        // Numeric block with ordinal maps applied, missing cells as NaN.
        let raw = numeric_block(&engineered, &numeric_columns);
        let n_rows = engineered.n_rows();
        let n_cols = numeric_columns.len();

        let mut medians = Vec::with_capacity(n_cols);
        let mut means = Vec::with_capacity(n_cols);
        let mut stds = Vec::with_capacity(n_cols);
        for col in 0..n_cols {
            let column: Vec<f64> = (0..n_rows).map(|row| raw[row * n_cols + col]).collect();
            let median = nan_median(&column);
            medians.push(median);

            let imputed: Vec<f64> = column
                .iter()
                .map(|&v| if v.is_nan() { median } else { v })
                .collect();
            let mean = imputed.iter().sum::<f64>() / n_rows as f64;
            let var = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_rows as f64;
            let std = var.sqrt();
            means.push(mean);
            stds.push(if std == 0.0 { 1.0 } else { std });
        }

        let mut vocabularies = BTreeMap::new();
        for name in &categorical_columns {
            let values = categorical_values(&engineered, name)
                .unwrap_or_else(|| vec![MISSING_CATEGORY.to_string(); n_rows]);
            vocabularies.insert(name.clone(), LabelVocabulary::fit(values));
        }

        self.state = Some(EncodingState {
            numeric_columns,
            categorical_columns,
            medians,
            means,
            stds,
            vocabularies,
        });
        Ok(self)
    }

    /// Transform a table into the model's input matrix.
    ///
    /// Replays the fitted derivation, ordinal mapping, imputation, and
    /// scaling. A numeric column absent from the input contributes its
    /// imputed median; an unseen categorical value maps to [`UNSEEN_CODE`].
    /// Output shape: `[n_rows, n_numeric + n_categorical]`.
    pub fn transform(&self, table: &Table) -> Result<Array2<f32>> {
        let state = self.state.as_ref().ok_or(ValuationError::NotFitted)?;

        let table = table.without(TARGET_COLUMN);
        let engineered = self.engineer.create_all(&table);
        let n_rows = engineered.n_rows();
        let width = state.n_features();
        let n_numeric = state.numeric_columns.len();

        let mut out = Array2::<f32>::zeros((n_rows, width));

        for (col, name) in state.numeric_columns.iter().enumerate() {
            let values = numeric_column(&engineered, name);
            let median = state.medians[col];
            let mean = state.means[col];
            let std = state.stds[col];
            for row in 0..n_rows {
                let v = values.as_ref().map_or(f64::NAN, |c| c[row]);
                let v = if v.is_nan() { median } else { v };
                out[[row, col]] = ((v - mean) / std) as f32;
            }
        }

        for (offset, name) in state.categorical_columns.iter().enumerate() {
            let col = n_numeric + offset;
            let vocabulary = &state.vocabularies[name];
            let cells = categorical_values(&engineered, name);
            for row in 0..n_rows {
                let value = cells.as_ref().map_or(MISSING_CATEGORY, |c| c[row].as_str());
                out[[row, col]] = vocabulary.encode(value);
            }
        }

        Ok(out)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, table: &Table) -> Result<Array2<f32>> {
        self.fit(table)?;
        self.transform(table)
    }

    /// Persist the fitted state as one unit.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.state.as_ref().ok_or(ValuationError::NotFitted)?;
        crate::persist::save_processor(path, state)
    }

    /// Restore a processor from disk, fully replacing in-memory state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let state = crate::persist::load_processor(path)?;
        Ok(Self::from_state(state))
    }
}

/// Numeric schema resolution: raw schema order, then ordinal columns, then
/// engineered features in definition order, deduplicated.
fn resolve_numeric_columns(engineer: &FeatureEngineer, engineered: &Table) -> Vec<String> {
    let mut columns: Vec<String> = NUMERIC_SCHEMA
        .iter()
        .filter(|c| engineered.contains(c))
        .map(|c| c.to_string())
        .collect();
    for name in ORDINAL_COLUMNS {
        if engineered.contains(name) {
            columns.push(name.to_string());
        }
    }
    for name in engineer.derived_names(engineered) {
        if !columns.contains(&name) {
            columns.push(name);
        }
    }
    columns
}

/// One numeric column with ordinal mapping applied where the column is
/// quality-graded. Returns `None` when the column is absent.
fn numeric_column(table: &Table, name: &str) -> Option<Vec<f64>> {
    if let Some(values) = table.numeric(name) {
        return Some(values.to_vec());
    }
    if ORDINAL_COLUMNS.contains(&name) {
        if let Some(cells) = table.categorical(name) {
            return Some(
                cells
                    .iter()
                    .map(|c| ordinal_code(name, c.as_deref()))
                    .collect(),
            );
        }
    }
    None
}

/// One categorical column as owned strings, missing cells filled with the
/// sentinel. A column typed numeric (CSV ingest types integer-coded
/// categories like `MSSubClass` that way) is stringified cell by cell, with
/// the same rendering `Table::from_records` uses for mixed columns, so fit
/// and transform agree on the vocabulary keys. Returns `None` when the
/// column is absent entirely.
fn categorical_values(table: &Table, name: &str) -> Option<Vec<String>> {
    if let Some(cells) = table.categorical(name) {
        return Some(
            cells
                .iter()
                .map(|c| c.as_deref().unwrap_or(MISSING_CATEGORY).to_string())
                .collect(),
        );
    }
    table.numeric(name).map(|values| {
        values
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    MISSING_CATEGORY.to_string()
                } else {
                    format!("{v}")
                }
            })
            .collect()
    })
}

/// Row-major numeric block for fitting, NaN marking missing cells.
fn numeric_block(table: &Table, columns: &[String]) -> Vec<f64> {
    let n_rows = table.n_rows();
    let n_cols = columns.len();
    let mut block = vec![f64::NAN; n_rows * n_cols];
    for (col, name) in columns.iter().enumerate() {
        if let Some(values) = numeric_column(table, name) {
            for (row, v) in values.into_iter().enumerate() {
                block[row * n_cols + col] = v;
            }
        }
    }
    block
}

/// Median over the non-NaN entries; zero when every entry is missing.
fn nan_median(values: &[f64]) -> f64 {
    let mut present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return 0.0;
    }
    present.sort_by(|a, b| a.partial_cmp(b).expect("non-NaN values are ordered"));
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    }
}
