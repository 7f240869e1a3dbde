//! Serving: point estimates, confidence intervals, and explanations.
//!
//! A [`ValuationContext`] pairs a trained model with the exact encoder state
//! it was fitted alongside; the pairing is checked at construction so a
//! mismatched deployment fails at startup rather than at the first request.
//! [`Predictor`] is the request-facing surface over a context.
//!
//! All interval arithmetic happens on the log scale in `f64` and converts to
//! dollars at the very end.

use std::path::Path;

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use crate::data::{PropertyRecord, Table, Value};
use crate::error::{Result, ValuationError};
use crate::features::FeatureEngineer;
use crate::processing::DataProcessor;
use crate::repr::Forest;
use crate::training::{metrics, FeatureImportance, GbrtParams};

/// Relative floor on the log-scale model spread, as a fraction of the log
/// estimate. Keeps intervals honest when the staged predictions have all but
/// converged.
const SIGMA_FLOOR_FRACTION: f64 = 0.05;

// ============================================================================
// Context
// ============================================================================

/// A model and the encoder it was trained with, loaded as one unit.
#[derive(Debug)]
pub struct ValuationContext {
    forest: Forest,
    params: GbrtParams,
    processor: DataProcessor,
}

impl ValuationContext {
    /// Pair a model with an encoder, rejecting mismatched widths.
    pub fn new(forest: Forest, params: GbrtParams, processor: DataProcessor) -> Result<Self> {
        let encoded = processor.feature_names()?.len();
        if encoded != forest.n_features() {
            return Err(ValuationError::SchemaMismatch {
                expected: encoded,
                actual: forest.n_features(),
            });
        }
        Ok(Self {
            forest,
            params,
            processor,
        })
    }

    /// Load both artifacts from disk and pair them.
    pub fn load(model_path: impl AsRef<Path>, processor_path: impl AsRef<Path>) -> Result<Self> {
        let (forest, params) = crate::persist::load_model(model_path)?;
        let processor = DataProcessor::load(processor_path)?;
        Self::new(forest, params, processor)
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn params(&self) -> &GbrtParams {
        &self.params
    }

    pub fn processor(&self) -> &DataProcessor {
        &self.processor
    }
}

// ============================================================================
// Results
// ============================================================================

/// Dollar-scale interval around an estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInterval {
    pub lower: f64,
    pub upper: f64,
    /// The confidence level the interval was built for.
    pub confidence: f64,
    /// Both bounds rendered as `$1,234,567 - $2,345,678`.
    pub formatted: String,
}

/// One valuation.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Point estimate in dollars.
    pub estimate: f64,
    pub interval: PredictionInterval,
    /// `estimate` rendered as `$1,234,567`.
    pub formatted: String,
}

/// One batch entry: the input record echoed next to its valuation.
#[derive(Debug, Clone)]
pub struct BatchPrediction {
    pub record: PropertyRecord,
    pub result: PredictionResult,
}

/// Distribution of estimates over a batch.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

/// One contributor in an explanation, most important first.
#[derive(Debug, Clone)]
pub struct PredictionFactor {
    pub name: String,
    /// The record's value rendered with its natural unit.
    pub detail: String,
    pub importance: f32,
}

/// A valuation with its top contributing factors and a readable summary.
#[derive(Debug, Clone)]
pub struct PredictionExplanation {
    pub result: PredictionResult,
    pub factors: Vec<PredictionFactor>,
    pub summary: String,
}

// ============================================================================
// Predictor
// ============================================================================

/// Request-facing prediction surface.
pub struct Predictor {
    context: ValuationContext,
    engineer: FeatureEngineer,
}

impl Predictor {
    pub fn new(context: ValuationContext) -> Self {
        Self {
            context,
            engineer: FeatureEngineer::new(),
        }
    }

    /// Load both artifacts and build a predictor in one step.
    pub fn from_files(
        model_path: impl AsRef<Path>,
        processor_path: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self::new(ValuationContext::load(model_path, processor_path)?))
    }

    pub fn context(&self) -> &ValuationContext {
        &self.context
    }

    /// Value one property with a confidence interval at `confidence`.
    pub fn predict(&self, record: &PropertyRecord, confidence: f64) -> Result<PredictionResult> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(ValuationError::InvalidConfidence(confidence));
        }

        let row = self.encode(record)?;
        let staged = self.context.forest.predict_staged_row(&row);
        let log_estimate = staged
            .last()
            .copied()
            .map(f64::from)
            .unwrap_or_else(|| f64::from(self.context.forest.base_score()));

        let sigma = self.log_sigma(&staged, log_estimate);
        let z = normal_quantile((1.0 + confidence) / 2.0);
        let estimate = log_estimate.exp_m1().max(0.0);
        let lower = (log_estimate - z * sigma).exp_m1().max(0.0);
        let upper = (log_estimate + z * sigma).exp_m1().max(0.0);
        debug!(estimate, sigma, z, "scored property");

        Ok(PredictionResult {
            estimate,
            interval: PredictionInterval {
                lower,
                upper,
                confidence,
                formatted: format!("{} - {}", format_dollars(lower), format_dollars(upper)),
            },
            formatted: format_dollars(estimate),
        })
    }

    /// Value a batch and summarize the estimate distribution. Each entry
    /// echoes the record it was computed from.
    pub fn predict_batch(
        &self,
        records: &[PropertyRecord],
        confidence: f64,
    ) -> Result<(Vec<BatchPrediction>, BatchSummary)> {
        let results: Vec<BatchPrediction> = records
            .iter()
            .map(|record| {
                Ok(BatchPrediction {
                    record: record.clone(),
                    result: self.predict(record, confidence)?,
                })
            })
            .collect::<Result<_>>()?;

        let estimates: Vec<f64> = results.iter().map(|r| r.result.estimate).collect();
        let summary = BatchSummary {
            count: estimates.len(),
            mean: metrics::mean(&estimates),
            median: metrics::median(&estimates),
            min: estimates.iter().copied().fold(f64::INFINITY, f64::min),
            max: estimates.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std: metrics::std_dev(&estimates),
        };
        Ok((results, summary))
    }

    /// Encoded features ranked by gain share, highest first.
    pub fn feature_importance(&self, top_n: usize) -> Result<Vec<FeatureImportance>> {
        let names = self.context.processor.feature_names()?;
        let gains = self.context.forest.feature_importance();
        if names.len() != gains.len() {
            return Err(ValuationError::SchemaMismatch {
                expected: names.len(),
                actual: gains.len(),
            });
        }

        let mut ranked: Vec<FeatureImportance> = names
            .into_iter()
            .zip(gains)
            .map(|(name, importance)| FeatureImportance { name, importance })
            .collect();
        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.truncate(top_n);
        Ok(ranked)
    }

    /// Value a property and explain it: the most important model features
    /// that the record actually carries, with the record's own values, and a
    /// one-paragraph summary.
    pub fn explain(&self, record: &PropertyRecord) -> Result<PredictionExplanation> {
        let result = self.predict(record, 0.95)?;

        let ranked = self.feature_importance(usize::MAX)?;
        let factors: Vec<PredictionFactor> = ranked
            .into_iter()
            .filter_map(|f| {
                record.get(&f.name).map(|value| PredictionFactor {
                    detail: describe_value(&f.name, value),
                    name: f.name,
                    importance: f.importance,
                })
            })
            .take(5)
            .collect();

        let mut summary = format!("Estimated value: {}.", result.formatted);
        if !factors.is_empty() {
            summary.push_str(" Key factors: ");
            let rendered: Vec<String> = factors
                .iter()
                .map(|f| {
                    format!(
                        "{} ({}, {:.1}% of model weight)",
                        f.name,
                        f.detail,
                        f.importance * 100.0
                    )
                })
                .collect();
            summary.push_str(&rendered.join(", "));
            summary.push('.');
        }

        Ok(PredictionExplanation {
            result,
            factors,
            summary,
        })
    }

    fn encode(&self, record: &PropertyRecord) -> Result<Vec<f32>> {
        let table = Table::from_records(std::slice::from_ref(record));
        let engineered = self.engineer.create_all(&table);
        let encoded = self.context.processor.transform(&engineered)?;
        Ok(encoded.row(0).to_vec())
    }

    /// Log-scale spread: the standard deviation of the converged half of the
    /// staged predictions, floored at a fraction of the log estimate, then
    /// combined in quadrature with that floor.
    fn log_sigma(&self, staged: &[f32], log_estimate: f64) -> f64 {
        let tail: Vec<f64> = staged[staged.len() / 2..]
            .iter()
            .map(|&v| f64::from(v))
            .collect();
        let spread = if tail.len() >= 2 {
            metrics::std_dev(&tail)
        } else {
            0.0
        };
        let floor = SIGMA_FLOOR_FRACTION * log_estimate.abs();
        (spread * spread + floor * floor).sqrt()
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Two-sided standard normal quantile.
fn normal_quantile(p: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
    normal.inverse_cdf(p)
}

/// Round to whole dollars and insert thousands separators.
pub fn format_dollars(amount: f64) -> String {
    let rounded = amount.round().max(0.0) as u64;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn describe_value(name: &str, value: &Value) -> String {
    match value {
        Value::Cat(s) => s.clone(),
        Value::Num(v) => {
            if matches!(name, "GrLivArea" | "TotalBsmtSF" | "1stFlrSF" | "2ndFlrSF") {
                format!("{:.0} sq ft", v)
            } else if matches!(name, "OverallQual" | "OverallCond") {
                format!("{:.0}/10", v)
            } else if name.contains("Year") {
                format!("{:.0}", v)
            } else {
                format!("{}", v)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_property_table;
    use crate::training::{GbrtParams, ModelTrainer, TrainOptions};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fitted_predictor() -> Predictor {
        let table = synthetic_property_table(120, 11);
        let options = TrainOptions::builder()
            .params(
                GbrtParams::builder()
                    .n_trees(30)
                    .learning_rate(0.3)
                    .max_depth(3)
                    .build(),
            )
            .build();
        let artifacts = ModelTrainer::new().train(&table, &options).unwrap();
        let context =
            ValuationContext::new(artifacts.forest, artifacts.report.params, artifacts.processor)
                .unwrap();
        Predictor::new(context)
    }

    fn sample_record() -> PropertyRecord {
        crate::testing::synthetic_property_record(&mut StdRng::seed_from_u64(99))
    }

    #[test]
    fn context_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ValuationContext>();
        assert_send_sync::<Predictor>();
    }

    #[test]
    fn mismatched_artifacts_are_rejected_at_pairing() {
        let table = synthetic_property_table(60, 2);
        let options = TrainOptions::builder()
            .params(GbrtParams::builder().n_trees(5).build())
            .build();
        let artifacts = ModelTrainer::new().train(&table, &options).unwrap();

        let wrong = Forest::new(0.0, artifacts.forest.n_features() + 1);
        let err = ValuationContext::new(wrong, artifacts.report.params, artifacts.processor)
            .unwrap_err();
        assert!(matches!(err, ValuationError::SchemaMismatch { .. }));
    }

    #[test]
    fn prediction_is_positive_and_inside_its_interval() {
        let predictor = fitted_predictor();
        let result = predictor.predict(&sample_record(), 0.9).unwrap();

        assert!(result.estimate > 0.0);
        assert!(result.interval.lower <= result.estimate);
        assert!(result.estimate <= result.interval.upper);
        assert!(result.interval.lower < result.interval.upper);
        assert!(result.formatted.starts_with('$'));
    }

    #[test]
    fn higher_confidence_widens_the_interval() {
        let predictor = fitted_predictor();
        let record = sample_record();
        let narrow = predictor.predict(&record, 0.5).unwrap();
        let wide = predictor.predict(&record, 0.99).unwrap();

        assert_eq!(narrow.estimate, wide.estimate);
        assert!(wide.interval.lower <= narrow.interval.lower);
        assert!(narrow.interval.upper <= wide.interval.upper);
    }

    #[test]
    fn confidence_outside_unit_interval_is_rejected() {
        let predictor = fitted_predictor();
        let record = sample_record();
        for c in [0.0, 1.0, -0.5, 1.5] {
            let err = predictor.predict(&record, c).unwrap_err();
            assert!(matches!(err, ValuationError::InvalidConfidence(_)));
        }
    }

    #[test]
    fn unknown_fields_fall_back_deterministically() {
        let predictor = fitted_predictor();
        let mut record = sample_record();
        record.set("Neighborhood", "Atlantis");
        let a = predictor.predict(&record, 0.9).unwrap();
        let b = predictor.predict(&record, 0.9).unwrap();
        assert_eq!(a.estimate, b.estimate);
        assert!(a.estimate > 0.0);
    }

    #[test]
    fn batch_summary_tracks_the_estimates() {
        let predictor = fitted_predictor();
        let mut rng = StdRng::seed_from_u64(4);
        let records: Vec<PropertyRecord> = (0..8)
            .map(|_| crate::testing::synthetic_property_record(&mut rng))
            .collect();

        let (results, summary) = predictor.predict_batch(&records, 0.9).unwrap();
        assert_eq!(results.len(), 8);
        assert_eq!(summary.count, 8);
        assert!(summary.min <= summary.mean && summary.mean <= summary.max);
        assert!(summary.min <= summary.median && summary.median <= summary.max);
        assert!(summary.std >= 0.0);

        // Each entry echoes the record it was scored from.
        for (record, entry) in records.iter().zip(&results) {
            assert_eq!(record.get("GrLivArea"), entry.record.get("GrLivArea"));
            let alone = predictor.predict(record, 0.9).unwrap();
            assert_eq!(alone.estimate, entry.result.estimate);
        }
    }

    #[test]
    fn importance_is_ranked_and_truncated() {
        let predictor = fitted_predictor();
        let top = predictor.feature_importance(5).unwrap();
        assert!(top.len() <= 5);
        for pair in top.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
    }

    #[test]
    fn explanations_use_record_values() {
        let predictor = fitted_predictor();
        let record = sample_record();
        let explanation = predictor.explain(&record).unwrap();

        assert!(!explanation.factors.is_empty());
        assert!(explanation.factors.len() <= 5);
        for factor in &explanation.factors {
            assert!(record.contains(&factor.name));
            assert!(!factor.detail.is_empty());
        }
        assert!(explanation.summary.starts_with("Estimated value: $"));
        assert!(explanation.summary.contains("Key factors: "));
        assert!(explanation.result.estimate > 0.0);
    }

    #[test]
    fn dollar_formatting_inserts_separators() {
        assert_eq!(format_dollars(0.0), "$0");
        assert_eq!(format_dollars(999.4), "$999");
        assert_eq!(format_dollars(1000.0), "$1,000");
        assert_eq!(format_dollars(1_234_567.8), "$1,234,568");
        assert_eq!(format_dollars(-5.0), "$0");
    }
}
