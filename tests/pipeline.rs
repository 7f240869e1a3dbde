//! End-to-end pipeline tests: train, persist, reload, predict.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use valora::testing::{synthetic_property_record, synthetic_property_table};
use valora::{
    DataProcessor, FeatureEngineer, GbrtParams, ModelTrainer, Predictor, TrainOptions,
};

fn quick_options() -> TrainOptions {
    TrainOptions::builder()
        .params(
            GbrtParams::builder()
                .n_trees(40)
                .learning_rate(0.2)
                .max_depth(4)
                .build(),
        )
        .cv_folds(3)
        .build()
}

#[test]
fn train_persist_reload_predict() {
    let dir = tempdir().unwrap();
    let data_path = dir.path().join("train.csv");
    let model_path = dir.path().join("model.json");
    let processor_path = dir.path().join("processor.json");

    // Write the synthetic table out as a CSV so the whole file path is
    // exercised, header to artifact.
    let table = synthetic_property_table(150, 21);
    write_csv(&table, &data_path);

    let report = ModelTrainer::new()
        .train_files(&data_path, &model_path, &processor_path, &quick_options())
        .unwrap();
    assert!(report.rmse.is_finite());
    assert!(model_path.exists());
    assert!(processor_path.exists());

    let predictor = Predictor::from_files(&model_path, &processor_path).unwrap();
    let record = synthetic_property_record(&mut StdRng::seed_from_u64(1));
    let result = predictor.predict(&record, 0.95).unwrap();

    assert!(result.estimate > 0.0);
    assert!(result.interval.lower <= result.estimate);
    assert!(result.estimate <= result.interval.upper);
}

#[test]
fn reloaded_processor_transforms_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("processor.json");

    let table = synthetic_property_table(80, 5);
    let engineered = FeatureEngineer::new().create_all(&table.without("SalePrice"));

    let mut processor = DataProcessor::new();
    let before = processor.fit_transform(&engineered).unwrap();
    processor.save(&path).unwrap();

    let reloaded = DataProcessor::load(&path).unwrap();
    let after = reloaded.transform(&engineered).unwrap();
    assert_eq!(before, after);
}

#[test]
fn intervals_nest_as_confidence_grows() {
    let table = synthetic_property_table(100, 8);
    let artifacts = ModelTrainer::new().train(&table, &quick_options()).unwrap();
    let predictor = Predictor::new(
        valora::ValuationContext::new(
            artifacts.forest,
            artifacts.report.params,
            artifacts.processor,
        )
        .unwrap(),
    );

    let record = synthetic_property_record(&mut StdRng::seed_from_u64(33));
    let mut previous: Option<valora::PredictionInterval> = None;
    for confidence in [0.5, 0.8, 0.9, 0.99] {
        let interval = predictor.predict(&record, confidence).unwrap().interval;
        if let Some(inner) = previous {
            assert!(interval.lower <= inner.lower);
            assert!(inner.upper <= interval.upper);
        }
        previous = Some(interval);
    }
}

#[test]
fn batch_summary_is_consistent_with_results() {
    let table = synthetic_property_table(90, 13);
    let artifacts = ModelTrainer::new().train(&table, &quick_options()).unwrap();
    let predictor = Predictor::new(
        valora::ValuationContext::new(
            artifacts.forest,
            artifacts.report.params,
            artifacts.processor,
        )
        .unwrap(),
    );

    let mut rng = StdRng::seed_from_u64(2);
    let records: Vec<_> = (0..12).map(|_| synthetic_property_record(&mut rng)).collect();
    let (results, summary) = predictor.predict_batch(&records, 0.9).unwrap();

    assert_eq!(summary.count, results.len());
    let estimates: Vec<f64> = results.iter().map(|r| r.result.estimate).collect();
    let min = estimates.iter().copied().fold(f64::INFINITY, f64::min);
    let max = estimates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(summary.min, min);
    assert_eq!(summary.max, max);
    assert!(min <= summary.mean && summary.mean <= max);
}

#[test]
fn training_twice_from_the_same_csv_gives_identical_artifacts() {
    let dir = tempdir().unwrap();
    let data_path = dir.path().join("train.csv");
    write_csv(&synthetic_property_table(70, 40), &data_path);

    let trainer = ModelTrainer::new();
    let a = trainer
        .train(&valora::load_csv(&data_path).unwrap(), &quick_options())
        .unwrap();
    let b = trainer
        .train(&valora::load_csv(&data_path).unwrap(), &quick_options())
        .unwrap();
    assert_eq!(a.forest, b.forest);
    assert_eq!(a.report.rmse, b.report.rmse);
}

/// Minimal CSV writer over a synthetic table, for exercising ingest.
fn write_csv(table: &valora::Table, path: &std::path::Path) {
    let names: Vec<String> = table.column_names().cloned().collect();
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(&names).unwrap();
    for row in 0..table.n_rows() {
        let cells: Vec<String> = names
            .iter()
            .map(|name| {
                if let Some(values) = table.numeric(name) {
                    let v = values[row];
                    if v.is_nan() {
                        String::new()
                    } else {
                        v.to_string()
                    }
                } else {
                    table.categorical(name).unwrap()[row]
                        .clone()
                        .unwrap_or_default()
                }
            })
            .collect();
        writer.write_record(&cells).unwrap();
    }
    writer.flush().unwrap();
}
