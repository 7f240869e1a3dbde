//! Regression metrics.
//!
//! All metrics accumulate in `f64` regardless of input precision. Slices must
//! be equal length; empty inputs return 0.

/// Root Mean Squared Error: sqrt(mean((pred - label)²)). Lower is better.
pub fn rmse(labels: &[f64], predictions: &[f64]) -> f64 {
    let n = labels.len();
    if n == 0 {
        return 0.0;
    }
    let sum_sq = labels
        .iter()
        .zip(predictions)
        .fold(0.0f64, |acc, (&l, &p)| {
            let diff = p - l;
            acc + diff * diff
        });
    (sum_sq / n as f64).sqrt()
}

/// Mean Absolute Error: mean(|pred - label|). Lower is better, more robust
/// to outliers than RMSE.
pub fn mae(labels: &[f64], predictions: &[f64]) -> f64 {
    let n = labels.len();
    if n == 0 {
        return 0.0;
    }
    let sum_ae = labels
        .iter()
        .zip(predictions)
        .fold(0.0f64, |acc, (&l, &p)| acc + (p - l).abs());
    sum_ae / n as f64
}

/// Coefficient of determination: 1 - SS_res / SS_tot.
///
/// Zero when the labels are constant (SS_tot = 0).
pub fn r2(labels: &[f64], predictions: &[f64]) -> f64 {
    let n = labels.len();
    if n == 0 {
        return 0.0;
    }
    let mean = labels.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = labels.iter().map(|&l| (l - mean) * (l - mean)).sum();
    let ss_res: f64 = labels
        .iter()
        .zip(predictions)
        .map(|(&l, &p)| (p - l) * (p - l))
        .sum();
    if ss_tot != 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

/// Mean Absolute Percentage Error: mean(|pred - label| / |label|) × 100.
pub fn mape(labels: &[f64], predictions: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    let n = labels.len();
    if n == 0 {
        return 0.0;
    }
    let sum_ape = labels
        .iter()
        .zip(predictions)
        .fold(0.0f64, |acc, (&l, &p)| acc + (p - l).abs() / l.abs().max(EPS));
    (sum_ape / n as f64) * 100.0
}

/// Arithmetic mean. Zero for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. Zero for empty input.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Median of the values. Zero for empty input.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("metric inputs must not be NaN"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
