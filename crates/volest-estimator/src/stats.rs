//! Small numeric helpers shared by the estimators.

pub(crate) fn log_return(from: f64, to: f64) -> f64 {
    (to / from).ln()
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased (n − 1) sample variance. `None` for fewer than two values.
pub(crate) fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Square root of a variance, `None` unless the result is finite.
/// Small negative variances from rounding clamp to zero; NaN stays missing.
pub(crate) fn volatility_from_variance(variance: f64) -> Option<f64> {
    if variance.is_nan() {
        return None;
    }
    let vol = variance.max(0.0).sqrt();
    vol.is_finite().then_some(vol)
}
