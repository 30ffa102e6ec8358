//! Descriptive statistics used by ranking and evaluation.

/// Below this variance a column is treated as constant.
pub const VARIANCE_EPS: f64 = 1e-12;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Pearson correlation coefficient.
///
/// Returns `None` when fewer than two pairs are available, lengths differ,
/// a value is non-finite, or either side has (near) zero variance: the
/// coefficient is undefined there and must not leak into rankings as `NaN`.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx / n <= VARIANCE_EPS || syy / n <= VARIANCE_EPS {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

pub fn rmse(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.is_empty() || observed.len() != predicted.len() {
        return None;
    }
    let sse: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    Some((sse / observed.len() as f64).sqrt())
}

pub fn mae(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.is_empty() || observed.len() != predicted.len() {
        return None;
    }
    let sum: f64 = observed.iter().zip(predicted.iter()).map(|(o, p)| (o - p).abs()).sum();
    Some(sum / observed.len() as f64)
}

/// Coefficient of determination `1 - SS_res / SS_tot`.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.len() != predicted.len() {
        return None;
    }
    let m = mean(observed)?;
    let ss_tot: f64 = observed.iter().map(|o| (o - m) * (o - m)).sum();
    if ss_tot <= VARIANCE_EPS {
        return None;
    }
    let ss_res: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}
