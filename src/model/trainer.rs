//! Train/test split, ensemble fitting and hold-out evaluation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{ForestParams, SampleSet};
use crate::error::AppError;
use crate::math::{fit_linear, mae, r_squared, rmse};
use crate::model::forest::RandomForest;
use crate::model::regression::RegressionModel;

/// Sample indices assigned to each side of the split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold-out metrics. Absent when the test subset is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub test_count: usize,
    pub rmse: f64,
    pub mae: f64,
    /// Undefined when the test labels are constant.
    pub r2: Option<f64>,
    /// RMSE of an OLS fit on the same features and training rows.
    pub linear_rmse: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: RegressionModel,
    pub split: TrainTestSplit,
    pub evaluation: Option<Evaluation>,
}

/// Assign each of `n` samples to train with probability `ratio`.
///
/// Assignment is an independent Bernoulli draw per sample, so subset sizes
/// only approach `ratio * n` on average.
pub fn split_samples(n: usize, ratio: f64, seed: u64) -> TrainTestSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity((n as f64 * ratio) as usize);
    let mut test = Vec::new();
    for i in 0..n {
        if rng.r#gen::<f64>() < ratio {
            train.push(i);
        } else {
            test.push(i);
        }
    }
    TrainTestSplit { train, test }
}

/// Fit the ensemble on the training subset using `features`, in order.
pub fn train_model(
    samples: &SampleSet,
    features: &[String],
    params: &ForestParams,
    split_ratio: f64,
    seed: u64,
) -> Result<TrainedModel, AppError> {
    if samples.is_empty() {
        return Err(AppError::insufficient_data(
            "Sample set is empty: no pixel had finite features and label.",
        ));
    }
    if features.is_empty() {
        return Err(AppError::invalid_input("At least one predictor is required for training."));
    }

    let columns: Vec<usize> = features
        .iter()
        .map(|name| {
            samples.feature_index(name).ok_or_else(|| {
                AppError::computation(format!("Feature mismatch: '{name}' is not a sampled band."))
            })
        })
        .collect::<Result<_, _>>()?;

    let rows: Vec<Vec<f64>> = samples
        .samples
        .iter()
        .map(|s| columns.iter().map(|&j| s.features[j]).collect())
        .collect();
    let labels = samples.labels();

    let split = split_samples(samples.len(), split_ratio, seed);
    if split.train.is_empty() {
        return Err(AppError::insufficient_data(format!(
            "Training subset is empty ({} samples, split ratio {split_ratio}).",
            samples.len()
        )));
    }
    debug!(train = split.train.len(), test = split.test.len(), "split samples");

    let train_rows: Vec<Vec<f64>> = split.train.iter().map(|&i| rows[i].clone()).collect();
    let train_y: Vec<f64> = split.train.iter().map(|&i| labels[i]).collect();

    let forest = RandomForest::fit(&train_rows, &train_y, params, seed)?;
    let model = RegressionModel::new(
        features.to_vec(),
        samples.label_name.clone(),
        params.clone(),
        seed,
        train_rows.len(),
        forest,
    )?;
    info!(
        trees = params.n_trees,
        features = %features.join(","),
        train = train_rows.len(),
        "model trained"
    );

    let evaluation = evaluate(&model, &rows, &labels, &split, &train_rows, &train_y);
    match &evaluation {
        Some(e) => info!(test = e.test_count, rmse = e.rmse, r2 = ?e.r2, "hold-out evaluation"),
        None => warn!("test subset is empty; skipping evaluation"),
    }

    Ok(TrainedModel {
        model,
        split,
        evaluation,
    })
}

fn evaluate(
    model: &RegressionModel,
    rows: &[Vec<f64>],
    labels: &[f64],
    split: &TrainTestSplit,
    train_rows: &[Vec<f64>],
    train_y: &[f64],
) -> Option<Evaluation> {
    if split.test.is_empty() {
        return None;
    }
    let observed: Vec<f64> = split.test.iter().map(|&i| labels[i]).collect();
    let predicted: Vec<f64> = split.test.iter().map(|&i| model.predict_row(&rows[i])).collect();

    let linear_rmse = fit_linear(train_rows, train_y).and_then(|fit| {
        let baseline: Vec<f64> = split.test.iter().map(|&i| fit.predict(&rows[i])).collect();
        rmse(&observed, &baseline)
    });

    Some(Evaluation {
        test_count: observed.len(),
        rmse: rmse(&observed, &predicted)?,
        mae: mae(&observed, &predicted)?,
        r2: r_squared(&observed, &predicted),
        linear_rmse,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sample;

    fn params() -> ForestParams {
        ForestParams {
            n_trees: 10,
            max_depth: 6,
            min_samples_leaf: 2,
            features_per_split: None,
        }
    }

    fn samples(n: usize) -> SampleSet {
        let samples = (0..n)
            .map(|i| {
                let a = (i % 17) as f64 / 17.0;
                let b = (i % 5) as f64;
                Sample {
                    row: i,
                    col: 0,
                    x: 0.0,
                    y: 0.0,
                    stratum: 0,
                    features: vec![a, b, 1.0],
                    label: 290.0 + 15.0 * a,
                }
            })
            .collect();
        SampleSet {
            feature_names: vec!["ndvi".into(), "tpi".into(), "flat".into()],
            label_name: "LST".into(),
            samples,
            allocations: Vec::new(),
        }
    }

    #[test]
    fn split_fraction_converges_to_ratio() {
        let runs = 50;
        let n = 1000;
        let total: usize = (0..runs).map(|s| split_samples(n, 0.7, s).train.len()).sum();
        let mean = total as f64 / runs as f64;
        assert!((mean - 700.0).abs() < 10.0, "mean train size {mean}");
    }

    #[test]
    fn split_is_a_partition() {
        let split = split_samples(500, 0.6, 3);
        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..500).collect::<Vec<_>>());
        assert!(split.train.iter().all(|i| !split.test.contains(i)));
    }

    #[test]
    fn split_extremes() {
        assert!(split_samples(100, 0.0, 1).train.is_empty());
        assert!(split_samples(100, 1.0, 1).test.is_empty());
    }

    #[test]
    fn model_records_feature_order_and_evaluates() {
        let set = samples(300);
        let features = vec!["tpi".to_string(), "ndvi".to_string()];
        let trained = train_model(&set, &features, &params(), 0.7, 9).unwrap();

        assert_eq!(trained.model.feature_names, features);
        assert_eq!(trained.model.label_name, "LST");
        assert_eq!(trained.model.train_count, trained.split.train.len());

        let eval = trained.evaluation.unwrap();
        assert_eq!(eval.test_count, trained.split.test.len());
        assert!(eval.rmse < 2.0, "rmse {}", eval.rmse);
        assert!(eval.r2.unwrap() > 0.9);
        assert!(eval.linear_rmse.is_some());
    }

    #[test]
    fn empty_sample_set_is_fatal() {
        let set = samples(0);
        let err = train_model(&set, &["ndvi".to_string()], &params(), 0.7, 1).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn empty_training_subset_is_fatal() {
        let set = samples(20);
        let err = train_model(&set, &["ndvi".to_string()], &params(), 0.0, 1).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn empty_test_subset_skips_evaluation() {
        let set = samples(40);
        let trained = train_model(&set, &["ndvi".to_string()], &params(), 1.0, 1).unwrap();
        assert!(trained.evaluation.is_none());
    }

    #[test]
    fn unknown_feature_is_a_mismatch() {
        let set = samples(40);
        let err = train_model(&set, &["lst_night".to_string()], &params(), 0.7, 1).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
