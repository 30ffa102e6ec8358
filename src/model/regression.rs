//! The trained model as seen by inference and persistence.

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::ForestParams;
use crate::error::AppError;
use crate::features::FeatureStack;
use crate::model::forest::RandomForest;
use crate::raster::RasterField;

/// A fitted ensemble bound to the ordered feature list it was trained on.
///
/// Inputs must be supplied in `feature_names` order; `predict_stack` resolves
/// bands by name so a stack with a different band order still works, but a
/// stack missing any of the names is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub feature_names: Vec<String>,
    pub label_name: String,
    pub params: ForestParams,
    pub seed: u64,
    /// Rows in the training subset.
    pub train_count: usize,
    forest: RandomForest,
}

impl RegressionModel {
    pub(crate) fn new(
        feature_names: Vec<String>,
        label_name: String,
        params: ForestParams,
        seed: u64,
        train_count: usize,
        forest: RandomForest,
    ) -> Result<Self, AppError> {
        if forest.n_features() != feature_names.len() {
            return Err(AppError::computation(format!(
                "Forest expects {} inputs but {} feature names were given.",
                forest.n_features(),
                feature_names.len()
            )));
        }
        Ok(Self {
            feature_names,
            label_name,
            params,
            seed,
            train_count,
            forest,
        })
    }

    /// Validate a model that was not built by training, such as one read back
    /// from a model file.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.feature_names.is_empty() {
            return Err(AppError::invalid_input("Model lists no features."));
        }
        if self.forest.n_features() != self.feature_names.len() {
            return Err(AppError::invalid_input(format!(
                "Model lists {} features but its forest expects {} inputs.",
                self.feature_names.len(),
                self.forest.n_features()
            )));
        }
        self.forest
            .check()
            .map_err(|e| AppError::invalid_input(format!("Malformed forest: {e}")))
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Predict one row. Any non-finite input yields `NaN`.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        if row.len() != self.feature_names.len() || row.iter().any(|v| !v.is_finite()) {
            return f64::NAN;
        }
        self.forest.predict(row)
    }

    /// Error naming the first model feature absent from `available`.
    pub fn check_features(&self, available: &[&str]) -> Result<(), AppError> {
        match self.feature_names.iter().find(|f| !available.contains(&f.as_str())) {
            Some(missing) => Err(AppError::computation(format!(
                "Feature mismatch: model feature '{missing}' is not produced by the feature stack [{}].",
                available.join(", ")
            ))),
            None => Ok(()),
        }
    }

    /// Apply the model to every pixel of `stack`.
    ///
    /// Returns a single-band field named `output_band` on the stack's grid.
    /// Pixels with a missing input stay missing.
    pub fn predict_stack(&self, stack: &FeatureStack, output_band: &str) -> Result<RasterField, AppError> {
        let layers = stack.select(&self.feature_names)?;
        let grid = stack.field().grid();
        let (height, width) = (grid.height, grid.width);

        let rows: Vec<Vec<f64>> = (0..height)
            .into_par_iter()
            .map(|r| {
                let mut buf = vec![0.0; layers.len()];
                (0..width)
                    .map(|c| {
                        for (slot, layer) in buf.iter_mut().zip(layers.iter()) {
                            *slot = layer[(r, c)];
                        }
                        self.predict_row(&buf)
                    })
                    .collect()
            })
            .collect();

        let values = DMatrix::from_fn(height, width, |r, c| rows[r][c]);
        RasterField::single(grid.clone(), output_band, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;
    use crate::features::build_feature_stack;
    use crate::raster::median_composite;

    fn toy_model(features: &[&str]) -> RegressionModel {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| features.iter().enumerate().map(|(j, _)| (i + j) as f64 / 50.0).collect())
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 300.0 + 10.0 * r[0]).collect();
        let params = ForestParams {
            n_trees: 4,
            max_depth: 4,
            min_samples_leaf: 1,
            features_per_split: None,
        };
        let forest = RandomForest::fit(&rows, &y, &params, 1).unwrap();
        RegressionModel::new(
            features.iter().map(|s| s.to_string()).collect(),
            "LST".to_string(),
            params,
            1,
            rows.len(),
            forest,
        )
        .unwrap()
    }

    #[test]
    fn nan_input_predicts_nan() {
        let model = toy_model(&["ndvi", "elevation"]);
        assert!(model.predict_row(&[0.3, f64::NAN]).is_nan());
        assert!(model.predict_row(&[0.3]).is_nan());
        assert!(model.predict_row(&[0.3, 0.2]).is_finite());
    }

    #[test]
    fn validate_catches_edited_feature_lists() {
        let model = toy_model(&["ndvi", "elevation"]);
        model.validate().unwrap();

        let mut edited = model.clone();
        edited.feature_names.pop();
        let err = edited.validate().unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("forest expects 2 inputs"));
    }

    #[test]
    fn check_features_names_the_missing_band() {
        let model = toy_model(&["ndvi", "lst_night"]);
        let err = model.check_features(&["ndvi", "elevation"]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.message().contains("lst_night"));
        assert!(model.check_features(&["elevation", "lst_night", "ndvi"]).is_ok());
    }

    #[test]
    fn predict_stack_produces_named_band_on_grid() {
        let world = fixtures::world(vec![]);
        let composite = median_composite(&[world.scene(fixtures::day(2), 0).unwrap()]).unwrap();
        let stack = build_feature_stack(&composite, world.terrain()).unwrap();
        let model = toy_model(&["ndvi", "elevation"]);

        let field = model.predict_stack(&stack, "LST").unwrap();
        assert_eq!(field.grid(), stack.field().grid());
        assert_eq!(field.band_names(), vec!["LST"]);

        let ndvi = stack.band("ndvi").unwrap();
        let elev = stack.band("elevation").unwrap();
        let out = field.band("LST").unwrap();
        for r in 0..out.nrows() {
            for c in 0..out.ncols() {
                let expected = model.predict_row(&[ndvi[(r, c)], elev[(r, c)]]);
                assert!(expected.to_bits() == out[(r, c)].to_bits() || (expected.is_nan() && out[(r, c)].is_nan()));
            }
        }
    }

    #[test]
    fn model_round_trips_through_json() {
        let model = toy_model(&["red", "tpi"]);
        let json = serde_json::to_string(&model).unwrap();
        let back: RegressionModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.feature_names, model.feature_names);
        assert!((back.predict_row(&[0.2, 0.4]) - model.predict_row(&[0.2, 0.4])).abs() < 1e-9);
    }
}
