//! Read/write trained model JSON files.
//!
//! A model file carries the fitted ensemble together with the run metadata
//! needed to apply it later: the training window and the output band name.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::DateRange;
use crate::error::AppError;
use crate::model::RegressionModel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub training: DateRange,
    pub output_band: String,
    pub model: RegressionModel,
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model: &RegressionModel, training: &DateRange, output_band: &str) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to create model JSON '{}': {e}", path.display())))?;

    let doc = ModelFile {
        tool: "lst".to_string(),
        training: *training,
        output_band: output_band.to_string(),
        model: model.clone(),
    };

    serde_json::to_writer(BufWriter::new(file), &doc)
        .map_err(|e| AppError::invalid_input(format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let doc: ModelFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::invalid_input(format!("Invalid model JSON: {e}")))?;
    doc.model
        .validate()
        .map_err(|e| AppError::invalid_input(format!("Invalid model JSON '{}': {}", path.display(), e.message())))?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;

    #[test]
    fn model_file_round_trip() {
        let world = fixtures::world(vec![]);
        let model = fixtures::trained_model(&world);
        let training = fixtures::config().training;

        let path = std::env::temp_dir().join(format!("lst-model-{}.json", std::process::id()));
        write_model_json(&path, &model, &training, "LST").unwrap();
        let doc = read_model_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(doc.tool, "lst");
        assert_eq!(doc.training, training);
        assert_eq!(doc.output_band, "LST");
        assert_eq!(doc.model.feature_names, model.feature_names);
        assert_eq!(doc.model.forest().n_trees(), model.forest().n_trees());
    }

    /// Write the fixture model, apply `edit` to its JSON and read it back.
    fn read_edited(tag: &str, edit: impl FnOnce(&mut serde_json::Value)) -> Result<ModelFile, AppError> {
        let world = fixtures::world(vec![]);
        let model = fixtures::trained_model(&world);
        let path = std::env::temp_dir().join(format!("lst-model-{tag}-{}.json", std::process::id()));
        write_model_json(&path, &model, &fixtures::config().training, "LST").unwrap();

        let mut doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        edit(&mut doc);
        std::fs::write(&path, doc.to_string()).unwrap();

        let out = read_model_json(&path);
        let _ = std::fs::remove_file(&path);
        out
    }

    #[test]
    fn shortened_feature_list_is_rejected() {
        let err = read_edited("features", |doc| {
            doc["model"]["feature_names"] = serde_json::json!(["ndvi", "elevation"]);
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("2 features"), "{}", err.message());
    }

    #[test]
    fn split_on_unknown_input_is_rejected() {
        let err = read_edited("split", |doc| {
            let nodes = doc["model"]["forest"]["trees"][0]["nodes"].as_array_mut().unwrap();
            let split = nodes.iter_mut().find_map(|n| n.get_mut("Split")).unwrap();
            split["feature"] = serde_json::json!(9);
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("input 9"), "{}", err.message());
    }

    #[test]
    fn empty_feature_list_is_rejected() {
        let err = read_edited("empty", |doc| {
            doc["model"]["feature_names"] = serde_json::json!([]);
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_file_is_invalid_input() {
        let err = read_model_json(Path::new("/nonexistent/lst-model.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
