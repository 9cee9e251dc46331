//! The trained artifact: a fitted transformer and classifier bundled with
//! a little provenance, stored as JSON.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::FittedLogistic;
use crate::error::{ArtifactError, ModelError};
use crate::models::Record;
use crate::preprocess::FeatureTransformer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub transformer: FeatureTransformer,
    pub classifier: FittedLogistic,
}

impl Pipeline {
    pub fn new(
        transformer: FeatureTransformer,
        classifier: FittedLogistic,
        training_rows: usize,
    ) -> Self {
        Self {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            training_rows,
            transformer,
            classifier,
        }
    }

    /// Dropout probability for each record, in input order.
    pub fn predict_proba(&self, records: &[Record]) -> Result<Vec<f64>, ModelError> {
        let x = self.transformer.transform(records);
        let proba = self.classifier.predict_proba(&x)?;
        Ok(proba.to_vec())
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        self.transformer.validate()?;

        let expected = self.transformer.n_features();
        if self.classifier.n_features() != expected {
            return Err(ArtifactError::Invalid(format!(
                "classifier has {} coefficients but the transformer produces {} features",
                self.classifier.n_features(),
                expected
            )));
        }

        let finite = self.classifier.intercept.is_finite()
            && self.classifier.coefficients.iter().all(|c| c.is_finite());
        if !finite {
            return Err(ArtifactError::Invalid(
                "classifier weights must be finite".to_string(),
            ));
        }

        Ok(())
    }

    /// Writes the artifact, replacing any existing file. The JSON goes to a
    /// sibling temp file first and is renamed over `path` only once complete.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let tmp = temp_path(path);
        let saved = self
            .write_json(&tmp)
            .and_then(|()| std::fs::rename(&tmp, path).map_err(ArtifactError::from));
        if let Err(err) = saved {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
        tracing::info!(path = %path.display(), model_id = %self.model_id, "artifact saved");
        Ok(())
    }

    fn write_json(&self, path: &Path) -> Result<(), ArtifactError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let reader = BufReader::new(File::open(path)?);
        let pipeline: Pipeline = serde_json::from_reader(reader)?;
        pipeline.validate()?;
        tracing::info!(
            path = %path.display(),
            model_id = %pipeline.model_id,
            trained_at = %pipeline.trained_at,
            "artifact loaded"
        );
        Ok(pipeline)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("model"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::trained_pipeline;

    #[test]
    fn save_then_load_preserves_predictions() {
        let (pipeline, dataset) = trained_pipeline();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        pipeline.save(&path).unwrap();
        let loaded = Pipeline::load(&path).unwrap();

        assert_eq!(loaded.model_id, pipeline.model_id);
        assert_eq!(
            loaded.predict_proba(&dataset.records).unwrap(),
            pipeline.predict_proba(&dataset.records).unwrap()
        );
    }

    #[test]
    fn save_replaces_existing_artifact_without_leftovers() {
        let (first, _) = trained_pipeline();
        let mut second = first.clone();
        second.model_id = Uuid::new_v4();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        first.save(&path).unwrap();
        second.save(&path).unwrap();

        assert_eq!(Pipeline::load(&path).unwrap().model_id, second.model_id);
        let names: Vec<OsString> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, [OsString::from("model.json")]);
    }

    #[test]
    fn failed_save_keeps_previous_artifact() {
        let (first, _) = trained_pipeline();
        let mut second = first.clone();
        second.model_id = Uuid::new_v4();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        first.save(&path).unwrap();

        // A directory where the temp file would go makes the write fail.
        std::fs::create_dir(dir.path().join("model.json.tmp")).unwrap();
        assert!(matches!(second.save(&path), Err(ArtifactError::Io(_))));

        assert_eq!(Pipeline::load(&path).unwrap().model_id, first.model_id);
    }

    #[test]
    fn load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Pipeline::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::Io(_)));
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"\x80\x04not a model").unwrap();
        assert!(matches!(
            Pipeline::load(&path).unwrap_err(),
            ArtifactError::Json(_)
        ));
    }

    #[test]
    fn load_rejects_coefficient_mismatch() {
        let (mut pipeline, _) = trained_pipeline();
        pipeline.classifier.coefficients.pop();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        pipeline.save(&path).unwrap();

        assert!(matches!(
            Pipeline::load(&path).unwrap_err(),
            ArtifactError::Invalid(_)
        ));
    }

    #[test]
    fn scores_are_probabilities_in_input_order() {
        let (pipeline, dataset) = trained_pipeline();
        let scores = pipeline.predict_proba(&dataset.records).unwrap();
        assert_eq!(scores.len(), dataset.len());
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));

        let reversed: Vec<Record> = dataset.records.iter().rev().cloned().collect();
        let mut reversed_scores = pipeline.predict_proba(&reversed).unwrap();
        reversed_scores.reverse();
        assert_eq!(scores, reversed_scores);
    }
}
