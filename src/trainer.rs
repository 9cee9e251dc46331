use ndarray::Array1;

use crate::classifier::LogisticRegression;
use crate::dataset::LabeledDataset;
use crate::error::ModelError;
use crate::metrics::{roc_auc, ClassificationReport};
use crate::pipeline::Pipeline;
use crate::preprocess::FeatureTransformer;
use crate::risk::predicted_dropout;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub seed: u64,
    pub test_fraction: f64,
    pub max_iter: usize,
    pub c: f64,
    pub tol: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            max_iter: 1000,
            c: 1.0,
            tol: 1e-6,
        }
    }
}

impl TrainConfig {
    fn validate(&self) -> Result<(), ModelError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ModelError::InvalidParameter {
                name: "test_fraction",
                value: self.test_fraction.to_string(),
                reason: "must be strictly between 0 and 1",
            });
        }
        if self.max_iter == 0 {
            return Err(ModelError::InvalidParameter {
                name: "max_iter",
                value: self.max_iter.to_string(),
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub report: ClassificationReport,
    pub roc_auc: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub pipeline: Pipeline,
    pub evaluation: Evaluation,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Fits the transformer and classifier on the training split only.
pub fn fit(train: &LabeledDataset, config: &TrainConfig) -> Result<Pipeline, ModelError> {
    let transformer = FeatureTransformer::fit(&train.records)?;
    let x = transformer.transform(&train.records);
    let y: Array1<f64> = train.labels.iter().map(|&label| f64::from(label)).collect();

    let classifier = LogisticRegression::new()
        .with_c(config.c)
        .with_max_iter(config.max_iter)
        .with_tol(config.tol)
        .with_balanced(true)
        .fit(&x, &y)?;

    Ok(Pipeline::new(transformer, classifier, train.len()))
}

pub fn evaluate(pipeline: &Pipeline, test: &LabeledDataset) -> Result<Evaluation, ModelError> {
    let scores = pipeline.predict_proba(&test.records)?;
    let predictions: Vec<u8> = scores.iter().map(|&s| predicted_dropout(s)).collect();

    Ok(Evaluation {
        report: ClassificationReport::compute(&test.labels, &predictions),
        roc_auc: roc_auc(&test.labels, &scores),
    })
}

/// Stratified split, fit on the training side, evaluate on the held-out side.
pub fn train(dataset: &LabeledDataset, config: &TrainConfig) -> Result<TrainingOutcome, ModelError> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }

    let (train, test) = dataset.stratified_split(config.test_fraction, config.seed);
    tracing::info!(
        train_rows = train.len(),
        test_rows = test.len(),
        positives = dataset.positive_count(),
        seed = config.seed,
        "split dataset"
    );

    let pipeline = fit(&train, config)?;
    let evaluation = evaluate(&pipeline, &test)?;

    Ok(TrainingOutcome {
        pipeline,
        evaluation,
        train_rows: train.len(),
        test_rows: test.len(),
    })
}
