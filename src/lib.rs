//! Student dropout early warning: a logistic-regression pipeline trained on
//! engagement data, and the upload/score/export contract served from it.

pub mod classifier;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod preprocess;
pub mod report;
pub mod risk;
pub mod trainer;

#[cfg(test)]
mod test_support;

pub use dataset::{DataError, LabeledDataset, Table};
pub use error::{ArtifactError, ModelError, PredictError};
pub use pipeline::Pipeline;
pub use predictor::{load_model, predict, ScoredTable, UploadSession, UploadState};
pub use risk::{score_to_label, RiskLabel};
