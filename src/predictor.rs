//! The prediction contract: cached model load, column validation, scoring,
//! and the views a front end renders or exports.

use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use csv::StringRecord;

use crate::dataset::Table;
use crate::error::PredictError;
use crate::models::FEATURES;
use crate::pipeline::Pipeline;
use crate::risk::RiskAssessment;

pub const DEFAULT_MODEL_PATH: &str = "dropout_model.json";
pub const TOP_RISK_ROWS: usize = 20;
pub const EXPORT_COLUMNS: [&str; 3] = ["risk_score", "risk_label", "predicted_dropout"];

/// A pipeline loaded at most once. The first call decides the outcome,
/// success or failure, and every later call sees the same result.
pub struct ModelCache {
    cell: OnceLock<Result<Pipeline, String>>,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_load(&self, path: &Path) -> Result<&Pipeline, PredictError> {
        self.cell
            .get_or_init(|| {
                Pipeline::load(path).map_err(|err| {
                    tracing::error!(path = %path.display(), error = %err, "model load failed");
                    err.to_string()
                })
            })
            .as_ref()
            .map_err(|message| PredictError::ArtifactLoad(message.clone()))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

static MODEL: ModelCache = ModelCache::new();

/// Process-wide model handle. Only the first call reads `path`.
pub fn load_model(path: &Path) -> Result<&'static Pipeline, PredictError> {
    MODEL.get_or_load(path)
}

/// Validates the required columns and scores every row.
pub fn predict(model: &Pipeline, table: &Table) -> Result<ScoredTable, PredictError> {
    let missing = table.missing_columns(&FEATURES);
    if !missing.is_empty() {
        tracing::warn!(?missing, "upload rejected");
        return Err(PredictError::MissingColumns(missing));
    }
    if table.is_empty() {
        return Err(PredictError::Inference(
            "the uploaded file has no rows to score".to_string(),
        ));
    }

    let records = table
        .records()
        .map_err(|err| PredictError::Inference(err.to_string()))?;
    let scores = model
        .predict_proba(&records)
        .map_err(|err| PredictError::Inference(err.to_string()))?;

    if scores.len() != table.len() {
        return Err(PredictError::Inference(format!(
            "model returned {} scores for {} rows",
            scores.len(),
            table.len()
        )));
    }

    tracing::info!(rows = scores.len(), "risk scores calculated");
    Ok(ScoredTable {
        table: table.clone(),
        assessments: scores.into_iter().map(RiskAssessment::from_score).collect(),
    })
}

/// An uploaded table with one assessment per row, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTable {
    table: Table,
    assessments: Vec<RiskAssessment>,
}

/// One row of a scored table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow<'a> {
    pub index: usize,
    pub values: &'a StringRecord,
    pub assessment: RiskAssessment,
}

impl ScoredTable {
    pub fn len(&self) -> usize {
        self.assessments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assessments.is_empty()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn assessments(&self) -> &[RiskAssessment] {
        &self.assessments
    }

    pub fn scores(&self) -> Vec<f64> {
        self.assessments.iter().map(|a| a.risk_score).collect()
    }

    /// Single-record lookup by row index.
    pub fn row(&self, index: usize) -> Option<ScoredRow<'_>> {
        let values = self.table.rows().get(index)?;
        let assessment = *self.assessments.get(index)?;
        Some(ScoredRow {
            index,
            values,
            assessment,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ScoredRow<'_>> {
        self.table
            .rows()
            .iter()
            .zip(&self.assessments)
            .enumerate()
            .map(|(index, (values, assessment))| ScoredRow {
                index,
                values,
                assessment: *assessment,
            })
    }

    /// The `n` highest-scoring rows, descending. Equal scores keep input
    /// order. The table itself is not reordered.
    pub fn top(&self, n: usize) -> Vec<ScoredRow<'_>> {
        let mut rows: Vec<ScoredRow<'_>> = self.rows().collect();
        rows.sort_by(|a, b| {
            b.assessment
                .risk_score
                .total_cmp(&a.assessment.risk_score)
        });
        rows.truncate(n);
        rows
    }

    /// Input columns followed by the derived ones. Input columns that share
    /// a derived column's name are replaced.
    pub fn augmented_headers(&self) -> (Vec<usize>, StringRecord) {
        let kept: Vec<usize> = self
            .table
            .headers()
            .iter()
            .enumerate()
            .filter(|(_, name)| !EXPORT_COLUMNS.contains(name))
            .map(|(i, _)| i)
            .collect();

        let mut headers: StringRecord = kept
            .iter()
            .map(|&i| &self.table.headers()[i])
            .collect();
        for column in EXPORT_COLUMNS {
            headers.push_field(column);
        }
        (kept, headers)
    }

    /// Writes the full augmented table as CSV.
    pub fn write_augmented<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let (kept, headers) = self.augmented_headers();
        let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        csv_writer.write_record(&headers)?;

        for row in self.rows() {
            let mut record: StringRecord = kept
                .iter()
                .map(|&i| row.values.get(i).unwrap_or_default())
                .collect();
            record.push_field(&row.assessment.risk_score.to_string());
            record.push_field(row.assessment.risk_label.as_str());
            record.push_field(&row.assessment.predicted_dropout.to_string());
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// The download: risk_score, risk_label, predicted_dropout in input
    /// order, no index column.
    pub fn export_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for assessment in &self.assessments {
            writer.serialize(assessment)?;
        }
        if self.assessments.is_empty() {
            writer.write_record(EXPORT_COLUMNS)?;
        }
        writer
            .into_inner()
            .map_err(|err| csv::Error::from(err.into_error()))
    }
}

/// Where one upload stands. Failures are terminal until the next upload.
/// Once scored, the table can be displayed and exported in either order
/// and as often as wanted.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    NoFile,
    Loaded(Table),
    Validated(Table),
    Scored(ScoredTable),
    Displayed(ScoredTable),
    Exported(ScoredTable),
    Rejected(PredictError),
    Failed(PredictError),
}

/// Drives one front-end session through upload, validation and scoring.
pub struct UploadSession<'m> {
    model: &'m Pipeline,
    state: UploadState,
}

impl<'m> UploadSession<'m> {
    pub fn new(model: &'m Pipeline) -> Self {
        Self {
            model,
            state: UploadState::NoFile,
        }
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Replaces whatever the session held and runs the new table to a
    /// terminal state.
    pub fn upload(&mut self, table: Table) -> &UploadState {
        self.state = UploadState::Loaded(table);
        self.validate();
        self.score();
        &self.state
    }

    fn validate(&mut self) {
        if let UploadState::Loaded(table) = &self.state {
            let missing = table.missing_columns(&FEATURES);
            let next = if missing.is_empty() {
                UploadState::Validated(table.clone())
            } else {
                UploadState::Rejected(PredictError::MissingColumns(missing))
            };
            self.state = next;
        }
    }

    fn score(&mut self) {
        if let UploadState::Validated(table) = &self.state {
            let next = match predict(self.model, table) {
                Ok(scored) => UploadState::Scored(scored),
                Err(err) => UploadState::Failed(err),
            };
            self.state = next;
        }
    }

    pub fn scored(&self) -> Option<&ScoredTable> {
        match &self.state {
            UploadState::Scored(scored)
            | UploadState::Displayed(scored)
            | UploadState::Exported(scored) => Some(scored),
            _ => None,
        }
    }

    fn take_scored(&mut self) -> Option<ScoredTable> {
        match std::mem::replace(&mut self.state, UploadState::NoFile) {
            UploadState::Scored(scored)
            | UploadState::Displayed(scored)
            | UploadState::Exported(scored) => Some(scored),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Top-`n` view of a scored upload. `None` until an upload is scored.
    pub fn display(&mut self, n: usize) -> Option<Vec<ScoredRow<'_>>> {
        let scored = self.take_scored()?;
        self.state = UploadState::Displayed(scored);
        self.scored().map(|scored| scored.top(n))
    }

    /// The three-column download of a scored upload. `None` until an upload
    /// is scored.
    pub fn export(&mut self) -> Option<Result<Vec<u8>, csv::Error>> {
        let scored = self.take_scored()?;
        let bytes = scored.export_csv();
        self.state = UploadState::Exported(scored);
        Some(bytes)
    }

    pub fn error(&self) -> Option<&PredictError> {
        match &self.state {
            UploadState::Rejected(err) | UploadState::Failed(err) => Some(err),
            _ => None,
        }
    }
}
