use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

use crate::models::{dropout_label, Record, FEATURES, LABEL_COLUMN, NUMERIC_FEATURES};

#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },

    #[error("row {row}: column '{column}' is null")]
    NullValue { row: usize, column: String },

    #[error("dataset is empty")]
    Empty,
}

/// A CSV table held in memory with trimmed column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    pub fn new(headers: StringRecord, rows: Vec<StringRecord>) -> Self {
        let headers = headers.iter().map(str::trim).collect();
        Self { headers, rows }
    }

    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        Self::collect(reader)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        Self::collect(reader)
    }

    fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, DataError> {
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(headers, rows))
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Required names absent from the header, in the order given.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    /// Parses one row into a scorable record.
    pub fn record(&self, row: usize) -> Result<Record, DataError> {
        let raw = self.rows.get(row).ok_or_else(|| DataError::InvalidRow {
            row,
            message: format!("row index out of range (table has {} rows)", self.len()),
        })?;
        // Counts may carry padding; categorical values are matched verbatim.
        let cells: StringRecord = self
            .headers
            .iter()
            .zip(raw.iter())
            .map(|(header, value)| {
                if NUMERIC_FEATURES.contains(&header) {
                    value.trim()
                } else {
                    value
                }
            })
            .collect();
        let record: Record = cells
            .deserialize(Some(&self.headers))
            .map_err(|err| DataError::InvalidRow {
                row,
                message: err.to_string(),
            })?;

        if let Some(column) = record.first_null_field() {
            return Err(DataError::NullValue {
                row,
                column: column.to_string(),
            });
        }

        Ok(record)
    }

    /// Parses every row; the first bad row fails the whole table.
    pub fn records(&self) -> Result<Vec<Record>, DataError> {
        let missing = self.missing_columns(&FEATURES);
        if !missing.is_empty() {
            return Err(DataError::MissingColumns(missing));
        }
        (0..self.len()).map(|row| self.record(row)).collect()
    }
}

/// Records paired with binary dropout labels.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub records: Vec<Record>,
    pub labels: Vec<u8>,
}

impl LabeledDataset {
    pub fn from_table(table: &Table) -> Result<Self, DataError> {
        let mut required: Vec<&str> = FEATURES.to_vec();
        required.push(LABEL_COLUMN);
        let missing = table.missing_columns(&required);
        if !missing.is_empty() {
            return Err(DataError::MissingColumns(missing));
        }
        if table.is_empty() {
            return Err(DataError::Empty);
        }

        let label_index = table
            .column_index(LABEL_COLUMN)
            .ok_or_else(|| DataError::MissingColumns(vec![LABEL_COLUMN.to_string()]))?;

        let records = table.records()?;
        let labels = table
            .rows()
            .iter()
            .map(|row| dropout_label(row.get(label_index).unwrap_or_default()))
            .collect();

        Ok(Self { records, labels })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&label| label == 1).count()
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Stratified shuffle split. Each class contributes
    /// `round(class_count * test_fraction)` rows to the test side, keeping
    /// at least one row on each side when the class has two or more rows.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> (Self, Self) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for class in [0u8, 1u8] {
            let mut indices: Vec<usize> = self
                .labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == class)
                .map(|(i, _)| i)
                .collect();
            indices.shuffle(&mut rng);

            let count = indices.len();
            let mut n_test = (count as f64 * test_fraction).round() as usize;
            if count >= 2 {
                n_test = n_test.clamp(1, count - 1);
            } else {
                n_test = 0;
            }

            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);

        (self.subset(&train), self.subset(&test))
    }
}
