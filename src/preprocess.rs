//! Feature transformation: numeric standardization plus categorical one-hot
//! encoding, concatenated in that order.

use std::collections::BTreeSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, ModelError};
use crate::models::{Record, CATEGORICAL_FEATURES, NUMERIC_FEATURES};

/// Fitted standardization parameters for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
}

impl NumericColumn {
    /// Population mean and standard deviation. A constant column gets a
    /// scale of 1 so it transforms to zeros.
    fn fit(column: &str, values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std > f64::EPSILON * mean.abs().max(1.0) {
            std
        } else {
            1.0
        };

        Self {
            column: column.to_string(),
            mean,
            scale,
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// Fitted vocabulary for one categorical column, sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub column: String,
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    fn fit<'a>(column: &str, values: impl Iterator<Item = &'a str>) -> Self {
        let categories: BTreeSet<&str> = values.collect();
        Self {
            column: column.to_string(),
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    /// Position of `value` in the vocabulary. `None` for unseen categories,
    /// which encode as an all-zero block.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|category| category.as_str().cmp(value))
            .ok()
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransformer {
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl FeatureTransformer {
    pub fn fit(records: &[Record]) -> Result<Self, ModelError> {
        if records.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let numeric = NUMERIC_FEATURES
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let values: Vec<f64> = records.iter().map(|r| r.numeric_values()[i]).collect();
                NumericColumn::fit(column, &values)
            })
            .collect();

        let categorical = CATEGORICAL_FEATURES
            .iter()
            .enumerate()
            .map(|(i, column)| {
                CategoricalColumn::fit(column, records.iter().map(|r| r.categorical_values()[i]))
            })
            .collect();

        let transformer = Self {
            numeric,
            categorical,
        };
        tracing::debug!(
            numeric = transformer.numeric.len(),
            one_hot = transformer.one_hot_width(),
            "fitted feature transformer"
        );
        Ok(transformer)
    }

    fn one_hot_width(&self) -> usize {
        self.categorical.iter().map(CategoricalColumn::width).sum()
    }

    /// Width of the transformed design matrix.
    pub fn n_features(&self) -> usize {
        self.numeric.len() + self.one_hot_width()
    }

    /// Output column names, numeric first, then `column_category` indicators.
    pub fn feature_names(&self) -> Vec<String> {
        let numeric = self.numeric.iter().map(|n| n.column.clone());
        let one_hot = self.categorical.iter().flat_map(|c| {
            c.categories
                .iter()
                .map(move |category| format!("{}_{}", c.column, category))
        });
        numeric.chain(one_hot).collect()
    }

    pub fn transform(&self, records: &[Record]) -> Array2<f64> {
        let mut matrix = Array2::zeros((records.len(), self.n_features()));

        for (row, record) in records.iter().enumerate() {
            for (col, (params, value)) in self
                .numeric
                .iter()
                .zip(record.numeric_values())
                .enumerate()
            {
                matrix[[row, col]] = params.transform(value);
            }

            let mut offset = self.numeric.len();
            for (vocabulary, value) in self.categorical.iter().zip(record.categorical_values()) {
                if let Some(index) = vocabulary.index_of(value) {
                    matrix[[row, offset + index]] = 1.0;
                }
                offset += vocabulary.width();
            }
        }

        matrix
    }

    /// Checks that a deserialized transformer matches the record layout.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let numeric: Vec<&str> = self.numeric.iter().map(|n| n.column.as_str()).collect();
        if numeric != NUMERIC_FEATURES {
            return Err(ArtifactError::Invalid(format!(
                "numeric columns {numeric:?} do not match {NUMERIC_FEATURES:?}"
            )));
        }

        let categorical: Vec<&str> = self.categorical.iter().map(|c| c.column.as_str()).collect();
        if categorical != CATEGORICAL_FEATURES {
            return Err(ArtifactError::Invalid(format!(
                "categorical columns {categorical:?} do not match {CATEGORICAL_FEATURES:?}"
            )));
        }

        if let Some(bad) = self
            .numeric
            .iter()
            .find(|n| !n.mean.is_finite() || !n.scale.is_finite() || n.scale <= 0.0)
        {
            return Err(ArtifactError::Invalid(format!(
                "column '{}' has unusable mean {} / scale {}",
                bad.column, bad.mean, bad.scale
            )));
        }

        if let Some(bad) = self
            .categorical
            .iter()
            .find(|c| c.categories.windows(2).any(|pair| pair[0] >= pair[1]))
        {
            return Err(ArtifactError::Invalid(format!(
                "categories for column '{}' are not sorted and unique",
                bad.column
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_record;

    fn records() -> Vec<Record> {
        let mut a = sample_record();
        a.raised_hands = 0.0;
        a.gender = "F".to_string();
        let mut b = sample_record();
        b.raised_hands = 10.0;
        b.topic = "Math".to_string();
        vec![a, b]
    }

    #[test]
    fn numeric_columns_are_standardized() {
        let transformer = FeatureTransformer::fit(&records()).unwrap();
        let params = &transformer.numeric[0];
        assert_eq!(params.column, "raisedhands");
        assert!((params.mean - 5.0).abs() < 1e-12);
        assert!((params.scale - 5.0).abs() < 1e-12);

        let matrix = transformer.transform(&records());
        assert!((matrix[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((matrix[[1, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_column_gets_unit_scale() {
        let transformer = FeatureTransformer::fit(&records()).unwrap();
        let visited = &transformer.numeric[1];
        assert_eq!(visited.scale, 1.0);
        let matrix = transformer.transform(&records());
        assert_eq!(matrix[[0, 1]], 0.0);
    }

    #[test]
    fn one_hot_vocabulary_is_sorted() {
        let transformer = FeatureTransformer::fit(&records()).unwrap();
        let gender = &transformer.categorical[0];
        assert_eq!(gender.categories, ["F", "M"]);
        assert_eq!(transformer.n_features(), 4 + 2 + 1 + 1 + 2 + 1 + 1 + 1);
        assert_eq!(transformer.feature_names()[4], "gender_F");
    }

    #[test]
    fn each_row_sets_one_indicator_per_known_column() {
        let transformer = FeatureTransformer::fit(&records()).unwrap();
        let matrix = transformer.transform(&records());
        for row in matrix.rows() {
            let indicators: f64 = row.iter().skip(4).sum();
            assert_eq!(indicators, 7.0);
        }
    }

    #[test]
    fn unseen_category_encodes_as_zeros() {
        let transformer = FeatureTransformer::fit(&records()).unwrap();
        let mut unseen = sample_record();
        unseen.topic = "Biology".to_string();
        let matrix = transformer.transform(&[unseen]);

        let names = transformer.feature_names();
        for (name, value) in names.iter().zip(matrix.row(0).iter()) {
            if name.starts_with("Topic_") {
                assert_eq!(*value, 0.0, "{name}");
            }
        }
        let indicators: f64 = matrix.row(0).iter().skip(4).sum();
        assert_eq!(indicators, 6.0);
    }

    #[test]
    fn fitting_nothing_is_an_error() {
        assert!(matches!(
            FeatureTransformer::fit(&[]),
            Err(ModelError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn validate_rejects_reordered_columns() {
        let mut transformer = FeatureTransformer::fit(&records()).unwrap();
        assert!(transformer.validate().is_ok());
        transformer.numeric.swap(0, 1);
        assert!(matches!(transformer.validate(), Err(ArtifactError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_non_positive_scale() {
        let mut transformer = FeatureTransformer::fit(&records()).unwrap();
        transformer.numeric[2].scale = 0.0;
        assert!(transformer.validate().is_err());
    }
}
