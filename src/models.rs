use serde::{Deserialize, Serialize};

/// Feature columns every scorable table must carry, in canonical order.
pub const FEATURES: [&str; 11] = [
    "gender",
    "StageID",
    "GradeID",
    "Topic",
    "Semester",
    "raisedhands",
    "VisITedResources",
    "AnnouncementsView",
    "Discussion",
    "StudentAbsenceDays",
    "Relation",
];

pub const NUMERIC_FEATURES: [&str; 4] = [
    "raisedhands",
    "VisITedResources",
    "AnnouncementsView",
    "Discussion",
];

pub const CATEGORICAL_FEATURES: [&str; 7] = [
    "gender",
    "StageID",
    "GradeID",
    "Topic",
    "Semester",
    "StudentAbsenceDays",
    "Relation",
];

pub const LABEL_COLUMN: &str = "Class";

/// The `Class` value that marks a student as a dropout.
pub const DROPOUT_CLASS: &str = "L";

/// One student observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub gender: String,
    #[serde(rename = "StageID")]
    pub stage_id: String,
    #[serde(rename = "GradeID")]
    pub grade_id: String,
    #[serde(rename = "Topic")]
    pub topic: String,
    #[serde(rename = "Semester")]
    pub semester: String,
    #[serde(rename = "raisedhands")]
    pub raised_hands: f64,
    #[serde(rename = "VisITedResources")]
    pub visited_resources: f64,
    #[serde(rename = "AnnouncementsView")]
    pub announcements_view: f64,
    #[serde(rename = "Discussion")]
    pub discussion: f64,
    #[serde(rename = "StudentAbsenceDays")]
    pub student_absence_days: String,
    #[serde(rename = "Relation")]
    pub relation: String,
}

impl Record {
    /// Numeric values in `NUMERIC_FEATURES` order.
    pub fn numeric_values(&self) -> [f64; 4] {
        [
            self.raised_hands,
            self.visited_resources,
            self.announcements_view,
            self.discussion,
        ]
    }

    /// Categorical values in `CATEGORICAL_FEATURES` order.
    pub fn categorical_values(&self) -> [&str; 7] {
        [
            self.gender.as_str(),
            self.stage_id.as_str(),
            self.grade_id.as_str(),
            self.topic.as_str(),
            self.semester.as_str(),
            self.student_absence_days.as_str(),
            self.relation.as_str(),
        ]
    }

    /// Name of the first null field, if any. Empty categoricals and
    /// non-finite numbers count as null.
    pub fn first_null_field(&self) -> Option<&'static str> {
        let categorical = CATEGORICAL_FEATURES
            .iter()
            .zip(self.categorical_values())
            .find(|(_, value)| value.is_empty())
            .map(|(name, _)| *name);

        categorical.or_else(|| {
            NUMERIC_FEATURES
                .iter()
                .zip(self.numeric_values())
                .find(|(_, value)| !value.is_finite())
                .map(|(name, _)| *name)
        })
    }
}

/// Maps a raw `Class` value to the binary dropout label.
pub fn dropout_label(class: &str) -> u8 {
    u8::from(class == DROPOUT_CLASS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_record;

    #[test]
    fn feature_groups_partition_the_feature_list() {
        let mut grouped: Vec<&str> = NUMERIC_FEATURES
            .iter()
            .chain(CATEGORICAL_FEATURES.iter())
            .copied()
            .collect();
        let mut all = FEATURES.to_vec();
        grouped.sort_unstable();
        all.sort_unstable();
        assert_eq!(grouped, all);
    }

    #[test]
    fn dropout_label_is_case_sensitive() {
        assert_eq!(dropout_label("L"), 1);
        assert_eq!(dropout_label("M"), 0);
        assert_eq!(dropout_label("H"), 0);
        assert_eq!(dropout_label("l"), 0);
        assert_eq!(dropout_label(" L"), 0);
    }

    #[test]
    fn value_accessors_follow_canonical_order() {
        let record = sample_record();
        assert_eq!(record.numeric_values(), [10.0, 5.0, 2.0, 3.0]);
        assert_eq!(
            record.categorical_values(),
            ["M", "lowerlevel", "G-04", "IT", "F", "Above-7", "Father"]
        );
    }

    #[test]
    fn null_fields_are_detected() {
        let mut record = sample_record();
        assert_eq!(record.first_null_field(), None);

        record.topic.clear();
        assert_eq!(record.first_null_field(), Some("Topic"));

        let mut record = sample_record();
        record.discussion = f64::NAN;
        assert_eq!(record.first_null_field(), Some("Discussion"));
    }
}
