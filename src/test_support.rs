//! Fixtures shared by unit tests.

use std::fmt::Write;
use std::sync::OnceLock;

use crate::dataset::{LabeledDataset, Table};
use crate::models::Record;
use crate::pipeline::Pipeline;
use crate::trainer::{train, TrainConfig};

const FEATURE_HEADER: &str = "gender,StageID,GradeID,Topic,Semester,raisedhands,\
VisITedResources,AnnouncementsView,Discussion,StudentAbsenceDays,Relation";

pub fn sample_record() -> Record {
    Record {
        gender: "M".to_string(),
        stage_id: "lowerlevel".to_string(),
        grade_id: "G-04".to_string(),
        topic: "IT".to_string(),
        semester: "F".to_string(),
        raised_hands: 10.0,
        visited_resources: 5.0,
        announcements_view: 2.0,
        discussion: 3.0,
        student_absence_days: "Above-7".to_string(),
        relation: "Father".to_string(),
    }
}

/// The documented example student, framed by an ID column and a notes column.
pub fn sample_csv() -> String {
    format!(
        "StudentID,{FEATURE_HEADER},Notes\n\
         S-1,M,lowerlevel,G-04,IT,F,10,5,2,3,Above-7,Father,new\n"
    )
}

fn feature_row(i: usize) -> (String, &'static str) {
    let genders = ["M", "F"];
    let stages = ["lowerlevel", "MiddleSchool", "HighSchool"];
    let grades = ["G-02", "G-04", "G-07", "G-08"];
    let topics = ["IT", "Math", "Arabic", "Science", "English"];
    let semesters = ["F", "S"];
    let relations = ["Father", "Mum"];

    let raised = (i * 37 + 11) % 100;
    let visited = (i * 53 + 7) % 99;
    let announcements = (i * 19) % 60;
    let discussion = (i * 29 + 3) % 80;
    let above_seven = (i * 7) % 3 == 0;
    let absence = if above_seven { "Above-7" } else { "Under-7" };

    let engagement = (raised + visited) as i64 + if above_seven { -60 } else { 40 };
    let class = if engagement < 70 {
        "L"
    } else if engagement < 140 {
        "M"
    } else {
        "H"
    };

    let row = format!(
        "{},{},{},{},{},{raised},{visited},{announcements},{discussion},{absence},{}",
        genders[i % 2],
        stages[i % 3],
        grades[i % 4],
        topics[i % 5],
        semesters[(i / 2) % 2],
        relations[(i / 3) % 2],
    );
    (row, class)
}

/// Labeled training data where low engagement and many absences mean `L`.
/// The class header carries stray whitespace.
pub fn labeled_csv(rows: usize) -> String {
    let mut csv = format!("{FEATURE_HEADER}, Class \n");
    for i in 0..rows {
        let (row, class) = feature_row(i);
        let _ = writeln!(csv, "{row},{class}");
    }
    csv
}

/// Unlabeled upload with an ID column in front.
pub fn upload_csv(rows: usize) -> String {
    let mut csv = format!("StudentID,{FEATURE_HEADER}\n");
    for i in 0..rows {
        let (row, _) = feature_row(i + 1000);
        let _ = writeln!(csv, "S-{i},{row}");
    }
    csv
}

static TRAINED: OnceLock<(Pipeline, LabeledDataset)> = OnceLock::new();

/// A pipeline fitted on `labeled_csv(150)`, trained once per test binary.
pub fn trained_pipeline() -> (Pipeline, LabeledDataset) {
    TRAINED
        .get_or_init(|| {
            let table = Table::from_reader(labeled_csv(150).as_bytes()).expect("fixture parses");
            let dataset = LabeledDataset::from_table(&table).expect("fixture is labeled");
            let outcome = train(&dataset, &TrainConfig::default()).expect("fixture trains");
            (outcome.pipeline, dataset)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_pipeline_is_trained_once() {
        let (first, _) = trained_pipeline();
        let (second, dataset) = trained_pipeline();
        assert_eq!(first.model_id, second.model_id);
        assert_eq!(dataset.len(), 150);
        assert!(second.training_rows < dataset.len());
    }
}
