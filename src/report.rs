use std::fmt::Write;

use crate::predictor::{ScoredRow, ScoredTable};
use crate::risk::RiskLabel;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLabelSummary {
    pub label: RiskLabel,
    pub count: usize,
    pub avg_score: f64,
}

/// Static guidance shown next to every prediction.
pub const RISK_SIGNALS: [&str; 4] = [
    "Low class participation (few raised hands)",
    "Low use of learning resources",
    "High number of absences",
    "Limited discussion engagement",
];

pub fn summarize_by_label(scored: &ScoredTable) -> Vec<RiskLabelSummary> {
    [RiskLabel::High, RiskLabel::Medium, RiskLabel::Low]
        .into_iter()
        .map(|label| {
            let scores: Vec<f64> = scored
                .assessments()
                .iter()
                .filter(|a| a.risk_label == label)
                .map(|a| a.risk_score)
                .collect();
            RiskLabelSummary {
                label,
                count: scores.len(),
                avg_score: if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().sum::<f64>() / scores.len() as f64
                },
            }
        })
        .collect()
}

/// Short identifier for a row: the first column that is not a feature, or
/// the row index.
pub fn row_name(scored: &ScoredTable, row: &ScoredRow<'_>) -> String {
    let headers = scored.table().headers();
    headers
        .iter()
        .position(|h| !crate::models::FEATURES.contains(&h))
        .and_then(|i| row.values.get(i))
        .filter(|value| !value.is_empty())
        .map(|value| format!("{value} (row {})", row.index))
        .unwrap_or_else(|| format!("row {}", row.index))
}

pub fn write_explanation(output: &mut String) {
    let _ = writeln!(output, "**Key early warning signals include:**");
    for signal in RISK_SIGNALS {
        let _ = writeln!(output, "- {signal}");
    }
}

pub fn build_report(source: Option<&str>, scored: &ScoredTable, top: usize) -> String {
    let summaries = summarize_by_label(scored);

    let mut output = String::new();
    let source_label = source.unwrap_or("uploaded file");

    let _ = writeln!(output, "# Student Dropout Early Warning Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} students scored)",
        source_label,
        scored.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    for summary in &summaries {
        let _ = writeln!(
            output,
            "- {}: {} students (avg score {:.3})",
            summary.label, summary.count, summary.avg_score
        );
    }
    let flagged = scored
        .assessments()
        .iter()
        .filter(|a| a.predicted_dropout == 1)
        .count();
    let _ = writeln!(output, "- Predicted dropouts: {flagged}");

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top {top} High-Risk Students");

    let rows = scored.top(top);
    if rows.is_empty() {
        let _ = writeln!(output, "No students listed.");
    } else {
        for row in &rows {
            let _ = writeln!(
                output,
                "- {}: score {:.3} ({}, predicted dropout {})",
                row_name(scored, row),
                row.assessment.risk_score,
                row.assessment.risk_label,
                row.assessment.predicted_dropout
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Why These Students May Be at Risk");
    write_explanation(&mut output);

    output
}
