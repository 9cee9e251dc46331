use std::fmt;

use serde::{Deserialize, Serialize};

pub const HIGH_RISK_THRESHOLD: f64 = 0.7;
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;
/// Decision threshold for `predicted_dropout`. Independent of the label tiers.
pub const DROPOUT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

impl RiskLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLabel::Low => "Low",
            RiskLabel::Medium => "Medium",
            RiskLabel::High => "High",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buckets a risk score. Boundary values fall into the upper tier.
pub fn score_to_label(score: f64) -> RiskLabel {
    if score >= HIGH_RISK_THRESHOLD {
        RiskLabel::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLabel::Medium
    } else {
        RiskLabel::Low
    }
}

pub fn predicted_dropout(score: f64) -> u8 {
    u8::from(score >= DROPOUT_THRESHOLD)
}

/// Derived fields for one scored row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_label: RiskLabel,
    pub predicted_dropout: u8,
}

impl RiskAssessment {
    pub fn from_score(risk_score: f64) -> Self {
        Self {
            risk_score,
            risk_label: score_to_label(risk_score),
            predicted_dropout: predicted_dropout(risk_score),
        }
    }
}
