//! Held-out evaluation: per-class precision/recall/F1 and ROC-AUC.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub total: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ClassificationReport {
    /// Builds the report for binary labels. Undefined ratios are 0.
    pub fn compute(y_true: &[u8], y_pred: &[u8]) -> Self {
        assert_eq!(
            y_true.len(),
            y_pred.len(),
            "predictions and labels must have same length"
        );

        let classes = [0u8, 1u8]
            .into_iter()
            .map(|label| {
                let tp = y_true
                    .iter()
                    .zip(y_pred)
                    .filter(|(&t, &p)| t == label && p == label)
                    .count();
                let predicted = y_pred.iter().filter(|&&p| p == label).count();
                let support = y_true.iter().filter(|&&t| t == label).count();

                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

        Self {
            classes,
            accuracy: ratio(correct, y_true.len()),
            total: y_true.len(),
        }
    }

    pub fn class(&self, label: u8) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }

    /// Unweighted mean of (precision, recall, f1) over classes.
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        let n = self.classes.len().max(1) as f64;
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            (acc.0 + c.precision, acc.1 + c.recall, acc.2 + c.f1)
        });
        (sum.0 / n, sum.1 / n, sum.2 / n)
    }

    /// Support-weighted mean of (precision, recall, f1) over classes.
    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        let total = self.total.max(1) as f64;
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            let w = c.support as f64;
            (
                acc.0 + w * c.precision,
                acc.1 + w * c.recall,
                acc.2 + w * c.f1,
            )
        });
        (sum.0 / total, sum.1 / total, sum.2 / total)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        let (p, r, f1) = self.macro_avg();
        writeln!(
            f,
            "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "macro avg", p, r, f1, self.total
        )?;
        let (p, r, f1) = self.weighted_avg();
        writeln!(
            f,
            "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "weighted avg", p, r, f1, self.total
        )
    }
}

/// Area under the ROC curve via the rank-sum statistic, with tied scores
/// sharing their average rank. `None` when only one class is present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    assert_eq!(
        y_true.len(),
        scores.len(),
        "scores and labels must have same length"
    );

    let positives = y_true.iter().filter(|&&t| t == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start + 1 ..= end share their mean.
        let average = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = average;
        }
        start = end;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&t, _)| t == 1)
        .map(|(_, &r)| r)
        .sum();

    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_per_class() {
        let y_true = [1, 1, 1, 0, 0, 0, 0, 0];
        let y_pred = [1, 1, 0, 1, 0, 0, 0, 0];
        let report = ClassificationReport::compute(&y_true, &y_pred);

        let positive = report.class(1).unwrap();
        assert!((positive.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((positive.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(positive.support, 3);

        let negative = report.class(0).unwrap();
        assert!((negative.precision - 0.8).abs() < 1e-12);
        assert!((negative.recall - 0.8).abs() < 1e-12);
        assert_eq!(negative.support, 5);

        assert!((report.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn undefined_precision_is_zero() {
        let report = ClassificationReport::compute(&[1, 0], &[0, 0]);
        let positive = report.class(1).unwrap();
        assert_eq!(positive.precision, 0.0);
        assert_eq!(positive.f1, 0.0);
    }

    #[test]
    fn report_renders_all_rows() {
        let report = ClassificationReport::compute(&[1, 0, 0], &[1, 0, 1]);
        let text = report.to_string();
        for row in ["precision", "accuracy", "macro avg", "weighted avg"] {
            assert!(text.contains(row), "missing {row} in\n{text}");
        }
    }

    #[test]
    fn auc_of_perfect_ranking_is_one() {
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn auc_of_reversed_ranking_is_zero() {
        let auc = roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn auc_counts_ties_as_half() {
        let auc = roc_auc(&[0, 1], &[0.5, 0.5]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);

        // One of four positive/negative pairs is misordered.
        let auc = roc_auc(&[0, 1, 0, 1], &[0.1, 0.35, 0.4, 0.8]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn auc_undefined_for_single_class() {
        assert_eq!(roc_auc(&[1, 1], &[0.2, 0.3]), None);
    }
}
