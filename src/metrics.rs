//! Evaluation of a fitted classifier on held-out rows.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub label: String,
    #[serde(flatten)]
    pub scores: Scores,
}

/// Per-class precision, recall and F1 with accuracy and the macro / support-weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub macro_avg: Scores,
    pub weighted_avg: Scores,
}

// Undefined ratios (nothing predicted / nothing present) count as 0.
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    pub fn new(y_true: &[usize], y_pred: &[usize], labels: &[&str]) -> Self {
        assert_eq!(y_true.len(), y_pred.len(), "prediction count must match target count");

        let classes = labels
            .iter()
            .enumerate()
            .map(|(class, label)| {
                let tp = y_true
                    .iter()
                    .zip(y_pred)
                    .filter(|&(&t, &p)| t == class && p == class)
                    .count();
                let predicted = y_pred.iter().filter(|&&p| p == class).count();
                let support = y_true.iter().filter(|&&t| t == class).count();

                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassScores {
                    label: label.to_string(),
                    scores: Scores { precision, recall, f1_score, support },
                }
            })
            .collect::<Vec<_>>();

        let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
        let total = y_true.len();

        let n = classes.len().max(1) as f64;
        let macro_avg = Scores {
            precision: classes.iter().map(|c| c.scores.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.scores.recall).sum::<f64>() / n,
            f1_score: classes.iter().map(|c| c.scores.f1_score).sum::<f64>() / n,
            support: total,
        };

        let weight = |f: fn(&Scores) -> f64| {
            classes
                .iter()
                .map(|c| f(&c.scores) * c.scores.support as f64)
                .sum::<f64>()
                / total.max(1) as f64
        };
        let weighted_avg = Scores {
            precision: weight(|s| s.precision),
            recall: weight(|s| s.recall),
            f1_score: weight(|s| s.f1_score),
            support: total,
        };

        Self {
            classes,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(Some("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support", width = width)?;
        writeln!(f)?;
        for class in &self.classes {
            let s = &class.scores;
            writeln!(f, "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}", class.label, s.precision, s.recall, s.f1_score, s.support, width = width)?;
        }
        writeln!(f)?;
        writeln!(f, "{:>width$} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.macro_avg.support, width = width)?;
        for (name, s) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(f, "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}", name, s.precision, s.recall, s.f1_score, s.support, width = width)?;
        }

        Ok(())
    }
}
