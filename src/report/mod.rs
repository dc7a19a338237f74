//! Cross-model comparison report
//!
//! Rows keep the order families were added in; the table is a left-to-right
//! comparison, not a leaderboard.

use crate::eval::MetricSet;
use serde::{Deserialize, Serialize};

pub const CSV_HEADER: &str = "Model,Accuracy,Precision,Recall,F1-Score,ROC-AUC";

/// One family's row in the comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub model: String,
    pub metrics: MetricSet,
}

impl SummaryRow {
    fn render(&self) -> String {
        format!(
            "{},{:.3},{:.3},{:.3},{:.3},{:.3}",
            self.model,
            self.metrics.accuracy,
            self.metrics.precision,
            self.metrics.recall,
            self.metrics.f1,
            self.metrics.roc_auc
        )
    }
}

/// Collects per-family metrics into one table
#[derive(Debug, Clone, Default)]
pub struct ReportAggregator {
    rows: Vec<SummaryRow>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, model: &str, metrics: MetricSet) {
        self.rows.push(SummaryRow {
            model: model.to_string(),
            metrics,
        });
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row with the highest value of the given metric accessor; ties go to
    /// the earlier row
    pub fn best_by<F>(&self, metric: F) -> Option<&SummaryRow>
    where
        F: Fn(&MetricSet) -> f64,
    {
        let mut best: Option<&SummaryRow> = None;
        for row in &self.rows {
            if best.map_or(true, |b| metric(&row.metrics) > metric(&b.metrics)) {
                best = Some(row);
            }
        }
        best
    }

    /// Render the table as CSV with 3-decimal metric formatting
    pub fn render_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.render());
            out.push('\n');
        }
        out
    }
}
