//! Feature declaration and encoding
//!
//! Provides the feature-engineering layer of the pipeline:
//! - Column declarations (numeric, categorical, derived)
//! - Derived features as pure functions of other columns
//! - Leakage-safe fit/transform with an explicit fitted state

mod pipeline;

pub use pipeline::{FeaturePipeline, FittedState, ScaleParams};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A feature computed from other columns.
///
/// Derived features are pure and order-independent; the same definition is
/// applied during both fit and transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DerivedFeature {
    /// numerator / denominator (0 where the denominator is 0)
    Ratio {
        name: String,
        numerator: String,
        denominator: String,
    },
    /// source squared
    Squared { name: String, source: String },
    /// 1.0 where source > value, else 0.0
    ThresholdAbove {
        name: String,
        source: String,
        value: f64,
    },
    /// 1.0 where source < value, else 0.0
    ThresholdBelow {
        name: String,
        source: String,
        value: f64,
    },
}

impl DerivedFeature {
    /// Output column name
    pub fn name(&self) -> &str {
        match self {
            DerivedFeature::Ratio { name, .. } => name,
            DerivedFeature::Squared { name, .. } => name,
            DerivedFeature::ThresholdAbove { name, .. } => name,
            DerivedFeature::ThresholdBelow { name, .. } => name,
        }
    }

    /// Input column names
    pub fn sources(&self) -> Vec<&str> {
        match self {
            DerivedFeature::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator, denominator],
            DerivedFeature::Squared { source, .. } => vec![source],
            DerivedFeature::ThresholdAbove { source, .. } => vec![source],
            DerivedFeature::ThresholdBelow { source, .. } => vec![source],
        }
    }
}

/// Declares the columns of a dataset and how to encode them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Numeric columns, used as-is (then scaled)
    pub numeric: Vec<String>,
    /// Categorical columns, one-hot encoded with one reference level dropped
    pub categorical: Vec<String>,
    /// Features computed from other columns
    pub derived: Vec<DerivedFeature>,
}

impl FeatureSpec {
    pub fn new(
        numeric: Vec<String>,
        categorical: Vec<String>,
        derived: Vec<DerivedFeature>,
    ) -> Self {
        Self {
            numeric,
            categorical,
            derived,
        }
    }

    /// The feature spec for the HR turnover dataset: raw columns plus the
    /// engineered satisfaction/workload features.
    pub fn hr_default() -> Self {
        let strings = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            numeric: strings(&[
                "satisfaction_level",
                "last_evaluation",
                "number_project",
                "average_monthly_hours",
                "time_spend_company",
                "work_accident",
                "promotion_last_5years",
            ]),
            categorical: strings(&["department", "salary"]),
            derived: vec![
                DerivedFeature::Squared {
                    name: "satisfaction_squared".to_string(),
                    source: "satisfaction_level".to_string(),
                },
                DerivedFeature::Ratio {
                    name: "hours_per_project".to_string(),
                    numerator: "average_monthly_hours".to_string(),
                    denominator: "number_project".to_string(),
                },
                DerivedFeature::ThresholdAbove {
                    name: "overworked".to_string(),
                    source: "average_monthly_hours".to_string(),
                    value: 240.0,
                },
                DerivedFeature::ThresholdBelow {
                    name: "underworked".to_string(),
                    source: "average_monthly_hours".to_string(),
                    value: 160.0,
                },
            ],
        }
    }

    /// All raw columns this declaration reads from the dataset
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.numeric.iter().map(|s| s.as_str()).collect();
        cols.extend(self.categorical.iter().map(|s| s.as_str()));
        for d in &self.derived {
            for src in d.sources() {
                if !cols.contains(&src) {
                    cols.push(src);
                }
            }
        }
        cols
    }
}

/// A fixed-width numeric matrix with its recorded column order
#[derive(Debug, Clone)]
pub struct EncodedMatrix {
    pub values: Array2<f64>,
    pub columns: Vec<String>,
}

impl EncodedMatrix {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hr_default_spec() {
        let spec = FeatureSpec::hr_default();
        assert_eq!(spec.numeric.len(), 7);
        assert_eq!(spec.categorical.len(), 2);
        assert_eq!(spec.derived.len(), 4);
    }

    #[test]
    fn test_required_columns_deduplicates_sources() {
        let spec = FeatureSpec::hr_default();
        let cols = spec.required_columns();
        // Derived sources are all declared numeric columns already
        assert_eq!(cols.len(), 9);
        assert!(cols.contains(&"satisfaction_level"));
        assert!(cols.contains(&"salary"));
    }

    #[test]
    fn test_derived_names() {
        let d = DerivedFeature::Ratio {
            name: "hours_per_project".to_string(),
            numerator: "average_monthly_hours".to_string(),
            denominator: "number_project".to_string(),
        };
        assert_eq!(d.name(), "hours_per_project");
        assert_eq!(d.sources().len(), 2);
    }
}
