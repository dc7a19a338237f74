//! Fit/transform feature pipeline
//!
//! Fitting computes scaling statistics and categorical level sets from the
//! training partition only; `transform` applies the already-fitted state to
//! any row subset. Test rows never influence the fitted state.

use super::{DerivedFeature, EncodedMatrix, FeatureSpec};
use crate::error::{AttritionError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scaling statistics for one numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleParams {
    pub mean: f64,
    pub std: f64,
}

/// Immutable state produced by fitting: the sole authority for transforming
/// both train and test partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedState {
    /// Per-column mean/std for numeric and derived columns
    scale: HashMap<String, ScaleParams>,
    /// Sorted level sets per categorical column; index 0 is the dropped
    /// reference level
    levels: HashMap<String, Vec<String>>,
    /// Final encoded column order
    columns: Vec<String>,
}

impl FittedState {
    /// Encoded column order, stable across transform calls
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Scaling statistics for a column, if it was fitted as numeric
    pub fn scale_params(&self, column: &str) -> Option<&ScaleParams> {
        self.scale.get(column)
    }

    /// Fitted level set for a categorical column
    pub fn levels(&self, column: &str) -> Option<&[String]> {
        self.levels.get(column).map(|v| v.as_slice())
    }
}

/// Deterministic feature engineering and scaling
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    spec: FeatureSpec,
}

impl FeaturePipeline {
    pub fn new(spec: FeatureSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    /// Fit on the given training rows and return their encoded matrix
    /// together with the fitted state.
    pub fn fit_transform(
        &self,
        df: &DataFrame,
        rows: &[usize],
    ) -> Result<(EncodedMatrix, FittedState)> {
        let raw = self.collect_raw(df, rows)?;

        let mut scale = HashMap::new();
        for name in self.scaled_column_names() {
            let values = raw
                .numeric
                .get(&name)
                .ok_or_else(|| AttritionError::Schema(format!("column '{}' not found", name)))?;
            scale.insert(name.clone(), compute_scale(values));
        }

        let mut levels = HashMap::new();
        for name in &self.spec.categorical {
            let values = raw
                .categorical
                .get(name)
                .ok_or_else(|| AttritionError::Schema(format!("column '{}' not found", name)))?;
            let mut unique: Vec<String> = values.to_vec();
            unique.sort();
            unique.dedup();
            if unique.is_empty() {
                return Err(AttritionError::Data(format!(
                    "categorical column '{}' has no values",
                    name
                )));
            }
            levels.insert(name.clone(), unique);
        }

        let columns = self.encoded_columns(&levels);
        let state = FittedState {
            scale,
            levels,
            columns,
        };

        let matrix = self.encode(&raw, rows.len(), &state)?;
        Ok((matrix, state))
    }

    /// Transform rows using only the already-fitted state.
    ///
    /// A categorical level unseen during fitting encodes as the all-zero
    /// vector, the same as the dropped reference level.
    pub fn transform(
        &self,
        df: &DataFrame,
        rows: &[usize],
        state: &FittedState,
    ) -> Result<EncodedMatrix> {
        let raw = self.collect_raw(df, rows)?;
        self.encode(&raw, rows.len(), state)
    }

    /// Column names that get scaled: declared numeric, then derived
    fn scaled_column_names(&self) -> Vec<String> {
        let mut names = self.spec.numeric.clone();
        names.extend(self.spec.derived.iter().map(|d| d.name().to_string()));
        names
    }

    fn encoded_columns(&self, levels: &HashMap<String, Vec<String>>) -> Vec<String> {
        let mut columns = self.scaled_column_names();
        for name in &self.spec.categorical {
            if let Some(lv) = levels.get(name) {
                // Skip the reference level
                for level in lv.iter().skip(1) {
                    columns.push(format!("{}_{}", name, level));
                }
            }
        }
        columns
    }

    fn encode(&self, raw: &RawColumns, n_rows: usize, state: &FittedState) -> Result<EncodedMatrix> {
        let columns = state.columns.clone();
        let mut values = Array2::zeros((n_rows, columns.len()));

        let mut col_idx = 0;
        for name in self.scaled_column_names() {
            let data = raw
                .numeric
                .get(&name)
                .ok_or_else(|| AttritionError::Schema(format!("column '{}' not found", name)))?;
            let params = state
                .scale
                .get(&name)
                .ok_or_else(|| AttritionError::NotFitted)?;
            for (row, &v) in data.iter().enumerate() {
                values[[row, col_idx]] = (v - params.mean) / params.std;
            }
            col_idx += 1;
        }

        for name in &self.spec.categorical {
            let data = raw
                .categorical
                .get(name)
                .ok_or_else(|| AttritionError::Schema(format!("column '{}' not found", name)))?;
            let lv = state
                .levels
                .get(name)
                .ok_or_else(|| AttritionError::NotFitted)?;
            let width = lv.len().saturating_sub(1);
            for (row, value) in data.iter().enumerate() {
                // Position 0 is the reference level and unseen levels match
                // nothing; both stay all-zero.
                if let Some(pos) = lv.iter().position(|l| l == value) {
                    if pos > 0 {
                        values[[row, col_idx + pos - 1]] = 1.0;
                    }
                }
            }
            col_idx += width;
        }

        Ok(EncodedMatrix { values, columns })
    }

    /// Pull the raw column values for the requested rows, computing derived
    /// features with the same pure definitions on every call.
    fn collect_raw(&self, df: &DataFrame, rows: &[usize]) -> Result<RawColumns> {
        let mut numeric = HashMap::new();
        let mut full_numeric: HashMap<String, Vec<f64>> = HashMap::new();

        for name in &self.spec.numeric {
            let full = numeric_column(df, name)?;
            numeric.insert(name.clone(), take_rows(&full, rows));
            full_numeric.insert(name.clone(), full);
        }

        for derived in &self.spec.derived {
            // Sources may be columns outside the declared numeric set
            for src in derived.sources() {
                if !full_numeric.contains_key(src) {
                    full_numeric.insert(src.to_string(), numeric_column(df, src)?);
                }
            }
            let values = compute_derived(derived, &full_numeric, rows);
            numeric.insert(derived.name().to_string(), values);
        }

        let mut categorical = HashMap::new();
        for name in &self.spec.categorical {
            let full = string_column(df, name)?;
            categorical.insert(name.clone(), take_rows(&full, rows));
        }

        Ok(RawColumns {
            numeric,
            categorical,
        })
    }
}

struct RawColumns {
    numeric: HashMap<String, Vec<f64>>,
    categorical: HashMap<String, Vec<String>>,
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .map_err(|_| AttritionError::Schema(format!("column '{}' not found", name)))?
        .as_materialized_series();
    let casted = series.cast(&DataType::Float64)?;
    let nulls = casted.null_count();
    if nulls > 0 {
        return Err(AttritionError::Data(format!(
            "column '{}' has {} null values",
            name, nulls
        )));
    }
    Ok(casted
        .f64()
        .map_err(|e| AttritionError::Data(e.to_string()))?
        .into_iter()
        .flatten()
        .collect())
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df
        .column(name)
        .map_err(|_| AttritionError::Schema(format!("column '{}' not found", name)))?
        .as_materialized_series();
    let casted = series.cast(&DataType::String)?;
    let nulls = casted.null_count();
    if nulls > 0 {
        return Err(AttritionError::Data(format!(
            "column '{}' has {} null values",
            name, nulls
        )));
    }
    Ok(casted
        .str()
        .map_err(|e| AttritionError::Data(e.to_string()))?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

fn take_rows<T: Clone>(full: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter().map(|&i| full[i].clone()).collect()
}

fn compute_derived(
    feature: &DerivedFeature,
    columns: &HashMap<String, Vec<f64>>,
    rows: &[usize],
) -> Vec<f64> {
    match feature {
        DerivedFeature::Ratio {
            numerator,
            denominator,
            ..
        } => {
            let num = &columns[numerator.as_str()];
            let den = &columns[denominator.as_str()];
            rows.iter()
                .map(|&i| if den[i] == 0.0 { 0.0 } else { num[i] / den[i] })
                .collect()
        }
        DerivedFeature::Squared { source, .. } => {
            let src = &columns[source.as_str()];
            rows.iter().map(|&i| src[i] * src[i]).collect()
        }
        DerivedFeature::ThresholdAbove { source, value, .. } => {
            let src = &columns[source.as_str()];
            rows.iter()
                .map(|&i| if src[i] > *value { 1.0 } else { 0.0 })
                .collect()
        }
        DerivedFeature::ThresholdBelow { source, value, .. } => {
            let src = &columns[source.as_str()];
            rows.iter()
                .map(|&i| if src[i] < *value { 1.0 } else { 0.0 })
                .collect()
        }
    }
}

fn compute_scale(values: &[f64]) -> ScaleParams {
    let n = values.len();
    if n == 0 {
        return ScaleParams { mean: 0.0, std: 1.0 };
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n < 2 {
        0.0
    } else {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    };
    ScaleParams {
        mean,
        std: if std == 0.0 { 1.0 } else { std },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSpec;

    fn spec() -> FeatureSpec {
        FeatureSpec::new(
            vec!["hours".to_string()],
            vec!["grade".to_string()],
            vec![DerivedFeature::ThresholdAbove {
                name: "long_hours".to_string(),
                source: "hours".to_string(),
                value: 200.0,
            }],
        )
    }

    fn frame() -> DataFrame {
        df!(
            "hours" => &[100.0, 150.0, 250.0, 300.0, 220.0, 120.0],
            "grade" => &["low", "high", "low", "medium", "high", "low"]
        )
        .unwrap()
    }

    #[test]
    fn test_fit_transform_column_order() {
        let df = frame();
        let pipeline = FeaturePipeline::new(spec());
        let (matrix, state) = pipeline.fit_transform(&df, &[0, 1, 2, 3]).unwrap();

        // hours, long_hours, grade_low (reference "high" dropped), grade_medium
        assert_eq!(
            state.columns(),
            &["hours", "long_hours", "grade_low", "grade_medium"]
        );
        assert_eq!(matrix.n_rows(), 4);
        assert_eq!(matrix.n_cols(), 4);
    }

    #[test]
    fn test_fit_uses_only_train_rows() {
        let df = frame();
        let pipeline = FeaturePipeline::new(spec());

        let (_, state_a) = pipeline.fit_transform(&df, &[0, 1, 2]).unwrap();
        // Same train rows, different frame tail must not matter
        let df_b = df!(
            "hours" => &[100.0, 150.0, 250.0, 9999.0, 9999.0, 9999.0],
            "grade" => &["low", "high", "low", "exotic", "exotic", "exotic"]
        )
        .unwrap();
        let (_, state_b) = pipeline.fit_transform(&df_b, &[0, 1, 2]).unwrap();

        let a = state_a.scale_params("hours").unwrap();
        let b = state_b.scale_params("hours").unwrap();
        assert_eq!(a.mean, b.mean);
        assert_eq!(a.std, b.std);
        assert_eq!(state_a.levels("grade"), state_b.levels("grade"));
    }

    #[test]
    fn test_scaled_train_columns_are_centered() {
        let df = frame();
        let pipeline = FeaturePipeline::new(spec());
        let rows: Vec<usize> = (0..6).collect();
        let (matrix, _) = pipeline.fit_transform(&df, &rows).unwrap();

        let mean: f64 = matrix.values.column(0).sum() / 6.0;
        assert!(mean.abs() < 1e-10);
    }

    #[test]
    fn test_unseen_level_encodes_all_zero() {
        let df = frame();
        let pipeline = FeaturePipeline::new(spec());
        let (_, state) = pipeline.fit_transform(&df, &[0, 1, 2, 3]).unwrap();

        let df_new = df!(
            "hours" => &[180.0],
            "grade" => &["unheard_of"]
        )
        .unwrap();
        let matrix = pipeline.transform(&df_new, &[0], &state).unwrap();
        // Both one-hot columns zero
        assert_eq!(matrix.values[[0, 2]], 0.0);
        assert_eq!(matrix.values[[0, 3]], 0.0);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = df!("hours" => &[1.0, 2.0]).unwrap();
        let pipeline = FeaturePipeline::new(spec());
        let err = pipeline.fit_transform(&df, &[0, 1]).unwrap_err();
        assert!(matches!(err, AttritionError::Schema(_)));
    }

    #[test]
    fn test_null_numeric_cell_is_data_error() {
        let df = df!(
            "hours" => &[Some(100.0), None, Some(250.0)],
            "grade" => &["low", "high", "low"]
        )
        .unwrap();
        let pipeline = FeaturePipeline::new(spec());
        let err = pipeline.fit_transform(&df, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, AttritionError::Data(_)));
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn test_null_categorical_cell_is_data_error() {
        let df = df!(
            "hours" => &[100.0, 150.0, 250.0],
            "grade" => &[Some("low"), None, Some("high")]
        )
        .unwrap();
        let pipeline = FeaturePipeline::new(spec());
        let err = pipeline.fit_transform(&df, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, AttritionError::Data(_)));
    }

    #[test]
    fn test_derived_is_pure_across_calls() {
        let df = frame();
        let pipeline = FeaturePipeline::new(spec());
        let (_, state) = pipeline.fit_transform(&df, &[0, 1, 2, 3]).unwrap();

        let first = pipeline.transform(&df, &[4, 5], &state).unwrap();
        let second = pipeline.transform(&df, &[4, 5], &state).unwrap();
        assert_eq!(first.values, second.values);
    }

    #[test]
    fn test_ratio_zero_denominator() {
        let df = df!(
            "a" => &[10.0, 20.0],
            "b" => &[2.0, 0.0]
        )
        .unwrap();
        let spec = FeatureSpec::new(
            vec!["a".to_string(), "b".to_string()],
            vec![],
            vec![DerivedFeature::Ratio {
                name: "a_per_b".to_string(),
                numerator: "a".to_string(),
                denominator: "b".to_string(),
            }],
        );
        let pipeline = FeaturePipeline::new(spec);
        let (matrix, state) = pipeline.fit_transform(&df, &[0, 1]).unwrap();
        // a_per_b raw values are [5.0, 0.0]; column exists and is finite
        let idx = state.columns().iter().position(|c| c == "a_per_b").unwrap();
        assert!(matrix.values.column(idx).iter().all(|v| v.is_finite()));
    }
}
