//! Dataset loading and cleaning glue
//!
//! The pipeline core operates on an in-memory table; how that table reaches
//! memory (CSV path, format quirks of the source HR extract) lives here.

use crate::error::{AttritionError, Result};
use ndarray::Array1;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Name of the binary label column (1 = left, 0 = stayed)
pub const LABEL_COLUMN: &str = "left";

/// Column renames applied to the raw HR extract (typos and casing in the source)
const RENAMES: &[(&str, &str)] = &[
    ("average_montly_hours", "average_monthly_hours"),
    ("Work_accident", "work_accident"),
    ("Department", "department"),
];

/// Load a CSV file into a DataFrame
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    info!(rows = df.height(), cols = df.width(), "loaded dataset");
    Ok(df)
}

/// Normalize column names and drop duplicate rows
pub fn clean(df: &DataFrame) -> Result<DataFrame> {
    let mut result = df.clone();

    for (from, to) in RENAMES {
        if result.column(from).is_ok() {
            result.rename(from, (*to).into())?;
        }
    }

    let before = result.height();
    let deduped = result.unique_stable(None, UniqueKeepStrategy::First, None)?;
    if deduped.height() < before {
        info!(dropped = before - deduped.height(), "removed duplicate rows");
    }

    Ok(deduped)
}

/// Verify every required column is present before any modeling starts
pub fn validate_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for name in required {
        if df.column(name).is_err() {
            return Err(AttritionError::Schema(format!(
                "required column '{}' not found",
                name
            )));
        }
    }
    Ok(())
}

/// Extract the binary label column as a 0/1 array
pub fn labels(df: &DataFrame, column: &str) -> Result<Array1<f64>> {
    let series = df
        .column(column)
        .map_err(|_| AttritionError::Schema(format!("label column '{}' not found", column)))?
        .as_materialized_series();

    let casted = series.cast(&DataType::Float64)?;
    let nulls = casted.null_count();
    if nulls > 0 {
        return Err(AttritionError::Schema(format!(
            "label column '{}' has {} null values",
            column, nulls
        )));
    }
    let values: Vec<f64> = casted
        .f64()
        .map_err(|e| AttritionError::Data(e.to_string()))?
        .into_iter()
        .flatten()
        .collect();

    if values.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(AttritionError::Schema(format!(
            "label column '{}' must be binary (0/1)",
            column
        )));
    }

    Ok(Array1::from_vec(values))
}
