//! Hyperparameter grids
//!
//! A grid is an ordered list of named axes; candidates are enumerated in
//! odometer order with the last axis varying fastest. Selection ties are
//! broken by this enumeration order, so axis order is part of the contract.

use crate::error::{AttritionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Text(String),
    /// Explicit absence, e.g. unlimited tree depth
    None,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::None => write!(f, "none"),
        }
    }
}

/// Ordered axes of hyperparameter values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HyperparameterGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl HyperparameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis; enumeration varies later axes faster
    pub fn with_axis(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.axes.push((name.to_string(), values));
        self
    }

    pub fn with_floats(self, name: &str, values: &[f64]) -> Self {
        self.with_axis(name, values.iter().map(|&v| ParamValue::Float(v)).collect())
    }

    pub fn with_ints(self, name: &str, values: &[i64]) -> Self {
        self.with_axis(name, values.iter().map(|&v| ParamValue::Int(v)).collect())
    }

    pub fn with_texts(self, name: &str, values: &[&str]) -> Self {
        self.with_axis(
            name,
            values.iter().map(|&v| ParamValue::Text(v.into())).collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Number of candidates (product of axis sizes; empty axis gives zero)
    pub fn n_candidates(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, values)| values.len()).product()
    }

    /// Enumerate all candidates in odometer order
    pub fn candidates(&self) -> Vec<Candidate> {
        let n = self.n_candidates();
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return out;
        }

        let mut cursor = vec![0usize; self.axes.len()];
        loop {
            let params = self
                .axes
                .iter()
                .zip(cursor.iter())
                .map(|((name, values), &i)| (name.clone(), values[i].clone()))
                .collect();
            out.push(Candidate { params });

            // Advance the odometer, last axis fastest
            let mut axis = self.axes.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < self.axes[axis].1.len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }
}

/// One fully specified hyperparameter assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    params: Vec<(String, ParamValue)>,
}

impl Candidate {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            other => Err(self.type_error(name, "float", other)),
        }
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            other => Err(self.type_error(name, "int", other)),
        }
    }

    pub fn usize(&self, name: &str) -> Result<usize> {
        let v = self.int(name)?;
        usize::try_from(v).map_err(|_| AttritionError::InvalidParameter {
            name: name.into(),
            value: v.to_string(),
            reason: "must be non-negative".into(),
        })
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(ParamValue::Text(v)) => Ok(v),
            other => Err(self.type_error(name, "text", other)),
        }
    }

    /// Int axis where `None` means "unset", e.g. unlimited depth
    pub fn optional_usize(&self, name: &str) -> Result<Option<usize>> {
        match self.get(name) {
            Some(ParamValue::None) => Ok(None),
            _ => Ok(Some(self.usize(name)?)),
        }
    }

    fn type_error(&self, name: &str, wanted: &str, found: Option<&ParamValue>) -> AttritionError {
        AttritionError::InvalidParameter {
            name: name.into(),
            value: found.map_or_else(|| "missing".into(), |v| v.to_string()),
            reason: format!("expected {}", wanted),
        }
    }

    pub fn params(&self) -> &[(String, ParamValue)] {
        &self.params
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.params {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_count_is_axis_product() {
        let grid = HyperparameterGrid::new()
            .with_floats("c", &[0.001, 0.01, 0.1])
            .with_texts("penalty", &["l1", "l2"]);
        assert_eq!(grid.n_candidates(), 6);
        assert_eq!(grid.candidates().len(), 6);
    }

    #[test]
    fn test_last_axis_varies_fastest() {
        let grid = HyperparameterGrid::new()
            .with_floats("c", &[0.001, 0.01])
            .with_texts("penalty", &["l1", "l2"]);
        let candidates = grid.candidates();

        assert_eq!(candidates[0].float("c").unwrap(), 0.001);
        assert_eq!(candidates[0].text("penalty").unwrap(), "l1");
        assert_eq!(candidates[1].float("c").unwrap(), 0.001);
        assert_eq!(candidates[1].text("penalty").unwrap(), "l2");
        assert_eq!(candidates[2].float("c").unwrap(), 0.01);
        assert_eq!(candidates[2].text("penalty").unwrap(), "l1");
    }

    #[test]
    fn test_empty_axis_gives_no_candidates() {
        let grid = HyperparameterGrid::new()
            .with_ints("n", &[1, 2])
            .with_axis("depth", vec![]);
        assert_eq!(grid.n_candidates(), 0);
        assert!(grid.candidates().is_empty());
    }

    #[test]
    fn test_optional_usize_axis() {
        let grid = HyperparameterGrid::new().with_axis(
            "max_depth",
            vec![ParamValue::Int(10), ParamValue::None],
        );
        let candidates = grid.candidates();
        assert_eq!(candidates[0].optional_usize("max_depth").unwrap(), Some(10));
        assert_eq!(candidates[1].optional_usize("max_depth").unwrap(), None);
    }

    #[test]
    fn test_typed_getter_mismatch() {
        let grid = HyperparameterGrid::new().with_texts("penalty", &["l1"]);
        let candidate = &grid.candidates()[0];
        assert!(candidate.float("penalty").is_err());
        assert!(candidate.int("missing").is_err());
    }

    #[test]
    fn test_display_is_stable() {
        let grid = HyperparameterGrid::new()
            .with_floats("c", &[0.1])
            .with_texts("penalty", &["l2"]);
        assert_eq!(grid.candidates()[0].to_string(), "c=0.1, penalty=l2");
    }
}
