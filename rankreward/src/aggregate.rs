// src/aggregate.rs
//
// Aggregation policies used when a trace window is folded back into a single
// RewardCollection.
//
// - Reducer: capability trait (values -> one scalar)
// - AggregationMode: the built-in avg / max / min strategies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RewardError;

/// Reduces one named component's per-snapshot series to a single value.
///
/// Callers guarantee `values` is non-empty.
pub trait Reducer {
    fn reduce(&self, values: &[f64]) -> f64;
}

/// Built-in aggregation strategies for trace folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Arithmetic mean over the window.
    #[default]
    Avg,
    /// Largest value in the window.
    Max,
    /// Smallest value in the window.
    Min,
}

impl AggregationMode {
    /// Stable lowercase name (used in config and telemetry).
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Avg => "avg",
            AggregationMode::Max => "max",
            AggregationMode::Min => "min",
        }
    }

    /// Parse a mode name (case-insensitive). Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<AggregationMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg" | "mean" | "average" => Some(AggregationMode::Avg),
            "max" => Some(AggregationMode::Max),
            "min" => Some(AggregationMode::Min),
            _ => None,
        }
    }
}

impl Reducer for AggregationMode {
    fn reduce(&self, values: &[f64]) -> f64 {
        match self {
            AggregationMode::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregationMode::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationMode::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

impl<F> Reducer for F
where
    F: Fn(&[f64]) -> f64,
{
    fn reduce(&self, values: &[f64]) -> f64 {
        self(values)
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationMode {
    type Err = RewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregationMode::parse(s).ok_or_else(|| {
            RewardError::invalid(
                "mode",
                format!("unknown aggregation mode {s:?}; use avg, max or min"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_reducers() {
        let values = [2.0, -4.0, 8.0];
        assert!((AggregationMode::Avg.reduce(&values) - 2.0).abs() < 1e-12);
        assert_eq!(AggregationMode::Max.reduce(&values), 8.0);
        assert_eq!(AggregationMode::Min.reduce(&values), -4.0);
    }

    #[test]
    fn closures_are_reducers() {
        let last = |values: &[f64]| values.last().copied().unwrap_or(0.0);
        assert_eq!(last.reduce(&[1.0, 2.0, 3.0]), 3.0);
    }

    #[test]
    fn parse_names() {
        assert_eq!(AggregationMode::parse("AVG"), Some(AggregationMode::Avg));
        assert_eq!(AggregationMode::parse(" mean "), Some(AggregationMode::Avg));
        assert_eq!(AggregationMode::parse("max"), Some(AggregationMode::Max));
        assert_eq!(AggregationMode::parse("median"), None);

        assert_eq!("min".parse::<AggregationMode>(), Ok(AggregationMode::Min));
        assert!(matches!(
            "median".parse::<AggregationMode>(),
            Err(RewardError::InvalidArgument { field: "mode", .. })
        ));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&AggregationMode::Max).unwrap();
        assert_eq!(json, "\"max\"");
        let back: AggregationMode = serde_json::from_str("\"avg\"").unwrap();
        assert_eq!(back, AggregationMode::Avg);
        assert_eq!(AggregationMode::default().to_string(), "avg");
    }
}
