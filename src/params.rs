//! Parameter metadata for candlestick detectors
//!
//! This module describes the tunable thresholds of each candle formation,
//! enabling:
//! - Grid search over thresholds
//! - Parameter documentation
//! - Building detectors from loosely typed settings maps
//!
//! # Example
//!
//! ```rust
//! use harmonic_scanner::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use harmonic_scanner::prelude::*;
//!
//! // Get parameter metadata for a detector
//! let params = EngulfingDetector::param_meta();
//! for param in params {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{PatternError, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Fraction of a candle measure, 0.0..=1.0
    Ratio,
    /// Positive multiplier, may exceed 1.0 (e.g. shadow ≥ 2× body)
    Multiple,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
    /// Parameter name (e.g., "min_engulf_multiple")
    pub name: &'static str,
    pub param_type: ParamType,
    pub default: f64,
    /// Range for optimization: (min, max, step)
    pub range: (f64, f64, f64),
    pub description: &'static str,
}

impl ParamMeta {
    /// Create a new ParamMeta for a Ratio parameter
    pub const fn ratio(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Ratio,
            default,
            range,
            description,
        }
    }

    /// Create a new ParamMeta for a Multiple parameter
    pub const fn multiple(
        name: &'static str,
        default: f64,
        range: (f64, f64, f64),
        description: &'static str,
    ) -> Self {
        Self {
            name,
            param_type: ParamType::Multiple,
            default,
            range,
            description,
        }
    }

    /// Generate all values for grid search
    pub fn generate_grid(&self) -> Vec<f64> {
        let (min, max, step) = self.range;
        let mut values = Vec::new();
        let mut v = min;
        while v <= max + f64::EPSILON {
            values.push(v);
            v += step;
        }
        values
    }

    /// Validate a value for this parameter
    pub fn validate(&self, value: f64) -> Result<()> {
        let (min, max, _) = self.range;
        if value < min || value > max {
            return Err(PatternError::OutOfRange {
                field: self.name,
                value,
                min,
                max,
            });
        }
        match self.param_type {
            ParamType::Ratio => Ratio::new(value).map(|_| ()),
            ParamType::Multiple => {
                if value <= 0.0 {
                    return Err(PatternError::InvalidValue("Multiple must be > 0"));
                }
                Ok(())
            }
        }
    }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that support parameterization
pub trait ParameterizedDetector: Sized {
    /// Returns metadata for all configurable parameters
    fn param_meta() -> &'static [ParamMeta];

    /// Creates a detector with parameters from a HashMap
    ///
    /// Missing parameters use their default values.
    fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

    /// Formation name emitted by the detector
    fn pattern_name() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
    let value = params.get(key).copied().unwrap_or(default);
    Ratio::new(value)
}

/// Helper to get a positive finite multiplier from params with default fallback
pub fn get_multiple(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
    let value = params.get(key).copied().unwrap_or(default);
    if !value.is_finite() || value <= 0.0 {
        return Err(PatternError::InvalidValue("Multiple must be finite and > 0"));
    }
    Ok(value)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_meta_ratio() {
        let meta = ParamMeta::ratio("test_ratio", 0.5, (0.3, 0.7, 0.1), "Test ratio parameter");

        assert_eq!(meta.name, "test_ratio");
        assert_eq!(meta.param_type, ParamType::Ratio);
        assert_eq!(meta.default, 0.5);
    }

    #[test]
    fn test_generate_grid() {
        let meta = ParamMeta::multiple("test", 1.5, (1.0, 2.0, 0.5), "Test");

        let grid = meta.generate_grid();
        assert_eq!(grid.len(), 3);
        assert!((grid[0] - 1.0).abs() < f64::EPSILON);
        assert!((grid[1] - 1.5).abs() < f64::EPSILON);
        assert!((grid[2] - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_ratio() {
        let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.1), "Test");

        assert!(meta.validate(0.5).is_ok());
        assert!(meta.validate(0.3).is_ok());
        assert!(meta.validate(0.2).is_err());
        assert!(meta.validate(0.8).is_err());
    }

    #[test]
    fn test_validate_multiple() {
        let meta = ParamMeta::multiple("test", 2.0, (1.0, 3.0, 0.5), "Test");

        assert!(meta.validate(2.0).is_ok());
        assert!(meta.validate(0.5).is_err());
        assert!(meta.validate(3.5).is_err());
    }

    #[test]
    fn test_get_ratio_helper() {
        let mut params = HashMap::new();
        params.insert("key1", 0.8);

        assert!((get_ratio(&params, "key1", 0.5).unwrap().get() - 0.8).abs() < f64::EPSILON);
        assert!((get_ratio(&params, "key2", 0.5).unwrap().get() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_multiple_helper() {
        let mut params = HashMap::new();
        params.insert("shadow", 3.0);
        params.insert("neg", -1.0);

        assert_eq!(get_multiple(&params, "shadow", 2.0).unwrap(), 3.0);
        assert_eq!(get_multiple(&params, "missing", 2.0).unwrap(), 2.0);
        assert!(get_multiple(&params, "neg", 2.0).is_err());
    }
}
