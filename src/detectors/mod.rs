//! Candlestick formation detectors
//!
//! # Formations
//!
//! - **Single-candle (4)**: Doji (with subtype), Hammer / Hanging Man,
//!   Shooting Star, Marubozu
//! - **Two-candle (4)**: Engulfing, Harami, Piercing, Dark Cloud Cover
//!
//! Rules are independent: one candle may produce several records.

use crate::record::PatternRecord;
use crate::{Result, OHLCV};

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
    ($($detector:ty),* $(,)?) => {
        $(impl $detector {
            pub fn with_defaults() -> Self {
                Self::default()
            }
        })*
    };
}

pub mod single_bar;
pub mod two_bar;

pub use single_bar::*;
pub use two_bar::*;

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// Candle formation detector
pub trait PatternDetector: Send + Sync {
    /// Formation family name
    fn id(&self) -> &'static str;
    /// Candles needed up to and including `index`
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, index)),*
                }
            }

            #[inline]
            pub fn id(&self) -> &'static str {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Single candle
    Doji(DojiDetector),
    Hammer(HammerDetector),
    ShootingStar(ShootingStarDetector),
    Marubozu(MarubozuDetector),

    // Two candle
    Engulfing(EngulfingDetector),
    Harami(HaramiDetector),
    Piercing(PiercingDetector),
    DarkCloudCover(DarkCloudCoverDetector),
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
    ($($variant:ident),* $(,)?) => {
        [$(BuiltinDetector::$variant(Default::default())),*]
    };
}

// ============================================================
// CLASSIFIER
// ============================================================

/// Runs a set of candle detectors over every bar
#[derive(Debug, Clone)]
pub struct CandlestickClassifier {
    detectors: Vec<BuiltinDetector>,
}

impl Default for CandlestickClassifier {
    fn default() -> Self {
        Self {
            detectors: ClassifierBuilder::new().with_all_defaults().detectors,
        }
    }
}

impl CandlestickClassifier {
    pub fn builder() -> ClassifierBuilder {
        ClassifierBuilder::new()
    }

    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.detectors
    }

    /// Detect formations at a single bar index
    pub fn scan_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Vec<PatternRecord> {
        self.detectors
            .iter()
            .filter(|d| index + 1 >= d.min_bars())
            .filter_map(|d| d.detect(bars, index))
            .collect()
    }

    /// Every formation from the second bar onwards; fewer than two bars
    /// yields nothing.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternRecord> {
        if bars.len() < 2 {
            return Vec::new();
        }
        (1..bars.len())
            .flat_map(|i| self.scan_at(bars, i))
            .collect()
    }
}

/// Builder for [`CandlestickClassifier`]
#[derive(Debug, Clone, Default)]
pub struct ClassifierBuilder {
    detectors: Vec<BuiltinDetector>,
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every builtin formation with default thresholds
    pub fn with_all_defaults(self) -> Self {
        self.with_single_bar_defaults().with_two_bar_defaults()
    }

    pub fn with_single_bar_defaults(mut self) -> Self {
        self.detectors
            .extend(builtin_defaults![Doji, Hammer, ShootingStar, Marubozu]);
        self
    }

    pub fn with_two_bar_defaults(mut self) -> Self {
        self.detectors
            .extend(builtin_defaults![Engulfing, Harami, Piercing, DarkCloudCover]);
        self
    }

    /// Add a detector, validating its thresholds
    pub fn add(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.detectors.push(detector);
        Ok(self)
    }

    pub fn build(self) -> Result<CandlestickClassifier> {
        for d in &self.detectors {
            d.validate_config()?;
        }
        Ok(CandlestickClassifier {
            detectors: self.detectors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    #[test]
    fn test_all_defaults_count() {
        let classifier = CandlestickClassifier::default();
        assert_eq!(classifier.detectors().len(), 8);
    }

    #[test]
    fn test_single_bar_input_is_empty() {
        let bars = vec![Candle::new(0, 100.0, 100.5, 99.5, 100.0)];
        assert!(CandlestickClassifier::default().scan(&bars).is_empty());
    }

    #[test]
    fn test_rules_are_not_exclusive() {
        // Marubozu that also engulfs the prior candle
        let bars = vec![
            Candle::new(0, 110.0, 111.0, 99.0, 100.0),
            Candle::new(1, 99.0, 112.0, 99.0, 112.0),
        ];
        let records = CandlestickClassifier::default().scan(&bars);
        let names: Vec<_> = records.iter().map(|r| r.name()).collect();
        assert!(names.contains(&"marubozu"));
        assert!(names.contains(&"engulfing"));
        assert!(records.iter().all(|r| r.timestamp == 1));
    }

    #[test]
    fn test_builder_rejects_bad_threshold() {
        let result = ClassifierBuilder::new().add(BuiltinDetector::Engulfing(EngulfingDetector {
            min_engulf_multiple: f64::NAN,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_subset() {
        let classifier = ClassifierBuilder::new()
            .add(BuiltinDetector::Doji(DojiDetector::with_defaults()))
            .unwrap()
            .build()
            .unwrap();
        let bars = vec![
            Candle::new(0, 100.0, 101.0, 99.0, 100.5),
            Candle::new(1, 100.0, 100.5, 99.5, 100.0),
        ];
        let records = classifier.scan(&bars);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "doji");
    }
}
