//! # harmonic-scanner
//!
//! Deterministic pattern scanner for OHLC candle series.
//!
//! Four detector families run over the same time-ordered candle sequence:
//!
//! - harmonic ratio geometry (Gartley, Butterfly, Bat, Crab and ABCD),
//! - multi-bar chart shapes (head and shoulders, triangles, wedges, flags,
//!   support/resistance clusters),
//! - single and two-candle formations,
//! - an indicator confirmation layer (RSI, MACD, Stochastic).
//!
//! Every detector emits the same [`PatternRecord`] schema. The scanner is
//! stateless: identical input always yields identical output.
//!
//! ## Quick Start
//!
//! ```rust
//! use harmonic_scanner::prelude::*;
//!
//! let candles: Vec<Candle> = (0..60)
//!     .map(|i| {
//!         let base = 100.0 + (i as f64 * 0.7).sin() * 4.0;
//!         Candle::new(i as i64 * 60_000, base, base + 1.0, base - 1.0, base + 0.2)
//!     })
//!     .collect();
//!
//! let scanner = ScannerBuilder::new()
//!     .symbol("EURUSD")
//!     .timeframe(Timeframe::H1)
//!     .market(Market::Forex)
//!     .build()
//!     .unwrap();
//!
//! let patterns = scanner.scan(&candles).unwrap();
//! assert!(patterns.iter().all(|p| p.confidence >= 0.1 && p.confidence <= 0.95));
//! ```

pub mod chart;
pub mod confirmation;
pub mod detectors;
pub mod extrema;
pub mod harmonic;
pub mod indicators;
pub mod params;
pub mod record;
pub mod scanner;

pub mod prelude {
    pub use crate::{
        // Detectors
        chart::{cluster_levels, ChartConfig, ChartShapeDetector, LevelCluster},
        confirmation::{
            ConfirmationConfig, ConfirmationResult, ConfirmationScorer, IndicatorReadings,
            MacdReading, RsiReading, StochasticReading,
        },
        detectors::*,
        extrema::{find_peaks, find_troughs, pivot_price, PricePoint},
        harmonic::{
            AbcdTemplate, HarmonicConfig, HarmonicFamily, HarmonicMatcher, RatioRange,
            RatioTemplate, RATIO_TOLERANCE,
        },
        // Parameters
        params::{get_multiple, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Records
        record::*,
        // Orchestration
        scanner::{
            scan_parallel, CandleSource, EnhancementConfig, Market, PatternScanner, ScanContext,
            ScanError, ScanOrder, ScanResult, ScannerBuilder, ScannerConfig, Timeframe,
        },
        // Core types
        validate_candles,
        Candle,
        Direction,
        OHLCVExt,
        // Errors
        PatternError,
        Period,
        Ratio,
        Result,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur while configuring or running a scan
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown harmonic family: {0}")]
    UnknownFamily(String),

    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Candles not ascending by time at index {index}")]
    UnsortedCandles { index: usize },

    #[error("Candle source failed for {symbol}: {message}")]
    Source { symbol: String, message: String },

    #[error("Scan cancelled")]
    Cancelled,
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    /// Epoch milliseconds of the bar open, when known
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. Returns None if range is ~0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    #[inline]
    fn upper_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.upper_shadow() / range)
    }

    #[inline]
    fn lower_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.lower_shadow() / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        if self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
        {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Check every bar for consistency and that timestamps, where present,
/// ascend strictly.
pub fn validate_candles<T: OHLCV>(bars: &[T]) -> Result<()> {
    let mut last_time: Option<i64> = None;
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            PatternError::InvalidOHLCV { reason, .. } => {
                PatternError::InvalidOHLCV { index: i, reason }
            }
            other => other,
        })?;
        if let Some(t) = bar.timestamp() {
            if matches!(last_time, Some(prev) if t <= prev) {
                return Err(PatternError::UnsortedCandles { index: i });
            }
            last_time = Some(t);
        }
    }
    Ok(())
}

// ============================================================
// CANDLE
// ============================================================

/// One price bar as delivered by the data collaborator
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    /// Epoch milliseconds
    pub time: i64,
    #[serde(default)]
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            symbol: String::new(),
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume.unwrap_or(0.0)
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.time)
    }
}

// ============================================================
// DIRECTION
// ============================================================

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    /// +1 for bullish, -1 for bearish, 0 for neutral
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Neutral => 0.0,
            Direction::Bearish => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Neutral => "neutral",
            Direction::Bearish => "bearish",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(100).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_ohlcv_ext() {
        let bar = Candle::new(0, 100.0, 110.0, 90.0, 105.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.upper_shadow(), 5.0);
        assert_eq!(bar.lower_shadow(), 10.0);
        assert!(bar.is_bullish());
        assert!(!bar.is_bearish());
        assert!((bar.body_ratio().unwrap() - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_zero_range_has_no_ratio() {
        let bar = Candle::new(0, 100.0, 100.0, 100.0, 100.0);
        assert!(bar.body_ratio().is_none());
        assert!(bar.upper_shadow_ratio().is_none());
    }

    #[test]
    fn test_validate_candles_reports_index() {
        let bars = vec![
            Candle::new(1, 100.0, 101.0, 99.0, 100.5),
            Candle::new(2, 100.0, 99.0, 101.0, 100.5),
        ];
        match validate_candles(&bars) {
            Err(PatternError::InvalidOHLCV { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_validate_candles_unsorted() {
        let bars = vec![
            Candle::new(5, 100.0, 101.0, 99.0, 100.5),
            Candle::new(3, 100.0, 101.0, 99.0, 100.5),
        ];
        assert!(matches!(
            validate_candles(&bars),
            Err(PatternError::UnsortedCandles { index: 1 })
        ));
    }

    #[test]
    fn test_candle_deserialize_without_volume() {
        let json = r#"{"time":1,"symbol":"BTCUSD","open":1.0,"high":2.0,"low":0.5,"close":1.5}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.volume, None);
        assert_eq!(OHLCV::volume(&candle), 0.0);
        assert_eq!(candle.symbol, "BTCUSD");
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Bullish.sign(), 1.0);
        assert_eq!(Direction::Bearish.sign(), -1.0);
        assert_eq!(Direction::Neutral.sign(), 0.0);
        assert_eq!(Direction::Bearish.to_string(), "bearish");
    }
}
