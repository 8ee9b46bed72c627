//! Scan orchestration: runs every detector family over one candle series,
//! tags and enhances the records, and drives multi-symbol scans.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chart::{ChartConfig, ChartShapeDetector};
use crate::confirmation::{ConfirmationConfig, ConfirmationScorer};
use crate::detectors::CandlestickClassifier;
use crate::harmonic::{HarmonicConfig, HarmonicMatcher};
use crate::indicators::atr;
use crate::record::PatternRecord;
use crate::{validate_candles, Candle, Direction, PatternError, Period, Result, OHLCV};

/// Confidence bounds applied after enhancement
pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 0.95;

const BASE_CONFIDENCE: f64 = 0.5;
const HARMONIC_BONUS: f64 = 0.2;
const HEAD_AND_SHOULDERS_BONUS: f64 = 0.15;
const DOJI_BONUS: f64 = 0.1;
const VOLUME_BONUS: f64 = 0.1;

// ============================================================
// MARKETS / TIMEFRAMES
// ============================================================

/// Asset class with its default watch-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Forex,
    Crypto,
    Metals,
    Stocks,
}

impl Market {
    pub const ALL: [Market; 4] = [Market::Forex, Market::Crypto, Market::Metals, Market::Stocks];

    pub fn as_str(self) -> &'static str {
        match self {
            Market::Forex => "forex",
            Market::Crypto => "crypto",
            Market::Metals => "metals",
            Market::Stocks => "stocks",
        }
    }

    /// Default symbols scanned for this market
    pub fn symbols(self) -> &'static [&'static str] {
        match self {
            Market::Forex => &["EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD", "EURGBP", "EURJPY"],
            Market::Crypto => &["BTCUSD", "ETHUSD", "XRPUSD", "LTCUSD", "BCHUSD", "ADAUSD", "DOTUSD"],
            Market::Metals => &["XAUUSD", "XAGUSD", "XPTUSD", "XPDUSD"],
            Market::Stocks => &["AAPL", "MSFT", "GOOGL", "AMZN", "FB", "TSLA", "NVDA"],
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        Market::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PatternError::UnknownMarket(s.to_string()))
    }
}

/// Candle interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Length of one candle in minutes
    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Length of one candle in epoch milliseconds
    pub fn millis(self) -> i64 {
        i64::from(self.minutes()) * 60_000
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim();
        Timeframe::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(key))
            .ok_or_else(|| PatternError::UnknownTimeframe(s.to_string()))
    }
}

// ============================================================
// CONFIG
// ============================================================

/// Output ordering of a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Detector order: harmonic, chart, candlestick
    #[default]
    Unsorted,
    ConfidenceDesc,
    TimestampDesc,
}

/// Stop/target sizing and confidence heuristic settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub atr_period: Period,
    /// Stop distance from the PRZ in ATRs
    pub stop_atr_multiple: f64,
    /// Take-profit distance from the PRZ in ATRs
    pub take_profit_atr_multiple: f64,
    /// ATR used when history is too short or flat
    pub atr_fallback: f64,
    pub volume_lookback: Period,
    /// Volume above this multiple of the trailing average earns a bonus
    pub volume_multiple: f64,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            atr_period: Period::new_const(14),
            stop_atr_multiple: 1.5,
            take_profit_atr_multiple: 2.0,
            atr_fallback: 0.001,
            volume_lookback: Period::new_const(20),
            volume_multiple: 1.5,
        }
    }
}

impl EnhancementConfig {
    pub fn validate(&self) -> Result<()> {
        let multiples = [
            ("stop_atr_multiple", self.stop_atr_multiple),
            ("take_profit_atr_multiple", self.take_profit_atr_multiple),
            ("atr_fallback", self.atr_fallback),
            ("volume_multiple", self.volume_multiple),
        ];
        for (field, value) in multiples {
            if !value.is_finite() || value <= 0.0 {
                return Err(PatternError::OutOfRange {
                    field,
                    value,
                    min: f64::MIN_POSITIVE,
                    max: f64::MAX,
                });
            }
        }
        Ok(())
    }
}

/// Full scanner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub harmonic: HarmonicConfig,
    pub chart: ChartConfig,
    pub confirmation: ConfirmationConfig,
    pub enhancement: EnhancementConfig,
    /// Reject malformed or unordered candles instead of scanning them
    pub validate_data: bool,
    pub min_confidence: Option<f64>,
    /// Pattern names to keep; `None` keeps everything
    pub pattern_filter: Option<Vec<String>>,
    pub order: ScanOrder,
}

impl ScannerConfig {
    pub fn validate(&self) -> Result<()> {
        self.harmonic.validate()?;
        self.chart.validate()?;
        self.confirmation.validate()?;
        self.enhancement.validate()?;
        if let Some(min) = self.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(PatternError::OutOfRange {
                    field: "min_confidence",
                    value: min,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }
}

/// Labels attached to every record of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub symbol: String,
    pub timeframe: Option<Timeframe>,
    pub market: Option<Market>,
}

// ============================================================
// CANDLE SOURCE
// ============================================================

/// Supplies candles for a symbol; implemented by any matching closure
pub trait CandleSource {
    fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>>;
}

impl<F> CandleSource for F
where
    F: Fn(&str, Timeframe) -> Result<Vec<Candle>>,
{
    fn fetch(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>> {
        self(symbol, timeframe)
    }
}

/// Result of scanning a single symbol
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<PatternRecord>,
}

/// Error from scanning a single symbol
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

// ============================================================
// PATTERN SCANNER
// ============================================================

/// Runs harmonic, chart and candlestick detection over one series
#[derive(Debug, Clone)]
pub struct PatternScanner {
    harmonic: HarmonicMatcher,
    chart: ChartShapeDetector,
    candles: CandlestickClassifier,
    scorer: ConfirmationScorer,
    context: ScanContext,
    config: ScannerConfig,
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self {
            harmonic: HarmonicMatcher::default(),
            chart: ChartShapeDetector::default(),
            candles: CandlestickClassifier::default(),
            scorer: ConfirmationScorer::default(),
            context: ScanContext::default(),
            config: ScannerConfig::default(),
        }
    }
}

impl PatternScanner {
    pub fn builder() -> ScannerBuilder {
        ScannerBuilder::new()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn context(&self) -> &ScanContext {
        &self.context
    }

    /// Scan one candle series, tagging records with this scanner's context
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternRecord>> {
        self.scan_with(bars, &self.context)
    }

    /// Scan one candle series under an explicit context
    pub fn scan_with<T: OHLCV>(&self, bars: &[T], ctx: &ScanContext) -> Result<Vec<PatternRecord>> {
        if self.config.validate_data {
            validate_candles(bars)?;
        }

        let harmonic = self.harmonic.scan(bars);
        let chart = self.chart.scan(bars);
        let candles = self.candles.scan(bars);
        debug!(
            symbol = %ctx.symbol,
            candles = bars.len(),
            harmonic = harmonic.len(),
            chart = chart.len(),
            candlestick = candles.len(),
            "detectors finished"
        );

        let mut records: Vec<PatternRecord> = harmonic
            .into_iter()
            .chain(chart)
            .chain(candles)
            .map(|r| self.enhance(r, bars, ctx))
            .filter(|r| {
                let finite = r.is_finite();
                if !finite {
                    warn!(symbol = %ctx.symbol, pattern = r.name(), "dropping record with non-finite fields");
                }
                finite
            })
            .filter(|r| self.should_include(r))
            .collect();

        Self::sort_records(&mut records, self.config.order);
        debug!(symbol = %ctx.symbol, patterns = records.len(), "scan finished");
        Ok(records)
    }

    /// Fetch and scan each symbol in turn.
    ///
    /// `cancel` is checked before every symbol; once set, the loop stops and
    /// a `Cancelled` error is recorded for the first skipped symbol.
    /// Per-symbol failures are collected without stopping the loop.
    pub fn scan_symbols<S, I>(
        &self,
        source: &S,
        symbols: I,
        timeframe: Timeframe,
        market: Market,
        cancel: &AtomicBool,
    ) -> (Vec<ScanResult>, Vec<ScanError>)
    where
        S: CandleSource + ?Sized,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut successes = Vec::new();
        let mut errors = Vec::new();

        for symbol in symbols {
            let symbol = symbol.as_ref();
            if cancel.load(Ordering::Relaxed) {
                debug!(symbol, "scan cancelled");
                errors.push(ScanError {
                    symbol: symbol.to_string(),
                    error: PatternError::Cancelled,
                });
                break;
            }

            let ctx = ScanContext {
                symbol: symbol.to_string(),
                timeframe: Some(timeframe),
                market: Some(market),
            };
            let result = source
                .fetch(symbol, timeframe)
                .map_err(|e| match e {
                    PatternError::Source { .. } => e,
                    other => PatternError::Source {
                        symbol: symbol.to_string(),
                        message: other.to_string(),
                    },
                })
                .and_then(|bars| self.scan_with(&bars, &ctx));

            match result {
                Ok(patterns) => successes.push(ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                }),
                Err(error) => {
                    warn!(symbol, %error, "symbol scan failed");
                    errors.push(ScanError {
                        symbol: symbol.to_string(),
                        error,
                    });
                }
            }
        }

        (successes, errors)
    }

    /// Scan the default watch-list of `market`
    pub fn scan_market<S: CandleSource + ?Sized>(
        &self,
        source: &S,
        timeframe: Timeframe,
        market: Market,
        cancel: &AtomicBool,
    ) -> (Vec<ScanResult>, Vec<ScanError>) {
        self.scan_symbols(source, market.symbols(), timeframe, market, cancel)
    }

    /// Tag a detector record and derive its risk levels and confidence
    pub fn enhance<T: OHLCV>(&self, record: PatternRecord, bars: &[T], ctx: &ScanContext) -> PatternRecord {
        let mut record = record;
        record.symbol = ctx.symbol.clone();
        record.timeframe = ctx.timeframe;
        record.market = ctx.market;
        if bars.is_empty() {
            return record;
        }

        let end = record.end_index.min(bars.len() - 1);
        let history = &bars[..=end];
        if let Some(t) = bars[end].timestamp() {
            record.timestamp = t;
        }

        let e = &self.config.enhancement;
        let atr = atr(history, e.atr_period.get())
            .filter(|v| v.is_finite() && *v > f64::EPSILON)
            .unwrap_or(e.atr_fallback);
        // Neutral records are sized like bullish ones
        let sign = if record.direction == Direction::Bearish { -1.0 } else { 1.0 };
        let stop = record.prz - sign * e.stop_atr_multiple * atr;
        let take_profit = record.prz + sign * e.take_profit_atr_multiple * atr;
        let risk = (record.prz - stop).abs();
        record.stop_loss = stop;
        record.take_profit = Some(take_profit);
        record.risk_reward_ratio = Some(if risk > 0.0 {
            (take_profit - record.prz).abs() / risk
        } else {
            0.0
        });

        record.confidence = self.heuristic_confidence(&record, history);
        if record.confirmation.is_none() {
            record.confirmation = Some(self.scorer.score_at(record.direction, bars, end));
        }
        record
    }

    fn heuristic_confidence<T: OHLCV>(&self, record: &PatternRecord, history: &[T]) -> f64 {
        let mut confidence = BASE_CONFIDENCE;
        if record.pattern.is_classic_harmonic() {
            confidence += HARMONIC_BONUS;
        }
        if record.pattern.is_head_and_shoulders() {
            confidence += HEAD_AND_SHOULDERS_BONUS;
        }
        if record.pattern.is_doji() {
            confidence += DOJI_BONUS;
        }
        if self.volume_spike(history) {
            confidence += VOLUME_BONUS;
        }
        confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }

    /// Last bar's volume against the average of the preceding lookback bars
    fn volume_spike<T: OHLCV>(&self, history: &[T]) -> bool {
        let e = &self.config.enhancement;
        let Some((last, before)) = history.split_last() else {
            return false;
        };
        let lookback = e.volume_lookback.get();
        if before.len() < lookback {
            return false;
        }
        let window = &before[before.len() - lookback..];
        let average = window.iter().map(|b| b.volume()).sum::<f64>() / window.len() as f64;
        average > 0.0 && last.volume() > average * e.volume_multiple
    }

    fn should_include(&self, record: &PatternRecord) -> bool {
        if let Some(min) = self.config.min_confidence {
            if record.confidence < min {
                return false;
            }
        }
        if let Some(ref filter) = self.config.pattern_filter {
            if !filter.iter().any(|name| name == "all" || name == record.name()) {
                return false;
            }
        }
        true
    }

    // ===========================================
    // Result utilities
    // ===========================================

    /// Records named `pattern`; `"all"` keeps everything
    pub fn filter_by_pattern(records: &[PatternRecord], pattern: &str) -> Vec<PatternRecord> {
        records
            .iter()
            .filter(|r| pattern == "all" || r.name() == pattern)
            .cloned()
            .collect()
    }

    /// Number of records per pattern name
    pub fn count_by_pattern(records: &[PatternRecord]) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for r in records {
            *counts.entry(r.name()).or_insert(0) += 1;
        }
        counts
    }

    /// Stable sort; ties keep detector order
    pub fn sort_records(records: &mut [PatternRecord], order: ScanOrder) {
        match order {
            ScanOrder::Unsorted => {}
            ScanOrder::ConfidenceDesc => {
                records.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            }
            ScanOrder::TimestampDesc => records.sort_by_key(|r| Reverse(r.timestamp)),
        }
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`PatternScanner`]
#[derive(Debug, Clone, Default)]
pub struct ScannerBuilder {
    config: ScannerConfig,
    context: ScanContext,
    candles: Option<CandlestickClassifier>,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.context.symbol = symbol.into();
        self
    }

    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.context.timeframe = Some(timeframe);
        self
    }

    pub fn market(mut self, market: Market) -> Self {
        self.context.market = Some(market);
        self
    }

    pub fn harmonic(mut self, harmonic: HarmonicConfig) -> Self {
        self.config.harmonic = harmonic;
        self
    }

    pub fn chart(mut self, chart: ChartConfig) -> Self {
        self.config.chart = chart;
        self
    }

    pub fn confirmation(mut self, confirmation: ConfirmationConfig) -> Self {
        self.config.confirmation = confirmation;
        self
    }

    pub fn enhancement(mut self, enhancement: EnhancementConfig) -> Self {
        self.config.enhancement = enhancement;
        self
    }

    /// Use a custom candlestick detector set instead of all builtins
    pub fn candlesticks(mut self, classifier: CandlestickClassifier) -> Self {
        self.candles = Some(classifier);
        self
    }

    /// Set minimum confidence filter
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.config.min_confidence = Some(confidence);
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Filter to specific pattern names only
    pub fn only_patterns<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.config.pattern_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn order(mut self, order: ScanOrder) -> Self {
        self.config.order = order;
        self
    }

    /// Build the scanner
    pub fn build(self) -> Result<PatternScanner> {
        self.config.validate()?;
        let scorer = ConfirmationScorer::new(self.config.confirmation.clone())?;
        Ok(PatternScanner {
            harmonic: HarmonicMatcher::new(self.config.harmonic.clone(), scorer.clone()),
            chart: ChartShapeDetector::new(self.config.chart.clone()),
            candles: self.candles.unwrap_or_default(),
            scorer,
            context: self.context,
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Parallel scanning of pre-fetched series. Each record is tagged with its
/// series' symbol and the scanner's timeframe and market.
pub fn scan_parallel<'a, T, I>(scanner: &PatternScanner, instruments: I) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            let ctx = ScanContext {
                symbol: symbol.to_string(),
                ..scanner.context.clone()
            };
            scanner
                .scan_with(bars, &ctx)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}
