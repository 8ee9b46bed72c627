//! Indicator confirmation of a pattern's directional bias
//!
//! Three independent indicators vote on the trailing window of candles:
//!
//! - **RSI**: oversold confirms bullish, overbought confirms bearish
//! - **MACD**: a rising histogram confirms bullish, a falling one bearish
//! - **Stochastic**: %K in the oversold zone and above %D confirms bullish,
//!   %K in the overbought zone and below %D confirms bearish
//!
//! An indicator without enough history is left out of the result and
//! casts no vote. Neutral patterns are never confirmed.

use serde::{Deserialize, Serialize};

use crate::indicators::{macd, rsi, stochastic};
use crate::record::PatternRecord;
use crate::{Direction, PatternError, Period, Result, OHLCV};

/// Votes needed for `is_potentially_valid`
pub const MIN_CONFIRMING: u8 = 2;
const INDICATOR_COUNT: f64 = 3.0;

// ============================================================
// CONFIG
// ============================================================

/// Indicator periods and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Trailing candles scored per pattern
    pub lookback: Period,
    pub rsi_period: Period,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_fast: Period,
    pub macd_slow: Period,
    pub macd_signal: Period,
    pub stoch_k: Period,
    pub stoch_smooth: Period,
    pub stoch_d: Period,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(50),
            rsi_period: Period::new_const(14),
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd_fast: Period::new_const(12),
            macd_slow: Period::new_const(26),
            macd_signal: Period::new_const(9),
            stoch_k: Period::new_const(14),
            stoch_smooth: Period::new_const(3),
            stoch_d: Period::new_const(3),
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
        }
    }
}

impl ConfirmationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.macd_fast >= self.macd_slow {
            return Err(PatternError::InvalidConfig(format!(
                "macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast.get(),
                self.macd_slow.get()
            )));
        }
        check_band("rsi", self.rsi_oversold, self.rsi_overbought)?;
        check_band("stochastic", self.stoch_oversold, self.stoch_overbought)
    }
}

fn check_band(name: &str, oversold: f64, overbought: f64) -> Result<()> {
    let in_scale = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
    if !in_scale(oversold) || !in_scale(overbought) || oversold >= overbought {
        return Err(PatternError::InvalidConfig(format!(
            "{name} thresholds must satisfy 0 <= oversold < overbought <= 100, got {oversold}/{overbought}"
        )));
    }
    Ok(())
}

// ============================================================
// RESULT TYPES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsiReading {
    pub value: f64,
    pub is_confirming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    /// Latest histogram value, the quantity whose slope casts the vote
    #[serde(rename = "value")]
    pub histogram: f64,
    pub is_confirming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StochasticReading {
    #[serde(rename = "valueK")]
    pub k: f64,
    #[serde(rename = "valueD")]
    pub d: f64,
    pub is_confirming: bool,
}

/// Latest value of each indicator, `None` when history is too short
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorReadings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsi: Option<RsiReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stochastic: Option<StochasticReading>,
}

impl IndicatorReadings {
    /// Number of present indicators that confirm
    pub fn confirming(&self) -> u8 {
        [
            self.rsi.map(|r| r.is_confirming),
            self.macd.map(|m| m.is_confirming),
            self.stochastic.map(|s| s.is_confirming),
        ]
        .iter()
        .filter(|c| matches!(c, Some(true)))
        .count() as u8
    }

    /// Number of indicators with enough history to be computed
    pub fn present(&self) -> usize {
        usize::from(self.rsi.is_some())
            + usize::from(self.macd.is_some())
            + usize::from(self.stochastic.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResult {
    pub indicators: IndicatorReadings,
    /// Confirming indicators, 0..=3
    pub overall_score: u8,
    /// `round(overall_score / 3 * 100)`
    pub confidence_score: u8,
    pub is_potentially_valid: bool,
}

impl ConfirmationResult {
    pub fn from_readings(indicators: IndicatorReadings) -> Self {
        let overall_score = indicators.confirming();
        Self {
            indicators,
            overall_score,
            confidence_score: (f64::from(overall_score) / INDICATOR_COUNT * 100.0).round() as u8,
            is_potentially_valid: overall_score >= MIN_CONFIRMING,
        }
    }

    pub fn is_finite(&self) -> bool {
        let r = &self.indicators;
        r.rsi.map_or(true, |v| v.value.is_finite())
            && r.macd.map_or(true, |m| {
                m.macd.is_finite() && m.signal.is_finite() && m.histogram.is_finite()
            })
            && r.stochastic.map_or(true, |s| s.k.is_finite() && s.d.is_finite())
    }
}

// ============================================================
// SCORER
// ============================================================

/// Scores patterns against the trailing indicator state
#[derive(Debug, Clone, Default)]
pub struct ConfirmationScorer {
    config: ConfirmationConfig,
}

impl ConfirmationScorer {
    pub fn new(config: ConfirmationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    /// Score `record` against the most recent `lookback` candles of `bars`
    pub fn score<T: OHLCV>(&self, record: &PatternRecord, bars: &[T]) -> ConfirmationResult {
        self.score_direction(record.direction, bars)
    }

    /// Score a bias against the most recent `lookback` candles of `bars`
    pub fn score_direction<T: OHLCV>(&self, direction: Direction, bars: &[T]) -> ConfirmationResult {
        let start = bars.len().saturating_sub(self.config.lookback.get());
        let readings = self.readings(&bars[start..], direction);
        ConfirmationResult::from_readings(readings)
    }

    /// Score a bias using only candles up to and including `end`
    pub fn score_at<T: OHLCV>(&self, direction: Direction, bars: &[T], end: usize) -> ConfirmationResult {
        let stop = bars.len().min(end.saturating_add(1));
        self.score_direction(direction, &bars[..stop])
    }

    /// Latest indicator readings over the whole of `window`
    pub fn readings<T: OHLCV>(&self, window: &[T], direction: Direction) -> IndicatorReadings {
        let c = &self.config;
        let closes: Vec<f64> = window.iter().map(|b| b.close()).collect();

        let rsi = rsi(&closes, c.rsi_period.get()).last().map(|&value| RsiReading {
            value,
            is_confirming: match direction {
                Direction::Bullish => value <= c.rsi_oversold,
                Direction::Bearish => value >= c.rsi_overbought,
                Direction::Neutral => false,
            },
        });

        let series = macd(
            &closes,
            c.macd_fast.get(),
            c.macd_slow.get(),
            c.macd_signal.get(),
        );
        let macd = match series.histogram.as_slice() {
            [.., prev, last] => {
                let n = series.len() - 1;
                Some(MacdReading {
                    macd: series.macd[n],
                    signal: series.signal[n],
                    histogram: *last,
                    is_confirming: match direction {
                        Direction::Bullish => last > prev,
                        Direction::Bearish => last < prev,
                        Direction::Neutral => false,
                    },
                })
            }
            _ => None,
        };

        let stoch = stochastic(window, c.stoch_k.get(), c.stoch_smooth.get(), c.stoch_d.get());
        let stochastic = match (stoch.k.last(), stoch.d.last()) {
            (Some(&k), Some(&d)) => Some(StochasticReading {
                k,
                d,
                is_confirming: match direction {
                    Direction::Bullish => k <= c.stoch_oversold && k > d,
                    Direction::Bearish => k >= c.stoch_overbought && k < d,
                    Direction::Neutral => false,
                },
            }),
            _ => None,
        };

        IndicatorReadings {
            rsi,
            macd,
            stochastic,
        }
    }
}
