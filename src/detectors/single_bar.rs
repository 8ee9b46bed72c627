//! Single-candle formations: Doji, Hammer / Hanging Man, Shooting Star,
//! Marubozu.
//!
//! Every rule works on raw shape ratios of one candle. A zero-range candle
//! never matches.

use std::collections::HashMap;

use super::helpers::{
    self, body_bounds, candle_pattern, classify_doji, safe_div, validate_multiple,
};
use super::PatternDetector;
use crate::params::{get_multiple, get_ratio, ParamMeta, ParameterizedDetector};
use crate::record::{CandleFormation, PatternRecord};
use crate::{Direction, OHLCVExt, Ratio, Result, OHLCV};

impl_with_defaults!(DojiDetector, HammerDetector, ShootingStarDetector, MarubozuDetector);

/// Time of the bar, or 0 when the source carries none
#[inline]
fn time_of<T: OHLCV>(bar: &T) -> i64 {
    bar.timestamp().unwrap_or_default()
}

// ============================================================
// DOJI
// ============================================================

/// Doji: body at most `max_body_ratio` of the range
#[derive(Debug, Clone, Copy)]
pub struct DojiDetector {
    pub max_body_ratio: Ratio,
    /// Shadows within this share of each other make a standard doji
    pub symmetry_tolerance: Ratio,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: Ratio::new_const(helpers::DOJI_BODY_RATIO),
            symmetry_tolerance: Ratio::new_const(helpers::DOJI_SYMMETRY),
        }
    }
}

impl DojiDetector {
    pub fn detect_bar<T: OHLCV>(&self, bar: &T) -> Option<PatternRecord> {
        let range = bar.range();
        if range <= 0.0 {
            return None;
        }
        let body_ratio = bar.body() / range;
        if body_ratio > self.max_body_ratio.get() {
            return None;
        }

        let shape = classify_doji(
            bar.upper_shadow(),
            bar.lower_shadow(),
            self.symmetry_tolerance.get(),
        );
        // Near-perfect doji leans on the high, others on the low
        let stop = if body_ratio < self.max_body_ratio.get() / 2.0 {
            bar.high() + range * 0.02
        } else {
            bar.low() - range * 0.02
        };
        let target = if bar.is_bullish() {
            bar.close() + range * 0.5
        } else {
            bar.close() - range * 0.5
        };

        Some(
            PatternRecord::new(
                candle_pattern(CandleFormation::Doji, Some(shape), bar, None, None),
                Direction::Neutral,
                bar.close(),
            )
            .with_levels(stop, target)
            .with_confidence(1.0 - body_ratio)
            .at_time(time_of(bar)),
        )
    }
}

impl PatternDetector for DojiDetector {
    fn id(&self) -> &'static str {
        "doji"
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        let bar = bars.get(index)?;
        self.detect_bar(bar).map(|r| r.spanning(index, index))
    }
}

// ============================================================
// HAMMER FAMILY
// ============================================================

/// Hammer (bullish body) or Hanging Man (bearish body): small body in the
/// upper part of the range with a long lower shadow
#[derive(Debug, Clone, Copy)]
pub struct HammerDetector {
    /// Min distance from low to body bottom, as share of range
    pub min_body_position: Ratio,
    /// Lower shadow >= body * this
    pub min_shadow_multiple: f64,
    /// Upper shadow <= body * this
    pub max_opposite_shadow: Ratio,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            min_body_position: Ratio::new_const(helpers::BODY_POSITION),
            min_shadow_multiple: helpers::LONG_SHADOW_MULTIPLE,
            max_opposite_shadow: Ratio::new_const(helpers::SHORT_SHADOW_RATIO),
        }
    }
}

/// Shared shadow-to-body confidence of the hammer family
#[inline]
fn long_shadow_confidence(long: f64, short: f64, body: f64) -> f64 {
    (0.5 + long / body / 10.0 + (0.1 - short / body) * 2.0).clamp(0.0, 0.95)
}

impl HammerDetector {
    pub fn detect_bar<T: OHLCV>(&self, bar: &T) -> Option<PatternRecord> {
        let range = bar.range();
        let body = bar.body();
        if range <= 0.0 || body <= 0.0 {
            return None;
        }
        let (bottom, _) = body_bounds(bar);
        let lower = bar.lower_shadow();
        let upper = bar.upper_shadow();

        if (bottom - bar.low()) / range < self.min_body_position.get()
            || lower < body * self.min_shadow_multiple
            || upper > body * self.max_opposite_shadow.get()
        {
            return None;
        }

        let (formation, direction, stop, target) = if bar.is_bullish() {
            (
                CandleFormation::Hammer,
                Direction::Bullish,
                bar.low() * 0.98,
                bar.close() + range * 0.618,
            )
        } else {
            (
                CandleFormation::HangingMan,
                Direction::Bearish,
                bar.high() * 1.02,
                bar.close() - range * 0.618,
            )
        };

        Some(
            PatternRecord::new(
                candle_pattern(formation, None, bar, None, None),
                direction,
                bar.close(),
            )
            .with_levels(stop, target)
            .with_confidence(long_shadow_confidence(lower, upper, body))
            .at_time(time_of(bar)),
        )
    }
}

impl PatternDetector for HammerDetector {
    fn id(&self) -> &'static str {
        "hammer"
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        let bar = bars.get(index)?;
        self.detect_bar(bar).map(|r| r.spanning(index, index))
    }

    fn validate_config(&self) -> Result<()> {
        validate_multiple("min_shadow_multiple", self.min_shadow_multiple)
    }
}

/// Shooting Star: small body in the lower part of the range with a long
/// upper shadow
#[derive(Debug, Clone, Copy)]
pub struct ShootingStarDetector {
    /// Min distance from body top to high, as share of range
    pub min_body_position: Ratio,
    /// Upper shadow >= body * this
    pub min_shadow_multiple: f64,
    /// Lower shadow <= body * this
    pub max_opposite_shadow: Ratio,
}

impl Default for ShootingStarDetector {
    fn default() -> Self {
        Self {
            min_body_position: Ratio::new_const(helpers::BODY_POSITION),
            min_shadow_multiple: helpers::LONG_SHADOW_MULTIPLE,
            max_opposite_shadow: Ratio::new_const(helpers::SHORT_SHADOW_RATIO),
        }
    }
}

impl ShootingStarDetector {
    pub fn detect_bar<T: OHLCV>(&self, bar: &T) -> Option<PatternRecord> {
        let range = bar.range();
        let body = bar.body();
        if range <= 0.0 || body <= 0.0 {
            return None;
        }
        let (_, top) = body_bounds(bar);
        let upper = bar.upper_shadow();
        let lower = bar.lower_shadow();

        if (bar.high() - top) / range < self.min_body_position.get()
            || upper < body * self.min_shadow_multiple
            || lower > body * self.max_opposite_shadow.get()
        {
            return None;
        }

        Some(
            PatternRecord::new(
                candle_pattern(CandleFormation::ShootingStar, None, bar, None, None),
                Direction::Bearish,
                bar.close(),
            )
            .with_levels(bar.high() * 1.02, bar.close() - range * 0.618)
            .with_confidence(long_shadow_confidence(upper, lower, body))
            .at_time(time_of(bar)),
        )
    }
}

impl PatternDetector for ShootingStarDetector {
    fn id(&self) -> &'static str {
        "shooting_star"
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        let bar = bars.get(index)?;
        self.detect_bar(bar).map(|r| r.spanning(index, index))
    }

    fn validate_config(&self) -> Result<()> {
        validate_multiple("min_shadow_multiple", self.min_shadow_multiple)
    }
}

// ============================================================
// MARUBOZU
// ============================================================

/// Marubozu: body covers at least `min_body_ratio` of the range
#[derive(Debug, Clone, Copy)]
pub struct MarubozuDetector {
    pub min_body_ratio: Ratio,
}

impl Default for MarubozuDetector {
    fn default() -> Self {
        Self {
            min_body_ratio: Ratio::new_const(helpers::MARUBOZU_BODY_RATIO),
        }
    }
}

impl MarubozuDetector {
    pub fn detect_bar<T: OHLCV>(&self, bar: &T) -> Option<PatternRecord> {
        let range = bar.range();
        if range <= 0.0 {
            return None;
        }
        let body = bar.body();
        let body_ratio = safe_div(body, range);
        if body_ratio < self.min_body_ratio.get() {
            return None;
        }

        let (direction, stop, target) = if bar.is_bullish() {
            (Direction::Bullish, bar.low() * 0.99, bar.close() + body)
        } else {
            (Direction::Bearish, bar.high() * 1.01, bar.close() - body)
        };

        Some(
            PatternRecord::new(
                candle_pattern(CandleFormation::Marubozu, None, bar, None, None),
                direction,
                bar.close(),
            )
            .with_levels(stop, target)
            .with_confidence(body_ratio)
            .at_time(time_of(bar)),
        )
    }
}

impl PatternDetector for MarubozuDetector {
    fn id(&self) -> &'static str {
        "marubozu"
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        let bar = bars.get(index)?;
        self.detect_bar(bar).map(|r| r.spanning(index, index))
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static DOJI_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio("max_body_ratio", 0.1, (0.05, 0.2, 0.05), "Maximum body / range"),
    ParamMeta::ratio(
        "symmetry_tolerance",
        0.1,
        (0.05, 0.2, 0.05),
        "Shadow difference for a standard doji",
    ),
];

static HAMMER_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio("min_body_position", 0.6, (0.5, 0.8, 0.1), "Body bottom above this share of range"),
    ParamMeta::multiple("min_shadow_multiple", 2.0, (1.5, 3.0, 0.5), "Lower shadow / body"),
    ParamMeta::ratio("max_opposite_shadow", 0.1, (0.05, 0.3, 0.05), "Upper shadow / body"),
];

static SHOOTINGSTAR_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio("min_body_position", 0.6, (0.5, 0.8, 0.1), "Body top below this share of range"),
    ParamMeta::multiple("min_shadow_multiple", 2.0, (1.5, 3.0, 0.5), "Upper shadow / body"),
    ParamMeta::ratio("max_opposite_shadow", 0.1, (0.05, 0.3, 0.05), "Lower shadow / body"),
];

static MARUBOZU_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "min_body_ratio",
    0.95,
    (0.85, 1.0, 0.05),
    "Minimum body / range",
)];

impl ParameterizedDetector for DojiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOJI_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_body_ratio: get_ratio(params, "max_body_ratio", helpers::DOJI_BODY_RATIO)?,
            symmetry_tolerance: get_ratio(params, "symmetry_tolerance", helpers::DOJI_SYMMETRY)?,
        })
    }

    fn pattern_name() -> &'static str {
        "doji"
    }
}

impl ParameterizedDetector for HammerDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HAMMER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_body_position: get_ratio(params, "min_body_position", helpers::BODY_POSITION)?,
            min_shadow_multiple: get_multiple(
                params,
                "min_shadow_multiple",
                helpers::LONG_SHADOW_MULTIPLE,
            )?,
            max_opposite_shadow: get_ratio(
                params,
                "max_opposite_shadow",
                helpers::SHORT_SHADOW_RATIO,
            )?,
        })
    }

    fn pattern_name() -> &'static str {
        "hammer"
    }
}

impl ParameterizedDetector for ShootingStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        SHOOTINGSTAR_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_body_position: get_ratio(params, "min_body_position", helpers::BODY_POSITION)?,
            min_shadow_multiple: get_multiple(
                params,
                "min_shadow_multiple",
                helpers::LONG_SHADOW_MULTIPLE,
            )?,
            max_opposite_shadow: get_ratio(
                params,
                "max_opposite_shadow",
                helpers::SHORT_SHADOW_RATIO,
            )?,
        })
    }

    fn pattern_name() -> &'static str {
        "shooting_star"
    }
}

impl ParameterizedDetector for MarubozuDetector {
    fn param_meta() -> &'static [ParamMeta] {
        MARUBOZU_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_body_ratio: get_ratio(params, "min_body_ratio", helpers::MARUBOZU_BODY_RATIO)?,
        })
    }

    fn pattern_name() -> &'static str {
        "marubozu"
    }
}
