//! Two-candle reversal formations: Engulfing, Harami, Piercing, Dark Cloud
//! Cover.
//!
//! All four need opposite-coloured candles. The record's PRZ is the
//! current close.

use std::collections::HashMap;

use super::helpers::{self, body_bounds, candle_pattern, validate_multiple};
use super::PatternDetector;
use crate::params::{get_multiple, get_ratio, ParamMeta, ParamType, ParameterizedDetector};
use crate::record::{CandleFormation, PatternRecord};
use crate::{Direction, OHLCVExt, Ratio, Result, OHLCV};

impl_with_defaults!(
    EngulfingDetector,
    HaramiDetector,
    PiercingDetector,
    DarkCloudCoverDetector,
);

fn pair_record<T: OHLCV>(
    formation: CandleFormation,
    direction: Direction,
    prev: &T,
    curr: &T,
    pair_ratio: f64,
) -> PatternRecord {
    PatternRecord::new(
        candle_pattern(formation, None, curr, Some(prev), Some(pair_ratio)),
        direction,
        curr.close(),
    )
    .at_time(curr.timestamp().unwrap_or_default())
}

/// Run a pair rule at `index` against the bar before it
#[inline]
fn detect_at<T: OHLCV>(
    bars: &[T],
    index: usize,
    rule: impl FnOnce(&T, &T) -> Option<PatternRecord>,
) -> Option<PatternRecord> {
    if index < 1 {
        return None;
    }
    let prev = bars.get(index - 1)?;
    let curr = bars.get(index)?;
    rule(prev, curr).map(|r| r.spanning(index - 1, index))
}

// ============================================================
// ENGULFING
// ============================================================

/// Engulfing: the second body wraps the first and is larger by
/// `min_engulf_multiple`
#[derive(Debug, Clone, Copy)]
pub struct EngulfingDetector {
    pub min_engulf_multiple: f64,
}

impl Default for EngulfingDetector {
    fn default() -> Self {
        Self {
            min_engulf_multiple: helpers::ENGULF_MULTIPLE,
        }
    }
}

impl EngulfingDetector {
    pub fn detect_pair<T: OHLCV>(&self, prev: &T, curr: &T) -> Option<PatternRecord> {
        let prev_body = prev.body();
        let curr_body = curr.body();

        let bullish = prev.is_bearish()
            && curr.is_bullish()
            && curr.open() < prev.close()
            && curr.close() > prev.open();
        let bearish = prev.is_bullish()
            && curr.is_bearish()
            && curr.open() > prev.close()
            && curr.close() < prev.open();

        if !(bullish || bearish) || curr_body <= prev_body * self.min_engulf_multiple {
            return None;
        }

        let multiple = curr_body / prev_body;
        let (direction, stop, target) = if bullish {
            (Direction::Bullish, prev.low() * 0.98, curr.close() + curr_body)
        } else {
            (Direction::Bearish, prev.high() * 1.02, curr.close() - curr_body)
        };

        Some(
            pair_record(CandleFormation::Engulfing, direction, prev, curr, multiple)
                .with_levels(stop, target)
                .with_confidence((multiple - 1.0).min(0.9)),
        )
    }
}

impl PatternDetector for EngulfingDetector {
    fn id(&self) -> &'static str {
        "engulfing"
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        detect_at(bars, index, |p, c| self.detect_pair(p, c))
    }

    fn validate_config(&self) -> Result<()> {
        validate_multiple("min_engulf_multiple", self.min_engulf_multiple)
    }
}

// ============================================================
// HARAMI
// ============================================================

/// Harami: the second body sits strictly inside the first and is smaller
/// than `max_body_ratio` of it
#[derive(Debug, Clone, Copy)]
pub struct HaramiDetector {
    pub max_body_ratio: Ratio,
}

impl Default for HaramiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: Ratio::new_const(helpers::HARAMI_BODY_RATIO),
        }
    }
}

impl HaramiDetector {
    pub fn detect_pair<T: OHLCV>(&self, prev: &T, curr: &T) -> Option<PatternRecord> {
        let direction = if prev.is_bearish() && curr.is_bullish() {
            Direction::Bullish
        } else if prev.is_bullish() && curr.is_bearish() {
            Direction::Bearish
        } else {
            return None;
        };

        let (bottom, top) = body_bounds(prev);
        let inside = [curr.open(), curr.close()]
            .iter()
            .all(|&p| p > bottom && p < top);
        let prev_body = prev.body();
        let curr_body = curr.body();
        if !inside || curr_body >= prev_body * self.max_body_ratio.get() {
            return None;
        }

        let containment = curr_body / prev_body;
        let (stop, target) = if direction.is_bullish() {
            (prev.low() * 0.99, curr.close() + prev_body * 0.5)
        } else {
            (prev.high() * 1.01, curr.close() - prev_body * 0.5)
        };

        Some(
            pair_record(CandleFormation::Harami, direction, prev, curr, containment)
                .with_levels(stop, target)
                .with_confidence(1.0 - containment),
        )
    }
}

impl PatternDetector for HaramiDetector {
    fn id(&self) -> &'static str {
        "harami"
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        detect_at(bars, index, |p, c| self.detect_pair(p, c))
    }
}

// ============================================================
// PIERCING / DARK CLOUD COVER
// ============================================================

/// Piercing: bullish candle gapping below the prior bearish low and closing
/// more than `min_penetration` into its body
#[derive(Debug, Clone, Copy)]
pub struct PiercingDetector {
    pub min_penetration: Ratio,
}

impl Default for PiercingDetector {
    fn default() -> Self {
        Self {
            min_penetration: Ratio::new_const(helpers::PENETRATION_RATIO),
        }
    }
}

impl PiercingDetector {
    pub fn detect_pair<T: OHLCV>(&self, prev: &T, curr: &T) -> Option<PatternRecord> {
        if !prev.is_bearish() || !curr.is_bullish() {
            return None;
        }
        let prev_body = prev.open() - prev.close();
        let penetration = (curr.close() - prev.close()) / prev_body;
        if curr.open() >= prev.low() || penetration <= self.min_penetration.get() {
            return None;
        }

        Some(
            pair_record(CandleFormation::Piercing, Direction::Bullish, prev, curr, penetration)
                .with_levels(curr.open() * 0.98, curr.close() + prev_body)
                .with_confidence(penetration.min(0.9)),
        )
    }
}

impl PatternDetector for PiercingDetector {
    fn id(&self) -> &'static str {
        "piercing"
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        detect_at(bars, index, |p, c| self.detect_pair(p, c))
    }
}

/// Dark Cloud Cover: bearish candle gapping above the prior bullish high
/// and closing more than `min_penetration` into its body
#[derive(Debug, Clone, Copy)]
pub struct DarkCloudCoverDetector {
    pub min_penetration: Ratio,
}

impl Default for DarkCloudCoverDetector {
    fn default() -> Self {
        Self {
            min_penetration: Ratio::new_const(helpers::PENETRATION_RATIO),
        }
    }
}

impl DarkCloudCoverDetector {
    pub fn detect_pair<T: OHLCV>(&self, prev: &T, curr: &T) -> Option<PatternRecord> {
        if !prev.is_bullish() || !curr.is_bearish() {
            return None;
        }
        let prev_body = prev.close() - prev.open();
        let penetration = (prev.close() - curr.close()) / prev_body;
        if curr.open() <= prev.high() || penetration <= self.min_penetration.get() {
            return None;
        }

        Some(
            pair_record(
                CandleFormation::DarkCloudCover,
                Direction::Bearish,
                prev,
                curr,
                penetration,
            )
            .with_levels(curr.open() * 1.02, curr.close() - prev_body)
            .with_confidence(penetration.min(0.9)),
        )
    }
}

impl PatternDetector for DarkCloudCoverDetector {
    fn id(&self) -> &'static str {
        "dark_cloud_cover"
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<PatternRecord> {
        detect_at(bars, index, |p, c| self.detect_pair(p, c))
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static ENGULFING_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "min_engulf_multiple",
    param_type: ParamType::Multiple,
    default: 1.1,
    range: (1.0, 1.5, 0.1),
    description: "Current body / previous body",
}];

static HARAMI_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "max_body_ratio",
    param_type: ParamType::Ratio,
    default: 0.8,
    range: (0.5, 0.9, 0.1),
    description: "Maximum current body / previous body",
}];

static PIERCING_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "min_penetration",
    param_type: ParamType::Ratio,
    default: 0.5,
    range: (0.4, 0.7, 0.1),
    description: "Minimum close depth into the previous body",
}];

static DARKCLOUDCOVER_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "min_penetration",
    param_type: ParamType::Ratio,
    default: 0.5,
    range: (0.4, 0.7, 0.1),
    description: "Minimum close depth into the previous body",
}];

impl ParameterizedDetector for EngulfingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        ENGULFING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_engulf_multiple: get_multiple(
                params,
                "min_engulf_multiple",
                helpers::ENGULF_MULTIPLE,
            )?,
        })
    }

    fn pattern_name() -> &'static str {
        "engulfing"
    }
}

impl ParameterizedDetector for HaramiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HARAMI_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_body_ratio: get_ratio(params, "max_body_ratio", helpers::HARAMI_BODY_RATIO)?,
        })
    }

    fn pattern_name() -> &'static str {
        "harami"
    }
}

impl ParameterizedDetector for PiercingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        PIERCING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_penetration: get_ratio(params, "min_penetration", helpers::PENETRATION_RATIO)?,
        })
    }

    fn pattern_name() -> &'static str {
        "piercing"
    }
}

impl ParameterizedDetector for DarkCloudCoverDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DARKCLOUDCOVER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_penetration: get_ratio(params, "min_penetration", helpers::PENETRATION_RATIO)?,
        })
    }

    fn pattern_name() -> &'static str {
        "dark_cloud_cover"
    }
}
