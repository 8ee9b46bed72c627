//! Common thresholds and record helpers shared by the candle detectors

use crate::record::{BodyPoints, CandleFormation, CandlePoints, CandleRatios, DojiShape, Pattern};
use crate::{OHLCVExt, PatternError, Result, OHLCV};

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// Doji: body <= range * DOJI_BODY_RATIO
pub const DOJI_BODY_RATIO: f64 = 0.1;
/// Doji shadows count as symmetric within this share of the longer shadow
pub const DOJI_SYMMETRY: f64 = 0.1;
/// One doji shadow dominates when longer than this multiple of the other
pub const SHADOW_DOMINANCE: f64 = 2.0;
/// Hammer body sits above this share of the range (shooting star: below)
pub const BODY_POSITION: f64 = 0.6;
/// Long shadow >= body * LONG_SHADOW_MULTIPLE
pub const LONG_SHADOW_MULTIPLE: f64 = 2.0;
/// Short shadow <= body * SHORT_SHADOW_RATIO
pub const SHORT_SHADOW_RATIO: f64 = 0.1;
/// Marubozu: body >= range * MARUBOZU_BODY_RATIO
pub const MARUBOZU_BODY_RATIO: f64 = 0.95;
/// Engulfing: current body > previous body * ENGULF_MULTIPLE
pub const ENGULF_MULTIPLE: f64 = 1.1;
/// Harami: current body < previous body * HARAMI_BODY_RATIO
pub const HARAMI_BODY_RATIO: f64 = 0.8;
/// Piercing / dark cloud: close beyond this share of the previous body
pub const PENETRATION_RATIO: f64 = 0.5;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// `num / den`, or 0 when the denominator is zero
#[inline]
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// (bottom, top) of the real body
#[inline]
pub fn body_bounds<T: OHLCV>(bar: &T) -> (f64, f64) {
    (bar.open().min(bar.close()), bar.open().max(bar.close()))
}

/// Doji subtype from shadow lengths
///
/// Dragonfly is the long *lower* shadow (T shape) and gravestone the long
/// *upper* shadow. Some scanners emit these two labels swapped.
pub fn classify_doji(upper: f64, lower: f64, symmetry: f64) -> DojiShape {
    if lower > upper * SHADOW_DOMINANCE {
        DojiShape::Dragonfly
    } else if upper > lower * SHADOW_DOMINANCE {
        DojiShape::Gravestone
    } else if safe_div((upper - lower).abs(), upper.max(lower)) < symmetry {
        DojiShape::Standard
    } else {
        DojiShape::Plain
    }
}

/// A detector multiplier must be finite and positive
pub fn validate_multiple(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PatternError::OutOfRange {
            field,
            value,
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
        });
    }
    Ok(())
}

pub fn candle_points<T: OHLCV>(bar: &T, prev: Option<&T>) -> CandlePoints {
    CandlePoints {
        open: bar.open(),
        high: bar.high(),
        low: bar.low(),
        close: bar.close(),
        previous: prev.map(|p| BodyPoints {
            open: p.open(),
            close: p.close(),
        }),
    }
}

/// Shape ratios of `bar`; a zero range yields zeros
pub fn candle_ratios<T: OHLCV>(bar: &T, pair_ratio: Option<f64>) -> CandleRatios {
    CandleRatios {
        body_ratio: bar.body_ratio().unwrap_or(0.0),
        upper_shadow_ratio: bar.upper_shadow_ratio().unwrap_or(0.0),
        lower_shadow_ratio: bar.lower_shadow_ratio().unwrap_or(0.0),
        pair_ratio,
    }
}

pub fn candle_pattern<T: OHLCV>(
    formation: CandleFormation,
    doji: Option<DojiShape>,
    bar: &T,
    prev: Option<&T>,
    pair_ratio: Option<f64>,
) -> Pattern {
    Pattern::Candlestick {
        formation,
        doji,
        points: candle_points(bar, prev),
        ratios: candle_ratios(bar, pair_ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_doji() {
        assert_eq!(classify_doji(0.5, 0.5, DOJI_SYMMETRY), DojiShape::Standard);
        assert_eq!(classify_doji(0.1, 0.9, DOJI_SYMMETRY), DojiShape::Dragonfly);
        assert_eq!(classify_doji(0.9, 0.1, DOJI_SYMMETRY), DojiShape::Gravestone);
        assert_eq!(classify_doji(0.6, 0.4, DOJI_SYMMETRY), DojiShape::Plain);
    }

    #[test]
    fn test_dragonfly_is_long_lower_shadow_not_upper() {
        // Open and close at the high with a long tail below
        assert_eq!(classify_doji(0.0, 1.0, DOJI_SYMMETRY), DojiShape::Dragonfly);
        // Open and close at the low with a long wick above
        assert_eq!(classify_doji(1.0, 0.0, DOJI_SYMMETRY), DojiShape::Gravestone);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(1.0, 4.0), 0.25);
    }
}
