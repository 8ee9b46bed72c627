//! Harmonic ratio matching for XABCD and ABCD swings.
//!
//! Ratio bounds live in declarative tables keyed by family and direction.
//! A swing matches a template only when every ratio lies inside its range
//! widened by [`RATIO_TOLERANCE`] on both sides.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::confirmation::ConfirmationScorer;
use crate::extrema::pivot_price;
use crate::record::{AbcdPoints, AbcdRatios, Pattern, PatternRecord, XabcdPoints, XabcdRatios};
use crate::{Direction, PatternError, Result, OHLCV};

/// Symmetric tolerance applied to every template bound
pub const RATIO_TOLERANCE: f64 = 0.015;

/// Bars consumed by one XABCD window
pub const XABCD_BARS: usize = 5;

/// Share of the CD leg projected beyond D for the target
const TARGET_EXTENSION: f64 = 0.618;
/// Stop distance from D as a fraction of price
const STOP_FRACTION: f64 = 0.02;

// ============================================================
// FAMILIES
// ============================================================

/// Five-point harmonic families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarmonicFamily {
    Gartley,
    Butterfly,
    Bat,
    Crab,
}

impl HarmonicFamily {
    pub const ALL: [HarmonicFamily; 4] = [
        HarmonicFamily::Gartley,
        HarmonicFamily::Butterfly,
        HarmonicFamily::Bat,
        HarmonicFamily::Crab,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HarmonicFamily::Gartley => "gartley",
            HarmonicFamily::Butterfly => "butterfly",
            HarmonicFamily::Bat => "bat",
            HarmonicFamily::Crab => "crab",
        }
    }
}

impl fmt::Display for HarmonicFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HarmonicFamily {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        HarmonicFamily::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PatternError::UnknownFamily(s.to_string()))
    }
}

// ============================================================
// TEMPLATES
// ============================================================

/// Inclusive ratio bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioRange {
    pub min: f64,
    pub max: f64,
}

impl RatioRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Single-value range
    pub const fn exact(value: f64) -> Self {
        Self::new(value, value)
    }

    #[inline]
    pub fn contains(&self, value: f64, tolerance: f64) -> bool {
        value >= self.min - tolerance && value <= self.max + tolerance
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// XAB / ABC / BCD / XAD bounds of one family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioTemplate {
    pub xab: RatioRange,
    pub abc: RatioRange,
    pub bcd: RatioRange,
    pub xad: RatioRange,
}

/// BC / CD bounds of the four-point swing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbcdTemplate {
    pub bc: RatioRange,
    pub cd: RatioRange,
}

const GARTLEY: RatioTemplate = RatioTemplate {
    xab: RatioRange::new(0.598, 0.638),
    abc: RatioRange::new(0.382, 0.886),
    bcd: RatioRange::new(1.27, 1.618),
    xad: RatioRange::new(0.766, 0.806),
};

const BUTTERFLY: RatioTemplate = RatioTemplate {
    xab: RatioRange::exact(0.786),
    abc: RatioRange::new(0.382, 0.886),
    bcd: RatioRange::new(1.618, 2.618),
    xad: RatioRange::new(1.27, 1.618),
};

const BAT: RatioTemplate = RatioTemplate {
    xab: RatioRange::new(0.382, 0.5),
    abc: RatioRange::new(0.382, 0.886),
    bcd: RatioRange::new(1.618, 2.618),
    xad: RatioRange::exact(0.886),
};

const CRAB: RatioTemplate = RatioTemplate {
    xab: RatioRange::new(0.382, 0.618),
    abc: RatioRange::new(0.382, 0.886),
    bcd: RatioRange::new(2.24, 3.618),
    xad: RatioRange::exact(1.618),
};

const ABCD: AbcdTemplate = AbcdTemplate {
    bc: RatioRange::new(1.13, 1.618),
    cd: RatioRange::new(1.27, 1.618),
};

/// Family × direction → bounds. Both directions share the same geometry.
static XABCD_TEMPLATES: [(HarmonicFamily, Direction, RatioTemplate); 8] = [
    (HarmonicFamily::Gartley, Direction::Bullish, GARTLEY),
    (HarmonicFamily::Gartley, Direction::Bearish, GARTLEY),
    (HarmonicFamily::Butterfly, Direction::Bullish, BUTTERFLY),
    (HarmonicFamily::Butterfly, Direction::Bearish, BUTTERFLY),
    (HarmonicFamily::Bat, Direction::Bullish, BAT),
    (HarmonicFamily::Bat, Direction::Bearish, BAT),
    (HarmonicFamily::Crab, Direction::Bullish, CRAB),
    (HarmonicFamily::Crab, Direction::Bearish, CRAB),
];

static ABCD_TEMPLATES: [(Direction, AbcdTemplate); 2] =
    [(Direction::Bullish, ABCD), (Direction::Bearish, ABCD)];

impl RatioTemplate {
    /// Bounds for a family and direction; `None` for a neutral direction
    pub fn lookup(family: HarmonicFamily, direction: Direction) -> Option<&'static RatioTemplate> {
        XABCD_TEMPLATES
            .iter()
            .find(|(f, d, _)| *f == family && *d == direction)
            .map(|(_, _, t)| t)
    }

    pub fn matches(&self, ratios: &XabcdRatios, tolerance: f64) -> bool {
        self.xab.contains(ratios.xab, tolerance)
            && self.abc.contains(ratios.abc, tolerance)
            && self.bcd.contains(ratios.bcd, tolerance)
            && self.xad.contains(ratios.xad, tolerance)
    }

    pub fn midpoints(&self) -> XabcdRatios {
        XabcdRatios {
            xab: self.xab.midpoint(),
            abc: self.abc.midpoint(),
            bcd: self.bcd.midpoint(),
            xad: self.xad.midpoint(),
        }
    }
}

impl AbcdTemplate {
    pub fn lookup(direction: Direction) -> Option<&'static AbcdTemplate> {
        ABCD_TEMPLATES
            .iter()
            .find(|(d, _)| *d == direction)
            .map(|(_, t)| t)
    }

    pub fn matches(&self, ratios: &AbcdRatios, tolerance: f64) -> bool {
        self.bc.contains(ratios.bc, tolerance) && self.cd.contains(ratios.cd, tolerance)
    }

    pub fn midpoints(&self) -> AbcdRatios {
        AbcdRatios {
            bc: self.bc.midpoint(),
            cd: self.cd.midpoint(),
        }
    }
}

// ============================================================
// RATIOS
// ============================================================

/// `numerator / denominator`, or 0 for a zero-length denominator leg
#[inline]
fn leg_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// XAB = AB/XA, ABC = BC/AB, BCD = CD/BC, XAD = AD/XA on absolute legs
pub fn xabcd_ratios(p: &XabcdPoints) -> XabcdRatios {
    let xa = (p.a - p.x).abs();
    let ab = (p.b - p.a).abs();
    let bc = (p.c - p.b).abs();
    let cd = (p.d - p.c).abs();
    let ad = (p.d - p.a).abs();
    XabcdRatios {
        xab: leg_ratio(ab, xa),
        abc: leg_ratio(bc, ab),
        bcd: leg_ratio(cd, bc),
        xad: leg_ratio(ad, xa),
    }
}

/// BC = BC/AB, CD = CD/BC on absolute legs
pub fn abcd_ratios(p: &AbcdPoints) -> AbcdRatios {
    let ab = (p.b - p.a).abs();
    let bc = (p.c - p.b).abs();
    let cd = (p.d - p.c).abs();
    AbcdRatios {
        bc: leg_ratio(bc, ab),
        cd: leg_ratio(cd, bc),
    }
}

/// Stop and target around D, signed by direction
fn trade_levels(c: f64, d: f64, direction: Direction) -> (f64, f64) {
    let extension = TARGET_EXTENSION * (d - c).abs();
    match direction {
        Direction::Bearish => (d * (1.0 + STOP_FRACTION), d - extension),
        _ => (d * (1.0 - STOP_FRACTION), d + extension),
    }
}

// ============================================================
// MATCHER
// ============================================================

/// Harmonic matcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonicConfig {
    /// Tolerance band added to both ends of every ratio range
    pub tolerance: f64,
    /// Families tried against each window
    pub families: Vec<HarmonicFamily>,
    pub include_abcd: bool,
    /// Score indicator confirmation for every match found by `scan`
    pub attach_confirmation: bool,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        Self {
            tolerance: RATIO_TOLERANCE,
            families: HarmonicFamily::ALL.to_vec(),
            include_abcd: true,
            attach_confirmation: true,
        }
    }
}

impl HarmonicConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || !(0.0..=0.5).contains(&self.tolerance) {
            return Err(PatternError::OutOfRange {
                field: "tolerance",
                value: self.tolerance,
                min: 0.0,
                max: 0.5,
            });
        }
        Ok(())
    }
}

/// Detects XABCD and ABCD geometries against the template tables
#[derive(Debug, Clone, Default)]
pub struct HarmonicMatcher {
    config: HarmonicConfig,
    scorer: ConfirmationScorer,
}

impl HarmonicMatcher {
    pub fn new(config: HarmonicConfig, scorer: ConfirmationScorer) -> Self {
        Self { config, scorer }
    }

    pub fn config(&self) -> &HarmonicConfig {
        &self.config
    }

    /// Match five points against one family. `None` when any ratio falls
    /// outside its widened range or the direction is neutral.
    pub fn detect_xabcd(
        &self,
        points: &XabcdPoints,
        family: HarmonicFamily,
        direction: Direction,
    ) -> Option<PatternRecord> {
        let template = RatioTemplate::lookup(family, direction)?;
        let ratios = xabcd_ratios(points);
        if !template.matches(&ratios, self.config.tolerance) {
            return None;
        }
        let (stop, target) = trade_levels(points.c, points.d, direction);
        Some(
            PatternRecord::new(
                Pattern::Harmonic {
                    family,
                    points: *points,
                    ratios,
                },
                direction,
                points.d,
            )
            .with_levels(stop, target),
        )
    }

    /// String entry point; an unknown family name is a caller bug and
    /// fails with [`PatternError::UnknownFamily`].
    pub fn detect_xabcd_named(
        &self,
        points: &XabcdPoints,
        family: &str,
        direction: Direction,
    ) -> Result<Option<PatternRecord>> {
        let family = family.parse::<HarmonicFamily>()?;
        Ok(self.detect_xabcd(points, family, direction))
    }

    pub fn detect_abcd(&self, points: &AbcdPoints, direction: Direction) -> Option<PatternRecord> {
        let template = AbcdTemplate::lookup(direction)?;
        let ratios = abcd_ratios(points);
        if !template.matches(&ratios, self.config.tolerance) {
            return None;
        }
        let (stop, target) = trade_levels(points.c, points.d, direction);
        Some(
            PatternRecord::new(
                Pattern::Abcd {
                    points: *points,
                    ratios,
                },
                direction,
                points.d,
            )
            .with_levels(stop, target),
        )
    }

    /// Slide a five-bar window from the latest bar backwards, matching
    /// every configured family against the pivot prices in each window.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternRecord> {
        let mut results = Vec::new();
        if bars.len() < XABCD_BARS {
            return results;
        }

        let pivots: Vec<f64> = (0..bars.len())
            .filter_map(|i| pivot_price(bars, i))
            .collect();

        for end in (XABCD_BARS - 1..bars.len()).rev() {
            let start = end + 1 - XABCD_BARS;
            let points = XabcdPoints::new(
                pivots[start],
                pivots[start + 1],
                pivots[start + 2],
                pivots[start + 3],
                pivots[end],
            );

            if let Some(direction) = leg_direction(points.x, points.a) {
                for &family in &self.config.families {
                    if let Some(record) = self.detect_xabcd(&points, family, direction) {
                        trace!(family = family.as_str(), index = end, "harmonic match");
                        results.push(self.finish(record, bars, start, end));
                    }
                }
            }

            if self.config.include_abcd {
                // AB falling is a bullish ABCD, rising is bearish
                if let Some(direction) = leg_direction(points.b, points.a) {
                    let abcd = points.abcd();
                    if let Some(record) = self.detect_abcd(&abcd, direction) {
                        results.push(self.finish(record, bars, start + 1, end));
                    }
                }
            }
        }

        results
    }

    fn finish<T: OHLCV>(
        &self,
        record: PatternRecord,
        bars: &[T],
        start: usize,
        end: usize,
    ) -> PatternRecord {
        let mut record = record
            .spanning(start, end)
            .at_time(bars[end].timestamp().unwrap_or_default());
        if self.config.attach_confirmation {
            record.confirmation = Some(self.scorer.score_at(record.direction, bars, end));
        }
        record
    }
}

/// Bullish when `to` is above `from`, bearish when below
#[inline]
fn leg_direction(from: f64, to: f64) -> Option<Direction> {
    if to > from {
        Some(Direction::Bullish)
    } else if to < from {
        Some(Direction::Bearish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bullish swing from leg multipliers: XA = 10, AB = xab·XA, etc.
    fn bullish_swing(xab: f64, abc: f64, bcd: f64) -> XabcdPoints {
        let (x, a) = (100.0, 110.0);
        let ab = xab * 10.0;
        let b = a - ab;
        let bc = abc * ab;
        let c = b + bc;
        let d = c - bcd * bc;
        XabcdPoints::new(x, a, b, c, d)
    }

    fn mirrored(p: &XabcdPoints) -> XabcdPoints {
        XabcdPoints::new(200.0 - p.x, 200.0 - p.a, 200.0 - p.b, 200.0 - p.c, 200.0 - p.d)
    }

    fn matcher() -> HarmonicMatcher {
        HarmonicMatcher::default()
    }

    #[test]
    fn test_gartley_geometry() {
        let points = bullish_swing(0.618, 0.618, 1.44);
        let ratios = xabcd_ratios(&points);
        assert!((ratios.xad - 0.786).abs() < 1e-3);

        let record = matcher()
            .detect_xabcd(&points, HarmonicFamily::Gartley, Direction::Bullish)
            .unwrap();
        assert_eq!(record.prz, points.d);
        assert!((record.stop_loss - points.d * 0.98).abs() < 1e-9);
        assert!(record.target_price > points.d);
    }

    #[test]
    fn test_every_family_matches_both_directions() {
        let swings = [
            (HarmonicFamily::Gartley, bullish_swing(0.618, 0.618, 1.44)),
            (HarmonicFamily::Butterfly, bullish_swing(0.786, 0.634, 2.118)),
            (HarmonicFamily::Bat, bullish_swing(0.5, 0.886, 1.87)),
            (HarmonicFamily::Crab, bullish_swing(0.618, 0.886, 2.826)),
        ];
        let m = matcher();
        for (family, points) in swings {
            assert!(
                m.detect_xabcd(&points, family, Direction::Bullish).is_some(),
                "{family} bullish should match"
            );
            let bearish = m
                .detect_xabcd(&mirrored(&points), family, Direction::Bearish)
                .unwrap_or_else(|| panic!("{family} bearish should match"));
            assert!(bearish.stop_loss > bearish.prz);
            assert!(bearish.target_price < bearish.prz);
        }
    }

    #[test]
    fn test_midpoints_match_each_template() {
        for family in HarmonicFamily::ALL {
            for direction in [Direction::Bullish, Direction::Bearish] {
                let template = RatioTemplate::lookup(family, direction).unwrap();
                assert!(template.matches(&template.midpoints(), RATIO_TOLERANCE));
            }
        }
    }

    #[test]
    fn test_single_ratio_perturbation_rejects() {
        for family in HarmonicFamily::ALL {
            let template = RatioTemplate::lookup(family, Direction::Bullish).unwrap();
            let mid = template.midpoints();
            let ranges = [template.xab, template.abc, template.bcd, template.xad];
            for (slot, range) in ranges.iter().enumerate() {
                let shift = range.width() / 2.0 + RATIO_TOLERANCE + 0.001;
                for sign in [1.0, -1.0] {
                    let mut r = mid;
                    let field = match slot {
                        0 => &mut r.xab,
                        1 => &mut r.abc,
                        2 => &mut r.bcd,
                        _ => &mut r.xad,
                    };
                    *field += sign * shift;
                    assert!(
                        !template.matches(&r, RATIO_TOLERANCE),
                        "{family} slot {slot} shifted by {}",
                        sign * shift
                    );
                }
            }
        }
    }

    #[test]
    fn test_abcd_midpoints() {
        let template = AbcdTemplate::lookup(Direction::Bullish).unwrap();
        // a=110, b=100 (AB=10), BC=13.74, CD=1.444·BC
        let bc = template.bc.midpoint() * 10.0;
        let cd = template.cd.midpoint() * bc;
        let points = AbcdPoints::new(110.0, 100.0, 100.0 + bc, 100.0 + bc - cd);
        let record = matcher().detect_abcd(&points, Direction::Bullish).unwrap();
        assert_eq!(record.name(), "abcd");
        assert!(record.target_price > record.prz);
    }

    #[test]
    fn test_zero_leg_gives_zero_ratio() {
        let points = XabcdPoints::new(100.0, 100.0, 100.0, 100.0, 100.0);
        let ratios = xabcd_ratios(&points);
        assert_eq!(ratios.xab, 0.0);
        assert_eq!(ratios.xad, 0.0);
        assert!(matcher()
            .detect_xabcd(&points, HarmonicFamily::Gartley, Direction::Bullish)
            .is_none());
    }

    #[test]
    fn test_neutral_direction_never_matches() {
        let points = bullish_swing(0.618, 0.618, 1.44);
        assert!(matcher()
            .detect_xabcd(&points, HarmonicFamily::Gartley, Direction::Neutral)
            .is_none());
    }

    #[test]
    fn test_named_family() {
        let points = bullish_swing(0.618, 0.618, 1.44);
        let m = matcher();
        assert!(m
            .detect_xabcd_named(&points, "Gartley", Direction::Bullish)
            .unwrap()
            .is_some());
        assert!(matches!(
            m.detect_xabcd_named(&points, "shark", Direction::Bullish),
            Err(PatternError::UnknownFamily(name)) if name == "shark"
        ));
    }

    #[test]
    fn test_config_validation() {
        let config = HarmonicConfig {
            tolerance: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(HarmonicConfig::default().validate().is_ok());
    }
}
