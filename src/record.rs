//! Pattern records - the single output schema shared by every detector.
//!
//! A [`PatternRecord`] carries the common trade levels (PRZ, stop, target,
//! confidence) plus a [`Pattern`] payload. On the wire the payload is tagged
//! by `patternType`, which always holds the specific pattern name
//! (`gartley`, `bull_flag`, `doji`, ...), the same string as
//! [`Pattern::name`]. Each payload keeps its own typed `points` and
//! `ratios`; the generic name→value views needed by persistence are
//! available through [`Pattern::points`] and [`Pattern::ratios`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::confirmation::ConfirmationResult;
use crate::harmonic::HarmonicFamily;
use crate::scanner::{Market, Timeframe};
use crate::Direction;

// ============================================================
// PAYLOAD POINTS / RATIOS
// ============================================================

/// Five pivot prices of an XABCD swing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XabcdPoints {
    pub x: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl XabcdPoints {
    pub fn new(x: f64, a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { x, a, b, c, d }
    }

    /// Same swing with every price multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.x * factor,
            self.a * factor,
            self.b * factor,
            self.c * factor,
            self.d * factor,
        )
    }

    /// The trailing four points as an ABCD swing
    pub fn abcd(&self) -> AbcdPoints {
        AbcdPoints::new(self.a, self.b, self.c, self.d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XabcdRatios {
    pub xab: f64,
    pub abc: f64,
    pub bcd: f64,
    pub xad: f64,
}

/// Four pivot prices of an ABCD swing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbcdPoints {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl AbcdPoints {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.a * factor, self.b * factor, self.c * factor, self.d * factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbcdRatios {
    pub bc: f64,
    pub cd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadAndShouldersPoints {
    pub left_shoulder: f64,
    pub head: f64,
    pub right_shoulder: f64,
    pub neckline: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadAndShouldersRatios {
    /// 1 - |left - right| / left
    pub shoulder_symmetry: f64,
    /// (head - neckline) / neckline
    pub head_height: f64,
}

/// Converging/diverging trendline shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendlineShape {
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    RisingWedge,
    FallingWedge,
}

impl TrendlineShape {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendlineShape::AscendingTriangle => "ascending_triangle",
            TrendlineShape::DescendingTriangle => "descending_triangle",
            TrendlineShape::SymmetricalTriangle => "symmetrical_triangle",
            TrendlineShape::RisingWedge => "rising_wedge",
            TrendlineShape::FallingWedge => "falling_wedge",
        }
    }

    pub fn is_triangle(self) -> bool {
        matches!(
            self,
            TrendlineShape::AscendingTriangle
                | TrendlineShape::DescendingTriangle
                | TrendlineShape::SymmetricalTriangle
        )
    }
}

/// Fitted upper/lower line values at the first and last pivot bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendlinePoints {
    pub upper_start: f64,
    pub upper_end: f64,
    pub lower_start: f64,
    pub lower_end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendlineRatios {
    /// Upper line slope per bar, relative to the mean pivot price
    pub upper_slope: f64,
    /// Lower line slope per bar, relative to the mean pivot price
    pub lower_slope: f64,
    /// 1 - end width / start width
    pub convergence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    BullFlag,
    BearFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagPoints {
    pub trend_start: f64,
    pub trend_end: f64,
    pub consolidation_high: f64,
    pub consolidation_low: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRatios {
    /// Signed net move of the trend window relative to its first close
    pub trend_strength: f64,
    /// (high - low) / low of the consolidation window
    pub consolidation_range: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelRole {
    Support,
    Resistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelPoints {
    pub level: f64,
    pub touches: usize,
}

/// Candle formations recognised by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleFormation {
    Doji,
    Hammer,
    HangingMan,
    ShootingStar,
    Marubozu,
    Engulfing,
    Harami,
    Piercing,
    DarkCloudCover,
}

impl CandleFormation {
    pub fn as_str(self) -> &'static str {
        match self {
            CandleFormation::Doji => "doji",
            CandleFormation::Hammer => "hammer",
            CandleFormation::HangingMan => "hanging_man",
            CandleFormation::ShootingStar => "shooting_star",
            CandleFormation::Marubozu => "marubozu",
            CandleFormation::Engulfing => "engulfing",
            CandleFormation::Harami => "harami",
            CandleFormation::Piercing => "piercing",
            CandleFormation::DarkCloudCover => "dark_cloud_cover",
        }
    }
}

/// Doji subtype by shadow symmetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DojiShape {
    /// Shadows within 10% of each other
    Standard,
    /// Lower shadow more than twice the upper
    Dragonfly,
    /// Upper shadow more than twice the lower
    Gravestone,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyPoints {
    pub open: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandlePoints {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Body of the preceding candle for two-candle formations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<BodyPoints>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleRatios {
    pub body_ratio: f64,
    pub upper_shadow_ratio: f64,
    pub lower_shadow_ratio: f64,
    /// Engulf multiple, harami containment or penetration depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_ratio: Option<f64>,
}

// ============================================================
// PATTERN (tagged union)
// ============================================================

/// Detected pattern payload, serialized with `patternType` set to [`Pattern::name`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PatternRepr", from = "PatternRepr")]
pub enum Pattern {
    Harmonic {
        family: HarmonicFamily,
        points: XabcdPoints,
        ratios: XabcdRatios,
    },
    Abcd {
        points: AbcdPoints,
        ratios: AbcdRatios,
    },
    HeadAndShoulders {
        points: HeadAndShouldersPoints,
        ratios: HeadAndShouldersRatios,
    },
    Trendline {
        shape: TrendlineShape,
        points: TrendlinePoints,
        ratios: TrendlineRatios,
    },
    Flag {
        kind: FlagKind,
        points: FlagPoints,
        ratios: FlagRatios,
    },
    Level {
        role: LevelRole,
        points: LevelPoints,
    },
    Candlestick {
        formation: CandleFormation,
        doji: Option<DojiShape>,
        points: CandlePoints,
        ratios: CandleRatios,
    },
}

// ============================================================
// WIRE FORM (one tag per pattern name)
// ============================================================

#[derive(Serialize, Deserialize)]
struct Legs<P, R> {
    points: P,
    ratios: R,
}

#[derive(Serialize, Deserialize)]
struct LevelBody {
    points: LevelPoints,
}

#[derive(Serialize, Deserialize)]
struct CandleBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doji: Option<DojiShape>,
    points: CandlePoints,
    ratios: CandleRatios,
}

type XabcdLegs = Legs<XabcdPoints, XabcdRatios>;
type TrendlineLegs = Legs<TrendlinePoints, TrendlineRatios>;
type FlagLegs = Legs<FlagPoints, FlagRatios>;

/// Tag values must stay equal to the strings returned by [`Pattern::name`]
#[derive(Serialize, Deserialize)]
#[serde(tag = "patternType", rename_all = "snake_case")]
enum PatternRepr {
    Gartley(XabcdLegs),
    Butterfly(XabcdLegs),
    Bat(XabcdLegs),
    Crab(XabcdLegs),
    Abcd(Legs<AbcdPoints, AbcdRatios>),
    HeadAndShoulders(Legs<HeadAndShouldersPoints, HeadAndShouldersRatios>),
    AscendingTriangle(TrendlineLegs),
    DescendingTriangle(TrendlineLegs),
    SymmetricalTriangle(TrendlineLegs),
    RisingWedge(TrendlineLegs),
    FallingWedge(TrendlineLegs),
    BullFlag(FlagLegs),
    BearFlag(FlagLegs),
    Support(LevelBody),
    Resistance(LevelBody),
    Doji(CandleBody),
    Hammer(CandleBody),
    HangingMan(CandleBody),
    ShootingStar(CandleBody),
    Marubozu(CandleBody),
    Engulfing(CandleBody),
    Harami(CandleBody),
    Piercing(CandleBody),
    DarkCloudCover(CandleBody),
}

impl From<Pattern> for PatternRepr {
    fn from(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Harmonic {
                family,
                points,
                ratios,
            } => {
                let legs = Legs { points, ratios };
                match family {
                    HarmonicFamily::Gartley => PatternRepr::Gartley(legs),
                    HarmonicFamily::Butterfly => PatternRepr::Butterfly(legs),
                    HarmonicFamily::Bat => PatternRepr::Bat(legs),
                    HarmonicFamily::Crab => PatternRepr::Crab(legs),
                }
            }
            Pattern::Abcd { points, ratios } => PatternRepr::Abcd(Legs { points, ratios }),
            Pattern::HeadAndShoulders { points, ratios } => {
                PatternRepr::HeadAndShoulders(Legs { points, ratios })
            }
            Pattern::Trendline {
                shape,
                points,
                ratios,
            } => {
                let legs = Legs { points, ratios };
                match shape {
                    TrendlineShape::AscendingTriangle => PatternRepr::AscendingTriangle(legs),
                    TrendlineShape::DescendingTriangle => PatternRepr::DescendingTriangle(legs),
                    TrendlineShape::SymmetricalTriangle => PatternRepr::SymmetricalTriangle(legs),
                    TrendlineShape::RisingWedge => PatternRepr::RisingWedge(legs),
                    TrendlineShape::FallingWedge => PatternRepr::FallingWedge(legs),
                }
            }
            Pattern::Flag {
                kind,
                points,
                ratios,
            } => {
                let legs = Legs { points, ratios };
                match kind {
                    FlagKind::BullFlag => PatternRepr::BullFlag(legs),
                    FlagKind::BearFlag => PatternRepr::BearFlag(legs),
                }
            }
            Pattern::Level { role, points } => {
                let body = LevelBody { points };
                match role {
                    LevelRole::Support => PatternRepr::Support(body),
                    LevelRole::Resistance => PatternRepr::Resistance(body),
                }
            }
            Pattern::Candlestick {
                formation,
                doji,
                points,
                ratios,
            } => {
                let body = CandleBody {
                    doji,
                    points,
                    ratios,
                };
                match formation {
                    CandleFormation::Doji => PatternRepr::Doji(body),
                    CandleFormation::Hammer => PatternRepr::Hammer(body),
                    CandleFormation::HangingMan => PatternRepr::HangingMan(body),
                    CandleFormation::ShootingStar => PatternRepr::ShootingStar(body),
                    CandleFormation::Marubozu => PatternRepr::Marubozu(body),
                    CandleFormation::Engulfing => PatternRepr::Engulfing(body),
                    CandleFormation::Harami => PatternRepr::Harami(body),
                    CandleFormation::Piercing => PatternRepr::Piercing(body),
                    CandleFormation::DarkCloudCover => PatternRepr::DarkCloudCover(body),
                }
            }
        }
    }
}

impl From<PatternRepr> for Pattern {
    fn from(repr: PatternRepr) -> Self {
        let harmonic = |family, legs: XabcdLegs| Pattern::Harmonic {
            family,
            points: legs.points,
            ratios: legs.ratios,
        };
        let trendline = |shape, legs: TrendlineLegs| Pattern::Trendline {
            shape,
            points: legs.points,
            ratios: legs.ratios,
        };
        let flag = |kind, legs: FlagLegs| Pattern::Flag {
            kind,
            points: legs.points,
            ratios: legs.ratios,
        };
        let level = |role, body: LevelBody| Pattern::Level {
            role,
            points: body.points,
        };
        let candle = |formation, body: CandleBody| Pattern::Candlestick {
            formation,
            doji: body.doji,
            points: body.points,
            ratios: body.ratios,
        };

        match repr {
            PatternRepr::Gartley(l) => harmonic(HarmonicFamily::Gartley, l),
            PatternRepr::Butterfly(l) => harmonic(HarmonicFamily::Butterfly, l),
            PatternRepr::Bat(l) => harmonic(HarmonicFamily::Bat, l),
            PatternRepr::Crab(l) => harmonic(HarmonicFamily::Crab, l),
            PatternRepr::Abcd(l) => Pattern::Abcd {
                points: l.points,
                ratios: l.ratios,
            },
            PatternRepr::HeadAndShoulders(l) => Pattern::HeadAndShoulders {
                points: l.points,
                ratios: l.ratios,
            },
            PatternRepr::AscendingTriangle(l) => trendline(TrendlineShape::AscendingTriangle, l),
            PatternRepr::DescendingTriangle(l) => trendline(TrendlineShape::DescendingTriangle, l),
            PatternRepr::SymmetricalTriangle(l) => {
                trendline(TrendlineShape::SymmetricalTriangle, l)
            }
            PatternRepr::RisingWedge(l) => trendline(TrendlineShape::RisingWedge, l),
            PatternRepr::FallingWedge(l) => trendline(TrendlineShape::FallingWedge, l),
            PatternRepr::BullFlag(l) => flag(FlagKind::BullFlag, l),
            PatternRepr::BearFlag(l) => flag(FlagKind::BearFlag, l),
            PatternRepr::Support(b) => level(LevelRole::Support, b),
            PatternRepr::Resistance(b) => level(LevelRole::Resistance, b),
            PatternRepr::Doji(b) => candle(CandleFormation::Doji, b),
            PatternRepr::Hammer(b) => candle(CandleFormation::Hammer, b),
            PatternRepr::HangingMan(b) => candle(CandleFormation::HangingMan, b),
            PatternRepr::ShootingStar(b) => candle(CandleFormation::ShootingStar, b),
            PatternRepr::Marubozu(b) => candle(CandleFormation::Marubozu, b),
            PatternRepr::Engulfing(b) => candle(CandleFormation::Engulfing, b),
            PatternRepr::Harami(b) => candle(CandleFormation::Harami, b),
            PatternRepr::Piercing(b) => candle(CandleFormation::Piercing, b),
            PatternRepr::DarkCloudCover(b) => candle(CandleFormation::DarkCloudCover, b),
        }
    }
}

impl Pattern {
    /// Specific pattern name, e.g. `gartley`, `bull_flag`, `doji`
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Harmonic { family, .. } => family.as_str(),
            Pattern::Abcd { .. } => "abcd",
            Pattern::HeadAndShoulders { .. } => "head_and_shoulders",
            Pattern::Trendline { shape, .. } => shape.as_str(),
            Pattern::Flag { kind, .. } => match kind {
                FlagKind::BullFlag => "bull_flag",
                FlagKind::BearFlag => "bear_flag",
            },
            Pattern::Level { role, .. } => match role {
                LevelRole::Support => "support",
                LevelRole::Resistance => "resistance",
            },
            Pattern::Candlestick { formation, .. } => formation.as_str(),
        }
    }

    /// Detector family that produced this payload
    pub fn family_name(&self) -> &'static str {
        match self {
            Pattern::Harmonic { .. } | Pattern::Abcd { .. } => "harmonic",
            Pattern::HeadAndShoulders { .. }
            | Pattern::Trendline { .. }
            | Pattern::Flag { .. }
            | Pattern::Level { .. } => "chart",
            Pattern::Candlestick { .. } => "candlestick",
        }
    }

    /// Named price levels
    pub fn points(&self) -> BTreeMap<&'static str, f64> {
        let mut map = BTreeMap::new();
        match self {
            Pattern::Harmonic { points: p, .. } => {
                map.extend([("x", p.x), ("a", p.a), ("b", p.b), ("c", p.c), ("d", p.d)]);
            }
            Pattern::Abcd { points: p, .. } => {
                map.extend([("a", p.a), ("b", p.b), ("c", p.c), ("d", p.d)]);
            }
            Pattern::HeadAndShoulders { points: p, .. } => {
                map.extend([
                    ("leftShoulder", p.left_shoulder),
                    ("head", p.head),
                    ("rightShoulder", p.right_shoulder),
                    ("neckline", p.neckline),
                ]);
            }
            Pattern::Trendline { points: p, .. } => {
                map.extend([
                    ("upperStart", p.upper_start),
                    ("upperEnd", p.upper_end),
                    ("lowerStart", p.lower_start),
                    ("lowerEnd", p.lower_end),
                ]);
            }
            Pattern::Flag { points: p, .. } => {
                map.extend([
                    ("trendStart", p.trend_start),
                    ("trendEnd", p.trend_end),
                    ("consolidationHigh", p.consolidation_high),
                    ("consolidationLow", p.consolidation_low),
                ]);
            }
            Pattern::Level { points: p, .. } => {
                map.insert("level", p.level);
            }
            Pattern::Candlestick { points: p, .. } => {
                map.extend([
                    ("open", p.open),
                    ("high", p.high),
                    ("low", p.low),
                    ("close", p.close),
                ]);
                if let Some(prev) = p.previous {
                    map.extend([("prevOpen", prev.open), ("prevClose", prev.close)]);
                }
            }
        }
        map
    }

    /// Named ratios
    pub fn ratios(&self) -> BTreeMap<&'static str, f64> {
        let mut map = BTreeMap::new();
        match self {
            Pattern::Harmonic { ratios: r, .. } => {
                map.extend([("xab", r.xab), ("abc", r.abc), ("bcd", r.bcd), ("xad", r.xad)]);
            }
            Pattern::Abcd { ratios: r, .. } => {
                map.extend([("bc", r.bc), ("cd", r.cd)]);
            }
            Pattern::HeadAndShoulders { ratios: r, .. } => {
                map.extend([
                    ("shoulderSymmetry", r.shoulder_symmetry),
                    ("headHeight", r.head_height),
                ]);
            }
            Pattern::Trendline { ratios: r, .. } => {
                map.extend([
                    ("upperSlope", r.upper_slope),
                    ("lowerSlope", r.lower_slope),
                    ("convergence", r.convergence),
                ]);
            }
            Pattern::Flag { ratios: r, .. } => {
                map.extend([
                    ("trendStrength", r.trend_strength),
                    ("consolidationRange", r.consolidation_range),
                ]);
            }
            Pattern::Level { points, .. } => {
                map.insert("touches", points.touches as f64);
            }
            Pattern::Candlestick { ratios: r, .. } => {
                map.extend([
                    ("bodyRatio", r.body_ratio),
                    ("upperShadowRatio", r.upper_shadow_ratio),
                    ("lowerShadowRatio", r.lower_shadow_ratio),
                ]);
                if let Some(pair) = r.pair_ratio {
                    map.insert("pairRatio", pair);
                }
            }
        }
        map
    }

    /// Gartley, Butterfly, Bat or Crab
    pub fn is_classic_harmonic(&self) -> bool {
        matches!(self, Pattern::Harmonic { .. })
    }

    pub fn is_head_and_shoulders(&self) -> bool {
        matches!(self, Pattern::HeadAndShoulders { .. })
    }

    pub fn is_doji(&self) -> bool {
        matches!(
            self,
            Pattern::Candlestick {
                formation: CandleFormation::Doji,
                ..
            }
        )
    }

    fn is_finite(&self) -> bool {
        self.points().values().all(|v| v.is_finite())
            && self.ratios().values().all(|v| v.is_finite())
    }
}

// ============================================================
// PATTERN RECORD
// ============================================================

/// One detected pattern with its trade levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecord {
    #[serde(flatten)]
    pub pattern: Pattern,
    pub direction: Direction,
    /// Potential reversal zone: the terminal point's price
    pub prz: f64,
    pub stop_loss: f64,
    pub target_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reward_ratio: Option<f64>,
    /// 0.0..=1.0
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConfirmationResult>,
    #[serde(default)]
    pub symbol: String,
    /// Epoch milliseconds of the terminal candle
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<Market>,
    pub start_index: usize,
    pub end_index: usize,
}

impl PatternRecord {
    /// New untagged record anchored at `prz`; levels default to the PRZ
    pub fn new(pattern: Pattern, direction: Direction, prz: f64) -> Self {
        Self {
            pattern,
            direction,
            prz,
            stop_loss: prz,
            target_price: prz,
            take_profit: None,
            risk_reward_ratio: None,
            confidence: 0.5,
            confirmation: None,
            symbol: String::new(),
            timestamp: 0,
            timeframe: None,
            market: None,
            start_index: 0,
            end_index: 0,
        }
    }

    pub fn with_levels(mut self, stop_loss: f64, target_price: f64) -> Self {
        self.stop_loss = stop_loss;
        self.target_price = target_price;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Candle index range covered by the pattern (inclusive)
    pub fn spanning(mut self, start_index: usize, end_index: usize) -> Self {
        self.start_index = start_index;
        self.end_index = end_index;
        self
    }

    pub fn at_time(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.pattern.name()
    }

    /// True when every numeric field is finite
    pub fn is_finite(&self) -> bool {
        let levels = [self.prz, self.stop_loss, self.target_price, self.confidence];
        levels.iter().all(|v| v.is_finite())
            && self.take_profit.map_or(true, f64::is_finite)
            && self.risk_reward_ratio.map_or(true, f64::is_finite)
            && self.confirmation.as_ref().map_or(true, ConfirmationResult::is_finite)
            && self.pattern.is_finite()
    }
}
