//! Multi-bar chart shapes built on top of the extremum extractor.
//!
//! - head and shoulders from consecutive peak triples
//! - triangles and wedges from least-squares lines through recent pivots
//! - flags from a trend window followed by a tight consolidation window
//! - support/resistance from clustered pivot prices

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extrema::{find_peaks, find_troughs, PricePoint};
use crate::record::{
    FlagKind, FlagPoints, FlagRatios, HeadAndShouldersPoints, HeadAndShouldersRatios,
    LevelPoints, LevelRole, Pattern, PatternRecord, TrendlinePoints, TrendlineRatios,
    TrendlineShape,
};
use crate::{Direction, PatternError, Result, OHLCV};

// ============================================================
// CONFIG
// ============================================================

/// Thresholds for every chart shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Below this many candles the detector returns nothing
    pub min_candles: usize,
    /// Max |left - right| / left for head-and-shoulders
    pub shoulder_tolerance: f64,
    pub flag_trend_window: usize,
    pub flag_consolidation_window: usize,
    /// Min |net move| / first close over the trend window
    pub flag_trend_threshold: f64,
    /// Max (high - low) / low over the consolidation window
    pub flag_consolidation_range: f64,
    /// Max relative distance for two prices to share a level
    pub level_tolerance: f64,
    pub min_touches: usize,
    /// Most recent pivots of each side fitted by a trendline
    pub trendline_pivots: usize,
    /// Max relative deviation from the mean for a flat line
    pub flat_tolerance: f64,
    /// Min 1 - end width / start width for converging lines
    pub min_convergence: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            min_candles: 20,
            shoulder_tolerance: 0.02,
            flag_trend_window: 20,
            flag_consolidation_window: 10,
            flag_trend_threshold: 0.02,
            flag_consolidation_range: 0.03,
            level_tolerance: 0.01,
            min_touches: 3,
            trendline_pivots: 4,
            flat_tolerance: 0.015,
            min_convergence: 0.3,
        }
    }
}

impl ChartConfig {
    pub fn validate(&self) -> Result<()> {
        if self.flag_trend_window < 2 || self.flag_consolidation_window == 0 {
            return Err(PatternError::InvalidConfig(
                "flag windows must cover at least 2 and 1 candles".into(),
            ));
        }
        if self.trendline_pivots < 3 {
            return Err(PatternError::InvalidConfig(
                "trendline_pivots must be >= 3".into(),
            ));
        }
        if self.min_touches == 0 {
            return Err(PatternError::InvalidValue("min_touches must be > 0"));
        }
        for (field, value) in [
            ("shoulder_tolerance", self.shoulder_tolerance),
            ("flag_trend_threshold", self.flag_trend_threshold),
            ("flag_consolidation_range", self.flag_consolidation_range),
            ("level_tolerance", self.level_tolerance),
            ("flat_tolerance", self.flat_tolerance),
            ("min_convergence", self.min_convergence),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(PatternError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }
}

// ============================================================
// LEVEL CLUSTERING
// ============================================================

/// A price level touched by several pivots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelCluster {
    pub price: f64,
    pub touches: usize,
    pub first_index: usize,
    pub last_index: usize,
}

/// Group pivot prices into levels.
///
/// Points are visited in ascending price order. Each point joins the first
/// cluster within `tolerance` of the cluster's running price (which then
/// moves to the midpoint of the two), otherwise it seeds a new cluster.
/// Visiting by price makes the result independent of input order.
pub fn cluster_levels(points: &[PricePoint], tolerance: f64) -> Vec<LevelCluster> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price).then(a.index.cmp(&b.index)));

    let mut clusters: Vec<LevelCluster> = Vec::new();
    for point in sorted {
        let joined = clusters.iter_mut().find(|c| {
            c.price != 0.0 && ((point.price - c.price) / c.price).abs() <= tolerance
        });
        match joined {
            Some(cluster) => {
                cluster.touches += 1;
                cluster.price = (cluster.price + point.price) / 2.0;
                cluster.first_index = cluster.first_index.min(point.index);
                cluster.last_index = cluster.last_index.max(point.index);
            }
            None => clusters.push(LevelCluster {
                price: point.price,
                touches: 1,
                first_index: point.index,
                last_index: point.index,
            }),
        }
    }
    clusters
}

// ============================================================
// TRENDLINES
// ============================================================

/// Least-squares line of price on bar index
#[derive(Debug, Clone, Copy)]
struct Line {
    slope: f64,
    intercept: f64,
}

impl Line {
    fn fit(points: &[PricePoint]) -> Option<Line> {
        let n = points.len() as f64;
        if points.len() < 2 {
            return None;
        }
        let x_mean = points.iter().map(|p| p.index as f64).sum::<f64>() / n;
        let y_mean = points.iter().map(|p| p.price).sum::<f64>() / n;

        let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), p| {
            let dx = p.index as f64 - x_mean;
            (num + dx * (p.price - y_mean), den + dx * dx)
        });
        if den.abs() < 1e-10 {
            return None;
        }
        let slope = num / den;
        Some(Line {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }

    #[inline]
    fn at(&self, index: usize) -> f64 {
        self.intercept + self.slope * index as f64
    }
}

fn mean_price(points: &[PricePoint]) -> f64 {
    points.iter().map(|p| p.price).sum::<f64>() / points.len() as f64
}

// ============================================================
// DETECTOR
// ============================================================

/// Detects head and shoulders, triangles, wedges, flags and levels
#[derive(Debug, Clone, Default)]
pub struct ChartShapeDetector {
    config: ChartConfig,
}

impl ChartShapeDetector {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Run every chart shape over `bars`. Short input yields an empty list.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternRecord> {
        if bars.len() < self.config.min_candles {
            debug!(
                candles = bars.len(),
                required = self.config.min_candles,
                "too few candles for chart shapes"
            );
            return Vec::new();
        }

        let peaks = find_peaks(bars);
        let troughs = find_troughs(bars);

        let mut patterns = Vec::new();
        patterns.extend(self.head_and_shoulders(&peaks, &troughs));
        patterns.extend(self.trendline(bars, &peaks, &troughs));
        patterns.extend(self.flags(bars));
        patterns.extend(self.levels(&peaks, &troughs));

        for record in &mut patterns {
            if let Some(t) = bars[record.end_index].timestamp() {
                record.timestamp = t;
            }
        }
        patterns
    }

    /// First valid left-shoulder/head/right-shoulder triple, scanning left
    /// to right
    pub fn head_and_shoulders(
        &self,
        peaks: &[PricePoint],
        troughs: &[PricePoint],
    ) -> Option<PatternRecord> {
        if peaks.len() < 3 || troughs.len() < 2 {
            return None;
        }

        peaks.windows(3).find_map(|w| {
            let (left, head, right) = (w[0], w[1], w[2]);
            if head.price <= left.price || head.price <= right.price || left.price == 0.0 {
                return None;
            }
            let shoulder_diff = (left.price - right.price).abs() / left.price;
            if shoulder_diff > self.config.shoulder_tolerance {
                return None;
            }

            let mut between = troughs
                .iter()
                .filter(|t| t.index > left.index && t.index < right.index);
            let (first, second) = (between.next()?, between.next()?);
            let neckline = (first.price + second.price) / 2.0;
            if neckline == 0.0 {
                return None;
            }

            let head_height = (head.price - neckline) / neckline;
            let symmetry = 1.0 - shoulder_diff;
            let confidence = (symmetry * 0.5 + head_height.min(0.1) * 5.0 * 0.3 + 0.2)
                .clamp(0.3, 0.95);

            Some(
                PatternRecord::new(
                    Pattern::HeadAndShoulders {
                        points: HeadAndShouldersPoints {
                            left_shoulder: left.price,
                            head: head.price,
                            right_shoulder: right.price,
                            neckline,
                        },
                        ratios: HeadAndShouldersRatios {
                            shoulder_symmetry: symmetry,
                            head_height,
                        },
                    },
                    Direction::Bearish,
                    neckline,
                )
                .with_levels(head.price * 1.02, neckline - (head.price - neckline))
                .with_confidence(confidence)
                .spanning(left.index, right.index),
            )
        })
    }

    /// Triangle or wedge formed by the most recent peaks and troughs
    pub fn trendline<T: OHLCV>(
        &self,
        bars: &[T],
        peaks: &[PricePoint],
        troughs: &[PricePoint],
    ) -> Option<PatternRecord> {
        if peaks.len() < 3 || troughs.len() < 3 {
            return None;
        }
        let k = self.config.trendline_pivots;
        let highs = &peaks[peaks.len().saturating_sub(k)..];
        let lows = &troughs[troughs.len().saturating_sub(k)..];

        let upper = Line::fit(highs)?;
        let lower = Line::fit(lows)?;

        let start = highs[0].index.min(lows[0].index);
        let end = highs[highs.len() - 1].index.max(lows[lows.len() - 1].index);

        let (upper_start, upper_end) = (upper.at(start), upper.at(end));
        let (lower_start, lower_end) = (lower.at(start), lower.at(end));
        let start_width = upper_start - lower_start;
        let end_width = upper_end - lower_end;
        if start_width <= 0.0 || end_width <= 0.0 {
            return None;
        }
        let convergence = 1.0 - end_width / start_width;
        if convergence < self.config.min_convergence {
            return None;
        }

        let upper_flat = self.is_flat(highs);
        let lower_flat = self.is_flat(lows);
        let last_close = bars[bars.len() - 1].close();

        let (shape, direction, prz) = if upper_flat && !lower_flat && lower.slope > 0.0 {
            (TrendlineShape::AscendingTriangle, Direction::Bullish, upper_end)
        } else if lower_flat && !upper_flat && upper.slope < 0.0 {
            (TrendlineShape::DescendingTriangle, Direction::Bearish, lower_end)
        } else if upper_flat || lower_flat {
            return None;
        } else if upper.slope < 0.0 && lower.slope > 0.0 {
            (TrendlineShape::SymmetricalTriangle, Direction::Neutral, last_close)
        } else if upper.slope > 0.0 && lower.slope > 0.0 {
            (TrendlineShape::RisingWedge, Direction::Bearish, last_close)
        } else if upper.slope < 0.0 && lower.slope < 0.0 {
            (TrendlineShape::FallingWedge, Direction::Bullish, last_close)
        } else {
            return None;
        };

        let (stop, target) = if direction.is_bearish() {
            (upper_end, prz - start_width)
        } else {
            (lower_end, prz + start_width)
        };

        let scale = (mean_price(highs) + mean_price(lows)) / 2.0;
        let confidence = (0.4 + 0.4 * convergence).clamp(0.3, 0.95);

        Some(
            PatternRecord::new(
                Pattern::Trendline {
                    shape,
                    points: TrendlinePoints {
                        upper_start,
                        upper_end,
                        lower_start,
                        lower_end,
                    },
                    ratios: TrendlineRatios {
                        upper_slope: if scale != 0.0 { upper.slope / scale } else { 0.0 },
                        lower_slope: if scale != 0.0 { lower.slope / scale } else { 0.0 },
                        convergence,
                    },
                },
                direction,
                prz,
            )
            .with_levels(stop, target)
            .with_confidence(confidence)
            .spanning(start, end),
        )
    }

    fn is_flat(&self, points: &[PricePoint]) -> bool {
        let avg = mean_price(points);
        if avg == 0.0 {
            return false;
        }
        let max_dev = points
            .iter()
            .map(|p| ((p.price - avg) / avg).abs())
            .fold(0.0, f64::max);
        max_dev <= self.config.flat_tolerance
    }

    /// Every trend window followed by a tight consolidation window
    pub fn flags<T: OHLCV>(&self, bars: &[T]) -> Vec<PatternRecord> {
        let trend_len = self.config.flag_trend_window;
        let cons_len = self.config.flag_consolidation_window;
        let mut patterns = Vec::new();
        if bars.len() < trend_len + cons_len + 1 {
            return patterns;
        }

        for i in trend_len..bars.len() - cons_len {
            let trend = &bars[i - trend_len..i];
            let consolidation = &bars[i..i + cons_len];

            let first = trend[0].close();
            let last = trend[trend.len() - 1].close();
            if first == 0.0 {
                continue;
            }
            let slope = (last - first) / first;
            if slope.abs() <= self.config.flag_trend_threshold {
                continue;
            }

            let high = consolidation
                .iter()
                .map(|b| b.high())
                .fold(f64::NEG_INFINITY, f64::max);
            let low = consolidation
                .iter()
                .map(|b| b.low())
                .fold(f64::INFINITY, f64::min);
            if low <= 0.0 {
                continue;
            }
            let range = (high - low) / low;
            if range >= self.config.flag_consolidation_range {
                continue;
            }

            let close = consolidation[consolidation.len() - 1].close();
            let bullish = slope > 0.0;
            let (kind, direction, stop) = if bullish {
                (FlagKind::BullFlag, Direction::Bullish, low * 0.98)
            } else {
                (FlagKind::BearFlag, Direction::Bearish, high * 1.02)
            };
            let confidence = (slope.abs() * 0.4 + (1.0 - range) * 0.4 + 0.2).clamp(0.3, 0.95);

            patterns.push(
                PatternRecord::new(
                    Pattern::Flag {
                        kind,
                        points: FlagPoints {
                            trend_start: first,
                            trend_end: last,
                            consolidation_high: high,
                            consolidation_low: low,
                        },
                        ratios: FlagRatios {
                            trend_strength: slope,
                            consolidation_range: range,
                        },
                    },
                    direction,
                    close,
                )
                .with_levels(stop, close + (last - first))
                .with_confidence(confidence)
                .spanning(i - trend_len, i + cons_len - 1),
            );
        }
        patterns
    }

    /// Resistance from clustered peaks, support from clustered troughs
    pub fn levels(&self, peaks: &[PricePoint], troughs: &[PricePoint]) -> Vec<PatternRecord> {
        let tolerance = self.config.level_tolerance;
        let resistance = cluster_levels(peaks, tolerance)
            .into_iter()
            .map(|c| (LevelRole::Resistance, c));
        let support = cluster_levels(troughs, tolerance)
            .into_iter()
            .map(|c| (LevelRole::Support, c));

        resistance
            .chain(support)
            .filter(|(_, c)| c.touches >= self.config.min_touches)
            .map(|(role, c)| {
                let (direction, stop, target) = match role {
                    LevelRole::Resistance => (Direction::Bearish, c.price * 1.01, c.price * 0.95),
                    LevelRole::Support => (Direction::Bullish, c.price * 0.99, c.price * 1.05),
                };
                PatternRecord::new(
                    Pattern::Level {
                        role,
                        points: LevelPoints {
                            level: c.price,
                            touches: c.touches,
                        },
                    },
                    direction,
                    c.price,
                )
                .with_levels(stop, target)
                .with_confidence((c.touches as f64 * 0.2).min(0.9))
                .spanning(c.first_index, c.last_index)
            })
            .collect()
    }
}
