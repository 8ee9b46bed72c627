//! Local extremum extraction.
//!
//! A bar is a peak when its high is strictly above the highs of the two bars
//! on each side, and a trough when its low is strictly below the lows of the
//! two bars on each side. The first and last two bars can never qualify.

use serde::{Deserialize, Serialize};

use crate::OHLCV;

/// Bars on each side of a pivot candidate
pub const PIVOT_WING: usize = 2;

/// A pivot: index into the candle sequence plus its price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub index: usize,
    pub price: f64,
}

impl PricePoint {
    pub fn new(index: usize, price: f64) -> Self {
        Self { index, price }
    }
}

#[inline]
fn has_full_window(len: usize, i: usize) -> bool {
    i >= PIVOT_WING && i + PIVOT_WING < len
}

#[inline]
fn is_peak<T: OHLCV>(bars: &[T], i: usize) -> bool {
    has_full_window(bars.len(), i) && {
        let h = bars[i].high();
        (i - PIVOT_WING..=i + PIVOT_WING)
            .filter(|&j| j != i)
            .all(|j| h > bars[j].high())
    }
}

#[inline]
fn is_trough<T: OHLCV>(bars: &[T], i: usize) -> bool {
    has_full_window(bars.len(), i) && {
        let l = bars[i].low();
        (i - PIVOT_WING..=i + PIVOT_WING)
            .filter(|&j| j != i)
            .all(|j| l < bars[j].low())
    }
}

/// Local highs in ascending index order
pub fn find_peaks<T: OHLCV>(bars: &[T]) -> Vec<PricePoint> {
    (0..bars.len())
        .filter(|&i| is_peak(bars, i))
        .map(|i| PricePoint::new(i, bars[i].high()))
        .collect()
}

/// Local lows in ascending index order
pub fn find_troughs<T: OHLCV>(bars: &[T]) -> Vec<PricePoint> {
    (0..bars.len())
        .filter(|&i| is_trough(bars, i))
        .map(|i| PricePoint::new(i, bars[i].low()))
        .collect()
}

/// High at a peak, low at a trough, close otherwise.
///
/// Returns `None` only when `index` is out of bounds.
pub fn pivot_price<T: OHLCV>(bars: &[T], index: usize) -> Option<f64> {
    let bar = bars.get(index)?;
    Some(if is_peak(bars, index) {
        bar.high()
    } else if is_trough(bars, index) {
        bar.low()
    } else {
        bar.close()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn bars_from_highs(highs: &[f64]) -> Vec<Candle> {
        highs
            .iter()
            .enumerate()
            .map(|(i, &h)| Candle::new(i as i64, h - 0.5, h, h - 1.0, h - 0.25))
            .collect()
    }

    #[test]
    fn test_single_peak() {
        let bars = bars_from_highs(&[1.0, 2.0, 5.0, 2.0, 1.0]);
        let peaks = find_peaks(&bars);
        assert_eq!(peaks, vec![PricePoint::new(2, 5.0)]);
        assert!(find_troughs(&bars).is_empty());
    }

    #[test]
    fn test_plateau_is_not_peak() {
        let bars = bars_from_highs(&[1.0, 2.0, 5.0, 5.0, 2.0, 1.0]);
        assert!(find_peaks(&bars).is_empty());
    }

    #[test]
    fn test_single_trough() {
        let bars = bars_from_highs(&[9.0, 8.0, 4.0, 8.0, 9.0]);
        let troughs = find_troughs(&bars);
        assert_eq!(troughs, vec![PricePoint::new(2, 3.0)]);
    }

    #[test]
    fn test_too_short_has_no_pivots() {
        let bars = bars_from_highs(&[1.0, 5.0, 1.0, 0.5]);
        assert!(find_peaks(&bars).is_empty());
        assert!(find_troughs(&bars).is_empty());
    }

    #[test]
    fn test_pivot_price_selects_level() {
        let bars = bars_from_highs(&[1.0, 2.0, 5.0, 2.0, 1.0, 3.0, 4.0]);
        assert_eq!(pivot_price(&bars, 2), Some(5.0));
        assert_eq!(pivot_price(&bars, 4), Some(0.0));
        assert_eq!(pivot_price(&bars, 3), Some(bars[3].close));
    }

    #[test]
    fn test_pivot_price_boundaries_use_close() {
        let bars = bars_from_highs(&[9.0, 2.0, 1.0, 2.0, 9.0]);
        assert_eq!(pivot_price(&bars, 0), Some(bars[0].close));
        assert_eq!(pivot_price(&bars, 4), Some(bars[4].close));
        assert_eq!(pivot_price(&bars, 5), None);
    }
}
