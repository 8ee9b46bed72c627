//! Indicator series used for confirmation and risk sizing
//!
//! Every function returns only the fully warmed-up values: the output is
//! shorter than the input by the warm-up length, and empty when the input
//! is too short. Element `k` of each output corresponds to input index
//! `warmup + k`, where the warm-up is documented per function.
//!
//! # Formula
//!
//! ```text
//! SMA[t]   = mean(x[t-p+1..=t])
//! EMA[p-1] = SMA[p-1]
//! EMA[t]   = x[t] * k + EMA[t-1] * (1 - k),   k = 2 / (p + 1)
//!
//! TR[0]    = high - low
//! TR[t]    = max(high - low, |high - close[t-1]|, |low - close[t-1]|)
//! ```

use crate::OHLCV;

/// Simple moving average. Warm-up: `period - 1`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let p = period as f64;
    let mut sum: f64 = values[..period].iter().sum();
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(sum / p);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out.push(sum / p);
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Warm-up: `period - 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

// ============================================================
// RSI
// ============================================================

/// Relative Strength Index with Wilder smoothing. Warm-up: `period`.
///
/// The first average gain/loss is the simple mean of the first `period`
/// changes; later values use `(avg * (period - 1) + x) / period`.
///
/// # Boundary Conditions
///
/// - No losses and some gains: 100
/// - No movement at all: 50
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }
    let p = period as f64;
    let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
    for w in closes[..=period].windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= p;
    avg_loss /= p;

    let mut out = Vec::with_capacity(closes.len() - period);
    out.push(rsi_value(avg_gain, avg_loss));
    for w in closes[period..].windows(2) {
        let change = w[1] - w[0];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out.push(rsi_value(avg_gain, avg_loss));
    }
    out
}

#[inline]
fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

// ============================================================
// MACD
// ============================================================

/// Aligned MACD series: all three vectors have equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    pub fn len(&self) -> usize {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }
}

/// MACD line, signal and histogram. Warm-up: `slow + signal - 2`.
///
/// The MACD line starts where the slow EMA does; the signal EMA runs over
/// the MACD line, and the three outputs are trimmed to the signal's span.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow {
        return MacdSeries::default();
    }
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    if slow_ema.is_empty() {
        return MacdSeries::default();
    }
    // fast_ema[k] is closes[fast-1+k]; align it to slow_ema[0] at closes[slow-1]
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(k, s)| fast_ema[k + offset] - s)
        .collect();

    let signal_line = ema(&line, signal);
    if signal_line.is_empty() {
        return MacdSeries::default();
    }
    let macd = line[signal - 1..].to_vec();
    let histogram = macd.iter().zip(&signal_line).map(|(m, s)| m - s).collect();
    MacdSeries {
        macd,
        signal: signal_line,
        histogram,
    }
}

// ============================================================
// STOCHASTIC
// ============================================================

/// Slow stochastic %K and %D, aligned to equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StochasticSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// Stochastic oscillator. Warm-up: `k_period + smooth + d_period - 3`.
///
/// Raw %K is `100 * (close - lowest low) / (highest high - lowest low)`
/// over `k_period` bars, or 50 when the window has no range. Slow %K is
/// the SMA of raw %K over `smooth`; %D is the SMA of slow %K over
/// `d_period`.
pub fn stochastic<T: OHLCV>(
    bars: &[T],
    k_period: usize,
    smooth: usize,
    d_period: usize,
) -> StochasticSeries {
    if k_period == 0 || smooth == 0 || d_period == 0 || bars.len() < k_period {
        return StochasticSeries::default();
    }
    let raw: Vec<f64> = bars
        .windows(k_period)
        .map(|w| {
            let highest = w.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max);
            let lowest = w.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min);
            let close = w[k_period - 1].close();
            if highest == lowest {
                50.0
            } else {
                100.0 * (close - lowest) / (highest - lowest)
            }
        })
        .collect();

    let slow_k = sma(&raw, smooth);
    let d = sma(&slow_k, d_period);
    if d.is_empty() {
        return StochasticSeries::default();
    }
    StochasticSeries {
        k: slow_k[d_period - 1..].to_vec(),
        d,
    }
}

// ============================================================
// TRUE RANGE / ATR
// ============================================================

/// Per-bar true range; the first bar uses its high-low range
pub fn true_range<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let hl = bar.high() - bar.low();
        let tr = match i.checked_sub(1).map(|j| bars[j].close()) {
            Some(prev) => hl.max((bar.high() - prev).abs()).max((bar.low() - prev).abs()),
            None => hl,
        };
        out.push(tr);
    }
    out
}

/// Mean true range over the last `period` bars, `None` with fewer bars
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    // One extra bar supplies the previous close of the first window bar
    let start = (bars.len() - period).saturating_sub(1);
    let tr = true_range(&bars[start..]);
    Some(tr[tr.len() - period..].iter().sum::<f64>() / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sma() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
        assert!(sma(&[1.0, 2.0], 3).is_empty());
        assert!(sma(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(out.len(), 2);
        assert!(approx(out[0], 4.0));
        // k = 0.5
        assert!(approx(out[1], 6.0));
    }

    #[test]
    fn test_rsi_monotonic_up_is_100() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&closes, 14);
        assert_eq!(out.len(), 16);
        assert!(out.iter().all(|&v| approx(v, 100.0)));
    }

    #[test]
    fn test_rsi_flat_is_50() {
        let out = rsi(&[10.0; 20], 14);
        assert!(out.iter().all(|&v| approx(v, 50.0)));
    }

    #[test]
    fn test_rsi_monotonic_down_is_0() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&closes, 14);
        assert!(out.iter().all(|&v| approx(v, 0.0)));
    }

    #[test]
    fn test_rsi_bounded() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.9).sin() * 5.0).collect();
        let out = rsi(&closes, 14);
        assert!(out.iter().all(|&v| (0.0..=100.0).contains(&v)));
    }

    #[test]
    fn test_rsi_too_short() {
        assert!(rsi(&[1.0; 14], 14).is_empty());
        assert_eq!(rsi(&[1.0; 15], 14).len(), 1);
    }

    #[test]
    fn test_macd_lengths() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 0.5).collect();
        let series = macd(&closes, 12, 26, 9);
        // warm-up 26 + 9 - 2 = 33
        assert_eq!(series.len(), 50 - 33);
        assert_eq!(series.macd.len(), series.signal.len());
        assert!(macd(&closes[..33], 12, 26, 9).is_empty());
        assert_eq!(macd(&closes[..34], 12, 26, 9).len(), 1);
    }

    #[test]
    fn test_macd_linear_trend_positive() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let series = macd(&closes, 12, 26, 9);
        assert!(series.macd.iter().all(|&m| m > 0.0));
        for ((m, s), h) in series.macd.iter().zip(&series.signal).zip(&series.histogram) {
            assert!(approx(m - s, *h));
        }
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let closes = vec![1.0; 100];
        assert!(macd(&closes, 26, 12, 9).is_empty());
    }

    #[test]
    fn test_stochastic_lengths_and_bounds() {
        let bars: Vec<Candle> = (0..40)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.5).sin() * 3.0;
                Candle::new(i, c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let series = stochastic(&bars, 14, 3, 3);
        // warm-up 14 + 3 + 3 - 3 = 17
        assert_eq!(series.k.len(), 40 - 17);
        assert_eq!(series.k.len(), series.d.len());
        assert!(series.k.iter().all(|&v| (0.0..=100.0).contains(&v)));
        assert!(stochastic(&bars[..17], 14, 3, 3).k.is_empty());
    }

    #[test]
    fn test_stochastic_flat_is_50() {
        let bars = vec![Candle::new(0, 1.0, 1.0, 1.0, 1.0); 20];
        let series = stochastic(&bars, 14, 3, 3);
        assert!(series.k.iter().chain(&series.d).all(|&v| approx(v, 50.0)));
    }

    #[test]
    fn test_true_range_uses_gap() {
        let bars = vec![
            Candle::new(0, 10.0, 11.0, 9.0, 10.0),
            Candle::new(1, 13.0, 14.0, 12.5, 13.5),
        ];
        let tr = true_range(&bars);
        assert!(approx(tr[0], 2.0));
        // gap from close 10 to high 14
        assert!(approx(tr[1], 4.0));
    }

    #[test]
    fn test_atr_trailing_mean() {
        let bars: Vec<Candle> = (0..20)
            .map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0))
            .collect();
        assert!(approx(atr(&bars, 14).unwrap(), 2.0));
        assert!(atr(&bars[..13], 14).is_none());
    }
}
