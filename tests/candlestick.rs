//! Integration tests for candlestick formation detection.
//!
//! Uses a bare OHLCV type to check that detectors work on any bar source.

use std::collections::HashMap;

use harmonic_scanner::prelude::*;

/// Simple test bar structure without timestamps
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { o, h, l, c }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        1000.0
    }
}

#[test]
fn test_doji_confidence_orders_by_body() {
    let classifier = CandlestickClassifier::default();
    let prev = TestBar::new(99.0, 101.0, 98.5, 100.5);
    let perfect = [prev, TestBar::new(100.0, 100.5, 99.5, 100.0)];
    let wide = [prev, TestBar::new(100.0, 100.5, 99.5, 100.08)];

    let find_doji = |bars: &[TestBar]| {
        classifier
            .scan(bars)
            .into_iter()
            .find(|r| r.pattern.is_doji())
            .expect("doji")
    };
    let a = find_doji(&perfect);
    let b = find_doji(&wide);
    assert!(a.confidence > b.confidence);
    assert_eq!(a.end_index, 1);
}

#[test]
fn test_engulfing_end_to_end() {
    let bars = [
        TestBar::new(110.0, 110.5, 99.5, 100.0),
        TestBar::new(99.0, 112.5, 98.5, 112.0),
    ];
    let record = EngulfingDetector::default()
        .detect(&bars, 1)
        .expect("bullish engulfing");

    assert_eq!(record.name(), "engulfing");
    assert_eq!(record.direction, Direction::Bullish);
    assert_eq!(record.prz, 112.0);
    assert_eq!((record.start_index, record.end_index), (0, 1));
    // No timestamps on this bar type
    assert_eq!(record.timestamp, 0);
    let ratios = record.pattern.ratios();
    assert!((ratios["pairRatio"] - 1.3).abs() < 1e-9);
}

#[test]
fn test_same_colour_pair_is_not_engulfing() {
    let bars = [
        TestBar::new(100.0, 110.5, 99.5, 110.0),
        TestBar::new(99.0, 125.0, 98.5, 124.0),
    ];
    assert!(EngulfingDetector::default().detect(&bars, 1).is_none());
}

#[test]
fn test_classifier_needs_two_bars() {
    let one = [TestBar::new(100.0, 100.5, 99.5, 100.0)];
    assert!(CandlestickClassifier::default().scan(&one).is_empty());
    assert!(CandlestickClassifier::default().scan::<TestBar>(&[]).is_empty());
}

#[test]
fn test_first_bar_is_never_reported() {
    // A perfect doji at index 0 is skipped
    let bars = [
        TestBar::new(100.0, 100.5, 99.5, 100.0),
        TestBar::new(100.0, 103.0, 100.0, 103.0),
    ];
    let records = CandlestickClassifier::default().scan(&bars);
    assert!(records.iter().all(|r| r.end_index == 1));
    assert!(records.iter().any(|r| r.name() == "marubozu"));
}

#[test]
fn test_candlestick_records_are_complete() {
    let bars: Vec<TestBar> = (0..60)
        .map(|i| {
            let base = 100.0 + (i as f64 * 0.9).sin() * 3.0;
            let drift = (i as f64 * 0.37).cos();
            TestBar::new(base, base + 1.0 + drift.abs(), base - 1.0, base + drift)
        })
        .collect();
    for r in CandlestickClassifier::default().scan(&bars) {
        assert!(r.is_finite());
        assert!((0.0..=1.0).contains(&r.confidence));
        assert_eq!(r.pattern.family_name(), "candlestick");
        assert!(!r.pattern.points().is_empty());
    }
}

#[test]
fn test_param_metadata_builds_detectors() {
    for meta in HammerDetector::param_meta() {
        assert!(meta.validate(meta.default).is_ok(), "{} default out of range", meta.name);
    }
    let mut params = HashMap::new();
    params.insert("min_engulf_multiple", 1.5);
    let strict = EngulfingDetector::with_params(&params).unwrap();
    let bars = [
        TestBar::new(110.0, 110.5, 99.5, 100.0),
        TestBar::new(99.0, 112.5, 98.5, 112.0),
    ];
    // 13 / 10 falls short of 1.5x
    assert!(strict.detect(&bars, 1).is_none());
    assert_eq!(EngulfingDetector::pattern_name(), "engulfing");
}

#[test]
fn test_serialized_pattern_type_names_the_formation() {
    let bars = [
        TestBar::new(99.0, 101.0, 98.5, 100.5),
        TestBar::new(100.0, 100.5, 99.5, 100.0),
    ];
    let records = CandlestickClassifier::default().scan(&bars);
    assert!(records.iter().any(|r| r.name() == "doji"));
    for record in &records {
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(value["patternType"], record.name());
        assert_ne!(value["patternType"], "candlestick");
    }
}
