//! Integration tests for harmonic ratio matching.

use harmonic_scanner::prelude::*;

/// Bullish swing from leg multipliers: XA = 10, AB = xab·XA, BC = abc·AB, CD = bcd·BC
fn bullish_swing(xab: f64, abc: f64, bcd: f64) -> XabcdPoints {
    let (x, a) = (100.0, 110.0);
    let b = a - xab * 10.0;
    let c = b + abc * (a - b);
    let d = c - bcd * (c - b);
    XabcdPoints::new(x, a, b, c, d)
}

/// One candle per point, each closing on its point with a narrow range
fn candles_through(prices: &[f64]) -> Vec<Candle> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Candle::new(i as i64 * 3_600_000, p, p + 0.05, p - 0.05, p))
        .collect()
}

fn gartley() -> XabcdPoints {
    bullish_swing(0.618, 0.618, 1.44)
}

#[test]
fn test_template_table_is_complete() {
    for family in HarmonicFamily::ALL {
        for direction in [Direction::Bullish, Direction::Bearish] {
            let template = RatioTemplate::lookup(family, direction)
                .unwrap_or_else(|| panic!("missing template {family} {direction}"));
            for range in [template.xab, template.abc, template.bcd, template.xad] {
                assert!(range.min <= range.max);
            }
        }
        assert!(RatioTemplate::lookup(family, Direction::Neutral).is_none());
    }
    assert!(AbcdTemplate::lookup(Direction::Bullish).is_some());
    assert!(AbcdTemplate::lookup(Direction::Bearish).is_some());
}

#[test]
fn test_gartley_midpoints_end_to_end() {
    let matcher = HarmonicMatcher::default();
    let record = matcher
        .detect_xabcd(&gartley(), HarmonicFamily::Gartley, Direction::Bullish)
        .expect("gartley midpoints should match");

    assert_eq!(record.name(), "gartley");
    assert_eq!(record.direction, Direction::Bullish);
    let ratios = record.pattern.ratios();
    assert!((ratios["xab"] - 0.618).abs() < 1e-9);
    assert!((ratios["xad"] - 0.786).abs() < 1e-3);
    assert_eq!(record.pattern.points()["d"], record.prz);
}

#[test]
fn test_perturbed_ratio_rejected() {
    let matcher = HarmonicMatcher::default();
    // XAB pushed well past the gartley band
    let points = bullish_swing(0.70, 0.618, 1.44);
    assert!(matcher
        .detect_xabcd(&points, HarmonicFamily::Gartley, Direction::Bullish)
        .is_none());
}

#[test]
fn test_mirrored_swing_and_neutral_direction() {
    let matcher = HarmonicMatcher::default();
    let p = gartley();
    let flipped = XabcdPoints::new(200.0 - p.x, 200.0 - p.a, 200.0 - p.b, 200.0 - p.c, 200.0 - p.d);
    assert!(matcher
        .detect_xabcd(&flipped, HarmonicFamily::Gartley, Direction::Bearish)
        .is_some());
    assert!(matcher
        .detect_xabcd(&p, HarmonicFamily::Gartley, Direction::Neutral)
        .is_none());
}

#[test]
fn test_unknown_family_fails_fast() {
    let matcher = HarmonicMatcher::default();
    let err = matcher
        .detect_xabcd_named(&gartley(), "cypher", Direction::Bullish)
        .unwrap_err();
    assert!(matches!(err, PatternError::UnknownFamily(ref name) if name == "cypher"));

    let ok = matcher
        .detect_xabcd_named(&gartley(), "Gartley", Direction::Bullish)
        .unwrap();
    assert!(ok.is_some());
}

#[test]
fn test_scan_finds_gartley_in_candles() {
    let p = gartley();
    let bars = candles_through(&[p.x, p.a, p.b, p.c, p.d]);
    let records = HarmonicMatcher::default().scan(&bars);

    let record = records
        .iter()
        .find(|r| r.name() == "gartley")
        .expect("gartley in scan");
    assert_eq!((record.start_index, record.end_index), (0, 4));
    assert_eq!(record.timestamp, 4 * 3_600_000);
    assert!(record.confirmation.is_some());
}

#[test]
fn test_scan_needs_five_candles() {
    let p = gartley();
    let bars = candles_through(&[p.x, p.a, p.b, p.c]);
    assert!(HarmonicMatcher::default().scan(&bars).is_empty());
}

#[test]
fn test_scan_without_confirmation() {
    let config = HarmonicConfig {
        attach_confirmation: false,
        ..Default::default()
    };
    let matcher = HarmonicMatcher::new(config, ConfirmationScorer::default());
    let p = gartley();
    let bars = candles_through(&[p.x, p.a, p.b, p.c, p.d]);
    let records = matcher.scan(&bars);
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.confirmation.is_none()));
}

#[test]
fn test_family_subset() {
    let config = HarmonicConfig {
        families: vec![HarmonicFamily::Bat],
        include_abcd: false,
        ..Default::default()
    };
    let matcher = HarmonicMatcher::new(config, ConfirmationScorer::default());
    let p = gartley();
    let bars = candles_through(&[p.x, p.a, p.b, p.c, p.d]);
    assert!(matcher.scan(&bars).iter().all(|r| r.name() == "bat"));
}

#[test]
fn test_abcd_detection() {
    let matcher = HarmonicMatcher::default();
    let template = AbcdTemplate::lookup(Direction::Bullish).unwrap();
    let mid = template.midpoints();
    let (a, b) = (110.0, 100.0);
    let c = b + mid.bc * (a - b);
    let d = c - mid.cd * (c - b);
    let record = matcher
        .detect_abcd(&AbcdPoints::new(a, b, c, d), Direction::Bullish)
        .expect("abcd midpoints should match");
    assert_eq!(record.name(), "abcd");
    assert_eq!(record.prz, d);
}
