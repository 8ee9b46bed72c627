//! End-to-end tests for the scan orchestrator.

use std::sync::atomic::AtomicBool;

use harmonic_scanner::prelude::*;

fn series(n: usize, seed: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let base = 100.0 + (t * 0.45 + seed).sin() * 5.0 + (t * 0.11).cos() * 3.0;
            let close = base + (t * 1.7 + seed).sin() * 0.8;
            let high = base.max(close) + 0.6 + (t * 0.3).cos().abs() * 0.4;
            let low = base.min(close) - 0.6 - (t * 0.2).sin().abs() * 0.4;
            Candle::new(i as i64 * 3_600_000, base, high, low, close)
                .with_volume(1_000.0 + (t * 0.5).sin().abs() * 400.0)
                .with_symbol("EURUSD")
        })
        .collect()
}

fn forex_scanner() -> PatternScanner {
    ScannerBuilder::new()
        .symbol("EURUSD")
        .timeframe(Timeframe::H1)
        .market(Market::Forex)
        .build()
        .unwrap()
}

#[test]
fn test_full_scan_record_invariants() {
    let bars = series(200, 0.0);
    let records = forex_scanner().scan(&bars).unwrap();
    assert!(!records.is_empty());

    for r in &records {
        assert!(r.is_finite());
        assert!((0.1..=0.95).contains(&r.confidence));
        assert!(r.start_index <= r.end_index && r.end_index < bars.len());
        assert_eq!(r.timestamp, bars[r.end_index].time);
        assert_eq!(r.symbol, "EURUSD");
        assert_eq!(r.timeframe, Some(Timeframe::H1));
        assert_eq!(r.market, Some(Market::Forex));

        let tp = r.take_profit.unwrap();
        match r.direction {
            Direction::Bearish => assert!(r.stop_loss > r.prz && tp < r.prz),
            _ => assert!(r.stop_loss < r.prz && tp > r.prz),
        }
        assert!((r.risk_reward_ratio.unwrap() - 2.0 / 1.5).abs() < 1e-9);

        let c = r.confirmation.as_ref().unwrap();
        assert!(c.overall_score <= 3);
        assert_eq!(c.is_potentially_valid, c.overall_score >= 2);
    }
}

#[test]
fn test_full_scan_covers_detector_families() {
    let records = forex_scanner().scan(&series(300, 0.4)).unwrap();
    let families: std::collections::BTreeSet<_> =
        records.iter().map(|r| r.pattern.family_name()).collect();
    assert!(families.contains("chart"));
    assert!(families.contains("candlestick"));
}

#[test]
fn test_scan_twice_is_byte_identical() {
    let bars = series(250, 1.3);
    let scanner = forex_scanner();
    let first = serde_json::to_vec(&scanner.scan(&bars).unwrap()).unwrap();
    let second = serde_json::to_vec(&scanner.scan(&bars).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_short_series_is_not_an_error() {
    let scanner = forex_scanner();
    assert!(scanner.scan::<Candle>(&[]).unwrap().is_empty());
    let records = scanner.scan(&series(3, 0.0)).unwrap();
    assert!(records.iter().all(|r| r.pattern.family_name() == "candlestick"));
}

#[test]
fn test_record_json_schema() {
    let records = forex_scanner().scan(&series(200, 0.0)).unwrap();
    let record = records
        .iter()
        .find(|r| r.pattern.family_name() == "candlestick")
        .expect("candlestick record");
    let value = serde_json::to_value(record).unwrap();
    for key in [
        "patternType",
        "direction",
        "points",
        "ratios",
        "prz",
        "stopLoss",
        "targetPrice",
        "takeProfit",
        "riskRewardRatio",
        "confidence",
        "confirmation",
        "symbol",
        "timestamp",
        "timeframe",
        "market",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["timeframe"], "1h");
    assert_eq!(value["market"], "forex");

    let back: PatternRecord = serde_json::from_value(value).unwrap();
    assert_eq!(&back, record);
}

#[test]
fn test_timestamp_order() {
    let scanner = ScannerBuilder::new()
        .order(ScanOrder::TimestampDesc)
        .build()
        .unwrap();
    let records = scanner.scan(&series(200, 2.0)).unwrap();
    assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[test]
fn test_invalid_candle_rejected_when_validating() {
    let mut bars = series(50, 0.0);
    bars[10].high = bars[10].low - 1.0;
    let strict = ScannerBuilder::new().validate_data(true).build().unwrap();
    assert!(matches!(
        strict.scan(&bars),
        Err(PatternError::InvalidOHLCV { index: 10, .. })
    ));
    // Lenient by default
    assert!(PatternScanner::default().scan(&bars).is_ok());
}

#[test]
fn test_scan_symbols_with_source() {
    let scanner = PatternScanner::default();
    let source = |symbol: &str, timeframe: Timeframe| -> Result<Vec<Candle>> {
        match symbol {
            "XAGUSD" => Err(PatternError::Source {
                symbol: symbol.to_string(),
                message: "rate limited".into(),
            }),
            _ => Ok(series(120 + timeframe.minutes() as usize % 7, symbol.len() as f64)),
        }
    };
    let cancel = AtomicBool::new(false);
    let (ok, failed) = scanner.scan_market(&source, Timeframe::H4, Market::Metals, &cancel);

    assert_eq!(ok.len(), 3);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].symbol, "XAGUSD");
    for result in &ok {
        assert!(result
            .patterns
            .iter()
            .all(|r| r.symbol == result.symbol && r.market == Some(Market::Metals)));
    }
}

#[test]
fn test_cancel_before_start() {
    let scanner = PatternScanner::default();
    let source = |_: &str, _: Timeframe| -> Result<Vec<Candle>> { Ok(series(100, 0.0)) };
    let cancel = AtomicBool::new(true);
    let (ok, failed) = scanner.scan_symbols(&source, ["AAPL", "MSFT"], Timeframe::D1, Market::Stocks, &cancel);
    assert!(ok.is_empty());
    assert_eq!(failed.len(), 1);
    assert!(matches!(failed[0].error, PatternError::Cancelled));
}

#[test]
fn test_parallel_matches_sequential() {
    let scanner = forex_scanner();
    let a = series(150, 0.0);
    let b = series(150, 2.5);
    let instruments: Vec<(&str, &[Candle])> = vec![("EURUSD", &a), ("GBPUSD", &b)];
    let (results, errors) = scan_parallel(&scanner, instruments);
    assert!(errors.is_empty());

    let sequential = scanner.scan(&a).unwrap();
    let parallel = &results.iter().find(|r| r.symbol == "EURUSD").unwrap().patterns;
    assert_eq!(parallel, &sequential);
    let gbp = &results.iter().find(|r| r.symbol == "GBPUSD").unwrap().patterns;
    assert!(gbp.iter().all(|r| r.symbol == "GBPUSD"));
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "harmonic": { "tolerance": 0.02, "families": ["gartley", "bat"] },
        "confirmation": { "lookback": 60 },
        "enhancement": { "stop_atr_multiple": 1.0 },
        "min_confidence": 0.5,
        "order": "confidence_desc"
    }"#;
    let config: ScannerConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.harmonic.families, vec![HarmonicFamily::Gartley, HarmonicFamily::Bat]);
    assert_eq!(config.confirmation.rsi_period.get(), 14);
    assert_eq!(config.order, ScanOrder::ConfidenceDesc);

    let scanner = ScannerBuilder::new().config(config).build().unwrap();
    let records = scanner.scan(&series(200, 0.0)).unwrap();
    for r in &records {
        assert!(r.confidence >= 0.5);
        assert!((r.risk_reward_ratio.unwrap() - 2.0).abs() < 1e-9);
    }
}
