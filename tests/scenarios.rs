//! End-to-end scenario tests over hand-built bar series: structure
//! detection, engulfing classification, breakout scoring arithmetic,
//! invalidation and backtest outcome consistency.

use sigscope::prelude::*;

fn mid_bar(i: usize, low: f64, high: f64) -> Bar {
    let mid = (low + high) / 2.0;
    Bar::new(i as i64, mid, high, low, mid, 1_000.0)
}

// ============================================================
// SCENARIO A: CONTRACTING STRUCTURES
// ============================================================

/// Flat highs with rising lows resolve to an ascending triangle. Filler
/// bars drift monotonically so only the intended touches become swings.
#[test]
fn flat_highs_rising_lows_is_ascending_triangle() {
    let mut bars = Vec::new();
    for i in 0..40usize {
        let high = if i == 8 || i == 18 || i == 28 {
            102.0
        } else {
            101.3 - i as f64 * 0.01
        };
        let low = match i {
            6 => 95.0,
            16 => 96.5,
            26 => 98.0,
            _ => 99.8 + i as f64 * 0.01,
        };
        bars.push(mid_bar(i, low, high));
    }

    let signals = detect_chart_patterns(&bars, &ChartParams::default());
    assert!(
        signals
            .iter()
            .any(|s| s.kind == PatternKind::AscendingTriangle),
        "got {:?}",
        signals.iter().map(|s| s.kind).collect::<Vec<_>>()
    );
}

/// Flat highs with flat lows resolve to a rectangle instead.
#[test]
fn flat_highs_flat_lows_is_rectangle() {
    let mut bars = Vec::new();
    for i in 0..40usize {
        let high = if i == 8 || i == 18 || i == 28 {
            102.0
        } else {
            101.0 - i as f64 * 0.01
        };
        let low = match i {
            6 | 16 | 26 => 96.0,
            _ => 97.5 + i as f64 * 0.01,
        };
        bars.push(mid_bar(i, low, high));
    }

    let signals = detect_chart_patterns(&bars, &ChartParams::default());
    assert!(
        signals.iter().any(|s| s.kind == PatternKind::Rectangle),
        "got {:?}",
        signals.iter().map(|s| s.kind).collect::<Vec<_>>()
    );
}

// ============================================================
// SCENARIO B: BULLISH ENGULFING
// ============================================================

#[test]
fn engulfing_bar_reports_fixed_attributes() {
    let mut bars: Vec<Bar> = (0..8)
        .map(|i| Bar::new(i, 100.0, 101.0, 99.0, 100.5, 1_000.0))
        .collect();
    // Large red bar, then a green bar opening at or below its close and
    // closing above its open with a bigger body.
    bars.push(Bar::new(8, 101.0, 101.2, 98.4, 98.6, 1_000.0));
    bars.push(Bar::new(9, 98.5, 102.2, 98.3, 101.8, 1_500.0));

    let signals = detect_candlesticks(&bars, &CandlestickParams::default());
    let engulfing = signals
        .iter()
        .find(|s| s.kind == PatternKind::BullishEngulfing)
        .expect("bullish engulfing detected");
    assert_eq!(engulfing.bar_index, 9);
    assert_eq!(engulfing.direction, Direction::Bullish);
    assert_eq!(engulfing.confidence, 0.75);
}

// ============================================================
// SCENARIO C: BREAKOUT SCORER ARITHMETIC
// ============================================================

/// Precursors {P1, P5, P8, P9} with ADX 30, SMA20>SMA50, RSI 50 and 2.0x
/// relative volume: volume component maxes at 20, trend at 10, and the
/// quality score reproduces the documented per-component formula.
#[test]
fn breakout_component_arithmetic_is_reproducible() {
    let mut bars: Vec<Bar> = (0..45)
        .map(|i| Bar::new(i as i64, 100.0, 101.0, 99.0, 100.0, 2_000.0))
        .collect();
    // Quiet tail: ascending lows on two-fifths the volume, uneven highs so
    // no range-contraction precursor sneaks in.
    let highs = [101.0, 100.8, 101.2, 100.9, 101.1];
    for k in 0..5 {
        bars.push(Bar::new(
            (45 + k) as i64,
            100.0,
            highs[k],
            99.0 + k as f64 * 0.1,
            100.0,
            400.0,
        ));
    }

    let indicators = Indicators {
        rsi_14: Some(50.0),
        adx: Some(30.0),
        sma_20: Some(101.0),
        sma_50: Some(100.0),
        relative_volume: Some(2.0),
        obv: Some(1_000.0),
        obv_20_ago: Some(900.0),
        ..Default::default()
    };
    let thresholds = BreakoutThresholds::default();
    let precursors = scan_precursors(&bars, &indicators, None, &thresholds);

    for id in [PrecursorId::P1, PrecursorId::P5, PrecursorId::P8, PrecursorId::P9] {
        assert!(precursors.contains(id), "missing {id:?}");
    }
    assert_eq!(precursors.len(), 4, "unexpected extra precursors: {precursors:?}");

    let signal = score_breakout(
        "SCEN",
        &bars,
        &indicators,
        None,
        &precursors,
        None,
        &thresholds,
    );
    assert_eq!(signal.components.volume, 20.0); // 15 for 2.0x + 5 for P1
    assert_eq!(signal.components.trend, 10.0);
    assert_eq!(signal.components.multi_timeframe, 7.0); // P9
    assert_eq!(signal.components.candle, 10.0); // RSI zone + P8
    assert_eq!(signal.components.institutional, 5.0); // P5
    assert_eq!(signal.quality_score, signal.components.sum());
    assert_eq!(signal.quality_score, 52.0);
}

// ============================================================
// SCENARIO D: INVALIDATION BY EXPLICIT LEVEL
// ============================================================

#[test]
fn bullish_signal_invalidated_when_level_breaks() {
    let mut bars: Vec<Bar> = (0..16)
        .map(|i| Bar::new(i, 100.0, 101.0, 99.0, 100.0, 1_000.0))
        .collect();
    bars.push(Bar::new(16, 99.0, 99.5, 90.0, 91.0, 3_000.0));

    let signal = PatternSignal::new(PatternKind::BullFlag, 10, "test flag")
        .with_levels(105.0, 112.0, 95.0);
    let batch = age_signals(Vec::new(), vec![signal], &bars, &AgingParams::default());

    let aged = &batch[0];
    assert_eq!(aged.status, SignalStatus::Invalidated);
    assert_eq!(aged.aged_confidence, 0.0);
    assert_eq!(aged.staleness, 100.0);
    assert_eq!(aged.bars_elapsed, 6);
    let reason = aged.invalidation_reason.as_deref().unwrap();
    assert!(reason.contains("95"), "reason: {reason}");
}

// ============================================================
// SCENARIO E: BACKTEST OUTCOMES
// ============================================================

/// A logged breakout above the rolling 20-bar high whose forward bars
/// reach the target evaluates as success; aggregated win rates stay
/// consistent with their counts.
#[test]
fn logged_breakout_success_and_consistent_stats() {
    // 150 bars: 60 flat, then a steady climb.
    let mut bars: Vec<Bar> = (0..60)
        .map(|i| Bar::new(i as i64, 100.0, 101.0, 99.0, 100.0, 2_000.0))
        .collect();
    for i in 60..150 {
        let base = 100.0 + (i - 60) as f64 * 0.4;
        bars.push(Bar::new(i as i64, base, base + 1.0, base - 1.0, base + 0.6, 2_500.0));
    }

    // Rolling 20-high at bar 60 is 101; log a breakout of that level.
    let rolling_high = bars[40..60].iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let logged = PatternSignal::new(PatternKind::AscendingTriangle, 60, "rolling-high breakout")
        .with_levels(rolling_high, rolling_high + 4.0, rolling_high - 4.0);

    let params = BacktestParams::default();
    let evals = evaluate_outcomes(&[logged], &bars, &params);
    assert_eq!(evals.len(), 1);
    assert!(
        matches!(evals[0].outcome, Outcome::Success { .. }),
        "got {:?}",
        evals[0].outcome
    );

    let scanner = ScannerBuilder::new().build().unwrap();
    let report = backtest(&scanner, &bars, &params);
    assert!(report.windows_scanned > 0);
    assert!(report.required_bars.is_none());
    for stats in &report.stats {
        let decided = stats.wins + stats.losses;
        assert_eq!(decided + stats.still_active, stats.occurrences);
        if decided > 0 {
            let expected = stats.wins as f64 / decided as f64 * 100.0;
            assert!((stats.win_rate_pct - (expected * 100.0).round() / 100.0).abs() < 1e-9);
        }
    }
}
