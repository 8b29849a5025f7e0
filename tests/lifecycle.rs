//! Lifecycle and scoring properties: decay arithmetic, clamping, component
//! sums and output-contract serialization.

use proptest::prelude::*;
use sigscope::prelude::*;

fn flat_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| Bar::new(i as i64, 100.0, 100.5, 99.5, 100.0, 1_000.0))
        .collect()
}

// ============================================================
// AGING PROPERTIES
// ============================================================

proptest! {
    /// aged = original * rate^n, non-increasing in n, staleness in [0,100].
    #[test]
    fn decay_is_monotone_and_bounded(
        confidence in 0.2f64..1.0,
        elapsed in 0usize..40,
    ) {
        let bars = flat_bars(elapsed + 1);
        let mut signal = PatternSignal::new(PatternKind::DoubleBottom, 0, "prop");
        signal.confidence = confidence;
        let batch = age_signals(Vec::new(), vec![signal], &bars, &AgingParams::default());
        let aged = &batch[0];

        let rate = PatternKind::DoubleBottom.decay_rate();
        if aged.status != SignalStatus::Invalidated {
            let expected = confidence * rate.powi(elapsed as i32);
            prop_assert!((aged.aged_confidence - expected).abs() < 1e-3);
            prop_assert!(aged.aged_confidence <= confidence + 1e-12);
        } else {
            prop_assert_eq!(aged.aged_confidence, 0.0);
        }
        prop_assert!((0.0..=100.0).contains(&aged.staleness));
    }

    /// One more elapsed bar never raises confidence (short of terminal
    /// transitions).
    #[test]
    fn aging_never_increases_confidence(elapsed in 1usize..30) {
        let params = AgingParams::default();
        let shorter = flat_bars(elapsed + 1);
        let longer = flat_bars(elapsed + 2);
        let make = || vec![PatternSignal::new(PatternKind::DoubleBottom, 0, "prop")];

        let a = age_signals(Vec::new(), make(), &shorter, &params);
        let b = age_signals(Vec::new(), make(), &longer, &params);
        if !a[0].status.is_terminal() && !b[0].status.is_terminal() {
            prop_assert!(b[0].aged_confidence <= a[0].aged_confidence + 1e-12);
            prop_assert!(b[0].staleness >= a[0].staleness - 1e-9);
        }
    }
}

#[test]
fn half_life_matches_decay_rate() {
    let bars = flat_bars(1);
    let batch = age_signals(
        Vec::new(),
        vec![PatternSignal::new(PatternKind::Hammer, 0, "")],
        &bars,
        &AgingParams::default(),
    );
    // 0.90^n = 0.5 at n = ln(.5)/ln(.9) ~ 6.58.
    assert!((batch[0].half_life_bars - 6.58).abs() < 0.01);
}

#[test]
fn terminal_states_survive_repeated_aging() {
    let mut bars = flat_bars(10);
    bars.push(Bar::new(10, 100.0, 100.5, 80.0, 81.0, 5_000.0));
    let signal = PatternSignal::new(PatternKind::BullishEngulfing, 3, "")
        .with_levels(101.0, 110.0, 95.0);
    let params = AgingParams::default();

    let mut batch = age_signals(Vec::new(), vec![signal], &bars, &params);
    assert_eq!(batch[0].status, SignalStatus::Invalidated);
    for _ in 0..5 {
        bars.push(Bar::new(bars.len() as i64, 120.0, 125.0, 119.0, 124.0, 1_000.0));
        batch = age_signals(batch, Vec::new(), &bars, &params);
        assert_eq!(batch[0].status, SignalStatus::Invalidated);
        assert_eq!(batch[0].aged_confidence, 0.0);
        assert_eq!(batch[0].staleness, 100.0);
    }
}

// ============================================================
// BREAKOUT SCORING PROPERTIES
// ============================================================

proptest! {
    /// Component scores always sum to the quality score and stay in range,
    /// whatever the indicator values.
    #[test]
    fn quality_score_is_component_sum(
        rv in proptest::option::of(0.0f64..4.0),
        adx in proptest::option::of(0.0f64..60.0),
        rsi in proptest::option::of(0.0f64..100.0),
        rs in proptest::option::of(-1.0f64..1.0),
    ) {
        let bars = flat_bars(60);
        let indicators = Indicators {
            relative_volume: rv,
            adx,
            rsi_14: rsi,
            relative_strength: rs,
            sma_20: Some(101.0),
            sma_50: Some(100.0),
            ..Default::default()
        };
        let t = BreakoutThresholds::default();
        let precursors = scan_precursors(&bars, &indicators, None, &t);
        let signal = score_breakout("PROP", &bars, &indicators, None, &precursors, None, &t);

        prop_assert!((0.0..=100.0).contains(&signal.quality_score));
        prop_assert!((signal.quality_score - signal.components.sum()).abs() < 1e-9);
    }

    /// Confluence stays clamped for any mix of signal directions.
    #[test]
    fn confluence_is_clamped(bullish in 0usize..12, bearish in 0usize..12) {
        let mut signals = Vec::new();
        for i in 0..bullish {
            signals.push(PatternSignal::new(PatternKind::BullishEngulfing, i, ""));
        }
        for i in 0..bearish {
            signals.push(PatternSignal::new(PatternKind::BearishEngulfing, 100 + i, ""));
        }
        let indicators = Indicators {
            rsi_14: Some(30.0),
            macd_histogram: Some(1.0),
            relative_volume: Some(2.0),
            ..Default::default()
        };
        let score = confluence_score(&signals, &indicators);
        prop_assert!((0.0..=100.0).contains(&score.score));
    }
}

// ============================================================
// OUTPUT CONTRACT
// ============================================================

#[test]
fn scan_report_round_trips_through_json() {
    let mut bars = flat_bars(40);
    bars.push(Bar::new(40, 101.0, 101.5, 97.0, 97.5, 1_200.0));
    bars.push(Bar::new(41, 97.3, 102.5, 97.0, 102.0, 1_800.0));

    let scanner = ScannerBuilder::new().build().unwrap();
    let report = scanner.scan_full(&bars, &Indicators::default());
    assert!(!report.signals.is_empty());

    let json = serde_json::to_string(&report).unwrap();
    let back: ScanReport = serde_json::from_str(&json).unwrap();
    assert_eq!(report, back);
}

#[test]
fn assessment_report_round_trips_through_json() {
    let bars = flat_bars(60);
    let options = OptionsContext {
        put_call_ratio: Some(0.65),
        gex: Some(GammaExposure {
            total_gex: -1.0e8,
            flip_point: Some(101.0),
        }),
        ..Default::default()
    };
    let report = assess(
        "JSON",
        &bars,
        &Indicators::default(),
        Some(&options),
        None,
        &BreakoutThresholds::default(),
    );
    let json = serde_json::to_string(&report).unwrap();
    let back: AssessmentReport = serde_json::from_str(&json).unwrap();
    assert_eq!(report, back);
}

#[test]
fn serialized_direction_and_category_use_contract_names() {
    let signal = PatternSignal::new(PatternKind::TrendLineSupport, 3, "line");
    let json = serde_json::to_value(&signal).unwrap();
    assert_eq!(json["direction"], "bullish");
    assert_eq!(json["category"], "trend_line");
}
