//! Benchmarks for the scan, aging and backtest paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sigscope::prelude::*;

fn make_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let wave = (i as f64 * 0.21).sin() * 3.0;
            let base = 100.0 + i as f64 * 0.05 + wave;
            let (open, close) = if wave < 0.0 {
                (base - 0.5, base + 0.5)
            } else {
                (base + 0.5, base - 0.5)
            };
            let volume = 4_000.0 + ((i * 13) % 17) as f64 * 250.0;
            Bar::new(i as i64, open, base + 1.2, base - 1.2, close, volume)
        })
        .collect()
}

fn bench_scan_full(c: &mut Criterion) {
    let scanner = ScannerBuilder::new().build().unwrap();
    let bars = make_bars(500);
    let indicators = Indicators {
        rsi_14: Some(51.0),
        macd_histogram: Some(0.2),
        relative_volume: Some(1.3),
        ..Default::default()
    };

    c.bench_function("scan_full_500_bars", |b| {
        b.iter(|| scanner.scan_full(black_box(&bars), black_box(&indicators)))
    });
}

fn bench_precursors(c: &mut Criterion) {
    let bars = make_bars(200);
    let indicators = Indicators {
        rsi_14: Some(50.0),
        ema_8: Some(100.1),
        ema_21: Some(100.0),
        ..Default::default()
    };
    let thresholds = BreakoutThresholds::default();

    c.bench_function("precursor_scan_200_bars", |b| {
        b.iter(|| {
            scan_precursors(
                black_box(&bars),
                black_box(&indicators),
                None,
                &thresholds,
            )
        })
    });
}

fn bench_backtest(c: &mut Criterion) {
    let scanner = ScannerBuilder::new().build().unwrap();
    let bars = make_bars(300);
    let params = BacktestParams::default();

    c.bench_function("backtest_300_bars", |b| {
        b.iter(|| backtest(black_box(&scanner), black_box(&bars), &params))
    });
}

fn bench_aging(c: &mut Criterion) {
    let bars = make_bars(120);
    let scanner = ScannerBuilder::new().build().unwrap();
    let detections = scanner.scan_patterns(&bars);
    let params = AgingParams::default();

    c.bench_function("age_signals_batch", |b| {
        b.iter(|| {
            age_signals(
                Vec::new(),
                black_box(detections.clone()),
                black_box(&bars),
                &params,
            )
        })
    });
}

criterion_group!(
    benches,
    bench_scan_full,
    bench_precursors,
    bench_backtest,
    bench_aging
);
criterion_main!(benches);
