//! Per-timeframe composition engine.
//!
//! [`Scanner`] runs every detector family over one bar series and merges
//! the results into a [`ScanReport`]. Built through [`ScannerBuilder`],
//! which validates parameter overrides, optionally enforces whole-series
//! OHLCV validation, and can filter signals below a confidence floor.
//! [`scan_parallel`] fans a scanner out over many instruments with rayon.

use rayon::prelude::*;

use crate::confluence::{confluence_score, ConfluenceScore};
use crate::detectors::{
    detect_candlesticks, detect_chart_patterns, detect_emerging_patterns, detect_gap_volume,
    detect_preconfirmations, EmergingPattern, PreConfirmation,
};
use crate::levels::{
    fibonacci_levels, support_resistance, trend_lines, FibonacciLevels, SupportResistance,
    TrendLine,
};
use crate::{
    config, Indicators, Ohlcv, OhlcvExt, PatternSignal, Result, SignalError,
};

/// Composite per-timeframe scan output. Plain data, JSON-serializable.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScanReport {
    pub signals: Vec<PatternSignal>,
    pub emerging: Vec<EmergingPattern>,
    pub preconfirmations: Vec<PreConfirmation>,
    pub fibonacci: Option<FibonacciLevels>,
    pub trend_lines: Vec<TrendLine>,
    pub support_resistance: SupportResistance,
    pub confluence: ConfluenceScore,
}

/// Configured, reusable scanner. Stateless between calls.
#[derive(Debug, Clone)]
pub struct Scanner {
    candlestick: config::CandlestickParams,
    chart: config::ChartParams,
    gap_volume: config::GapVolumeParams,
    levels: config::LevelParams,
    min_confidence: Option<f64>,
    validate_data: bool,
}

impl Default for Scanner {
    fn default() -> Self {
        ScannerBuilder::new().build().expect("default params are valid")
    }
}

impl Scanner {
    /// All confirmed-pattern detections (candlestick + chart + gap/volume +
    /// trend-line signals) as one flat list.
    pub fn scan_patterns<T: Ohlcv>(&self, bars: &[T]) -> Vec<PatternSignal> {
        let mut signals = detect_candlesticks(bars, &self.candlestick);
        signals.extend(detect_chart_patterns(bars, &self.chart));
        signals.extend(detect_gap_volume(bars, &self.gap_volume));
        if !bars.is_empty() {
            let last = bars.len() - 1;
            signals.extend(
                trend_lines(bars, &self.levels)
                    .iter()
                    .map(|line| line.to_signal(last)),
            );
        }
        if let Some(min) = self.min_confidence {
            signals.retain(|s| s.confidence >= min);
        }
        signals
    }

    /// Full composite report for one bar series.
    pub fn scan_full<T: Ohlcv>(&self, bars: &[T], indicators: &Indicators) -> ScanReport {
        let signals = self.scan_patterns(bars);
        let confluence = confluence_score(&signals, indicators);
        ScanReport {
            emerging: detect_emerging_patterns(bars, &self.chart),
            preconfirmations: detect_preconfirmations(bars, &self.candlestick),
            fibonacci: fibonacci_levels(bars, &self.levels),
            trend_lines: trend_lines(bars, &self.levels),
            support_resistance: support_resistance(bars, &self.levels),
            confluence,
            signals,
        }
    }

    /// Like [`Scanner::scan_full`] but surfaces bad OHLCV rows when data
    /// validation is enabled on the builder.
    pub fn try_scan_full<T: Ohlcv>(
        &self,
        bars: &[T],
        indicators: &Indicators,
    ) -> Result<ScanReport> {
        if self.validate_data {
            for (i, bar) in bars.iter().enumerate() {
                bar.validate().map_err(|e| match e {
                    SignalError::InvalidOhlcv { reason, .. } => {
                        SignalError::InvalidOhlcv { index: i, reason }
                    }
                    other => other,
                })?;
            }
        }
        Ok(self.scan_full(bars, indicators))
    }

    pub fn chart_params(&self) -> &config::ChartParams {
        &self.chart
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`Scanner`] instances.
pub struct ScannerBuilder {
    candlestick: config::CandlestickParams,
    chart: config::ChartParams,
    gap_volume: config::GapVolumeParams,
    levels: config::LevelParams,
    min_confidence: Option<f64>,
    validate_data: bool,
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self {
            candlestick: config::CandlestickParams::default(),
            chart: config::ChartParams::default(),
            gap_volume: config::GapVolumeParams::default(),
            levels: config::LevelParams::default(),
            min_confidence: None,
            validate_data: false,
        }
    }

    pub fn candlestick_params(mut self, params: config::CandlestickParams) -> Self {
        self.candlestick = params;
        self
    }

    pub fn chart_params(mut self, params: config::ChartParams) -> Self {
        self.chart = params;
        self
    }

    pub fn gap_volume_params(mut self, params: config::GapVolumeParams) -> Self {
        self.gap_volume = params;
        self
    }

    pub fn level_params(mut self, params: config::LevelParams) -> Self {
        self.levels = params;
        self
    }

    /// Drop signals below this confidence before they reach the caller.
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    /// Validate every bar before scanning (`try_scan_full`).
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    pub fn build(self) -> Result<Scanner> {
        self.candlestick.validate()?;
        self.chart.validate()?;
        self.gap_volume.validate()?;
        self.levels.validate()?;
        if let Some(min) = self.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(SignalError::OutOfRange {
                    field: "min_confidence",
                    value: min,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(Scanner {
            candlestick: self.candlestick,
            chart: self.chart,
            gap_volume: self.gap_volume,
            levels: self.levels,
            min_confidence: self.min_confidence,
            validate_data: self.validate_data,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

/// Scan result for one instrument.
#[derive(Debug)]
pub struct SymbolReport {
    pub symbol: String,
    pub report: ScanReport,
}

/// Per-instrument failure (only possible with data validation enabled).
#[derive(Debug)]
pub struct SymbolError {
    pub symbol: String,
    pub error: SignalError,
}

/// Scan many instruments concurrently. Each instrument owns its bar slice,
/// so this is safe by construction.
pub fn scan_parallel<'a, T, I>(
    scanner: &Scanner,
    instruments: I,
) -> (Vec<SymbolReport>, Vec<SymbolError>)
where
    T: Ohlcv + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T], Indicators)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars, indicators)| {
            scanner
                .try_scan_full(bars, &indicators)
                .map(|report| SymbolReport {
                    symbol: symbol.to_string(),
                    report,
                })
                .map_err(|error| SymbolError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut reports = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(r) => reports.push(r),
            Err(e) => errors.push(e),
        }
    }
    (reports, errors)
}
