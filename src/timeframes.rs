//! Multi-timeframe aggregation.
//!
//! Runs the full per-timeframe scan over independently supplied bar series
//! (no timestamp synchronization at this layer) and derives cross-frame
//! metrics: pattern confluence, weighted bias alignment, fractal repeats
//! and the dominant signal. Detections stay namespaced per timeframe;
//! nothing is merged destructively.

use rayon::prelude::*;

use crate::scan::{ScanReport, Scanner};
use crate::{round2, Direction, Indicators, Ohlcv, PatternKind};

/// Supported timeframes with fixed significance weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

impl Timeframe {
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
            Timeframe::Mo1 => "1M",
        }
    }

    /// Significance weight: higher timeframes carry more structural weight.
    pub fn weight(self) -> f64 {
        match self {
            Timeframe::M1 => 0.3,
            Timeframe::M5 => 0.5,
            Timeframe::M15 => 0.7,
            Timeframe::M30 => 0.8,
            Timeframe::H1 => 1.0,
            Timeframe::H4 => 1.3,
            Timeframe::D1 => 1.5,
            Timeframe::W1 => 1.8,
            Timeframe::Mo1 => 2.0,
        }
    }
}

/// One timeframe's full scan, namespaced by its label.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeframeScan {
    pub timeframe: Timeframe,
    pub weight: f64,
    pub report: ScanReport,
}

/// A pattern kind confirmed on two or more timeframes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternConfluence {
    pub kind: PatternKind,
    pub direction: Direction,
    pub timeframes: Vec<Timeframe>,
    /// Sum of the participating timeframes' weights.
    pub combined_weight: f64,
}

/// The same kind repeating across scales (weight ratio >= 2).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FractalPattern {
    pub kind: PatternKind,
    pub lower: Timeframe,
    pub higher: Timeframe,
}

/// Highest-weighted confluent pattern.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DominantSignal {
    pub kind: PatternKind,
    pub direction: Direction,
    /// Highest-weight timeframe the pattern appears on.
    pub timeframe: Timeframe,
    pub combined_weight: f64,
}

/// Cross-timeframe aggregation output.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MultiTimeframeReport {
    pub per_timeframe: Vec<TimeframeScan>,
    pub confluences: Vec<PatternConfluence>,
    /// Weighted fraction (0-100) of timeframes agreeing on the majority
    /// bias.
    pub alignment_score: f64,
    pub fractals: Vec<FractalPattern>,
    pub dominant: Option<DominantSignal>,
}

const FRACTAL_WEIGHT_RATIO: f64 = 2.0;

/// Run the scanner over every timeframe and aggregate.
pub fn aggregate_timeframes<T: Ohlcv + Sync>(
    scanner: &Scanner,
    series: &[(Timeframe, &[T], Indicators)],
) -> MultiTimeframeReport {
    let mut per_timeframe: Vec<TimeframeScan> = series
        .par_iter()
        .map(|(tf, bars, indicators)| TimeframeScan {
            timeframe: *tf,
            weight: tf.weight(),
            report: scanner.scan_full(bars, indicators),
        })
        .collect();
    // Deterministic ordering regardless of join order: low to high weight.
    per_timeframe.sort_by(|a, b| {
        a.weight
            .partial_cmp(&b.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Distinct kinds per timeframe.
    let kinds_per_tf: Vec<(Timeframe, Vec<PatternKind>)> = per_timeframe
        .iter()
        .map(|scan| {
            let mut kinds: Vec<PatternKind> = Vec::new();
            for s in &scan.report.signals {
                if !kinds.contains(&s.kind) {
                    kinds.push(s.kind);
                }
            }
            (scan.timeframe, kinds)
        })
        .collect();

    // Pattern confluence: a kind on >= 2 timeframes.
    let mut all_kinds: Vec<PatternKind> = Vec::new();
    for (_, kinds) in &kinds_per_tf {
        for k in kinds {
            if !all_kinds.contains(k) {
                all_kinds.push(*k);
            }
        }
    }
    let mut confluences: Vec<PatternConfluence> = Vec::new();
    for kind in all_kinds {
        let frames: Vec<Timeframe> = kinds_per_tf
            .iter()
            .filter(|(_, kinds)| kinds.contains(&kind))
            .map(|(tf, _)| *tf)
            .collect();
        if frames.len() >= 2 {
            let combined_weight = round2(frames.iter().map(|tf| tf.weight()).sum());
            confluences.push(PatternConfluence {
                kind,
                direction: kind.bias(),
                timeframes: frames,
                combined_weight,
            });
        }
    }
    confluences.sort_by(|a, b| {
        b.combined_weight
            .partial_cmp(&a.combined_weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Fractals: same kind at scales whose weights differ by >= 2x.
    let mut fractals = Vec::new();
    for conf in &confluences {
        for (i, &lower) in conf.timeframes.iter().enumerate() {
            for &higher in &conf.timeframes[i + 1..] {
                if higher.weight() >= lower.weight() * FRACTAL_WEIGHT_RATIO {
                    fractals.push(FractalPattern {
                        kind: conf.kind,
                        lower,
                        higher,
                    });
                }
            }
        }
    }

    let alignment_score = alignment(&per_timeframe);

    let dominant = confluences.first().map(|conf| DominantSignal {
        kind: conf.kind,
        direction: conf.direction,
        timeframe: *conf
            .timeframes
            .iter()
            .max_by(|a, b| {
                a.weight()
                    .partial_cmp(&b.weight())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("confluence has timeframes"),
        combined_weight: conf.combined_weight,
    });

    MultiTimeframeReport {
        per_timeframe,
        confluences,
        alignment_score,
        fractals,
        dominant,
    }
}

/// Weighted share of timeframes agreeing on the majority bias.
fn alignment(scans: &[TimeframeScan]) -> f64 {
    let total: f64 = scans.iter().map(|s| s.weight).sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    let bullish: f64 = scans
        .iter()
        .filter(|s| s.report.confluence.bias == Direction::Bullish)
        .map(|s| s.weight)
        .sum();
    let bearish: f64 = scans
        .iter()
        .filter(|s| s.report.confluence.bias == Direction::Bearish)
        .map(|s| s.weight)
        .sum();
    round2(bullish.max(bearish) / total * 100.0)
}
