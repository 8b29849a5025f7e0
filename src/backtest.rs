//! Outcome evaluation and historical backtesting.
//!
//! Two modes: replaying forward bars over a caller-persisted pattern log
//! ([`evaluate_outcomes`]), and a sliding-window historical backtest
//! ([`backtest`]) that re-runs the full pattern scan inside each window,
//! evaluates every detection's forward outcome the same way, and
//! aggregates per-kind statistics.
//!
//! The pattern log travels through the caller: nothing is read from or
//! written to any store here.

use std::collections::HashSet;

use tracing::debug;

use crate::config::BacktestParams;
use crate::scan::Scanner;
use crate::{pct_change, round2, Direction, Ohlcv, PatternKind, PatternSignal};

/// Forward outcome of one detection.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Outcome {
    /// Target traded before the stop.
    Success { bars_to_target: usize },
    /// Stop traded first.
    Failed { bars_to_stop: usize },
    /// Neither level traded and the window has not elapsed.
    Active,
    /// Window elapsed with neither level traded; sign of the final P&L
    /// decides the verdict.
    Expired { pnl_pct: f64 },
}

impl Outcome {
    /// Counts as a win for the statistics.
    pub fn is_win(self) -> bool {
        matches!(self, Outcome::Success { .. }) || matches!(self, Outcome::Expired { pnl_pct } if pnl_pct > 0.0)
    }

    pub fn is_decided(self) -> bool {
        !matches!(self, Outcome::Active)
    }
}

/// One evaluated log entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EvaluatedOutcome {
    pub signal: PatternSignal,
    pub outcome: Outcome,
    /// P&L at resolution (or at the last seen bar while active).
    pub pnl_pct: f64,
    /// Largest move in the signal's favor over the replay, percent.
    pub favorable_excursion_pct: f64,
    /// Largest move against the signal over the replay, percent.
    pub adverse_excursion_pct: f64,
}

/// Replay forward bars over a logged detection list. Entries without a
/// directional thesis (neutral) are skipped; entries without explicit
/// levels get the documented defaults applied around the detection close.
pub fn evaluate_outcomes<T: Ohlcv>(
    log: &[PatternSignal],
    bars: &[T],
    params: &BacktestParams,
) -> Vec<EvaluatedOutcome> {
    log.iter()
        .filter_map(|signal| evaluate_one(signal, bars, params))
        .collect()
}

/// Default synthetic levels for log entries that carry none: 3% target,
/// 2% stop around the detection close.
const DEFAULT_TARGET_PCT: f64 = 0.03;
const DEFAULT_STOP_PCT: f64 = 0.02;

fn evaluate_one<T: Ohlcv>(
    signal: &PatternSignal,
    bars: &[T],
    params: &BacktestParams,
) -> Option<EvaluatedOutcome> {
    if signal.bar_index >= bars.len() {
        return None;
    }
    let bullish = match signal.direction {
        Direction::Bullish => true,
        Direction::Bearish => false,
        Direction::Neutral => return None,
    };

    let detection_close = bars[signal.bar_index].close();
    let entry = signal.entry_trigger.unwrap_or(detection_close);
    let (target, stop) = match (signal.target, signal.stop_loss) {
        (Some(t), Some(s)) => (t, s),
        _ => {
            if bullish {
                (
                    entry * (1.0 + DEFAULT_TARGET_PCT),
                    entry * (1.0 - DEFAULT_STOP_PCT),
                )
            } else {
                (
                    entry * (1.0 - DEFAULT_TARGET_PCT),
                    entry * (1.0 + DEFAULT_STOP_PCT),
                )
            }
        }
    };

    let window_end = signal.bar_index + params.lookforward;
    let replay_end = window_end.min(bars.len() - 1);

    let mut favorable: f64 = 0.0;
    let mut adverse: f64 = 0.0;
    let mut outcome = None;
    let mut last_close = detection_close;

    for (offset, bar) in bars[signal.bar_index + 1..=replay_end].iter().enumerate() {
        let elapsed = offset + 1;
        last_close = bar.close();

        let (fav, adv) = if bullish {
            (pct_change(entry, bar.high()), -pct_change(entry, bar.low()))
        } else {
            (-pct_change(entry, bar.low()), pct_change(entry, bar.high()))
        };
        favorable = favorable.max(fav.max(0.0));
        adverse = adverse.max(adv.max(0.0));

        // Adverse level first when both trade in one bar.
        let stopped = if bullish {
            bar.low() <= stop
        } else {
            bar.high() >= stop
        };
        if stopped {
            outcome = Some(Outcome::Failed {
                bars_to_stop: elapsed,
            });
            break;
        }
        let hit = if bullish {
            bar.high() >= target
        } else {
            bar.low() <= target
        };
        if hit {
            outcome = Some(Outcome::Success {
                bars_to_target: elapsed,
            });
            break;
        }
    }

    let pnl_sign = if bullish { 1.0 } else { -1.0 };
    let pnl_pct = round2(pct_change(entry, last_close) * pnl_sign * 100.0);
    let outcome = outcome.unwrap_or(if replay_end < window_end {
        Outcome::Active
    } else {
        Outcome::Expired { pnl_pct }
    });

    Some(EvaluatedOutcome {
        signal: signal.clone(),
        outcome,
        pnl_pct,
        favorable_excursion_pct: round2(favorable * 100.0),
        adverse_excursion_pct: round2(adverse * 100.0),
    })
}

// ============================================================
// AGGREGATED STATISTICS
// ============================================================

/// Per-kind historical reliability.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternStats {
    pub kind: PatternKind,
    pub occurrences: usize,
    pub wins: usize,
    pub losses: usize,
    pub still_active: usize,
    pub win_rate_pct: f64,
    pub avg_pnl_pct: f64,
    pub avg_favorable_pct: f64,
    pub avg_adverse_pct: f64,
    /// Average favorable excursion over average adverse excursion.
    pub risk_reward: f64,
    /// `0.5*win_rate + 25*min(occurrences/20, 1) + 25*min(risk_reward, 1)`.
    pub reliability: f64,
}

/// Historical backtest output.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct BacktestReport {
    pub windows_scanned: usize,
    pub detections: usize,
    pub stats: Vec<PatternStats>,
    /// Set when the series was too short to backtest.
    pub required_bars: Option<usize>,
}

/// Slide a detection window across the series, re-scan inside each window,
/// evaluate each detection forward and aggregate per-kind statistics.
pub fn backtest<T: Ohlcv>(
    scanner: &Scanner,
    bars: &[T],
    params: &BacktestParams,
) -> BacktestReport {
    if bars.len() < params.min_bars() {
        return BacktestReport {
            required_bars: Some(params.min_bars()),
            ..Default::default()
        };
    }

    let mut seen: HashSet<(PatternKind, usize)> = HashSet::new();
    let mut evaluations: Vec<EvaluatedOutcome> = Vec::new();
    let mut windows_scanned = 0usize;

    let last_start = bars.len() - params.window;
    let mut start = 0usize;
    while start <= last_start {
        windows_scanned += 1;
        let window = &bars[start..start + params.window];

        for mut signal in scanner.scan_patterns(window) {
            signal.bar_index += start;
            // Overlapping windows re-detect the same formation; identity is
            // (kind, absolute completion bar).
            if !seen.insert((signal.kind, signal.bar_index)) {
                continue;
            }
            if let Some(eval) = evaluate_one(&signal, bars, params) {
                evaluations.push(eval);
            }
        }
        start += params.step;
    }
    debug!(
        windows = windows_scanned,
        detections = evaluations.len(),
        "backtest replay complete"
    );

    let stats = aggregate(&evaluations, params);
    BacktestReport {
        windows_scanned,
        detections: evaluations.len(),
        stats,
        required_bars: None,
    }
}

fn aggregate(evaluations: &[EvaluatedOutcome], params: &BacktestParams) -> Vec<PatternStats> {
    let mut kinds: Vec<PatternKind> = Vec::new();
    for e in evaluations {
        if !kinds.contains(&e.signal.kind) {
            kinds.push(e.signal.kind);
        }
    }

    let mut stats: Vec<PatternStats> = kinds
        .into_iter()
        .map(|kind| {
            let of_kind: Vec<&EvaluatedOutcome> = evaluations
                .iter()
                .filter(|e| e.signal.kind == kind)
                .collect();
            let occurrences = of_kind.len();
            let decided: Vec<&&EvaluatedOutcome> =
                of_kind.iter().filter(|e| e.outcome.is_decided()).collect();
            let wins = decided.iter().filter(|e| e.outcome.is_win()).count();
            let losses = decided.len() - wins;
            let still_active = occurrences - decided.len();

            let win_rate_pct = if decided.is_empty() {
                0.0
            } else {
                wins as f64 / decided.len() as f64 * 100.0
            };
            let avg = |f: fn(&EvaluatedOutcome) -> f64| {
                if of_kind.is_empty() {
                    0.0
                } else {
                    of_kind.iter().map(|e| f(*e)).sum::<f64>() / of_kind.len() as f64
                }
            };
            let avg_pnl_pct = avg(|e| e.pnl_pct);
            let avg_favorable_pct = avg(|e| e.favorable_excursion_pct);
            let avg_adverse_pct = avg(|e| e.adverse_excursion_pct);
            // Capped so a zero adverse excursion stays representable.
            let risk_reward = if avg_adverse_pct > f64::EPSILON {
                (avg_favorable_pct / avg_adverse_pct).min(100.0)
            } else if avg_favorable_pct > 0.0 {
                100.0
            } else {
                0.0
            };

            let sample_credit =
                (occurrences as f64 / params.full_credit_occurrences as f64).min(1.0);
            let reliability = 0.5 * win_rate_pct + 25.0 * sample_credit + 25.0 * risk_reward.min(1.0);

            PatternStats {
                kind,
                occurrences,
                wins,
                losses,
                still_active,
                win_rate_pct: round2(win_rate_pct),
                avg_pnl_pct: round2(avg_pnl_pct),
                avg_favorable_pct: round2(avg_favorable_pct),
                avg_adverse_pct: round2(avg_adverse_pct),
                risk_reward: round2(risk_reward),
                reliability: round2(reliability),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.reliability
            .partial_cmp(&a.reliability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScannerBuilder;
    use crate::Bar;

    fn flat(i: usize) -> Bar {
        Bar::new(i as i64, 100.0, 100.5, 99.5, 100.0, 1_000.0)
    }

    fn signal_with_levels(bar_index: usize, entry: f64, target: f64, stop: f64) -> PatternSignal {
        PatternSignal::new(PatternKind::BullishEngulfing, bar_index, "").with_levels(
            entry, target, stop,
        )
    }

    #[test]
    fn target_hit_before_stop_is_success() {
        let mut bars: Vec<Bar> = (0..10).map(flat).collect();
        bars.push(Bar::new(10, 100.0, 106.0, 99.8, 105.0, 2_000.0));
        let log = vec![signal_with_levels(5, 100.5, 105.0, 95.0)];
        let evals = evaluate_outcomes(&log, &bars, &BacktestParams::default());
        assert_eq!(evals.len(), 1);
        assert!(matches!(evals[0].outcome, Outcome::Success { bars_to_target: 5 }));
        assert!(evals[0].favorable_excursion_pct > 0.0);
    }

    #[test]
    fn stop_first_is_failed() {
        let mut bars: Vec<Bar> = (0..10).map(flat).collect();
        bars.push(Bar::new(10, 100.0, 100.2, 94.0, 95.0, 2_000.0));
        let log = vec![signal_with_levels(5, 100.5, 105.0, 95.0)];
        let evals = evaluate_outcomes(&log, &bars, &BacktestParams::default());
        assert!(matches!(evals[0].outcome, Outcome::Failed { .. }));
    }

    #[test]
    fn unresolved_inside_window_is_active() {
        let bars: Vec<Bar> = (0..10).map(flat).collect();
        let log = vec![signal_with_levels(5, 100.5, 105.0, 95.0)];
        let evals = evaluate_outcomes(&log, &bars, &BacktestParams::default());
        assert_eq!(evals[0].outcome, Outcome::Active);
    }

    #[test]
    fn window_elapsed_is_expired_by_pnl_sign() {
        let bars: Vec<Bar> = (0..40).map(flat).collect();
        let log = vec![signal_with_levels(5, 100.5, 110.0, 90.0)];
        let evals = evaluate_outcomes(&log, &bars, &BacktestParams::default());
        match evals[0].outcome {
            Outcome::Expired { pnl_pct } => assert!(pnl_pct <= 0.0),
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn neutral_signals_are_skipped() {
        let bars: Vec<Bar> = (0..40).map(flat).collect();
        let log = vec![PatternSignal::new(PatternKind::Doji, 5, "")];
        assert!(evaluate_outcomes(&log, &bars, &BacktestParams::default()).is_empty());
    }

    #[test]
    fn short_series_reports_required_bars() {
        let scanner = ScannerBuilder::new().build().unwrap();
        let bars: Vec<Bar> = (0..50).map(flat).collect();
        let report = backtest(&scanner, &bars, &BacktestParams::default());
        assert_eq!(report.required_bars, Some(90));
        assert_eq!(report.windows_scanned, 0);
        assert!(report.stats.is_empty());
    }

    #[test]
    fn win_rate_is_consistent_with_counts() {
        let scanner = ScannerBuilder::new().build().unwrap();
        // Oscillating series long enough to produce detections.
        let bars: Vec<Bar> = (0..200)
            .map(|i| {
                let phase = (i as f64 * 0.35).sin();
                let base = 100.0 + phase * 6.0;
                let bullish = phase < 0.0;
                let (open, close) = if bullish {
                    (base - 0.6, base + 0.6)
                } else {
                    (base + 0.6, base - 0.6)
                };
                Bar::new(i as i64, open, base + 1.2, base - 1.2, close, 5_000.0 + (i % 7) as f64 * 500.0)
            })
            .collect();
        let report = backtest(&scanner, &bars, &BacktestParams::default());
        assert!(report.windows_scanned > 0);
        for s in &report.stats {
            let decided = s.wins + s.losses;
            assert_eq!(decided + s.still_active, s.occurrences);
            if decided > 0 {
                let expected = s.wins as f64 / decided as f64 * 100.0;
                assert!((s.win_rate_pct - round2(expected)).abs() < 1e-9);
            }
            assert!(s.reliability <= 100.0 + 1e-9);
        }
    }
}
