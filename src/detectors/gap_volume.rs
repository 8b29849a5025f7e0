//! Gap classification and volume anomaly detection.
//!
//! Gaps are classified against the 20-bar volume average: heavy volume
//! marks a breakaway, light volume an exhaustion. Opposite gaps within a
//! short span form island reversals. Volume anomalies cover climaxes,
//! dry-ups and flat-price accumulation/distribution via a linear volume
//! fit.

use crate::config::GapVolumeParams;
use crate::swing::linear_fit;
use crate::{pct_change, round2, safe_div, Ohlcv, OhlcvExt, PatternKind, PatternSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GapSide {
    Up,
    Down,
}

/// Scan recent bars for gaps, island reversals and volume anomalies.
pub fn detect_gap_volume<T: Ohlcv>(bars: &[T], params: &GapVolumeParams) -> Vec<PatternSignal> {
    if bars.len() < params.volume_avg_period + 1 {
        return Vec::new();
    }

    let mut signals = Vec::new();
    let start = bars.len().saturating_sub(params.lookback_bars).max(1);

    // Gap pass. Remember each gap's side for island detection.
    let mut gaps: Vec<(usize, GapSide)> = Vec::new();
    for i in start..bars.len() {
        let prev = &bars[i - 1];
        let curr = &bars[i];

        let side = if curr.low() > prev.high() {
            Some(GapSide::Up)
        } else if curr.high() < prev.low() {
            Some(GapSide::Down)
        } else {
            None
        };
        let Some(side) = side else { continue };

        let avg_volume = trailing_avg_volume(bars, i, params.volume_avg_period);
        let vol_ratio = safe_div(curr.volume(), avg_volume);
        let kind = match side {
            GapSide::Up if vol_ratio >= params.breakaway_volume_factor => {
                PatternKind::BreakawayGapUp
            }
            GapSide::Up if vol_ratio < params.exhaustion_volume_factor => {
                PatternKind::ExhaustionGapUp
            }
            GapSide::Up => PatternKind::GapUp,
            GapSide::Down if vol_ratio >= params.breakaway_volume_factor => {
                PatternKind::BreakawayGapDown
            }
            GapSide::Down if vol_ratio < params.exhaustion_volume_factor => {
                PatternKind::ExhaustionGapDown
            }
            GapSide::Down => PatternKind::GapDown,
        };
        signals.push(PatternSignal::new(
            kind,
            i,
            format!("volume {:.1}x 20-bar average", round2(vol_ratio)),
        ));

        // Opposite gap within the island span isolates the bars between.
        if let Some(&(prior_index, prior_side)) = gaps.last() {
            if prior_side != side && i - prior_index <= params.island_max_span {
                let kind = match side {
                    // Gap up then gap down strands an island top; reversed
                    // for a bottom.
                    GapSide::Down => PatternKind::IslandTop,
                    GapSide::Up => PatternKind::IslandBottom,
                };
                signals.push(PatternSignal::new(
                    kind,
                    i,
                    format!("opposite gaps {} bars apart", i - prior_index),
                ));
            }
        }
        gaps.push((i, side));
    }

    signals.extend(volume_anomalies(bars, params));
    signals
}

fn trailing_avg_volume<T: Ohlcv>(bars: &[T], at: usize, period: usize) -> f64 {
    let start = at.saturating_sub(period);
    let slice = &bars[start..at];
    if slice.is_empty() {
        return bars[at].volume();
    }
    slice.iter().map(|b| b.volume()).sum::<f64>() / slice.len() as f64
}

fn volume_anomalies<T: Ohlcv>(bars: &[T], params: &GapVolumeParams) -> Vec<PatternSignal> {
    let mut signals = Vec::new();
    let last = bars.len() - 1;
    let curr = &bars[last];
    let avg_volume = trailing_avg_volume(bars, last, params.volume_avg_period);

    // Climax: outsized volume, direction taken from candle color.
    let vol_ratio = safe_div(curr.volume(), avg_volume);
    if vol_ratio > params.climax_factor {
        let kind = if curr.is_bearish() {
            PatternKind::VolumeClimaxDown
        } else {
            PatternKind::VolumeClimaxUp
        };
        signals.push(PatternSignal::new(
            kind,
            last,
            format!("volume {:.1}x average", round2(vol_ratio)),
        ));
    }

    // Dry-up: a run of consecutive quiet bars ending at the last bar.
    let mut run = 0usize;
    for i in (0..=last).rev() {
        let avg = trailing_avg_volume(bars, i, params.volume_avg_period);
        if avg > 0.0 && bars[i].volume() < avg * params.dryup_factor {
            run += 1;
        } else {
            break;
        }
    }
    if run >= params.dryup_min_run {
        signals.push(PatternSignal::new(
            PatternKind::VolumeDryUp,
            last,
            format!("{run} consecutive bars under {:.0}% of average", params.dryup_factor * 100.0),
        ));
    }

    // Accumulation/distribution: flat price with a clear volume trend.
    if bars.len() >= params.quiet_window {
        let window = &bars[bars.len() - params.quiet_window..];
        let hi = window.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max);
        let lo = window.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min);
        let flat = safe_div(hi - lo, lo) < params.quiet_range_pct;

        if flat {
            let xs: Vec<f64> = (0..window.len()).map(|i| i as f64).collect();
            let vols: Vec<f64> = window.iter().map(|b| b.volume()).collect();
            if let Some(fit) = linear_fit(&xs, &vols) {
                let mean_vol = vols.iter().sum::<f64>() / vols.len() as f64;
                // Require the fitted trend to move at least 1% of mean
                // volume per bar either way.
                let per_bar = safe_div(fit.slope, mean_vol);
                if per_bar > 0.01 {
                    signals.push(PatternSignal::new(
                        PatternKind::Accumulation,
                        last,
                        format!(
                            "price range {:.1}% with rising volume",
                            round2(pct_change(lo, hi) * 100.0)
                        ),
                    ));
                } else if per_bar < -0.01 {
                    signals.push(PatternSignal::new(
                        PatternKind::Distribution,
                        last,
                        format!(
                            "price range {:.1}% with falling volume",
                            round2(pct_change(lo, hi) * 100.0)
                        ),
                    ));
                }
            }
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn quiet(i: usize, volume: f64) -> Bar {
        Bar::new(i as i64, 100.0, 101.0, 99.0, 100.5, volume)
    }

    #[test]
    fn short_series_is_empty() {
        let bars: Vec<Bar> = (0..10).map(|i| quiet(i, 1_000.0)).collect();
        assert!(detect_gap_volume(&bars, &GapVolumeParams::default()).is_empty());
    }

    #[test]
    fn breakaway_gap_on_heavy_volume() {
        let mut bars: Vec<Bar> = (0..25).map(|i| quiet(i, 1_000.0)).collect();
        // Gap up: low above prior high, 3x volume.
        bars.push(Bar::new(25, 102.0, 104.0, 101.5, 103.5, 3_000.0));

        let signals = detect_gap_volume(&bars, &GapVolumeParams::default());
        assert!(signals.iter().any(|s| s.kind == PatternKind::BreakawayGapUp));
    }

    #[test]
    fn exhaustion_gap_on_light_volume() {
        let mut bars: Vec<Bar> = (0..25).map(|i| quiet(i, 1_000.0)).collect();
        bars.push(Bar::new(25, 102.0, 104.0, 101.5, 103.5, 500.0));

        let signals = detect_gap_volume(&bars, &GapVolumeParams::default());
        assert!(signals.iter().any(|s| s.kind == PatternKind::ExhaustionGapUp));
    }

    #[test]
    fn island_top_from_opposite_gaps() {
        let mut bars: Vec<Bar> = (0..25).map(|i| quiet(i, 1_000.0)).collect();
        // Gap up, two stranded bars, gap back down.
        bars.push(Bar::new(25, 103.0, 105.0, 102.0, 104.0, 1_000.0));
        bars.push(Bar::new(26, 104.0, 105.5, 103.0, 104.5, 1_000.0));
        bars.push(Bar::new(27, 101.0, 101.8, 100.0, 100.5, 1_000.0));

        let signals = detect_gap_volume(&bars, &GapVolumeParams::default());
        assert!(signals.iter().any(|s| s.kind == PatternKind::IslandTop));
    }

    #[test]
    fn dry_up_needs_a_run() {
        let mut bars: Vec<Bar> = (0..25).map(|i| quiet(i, 1_000.0)).collect();
        for i in 0..4 {
            bars.push(quiet(25 + i, 200.0));
        }
        let signals = detect_gap_volume(&bars, &GapVolumeParams::default());
        assert!(signals.iter().any(|s| s.kind == PatternKind::VolumeDryUp));
    }

    #[test]
    fn accumulation_on_flat_price_rising_volume() {
        let mut bars: Vec<Bar> = (0..25).map(|i| quiet(i, 1_000.0)).collect();
        for i in 0..15 {
            bars.push(quiet(25 + i, 1_000.0 + i as f64 * 120.0));
        }
        let signals = detect_gap_volume(&bars, &GapVolumeParams::default());
        assert!(signals.iter().any(|s| s.kind == PatternKind::Accumulation));
    }
}
