//! Chart-geometry pattern detection over swing structure.
//!
//! Every pattern has an explicit geometric test on swing highs/lows, and
//! each family reports at most its first (earliest-qualifying) match per
//! call, keeping output bounded. Entry/target/stop levels are always
//! derived from the measured geometry (target = neckline +/- pattern
//! height and so on), never fixed prices. Requires >= `min_bars` bars,
//! otherwise returns an empty list.

use crate::config::ChartParams;
use crate::swing::{fit_swings, swing_highs, swing_lows, LineFit, SwingPoint};
use crate::{pct_change, round2, safe_div, Ohlcv, PatternKind, PatternSignal};

/// Slope classification of a fitted boundary line, relative to price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slope {
    Rising,
    Falling,
    Flat,
}

/// Classify a boundary slope: per-bar change below `flat_per_bar` of the
/// reference price is flat. The same rule drives confirmed and emerging
/// triangle/wedge/channel detection.
pub(crate) fn classify_slope(fit: &LineFit, ref_price: f64, flat_per_bar: f64) -> Slope {
    let per_bar = safe_div(fit.slope, ref_price);
    if per_bar.abs() <= flat_per_bar {
        Slope::Flat
    } else if per_bar > 0.0 {
        Slope::Rising
    } else {
        Slope::Falling
    }
}

/// Resolve the triangle/wedge/channel/rectangle family from boundary
/// slopes. `converging` distinguishes wedges from channels when both
/// boundaries move the same way.
pub(crate) fn boundary_pattern(
    resistance: Slope,
    support: Slope,
    converging: bool,
) -> Option<PatternKind> {
    match (resistance, support) {
        (Slope::Flat, Slope::Rising) => Some(PatternKind::AscendingTriangle),
        (Slope::Falling, Slope::Flat) => Some(PatternKind::DescendingTriangle),
        (Slope::Falling, Slope::Rising) => Some(PatternKind::SymmetricalTriangle),
        (Slope::Flat, Slope::Flat) => Some(PatternKind::Rectangle),
        (Slope::Rising, Slope::Rising) => Some(if converging {
            PatternKind::RisingWedge
        } else {
            PatternKind::AscendingChannel
        }),
        (Slope::Falling, Slope::Falling) => Some(if converging {
            PatternKind::FallingWedge
        } else {
            PatternKind::DescendingChannel
        }),
        _ => None,
    }
}

/// Scan for chart-geometry patterns.
pub fn detect_chart_patterns<T: Ohlcv>(bars: &[T], params: &ChartParams) -> Vec<PatternSignal> {
    if bars.len() < params.min_bars {
        return Vec::new();
    }

    let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();

    let sh = swing_highs(&highs, params.swing_order);
    let sl = swing_lows(&lows, params.swing_order);

    let mut signals = Vec::new();
    signals.extend(double_extreme(&sh, &closes, params, true));
    signals.extend(double_extreme(&sl, &closes, params, false));
    signals.extend(head_shoulders(&sh, &lows, params, true));
    signals.extend(head_shoulders(&sl, &highs, params, false));
    signals.extend(boundary_structure(&sh, &sl, &closes, params));
    signals.extend(flag(bars, params));
    signals.extend(cup_and_handle(&sh, &lows, bars.len(), params));
    signals
}

// ============================================================
// DOUBLE TOP / BOTTOM
// ============================================================

/// Earliest pair of same-type extrema within tolerance, separated by at
/// least `min_peak_separation` bars. Neckline is the extreme close between
/// them.
fn double_extreme(
    swings: &[SwingPoint],
    closes: &[f64],
    params: &ChartParams,
    tops: bool,
) -> Option<PatternSignal> {
    for (a_pos, a) in swings.iter().enumerate() {
        for b in swings.iter().skip(a_pos + 1) {
            if b.index - a.index < params.min_peak_separation {
                continue;
            }
            if safe_div((a.price - b.price).abs(), a.price) > params.double_tolerance {
                continue;
            }

            let between = &closes[a.index..=b.index];
            let neckline = if tops {
                between.iter().cloned().fold(f64::INFINITY, f64::min)
            } else {
                between.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            };
            let extreme = if tops {
                a.price.max(b.price)
            } else {
                a.price.min(b.price)
            };
            let height = (extreme - neckline).abs();

            let (kind, target) = if tops {
                (PatternKind::DoubleTop, neckline - height)
            } else {
                (PatternKind::DoubleBottom, neckline + height)
            };
            return Some(
                PatternSignal::new(
                    kind,
                    b.index,
                    format!(
                        "extremes {:.2}/{:.2}, neckline {:.2}",
                        round2(a.price),
                        round2(b.price),
                        round2(neckline)
                    ),
                )
                .with_levels(neckline, target, extreme),
            );
        }
    }
    None
}

// ============================================================
// HEAD & SHOULDERS
// ============================================================

/// Three consecutive same-type extrema: strictly most-extreme head between
/// shoulders matched within tolerance. `regular` = tops (bearish);
/// otherwise the inverse form on lows.
fn head_shoulders(
    swings: &[SwingPoint],
    opposite_extremes: &[f64],
    params: &ChartParams,
    regular: bool,
) -> Option<PatternSignal> {
    for triple in swings.windows(3) {
        let (left, head, right) = (&triple[0], &triple[1], &triple[2]);

        let head_dominates = if regular {
            head.price > left.price && head.price > right.price
        } else {
            head.price < left.price && head.price < right.price
        };
        if !head_dominates {
            continue;
        }
        if safe_div((left.price - right.price).abs(), left.price) > params.shoulder_tolerance {
            continue;
        }

        // Neckline from the opposite extremes spanned by the formation.
        let span = &opposite_extremes[left.index..=right.index];
        let neckline = if regular {
            span.iter().cloned().fold(f64::INFINITY, f64::min)
        } else {
            span.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        };
        let height = (head.price - neckline).abs();

        let (kind, target) = if regular {
            (PatternKind::HeadAndShoulders, neckline - height)
        } else {
            (PatternKind::InverseHeadAndShoulders, neckline + height)
        };
        return Some(
            PatternSignal::new(
                kind,
                right.index,
                format!(
                    "head {:.2}, shoulders {:.2}/{:.2}, neckline {:.2}",
                    round2(head.price),
                    round2(left.price),
                    round2(right.price),
                    round2(neckline)
                ),
            )
            .with_levels(neckline, target, head.price),
        );
    }
    None
}

// ============================================================
// TRIANGLES / WEDGES / CHANNELS / RECTANGLE
// ============================================================

/// Compare the last 2-3 swing highs against the last 2-3 swing lows.
fn boundary_structure(
    sh: &[SwingPoint],
    sl: &[SwingPoint],
    closes: &[f64],
    params: &ChartParams,
) -> Option<PatternSignal> {
    if sh.len() < 2 || sl.len() < 2 {
        return None;
    }
    let recent_highs = &sh[sh.len().saturating_sub(3)..];
    let recent_lows = &sl[sl.len().saturating_sub(3)..];

    let res_fit = fit_swings(recent_highs)?;
    let sup_fit = fit_swings(recent_lows)?;
    let last_index = closes.len() - 1;
    let price = closes[last_index];

    let res = classify_slope(&res_fit, price, params.flat_slope_per_bar);
    let sup = classify_slope(&sup_fit, price, params.flat_slope_per_bar);

    // Converging boundaries close their gap as bars advance.
    let start_x = recent_highs[0].index.min(recent_lows[0].index) as f64;
    let gap_start = res_fit.value_at(start_x) - sup_fit.value_at(start_x);
    let gap_now = res_fit.value_at(last_index as f64) - sup_fit.value_at(last_index as f64);
    let converging = gap_now < gap_start * 0.9;

    let kind = boundary_pattern(res, sup, converging)?;

    let resistance_now = res_fit.value_at(last_index as f64);
    let support_now = sup_fit.value_at(last_index as f64);
    let height = (gap_start).abs();
    let (entry, target, stop) = if kind.bias().is_bearish() {
        (support_now, support_now - height, resistance_now)
    } else {
        (resistance_now, resistance_now + height, support_now)
    };

    Some(
        PatternSignal::new(
            kind,
            last_index,
            format!(
                "resistance {:.2}, support {:.2} over {} swings",
                round2(resistance_now),
                round2(support_now),
                recent_highs.len() + recent_lows.len()
            ),
        )
        .with_levels(entry, target, stop),
    )
}

// ============================================================
// FLAGS
// ============================================================

/// Directional pole followed by a tight consolidation: a move of at least
/// `pole_min_move` over `pole_bars`, then at least `flag_min_bars` bars
/// whose total range stays within `flag_max_range` of the pole range.
fn flag<T: Ohlcv>(bars: &[T], params: &ChartParams) -> Option<PatternSignal> {
    let need = params.pole_bars + params.flag_min_bars;
    if bars.len() < need {
        return None;
    }

    let flag_start = bars.len() - params.flag_min_bars;
    let pole_start = flag_start - params.pole_bars;
    let pole_move = pct_change(bars[pole_start].close(), bars[flag_start - 1].close());
    if pole_move.abs() < params.pole_min_move {
        return None;
    }

    let pole_range = (bars[flag_start - 1].close() - bars[pole_start].close()).abs();
    let consolidation = &bars[flag_start..];
    let cons_high = consolidation
        .iter()
        .map(|b| b.high())
        .fold(f64::NEG_INFINITY, f64::max);
    let cons_low = consolidation
        .iter()
        .map(|b| b.low())
        .fold(f64::INFINITY, f64::min);
    if cons_high - cons_low > pole_range * params.flag_max_range {
        return None;
    }

    let last_index = bars.len() - 1;
    let (kind, entry, target, stop) = if pole_move > 0.0 {
        (
            PatternKind::BullFlag,
            cons_high,
            cons_high + pole_range,
            cons_low,
        )
    } else {
        (
            PatternKind::BearFlag,
            cons_low,
            cons_low - pole_range,
            cons_high,
        )
    };

    Some(
        PatternSignal::new(
            kind,
            last_index,
            format!(
                "{:.1}% pole, consolidation {:.2}-{:.2}",
                round2(pole_move * 100.0),
                round2(cons_low),
                round2(cons_high)
            ),
        )
        .with_levels(entry, target, stop),
    )
}

// ============================================================
// CUP & HANDLE
// ============================================================

/// Two matched lips around a strictly-lowest bottom, then a shallow
/// pullback (the handle) after the right-lip recovery.
fn cup_and_handle(
    sh: &[SwingPoint],
    lows: &[f64],
    len: usize,
    params: &ChartParams,
) -> Option<PatternSignal> {
    for (a_pos, left) in sh.iter().enumerate() {
        for right in sh.iter().skip(a_pos + 1) {
            if right.index - left.index < params.min_peak_separation * 2 {
                continue;
            }
            // Right lip within tolerance of left, and not below it.
            if right.price < left.price
                || safe_div(right.price - left.price, left.price) > params.cup_lip_tolerance
            {
                continue;
            }

            let bottom = lows[left.index..=right.index]
                .iter()
                .cloned()
                .fold(f64::INFINITY, f64::min);
            let depth = left.price - bottom;
            if depth <= left.price * 0.02 {
                continue;
            }

            // Handle: pullback after the right lip that stays in the upper
            // half of the cup.
            let after = &lows[right.index..len];
            if after.len() < 3 {
                continue;
            }
            let handle_low = after.iter().cloned().fold(f64::INFINITY, f64::min);
            if handle_low <= bottom + depth * 0.5 {
                continue;
            }

            return Some(
                PatternSignal::new(
                    PatternKind::CupAndHandle,
                    len - 1,
                    format!(
                        "lips {:.2}/{:.2}, bottom {:.2}, handle low {:.2}",
                        round2(left.price),
                        round2(right.price),
                        round2(bottom),
                        round2(handle_low)
                    ),
                )
                .with_levels(right.price, right.price + depth, handle_low),
            );
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bar(i: usize, low: f64, high: f64) -> Bar {
        let mid = (low + high) / 2.0;
        Bar::new(i as i64, mid, high, low, mid, 1_000.0)
    }

    #[test]
    fn below_min_bars_is_empty() {
        let bars: Vec<Bar> = (0..10).map(|i| bar(i, 99.0, 101.0)).collect();
        assert!(detect_chart_patterns(&bars, &ChartParams::default()).is_empty());
    }

    #[test]
    fn double_top_from_matched_peaks() {
        // Rise to a peak, dip, rise to an equal peak, fall off.
        let profile = [
            95.0, 96.0, 97.0, 98.0, 100.0, 98.0, 96.5, 95.0, 94.0, 93.5, 94.5, 95.5, 97.0, 98.5,
            100.1, 98.0, 96.0, 94.0, 93.0, 92.0,
        ];
        let mut bars: Vec<Bar> = (0..12).map(|i| bar(i, 89.0, 90.5)).collect();
        bars.extend(
            profile
                .iter()
                .enumerate()
                .map(|(i, &p)| bar(12 + i, p - 0.5, p + 0.5)),
        );

        let signals = detect_chart_patterns(&bars, &ChartParams::default());
        let dt = signals
            .iter()
            .find(|s| s.kind == PatternKind::DoubleTop)
            .expect("double top detected");
        assert!(dt.target.unwrap() < dt.entry_trigger.unwrap());
        assert!(dt.stop_loss.unwrap() > dt.entry_trigger.unwrap());
    }

    #[test]
    fn boundary_pattern_table() {
        assert_eq!(
            boundary_pattern(Slope::Flat, Slope::Rising, true),
            Some(PatternKind::AscendingTriangle)
        );
        assert_eq!(
            boundary_pattern(Slope::Falling, Slope::Flat, true),
            Some(PatternKind::DescendingTriangle)
        );
        assert_eq!(
            boundary_pattern(Slope::Flat, Slope::Flat, false),
            Some(PatternKind::Rectangle)
        );
        assert_eq!(
            boundary_pattern(Slope::Rising, Slope::Rising, false),
            Some(PatternKind::AscendingChannel)
        );
        assert_eq!(boundary_pattern(Slope::Rising, Slope::Falling, true), None);
    }

    #[test]
    fn bull_flag_pole_and_consolidation() {
        // 12 quiet bars, 8-bar pole up ~8%, then 10 tight bars.
        let mut bars: Vec<Bar> = (0..12).map(|i| bar(i, 99.5, 100.5)).collect();
        for i in 0..8 {
            let base = 100.0 + (i + 1) as f64;
            bars.push(bar(12 + i, base - 0.4, base + 0.4));
        }
        for i in 0..10 {
            bars.push(bar(20 + i, 107.2, 108.2));
        }

        let signals = detect_chart_patterns(&bars, &ChartParams::default());
        let flag = signals
            .iter()
            .find(|s| s.kind == PatternKind::BullFlag)
            .expect("bull flag detected");
        assert!(flag.target.unwrap() > flag.entry_trigger.unwrap());
    }
}
