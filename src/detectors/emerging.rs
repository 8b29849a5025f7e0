//! Partially-formed pattern detection.
//!
//! Each emerging structure reports how much of the expected geometry has
//! materialized (`progress`, 0-100), the price that would complete it
//! (`watch_level`) and the price that would negate it (`invalidation`).
//! The geometric rules are shared with the confirmed-pattern detector
//! (same slope classification, same tolerances) applied at earlier
//! completion thresholds.

use super::chart::{boundary_pattern, classify_slope};
use crate::config::ChartParams;
use crate::swing::{fit_swings, swing_highs, swing_lows, SwingPoint};
use crate::{pct_change, round2, safe_div, Direction, Ohlcv, PatternKind, PatternSignal};

/// Closed set of partially-formed structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EmergingKind {
    FormingDoubleTop,
    FormingDoubleBottom,
    FormingTripleTop,
    FormingTripleBottom,
    FormingHeadAndShoulders,
    FormingInverseHeadAndShoulders,
    FormingAscendingTriangle,
    FormingDescendingTriangle,
    FormingSymmetricalTriangle,
    FormingRisingWedge,
    FormingFallingWedge,
    FormingAscendingChannel,
    FormingDescendingChannel,
    FormingBullFlag,
    FormingBearFlag,
    FormingCup,
}

impl EmergingKind {
    pub fn name(self) -> &'static str {
        use EmergingKind::*;
        match self {
            FormingDoubleTop => "Forming Double Top",
            FormingDoubleBottom => "Forming Double Bottom",
            FormingTripleTop => "Forming Triple Top",
            FormingTripleBottom => "Forming Triple Bottom",
            FormingHeadAndShoulders => "Forming Head and Shoulders",
            FormingInverseHeadAndShoulders => "Forming Inverse Head and Shoulders",
            FormingAscendingTriangle => "Forming Ascending Triangle",
            FormingDescendingTriangle => "Forming Descending Triangle",
            FormingSymmetricalTriangle => "Forming Symmetrical Triangle",
            FormingRisingWedge => "Forming Rising Wedge",
            FormingFallingWedge => "Forming Falling Wedge",
            FormingAscendingChannel => "Forming Ascending Channel",
            FormingDescendingChannel => "Forming Descending Channel",
            FormingBullFlag => "Forming Bull Flag",
            FormingBearFlag => "Forming Bear Flag",
            FormingCup => "Forming Cup",
        }
    }

    /// The confirmed pattern this structure completes into.
    pub fn completes_into(self) -> PatternKind {
        use EmergingKind::*;
        match self {
            FormingDoubleTop | FormingTripleTop => PatternKind::DoubleTop,
            FormingDoubleBottom | FormingTripleBottom => PatternKind::DoubleBottom,
            FormingHeadAndShoulders => PatternKind::HeadAndShoulders,
            FormingInverseHeadAndShoulders => PatternKind::InverseHeadAndShoulders,
            FormingAscendingTriangle => PatternKind::AscendingTriangle,
            FormingDescendingTriangle => PatternKind::DescendingTriangle,
            FormingSymmetricalTriangle => PatternKind::SymmetricalTriangle,
            FormingRisingWedge => PatternKind::RisingWedge,
            FormingFallingWedge => PatternKind::FallingWedge,
            FormingAscendingChannel => PatternKind::AscendingChannel,
            FormingDescendingChannel => PatternKind::DescendingChannel,
            FormingBullFlag => PatternKind::BullFlag,
            FormingBearFlag => PatternKind::BearFlag,
            FormingCup => PatternKind::CupAndHandle,
        }
    }

    pub fn bias(self) -> Direction {
        self.completes_into().bias()
    }
}

/// A partially-formed structure with its completion/negation levels.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmergingPattern {
    pub kind: EmergingKind,
    pub direction: Direction,
    /// How much of the expected geometry has materialized, 0-100.
    pub progress: f64,
    /// Price that would complete the pattern.
    pub watch_level: f64,
    /// Price that would negate it.
    pub invalidation: f64,
    pub description: String,
}

impl EmergingPattern {
    fn new(
        kind: EmergingKind,
        progress: f64,
        watch_level: f64,
        invalidation: f64,
        description: String,
    ) -> Self {
        Self {
            kind,
            direction: kind.bias(),
            progress: round2(progress.clamp(0.0, 100.0)),
            watch_level: round2(watch_level),
            invalidation: round2(invalidation),
            description,
        }
    }
}

/// Scan for partially-formed structures.
pub fn detect_emerging_patterns<T: Ohlcv>(bars: &[T], params: &ChartParams) -> Vec<EmergingPattern> {
    if bars.len() < params.min_bars {
        return Vec::new();
    }

    let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close()).collect();
    let price = closes[closes.len() - 1];

    let sh = swing_highs(&highs, params.swing_order);
    let sl = swing_lows(&lows, params.swing_order);

    let mut out = Vec::new();
    out.extend(forming_retest(&sh, &lows, price, params, true));
    out.extend(forming_retest(&sl, &highs, price, params, false));
    out.extend(forming_head_shoulders(&sh, &lows, price, params, true));
    out.extend(forming_head_shoulders(&sl, &highs, price, params, false));
    out.extend(forming_boundary(&sh, &sl, &closes, params));
    out.extend(forming_flag(bars, params));
    out.extend(forming_cup(&sh, &lows, price, params));
    out
}

// ============================================================
// DOUBLE / TRIPLE RE-TEST
// ============================================================

/// Price returning toward one (double) or two (triple) matched prior
/// extremes. Same tolerance as the confirmed double top/bottom test; the
/// missing piece is the final touch.
fn forming_retest(
    swings: &[SwingPoint],
    opposite: &[f64],
    price: f64,
    params: &ChartParams,
    tops: bool,
) -> Option<EmergingPattern> {
    let last = swings.last()?;
    let level = last.price;

    // Approach from below (tops) / above (bottoms) without having touched.
    let gap = if tops {
        safe_div(level - price, level)
    } else {
        safe_div(price - level, level)
    };
    if gap <= 0.0 || gap > 0.05 {
        return None;
    }

    // Matched prior extremes at the same level decide double vs triple.
    let matched_prior = swings[..swings.len() - 1]
        .iter()
        .filter(|p| safe_div((p.price - level).abs(), level) <= params.double_tolerance)
        .count();

    let neckline = if tops {
        opposite[last.index..].iter().cloned().fold(f64::INFINITY, f64::min)
    } else {
        opposite[last.index..]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    };

    let kind = match (tops, matched_prior > 0) {
        (true, false) => EmergingKind::FormingDoubleTop,
        (false, false) => EmergingKind::FormingDoubleBottom,
        (true, true) => EmergingKind::FormingTripleTop,
        (false, true) => EmergingKind::FormingTripleBottom,
    };
    // Closer to the prior extreme = further along; the touch is the last
    // 50% of the formation.
    let progress = 50.0 + 50.0 * (1.0 - gap / 0.05);
    let invalidation = if tops {
        level * (1.0 + params.double_tolerance)
    } else {
        level * (1.0 - params.double_tolerance)
    };

    Some(EmergingPattern::new(
        kind,
        progress,
        neckline,
        invalidation,
        format!(
            "price {:.2} approaching prior extreme {:.2}",
            round2(price),
            round2(level)
        ),
    ))
}

// ============================================================
// HEAD & SHOULDERS
// ============================================================

/// Left shoulder + dominant head in place, price falling back toward the
/// left-shoulder level where the right shoulder would form.
fn forming_head_shoulders(
    swings: &[SwingPoint],
    opposite: &[f64],
    price: f64,
    params: &ChartParams,
    regular: bool,
) -> Option<EmergingPattern> {
    if swings.len() < 2 {
        return None;
    }
    let head = &swings[swings.len() - 1];
    let shoulder = &swings[swings.len() - 2];

    let head_dominates = if regular {
        head.price > shoulder.price
    } else {
        head.price < shoulder.price
    };
    if !head_dominates {
        return None;
    }
    // Head must clear the shoulder by more than the symmetry tolerance,
    // otherwise this is a double-extreme shape.
    if safe_div((head.price - shoulder.price).abs(), shoulder.price) <= params.shoulder_tolerance {
        return None;
    }

    // Price must have left the head toward the shoulder level.
    let retraced = if regular {
        price < head.price && price > shoulder.price * (1.0 - params.shoulder_tolerance)
    } else {
        price > head.price && price < shoulder.price * (1.0 + params.shoulder_tolerance)
    };
    if !retraced {
        return None;
    }

    let neckline = if regular {
        opposite[shoulder.index..]
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min)
    } else {
        opposite[shoulder.index..]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    };

    // Two of three peaks in place = 66%; the remainder tracks how close
    // price has come back to the shoulder level.
    let span = (head.price - shoulder.price).abs();
    let returned = (head.price - price).abs().min(span);
    let progress = 66.0 + 34.0 * safe_div(returned, span);

    let kind = if regular {
        EmergingKind::FormingHeadAndShoulders
    } else {
        EmergingKind::FormingInverseHeadAndShoulders
    };
    let invalidation = head.price;

    Some(EmergingPattern::new(
        kind,
        progress,
        neckline,
        invalidation,
        format!(
            "head {:.2}, left shoulder {:.2}, right shoulder pending",
            round2(head.price),
            round2(shoulder.price)
        ),
    ))
}

// ============================================================
// BOUNDARY STRUCTURES
// ============================================================

/// Converging/parallel boundaries still in force: same slope rules as the
/// confirmed detector, with progress measured toward the apex (converging)
/// or by boundary touches (parallel).
fn forming_boundary(
    sh: &[SwingPoint],
    sl: &[SwingPoint],
    closes: &[f64],
    params: &ChartParams,
) -> Option<EmergingPattern> {
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

    let start_x = recent_highs[0].index.min(recent_lows[0].index) as f64;
    let gap_start = res_fit.value_at(start_x) - sup_fit.value_at(start_x);
    let gap_now = res_fit.value_at(last_index as f64) - sup_fit.value_at(last_index as f64);
    if gap_start <= 0.0 || gap_now <= 0.0 {
        return None;
    }
    let converging = gap_now < gap_start * 0.9;

    let confirmed = boundary_pattern(res, sup, converging)?;
    let kind = match confirmed {
        PatternKind::AscendingTriangle => EmergingKind::FormingAscendingTriangle,
        PatternKind::DescendingTriangle => EmergingKind::FormingDescendingTriangle,
        PatternKind::SymmetricalTriangle => EmergingKind::FormingSymmetricalTriangle,
        PatternKind::RisingWedge => EmergingKind::FormingRisingWedge,
        PatternKind::FallingWedge => EmergingKind::FormingFallingWedge,
        PatternKind::AscendingChannel => EmergingKind::FormingAscendingChannel,
        PatternKind::DescendingChannel => EmergingKind::FormingDescendingChannel,
        // Flat-flat boxes are reported by the confirmed detector alone.
        _ => return None,
    };

    let resistance_now = res_fit.value_at(last_index as f64);
    let support_now = sup_fit.value_at(last_index as f64);
    // Price must still be inside the structure.
    if price > resistance_now || price < support_now {
        return None;
    }

    let progress = if converging {
        (1.0 - gap_now / gap_start) * 100.0
    } else {
        // Parallel structures mature with boundary touches.
        25.0 * (recent_highs.len() + recent_lows.len()) as f64 / 2.0
    };

    let (watch, invalidation) = if kind.bias().is_bearish() {
        (support_now, resistance_now)
    } else {
        (resistance_now, support_now)
    };

    Some(EmergingPattern::new(
        kind,
        progress,
        watch,
        invalidation,
        format!(
            "boundaries {:.2}/{:.2}, gap {:.1}% of start",
            round2(resistance_now),
            round2(support_now),
            round2(gap_now / gap_start * 100.0)
        ),
    ))
}

// ============================================================
// FLAG / CUP
// ============================================================

/// A completed pole with a consolidation still shorter than the confirmed
/// flag requires.
fn forming_flag<T: Ohlcv>(bars: &[T], params: &ChartParams) -> Option<EmergingPattern> {
    // Try each consolidation length below the confirmed minimum.
    for cons_len in (3..params.flag_min_bars).rev() {
        let need = params.pole_bars + cons_len;
        if bars.len() < need {
            continue;
        }
        let flag_start = bars.len() - cons_len;
        let pole_start = flag_start - params.pole_bars;
        let pole_move = pct_change(bars[pole_start].close(), bars[flag_start - 1].close());
        if pole_move.abs() < params.pole_min_move {
            continue;
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
            continue;
        }

        let (kind, watch, invalidation) = if pole_move > 0.0 {
            (EmergingKind::FormingBullFlag, cons_high, cons_low)
        } else {
            (EmergingKind::FormingBearFlag, cons_low, cons_high)
        };
        let progress = cons_len as f64 / params.flag_min_bars as f64 * 100.0;
        return Some(EmergingPattern::new(
            kind,
            progress,
            watch,
            invalidation,
            format!(
                "{:.1}% pole, {cons_len} of {} consolidation bars",
                round2(pole_move * 100.0),
                params.flag_min_bars
            ),
        ));
    }
    None
}

/// A left lip and bottom in place, price recovering toward the lip. The
/// rim touch and handle are the final stretch.
fn forming_cup(
    sh: &[SwingPoint],
    lows: &[f64],
    price: f64,
    params: &ChartParams,
) -> Option<EmergingPattern> {
    let lip = sh.last()?;
    if lip.index + params.min_peak_separation >= lows.len() {
        return None;
    }
    let bottom = lows[lip.index..].iter().cloned().fold(f64::INFINITY, f64::min);
    let depth = lip.price - bottom;
    if depth <= lip.price * 0.02 {
        return None;
    }
    // Recovering but not yet back at the rim.
    if price <= bottom || price >= lip.price * (1.0 - params.cup_lip_tolerance / 2.0) {
        return None;
    }

    // Rim recovery is 80% of the formation; the handle is the rest.
    let progress = safe_div(price - bottom, depth) * 80.0;
    Some(EmergingPattern::new(
        EmergingKind::FormingCup,
        progress,
        lip.price,
        bottom,
        format!(
            "lip {:.2}, bottom {:.2}, recovering at {:.2}",
            round2(lip.price),
            round2(bottom),
            round2(price)
        ),
    ))
}

/// Reduce an emerging pattern to a provisional signal (confidence scaled
/// by progress) for confluence counting.
pub fn to_provisional_signal(pattern: &EmergingPattern, bar_index: usize) -> PatternSignal {
    let kind = pattern.kind.completes_into();
    let confidence = kind.base_confidence() * pattern.progress / 100.0 * 0.5;
    PatternSignal::new(kind, bar_index, pattern.description.clone()).with_confidence(confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bar(i: usize, low: f64, high: f64, close: f64) -> Bar {
        Bar::new(i as i64, close, high, low, close, 1_000.0)
    }

    #[test]
    fn short_series_is_empty() {
        let bars: Vec<Bar> = (0..10).map(|i| bar(i, 99.0, 101.0, 100.0)).collect();
        assert!(detect_emerging_patterns(&bars, &ChartParams::default()).is_empty());
    }

    #[test]
    fn forming_double_top_near_prior_high() {
        // One clear swing high at 110, pullback, approach to 108.
        let profile = [
            100.0, 101.5, 103.0, 104.5, 106.0, 108.0, 110.0, 108.0, 106.0, 104.0, 102.0, 101.0,
            102.0, 103.5, 105.0, 106.5, 108.0,
        ];
        let mut bars: Vec<Bar> = (0..15).map(|i| bar(i, 97.5, 99.0, 98.0)).collect();
        bars.extend(
            profile
                .iter()
                .enumerate()
                .map(|(i, &p)| bar(15 + i, p - 0.5, p + 0.5, p)),
        );

        let emerging = detect_emerging_patterns(&bars, &ChartParams::default());
        let forming = emerging
            .iter()
            .find(|e| e.kind == EmergingKind::FormingDoubleTop)
            .expect("forming double top");
        assert!(forming.progress > 50.0);
        assert!(forming.invalidation > 110.0);
        assert!(forming.watch_level < 108.0);
    }

    #[test]
    fn progress_is_clamped() {
        let p = EmergingPattern::new(
            EmergingKind::FormingCup,
            150.0,
            10.0,
            5.0,
            String::new(),
        );
        assert_eq!(p.progress, 100.0);
    }

    #[test]
    fn emerging_kind_maps_to_confirmed_family() {
        assert_eq!(
            EmergingKind::FormingSymmetricalTriangle.completes_into(),
            PatternKind::SymmetricalTriangle
        );
        assert_eq!(EmergingKind::FormingCup.bias(), Direction::Bullish);
    }
}
