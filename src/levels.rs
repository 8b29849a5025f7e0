//! Fibonacci retracement/extension levels, regression trend lines and a
//! swing-derived support/resistance snapshot.

use crate::config::LevelParams;
use crate::swing::{fit_swings, swing_highs, swing_lows};
use crate::{round2, round4, safe_div, Direction, Ohlcv, PatternKind, PatternSignal};

/// Standard retracement ratios, shallow to deep.
const RETRACEMENTS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];
/// Standard extension ratios beyond the move.
const EXTENSIONS: [f64; 4] = [1.272, 1.618, 2.0, 2.618];

/// One computed fib level.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FibLevel {
    pub ratio: f64,
    pub price: f64,
}

/// Fibonacci analysis over the most extreme swing of the lookback window.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FibonacciLevels {
    /// Bullish when the low precedes the high (levels retrace a rally).
    pub direction: Direction,
    pub swing_high: f64,
    pub swing_low: f64,
    pub retracements: Vec<FibLevel>,
    pub extensions: Vec<FibLevel>,
    /// Ratio bounds of the band containing the current price, if price is
    /// inside the retracement zone.
    pub active_zone: Option<(f64, f64)>,
    /// Price sits inside the 50%-61.8% pocket.
    pub in_golden_pocket: bool,
}

/// Compute fib levels from the extreme high/low of the lookback window.
/// `None` when the window is degenerate (no range).
pub fn fibonacci_levels<T: Ohlcv>(bars: &[T], params: &LevelParams) -> Option<FibonacciLevels> {
    if bars.len() < 2 {
        return None;
    }
    let window = &bars[bars.len().saturating_sub(params.fib_lookback)..];

    let mut hi = f64::NEG_INFINITY;
    let mut hi_at = 0usize;
    let mut lo = f64::INFINITY;
    let mut lo_at = 0usize;
    for (i, b) in window.iter().enumerate() {
        if b.high() > hi {
            hi = b.high();
            hi_at = i;
        }
        if b.low() < lo {
            lo = b.low();
            lo_at = i;
        }
    }
    let span = hi - lo;
    if span <= f64::EPSILON {
        return None;
    }

    // Low before high: an advance being retraced from the top. Otherwise a
    // decline being retraced from the bottom.
    let bullish = lo_at < hi_at;
    let retracements: Vec<FibLevel> = RETRACEMENTS
        .iter()
        .map(|&r| FibLevel {
            ratio: r,
            price: round2(if bullish { hi - span * r } else { lo + span * r }),
        })
        .collect();
    let extensions: Vec<FibLevel> = EXTENSIONS
        .iter()
        .map(|&r| FibLevel {
            ratio: r,
            price: round2(if bullish { lo + span * r } else { hi - span * r }),
        })
        .collect();

    let price = bars[bars.len() - 1].close();
    // Band edges from 0% (the extreme being defended) through each
    // retracement ratio.
    let mut edges: Vec<(f64, f64)> = Vec::with_capacity(RETRACEMENTS.len() + 1);
    edges.push((0.0, if bullish { hi } else { lo }));
    for level in &retracements {
        edges.push((level.ratio, level.price));
    }
    let mut active_zone = None;
    for pair in edges.windows(2) {
        let (r0, p0) = pair[0];
        let (r1, p1) = pair[1];
        if price <= p0.max(p1) && price >= p0.min(p1) {
            active_zone = Some((r0, r1));
            break;
        }
    }
    let in_golden_pocket = matches!(active_zone, Some((a, b)) if a >= 0.5 - 1e-9 && b <= 0.618 + 1e-9);

    Some(FibonacciLevels {
        direction: if bullish {
            Direction::Bullish
        } else {
            Direction::Bearish
        },
        swing_high: round2(hi),
        swing_low: round2(lo),
        retracements,
        extensions,
        active_zone,
        in_golden_pocket,
    })
}

// ============================================================
// TREND LINES
// ============================================================

/// Current relationship between price and a trend line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLineStatus {
    /// Price within the test tolerance of the line.
    Test,
    /// Price has crossed beyond the break tolerance.
    Break,
    /// Neither testing nor broken.
    Holding,
}

/// A regression trend line over recent swing points. Reported only when
/// the fit explains the swings (r-squared above the configured floor).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendLine {
    pub kind: PatternKind,
    pub slope: f64,
    pub r_squared: f64,
    /// Line value at the most recent bar.
    pub value_now: f64,
    pub status: TrendLineStatus,
    pub swings_used: usize,
}

impl TrendLine {
    /// Reduce to a pattern signal for confluence/aging; confidence is the
    /// regression fit.
    pub fn to_signal(&self, bar_index: usize) -> PatternSignal {
        PatternSignal::new(
            self.kind,
            bar_index,
            format!(
                "line at {:.2} (r2 {:.2}), status {:?}",
                self.value_now, self.r_squared, self.status
            ),
        )
        .with_confidence(self.r_squared)
    }
}

/// Fit support and resistance lines through the last `trendline_swings`
/// swing lows/highs.
pub fn trend_lines<T: Ohlcv>(bars: &[T], params: &LevelParams) -> Vec<TrendLine> {
    let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();
    let price = match bars.last() {
        Some(b) => b.close(),
        None => return Vec::new(),
    };
    let x_now = (bars.len() - 1) as f64;

    let mut lines = Vec::new();
    for (kind, swings, above) in [
        (
            PatternKind::TrendLineResistance,
            swing_highs(&highs, params.swing_order),
            true,
        ),
        (
            PatternKind::TrendLineSupport,
            swing_lows(&lows, params.swing_order),
            false,
        ),
    ] {
        if swings.len() < 2 {
            continue;
        }
        let recent = &swings[swings.len().saturating_sub(params.trendline_swings)..];
        let Some(fit) = fit_swings(recent) else {
            continue;
        };
        if fit.r_squared < params.trendline_min_r2 {
            continue;
        }

        let value_now = fit.value_at(x_now);
        let distance = safe_div(price - value_now, value_now);
        // Resistance breaks upward, support breaks downward.
        let broken = if above {
            distance > params.break_tolerance
        } else {
            distance < -params.break_tolerance
        };
        let status = if broken {
            TrendLineStatus::Break
        } else if distance.abs() <= params.test_tolerance {
            TrendLineStatus::Test
        } else {
            TrendLineStatus::Holding
        };

        lines.push(TrendLine {
            kind,
            slope: round4(fit.slope),
            r_squared: round4(fit.r_squared),
            value_now: round2(value_now),
            status,
            swings_used: recent.len(),
        });
    }
    lines
}

// ============================================================
// SUPPORT / RESISTANCE SNAPSHOT
// ============================================================

/// Nearest swing-derived horizontal levels around the current price.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SupportResistance {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub support_touches: usize,
    pub resistance_touches: usize,
}

/// Closest swing low below and swing high above the last close, with touch
/// counts inside a half-tolerance band.
pub fn support_resistance<T: Ohlcv>(bars: &[T], params: &LevelParams) -> SupportResistance {
    let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();
    let price = bars.last().map(|b| b.close()).unwrap_or(0.0);

    let sh = swing_highs(&highs, params.swing_order);
    let sl = swing_lows(&lows, params.swing_order);

    let resistance = sh
        .iter()
        .map(|p| p.price)
        .filter(|&p| p >= price)
        .fold(None::<f64>, |acc, p| Some(acc.map_or(p, |a| a.min(p))));
    let support = sl
        .iter()
        .map(|p| p.price)
        .filter(|&p| p <= price)
        .fold(None::<f64>, |acc, p| Some(acc.map_or(p, |a| a.max(p))));

    let band = params.test_tolerance / 2.0;
    let touches = |level: Option<f64>, points: &[crate::swing::SwingPoint]| match level {
        Some(level) => points
            .iter()
            .filter(|p| safe_div((p.price - level).abs(), level) <= band)
            .count(),
        None => 0,
    };

    SupportResistance {
        support: support.map(round2),
        resistance: resistance.map(round2),
        support_touches: touches(support, &sl),
        resistance_touches: touches(resistance, &sh),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bar(i: usize, low: f64, high: f64, close: f64) -> Bar {
        Bar::new(i as i64, close, high, low, close, 1_000.0)
    }

    #[test]
    fn fib_retracement_of_an_advance() {
        // Low 100 early, high 200 late, price pulled back to 160.
        let mut bars: Vec<Bar> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.5;
                bar(i, base - 1.0, base + 1.0, base)
            })
            .collect();
        bars.push(bar(40, 159.0, 161.0, 160.0));

        let fib = fibonacci_levels(&bars, &LevelParams::default()).unwrap();
        assert_eq!(fib.direction, Direction::Bullish);
        assert!(fib.swing_high > fib.swing_low);
        // 38.2% of a 100-to-200.5ish move sits near 162; price 160 is in
        // the 38.2-50 band.
        let zone = fib.active_zone.unwrap();
        assert!(zone.0 >= 0.236 && zone.1 <= 0.618);
    }

    #[test]
    fn golden_pocket_flag() {
        let mut bars: Vec<Bar> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.5;
                bar(i, base - 1.0, base + 1.0, base)
            })
            .collect();
        // 50-61.8% of the ~100.5 span: roughly 138-150. Land inside it.
        bars.push(bar(40, 143.0, 145.0, 144.0));
        let fib = fibonacci_levels(&bars, &LevelParams::default()).unwrap();
        assert!(fib.in_golden_pocket);
    }

    #[test]
    fn trend_line_needs_good_fit() {
        // Zigzag lows with a linearly rising floor: every fifth bar dips to
        // the floor, giving collinear swing lows and an ascending support
        // line.
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64;
                let low = if i % 5 == 0 { base } else { base + 4.0 };
                bar(i, low, base + 8.0, base + 5.0)
            })
            .collect();
        let lines = trend_lines(&bars, &LevelParams::default());
        assert!(lines
            .iter()
            .any(|l| l.kind == PatternKind::TrendLineSupport && l.slope > 0.0));
    }

    #[test]
    fn support_resistance_brackets_price() {
        let profile = [
            100.0, 102.0, 105.0, 102.0, 100.0, 98.0, 96.0, 98.0, 100.0, 103.0, 106.0, 103.0,
            100.0, 97.0, 95.0, 97.0, 100.0, 101.0,
        ];
        let bars: Vec<Bar> = profile
            .iter()
            .enumerate()
            .map(|(i, &p)| bar(i, p - 0.5, p + 0.5, p))
            .collect();
        let sr = support_resistance(&bars, &LevelParams::default());
        assert!(sr.resistance.unwrap() > 101.0);
        assert!(sr.support.unwrap() < 101.0);
    }

    #[test]
    fn empty_series_degrades() {
        let bars: Vec<Bar> = Vec::new();
        assert!(fibonacci_levels(&bars, &LevelParams::default()).is_none());
        assert!(trend_lines(&bars, &LevelParams::default()).is_empty());
    }
}
