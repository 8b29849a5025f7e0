//! Candlestick pattern detection (1/2/3-bar rule matching).
//!
//! Shapes are classified by body percentage, wick ratios and relative body
//! size against a trailing 14-bar body average. Each named pattern carries a
//! fixed confidence from [`PatternKind::base_confidence`]; direction is the
//! pattern's canonical bias, never recomputed. Only the most recent
//! `lookback_bars` are scanned per call; fewer than `min_bars` bars yields
//! an empty list.

use crate::config::CandlestickParams;
use crate::{pct_change, round2, safe_div, Ohlcv, OhlcvExt, PatternKind, PatternSignal};

/// Trailing average body size at `at`, excluding the bar itself.
#[inline]
pub(crate) fn trailing_avg_body<T: Ohlcv>(bars: &[T], at: usize, period: usize) -> f64 {
    if at == 0 {
        return bars[0].body();
    }
    let start = at.saturating_sub(period);
    let slice = &bars[start..at];
    slice.iter().map(|b| b.body()).sum::<f64>() / slice.len() as f64
}

/// Close-to-close drift over the `window` bars preceding `at`; positive
/// means the market came in rising.
fn prior_drift<T: Ohlcv>(bars: &[T], at: usize, window: usize) -> f64 {
    if at == 0 {
        return 0.0;
    }
    let start = at.saturating_sub(window);
    pct_change(bars[start].close(), bars[at - 1].close())
}

/// Scan the most recent bars for candlestick patterns.
pub fn detect_candlesticks<T: Ohlcv>(bars: &[T], params: &CandlestickParams) -> Vec<PatternSignal> {
    if bars.len() < params.min_bars {
        return Vec::new();
    }

    let start = bars.len().saturating_sub(params.lookback_bars);
    let mut signals = Vec::new();

    for i in start..bars.len() {
        let ctx = BarContext::at(bars, i, params);

        signals.extend(single_bar_at(bars, i, &ctx, params));
        if i >= 1 {
            signals.extend(two_bar_at(bars, i, &ctx, params));
        }
        if i >= 2 {
            signals.extend(three_bar_at(bars, i, &ctx, params));
        }
    }

    signals
}

/// Per-bar detection context: trailing body average and prior drift.
struct BarContext {
    avg_body: f64,
    drift: f64,
}

impl BarContext {
    fn at<T: Ohlcv>(bars: &[T], i: usize, params: &CandlestickParams) -> Self {
        Self {
            avg_body: trailing_avg_body(bars, i, params.avg_body_period),
            drift: prior_drift(bars, i, 5),
        }
    }
}

#[inline]
fn is_long_body(body: f64, avg_body: f64, factor: f64) -> bool {
    avg_body > 0.0 && body > avg_body * factor
}

#[inline]
fn near_equal(a: f64, b: f64, tolerance: f64) -> bool {
    safe_div((a - b).abs(), a.abs().max(b.abs())) <= tolerance
}

// ============================================================
// SINGLE BAR
// ============================================================

fn single_bar_at<T: Ohlcv>(
    bars: &[T],
    i: usize,
    ctx: &BarContext,
    params: &CandlestickParams,
) -> Vec<PatternSignal> {
    let bar = &bars[i];
    let mut out = Vec::new();

    let range = bar.range();
    if range <= f64::EPSILON {
        return out;
    }
    let body_ratio = bar.body() / range;
    let upper = bar.upper_wick();
    let lower = bar.lower_wick();
    let body = bar.body();

    if body_ratio <= params.doji_body_ratio {
        // Doji family: placement of the dominant wick decides the variant.
        let kind = if lower > upper * params.wick_dominance && lower > range * 0.6 {
            PatternKind::DragonflyDoji
        } else if upper > lower * params.wick_dominance && upper > range * 0.6 {
            PatternKind::GravestoneDoji
        } else {
            PatternKind::Doji
        };
        out.push(PatternSignal::new(
            kind,
            i,
            format!("body {:.1}% of range", body_ratio * 100.0),
        ));
        return out;
    }

    // Hammer family: small body at one extreme, dominant opposite wick.
    let small_body = ctx.avg_body > 0.0 && body < ctx.avg_body;
    if small_body && lower >= body * params.wick_dominance && upper <= body {
        let kind = if ctx.drift < 0.0 {
            PatternKind::Hammer
        } else {
            PatternKind::HangingMan
        };
        out.push(
            PatternSignal::new(
                kind,
                i,
                format!("lower wick {:.2} vs body {:.2}", round2(lower), round2(body)),
            )
            .with_levels(bar.high(), bar.close() + range, bar.low()),
        );
        return out;
    }
    if small_body && upper >= body * params.wick_dominance && lower <= body {
        let kind = if ctx.drift < 0.0 {
            PatternKind::InvertedHammer
        } else {
            PatternKind::ShootingStar
        };
        out.push(
            PatternSignal::new(
                kind,
                i,
                format!("upper wick {:.2} vs body {:.2}", round2(upper), round2(body)),
            )
            .with_levels(bar.low(), bar.close() - range, bar.high()),
        );
        return out;
    }

    if small_body && upper > body && lower > body {
        out.push(PatternSignal::new(
            PatternKind::SpinningTop,
            i,
            format!("small body, wicks both exceed {:.2}", round2(body)),
        ));
    }

    out
}

// ============================================================
// TWO BAR
// ============================================================

fn two_bar_at<T: Ohlcv>(
    bars: &[T],
    i: usize,
    ctx: &BarContext,
    params: &CandlestickParams,
) -> Vec<PatternSignal> {
    let prev = &bars[i - 1];
    let curr = &bars[i];
    let mut out = Vec::new();

    // Engulfing: current body swallows the previous opposite-color body.
    if prev.is_bearish()
        && curr.open() <= prev.close()
        && curr.close() >= prev.open()
        && curr.body() > prev.body()
    {
        out.push(
            PatternSignal::new(
                PatternKind::BullishEngulfing,
                i,
                format!(
                    "green body {:.2} engulfs red body {:.2}",
                    round2(curr.body()),
                    round2(prev.body())
                ),
            )
            .with_levels(curr.high(), curr.close() + curr.body(), curr.low()),
        );
    } else if prev.is_bullish()
        && curr.open() >= prev.close()
        && curr.close() <= prev.open()
        && curr.body() > prev.body()
    {
        out.push(
            PatternSignal::new(
                PatternKind::BearishEngulfing,
                i,
                format!(
                    "red body {:.2} engulfs green body {:.2}",
                    round2(curr.body()),
                    round2(prev.body())
                ),
            )
            .with_levels(curr.low(), curr.close() - curr.body(), curr.high()),
        );
    }

    // Harami: small body fully inside the previous long opposite body.
    let prev_top = prev.open().max(prev.close());
    let prev_bot = prev.open().min(prev.close());
    let curr_top = curr.open().max(curr.close());
    let curr_bot = curr.open().min(curr.close());
    if is_long_body(prev.body(), ctx.avg_body, params.long_body_factor)
        && curr.body() < prev.body() * 0.5
        && curr_top < prev_top
        && curr_bot > prev_bot
    {
        let kind = if prev.is_bearish() {
            PatternKind::BullishHarami
        } else {
            PatternKind::BearishHarami
        };
        out.push(PatternSignal::new(
            kind,
            i,
            "small body held inside the prior long body".to_string(),
        ));
    }

    // Piercing line / dark cloud cover: close recovers past the midpoint.
    if prev.is_bearish()
        && curr.is_bullish()
        && curr.open() < prev.close()
        && curr.close() > prev.midpoint()
        && curr.close() < prev.open()
    {
        out.push(
            PatternSignal::new(
                PatternKind::PiercingLine,
                i,
                format!("close {:.2} pierces midpoint {:.2}", round2(curr.close()), round2(prev.midpoint())),
            )
            .with_levels(prev.open(), prev.open() + prev.body(), curr.low()),
        );
    } else if prev.is_bullish()
        && curr.is_bearish()
        && curr.open() > prev.close()
        && curr.close() < prev.midpoint()
        && curr.close() > prev.open()
    {
        out.push(
            PatternSignal::new(
                PatternKind::DarkCloudCover,
                i,
                format!("close {:.2} breaks midpoint {:.2}", round2(curr.close()), round2(prev.midpoint())),
            )
            .with_levels(prev.open(), prev.open() - prev.body(), curr.high()),
        );
    }

    // Tweezers: matched extreme with a color flip.
    if near_equal(prev.low(), curr.low(), params.equal_tolerance)
        && prev.is_bearish()
        && curr.is_bullish()
    {
        out.push(PatternSignal::new(
            PatternKind::TweezerBottom,
            i,
            format!("matched lows near {:.2}", round2(curr.low())),
        ));
    }
    if near_equal(prev.high(), curr.high(), params.equal_tolerance)
        && prev.is_bullish()
        && curr.is_bearish()
    {
        out.push(PatternSignal::new(
            PatternKind::TweezerTop,
            i,
            format!("matched highs near {:.2}", round2(curr.high())),
        ));
    }

    out
}

// ============================================================
// THREE BAR
// ============================================================

fn three_bar_at<T: Ohlcv>(
    bars: &[T],
    i: usize,
    ctx: &BarContext,
    params: &CandlestickParams,
) -> Vec<PatternSignal> {
    let first = &bars[i - 2];
    let star = &bars[i - 1];
    let third = &bars[i];
    let mut out = Vec::new();

    let star_small = star.body() < first.body() * 0.3;

    // Morning star: long red, small star below it, green recovery past the
    // red bar's midpoint.
    if first.is_bearish()
        && is_long_body(first.body(), ctx.avg_body, params.long_body_factor)
        && star_small
        && star.open().max(star.close()) < first.close()
        && third.is_bullish()
        && third.close() > first.midpoint()
    {
        // A star that also gapped clear of both neighbors' ranges upgrades
        // to an abandoned baby.
        let abandoned = star.high() < first.low() && star.high() < third.low();
        let kind = if abandoned {
            PatternKind::BullishAbandonedBaby
        } else {
            PatternKind::MorningStar
        };
        out.push(
            PatternSignal::new(
                kind,
                i,
                format!("recovery close {:.2} above midpoint {:.2}", round2(third.close()), round2(first.midpoint())),
            )
            .with_levels(third.high(), third.close() + first.body(), star.low()),
        );
    }

    // Evening star mirror.
    if first.is_bullish()
        && is_long_body(first.body(), ctx.avg_body, params.long_body_factor)
        && star_small
        && star.open().min(star.close()) > first.close()
        && third.is_bearish()
        && third.close() < first.midpoint()
    {
        let abandoned = star.low() > first.high() && star.low() > third.high();
        let kind = if abandoned {
            PatternKind::BearishAbandonedBaby
        } else {
            PatternKind::EveningStar
        };
        out.push(
            PatternSignal::new(
                kind,
                i,
                format!("reversal close {:.2} below midpoint {:.2}", round2(third.close()), round2(first.midpoint())),
            )
            .with_levels(third.low(), third.close() - first.body(), star.high()),
        );
    }

    // Three soldiers / crows: stair-stepped closes with opens inside the
    // prior body.
    let all_bullish = first.is_bullish() && star.is_bullish() && third.is_bullish();
    if all_bullish
        && star.close() > first.close()
        && third.close() > star.close()
        && star.open() > first.open()
        && star.open() < first.close()
        && third.open() > star.open()
        && third.open() < star.close()
    {
        out.push(PatternSignal::new(
            PatternKind::ThreeWhiteSoldiers,
            i,
            format!("three advancing closes to {:.2}", round2(third.close())),
        ));
    }
    let all_bearish = first.is_bearish() && star.is_bearish() && third.is_bearish();
    if all_bearish
        && star.close() < first.close()
        && third.close() < star.close()
        && star.open() < first.open()
        && star.open() > first.close()
        && third.open() < star.open()
        && third.open() > star.close()
    {
        out.push(PatternSignal::new(
            PatternKind::ThreeBlackCrows,
            i,
            format!("three declining closes to {:.2}", round2(third.close())),
        ));
    }

    out
}
