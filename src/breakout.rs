//! Breakout precursor scanning, quality scoring and lifecycle staging.
//!
//! Fifteen independent boolean checks (P1-P15) over the last 50+ bars plus
//! indicators and optional options context; no partial credit per
//! precursor. The scorer turns them into an eight-component weighted
//! rubric whose components always sum to the quality score, and a stage
//! classification with an explicit breakout-level override. Failed
//! breakouts get a standalone, always-available check.

use crate::config::BreakoutThresholds;
use crate::{
    pct_change, round2, safe_div, Indicators, Ohlcv, OhlcvExt, OptionsContext,
};

// ============================================================
// PRECURSORS
// ============================================================

/// The fifteen breakout precursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PrecursorId {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
    P7,
    P8,
    P9,
    P10,
    P11,
    P12,
    P13,
    P14,
    P15,
}

impl PrecursorId {
    pub fn description(self) -> &'static str {
        use PrecursorId::*;
        match self {
            P1 => "volume dry-up: 5-bar average under half the 20-bar average",
            P2 => "Bollinger width within 10% of its 6-month low",
            P3 => "ATR under half its 50-day average",
            P4 => "EMA8/EMA21 pinch under 0.5%",
            P5 => "OBV rising while 20-bar price change stays under 3%",
            P6 => "block trades at or above $500K",
            P7 => "call volume at 3x open interest or more",
            P8 => "RSI coiled in the 45-55 band",
            P9 => "three or more ascending lows over the last 5 bars",
            P10 => "10-bar return above 2%",
            P11 => "15-bar return above 3%",
            P12 => "gap-up 0.5-3% on volume above 1.3x the 5-day average",
            P13 => "VWAP reclaim on volume above 1.2x the 5-day average",
            P14 => "two or more consecutive inside bars",
            P15 => "declining 5-bar true range under flat resistance",
        }
    }
}

/// One active precursor with the measured evidence behind it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Precursor {
    pub id: PrecursorId,
    pub detail: String,
}

/// Active precursors for one scan. No persisted identity: recomputed in
/// full on every call.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PrecursorSet {
    pub active: Vec<Precursor>,
}

impl PrecursorSet {
    #[inline]
    pub fn contains(&self, id: PrecursorId) -> bool {
        self.active.iter().any(|p| p.id == id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn push(&mut self, id: PrecursorId, detail: String) {
        self.active.push(Precursor { id, detail });
    }
}

fn avg_volume<T: Ohlcv>(bars: &[T]) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    bars.iter().map(|b| b.volume()).sum::<f64>() / bars.len() as f64
}

/// Run all fifteen checks. Fewer than `min_bars` bars yields an empty set.
pub fn scan_precursors<T: Ohlcv>(
    bars: &[T],
    indicators: &Indicators,
    options: Option<&OptionsContext>,
    t: &BreakoutThresholds,
) -> PrecursorSet {
    let mut set = PrecursorSet::default();
    let n = bars.len();
    if n < t.min_bars {
        return set;
    }
    let last = &bars[n - 1];
    let close = last.close();

    // P1: volume dry-up.
    let avg5 = avg_volume(&bars[n - 5..]);
    let avg20 = avg_volume(&bars[n - 20..]);
    if avg20 > 0.0 && avg5 < avg20 * t.dryup_ratio {
        set.push(
            PrecursorId::P1,
            format!("5-bar volume {:.0} vs 20-bar {:.0}", avg5, avg20),
        );
    }

    // P2: Bollinger squeeze near the 6-month floor.
    if let (Some(width), Some(low)) = (
        Indicators::valid(indicators.bb_width),
        Indicators::valid(indicators.bb_width_6m_low),
    ) {
        if width <= low * (1.0 + t.bb_squeeze_tolerance) {
            set.push(PrecursorId::P2, format!("width {width:.4} vs low {low:.4}"));
        }
    }

    // P3: ATR compression.
    if let (Some(atr), Some(avg)) = (
        Indicators::valid(indicators.atr_14),
        Indicators::valid(indicators.atr_50_avg),
    ) {
        if avg > 0.0 && atr < avg * t.atr_compression_ratio {
            set.push(PrecursorId::P3, format!("ATR {atr:.2} vs 50-day {avg:.2}"));
        }
    }

    // P4: EMA pinch.
    if let (Some(e8), Some(e21)) = (
        Indicators::valid(indicators.ema_8),
        Indicators::valid(indicators.ema_21),
    ) {
        let pinch = safe_div((e8 - e21).abs(), e21);
        if pinch < t.ema_pinch_pct {
            set.push(PrecursorId::P4, format!("spread {:.3}%", pinch * 100.0));
        }
    }

    // P5: OBV rising into a flat tape.
    if let (Some(obv), Some(obv_then)) = (
        Indicators::valid(indicators.obv),
        Indicators::valid(indicators.obv_20_ago),
    ) {
        let drift = pct_change(bars[n - 21].close(), close);
        if obv > obv_then && drift.abs() < t.obv_flat_price_pct {
            set.push(
                PrecursorId::P5,
                format!("OBV up {:.0} on {:.1}% price drift", obv - obv_then, drift * 100.0),
            );
        }
    }

    // P6/P7 require options context.
    if let Some(ua) = options.and_then(|o| o.unusual_activity.as_ref()) {
        if let Some(block) = ua.largest_block_usd {
            if block >= t.block_trade_usd {
                set.push(PrecursorId::P6, format!("block ${:.0}", block));
            }
        }
        if let Some(ratio) = ua.call_volume_oi_ratio {
            if ratio >= t.call_oi_ratio {
                set.push(PrecursorId::P7, format!("call volume {ratio:.1}x OI"));
            }
        }
    }

    // P8: RSI coil.
    if let Some(rsi) = Indicators::valid(indicators.rsi_14) {
        if (t.rsi_low..=t.rsi_high).contains(&rsi) {
            set.push(PrecursorId::P8, format!("RSI {rsi:.1}"));
        }
    }

    // P9: ascending lows.
    let window = &bars[n - t.ascending_lows_window..];
    let ascending = window
        .windows(2)
        .filter(|pair| pair[1].low() > pair[0].low())
        .count();
    if ascending >= t.ascending_lows_min {
        set.push(
            PrecursorId::P9,
            format!("{ascending} ascending lows in {}", t.ascending_lows_window),
        );
    }

    // P10/P11: momentum.
    let ret10 = pct_change(bars[n - 11].close(), close);
    if ret10 > t.ret10_pct {
        set.push(PrecursorId::P10, format!("10-bar return {:.1}%", ret10 * 100.0));
    }
    let ret15 = pct_change(bars[n - 16].close(), close);
    if ret15 > t.ret15_pct {
        set.push(PrecursorId::P11, format!("15-bar return {:.1}%", ret15 * 100.0));
    }

    // P12: measured gap-up on volume.
    let gap = pct_change(bars[n - 2].close(), last.open());
    let avg5_prior = avg_volume(&bars[n - 6..n - 1]);
    if gap >= t.gap_min_pct
        && gap <= t.gap_max_pct
        && avg5_prior > 0.0
        && last.volume() > avg5_prior * t.gap_volume_factor
    {
        set.push(PrecursorId::P12, format!("gap {:.1}% on volume", gap * 100.0));
    }

    // P13: VWAP-approximation reclaim on volume.
    let vwap_window = &bars[n - t.vwap_window..];
    let vol_sum: f64 = vwap_window.iter().map(|b| b.volume()).sum();
    if vol_sum > 0.0 {
        let vwap = vwap_window
            .iter()
            .map(|b| b.typical_price() * b.volume())
            .sum::<f64>()
            / vol_sum;
        let prev_close = bars[n - 2].close();
        if prev_close <= vwap && close > vwap && last.volume() > avg5_prior * t.vwap_volume_factor
        {
            set.push(PrecursorId::P13, format!("reclaimed VWAP {:.2}", round2(vwap)));
        }
    }

    // P14: consecutive inside bars.
    let mut inside = 0usize;
    for i in (1..n).rev() {
        if bars[i].high() < bars[i - 1].high() && bars[i].low() > bars[i - 1].low() {
            inside += 1;
        } else {
            break;
        }
    }
    if inside >= t.inside_bars_min {
        set.push(PrecursorId::P14, format!("{inside} inside bars"));
    }

    // P15: contracting true range under a flat lid.
    let trs: Vec<f64> = (n - t.tr_window..n)
        .map(|i| bars[i].true_range(bars[i - 1].close()))
        .collect();
    let contracting = trs.windows(2).all(|pair| pair[1] <= pair[0])
        && trs[trs.len() - 1] < trs[0];
    let recent_highs: Vec<f64> = bars[n - t.tr_window..].iter().map(|b| b.high()).collect();
    let hi = recent_highs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let lo = recent_highs.iter().cloned().fold(f64::INFINITY, f64::min);
    if contracting && safe_div(hi - lo, hi) < t.flat_high_variance {
        set.push(
            PrecursorId::P15,
            format!("true range contracting under {:.2}", round2(hi)),
        );
    }

    set
}

// ============================================================
// SCORER & LIFECYCLE
// ============================================================

/// The eight weighted components. Always sums to the quality score.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakoutComponents {
    /// Max 20: relative-volume buckets plus the P1 coil bonus.
    pub volume: f64,
    /// Max 15: 5 points per compression precursor (P2/P3/P4/P14/P15).
    pub pattern: f64,
    /// Max 10: ADX trend strength and SMA alignment.
    pub trend: f64,
    /// Max 15: sustained momentum (P11) and structure (P9).
    pub multi_timeframe: f64,
    /// Max 15: call flow (P7) plus a short-gamma bonus.
    pub options: f64,
    /// Max 10: RSI reset zone plus the P8 coil.
    pub candle: f64,
    /// Max 10: quiet accumulation (P5) and block prints (P6).
    pub institutional: f64,
    /// Max 5: momentum (P10/P11) and external relative strength.
    pub sector: f64,
}

impl BreakoutComponents {
    pub fn sum(&self) -> f64 {
        self.volume
            + self.pattern
            + self.trend
            + self.multi_timeframe
            + self.options
            + self.candle
            + self.institutional
            + self.sector
    }
}

/// Lifecycle stage of a breakout candidate. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BreakoutStage {
    Accumulation,
    PreBreakout,
    Breakout,
    Confirmation,
    Failed,
}

/// Scored breakout candidate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakoutSignal {
    pub ticker: String,
    pub stage: BreakoutStage,
    /// 0-100; always equals `components.sum()`.
    pub quality_score: f64,
    pub components: BreakoutComponents,
    pub precursor_signals: PrecursorSet,
}

/// Apply the weighted rubric and classify the stage.
///
/// When `breakout_level` is supplied, the price/volume relationship to that
/// level overrides the score-derived stage.
pub fn score_breakout<T: Ohlcv>(
    ticker: &str,
    bars: &[T],
    indicators: &Indicators,
    options: Option<&OptionsContext>,
    precursors: &PrecursorSet,
    breakout_level: Option<f64>,
    t: &BreakoutThresholds,
) -> BreakoutSignal {
    use PrecursorId::*;

    let rel_volume = Indicators::valid(indicators.relative_volume);

    // Volume (20).
    let mut volume: f64 = match rel_volume {
        Some(rv) if rv >= 2.0 => 15.0,
        Some(rv) if rv >= 1.5 => 10.0,
        Some(rv) if rv >= 1.0 => 5.0,
        _ => 0.0,
    };
    if precursors.contains(P1) {
        volume += 5.0;
    }
    let volume = volume.min(20.0);

    // Pattern (15): compression precursors.
    let compression = [P2, P3, P4, P14, P15]
        .iter()
        .filter(|&&p| precursors.contains(p))
        .count() as f64;
    let pattern = (compression * 5.0).min(15.0);

    // Trend (10).
    let mut trend = 0.0;
    if let Some(adx) = Indicators::valid(indicators.adx) {
        if adx >= 25.0 {
            trend += 5.0;
        }
    }
    if let (Some(s20), Some(s50)) = (
        Indicators::valid(indicators.sma_20),
        Indicators::valid(indicators.sma_50),
    ) {
        if s20 > s50 {
            trend += 5.0;
        }
    }

    // Multi-timeframe (15).
    let mut multi_timeframe = 0.0;
    if precursors.contains(P11) {
        multi_timeframe += 8.0;
    }
    if precursors.contains(P9) {
        multi_timeframe += 7.0;
    }

    // Options (15).
    let mut options_score = 0.0;
    if precursors.contains(P7) {
        options_score += 10.0;
    }
    if let Some(gex) = options.and_then(|o| o.gex.as_ref()) {
        if gex.total_gex < 0.0 {
            options_score += 5.0;
        }
    }

    // Candle (10).
    let mut candle = 0.0;
    if let Some(rsi) = Indicators::valid(indicators.rsi_14) {
        if (40.0..=60.0).contains(&rsi) {
            candle += 5.0;
        }
    }
    if precursors.contains(P8) {
        candle += 5.0;
    }

    // Institutional (10).
    let mut institutional = 0.0;
    if precursors.contains(P5) {
        institutional += 5.0;
    }
    if precursors.contains(P6) {
        institutional += 5.0;
    }

    // Sector (5).
    let mut sector = 0.0;
    if precursors.contains(P10) || precursors.contains(P11) {
        sector += 3.0;
    }
    if let Some(rs) = Indicators::valid(indicators.relative_strength) {
        if rs > 0.0 {
            sector += 2.0;
        }
    }

    let components = BreakoutComponents {
        volume,
        pattern,
        trend,
        multi_timeframe,
        options: options_score,
        candle,
        institutional,
        sector,
    };
    let quality_score = round2(components.sum().clamp(0.0, 100.0));

    let stage = classify_stage(bars, rel_volume, breakout_level, quality_score, t);

    BreakoutSignal {
        ticker: ticker.to_string(),
        stage,
        quality_score,
        components,
        precursor_signals: precursors.clone(),
    }
}

fn classify_stage<T: Ohlcv>(
    bars: &[T],
    rel_volume: Option<f64>,
    breakout_level: Option<f64>,
    quality_score: f64,
    t: &BreakoutThresholds,
) -> BreakoutStage {
    // A supplied breakout level overrides the precursor-derived stage.
    if let (Some(level), Some(last)) = (breakout_level, bars.last()) {
        let close = last.close();
        if close > level {
            if let Some(rv) = rel_volume {
                if rv >= t.confirm_rel_volume {
                    return BreakoutStage::Confirmation;
                }
                if rv >= t.breakout_rel_volume {
                    return BreakoutStage::Breakout;
                }
            }
        } else {
            // Breached earlier and fell back below.
            let lookback = bars.len().saturating_sub(t.failed_lookback);
            let breached = bars[lookback..].iter().any(|b| b.close() > level);
            if breached {
                return BreakoutStage::Failed;
            }
        }
    }

    if quality_score >= t.breakout_stage_score {
        BreakoutStage::Breakout
    } else if quality_score >= t.pre_breakout_stage_score {
        BreakoutStage::PreBreakout
    } else {
        BreakoutStage::Accumulation
    }
}

// ============================================================
// FAILED BREAKOUT
// ============================================================

/// Recommended action after a failed breakout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailedBreakoutAction {
    Exit,
    Reduce,
}

/// A breach of the breakout level that did not hold.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FailedBreakout {
    pub action: FailedBreakoutAction,
    /// Bar index of the first breach inside the lookback.
    pub breach_index: usize,
    /// Closes that held above the level inside the lookback.
    pub closes_above: usize,
    /// Average volume since the breach over average volume before it.
    pub forward_volume_ratio: f64,
    pub description: String,
}

/// Standalone failed-breakout check: the level was breached inside the
/// lookback, at most `failed_max_closes_above` closes held above it, and
/// the current close is back below. EXIT when follow-through volume dried
/// up, REDUCE otherwise.
pub fn detect_failed_breakout<T: Ohlcv>(
    bars: &[T],
    breakout_level: f64,
    t: &BreakoutThresholds,
) -> Option<FailedBreakout> {
    if bars.len() < t.failed_lookback + 2 {
        return None;
    }
    let n = bars.len();
    let start = n - t.failed_lookback;
    let current_close = bars[n - 1].close();
    if current_close >= breakout_level {
        return None;
    }

    let breach_index = (start..n).find(|&i| bars[i].close() > breakout_level)?;
    let closes_above = (start..n)
        .filter(|&i| bars[i].close() > breakout_level)
        .count();
    if closes_above > t.failed_max_closes_above {
        return None;
    }

    let forward = &bars[breach_index..];
    let before_start = breach_index.saturating_sub(forward.len());
    let before = &bars[before_start..breach_index];
    let forward_volume_ratio = round2(safe_div(avg_volume(forward), avg_volume(before)));

    let action = if forward_volume_ratio < t.exit_volume_ratio {
        FailedBreakoutAction::Exit
    } else {
        FailedBreakoutAction::Reduce
    };

    Some(FailedBreakout {
        action,
        breach_index,
        closes_above,
        forward_volume_ratio,
        description: format!(
            "breached {breakout_level:.2} at bar {breach_index}, {closes_above} close(s) held, now {current_close:.2}"
        ),
    })
}
