//! Tunable detector and scorer parameters.
//!
//! Every empirically chosen constant in the engine (tolerance bands, volume
//! factors, decay thresholds, precursor cutoffs) lives here as a documented
//! default on a params struct. They are configuration, not law: callers may
//! override any of them, and `validate()` rejects nonsensical combinations.

use crate::{Result, SignalError};

fn require_ratio(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(SignalError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

// ============================================================
// CANDLESTICK
// ============================================================

/// Candlestick detector parameters: body/wick geometry thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CandlestickParams {
    /// Only the most recent bars are scanned per call.
    pub lookback_bars: usize,
    /// Trailing window for the average-body reference.
    pub avg_body_period: usize,
    /// Series shorter than this yields an empty result.
    pub min_bars: usize,
    /// Body/range ratio at or below which a bar counts as a doji.
    pub doji_body_ratio: f64,
    /// Body must exceed avg body by this factor to count as "long".
    pub long_body_factor: f64,
    /// Dominant wick must exceed body by this factor (hammer family).
    pub wick_dominance: f64,
    /// Relative tolerance for "equal" highs/lows (tweezers).
    pub equal_tolerance: f64,
}

impl Default for CandlestickParams {
    fn default() -> Self {
        Self {
            lookback_bars: 10,
            avg_body_period: 14,
            min_bars: 5,
            doji_body_ratio: 0.1,
            long_body_factor: 1.3,
            wick_dominance: 2.0,
            equal_tolerance: 0.003,
        }
    }
}

impl CandlestickParams {
    pub fn validate(&self) -> Result<()> {
        if self.lookback_bars == 0 || self.avg_body_period == 0 || self.min_bars == 0 {
            return Err(SignalError::InvalidValue(
                "candlestick periods must be > 0",
            ));
        }
        require_ratio("doji_body_ratio", self.doji_body_ratio, 0.0, 1.0)?;
        require_ratio("long_body_factor", self.long_body_factor, 1.0, 10.0)?;
        require_ratio("wick_dominance", self.wick_dominance, 1.0, 10.0)?;
        require_ratio("equal_tolerance", self.equal_tolerance, 0.0, 0.05)
    }
}

// ============================================================
// CHART GEOMETRY
// ============================================================

/// Chart-geometry detector parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChartParams {
    /// Series shorter than this yields an empty result.
    pub min_bars: usize,
    /// Flank width for swing confirmation.
    pub swing_order: usize,
    /// Two extrema count as "equal" within this relative tolerance.
    pub double_tolerance: f64,
    /// Minimum bars between the two extrema of a double top/bottom.
    pub min_peak_separation: usize,
    /// Shoulder symmetry tolerance for head & shoulders.
    pub shoulder_tolerance: f64,
    /// Per-bar slope (as fraction of price) below which a line is "flat".
    pub flat_slope_per_bar: f64,
    /// Minimum directional move for a flag pole.
    pub pole_min_move: f64,
    /// Bars a flag pole spans.
    pub pole_bars: usize,
    /// Minimum bars of consolidation after the pole.
    pub flag_min_bars: usize,
    /// Consolidation range as a fraction of the pole range, at most.
    pub flag_max_range: f64,
    /// Cup lip symmetry tolerance.
    pub cup_lip_tolerance: f64,
}

impl Default for ChartParams {
    fn default() -> Self {
        Self {
            min_bars: 30,
            swing_order: 3,
            double_tolerance: 0.02,
            min_peak_separation: 5,
            shoulder_tolerance: 0.03,
            flat_slope_per_bar: 0.001,
            pole_min_move: 0.05,
            pole_bars: 8,
            flag_min_bars: 10,
            flag_max_range: 0.4,
            cup_lip_tolerance: 0.03,
        }
    }
}

impl ChartParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_bars == 0 || self.swing_order == 0 || self.pole_bars == 0 {
            return Err(SignalError::InvalidValue("chart periods must be > 0"));
        }
        require_ratio("double_tolerance", self.double_tolerance, 0.0, 0.2)?;
        require_ratio("shoulder_tolerance", self.shoulder_tolerance, 0.0, 0.2)?;
        require_ratio("pole_min_move", self.pole_min_move, 0.0, 1.0)?;
        require_ratio("flag_max_range", self.flag_max_range, 0.0, 1.0)?;
        require_ratio("cup_lip_tolerance", self.cup_lip_tolerance, 0.0, 0.2)
    }
}

// ============================================================
// GAP / VOLUME
// ============================================================

/// Gap and volume anomaly parameters.
#[derive(Debug, Clone, Copy)]
pub struct GapVolumeParams {
    /// Window for the reference volume average.
    pub volume_avg_period: usize,
    /// Recent bars inspected for gaps and anomalies.
    pub lookback_bars: usize,
    /// Gap volume at or above this multiple of average = breakaway.
    pub breakaway_volume_factor: f64,
    /// Gap volume below this multiple of average = exhaustion.
    pub exhaustion_volume_factor: f64,
    /// Maximum bars between opposite gaps for an island reversal.
    pub island_max_span: usize,
    /// Volume climax multiple of average.
    pub climax_factor: f64,
    /// Dry-up threshold as a multiple of average volume.
    pub dryup_factor: f64,
    /// Consecutive quiet bars required for a dry-up.
    pub dryup_min_run: usize,
    /// Price range treated as "flat" for accumulation/distribution.
    pub quiet_range_pct: f64,
    /// Window over which the flat-price check applies.
    pub quiet_window: usize,
}

impl Default for GapVolumeParams {
    fn default() -> Self {
        Self {
            volume_avg_period: 20,
            lookback_bars: 30,
            breakaway_volume_factor: 2.0,
            exhaustion_volume_factor: 0.7,
            island_max_span: 5,
            climax_factor: 3.0,
            dryup_factor: 0.35,
            dryup_min_run: 3,
            quiet_range_pct: 0.05,
            quiet_window: 15,
        }
    }
}

impl GapVolumeParams {
    pub fn validate(&self) -> Result<()> {
        if self.volume_avg_period == 0 || self.quiet_window == 0 || self.dryup_min_run == 0 {
            return Err(SignalError::InvalidValue("gap/volume periods must be > 0"));
        }
        if self.exhaustion_volume_factor >= self.breakaway_volume_factor {
            return Err(SignalError::InvalidValue(
                "exhaustion factor must be below breakaway factor",
            ));
        }
        require_ratio("dryup_factor", self.dryup_factor, 0.0, 1.0)?;
        require_ratio("quiet_range_pct", self.quiet_range_pct, 0.0, 0.5)
    }
}

// ============================================================
// LEVELS (FIBONACCI / TREND LINES)
// ============================================================

/// Fibonacci and trend-line parameters.
#[derive(Debug, Clone, Copy)]
pub struct LevelParams {
    /// Lookback for the fib extreme pair.
    pub fib_lookback: usize,
    /// Swing points fed into each trend-line regression.
    pub trendline_swings: usize,
    /// Minimum r-squared for a reportable trend line.
    pub trendline_min_r2: f64,
    /// Price within this fraction of the line = "test".
    pub test_tolerance: f64,
    /// Price beyond this fraction past the line = "break".
    pub break_tolerance: f64,
    /// Swing flank width for level extraction.
    pub swing_order: usize,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            fib_lookback: 90,
            trendline_swings: 5,
            trendline_min_r2: 0.7,
            test_tolerance: 0.02,
            break_tolerance: 0.01,
            swing_order: 3,
        }
    }
}

impl LevelParams {
    pub fn validate(&self) -> Result<()> {
        if self.fib_lookback == 0 || self.trendline_swings < 2 || self.swing_order == 0 {
            return Err(SignalError::InvalidValue("level periods out of range"));
        }
        require_ratio("trendline_min_r2", self.trendline_min_r2, 0.0, 1.0)?;
        require_ratio("test_tolerance", self.test_tolerance, 0.0, 0.2)?;
        require_ratio("break_tolerance", self.break_tolerance, 0.0, 0.2)
    }
}

// ============================================================
// AGING
// ============================================================

/// Aging/decay state machine parameters.
#[derive(Debug, Clone, Copy)]
pub struct AgingParams {
    /// Aged confidence below this invalidates the signal.
    pub confidence_floor: f64,
    /// Adverse move against the thesis that invalidates without an
    /// explicit level, once past the grace period.
    pub adverse_move_pct: f64,
    /// Bars of grace before the adverse-move rule applies.
    pub adverse_grace_bars: usize,
    /// Confidence multiplier on confirmation (capped at 1.0).
    pub confirm_boost: f64,
    /// Staleness subtracted on confirmation (floored at 0).
    pub confirm_staleness_relief: f64,
    /// Staleness band edges: fresh < fresh_below, etc.
    pub fresh_below: f64,
    pub active_below: f64,
    pub aging_below: f64,
}

impl Default for AgingParams {
    fn default() -> Self {
        Self {
            confidence_floor: 0.15,
            adverse_move_pct: 0.05,
            adverse_grace_bars: 5,
            confirm_boost: 1.3,
            confirm_staleness_relief: 20.0,
            fresh_below: 15.0,
            active_below: 40.0,
            aging_below: 70.0,
        }
    }
}

impl AgingParams {
    pub fn validate(&self) -> Result<()> {
        require_ratio("confidence_floor", self.confidence_floor, 0.0, 1.0)?;
        require_ratio("adverse_move_pct", self.adverse_move_pct, 0.0, 1.0)?;
        require_ratio("confirm_boost", self.confirm_boost, 1.0, 3.0)?;
        if !(self.fresh_below < self.active_below && self.active_below < self.aging_below) {
            return Err(SignalError::InvalidValue(
                "staleness bands must be strictly increasing",
            ));
        }
        Ok(())
    }
}

// ============================================================
// BACKTEST
// ============================================================

/// Sliding-window backtest parameters.
#[derive(Debug, Clone, Copy)]
pub struct BacktestParams {
    /// Detection window size.
    pub window: usize,
    /// Step between windows.
    pub step: usize,
    /// Bars of forward replay per detection.
    pub lookforward: usize,
    /// Occurrences needed for full sample-size credit.
    pub full_credit_occurrences: usize,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            window: 60,
            step: 5,
            lookforward: 20,
            full_credit_occurrences: 20,
        }
    }
}

impl BacktestParams {
    /// Minimum series length the backtest will accept.
    pub fn min_bars(&self) -> usize {
        self.window + self.lookforward + 10
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 || self.step == 0 || self.lookforward == 0 {
            return Err(SignalError::InvalidValue("backtest periods must be > 0"));
        }
        if self.full_credit_occurrences == 0 {
            return Err(SignalError::InvalidValue(
                "full_credit_occurrences must be > 0",
            ));
        }
        Ok(())
    }
}

// ============================================================
// BREAKOUT
// ============================================================

/// Precursor-scan and breakout-scorer thresholds (P1..P15 constants).
#[derive(Debug, Clone, Copy)]
pub struct BreakoutThresholds {
    /// Series shorter than this yields an empty precursor set.
    pub min_bars: usize,
    /// P1: 5-bar average volume below this fraction of the 20-bar average.
    pub dryup_ratio: f64,
    /// P2: Bollinger width within this fraction of its 6-month low.
    pub bb_squeeze_tolerance: f64,
    /// P3: ATR below this fraction of its 50-day average.
    pub atr_compression_ratio: f64,
    /// P4: EMA8/EMA21 pinch as a fraction of EMA21.
    pub ema_pinch_pct: f64,
    /// P5: 20-bar price change considered "flat".
    pub obv_flat_price_pct: f64,
    /// P6: block trade notional floor.
    pub block_trade_usd: f64,
    /// P7: call volume / open interest multiple.
    pub call_oi_ratio: f64,
    /// P8: RSI coil band.
    pub rsi_low: f64,
    pub rsi_high: f64,
    /// P9: window and minimum count of ascending lows.
    pub ascending_lows_window: usize,
    pub ascending_lows_min: usize,
    /// P10/P11: momentum return thresholds.
    pub ret10_pct: f64,
    pub ret15_pct: f64,
    /// P12: gap band and volume factor.
    pub gap_min_pct: f64,
    pub gap_max_pct: f64,
    pub gap_volume_factor: f64,
    /// P13: VWAP-approximation window and volume factor.
    pub vwap_window: usize,
    pub vwap_volume_factor: f64,
    /// P14: minimum consecutive inside bars.
    pub inside_bars_min: usize,
    /// P15: true-range window and flat-resistance variance cap.
    pub tr_window: usize,
    pub flat_high_variance: f64,
    /// Stage classification: relative-volume floors for the
    /// breakout-level override, and score cutoffs otherwise.
    pub confirm_rel_volume: f64,
    pub breakout_rel_volume: f64,
    pub breakout_stage_score: f64,
    pub pre_breakout_stage_score: f64,
    /// Failed-breakout check: lookback closes, max closes above, and the
    /// forward-volume ratio below which the action is EXIT.
    pub failed_lookback: usize,
    pub failed_max_closes_above: usize,
    pub exit_volume_ratio: f64,
}

impl Default for BreakoutThresholds {
    fn default() -> Self {
        Self {
            min_bars: 50,
            dryup_ratio: 0.5,
            bb_squeeze_tolerance: 0.10,
            atr_compression_ratio: 0.5,
            ema_pinch_pct: 0.005,
            obv_flat_price_pct: 0.03,
            block_trade_usd: 500_000.0,
            call_oi_ratio: 3.0,
            rsi_low: 45.0,
            rsi_high: 55.0,
            ascending_lows_window: 5,
            ascending_lows_min: 3,
            ret10_pct: 0.02,
            ret15_pct: 0.03,
            gap_min_pct: 0.005,
            gap_max_pct: 0.03,
            gap_volume_factor: 1.3,
            vwap_window: 20,
            vwap_volume_factor: 1.2,
            inside_bars_min: 2,
            tr_window: 5,
            flat_high_variance: 0.02,
            confirm_rel_volume: 1.5,
            breakout_rel_volume: 1.0,
            breakout_stage_score: 70.0,
            pre_breakout_stage_score: 40.0,
            failed_lookback: 10,
            failed_max_closes_above: 2,
            exit_volume_ratio: 0.8,
        }
    }
}

impl BreakoutThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.min_bars < 20 {
            return Err(SignalError::InvalidValue(
                "breakout scan needs at least 20 bars",
            ));
        }
        if self.rsi_low >= self.rsi_high {
            return Err(SignalError::InvalidValue("rsi band inverted"));
        }
        if self.gap_min_pct >= self.gap_max_pct {
            return Err(SignalError::InvalidValue("gap band inverted"));
        }
        if self.pre_breakout_stage_score >= self.breakout_stage_score {
            return Err(SignalError::InvalidValue("stage score cutoffs inverted"));
        }
        require_ratio("dryup_ratio", self.dryup_ratio, 0.0, 1.0)?;
        require_ratio("atr_compression_ratio", self.atr_compression_ratio, 0.0, 1.0)?;
        require_ratio("exit_volume_ratio", self.exit_volume_ratio, 0.0, 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(CandlestickParams::default().validate().is_ok());
        assert!(ChartParams::default().validate().is_ok());
        assert!(GapVolumeParams::default().validate().is_ok());
        assert!(LevelParams::default().validate().is_ok());
        assert!(AgingParams::default().validate().is_ok());
        assert!(BacktestParams::default().validate().is_ok());
        assert!(BreakoutThresholds::default().validate().is_ok());
    }

    #[test]
    fn bad_values_rejected() {
        let mut c = CandlestickParams::default();
        c.doji_body_ratio = 1.5;
        assert!(c.validate().is_err());

        let mut a = AgingParams::default();
        a.active_below = 5.0;
        assert!(a.validate().is_err());

        let mut b = BreakoutThresholds::default();
        b.rsi_low = 60.0;
        assert!(b.validate().is_err());
    }

    #[test]
    fn backtest_min_bars_is_window_plus_lookforward() {
        let p = BacktestParams::default();
        assert_eq!(p.min_bars(), 90);
    }
}
