//! # sigscope - Pattern & Breakout Signal Engine
//!
//! Deterministic technical-signal engine over OHLCV bars: candlestick and
//! chart-geometry pattern detection, gap/volume anomalies, Fibonacci and
//! trend-line levels, signal aging/decay, multi-timeframe confluence,
//! historical outcome evaluation and breakout precursor/quality scoring.
//!
//! All computation is pure and synchronous: every public operation is a
//! function of its inputs, safe to call concurrently as long as each call
//! owns its bar slice. State that crosses calls (aged-signal batches, the
//! backtest pattern log) is supplied and returned explicitly.
//!
//! ## Quick Start
//!
//! ```rust
//! use sigscope::prelude::*;
//!
//! let bars: Vec<Bar> = (0..60)
//!     .map(|i| {
//!         let base = 100.0 + i as f64 * 0.3;
//!         Bar::new(i, base, base + 1.0, base - 1.0, base + 0.5, 10_000.0)
//!     })
//!     .collect();
//!
//! let scanner = ScannerBuilder::new().build().unwrap();
//! let report = scanner.scan_full(&bars, &Indicators::default());
//! assert!(report.confluence.score >= 0.0 && report.confluence.score <= 100.0);
//! ```

pub mod aging;
pub mod assessment;
pub mod backtest;
pub mod breakout;
pub mod config;
pub mod confluence;
pub mod detectors;
pub mod levels;
pub mod scan;
pub mod swing;
pub mod timeframes;

pub mod prelude {
    pub use crate::{
        aging::{age_signals, AgedSignal, SignalStatus},
        assessment::{
            assess, confirm_with_options, detect_institutional_activity, AssessmentReport,
            InstitutionalActivity, OptionsConfirmation, OptionsVerdict, Recommendation, Urgency,
        },
        backtest::{
            backtest, evaluate_outcomes, BacktestReport, EvaluatedOutcome, Outcome, PatternStats,
        },
        breakout::{
            detect_failed_breakout, scan_precursors, score_breakout, BreakoutComponents,
            BreakoutSignal, BreakoutStage, FailedBreakout, FailedBreakoutAction, Precursor,
            PrecursorId, PrecursorSet,
        },
        config::{
            AgingParams, BacktestParams, BreakoutThresholds, CandlestickParams, ChartParams,
            GapVolumeParams, LevelParams,
        },
        confluence::{confluence_score, ConfluenceScore},
        detectors::{
            detect_candlesticks, detect_chart_patterns, detect_emerging_patterns,
            detect_gap_volume, detect_preconfirmations, EmergingKind, EmergingPattern,
            PreConfirmation,
        },
        levels::{
            fibonacci_levels, support_resistance, trend_lines, FibLevel, FibonacciLevels,
            SupportResistance, TrendLine, TrendLineStatus,
        },
        scan::{scan_parallel, ScanReport, Scanner, ScannerBuilder, SymbolError, SymbolReport},
        swing::{linear_fit, swing_highs, swing_lows, LineFit, SwingPoint},
        timeframes::{
            aggregate_timeframes, DominantSignal, FractalPattern, MultiTimeframeReport,
            PatternConfluence, Timeframe, TimeframeScan,
        },
        Bar, DarkPoolActivity, Direction, GammaExposure, Indicators, Ohlcv, OhlcvExt,
        OpenInterestProfile, OptionsContext, PatternCategory, PatternKind, PatternSignal, Result,
        SignalError, SweepActivity, UnusualActivity,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors surfaced by configuration validation and explicit bar validation.
///
/// Detectors never error on short input: a series below a detector's
/// minimum bar count yields an empty result (see module docs).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOhlcv { index: usize, reason: &'static str },
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV accessor trait. Detectors are generic over this so callers
/// can scan their own bar types without conversion.
pub trait Ohlcv {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with derived candle properties.
pub trait OhlcvExt: Ohlcv {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_wick(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_wick(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    #[inline]
    fn typical_price(&self) -> f64 {
        (self.high() + self.low() + self.close()) / 3.0
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as fraction of range. `None` when the bar has no range.
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    /// True range against the previous close.
    #[inline]
    fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.range();
        let hc = (self.high() - prev_close).abs();
        let lc = (self.low() - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// OHLCV consistency check: high >= low, no NaN or infinities.
    fn validate(&self) -> Result<()> {
        if self.high() < self.low() {
            return Err(SignalError::InvalidOhlcv {
                index: 0,
                reason: "high < low",
            });
        }
        let fields = [
            self.open(),
            self.high(),
            self.low(),
            self.close(),
            self.volume(),
        ];
        if fields.iter().any(|v| v.is_nan()) {
            return Err(SignalError::InvalidOhlcv {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if fields.iter().any(|v| v.is_infinite()) {
            return Err(SignalError::InvalidOhlcv {
                index: 0,
                reason: "infinite value in OHLCV",
            });
        }
        if self.volume() < 0.0 {
            return Err(SignalError::InvalidOhlcv {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: Ohlcv> OhlcvExt for T {}

/// Concrete owned bar. Ordered ascending by time; immutable once produced
/// by the external data layer.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Ohlcv for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }
}

// ============================================================
// DIRECTION / CATEGORY
// ============================================================

/// Directional bias of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    /// The opposing direction; `Neutral` opposes itself.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Bullish => Direction::Bearish,
            Direction::Bearish => Direction::Bullish,
            Direction::Neutral => Direction::Neutral,
        }
    }
}

/// Pattern family a signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Candlestick,
    Chart,
    Gap,
    Volume,
    TrendLine,
}

// ============================================================
// PATTERN KIND
// ============================================================

/// Closed set of detectable confirmed patterns. Identity of a detection is
/// `(kind, bar_index)`. Per-kind attributes (display name, category,
/// canonical bias, assigned confidence, decay rate) hang off this enum so
/// nothing downstream dispatches on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PatternKind {
    // Candlestick - single bar
    Doji,
    DragonflyDoji,
    GravestoneDoji,
    SpinningTop,
    Hammer,
    InvertedHammer,
    HangingMan,
    ShootingStar,
    // Candlestick - two bar
    BullishEngulfing,
    BearishEngulfing,
    BullishHarami,
    BearishHarami,
    PiercingLine,
    DarkCloudCover,
    TweezerBottom,
    TweezerTop,
    // Candlestick - three bar
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
    BullishAbandonedBaby,
    BearishAbandonedBaby,
    // Chart geometry
    DoubleTop,
    DoubleBottom,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    RisingWedge,
    FallingWedge,
    BullFlag,
    BearFlag,
    CupAndHandle,
    Rectangle,
    AscendingChannel,
    DescendingChannel,
    // Gaps
    GapUp,
    GapDown,
    BreakawayGapUp,
    BreakawayGapDown,
    ExhaustionGapUp,
    ExhaustionGapDown,
    IslandTop,
    IslandBottom,
    // Volume
    VolumeClimaxUp,
    VolumeClimaxDown,
    VolumeDryUp,
    Accumulation,
    Distribution,
    // Trend lines
    TrendLineSupport,
    TrendLineResistance,
}

/// Decay rate applied to kinds without an explicit entry in the table.
pub const DEFAULT_DECAY_RATE: f64 = 0.94;

impl PatternKind {
    /// Human-readable display name.
    pub fn name(self) -> &'static str {
        use PatternKind::*;
        match self {
            Doji => "Doji",
            DragonflyDoji => "Dragonfly Doji",
            GravestoneDoji => "Gravestone Doji",
            SpinningTop => "Spinning Top",
            Hammer => "Hammer",
            InvertedHammer => "Inverted Hammer",
            HangingMan => "Hanging Man",
            ShootingStar => "Shooting Star",
            BullishEngulfing => "Bullish Engulfing",
            BearishEngulfing => "Bearish Engulfing",
            BullishHarami => "Bullish Harami",
            BearishHarami => "Bearish Harami",
            PiercingLine => "Piercing Line",
            DarkCloudCover => "Dark Cloud Cover",
            TweezerBottom => "Tweezer Bottom",
            TweezerTop => "Tweezer Top",
            MorningStar => "Morning Star",
            EveningStar => "Evening Star",
            ThreeWhiteSoldiers => "Three White Soldiers",
            ThreeBlackCrows => "Three Black Crows",
            BullishAbandonedBaby => "Bullish Abandoned Baby",
            BearishAbandonedBaby => "Bearish Abandoned Baby",
            DoubleTop => "Double Top",
            DoubleBottom => "Double Bottom",
            HeadAndShoulders => "Head and Shoulders",
            InverseHeadAndShoulders => "Inverse Head and Shoulders",
            AscendingTriangle => "Ascending Triangle",
            DescendingTriangle => "Descending Triangle",
            SymmetricalTriangle => "Symmetrical Triangle",
            RisingWedge => "Rising Wedge",
            FallingWedge => "Falling Wedge",
            BullFlag => "Bull Flag",
            BearFlag => "Bear Flag",
            CupAndHandle => "Cup and Handle",
            Rectangle => "Rectangle",
            AscendingChannel => "Ascending Channel",
            DescendingChannel => "Descending Channel",
            GapUp => "Gap Up",
            GapDown => "Gap Down",
            BreakawayGapUp => "Breakaway Gap Up",
            BreakawayGapDown => "Breakaway Gap Down",
            ExhaustionGapUp => "Exhaustion Gap Up",
            ExhaustionGapDown => "Exhaustion Gap Down",
            IslandTop => "Island Top",
            IslandBottom => "Island Bottom",
            VolumeClimaxUp => "Volume Climax Up",
            VolumeClimaxDown => "Volume Climax Down",
            VolumeDryUp => "Volume Dry-Up",
            Accumulation => "Accumulation",
            Distribution => "Distribution",
            TrendLineSupport => "Trend Line Support",
            TrendLineResistance => "Trend Line Resistance",
        }
    }

    pub fn category(self) -> PatternCategory {
        use PatternKind::*;
        match self {
            Doji | DragonflyDoji | GravestoneDoji | SpinningTop | Hammer | InvertedHammer
            | HangingMan | ShootingStar | BullishEngulfing | BearishEngulfing | BullishHarami
            | BearishHarami | PiercingLine | DarkCloudCover | TweezerBottom | TweezerTop
            | MorningStar | EveningStar | ThreeWhiteSoldiers | ThreeBlackCrows
            | BullishAbandonedBaby | BearishAbandonedBaby => PatternCategory::Candlestick,
            DoubleTop | DoubleBottom | HeadAndShoulders | InverseHeadAndShoulders
            | AscendingTriangle | DescendingTriangle | SymmetricalTriangle | RisingWedge
            | FallingWedge | BullFlag | BearFlag | CupAndHandle | Rectangle
            | AscendingChannel | DescendingChannel => PatternCategory::Chart,
            GapUp | GapDown | BreakawayGapUp | BreakawayGapDown | ExhaustionGapUp
            | ExhaustionGapDown | IslandTop | IslandBottom => PatternCategory::Gap,
            VolumeClimaxUp | VolumeClimaxDown | VolumeDryUp | Accumulation | Distribution => {
                PatternCategory::Volume
            }
            TrendLineSupport | TrendLineResistance => PatternCategory::TrendLine,
        }
    }

    /// Canonical directional bias of the named pattern. Detectors use this
    /// rather than re-deriving direction from geometry.
    pub fn bias(self) -> Direction {
        use PatternKind::*;
        match self {
            Hammer | InvertedHammer | DragonflyDoji | BullishEngulfing | BullishHarami
            | PiercingLine | TweezerBottom | MorningStar | ThreeWhiteSoldiers
            | BullishAbandonedBaby | DoubleBottom | InverseHeadAndShoulders
            | AscendingTriangle | FallingWedge | BullFlag | CupAndHandle | AscendingChannel
            | GapUp | BreakawayGapUp | ExhaustionGapDown | IslandBottom | VolumeClimaxUp
            | Accumulation | TrendLineSupport => Direction::Bullish,
            HangingMan | ShootingStar | GravestoneDoji | BearishEngulfing | BearishHarami
            | DarkCloudCover | TweezerTop | EveningStar | ThreeBlackCrows
            | BearishAbandonedBaby | DoubleTop | HeadAndShoulders | DescendingTriangle
            | RisingWedge | BearFlag | DescendingChannel | GapDown | BreakawayGapDown
            | ExhaustionGapUp | IslandTop | VolumeClimaxDown | Distribution
            | TrendLineResistance => Direction::Bearish,
            Doji | SpinningTop | SymmetricalTriangle | Rectangle | VolumeDryUp => {
                Direction::Neutral
            }
        }
    }

    /// Fixed confidence assigned at detection. Rarer formations carry more
    /// weight; trend lines override this with their regression fit.
    pub fn base_confidence(self) -> f64 {
        use PatternKind::*;
        match self {
            Doji | SpinningTop => 0.5,
            DragonflyDoji | GravestoneDoji | InvertedHammer | HangingMan => 0.6,
            Hammer | ShootingStar => 0.65,
            BullishEngulfing | BearishEngulfing => 0.75,
            BullishHarami | BearishHarami | TweezerBottom | TweezerTop => 0.6,
            PiercingLine | DarkCloudCover => 0.7,
            MorningStar | EveningStar | ThreeWhiteSoldiers | ThreeBlackCrows => 0.8,
            BullishAbandonedBaby | BearishAbandonedBaby => 0.85,
            DoubleTop | DoubleBottom => 0.7,
            HeadAndShoulders | InverseHeadAndShoulders => 0.75,
            AscendingTriangle | DescendingTriangle | SymmetricalTriangle | RisingWedge
            | FallingWedge => 0.65,
            BullFlag | BearFlag | CupAndHandle => 0.7,
            Rectangle | AscendingChannel | DescendingChannel => 0.6,
            BreakawayGapUp | BreakawayGapDown => 0.7,
            ExhaustionGapUp | ExhaustionGapDown => 0.65,
            GapUp | GapDown => 0.5,
            IslandTop | IslandBottom => 0.75,
            VolumeClimaxUp | VolumeClimaxDown => 0.65,
            VolumeDryUp => 0.55,
            Accumulation | Distribution => 0.6,
            TrendLineSupport | TrendLineResistance => 0.6,
        }
    }

    /// Per-bar multiplicative decay applied by the aging engine. Short-lived
    /// candlestick formations decay fast; structural patterns persist.
    /// Kinds without an explicit row use [`DEFAULT_DECAY_RATE`].
    pub fn decay_rate(self) -> f64 {
        use PatternKind::*;
        match self {
            Doji | DragonflyDoji | GravestoneDoji | SpinningTop | Hammer | InvertedHammer
            | HangingMan | ShootingStar => 0.90,
            BullishEngulfing | BearishEngulfing | BullishHarami | BearishHarami
            | PiercingLine | DarkCloudCover | TweezerBottom | TweezerTop => 0.92,
            MorningStar | EveningStar | ThreeWhiteSoldiers | ThreeBlackCrows
            | BullishAbandonedBaby | BearishAbandonedBaby => 0.93,
            BullFlag | BearFlag => 0.96,
            DoubleTop | DoubleBottom | HeadAndShoulders | InverseHeadAndShoulders
            | AscendingTriangle | DescendingTriangle | SymmetricalTriangle | RisingWedge
            | FallingWedge | Rectangle | AscendingChannel | DescendingChannel => 0.97,
            CupAndHandle | TrendLineSupport | TrendLineResistance => 0.98,
            _ => DEFAULT_DECAY_RATE,
        }
    }
}

// ============================================================
// PATTERN SIGNAL
// ============================================================

/// A confirmed pattern detection. `bar_index` points at the bar where the
/// pattern completes; two detections with the same kind at different
/// indices are distinct signals.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternSignal {
    pub kind: PatternKind,
    pub category: PatternCategory,
    pub direction: Direction,
    pub confidence: f64,
    pub bar_index: usize,
    pub description: String,
    pub entry_trigger: Option<f64>,
    pub target: Option<f64>,
    pub stop_loss: Option<f64>,
}

impl PatternSignal {
    /// Signal with the kind's canonical bias and assigned confidence.
    pub fn new(kind: PatternKind, bar_index: usize, description: impl Into<String>) -> Self {
        Self {
            kind,
            category: kind.category(),
            direction: kind.bias(),
            confidence: kind.base_confidence(),
            bar_index,
            description: description.into(),
            entry_trigger: None,
            target: None,
            stop_loss: None,
        }
    }

    pub fn with_levels(mut self, entry: f64, target: f64, stop: f64) -> Self {
        self.entry_trigger = Some(round2(entry));
        self.target = Some(round2(target));
        self.stop_loss = Some(round2(stop));
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

// ============================================================
// EXTERNAL COLLABORATOR RECORDS
// ============================================================

/// Externally computed base indicators. Every field is optional; an absent
/// field contributes nothing to any score (never treated as zero). NaN
/// values are normalized to absent at the consumption site.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Indicators {
    pub rsi_14: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub ema_8: Option<f64>,
    pub ema_21: Option<f64>,
    pub adx: Option<f64>,
    pub atr_14: Option<f64>,
    /// 50-day average of ATR, for compression checks.
    pub atr_50_avg: Option<f64>,
    pub bb_width: Option<f64>,
    /// Six-month low of Bollinger band width, for squeeze checks.
    pub bb_width_6m_low: Option<f64>,
    pub relative_volume: Option<f64>,
    pub obv: Option<f64>,
    /// OBV twenty bars ago, for slope checks.
    pub obv_20_ago: Option<f64>,
    /// Sector-relative strength signal, positive = outperforming.
    pub relative_strength: Option<f64>,
}

impl Indicators {
    /// Fetch a field, treating NaN as absent.
    #[inline]
    pub(crate) fn valid(value: Option<f64>) -> Option<f64> {
        value.filter(|v| v.is_finite())
    }
}

/// Dealer gamma exposure snapshot.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GammaExposure {
    /// Net dealer gamma; negative amplifies moves.
    pub total_gex: f64,
    pub flip_point: Option<f64>,
}

/// Unusual options activity summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnusualActivity {
    pub detected: bool,
    pub bullish: bool,
    pub largest_block_usd: Option<f64>,
    pub call_volume_oi_ratio: Option<f64>,
}

/// Dark pool activity summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DarkPoolActivity {
    pub total_notional_usd: f64,
    pub buy_ratio: Option<f64>,
}

/// Sweep order flow summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SweepActivity {
    pub count: u32,
    pub bullish_notional_usd: f64,
    pub bearish_notional_usd: f64,
}

/// Open-interest wall levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpenInterestProfile {
    pub call_wall: Option<f64>,
    pub put_wall: Option<f64>,
}

/// Optional options-analytics context. Any subset of fields may be absent;
/// every consumer checks presence before use and degrades gracefully.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptionsContext {
    pub gex: Option<GammaExposure>,
    pub unusual_activity: Option<UnusualActivity>,
    pub dark_pool: Option<DarkPoolActivity>,
    pub sweep_orders: Option<SweepActivity>,
    pub put_call_ratio: Option<f64>,
    pub oi_analysis: Option<OpenInterestProfile>,
    pub max_pain: Option<f64>,
}

// ============================================================
// NUMERIC HELPERS
// ============================================================

pub(crate) const EPS: f64 = 1e-9;

/// Divide with an epsilon-guarded denominator (denominators here are
/// magnitudes: prices, volumes, ranges).
#[inline]
pub(crate) fn safe_div(num: f64, den: f64) -> f64 {
    num / den.abs().max(EPS)
}

#[inline]
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[inline]
pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Percent change from `from` to `to`, epsilon-guarded.
#[inline]
pub(crate) fn pct_change(from: f64, to: f64) -> f64 {
    safe_div(to - from, from)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_derived_properties() {
        let bar = Bar::new(0, 100.0, 110.0, 90.0, 105.0, 1_000.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.upper_wick(), 5.0);
        assert_eq!(bar.lower_wick(), 10.0);
        assert!(bar.is_bullish());
        assert!((bar.body_ratio().unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn bar_validation_rejects_bad_data() {
        assert!(Bar::new(0, 100.0, 90.0, 110.0, 100.0, 1.0).validate().is_err());
        assert!(Bar::new(0, f64::NAN, 1.0, 0.0, 0.5, 1.0).validate().is_err());
        assert!(Bar::new(0, 1.0, 2.0, 0.5, 1.5, -1.0).validate().is_err());
        assert!(Bar::new(0, 1.0, 2.0, 0.5, 1.5, 0.0).validate().is_ok());
    }

    #[test]
    fn pattern_kind_attributes_are_consistent() {
        assert_eq!(PatternKind::BullishEngulfing.base_confidence(), 0.75);
        assert_eq!(PatternKind::ThreeWhiteSoldiers.base_confidence(), 0.80);
        assert_eq!(PatternKind::BullishAbandonedBaby.base_confidence(), 0.85);
        assert_eq!(PatternKind::BullishEngulfing.bias(), Direction::Bullish);
        assert_eq!(PatternKind::DoubleTop.category(), PatternCategory::Chart);
        // Single-bar candles decay fastest, structures slowest.
        assert!(PatternKind::Doji.decay_rate() < PatternKind::DoubleTop.decay_rate());
        assert_eq!(PatternKind::GapUp.decay_rate(), DEFAULT_DECAY_RATE);
    }

    #[test]
    fn decay_rates_are_within_documented_band() {
        use PatternKind::*;
        for kind in [
            Doji,
            Hammer,
            BullishEngulfing,
            MorningStar,
            DoubleTop,
            CupAndHandle,
            GapUp,
            VolumeDryUp,
            TrendLineSupport,
        ] {
            let rate = kind.decay_rate();
            assert!((0.90..=0.98).contains(&rate), "{:?} -> {}", kind, rate);
        }
    }

    #[test]
    fn signal_constructor_uses_kind_attributes() {
        let sig = PatternSignal::new(PatternKind::MorningStar, 7, "test")
            .with_levels(101.236, 110.0, 95.555);
        assert_eq!(sig.direction, Direction::Bullish);
        assert_eq!(sig.confidence, 0.8);
        assert_eq!(sig.category, PatternCategory::Candlestick);
        assert_eq!(sig.entry_trigger, Some(101.24));
        assert_eq!(sig.stop_loss, Some(95.56));
    }

    #[test]
    fn indicators_nan_is_absent() {
        assert_eq!(Indicators::valid(Some(f64::NAN)), None);
        assert_eq!(Indicators::valid(Some(5.0)), Some(5.0));
        assert_eq!(Indicators::valid(None), None);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round4(1.234567), 1.2346);
        assert!(safe_div(1.0, 0.0).is_finite());
    }
}
