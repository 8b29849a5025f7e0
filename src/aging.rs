//! Signal aging: freshness, decay, invalidation and confirmation.
//!
//! Each detected signal decays exponentially as bars pass:
//! `aged_confidence = original_confidence * decay_rate^bars_elapsed`, with
//! the per-kind rate from [`PatternKind::decay_rate`]. Terminal states
//! (`Confirmed`, `Invalidated`) are never re-aged - feeding a terminal
//! signal back in returns it unchanged.
//!
//! The engine holds no state: the caller supplies its most recent aged
//! batch (from whatever store it uses) together with any new detections,
//! and receives the re-evaluated batch back. With no prior batch, every
//! input signal is aged from its own detection bar.

use crate::config::AgingParams;
use crate::{pct_change, round2, round4, Direction, Ohlcv, PatternSignal};

/// Lifecycle state, declared in batch sort order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Confirmed,
    Fresh,
    Active,
    Aging,
    Stale,
    Invalidated,
}

impl SignalStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, SignalStatus::Confirmed | SignalStatus::Invalidated)
    }
}

/// A pattern signal with its lifecycle state.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AgedSignal {
    pub signal: PatternSignal,
    pub original_confidence: f64,
    pub aged_confidence: f64,
    /// Percentage decay since detection, 0-100.
    pub staleness: f64,
    pub status: SignalStatus,
    pub bars_elapsed: usize,
    pub decay_rate: f64,
    /// Bars until confidence halves at this decay rate; diagnostic only.
    pub half_life_bars: f64,
    pub invalidation_reason: Option<String>,
}

impl AgedSignal {
    /// Wrap a detection as a fresh, un-aged signal.
    pub fn fresh(signal: PatternSignal) -> Self {
        let rate = signal.kind.decay_rate();
        let confidence = signal.confidence;
        Self {
            original_confidence: confidence,
            aged_confidence: confidence,
            staleness: 0.0,
            status: SignalStatus::Fresh,
            bars_elapsed: 0,
            decay_rate: rate,
            half_life_bars: round2(half_life(rate)),
            invalidation_reason: None,
            signal,
        }
    }
}

#[inline]
fn half_life(rate: f64) -> f64 {
    (0.5f64).ln() / rate.min(1.0 - f64::EPSILON).ln()
}

/// Re-evaluate a batch of signals against the current bar series.
///
/// `prior` is the caller's last aged batch (possibly empty); `detections`
/// are newly scanned signals. A detection whose `(kind, bar_index)` is
/// already tracked in `prior` is dropped as a duplicate. The returned
/// batch is sorted confirmed, fresh, active, aging, stale, invalidated,
/// then by descending aged confidence.
pub fn age_signals<T: Ohlcv>(
    prior: Vec<AgedSignal>,
    detections: Vec<PatternSignal>,
    bars: &[T],
    params: &AgingParams,
) -> Vec<AgedSignal> {
    let mut batch = prior;
    for det in detections {
        let tracked = batch
            .iter()
            .any(|a| a.signal.kind == det.kind && a.signal.bar_index == det.bar_index);
        if !tracked {
            batch.push(AgedSignal::fresh(det));
        }
    }

    let mut out: Vec<AgedSignal> = batch
        .into_iter()
        .map(|aged| evaluate(aged, bars, params))
        .collect();

    out.sort_by(|a, b| {
        a.status.cmp(&b.status).then(
            b.aged_confidence
                .partial_cmp(&a.aged_confidence)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    out
}

fn evaluate<T: Ohlcv>(mut aged: AgedSignal, bars: &[T], params: &AgingParams) -> AgedSignal {
    // Terminal states are idempotent.
    if aged.status.is_terminal() {
        return aged;
    }
    if bars.is_empty() {
        return aged;
    }

    let last_index = bars.len() - 1;
    let bar_index = aged.signal.bar_index.min(last_index);
    let elapsed = last_index - bar_index;
    let rate = aged.decay_rate;
    let original = aged.original_confidence;
    let decayed = original * rate.powi(elapsed as i32);

    aged.bars_elapsed = elapsed;

    let direction = aged.signal.direction;
    // Only bars after the completion bar can confirm or invalidate; the
    // pattern's own bars always touch its levels.
    let since = &bars[bar_index + 1..];
    let detection_price = bars[bar_index].close();
    let current_close = bars[last_index].close();

    // Invalidation: explicit adverse level crossed, decay floor reached, or
    // a large adverse move after the grace period.
    if let Some(reason) = invalidation_reason(
        &aged.signal,
        since,
        decayed,
        elapsed,
        detection_price,
        current_close,
        params,
    ) {
        aged.aged_confidence = 0.0;
        aged.staleness = 100.0;
        aged.status = SignalStatus::Invalidated;
        aged.invalidation_reason = Some(reason);
        return aged;
    }

    // Confirmation: the entry trigger traded in the favorable direction.
    if let Some(entry) = aged.signal.entry_trigger {
        let reached = match direction {
            Direction::Bullish => since.iter().any(|b| b.high() >= entry),
            Direction::Bearish => since.iter().any(|b| b.low() <= entry),
            Direction::Neutral => false,
        };
        if reached {
            let boosted = (decayed * params.confirm_boost).min(1.0);
            let staleness = staleness_of(decayed, original) - params.confirm_staleness_relief;
            aged.aged_confidence = round4(boosted);
            aged.staleness = round2(staleness.max(0.0));
            aged.status = SignalStatus::Confirmed;
            return aged;
        }
    }

    let staleness = staleness_of(decayed, original);
    aged.aged_confidence = round4(decayed);
    aged.staleness = round2(staleness);
    aged.status = if staleness < params.fresh_below {
        SignalStatus::Fresh
    } else if staleness < params.active_below {
        SignalStatus::Active
    } else if staleness < params.aging_below {
        SignalStatus::Aging
    } else {
        SignalStatus::Stale
    };
    aged
}

#[inline]
fn staleness_of(aged: f64, original: f64) -> f64 {
    if original <= f64::EPSILON {
        return 100.0;
    }
    (100.0 * (1.0 - aged / original)).clamp(0.0, 100.0)
}

fn invalidation_reason<T: Ohlcv>(
    signal: &PatternSignal,
    since: &[T],
    decayed: f64,
    elapsed: usize,
    detection_price: f64,
    current_close: f64,
    params: &AgingParams,
) -> Option<String> {
    // Explicit level: stop_loss is the signal's stated negation price.
    if let Some(level) = signal.stop_loss {
        let crossed = match signal.direction {
            Direction::Bullish => since.iter().any(|b| b.low() < level),
            Direction::Bearish => since.iter().any(|b| b.high() > level),
            Direction::Neutral => false,
        };
        if crossed {
            return Some(format!(
                "price crossed invalidation level {level:.2} against the pattern"
            ));
        }
    }

    if decayed < params.confidence_floor {
        return Some(format!(
            "confidence decayed to {decayed:.3}, below floor {:.2}",
            params.confidence_floor
        ));
    }

    // Without an explicit level, a large move against the thesis after the
    // grace period still kills the signal.
    if elapsed > params.adverse_grace_bars {
        let drift = pct_change(detection_price, current_close);
        let adverse = match signal.direction {
            Direction::Bullish => drift < -params.adverse_move_pct,
            Direction::Bearish => drift > params.adverse_move_pct,
            Direction::Neutral => false,
        };
        if adverse {
            return Some(format!(
                "price moved {:.1}% against the pattern thesis",
                drift * 100.0
            ));
        }
    }

    None
}
