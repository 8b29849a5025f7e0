//! Full breakout assessment: precursors + scorer + failed-breakout check,
//! cross-referenced with optional options confirmation and institutional
//! activity detection, reduced to one conviction score and an explicit
//! recommendation.

use tracing::debug;

use crate::breakout::{
    detect_failed_breakout, scan_precursors, score_breakout, BreakoutSignal, FailedBreakout,
    FailedBreakoutAction,
};
use crate::config::BreakoutThresholds;
use crate::swing::linear_fit;
use crate::{
    pct_change, round2, safe_div, Indicators, Ohlcv, OhlcvExt, OptionsContext,
};

// ============================================================
// OPTIONS CONFIRMATION
// ============================================================

/// Verdict ladder over the options confirmation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionsVerdict {
    StronglyConfirmed,
    Confirmed,
    Neutral,
    Denied,
}

impl OptionsVerdict {
    fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            OptionsVerdict::StronglyConfirmed
        } else if score >= 50.0 {
            OptionsVerdict::Confirmed
        } else if score >= 30.0 {
            OptionsVerdict::Neutral
        } else {
            OptionsVerdict::Denied
        }
    }
}

/// Options-flow confirmation of a bullish breakout thesis.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptionsConfirmation {
    /// 0-100, sum of the bounded factor contributions.
    pub score: f64,
    pub verdict: OptionsVerdict,
    pub factors: Vec<String>,
}

/// Score options positioning against the breakout thesis. Every factor is
/// bounded; absent fields contribute nothing.
pub fn confirm_with_options(options: &OptionsContext, price: f64) -> OptionsConfirmation {
    let mut score: f64 = 0.0;
    let mut factors = Vec::new();

    if let Some(gex) = &options.gex {
        if gex.total_gex < 0.0 {
            score += 20.0;
            factors.push("dealers short gamma, moves amplified".to_string());
        } else {
            score += 5.0;
            factors.push("dealers long gamma, moves dampened".to_string());
        }
    }

    if let Some(ua) = &options.unusual_activity {
        if ua.detected && ua.bullish {
            score += 20.0;
            factors.push("bullish unusual options activity".to_string());
        }
    }

    if let Some(pcr) = options.put_call_ratio {
        if pcr < 0.7 {
            score += 15.0;
            factors.push(format!("put/call ratio {pcr:.2} leans bullish"));
        } else if pcr < 1.0 {
            score += 8.0;
            factors.push(format!("put/call ratio {pcr:.2} mildly bullish"));
        }
    }

    if let Some(sweeps) = &options.sweep_orders {
        if sweeps.count > 0 && sweeps.bullish_notional_usd > sweeps.bearish_notional_usd {
            score += 10.0;
            factors.push(format!("{} sweeps, bullish notional dominant", sweeps.count));
        }
    }

    if let Some(dp) = &options.dark_pool {
        if dp.buy_ratio.is_some_and(|r| r > 0.6) {
            score += 10.0;
            factors.push("dark pool flow skews to buys".to_string());
        }
    }

    if let Some(oi) = &options.oi_analysis {
        // Room below the call wall keeps the path clear.
        if oi.call_wall.is_some_and(|wall| price < wall * 0.98) {
            score += 10.0;
            factors.push("price below the call wall with room to run".to_string());
        }
    }

    if let Some(max_pain) = options.max_pain {
        if price < max_pain {
            score += 10.0;
            factors.push(format!("max pain {max_pain:.2} sits above price"));
        }
    }

    let score = round2(score.clamp(0.0, 100.0));
    OptionsConfirmation {
        score,
        verdict: OptionsVerdict::from_score(score),
        factors,
    }
}

// ============================================================
// INSTITUTIONAL ACTIVITY
// ============================================================

/// Evidence of institutional participation in recent bars.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InstitutionalActivity {
    pub detected: bool,
    /// 0-100 aggregate of the individual detections.
    pub score: f64,
    pub notes: Vec<String>,
}

const FLOW_WINDOW: usize = 20;
const DETECTION_FLOOR: f64 = 30.0;

/// Detect accumulation footprints: signed-volume/price divergence, volume
/// z-score anomalies, narrow-range-high-volume absorption bars, and dark
/// pool / sweep magnitude when options context is present.
pub fn detect_institutional_activity<T: Ohlcv>(
    bars: &[T],
    options: Option<&OptionsContext>,
) -> InstitutionalActivity {
    let mut score: f64 = 0.0;
    let mut notes = Vec::new();

    if bars.len() >= FLOW_WINDOW + 1 {
        let n = bars.len();
        // Signed-volume flow over the window vs. the price drift: flow
        // climbing while price goes nowhere reads as quiet accumulation.
        let window = &bars[n - FLOW_WINDOW..];
        let mut flow = 0.0;
        let mut flows = Vec::with_capacity(FLOW_WINDOW);
        for b in window {
            let sign = if b.is_bullish() {
                1.0
            } else if b.is_bearish() {
                -1.0
            } else {
                0.0
            };
            flow += sign * b.volume();
            flows.push(flow);
        }
        let xs: Vec<f64> = (0..flows.len()).map(|i| i as f64).collect();
        let drift = pct_change(window[0].close(), window[window.len() - 1].close());
        if let Some(fit) = linear_fit(&xs, &flows) {
            if fit.slope > 0.0 && drift.abs() < 0.01 {
                score += 30.0;
                notes.push(format!(
                    "volume flow climbing on {:.1}% price drift",
                    drift * 100.0
                ));
            }
        }

        // Volume z-score anomaly on the latest bar.
        let vols: Vec<f64> = bars[..n - 1].iter().map(|b| b.volume()).collect();
        let mean = vols.iter().sum::<f64>() / vols.len() as f64;
        let var = vols.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vols.len() as f64;
        let std = var.sqrt();
        let z = safe_div(bars[n - 1].volume() - mean, std.max(1.0));
        if z >= 2.0 {
            score += 25.0;
            notes.push(format!("latest volume {z:.1} standard deviations above mean"));
        }

        // Absorption: narrow range on heavy volume in the last 5 bars.
        let avg_range = window.iter().map(|b| b.range()).sum::<f64>() / window.len() as f64;
        let avg_vol = window.iter().map(|b| b.volume()).sum::<f64>() / window.len() as f64;
        let absorbed = bars[n - 5.min(n)..]
            .iter()
            .any(|b| b.range() < avg_range * 0.5 && b.volume() > avg_vol * 2.0);
        if absorbed {
            score += 25.0;
            notes.push("narrow-range bar on heavy volume (absorption)".to_string());
        }
    }

    if let Some(options) = options {
        if let Some(dp) = &options.dark_pool {
            if dp.total_notional_usd >= 1_000_000.0 {
                score += 10.0;
                notes.push(format!("dark pool notional ${:.1}M", dp.total_notional_usd / 1e6));
            }
        }
        if let Some(sweeps) = &options.sweep_orders {
            if sweeps.count > 0 {
                score += 10.0;
                notes.push(format!("{} sweep orders", sweeps.count));
            }
        }
    }

    let score = round2(score.clamp(0.0, 100.0));
    InstitutionalActivity {
        detected: score >= DETECTION_FLOOR,
        score,
        notes,
    }
}

// ============================================================
// FULL ASSESSMENT
// ============================================================

/// Final action recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Watchlist,
    Pass,
    Exit,
    Reduce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

/// Unified assessment report.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AssessmentReport {
    pub ticker: String,
    pub breakout: BreakoutSignal,
    pub failed_breakout: Option<FailedBreakout>,
    pub options_confirmation: Option<OptionsConfirmation>,
    pub institutional: InstitutionalActivity,
    /// `0.6*quality + 0.4*confirmation` with options data, else quality.
    pub conviction_score: f64,
    pub recommendation: Recommendation,
    pub urgency: Urgency,
}

/// Compose the full assessment for one ticker.
pub fn assess<T: Ohlcv>(
    ticker: &str,
    bars: &[T],
    indicators: &Indicators,
    options: Option<&OptionsContext>,
    breakout_level: Option<f64>,
    thresholds: &BreakoutThresholds,
) -> AssessmentReport {
    let precursors = scan_precursors(bars, indicators, options, thresholds);
    let breakout = score_breakout(
        ticker,
        bars,
        indicators,
        options,
        &precursors,
        breakout_level,
        thresholds,
    );
    let failed_breakout =
        breakout_level.and_then(|level| detect_failed_breakout(bars, level, thresholds));

    let price = bars.last().map(|b| b.close()).unwrap_or(0.0);
    let options_confirmation = options.map(|o| confirm_with_options(o, price));
    let institutional = detect_institutional_activity(bars, options);

    let conviction_score = match &options_confirmation {
        Some(conf) => round2(0.6 * breakout.quality_score + 0.4 * conf.score),
        None => breakout.quality_score,
    };

    // A failed breakout overrides the score ladder outright.
    let (recommendation, urgency) = match &failed_breakout {
        Some(failed) => (
            match failed.action {
                FailedBreakoutAction::Exit => Recommendation::Exit,
                FailedBreakoutAction::Reduce => Recommendation::Reduce,
            },
            Urgency::High,
        ),
        None if conviction_score >= 75.0 => (Recommendation::Buy, Urgency::Medium),
        None if conviction_score >= 50.0 => (Recommendation::Watchlist, Urgency::Low),
        None => (Recommendation::Pass, Urgency::Low),
    };

    debug!(
        ticker,
        quality = breakout.quality_score,
        conviction = conviction_score,
        ?recommendation,
        "assessment complete"
    );

    AssessmentReport {
        ticker: ticker.to_string(),
        breakout,
        failed_breakout,
        options_confirmation,
        institutional,
        conviction_score,
        recommendation,
        urgency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bar, GammaExposure, SweepActivity, UnusualActivity};

    fn flat(i: usize, volume: f64) -> Bar {
        Bar::new(i as i64, 100.0, 101.0, 99.0, 100.0, volume)
    }

    #[test]
    fn verdict_ladder_thresholds() {
        assert_eq!(OptionsVerdict::from_score(70.0), OptionsVerdict::StronglyConfirmed);
        assert_eq!(OptionsVerdict::from_score(55.0), OptionsVerdict::Confirmed);
        assert_eq!(OptionsVerdict::from_score(30.0), OptionsVerdict::Neutral);
        assert_eq!(OptionsVerdict::from_score(10.0), OptionsVerdict::Denied);
    }

    #[test]
    fn options_confirmation_stacks_bounded_factors() {
        let options = OptionsContext {
            gex: Some(GammaExposure {
                total_gex: -5.0e8,
                flip_point: None,
            }),
            unusual_activity: Some(UnusualActivity {
                detected: true,
                bullish: true,
                largest_block_usd: None,
                call_volume_oi_ratio: None,
            }),
            put_call_ratio: Some(0.6),
            sweep_orders: Some(SweepActivity {
                count: 3,
                bullish_notional_usd: 2.0e6,
                bearish_notional_usd: 0.5e6,
            }),
            max_pain: Some(110.0),
            ..Default::default()
        };
        let conf = confirm_with_options(&options, 100.0);
        // 20 gex + 20 unusual + 15 pcr + 10 sweeps + 10 max pain.
        assert_eq!(conf.score, 75.0);
        assert_eq!(conf.verdict, OptionsVerdict::StronglyConfirmed);
    }

    #[test]
    fn empty_context_is_denied() {
        let conf = confirm_with_options(&OptionsContext::default(), 100.0);
        assert_eq!(conf.score, 0.0);
        assert_eq!(conf.verdict, OptionsVerdict::Denied);
    }

    #[test]
    fn institutional_volume_anomaly() {
        let mut bars: Vec<Bar> = (0..49).map(|i| flat(i, 1_000.0)).collect();
        bars.push(flat(49, 10_000.0));
        let activity = detect_institutional_activity(&bars, None);
        assert!(activity.score >= 25.0);
    }

    #[test]
    fn conviction_blends_when_options_present() {
        let bars: Vec<Bar> = (0..50).map(|i| flat(i, 1_000.0)).collect();
        let options = OptionsContext {
            put_call_ratio: Some(0.6),
            ..Default::default()
        };
        let report = assess(
            "TEST",
            &bars,
            &Indicators::default(),
            Some(&options),
            None,
            &BreakoutThresholds::default(),
        );
        let conf = report.options_confirmation.as_ref().unwrap();
        let expected = round2(0.6 * report.breakout.quality_score + 0.4 * conf.score);
        assert_eq!(report.conviction_score, expected);
    }

    #[test]
    fn failed_breakout_overrides_recommendation() {
        let mut bars: Vec<Bar> = (0..44).map(|i| flat(i, 2_000.0)).collect();
        bars.push(Bar::new(44, 100.0, 106.0, 99.5, 105.0, 1_000.0));
        for i in 45..50 {
            bars.push(Bar::new(i as i64, 101.0, 102.0, 98.0, 99.0, 800.0));
        }
        let report = assess(
            "TEST",
            &bars,
            &Indicators::default(),
            None,
            Some(103.0),
            &BreakoutThresholds::default(),
        );
        assert_eq!(report.recommendation, Recommendation::Exit);
        assert_eq!(report.urgency, Urgency::High);
    }

    #[test]
    fn no_options_means_conviction_equals_quality() {
        let bars: Vec<Bar> = (0..50).map(|i| flat(i, 1_000.0)).collect();
        let report = assess(
            "TEST",
            &bars,
            &Indicators::default(),
            None,
            None,
            &BreakoutThresholds::default(),
        );
        assert!(report.options_confirmation.is_none());
        assert_eq!(report.conviction_score, report.breakout.quality_score);
    }
}
