//! Confluence scoring: one number from current-bar detections plus
//! externally supplied indicators.
//!
//! Pure function of its inputs, no detection of its own. The scale is
//! directional: baseline 50, bullish evidence adds, bearish evidence
//! subtracts, clamped to [0, 100].

use crate::{round2, Direction, Indicators, PatternSignal};

/// Result of confluence scoring.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfluenceScore {
    /// 0-100; above 50 leans bullish, below 50 bearish.
    pub score: f64,
    /// Net bias implied by the score.
    pub bias: Direction,
    /// Labelled contributions actually applied (factor, points).
    pub factors: Vec<(String, f64)>,
}

const BASELINE: f64 = 50.0;
const PATTERN_CAP: f64 = 20.0;
const PATTERN_POINTS_EACH: f64 = 5.0;
const RSI_POINTS: f64 = 10.0;
const MACD_POINTS: f64 = 10.0;
const VOLUME_POINTS: f64 = 10.0;
const VOLUME_CONFIRM_FLOOR: f64 = 1.5;

/// Score pattern/indicator agreement. Re-running on identical input yields
/// identical output.
pub fn confluence_score(signals: &[PatternSignal], indicators: &Indicators) -> ConfluenceScore {
    let mut score = BASELINE;
    let mut factors: Vec<(String, f64)> = Vec::new();

    // Pattern bias x count, capped at +/-20.
    let bullish = signals.iter().filter(|s| s.direction.is_bullish()).count() as f64;
    let bearish = signals.iter().filter(|s| s.direction.is_bearish()).count() as f64;
    let pattern_pts =
        ((bullish - bearish) * PATTERN_POINTS_EACH).clamp(-PATTERN_CAP, PATTERN_CAP);
    if pattern_pts != 0.0 {
        score += pattern_pts;
        factors.push((
            format!("patterns {bullish:.0} bullish / {bearish:.0} bearish"),
            pattern_pts,
        ));
    }

    let bias = if pattern_pts > 0.0 {
        Direction::Bullish
    } else if pattern_pts < 0.0 {
        Direction::Bearish
    } else {
        Direction::Neutral
    };

    // RSI agreement: an oversold reading supports a bullish reversal bias,
    // an overbought reading a bearish one.
    if let Some(rsi) = Indicators::valid(indicators.rsi_14) {
        if bias.is_bullish() && rsi < 40.0 {
            score += RSI_POINTS;
            factors.push((format!("RSI {rsi:.1} oversold agrees"), RSI_POINTS));
        } else if bias.is_bearish() && rsi > 60.0 {
            score -= RSI_POINTS;
            factors.push((format!("RSI {rsi:.1} overbought agrees"), -RSI_POINTS));
        }
    }

    // MACD histogram sign agreement.
    if let Some(hist) = Indicators::valid(indicators.macd_histogram) {
        if bias.is_bullish() && hist > 0.0 {
            score += MACD_POINTS;
            factors.push(("MACD histogram positive agrees".to_string(), MACD_POINTS));
        } else if bias.is_bearish() && hist < 0.0 {
            score -= MACD_POINTS;
            factors.push(("MACD histogram negative agrees".to_string(), -MACD_POINTS));
        }
    }

    // Heavy relative volume confirms whichever way the patterns lean.
    if let Some(rel) = Indicators::valid(indicators.relative_volume) {
        if rel > VOLUME_CONFIRM_FLOOR {
            match bias {
                Direction::Bullish => {
                    score += VOLUME_POINTS;
                    factors.push((format!("relative volume {rel:.1}x confirms"), VOLUME_POINTS));
                }
                Direction::Bearish => {
                    score -= VOLUME_POINTS;
                    factors.push((format!("relative volume {rel:.1}x confirms"), -VOLUME_POINTS));
                }
                Direction::Neutral => {}
            }
        }
    }

    ConfluenceScore {
        score: round2(score.clamp(0.0, 100.0)),
        bias,
        factors,
    }
}
