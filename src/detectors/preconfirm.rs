//! Pre-confirmation setups: candlestick formations exactly one bar away
//! from completing a named pattern.
//!
//! Only the latest bar plus up to two lookback bars are examined. Each
//! result states the exact price the *next* bar must reach to confirm, and
//! a static estimated probability (0.38-0.55; rarer formations sit at the
//! low end). This is a prediction about an unformed bar, never a
//! detection.

use super::candlestick::trailing_avg_body;
use crate::config::CandlestickParams;
use crate::{pct_change, round2, safe_div, Direction, Ohlcv, OhlcvExt};

/// A setup one bar from confirmation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PreConfirmation {
    pub name: &'static str,
    pub direction: Direction,
    /// Static estimated probability of confirmation, 0.38-0.55.
    pub probability: f64,
    /// Price the next bar must reach (in the setup's direction).
    pub confirmation_price: f64,
    /// The condition the next bar must satisfy, spelled out.
    pub condition: String,
    /// Index of the latest (setup) bar.
    pub bar_index: usize,
}

fn setup(
    name: &'static str,
    direction: Direction,
    probability: f64,
    confirmation_price: f64,
    condition: String,
    bar_index: usize,
) -> PreConfirmation {
    PreConfirmation {
        name,
        direction,
        probability,
        confirmation_price: round2(confirmation_price),
        condition,
        bar_index,
    }
}

/// Scan the latest bar (plus <= 2 lookback bars) for setups.
pub fn detect_preconfirmations<T: Ohlcv>(
    bars: &[T],
    params: &CandlestickParams,
) -> Vec<PreConfirmation> {
    if bars.len() < 3 {
        return Vec::new();
    }
    let i = bars.len() - 1;
    let curr = &bars[i];
    let prev = &bars[i - 1];
    let before = &bars[i - 2];
    let avg_body = trailing_avg_body(bars, i, params.avg_body_period);

    let long = |body: f64| avg_body > 0.0 && body > avg_body * params.long_body_factor;
    let small = |body: f64| avg_body > 0.0 && body < avg_body * 0.5;
    let drift = if i >= 5 {
        pct_change(bars[i - 5].close(), prev.close())
    } else {
        0.0
    };

    let mut out = Vec::new();

    // --- Engulfing / piercing family: a long one-color bar invites the
    // opposite-color reversal bar.
    if curr.is_bearish() && long(curr.body()) {
        out.push(setup(
            "Pre Bullish Engulfing",
            Direction::Bullish,
            0.45,
            curr.open(),
            format!("next bar opens <= {:.2} and closes above {:.2}", round2(curr.close()), round2(curr.open())),
            i,
        ));
        out.push(setup(
            "Pre Piercing Line",
            Direction::Bullish,
            0.44,
            curr.midpoint(),
            format!("next green close above midpoint {:.2}", round2(curr.midpoint())),
            i,
        ));
    }
    if curr.is_bullish() && long(curr.body()) {
        out.push(setup(
            "Pre Bearish Engulfing",
            Direction::Bearish,
            0.45,
            curr.open(),
            format!("next bar opens >= {:.2} and closes below {:.2}", round2(curr.close()), round2(curr.open())),
            i,
        ));
        out.push(setup(
            "Pre Dark Cloud Cover",
            Direction::Bearish,
            0.44,
            curr.midpoint(),
            format!("next red close below midpoint {:.2}", round2(curr.midpoint())),
            i,
        ));
    }

    // --- Star family: big directional bar then a small-body/doji star; a
    // close past the big bar's midpoint completes the reversal.
    if prev.is_bearish() && long(prev.body()) && small(curr.body()) {
        if curr.open().max(curr.close()) < prev.close() {
            out.push(setup(
                "Pre Morning Star",
                Direction::Bullish,
                0.42,
                prev.midpoint(),
                format!("green close above {:.2}", round2(prev.midpoint())),
                i,
            ));
        }
        // A star that gapped clear of the red bar's low is one green gap
        // from an abandoned baby.
        if curr.high() < prev.low() {
            out.push(setup(
                "Pre Bullish Abandoned Baby",
                Direction::Bullish,
                0.38,
                curr.high(),
                format!("next bar gaps above {:.2} and closes green", round2(curr.high())),
                i,
            ));
        }
    }
    if prev.is_bullish() && long(prev.body()) && small(curr.body()) {
        if curr.open().min(curr.close()) > prev.close() {
            out.push(setup(
                "Pre Evening Star",
                Direction::Bearish,
                0.42,
                prev.midpoint(),
                format!("red close below {:.2}", round2(prev.midpoint())),
                i,
            ));
        }
        if curr.low() > prev.high() {
            out.push(setup(
                "Pre Bearish Abandoned Baby",
                Direction::Bearish,
                0.38,
                curr.low(),
                format!("next bar gaps below {:.2} and closes red", round2(curr.low())),
                i,
            ));
        }
    }

    // --- Soldier/crow runs: two stair-stepped bars await the third.
    if before.is_bullish()
        && curr.is_bullish()
        && prev.is_bullish()
        && prev.close() > before.close()
        && curr.close() > prev.close()
        && curr.open() > prev.open()
        && curr.open() < prev.close()
    {
        out.push(setup(
            "Pre Three White Soldiers",
            Direction::Bullish,
            0.40,
            curr.close(),
            format!("third green close above {:.2}, opening inside this body", round2(curr.close())),
            i,
        ));
    }
    if before.is_bearish()
        && curr.is_bearish()
        && prev.is_bearish()
        && prev.close() < before.close()
        && curr.close() < prev.close()
        && curr.open() < prev.open()
        && curr.open() > prev.close()
    {
        out.push(setup(
            "Pre Three Black Crows",
            Direction::Bearish,
            0.40,
            curr.close(),
            format!("third red close below {:.2}, opening inside this body", round2(curr.close())),
            i,
        ));
    }

    // --- Wick reversals: hammer/star shapes awaiting the confirming close.
    let range = curr.range();
    if range > f64::EPSILON {
        let small_body = avg_body > 0.0 && curr.body() < avg_body;
        if small_body
            && curr.lower_wick() >= curr.body() * params.wick_dominance
            && curr.upper_wick() <= curr.body()
            && drift < 0.0
        {
            out.push(setup(
                "Pre Hammer Confirmation",
                Direction::Bullish,
                0.50,
                curr.high(),
                format!("close above hammer high {:.2}", round2(curr.high())),
                i,
            ));
        }
        if small_body
            && curr.upper_wick() >= curr.body() * params.wick_dominance
            && curr.lower_wick() <= curr.body()
            && drift > 0.0
        {
            out.push(setup(
                "Pre Shooting Star Confirmation",
                Direction::Bearish,
                0.50,
                curr.low(),
                format!("close below star low {:.2}", round2(curr.low())),
                i,
            ));
        }
    }

    // --- Tweezers: a matched extreme awaiting the color flip through the
    // shared level.
    if safe_div((prev.low() - curr.low()).abs(), prev.low()) <= params.equal_tolerance
        && prev.is_bearish()
        && curr.is_bearish()
    {
        out.push(setup(
            "Pre Tweezer Bottom",
            Direction::Bullish,
            0.48,
            curr.open(),
            format!("green close above {:.2} holding low {:.2}", round2(curr.open()), round2(curr.low())),
            i,
        ));
    }
    if safe_div((prev.high() - curr.high()).abs(), prev.high()) <= params.equal_tolerance
        && prev.is_bullish()
        && curr.is_bullish()
    {
        out.push(setup(
            "Pre Tweezer Top",
            Direction::Bearish,
            0.48,
            curr.open(),
            format!("red close below {:.2} holding high {:.2}", round2(curr.open()), round2(curr.high())),
            i,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn flat(i: usize) -> Bar {
        Bar::new(i as i64, 100.0, 101.0, 99.0, 100.5, 1_000.0)
    }

    #[test]
    fn fewer_than_three_bars_is_empty() {
        let bars = vec![flat(0), flat(1)];
        assert!(detect_preconfirmations(&bars, &CandlestickParams::default()).is_empty());
    }

    #[test]
    fn big_red_bar_sets_up_bullish_reversals() {
        let mut bars: Vec<Bar> = (0..8).map(flat).collect();
        bars.push(Bar::new(8, 101.0, 101.5, 97.0, 97.5, 1_200.0)); // long red

        let setups = detect_preconfirmations(&bars, &CandlestickParams::default());
        let engulf = setups
            .iter()
            .find(|s| s.name == "Pre Bullish Engulfing")
            .expect("engulfing setup");
        assert_eq!(engulf.confirmation_price, 101.0);
        assert_eq!(engulf.direction, Direction::Bullish);

        let pierce = setups.iter().find(|s| s.name == "Pre Piercing Line").unwrap();
        assert_eq!(pierce.confirmation_price, 99.25);
    }

    #[test]
    fn morning_star_setup_needs_low_star() {
        let mut bars: Vec<Bar> = (0..8).map(flat).collect();
        bars.push(Bar::new(8, 101.0, 101.5, 96.5, 97.0, 1_200.0)); // long red
        bars.push(Bar::new(9, 96.3, 96.6, 96.0, 96.4, 800.0)); // small star below

        let setups = detect_preconfirmations(&bars, &CandlestickParams::default());
        let star = setups
            .iter()
            .find(|s| s.name == "Pre Morning Star")
            .expect("morning star setup");
        assert_eq!(star.confirmation_price, 99.0);
        assert!((0.38..=0.55).contains(&star.probability));
    }

    #[test]
    fn abandoned_baby_setup_is_rarest_and_lowest_probability() {
        let mut bars: Vec<Bar> = (0..8).map(flat).collect();
        bars.push(Bar::new(8, 101.0, 101.5, 97.0, 97.2, 1_200.0)); // long red, low 97
        bars.push(Bar::new(9, 96.4, 96.6, 96.1, 96.5, 800.0)); // star gapped below

        let setups = detect_preconfirmations(&bars, &CandlestickParams::default());
        let baby = setups
            .iter()
            .find(|s| s.name == "Pre Bullish Abandoned Baby")
            .expect("abandoned baby setup");
        assert_eq!(baby.probability, 0.38);
        assert!(setups
            .iter()
            .all(|s| s.probability >= baby.probability));
    }

    #[test]
    fn probabilities_stay_in_documented_band() {
        let mut bars: Vec<Bar> = (0..8).map(flat).collect();
        bars.push(Bar::new(8, 101.0, 101.5, 97.0, 97.5, 1_200.0));
        bars.push(Bar::new(9, 96.4, 96.6, 96.1, 96.5, 800.0));
        for s in detect_preconfirmations(&bars, &CandlestickParams::default()) {
            assert!((0.38..=0.55).contains(&s.probability), "{}", s.name);
        }
    }
}
