//! Swing-point extraction and least-squares fitting.
//!
//! Swings are the structural backbone: every chart-geometry, emerging and
//! trend-line detector consumes them. A point qualifies as a swing high iff
//! it is >= every neighbor within `order` bars on both sides (swing low:
//! <=). The first and last `order` bars can never qualify by construction.

/// A confirmed local extremum.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
}

/// Swing highs over a high series. Deterministic: identical input yields
/// identical output.
pub fn swing_highs(highs: &[f64], order: usize) -> Vec<SwingPoint> {
    extrema(highs, order, |center, neighbor| center >= neighbor)
}

/// Swing lows over a low series.
pub fn swing_lows(lows: &[f64], order: usize) -> Vec<SwingPoint> {
    extrema(lows, order, |center, neighbor| center <= neighbor)
}

fn extrema(series: &[f64], order: usize, dominates: impl Fn(f64, f64) -> bool) -> Vec<SwingPoint> {
    if order == 0 || series.len() < 2 * order + 1 {
        return Vec::new();
    }

    let mut points = Vec::new();
    for i in order..series.len() - order {
        let center = series[i];
        let confirmed = (i - order..i + order + 1)
            .filter(|&j| j != i)
            .all(|j| dominates(center, series[j]));
        if confirmed {
            points.push(SwingPoint {
                index: i,
                price: center,
            });
        }
    }
    points
}

// ============================================================
// LEAST SQUARES
// ============================================================

/// Ordinary least-squares line over (x, y) samples.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination; 1.0 when all points are collinear.
    pub r_squared: f64,
}

impl LineFit {
    #[inline]
    pub fn value_at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a line through the samples. `None` for fewer than two points or a
/// degenerate (zero-variance) x axis.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let xs = &xs[..n];
    let ys = &ys[..n];

    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let mut ss_xx = 0.0;
    let mut ss_xy = 0.0;
    let mut ss_yy = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        ss_xx += dx * dx;
        ss_xy += dx * dy;
        ss_yy += dy * dy;
    }

    if ss_xx <= f64::EPSILON {
        return None;
    }

    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;
    // Flat data fits its own mean exactly.
    let r_squared = if ss_yy <= f64::EPSILON {
        1.0
    } else {
        ((ss_xy * ss_xy) / (ss_xx * ss_yy)).clamp(0.0, 1.0)
    };

    Some(LineFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Fit a line through swing points (x = bar index).
pub fn fit_swings(points: &[SwingPoint]) -> Option<LineFit> {
    let xs: Vec<f64> = points.iter().map(|p| p.index as f64).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.price).collect();
    linear_fit(&xs, &ys)
}
