//! Pattern detectors.
//!
//! # Detector families
//!
//! - **Candlestick**: 1/2/3-bar geometric shapes over the last ~10 bars.
//! - **Chart**: swing-structure geometry (doubles, head & shoulders,
//!   triangles, wedges, flags, cup & handle, channels, rectangles).
//! - **Gap/Volume**: gap classification, island reversals, volume
//!   climax/dry-up/accumulation/distribution.
//! - **Emerging**: partially-formed structures with a progress percentage.
//! - **Pre-confirmation**: setups one bar away from completing a pattern.

pub mod candlestick;
pub mod chart;
pub mod emerging;
pub mod gap_volume;
pub mod preconfirm;

pub use candlestick::detect_candlesticks;
pub use chart::detect_chart_patterns;
pub use emerging::{detect_emerging_patterns, EmergingKind, EmergingPattern};
pub use gap_volume::detect_gap_volume;
pub use preconfirm::{detect_preconfirmations, PreConfirmation};
