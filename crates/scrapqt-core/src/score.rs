//! Sentiment score normalization.
//!
//! The scoring oracle answers with an integer in `1..=10`. Stored scores are
//! mapped linearly onto `-1.0..=1.0` so that 1 → -1.0 and 10 → 1.0.

use anyhow::{bail, Result};

pub const RAW_MIN: i64 = 1;
pub const RAW_MAX: i64 = 10;

const MIDPOINT: f64 = 5.5;
const HALF_RANGE: f64 = 4.5;

/// Map a raw oracle score onto `-1.0..=1.0`.
///
/// Fails when `raw` lies outside `1..=10`.
pub fn normalize_score(raw: i64) -> Result<f64> {
    if !(RAW_MIN..=RAW_MAX).contains(&raw) {
        bail!("score {} outside {}..={}", raw, RAW_MIN, RAW_MAX);
    }
    Ok((raw as f64 - MIDPOINT) / HALF_RANGE)
}

/// Whether a stored score is a valid normalized value.
pub fn is_normalized(score: f64) -> bool {
    (-1.0..=1.0).contains(&score)
}
