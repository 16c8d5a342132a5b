//! Per-component similarity functions. Every function returns a value in
//! [0, 1]; 0.5 means "no information".

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::CategoricalScores;
use crate::model::Sex;

pub const NEUTRAL: f64 = 0.5;

pub const DAYS_PER_YEAR: f64 = 365.25;
/// Half-width of the band built around the projected age.
pub const AGE_TOLERANCE_YEARS: f64 = 2.0;
pub const AGE_DECAY_SCALE: f64 = 5.0;
pub const HEIGHT_SCALE_IN: f64 = 3.0;
pub const WEIGHT_SCALE_LB: f64 = 20.0;

pub const MAX_SHARED_TATTOOS: usize = 2;
pub const MAX_SHARED_ITEMS: usize = 2;
pub const MAX_SHARED_MODALITIES: usize = 3;

pub fn exp_decay(gap: f64, scale: f64) -> f64 {
    (-gap.max(0.0) / scale).exp()
}

/// Days from last seen to found. Negative when found before last seen.
pub fn days_gap(last_seen: Option<NaiveDate>, found: Option<NaiveDate>) -> Option<i64> {
    Some((found? - last_seen?).num_days())
}

/// `None` is a hard reject: both sexes known and different.
pub fn sex_similarity(mp: Sex, up: Sex) -> Option<f64> {
    if mp.conflicts_with(up) {
        None
    } else if mp == up && mp.is_known() {
        Some(1.0)
    } else {
        Some(NEUTRAL)
    }
}

/// Compare the missing person's age, projected forward by the time elapsed
/// until the body was found, against the estimated age range.
///
/// Ranges are inclusive year ranges, so a range's length is `max - min + 1`.
pub fn age_similarity(
    mp_age_at_missing: Option<f64>,
    up_range: Option<(f64, f64)>,
    days_gap: Option<i64>,
) -> f64 {
    let (Some(age), Some((up_min, up_max))) = (mp_age_at_missing, up_range) else {
        return NEUTRAL;
    };

    let projected = match days_gap {
        Some(days) if days >= 0 => age + days as f64 / DAYS_PER_YEAR,
        _ => age,
    };
    let mp_min = projected - AGE_TOLERANCE_YEARS;
    let mp_max = projected + AGE_TOLERANCE_YEARS;

    let overlap = (mp_max.min(up_max) - mp_min.max(up_min) + 1.0).max(0.0);
    if overlap <= 0.0 {
        let gap = (mp_min - up_max).abs().min((up_min - mp_max).abs());
        return (0.5 * (-gap / AGE_DECAY_SCALE).exp()).max(0.0);
    }

    let mp_len = mp_max - mp_min + 1.0;
    let up_len = up_max - up_min + 1.0;
    let avg_len = (mp_len + up_len) / 2.0;
    (overlap / avg_len).min(1.0)
}

/// Exponential decay of the absolute difference (height, weight).
pub fn physical_similarity(a: Option<f64>, b: Option<f64>, scale: f64) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => exp_decay((a - b).abs(), scale),
        _ => NEUTRAL,
    }
}

pub fn distance_similarity(km: Option<f64>) -> f64 {
    match km {
        Some(km) => 1.0 / (1.0 + km.max(0.0).ln_1p()),
        None => NEUTRAL,
    }
}

/// Case-insensitive comparison of a categorical attribute.
pub fn categorical_similarity(a: Option<&str>, b: Option<&str>, scores: CategoricalScores) -> f64 {
    let a = a.map(str::trim).filter(|s| !s.is_empty());
    let b = b.map(str::trim).filter(|s| !s.is_empty());
    match (a, b) {
        (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => scores.equal,
        (Some(_), Some(_)) => scores.diff,
        _ => NEUTRAL,
    }
}

/// Shorter time between disappearance and recovery scores higher.
pub fn temporal_similarity(days_gap: Option<i64>) -> f64 {
    let Some(days) = days_gap else {
        return NEUTRAL;
    };
    match days {
        d if d <= 30 => 1.0,
        d if d <= 180 => 0.8,
        d if d <= 365 => 0.6,
        d if d <= 1825 => 0.4,
        d => 0.4 * (-((d - 1825) as f64) / 3650.0).exp(),
    }
}

/// `found` earlier than `last_seen` by more than the tolerance.
pub fn is_temporal_reject(days_gap: Option<i64>, tolerance_days: i64) -> bool {
    matches!(days_gap, Some(d) if d < -tolerance_days)
}

/// Shared token count, capped and normalized to [0, 1]. `None` when either
/// side has no tokens of this kind.
pub fn shared_token_signal(a: &BTreeSet<String>, b: &BTreeSet<String>, cap: usize) -> Option<f64> {
    if a.is_empty() || b.is_empty() || cap == 0 {
        return None;
    }
    let shared = a.intersection(b).count().min(cap);
    Some(shared as f64 / cap as f64)
}

/// 1.0 when at least one distinctive mark is shared.
pub fn distinctive_mark_signal(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some(if a.intersection(b).next().is_some() { 1.0 } else { 0.0 })
}
