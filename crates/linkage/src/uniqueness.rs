//! Count-based uniqueness boost.
//!
//! A pair whose missing person (or unidentified person) has few competing
//! candidates is more likely to be the right one. Counts are taken over the
//! surviving scored pairs before any hard cap, and the per-side step boosts
//! are summed.

use std::collections::HashMap;

use crate::config::{BoostTier, UniquenessConfig};
use crate::model::CandidatePair;

/// Read-only candidate counts per id, built once per run.
#[derive(Debug, Clone, Default)]
pub struct MatchCounts {
    missing: HashMap<String, usize>,
    unidentified: HashMap<String, usize>,
}

impl MatchCounts {
    pub fn build(pairs: &[CandidatePair]) -> Self {
        let mut counts = Self::default();
        for pair in pairs {
            *counts.missing.entry(pair.mp_id.clone()).or_default() += 1;
            *counts.unidentified.entry(pair.up_id.clone()).or_default() += 1;
        }
        counts
    }

    pub fn missing(&self, id: &str) -> usize {
        self.missing.get(id).copied().unwrap_or(0)
    }

    pub fn unidentified(&self, id: &str) -> usize {
        self.unidentified.get(id).copied().unwrap_or(0)
    }
}

/// Boost of the first tier whose `max_count` covers `count`; 0 past the last.
pub fn tier_boost(tiers: &[BoostTier], count: usize) -> f64 {
    tiers
        .iter()
        .find(|tier| count <= tier.max_count)
        .map_or(0.0, |tier| tier.boost)
}

/// Annotate match counts and uniqueness boosts, then drop pairs over the
/// hard cap. Returns the number of pairs dropped.
pub fn apply(config: &UniquenessConfig, pairs: &mut Vec<CandidatePair>) -> usize {
    let counts = MatchCounts::build(pairs);
    for pair in pairs.iter_mut() {
        pair.mp_match_count = counts.missing(&pair.mp_id);
        pair.up_match_count = counts.unidentified(&pair.up_id);
        pair.uniqueness_boost =
            tier_boost(&config.tiers, pair.mp_match_count) + tier_boost(&config.tiers, pair.up_match_count);
    }

    let Some(cap) = config.hard_cap else {
        return 0;
    };
    let before = pairs.len();
    pairs.retain(|p| p.mp_match_count <= cap && p.up_match_count <= cap);
    let dropped = before - pairs.len();
    if dropped > 0 {
        log::info!("uniqueness hard cap {cap}: dropped {dropped} pairs");
    }
    dropped
}
