//! Final score, global ordering, per-MP top-N and the high-priority subset.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::{HighPriorityConfig, RankingConfig};
use crate::model::{CandidateEntry, CandidatePair, MpCandidates};

pub fn final_score(pair: &CandidatePair) -> f64 {
    (pair.base_score + pair.uniqueness_boost + pair.rarity_boost).clamp(0.0, 1.0)
}

/// Best first: score descending, then known distance ascending (unknown
/// last), then ids for a total order.
pub fn compare(a: &CandidatePair, b: &CandidatePair) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| match (a.km, b.km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.mp_id.cmp(&b.mp_id))
        .then_with(|| a.up_id.cmp(&b.up_id))
}

/// Set final scores and sort in place.
pub fn rank(pairs: &mut [CandidatePair]) {
    for pair in pairs.iter_mut() {
        pair.final_score = final_score(pair);
    }
    pairs.sort_by(compare);
}

/// Group ranked pairs by missing person, keeping the best `top_n` of each.
/// Groups come out in mp_id order.
pub fn top_candidates(config: &RankingConfig, ranked: &[CandidatePair]) -> Vec<MpCandidates> {
    let mut groups: BTreeMap<&str, Vec<CandidateEntry>> = BTreeMap::new();
    for pair in ranked {
        let entries = groups.entry(pair.mp_id.as_str()).or_default();
        if entries.len() < config.top_n {
            entries.push(CandidateEntry::from(pair));
        }
    }
    groups
        .into_iter()
        .map(|(mp_id, candidates)| MpCandidates {
            mp_id: mp_id.to_string(),
            candidates,
        })
        .collect()
}

/// Few competitors on both sides and a strong score.
pub fn is_high_priority(config: &HighPriorityConfig, pair: &CandidatePair) -> bool {
    pair.mp_match_count <= config.max_match_count
        && pair.up_match_count <= config.max_match_count
        && pair.final_score >= config.min_score
}

pub fn high_priority(config: &HighPriorityConfig, ranked: &[CandidatePair]) -> Vec<CandidatePair> {
    if !config.enabled {
        return Vec::new();
    }
    ranked
        .iter()
        .filter(|p| is_high_priority(config, p))
        .cloned()
        .collect()
}
