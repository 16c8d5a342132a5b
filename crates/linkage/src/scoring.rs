//! Profile-driven weighted scoring of candidate pairs.
//!
//! A profile is a component set plus a weight table. The base score is the
//! weighted mean over the components that are present for the pair; absent
//! components drop out of both numerator and denominator.

use rayon::prelude::*;

use crate::config::{CategoricalScores, LinkageConfig, ProfileKind};
use crate::error::LinkageError;
use crate::model::{CandidatePair, Component, ComponentScore, PersonRecord, Roster};
use crate::geo;
use crate::similarity;

/// Number of contributions kept as the pair's rationale.
pub const RATIONALE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    SexMismatch,
    FoundBeforeLastSeen,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectCounts {
    pub sex_mismatch: usize,
    pub found_before_last_seen: usize,
}

impl RejectCounts {
    pub fn total(&self) -> usize {
        self.sex_mismatch + self.found_before_last_seen
    }
}

#[derive(Debug, Clone)]
pub struct ScoringProfile {
    kind: ProfileKind,
    weights: Vec<(Component, f64)>,
    race: CategoricalScores,
    eye_color: CategoricalScores,
    reject_tolerance_days: i64,
}

impl ScoringProfile {
    pub fn from_config(config: &LinkageConfig) -> Result<Self, LinkageError> {
        let weights: Vec<(Component, f64)> = config
            .scoring
            .resolved_weights()
            .into_iter()
            .filter(|(_, w)| *w > 0.0)
            .collect();
        if weights.is_empty() {
            return Err(LinkageError::ZeroTotalWeight {
                profile: config.scoring.profile.to_string(),
            });
        }
        Ok(Self {
            kind: config.scoring.profile,
            weights,
            race: config.scoring.race_scores(),
            eye_color: config.scoring.eye_color_scores(),
            reject_tolerance_days: config.blocking.temporal_tolerance_days,
        })
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn weights(&self) -> &[(Component, f64)] {
        &self.weights
    }

    /// Hard-reject predicates, checked before any component is computed.
    pub fn reject_reason(&self, mp: &PersonRecord, up: &PersonRecord, days_gap: Option<i64>) -> Option<RejectReason> {
        if mp.sex.conflicts_with(up.sex) {
            return Some(RejectReason::SexMismatch);
        }
        if similarity::is_temporal_reject(days_gap, self.reject_tolerance_days) {
            return Some(RejectReason::FoundBeforeLastSeen);
        }
        None
    }

    /// Value of one component, or `None` when the component does not apply
    /// to this pair (evidence tokens missing on either side).
    fn component_value(&self, component: Component, mp: &PersonRecord, up: &PersonRecord, pair: &CandidatePair) -> Option<f64> {
        let value = match component {
            Component::Sex => similarity::sex_similarity(mp.sex, up.sex).unwrap_or(0.0),
            Component::Age => similarity::age_similarity(
                mp.age_min.or(mp.age_max).map(f64::from),
                up.age_range().map(|(lo, hi)| (f64::from(lo), f64::from(hi))),
                pair.days_gap,
            ),
            Component::Geography => geo::geographic_score(&mp.location, &up.location),
            Component::Height => similarity::physical_similarity(mp.height_in, up.height_in, similarity::HEIGHT_SCALE_IN),
            Component::Weight => similarity::physical_similarity(mp.weight_lb, up.weight_lb, similarity::WEIGHT_SCALE_LB),
            Component::Distance => similarity::distance_similarity(pair.km),
            Component::EyeColor => similarity::categorical_similarity(
                mp.eye_color.as_deref(),
                up.eye_color.as_deref(),
                self.eye_color,
            ),
            Component::Race => similarity::categorical_similarity(mp.race.as_deref(), up.race.as_deref(), self.race),
            Component::Temporal => similarity::temporal_similarity(pair.days_gap),
            Component::Tattoos => {
                return similarity::shared_token_signal(&mp.tattoos, &up.tattoos, similarity::MAX_SHARED_TATTOOS)
            }
            Component::Items => {
                return similarity::shared_token_signal(&mp.items, &up.items, similarity::MAX_SHARED_ITEMS)
            }
            Component::DistinctiveMarks => return similarity::distinctive_mark_signal(&mp.marks, &up.marks),
            Component::ForensicModalities => {
                return similarity::shared_token_signal(
                    &mp.modalities,
                    &up.modalities,
                    similarity::MAX_SHARED_MODALITIES,
                )
            }
        };
        Some(value)
    }

    /// Score one blocked pair in place.
    ///
    /// Returns `Ok(Err(reason))` for a hard reject (the pair must be dropped)
    /// and `Err` only for structural failures.
    pub fn score(
        &self,
        mp: &PersonRecord,
        up: &PersonRecord,
        mut pair: CandidatePair,
    ) -> Result<Result<CandidatePair, RejectReason>, LinkageError> {
        if let Some(reason) = self.reject_reason(mp, up, pair.days_gap) {
            return Ok(Err(reason));
        }

        let components: Vec<ComponentScore> = self
            .weights
            .iter()
            .filter_map(|&(component, weight)| {
                self.component_value(component, mp, up, &pair)
                    .map(|value| ComponentScore { component, value, weight })
            })
            .collect();

        let denominator: f64 = components.iter().map(|c| c.weight).sum();
        if denominator <= 0.0 {
            return Err(LinkageError::ZeroTotalWeight {
                profile: self.kind.to_string(),
            });
        }
        let numerator: f64 = components.iter().map(ComponentScore::contribution).sum();

        pair.base_score = (numerator / denominator).clamp(0.0, 1.0);
        pair.why = rationale(&components);
        pair.components = components;
        Ok(Ok(pair))
    }
}

/// Top contributions, largest first, formatted for investigators.
pub fn rationale(components: &[ComponentScore]) -> Vec<String> {
    let mut ordered: Vec<&ComponentScore> = components.iter().collect();
    // Stable sort keeps profile order among equal contributions.
    ordered.sort_by(|a, b| b.contribution().total_cmp(&a.contribution()));
    ordered
        .into_iter()
        .take(RATIONALE_LEN)
        .map(|c| format!("{} (+{:.2})", c.component.display_name(), c.contribution()))
        .collect()
}

/// Score all blocked pairs. Hard rejects are dropped and counted; a pair
/// whose ids do not resolve aborts the run.
pub fn score_pairs(
    profile: &ScoringProfile,
    missing: &Roster,
    unidentified: &Roster,
    pairs: Vec<CandidatePair>,
) -> Result<(Vec<CandidatePair>, RejectCounts), LinkageError> {
    let outcomes = pairs
        .into_par_iter()
        .map(|pair| {
            let mp = missing.require(&pair.mp_id)?;
            let up = unidentified.require(&pair.up_id)?;
            profile.score(mp, up, pair)
        })
        .collect::<Result<Vec<_>, LinkageError>>()?;

    let mut scored = Vec::with_capacity(outcomes.len());
    let mut rejects = RejectCounts::default();
    for outcome in outcomes {
        match outcome {
            Ok(pair) => scored.push(pair),
            Err(RejectReason::SexMismatch) => rejects.sex_mismatch += 1,
            Err(RejectReason::FoundBeforeLastSeen) => rejects.found_before_last_seen += 1,
        }
    }
    log::debug!(
        "scored {} pairs ({} hard rejects)",
        scored.len(),
        rejects.total()
    );
    Ok((scored, rejects))
}
