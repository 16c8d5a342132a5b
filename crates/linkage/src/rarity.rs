//! Demographic rarity per record and the pair boost derived from it.

use std::collections::HashMap;

use crate::config::RarityConfig;
use crate::frequency::FrequencyTable;
use crate::model::{CandidatePair, PersonRecord, Roster, RosterKind};

/// Age used for rarity: age at disappearance for a missing person, midpoint
/// of the estimated range for an unidentified person.
pub fn rarity_age(record: &PersonRecord, kind: RosterKind) -> Option<f64> {
    match kind {
        RosterKind::Missing => record.age_min.map(f64::from),
        RosterKind::Unidentified => {
            let (lo, hi) = record.age_range()?;
            Some((f64::from(lo) + f64::from(hi)) / 2.0)
        }
    }
}

/// Very young and elderly individuals are rare; adults are common.
pub fn age_rarity(age: f64) -> f64 {
    if age < 5.0 {
        0.8
    } else if age > 70.0 {
        0.6
    } else if age < 12.0 {
        0.4
    } else if age > 60.0 {
        0.3
    } else {
        0.1
    }
}

/// Mean of the scoreable rarity components; 0 when none apply.
pub fn record_rarity(record: &PersonRecord, table: &FrequencyTable) -> f64 {
    let components: Vec<f64> = [
        table.state_frequency(record).map(|f| 1.0 - f),
        table.sex_frequency(record).map(|f| 1.0 - f),
        table.race_frequency(record).map(|f| 1.0 - f),
        rarity_age(record, table.kind()).map(age_rarity),
    ]
    .into_iter()
    .flatten()
    .collect();

    if components.is_empty() {
        0.0
    } else {
        components.iter().sum::<f64>() / components.len() as f64
    }
}

/// Per-id rarity for both rosters, computed once per run.
#[derive(Debug, Clone, Default)]
pub struct RarityTable {
    missing: HashMap<String, f64>,
    unidentified: HashMap<String, f64>,
}

impl RarityTable {
    pub fn build(missing: &Roster, unidentified: &Roster) -> Self {
        Self {
            missing: by_id(missing),
            unidentified: by_id(unidentified),
        }
    }

    pub fn missing(&self, id: &str) -> f64 {
        self.missing.get(id).copied().unwrap_or(0.0)
    }

    pub fn unidentified(&self, id: &str) -> f64 {
        self.unidentified.get(id).copied().unwrap_or(0.0)
    }
}

fn by_id(roster: &Roster) -> HashMap<String, f64> {
    let table = FrequencyTable::build(roster);
    roster
        .records()
        .iter()
        .map(|r| (r.id.clone(), record_rarity(r, &table)))
        .collect()
}

/// Boost for a pair given both sides' rarity. Tiers are exclusive.
pub fn pair_boost(config: &RarityConfig, mp_rarity: f64, up_rarity: f64) -> f64 {
    let rare = config.rare_threshold;
    let somewhat = config.somewhat_rare_threshold;
    if mp_rarity > rare && up_rarity > rare {
        config.both_rare_boost
    } else if mp_rarity > rare || up_rarity > rare {
        config.one_rare_boost
    } else if mp_rarity > somewhat && up_rarity > somewhat {
        config.both_somewhat_rare_boost
    } else {
        0.0
    }
}

pub fn apply(config: &RarityConfig, table: &RarityTable, pairs: &mut [CandidatePair]) {
    for pair in pairs.iter_mut() {
        pair.mp_rarity = table.missing(&pair.mp_id);
        pair.up_rarity = table.unidentified(&pair.up_id);
        pair.rarity_boost = pair_boost(config, pair.mp_rarity, pair.up_rarity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sex;

    #[test]
    fn age_rarity_bands() {
        assert_eq!(age_rarity(2.0), 0.8);
        assert_eq!(age_rarity(5.0), 0.4);
        assert_eq!(age_rarity(11.5), 0.4);
        assert_eq!(age_rarity(12.0), 0.1);
        assert_eq!(age_rarity(60.0), 0.1);
        assert_eq!(age_rarity(65.0), 0.3);
        assert_eq!(age_rarity(70.0), 0.3);
        assert_eq!(age_rarity(71.0), 0.6);
    }

    #[test]
    fn rarity_age_by_roster() {
        let mut r = PersonRecord::new("x");
        r.age_min = Some(20);
        r.age_max = Some(30);
        assert_eq!(rarity_age(&r, RosterKind::Missing), Some(20.0));
        assert_eq!(rarity_age(&r, RosterKind::Unidentified), Some(25.0));
        r.age_max = None;
        assert_eq!(rarity_age(&r, RosterKind::Unidentified), None);
    }

    #[test]
    fn record_rarity_is_mean_of_present_components() {
        let mut common = PersonRecord::new("1");
        common.sex = Sex::Male;
        common.location.state = Some("TX".into());
        let mut rare = PersonRecord::new("2");
        rare.sex = Sex::Male;
        rare.location.state = Some("TX".into());
        rare.age_min = Some(3);
        let mut other = PersonRecord::new("3");
        other.sex = Sex::Male;
        other.location.state = Some("TX".into());
        let mut lone = PersonRecord::new("4");
        lone.sex = Sex::Female;
        lone.location.state = Some("AK".into());

        let roster = Roster::new(RosterKind::Missing, vec![common, rare, other, lone]).unwrap();
        let table = FrequencyTable::build(&roster);

        // state 1 - 0.75, sex 1 - 0.75
        assert!((record_rarity(roster.get("1").unwrap(), &table) - 0.25).abs() < 1e-12);
        // plus age 0.8
        let expected = (0.25 + 0.25 + 0.8) / 3.0;
        assert!((record_rarity(roster.get("2").unwrap(), &table) - expected).abs() < 1e-12);
        assert!((record_rarity(roster.get("4").unwrap(), &table) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn pair_boost_tiers() {
        let config = RarityConfig::default();
        assert_eq!(pair_boost(&config, 0.6, 0.7), 0.20);
        assert_eq!(pair_boost(&config, 0.6, 0.1), 0.10);
        assert_eq!(pair_boost(&config, 0.1, 0.51), 0.10);
        assert_eq!(pair_boost(&config, 0.4, 0.35), 0.05);
        assert_eq!(pair_boost(&config, 0.5, 0.3), 0.0);
        assert_eq!(pair_boost(&config, 0.0, 0.0), 0.0);
    }

    #[test]
    fn unknown_ids_have_zero_rarity() {
        let table = RarityTable::default();
        assert_eq!(table.missing("nope"), 0.0);
        assert_eq!(table.unidentified("nope"), 0.0);
    }
}
