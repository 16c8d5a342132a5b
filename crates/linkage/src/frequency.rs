//! Empirical attribute frequencies for one roster.
//!
//! Built once before boosting and read-only afterwards. Frequencies are
//! relative to the whole roster size, so records with the attribute missing
//! still count in the denominator.

use std::collections::HashMap;

use crate::model::{normalize_key, PersonRecord, Roster, RosterKind, Sex};

#[derive(Debug, Clone)]
pub struct FrequencyTable {
    kind: RosterKind,
    total: usize,
    state: HashMap<String, usize>,
    sex: HashMap<Sex, usize>,
    race: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn build(roster: &Roster) -> Self {
        let mut table = Self {
            kind: roster.kind,
            total: roster.len(),
            state: HashMap::new(),
            sex: HashMap::new(),
            race: HashMap::new(),
        };
        for record in roster.records() {
            if let Some(state) = record.location.state_key() {
                *table.state.entry(state).or_default() += 1;
            }
            *table.sex.entry(record.sex).or_default() += 1;
            if let Some(race) = race_key(record) {
                *table.race.entry(race).or_default() += 1;
            }
        }
        log::debug!(
            "{} frequency table: {} records, {} states, {} races",
            table.kind,
            table.total,
            table.state.len(),
            table.race.len()
        );
        table
    }

    pub fn kind(&self) -> RosterKind {
        self.kind
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn share(&self, count: Option<&usize>) -> Option<f64> {
        match (count, self.total) {
            (Some(&n), total) if total > 0 => Some(n as f64 / total as f64),
            _ => None,
        }
    }

    pub fn state_frequency(&self, record: &PersonRecord) -> Option<f64> {
        self.share(self.state.get(&record.location.state_key()?))
    }

    pub fn sex_frequency(&self, record: &PersonRecord) -> Option<f64> {
        self.share(self.sex.get(&record.sex))
    }

    pub fn race_frequency(&self, record: &PersonRecord) -> Option<f64> {
        self.share(self.race.get(&race_key(record)?))
    }
}

fn race_key(record: &PersonRecord) -> Option<String> {
    normalize_key(record.race.as_deref())
}
