//! State-partitioned blocking.
//!
//! The rosters are split into disjoint shards by normalized state before any
//! cross product is formed. Each shard is expanded and filtered on its own
//! (in parallel) and the survivors are concatenated and sorted by
//! `(mp_id, up_id)`.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::BlockingConfig;
use crate::geo;
use crate::model::{CandidatePair, PersonRecord, Roster};
use crate::similarity::{self, DAYS_PER_YEAR};

// ---------------------------------------------------------------------------
// Shards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShardKey {
    /// State known on both sides.
    State(String),
    /// Missing person with unknown state against every unidentified person.
    MissingStateUnknown,
    /// Missing person with known state against unidentified persons with
    /// unknown state.
    UnidentifiedStateUnknown,
}

impl std::fmt::Display for ShardKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(state) => write!(f, "state:{state}"),
            Self::MissingStateUnknown => write!(f, "mp_state_unknown"),
            Self::UnidentifiedStateUnknown => write!(f, "up_state_unknown"),
        }
    }
}

#[derive(Debug)]
pub struct Shard<'a> {
    pub key: ShardKey,
    pub missing: Vec<&'a PersonRecord>,
    pub unidentified: Vec<&'a PersonRecord>,
}

impl Shard<'_> {
    pub fn product(&self) -> u64 {
        self.missing.len() as u64 * self.unidentified.len() as u64
    }
}

/// Partition both rosters into disjoint shards whose union is exactly the
/// state-compatible cross product. Empty shards are omitted.
pub fn shards<'a>(missing: &'a Roster, unidentified: &'a Roster) -> Vec<Shard<'a>> {
    let mut mp_by_state: BTreeMap<String, Vec<&PersonRecord>> = BTreeMap::new();
    let mut up_by_state: BTreeMap<String, Vec<&PersonRecord>> = BTreeMap::new();
    let mut mp_unknown = Vec::new();
    let mut mp_known = Vec::new();
    let mut up_unknown = Vec::new();

    for r in missing.records() {
        match r.location.state_key() {
            Some(state) => {
                mp_by_state.entry(state).or_default().push(r);
                mp_known.push(r);
            }
            None => mp_unknown.push(r),
        }
    }
    for r in unidentified.records() {
        match r.location.state_key() {
            Some(state) => up_by_state.entry(state).or_default().push(r),
            None => up_unknown.push(r),
        }
    }

    let mut out = Vec::new();
    for (state, mps) in mp_by_state {
        if let Some(ups) = up_by_state.remove(&state) {
            out.push(Shard {
                key: ShardKey::State(state),
                missing: mps,
                unidentified: ups,
            });
        }
    }
    out.push(Shard {
        key: ShardKey::MissingStateUnknown,
        missing: mp_unknown,
        unidentified: unidentified.records().iter().collect(),
    });
    out.push(Shard {
        key: ShardKey::UnidentifiedStateUnknown,
        missing: mp_known,
        unidentified: up_unknown,
    });
    out.retain(|s| s.product() > 0);
    out
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Sex,
    Age,
    Temporal,
    Distance,
    DaysGap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockingStats {
    pub cross_product: u64,
    pub shards: usize,
    pub compared: u64,
    pub kept: usize,
    pub rejected_sex: usize,
    pub rejected_age: usize,
    pub rejected_temporal: usize,
    pub rejected_distance: usize,
    pub rejected_days_gap: usize,
}

impl BlockingStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Sex => self.rejected_sex += 1,
            Rejection::Age => self.rejected_age += 1,
            Rejection::Temporal => self.rejected_temporal += 1,
            Rejection::Distance => self.rejected_distance += 1,
            Rejection::DaysGap => self.rejected_days_gap += 1,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.compared += other.compared;
        self.kept += other.kept;
        self.rejected_sex += other.rejected_sex;
        self.rejected_age += other.rejected_age;
        self.rejected_temporal += other.rejected_temporal;
        self.rejected_distance += other.rejected_distance;
        self.rejected_days_gap += other.rejected_days_gap;
        self
    }
}

/// Age ranges overlap either as recorded or with the missing person's range
/// projected forward to the found date. Requires both bounds on both sides.
fn ages_overlap(mp: &PersonRecord, up: &PersonRecord, days_gap: Option<i64>) -> bool {
    let (Some((mp_min, mp_max)), Some((up_min, up_max))) = (mp.age_range(), up.age_range()) else {
        return true;
    };
    let overlaps = |shift: f64| {
        let lo = f64::from(mp_min) + shift;
        let hi = f64::from(mp_max) + shift;
        lo <= f64::from(up_max) && f64::from(up_min) <= hi
    };
    let elapsed = match days_gap {
        Some(days) if days > 0 => days as f64 / DAYS_PER_YEAR,
        _ => 0.0,
    };
    overlaps(0.0) || overlaps(elapsed)
}

/// Derived attributes every surviving pair carries.
pub fn annotate(mp: &PersonRecord, up: &PersonRecord) -> CandidatePair {
    let mut pair = CandidatePair::new(mp.id.clone(), up.id.clone());
    pair.days_gap = similarity::days_gap(mp.event_date, up.event_date);
    pair.km = geo::distance_km(&mp.location, &up.location);
    pair.same_county = geo::same_county(&mp.location, &up.location);
    pair.same_city = geo::same_city(&mp.location, &up.location);
    pair
}

/// Filters in increasing cost order. Missing data never rejects.
fn check(config: &BlockingConfig, mp: &PersonRecord, up: &PersonRecord) -> Result<CandidatePair, Rejection> {
    if mp.sex.conflicts_with(up.sex) {
        return Err(Rejection::Sex);
    }
    let days_gap = similarity::days_gap(mp.event_date, up.event_date);
    if !ages_overlap(mp, up, days_gap) {
        return Err(Rejection::Age);
    }
    if similarity::is_temporal_reject(days_gap, config.temporal_tolerance_days) {
        return Err(Rejection::Temporal);
    }
    if let (Some(max), Some(gap)) = (config.max_days_gap, days_gap) {
        if gap > max {
            return Err(Rejection::DaysGap);
        }
    }

    let pair = annotate(mp, up);
    if let (Some(max), Some(km)) = (config.max_distance_km, pair.km) {
        if km > max {
            return Err(Rejection::Distance);
        }
    }
    Ok(pair)
}

fn block_shard(config: &BlockingConfig, shard: &Shard<'_>) -> (Vec<CandidatePair>, BlockingStats) {
    let mut pairs = Vec::new();
    let mut stats = BlockingStats {
        compared: shard.product(),
        ..BlockingStats::default()
    };
    for mp in &shard.missing {
        for up in &shard.unidentified {
            match check(config, mp, up) {
                Ok(pair) => pairs.push(pair),
                Err(rejection) => stats.record(rejection),
            }
        }
    }
    stats.kept = pairs.len();
    log::debug!("shard {}: {} of {} pairs kept", shard.key, stats.kept, stats.compared);
    (pairs, stats)
}

/// Produce the unique, annotated candidate pairs for scoring.
pub fn block(config: &BlockingConfig, missing: &Roster, unidentified: &Roster) -> (Vec<CandidatePair>, BlockingStats) {
    let shards = shards(missing, unidentified);
    let (mut pairs, stats) = shards
        .par_iter()
        .map(|shard| block_shard(config, shard))
        .reduce(
            || (Vec::new(), BlockingStats::default()),
            |(mut a, sa), (b, sb)| {
                a.extend(b);
                (a, sa.merge(sb))
            },
        );
    pairs.par_sort_unstable_by(|a, b| (&a.mp_id, &a.up_id).cmp(&(&b.mp_id, &b.up_id)));

    let stats = BlockingStats {
        cross_product: missing.len() as u64 * unidentified.len() as u64,
        shards: shards.len(),
        ..stats
    };
    log::info!(
        "blocking: {} shards, {} of {} pairs compared, {} kept",
        stats.shards,
        stats.compared,
        stats.cross_product,
        stats.kept
    );
    (pairs, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RosterKind, Sex};
    use chrono::NaiveDate;

    fn rec(id: &str, state: &str, sex: Sex) -> PersonRecord {
        let mut r = PersonRecord::new(id);
        r.sex = sex;
        if !state.is_empty() {
            r.location.state = Some(state.into());
        }
        r
    }

    fn date(s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }

    fn rosters(mps: Vec<PersonRecord>, ups: Vec<PersonRecord>) -> (Roster, Roster) {
        (
            Roster::new(RosterKind::Missing, mps).unwrap(),
            Roster::new(RosterKind::Unidentified, ups).unwrap(),
        )
    }

    fn ids(pairs: &[CandidatePair]) -> Vec<(&str, &str)> {
        pairs.iter().map(|p| (p.mp_id.as_str(), p.up_id.as_str())).collect()
    }

    #[test]
    fn shards_cover_state_compatible_product_once() {
        let (mp, up) = rosters(
            vec![rec("M1", "TX", Sex::Male), rec("M2", "ok", Sex::Male), rec("M3", "", Sex::Male)],
            vec![rec("U1", "tx", Sex::Male), rec("U2", "OK", Sex::Male), rec("U3", " ", Sex::Male)],
        );
        let shards = shards(&mp, &up);
        let keys: Vec<String> = shards.iter().map(|s| s.key.to_string()).collect();
        assert_eq!(
            keys,
            vec!["state:OK", "state:TX", "mp_state_unknown", "up_state_unknown"]
        );

        let (pairs, stats) = block(&BlockingConfig::default(), &mp, &up);
        assert_eq!(
            ids(&pairs),
            vec![
                ("M1", "U1"),
                ("M1", "U3"),
                ("M2", "U2"),
                ("M2", "U3"),
                ("M3", "U1"),
                ("M3", "U2"),
                ("M3", "U3"),
            ]
        );
        assert_eq!(stats.cross_product, 9);
        assert_eq!(stats.compared, 7);
        assert_eq!(stats.kept, 7);
    }

    #[test]
    fn sex_mismatch_rejected_unknown_passes() {
        let (mp, up) = rosters(
            vec![rec("M1", "TX", Sex::Male)],
            vec![rec("U1", "TX", Sex::Female), rec("U2", "TX", Sex::Unknown)],
        );
        let (pairs, stats) = block(&BlockingConfig::default(), &mp, &up);
        assert_eq!(ids(&pairs), vec![("M1", "U2")]);
        assert_eq!(stats.rejected_sex, 1);
    }

    #[test]
    fn age_overlap_uses_projected_range() {
        let mut m = rec("M1", "TX", Sex::Female);
        m.age_min = Some(20);
        m.age_max = Some(25);
        m.event_date = date("2010-01-01");
        // Found ten years later, aged 30-35
        let mut later = rec("U1", "TX", Sex::Female);
        later.age_min = Some(30);
        later.age_max = Some(35);
        later.event_date = date("2020-01-01");
        // Found the same week, aged 40-45
        let mut older = rec("U2", "TX", Sex::Female);
        older.age_min = Some(40);
        older.age_max = Some(45);
        older.event_date = date("2010-01-05");
        // No age estimate at all
        let unknown = rec("U3", "TX", Sex::Female);
        // Found ten years later, estimate overlaps the recorded range
        let mut recorded = rec("U4", "TX", Sex::Female);
        recorded.age_min = Some(22);
        recorded.age_max = Some(24);
        recorded.event_date = date("2020-01-01");

        let (mp, up) = rosters(vec![m], vec![later, older, unknown, recorded]);
        let (pairs, stats) = block(&BlockingConfig::default(), &mp, &up);
        assert_eq!(ids(&pairs), vec![("M1", "U1"), ("M1", "U3"), ("M1", "U4")]);
        assert_eq!(stats.rejected_age, 1);
    }

    #[test]
    fn temporal_tolerance_is_inclusive() {
        let mut m = rec("M1", "TX", Sex::Male);
        m.event_date = date("2020-01-10");
        let mut within = rec("U1", "TX", Sex::Male);
        within.event_date = date("2020-01-03");
        let mut before = rec("U2", "TX", Sex::Male);
        before.event_date = date("2020-01-02");
        let undated = rec("U3", "TX", Sex::Male);

        let (mp, up) = rosters(vec![m], vec![within, before, undated]);
        let (pairs, stats) = block(&BlockingConfig::default(), &mp, &up);
        assert_eq!(ids(&pairs), vec![("M1", "U1"), ("M1", "U3")]);
        assert_eq!(stats.rejected_temporal, 1);
        assert_eq!(pairs[0].days_gap, Some(-7));
    }

    #[test]
    fn optional_distance_and_gap_limits() {
        let mut m = rec("M1", "TX", Sex::Male);
        m.location.lat = Some(30.2672);
        m.location.lon = Some(-97.7431);
        m.event_date = date("2020-01-01");
        let mut near = rec("U1", "TX", Sex::Male);
        near.location.lat = Some(30.30);
        near.location.lon = Some(-97.70);
        near.event_date = date("2020-02-01");
        let mut far = rec("U2", "TX", Sex::Male);
        far.location.lat = Some(32.7767);
        far.location.lon = Some(-96.7970);
        let mut late = rec("U3", "TX", Sex::Male);
        late.event_date = date("2025-01-01");

        let (mp, up) = rosters(vec![m], vec![near, far, late]);
        let config = BlockingConfig {
            max_distance_km: Some(100.0),
            max_days_gap: Some(365),
            ..BlockingConfig::default()
        };
        let (pairs, stats) = block(&config, &mp, &up);
        assert_eq!(ids(&pairs), vec![("M1", "U1")]);
        assert_eq!(stats.rejected_distance, 1);
        assert_eq!(stats.rejected_days_gap, 1);
        assert!(pairs[0].km.unwrap() < 10.0);
    }

    #[test]
    fn annotations() {
        let mut m = rec("M1", "TX", Sex::Male);
        m.location.county = Some("Travis County".into());
        m.location.city = Some("Austin".into());
        let mut u = rec("U1", "TX", Sex::Male);
        u.location.county = Some("TRAVIS".into());
        u.location.city = Some("Round Rock".into());
        let pair = annotate(&m, &u);
        assert!(pair.same_county);
        assert!(!pair.same_city);
        assert_eq!(pair.km, None);
        assert_eq!(pair.days_gap, None);
    }
}
