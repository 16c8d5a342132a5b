// Property-based tests for the linkage pipeline invariants.
// CI: 64 cases (default). Soak: PROPTEST_CASES=2000 cargo test --release

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use caselink_linkage::config::{LinkageConfig, ProfileKind, UniquenessConfig};
use caselink_linkage::geo::geographic_score;
use caselink_linkage::model::{Location, PersonRecord, Roster, RosterKind, Sex};
use caselink_linkage::uniqueness::tier_boost;
use caselink_linkage::{run, LinkageInput};

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const STATES: &[&str] = &["TX", "OK", "LA", ""];
const COUNTIES: &[&str] = &["Travis", "Harris", "North Harris", "Tulsa", ""];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

#[derive(Debug, Clone)]
struct Attrs {
    sex: u8,
    state: usize,
    county: usize,
    age: Option<(i32, i32)>,
    day: Option<i64>,
    coords: Option<(f64, f64)>,
    race: Option<bool>,
}

fn arb_attrs() -> impl Strategy<Value = Attrs> {
    (
        0u8..3,
        0..STATES.len(),
        0..COUNTIES.len(),
        proptest::option::of((0i32..80, 0i32..12)),
        proptest::option::of(0i64..6000),
        proptest::option::of((29.0f64..36.0, -100.0f64..-94.0)),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(sex, state, county, age, day, coords, race)| Attrs {
            sex,
            state,
            county,
            age: age.map(|(lo, span)| (lo, lo + span)),
            day,
            coords,
            race,
        })
}

fn record(id: String, a: &Attrs) -> PersonRecord {
    let opt = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
    let mut r = PersonRecord::new(id);
    r.sex = match a.sex {
        0 => Sex::Male,
        1 => Sex::Female,
        _ => Sex::Unknown,
    };
    r.age_min = a.age.map(|(lo, _)| lo);
    r.age_max = a.age.map(|(_, hi)| hi);
    r.event_date = a.day.map(|d| epoch() + Duration::days(d));
    r.race = a.race.map(|white| if white { "White".into() } else { "Black".into() });
    r.location = Location {
        city: None,
        county: opt(COUNTIES[a.county]),
        state: opt(STATES[a.state]),
        lat: a.coords.map(|c| c.0),
        lon: a.coords.map(|c| c.1),
    };
    r
}

fn arb_input() -> impl Strategy<Value = LinkageInput> {
    (
        proptest::collection::vec(arb_attrs(), 1..12),
        proptest::collection::vec(arb_attrs(), 1..12),
    )
        .prop_map(|(mps, ups)| {
            let missing = mps
                .iter()
                .enumerate()
                .map(|(i, a)| record(format!("MP{i}"), a))
                .collect();
            let unidentified = ups
                .iter()
                .enumerate()
                .map(|(i, a)| record(format!("UP{i}"), a))
                .collect();
            LinkageInput {
                missing: Roster::new(RosterKind::Missing, missing).unwrap(),
                unidentified: Roster::new(RosterKind::Unidentified, unidentified).unwrap(),
            }
        })
}

fn arb_profile() -> impl Strategy<Value = ProfileKind> {
    prop_oneof![Just(ProfileKind::Simplified), Just(ProfileKind::Full)]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn pipeline_invariants(input in arb_input(), profile in arb_profile()) {
        let mut config = LinkageConfig::default();
        config.scoring.profile = profile;
        let result = run(&config, &input).unwrap();
        let tolerance = config.blocking.temporal_tolerance_days;

        for pair in &result.pairs {
            prop_assert!((0.0..=1.0).contains(&pair.final_score));
            prop_assert!((0.0..=1.0).contains(&pair.base_score));

            let mp = input.missing.get(&pair.mp_id).unwrap();
            let up = input.unidentified.get(&pair.up_id).unwrap();
            prop_assert!(!mp.sex.conflicts_with(up.sex));
            if let (Some(seen), Some(found)) = (mp.event_date, up.event_date) {
                prop_assert!((found - seen).num_days() >= -tolerance);
            }
            if let (Some(a), Some(b)) = (mp.location.state_key(), up.location.state_key()) {
                prop_assert_eq!(a, b);
            }
        }
        for w in result.pairs.windows(2) {
            prop_assert!(w[0].final_score >= w[1].final_score);
        }
        for group in &result.top_candidates {
            prop_assert!(group.candidates.len() <= config.ranking.top_n);
        }

        let again = run(&config, &input).unwrap();
        let scores: Vec<f64> = result.pairs.iter().map(|p| p.final_score).collect();
        let rerun: Vec<f64> = again.pairs.iter().map(|p| p.final_score).collect();
        prop_assert_eq!(scores, rerun);
    }

    #[test]
    fn uniqueness_boost_non_increasing(a in 0usize..40, b in 0usize..40) {
        let tiers = UniquenessConfig::default().tiers;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(tier_boost(&tiers, lo) >= tier_boost(&tiers, hi));
    }

    #[test]
    fn geography_monotone_by_specificity(
        state in "[A-Z]{2}",
        county in "[A-Z]{4,10}",
        other in "[A-Z]{4,10}",
        city in "[A-Z]{3,10}",
    ) {
        let loc = |state: &str, county: &str, city: &str| Location {
            city: Some(city.to_string()),
            county: Some(county.to_string()),
            state: Some(state.to_string()),
            lat: None,
            lon: None,
        };
        let mp = loc(&state, &county, &city);
        let same_city = geographic_score(&mp, &loc(&state, &county, &city));
        let same_county = geographic_score(&mp, &loc(&state, &county, "ELSEWHERE"));
        let adjacent = geographic_score(&mp, &loc(&state, &format!("NORTH {county}"), "ELSEWHERE"));
        let same_state = geographic_score(&mp, &loc(&state, &other, "ELSEWHERE"));
        let other_state = geographic_score(&mp, &loc(&format!("{state}X"), &county, &city));

        prop_assert!(same_city >= same_county);
        prop_assert!(same_county >= adjacent);
        prop_assert!(adjacent >= same_state || other == county);
        prop_assert!(same_state >= other_state);
        prop_assert_eq!(other_state, 0.0);
    }
}
