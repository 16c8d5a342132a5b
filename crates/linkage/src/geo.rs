//! Geographic helpers: great-circle distance and the county-level proximity
//! score used by the geography component.

use crate::model::{normalize_key, Location};

const EARTH_RADIUS_KM: f64 = 6371.0088;

const DIRECTIONS: &[&str] = &[
    "NORTH", "SOUTH", "EAST", "WEST", "NORTHEAST", "NORTHWEST", "SOUTHEAST", "SOUTHWEST",
];

const COUNTY_SUFFIXES: &[&str] = &[" COUNTY", " PARISH", " BOROUGH"];

/// Names at or above this similarity are treated as possibly adjacent.
const FUZZY_ADJACENCY_THRESHOLD: f64 = 0.7;

pub const SAME_CITY_AND_COUNTY: f64 = 1.0;
pub const SAME_COUNTY: f64 = 0.85;
pub const ADJACENT_COUNTY_MAX: f64 = 0.6;
pub const SAME_STATE: f64 = 0.3;

/// Haversine distance in km between two (lat, lon) points in degrees.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Distance between two locations when both have coordinates.
pub fn distance_km(a: &Location, b: &Location) -> Option<f64> {
    Some(haversine_km(a.coordinates()?, b.coordinates()?))
}

/// Uppercase, trimmed county name without its "County"/"Parish"/"Borough"
/// suffix. `None` when blank.
pub fn normalize_county(county: Option<&str>) -> Option<String> {
    let mut name = normalize_key(county)?;
    for suffix in COUNTY_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end().to_string();
        }
    }
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn strip_directions(county: &str) -> String {
    county
        .split_whitespace()
        .filter(|word| !DIRECTIONS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Guess whether two distinct counties of the same state border each other.
///
/// Returns the confidence of the guess: 0.8 when the names differ only by
/// compass words ("North Harris" / "South Harris"), 0.5 when the names are
/// merely similar, `None` otherwise. This is a naming heuristic, not an
/// adjacency table.
pub fn county_adjacency_confidence(a: &str, b: &str) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a == b {
        return Some(1.0);
    }
    let base_a = strip_directions(a);
    let base_b = strip_directions(b);
    if !base_a.is_empty() && base_a == base_b {
        return Some(0.8);
    }
    if strsim::normalized_levenshtein(a, b) >= FUZZY_ADJACENCY_THRESHOLD {
        return Some(0.5);
    }
    None
}

/// Proximity by administrative specificity:
/// same city + county → 1.0, same county → 0.85, adjacent county → 0.6 ×
/// confidence, same state → 0.3, different or unknown state → 0.0.
pub fn geographic_score(mp: &Location, up: &Location) -> f64 {
    let (Some(mp_state), Some(up_state)) = (mp.state_key(), up.state_key()) else {
        return 0.0;
    };
    if mp_state != up_state {
        return 0.0;
    }

    let mp_county = normalize_county(mp.county.as_deref());
    let up_county = normalize_county(up.county.as_deref());
    let mp_city = normalize_key(mp.city.as_deref());
    let up_city = normalize_key(up.city.as_deref());

    match (&mp_county, &up_county) {
        (Some(a), Some(b)) if a == b => {
            if mp_city.is_some() && mp_city == up_city {
                SAME_CITY_AND_COUNTY
            } else {
                SAME_COUNTY
            }
        }
        (Some(a), Some(b)) => match county_adjacency_confidence(a, b) {
            Some(confidence) => (ADJACENT_COUNTY_MAX * confidence).max(SAME_STATE),
            None => SAME_STATE,
        },
        _ => SAME_STATE,
    }
}

/// Same normalized county on both sides (blocking annotation).
pub fn same_county(mp: &Location, up: &Location) -> bool {
    let county = normalize_county(mp.county.as_deref());
    county.is_some() && county == normalize_county(up.county.as_deref())
}

/// Same normalized city on both sides (blocking annotation).
pub fn same_city(mp: &Location, up: &Location) -> bool {
    let city = normalize_key(mp.city.as_deref());
    city.is_some() && city == normalize_key(up.city.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(state: &str, county: &str, city: &str) -> Location {
        let opt = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        Location {
            city: opt(city),
            county: opt(county),
            state: opt(state),
            lat: None,
            lon: None,
        }
    }

    #[test]
    fn haversine_known_distance() {
        // Austin → Dallas, roughly 290 km
        let km = haversine_km((30.2672, -97.7431), (32.7767, -96.7970));
        assert!((km - 291.0).abs() < 5.0, "got {km}");
        assert_eq!(haversine_km((10.0, 10.0), (10.0, 10.0)), 0.0);
    }

    #[test]
    fn distance_requires_both_coordinates() {
        let mut a = Location::default();
        let mut b = Location::default();
        assert_eq!(distance_km(&a, &b), None);
        a.lat = Some(30.0);
        a.lon = Some(-97.0);
        assert_eq!(distance_km(&a, &b), None);
        b.lat = Some(30.0);
        b.lon = Some(-97.0);
        assert_eq!(distance_km(&a, &b), Some(0.0));
    }

    #[test]
    fn county_suffixes_stripped() {
        assert_eq!(normalize_county(Some("Travis County")).as_deref(), Some("TRAVIS"));
        assert_eq!(normalize_county(Some(" orleans parish ")).as_deref(), Some("ORLEANS"));
        assert_eq!(normalize_county(Some("")), None);
        assert_eq!(normalize_county(None), None);
    }

    #[test]
    fn directional_variants_are_adjacent() {
        assert_eq!(county_adjacency_confidence("NORTH HARRIS", "SOUTH HARRIS"), Some(0.8));
        assert_eq!(county_adjacency_confidence("HARRIS", "WEST HARRIS"), Some(0.8));
    }

    #[test]
    fn similar_names_are_weakly_adjacent() {
        assert_eq!(county_adjacency_confidence("JEFFERSON", "JEFFERSON DAVIS"), None);
        assert_eq!(county_adjacency_confidence("WASHINGTON", "WASHINGTEN"), Some(0.5));
        assert_eq!(county_adjacency_confidence("TRAVIS", "HARRIS"), None);
    }

    #[test]
    fn geographic_levels() {
        let mp = loc("TX", "Travis", "Austin");
        assert_eq!(geographic_score(&mp, &loc("tx", "Travis County", "austin")), 1.0);
        assert_eq!(geographic_score(&mp, &loc("TX", "Travis", "Pflugerville")), 0.85);
        assert_eq!(geographic_score(&mp, &loc("TX", "Harris", "Houston")), 0.3);
        assert_eq!(geographic_score(&mp, &loc("OK", "Travis", "Austin")), 0.0);
        assert_eq!(geographic_score(&mp, &loc("", "Travis", "Austin")), 0.0);
    }

    #[test]
    fn adjacent_county_scores_between_county_and_state() {
        let mp = loc("TX", "North Harris", "");
        let score = geographic_score(&mp, &loc("TX", "South Harris", ""));
        assert!((score - 0.48).abs() < 1e-9);
        assert!(score < SAME_COUNTY && score > SAME_STATE);
    }

    #[test]
    fn missing_county_falls_back_to_state() {
        assert_eq!(geographic_score(&loc("TX", "", "Austin"), &loc("TX", "", "Austin")), 0.3);
    }

    #[test]
    fn blocking_annotations() {
        let a = loc("TX", "Travis County", "Austin");
        let b = loc("TX", "travis", "AUSTIN ");
        assert!(same_county(&a, &b));
        assert!(same_city(&a, &b));
        assert!(!same_county(&loc("TX", "", ""), &loc("TX", "", "")));
    }
}
