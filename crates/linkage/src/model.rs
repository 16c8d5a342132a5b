use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ProfileKind;
use crate::error::LinkageError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    Unknown,
}

impl Sex {
    /// Normalize a free-form sex value. Anything that is not clearly male or
    /// female is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Self::Male,
            "f" | "female" => Self::Female,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Both known and different.
    pub fn conflicts_with(&self, other: Sex) -> bool {
        self.is_known() && other.is_known() && *self != other
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterKind {
    Missing,
    Unidentified,
}

impl RosterKind {
    /// Graph node label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Missing => "MissingPerson",
            Self::Unidentified => "UnidentifiedPerson",
        }
    }

    /// Canonical name of the roster's event date column.
    pub fn date_column(&self) -> &'static str {
        match self {
            Self::Missing => "last_seen_date",
            Self::Unidentified => "found_date",
        }
    }
}

impl std::fmt::Display for RosterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Unidentified => write!(f, "unidentified"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Location {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }

    /// Trimmed, uppercased state code; `None` when blank.
    pub fn state_key(&self) -> Option<String> {
        normalize_key(self.state.as_deref())
    }
}

/// Trim + uppercase, treating blank as absent.
pub fn normalize_key(value: Option<&str>) -> Option<String> {
    let v = value?.trim();
    if v.is_empty() {
        None
    } else {
        Some(v.to_uppercase())
    }
}

/// One row of either roster. `event_date` is the last-seen date for a missing
/// person and the found date for an unidentified person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonRecord {
    pub id: String,
    pub name: Option<String>,
    pub sex: Sex,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub height_in: Option<f64>,
    pub weight_lb: Option<f64>,
    pub race: Option<String>,
    pub eye_color: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub location: Location,
    pub tattoos: BTreeSet<String>,
    pub items: BTreeSet<String>,
    pub marks: BTreeSet<String>,
    pub modalities: BTreeSet<String>,
}

impl PersonRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            sex: Sex::Unknown,
            age_min: None,
            age_max: None,
            height_in: None,
            weight_lb: None,
            race: None,
            eye_color: None,
            event_date: None,
            location: Location::default(),
            tattoos: BTreeSet::new(),
            items: BTreeSet::new(),
            marks: BTreeSet::new(),
            modalities: BTreeSet::new(),
        }
    }

    /// Both age bounds, when present.
    pub fn age_range(&self) -> Option<(i32, i32)> {
        Some((self.age_min?, self.age_max?))
    }
}

/// An immutable roster with an id index.
#[derive(Debug, Clone)]
pub struct Roster {
    pub kind: RosterKind,
    records: Vec<PersonRecord>,
    index: HashMap<String, usize>,
}

impl Roster {
    /// Build a roster, rejecting blank and duplicate ids.
    pub fn new(kind: RosterKind, records: Vec<PersonRecord>) -> Result<Self, LinkageError> {
        let mut index = HashMap::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            if record.id.trim().is_empty() {
                return Err(LinkageError::MissingId { roster: kind, row: row + 1 });
            }
            if index.insert(record.id.clone(), row).is_some() {
                return Err(LinkageError::DuplicateId {
                    roster: kind,
                    id: record.id.clone(),
                });
            }
        }
        Ok(Self { kind, records, index })
    }

    pub fn records(&self) -> &[PersonRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PersonRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Like [`Roster::get`], but a missing id is a structural error.
    pub fn require(&self, id: &str) -> Result<&PersonRecord, LinkageError> {
        self.get(id).ok_or_else(|| LinkageError::UnknownRecord {
            roster: self.kind,
            id: id.to_string(),
        })
    }
}

/// Pre-loaded rosters for one run.
#[derive(Debug)]
pub struct LinkageInput {
    pub missing: Roster,
    pub unidentified: Roster,
}

// ---------------------------------------------------------------------------
// Scoring components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Sex,
    Age,
    Geography,
    Height,
    Weight,
    Distance,
    EyeColor,
    Race,
    Temporal,
    Tattoos,
    Items,
    DistinctiveMarks,
    ForensicModalities,
}

impl Component {
    /// Key used in config tables and the JSON component breakdown.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Sex => "sex",
            Self::Age => "age",
            Self::Geography => "geography",
            Self::Height => "height",
            Self::Weight => "weight",
            Self::Distance => "distance",
            Self::EyeColor => "eye_color",
            Self::Race => "race",
            Self::Temporal => "temporal",
            Self::Tattoos => "tattoos",
            Self::Items => "items",
            Self::DistinctiveMarks => "distinctive_marks",
            Self::ForensicModalities => "forensic_modalities",
        }
    }

    /// Name shown to investigators in rationale strings.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sex => "SexMatch",
            Self::Age => "AgeSimilarity",
            Self::Geography => "GeographicProximity",
            Self::Height => "HeightSimilarity",
            Self::Weight => "WeightSimilarity",
            Self::Distance => "DistanceDecay",
            Self::EyeColor => "EyeColorMatch",
            Self::Race => "RaceMatch",
            Self::Temporal => "TemporalConsistency",
            Self::Tattoos => "SharedTattoos",
            Self::Items => "SharedItems",
            Self::DistinctiveMarks => "DistinctiveMark",
            Self::ForensicModalities => "ForensicModalities",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScore {
    pub component: Component,
    pub value: f64,
    pub weight: f64,
}

impl ComponentScore {
    pub fn contribution(&self) -> f64 {
        self.value * self.weight
    }
}

// ---------------------------------------------------------------------------
// Candidate pairs
// ---------------------------------------------------------------------------

/// A (missing, unidentified) pair. Created by blocking, filled in by scoring
/// and the boosters, frozen once ranked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePair {
    pub mp_id: String,
    pub up_id: String,
    pub km: Option<f64>,
    pub days_gap: Option<i64>,
    pub same_county: bool,
    pub same_city: bool,
    pub components: Vec<ComponentScore>,
    pub base_score: f64,
    pub uniqueness_boost: f64,
    pub rarity_boost: f64,
    pub final_score: f64,
    pub mp_match_count: usize,
    pub up_match_count: usize,
    pub mp_rarity: f64,
    pub up_rarity: f64,
    pub why: Vec<String>,
}

impl CandidatePair {
    pub fn new(mp_id: impl Into<String>, up_id: impl Into<String>) -> Self {
        Self {
            mp_id: mp_id.into(),
            up_id: up_id.into(),
            km: None,
            days_gap: None,
            same_county: false,
            same_city: false,
            components: Vec::new(),
            base_score: 0.0,
            uniqueness_boost: 0.0,
            rarity_boost: 0.0,
            final_score: 0.0,
            mp_match_count: 0,
            up_match_count: 0,
            mp_rarity: 0.0,
            up_rarity: 0.0,
            why: Vec::new(),
        }
    }

    pub fn component(&self, component: Component) -> Option<f64> {
        self.components
            .iter()
            .find(|c| c.component == component)
            .map(|c| c.value)
    }
}

/// One candidate in the per-MP JSONL artifact.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateEntry {
    pub up_id: String,
    pub score: f64,
    pub base_score: f64,
    pub uniqueness_boost: f64,
    pub rarity_boost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_gap: Option<i64>,
    pub mp_match_count: usize,
    pub up_match_count: usize,
    pub components: BTreeMap<&'static str, f64>,
    pub why: Vec<String>,
}

impl From<&CandidatePair> for CandidateEntry {
    fn from(pair: &CandidatePair) -> Self {
        Self {
            up_id: pair.up_id.clone(),
            score: round_to(pair.final_score, 3),
            base_score: round_to(pair.base_score, 3),
            uniqueness_boost: round_to(pair.uniqueness_boost, 3),
            rarity_boost: round_to(pair.rarity_boost, 3),
            km: pair.km.map(|km| round_to(km, 1)),
            days_gap: pair.days_gap,
            mp_match_count: pair.mp_match_count,
            up_match_count: pair.up_match_count,
            components: pair
                .components
                .iter()
                .map(|c| (c.component.key(), round_to(c.value, 3)))
                .collect(),
            why: pair.why.clone(),
        }
    }
}

/// Ranked candidates for one missing person: one JSONL line.
#[derive(Debug, Clone, Serialize)]
pub struct MpCandidates {
    pub mp_id: String,
    pub candidates: Vec<CandidateEntry>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkageSummary {
    pub mp_records: usize,
    pub up_records: usize,
    pub cross_product: u64,
    pub shards: usize,
    pub blocked_pairs: usize,
    pub rejected_sex: usize,
    pub rejected_age: usize,
    pub rejected_temporal: usize,
    pub rejected_distance: usize,
    pub rejected_days_gap: usize,
    pub scored_pairs: usize,
    pub capped_pairs: usize,
    pub ranked_pairs: usize,
    pub mp_with_candidates: usize,
    pub high_priority: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkageMeta {
    pub config_name: String,
    pub profile: ProfileKind,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkageResult {
    pub meta: LinkageMeta,
    pub summary: LinkageSummary,
    pub top_candidates: Vec<MpCandidates>,
    /// Every ranked pair, best first.
    #[serde(skip)]
    pub pairs: Vec<CandidatePair>,
    #[serde(skip)]
    pub high_priority: Vec<CandidatePair>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sex_parse_variants() {
        assert_eq!(Sex::parse("M"), Sex::Male);
        assert_eq!(Sex::parse(" female "), Sex::Female);
        assert_eq!(Sex::parse("Unknown"), Sex::Unknown);
        assert_eq!(Sex::parse(""), Sex::Unknown);
        assert_eq!(Sex::parse("X"), Sex::Unknown);
    }

    #[test]
    fn sex_conflicts_only_when_both_known() {
        assert!(Sex::Male.conflicts_with(Sex::Female));
        assert!(!Sex::Male.conflicts_with(Sex::Male));
        assert!(!Sex::Unknown.conflicts_with(Sex::Female));
        assert!(!Sex::Female.conflicts_with(Sex::Unknown));
    }

    #[test]
    fn roster_rejects_duplicate_ids() {
        let err = Roster::new(
            RosterKind::Missing,
            vec![PersonRecord::new("MP1"), PersonRecord::new("MP1")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate id 'MP1'"));
    }

    #[test]
    fn roster_rejects_blank_id() {
        let err = Roster::new(RosterKind::Unidentified, vec![PersonRecord::new("  ")]).unwrap_err();
        assert!(matches!(err, LinkageError::MissingId { row: 1, .. }));
    }

    #[test]
    fn roster_require_reports_unknown_id() {
        let roster = Roster::new(RosterKind::Missing, vec![PersonRecord::new("MP1")]).unwrap();
        assert!(roster.require("MP1").is_ok());
        let err = roster.require("MP9").unwrap_err();
        assert!(err.to_string().contains("'MP9'"));
    }

    #[test]
    fn state_key_normalizes_blank_to_none() {
        let mut loc = Location::default();
        assert_eq!(loc.state_key(), None);
        loc.state = Some("  ".into());
        assert_eq!(loc.state_key(), None);
        loc.state = Some(" tx ".into());
        assert_eq!(loc.state_key().as_deref(), Some("TX"));
    }

    #[test]
    fn candidate_entry_rounds_scores() {
        let mut pair = CandidatePair::new("MP1", "UP7");
        pair.final_score = 0.84249;
        pair.km = Some(12.345);
        pair.components.push(ComponentScore {
            component: Component::Temporal,
            value: 0.6,
            weight: 1.2,
        });
        let entry = CandidateEntry::from(&pair);
        assert_eq!(entry.score, 0.842);
        assert_eq!(entry.km, Some(12.3));
        assert_eq!(entry.components["temporal"], 0.6);
    }
}
