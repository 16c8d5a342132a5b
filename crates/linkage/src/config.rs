use serde::{Deserialize, Serialize};

use crate::error::LinkageError;
use crate::model::{Component, RosterKind};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LinkageConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Worker threads for blocking and scoring; rayon's default when unset.
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub rosters: RostersConfig,
    #[serde(default)]
    pub blocking: BlockingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub uniqueness: UniquenessConfig,
    #[serde(default)]
    pub rarity: RarityConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub high_priority: HighPriorityConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "linkage".into()
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            threads: None,
            rosters: RostersConfig::default(),
            blocking: BlockingConfig::default(),
            scoring: ScoringConfig::default(),
            uniqueness: UniquenessConfig::default(),
            rarity: RarityConfig::default(),
            ranking: RankingConfig::default(),
            high_priority: HighPriorityConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rosters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RostersConfig {
    pub missing: RosterConfig,
    pub unidentified: RosterConfig,
}

impl Default for RostersConfig {
    fn default() -> Self {
        Self {
            missing: RosterConfig::with_file("missing.csv"),
            unidentified: RosterConfig::with_file("unidentified.csv"),
        }
    }
}

impl RostersConfig {
    pub fn get(&self, kind: RosterKind) -> &RosterConfig {
        match kind {
            RosterKind::Missing => &self.missing,
            RosterKind::Unidentified => &self.unidentified,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    pub file: String,
    #[serde(default)]
    pub columns: ColumnMapping,
}

impl RosterConfig {
    pub fn with_file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            columns: ColumnMapping::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Header names for the canonical columns. Every field defaults to the
/// canonical name, so a config only lists the columns that differ.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub id: String,
    pub sex: String,
    pub race: String,
    pub age_min: String,
    pub age_max: String,
    pub height_in: String,
    pub weight_lb: String,
    pub eye_color: String,
    pub city: String,
    pub county: String,
    pub state: String,
    pub latitude: String,
    pub longitude: String,
    /// Event date column; defaults to `last_seen_date` / `found_date`.
    pub date: Option<String>,
    pub tattoos: String,
    pub items: String,
    pub marks: String,
    pub modalities: String,
    /// Display name (case number, person name); carried into graph nodes.
    pub name: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "id".into(),
            sex: "sex".into(),
            race: "race".into(),
            age_min: "age_min".into(),
            age_max: "age_max".into(),
            height_in: "height_in".into(),
            weight_lb: "weight_lb".into(),
            eye_color: "eye_color".into(),
            city: "city".into(),
            county: "county".into(),
            state: "state".into(),
            latitude: "latitude".into(),
            longitude: "longitude".into(),
            date: None,
            tattoos: "tattoos".into(),
            items: "items".into(),
            marks: "marks".into(),
            modalities: "modalities".into(),
            name: "name".into(),
        }
    }
}

impl ColumnMapping {
    pub fn date_column(&self, kind: RosterKind) -> &str {
        self.date.as_deref().unwrap_or_else(|| kind.date_column())
    }
}

// ---------------------------------------------------------------------------
// Blocking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlockingConfig {
    /// How many days a body may be found *before* the last-seen date.
    pub temporal_tolerance_days: i64,
    /// Drop pairs whose known distance exceeds this many km.
    pub max_distance_km: Option<f64>,
    /// Drop pairs whose known gap exceeds this many days.
    pub max_days_gap: Option<i64>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            temporal_tolerance_days: 7,
            max_distance_km: None,
            max_days_gap: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Sex, age, geography, race, temporal.
    #[default]
    Simplified,
    /// Simplified plus physical measurements, distance, eye color and
    /// distinctive-evidence tokens.
    Full,
}

impl ProfileKind {
    /// Component set and default weights, in rationale tie-break order.
    pub fn default_weights(&self) -> Vec<(Component, f64)> {
        match self {
            Self::Simplified => vec![
                (Component::Sex, 2.0),
                (Component::Age, 1.5),
                (Component::Geography, 2.0),
                (Component::Race, 0.8),
                (Component::Temporal, 1.2),
            ],
            Self::Full => vec![
                (Component::Sex, 1.0),
                (Component::Age, 1.2),
                (Component::Geography, 0.8),
                (Component::Height, 0.8),
                (Component::Weight, 0.4),
                (Component::Distance, 1.0),
                (Component::Temporal, 1.0),
                (Component::EyeColor, 0.5),
                (Component::Race, 0.3),
                (Component::Tattoos, 1.4),
                (Component::Items, 0.8),
                (Component::DistinctiveMarks, 1.6),
                (Component::ForensicModalities, 0.6),
            ],
        }
    }

    pub fn default_race_scores(&self) -> CategoricalScores {
        match self {
            Self::Simplified => CategoricalScores { equal: 1.0, diff: 0.3 },
            Self::Full => CategoricalScores { equal: 0.8, diff: 0.4 },
        }
    }

    pub fn default_eye_color_scores(&self) -> CategoricalScores {
        CategoricalScores { equal: 1.0, diff: 0.2 }
    }
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simplified => write!(f, "simplified"),
            Self::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CategoricalScores {
    pub equal: f64,
    pub diff: f64,
}

/// Per-component weight overrides on top of the profile defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WeightOverrides {
    pub sex: Option<f64>,
    pub age: Option<f64>,
    pub geography: Option<f64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub distance: Option<f64>,
    pub eye_color: Option<f64>,
    pub race: Option<f64>,
    pub temporal: Option<f64>,
    pub tattoos: Option<f64>,
    pub items: Option<f64>,
    pub distinctive_marks: Option<f64>,
    pub forensic_modalities: Option<f64>,
}

impl WeightOverrides {
    pub fn get(&self, component: Component) -> Option<f64> {
        match component {
            Component::Sex => self.sex,
            Component::Age => self.age,
            Component::Geography => self.geography,
            Component::Height => self.height,
            Component::Weight => self.weight,
            Component::Distance => self.distance,
            Component::EyeColor => self.eye_color,
            Component::Race => self.race,
            Component::Temporal => self.temporal,
            Component::Tattoos => self.tattoos,
            Component::Items => self.items,
            Component::DistinctiveMarks => self.distinctive_marks,
            Component::ForensicModalities => self.forensic_modalities,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub profile: ProfileKind,
    pub weights: WeightOverrides,
    pub eye_color: Option<CategoricalScores>,
    pub race: Option<CategoricalScores>,
}

impl ScoringConfig {
    /// Effective weight table for the active profile.
    pub fn resolved_weights(&self) -> Vec<(Component, f64)> {
        self.profile
            .default_weights()
            .into_iter()
            .map(|(c, w)| (c, self.weights.get(c).unwrap_or(w)))
            .collect()
    }

    pub fn race_scores(&self) -> CategoricalScores {
        self.race.unwrap_or_else(|| self.profile.default_race_scores())
    }

    pub fn eye_color_scores(&self) -> CategoricalScores {
        self.eye_color
            .unwrap_or_else(|| self.profile.default_eye_color_scores())
    }
}

// ---------------------------------------------------------------------------
// Boosters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoostTier {
    pub max_count: usize,
    pub boost: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UniquenessConfig {
    /// Per-side step function, ascending by `max_count`.
    pub tiers: Vec<BoostTier>,
    /// Drop pairs where either side has more candidates than this.
    pub hard_cap: Option<usize>,
}

impl Default for UniquenessConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                BoostTier { max_count: 2, boost: 0.25 },
                BoostTier { max_count: 5, boost: 0.15 },
                BoostTier { max_count: 10, boost: 0.08 },
            ],
            hard_cap: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RarityConfig {
    pub rare_threshold: f64,
    pub somewhat_rare_threshold: f64,
    pub both_rare_boost: f64,
    pub one_rare_boost: f64,
    pub both_somewhat_rare_boost: f64,
}

impl Default for RarityConfig {
    fn default() -> Self {
        Self {
            rare_threshold: 0.5,
            somewhat_rare_threshold: 0.3,
            both_rare_boost: 0.20,
            one_rare_boost: 0.10,
            both_somewhat_rare_boost: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_n: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HighPriorityConfig {
    pub enabled: bool,
    pub max_match_count: usize,
    pub min_score: f64,
}

impl Default for HighPriorityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_match_count: 5,
            min_score: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub candidates: String,
    pub scored_pairs: String,
    pub high_priority: String,
    /// Emit graph bulk-load nodes / edges.
    pub graph: bool,
    pub graph_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "out".into(),
            candidates: "candidates.jsonl".into(),
            scored_pairs: "scored_pairs.csv".into(),
            high_priority: "high_priority.csv".into(),
            graph: true,
            graph_dir: "graph".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkageConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkageError> {
        let config: LinkageConfig =
            toml::from_str(input).map_err(|e| LinkageError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkageError> {
        if self.threads == Some(0) {
            return Err(invalid("threads must be >= 1"));
        }
        if self.blocking.temporal_tolerance_days < 0 {
            return Err(invalid("blocking.temporal_tolerance_days must be >= 0"));
        }
        if let Some(km) = self.blocking.max_distance_km {
            if !km.is_finite() || km <= 0.0 {
                return Err(invalid(format!("blocking.max_distance_km must be > 0, got {km}")));
            }
        }
        if let Some(days) = self.blocking.max_days_gap {
            if days < 0 {
                return Err(invalid(format!("blocking.max_days_gap must be >= 0, got {days}")));
            }
        }

        // Weights
        let weights = self.scoring.resolved_weights();
        for (component, w) in &weights {
            if !w.is_finite() || *w < 0.0 {
                return Err(invalid(format!(
                    "scoring.weights.{component} must be a non-negative number, got {w}"
                )));
            }
        }
        if weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
            return Err(LinkageError::ZeroTotalWeight {
                profile: self.scoring.profile.to_string(),
            });
        }
        for (label, scores) in [
            ("race", self.scoring.race_scores()),
            ("eye_color", self.scoring.eye_color_scores()),
        ] {
            if !unit(scores.equal) || !unit(scores.diff) {
                return Err(invalid(format!(
                    "scoring.{label} scores must be within [0, 1]"
                )));
            }
        }

        // Uniqueness tiers: ascending counts, non-increasing boosts
        let tiers = &self.uniqueness.tiers;
        for tier in tiers {
            if !unit(tier.boost) {
                return Err(invalid(format!(
                    "uniqueness tier boost must be within [0, 1], got {}",
                    tier.boost
                )));
            }
        }
        for pair in tiers.windows(2) {
            if pair[1].max_count <= pair[0].max_count {
                return Err(invalid(
                    "uniqueness tiers must be sorted by strictly ascending max_count",
                ));
            }
            if pair[1].boost > pair[0].boost {
                return Err(invalid(
                    "uniqueness tier boosts must not increase with max_count",
                ));
            }
        }
        if self.uniqueness.hard_cap == Some(0) {
            return Err(invalid("uniqueness.hard_cap must be >= 1"));
        }

        let r = &self.rarity;
        if !unit(r.rare_threshold) || !unit(r.somewhat_rare_threshold) {
            return Err(invalid("rarity thresholds must be within [0, 1]"));
        }
        if r.somewhat_rare_threshold > r.rare_threshold {
            return Err(invalid(
                "rarity.somewhat_rare_threshold must not exceed rarity.rare_threshold",
            ));
        }
        if !(unit(r.both_rare_boost) && unit(r.one_rare_boost) && unit(r.both_somewhat_rare_boost)) {
            return Err(invalid("rarity boosts must be within [0, 1]"));
        }

        if self.ranking.top_n == 0 {
            return Err(invalid("ranking.top_n must be >= 1"));
        }
        if !unit(self.high_priority.min_score) {
            return Err(invalid("high_priority.min_score must be within [0, 1]"));
        }

        Ok(())
    }
}

fn unit(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

fn invalid(msg: impl Into<String>) -> LinkageError {
    LinkageError::ConfigValidation(msg.into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
