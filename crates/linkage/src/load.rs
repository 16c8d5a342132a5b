//! Canonical roster CSV loader.
//!
//! Required columns: id, sex, state and the roster's date column. Every other
//! canonical column is optional; when a column is absent the field is null
//! for every record. Unparsable values are nulled (never fatal) and counted
//! in a [`LoadReport`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::RosterConfig;
use crate::error::LinkageError;
use crate::model::{Location, PersonRecord, Roster, RosterKind, Sex};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Nulled fields past this many per roster are logged at debug only.
const WARN_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows: usize,
    /// Column name → number of values that could not be parsed.
    pub nulled: BTreeMap<String, usize>,
    /// Optional canonical columns missing from the header.
    pub absent_columns: Vec<String>,
}

impl LoadReport {
    pub fn total_nulled(&self) -> usize {
        self.nulled.values().sum()
    }
}

struct Columns {
    id: usize,
    name: Option<usize>,
    sex: usize,
    race: Option<usize>,
    age_min: Option<usize>,
    age_max: Option<usize>,
    height_in: Option<usize>,
    weight_lb: Option<usize>,
    eye_color: Option<usize>,
    city: Option<usize>,
    county: Option<usize>,
    state: usize,
    latitude: Option<usize>,
    longitude: Option<usize>,
    date: usize,
    tattoos: Option<usize>,
    items: Option<usize>,
    marks: Option<usize>,
    modalities: Option<usize>,
}

/// Tracks nulled fields while a roster is parsed.
struct Nulls<'a> {
    kind: RosterKind,
    report: &'a mut LoadReport,
    warned: usize,
}

impl Nulls<'_> {
    fn null(&mut self, column: &str, id: &str, value: &str) {
        *self.report.nulled.entry(column.to_string()).or_default() += 1;
        if self.warned < WARN_LIMIT {
            self.warned += 1;
            log::warn!("{} roster, id '{id}': unparsable {column} '{value}', treated as missing", self.kind);
        } else {
            log::debug!("{} roster, id '{id}': unparsable {column} '{value}'", self.kind);
        }
    }
}

/// Parse one roster CSV into a validated [`Roster`].
pub fn load_roster(
    kind: RosterKind,
    csv_data: &str,
    roster_config: &RosterConfig,
) -> Result<(Roster, LoadReport), LinkageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let col = &roster_config.columns;
    let mut report = LoadReport::default();

    let required = |name: &str| -> Result<usize, LinkageError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LinkageError::MissingColumn {
                roster: kind,
                column: name.into(),
            })
    };
    let mut optional = |name: &str| -> Option<usize> {
        let found = headers.iter().position(|h| h == name);
        if found.is_none() {
            report.absent_columns.push(name.to_string());
        }
        found
    };

    let columns = Columns {
        id: required(col.id.as_str())?,
        sex: required(col.sex.as_str())?,
        state: required(col.state.as_str())?,
        date: required(col.date_column(kind))?,
        name: optional(col.name.as_str()),
        race: optional(col.race.as_str()),
        age_min: optional(col.age_min.as_str()),
        age_max: optional(col.age_max.as_str()),
        height_in: optional(col.height_in.as_str()),
        weight_lb: optional(col.weight_lb.as_str()),
        eye_color: optional(col.eye_color.as_str()),
        city: optional(col.city.as_str()),
        county: optional(col.county.as_str()),
        latitude: optional(col.latitude.as_str()),
        longitude: optional(col.longitude.as_str()),
        tattoos: optional(col.tattoos.as_str()),
        items: optional(col.items.as_str()),
        marks: optional(col.marks.as_str()),
        modalities: optional(col.modalities.as_str()),
    };
    if !report.absent_columns.is_empty() {
        log::debug!("{kind} roster: optional columns absent: {}", report.absent_columns.join(", "));
    }

    let mut records = Vec::new();
    let mut nulls = Nulls {
        kind,
        report: &mut report,
        warned: 0,
    };
    for row in reader.records() {
        let row = row?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let mut record = PersonRecord::new(field(Some(columns.id)).unwrap_or_default());
        record.name = field(columns.name).map(str::to_string);
        record.sex = field(Some(columns.sex)).map_or(Sex::Unknown, Sex::parse);
        record.race = field(columns.race).map(str::to_string);
        record.eye_color = field(columns.eye_color).map(str::to_string);

        let id = record.id.clone();
        let mut number = |column: &str, idx: Option<usize>| -> Option<f64> {
            let raw = field(idx)?;
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    nulls.null(column, &id, raw);
                    None
                }
            }
        };

        record.age_min = number(col.age_min.as_str(), columns.age_min).map(|v| v.round() as i32);
        record.age_max = number(col.age_max.as_str(), columns.age_max).map(|v| v.round() as i32);
        record.height_in = number(col.height_in.as_str(), columns.height_in);
        record.weight_lb = number(col.weight_lb.as_str(), columns.weight_lb);
        let lat = number(col.latitude.as_str(), columns.latitude);
        let lon = number(col.longitude.as_str(), columns.longitude);

        if let (Some(lo), Some(hi)) = (record.age_min, record.age_max) {
            if lo > hi {
                record.age_min = Some(hi);
                record.age_max = Some(lo);
            }
        }

        record.location = Location {
            city: field(columns.city).map(str::to_string),
            county: field(columns.county).map(str::to_string),
            state: field(Some(columns.state)).map(str::to_string),
            lat: lat.filter(|v| (-90.0..=90.0).contains(v)),
            lon: lon.filter(|v| (-180.0..=180.0).contains(v)),
        };
        // A lone coordinate is useless for distance.
        if record.location.coordinates().is_none() {
            record.location.lat = None;
            record.location.lon = None;
        }

        let date_column = col.date_column(kind);
        if let Some(raw) = field(Some(columns.date)) {
            record.event_date = parse_date(raw);
            if record.event_date.is_none() {
                nulls.null(date_column, &id, raw);
            }
        }

        record.tattoos = field(columns.tattoos).map(tokens).unwrap_or_default();
        record.items = field(columns.items).map(tokens).unwrap_or_default();
        record.marks = field(columns.marks).map(tokens).unwrap_or_default();
        record.modalities = field(columns.modalities).map(tokens).unwrap_or_default();

        records.push(record);
    }

    nulls.report.rows = records.len();
    if report.total_nulled() > 0 {
        log::warn!("{kind} roster: {} unparsable fields nulled", report.total_nulled());
    }
    log::info!("{kind} roster: loaded {} records", records.len());

    let roster = Roster::new(kind, records)?;
    Ok((roster, report))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Split a free-text token list on `;` or `,`; trimmed, lowercased, blanks
/// dropped.
pub fn tokens(value: &str) -> BTreeSet<String> {
    value
        .split([';', ','])
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
