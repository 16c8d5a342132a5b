use std::fmt;

use crate::model::RosterKind;

#[derive(Debug)]
pub enum LinkageError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad weight, unsorted tiers, etc.).
    ConfigValidation(String),
    /// A roster has no records.
    EmptyRoster(RosterKind),
    /// The same id appears twice in one roster.
    DuplicateId { roster: RosterKind, id: String },
    /// A row has a blank id.
    MissingId { roster: RosterKind, row: usize },
    /// Missing required column in input data.
    MissingColumn { roster: RosterKind, column: String },
    /// A pair references an id that is not in its roster.
    UnknownRecord { roster: RosterKind, id: String },
    /// The active profile has no weight left to average over.
    ZeroTotalWeight { profile: String },
    /// The worker pool could not be started.
    ThreadPool(String),
    /// CSV read / write error.
    Csv(String),
    /// IO error (file read, write, rename).
    Io(String),
}

impl fmt::Display for LinkageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::EmptyRoster(roster) => write!(f, "{roster} roster is empty"),
            Self::DuplicateId { roster, id } => {
                write!(f, "{roster} roster: duplicate id '{id}'")
            }
            Self::MissingId { roster, row } => {
                write!(f, "{roster} roster, row {row}: blank id")
            }
            Self::MissingColumn { roster, column } => {
                write!(f, "{roster} roster: missing column '{column}'")
            }
            Self::UnknownRecord { roster, id } => {
                write!(f, "{roster} roster: no record with id '{id}'")
            }
            Self::ZeroTotalWeight { profile } => {
                write!(f, "profile '{profile}': component weights sum to zero")
            }
            Self::ThreadPool(msg) => write!(f, "thread pool error: {msg}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LinkageError {}

impl From<csv::Error> for LinkageError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

impl From<std::io::Error> for LinkageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
