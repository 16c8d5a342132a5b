//! `caselink-linkage`: missing / unidentified person record linkage engine.
//!
//! Pure engine crate: receives pre-loaded rosters, returns scored and ranked
//! candidate pairs. The canonical CSV loader and artifact writers live here
//! too so every front-end reads and writes the same contracts.

pub mod blocking;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod frequency;
pub mod geo;
pub mod load;
pub mod model;
pub mod rank;
pub mod rarity;
pub mod scoring;
pub mod similarity;
pub mod uniqueness;

pub use config::LinkageConfig;
pub use engine::run;
pub use error::LinkageError;
pub use model::{CandidatePair, LinkageInput, LinkageResult, PersonRecord, Roster, RosterKind, Sex};
