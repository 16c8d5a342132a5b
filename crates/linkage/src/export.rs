//! Artifact writers: ranked candidates (JSONL), scored pairs and the
//! high-priority subset (CSV), graph bulk-load nodes and edges (CSV).
//!
//! [`write_artifacts`] stages every file as `<name>.partial` and renames them
//! into place only once all of them were written. A failed rename rolls the
//! whole set back to what was there before.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::OutputConfig;
use crate::error::LinkageError;
use crate::model::{round_to, CandidatePair, LinkageInput, LinkageResult, MpCandidates, PersonRecord, Roster, RosterKind};

pub const PAIRS_HEADER: &[&str] = &[
    "mp_id",
    "up_id",
    "final_score",
    "base_score",
    "uniqueness_boost",
    "rarity_boost",
    "mp_match_count",
    "up_match_count",
    "mp_rarity",
    "up_rarity",
    "km",
    "days_gap",
    "same_county",
    "same_city",
    "why",
];

pub const NODES_HEADER: &[&str] = &[
    "~id",
    "~label",
    "sex",
    "race",
    "age_min:int",
    "age_max:int",
    "height_in:int",
    "weight_lb:int",
    "date:string",
    "lat:double",
    "lon:double",
    "city",
    "county",
    "state",
    "name",
];

pub const EDGES_HEADER: &[&str] = &["~id", "~from", "~to", "~label", "score:double", "km:double", "days_gap:int"];

const WHY_SEPARATOR: &str = " | ";

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn fmt_opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_score(value: f64) -> String {
    format!("{:.4}", value)
}

// ---------------------------------------------------------------------------
// Candidates + scored pairs
// ---------------------------------------------------------------------------

/// One JSON object per missing person.
pub fn write_candidates_jsonl(groups: &[MpCandidates], mut writer: impl Write) -> Result<(), LinkageError> {
    for group in groups {
        serde_json::to_writer(&mut writer, group).map_err(|e| LinkageError::Io(format!("JSON write error: {e}")))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Pairs in the order given (callers pass them ranked).
pub fn write_pairs_csv(pairs: &[CandidatePair], writer: impl Write) -> Result<(), LinkageError> {
    let mut csv = csv_writer(writer);
    csv.write_record(PAIRS_HEADER)?;
    for p in pairs {
        csv.write_record(&[
            p.mp_id.clone(),
            p.up_id.clone(),
            fmt_score(p.final_score),
            fmt_score(p.base_score),
            fmt_score(p.uniqueness_boost),
            fmt_score(p.rarity_boost),
            p.mp_match_count.to_string(),
            p.up_match_count.to_string(),
            fmt_score(p.mp_rarity),
            fmt_score(p.up_rarity),
            fmt_opt(p.km.map(|km| round_to(km, 1))),
            fmt_opt(p.days_gap),
            p.same_county.to_string(),
            p.same_city.to_string(),
            p.why.join(WHY_SEPARATOR),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Graph bulk-load
// ---------------------------------------------------------------------------

pub fn person_node_id(kind: RosterKind, id: &str) -> String {
    match kind {
        RosterKind::Missing => format!("MP-{id}"),
        RosterKind::Unidentified => format!("UID-{id}"),
    }
}

fn tattoo_node_id(token: &str) -> String {
    format!("tattoo:{token}")
}

fn item_node_id(token: &str) -> String {
    format!("item:{token}")
}

fn person_row(kind: RosterKind, r: &PersonRecord) -> Vec<String> {
    vec![
        person_node_id(kind, &r.id),
        kind.label().to_string(),
        r.sex.code().to_string(),
        r.race.clone().unwrap_or_default(),
        fmt_opt(r.age_min),
        fmt_opt(r.age_max),
        fmt_opt(r.height_in.map(|v| v.round() as i64)),
        fmt_opt(r.weight_lb.map(|v| v.round() as i64)),
        fmt_opt(r.event_date.map(|d| d.format("%Y-%m-%d"))),
        fmt_opt(r.location.lat),
        fmt_opt(r.location.lon),
        r.location.city.clone().unwrap_or_default(),
        r.location.county.clone().unwrap_or_default(),
        r.location.state_key().unwrap_or_default(),
        r.name.clone().unwrap_or_default(),
    ]
}

fn token_row(node_id: String, label: &str, token: &str) -> Vec<String> {
    let mut row = vec![String::new(); NODES_HEADER.len()];
    row[0] = node_id;
    row[1] = label.to_string();
    row[NODES_HEADER.len() - 1] = token.to_string();
    row
}

/// Person nodes for both rosters, then one node per distinct tattoo and
/// clothing-item token.
pub fn write_graph_nodes(input: &LinkageInput, writer: impl Write) -> Result<(), LinkageError> {
    let mut csv = csv_writer(writer);
    csv.write_record(NODES_HEADER)?;

    let mut tattoos = BTreeSet::new();
    let mut items = BTreeSet::new();
    for roster in [&input.missing, &input.unidentified] {
        for r in roster.records() {
            csv.write_record(person_row(roster.kind, r))?;
            tattoos.extend(r.tattoos.iter().map(String::as_str));
            items.extend(r.items.iter().map(String::as_str));
        }
    }
    for token in tattoos {
        csv.write_record(token_row(tattoo_node_id(token), "Tattoo", token))?;
    }
    for token in items {
        csv.write_record(token_row(item_node_id(token), "ClothingItem", token))?;
    }
    csv.flush()?;
    Ok(())
}

fn token_edges<W: Write>(csv: &mut csv::Writer<W>, roster: &Roster) -> Result<(), LinkageError> {
    for r in roster.records() {
        let from = person_node_id(roster.kind, &r.id);
        for token in &r.tattoos {
            let to = tattoo_node_id(token);
            csv.write_record([format!("{from}->{to}"), from.clone(), to, "HAS_TATTOO".into(), String::new(), String::new(), String::new()])?;
        }
        for token in &r.items {
            let to = item_node_id(token);
            csv.write_record([format!("{from}->{to}"), from.clone(), to, "HAS_ITEM".into(), String::new(), String::new(), String::new()])?;
        }
    }
    Ok(())
}

/// `CANDIDATE_MATCH` for every ranked pair, then evidence-token edges.
pub fn write_graph_edges(
    input: &LinkageInput,
    pairs: &[CandidatePair],
    writer: impl Write,
) -> Result<(), LinkageError> {
    let mut csv = csv_writer(writer);
    csv.write_record(EDGES_HEADER)?;
    for p in pairs {
        let from = person_node_id(RosterKind::Missing, &p.mp_id);
        let to = person_node_id(RosterKind::Unidentified, &p.up_id);
        csv.write_record([
            format!("{from}->{to}"),
            from,
            to,
            "CANDIDATE_MATCH".to_string(),
            fmt_score(p.final_score),
            fmt_opt(p.km.map(|km| round_to(km, 1))),
            fmt_opt(p.days_gap),
        ])?;
    }
    token_edges(&mut csv, &input.missing)?;
    token_edges(&mut csv, &input.unidentified)?;
    csv.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Staged publish
// ---------------------------------------------------------------------------

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

struct Staged {
    files: Vec<(PathBuf, PathBuf)>,
}

impl Staged {
    fn write(
        &mut self,
        path: PathBuf,
        f: impl FnOnce(BufWriter<File>) -> Result<(), LinkageError>,
    ) -> Result<(), LinkageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staging = staging_path(&path);
        self.files.push((staging.clone(), path));
        let file = File::create(&staging)
            .map_err(|e| LinkageError::Io(format!("cannot create {}: {e}", staging.display())))?;
        f(BufWriter::new(file))
    }

    fn discard(&self) {
        remove_staging(&self.files);
    }

    /// Rename every staged file into place. Files being replaced are moved
    /// aside first; if any rename fails, everything already published is
    /// rolled back, the previous files are restored and the remaining
    /// staging files are removed.
    fn publish(self) -> Result<Vec<PathBuf>, LinkageError> {
        let mut published: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(self.files.len());
        for (i, (staging, path)) in self.files.iter().enumerate() {
            match publish_one(staging, path) {
                Ok(previous) => published.push((path.clone(), previous)),
                Err(e) => {
                    rollback(&published);
                    remove_staging(&self.files[i..]);
                    return Err(e);
                }
            }
        }

        let mut paths = Vec::with_capacity(published.len());
        for (path, previous) in published {
            if let Some(previous) = previous {
                if let Err(e) = std::fs::remove_file(&previous) {
                    log::warn!("cannot remove {}: {e}", previous.display());
                }
            }
            paths.push(path);
        }
        Ok(paths)
    }
}

fn remove_staging(files: &[(PathBuf, PathBuf)]) {
    for (staging, _) in files {
        if let Err(e) = std::fs::remove_file(staging) {
            log::debug!("cannot remove {}: {e}", staging.display());
        }
    }
}

fn previous_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".previous");
    path.with_file_name(name)
}

/// Returns where the replaced file was moved, if there was one.
fn publish_one(staging: &Path, path: &Path) -> Result<Option<PathBuf>, LinkageError> {
    let publish_err = |e: std::io::Error| LinkageError::Io(format!("cannot publish {}: {e}", path.display()));

    let previous = if path.is_file() {
        let previous = previous_path(path);
        std::fs::rename(path, &previous).map_err(publish_err)?;
        Some(previous)
    } else {
        None
    };
    if let Err(e) = std::fs::rename(staging, path) {
        if let Some(previous) = &previous {
            if let Err(e) = std::fs::rename(previous, path) {
                log::warn!("cannot restore {}: {e}", path.display());
            }
        }
        return Err(publish_err(e));
    }
    Ok(previous)
}

fn rollback(published: &[(PathBuf, Option<PathBuf>)]) {
    for (path, previous) in published.iter().rev() {
        let restored = match previous {
            Some(previous) => std::fs::rename(previous, path),
            None => std::fs::remove_file(path),
        };
        if let Err(e) = restored {
            log::warn!("cannot roll back {}: {e}", path.display());
        }
    }
}

fn stage_all(
    staged: &mut Staged,
    output: &OutputConfig,
    dir: &Path,
    input: &LinkageInput,
    result: &LinkageResult,
) -> Result<(), LinkageError> {
    staged.write(dir.join(&output.candidates), |w| {
        write_candidates_jsonl(&result.top_candidates, w)
    })?;
    staged.write(dir.join(&output.scored_pairs), |w| write_pairs_csv(&result.pairs, w))?;
    staged.write(dir.join(&output.high_priority), |w| {
        write_pairs_csv(&result.high_priority, w)
    })?;
    if output.graph {
        let graph_dir = dir.join(&output.graph_dir);
        staged.write(graph_dir.join("nodes.csv"), |w| write_graph_nodes(input, w))?;
        staged.write(graph_dir.join("edges.csv"), |w| {
            write_graph_edges(input, &result.pairs, w)
        })?;
    }
    Ok(())
}

/// Write every configured artifact under `base_dir.join(output.dir)`.
/// Either all artifacts are published or none are; returns the published
/// paths.
pub fn write_artifacts(
    output: &OutputConfig,
    base_dir: &Path,
    input: &LinkageInput,
    result: &LinkageResult,
) -> Result<Vec<PathBuf>, LinkageError> {
    let dir = base_dir.join(&output.dir);
    let mut staged = Staged { files: Vec::new() };

    if let Err(e) = stage_all(&mut staged, output, &dir, input, result) {
        staged.discard();
        return Err(e);
    }
    let published = staged.publish()?;
    for path in &published {
        log::info!("wrote {}", path.display());
    }
    Ok(published)
}
