//! `caselink run` and `caselink validate`: config-driven linkage sweeps.

use std::path::{Path, PathBuf};

use caselink_linkage::export::write_artifacts;
use caselink_linkage::load::load_roster;
use caselink_linkage::{LinkageConfig, LinkageInput, Roster, RosterKind};

use crate::exit_codes::{link_exit_code, EXIT_LINK_INPUT, EXIT_LINK_RUNTIME};
use crate::CliError;

pub struct RunArgs {
    pub config_path: PathBuf,
    pub json_output: bool,
    pub output_file: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub threads: Option<usize>,
    pub write_artifacts: bool,
}

fn link_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn engine_err(err: caselink_linkage::LinkageError) -> CliError {
    link_err(link_exit_code(&err), err.to_string())
}

fn read_config(config_path: &Path) -> Result<LinkageConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::usage(format!("cannot read config {}: {e}", config_path.display()))
    })?;
    LinkageConfig::from_toml(&config_str).map_err(engine_err)
}

fn read_roster(kind: RosterKind, config: &LinkageConfig, base_dir: &Path) -> Result<Roster, CliError> {
    let roster_config = config.rosters.get(kind);
    let csv_path = base_dir.join(&roster_config.file);
    let csv_data = std::fs::read_to_string(&csv_path).map_err(|e| {
        link_err(EXIT_LINK_INPUT, format!("cannot read {}: {e}", csv_path.display()))
            .with_hint(format!("rosters.{kind}.file is resolved relative to the config file"))
    })?;
    let (roster, report) = load_roster(kind, &csv_data, roster_config).map_err(engine_err)?;

    if report.total_nulled() > 0 {
        let detail: Vec<String> = report
            .nulled
            .iter()
            .map(|(column, n)| format!("{column}={n}"))
            .collect();
        eprintln!(
            "{kind}: {} rows, {} malformed value(s) nulled ({})",
            report.rows,
            report.total_nulled(),
            detail.join(", "),
        );
    }
    if !report.absent_columns.is_empty() {
        log::info!("{kind}: optional columns absent: {}", report.absent_columns.join(", "));
    }
    Ok(roster)
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = read_config(&args.config_path)?;
    if let Some(n) = args.threads {
        if n == 0 {
            return Err(CliError::usage("--threads must be >= 1"));
        }
        config.threads = Some(n);
    }

    // Resolve file paths relative to config file's directory
    let base_dir = args
        .config_path
        .parent()
        .unwrap_or_else(|| Path::new("."));

    let input = LinkageInput {
        missing: read_roster(RosterKind::Missing, &config, base_dir)?,
        unidentified: read_roster(RosterKind::Unidentified, &config, base_dir)?,
    };

    // Run engine
    let result = caselink_linkage::run(&config, &input).map_err(engine_err)?;

    // Artifacts: all published or none
    if args.write_artifacts {
        let mut output = config.output.clone();
        let artifact_base = match &args.out_dir {
            Some(dir) => {
                output.dir = ".".into();
                dir.as_path()
            }
            None => base_dir,
        };
        let written = write_artifacts(&output, artifact_base, &input, &result).map_err(engine_err)?;
        for path in &written {
            eprintln!("wrote {}", path.display());
        }
    }

    // Output
    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| link_err(EXIT_LINK_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| link_err(EXIT_LINK_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "linkage '{}' ({} profile): {} missing x {} unidentified, {} of {} pairs blocked in {} shard(s)",
        result.meta.config_name,
        result.meta.profile,
        s.mp_records,
        s.up_records,
        s.blocked_pairs,
        s.cross_product,
        s.shards,
    );
    eprintln!(
        "rejected: {} sex, {} age, {} temporal, {} distance, {} days gap",
        s.rejected_sex, s.rejected_age, s.rejected_temporal, s.rejected_distance, s.rejected_days_gap,
    );
    eprintln!(
        "ranked: {} pairs for {} missing person(s), {} high priority, {} dropped by hard cap",
        s.ranked_pairs, s.mp_with_candidates, s.high_priority, s.capped_pairs,
    );

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let components = config
        .scoring
        .resolved_weights()
        .iter()
        .filter(|(_, w)| *w > 0.0)
        .count();
    eprintln!(
        "valid: linkage '{}' ({} profile) with {} weighted component(s), top {} per missing person",
        config.name, config.scoring.profile, components, config.ranking.top_n,
    );
    Ok(())
}
