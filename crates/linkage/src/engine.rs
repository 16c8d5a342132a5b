use crate::blocking;
use crate::config::LinkageConfig;
use crate::error::LinkageError;
use crate::model::{LinkageInput, LinkageMeta, LinkageResult, LinkageSummary, RosterKind};
use crate::rank;
use crate::rarity::{self, RarityTable};
use crate::scoring::{self, ScoringProfile};
use crate::uniqueness;

/// Run the linkage pipeline per config: block, score, boost, rank.
pub fn run(config: &LinkageConfig, input: &LinkageInput) -> Result<LinkageResult, LinkageError> {
    if input.missing.is_empty() {
        return Err(LinkageError::EmptyRoster(RosterKind::Missing));
    }
    if input.unidentified.is_empty() {
        return Err(LinkageError::EmptyRoster(RosterKind::Unidentified));
    }

    match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| LinkageError::ThreadPool(e.to_string()))?
            .install(|| run_pipeline(config, input)),
        None => run_pipeline(config, input),
    }
}

fn run_pipeline(config: &LinkageConfig, input: &LinkageInput) -> Result<LinkageResult, LinkageError> {
    let missing = &input.missing;
    let unidentified = &input.unidentified;
    let profile = ScoringProfile::from_config(config)?;

    let (blocked, blocking_stats) = blocking::block(&config.blocking, missing, unidentified);

    let (mut pairs, rejects) = scoring::score_pairs(&profile, missing, unidentified, blocked)?;
    let scored_pairs = pairs.len();

    let capped_pairs = uniqueness::apply(&config.uniqueness, &mut pairs);

    let rarity_table = RarityTable::build(missing, unidentified);
    rarity::apply(&config.rarity, &rarity_table, &mut pairs);

    rank::rank(&mut pairs);
    let top_candidates = rank::top_candidates(&config.ranking, &pairs);
    let high_priority = rank::high_priority(&config.high_priority, &pairs);

    let summary = LinkageSummary {
        mp_records: missing.len(),
        up_records: unidentified.len(),
        cross_product: blocking_stats.cross_product,
        shards: blocking_stats.shards,
        blocked_pairs: blocking_stats.kept,
        rejected_sex: blocking_stats.rejected_sex + rejects.sex_mismatch,
        rejected_age: blocking_stats.rejected_age,
        rejected_temporal: blocking_stats.rejected_temporal + rejects.found_before_last_seen,
        rejected_distance: blocking_stats.rejected_distance,
        rejected_days_gap: blocking_stats.rejected_days_gap,
        scored_pairs,
        capped_pairs,
        ranked_pairs: pairs.len(),
        mp_with_candidates: top_candidates.len(),
        high_priority: high_priority.len(),
    };
    log::info!(
        "linkage '{}' ({} profile): {} ranked pairs for {} missing persons, {} high priority",
        config.name,
        profile.kind(),
        summary.ranked_pairs,
        summary.mp_with_candidates,
        summary.high_priority
    );

    Ok(LinkageResult {
        meta: LinkageMeta {
            config_name: config.name.clone(),
            profile: profile.kind(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        top_candidates,
        pairs,
        high_priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileKind;
    use crate::model::{PersonRecord, Roster, Sex};
    use chrono::NaiveDate;

    fn person(id: &str, sex: Sex, ages: (i32, i32), when: &str) -> PersonRecord {
        let mut r = PersonRecord::new(id);
        r.sex = sex;
        r.age_min = Some(ages.0);
        r.age_max = Some(ages.1);
        r.event_date = NaiveDate::parse_from_str(when, "%Y-%m-%d").ok();
        r.location.state = Some("TX".into());
        r.location.county = Some("Travis".into());
        r
    }

    fn input(mps: Vec<PersonRecord>, ups: Vec<PersonRecord>) -> LinkageInput {
        LinkageInput {
            missing: Roster::new(RosterKind::Missing, mps).unwrap(),
            unidentified: Roster::new(RosterKind::Unidentified, ups).unwrap(),
        }
    }

    #[test]
    fn empty_roster_is_an_error() {
        let input = input(vec![], vec![person("U1", Sex::Male, (20, 30), "2020-01-01")]);
        let err = run(&LinkageConfig::default(), &input).unwrap_err();
        assert!(matches!(err, LinkageError::EmptyRoster(RosterKind::Missing)));
    }

    #[test]
    fn sex_mismatch_never_reaches_output() {
        let input = input(
            vec![person("M1", Sex::Male, (20, 25), "2020-01-01")],
            vec![person("U1", Sex::Female, (20, 25), "2020-02-01")],
        );
        let result = run(&LinkageConfig::default(), &input).unwrap();
        assert!(result.pairs.is_empty());
        assert!(result.top_candidates.is_empty());
        assert_eq!(result.summary.rejected_sex, 1);
    }

    #[test]
    fn pipeline_populates_every_stage() {
        let input = input(
            vec![
                person("M1", Sex::Female, (20, 25), "2020-01-01"),
                person("M2", Sex::Male, (40, 45), "2019-06-01"),
            ],
            vec![
                person("U1", Sex::Female, (24, 29), "2021-01-01"),
                person("U2", Sex::Unknown, (40, 50), "2019-07-01"),
            ],
        );
        let result = run(&LinkageConfig::default(), &input).unwrap();
        assert_eq!(result.meta.profile, ProfileKind::Simplified);
        assert_eq!(result.meta.config_name, "linkage");
        assert_eq!(result.summary.cross_product, 4);
        assert_eq!(result.summary.shards, 1);

        for pair in &result.pairs {
            assert!((0.0..=1.0).contains(&pair.final_score));
            assert!(pair.uniqueness_boost > 0.0);
            assert!(!pair.why.is_empty());
        }
        for window in result.pairs.windows(2) {
            assert!(window[0].final_score >= window[1].final_score);
        }
        let m1 = result
            .top_candidates
            .iter()
            .find(|g| g.mp_id == "M1")
            .unwrap();
        assert_eq!(m1.candidates[0].up_id, "U1");
    }

    #[test]
    fn explicit_thread_count_gives_same_ranking() {
        let mps: Vec<PersonRecord> = (0..6)
            .map(|i| person(&format!("M{i}"), Sex::Female, (18 + i, 24 + i), "2018-03-01"))
            .collect();
        let ups: Vec<PersonRecord> = (0..6)
            .map(|i| person(&format!("U{i}"), Sex::Female, (20 + i, 28 + i), "2019-03-01"))
            .collect();
        let input = input(mps, ups);

        let default = run(&LinkageConfig::default(), &input).unwrap();
        let single = run(
            &LinkageConfig {
                threads: Some(1),
                ..LinkageConfig::default()
            },
            &input,
        )
        .unwrap();
        let key = |r: &LinkageResult| -> Vec<(String, String, f64)> {
            r.pairs
                .iter()
                .map(|p| (p.mp_id.clone(), p.up_id.clone(), p.final_score))
                .collect()
        };
        assert_eq!(key(&default), key(&single));
    }
}
