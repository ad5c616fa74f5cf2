use std::path::{Path, PathBuf};

use barracks_epi::infection::Stage;
use barracks_epi::{
    run_infection, run_meetings, Context, ContextInfectionExt, ContextParametersExt,
    ContextRandomExt, EpiError, Meeting, MeetingLog, MeetingRecord,
};

fn config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/small_config.json")
}

fn context(seed: u64) -> Context {
    let mut context = Context::new();
    context.init_parameters(&config_path()).unwrap();
    context.init_random(seed);
    context
}

fn generate(seed: u64) -> MeetingLog {
    run_meetings(&mut context(seed)).unwrap()
}

fn replay(seed: u64, log: MeetingLog) -> Context {
    let mut context = context(seed);
    run_infection(&mut context, log).unwrap();
    context
}

#[test]
fn meeting_log_is_ordered_and_names_known_agents() {
    let log = generate(1);
    assert!(log.is_sorted());
    let step = 300.0;
    for record in log.records() {
        assert!(record.timestamp < 3.0 * 86_400.0);
        assert!((record.timestamp / step - (record.timestamp / step).round()).abs() < 1e-9);
        for meeting in &record.meetings {
            assert!(meeting.a < meeting.b && meeting.b < 26);
            assert!(
                ["company_0", "company_1", "civilian", "sotilaskoti"]
                    .contains(&meeting.place.as_str()),
                "unexpected place {}",
                meeting.place
            );
        }
    }
}

#[test]
fn meeting_generation_is_reproducible() {
    assert_eq!(generate(9), generate(9));
}

#[test]
fn log_survives_a_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs").join("meetings.jsonl");
    let log = generate(2);
    log.write_json_lines(&path).unwrap();
    assert_eq!(MeetingLog::read_json_lines(&path).unwrap(), log);
}

#[test]
fn replay_is_deterministic_and_mass_stays_bounded() {
    let log = generate(3);
    let first = replay(4, log.clone());
    let second = replay(4, log);
    assert_eq!(first.infection_agents(), second.infection_agents());

    let end = 3.0 * 86_400.0;
    for agent in first.infection_agents() {
        let totals = agent.infection.stage_totals_at(end);
        assert!(totals.total() >= 0.0);
        assert!(totals.total() <= 1.0 + 1e-4, "agent {}", agent.id);
        for stage in Stage::ALL {
            for (_, mass) in agent.infection.ledger(stage).iter() {
                assert!(mass >= 0.0);
            }
        }
    }
}

#[test]
fn replaying_an_empty_log_only_seeds() {
    let context = replay(5, MeetingLog::new());
    for agent in context.infection_agents() {
        assert_eq!(agent.meetings, 0);
        let expected = if agent.conscripted { 0.05 } else { 0.02 };
        let acute = agent.infection.ledger(Stage::Acute).total();
        assert!((acute - expected).abs() < 1e-12);
    }
}

#[test]
fn foreign_log_with_unknown_agent_is_rejected() {
    let mut log = MeetingLog::new();
    log.push(MeetingRecord {
        timestamp: 600.0,
        meetings: vec![Meeting {
            a: 3,
            b: 400,
            place: "civilian".to_string(),
        }],
    });
    let mut context = context(6);
    assert!(matches!(
        run_infection(&mut context, log),
        Err(EpiError::ConfigurationError(_))
    ));
}

#[test]
fn unreadable_config_is_reported() {
    let mut context = Context::new();
    let result = context.init_parameters(Path::new("tests/data/does_not_exist.json"));
    assert!(matches!(result, Err(EpiError::IoError(_))));
}
