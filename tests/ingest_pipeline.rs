use std::path::PathBuf;

use serde_json::{Value, json};

use mi_ledger::config::default_roster;
use mi_ledger::identity::IdentityResolver;
use mi_ledger::ingest::{Ingestor, ingest_into_store, load_documents};
use mi_ledger::ledger::LedgerEntry;
use mi_ledger::store::{LedgerStore, RunStatus, SqliteLedgerStore};

fn fixture_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("matches");
    path
}

fn entry<'a>(entries: &'a [LedgerEntry], player: &str, format: &str) -> &'a LedgerEntry {
    entries
        .iter()
        .find(|e| e.player_name == player && e.format == format)
        .unwrap_or_else(|| panic!("missing {format} entry for {player}"))
}

#[test]
fn loads_json_files_and_reports_unparseable_ones() {
    let (docs, errors) = load_documents(&fixture_dir()).expect("fixture dir readable");
    assert_eq!(docs.len(), 4);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("truncated.json"));
}

#[test]
fn ingests_fixture_batch() {
    let (docs, _) = load_documents(&fixture_dir()).unwrap();
    let resolver = IdentityResolver::new(default_roster().clone());
    let report = Ingestor::new(&resolver).process(&docs);

    assert_eq!(report.documents_total, 4);
    assert_eq!(report.matches_with_roster, 2);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.no_roster_skipped, 1);
    assert!(report.errors.is_empty());
    // eleven from the IPL lineup, one from the ODI scan
    assert_eq!(report.entries.len(), 12);

    let boult = entry(&report.entries, "Trent Boult", "T20");
    let bowling = boult.bowling_stats.as_ref().expect("Boult bowled");
    assert_eq!(bowling.balls_bowled, 6);
    assert_eq!(bowling.runs_conceded, 6);
    assert_eq!(bowling.wickets, 1);
    assert_eq!(bowling.dots, 3);
    assert_eq!(bowling.economy, 6.0);
    assert_eq!(bowling.overs, "1.0");
    assert!(boult.batting_stats.is_none());
    assert_eq!(boult.total_deliveries_involved, 6);

    let kumar = entry(&report.entries, "Ashwani Kumar", "T20");
    let bowling = kumar.bowling_stats.as_ref().unwrap();
    assert_eq!(bowling.wickets, 2);
    assert_eq!(bowling.economy, 12.0);
    assert_eq!(bowling.overs, "0.3");
    assert_eq!(bowling.strike_rate, 1.5);
    assert_eq!(kumar.fielding_stats.unwrap().run_outs, 1);
    // the run out came off his own delivery
    assert_eq!(kumar.total_deliveries_involved, 3);

    let dhir = entry(&report.entries, "Naman Dhir", "T20");
    assert_eq!(dhir.fielding_stats.unwrap().catches, 1);
    assert_eq!(dhir.total_deliveries_involved, 1);

    let rohit = entry(&report.entries, "Rohit Sharma", "T20");
    let batting = rohit.batting_stats.unwrap();
    assert_eq!((batting.runs, batting.balls, batting.sixes), (7, 2, 1));
    assert_eq!(batting.strike_rate, 350.0);
    assert_eq!(rohit.match_result, "Mumbai Indians");
    assert_eq!(rohit.tournament, "Indian Premier League");
    assert_eq!(
        rohit.match_id,
        "2025-03-31_Mumbai Indians_Kolkata Knight Riders_Wankhede Stadium, Mumbai"
    );

    let bumrah = entry(&report.entries, "Jasprit Bumrah", "T20");
    assert!(bumrah.batting_stats.is_none());
    assert!(bumrah.bowling_stats.is_none());
    assert!(bumrah.fielding_stats.is_none());
    assert_eq!(bumrah.total_deliveries_involved, 0);
}

#[test]
fn scan_stops_at_first_roster_hit_within_bounds() {
    let (docs, _) = load_documents(&fixture_dir()).unwrap();
    let resolver = IdentityResolver::new(default_roster().clone());
    let report = Ingestor::new(&resolver).process(&docs);

    let odi: Vec<&LedgerEntry> = report.entries.iter().filter(|e| e.format == "ODI").collect();
    assert_eq!(odi.len(), 1);
    let rohit = odi[0];
    assert_eq!(rohit.player_name, "Rohit Sharma");
    assert_eq!(rohit.match_result, "Unknown");
    let batting = rohit.batting_stats.unwrap();
    assert_eq!((batting.runs, batting.balls, batting.dots), (10, 3, 1));
    assert_eq!(batting.strike_rate, 333.33);
    assert_eq!(rohit.total_deliveries_involved, 3);
}

#[test]
fn parallel_ingest_matches_sequential_counts() {
    let (docs, _) = load_documents(&fixture_dir()).unwrap();
    let resolver = IdentityResolver::new(default_roster().clone());
    let seq = Ingestor::new(&resolver).process(&docs);
    let par = Ingestor::new(&resolver).process_parallel(&docs);

    assert_eq!(seq.matches_with_roster, par.matches_with_roster);
    assert_eq!(seq.duplicates_skipped, par.duplicates_skipped);
    assert_eq!(seq.no_roster_skipped, par.no_roster_skipped);
    let mut a: Vec<_> = seq.entries.iter().map(|e| (e.match_id.clone(), e.player_name.clone())).collect();
    let mut b: Vec<_> = par.entries.iter().map(|e| (e.match_id.clone(), e.player_name.clone())).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn store_holds_one_entry_per_match_and_player() {
    let (docs, _) = load_documents(&fixture_dir()).unwrap();
    let resolver = IdentityResolver::new(default_roster().clone());
    let ingestor = Ingestor::new(&resolver);
    let mut store = SqliteLedgerStore::open_in_memory().unwrap();

    let run_id = store.begin_run("ingest", "fixtures").unwrap();
    let summary = ingest_into_store(&mut store, &ingestor, &docs, false).unwrap();
    store
        .finish_run(
            run_id,
            RunStatus::Completed,
            summary.documents_total,
            summary.entries_written,
            "done",
        )
        .unwrap();

    assert_eq!(summary.entries_written, 12);
    assert_eq!(store.count().unwrap(), 12);
    assert!(store.duplicate_groups().unwrap().is_empty());

    // a second batch through the same ingestor adds nothing
    let again = ingest_into_store(&mut store, &ingestor, &docs, true).unwrap();
    assert_eq!(again.entries_written, 0);
    assert_eq!(again.duplicates_skipped, 4);
    assert_eq!(store.count().unwrap(), 12);

    let status = store.latest_sync_status().unwrap();
    assert_eq!(status.status, "completed");
    assert_eq!(status.entries_written, 12);
}

fn lineup_only_match(date: &str, innings: Option<Value>) -> Value {
    let mut doc = json!({
        "info": {
            "dates": [date],
            "teams": ["Mumbai Indians", "Sunrisers Hyderabad"],
            "venue": "Rajiv Gandhi International Stadium",
            "match_type": "T20",
            "players": {
                "Mumbai Indians": ["RG Sharma", "JJ Bumrah", "Tilak Varma"],
                "Sunrisers Hyderabad": ["TM Head", "Abhishek Sharma"]
            }
        }
    });
    if let Some(innings) = innings {
        doc["innings"] = innings;
    }
    doc
}

#[test]
fn lineups_without_innings_yield_zero_stat_entries() {
    let resolver = IdentityResolver::new(default_roster().clone());
    let docs = vec![
        lineup_only_match("2025-04-17", Some(json!([]))),
        lineup_only_match("2025-04-18", None),
        lineup_only_match("2025-04-19", Some(Value::Null)),
    ];
    let report = Ingestor::new(&resolver).process(&docs);

    assert_eq!(report.matches_with_roster, 3);
    assert_eq!(report.malformed_innings_skipped, 0);
    assert_eq!(report.entries.len(), 9);
    for date in ["2025-04-17", "2025-04-18", "2025-04-19"] {
        let mut players: Vec<&str> = report
            .entries
            .iter()
            .filter(|e| e.date == date)
            .map(|e| e.player_name.as_str())
            .collect();
        players.sort();
        assert_eq!(players, vec!["Jasprit Bumrah", "Rohit Sharma", "Tilak Varma"]);
    }
    for e in &report.entries {
        assert!(e.batting_stats.is_none(), "{}", e.player_name);
        assert!(e.bowling_stats.is_none(), "{}", e.player_name);
        assert!(e.fielding_stats.is_none(), "{}", e.player_name);
        assert_eq!(e.total_deliveries_involved, 0);
        assert_eq!(e.team1, "Mumbai Indians");
    }
}

#[test]
fn non_list_innings_is_skipped_despite_lineups() {
    let resolver = IdentityResolver::new(default_roster().clone());
    let docs = vec![lineup_only_match("2025-04-20", Some(json!({"broken": true})))];
    let report = Ingestor::new(&resolver).process(&docs);

    assert!(report.entries.is_empty());
    assert_eq!(report.malformed_innings_skipped, 1);
    assert!(report.errors.is_empty());
}
