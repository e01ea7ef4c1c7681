use anyhow::{Context, Result, bail};
use serde::Serialize;

use mi_ledger::analytics::{self, AnalyticsFilters, StoreStats};
use mi_ledger::config::{Settings, flag_value};
use mi_ledger::ledger::LedgerEntry;
use mi_ledger::logging;
use mi_ledger::store::{LedgerField, LedgerStore, SqliteLedgerStore};

const DEFAULT_MATCH_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
struct StatsOutput {
    #[serde(flatten)]
    stats: StoreStats,
    db_path: String,
}

fn main() -> Result<()> {
    logging::load_dotenv();
    logging::init_tracing()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let command = args
        .first()
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or("rollup");
    let settings = Settings::from_env()
        .context("unable to resolve sqlite path")?
        .with_args(&args);
    let store = SqliteLedgerStore::open(&settings.db_path)
        .with_context(|| format!("open ledger at {}", settings.db_path.display()))?;

    match command {
        "rollup" => {
            let filters = filters_from_args(&args);
            let entries: Vec<LedgerEntry> = match &filters.player {
                Some(pattern) => store
                    .find_by_pattern(LedgerField::PlayerName, pattern)?
                    .into_iter()
                    .map(|s| s.entry)
                    .collect(),
                None => load_entries(&store)?,
            };
            print_json(&analytics::rollup(&entries, &filters))
        }
        "filters" => print_json(&analytics::filter_options(&load_entries(&store)?)),
        "matches" => {
            let limit = match flag_value(&args, "--limit") {
                Some(raw) => raw
                    .parse::<usize>()
                    .with_context(|| format!("invalid --limit `{raw}`"))?,
                None => DEFAULT_MATCH_LIMIT,
            };
            let entries = load_entries(&store)?;
            print_json(&analytics::unique_matches(
                &entries,
                &filters_from_args(&args),
                Some(limit),
            ))
        }
        "players" => {
            let roster = settings.roster().context("load roster")?;
            print_json(&analytics::list_players(&load_entries(&store)?, &roster))
        }
        "stats" => print_json(&StatsOutput {
            stats: analytics::store_stats(&store)?,
            db_path: settings.db_path.display().to_string(),
        }),
        "status" => print_json(&store.latest_sync_status()?),
        other => bail!("unknown command `{other}` (rollup|filters|matches|players|stats|status)"),
    }
}

fn load_entries(store: &SqliteLedgerStore) -> Result<Vec<LedgerEntry>> {
    let stored = store.load_all().context("load ledger entries")?;
    Ok(stored.into_iter().map(|s| s.entry).collect())
}

fn filters_from_args(args: &[String]) -> AnalyticsFilters {
    AnalyticsFilters {
        player: flag_value(args, "--player"),
        format: flag_value(args, "--format"),
        tournament: flag_value(args, "--tournament"),
        season: flag_value(args, "--season"),
        date_from: flag_value(args, "--from"),
        date_to: flag_value(args, "--to"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("encode output")?;
    println!("{out}");
    Ok(())
}
