use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::error;

use mi_ledger::config::{Settings, flag_value};
use mi_ledger::identity::IdentityResolver;
use mi_ledger::ingest::{Ingestor, ingest_into_store, load_documents};
use mi_ledger::logging;
use mi_ledger::store::{RunStatus, SqliteLedgerStore};

const ENV_INPUT_DIR: &str = "LEDGER_INPUT_DIR";
const RUN_KIND: &str = "ingest";

fn main() -> Result<()> {
    logging::load_dotenv();
    logging::init_tracing()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = Settings::from_env()
        .context("unable to resolve sqlite path")?
        .with_args(&args);
    let input_dir = flag_value(&args, "--dir")
        .or_else(|| std::env::var(ENV_INPUT_DIR).ok())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("no input directory; pass --dir or set {ENV_INPUT_DIR}"))?;

    let roster = settings.roster().context("load roster")?;
    let resolver = IdentityResolver::new(roster);
    let mut store = SqliteLedgerStore::open(&settings.db_path)
        .with_context(|| format!("open ledger at {}", settings.db_path.display()))?;

    let run_id = store.begin_run(RUN_KIND, &format!("ingesting {}", input_dir.display()))?;
    let outcome = load_documents(&input_dir).and_then(|(docs, load_errors)| {
        let ingestor = Ingestor::new(&resolver);
        let mut summary = ingest_into_store(&mut store, &ingestor, &docs, settings.parallel)?;
        summary.errors.extend(load_errors);
        Ok(summary)
    });

    let summary = match outcome {
        Ok(summary) => summary,
        Err(err) => {
            error!(%err, "ingest failed");
            store.finish_run(run_id, RunStatus::Error, 0, 0, &format!("{err:#}"))?;
            return Err(err);
        }
    };
    store.finish_run(
        run_id,
        RunStatus::Completed,
        summary.documents_total,
        summary.entries_written,
        &format!("{} matches with roster players", summary.matches_with_roster),
    )?;

    println!("Ledger ingest complete");
    println!("DB: {}", settings.db_path.display());
    println!("Documents: {}", summary.documents_total);
    println!("Matches with roster players: {}", summary.matches_with_roster);
    println!("Duplicate matches skipped: {}", summary.duplicates_skipped);
    println!("Matches without roster players: {}", summary.no_roster_skipped);
    println!(
        "Matches with malformed innings: {}",
        summary.malformed_innings_skipped
    );
    println!("Entries written: {}", summary.entries_written);
    if !summary.errors.is_empty() {
        println!("  errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(6) {
            println!("   - {err}");
        }
    }

    Ok(())
}
