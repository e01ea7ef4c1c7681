use anyhow::{Context, Result};
use tracing::error;

use mi_ledger::config::Settings;
use mi_ledger::dedup::{self, CAPTAIN, CAPTAIN_TEAMS, MaintenanceMode};
use mi_ledger::identity::IdentityResolver;
use mi_ledger::logging;
use mi_ledger::store::SqliteLedgerStore;

fn mode_from_args(args: &[String]) -> MaintenanceMode {
    if args.iter().any(|a| a == "--sync") {
        MaintenanceMode::Sync
    } else if args.iter().any(|a| a == "--alias") {
        MaintenanceMode::Alias
    } else {
        MaintenanceMode::Full
    }
}

fn main() -> Result<()> {
    logging::load_dotenv();
    logging::init_tracing()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = Settings::from_env()
        .context("unable to resolve sqlite path")?
        .with_args(&args);
    let mode = mode_from_args(&args);

    let resolver = IdentityResolver::new(settings.roster().context("load roster")?);
    let mut store = SqliteLedgerStore::open(&settings.db_path)
        .with_context(|| format!("open ledger at {}", settings.db_path.display()))?;

    let report = match dedup::run_recorded(&mut store, &resolver, mode) {
        Ok(report) => report,
        Err(err) => {
            error!(%err, "reconcile failed");
            return Err(err).context("reconcile ledger");
        }
    };

    println!("Ledger reconcile complete ({})", mode.run_kind());
    println!("DB: {}", settings.db_path.display());
    println!("Renamed: {}", report.summary.renamed);
    println!("Duplicates removed: {}", report.summary.removed);
    if mode == MaintenanceMode::Sync {
        println!(
            "Purged {CAPTAIN} entries outside {CAPTAIN_TEAMS:?}: {}",
            report.purged
        );
    }
    println!(
        "Entries: {} -> {}",
        report.entries_before, report.entries_after
    );

    Ok(())
}
