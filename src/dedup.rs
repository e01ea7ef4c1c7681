use serde::Serialize;
use tracing::{info, warn};

use crate::error::LedgerResult;
use crate::identity::IdentityResolver;
use crate::store::{LedgerField, LedgerFilter, LedgerStore, RunStatus, SqliteLedgerStore};

/// Scorecard variant known to have been stored instead of the captain's
/// canonical name.
pub const MISATTRIBUTED_CAPTAIN_ALIAS: &str = "RG Sharma";
pub const CAPTAIN: &str = "Rohit Sharma";
/// Sides on which the captain's entries are legitimate.
pub const CAPTAIN_TEAMS: &[&str] = &["Mumbai Indians", "India"];

/// Stable key for one match across duplicate raw documents.
pub fn match_identity(date: &str, team1: &str, team2: &str, venue: &str) -> String {
    format!("{date}_{team1}_{team2}_{venue}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub renamed: usize,
    pub removed: usize,
}

impl ReconcileSummary {
    pub fn total(&self) -> usize {
        self.renamed + self.removed
    }
}

/// Full maintenance pass: standardize every stored player name, then
/// collapse (match, player) duplicates keeping the first-inserted entry.
///
/// Idempotent. A second run on a quiescent store changes nothing.
pub fn reconcile<S: LedgerStore>(
    store: &mut S,
    resolver: &IdentityResolver,
) -> LedgerResult<ReconcileSummary> {
    let result = standardize_names(store, resolver).and_then(|renamed| {
        let removed = collapse_duplicates(store, |_| true)?;
        Ok(ReconcileSummary { renamed, removed })
    });
    match &result {
        Ok(summary) => info!(
            renamed = summary.renamed,
            removed = summary.removed,
            "cleanup completed"
        ),
        Err(err) => warn!(%err, "cleanup failed"),
    }
    result
}

/// Targeted repair for a single stored name: rename it to its canonical
/// form, then collapse duplicates for the canonical name only.
pub fn reconcile_alias<S: LedgerStore>(
    store: &mut S,
    resolver: &IdentityResolver,
    source_name: &str,
) -> LedgerResult<ReconcileSummary> {
    let canonical = resolver.resolve(source_name, None);
    let renamed = if canonical != source_name {
        let n = store.rename_player(&LedgerFilter::PlayerIs(source_name.to_string()), &canonical)?;
        info!(from = source_name, to = %canonical, records = n, "renamed player records");
        n
    } else {
        info!(name = source_name, "no update needed, name is already canonical");
        0
    };
    let removed = collapse_duplicates(store, |player| player == canonical)?;
    info!(renamed, removed, "targeted cleanup completed");
    Ok(ReconcileSummary { renamed, removed })
}

/// Rewrites every stored name that resolves (without match context, so no
/// fuzzy matching) to something else.
pub fn standardize_names<S: LedgerStore>(
    store: &mut S,
    resolver: &IdentityResolver,
) -> LedgerResult<usize> {
    let mut renamed = 0;
    for original in store.distinct_values(LedgerField::PlayerName)? {
        let canonical = resolver.resolve(&original, None);
        if canonical == original {
            continue;
        }
        let n = store.rename_player(&LedgerFilter::PlayerIs(original.clone()), &canonical)?;
        info!(from = %original, to = %canonical, records = n, "renamed player records");
        renamed += n;
    }
    Ok(renamed)
}

/// Deletes all but the first entry of each duplicate group whose player
/// passes `scope`.
pub fn collapse_duplicates<S, F>(store: &mut S, scope: F) -> LedgerResult<usize>
where
    S: LedgerStore,
    F: Fn(&str) -> bool,
{
    let mut removed = 0;
    for group in store.duplicate_groups()? {
        if !scope(&group.player_name) {
            continue;
        }
        let extra = group.row_ids[1..].to_vec();
        let n = store.delete_many(&LedgerFilter::RowIds(extra))?;
        info!(
            match_id = %group.match_id,
            player = %group.player_name,
            records = n,
            "removed duplicate records"
        );
        removed += n;
    }
    Ok(removed)
}

/// Drops entries credited to `player` in matches where neither side is one
/// of `allowed_teams`: a same-named player from another team.
pub fn purge_outside_teams<S: LedgerStore>(
    store: &mut S,
    player: &str,
    allowed_teams: &[&str],
) -> LedgerResult<usize> {
    let removed = store.delete_many(&LedgerFilter::PlayerOutsideTeams {
        player: player.to_string(),
        teams: allowed_teams.iter().map(|t| t.to_string()).collect(),
    })?;
    info!(player, removed, "purged entries outside allowed teams");
    Ok(removed)
}

/// Maintenance pass selected on the reconcile command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceMode {
    /// Standardize every name, then collapse all duplicates.
    Full,
    /// Repair [`MISATTRIBUTED_CAPTAIN_ALIAS`] only.
    Alias,
    /// Full pass plus the captain namesake purge.
    Sync,
}

impl MaintenanceMode {
    pub fn run_kind(self) -> &'static str {
        match self {
            Self::Full => "reconcile",
            Self::Alias => "reconcile_alias",
            Self::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub summary: ReconcileSummary,
    pub purged: usize,
    pub entries_before: usize,
    pub entries_after: usize,
}

impl MaintenanceReport {
    pub fn changed(&self) -> usize {
        self.summary.total() + self.purged
    }

    fn run_note(&self) -> String {
        format!(
            "{} records changed, entries {} -> {}",
            self.changed(),
            self.entries_before,
            self.entries_after
        )
    }
}

/// Runs one maintenance pass inside a `sync_runs` record.
///
/// A pass reads no documents and writes no new entries, so both count
/// columns stay 0 and the entry totals go into the run message.
pub fn run_recorded(
    store: &mut SqliteLedgerStore,
    resolver: &IdentityResolver,
    mode: MaintenanceMode,
) -> LedgerResult<MaintenanceReport> {
    let entries_before = store.count()?;
    let run_id = store.begin_run(mode.run_kind(), "cleaning up ledger")?;
    let (summary, purged) = match run_mode(store, resolver, mode) {
        Ok(done) => done,
        Err(err) => {
            warn!(%err, kind = mode.run_kind(), "maintenance pass failed");
            store.finish_run(run_id, RunStatus::Error, 0, 0, &err.to_string())?;
            return Err(err);
        }
    };
    let report = MaintenanceReport {
        summary,
        purged,
        entries_before,
        entries_after: store.count()?,
    };
    store.finish_run(run_id, RunStatus::Completed, 0, 0, &report.run_note())?;
    Ok(report)
}

fn run_mode(
    store: &mut SqliteLedgerStore,
    resolver: &IdentityResolver,
    mode: MaintenanceMode,
) -> LedgerResult<(ReconcileSummary, usize)> {
    match mode {
        MaintenanceMode::Full => Ok((reconcile(store, resolver)?, 0)),
        MaintenanceMode::Alias => Ok((
            reconcile_alias(store, resolver, MISATTRIBUTED_CAPTAIN_ALIAS)?,
            0,
        )),
        MaintenanceMode::Sync => {
            let summary = reconcile(store, resolver)?;
            let purged = purge_outside_teams(store, CAPTAIN, CAPTAIN_TEAMS)?;
            Ok((summary, purged))
        }
    }
}
