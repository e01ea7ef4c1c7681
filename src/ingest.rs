use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::aggregate::aggregate;
use crate::error::LedgerError;
use crate::identity::IdentityResolver;
use crate::ledger::LedgerEntry;
use crate::normalize::MatchNormalizer;
use crate::participants::find_participants;
use crate::store::LedgerStore;

const PROGRESS_EVERY: usize = 100;

/// What happened to one raw document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Entries(Vec<LedgerEntry>),
    DuplicateMatch,
    NoRosterPlayers,
    /// Roster players were found but `innings` was not a list.
    MalformedInnings,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub documents_total: usize,
    pub matches_with_roster: usize,
    pub duplicates_skipped: usize,
    pub no_roster_skipped: usize,
    pub malformed_innings_skipped: usize,
    pub entries: Vec<LedgerEntry>,
    pub errors: Vec<String>,
}

impl IngestReport {
    fn absorb(&mut self, outcome: DocumentOutcome) {
        self.documents_total += 1;
        match outcome {
            DocumentOutcome::Entries(entries) => {
                self.matches_with_roster += 1;
                self.entries.extend(entries);
            }
            DocumentOutcome::DuplicateMatch => self.duplicates_skipped += 1,
            DocumentOutcome::NoRosterPlayers => self.no_roster_skipped += 1,
            DocumentOutcome::MalformedInnings => self.malformed_innings_skipped += 1,
            DocumentOutcome::Failed(err) => self.errors.push(err),
        }
    }
}

/// Batch ingestion: normalize, find roster participants, aggregate.
///
/// One `Ingestor` spans a whole run, so a match seen in an earlier batch is
/// not re-emitted by a later one.
pub struct Ingestor<'r> {
    resolver: &'r IdentityResolver,
    normalizer: MatchNormalizer,
}

impl<'r> Ingestor<'r> {
    pub fn new(resolver: &'r IdentityResolver) -> Self {
        Self {
            resolver,
            normalizer: MatchNormalizer::new(),
        }
    }

    pub fn process(&self, docs: &[Value]) -> IngestReport {
        info!(documents = docs.len(), "starting ingestion");
        let mut report = IngestReport::default();
        for (idx, doc) in docs.iter().enumerate() {
            if idx % PROGRESS_EVERY == 0 {
                info!("processing document {}/{}", idx + 1, docs.len());
            }
            report.absorb(self.process_one(idx, doc));
        }
        info!(
            entries = report.entries.len(),
            documents = docs.len(),
            "ingestion completed"
        );
        report
    }

    /// Same as [`Ingestor::process`] but spread across the rayon pool.
    ///
    /// Outcomes are folded back in source order. When two documents share a
    /// match identity, whichever reaches the seen-set first is kept.
    pub fn process_parallel(&self, docs: &[Value]) -> IngestReport {
        info!(documents = docs.len(), "starting parallel ingestion");
        let outcomes: Vec<DocumentOutcome> = docs
            .par_iter()
            .enumerate()
            .map(|(idx, doc)| self.process_one(idx, doc))
            .collect();
        let mut report = IngestReport::default();
        for outcome in outcomes {
            report.absorb(outcome);
        }
        info!(
            entries = report.entries.len(),
            documents = docs.len(),
            "parallel ingestion completed"
        );
        report
    }

    pub fn process_one(&self, idx: usize, doc: &Value) -> DocumentOutcome {
        let m = match self.normalizer.normalize(idx, doc) {
            Ok(Some(m)) => m,
            Ok(None) => return DocumentOutcome::DuplicateMatch,
            Err(err) => {
                error!(%err, "error processing document");
                return DocumentOutcome::Failed(err.to_string());
            }
        };
        let participants = find_participants(self.resolver, &m);
        if participants.is_empty() {
            return DocumentOutcome::NoRosterPlayers;
        }
        if m.innings_malformed {
            warn!(match_id = %m.info.match_id, "skipping match with malformed innings");
            return DocumentOutcome::MalformedInnings;
        }
        info!(match_id = %m.info.match_id, players = ?participants, "found roster players in match");
        DocumentOutcome::Entries(aggregate(self.resolver, &m, &participants))
    }
}

/// Counts reported by [`ingest_into_store`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents_total: usize,
    pub matches_with_roster: usize,
    pub duplicates_skipped: usize,
    pub no_roster_skipped: usize,
    pub malformed_innings_skipped: usize,
    pub entries_written: usize,
    pub errors: Vec<String>,
}

/// Runs a batch and persists its entries. A store failure fails the whole
/// call; earlier batches may already be persisted, which the reconcile
/// pass repairs.
pub fn ingest_into_store<S: LedgerStore>(
    store: &mut S,
    ingestor: &Ingestor<'_>,
    docs: &[Value],
    parallel: bool,
) -> Result<IngestSummary> {
    let report = if parallel {
        ingestor.process_parallel(docs)
    } else {
        ingestor.process(docs)
    };
    let entries_written = store
        .insert_many(&report.entries)
        .context("insert ledger entries")?;
    info!(entries_written, "saved entries to ledger");
    Ok(IngestSummary {
        documents_total: report.documents_total,
        matches_with_roster: report.matches_with_roster,
        duplicates_skipped: report.duplicates_skipped,
        no_roster_skipped: report.no_roster_skipped,
        malformed_innings_skipped: report.malformed_innings_skipped,
        entries_written,
        errors: report.errors,
    })
}

/// Already-extracted `*.json` match files directly under `dir`, sorted by
/// file name. Unreadable or unparseable files are reported, not fatal.
pub fn load_documents(dir: &Path) -> Result<(Vec<Value>, Vec<String>)> {
    let listing = fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    let mut paths: Vec<PathBuf> = listing
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    for path in paths {
        match read_document(&path) {
            Ok(doc) => docs.push(doc),
            Err(err) => {
                error!(%err, "skipping match file");
                errors.push(err.to_string());
            }
        }
    }
    info!(files = docs.len(), dir = %dir.display(), "loaded match files");
    Ok((docs, errors))
}

fn read_document(path: &Path) -> Result<Value, LedgerError> {
    let raw = fs::read_to_string(path).map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| LedgerError::Json {
        path: path.to_path_buf(),
        source,
    })
}
