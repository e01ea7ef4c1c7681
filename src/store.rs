use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::LedgerEntry;

/// Ledger columns callers may filter or list on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerField {
    PlayerName,
    MatchId,
    Team1,
    Team2,
    Venue,
    City,
    Date,
    Format,
    Tournament,
    Season,
    Gender,
    MatchResult,
}

impl LedgerField {
    pub fn column(self) -> &'static str {
        match self {
            Self::PlayerName => "player_name",
            Self::MatchId => "match_id",
            Self::Team1 => "team1",
            Self::Team2 => "team2",
            Self::Venue => "venue",
            Self::City => "city",
            Self::Date => "date",
            Self::Format => "format",
            Self::Tournament => "tournament",
            Self::Season => "season",
            Self::Gender => "gender",
            Self::MatchResult => "match_result",
        }
    }
}

/// Row selection for bulk updates and deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerFilter {
    PlayerIs(String),
    RowIds(Vec<i64>),
    /// Entries for `player` where neither side of the match is in `teams`.
    PlayerOutsideTeams { player: String, teams: Vec<String> },
}

impl LedgerFilter {
    fn to_sql(&self) -> Option<(String, Vec<SqlValue>)> {
        match self {
            Self::PlayerIs(name) => Some((
                "player_name = ?".to_string(),
                vec![SqlValue::Text(name.clone())],
            )),
            Self::RowIds(ids) => {
                if ids.is_empty() {
                    return None;
                }
                let marks = vec!["?"; ids.len()].join(", ");
                Some((
                    format!("row_id IN ({marks})"),
                    ids.iter().map(|id| SqlValue::Integer(*id)).collect(),
                ))
            }
            Self::PlayerOutsideTeams { player, teams } => {
                let mut values = vec![SqlValue::Text(player.clone())];
                if teams.is_empty() {
                    return Some(("player_name = ?".to_string(), values));
                }
                let marks = vec!["?"; teams.len()].join(", ");
                for _ in 0..2 {
                    values.extend(teams.iter().map(|t| SqlValue::Text(t.clone())));
                }
                Some((
                    format!("player_name = ? AND team1 NOT IN ({marks}) AND team2 NOT IN ({marks})"),
                    values,
                ))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub row_id: i64,
    pub entry: LedgerEntry,
}

/// Entries sharing one (match, player) key, row ids in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub match_id: String,
    pub player_name: String,
    pub row_ids: Vec<i64>,
}

/// The persisted ledger collection.
///
/// Reconciliation assumes a quiescent store: callers must not insert while
/// a maintenance pass is grouping and deleting.
pub trait LedgerStore {
    fn insert_many(&mut self, entries: &[LedgerEntry]) -> LedgerResult<usize>;

    /// Case-insensitive substring match on one column, newest date first.
    fn find_by_pattern(&self, field: LedgerField, pattern: &str)
    -> LedgerResult<Vec<StoredEntry>>;

    fn distinct_values(&self, field: LedgerField) -> LedgerResult<Vec<String>>;

    fn delete_many(&mut self, filter: &LedgerFilter) -> LedgerResult<usize>;

    /// Rewrites `player_name` on every matching row, returning rows changed.
    fn rename_player(&mut self, filter: &LedgerFilter, new_name: &str) -> LedgerResult<usize>;

    /// Every (match, player) key held by more than one entry.
    fn duplicate_groups(&self) -> LedgerResult<Vec<DuplicateGroup>>;

    fn count(&self) -> LedgerResult<usize>;

    /// Whole ledger, newest date first.
    fn load_all(&self) -> LedgerResult<Vec<StoredEntry>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Bookkeeping row for one ingestion or maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub run_id: Option<i64>,
    pub kind: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub documents_seen: usize,
    pub entries_written: usize,
    pub message: String,
}

impl SyncStatus {
    fn not_started() -> Self {
        Self {
            run_id: None,
            kind: "none".to_string(),
            status: "not_started".to_string(),
            started_at: Utc::now().to_rfc3339(),
            finished_at: None,
            documents_seen: 0,
            entries_written: 0,
            message: "Data sync not started yet".to_string(),
        }
    }
}

const ENTRY_COLUMNS: &str = "row_id, match_id, player_name, team1, team2, venue, city, date, \
     format, tournament, season, gender, batting_stats, bowling_stats, fielding_stats, \
     match_result, total_deliveries_involved";

pub struct SqliteLedgerStore {
    conn: Connection,
}

impl SqliteLedgerStore {
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn begin_run(&self, kind: &str, message: &str) -> LedgerResult<i64> {
        self.conn.execute(
            "INSERT INTO sync_runs(kind, status, started_at, finished_at, documents_seen, entries_written, message)
             VALUES (?1, ?2, ?3, NULL, 0, 0, ?4)",
            params![kind, RunStatus::Running.as_str(), Utc::now().to_rfc3339(), message],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        documents_seen: usize,
        entries_written: usize,
        message: &str,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE sync_runs
             SET status = ?1, finished_at = ?2, documents_seen = ?3, entries_written = ?4, message = ?5
             WHERE run_id = ?6",
            params![
                status.as_str(),
                Utc::now().to_rfc3339(),
                documents_seen as i64,
                entries_written as i64,
                message,
                run_id
            ],
        )?;
        Ok(())
    }

    pub fn latest_sync_status(&self) -> LedgerResult<SyncStatus> {
        let row = self
            .conn
            .query_row(
                "SELECT run_id, kind, status, started_at, finished_at, documents_seen, entries_written, message
                 FROM sync_runs ORDER BY run_id DESC LIMIT 1",
                [],
                |row| {
                    Ok(SyncStatus {
                        run_id: Some(row.get(0)?),
                        kind: row.get(1)?,
                        status: row.get(2)?,
                        started_at: row.get(3)?,
                        finished_at: row.get(4)?,
                        documents_seen: row.get::<_, i64>(5)? as usize,
                        entries_written: row.get::<_, i64>(6)? as usize,
                        message: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row.unwrap_or_else(SyncStatus::not_started))
    }

    fn select_entries(&self, where_sql: &str, values: Vec<SqlValue>) -> LedgerResult<Vec<StoredEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries {where_sql} ORDER BY date DESC, row_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), decode_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn insert_many(&mut self, entries: &[LedgerEntry]) -> LedgerResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let created_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO ledger_entries (
                    match_id, player_name, team1, team2, venue, city, date,
                    format, tournament, season, gender,
                    batting_stats, bowling_stats, fielding_stats,
                    match_result, total_deliveries_involved, created_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14,
                    ?15, ?16, ?17
                )
                "#,
            )?;
            for e in entries {
                stmt.execute(params![
                    e.match_id,
                    e.player_name,
                    e.team1,
                    e.team2,
                    e.venue,
                    e.city,
                    e.date,
                    e.format,
                    e.tournament,
                    e.season,
                    e.gender,
                    encode_json(&e.batting_stats)?,
                    encode_json(&e.bowling_stats)?,
                    encode_json(&e.fielding_stats)?,
                    e.match_result,
                    i64::from(e.total_deliveries_involved),
                    created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    fn find_by_pattern(
        &self,
        field: LedgerField,
        pattern: &str,
    ) -> LedgerResult<Vec<StoredEntry>> {
        let where_sql = format!("WHERE instr(lower({}), lower(?1)) > 0", field.column());
        self.select_entries(&where_sql, vec![SqlValue::Text(pattern.to_string())])
    }

    fn distinct_values(&self, field: LedgerField) -> LedgerResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {col} FROM ledger_entries ORDER BY {col}",
            col = field.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn delete_many(&mut self, filter: &LedgerFilter) -> LedgerResult<usize> {
        let Some((where_sql, values)) = filter.to_sql() else {
            return Ok(0);
        };
        let sql = format!("DELETE FROM ledger_entries WHERE {where_sql}");
        Ok(self.conn.execute(&sql, params_from_iter(values.iter()))?)
    }

    fn rename_player(&mut self, filter: &LedgerFilter, new_name: &str) -> LedgerResult<usize> {
        let Some((where_sql, values)) = filter.to_sql() else {
            return Ok(0);
        };
        let sql = format!(
            "UPDATE ledger_entries SET player_name = ? WHERE player_name <> ? AND ({where_sql})"
        );
        let mut all = vec![
            SqlValue::Text(new_name.to_string()),
            SqlValue::Text(new_name.to_string()),
        ];
        all.extend(values);
        Ok(self.conn.execute(&sql, params_from_iter(all.iter()))?)
    }

    fn duplicate_groups(&self) -> LedgerResult<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT row_id, match_id, player_name FROM ledger_entries ORDER BY row_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut order: Vec<DuplicateGroup> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        for row in rows {
            let (row_id, match_id, player_name) = row?;
            let key = (match_id, player_name);
            match index.get(&key) {
                Some(&pos) => order[pos].row_ids.push(row_id),
                None => {
                    index.insert(key.clone(), order.len());
                    order.push(DuplicateGroup {
                        match_id: key.0,
                        player_name: key.1,
                        row_ids: vec![row_id],
                    });
                }
            }
        }
        order.retain(|g| g.row_ids.len() > 1);
        Ok(order)
    }

    fn count(&self) -> LedgerResult<usize> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| {
                row.get::<_, i64>(0)
            })?;
        Ok(n as usize)
    }

    fn load_all(&self) -> LedgerResult<Vec<StoredEntry>> {
        self.select_entries("", Vec::new())
    }
}

fn init_schema(conn: &Connection) -> LedgerResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS ledger_entries (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id TEXT NOT NULL,
            player_name TEXT NOT NULL,
            team1 TEXT NOT NULL,
            team2 TEXT NOT NULL,
            venue TEXT NOT NULL,
            city TEXT NOT NULL,
            date TEXT NOT NULL,
            format TEXT NOT NULL,
            tournament TEXT NOT NULL,
            season TEXT NOT NULL,
            gender TEXT NOT NULL,
            batting_stats TEXT NULL,
            bowling_stats TEXT NULL,
            fielding_stats TEXT NULL,
            match_result TEXT NOT NULL,
            total_deliveries_involved INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_player ON ledger_entries(player_name);
        CREATE INDEX IF NOT EXISTS idx_ledger_match_player ON ledger_entries(match_id, player_name);
        CREATE INDEX IF NOT EXISTS idx_ledger_date ON ledger_entries(date);

        CREATE TABLE IF NOT EXISTS sync_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            documents_seen INTEGER NOT NULL,
            entries_written INTEGER NOT NULL,
            message TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn encode_json<T: Serialize>(value: &Option<T>) -> LedgerResult<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(LedgerError::from)
}

fn decode_json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let Some(raw) = row.get::<_, Option<String>>(idx)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn decode_entry(row: &Row<'_>) -> rusqlite::Result<StoredEntry> {
    Ok(StoredEntry {
        row_id: row.get(0)?,
        entry: LedgerEntry {
            match_id: row.get(1)?,
            player_name: row.get(2)?,
            team1: row.get(3)?,
            team2: row.get(4)?,
            venue: row.get(5)?,
            city: row.get(6)?,
            date: row.get(7)?,
            format: row.get(8)?,
            tournament: row.get(9)?,
            season: row.get(10)?,
            gender: row.get(11)?,
            batting_stats: decode_json(row, 12)?,
            bowling_stats: decode_json(row, 13)?,
            fielding_stats: decode_json(row, 14)?,
            match_result: row.get(15)?,
            total_deliveries_involved: row.get::<_, i64>(16)? as u32,
        },
    })
}
