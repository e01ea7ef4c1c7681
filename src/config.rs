use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

const DATA_DIR: &str = "mi_ledger";
const DB_FILE: &str = "ledger.sqlite";

pub const ENV_DB_PATH: &str = "LEDGER_DB_PATH";
pub const ENV_ROSTER_PATH: &str = "LEDGER_ROSTER_PATH";
pub const ENV_PARALLEL: &str = "LEDGER_PARALLEL";

static DEFAULT_ROSTER: OnceCell<Roster> = OnceCell::new();

/// One tracked player: the canonical spelling plus the shorthand forms
/// upstream scorecards use for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// The fixed player set the ledger is built for.
///
/// Declaration order matters: fuzzy resolution walks `players` front to back
/// and the first qualifying identity wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub team: String,
    pub players: Vec<RosterPlayer>,
}

impl Roster {
    pub fn new(team: impl Into<String>, players: Vec<RosterPlayer>) -> LedgerResult<Self> {
        let roster = Self {
            team: team.into(),
            players,
        };
        roster.validate()?;
        Ok(roster)
    }

    pub fn load(path: &Path) -> LedgerResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let roster: Roster = serde_json::from_str(&raw).map_err(|source| LedgerError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        roster.validate()?;
        Ok(roster)
    }

    /// Canonical names are unique and no alias string is claimed by two
    /// identities (or shadows another identity's canonical name).
    pub fn validate(&self) -> LedgerResult<()> {
        if self.team.trim().is_empty() {
            return Err(LedgerError::config("tracked team name is empty"));
        }
        if self.players.is_empty() {
            return Err(LedgerError::config("roster has no players"));
        }

        let mut canonical = HashSet::new();
        for player in &self.players {
            if player.name.trim().is_empty() {
                return Err(LedgerError::config("roster contains an empty player name"));
            }
            if !canonical.insert(player.name.as_str()) {
                return Err(LedgerError::config(format!(
                    "duplicate canonical name `{}`",
                    player.name
                )));
            }
        }

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for player in &self.players {
            for alias in &player.aliases {
                if canonical.contains(alias.as_str()) && alias != &player.name {
                    return Err(LedgerError::config(format!(
                        "alias `{alias}` of `{}` is another player's canonical name",
                        player.name
                    )));
                }
                if let Some(owner) = owners.insert(alias.as_str(), player.name.as_str())
                    && owner != player.name
                {
                    return Err(LedgerError::config(format!(
                        "alias `{alias}` claimed by both `{owner}` and `{}`",
                        player.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|p| p.name.as_str())
    }

    /// Mumbai Indians 2025 squad.
    pub fn mumbai_indians_2025() -> Self {
        let table: &[(&str, &[&str])] = &[
            ("Jasprit Bumrah", &["J Bumrah", "JJ Bumrah", "Bumrah"]),
            ("Suryakumar Yadav", &["SA Yadav"]),
            ("Hardik Pandya", &["H Pandya", "HH Pandya", "Pandya"]),
            ("Rohit Sharma", &["RG Sharma"]),
            ("Tilak Varma", &["T Varma", "Tilak"]),
            ("Trent Boult", &["TA Boult", "T Boult", "Boult"]),
            ("Deepak Chahar", &["D Chahar", "DL Chahar", "Chahar"]),
            ("Will Jacks", &["WG Jacks", "W Jacks", "Jacks"]),
            ("Naman Dhir", &["N Dhir", "Dhir"]),
            ("Allah Ghazanfar", &["A Ghazanfar", "Ghazanfar"]),
            ("Mitchell Santner", &["MJ Santner", "M Santner", "Santner"]),
            ("Ryan Rickelton", &["R Rickelton", "RD Rickelton", "Rickelton"]),
            ("Reece Topley", &["RJW Topley", "R Topley", "Topley"]),
            ("Lizaad Williams", &["L Williams", "Williams"]),
            ("Robin Minz", &["R Minz", "Minz"]),
            ("Karn Sharma", &["K Sharma", "Sharma"]),
            ("Ashwani Kumar", &["A Kumar", "Kumar"]),
            ("Shrijith Krishnan", &["S Krishnan", "Krishnan"]),
            ("Raj Angad Bawa", &["RA Bawa", "R Bawa", "Bawa"]),
            ("Satyanarayana Raju", &["PVSN Raju", "Raju", "Satyanarayana"]),
            ("Bevon Jacobs", &["B Jacobs", "Jacobs"]),
            ("Arjun Tendulkar", &["A Tendulkar", "Tendulkar"]),
            ("Vignesh Puthur", &["V Puthur", "Puthur"]),
            ("Mujeeb Ur Rahman", &["Mujeeb", "M Rahman", "Mujeeb Rahman"]),
            ("Corbin Bosch", &["C Bosch", "Bosch"]),
            ("JM Bairstow", &["J Bairstow", "Jinny Bairstow", "Bairstow"]),
            ("RJ Gleeson", &["R Gleeson", "Richard Gleeson", "Gleeson"]),
            ("Charith Asalanka", &["C Asalanka", "KIC Asalanka", "Asalanka"]),
        ];
        Self {
            team: "Mumbai Indians".to_string(),
            players: table
                .iter()
                .map(|(name, aliases)| RosterPlayer {
                    name: (*name).to_string(),
                    aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
                })
                .collect(),
        }
    }
}

pub fn default_roster() -> &'static Roster {
    DEFAULT_ROSTER.get_or_init(Roster::mumbai_indians_2025)
}

/// Process settings read from the environment (after `.env` files are
/// loaded by the binary) and overridable from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub roster_path: Option<PathBuf>,
    pub parallel: bool,
}

impl Settings {
    pub fn from_env() -> Option<Self> {
        let db_path = env_path(ENV_DB_PATH).or_else(default_db_path)?;
        let roster_path = env_path(ENV_ROSTER_PATH);
        let parallel = std::env::var(ENV_PARALLEL)
            .ok()
            .is_some_and(|raw| parse_bool(&raw));
        Some(Self {
            db_path,
            roster_path,
            parallel,
        })
    }

    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(db) = flag_value(args, "--db") {
            self.db_path = PathBuf::from(db);
        }
        if let Some(roster) = flag_value(args, "--roster") {
            self.roster_path = Some(PathBuf::from(roster));
        }
        if args.iter().any(|a| a == "--parallel") {
            self.parallel = true;
        }
        self
    }

    pub fn roster(&self) -> LedgerResult<Roster> {
        match &self.roster_path {
            Some(path) => Roster::load(path),
            None => Ok(default_roster().clone()),
        }
    }
}

pub fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(DATA_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

/// Accepts both `--name value` and `--name=value`.
pub fn flag_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
