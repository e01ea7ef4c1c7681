use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "Unknown";

/// Dismissal kinds credited to fielders, matched case-insensitively.
pub const DISMISSAL_CAUGHT: &str = "caught";
pub const DISMISSAL_RUN_OUT: &str = "run out";
pub const DISMISSAL_STUMPED: &str = "stumped";
pub const DISMISSAL_OTHER_FIELDING: [&str; 2] = ["hit wicket", "obstructing the field"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BattingStats {
    pub runs: i64,
    pub balls: u32,
    pub fours: u32,
    pub sixes: u32,
    pub dots: u32,
    pub strike_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BowlingStats {
    pub runs_conceded: i64,
    pub balls_bowled: u32,
    pub wickets: u32,
    pub dots: u32,
    pub economy: f64,
    pub overs: String,
    pub strike_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldingStats {
    pub catches: u32,
    pub run_outs: u32,
    pub stumpings: u32,
    pub other_fielding: u32,
    pub total_dismissals: u32,
}

/// One player's involvement in one match.
///
/// Absent stat blocks mean "did not bat/bowl/field", which is distinct from
/// a zero-valued block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub match_id: String,
    pub player_name: String,
    pub team1: String,
    pub team2: String,
    pub venue: String,
    pub city: String,
    pub date: String,
    pub format: String,
    pub tournament: String,
    pub season: String,
    pub gender: String,
    #[serde(default)]
    pub batting_stats: Option<BattingStats>,
    #[serde(default)]
    pub bowling_stats: Option<BowlingStats>,
    #[serde(default)]
    pub fielding_stats: Option<FieldingStats>,
    pub match_result: String,
    #[serde(default)]
    pub total_deliveries_involved: u32,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `num / den` rounded to two decimals, `0.0` when `den` is zero.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { round2(num / den) }
}

pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        round2(part / whole * 100.0)
    }
}

pub fn batting_strike_rate(runs: i64, balls: u32) -> f64 {
    percentage(runs as f64, f64::from(balls))
}

pub fn economy(runs_conceded: i64, balls: u32) -> f64 {
    if balls == 0 {
        0.0
    } else {
        round2(runs_conceded as f64 / (f64::from(balls) / 6.0))
    }
}

pub fn bowling_strike_rate(balls: u32, wickets: u32) -> f64 {
    ratio(f64::from(balls), f64::from(wickets))
}

/// Cricket overs notation: completed overs, then spare balls.
pub fn overs_string(balls: u32) -> String {
    format!("{}.{}", balls / 6, balls % 6)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldingCredit {
    Catch,
    RunOut,
    Stumping,
    Other,
    Unclassified,
}

impl FieldingCredit {
    pub fn classify(kind: &str) -> Self {
        let kind = kind.to_lowercase();
        match kind.as_str() {
            DISMISSAL_CAUGHT => Self::Catch,
            DISMISSAL_RUN_OUT => Self::RunOut,
            DISMISSAL_STUMPED => Self::Stumping,
            k if DISMISSAL_OTHER_FIELDING.contains(&k) => Self::Other,
            _ => Self::Unclassified,
        }
    }
}
