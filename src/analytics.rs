use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::config::Roster;
use crate::error::LedgerResult;
use crate::ledger::{
    BattingStats, BowlingStats, FieldingStats, LedgerEntry, UNKNOWN, batting_strike_rate,
    bowling_strike_rate, economy, overs_string, percentage, ratio,
};
use crate::store::{LedgerField, LedgerStore};

const RECENT_FORM_LEN: usize = 5;

/// Optional slice restrictions. Text filters are case-insensitive
/// substrings; dates compare lexicographically (ISO strings).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsFilters {
    pub player: Option<String>,
    pub format: Option<String>,
    pub tournament: Option<String>,
    pub season: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl AnalyticsFilters {
    pub fn matches(&self, e: &LedgerEntry) -> bool {
        contains_ci(&e.player_name, self.player.as_deref())
            && contains_ci(&e.format, self.format.as_deref())
            && contains_ci(&e.tournament, self.tournament.as_deref())
            && contains_ci(&e.season, self.season.as_deref())
            && self.date_from.as_deref().is_none_or(|from| e.date.as_str() >= from)
            && self.date_to.as_deref().is_none_or(|to| e.date.as_str() <= to)
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BattingAnalytics {
    pub innings: u32,
    pub runs: i64,
    pub balls: u32,
    pub fours: u32,
    pub sixes: u32,
    pub dots: u32,
    pub highest_score: i64,
    pub not_outs: u32,
    pub centuries: u32,
    pub half_centuries: u32,
    pub ducks: u32,
    pub average: f64,
    pub strike_rate: f64,
    pub boundary_percentage: f64,
}

impl BattingAnalytics {
    fn add(&mut self, b: &BattingStats) {
        self.innings += 1;
        self.runs += b.runs;
        self.balls += b.balls;
        self.fours += b.fours;
        self.sixes += b.sixes;
        self.dots += b.dots;
        self.highest_score = self.highest_score.max(b.runs);
        if b.runs == 0 && b.balls > 0 {
            self.ducks += 1;
        } else if b.runs >= 100 {
            self.centuries += 1;
        } else if b.runs >= 50 {
            self.half_centuries += 1;
        }
    }

    fn finish(&mut self) {
        if self.innings == 0 {
            return;
        }
        // the ledger carries no dismissal flag, so not_outs stays zero
        let dismissed = self.innings.saturating_sub(self.not_outs);
        self.average = ratio(self.runs as f64, f64::from(dismissed));
        self.strike_rate = batting_strike_rate(self.runs, self.balls);
        self.boundary_percentage =
            percentage(f64::from(self.fours + self.sixes), f64::from(self.balls));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BowlingAnalytics {
    pub innings: u32,
    pub runs_conceded: i64,
    pub balls_bowled: u32,
    pub wickets: u32,
    pub dots: u32,
    pub best_figures: String,
    pub five_wickets: u32,
    pub four_wickets: u32,
    pub average: f64,
    pub economy: f64,
    pub strike_rate: f64,
    pub dot_ball_percentage: f64,
    pub overs: String,
    #[serde(skip)]
    best: Option<(u32, i64)>,
}

impl Default for BowlingAnalytics {
    fn default() -> Self {
        Self {
            innings: 0,
            runs_conceded: 0,
            balls_bowled: 0,
            wickets: 0,
            dots: 0,
            best_figures: "0/0".to_string(),
            five_wickets: 0,
            four_wickets: 0,
            average: 0.0,
            economy: 0.0,
            strike_rate: 0.0,
            dot_ball_percentage: 0.0,
            overs: "0.0".to_string(),
            best: None,
        }
    }
}

impl BowlingAnalytics {
    fn add(&mut self, b: &BowlingStats) {
        self.innings += 1;
        self.runs_conceded += b.runs_conceded;
        self.balls_bowled += b.balls_bowled;
        self.wickets += b.wickets;
        self.dots += b.dots;
        // wickets only; equal hauls keep the earlier figures
        if self.best.is_none_or(|(w, _)| b.wickets > w) {
            self.best = Some((b.wickets, b.runs_conceded));
        }
        if b.wickets >= 5 {
            self.five_wickets += 1;
        } else if b.wickets >= 4 {
            self.four_wickets += 1;
        }
    }

    fn finish(&mut self) {
        if let Some((w, r)) = self.best {
            self.best_figures = format!("{w}/{r}");
        }
        if self.innings == 0 {
            return;
        }
        self.average = ratio(self.runs_conceded as f64, f64::from(self.wickets));
        self.economy = economy(self.runs_conceded, self.balls_bowled);
        self.strike_rate = bowling_strike_rate(self.balls_bowled, self.wickets);
        self.dot_ball_percentage = percentage(f64::from(self.dots), f64::from(self.balls_bowled));
        self.overs = overs_string(self.balls_bowled);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldingAnalytics {
    pub catches: u32,
    pub run_outs: u32,
    pub stumpings: u32,
    pub other_fielding: u32,
    pub total_dismissals: u32,
}

impl FieldingAnalytics {
    fn add(&mut self, f: &FieldingStats) {
        self.catches += f.catches;
        self.run_outs += f.run_outs;
        self.stumpings += f.stumpings;
        self.other_fielding += f.other_fielding;
        self.total_dismissals += f.total_dismissals;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSample {
    pub date: String,
    pub tournament: String,
    pub batting_runs: Option<i64>,
    pub bowling_wickets: Option<u32>,
    pub match_result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerAnalytics {
    pub player_name: String,
    pub total_matches: u32,
    pub batting: BattingAnalytics,
    pub bowling: BowlingAnalytics,
    pub fielding: FieldingAnalytics,
    pub formats: Vec<String>,
    pub tournaments: Vec<String>,
    pub seasons: Vec<String>,
    pub venues: Vec<String>,
    pub recent_form: Vec<FormSample>,
}

#[derive(Debug, Clone, Default)]
struct PlayerAccumulator {
    player_name: String,
    total_matches: u32,
    batting: BattingAnalytics,
    bowling: BowlingAnalytics,
    fielding: FieldingAnalytics,
    formats: BTreeSet<String>,
    tournaments: BTreeSet<String>,
    seasons: BTreeSet<String>,
    venues: BTreeSet<String>,
    recent_form: Vec<FormSample>,
}

impl PlayerAccumulator {
    fn new(player_name: &str) -> Self {
        Self {
            player_name: player_name.to_string(),
            ..Self::default()
        }
    }

    fn add(&mut self, e: &LedgerEntry) {
        self.total_matches += 1;
        self.formats.insert(e.format.clone());
        self.tournaments.insert(e.tournament.clone());
        self.seasons.insert(e.season.clone());
        self.venues.insert(e.venue.clone());
        if let Some(b) = &e.batting_stats {
            self.batting.add(b);
        }
        if let Some(b) = &e.bowling_stats {
            self.bowling.add(b);
        }
        if let Some(f) = &e.fielding_stats {
            self.fielding.add(f);
        }
        if self.recent_form.len() < RECENT_FORM_LEN {
            self.recent_form.push(FormSample {
                date: e.date.clone(),
                tournament: e.tournament.clone(),
                batting_runs: e.batting_stats.map(|b| b.runs),
                bowling_wickets: e.bowling_stats.as_ref().map(|b| b.wickets),
                match_result: e.match_result.clone(),
            });
        }
    }

    fn finish(mut self) -> PlayerAnalytics {
        self.batting.finish();
        self.bowling.finish();
        PlayerAnalytics {
            player_name: self.player_name,
            total_matches: self.total_matches,
            batting: self.batting,
            bowling: self.bowling,
            fielding: self.fielding,
            formats: self.formats.into_iter().collect(),
            tournaments: self.tournaments.into_iter().collect(),
            seasons: self.seasons.into_iter().collect(),
            venues: self.venues.into_iter().collect(),
            recent_form: self.recent_form,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_matches: usize,
    pub unique_players: usize,
    pub formats_covered: usize,
    pub tournaments_covered: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub players: Vec<PlayerAnalytics>,
    pub summary: AnalyticsSummary,
}

/// Cross-match rollup over the filtered slice of `entries`.
///
/// Players appear in first-seen order and "recent form" holds the first
/// five entries per player, so callers control both through the order they
/// pass entries in (newest first, as the store returns them).
pub fn rollup<'a, I>(entries: I, filters: &AnalyticsFilters) -> AnalyticsReport
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let filtered: Vec<&LedgerEntry> = entries.into_iter().filter(|e| filters.matches(e)).collect();
    if filtered.is_empty() {
        return AnalyticsReport::default();
    }

    let mut order: Vec<PlayerAccumulator> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for e in &filtered {
        let pos = *index.entry(e.player_name.as_str()).or_insert_with(|| {
            order.push(PlayerAccumulator::new(&e.player_name));
            order.len() - 1
        });
        order[pos].add(e);
    }

    let formats: HashSet<&str> = filtered.iter().map(|e| e.format.as_str()).collect();
    let tournaments: HashSet<&str> = filtered.iter().map(|e| e.tournament.as_str()).collect();
    let from = filtered.iter().map(|e| e.date.as_str()).min().unwrap_or_default();
    let to = filtered.iter().map(|e| e.date.as_str()).max().unwrap_or_default();

    let summary = AnalyticsSummary {
        total_matches: filtered.len(),
        unique_players: order.len(),
        formats_covered: formats.len(),
        tournaments_covered: tournaments.len(),
        date_range: DateRange {
            from: from.to_string(),
            to: to.to_string(),
        },
    };
    AnalyticsReport {
        players: order.into_iter().map(PlayerAccumulator::finish).collect(),
        summary,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub formats: Vec<String>,
    pub tournaments: Vec<String>,
    pub seasons: Vec<String>,
    pub players: Vec<String>,
    pub date_range: DateRange,
}

/// Distinct values to offer as filters. Placeholder values are dropped.
pub fn filter_options(entries: &[LedgerEntry]) -> FilterOptions {
    fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
        values
            .filter(|v| !v.is_empty() && *v != UNKNOWN)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    let players = entries
        .iter()
        .map(|e| e.player_name.as_str())
        .filter(|p| !p.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    FilterOptions {
        formats: distinct(entries.iter().map(|e| e.format.as_str())),
        tournaments: distinct(entries.iter().map(|e| e.tournament.as_str())),
        seasons: distinct(entries.iter().map(|e| e.season.as_str())),
        players,
        date_range: DateRange {
            from: entries
                .iter()
                .map(|e| e.date.as_str())
                .min()
                .unwrap_or_default()
                .to_string(),
            to: entries
                .iter()
                .map(|e| e.date.as_str())
                .max()
                .unwrap_or_default()
                .to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPerformance {
    pub player_name: String,
    pub batting_stats: Option<BattingStats>,
    pub bowling_stats: Option<BowlingStats>,
    pub fielding_stats: Option<FieldingStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueMatch {
    pub match_id: String,
    pub date: String,
    pub team1: String,
    pub team2: String,
    pub venue: String,
    pub city: String,
    pub format: String,
    pub tournament: String,
    pub season: String,
    pub match_result: String,
    pub players_performance: Vec<PlayerPerformance>,
}

/// One row per match with every tracked player's line, newest first.
/// The `season` filter is not applied here.
pub fn unique_matches(
    entries: &[LedgerEntry],
    filters: &AnalyticsFilters,
    limit: Option<usize>,
) -> Vec<UniqueMatch> {
    let mut order: Vec<UniqueMatch> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let scope = AnalyticsFilters {
        season: None,
        ..filters.clone()
    };
    for e in entries.iter().filter(|e| scope.matches(e)) {
        let pos = *index.entry(e.match_id.as_str()).or_insert_with(|| {
            order.push(UniqueMatch {
                match_id: e.match_id.clone(),
                date: e.date.clone(),
                team1: e.team1.clone(),
                team2: e.team2.clone(),
                venue: e.venue.clone(),
                city: e.city.clone(),
                format: e.format.clone(),
                tournament: e.tournament.clone(),
                season: e.season.clone(),
                match_result: e.match_result.clone(),
                players_performance: Vec::new(),
            });
            order.len() - 1
        });
        order[pos].players_performance.push(PlayerPerformance {
            player_name: e.player_name.clone(),
            batting_stats: e.batting_stats,
            bowling_stats: e.bowling_stats.clone(),
            fielding_stats: e.fielding_stats,
        });
    }
    order.sort_by(|a, b| b.date.cmp(&a.date));
    if let Some(limit) = limit {
        order.truncate(limit);
    }
    order
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerListing {
    pub name: String,
    pub team: String,
    pub match_count: usize,
}

/// Players with ledger entries by match count (descending), then roster
/// players with none.
pub fn list_players(entries: &[LedgerEntry], roster: &Roster) -> Vec<PlayerListing> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for e in entries {
        match index.get(e.player_name.as_str()) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                index.insert(e.player_name.as_str(), counts.len());
                counts.push((e.player_name.clone(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut listed: Vec<PlayerListing> = counts
        .into_iter()
        .map(|(name, match_count)| PlayerListing {
            name,
            team: roster.team.clone(),
            match_count,
        })
        .collect();
    for name in roster.canonical_names() {
        if !index.contains_key(name) {
            listed.push(PlayerListing {
                name: name.to_string(),
                team: roster.team.clone(),
                match_count: 0,
            });
        }
    }
    listed
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_entries: usize,
    pub unique_players: usize,
}

/// Entry and player counts, answered by the store without loading rows.
pub fn store_stats<S: LedgerStore>(store: &S) -> LedgerResult<StoreStats> {
    Ok(StoreStats {
        total_entries: store.count()?,
        unique_players: store.distinct_values(LedgerField::PlayerName)?.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(player: &str, format: &str, date: &str) -> LedgerEntry {
        LedgerEntry {
            match_id: format!("{date}_{format}"),
            player_name: player.to_string(),
            team1: "Mumbai Indians".to_string(),
            team2: "Other".to_string(),
            venue: "Wankhede Stadium".to_string(),
            city: "Mumbai".to_string(),
            date: date.to_string(),
            format: format.to_string(),
            tournament: "Indian Premier League".to_string(),
            season: "2025".to_string(),
            gender: "male".to_string(),
            batting_stats: None,
            bowling_stats: None,
            fielding_stats: None,
            match_result: "Mumbai Indians".to_string(),
            total_deliveries_involved: 0,
        }
    }

    fn bowled(wickets: u32, runs: i64, balls: u32) -> Option<BowlingStats> {
        Some(BowlingStats {
            runs_conceded: runs,
            balls_bowled: balls,
            wickets,
            dots: 0,
            economy: economy(runs, balls),
            overs: overs_string(balls),
            strike_rate: bowling_strike_rate(balls, wickets),
        })
    }

    #[test]
    fn empty_slice_gives_empty_report() {
        let none: Vec<LedgerEntry> = Vec::new();
        let report = rollup(&none, &AnalyticsFilters::default());
        assert!(report.players.is_empty());
        assert_eq!(report.summary, AnalyticsSummary::default());
    }

    #[test]
    fn best_figures_compare_wickets_only_and_keep_first_tie() {
        let mut a = entry("Jasprit Bumrah", "T20", "2025-04-03");
        a.bowling_stats = bowled(3, 30, 24);
        let mut b = entry("Jasprit Bumrah", "T20", "2025-04-02");
        b.bowling_stats = bowled(3, 12, 24);
        let mut c = entry("Jasprit Bumrah", "T20", "2025-04-01");
        c.bowling_stats = bowled(1, 5, 24);
        let report = rollup(&[a, b, c], &AnalyticsFilters::default());
        let bowling = &report.players[0].bowling;
        assert_eq!(bowling.best_figures, "3/30");
        assert_eq!(bowling.wickets, 7);
        assert_eq!(bowling.innings, 3);
        assert_eq!(bowling.average, 6.71);
        assert_eq!(bowling.economy, 3.92);
        assert_eq!(bowling.overs, "12.0");
        assert_eq!(bowling.strike_rate, 10.29);
    }

    #[test]
    fn zero_guards_for_players_who_never_bat_or_bowl() {
        let report = rollup(&[entry("Robin Minz", "T20", "2025-04-01")], &AnalyticsFilters::default());
        let p = &report.players[0];
        assert_eq!(p.batting.average, 0.0);
        assert_eq!(p.batting.strike_rate, 0.0);
        assert_eq!(p.bowling.economy, 0.0);
        assert_eq!(p.bowling.best_figures, "0/0");
        assert_eq!(p.bowling.overs, "0.0");
    }

    #[test]
    fn batting_milestones() {
        let scores = [(0, 2), (0, 0), (55, 30), (101, 60), (12, 10)];
        let entries: Vec<LedgerEntry> = scores
            .iter()
            .enumerate()
            .map(|(i, (runs, balls))| {
                let mut e = entry("Tilak Varma", "T20", &format!("2025-04-0{}", i + 1));
                e.batting_stats = Some(BattingStats {
                    runs: *runs,
                    balls: *balls,
                    fours: 1,
                    sixes: 0,
                    dots: 0,
                    strike_rate: batting_strike_rate(*runs, *balls),
                });
                e
            })
            .collect();
        let report = rollup(&entries, &AnalyticsFilters::default());
        let batting = &report.players[0].batting;
        assert_eq!(batting.innings, 5);
        assert_eq!(batting.ducks, 1);
        assert_eq!(batting.half_centuries, 1);
        assert_eq!(batting.centuries, 1);
        assert_eq!(batting.highest_score, 101);
        assert_eq!(batting.average, 33.6);
        assert_eq!(batting.strike_rate, 164.71);
        assert_eq!(batting.boundary_percentage, 4.9);
    }

    #[test]
    fn recent_form_keeps_first_five() {
        let entries: Vec<LedgerEntry> = (1..=7)
            .map(|d| entry("Will Jacks", "T20", &format!("2025-05-0{d}")))
            .collect();
        let report = rollup(&entries, &AnalyticsFilters::default());
        let form = &report.players[0].recent_form;
        assert_eq!(form.len(), 5);
        assert_eq!(form[0].date, "2025-05-01");
        assert_eq!(form[0].batting_runs, None);
    }

    #[test]
    fn filter_options_drop_unknown() {
        let mut e = entry("A", "Unknown", "2025-01-01");
        e.season = "Unknown".to_string();
        let opts = filter_options(&[e, entry("B", "ODI", "2024-01-01")]);
        assert_eq!(opts.formats, vec!["ODI".to_string()]);
        assert_eq!(opts.seasons, vec!["2025".to_string()]);
        assert_eq!(opts.players.len(), 2);
        assert_eq!(opts.date_range.from, "2024-01-01");
        assert_eq!(opts.date_range.to, "2025-01-01");
    }

    #[test]
    fn unique_matches_group_players_and_sort_newest_first() {
        let entries = vec![
            entry("Rohit Sharma", "T20", "2025-04-01"),
            entry("Tilak Varma", "T20", "2025-04-01"),
            entry("Rohit Sharma", "T20", "2025-04-09"),
        ];
        let rows = unique_matches(&entries, &AnalyticsFilters::default(), None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2025-04-09");
        assert_eq!(rows[1].players_performance.len(), 2);

        let only_tilak = AnalyticsFilters {
            player: Some("tilak".to_string()),
            ..AnalyticsFilters::default()
        };
        let rows = unique_matches(&entries, &only_tilak, Some(5));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].players_performance[0].player_name, "Tilak Varma");
    }

    #[test]
    fn players_listed_by_count_then_roster() {
        let roster = crate::config::default_roster();
        let entries = vec![
            entry("Tilak Varma", "T20", "2025-04-01"),
            entry("Rohit Sharma", "T20", "2025-04-01"),
            entry("Rohit Sharma", "T20", "2025-04-02"),
        ];
        let listed = list_players(&entries, roster);
        assert_eq!(listed[0].name, "Rohit Sharma");
        assert_eq!(listed[0].match_count, 2);
        assert_eq!(listed[1].name, "Tilak Varma");
        assert_eq!(listed.len(), roster.players.len());
        assert!(listed[2..].iter().all(|p| p.match_count == 0));
    }
}
