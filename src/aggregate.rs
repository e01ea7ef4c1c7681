use std::collections::BTreeSet;

use tracing::debug;

use crate::identity::{IdentityResolver, MatchTeams};
use crate::ledger::{
    BattingStats, BowlingStats, FieldingCredit, FieldingStats, LedgerEntry, batting_strike_rate,
    bowling_strike_rate, economy, overs_string,
};
use crate::normalize::{DeliveryEvent, NormalizedMatch};

/// A delivery with every name slot already run through the resolver, so
/// the per-participant passes compare plain strings.
struct ResolvedDelivery<'a> {
    event: &'a DeliveryEvent,
    batter: Option<String>,
    bowler: Option<String>,
    /// (dismissal kind, resolved fielder) per fielder credit.
    fielders: Vec<(&'a str, String)>,
}

impl<'a> ResolvedDelivery<'a> {
    fn new(event: &'a DeliveryEvent, resolver: &IdentityResolver, teams: &MatchTeams) -> Self {
        let resolve = |name: &Option<String>| {
            name.as_deref()
                .map(|n| resolver.resolve(n, Some(teams)))
        };
        let fielders = event
            .wickets
            .iter()
            .flat_map(|w| {
                w.fielders
                    .iter()
                    .map(move |f| (w.kind.as_str(), resolver.resolve(f, Some(teams))))
            })
            .collect();
        Self {
            event,
            batter: resolve(&event.batter),
            bowler: resolve(&event.bowler),
            fielders,
        }
    }

    fn batted(&self, player: &str) -> bool {
        self.batter.as_deref() == Some(player)
    }

    fn bowled(&self, player: &str) -> bool {
        self.bowler.as_deref() == Some(player)
    }
}

#[derive(Default)]
struct Buckets<'a> {
    batting: Vec<&'a DeliveryEvent>,
    bowling: Vec<&'a DeliveryEvent>,
    fielding: Vec<&'a str>,
    involved: u32,
}

/// One ledger entry per participant.
pub fn aggregate(
    resolver: &IdentityResolver,
    m: &NormalizedMatch,
    participants: &BTreeSet<String>,
) -> Vec<LedgerEntry> {
    let teams = m.info.teams();
    let resolved: Vec<ResolvedDelivery<'_>> = m
        .deliveries()
        .map(|d| ResolvedDelivery::new(d, resolver, &teams))
        .collect();

    participants
        .iter()
        .map(|player| {
            let buckets = partition(player, &resolved);
            let entry = build_entry(m, player, &buckets);
            debug!(
                match_id = %entry.match_id,
                player = %entry.player_name,
                involved = entry.total_deliveries_involved,
                "aggregated player"
            );
            entry
        })
        .collect()
}

fn partition<'a>(player: &str, deliveries: &[ResolvedDelivery<'a>]) -> Buckets<'a> {
    let mut buckets = Buckets::default();
    for d in deliveries {
        let batted = d.batted(player);
        let bowled = d.bowled(player);
        if batted {
            buckets.batting.push(d.event);
            buckets.involved += 1;
        }
        if bowled {
            buckets.bowling.push(d.event);
            buckets.involved += 1;
        }
        for (kind, fielder) in &d.fielders {
            if fielder != player {
                continue;
            }
            buckets.fielding.push(*kind);
            // already counted as this delivery's batter or bowler
            if !batted && !bowled {
                buckets.involved += 1;
            }
        }
    }
    buckets
}

fn build_entry(m: &NormalizedMatch, player: &str, buckets: &Buckets<'_>) -> LedgerEntry {
    let info = &m.info;
    LedgerEntry {
        match_id: info.match_id.clone(),
        player_name: player.to_string(),
        team1: info.team1.clone(),
        team2: info.team2.clone(),
        venue: info.venue.clone(),
        city: info.city.clone(),
        date: info.date.clone(),
        format: info.format.clone(),
        tournament: info.tournament.clone(),
        season: info.season.clone(),
        gender: info.gender.clone(),
        batting_stats: batting_stats(&buckets.batting),
        bowling_stats: bowling_stats(&buckets.bowling),
        fielding_stats: fielding_stats(&buckets.fielding),
        match_result: info.result.clone(),
        total_deliveries_involved: buckets.involved,
    }
}

fn batting_stats(deliveries: &[&DeliveryEvent]) -> Option<BattingStats> {
    if deliveries.is_empty() {
        return None;
    }
    let mut stats = BattingStats {
        balls: deliveries.len() as u32,
        ..BattingStats::default()
    };
    for d in deliveries {
        stats.runs += d.runs_batter;
        match d.runs_batter {
            0 => stats.dots += 1,
            4 => stats.fours += 1,
            6 => stats.sixes += 1,
            _ => {}
        }
    }
    stats.strike_rate = batting_strike_rate(stats.runs, stats.balls);
    Some(stats)
}

fn bowling_stats(deliveries: &[&DeliveryEvent]) -> Option<BowlingStats> {
    if deliveries.is_empty() {
        return None;
    }
    let balls_bowled = deliveries.len() as u32;
    let mut runs_conceded = 0;
    let mut wickets = 0u32;
    let mut dots = 0u32;
    for d in deliveries {
        runs_conceded += d.runs_total;
        wickets += d.wickets.len() as u32;
        if d.runs_total == 0 {
            dots += 1;
        }
    }
    Some(BowlingStats {
        runs_conceded,
        balls_bowled,
        wickets,
        dots,
        economy: economy(runs_conceded, balls_bowled),
        overs: overs_string(balls_bowled),
        strike_rate: bowling_strike_rate(balls_bowled, wickets),
    })
}

fn fielding_stats(kinds: &[&str]) -> Option<FieldingStats> {
    if kinds.is_empty() {
        return None;
    }
    let mut stats = FieldingStats {
        total_dismissals: kinds.len() as u32,
        ..FieldingStats::default()
    };
    for kind in kinds {
        match FieldingCredit::classify(kind) {
            FieldingCredit::Catch => stats.catches += 1,
            FieldingCredit::RunOut => stats.run_outs += 1,
            FieldingCredit::Stumping => stats.stumpings += 1,
            FieldingCredit::Other => stats.other_fielding += 1,
            FieldingCredit::Unclassified => {}
        }
    }
    Some(stats)
}
