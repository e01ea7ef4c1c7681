use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use crate::dedup::match_identity;
use crate::document::Node;
use crate::error::{LedgerError, LedgerResult};
use crate::identity::MatchTeams;
use crate::ledger::UNKNOWN;

const DEFAULT_TEAM1: &str = "Team1";
const DEFAULT_TEAM2: &str = "Team2";
const DEFAULT_GENDER: &str = "male";
const DEFAULT_DISMISSAL: &str = "unknown";

/// Match-level metadata with every default already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchInfo {
    pub match_id: String,
    pub team1: String,
    pub team2: String,
    pub venue: String,
    pub city: String,
    pub date: String,
    pub format: String,
    pub tournament: String,
    pub season: String,
    pub gender: String,
    pub result: String,
    /// Declared lineups, team name to listed player names.
    pub lineups: Vec<(String, Vec<String>)>,
}

impl MatchInfo {
    pub fn teams(&self) -> MatchTeams {
        MatchTeams::new([self.team1.as_str(), self.team2.as_str()])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WicketEvent {
    pub kind: String,
    pub player_out: Option<String>,
    pub fielders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryEvent {
    pub over: i64,
    /// 1-based position within the over's source array.
    pub ball: usize,
    pub batter: Option<String>,
    pub bowler: Option<String>,
    pub non_striker: Option<String>,
    pub runs_batter: i64,
    pub runs_total: i64,
    pub wickets: Vec<WicketEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverEvents {
    pub number: i64,
    pub deliveries: Vec<DeliveryEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InningsEvents {
    pub team: String,
    /// One slot per source over, malformed overs kept as empty slots so
    /// positional sampling lines up with the source.
    pub overs: Vec<OverEvents>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMatch {
    pub info: MatchInfo,
    pub innings: Vec<InningsEvents>,
    /// `innings` was present and non-empty but not a list. Such a match
    /// yields no ledger entries.
    pub innings_malformed: bool,
}

impl NormalizedMatch {
    /// Every delivery in source order.
    pub fn deliveries(&self) -> impl Iterator<Item = &DeliveryEvent> {
        self.innings
            .iter()
            .flat_map(|inn| inn.overs.iter())
            .flat_map(|over| over.deliveries.iter())
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries().count()
    }

    /// No innings data: only metadata survives.
    pub fn is_metadata_only(&self) -> bool {
        self.innings.is_empty() && !self.innings_malformed
    }
}

/// Flattens raw match documents and remembers which match identities this
/// run has already produced.
///
/// The seen-set is behind a mutex so documents can be normalized from
/// several threads without admitting the same match twice.
#[derive(Debug, Default)]
pub struct MatchNormalizer {
    seen: Mutex<HashSet<String>>,
}

impl MatchNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or_default()
    }

    /// `Ok(None)` when the match identity was already produced in this run.
    /// Only a document that is not a JSON object at all is an error.
    pub fn normalize(&self, index: usize, raw: &Value) -> LedgerResult<Option<NormalizedMatch>> {
        let doc = Node::new(raw);
        if !doc.is_object() {
            return Err(LedgerError::MalformedInput {
                index,
                reason: "document is not a JSON object".to_string(),
            });
        }

        let info = parse_info(doc.get("info"));
        if !self.first_sighting(&info.match_id) {
            debug!(match_id = %info.match_id, "skipping duplicate match document");
            return Ok(None);
        }

        let raw_innings = doc.get("innings");
        let innings_malformed = raw_innings.is_truthy() && !raw_innings.is_array();
        if innings_malformed {
            debug!(match_id = %info.match_id, "innings is not a list");
        }
        let innings = raw_innings.items().map(parse_innings).collect();
        Ok(Some(NormalizedMatch {
            info,
            innings,
            innings_malformed,
        }))
    }

    fn first_sighting(&self, match_id: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(match_id.to_string())
    }
}

fn parse_info(info: Node<'_>) -> MatchInfo {
    let date = info.get("dates").at(0).text_or(UNKNOWN);
    let team1 = info.get("teams").at(0).text_or(DEFAULT_TEAM1);
    let team2 = info.get("teams").at(1).text_or(DEFAULT_TEAM2);
    let venue = info.get("venue").text_or(UNKNOWN);
    let match_id = match_identity(&date, &team1, &team2, &venue);

    let lineups = info
        .get("players")
        .entries()
        .map(|(team, names)| {
            let listed = names
                .items()
                .filter_map(|n| n.as_str())
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            (team.to_string(), listed)
        })
        .collect();

    MatchInfo {
        match_id,
        team1,
        team2,
        venue,
        city: info.get("city").text_or(UNKNOWN),
        date,
        format: info.get("match_type").text_or(UNKNOWN),
        tournament: info.get("event").get("name").text_or(UNKNOWN),
        season: info.get("season").text_or(UNKNOWN),
        gender: info.get("gender").text_or(DEFAULT_GENDER),
        result: info.get("outcome").get("winner").text_or(UNKNOWN),
        lineups,
    }
}

fn parse_innings(inning: Node<'_>) -> InningsEvents {
    let overs = inning
        .get("overs")
        .items()
        .enumerate()
        .map(|(idx, over)| parse_over(idx, over))
        .collect();
    InningsEvents {
        team: inning.get("team").text_or(UNKNOWN),
        overs,
    }
}

fn parse_over(idx: usize, over: Node<'_>) -> OverEvents {
    let number = over.get("over").as_i64().unwrap_or(idx as i64);
    let deliveries = over
        .get("deliveries")
        .items()
        .enumerate()
        .filter(|(_, d)| d.is_object())
        .map(|(pos, d)| parse_delivery(number, pos + 1, d))
        .collect();
    OverEvents { number, deliveries }
}

fn parse_delivery(over: i64, ball: usize, delivery: Node<'_>) -> DeliveryEvent {
    let runs = delivery.get("runs");
    let wickets = delivery
        .get("wickets")
        .items()
        .filter(|w| w.is_object())
        .map(parse_wicket)
        .collect();
    DeliveryEvent {
        over,
        ball,
        batter: delivery.get("batter").name(),
        bowler: delivery.get("bowler").name(),
        non_striker: delivery.get("non_striker").name(),
        runs_batter: runs.get("batter").i64_or(0),
        runs_total: runs.get("total").i64_or(0),
        wickets,
    }
}

fn parse_wicket(wicket: Node<'_>) -> WicketEvent {
    let fielders = wicket
        .get("fielders")
        .items()
        .filter_map(|f| f.get("name").name())
        .collect();
    WicketEvent {
        kind: wicket.get("kind").text_or(DEFAULT_DISMISSAL),
        player_out: wicket.get("player_out").name(),
        fielders,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_for_bare_document() {
        let normalizer = MatchNormalizer::new();
        let m = normalizer
            .normalize(0, &json!({}))
            .unwrap()
            .expect("first sighting");
        assert_eq!(m.info.match_id, "Unknown_Team1_Team2_Unknown");
        assert_eq!(m.info.city, "Unknown");
        assert_eq!(m.info.gender, "male");
        assert_eq!(m.info.tournament, "Unknown");
        assert_eq!(m.info.result, "Unknown");
        assert!(m.is_metadata_only());
        assert_eq!(m.delivery_count(), 0);
    }

    #[test]
    fn non_object_is_malformed() {
        let normalizer = MatchNormalizer::new();
        let err = normalizer.normalize(7, &json!([1, 2])).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedInput { index: 7, .. }));
    }

    #[test]
    fn empty_innings_is_metadata_only_but_non_list_is_malformed() {
        let normalizer = MatchNormalizer::new();
        let info = |day: &str| json!({"dates": [day], "teams": ["A", "B"], "venue": "V"});
        let cases = [
            ("2025-04-01", json!([])),
            ("2025-04-02", json!(null)),
            ("2025-04-03", json!({})),
        ];
        for (day, innings) in cases {
            let m = normalizer
                .normalize(0, &json!({"info": info(day), "innings": innings.clone()}))
                .unwrap()
                .unwrap();
            assert!(m.is_metadata_only(), "{innings}");
            assert!(!m.innings_malformed);
        }
        let m = normalizer
            .normalize(1, &json!({"info": info("2025-04-04"), "innings": {"broken": true}}))
            .unwrap()
            .unwrap();
        assert!(m.innings_malformed);
        assert!(!m.is_metadata_only());
        assert_eq!(m.delivery_count(), 0);
    }

    #[test]
    fn repeated_identity_is_skipped() {
        let doc = json!({"info": {"dates": ["2025-04-01"], "teams": ["A", "B"], "venue": "V"}});
        let normalizer = MatchNormalizer::new();
        assert!(normalizer.normalize(0, &doc).unwrap().is_some());
        assert!(normalizer.normalize(1, &doc).unwrap().is_none());
        assert_eq!(normalizer.seen_count(), 1);
    }

    #[test]
    fn flattens_in_source_order_with_positions() {
        let doc = json!({
            "info": {"dates": ["2025-04-01"], "teams": ["A", "B"], "season": 2025},
            "innings": [{
                "team": "A",
                "overs": [
                    {"over": 0, "deliveries": [
                        {"batter": "X", "bowler": "Y", "runs": {"batter": 1, "total": 1}},
                        "garbage",
                        {"batter": "Z", "bowler": "Y", "runs": {"batter": 0, "total": 1},
                         "wickets": [{"kind": "caught", "player_out": "Z", "fielders": [{"name": "F"}, {}]}]}
                    ]},
                    {"deliveries": [{"batter": "X", "bowler": "W"}]},
                    "not an over"
                ]
            }]
        });
        let m = MatchNormalizer::new().normalize(0, &doc).unwrap().unwrap();
        assert_eq!(m.info.season, "2025");
        let balls: Vec<_> = m.deliveries().map(|d| (d.over, d.ball)).collect();
        assert_eq!(balls, vec![(0, 1), (0, 3), (1, 1)]);
        assert_eq!(m.innings[0].overs.len(), 3);
        let wicket = &m.deliveries().nth(1).unwrap().wickets[0];
        assert_eq!(wicket.fielders, vec!["F".to_string()]);
        let last = m.deliveries().last().unwrap();
        assert_eq!(last.runs_batter, 0);
        assert_eq!(last.runs_total, 0);
    }
}
