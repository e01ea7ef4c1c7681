use std::collections::{HashMap, HashSet};

use crate::config::Roster;

/// Similarity above which a name is accepted as a roster player during
/// fuzzy resolution.
const FUZZY_SIMILARITY_THRESHOLD: f64 = 0.9;
/// Shared lower-cased name tokens needed for a token match.
const FUZZY_MIN_SHARED_TOKENS: usize = 2;

/// Decoration scorecards glue onto names. The mangled dagger comes from
/// UTF-8 decoded as cp1252 upstream.
const NAME_MARKERS: &[&str] = &["(c)", "(wk)", "\u{e2}\u{20ac}\u{a0}", "\u{2020}", "*"];

/// Strip scorecard decoration (captain/keeper suffixes, dagger glyphs,
/// asterisks) and surrounding whitespace.
pub fn normalize_player_name(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    for marker in NAME_MARKERS {
        if name.contains(*marker) {
            name = name.replace(*marker, "");
        }
    }
    name.trim().to_string()
}

/// The two team names of one match. Fuzzy resolution is only allowed when
/// the tracked team is one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchTeams(HashSet<String>);

impl MatchTeams {
    pub fn new<I, S>(teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(teams.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, team: &str) -> bool {
        self.0.contains(team)
    }
}

#[derive(Debug, Clone)]
struct FuzzyKey {
    chars: Vec<char>,
    tokens: HashSet<String>,
}

/// Maps raw scorecard names onto canonical roster identities.
///
/// Two stages: an exact/alias lookup table, then a fuzzy fallback gated on
/// having match context that includes the tracked team.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    roster: Roster,
    lookup: HashMap<String, usize>,
    fuzzy: Vec<FuzzyKey>,
}

impl IdentityResolver {
    pub fn new(roster: Roster) -> Self {
        let mut lookup = HashMap::new();
        let mut fuzzy = Vec::with_capacity(roster.players.len());
        for (idx, player) in roster.players.iter().enumerate() {
            lookup.insert(player.name.clone(), idx);
            for alias in &player.aliases {
                lookup.entry(alias.clone()).or_insert(idx);
            }
            let lowered = player.name.to_lowercase();
            let tokens = lowered.split_whitespace().map(str::to_string).collect();
            fuzzy.push(FuzzyKey {
                chars: lowered.chars().collect(),
                tokens,
            });
        }
        Self {
            roster,
            lookup,
            fuzzy,
        }
    }

    /// Canonical roster name for `raw`, or the normalized input unchanged
    /// when nothing matches.
    pub fn resolve(&self, raw: &str, teams_in_match: Option<&MatchTeams>) -> String {
        let normalized = normalize_player_name(raw);
        if normalized.is_empty() {
            return normalized;
        }
        if let Some(idx) = self.exact(&normalized) {
            return self.roster.players[idx].name.clone();
        }
        if self.fuzzy_enabled(teams_in_match)
            && let Some(idx) = self.fuzzy_match(&normalized)
        {
            return self.roster.players[idx].name.clone();
        }
        normalized
    }

    /// Exact/alias membership only. Decides whether a name may admit a
    /// player into a match at all.
    pub fn is_member(&self, raw: &str) -> bool {
        let normalized = normalize_player_name(raw);
        !normalized.is_empty() && self.exact(&normalized).is_some()
    }

    fn exact(&self, normalized: &str) -> Option<usize> {
        self.lookup.get(normalized).copied()
    }

    fn fuzzy_enabled(&self, teams_in_match: Option<&MatchTeams>) -> bool {
        teams_in_match.is_some_and(|teams| teams.contains(&self.roster.team))
    }

    fn fuzzy_match(&self, normalized: &str) -> Option<usize> {
        let lowered = normalized.to_lowercase();
        let tokens: HashSet<&str> = lowered.split_whitespace().collect();
        let chars: Vec<char> = lowered.chars().collect();
        for (idx, key) in self.fuzzy.iter().enumerate() {
            let shared = key
                .tokens
                .iter()
                .filter(|t| tokens.contains(t.as_str()))
                .count();
            if shared >= FUZZY_MIN_SHARED_TOKENS {
                return Some(idx);
            }
            if similarity(&chars, &key.chars) > FUZZY_SIMILARITY_THRESHOLD {
                return Some(idx);
            }
        }
        None
    }
}


/// Matching-block similarity: `2 * M / (len(a) + len(b))`, where `M` counts
/// characters covered by the longest common block and, recursively, the
/// blocks found either side of it.
fn similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(a, b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, size) = longest_block(a, b);
    if size == 0 {
        return 0;
    }
    size + matched_chars(&a[..i], &b[..j]) + matched_chars(&a[i + size..], &b[j + size..])
}

/// Longest common contiguous block as `(start_a, start_b, len)`. Ties go to
/// the block that starts earliest in `a`, then in `b`.
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                row[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = row;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RosterPlayer, default_roster};

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(default_roster().clone())
    }

    fn mi_match() -> MatchTeams {
        MatchTeams::new(["Mumbai Indians", "Chennai Super Kings"])
    }

    #[test]
    fn strips_decoration() {
        assert_eq!(normalize_player_name("  Rohit Sharma (c) "), "Rohit Sharma");
        assert_eq!(normalize_player_name("Ryan Rickelton (wk)"), "Ryan Rickelton");
        assert_eq!(normalize_player_name("Tilak Varma*"), "Tilak Varma");
        assert_eq!(normalize_player_name("Naman Dhir\u{2020}"), "Naman Dhir");
        assert_eq!(normalize_player_name(""), "");
    }

    #[test]
    fn aliases_resolve_with_or_without_context() {
        let r = resolver();
        for player in &default_roster().players {
            for alias in &player.aliases {
                assert_eq!(r.resolve(alias, None), player.name);
                assert_eq!(r.resolve(alias, Some(&mi_match())), player.name);
                assert!(r.is_member(alias), "{alias} should be a member");
            }
        }
    }

    #[test]
    fn alias_lookup_is_case_sensitive() {
        let r = resolver();
        assert!(!r.is_member("rg sharma"));
        assert_eq!(r.resolve("rg sharma", None), "rg sharma");
    }

    #[test]
    fn unknown_names_pass_through_without_context() {
        let r = resolver();
        assert_eq!(r.resolve("V Kohli", None), "V Kohli");
        assert_eq!(r.resolve(" MS Dhoni (c)", None), "MS Dhoni");
        assert!(!r.is_member("V Kohli"));
    }

    #[test]
    fn fuzzy_requires_tracked_team_in_context() {
        let r = resolver();
        // one letter off "Hardik Pandya"
        assert_eq!(r.resolve("Hardik Pandyaa", None), "Hardik Pandyaa");
        let other = MatchTeams::new(["Gujarat Titans", "Delhi Capitals"]);
        assert_eq!(r.resolve("Hardik Pandyaa", Some(&other)), "Hardik Pandyaa");
        assert_eq!(r.resolve("Hardik Pandyaa", Some(&mi_match())), "Hardik Pandya");
        assert!(!r.is_member("Hardik Pandyaa"));
    }

    #[test]
    fn token_overlap_of_two_resolves() {
        let r = resolver();
        assert_eq!(
            r.resolve("Raj Angad Singh Bawa", Some(&mi_match())),
            "Raj Angad Bawa"
        );
        assert_eq!(r.resolve("Raj Angad Singh Bawa", None), "Raj Angad Singh Bawa");
    }

    #[test]
    fn first_declared_identity_wins() {
        let roster = Roster {
            team: "Mumbai Indians".to_string(),
            players: vec![
                RosterPlayer {
                    name: "Alpha Beta Gamma".to_string(),
                    aliases: vec![],
                },
                RosterPlayer {
                    name: "Alpha Beta Delta".to_string(),
                    aliases: vec![],
                },
            ],
        };
        let r = IdentityResolver::new(roster);
        assert_eq!(
            r.resolve("Alpha Beta Epsilon", Some(&mi_match())),
            "Alpha Beta Gamma"
        );
    }

    #[test]
    fn near_miss_spelling_resolves_in_tracked_match() {
        let r = resolver();
        assert_eq!(r.resolve("Will Jack", Some(&mi_match())), "Will Jacks");
        assert_eq!(r.resolve("Will Jack", None), "Will Jack");
    }

    #[test]
    fn similarity_counts_matching_blocks() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        let score = similarity(&chars("will jack"), &chars("will jacks"));
        assert!((score - 18.0 / 19.0).abs() < 1e-9);
        assert_eq!(similarity(&chars("abcd"), &chars("bcda")), 0.75);
        assert_eq!(similarity(&chars("abc"), &chars("xyz")), 0.0);
        assert_eq!(similarity(&[], &[]), 1.0);
    }

    #[test]
    fn same_input_same_output() {
        let r = resolver();
        let ctx = mi_match();
        let first = r.resolve("Jaspreet Bumrah", Some(&ctx));
        for _ in 0..5 {
            assert_eq!(r.resolve("Jaspreet Bumrah", Some(&ctx)), first);
        }
    }
}
