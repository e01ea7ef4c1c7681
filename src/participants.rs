use std::collections::BTreeSet;

use crate::identity::IdentityResolver;
use crate::normalize::NormalizedMatch;

/// Overs sampled per innings when no lineup names a roster player.
pub const SCAN_OVERS: usize = 5;
/// Deliveries sampled per sampled over, counted by source position so
/// malformed slots still use up the budget.
pub const SCAN_DELIVERIES: usize = 6;

/// Roster players taking part in `m`, by canonical name.
///
/// Declared lineups are tried first. Only when they yield nobody is a
/// bounded prefix of each innings scanned, stopping at the first hit. Both
/// phases admit a name only through the strict membership test, so fuzzy
/// near-misses never fabricate participation.
pub fn find_participants(resolver: &IdentityResolver, m: &NormalizedMatch) -> BTreeSet<String> {
    let teams = m.info.teams();
    let mut found = BTreeSet::new();

    for (_, names) in &m.info.lineups {
        for name in names {
            if resolver.is_member(name) {
                found.insert(resolver.resolve(name, Some(&teams)));
            }
        }
    }
    if !found.is_empty() {
        return found;
    }

    'scan: for innings in &m.innings {
        for over in innings.overs.iter().take(SCAN_OVERS) {
            let sampled = over
                .deliveries
                .iter()
                .take_while(|d| d.ball <= SCAN_DELIVERIES);
            for delivery in sampled {
                for slot in [&delivery.batter, &delivery.bowler].into_iter().flatten() {
                    if resolver.is_member(slot) {
                        found.insert(resolver.resolve(slot, Some(&teams)));
                    }
                }
                if !found.is_empty() {
                    break 'scan;
                }
            }
        }
    }
    found
}
