use std::collections::{HashMap, HashSet};

use crate::leaderboard::{AliasEntry, LeaderboardRow};

/// Distinct user ids in first-seen order.
pub fn distinct_user_ids(rows: &[LeaderboardRow]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter()
        .map(|row| row.user_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Last entry wins when the alias service repeats an id.
pub fn alias_lookup(entries: &[AliasEntry]) -> HashMap<i64, &str> {
    let mut lookup = HashMap::with_capacity(entries.len());
    for entry in entries {
        lookup.insert(entry.id, entry.alias.as_str());
    }
    lookup
}

/// Builds a new row sequence with aliases attached. Rows whose id is not
/// covered by `entries` keep `alias: None`.
pub fn merge_aliases(rows: &[LeaderboardRow], entries: &[AliasEntry]) -> Vec<LeaderboardRow> {
    let lookup = alias_lookup(entries);
    rows.iter()
        .map(|row| row.with_alias(lookup.get(&row.user_id).map(|alias| alias.to_string())))
        .collect()
}
