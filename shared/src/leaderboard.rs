use serde::{Deserialize, Serialize};

/// One participant's score and badge record as served by the scoring service.
///
/// `alias` is never sent by the scoring service; it is filled in by the
/// enrichment step and omitted from JSON while unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub user_id: i64,
    pub total_score: i64,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl LeaderboardRow {
    pub fn new(user_id: i64, total_score: i64, badges: Vec<String>) -> Self {
        Self {
            user_id,
            total_score,
            badges,
            alias: None,
        }
    }

    /// Copy of this row with `alias` replaced.
    pub fn with_alias(&self, alias: Option<String>) -> Self {
        Self {
            alias,
            ..self.clone()
        }
    }

    /// Alias when resolved, otherwise the raw user id.
    pub fn display_name(&self) -> String {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => self.user_id.to_string(),
        }
    }
}

/// User id to display name pair returned by the alias service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub id: i64,
    pub alias: String,
}
