use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::leaderboard::LeaderboardRow;

/// View-model published after every refresh cycle.
///
/// While `server_error` is set the rows are whatever the last successful
/// fetch produced and must not be rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub rows: Vec<LeaderboardRow>,
    pub server_error: bool,
    #[serde(default)]
    pub cycle: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ViewState {
    /// Result of a successful leaderboard fetch, enriched or not.
    pub fn fresh(rows: Vec<LeaderboardRow>, cycle: u64, now: DateTime<Utc>) -> Self {
        Self {
            rows,
            server_error: false,
            cycle,
            updated_at: Some(now),
        }
    }

    /// Result of a failed leaderboard fetch: previous rows carried over, error raised.
    pub fn failed(previous: &ViewState, cycle: u64, now: DateTime<Utc>) -> Self {
        Self {
            rows: previous.rows.clone(),
            server_error: true,
            cycle,
            updated_at: Some(now),
        }
    }

    pub fn etag(&self) -> String {
        match serde_json::to_vec(self) {
            Ok(json) => etag_for(&json),
            Err(_) => format!("\"view-{}\"", self.cycle),
        }
    }
}

/// Strong ETag over a serialized view payload.
pub fn etag_for(payload: &[u8]) -> String {
    format!("\"view-{:08x}\"", crc32fast::hash(payload))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ViewState, etag_for};
    use crate::leaderboard::LeaderboardRow;

    fn rows() -> Vec<LeaderboardRow> {
        vec![
            LeaderboardRow::new(1, 100, vec!["gold".to_string()]),
            LeaderboardRow::new(2, 50, Vec::new()),
        ]
    }

    #[test]
    fn default_view_is_empty_and_healthy() {
        let view = ViewState::default();
        assert!(view.rows.is_empty());
        assert!(!view.server_error);
        assert_eq!(view.cycle, 0);
        assert!(view.updated_at.is_none());
    }

    #[test]
    fn failed_view_keeps_previous_rows() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let previous = ViewState::fresh(rows(), 4, now);

        let failed = ViewState::failed(&previous, 5, now);

        assert!(failed.server_error);
        assert_eq!(failed.rows, previous.rows);
        assert_eq!(failed.cycle, 5);
    }

    #[test]
    fn fresh_view_clears_error() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let failed = ViewState::failed(&ViewState::default(), 1, now);
        assert!(failed.server_error);

        let fresh = ViewState::fresh(rows(), 2, now);
        assert!(!fresh.server_error);
        assert_eq!(fresh.rows.len(), 2);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let view = ViewState::fresh(rows(), 9, now);
        let json = serde_json::to_value(&view).expect("view should serialize");

        assert_eq!(json["serverError"], serde_json::json!(false));
        assert_eq!(json["cycle"], serde_json::json!(9));
        assert_eq!(json["updatedAt"], serde_json::json!("2026-03-04T05:06:07Z"));
        assert_eq!(json["rows"][0]["userId"], serde_json::json!(1));
    }

    #[test]
    fn etag_tracks_content() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = ViewState::fresh(rows(), 1, now);
        let b = ViewState::fresh(rows(), 2, now);

        assert_eq!(a.etag(), a.clone().etag());
        assert_ne!(a.etag(), b.etag());
        assert!(etag_for(b"{}").starts_with("\"view-"));
    }
}
