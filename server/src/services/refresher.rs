use chrono::Utc;
use leaderboard_shared::{LeaderboardRow, ViewState, distinct_user_ids, merge_aliases};
use tracing::{debug, info, warn};

use crate::services::upstream::{AliasService, ScoringService};
use crate::state::ViewStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh view was published; `enriched` is false when aliases were skipped or failed.
    Published {
        cycle: u64,
        rows: usize,
        enriched: bool,
    },
    /// The scoring service failed and the error flag was raised.
    LeaderboardUnavailable { cycle: u64 },
    /// A newer cycle was issued before this one finished; nothing was applied.
    Stale { cycle: u64 },
}

/// Fetches leaderboard rows, attaches aliases when it can, and publishes the
/// result into the shared [`ViewStore`].
pub struct LeaderboardRefresher<S, A> {
    scoring: S,
    aliases: A,
    store: ViewStore,
}

impl<S, A> LeaderboardRefresher<S, A>
where
    S: ScoringService,
    A: AliasService,
{
    pub fn new(scoring: S, aliases: A, store: ViewStore) -> Self {
        Self {
            scoring,
            aliases,
            store,
        }
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let cycle = self.store.begin_cycle();
        self.store.observability.record_refresh_cycle();

        let rows = match self.scoring.fetch_leaderboard().await {
            Ok(rows) => rows,
            Err(e) => {
                self.store.observability.record_leaderboard_failure();
                warn!(cycle, error = %e, "gamification server error");
                let published = self
                    .store
                    .publish_if_current(cycle, |previous| {
                        ViewState::failed(previous, cycle, Utc::now())
                    })
                    .await;
                return match published {
                    Some(_) => RefreshOutcome::LeaderboardUnavailable { cycle },
                    None => RefreshOutcome::Stale { cycle },
                };
            }
        };

        let (rows, enriched) = if rows.is_empty() {
            (rows, false)
        } else {
            self.enrich(cycle, rows).await
        };
        let row_count = rows.len();

        match self
            .store
            .publish_if_current(cycle, move |_| ViewState::fresh(rows, cycle, Utc::now()))
            .await
        {
            Some(_) => {
                info!(cycle, rows = row_count, enriched, "published leaderboard");
                RefreshOutcome::Published {
                    cycle,
                    rows: row_count,
                    enriched,
                }
            }
            None => RefreshOutcome::Stale { cycle },
        }
    }

    async fn enrich(&self, cycle: u64, rows: Vec<LeaderboardRow>) -> (Vec<LeaderboardRow>, bool) {
        let ids = distinct_user_ids(&rows);
        match self.aliases.fetch_user_aliases(&ids).await {
            Ok(entries) => {
                debug!(cycle, requested = ids.len(), resolved = entries.len(), "resolved aliases");
                (merge_aliases(&rows, &entries), true)
            }
            Err(e) => {
                self.store.observability.record_enrichment_failure();
                warn!(
                    cycle,
                    error = %e,
                    "error mapping user ids; publishing leaderboard without aliases"
                );
                (rows, false)
            }
        }
    }
}
