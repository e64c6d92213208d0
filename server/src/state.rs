use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use leaderboard_shared::{ViewState, etag_for};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

use crate::config::{sse_broadcast_buffer, upstream_connect_timeout, upstream_http_timeout};
use crate::services::refresher::LeaderboardRefresher;
use crate::services::scheduler::RefreshScheduler;
use crate::services::upstream::{HttpAliasClient, HttpScoringClient};

pub type HttpRefresher = LeaderboardRefresher<HttpScoringClient, HttpAliasClient>;

/// View serialized once per publish and shared by every reader via Arc.
#[derive(Debug, Clone)]
pub struct PublishedView {
    pub view: ViewState,
    pub json: Arc<Bytes>,
    pub etag: String,
}

impl PublishedView {
    pub fn new(view: ViewState) -> Self {
        let json = serde_json::to_vec(&view)
            .map(Bytes::from)
            .unwrap_or_else(|e| {
                warn!(cycle = view.cycle, error = %e, "failed to serialize view state");
                Bytes::from_static(br#"{"rows":[],"serverError":true,"cycle":0,"updatedAt":null}"#)
            });
        let etag = etag_for(&json);
        Self {
            view,
            json: Arc::new(json),
            etag,
        }
    }
}

impl Default for PublishedView {
    fn default() -> Self {
        Self::new(ViewState::default())
    }
}

/// Broadcast to SSE subscribers after each publish.
#[derive(Debug, Clone)]
pub struct PreSerializedView {
    pub cycle: u64,
    pub json: Arc<Bytes>,
}

/// Issues monotonically increasing refresh cycle tokens.
#[derive(Debug, Default)]
pub struct CycleTracker {
    issued: AtomicU64,
}

impl CycleTracker {
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    pub fn is_latest(&self, cycle: u64) -> bool {
        self.latest() == cycle
    }
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    refresh_cycles_total: AtomicU64,
    leaderboard_failures_total: AtomicU64,
    enrichment_failures_total: AtomicU64,
    stale_cycles_discarded_total: AtomicU64,
    view_requests_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObservabilitySnapshot {
    pub refresh_cycles_total: u64,
    pub leaderboard_failures_total: u64,
    pub enrichment_failures_total: u64,
    pub stale_cycles_discarded_total: u64,
    pub view_requests_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            refresh_cycles_total: self.refresh_cycles_total.load(Ordering::Relaxed),
            leaderboard_failures_total: self.leaderboard_failures_total.load(Ordering::Relaxed),
            enrichment_failures_total: self.enrichment_failures_total.load(Ordering::Relaxed),
            stale_cycles_discarded_total: self
                .stale_cycles_discarded_total
                .load(Ordering::Relaxed),
            view_requests_total: self.view_requests_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_refresh_cycle(&self) {
        self.refresh_cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leaderboard_failure(&self) {
        self.leaderboard_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrichment_failure(&self) {
        self.enrichment_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_cycle(&self) {
        self.stale_cycles_discarded_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view_request(&self) {
        self.view_requests_total.fetch_add(1, Ordering::Relaxed);
    }
}

/// The single published view plus the bookkeeping needed to replace it safely.
#[derive(Clone)]
pub struct ViewStore {
    pub published: Arc<RwLock<PublishedView>>,
    pub cycles: Arc<CycleTracker>,
    pub event_tx: broadcast::Sender<PreSerializedView>,
    pub observability: Arc<ObservabilityCounters>,
}

impl ViewStore {
    pub fn new(broadcast_buffer: usize) -> Self {
        let (event_tx, _) = broadcast::channel(broadcast_buffer);
        Self {
            published: Arc::new(RwLock::new(PublishedView::default())),
            cycles: Arc::new(CycleTracker::default()),
            event_tx,
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    pub fn begin_cycle(&self) -> u64 {
        self.cycles.begin()
    }

    pub async fn current(&self) -> PublishedView {
        self.published.read().await.clone()
    }

    /// Replaces the published view with `build(previous)` only if `cycle` is
    /// still the latest issued token. The check runs under the write lock so
    /// two finishing cycles cannot interleave.
    pub async fn publish_if_current<F>(&self, cycle: u64, build: F) -> Option<ViewState>
    where
        F: FnOnce(&ViewState) -> ViewState,
    {
        let mut current = self.published.write().await;
        if !self.cycles.is_latest(cycle) {
            self.observability.record_stale_cycle();
            debug!(
                cycle,
                latest = self.cycles.latest(),
                "discarding result of stale refresh cycle"
            );
            return None;
        }

        let next = PublishedView::new(build(&current.view));
        let view = next.view.clone();
        let event = PreSerializedView {
            cycle,
            json: Arc::clone(&next.json),
        };
        *current = next;
        drop(current);

        let _ = self.event_tx.send(event);
        Some(view)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: ViewStore,
    pub refresher: Arc<HttpRefresher>,
    pub scheduler: Arc<RefreshScheduler>,
    pub refresh_interval: Duration,
}

impl AppState {
    pub fn new(
        http_client: reqwest::Client,
        gamification_url: String,
        multiplication_url: String,
        refresh_interval: Duration,
    ) -> Self {
        let store = ViewStore::new(sse_broadcast_buffer());
        let refresher = LeaderboardRefresher::new(
            HttpScoringClient::new(http_client.clone(), gamification_url),
            HttpAliasClient::new(http_client, multiplication_url),
            store.clone(),
        );
        Self {
            store,
            refresher: Arc::new(refresher),
            scheduler: Arc::new(RefreshScheduler::new()),
            refresh_interval,
        }
    }
}

pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    let request_timeout = upstream_http_timeout();
    let connect_timeout = upstream_connect_timeout();
    reqwest::Client::builder()
        .user_agent("leaderboard-board/0.1")
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
        .or_else(|e| {
            warn!(
                error = %e,
                "failed to build configured HTTP client, retrying without custom user-agent"
            );
            reqwest::Client::builder()
                .timeout(request_timeout)
                .connect_timeout(connect_timeout)
                .build()
        })
}
