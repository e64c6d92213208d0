use std::future::Future;

use leaderboard_shared::{AliasEntry, LeaderboardRow};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{BODY_PREVIEW_CHARS, LEADERBOARD_PATH, USERS_PATH};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream status {status}; body preview: {preview}")]
    Status {
        status: reqwest::StatusCode,
        preview: String,
    },
    #[error("failed to decode payload: {message}; body preview: {preview}")]
    Decode { message: String, preview: String },
}

/// Source of leaderboard rows (the gamification service).
pub trait ScoringService: Send + Sync {
    fn fetch_leaderboard(
        &self,
    ) -> impl Future<Output = Result<Vec<LeaderboardRow>, UpstreamError>> + Send;
}

/// Source of user display names (the multiplication service).
pub trait AliasService: Send + Sync {
    fn fetch_user_aliases(
        &self,
        ids: &[i64],
    ) -> impl Future<Output = Result<Vec<AliasEntry>, UpstreamError>> + Send;
}

#[derive(Clone)]
pub struct HttpScoringClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScoringClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn leaderboard_url(&self) -> String {
        format!("{}{LEADERBOARD_PATH}", self.base_url)
    }
}

impl ScoringService for HttpScoringClient {
    async fn fetch_leaderboard(&self) -> Result<Vec<LeaderboardRow>, UpstreamError> {
        get_json(&self.client, &self.leaderboard_url()).await
    }
}

#[derive(Clone)]
pub struct HttpAliasClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAliasClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn users_url(&self, ids: &[i64]) -> String {
        let id_list = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}{USERS_PATH}/{id_list}", self.base_url)
    }
}

impl AliasService for HttpAliasClient {
    async fn fetch_user_aliases(&self, ids: &[i64]) -> Result<Vec<AliasEntry>, UpstreamError> {
        get_json(&self.client, &self.users_url(ids)).await
    }
}

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, UpstreamError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        return Err(UpstreamError::Status {
            status,
            preview: body_preview(&bytes),
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode {
        message: e.to_string(),
        preview: body_preview(&bytes),
    })
}

fn body_preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(BODY_PREVIEW_CHARS)
        .collect()
}
