use std::time::Duration;

pub const DEFAULT_GAMIFICATION_URL: &str = "http://localhost:8081";
pub const DEFAULT_MULTIPLICATION_URL: &str = "http://localhost:8080";

pub const LEADERBOARD_PATH: &str = "/leaders";
pub const USERS_PATH: &str = "/users";

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_BROADCAST_BUFFER: usize = 64;
pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const BODY_PREVIEW_CHARS: usize = 200;

pub fn gamification_url() -> String {
    base_url_from_env("GAMIFICATION_URL", DEFAULT_GAMIFICATION_URL)
}

pub fn multiplication_url() -> String {
    base_url_from_env("MULTIPLICATION_URL", DEFAULT_MULTIPLICATION_URL)
}

pub fn refresh_interval() -> Duration {
    std::env::var("REFRESH_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS))
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

pub fn sse_broadcast_buffer() -> usize {
    std::env::var("SSE_BROADCAST_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

fn base_url_from_env(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}
