//! Network collaborators for `creatoraudit-core`.
//!
//! Every provider is configured from the environment (`from_env`) and every request
//! carries an explicit timeout. Nothing here retries; callers decide.

use std::time::Duration;

pub mod brand_safety;
pub mod openai_compat;
pub mod search;
pub mod transcript;
pub mod youtube;

pub use brand_safety::LlmRiskAssessor;
pub use openai_compat::OpenAiCompatClient;
pub use search::{BraveSearchProvider, SerpApiSearchProvider};
pub use transcript::YtDlpTranscripts;
pub use youtube::{parse_channel_input, ChannelRef, YouTubeClient};

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First non-empty value among `keys`, in order.
pub(crate) fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env(k))
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    env(key)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Default per-request timeout, `CREATORAUDIT_TIMEOUT_MS` (clamped to 1s..=120s).
pub fn timeout_ms_from_env() -> u64 {
    env_u64("CREATORAUDIT_TIMEOUT_MS", 20_000).clamp(1_000, 120_000)
}

pub fn http_client() -> creatoraudit_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("creatoraudit/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| creatoraudit_core::Error::NotConfigured(format!("http client: {e}")))
}

/// Which providers have credentials, without exposing any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Configured {
    pub youtube: bool,
    pub serpapi: bool,
    pub brave: bool,
    pub openai: bool,
    pub yt_dlp: bool,
}

pub fn configured_from_env() -> Configured {
    Configured {
        youtube: youtube::youtube_api_key_from_env().is_some(),
        serpapi: search::serpapi_api_key_from_env().is_some(),
        brave: search::brave_api_key_from_env().is_some(),
        openai: openai_compat::openai_api_key_from_env().is_some(),
        yt_dlp: transcript::which("yt-dlp").is_some(),
    }
}
