//! Backend-agnostic core of `creatoraudit`.
//!
//! Everything in this crate is a pure function of its inputs except the collaborator
//! traits at the bottom, which the caller implements (see `creatoraudit-local`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod aggregate;
pub mod audit;
pub mod classify;
pub mod display;
pub mod pricing;
pub mod risk;
pub mod video;

pub use aggregate::{
    average_views, compute_engagement, engagement_rate, summarize, summarize_batch, time_series,
    top_n, ChannelSummary, SeriesPoint, TimeSeries,
};
pub use audit::{
    analyze, analyze_batch, Analysis, AnalysisOptions, AuditReport, AuditRequest, Auditor,
    BrandSafetyOutcome, FailureStage,
};
pub use classify::{
    classify, matching_categories, Classification, MatchPolicy, TopicCategory, TopicCount,
    TopicTaxonomy,
};
pub use pricing::{recommended_price, PriceQuote, Scenario};
pub use risk::{parse_assessment, HeartTrait, HeartValue, RiskAssessment, RiskBand, Verdict};
pub use video::{
    parse_timestamp, validate, validate_batch, validate_indexed, RawCount, RawVideo,
    ValidatedBatch, ValidationError, ValidationIssue, VideoRecord,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("assessment failed: {0}")]
    Assessment(String),
    #[error("display parse failed: {0}")]
    Display(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl Error {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidScenario(_) => "invalid_scenario",
            Error::InvalidTaxonomy(_) => "invalid_taxonomy",
            Error::InvalidUrl(_) => "invalid_url",
            Error::NotFound(_) => "not_found",
            Error::Fetch(_) => "fetch_error",
            Error::Search(_) => "search_error",
            Error::Llm(_) => "llm_error",
            Error::Assessment(_) => "assessment_error",
            Error::Display(_) => "display_error",
            Error::NotConfigured(_) => "not_configured",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Channel-level metadata shown next to the metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelMeta {
    pub id: String,
    pub title: String,
    /// Custom URL / handle when the platform reports one, else empty.
    pub handle: String,
    pub country: String,
    pub subscribers: u64,
    pub video_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl ChannelMeta {
    pub fn channel_url(&self) -> String {
        format!("https://www.youtube.com/channel/{}", self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            language: None,
            country: None,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

/// Turns whatever the user pasted into a channel id, and loads channel metadata.
#[async_trait::async_trait]
pub trait ChannelResolver: Send + Sync {
    async fn resolve(&self, url_or_handle: &str) -> Result<String>;
    async fn channel_meta(&self, channel_id: &str) -> Result<ChannelMeta>;
}

#[async_trait::async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Most recent uploads first. Fails with [`Error::Fetch`].
    async fn fetch_recent(&self, channel_id: &str, max_results: usize) -> Result<Vec<RawVideo>>;
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

#[async_trait::async_trait]
pub trait RiskAssessor: Send + Sync {
    /// Fails with [`Error::Assessment`] when the upstream answer is empty or malformed.
    async fn assess(&self, context: &str) -> Result<RiskAssessment>;
}

#[async_trait::async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn transcript(&self, video_id: &str) -> Result<String>;
}
