use creatoraudit_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    q.timeout_ms
        .unwrap_or_else(crate::timeout_ms_from_env)
        .clamp(1_000, 60_000)
}

pub fn serpapi_api_key_from_env() -> Option<String> {
    crate::env_any(&["CREATORAUDIT_SERPAPI_API_KEY", "SERPAPI_API_KEY"])
}

pub fn brave_api_key_from_env() -> Option<String> {
    crate::env_any(&["CREATORAUDIT_BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"])
}

#[derive(Debug, Clone)]
pub struct SerpApiSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerpApiSearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serpapi_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing CREATORAUDIT_SERPAPI_API_KEY (or SERPAPI_API_KEY)".to_string(),
            )
        })?;
        let endpoint = crate::env("CREATORAUDIT_SERPAPI_ENDPOINT")
            .unwrap_or_else(|| "https://serpapi.com/search.json".to_string());
        Ok(Self::new(client, api_key, endpoint))
    }
}

impl BraveSearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing CREATORAUDIT_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        // Docs: https://api.search.brave.com/res/v1/web/search
        let endpoint = crate::env("CREATORAUDIT_BRAVE_ENDPOINT")
            .unwrap_or_else(|| "https://api.search.brave.com/res/v1/web/search".to_string());
        Ok(Self::new(client, api_key, endpoint))
    }
}

/// Pick a provider by name, or the first one with credentials when `name` is `None`.
pub fn provider_from_env(
    client: reqwest::Client,
    name: Option<&str>,
) -> Result<Box<dyn SearchProvider>> {
    match name.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("serpapi") => Ok(Box::new(SerpApiSearchProvider::from_env(client)?)),
        Some("brave") => Ok(Box::new(BraveSearchProvider::from_env(client)?)),
        Some(other) => Err(Error::NotConfigured(format!(
            "unknown search provider {other:?} (expected serpapi or brave)"
        ))),
        None if serpapi_api_key_from_env().is_some() => {
            Ok(Box::new(SerpApiSearchProvider::from_env(client)?))
        }
        None if brave_api_key_from_env().is_some() => {
            Ok(Box::new(BraveSearchProvider::from_env(client)?))
        }
        None => Err(Error::NotConfigured(
            "no search provider configured (set SERPAPI_API_KEY or BRAVE_SEARCH_API_KEY)"
                .to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiOrganic>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpApiOrganic {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerpApiSearchProvider {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let mut req = self.client.get(&self.endpoint).query(&[
            ("engine", "google"),
            ("q", q.query.as_str()),
            ("api_key", self.api_key.as_str()),
        ]);
        if let Some(n) = q.max_results {
            req = req.query(&[("num", n.to_string())]);
        }
        if let Some(lang) = q.language.as_deref() {
            req = req.query(&[("hl", lang)]);
        }
        if let Some(country) = q.country.as_deref() {
            req = req.query(&[("gl", country)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.without_url().to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serpapi search HTTP {status}")));
        }
        let parsed: SerpApiResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.without_url().to_string()))?;
        // SerpApi reports "no results" as an error string with HTTP 200.
        if let Some(err) = parsed.error.filter(|_| parsed.organic_results.is_empty()) {
            if !err.to_ascii_lowercase().contains("hasn't returned any results") {
                return Err(Error::Search(format!("serpapi: {err}")));
            }
        }

        let mut results: Vec<SearchResult> = parsed
            .organic_results
            .into_iter()
            .filter_map(|r| {
                Some(SearchResult {
                    url: r.link.filter(|l| !l.is_empty())?,
                    title: r.title,
                    snippet: r.snippet,
                    source: "serpapi".to_string(),
                })
            })
            .collect();
        if let Some(n) = q.max_results {
            results.truncate(n);
        }

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        tracing::debug!(provider = "serpapi", results = results.len(), "search done");

        Ok(SearchResponse {
            results,
            provider: "serpapi".to_string(),
            timings_ms,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let mut req = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", q.query.as_str())]);
        if let Some(n) = q.max_results {
            // Brave uses `count` for result count.
            req = req.query(&[("count", n.to_string())]);
        }
        if let Some(lang) = q.language.as_deref() {
            req = req.query(&[("search_lang", lang)]);
        }
        if let Some(country) = q.country.as_deref() {
            req = req.query(&[("country", country)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("brave search HTTP {status}")));
        }

        let parsed: BraveWebSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results: Vec<SearchResult> = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.description,
                source: "brave".to_string(),
            })
            .collect();

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        tracing::debug!(provider = "brave", results = results.len(), "search done");

        Ok(SearchResponse {
            results,
            provider: "brave".to_string(),
            timings_ms,
        })
    }
}
