//! YouTube Data API v3 client: channel resolution, channel metadata and recent uploads.
//!
//! Counts are forwarded as the API returns them (decimal strings) so that
//! `creatoraudit_core::validate` decides what is usable.

use creatoraudit_core::{ChannelMeta, ChannelResolver, Error, RawCount, RawVideo, Result, VideoFetcher};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3";
/// API page size and `videos?id=` batch limit.
const PAGE_MAX: usize = 50;

pub fn youtube_api_key_from_env() -> Option<String> {
    crate::env_any(&["CREATORAUDIT_YOUTUBE_API_KEY", "YOUTUBE_API_KEY"])
}

fn youtube_endpoint_from_env() -> Option<String> {
    crate::env("CREATORAUDIT_YOUTUBE_ENDPOINT")
}

pub fn is_youtube_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "youtube.com" || h == "youtu.be" || h.ends_with(".youtube.com")
}

/// Video id from watch, short-link, shorts and embed URLs.
pub fn youtube_video_id(u: &url::Url) -> Option<String> {
    let host = u.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }
    if host.eq_ignore_ascii_case("youtu.be") {
        let seg = u.path_segments()?.next()?.trim();
        return (!seg.is_empty()).then(|| seg.to_string());
    }
    if u.path().starts_with("/watch") {
        return u
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }
    let mut segs = u.path_segments()?;
    let a = segs.next().unwrap_or("");
    let b = segs.next().unwrap_or("").trim();
    ((a == "shorts" || a == "embed" || a == "live") && !b.is_empty()).then(|| b.to_string())
}

fn looks_like_channel_id(s: &str) -> bool {
    s.len() == 24
        && s.starts_with("UC")
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// What the user pasted, classified before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    /// Always carries the leading `@`.
    Handle(String),
    Username(String),
    /// Free text or a legacy `/c/<name>` custom URL; resolved via channel search.
    Query(String),
    /// A video URL; resolved via the video's owning channel.
    Video(String),
}

pub fn parse_channel_input(input: &str) -> Result<ChannelRef> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::InvalidUrl("empty channel reference".to_string()));
    }
    if let Some(h) = s.strip_prefix('@') {
        if h.is_empty() || h.contains('/') {
            return Err(Error::InvalidUrl(format!("bad handle: {s}")));
        }
        return Ok(ChannelRef::Handle(s.to_string()));
    }
    if looks_like_channel_id(s) {
        return Ok(ChannelRef::Id(s.to_string()));
    }

    let lower = s.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(s.to_string())
    } else if lower.starts_with("youtube.com/")
        || lower.starts_with("www.youtube.com/")
        || lower.starts_with("m.youtube.com/")
        || lower.starts_with("youtu.be/")
    {
        Some(format!("https://{s}"))
    } else {
        None
    };
    let Some(candidate) = candidate else {
        return Ok(ChannelRef::Query(s.to_string()));
    };

    let u = url::Url::parse(&candidate).map_err(|e| Error::InvalidUrl(format!("{s}: {e}")))?;
    let host = u.host_str().unwrap_or("");
    if !is_youtube_host(host) {
        return Err(Error::InvalidUrl(format!("not a YouTube URL: {s}")));
    }
    if let Some(id) = youtube_video_id(&u) {
        return Ok(ChannelRef::Video(id));
    }

    // `Url` keeps segments percent-encoded; the API wants the decoded name.
    let segs = u
        .path_segments()
        .map(|it| {
            it.filter(|p| !p.is_empty())
                .map(|p| {
                    percent_encoding::percent_decode_str(p)
                        .decode_utf8()
                        .map(|d| d.into_owned())
                        .map_err(|e| Error::InvalidUrl(format!("{s}: {e}")))
                })
                .collect::<Result<Vec<String>>>()
        })
        .transpose()?
        .unwrap_or_default();
    let segs: Vec<&str> = segs.iter().map(String::as_str).collect();
    match segs.as_slice() {
        [first, ..] if first.starts_with('@') && first.len() > 1 => {
            Ok(ChannelRef::Handle((*first).to_string()))
        }
        ["channel", id, ..] => Ok(ChannelRef::Id((*id).to_string())),
        ["user", name, ..] => Ok(ChannelRef::Username((*name).to_string())),
        ["c", name, ..] => Ok(ChannelRef::Query((*name).to_string())),
        _ => Err(Error::InvalidUrl(format!("unsupported YouTube URL: {s}"))),
    }
}

#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl YouTubeClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(crate::timeout_ms_from_env()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = youtube_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing CREATORAUDIT_YOUTUBE_API_KEY (or YOUTUBE_API_KEY)".to_string(),
            )
        })?;
        let base_url = youtube_endpoint_from_env().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(Self::new(client, api_key, base_url))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        tracing::debug!(resource, "youtube api request");
        let resp = self
            .client
            .get(format!("{}/{resource}", self.base_url))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("youtube {resource}: {}", e.without_url())))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("youtube {resource}: HTTP {status}")));
        }
        if !status.is_success() {
            let reason = resp
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.errors.into_iter().next())
                .and_then(|e| e.reason)
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            return Err(Error::Fetch(format!("youtube {resource}: HTTP {status}{reason}")));
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::Fetch(format!("youtube {resource}: {}", e.without_url())))
    }

    async fn channel_id_by(&self, param: &str, value: &str) -> Result<String> {
        let list: ListResponse<IdOnly> = self.get("channels", &[("part", "id"), (param, value)]).await?;
        list.items
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| Error::NotFound(format!("no channel for {value}")))
    }

    async fn channel_id_by_search(&self, q: &str) -> Result<String> {
        let list: ListResponse<SearchItem> = self
            .get(
                "search",
                &[("part", "snippet"), ("type", "channel"), ("maxResults", "1"), ("q", q)],
            )
            .await?;
        list.items
            .into_iter()
            .next()
            .and_then(|it| it.snippet.and_then(|s| s.channel_id).or(it.id.channel_id))
            .ok_or_else(|| Error::NotFound(format!("no channel matches {q:?}")))
    }

    async fn channel_id_of_video(&self, video_id: &str) -> Result<String> {
        let list: ListResponse<VideoItem> = self
            .get("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;
        list.items
            .into_iter()
            .next()
            .and_then(|v| v.snippet.and_then(|s| s.channel_id))
            .ok_or_else(|| Error::NotFound(format!("no video {video_id}")))
    }

    async fn uploads_playlist(&self, channel_id: &str) -> Result<String> {
        let list: ListResponse<ChannelItem> = self
            .get("channels", &[("part", "contentDetails"), ("id", channel_id)])
            .await?;
        let ch = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no channel {channel_id}")))?;
        ch.content_details
            .and_then(|c| c.related_playlists.uploads)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Fetch(format!("channel {channel_id} has no uploads playlist")))
    }

    async fn upload_ids(&self, playlist_id: &str, max_results: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        while ids.len() < max_results {
            let page_size = (max_results - ids.len()).min(PAGE_MAX).to_string();
            let mut params = vec![
                ("part", "contentDetails"),
                ("playlistId", playlist_id),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(t) = page_token.as_deref() {
                params.push(("pageToken", t));
            }
            let page: ListResponse<PlaylistItem> = self.get("playlistItems", &params).await?;
            let before = ids.len();
            ids.extend(
                page.items
                    .into_iter()
                    .filter_map(|it| it.content_details.and_then(|c| c.video_id))
                    .filter(|id| !id.is_empty()),
            );
            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() || ids.len() == before {
                break;
            }
        }
        ids.truncate(max_results);
        Ok(ids)
    }
}

#[async_trait::async_trait]
impl ChannelResolver for YouTubeClient {
    async fn resolve(&self, url_or_handle: &str) -> Result<String> {
        let r = parse_channel_input(url_or_handle)?;
        tracing::debug!(input = url_or_handle, resolved_as = ?r, "resolving channel");
        match r {
            ChannelRef::Id(id) => Ok(id),
            ChannelRef::Handle(h) => self.channel_id_by("forHandle", &h).await,
            ChannelRef::Username(u) => self.channel_id_by("forUsername", &u).await,
            ChannelRef::Query(q) => self.channel_id_by_search(&q).await,
            ChannelRef::Video(v) => self.channel_id_of_video(&v).await,
        }
    }

    async fn channel_meta(&self, channel_id: &str) -> Result<ChannelMeta> {
        let list: ListResponse<ChannelItem> = self
            .get("channels", &[("part", "snippet,statistics"), ("id", channel_id)])
            .await?;
        let ch = list
            .items
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no channel {channel_id}")))?;
        let snippet = ch.snippet.unwrap_or_default();
        let stats = ch.statistics.unwrap_or_default();
        Ok(ChannelMeta {
            id: if ch.id.is_empty() { channel_id.to_string() } else { ch.id },
            title: snippet.title.unwrap_or_default(),
            handle: snippet.custom_url.unwrap_or_default(),
            country: snippet
                .country
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            subscribers: count(stats.subscriber_count.as_deref()),
            video_count: count(stats.video_count.as_deref()),
            thumbnail_url: snippet.thumbnails.and_then(|t| t.best_url()),
        })
    }
}

#[async_trait::async_trait]
impl VideoFetcher for YouTubeClient {
    async fn fetch_recent(&self, channel_id: &str, max_results: usize) -> Result<Vec<RawVideo>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let playlist = self.uploads_playlist(channel_id).await.map_err(|e| match e {
            Error::NotFound(m) => Error::Fetch(m),
            other => other,
        })?;
        let ids = self.upload_ids(&playlist, max_results).await?;

        let mut by_id: HashMap<String, VideoItem> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(PAGE_MAX) {
            let joined = chunk.join(",");
            let list: ListResponse<VideoItem> = self
                .get("videos", &[("part", "snippet,statistics"), ("id", joined.as_str())])
                .await?;
            by_id.extend(list.items.into_iter().map(|v| (v.id.clone(), v)));
        }

        // Playlist order is newest first; ids the videos endpoint no longer returns
        // (private/deleted) stay as bare records so validation reports them.
        let out: Vec<RawVideo> = ids
            .into_iter()
            .map(|id| match by_id.remove(&id) {
                Some(v) => v.into_raw(),
                None => RawVideo {
                    video_id: Some(id),
                    ..RawVideo::default()
                },
            })
            .collect();
        tracing::info!(channel_id, videos = out.len(), "fetched recent uploads");
        Ok(out)
    }
}

fn count(s: Option<&str>) -> u64 {
    s.and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchId,
    snippet: Option<Snippet>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchId {
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    #[serde(default)]
    id: String,
    snippet: Option<Snippet>,
    statistics: Option<ChannelStatistics>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    title: Option<String>,
    #[serde(rename = "customUrl")]
    custom_url: Option<String>,
    country: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    fn best_url(self) -> Option<String> {
        self.high.or(self.medium).or(self.default).map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelStatistics {
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<String>,
    #[serde(rename = "videoCount")]
    video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists", default)]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Default, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(rename = "contentDetails")]
    content_details: Option<PlaylistItemDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemDetails {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(default)]
    id: String,
    snippet: Option<Snippet>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
}

impl VideoItem {
    fn into_raw(self) -> RawVideo {
        let snippet = self.snippet.unwrap_or_default();
        let stats = self.statistics.unwrap_or_default();
        RawVideo {
            video_id: Some(self.id),
            title: snippet.title,
            published: snippet.published_at,
            views: stats.view_count.map(RawCount::Text),
            likes: stats.like_count.map(RawCount::Text),
            comments: stats.comment_count.map(RawCount::Text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{serve, EnvGuard, ENV_LOCK};
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use proptest::prelude::*;
    use std::collections::HashMap;

    const CH: &str = "UCabcdefghijklmnopqrstuv";

    #[test]
    fn parses_channel_references() {
        assert_eq!(parse_channel_input(CH).unwrap(), ChannelRef::Id(CH.to_string()));
        assert_eq!(
            parse_channel_input(&format!("https://www.youtube.com/channel/{CH}/videos")).unwrap(),
            ChannelRef::Id(CH.to_string())
        );
        assert_eq!(
            parse_channel_input("https://www.youtube.com/@SomeCreator").unwrap(),
            ChannelRef::Handle("@SomeCreator".to_string())
        );
        assert_eq!(
            parse_channel_input("youtube.com/@SomeCreator/shorts").unwrap(),
            ChannelRef::Handle("@SomeCreator".to_string())
        );
        assert_eq!(
            parse_channel_input("  @SomeCreator ").unwrap(),
            ChannelRef::Handle("@SomeCreator".to_string())
        );
        assert_eq!(
            parse_channel_input("https://youtube.com/user/oldname").unwrap(),
            ChannelRef::Username("oldname".to_string())
        );
        assert_eq!(
            parse_channel_input("https://www.youtube.com/c/CustomName").unwrap(),
            ChannelRef::Query("CustomName".to_string())
        );
        assert_eq!(
            parse_channel_input("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            ChannelRef::Video("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            parse_channel_input("marketing with jane").unwrap(),
            ChannelRef::Query("marketing with jane".to_string())
        );
    }

    proptest! {
        #[test]
        fn channel_ids_parse_bare_and_in_urls(tail in "[A-Za-z0-9_-]{22}") {
            let id = format!("UC{tail}");
            prop_assert_eq!(parse_channel_input(&id).unwrap(), ChannelRef::Id(id.clone()));
            let url = format!("https://www.youtube.com/channel/{id}");
            prop_assert_eq!(parse_channel_input(&url).unwrap(), ChannelRef::Id(id));
        }
    }

    #[test]
    fn rejects_unusable_references() {
        for bad in ["", "   ", "@", "https://example.com/@x", "https://www.youtube.com/feed/trending"] {
            let e = parse_channel_input(bad).unwrap_err();
            assert_eq!(e.kind(), "invalid_url", "{bad:?}");
        }
    }

    #[test]
    fn non_ascii_names_are_decoded() {
        assert_eq!(
            parse_channel_input("https://www.youtube.com/@café").unwrap(),
            ChannelRef::Handle("@café".to_string())
        );
        assert_eq!(
            parse_channel_input("https://www.youtube.com/user/Jos%C3%A9").unwrap(),
            ChannelRef::Username("José".to_string())
        );
        assert_eq!(
            parse_channel_input("youtube.com/c/M%C3%BCller%20Kocht").unwrap(),
            ChannelRef::Query("Müller Kocht".to_string())
        );
        let e = parse_channel_input("https://www.youtube.com/@%FF").unwrap_err();
        assert_eq!(e.kind(), "invalid_url");
    }

    #[test]
    fn video_id_variants() {
        for u in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            let u = url::Url::parse(u).unwrap();
            assert_eq!(youtube_video_id(&u).as_deref(), Some("dQw4w9WgXcQ"));
        }
    }

    #[test]
    fn empty_api_key_is_treated_as_missing() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _g1 = EnvGuard::set("CREATORAUDIT_YOUTUBE_API_KEY", "  ");
        let _g2 = EnvGuard::unset("YOUTUBE_API_KEY");
        let e = YouTubeClient::from_env(reqwest::Client::new()).unwrap_err();
        assert_eq!(e.kind(), "not_configured");
    }

    #[test]
    fn vendor_key_is_a_fallback() {
        let _l = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _g1 = EnvGuard::unset("CREATORAUDIT_YOUTUBE_API_KEY");
        let _g2 = EnvGuard::set("YOUTUBE_API_KEY", "k");
        assert_eq!(youtube_api_key_from_env().as_deref(), Some("k"));
    }

    fn stub_api() -> Router {
        Router::new()
            .route(
                "/channels",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("forHandle").map(String::as_str) == Some("@known") {
                        return Json(serde_json::json!({"items":[{"id": CH}]}));
                    }
                    if q.get("forHandle").is_some() {
                        return Json(serde_json::json!({"items":[]}));
                    }
                    match q.get("part").map(String::as_str) {
                        Some("contentDetails") => Json(serde_json::json!({
                            "items":[{"id": CH, "contentDetails":{"relatedPlaylists":{"uploads":"UUupl"}}}]
                        })),
                        _ => Json(serde_json::json!({
                            "items":[{
                                "id": CH,
                                "snippet":{"title":"Known Creator","customUrl":"@known",
                                    "thumbnails":{"high":{"url":"https://img/high.jpg"}}},
                                "statistics":{"subscriberCount":"12000","videoCount":"3"}
                            }]
                        })),
                    }
                }),
            )
            .route(
                "/playlistItems",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let item = |id: &str| serde_json::json!({"contentDetails":{"videoId": id}});
                    if q.get("pageToken").map(String::as_str) == Some("p2") {
                        Json(serde_json::json!({"items":[item("v3")]}))
                    } else {
                        Json(serde_json::json!({"items":[item("v1"), item("v2")], "nextPageToken":"p2"}))
                    }
                }),
            )
            .route(
                "/videos",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let ids = q.get("id").cloned().unwrap_or_default();
                    // v2 is private: the API silently omits it. Reverse order on purpose.
                    let items: Vec<serde_json::Value> = ids
                        .split(',')
                        .rev()
                        .filter(|id| *id != "v2")
                        .map(|id| serde_json::json!({
                            "id": id,
                            "snippet":{"title": format!("Title {id}"), "publishedAt":"2024-05-01T10:00:00Z", "channelId": CH},
                            "statistics":{"viewCount":"1000","commentCount":"4"}
                        }))
                        .collect();
                    Json(serde_json::json!({"items": items}))
                }),
            )
            .route(
                "/search",
                get(|| async {
                    Json(serde_json::json!({"items":[{"id":{"kind":"youtube#channel","channelId": CH},
                        "snippet":{"channelId": CH, "title":"Known Creator"}}]}))
                }),
            )
    }

    #[tokio::test]
    async fn resolves_and_fetches_against_stub_api() {
        let addr = serve(stub_api()).await;
        let yt = YouTubeClient::new(reqwest::Client::new(), "k", format!("http://{addr}"));

        assert_eq!(yt.resolve("https://www.youtube.com/@known").await.unwrap(), CH);
        assert_eq!(yt.resolve("known creator").await.unwrap(), CH);
        assert_eq!(yt.resolve("https://youtu.be/v1").await.unwrap(), CH);
        assert_eq!(yt.resolve("@missing").await.unwrap_err().kind(), "not_found");

        let meta = yt.channel_meta(CH).await.unwrap();
        assert_eq!(meta.title, "Known Creator");
        assert_eq!(meta.handle, "@known");
        assert_eq!(meta.country, "Unknown");
        assert_eq!(meta.subscribers, 12_000);
        assert_eq!(meta.thumbnail_url.as_deref(), Some("https://img/high.jpg"));

        let vids = yt.fetch_recent(CH, 30).await.unwrap();
        let ids: Vec<_> = vids.iter().map(|v| v.video_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert_eq!(vids[0].views, Some(RawCount::Text("1000".to_string())));
        assert_eq!(vids[0].likes, None);
        assert_eq!(vids[1].title, None);

        let batch = creatoraudit_core::validate_batch(&vids);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped(), 1);
        assert_eq!(batch.records[0].likes, 0);
    }

    #[tokio::test]
    async fn fetch_respects_max_results() {
        let addr = serve(stub_api()).await;
        let yt = YouTubeClient::new(reqwest::Client::new(), "k", format!("http://{addr}"));
        let vids = yt.fetch_recent(CH, 1).await.unwrap();
        assert_eq!(vids.len(), 1);
        assert!(yt.fetch_recent(CH, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn http_errors_map_to_fetch_error() {
        let app = Router::new().route(
            "/channels",
            get(|| async {
                (
                    axum::http::StatusCode::FORBIDDEN,
                    Json(serde_json::json!({"error":{"errors":[{"reason":"quotaExceeded"}]}})),
                )
            }),
        );
        let addr = serve(app).await;
        let yt = YouTubeClient::new(reqwest::Client::new(), "k", format!("http://{addr}"));
        let e = yt.fetch_recent(CH, 5).await.unwrap_err();
        assert_eq!(e.kind(), "fetch_error");
        assert!(e.to_string().contains("quotaExceeded"), "{e}");
    }

    #[tokio::test]
    async fn non_ascii_handle_reaches_the_api_decoded() {
        let app = Router::new().route(
            "/channels",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let items = if q.get("forHandle").map(String::as_str) == Some("@café") {
                    serde_json::json!([{ "id": CH }])
                } else {
                    serde_json::json!([])
                };
                Json(serde_json::json!({ "items": items }))
            }),
        );
        let addr = serve(app).await;
        let yt = YouTubeClient::new(reqwest::Client::new(), "k", format!("http://{addr}"));
        assert_eq!(yt.resolve("https://www.youtube.com/@café").await.unwrap(), CH);
        assert_eq!(yt.resolve("https://www.youtube.com/@caf%C3%A9").await.unwrap(), CH);
    }
}
