//! Per-video engagement and channel-level summary statistics.

use crate::video::{ValidatedBatch, VideoRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label format for chart points, e.g. `Mar 05`.
pub const SERIES_LABEL_FORMAT: &str = "%b %d";

/// `(likes + comments) / views * 100`, rounded to two decimals; `0` when there are no views.
pub fn engagement_rate(views: u64, likes: u64, comments: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    let interactions = likes.saturating_add(comments) as f64;
    let pct = 100.0 * interactions / views as f64;
    (pct * 100.0).round() / 100.0
}

pub fn compute_engagement(mut record: VideoRecord) -> VideoRecord {
    record.engagement_rate = Some(engagement_rate(
        record.views,
        record.likes,
        record.comments,
    ));
    record
}

/// Mean of `views`, rounded half-up. Empty input is `0`.
pub fn average_views(records: &[VideoRecord]) -> u64 {
    if records.is_empty() {
        return 0;
    }
    let n = records.len() as u128;
    let sum: u128 = records.iter().map(|r| r.views as u128).sum();
    // The mean of u64 values always fits in u64.
    ((sum + n / 2) / n) as u64
}

/// The `n` most viewed records, descending. Ties keep input order.
pub fn top_n(records: &[VideoRecord], n: usize) -> Vec<VideoRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.views.cmp(&a.views));
    sorted.truncate(n);
    sorted
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub label: String,
    pub published_at: DateTime<Utc>,
    pub video: VideoRecord,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeSeries {
    pub points: Vec<SeriesPoint>,
    /// Records left out because `published` did not parse.
    pub excluded: usize,
}

/// Records in ascending publish order, labelled for charting.
pub fn time_series(records: &[VideoRecord]) -> TimeSeries {
    let mut excluded = 0usize;
    let mut points = Vec::with_capacity(records.len());
    for r in records {
        match r.published_at() {
            Some(at) => points.push(SeriesPoint {
                label: at.format(SERIES_LABEL_FORMAT).to_string(),
                published_at: at,
                video: r.clone(),
            }),
            None => {
                tracing::debug!(video_id = %r.video_id, published = %r.published, "unparseable publish time");
                excluded += 1;
            }
        }
    }
    points.sort_by_key(|p| p.published_at);
    TimeSeries { points, excluded }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelSummary {
    /// Records the summary was computed over.
    pub video_count: usize,
    pub average_views: u64,
    pub top_n: Vec<VideoRecord>,
    pub series: Vec<SeriesPoint>,
    pub excluded_from_series: usize,
    /// Records rejected by validation before aggregation.
    #[serde(default)]
    pub skipped_records: usize,
}

/// Engagement for every record, then average, top `top` and series.
pub fn summarize(records: &[VideoRecord], top: usize) -> ChannelSummary {
    let records: Vec<VideoRecord> = records.iter().cloned().map(compute_engagement).collect();
    let series = time_series(&records);
    ChannelSummary {
        video_count: records.len(),
        average_views: average_views(&records),
        top_n: top_n(&records, top),
        series: series.points,
        excluded_from_series: series.excluded,
        skipped_records: 0,
    }
}

pub fn summarize_batch(batch: &ValidatedBatch, top: usize) -> ChannelSummary {
    ChannelSummary {
        skipped_records: batch.skipped(),
        ..summarize(&batch.records, top)
    }
}
