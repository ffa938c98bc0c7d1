//! Video records and the validation that turns upstream data into them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A count as it arrives on the wire: JSON number or decimal string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawCount {
    Int(i64),
    /// Numbers past `i64::MAX`; untagged matching tries `Int` first.
    UInt(u64),
    Float(f64),
    Text(String),
}

impl From<i64> for RawCount {
    fn from(v: i64) -> Self {
        RawCount::Int(v)
    }
}

impl From<u64> for RawCount {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(RawCount::Int).unwrap_or(RawCount::UInt(v))
    }
}

/// One video as supplied by a fetcher. Every field is optional here so that
/// [`validate`] decides what is usable, one record at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawVideo {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub views: Option<RawCount>,
    #[serde(default)]
    pub likes: Option<RawCount>,
    #[serde(default)]
    pub comments: Option<RawCount>,
}

impl RawVideo {
    /// Deserialize one element of a JSON batch. A malformed element becomes a
    /// per-record [`ValidationError`] instead of failing the whole batch.
    pub fn from_value(
        index: usize,
        value: serde_json::Value,
    ) -> std::result::Result<Self, ValidationError> {
        let video_id = value
            .get("video_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        serde_json::from_value(value).map_err(|e| ValidationError {
            index,
            video_id,
            issue: ValidationIssue::Malformed {
                message: e.to_string(),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    /// ISO-8601 as received. Parsed lazily by [`VideoRecord::published_at`].
    pub published: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    /// Percent, two decimals. `None` until [`crate::compute_engagement`] runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_rate: Option<f64>,
}

impl VideoRecord {
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        published: impl Into<String>,
        views: u64,
        likes: u64,
        comments: u64,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            published: published.into(),
            views,
            likes,
            comments,
            engagement_rate: None,
        }
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.published)
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// Accepts RFC 3339 (what the YouTube API sends), plus zone-less date-times
/// and bare dates, both read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("field `{field}` is negative ({value})")]
    Negative { field: &'static str, value: i64 },
    #[error("field `{field}` is not a whole number: {raw}")]
    NotANumber { field: &'static str, raw: String },
    #[error("duplicate video id")]
    DuplicateId,
    #[error("malformed record: {message}")]
    Malformed { message: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("record #{index} ({}): {issue}", .video_id.as_deref().unwrap_or("no id"))]
pub struct ValidationError {
    /// Position in the input batch.
    pub index: usize,
    pub video_id: Option<String>,
    pub issue: ValidationIssue,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, ValidationIssue> {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ValidationIssue::MissingField { field }),
    }
}

fn count(value: &Option<RawCount>, field: &'static str) -> Result<u64, ValidationIssue> {
    let not_a_number = |raw: String| ValidationIssue::NotANumber { field, raw };
    let n: i64 = match value {
        None => return Ok(0),
        Some(RawCount::Int(n)) => *n,
        Some(RawCount::UInt(n)) => return Ok(*n),
        Some(RawCount::Float(f)) => {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                *f as i64
            } else {
                return Err(not_a_number(f.to_string()));
            }
        }
        Some(RawCount::Text(s)) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(0);
            }
            match t.parse::<i64>() {
                Ok(n) => n,
                // Counts beyond i64 are still valid non-negative numbers.
                Err(_) => return t.parse::<u64>().map_err(|_| not_a_number(s.clone())),
            }
        }
    };
    if n < 0 {
        return Err(ValidationIssue::Negative { field, value: n });
    }
    Ok(n as u64)
}

/// Validate a single raw record. Missing counts read as 0.
pub fn validate(index: usize, raw: &RawVideo) -> Result<VideoRecord, ValidationError> {
    let fail = |issue| ValidationError {
        index,
        video_id: raw.video_id.clone().filter(|s| !s.trim().is_empty()),
        issue,
    };
    let video_id = required(&raw.video_id, "video_id").map_err(fail)?;
    // Titles may legitimately be empty strings, but the field must be present.
    let title = raw
        .title
        .clone()
        .ok_or(ValidationIssue::MissingField { field: "title" })
        .map_err(fail)?;
    let published = required(&raw.published, "published").map_err(fail)?;
    let views = count(&raw.views, "views").map_err(fail)?;
    let likes = count(&raw.likes, "likes").map_err(fail)?;
    let comments = count(&raw.comments, "comments").map_err(fail)?;
    Ok(VideoRecord::new(video_id, title, published, views, likes, comments))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidatedBatch {
    pub records: Vec<VideoRecord>,
    pub rejected: Vec<ValidationError>,
}

impl ValidatedBatch {
    pub fn skipped(&self) -> usize {
        self.rejected.len()
    }

    /// Fold in errors found before validation (e.g. malformed JSON elements).
    pub fn with_rejected(mut self, mut earlier: Vec<ValidationError>) -> Self {
        earlier.append(&mut self.rejected);
        earlier.sort_by_key(|e| e.index);
        self.rejected = earlier;
        self
    }
}

/// Validate a batch, keeping input order. A bad record is rejected on its own;
/// the rest of the batch survives. A repeated video id keeps its first occurrence.
pub fn validate_batch<'a, I>(raws: I) -> ValidatedBatch
where
    I: IntoIterator<Item = &'a RawVideo>,
{
    validate_indexed(raws.into_iter().enumerate())
}

/// Like [`validate_batch`], for callers that already dropped some elements and
/// want reported indices to point into the original input.
pub fn validate_indexed<'a, I>(raws: I) -> ValidatedBatch
where
    I: IntoIterator<Item = (usize, &'a RawVideo)>,
{
    let mut out = ValidatedBatch::default();
    let mut seen = BTreeSet::new();
    for (index, raw) in raws {
        match validate(index, raw) {
            Ok(rec) => {
                if seen.insert(rec.video_id.clone()) {
                    out.records.push(rec);
                } else {
                    out.rejected.push(ValidationError {
                        index,
                        video_id: Some(rec.video_id),
                        issue: ValidationIssue::DuplicateId,
                    });
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping video record");
                out.rejected.push(e);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, views: RawCount) -> RawVideo {
        RawVideo {
            video_id: Some(id.to_string()),
            title: Some("t".to_string()),
            published: Some("2024-03-05T10:00:00Z".to_string()),
            views: Some(views),
            likes: None,
            comments: None,
        }
    }

    #[test]
    fn missing_counts_read_as_zero() {
        let r = validate(0, &raw("a", RawCount::Int(5))).unwrap();
        assert_eq!((r.views, r.likes, r.comments), (5, 0, 0));
        assert_eq!(r.engagement_rate, None);
    }

    #[test]
    fn string_counts_from_the_api_are_accepted() {
        let r = validate(0, &raw("a", RawCount::Text("1234".to_string()))).unwrap();
        assert_eq!(r.views, 1234);
        let r = validate(0, &raw("a", RawCount::Float(12.0))).unwrap();
        assert_eq!(r.views, 12);
    }

    #[test]
    fn negative_and_garbage_counts_are_rejected() {
        let e = validate(3, &raw("a", RawCount::Int(-1))).unwrap_err();
        assert_eq!(e.index, 3);
        assert_eq!(e.video_id.as_deref(), Some("a"));
        assert_eq!(
            e.issue,
            ValidationIssue::Negative {
                field: "views",
                value: -1
            }
        );
        let e = validate(0, &raw("a", RawCount::Text("lots".to_string()))).unwrap_err();
        assert!(matches!(e.issue, ValidationIssue::NotANumber { field: "views", .. }));
        let e = validate(0, &raw("a", RawCount::Float(1.5))).unwrap_err();
        assert!(matches!(e.issue, ValidationIssue::NotANumber { .. }));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut r = raw("a", RawCount::Int(1));
        r.video_id = Some("  ".to_string());
        let e = validate(0, &r).unwrap_err();
        assert_eq!(e.issue, ValidationIssue::MissingField { field: "video_id" });
        assert_eq!(e.video_id, None);

        let mut r = raw("a", RawCount::Int(1));
        r.published = None;
        let e = validate(0, &r).unwrap_err();
        assert_eq!(e.issue, ValidationIssue::MissingField { field: "published" });

        let mut r = raw("a", RawCount::Int(1));
        r.title = None;
        assert!(validate(0, &r).is_err());
        r.title = Some(String::new());
        assert!(validate(0, &r).is_ok());
    }

    #[test]
    fn batch_skips_bad_records_without_aborting() {
        let raws = vec![
            raw("a", RawCount::Int(1)),
            raw("b", RawCount::Int(-5)),
            raw("c", RawCount::Int(3)),
            raw("a", RawCount::Int(9)),
        ];
        let batch = validate_batch(&raws);
        let ids: Vec<_> = batch.records.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(batch.skipped(), 2);
        assert_eq!(batch.rejected[0].index, 1);
        assert_eq!(batch.rejected[1].issue, ValidationIssue::DuplicateId);
    }

    #[test]
    fn malformed_json_element_becomes_a_rejection() {
        let v = serde_json::json!({"video_id": "x", "title": 42});
        let e = RawVideo::from_value(7, v).unwrap_err();
        assert_eq!(e.index, 7);
        assert_eq!(e.video_id.as_deref(), Some("x"));
        assert!(matches!(e.issue, ValidationIssue::Malformed { .. }));

        let v = serde_json::json!({"video_id": "y", "title": "ok", "published": "2024-01-01", "views": "10"});
        let r = RawVideo::from_value(0, v).unwrap();
        assert_eq!(r.views, Some(RawCount::Text("10".to_string())));
    }

    #[test]
    fn counts_past_i64_agree_as_number_and_string() {
        let big = u64::MAX;
        let from_number = RawVideo::from_value(
            0,
            serde_json::json!({"video_id": "n", "title": "t", "published": "2024-01-01", "views": big}),
        )
        .unwrap();
        assert_eq!(from_number.views, Some(RawCount::UInt(big)));
        assert_eq!(validate(0, &from_number).unwrap().views, big);

        let from_text = raw("s", RawCount::Text(big.to_string()));
        assert_eq!(validate(0, &from_text).unwrap().views, big);
        assert_eq!(RawCount::from(big), RawCount::UInt(big));
        assert_eq!(RawCount::from(7u64), RawCount::Int(7));
    }

    #[test]
    fn timestamps_parse_in_several_iso_forms() {
        assert!(parse_timestamp("2024-03-05T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-05T10:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-03-05T10:00:00").is_some());
        assert!(parse_timestamp("2024-03-05").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
