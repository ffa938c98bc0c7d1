//! Plain-text / Markdown rendering of summaries and reports, and reading a
//! rendered summary back.

use crate::aggregate::ChannelSummary;
use crate::audit::{AuditReport, BrandSafetyOutcome};
use crate::{Error, Result};
use std::fmt::Write as _;

const AVERAGE_PREFIX: &str = "Average views:";
const TABLE_HEADER: &str = "| # | Video ID | Title | Views | Likes | Comments | Engagement % |";

/// `1234567` → `1,234,567`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn escape_cell(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace(['\n', '\r'], " ")
}

/// Split a Markdown table row on unescaped pipes, unescaping cell contents.
fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(n) => cur.push(n),
                None => cur.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut cur).trim().to_string()),
            _ => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        cells.push(cur.trim().to_string());
    }
    cells
}

/// Average views line plus a table of the top videos.
pub fn render_markdown(summary: &ChannelSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{AVERAGE_PREFIX} {}", thousands(summary.average_views));
    let _ = writeln!(out, "Videos analyzed: {}", summary.video_count);
    if summary.skipped_records > 0 {
        let _ = writeln!(out, "Skipped records: {}", summary.skipped_records);
    }
    out.push('\n');
    out.push_str(TABLE_HEADER);
    out.push('\n');
    out.push_str("|---|---|---|---|---|---|---|\n");
    for (i, v) in summary.top_n.iter().enumerate() {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {:.2} |",
            i + 1,
            escape_cell(&v.video_id),
            escape_cell(&v.title),
            thousands(v.views),
            thousands(v.likes),
            thousands(v.comments),
            v.engagement_rate.unwrap_or(0.0)
        );
    }
    out
}

/// What can be recovered from [`render_markdown`] output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryDigest {
    pub average_views: u64,
    pub top_video_ids: Vec<String>,
}

pub fn parse_markdown(text: &str) -> Result<SummaryDigest> {
    let avg_line = text
        .lines()
        .find_map(|l| l.trim().strip_prefix(AVERAGE_PREFIX))
        .ok_or_else(|| Error::Display("missing average views line".to_string()))?;
    let average_views = avg_line
        .trim()
        .replace(',', "")
        .parse::<u64>()
        .map_err(|e| Error::Display(format!("bad average views {avg_line:?}: {e}")))?;

    let mut lines = text.lines().skip_while(|l| l.trim() != TABLE_HEADER);
    if lines.next().is_none() {
        return Err(Error::Display("missing top videos table".to_string()));
    }
    let mut top_video_ids = Vec::new();
    for line in lines.skip(1) {
        if !line.trim_start().starts_with('|') {
            break;
        }
        let cells = split_row(line);
        let id = cells
            .get(1)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Display(format!("row without video id: {line:?}")))?;
        top_video_ids.push(id.clone());
    }
    Ok(SummaryDigest {
        average_views,
        top_video_ids,
    })
}

/// Human-readable report for the terminal.
pub fn render_report_text(report: &AuditReport) -> String {
    let mut out = String::new();
    let ch = &report.channel;
    let _ = writeln!(out, "Creator overview");
    let _ = writeln!(out, "  Channel:     {}", ch.title);
    if !ch.handle.is_empty() {
        let _ = writeln!(out, "  Handle:      {}", ch.handle);
    }
    let _ = writeln!(out, "  Channel ID:  {}", ch.id);
    let _ = writeln!(out, "  Country:     {}", ch.country);
    let _ = writeln!(out, "  Subscribers: {}", thousands(ch.subscribers));
    let _ = writeln!(out, "  URL:         {}", ch.channel_url());
    let _ = writeln!(out, "  Topics:      {}", report.classification);
    out.push('\n');

    let p = &report.pricing;
    let _ = writeln!(out, "Sponsorship calculator");
    let _ = writeln!(out, "  Average views:  {}", thousands(p.average_views));
    let _ = writeln!(out, "  Scenario:       {} ({:.4})", p.label, p.rate);
    let _ = writeln!(out, "  Price / video:  ${}", thousands(p.price));
    out.push('\n');

    let _ = writeln!(out, "Top videos");
    out.push_str(&render_markdown(&report.summary));
    out.push('\n');

    let _ = writeln!(out, "Views over time");
    for pt in &report.summary.series {
        let _ = writeln!(out, "  {}  {:>12}  {}", pt.label, thousands(pt.video.views), pt.video.title);
    }
    if report.summary.excluded_from_series > 0 {
        let _ = writeln!(
            out,
            "  ({} videos without a readable publish date)",
            report.summary.excluded_from_series
        );
    }
    out.push('\n');

    let _ = writeln!(out, "Brand safety");
    match &report.brand_safety {
        BrandSafetyOutcome::Skipped { reason } => {
            let _ = writeln!(out, "  skipped: {reason}");
        }
        BrandSafetyOutcome::Failed {
            stage,
            kind,
            message,
        } => {
            let _ = writeln!(out, "  unavailable ({stage:?}, {kind}): {message}");
        }
        BrandSafetyOutcome::Assessed {
            query,
            assessment,
            band,
            ..
        } => {
            let _ = writeln!(out, "  Query:      {query}");
            let _ = writeln!(out, "  Risk score: {} ({band:?})", assessment.risk_score);
            if !assessment.flags.is_empty() {
                let _ = writeln!(out, "  Flags:      {}", assessment.flags.join("; "));
            }
            let _ = writeln!(out, "  HEART values:");
            for (t, v) in &assessment.heart_values {
                match &v.reason {
                    Some(r) => {
                        let _ = writeln!(out, "    {}: {} ({r})", t.name(), v.value);
                    }
                    None => {
                        let _ = writeln!(out, "    {}: {}", t.name(), v.value);
                    }
                }
            }
            let _ = writeln!(out, "  Summary:    {}", assessment.summary);
        }
    }
    out
}
