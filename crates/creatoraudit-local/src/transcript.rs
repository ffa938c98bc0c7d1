//! Video transcripts via `yt-dlp` captions.
//!
//! Bounded in time (the child is killed on timeout) and in size (text is clipped).
//! No HTML scraping: `yt-dlp` already tracks YouTube's caption plumbing.

use creatoraudit_core::{Error, Result, TranscriptSource};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(bin))
        .find(|cand| cand.is_file())
}

fn langs_from_env() -> Vec<String> {
    crate::env("CREATORAUDIT_TRANSCRIPT_LANGS")
        .unwrap_or_else(|| "en,en-US".to_string())
        .split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
pub struct YtDlpTranscripts {
    bin: PathBuf,
    langs: Vec<String>,
    timeout: Duration,
    max_chars: usize,
}

impl YtDlpTranscripts {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            langs: vec!["en".to_string(), "en-US".to_string()],
            timeout: Duration::from_secs(60),
            max_chars: 200_000,
        }
    }

    /// `CREATORAUDIT_YTDLP_BIN` or `yt-dlp` on `PATH`.
    pub fn from_env() -> Result<Self> {
        let bin = match crate::env("CREATORAUDIT_YTDLP_BIN") {
            Some(p) => {
                let p = PathBuf::from(p);
                if !p.is_file() {
                    return Err(Error::NotConfigured(format!(
                        "CREATORAUDIT_YTDLP_BIN does not exist: {}",
                        p.display()
                    )));
                }
                p
            }
            None => which("yt-dlp")
                .ok_or_else(|| Error::NotConfigured("yt-dlp not found on PATH".to_string()))?,
        };
        let mut t = Self::new(bin);
        t.langs = langs_from_env();
        t.timeout = Duration::from_millis(
            crate::env_u64("CREATORAUDIT_TRANSCRIPT_TIMEOUT_MS", 60_000).clamp(1_000, 600_000),
        );
        t.max_chars = crate::env_u64("CREATORAUDIT_TRANSCRIPT_MAX_CHARS", 200_000)
            .min(2_000_000) as usize;
        Ok(t)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, url: &str, dir: &Path) -> Result<()> {
        let out_tmpl = dir.join("%(id)s.%(ext)s");
        let langs = if self.langs.is_empty() {
            "en".to_string()
        } else {
            self.langs.join(",")
        };
        let mut child = tokio::process::Command::new(&self.bin)
            .arg("--skip-download")
            .arg("--write-sub")
            .arg("--write-auto-sub")
            .arg("--sub-lang")
            .arg(&langs)
            .arg("--sub-format")
            .arg("vtt")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&out_tmpl)
            .arg(url)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Fetch(format!("yt-dlp spawn failed: {e}")))?;

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Err(_) => {
                let _ = child.kill().await;
                Err(Error::Fetch(format!(
                    "yt-dlp timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
            Ok(Err(e)) => Err(Error::Fetch(format!("yt-dlp wait failed: {e}"))),
            Ok(Ok(st)) if !st.success() => Err(Error::Fetch(format!("yt-dlp exited with {st}"))),
            Ok(Ok(_)) => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl TranscriptSource for YtDlpTranscripts {
    async fn transcript(&self, video_id: &str) -> Result<String> {
        let tmp = tempfile::tempdir().map_err(|e| Error::Fetch(format!("tempdir: {e}")))?;
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        self.run(&url, tmp.path()).await?;

        let mut rd = tokio::fs::read_dir(tmp.path())
            .await
            .map_err(|e| Error::Fetch(format!("read captions dir: {e}")))?;
        let mut vtts = Vec::new();
        while let Ok(Some(ent)) = rd.next_entry().await {
            let p = ent.path();
            if p.extension().and_then(|s| s.to_str()) == Some("vtt") {
                vtts.push(p);
            }
        }
        // Language order is not guaranteed by the directory listing.
        vtts.sort();
        let Some(p) = vtts.into_iter().next() else {
            return Err(Error::NotFound(format!("no captions for {video_id}")));
        };
        let vtt = tokio::fs::read_to_string(&p)
            .await
            .map_err(|e| Error::Fetch(format!("read captions: {e}")))?;
        let text = vtt_to_text(&vtt, self.max_chars);
        tracing::debug!(video_id, chars = text.len(), "transcript loaded");
        Ok(text)
    }
}

/// Strip `<00:00:01.000>` timestamps and `<c>` styling from auto-caption cue text.
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Cue text only, one space between cues. Auto captions repeat the previous
/// line at the top of each cue; consecutive duplicates are dropped.
pub fn vtt_to_text(vtt: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut last: Option<String> = None;
    let mut in_header = true;
    for line in vtt.lines() {
        let l = line.trim();
        if in_header {
            // Header block (WEBVTT, Kind:, Language:) ends at the first blank line.
            if l.is_empty() {
                in_header = false;
            }
            continue;
        }
        if l.is_empty() || l.contains("-->") || l.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if l.starts_with("NOTE") || l.starts_with("STYLE") {
            continue;
        }
        let cleaned = strip_tags(l).split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() || last.as_deref() == Some(cleaned.as_str()) {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&cleaned);
        last = Some(cleaned);
        if out.chars().count() >= max_chars {
            out = out.chars().take(max_chars).collect();
            break;
        }
    }
    out
}
