//! One audit run: resolve → fetch → validate → summarize → classify → price →
//! (optionally) brand safety.
//!
//! The result is an explicit, caller-owned [`AuditReport`]; nothing here keeps state
//! between runs.

use crate::aggregate::{summarize_batch, ChannelSummary};
use crate::classify::{classify, Classification, MatchPolicy, TopicTaxonomy};
use crate::pricing::{PriceQuote, Scenario};
use crate::risk::{brand_safety_query, search_context, RiskAssessment, RiskBand};
use crate::video::{validate_batch, RawVideo, ValidationError};
use crate::{
    ChannelMeta, ChannelResolver, Result, RiskAssessor, SearchProvider, SearchQuery,
    TranscriptSource, VideoFetcher,
};
use serde::{Deserialize, Serialize};

/// Characters of transcript appended to the brand-safety context.
pub const TRANSCRIPT_CONTEXT_CHARS: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub top: usize,
    pub scenario: Scenario,
    pub policy: MatchPolicy,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            top: 10,
            scenario: Scenario::default(),
            policy: MatchPolicy::default(),
        }
    }
}

/// Output of the pure part of an audit.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub summary: ChannelSummary,
    pub classification: Classification,
    pub pricing: PriceQuote,
    pub rejected: Vec<ValidationError>,
}

/// Validate, summarize, classify and price a batch of raw videos.
pub fn analyze(raws: &[RawVideo], taxonomy: &TopicTaxonomy, opts: &AnalysisOptions) -> Analysis {
    analyze_batch(validate_batch(raws), taxonomy, opts)
}

pub fn analyze_batch(
    batch: crate::ValidatedBatch,
    taxonomy: &TopicTaxonomy,
    opts: &AnalysisOptions,
) -> Analysis {
    let summary = summarize_batch(&batch, opts.top);
    let classification = classify(&batch.records, taxonomy, opts.policy);
    let pricing = opts.scenario.quote(summary.average_views);
    Analysis {
        summary,
        classification,
        pricing,
        rejected: batch.rejected,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequest {
    /// Channel URL, `@handle`, channel id, or a free-text name.
    pub channel: String,
    pub max_results: usize,
    pub options: AnalysisOptions,
    pub brand_safety: bool,
    /// Append the top video's transcript to the brand-safety context.
    pub transcript_context: bool,
    /// Override "now" for deterministic outputs.
    pub now_epoch_s: Option<u64>,
}

impl AuditRequest {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            max_results: 30,
            options: AnalysisOptions::default(),
            brand_safety: false,
            transcript_context: false,
            now_epoch_s: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Search,
    Assessment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BrandSafetyOutcome {
    Skipped {
        reason: String,
    },
    Assessed {
        query: String,
        sources: usize,
        transcript_used: bool,
        band: RiskBand,
        assessment: RiskAssessment,
    },
    /// The rest of the report is still valid.
    Failed {
        stage: FailureStage,
        kind: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub generated_at_epoch_s: u64,
    pub channel: ChannelMeta,
    pub summary: ChannelSummary,
    pub classification: Classification,
    pub pricing: PriceQuote,
    pub rejected: Vec<ValidationError>,
    pub brand_safety: BrandSafetyOutcome,
}

/// Drives one audit through the collaborators it was built with.
pub struct Auditor<'a> {
    resolver: &'a dyn ChannelResolver,
    fetcher: &'a dyn VideoFetcher,
    taxonomy: &'a TopicTaxonomy,
    search: Option<&'a dyn SearchProvider>,
    assessor: Option<&'a dyn RiskAssessor>,
    transcripts: Option<&'a dyn TranscriptSource>,
}

impl<'a> Auditor<'a> {
    pub fn new(
        resolver: &'a dyn ChannelResolver,
        fetcher: &'a dyn VideoFetcher,
        taxonomy: &'a TopicTaxonomy,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            taxonomy,
            search: None,
            assessor: None,
            transcripts: None,
        }
    }

    pub fn with_search(mut self, search: &'a dyn SearchProvider) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_assessor(mut self, assessor: &'a dyn RiskAssessor) -> Self {
        self.assessor = Some(assessor);
        self
    }

    pub fn with_transcripts(mut self, transcripts: &'a dyn TranscriptSource) -> Self {
        self.transcripts = Some(transcripts);
        self
    }

    /// Resolver and fetcher errors propagate unchanged; brand-safety errors are
    /// folded into [`BrandSafetyOutcome::Failed`].
    pub async fn run(&self, req: &AuditRequest) -> Result<AuditReport> {
        let channel_id = self.resolver.resolve(&req.channel).await?;
        tracing::info!(channel_id = %channel_id, input = %req.channel, "resolved channel");
        let channel = self.resolver.channel_meta(&channel_id).await?;
        let raws = self.fetcher.fetch_recent(&channel.id, req.max_results).await?;
        tracing::info!(fetched = raws.len(), "fetched recent videos");

        let analysis = analyze(&raws, self.taxonomy, &req.options);
        if !analysis.rejected.is_empty() {
            tracing::warn!(skipped = analysis.rejected.len(), "some video records were rejected");
        }

        let brand_safety = if req.brand_safety {
            self.brand_safety(&channel, &analysis.summary, req.transcript_context)
                .await
        } else {
            BrandSafetyOutcome::Skipped {
                reason: "not requested".to_string(),
            }
        };

        let generated_at_epoch_s = req.now_epoch_s.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        });

        Ok(AuditReport {
            generated_at_epoch_s,
            channel,
            summary: analysis.summary,
            classification: analysis.classification,
            pricing: analysis.pricing,
            rejected: analysis.rejected,
            brand_safety,
        })
    }

    async fn brand_safety(
        &self,
        channel: &ChannelMeta,
        summary: &ChannelSummary,
        with_transcript: bool,
    ) -> BrandSafetyOutcome {
        let (Some(search), Some(assessor)) = (self.search, self.assessor) else {
            return BrandSafetyOutcome::Skipped {
                reason: "no search provider or assessor configured".to_string(),
            };
        };

        let query = brand_safety_query(&channel.title);
        let resp = match search.search(&SearchQuery::new(query.clone())).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(provider = search.name(), error = %e, "brand-safety search failed");
                return BrandSafetyOutcome::Failed {
                    stage: FailureStage::Search,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                };
            }
        };
        if resp.results.is_empty() {
            return BrandSafetyOutcome::Failed {
                stage: FailureStage::Search,
                kind: "no_findings".to_string(),
                message: format!("{} returned no results for {query:?}", resp.provider),
            };
        }
        let mut context = search_context(&resp.results);

        let mut transcript_used = false;
        if with_transcript {
            if let (Some(ts), Some(top)) = (self.transcripts, summary.top_n.first()) {
                match ts.transcript(&top.video_id).await {
                    Ok(t) if !t.trim().is_empty() => {
                        let excerpt: String = t.chars().take(TRANSCRIPT_CONTEXT_CHARS).collect();
                        context.push_str(&format!(
                            "\n\nTranscript excerpt from \"{}\":\n{excerpt}",
                            top.title
                        ));
                        transcript_used = true;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(video_id = %top.video_id, error = %e, "transcript unavailable");
                    }
                }
            }
        }

        match assessor.assess(&context).await {
            Ok(assessment) => BrandSafetyOutcome::Assessed {
                query,
                sources: resp.results.len(),
                transcript_used,
                band: assessment.band(),
                assessment,
            },
            Err(e) => {
                tracing::warn!(error = %e, "brand-safety assessment failed");
                BrandSafetyOutcome::Failed {
                    stage: FailureStage::Assessment,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }
}
