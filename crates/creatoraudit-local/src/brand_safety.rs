//! LLM-backed [`RiskAssessor`].

use crate::openai_compat::OpenAiCompatClient;
use creatoraudit_core::risk::{assessment_prompt, ASSESSMENT_SYSTEM_PROMPT};
use creatoraudit_core::{parse_assessment, Error, Result, RiskAssessment, RiskAssessor};

#[derive(Debug, Clone)]
pub struct LlmRiskAssessor {
    llm: OpenAiCompatClient,
    timeout_ms: u64,
    max_tokens: u64,
}

impl LlmRiskAssessor {
    pub fn new(llm: OpenAiCompatClient) -> Self {
        Self {
            llm,
            timeout_ms: crate::env_u64("CREATORAUDIT_LLM_TIMEOUT_MS", 60_000).clamp(1_000, 300_000),
            max_tokens: 800,
        }
    }

    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        Ok(Self::new(OpenAiCompatClient::from_env(client, model_override)?))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[async_trait::async_trait]
impl RiskAssessor for LlmRiskAssessor {
    async fn assess(&self, context: &str) -> Result<RiskAssessment> {
        let answer = self
            .llm
            .chat(
                ASSESSMENT_SYSTEM_PROMPT,
                &assessment_prompt(context),
                self.timeout_ms,
                Some(self.max_tokens),
                Some(0.0),
            )
            .await
            .map_err(|e| match e {
                Error::Llm(m) => Error::Assessment(format!("llm: {m}")),
                other => other,
            })?;
        parse_assessment(&answer)
    }
}
