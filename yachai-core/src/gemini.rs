//! AI client for Yachai: claim classification via Gemini `generateContent`
//!
//! Provides a `ClaimClassifier` trait with one implementation:
//! - **Gemini**: tries each configured model in priority order and returns the
//!   first answer the [`normalizer`](crate::normalizer) accepts
//!
//! There is no retry beyond the candidate list and no backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AiConfig, PLACEHOLDER_GEMINI_KEY};
use crate::models::{VerdictResult, AI_VERDICT_LABELS};
use crate::normalizer::{self, NormalizeError};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// ClaimClassifier trait
// ============================================================================

/// Abstraction over the external truthfulness scorer.
#[async_trait]
pub trait ClaimClassifier: Send + Sync {
    async fn classify(&self, claim: &str) -> Result<VerdictResult, ClassifyError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum CandidateError {
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Unusable model output: {0}")]
    Normalize(#[from] NormalizeError),
}

// The request URL carries the API key; keep it out of error text.
impl From<reqwest::Error> for CandidateError {
    fn from(e: reqwest::Error) -> Self {
        CandidateError::Http(e.without_url())
    }
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("No candidate models configured")]
    NoCandidates,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("All {attempts} candidate models failed; last error: {last}")]
    AllCandidatesFailed { attempts: usize, last: CandidateError },
}

// ============================================================================
// Prompt
// ============================================================================

/// Instruction sent to the model. The claim is embedded verbatim.
pub fn build_prompt(claim: &str) -> String {
    let labels = AI_VERDICT_LABELS
        .iter()
        .map(|l| format!("\"{}\"", l))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"তুমি 'যাচাই' নামের একজন AI ফ্যাক্ট-চেকার। তোমার কাজ বাংলাদেশের নির্বাচন সম্পর্কিত ভুল তথ্য শনাক্ত করা।
টেক্সট: "{claim}"
শুধুমাত্র JSON ফরম্যাটে উত্তর দাও:
{{
  "score": [০-১০০ পর্যন্ত একটি সংখ্যা],
  "verdict": [{labels}],
  "justification": "[সংক্ষিপ্ত ব্যাখ্যা বাংলায়]"
}}"#
    )
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiClassifier
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: Client,
    api_key: String,
    models: Vec<String>,
    base_url: String,
}

impl GeminiClassifier {
    pub fn new(config: &AiConfig) -> Result<Self, ClassifyError> {
        Self::with_base_url(config, GEMINI_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &AiConfig, base_url: String) -> Result<Self, ClassifyError> {
        if config.api_key.is_empty() || config.api_key == PLACEHOLDER_GEMINI_KEY {
            return Err(ClassifyError::MissingApiKey);
        }
        if config.models.is_empty() {
            return Err(ClassifyError::NoCandidates);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            models: config.models.clone(),
            base_url,
        })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// One `generateContent` call, returning the concatenated text parts.
    async fn generate_once(&self, model: &str, prompt: &str) -> Result<String, CandidateError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            return Err(CandidateError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CandidateError::EmptyResponse);
        }
        Ok(text)
    }

    async fn try_candidate(&self, model: &str, prompt: &str) -> Result<VerdictResult, CandidateError> {
        let raw = self.generate_once(model, prompt).await?;
        Ok(normalizer::normalize(&raw)?)
    }
}

#[async_trait]
impl ClaimClassifier for GeminiClassifier {
    async fn classify(&self, claim: &str) -> Result<VerdictResult, ClassifyError> {
        let prompt = build_prompt(claim);
        let mut last = None;

        for model in &self.models {
            match self.try_candidate(model, &prompt).await {
                Ok(result) => {
                    tracing::info!(model = %model, score = result.score, "Claim classified");
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Candidate model failed");
                    last = Some(e);
                }
            }
        }

        match last {
            Some(last) => Err(ClassifyError::AllCandidatesFailed {
                attempts: self.models.len(),
                last,
            }),
            None => Err(ClassifyError::NoCandidates),
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================
