//! AI summary of an inspection record.
//!
//! The service never returns an error to its caller: an empty answer becomes
//! [`SummaryFallback::NoContent`] and any failure becomes
//! [`SummaryFallback::Failed`], after being logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::db::entities::car_record;
use crate::server::config::ServerConfig;

pub const SYSTEM_INSTRUCTION: &str =
    "أنت خبير في فحص السيارات المستعملة وتقديم التقارير الفنية الموجزة.";

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Gemini API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("API_KEY is not configured")]
    MissingApiKey,
}

/// A text-generation backend. `Ok(None)` means the model answered with no
/// text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<Option<String>, SummaryError>;
}

pub fn build_prompt(record: &car_record::Model) -> String {
    let d = &record.details;
    format!(
        "بصفتك خبير سيارات، قدم ملخصاً تقنياً مختصراً لهذه السيارة باللغة العربية:\n\
         الماركة: {}\n\
         النوع: {}\n\
         الموديل: {}\n\
         اللون: {}\n\
         رقم الشاسيه: {}\n\
         المسافة المقطوعة: {} كم\n\
         ملاحظات الفحص: {}",
        d.brand, d.car_type, d.model, d.color, d.chassis_number, d.mileage, d.notes
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SummaryError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, SummaryError> {
        Self::new(
            config.gemini_base_url.trim_end_matches('/'),
            config.gemini_model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.summary_timeout_secs),
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<Option<String>, SummaryError> {
        let api_key = self.api_key.as_deref().ok_or(SummaryError::MissingApiKey)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let payload = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFallback {
    NoContent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Generated(String),
    Fallback(SummaryFallback),
}

impl Summary {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Summary::Fallback(_))
    }

    pub fn text(&self, locale: &str) -> String {
        match self {
            Summary::Generated(text) => text.clone(),
            Summary::Fallback(SummaryFallback::NoContent) => {
                t!("summary.no_content", locale = locale).into_owned()
            }
            Summary::Fallback(SummaryFallback::Failed) => {
                t!("summary.failed", locale = locale).into_owned()
            }
        }
    }
}

#[derive(Clone)]
pub struct SummaryService {
    generator: Arc<dyn TextGenerator>,
}

impl SummaryService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn summarize(&self, record: &car_record::Model) -> Summary {
        let prompt = build_prompt(record);
        match self.generator.generate(SYSTEM_INSTRUCTION, &prompt).await {
            Ok(Some(text)) => {
                debug!(record_id = %record.id, chars = text.chars().count(), "Summary generated.");
                Summary::Generated(text)
            }
            Ok(None) => Summary::Fallback(SummaryFallback::NoContent),
            Err(e) => {
                error!(record_id = %record.id, error = %e, "Summary generation failed.");
                Summary::Fallback(SummaryFallback::Failed)
            }
        }
    }
}
