use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, CamsightError, Result};
use crate::frame::CapturedFrame;
use async_trait::async_trait;
use config::ConfigError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// External multimodal model: image plus instruction in, text out
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        frame: &CapturedFrame,
        prompt: &str,
    ) -> std::result::Result<String, AnalysisError>;
}

/// Client for a `generateContent` style REST endpoint
pub struct GenerativeClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl GenerativeClient {
    /// Fails with a configuration error when no credential is available
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            CamsightError::Config(ConfigError::Message(format!(
                "No API key configured: set analysis.api_key or the {} environment variable",
                config.api_key_env
            )))
        })?;

        // No overall request timeout; only the connect phase is bounded
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| CamsightError::system(format!("Failed to build HTTP client: {}", e)))?;

        let url = format!(
            "{}/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );
        debug!("Analysis endpoint: {}", url);

        Ok(Self { http, url, api_key })
    }

    fn error_for_status(status: StatusCode, body: &str) -> AnalysisError {
        let details = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| body.trim().to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AnalysisError::Authentication { details }
            }
            StatusCode::TOO_MANY_REQUESTS => AnalysisError::Quota { details },
            StatusCode::BAD_REQUEST => AnalysisError::MalformedInput { details },
            other => AnalysisError::Service {
                status: other.as_u16(),
                details,
            },
        }
    }
}

#[async_trait]
impl AnalysisService for GenerativeClient {
    async fn analyze(
        &self,
        frame: &CapturedFrame,
        prompt: &str,
    ) -> std::result::Result<String, AnalysisError> {
        if frame.is_empty() {
            return Err(AnalysisError::MalformedInput {
                details: "captured frame is empty".to_string(),
            });
        }

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: CapturedFrame::MIME_TYPE.to_string(),
                            data: frame.base64(),
                        },
                    },
                ],
            }],
        };

        debug!(
            "Sending {} byte still {} for analysis",
            frame.len(),
            frame.id
        );

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Network {
                details: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AnalysisError::Network {
            details: e.to_string(),
        })?;

        if !status.is_success() {
            let error = Self::error_for_status(status, &text);
            warn!("Analysis request failed: {}", error);
            return Err(error);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| AnalysisError::MalformedResponse {
                details: e.to_string(),
            })?;

        let answer = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .map(|answer| answer.trim().to_string())
            .filter(|answer| !answer.is_empty())
            .ok_or_else(|| AnalysisError::MalformedResponse {
                details: "response contained no text".to_string(),
            })?;

        Ok(answer)
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
