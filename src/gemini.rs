//! Generation client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{GenerateError, StartupError};
use crate::prompt::build_prompt;
use crate::wire::RemovalResult;

/// Anything that can remove an element from an image given a description.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn generate(
        &self,
        image_base64: &str,
        mime_type: &str,
        user_prompt: &str,
    ) -> Result<RemovalResult, GenerateError>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, StartupError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http(
            http,
            config.api_key.clone(),
            config.model.clone(),
            config.api_base.clone(),
        ))
    }

    pub fn with_http(
        http: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

#[async_trait]
impl ImageEditor for GeminiClient {
    async fn generate(
        &self,
        image_base64: &str,
        mime_type: &str,
        user_prompt: &str,
    ) -> Result<RemovalResult, GenerateError> {
        let body = GeminiRequest::new(image_base64, mime_type, &build_prompt(user_prompt));
        let endpoint = self.endpoint();
        debug!("POST {} ({} bytes of image data)", endpoint, image_base64.len());

        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerateError::Transport(provider_error_message(
                status.as_u16(),
                &text,
            )));
        }

        let payload: GeminiResponse = response.json().await?;
        payload.into_result()
    }
}

/// Prefers the provider's `error.message`, else the raw body.
fn provider_error_message(status: u16, body: &str) -> String {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    if message.is_empty() {
        format!("provider returned HTTP {status}")
    } else {
        format!("provider returned HTTP {status}: {message}")
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<&'static str>,
}

impl GeminiRequest {
    fn new(image_base64: &str, mime_type: &str, prompt: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiRequestPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: mime_type.to_string(),
                            data: image_base64.to_string(),
                        },
                    },
                    GeminiRequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineDataResponse>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InlineDataResponse {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl GeminiResponse {
    /// Walks the first candidate's parts; later parts of the same kind overwrite earlier ones.
    fn into_result(self) -> Result<RemovalResult, GenerateError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            warn!("Gemini blocked the prompt: {}", reason);
        }

        let mut result = RemovalResult::default();
        let candidate = self.candidates.into_iter().next();

        if let Some(reason) = candidate
            .as_ref()
            .and_then(|candidate| candidate.finish_reason.as_deref())
            .filter(|reason| *reason != "STOP")
        {
            warn!("Gemini finished with reason {}", reason);
        }

        let parts = candidate
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default();

        for part in parts {
            let image = part
                .inline_data
                .and_then(|inline| inline.data)
                .filter(|data| !data.is_empty());
            if let Some(data) = image {
                result.image = Some(data);
            } else if let Some(text) = part.text.filter(|text| !text.is_empty()) {
                result.text = Some(text);
            }
        }

        if result.is_empty() {
            return Err(GenerateError::EmptyResponse);
        }
        Ok(result)
    }
}
