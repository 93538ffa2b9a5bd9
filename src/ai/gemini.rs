//! Gemini API client implementation.
//!
//! One-shot `generateContent` calls with a JSON response MIME type. No
//! automatic retry and no client-side timeout: failures surface only when
//! the underlying call rejects, and the caller decides what to do.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AiError, GenerativeModel};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model requested when the config does not name one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-04-17";

/// Placeholder value shipped in deployment templates; treated the same as
/// an unset key.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

/// Gemini REST client.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiModel {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }

    /// Reject unset or placeholder credentials before any request goes out.
    fn require_credentials(&self) -> Result<(), AiError> {
        if self.api_key.trim().is_empty() || self.api_key == PLACEHOLDER_API_KEY {
            return Err(AiError::InvalidCredentials);
        }
        Ok(())
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate(&self, prompt: &str, temperature: f64) -> Result<String, AiError> {
        self.require_credentials()?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature,
            },
        };

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        tracing::debug!(model = %self.model, "Sending request to Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed(anyhow::anyhow!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            if body.contains("API_KEY_INVALID") || body.contains("API key not valid") {
                return Err(AiError::InvalidCredentials);
            }
            return Err(AiError::RequestFailed(anyhow::anyhow!(
                "Gemini API error {status}: {body}"
            )));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            AiError::RequestFailed(anyhow::anyhow!("unreadable Gemini response: {e}, body: {body}"))
        })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AiError::RequestFailed(anyhow::anyhow!("no candidates in Gemini response"))
            })?;

        Ok(text)
    }
}

/// Gemini `generateContent` request format.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    temperature: f64,
}

/// Gemini `generateContent` response format, reduced to what we read.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_key_short_circuits_without_network() {
        let model = GeminiModel::new(String::new(), DEFAULT_GEMINI_MODEL.to_string());
        let err = model.generate("anything", 0.5).await.unwrap_err();
        assert!(matches!(err, AiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_placeholder_key_short_circuits_without_network() {
        let model = GeminiModel::new(
            PLACEHOLDER_API_KEY.to_string(),
            DEFAULT_GEMINI_MODEL.to_string(),
        );
        let err = model.generate("anything", 0.5).await.unwrap_err();
        assert!(matches!(err, AiError::InvalidCredentials));
    }

    #[test]
    fn test_response_parsing_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"[\"a\""},{"text":",\"b\"]"}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.clone())
            .collect();
        assert_eq!(text, "[\"a\",\"b\"]");
    }
}
