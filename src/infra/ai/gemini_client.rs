// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements the `TextGenerator` port with Google's Gemini API
// (https://ai.google.dev/gemini-api/docs).
//
// **API shape:**
// - Authentication: API key is passed as a query parameter (`?key=API_KEY`).
// - Request format: `contents[]` with nested `parts`.
// - Response format: text lives at `candidates[0].content.parts[*].text`.
//
// Greetings are one-shot: a single user turn in, a single text out. No
// conversation history, tools, or system instruction.
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - Your API key from https://aistudio.google.com/apikey
// - `GEMINI_MODEL` - Optional model override

use crate::core::greetings::{GenerationError, TextGenerator};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// These structs model the Gemini API request/response format.
// See: https://ai.google.dev/api/generate-content

/// A single part of content. Only text parts matter for greetings.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    /// Set on thought-summary parts when the model exposes its reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

/// A message in the conversation.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    /// Role: "user" or "model"
    role: String,
    parts: Vec<Part>,
}

/// Generation configuration options that control the model's output.
/// See: https://ai.google.dev/api/generate-content#generationconfig
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    /// Controls randomness. Range: [0.0, 2.0]. Higher = more creative.
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

/// Thinking configuration (Gemini 2.5+). Greetings always run with it off.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    include_thoughts: bool,
    thinking_budget: i32,
}

/// The request body sent to the Gemini generateContent endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

/// A candidate response from the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,

    /// Why the model stopped generating (e.g., "STOP", "SAFETY").
    finish_reason: Option<String>,
}

/// The response from the Gemini generateContent endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    /// List of candidate responses. Usually just one.
    candidates: Option<Vec<Candidate>>,
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

/// Client for Google's Gemini API.
///
/// # Example
/// ```ignore
/// let client = GeminiClient::new(api_key, "gemini-2.5-flash".to_string());
/// let text = client.generate("Write a haiku about birthdays").await?;
/// ```
pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            temperature: 0.9,
        }
    }

    fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        // thinkingConfig is only accepted by Gemini 2.5+ models.
        let supports_thinking = self.model.contains("2.5") || self.model.contains("gemini-3");
        let thinking_config = supports_thinking.then_some(ThinkingConfig {
            include_thoughts: false,
            thinking_budget: 0,
        });

        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                    thought: None,
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(self.temperature),
                thinking_config,
            }),
        }
    }

    /// Joins the text of the first candidate, skipping thought parts.
    fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| {
                GenerationError::Api(
                    "No candidates in Gemini response - the prompt may have been blocked"
                        .to_string(),
                )
            })?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            tracing::debug!(
                "Gemini returned no text (finish reason: {:?})",
                candidate.finish_reason
            );
            return Err(GenerationError::Empty);
        }

        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        // Format: https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let request = self.build_request(prompt);

        // Log request for debugging (be careful not to log the API key!)
        tracing::debug!("Gemini request to model {}", self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            // Try to parse as Gemini error response for better error messages
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(GenerationError::Api(format!(
                    "{} ({})",
                    error_response.error.message, status
                )));
            }

            return Err(GenerationError::Api(format!("{} - {}", status, error_text)));
        }

        let response_json: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Api(format!("Malformed Gemini response: {}", e)))?;

        Self::extract_text(response_json)
    }
}

// =============================================================================
// TESTS
// =============================================================================
