//! Groq (OpenAI-compatible) client for transcription and chat completion.
//!
//! Endpoints:
//! - POST {base}/audio/transcriptions (multipart: file, model, response_format)
//! - POST {base}/chat/completions (JSON-object response format)
//!
//! Auth: Bearer token

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatCompletion, CompletionRequest, SpeechToText};
use crate::config::GroqSettings;
use crate::domain::AudioUpload;

/// Groq API client
pub struct GroqClient {
    base_url: String,
    api_key: String,
    transcription_model: String,
    completion_model: String,
    client: reqwest::Client,
}

/// Response from the transcription endpoint
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl GroqClient {
    /// Create a client from resolved settings
    pub fn new(settings: &GroqSettings, timeout: Duration) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .context("GROQ_API_KEY not set")?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Groq HTTP client")?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            transcription_model: settings.transcription_model.clone(),
            completion_model: settings.completion_model.clone(),
            client,
        })
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn chat_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.completion_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.input,
                },
            ],
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

/// Extract and parse the JSON object carried in the first completion choice
fn parse_completion(response: ChatResponse) -> Result<serde_json::Value> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("Completion response has no content")?;

    serde_json::from_str(&content).context("Completion content is not valid JSON")
}

#[async_trait]
impl SpeechToText for GroqClient {
    async fn transcribe(&self, upload: &AudioUpload) -> Result<String> {
        let url = self.api_url("audio/transcriptions");

        let file_part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime_type)?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", self.transcription_model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to send transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription failed: {} - {}", status, error_text);
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        debug!(chars = result.text.len(), "Transcription received");
        Ok(result.text)
    }
}

#[async_trait]
impl ChatCompletion for GroqClient {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete_json(&self, request: &CompletionRequest) -> Result<serde_json::Value> {
        let url = self.api_url("chat/completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.chat_request(request))
            .send()
            .await
            .context("Failed to send completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion failed: {} - {}", status, error_text);
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        parse_completion(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GroqSettings {
        GroqSettings {
            base_url: "https://api.groq.com/openai/v1/".to_string(),
            api_key: Some("gsk-test".to_string()),
            transcription_model: "whisper-large-v3-turbo".to_string(),
            completion_model: "llama-3.3-70b-versatile".to_string(),
        }
    }

    #[test]
    fn test_api_url() {
        let client = GroqClient::new(&settings(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.api_url("chat/completions"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_missing_api_key() {
        let mut s = settings();
        s.api_key = None;
        assert!(GroqClient::new(&s, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_chat_request_shape() {
        let client = GroqClient::new(&settings(), Duration::from_secs(5)).unwrap();
        let request = CompletionRequest {
            instruction: "Format this".to_string(),
            input: "hello".to_string(),
            temperature: 0.1,
        };

        let body = serde_json::to_value(client.chat_request(&request)).unwrap();
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_parse_completion() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"summary\": \"S\"}"}}]}"#,
        )
        .unwrap();
        let value = parse_completion(response).unwrap();
        assert_eq!(value["summary"], "S");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parse_completion(empty).is_err());

        let not_json: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "plain words"}}]}"#,
        )
        .unwrap();
        assert!(parse_completion(not_json).is_err());
    }
}
