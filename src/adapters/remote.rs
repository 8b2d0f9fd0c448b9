//! Name generator backed by a hosted LLM (Anthropic Messages API).
//!
//! Without an API key the generator degrades to the offline keyword
//! heuristic, so a misconfigured deployment still produces names.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RemoteLlmConfig;
use crate::domain::{CandidateName, ContentSample};

use super::{NameGenError, NameGenerator, SimulatedNamer};

/// Characters of the sample included in the prompt
const PROMPT_SAMPLE_CHARS: usize = 500;

/// Settings for [`RemoteNamer`]
#[derive(Debug, Clone)]
pub struct RemoteNamerConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&RemoteLlmConfig> for RemoteNamerConfig {
    fn from(config: &RemoteLlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Asks a hosted model for a short descriptive filename
pub struct RemoteNamer {
    client: reqwest::Client,
    config: RemoteNamerConfig,
    offline: SimulatedNamer,
}

impl RemoteNamer {
    pub fn new(config: RemoteNamerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client with timeout, using defaults");
                reqwest::Client::new()
            });

        if config.api_key.is_none() {
            warn!("No API key for remote naming, falling back to the offline heuristic");
        } else {
            info!(endpoint = %config.endpoint, model = %config.model, "Remote naming enabled");
        }

        Self {
            client,
            config,
            offline: SimulatedNamer::new(),
        }
    }

    /// Whether requests will actually go to the remote endpoint
    pub fn is_online(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn request_name(&self, api_key: &str, sample: &ContentSample) -> Result<String, NameGenError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: build_prompt(&sample.text),
            }],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NameGenError::Timeout(self.config.timeout)
                } else {
                    NameGenError::Http(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(NameGenError::Api { status, message });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| NameGenError::Response(e.to_string()))?;

        Ok(body
            .content
            .into_iter()
            .filter(|c| c.block_type == "text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl NameGenerator for RemoteNamer {
    fn name(&self) -> &str {
        if self.is_online() {
            "remote"
        } else {
            "remote(offline)"
        }
    }

    async fn try_generate(&self, sample: &ContentSample) -> Result<CandidateName, NameGenError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return self.offline.try_generate(sample).await;
        };

        let reply = self.request_name(api_key, sample).await?;
        let name = clean_reply(&reply);
        if name.is_empty() {
            return Err(NameGenError::EmptyName);
        }
        Ok(CandidateName::new(name))
    }
}

/// Prompt for a 3-5 word underscore filename from the head of the sample
pub fn build_prompt(sample: &str) -> String {
    let head: String = sample.chars().take(PROMPT_SAMPLE_CHARS).collect();
    format!(
        "Based on the following text content, generate a short, descriptive filename \
         (3-5 words, no file extension). Use underscores between words. \
         Only respond with the filename, nothing else.\n\nContent:\n{}\n\nFilename:",
        head
    )
}

/// First line of the reply, reduced to word characters, spaces and hyphens,
/// with whitespace runs turned into underscores
pub fn clean_reply(reply: &str) -> String {
    let first_line = reply.trim().lines().next().unwrap_or("");

    let kept: String = first_line
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn offline_config() -> RemoteNamerConfig {
        RemoteNamerConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            model: "test-model".to_string(),
            api_key: None,
            max_tokens: 50,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_clean_reply() {
        assert_eq!(clean_reply("Quarterly Revenue Summary\nExtra text"), "Quarterly_Revenue_Summary");
        assert_eq!(clean_reply("  \"Budget: 2024 plan\"  "), "Budget_2024_plan");
        assert_eq!(clean_reply("already_snake-case"), "already_snake-case");
        assert_eq!(clean_reply("!!!"), "");
    }

    #[test]
    fn test_prompt_uses_sample_head() {
        let sample = "x".repeat(2000);
        let prompt = build_prompt(&sample);
        assert!(prompt.contains(&"x".repeat(PROMPT_SAMPLE_CHARS)));
        assert!(!prompt.contains(&"x".repeat(PROMPT_SAMPLE_CHARS + 1)));
    }

    #[tokio::test]
    async fn test_without_key_uses_offline_heuristic() {
        let namer = RemoteNamer::new(offline_config());
        assert!(!namer.is_online());

        let sample = ContentSample::truncated("Q4 revenue summary...", 1000, PathBuf::from("/in/a.pdf"));
        let name = namer.generate(&sample).await;
        assert_eq!(name.raw, "revenue_summary");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let namer = RemoteNamer::new(RemoteNamerConfig {
            api_key: Some("test-key".to_string()),
            ..offline_config()
        });

        let sample = ContentSample::truncated("Q4 revenue summary", 1000, PathBuf::from("/in/a.pdf"));
        assert!(namer.try_generate(&sample).await.is_err());

        let name = namer.generate(&sample).await;
        assert!(name.raw.starts_with("document_"));
    }
}
