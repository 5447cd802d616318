use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::Config;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "gemini", "ollama" or "openai"
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

fn default_retry_count() -> usize {
    2
}
fn default_retry_delay() -> u64 {
    2
}
fn default_timeout() -> u64 {
    120
}

/// Sampling options for one `complete` call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Overrides the provider's configured model when set.
    #[serde(default)]
    pub model: Option<String>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            model: None,
            max_output_tokens,
            temperature,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

pub fn create_llm(config: &Config) -> Result<Arc<dyn LlmClient>> {
    info!("Initializing LLM client for provider: {}", config.llm.provider);
    let timeout = Duration::from_secs(config.llm.timeout_seconds);
    let client: Box<dyn LlmClient> = match config.llm.provider.as_str() {
        "gemini" => {
            let cfg = config.llm.gemini.as_ref().context("Gemini config missing")?;
            Box::new(GeminiClient::new(cfg, timeout)?)
        }
        "ollama" => {
            let cfg = config.llm.ollama.as_ref().context("Ollama config missing")?;
            Box::new(OllamaClient::new(&cfg.base_url, &cfg.model, timeout)?)
        }
        "openai" => {
            let cfg = config.llm.openai.as_ref().context("OpenAI config missing")?;
            Box::new(OpenAIClient::new(
                &cfg.api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
                timeout,
            )?)
        }
        _ => return Err(anyhow!("Unknown LLM provider: {}", config.llm.provider)),
    };

    Ok(Arc::new(RetryingLlm::new(
        client,
        config.llm.retry_count,
        Duration::from_secs(config.llm.retry_delay_seconds),
    )))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

// --- Retry ---

/// Retries failed calls with a fixed delay. Timeouts count as failures.
#[derive(Debug)]
pub struct RetryingLlm {
    inner: Box<dyn LlmClient>,
    retries: usize,
    delay: Duration,
}

impl RetryingLlm {
    pub fn new(inner: Box<dyn LlmClient>, retries: usize, delay: Duration) -> Self {
        Self {
            inner,
            retries,
            delay,
        }
    }
}

#[async_trait]
impl LlmClient for RetryingLlm {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let attempts = self.retries + 1;
        let mut last_error = anyhow!("Unknown error");

        for attempt in 0..attempts {
            if attempt > 0 {
                warn!("LLM call failed (attempt {}/{}), retrying...", attempt + 1, attempts);
                tokio::time::sleep(self.delay).await;
            }

            match self.inner.complete(prompt, options).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("LLM error: {:#}", e);
                    last_error = e;
                }
            }
        }

        Err(last_error.context(format!("LLM call still failing after {} attempts", attempts)))
    }
}

// --- Gemini ---
#[derive(Debug)]
struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(cfg: &GeminiConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg
                .base_url
                .as_deref()
                .unwrap_or("https://generativelanguage.googleapis.com/v1beta")
                .trim_end_matches('/')
                .to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(&self.model);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                return Err(anyhow!(
                    "Failed to parse Gemini response: {}. Body: {}",
                    e,
                    response_text
                ))
            }
        };

        if let Some(err) = result.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }

        if let Some(first) = result.candidates.as_ref().and_then(|c| c.first()) {
            if let Some(part) = first.content.as_ref().and_then(|c| c.parts.first()) {
                return Ok(part.text.clone());
            }

            let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
            return Err(anyhow!("Gemini response empty. Finish reason: {}", reason));
        }

        Err(anyhow!(
            "Gemini response format unexpected or empty. Body: {}",
            response_text
        ))
    }
}

// --- Ollama ---
#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_output_tokens,
            },
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.content)
    }
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let result: OpenAIResponse = resp.json().await?;
        result
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("OpenAI response empty or missing content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_gemini_response_parsing_safety_block() {
        let json = r#"{
            "candidates": [
                {
                    "finishReason": "SAFETY",
                    "index": 0
                }
            ]
        }"#;

        let result: GeminiResponse = serde_json::from_str(json).unwrap();
        let candidate = &result.candidates.as_ref().unwrap()[0];

        assert!(candidate.content.is_none());
        assert_eq!(candidate.finish_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_gemini_request_carries_generation_config() {
        let request = GeminiRequest {
            contents: vec![],
            generation_config: GeminiGenerationConfig {
                temperature: 0.5,
                max_output_tokens: 256,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(value["generationConfig"]["temperature"], 0.5);
    }

    #[tokio::test]
    async fn test_gemini_candidate_text_returned() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"candidates":[{"content":{"parts":[{"text":"こんにちは"}],"role":"model"},"finishReason":"STOP"}]}"#,
            ))
            .mount(&server)
            .await;

        let client = GeminiClient::new(
            &GeminiConfig {
                api_key: "k".to_string(),
                model: "gemini-test".to_string(),
                base_url: Some(server.uri()),
            },
            Duration::from_secs(5),
        )?;
        let text = client
            .complete("hi", &CompletionOptions::new(0.5, 64))
            .await?;
        assert_eq!(text, "こんにちは");
        Ok(())
    }

    #[tokio::test]
    async fn test_openai_sends_sampling_options() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "override-model",
                "temperature": 0.5,
                "max_tokens": 50
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"ok"},"finish_reason":"stop"}]}"#,
            ))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("sk-test", "default-model", Some(&server.uri()), Duration::from_secs(5))?;
        let options = CompletionOptions {
            model: Some("override-model".to_string()),
            max_output_tokens: 50,
            temperature: 0.5,
        };
        assert_eq!(client.complete("hello", &options).await?, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_ollama_error_status_is_reported() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&format!("{}/", server.uri()), "llama", Duration::from_secs(5))?;
        let err = client
            .complete("hello", &CompletionOptions::new(0.2, 10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
        Ok(())
    }

    #[derive(Debug)]
    struct FlakyLlm {
        failures_left: Mutex<usize>,
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl LlmClient for FlakyLlm {
        async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("timeout"));
            }
            Ok("recovered".to_string())
        }
    }

    #[tokio::test]
    async fn test_retrying_llm_recovers_within_budget() -> Result<()> {
        let calls = Arc::new(Mutex::new(0));
        let llm = RetryingLlm::new(
            Box::new(FlakyLlm {
                failures_left: Mutex::new(2),
                calls: calls.clone(),
            }),
            2,
            Duration::ZERO,
        );
        assert_eq!(llm.complete("p", &CompletionOptions::new(0.1, 1)).await?, "recovered");
        assert_eq!(*calls.lock().unwrap(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_retrying_llm_gives_up() {
        let calls = Arc::new(Mutex::new(0));
        let llm = RetryingLlm::new(
            Box::new(FlakyLlm {
                failures_left: Mutex::new(5),
                calls: calls.clone(),
            }),
            1,
            Duration::ZERO,
        );
        let err = llm
            .complete("p", &CompletionOptions::new(0.1, 1))
            .await
            .unwrap_err();
        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(format!("{:#}", err).contains("timeout"));
    }
}
