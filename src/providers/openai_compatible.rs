use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::CompletionModel;
use crate::profile::RelayConfig;
use crate::types::{GenerateRequest, GenerateResponse, Message, Role};
use crate::utils::http::send_checked;
use crate::{RelayError, Result};

/// Client for any chat/completions endpoint speaking the OpenAI wire
/// format. OpenRouter is the default target; the optional attribution
/// headers are the ones its quickstart documents.
#[derive(Clone)]
pub struct OpenAICompatible {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
    referer: Option<String>,
    title: Option<String>,
}

impl OpenAICompatible {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("reqwest client build should not fail");

        Self {
            http,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            default_model: String::new(),
            referer: None,
            title: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_attribution(mut self, referer: Option<String>, title: Option<String>) -> Self {
        self.referer = referer;
        self.title = title;
        self
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.api_key.clone())
            .with_base_url(config.base_url.clone())
            .with_model(config.model.clone())
            .with_attribution(config.referer.clone(), config.title.clone())
    }

    fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    fn resolve_model<'a>(&'a self, request: &'a GenerateRequest) -> Result<&'a str> {
        if let Some(model) = request.model.as_deref().filter(|m| !m.trim().is_empty()) {
            return Ok(model);
        }
        if !self.default_model.trim().is_empty() {
            return Ok(self.default_model.as_str());
        }
        Err(RelayError::InvalidResponse(
            "model is not set (set request.model or OpenAICompatible::with_model)".to_string(),
        ))
    }

    fn messages_to_chat_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|message| !message.content.trim().is_empty())
            .map(|message| {
                let role = match message.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": message.content })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatChoice {
    #[serde(default)]
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Default)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionModel for OpenAICompatible {
    fn provider(&self) -> &str {
        "openai-compatible"
    }

    fn model_id(&self) -> &str {
        self.default_model.as_str()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let model = self.resolve_model(&request)?;
        let messages = Self::messages_to_chat_messages(&request.messages);

        let mut body = Map::<String, Value>::new();
        body.insert("model".to_string(), Value::String(model.to_string()));
        body.insert("messages".to_string(), Value::Array(messages));
        if let Some(max_tokens) = request.max_tokens {
            body.insert("max_tokens".to_string(), Value::Number(max_tokens.into()));
        }

        let url = self.chat_completions_url();
        let mut req = self.http.post(url);
        if !self.api_key.trim().is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        if let Some(referer) = self.referer.as_deref() {
            req = req.header("HTTP-Referer", referer);
        }
        if let Some(title) = self.title.as_deref() {
            req = req.header("X-Title", title);
        }

        let response = send_checked(req.json(&body)).await?;
        let parsed = response.json::<ChatCompletionsResponse>().await?;
        let choice = parsed.choices.first().ok_or_else(|| {
            RelayError::InvalidResponse("chat/completions response has no choices".to_string())
        })?;

        Ok(GenerateResponse {
            text: choice.message.content.clone().unwrap_or_default(),
            model: parsed.model,
        })
    }
}
