use crate::llm::{self, Credentials, Message, usage_cost};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Client for Anthropic's messages API, used for `claude` engines.
///
/// The API has no sampling seed, so `CompletionRequest::seed` is ignored.
pub struct Anthropic {
    model: String,
    api_key: String,
    api_base: String,
    client: Client,
}

impl Anthropic {
    /// Takes the key from `anthropic_key`, falling back to `ANTHROPIC_API_KEY`.
    pub fn with_credentials(model: String, credentials: Credentials) -> Result<Arc<Self>> {
        let api_key = credentials
            .anthropic_key
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or(Error::MissingArg(
                "anthropic_key is required for claude engines".to_string(),
            ))?;

        Ok(Arc::new(Self {
            model,
            api_key,
            api_base: credentials
                .api_base
                .unwrap_or_else(|| API_BASE.to_string()),
            client: Client::new(),
        }))
    }
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Turn<'a>>,
}

impl<'a> MessagesRequest<'a> {
    /// System turns are joined into the top-level `system` field.
    fn new(model: &'a str, request: &llm::CompletionRequest<'a>) -> Self {
        let mut system = Vec::new();
        let mut messages = Vec::new();
        for message in request.messages {
            match message {
                Message::System(text) => system.push(text.as_str()),
                Message::User(text) => messages.push(Turn {
                    role: "user",
                    content: text,
                }),
                Message::Assistant(text) => messages.push(Turn {
                    role: "assistant",
                    content: text,
                }),
            }
        }

        Self {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: (!system.is_empty()).then(|| system.join("\n")),
            messages,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    role: String,
    content: Vec<ContentBlock>,
    usage: Usage,
}

impl MessagesResponse {
    fn into_completion(self, model: &str) -> Result<llm::CompletionResponse> {
        if self.role != "assistant" {
            return Err(Error::LLMResponseError(
                "expected role to be assistant".to_string(),
            ));
        }

        let text = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>();
        if text.is_empty() {
            return Err(Error::LLMResponseError("content is empty".to_string()));
        }

        Ok(llm::CompletionResponse {
            content: text.concat(),
            cost: usage_cost(model, self.usage.input_tokens, self.usage.output_tokens),
        })
    }
}

#[async_trait]
impl llm::LLM for Anthropic {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let res = self
            .client
            .post(format!("{}/messages", self.api_base.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest::new(&self.model, &request))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(Error::LLMResponseError(format!(
                "anthropic api returned {status}: {body}"
            )));
        }

        res.json::<MessagesResponse>()
            .await?
            .into_completion(&self.model)
    }
}
