use crate::llm::{self, usage_cost};
use crate::{Error, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        Role,
    },
};
use async_trait::async_trait;
use serde::Deserialize;

/// API credentials, in the shape of a `keys.json` file. Missing OpenAI fields
/// fall back to the `OPENAI_*` environment variables read by the client.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
    pub anthropic_key: Option<String>,
    pub api_base: Option<String>,
}

impl From<Credentials> for OpenAIConfig {
    fn from(credentials: Credentials) -> Self {
        let mut config = OpenAIConfig::default();
        if let Some(key) = credentials.api_key {
            config = config.with_api_key(key);
        }
        if let Some(org) = credentials.organization_id {
            config = config.with_org_id(org);
        }
        if let Some(base) = credentials.api_base {
            config = config.with_api_base(base);
        }
        config
    }
}

pub struct OpenAI {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAI {
    pub fn with_credentials(model: String, credentials: Credentials) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            model,
            client: Client::with_config(credentials.into()),
        })
    }
}

impl TryFrom<&llm::Message> for ChatCompletionRequestMessage {
    type Error = Error;

    fn try_from(msg: &llm::Message) -> Result<Self> {
        match msg {
            llm::Message::User(msg) => Ok(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::System(msg) => Ok(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::Assistant(msg) => Ok(ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.clone(),
                    ))
                    .build()?,
            )),
        }
    }
}

#[async_trait]
impl llm::LLM for OpenAI {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let mut completion = CreateChatCompletionRequestArgs::default();
        completion
            .model(&self.model)
            .messages(
                request
                    .messages
                    .iter()
                    .map(ChatCompletionRequestMessage::try_from)
                    .collect::<Result<Vec<_>>>()?,
            )
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens);

        if let Some(seed) = request.seed {
            completion.seed(seed);
        }

        let completion = completion.build()?;

        let res = self.client.chat().create(completion).await?;

        let choice = res
            .choices
            .first()
            .ok_or(Error::LLMResponseError("choices is empty".to_string()))?;

        if choice.message.role != Role::Assistant {
            return Err(Error::LLMResponseError(
                "expected role to be assistant".to_string(),
            ));
        }

        let content = choice
            .message
            .content
            .as_ref()
            .ok_or(Error::LLMResponseError("content is empty".to_string()))?;

        let cost = res
            .usage
            .as_ref()
            .map(|usage| usage_cost(&self.model, usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or(0.0);

        Ok(llm::CompletionResponse {
            content: content.clone(),
            cost,
        })
    }
}
