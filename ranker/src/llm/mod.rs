use crate::Result;
use async_trait::async_trait;

mod anthropic;
mod openai;
pub use anthropic::Anthropic;
pub use openai::{Credentials, OpenAI};

/// A chat turn. Both backends accept all three roles; Anthropic moves
/// system turns into its top-level `system` field.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    User(String),
    Assistant(String),
    System(String),
}

pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub temperature: f32,
    pub max_tokens: u32,
    pub seed: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct CompletionResponse {
    pub content: String,
    /// Dollar cost of the call, zero when the model has no known price.
    pub cost: f64,
}

#[async_trait]
pub trait LLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse>;
}

/// Dollar prices per million (prompt, completion) tokens.
const PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.6),
    ("gpt-4o", 2.5, 10.0),
    ("gpt-4-turbo", 10.0, 30.0),
    ("gpt-4-1106-preview", 10.0, 30.0),
    ("gpt-4-0125-preview", 10.0, 30.0),
    ("gpt-4", 30.0, 60.0),
    ("gpt-3.5-turbo", 0.5, 1.5),
    ("claude-3-opus", 15.0, 75.0),
    ("claude-3-sonnet", 3.0, 15.0),
    ("claude-3-5-sonnet", 3.0, 15.0),
    ("claude-3-haiku", 0.25, 1.25),
    ("claude-3-5-haiku", 0.8, 4.0),
];

/// Looks up the longest matching model prefix so dated snapshots share a price.
pub(crate) fn usage_cost(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    PRICES
        .iter()
        .filter(|(name, _, _)| model.starts_with(name))
        .max_by_key(|(name, _, _)| name.len())
        .map(|(_, input, output)| {
            (prompt_tokens as f64 * input + completion_tokens as f64 * output) / 1_000_000.0
        })
        .unwrap_or(0.0)
}
