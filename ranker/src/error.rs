use async_openai::error::OpenAIError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Openai error: {0}")]
    OpenaiError(#[from] OpenAIError),

    #[error("Http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("No response from llm: {0}")]
    LLMResponseError(String),

    #[error("Missing arg: {0}")]
    MissingArg(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Tournament has no items to rank")]
    EmptyTournament,

    #[error("Item id {0} is used by more than one item")]
    DuplicateItemId(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: Box<Error> },

    #[error("Task join error: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}
