pub mod callbacks;
mod error;
pub mod llm;
pub mod oracle;
pub mod proposal;
pub mod retry;
pub mod tournament;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use oracle::{Judgement, LLMJudge, Method, Oracle, RubricScore, RubricScorer, Winner};
pub use proposal::{Entry, Proposal};
pub use retry::RetryPolicy;
pub use tournament::{Rankings, Tournament, TournamentBuilder};
