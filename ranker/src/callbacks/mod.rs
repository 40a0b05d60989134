use crate::Result;
use crate::tournament::RoundReport;
use async_trait::async_trait;

mod logger;
pub use logger::MatchLogger;

mod snapshot;
pub use snapshot::ScoreSnapshots;

/// Invoked once at the end of every tournament round.
#[async_trait]
pub trait Callback {
    async fn call(&mut self, report: &RoundReport) -> Result<()>;
}
