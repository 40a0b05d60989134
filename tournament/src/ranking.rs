use crate::config::Args;
use ranker::callbacks::{MatchLogger, ScoreSnapshots};
use ranker::llm::LLM;
use ranker::proposal::load_proposals;
use ranker::{Error, LLMJudge, Proposal, Rankings, Result, Tournament, TournamentBuilder};
use serde_json::Value;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

/// One ranking run over a directory of proposals.
pub struct Ranking {
    tournament: Tournament<Value>,
    proposals: Vec<Proposal>,
}

impl Ranking {
    pub fn new(llm: Arc<dyn LLM + Send + Sync>, args: &Args) -> Result<Self> {
        let proposals = load_proposals(&args.cache_name)?;
        if proposals.is_empty() {
            return Err(Error::EmptyTournament);
        }
        tracing::info!(
            proposals = proposals.len(),
            dir = %args.cache_name.display(),
            "loaded proposals"
        );

        let mut judge = LLMJudge::new(llm)
            .method(args.method)
            .retry(args.retry_policy())
            .temperature(args.temperature)
            .seed(args.sampling_seed()?);
        if let Some(demos) = args.few_shot_demos()? {
            judge = judge.few_shot_demos(demos);
        }

        let cache_name = args.cache_name.to_string_lossy();
        let mut builder = TournamentBuilder::<Value>::new()
            .oracle(Arc::new(judge.validate()?))
            .rounds(args.max_round)
            .seed(args.seed)
            .concurrency(args.concurrency)
            .callback(ScoreSnapshots::new(&args.log_dir, &cache_name)?);

        if let Some(path) = &args.transcript {
            let writer = BufWriter::new(File::create(path)?);
            builder = builder.callback(MatchLogger::new(&cache_name, writer)?);
        }

        Ok(Self {
            tournament: builder.build()?,
            proposals,
        })
    }

    pub async fn run(mut self) -> Result<Rankings> {
        self.tournament.rank(self.proposals).await
    }
}
