use clap::Parser;
use ranker::llm::{Anthropic, Credentials, LLM, OpenAI};
use ranker::{Error, Method, Result, RetryPolicy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Which API serves the judge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    OpenAI,
    Anthropic,
}

/// Rank research proposals with an LLM-judged Swiss tournament.
#[derive(Parser, Debug)]
#[command(name = "tournament", version, about)]
pub struct Args {
    /// Model used as the judge; names containing "claude" go to Anthropic
    #[arg(long, default_value = "gpt-4-1106-preview")]
    pub engine: String,

    /// Directory holding the proposal JSON files
    #[arg(long, default_value = "openreview_benchmark")]
    pub cache_name: PathBuf,

    /// Number of tournament rounds
    #[arg(long, default_value_t = 5)]
    pub max_round: usize,

    /// Seed for the first-round shuffle and for the judge's sampling
    #[arg(long, default_value_t = 2024)]
    pub seed: u64,

    /// Comparison prompt: zero_shot, zero_shot_cot, few_shot or few_shot_cot
    #[arg(long, default_value = "zero_shot", value_parser = parse_method)]
    pub method: Method,

    /// File with demonstrations for the few-shot methods
    #[arg(long)]
    pub few_shot_demos: Option<PathBuf>,

    /// Directory for the per-round score snapshots
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Markdown transcript of every round
    #[arg(long)]
    pub transcript: Option<PathBuf>,

    /// Max comparisons in flight within a round
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Judge sampling temperature
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Attempts per comparison before the run is aborted
    #[arg(long, default_value_t = 3)]
    pub retries: usize,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 2)]
    pub retry_delay_secs: u64,

    /// JSON file with `api_key`, `organization_id` and `anthropic_key`
    #[arg(long)]
    pub keys: Option<PathBuf>,

    /// API key, overrides the keys file and OPENAI_API_KEY
    #[arg(long)]
    pub api_key: Option<String>,

    /// Organization id, overrides the keys file
    #[arg(long)]
    pub org_id: Option<String>,

    /// Anthropic API key, overrides the keys file and ANTHROPIC_API_KEY
    #[arg(long)]
    pub anthropic_key: Option<String>,

    /// Base URL of the selected API
    #[arg(long)]
    pub api_base: Option<String>,

    /// Print the final ranking as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

fn parse_method(s: &str) -> std::result::Result<Method, String> {
    s.parse().map_err(|e: ranker::Error| e.to_string())
}

fn load_keys(path: &Path) -> Result<Credentials> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

impl Args {
    /// Flags win over the keys file.
    pub fn credentials(&self) -> Result<Credentials> {
        let mut credentials = match &self.keys {
            Some(path) => load_keys(path)?,
            None => Credentials::default(),
        };

        if let Some(key) = &self.api_key {
            credentials.api_key = Some(key.clone());
        }
        if let Some(org) = &self.org_id {
            credentials.organization_id = Some(org.clone());
        }
        if let Some(key) = &self.anthropic_key {
            credentials.anthropic_key = Some(key.clone());
        }
        if let Some(base) = &self.api_base {
            credentials.api_base = Some(base.clone());
        }
        Ok(credentials)
    }

    pub fn backend(&self) -> Backend {
        if self.engine.contains("claude") {
            Backend::Anthropic
        } else {
            Backend::OpenAI
        }
    }

    /// Builds the judge's client for `--engine`.
    pub fn llm(&self) -> Result<Arc<dyn LLM + Send + Sync>> {
        let credentials = self.credentials()?;
        let llm: Arc<dyn LLM + Send + Sync> = match self.backend() {
            Backend::OpenAI => OpenAI::with_credentials(self.engine.clone(), credentials),
            Backend::Anthropic => Anthropic::with_credentials(self.engine.clone(), credentials)?,
        };
        Ok(llm)
    }

    /// The judge's sampling seed, which the APIs take as a signed integer.
    pub fn sampling_seed(&self) -> Result<i64> {
        i64::try_from(self.seed).map_err(|_| {
            Error::InvalidConfig(format!(
                "seed {} does not fit the API's signed 64-bit seed",
                self.seed
            ))
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn few_shot_demos(&self) -> Result<Option<String>> {
        Ok(self
            .few_shot_demos
            .as_ref()
            .map(std::fs::read_to_string)
            .transpose()?)
    }
}
