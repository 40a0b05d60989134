mod config;
mod output;
mod ranking;

use clap::Parser;
use ranker::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = config::Args::parse();
    let llm = args.llm()?;
    tracing::info!(engine = %args.engine, backend = ?args.backend(), "judge ready");

    let rankings = ranking::Ranking::new(llm, &args)?.run().await?;

    let stdout = std::io::stdout().lock();
    if args.json {
        output::write_json(stdout, &rankings, args.max_round)?;
    } else {
        output::write_table(stdout, &rankings, args.max_round)?;
    }

    Ok(())
}
