use crate::Result;
use crate::callbacks::Callback;
use crate::tournament::RoundReport;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Writes the standings after each round to
/// `<dir>/score_predictions_<cache_id>_round_<n>.json`.
pub struct ScoreSnapshots {
    dir: PathBuf,
    cache_id: String,
}

impl ScoreSnapshots {
    /// `cache_name` may be a path; only its last component names the files.
    pub fn new(dir: &Path, cache_name: &str) -> Result<Box<Self>> {
        std::fs::create_dir_all(dir)?;

        let cache_id = Path::new(cache_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| cache_name.to_string());

        Ok(Box::new(Self {
            dir: dir.to_path_buf(),
            cache_id,
        }))
    }

    pub fn path(&self, round: usize) -> PathBuf {
        self.dir.join(format!(
            "score_predictions_{}_round_{}.json",
            self.cache_id, round
        ))
    }
}

#[async_trait]
impl Callback for ScoreSnapshots {
    async fn call(&mut self, report: &RoundReport) -> Result<()> {
        let scores = report
            .scores
            .iter()
            .map(|s| (s.id.clone(), Value::from(s.score)))
            .collect::<Map<_, _>>();

        let path = self.path(report.round);
        std::fs::write(&path, serde_json::to_string_pretty(&scores)?)?;
        tracing::info!(round = report.round, path = %path.display(), "saved score snapshot");

        Ok(())
    }
}
