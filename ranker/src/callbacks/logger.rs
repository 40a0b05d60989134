use crate::Result;
use crate::callbacks::Callback;
use crate::tournament::{MatchRecord, RoundReport};
use async_trait::async_trait;
use std::io::Write;

/// Writes a markdown transcript of every round.
pub struct MatchLogger<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> MatchLogger<W> {
    pub fn new(name: &str, mut writer: W) -> Result<Box<Self>> {
        write!(writer, "## {}\n\n", name)?;

        Ok(Box::new(Self { writer }))
    }

    fn display_match(&mut self, record: &MatchRecord) -> Result<()> {
        write!(
            self.writer,
            "- `{}` vs `{}`: **{}** wins",
            record.first,
            record.second,
            record.winner()
        )?;
        if record.judgement.malformed {
            write!(self.writer, " (unparsed verdict)")?;
        }
        writeln!(self.writer)?;

        for line in record.judgement.response.trim().lines() {
            writeln!(self.writer, "\t> {}", line)?;
        }
        Ok(())
    }

    fn display_standings(&mut self, report: &RoundReport) -> Result<()> {
        write!(self.writer, "\n| item | score |\n|---|---|\n")?;

        let mut standings = report.scores.iter().collect::<Vec<_>>();
        standings.sort_by_key(|s| std::cmp::Reverse(s.score));

        standings
            .iter()
            .try_for_each(|s| writeln!(self.writer, "| {} | {} |", s.id, s.score))?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> Callback for MatchLogger<W> {
    async fn call(&mut self, report: &RoundReport) -> Result<()> {
        write!(self.writer, "### Round {}\n", report.round)?;

        for record in &report.matches {
            self.display_match(record)?;
        }
        if let Some(bye) = &report.bye {
            writeln!(self.writer, "- `{}` has a bye", bye)?;
        }

        self.display_standings(report)?;
        write!(self.writer, "---\n")?;
        self.writer.flush()?;

        Ok(())
    }
}
