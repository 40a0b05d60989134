/// Final ranking output: terminal table and JSON.
use ranker::{Rankings, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct JsonRankedItem<'a> {
    rank: usize,
    id: &'a str,
    score: u32,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    items: Vec<JsonRankedItem<'a>>,
    rounds: usize,
    comparisons: usize,
    malformed_verdicts: usize,
    cost: f64,
}

/// Writes the ranking as a table, best first.
pub fn write_table(mut w: impl Write, rankings: &Rankings, rounds: usize) -> Result<()> {
    let sorted = rankings.sorted();
    let id_width = sorted.iter().map(|s| s.id.len()).max().unwrap_or(4).max(4);

    writeln!(w, " # | {:<id_width$} | Score", "Item")?;
    writeln!(w, "---|-{}-|------", "-".repeat(id_width))?;
    for (i, s) in sorted.iter().enumerate() {
        writeln!(w, "{:>2} | {:<id_width$} | {:>5}", i + 1, s.id, s.score)?;
    }

    writeln!(
        w,
        "\n{} items ranked across {} rounds ({} comparisons, ${:.4})",
        sorted.len(),
        rounds,
        rankings.comparisons,
        rankings.cost,
    )?;
    if rankings.malformed > 0 {
        writeln!(
            w,
            "{} verdicts could not be parsed and were counted for the second item",
            rankings.malformed
        )?;
    }
    Ok(())
}

/// Writes the ranking as pretty JSON, best first.
pub fn write_json(mut w: impl Write, rankings: &Rankings, rounds: usize) -> Result<()> {
    let items = rankings
        .sorted()
        .into_iter()
        .enumerate()
        .map(|(i, s)| JsonRankedItem {
            rank: i + 1,
            id: &s.id,
            score: s.score,
        })
        .collect();

    let output = JsonOutput {
        items,
        rounds,
        comparisons: rankings.comparisons,
        malformed_verdicts: rankings.malformed,
        cost: rankings.cost,
    };

    writeln!(w, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}
