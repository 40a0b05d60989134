use crate::callbacks;
use crate::oracle::{Judgement, Oracle, Winner};
use crate::proposal::Entry;
use crate::{Error, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

type Callback = Box<dyn callbacks::Callback + Send>;
type SharedOracle<T> = Arc<dyn Oracle<T> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Score {
    pub id: String,
    pub score: u32,
}

#[derive(Clone, Debug)]
pub struct MatchRecord {
    pub first: String,
    pub second: String,
    pub judgement: Judgement,
}

impl MatchRecord {
    pub fn winner(&self) -> &str {
        match self.judgement.winner {
            Winner::First => &self.first,
            Winner::Second => &self.second,
        }
    }
}

/// Everything that happened in one round, handed to the round callbacks.
#[derive(Clone, Debug)]
pub struct RoundReport {
    /// 1-based round number.
    pub round: usize,
    pub matches: Vec<MatchRecord>,
    pub bye: Option<String>,
    /// Scores after the round, in input order.
    pub scores: Vec<Score>,
}

/// Final result of a tournament run.
#[derive(Clone, Debug)]
pub struct Rankings {
    /// One score per entry, in input order.
    pub scores: Vec<Score>,
    pub comparisons: usize,
    pub malformed: usize,
    pub cost: f64,
}

impl Rankings {
    pub fn get(&self, id: &str) -> Option<u32> {
        self.scores.iter().find(|s| s.id == id).map(|s| s.score)
    }

    /// Scores from best to worst; ties keep input order.
    pub fn sorted(&self) -> Vec<&Score> {
        let mut sorted = self.scores.iter().collect::<Vec<_>>();
        sorted.sort_by_key(|s| Reverse(s.score));
        sorted
    }
}

/// Splits a standings order into consecutive pairs plus the odd one out.
fn pair_up(order: &[usize]) -> (Vec<(usize, usize)>, Option<usize>) {
    let pairs = order
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();
    let bye = order.chunks_exact(2).remainder().first().copied();
    (pairs, bye)
}

/// Swiss-style tournament: every round re-pairs neighbours in the standings.
pub struct Tournament<T> {
    oracle: SharedOracle<T>,
    rounds: usize,
    seed: u64,
    shuffle: bool,
    concurrency: usize,
    callbacks: Vec<Callback>,
}

impl<T: Send + Sync + 'static> Tournament<T> {
    fn snapshot(entries: &[Entry<T>], scores: &[u32]) -> Vec<Score> {
        entries
            .iter()
            .zip(scores)
            .map(|(entry, &score)| Score {
                id: entry.id.clone(),
                score,
            })
            .collect()
    }

    /// Judges every pair of a round with at most `concurrency` calls in
    /// flight. Judgements come back in pair order.
    async fn play(
        &self,
        entries: &Arc<Vec<Entry<T>>>,
        pairs: &[(usize, usize)],
    ) -> Result<Vec<Judgement>> {
        let mut judgements: Vec<Option<Judgement>> = vec![None; pairs.len()];
        let mut pending = pairs.iter().copied().enumerate();
        let mut running = JoinSet::new();

        loop {
            while running.len() < self.concurrency {
                let Some((slot, (first, second))) = pending.next() else {
                    break;
                };
                let oracle = self.oracle.clone();
                let entries = entries.clone();
                running.spawn(async move {
                    let judgement = oracle
                        .compare(&entries[first].item, &entries[second].item)
                        .await?;
                    Ok::<_, Error>((slot, judgement))
                });
            }

            match running.join_next().await {
                Some(res) => {
                    let (slot, judgement) = res??;
                    judgements[slot] = Some(judgement);
                }
                None => break,
            }
        }

        judgements
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::LLMResponseError("comparison was never judged".to_string()))
    }

    /// Ranks `entries` over the configured number of rounds.
    ///
    /// Only the first round uses the shuffled order. Every later round
    /// starts again from input order and stable-sorts it by score, so ties
    /// are broken by input position. Each call reseeds the shuffle, so
    /// repeated calls on the same tournament pair identically.
    ///
    /// Fails on empty input, duplicate ids, an oracle error or a callback
    /// error; rounds reported before the failure are not rolled back.
    pub async fn rank(&mut self, entries: Vec<Entry<T>>) -> Result<Rankings> {
        if entries.is_empty() {
            return Err(Error::EmptyTournament);
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(Error::DuplicateItemId(entry.id.clone()));
            }
        }

        let entries = Arc::new(entries);
        let mut scores = vec![0u32; entries.len()];
        let mut shuffled = (0..entries.len()).collect::<Vec<_>>();
        if self.shuffle {
            shuffled.shuffle(&mut StdRng::seed_from_u64(self.seed));
        }

        let mut rankings = Rankings {
            scores: Vec::new(),
            comparisons: 0,
            malformed: 0,
            cost: 0.0,
        };

        for round in 1..=self.rounds {
            let mut order = if round == 1 {
                shuffled.clone()
            } else {
                (0..entries.len()).collect::<Vec<_>>()
            };
            order.sort_by_key(|&i| Reverse(scores[i]));
            let (pairs, bye) = pair_up(&order);

            tracing::info!(round, matches = pairs.len(), "starting round");
            let judgements = self.play(&entries, &pairs).await?;

            let mut matches = Vec::with_capacity(pairs.len());
            for (&(first, second), judgement) in pairs.iter().zip(judgements) {
                match judgement.winner {
                    Winner::First => scores[first] += 1,
                    Winner::Second => scores[second] += 1,
                }
                rankings.comparisons += 1;
                rankings.malformed += usize::from(judgement.malformed);
                rankings.cost += judgement.cost;

                let record = MatchRecord {
                    first: entries[first].id.clone(),
                    second: entries[second].id.clone(),
                    judgement,
                };
                tracing::debug!(round, first = %record.first, second = %record.second, winner = %record.winner(), "match judged");
                matches.push(record);
            }

            if let Some(i) = bye {
                scores[i] += 1;
            }

            let report = RoundReport {
                round,
                matches,
                bye: bye.map(|i| entries[i].id.clone()),
                scores: Self::snapshot(&entries, &scores),
            };
            for callback in &mut self.callbacks {
                callback.call(&report).await?;
            }
        }

        rankings.scores = Self::snapshot(&entries, &scores);
        tracing::info!(
            comparisons = rankings.comparisons,
            malformed = rankings.malformed,
            cost = rankings.cost,
            "tournament finished"
        );
        Ok(rankings)
    }
}

pub struct TournamentBuilder<T> {
    oracle: Option<SharedOracle<T>>,
    rounds: usize,
    seed: u64,
    shuffle: bool,
    concurrency: usize,
    callbacks: Vec<Callback>,
}

impl<T> Default for TournamentBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TournamentBuilder<T> {
    pub fn new() -> Self {
        Self {
            oracle: None,
            rounds: 5,
            seed: 2024,
            shuffle: true,
            concurrency: 1,
            callbacks: Vec::new(),
        }
    }

    pub fn oracle(mut self, oracle: SharedOracle<T>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Seed for the first-round shuffle.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Keep the input order for the first round instead of shuffling it.
    pub fn no_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn callback(mut self, callback: Callback) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn build(self) -> Result<Tournament<T>> {
        if self.rounds == 0 {
            return Err(Error::InvalidConfig(
                "a tournament needs at least one round".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Tournament {
            oracle: self
                .oracle
                .ok_or(Error::MissingArg("oracle is required for tournament".to_string()))?,
            rounds: self.rounds,
            seed: self.seed,
            shuffle: self.shuffle,
            concurrency: self.concurrency,
            callbacks: self.callbacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{RoundReport, TournamentBuilder, pair_up};
    use crate::callbacks::Callback;
    use crate::oracle::{Judgement, Oracle, Winner};
    use crate::proposal::Entry;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FirstWins;

    #[async_trait]
    impl<T: Sync> Oracle<T> for FirstWins {
        async fn compare(&self, _: &T, _: &T) -> Result<Judgement> {
            Ok(Judgement::new(Winner::First))
        }
    }

    /// Prefers the larger strength, breaking ties for the first item.
    struct Stronger;

    #[async_trait]
    impl Oracle<u32> for Stronger {
        async fn compare(&self, first: &u32, second: &u32) -> Result<Judgement> {
            if first >= second {
                Ok(Judgement::new(Winner::First))
            } else {
                Ok(Judgement::new(Winner::Second))
            }
        }
    }

    struct Rambling;

    #[async_trait]
    impl Oracle<&'static str> for Rambling {
        async fn compare(&self, _: &&'static str, _: &&'static str) -> Result<Judgement> {
            Ok(Judgement::parse("yes, option two is better".to_string(), 0.5))
        }
    }

    struct FailsAfter {
        allowed: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Oracle<&'static str> for FailsAfter {
        async fn compare(&self, _: &&'static str, _: &&'static str) -> Result<Judgement> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(Error::RetriesExhausted {
                    attempts: 3,
                    last: Box::new(Error::LLMResponseError("timeout".to_string())),
                });
            }
            Ok(Judgement::new(Winner::First))
        }
    }

    struct Recorder(Arc<Mutex<Vec<RoundReport>>>);

    #[async_trait]
    impl Callback for Recorder {
        async fn call(&mut self, report: &RoundReport) -> Result<()> {
            self.0.lock().unwrap().push(report.clone());
            Ok(())
        }
    }

    fn named(names: &[&'static str]) -> Vec<Entry<&'static str>> {
        names.iter().map(|name| Entry::new(*name, *name)).collect()
    }

    fn strengths(strengths: &[u32]) -> Vec<Entry<u32>> {
        strengths
            .iter()
            .enumerate()
            .map(|(i, s)| Entry::new(format!("item{i}"), *s))
            .collect()
    }

    fn ids_and_scores(scores: &[super::Score]) -> Vec<(&str, u32)> {
        scores.iter().map(|s| (s.id.as_str(), s.score)).collect()
    }

    #[test]
    fn test_pair_up() {
        assert_eq!(pair_up(&[2, 0, 3, 1]), (vec![(2, 0), (3, 1)], None));
        assert_eq!(pair_up(&[4, 1, 0]), (vec![(4, 1)], Some(0)));
        assert_eq!(pair_up(&[5]), (vec![], Some(5)));
    }

    #[tokio::test]
    async fn test_single_item_gets_byes() -> Result<()> {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(FirstWins))
            .rounds(3)
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        let rankings = tournament.rank(named(&["A"])).await?;

        assert_eq!(rankings.get("A"), Some(3));
        assert_eq!(rankings.comparisons, 0);
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.bye.as_deref() == Some("A")));
        Ok(())
    }

    #[tokio::test]
    async fn test_two_items_first_wins() -> Result<()> {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(FirstWins))
            .rounds(2)
            .no_shuffle()
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        let rankings = tournament.rank(named(&["A", "B"])).await?;

        assert_eq!(ids_and_scores(&rankings.scores), vec![("A", 2), ("B", 0)]);
        let reports = reports.lock().unwrap();
        assert_eq!(ids_and_scores(&reports[0].scores), vec![("A", 1), ("B", 0)]);
        for report in reports.iter() {
            assert_eq!(report.matches.len(), 1);
            assert_eq!(report.matches[0].first, "A");
            assert_eq!(report.matches[0].second, "B");
            assert_eq!(report.bye, None);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_four_items_one_round() -> Result<()> {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(FirstWins))
            .rounds(1)
            .no_shuffle()
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        let rankings = tournament.rank(named(&["C", "A", "D", "B"])).await?;

        assert_eq!(
            ids_and_scores(&rankings.scores),
            vec![("C", 1), ("A", 0), ("D", 1), ("B", 0)]
        );
        let reports = reports.lock().unwrap();
        let pairs = reports[0]
            .matches
            .iter()
            .map(|m| (m.first.as_str(), m.second.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![("C", "A"), ("D", "B")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_round_invariants() -> Result<()> {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(Stronger))
            .rounds(4)
            .seed(7)
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        let rankings = tournament
            .rank(strengths(&[3, 9, 1, 7, 5, 2, 8]))
            .await?;

        assert_eq!(rankings.comparisons, 12);
        assert!(rankings.scores.iter().all(|s| s.score <= 4));
        // The strongest item wins every match it plays.
        assert_eq!(rankings.get("item1"), Some(4));

        let reports = reports.lock().unwrap();
        let mut previous = vec![0u32; 7];
        for (round, report) in reports.iter().enumerate() {
            assert_eq!(report.round, round + 1);
            assert_eq!(report.matches.len(), 3);
            assert!(report.bye.is_some());

            let current = report.scores.iter().map(|s| s.score).collect::<Vec<_>>();
            let handed_out: u32 = current.iter().sum::<u32>() - previous.iter().sum::<u32>();
            assert_eq!(handed_out, 4);
            assert!(current.iter().zip(&previous).all(|(c, p)| c >= p));
            previous = current;
        }
        assert_eq!(previous, rankings.scores.iter().map(|s| s.score).collect::<Vec<_>>());
        Ok(())
    }

    #[tokio::test]
    async fn test_even_field_has_no_bye() -> Result<()> {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(Stronger))
            .rounds(3)
            .seed(5)
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        let rankings = tournament
            .rank(strengths(&[6, 2, 8, 4, 1, 7, 3, 5]))
            .await?;

        assert_eq!(rankings.comparisons, 12);
        let reports = reports.lock().unwrap();
        let mut previous = 0u32;
        for report in reports.iter() {
            assert_eq!(report.matches.len(), 4);
            assert_eq!(report.bye, None);
            let total = report.scores.iter().map(|s| s.score).sum::<u32>();
            assert_eq!(total - previous, 4);
            previous = total;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_later_rounds_break_ties_by_input_order() -> Result<()> {
        let items = ["A", "B", "C", "D", "E", "F"];
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(FirstWins))
            .rounds(2)
            .seed(0)
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        tournament.rank(named(&items)).await?;

        let reports = reports.lock().unwrap();
        let winners = reports[0]
            .matches
            .iter()
            .map(|m| m.first.as_str())
            .collect::<Vec<_>>();
        // Round 2 starts from input order: round-1 winners first, then the
        // rest, each group in input order.
        let standings = items
            .iter()
            .filter(|id| winners.contains(*id))
            .chain(items.iter().filter(|id| !winners.contains(*id)))
            .copied()
            .collect::<Vec<_>>();
        let expected = standings
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect::<Vec<_>>();
        let round_two = reports[1]
            .matches
            .iter()
            .map(|m| (m.first.as_str(), m.second.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(round_two, expected);
        assert_eq!(round_two, vec![("C", "D"), ("F", "A"), ("B", "E")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_rank_reseeds() -> Result<()> {
        let items = ["A", "B", "C", "D", "E", "F", "G"];
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(FirstWins))
            .rounds(1)
            .seed(9)
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        let first = tournament.rank(named(&items)).await?;
        let second = tournament.rank(named(&items)).await?;

        assert_eq!(first.scores, second.scores);
        let reports = reports.lock().unwrap();
        let pairings = |report: &RoundReport| {
            report
                .matches
                .iter()
                .map(|m| (m.first.clone(), m.second.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(pairings(&reports[0]), pairings(&reports[1]));
        assert_eq!(reports[0].bye, reports[1].bye);
        Ok(())
    }

    #[tokio::test]
    async fn test_seeded_runs_repeat() -> Result<()> {
        let items = ["A", "B", "C", "D", "E", "F", "G", "H", "I"];
        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut tournament = TournamentBuilder::new()
                .oracle(Arc::new(FirstWins))
                .rounds(3)
                .seed(42)
                .build()?;
            runs.push(tournament.rank(named(&items)).await?.scores);
        }

        assert_eq!(runs[0], runs[1]);
        let ids = runs[0].iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, items);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_rounds_match_sequential() -> Result<()> {
        let items = [4, 11, 6, 2, 9, 13, 1, 8, 10, 3];
        let mut runs = Vec::new();
        for concurrency in [1, 4] {
            let mut tournament = TournamentBuilder::new()
                .oracle(Arc::new(Stronger))
                .rounds(3)
                .seed(11)
                .concurrency(concurrency)
                .build()?;
            runs.push(tournament.rank(strengths(&items)).await?.scores);
        }

        assert_eq!(runs[0], runs[1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_verdict_counts_for_second() -> Result<()> {
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(Rambling))
            .rounds(1)
            .no_shuffle()
            .build()?;

        let rankings = tournament.rank(named(&["A", "B"])).await?;

        assert_eq!(ids_and_scores(&rankings.scores), vec![("A", 0), ("B", 1)]);
        assert_eq!(rankings.malformed, 1);
        assert_eq!(rankings.cost, 0.5);
        Ok(())
    }

    #[tokio::test]
    async fn test_oracle_failure_aborts_run() -> Result<()> {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(FailsAfter {
                allowed: 2,
                calls: AtomicUsize::new(0),
            }))
            .rounds(3)
            .callback(Box::new(Recorder(reports.clone())))
            .build()?;

        let res = tournament.rank(named(&["A", "B", "C", "D"])).await;

        assert!(matches!(res, Err(Error::RetriesExhausted { .. })));
        assert_eq!(reports.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_input() -> Result<()> {
        let mut tournament = TournamentBuilder::new()
            .oracle(Arc::new(FirstWins))
            .build()?;

        assert!(matches!(
            tournament.rank(named(&[])).await,
            Err(Error::EmptyTournament)
        ));
        assert!(matches!(
            tournament.rank(vec![Entry::new("x", "A"), Entry::new("x", "B")]).await,
            Err(Error::DuplicateItemId(id)) if id == "x"
        ));
        Ok(())
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            TournamentBuilder::<u32>::new().build(),
            Err(Error::MissingArg(_))
        ));
        assert!(matches!(
            TournamentBuilder::<u32>::new()
                .oracle(Arc::new(Stronger))
                .rounds(0)
                .build(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TournamentBuilder::<u32>::new()
                .oracle(Arc::new(Stronger))
                .concurrency(0)
                .build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sorted_rankings() {
        let rankings = super::Rankings {
            scores: vec![
                super::Score { id: "a".to_string(), score: 1 },
                super::Score { id: "b".to_string(), score: 3 },
                super::Score { id: "c".to_string(), score: 1 },
            ],
            comparisons: 0,
            malformed: 0,
            cost: 0.0,
        };

        let ids = rankings.sorted().iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
