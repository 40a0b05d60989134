use crate::llm::{CompletionRequest, LLM, Message};
use crate::proposal::format_plan;
use crate::retry::RetryPolicy;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
    First,
    Second,
}

/// Outcome of one pairwise comparison.
#[derive(Clone, Debug)]
pub struct Judgement {
    pub winner: Winner,
    /// Raw judge output, kept for transcripts.
    pub response: String,
    pub cost: f64,
    /// Set when the verdict token was neither "1" nor "2".
    pub malformed: bool,
}

impl Judgement {
    pub fn new(winner: Winner) -> Self {
        let response = match winner {
            Winner::First => "1",
            Winner::Second => "2",
        };
        Self {
            winner,
            response: response.to_string(),
            cost: 0.0,
            malformed: false,
        }
    }

    /// Reads the verdict from the last whitespace separated token of `response`.
    /// Only a literal "1" picks the first item.
    pub fn parse(response: String, cost: f64) -> Self {
        let verdict = response.split_whitespace().next_back().unwrap_or("");
        let winner = if verdict == "1" {
            Winner::First
        } else {
            Winner::Second
        };

        Self {
            winner,
            malformed: verdict != "1" && verdict != "2",
            response,
            cost,
        }
    }
}

/// Decides which of two items is better.
#[async_trait]
pub trait Oracle<T> {
    async fn compare(&self, first: &T, second: &T) -> Result<Judgement>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    ZeroShot,
    ZeroShotCot,
    FewShot,
    FewShotCot,
}

impl Method {
    pub fn is_few_shot(self) -> bool {
        matches!(self, Method::FewShot | Method::FewShotCot)
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero_shot" => Ok(Method::ZeroShot),
            "zero_shot_cot" => Ok(Method::ZeroShotCot),
            "few_shot" => Ok(Method::FewShot),
            "few_shot_cot" => Ok(Method::FewShotCot),
            other => Err(Error::InvalidConfig(format!(
                "unknown comparison method {other}"
            ))),
        }
    }
}

const PREAMBLE: &str = "You are a reviewer specialized in Natural Language Processing and Large Language Models. You are given two project summaries. One of them is accepted by a top AI conference (like ICLR or ACL) and the other one is rejected. Your task is to identify the one that has been accepted.\n";

/// Pairwise judge backed by an LLM, comparing experiment plans.
pub struct LLMJudge {
    llm: Arc<dyn LLM + Send + Sync>,
    method: Method,
    demos: Option<String>,
    retry: RetryPolicy,
    temperature: f32,
    max_tokens: u32,
    seed: Option<i64>,
}

impl LLMJudge {
    pub fn new(llm: Arc<dyn LLM + Send + Sync>) -> Self {
        Self {
            llm,
            method: Method::ZeroShot,
            demos: None,
            retry: RetryPolicy::default(),
            temperature: 0.0,
            max_tokens: 3000,
            seed: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn few_shot_demos(mut self, demos: String) -> Self {
        self.demos = Some(demos);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks that few-shot methods were given demonstrations.
    pub fn validate(self) -> Result<Self> {
        if self.method.is_few_shot() && self.demos.is_none() {
            return Err(Error::InvalidConfig(
                "few-shot comparison requires demonstrations".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn prompt(&self, first: &Value, second: &Value) -> String {
        let mut prompt = PREAMBLE.to_string();

        if let (true, Some(demos)) = (self.method.is_few_shot(), &self.demos) {
            prompt += "Here are some examples:\n";
            prompt += demos;
            prompt += "\n\nThe two project summaries given to you are:\n\n";
        } else {
            prompt += "The two project proposals are:\n\n";
        }
        prompt += &format!("paper 1:\n{}\n\n", format_plan(first));
        prompt += &format!("paper 2:\n{}\n\n", format_plan(second));

        prompt += match self.method {
            Method::ZeroShot => {
                "Now decide which one is the accepted idea. Directly return a number 1 or 2 and nothing else.\n"
            }
            Method::ZeroShotCot => {
                "Now decide which one is the accepted idea. Think step by step by writing a meta-review to compare the strengths and weaknesses of both ideas and explain why one idea is better than the other. After the meta-review, start a new line and directly return a number 1 or 2 to indicate the accepted idea and end the response.\n"
            }
            Method::FewShot => {
                "Now decide which one is the accepted idea. Follow the above examples: return a number 1 or 2 and nothing else.\n"
            }
            Method::FewShotCot => {
                "Now decide which one is the accepted idea. Follow the above examples: give a meta-review and score to each paper, and then start a new line and directly return a number 1 or 2 to indicate the accepted idea and end the response.\n"
            }
        };
        prompt
    }
}

#[async_trait]
impl Oracle<Value> for LLMJudge {
    async fn compare(&self, first: &Value, second: &Value) -> Result<Judgement> {
        let messages = [Message::User(self.prompt(first, second))];

        let res = self
            .retry
            .run(|| {
                self.llm.completion(CompletionRequest {
                    messages: &messages,
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                    seed: self.seed,
                })
            })
            .await?;

        let judgement = Judgement::parse(res.content, res.cost);
        if judgement.malformed {
            tracing::warn!(
                response = %judgement.response,
                "judge verdict is neither 1 nor 2, counting it for the second item"
            );
        }
        Ok(judgement)
    }
}

/// A 1 to 10 rubric score for a single proposal.
#[derive(Clone, Debug)]
pub struct RubricScore {
    /// `None` when the reply was not a whole number from 1 to 10.
    pub score: Option<u8>,
    pub response: String,
    pub cost: f64,
}

impl RubricScore {
    pub fn parse(response: String, cost: f64) -> Self {
        let score = response
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|score| (1..=10).contains(score));
        Self {
            score,
            response,
            cost,
        }
    }
}

/// Scores one experiment plan at a time against caller-supplied criteria.
pub struct RubricScorer {
    llm: Arc<dyn LLM + Send + Sync>,
    criteria: String,
    retry: RetryPolicy,
    seed: Option<i64>,
}

impl RubricScorer {
    pub fn new(llm: Arc<dyn LLM + Send + Sync>, criteria: String) -> Self {
        Self {
            llm,
            criteria,
            retry: RetryPolicy::default(),
            seed: None,
        }
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn prompt(&self, plan: &Value) -> String {
        format!(
            "You are a professor specialized in Natural Language Processing and Large Language Models. You are given a project proposal and you need to score it.\n\
             The project proposal is:\n\n{}\n\n\
             Your should follow the scoring rubrics:\n{}\n\
             Now directly provide me with a final score between 1 and 10, no other explanation needed.\n",
            format_plan(plan),
            self.criteria
        )
    }

    pub async fn score(&self, plan: &Value) -> Result<RubricScore> {
        let messages = [Message::User(self.prompt(plan))];

        // Two tokens are enough for "10".
        let res = self
            .retry
            .run(|| {
                self.llm.completion(CompletionRequest {
                    messages: &messages,
                    temperature: 0.0,
                    max_tokens: 2,
                    seed: self.seed,
                })
            })
            .await?;

        let score = RubricScore::parse(res.content, res.cost);
        if score.score.is_none() {
            tracing::warn!(response = %score.response, "rubric reply is not a score from 1 to 10");
        }
        Ok(score)
    }
}
