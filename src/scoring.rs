use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScoringError;
use crate::models::{ScoreKind, Ticket};
use crate::text;

/// External capability that rates a ticket's text.
///
/// `Ok(None)` means the service answered but had nothing to score.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn kind(&self) -> ScoreKind;

    async fn score(&self, text: &str) -> Result<Option<f64>, ScoringError>;
}

/// Scorer backed by a JSON endpoint: `POST {"text": ...}` answered by
/// `{"score": <number|null>}`.
pub struct HttpScorer {
    kind: ScoreKind,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: Option<f64>,
}

impl HttpScorer {
    pub fn new(kind: ScoreKind, endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            kind,
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn unavailable(&self, reason: impl ToString) -> ScoringError {
        ScoringError::Unavailable {
            kind: self.kind,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    fn kind(&self) -> ScoreKind {
        self.kind
    }

    async fn score(&self, text: &str) -> Result<Option<f64>, ScoringError> {
        let mut request = self.client.post(&self.endpoint).json(&ScoreRequest { text });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| self.unavailable(err))?;
        let body: ScoreResponse = response.json().await.map_err(|err| self.unavailable(err))?;

        Ok(body.score.filter(|score| score.is_finite()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringSummary {
    pub kind: ScoreKind,
    pub scored: usize,
    pub no_score: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl ScoringSummary {
    fn new(kind: ScoreKind) -> Self {
        Self {
            kind,
            scored: 0,
            no_score: 0,
            failed: 0,
            cancelled: 0,
        }
    }

    /// Tickets that finish the pass without a score.
    pub fn skipped(&self) -> usize {
        self.no_score + self.failed + self.cancelled
    }
}

enum Outcome {
    Scored(f64),
    NoScore,
    Failed(ScoringError),
    Cancelled,
}

/// Scores every ticket with every scorer. Jobs are fed lazily so at most
/// `concurrency` calls, and their copies of ticket text, exist at once.
/// Each ticket's score for a scorer's kind is cleared first, so a failed,
/// empty or cancelled call leaves the ticket unscored. One ticket's failure
/// never stops the rest of the batch.
pub async fn score_population(
    tickets: &mut [Ticket],
    scorers: &[Arc<dyn Scorer>],
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<ScoringSummary> {
    let mut summaries: Vec<ScoringSummary> = scorers
        .iter()
        .map(|scorer| ScoringSummary::new(scorer.kind()))
        .collect();
    if scorers.is_empty() {
        return summaries;
    }

    for scorer in scorers {
        for ticket in tickets.iter_mut() {
            ticket.set_score(scorer.kind(), None);
        }
    }

    let limit = concurrency.max(1);
    let ticket_count = tickets.len();
    let jobs = (0..scorers.len())
        .flat_map(|scorer_idx| (0..ticket_count).map(move |ticket_idx| (scorer_idx, ticket_idx)));
    let mut set = JoinSet::new();

    for (scorer_idx, ticket_idx) in jobs {
        if cancel.is_cancelled() {
            summaries[scorer_idx].cancelled += 1;
            continue;
        }
        while set.len() >= limit {
            match set.join_next().await {
                Some(joined) => record(joined, &mut summaries, tickets),
                None => break,
            }
        }

        let text = text::ticket_text(&tickets[ticket_idx]);
        let scorer = Arc::clone(&scorers[scorer_idx]);
        let cancel = cancel.clone();
        set.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Outcome::Cancelled,
                result = scorer.score(&text) => match result {
                    Ok(Some(score)) => Outcome::Scored(score),
                    Ok(None) => Outcome::NoScore,
                    Err(err) => Outcome::Failed(err),
                },
            };
            (scorer_idx, ticket_idx, outcome)
        });
    }

    while let Some(joined) = set.join_next().await {
        record(joined, &mut summaries, tickets);
    }

    for summary in &summaries {
        info!(
            kind = %summary.kind,
            scored = summary.scored,
            skipped = summary.skipped(),
            failed = summary.failed,
            "scoring pass finished"
        );
    }

    summaries
}

fn record(
    joined: Result<(usize, usize, Outcome), JoinError>,
    summaries: &mut [ScoringSummary],
    tickets: &mut [Ticket],
) {
    let (scorer_idx, ticket_idx, outcome) = match joined {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "scoring task did not complete");
            return;
        }
    };
    let summary = &mut summaries[scorer_idx];
    let ticket = &mut tickets[ticket_idx];

    match outcome {
        Outcome::Scored(score) => {
            ticket.set_score(summary.kind, Some(score));
            summary.scored += 1;
        }
        Outcome::NoScore => {
            debug!(key = %ticket.key, kind = %summary.kind, "no score returned");
            summary.no_score += 1;
        }
        Outcome::Failed(err) => {
            warn!(key = %ticket.key, error = %err, "scoring failed");
            summary.failed += 1;
        }
        Outcome::Cancelled => summary.cancelled += 1,
    }
}
