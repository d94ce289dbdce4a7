use thiserror::Error;

use crate::models::ScoreKind;

/// A detector pattern failed to compile. Fatal: nothing is matched.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {name} pattern: {source}")]
    Compile {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// The external scoring service could not produce a result for one ticket.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("{kind} scoring unavailable: {reason}")]
    Unavailable { kind: ScoreKind, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("unsupported text field `{0}` (expected summary, description or comments)")]
    UnknownField(String),
    #[error("unsupported analysis `{0}`")]
    UnknownAnalysis(String),
    #[error("wordiness needs a field, e.g. `wordiness:description`")]
    MissingField,
}
