use regex::Regex;

use crate::error::PatternError;
use crate::models::Ticket;

/// Two or more consecutive lines starting with an optionally indented `*`.
pub const STEPS_TO_REPRODUCE: &str = r"(?m)^[ \t]*\*[^\n]*\n[ \t]*\*";

/// A line mentioning `Exception` followed by at least two `at ...` frames.
pub const STACK_TRACE: &str =
    r"(?m)^[^\n]*Exception[^\n]*\n(?:[ \t]*at[ \t][^\n]*(?:\n|$)){2,}";

pub struct Detectors {
    steps: Regex,
    stack_trace: Regex,
}

impl Detectors {
    pub fn new() -> Result<Self, PatternError> {
        Self::with_patterns(STEPS_TO_REPRODUCE, STACK_TRACE)
    }

    pub fn with_patterns(steps: &str, stack_trace: &str) -> Result<Self, PatternError> {
        Ok(Self {
            steps: compile("steps-to-reproduce", steps)?,
            stack_trace: compile("stack-trace", stack_trace)?,
        })
    }

    pub fn has_steps_to_reproduce(&self, ticket: &Ticket) -> bool {
        scan(&self.steps, ticket)
    }

    pub fn has_stack_trace(&self, ticket: &Ticket) -> bool {
        scan(&self.stack_trace, ticket)
    }
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError::Compile { name, source })
}

// Description first, then each comment body; stops at the first hit.
fn scan(regex: &Regex, ticket: &Ticket) -> bool {
    regex.is_match(&ticket.description)
        || ticket
            .comments
            .iter()
            .any(|comment| regex.is_match(&comment.body))
}
