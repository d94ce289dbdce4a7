use crate::models::{Analysis, Ticket};
use crate::text;

pub const DEFAULT_MAX_RESOLUTION_HOURS: f64 = 27_000.0;
pub const DEFAULT_MAX_FIELD_WORDS: usize = 1_000;

/// Sanity bounds layered on top of the base eligibility rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Outlier cut-off for every analysis except wordiness; `None` turns
    /// it off.
    pub max_resolution_hours: Option<f64>,
    pub max_field_words: usize,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            max_resolution_hours: Some(DEFAULT_MAX_RESOLUTION_HOURS),
            max_field_words: DEFAULT_MAX_FIELD_WORDS,
        }
    }
}

/// Resolution time of a ticket that is resolved and high priority.
pub fn base_eligible(ticket: &Ticket) -> Option<f64> {
    if !ticket.priority.is_high() {
        return None;
    }
    ticket.resolution_hours
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PopulationFilter {
    pub bounds: Bounds,
}

impl PopulationFilter {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// Returns the resolution time to pair with the ticket's metric, or
    /// `None` when the ticket is excluded from `analysis`. Score presence
    /// is left to the aggregator so it can count skipped tickets.
    pub fn eligible(&self, ticket: &Ticket, analysis: Analysis) -> Option<f64> {
        let hours = base_eligible(ticket)?;
        if let Analysis::Wordiness(_) = analysis {
            return Some(hours);
        }
        if !self.within_outlier_bound(hours) {
            return None;
        }

        let in_range = match analysis {
            Analysis::FieldsComplexity => {
                let words = text::summary_description_word_count(ticket);
                words > 0 && words < self.bounds.max_field_words
            }
            Analysis::CommentsComplexity => text::comment_word_count(ticket) > 0,
            _ => true,
        };

        in_range.then_some(hours)
    }

    fn within_outlier_bound(&self, hours: f64) -> bool {
        match self.bounds.max_resolution_hours {
            Some(max) => hours > 0.0 && hours <= max,
            None => true,
        }
    }
}
