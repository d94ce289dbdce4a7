use std::collections::HashMap;

use tracing::debug;

use crate::models::{ScoreKind, Ticket};
use crate::patterns::Detectors;
use crate::resolution::{self, ClosurePolicy, Status};
use crate::text;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub resolved: usize,
    pub unresolved: usize,
    /// Closed at the end of the log, but never by a direct `Open -> Closed`.
    pub closed_indirectly: usize,
    pub reopened: usize,
    pub with_steps_to_reproduce: usize,
    pub with_stack_trace: usize,
}

/// Recomputes the per-ticket derived fields that do not need external
/// services. Tickets are updated in place; none are dropped.
pub fn enrich(
    tickets: &mut [Ticket],
    detectors: &Detectors,
    policy: ClosurePolicy,
) -> EnrichSummary {
    let mut summary = EnrichSummary::default();

    for ticket in tickets.iter_mut() {
        let resolution = resolution::resolve(ticket.created_at, &ticket.change_events, policy);
        ticket.resolution_hours = resolution.hours;
        ticket.reopen_count = resolution.reopen_count;
        ticket.has_steps_to_reproduce = detectors.has_steps_to_reproduce(ticket);
        ticket.has_stack_trace = detectors.has_stack_trace(ticket);

        if resolution.hours.is_some() {
            summary.resolved += 1;
        } else {
            summary.unresolved += 1;
            if resolution.final_status == Status::Closed {
                summary.closed_indirectly += 1;
            }
        }
        if resolution.reopen_count > 0 {
            summary.reopened += 1;
        }
        if ticket.has_steps_to_reproduce {
            summary.with_steps_to_reproduce += 1;
        }
        if ticket.has_stack_trace {
            summary.with_stack_trace += 1;
        }

        debug!(
            key = %ticket.key,
            hours = ?ticket.resolution_hours,
            steps = ticket.has_steps_to_reproduce,
            stack_trace = ticket.has_stack_trace,
            "ticket enriched"
        );
    }

    summary
}

/// Copies sentiment and grammar scores from previously stored copies onto
/// freshly imported tickets whose scored text has not changed. Returns how
/// many tickets kept at least one score.
pub fn carry_scores(fresh: &mut [Ticket], stored: &[Ticket]) -> usize {
    let stored: HashMap<&str, &Ticket> = stored
        .iter()
        .map(|ticket| (ticket.key.as_str(), ticket))
        .collect();
    let mut carried = 0;

    for ticket in fresh.iter_mut() {
        let Some(previous) = stored.get(ticket.key.as_str()) else {
            continue;
        };
        if text::ticket_text(previous) != text::ticket_text(ticket) {
            debug!(key = %ticket.key, "text changed, stored scores dropped");
            continue;
        }

        let mut kept = false;
        for kind in [ScoreKind::Sentiment, ScoreKind::Grammar] {
            if ticket.score(kind).is_none() && previous.score(kind).is_some() {
                ticket.set_score(kind, previous.score(kind));
                kept = true;
            }
        }
        if kept {
            carried += 1;
        }
    }

    carried
}
