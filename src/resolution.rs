use chrono::{DateTime, Utc};

use crate::models::ChangeEvent;

/// Which `Open -> Closed` transition counts when a ticket was reopened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ClosurePolicy {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Open,
    InProgress,
    Closed,
    Reopened,
    Other,
}

impl Status {
    fn parse(value: &str) -> Self {
        match value {
            "Open" => Self::Open,
            "In Progress" => Self::InProgress,
            "Closed" => Self::Closed,
            "Reopened" => Self::Reopened,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// `None` when the log holds no `Open -> Closed` status transition.
    pub hours: Option<f64>,
    pub reopen_count: u32,
    pub final_status: Status,
}

/// Replays status changes in stored order. Only a transition labelled
/// exactly `Open -> Closed` qualifies as a closure; elapsed time is
/// passed through unbounded, so negative values are possible.
pub fn resolve(
    created_at: DateTime<Utc>,
    events: &[ChangeEvent],
    policy: ClosurePolicy,
) -> Resolution {
    let mut state = Status::Open;
    let mut closed_at: Option<DateTime<Utc>> = None;
    let mut reopen_count = 0;

    for event in events.iter().filter(|event| event.field == "status") {
        let from = Status::parse(&event.from_value);
        let to = Status::parse(&event.to_value);

        if state == Status::Closed && to != Status::Closed {
            reopen_count += 1;
        }

        if from == Status::Open && to == Status::Closed {
            match policy {
                ClosurePolicy::First => {
                    closed_at.get_or_insert(event.timestamp);
                }
                ClosurePolicy::Last => closed_at = Some(event.timestamp),
            }
        }

        state = to;
    }

    Resolution {
        hours: closed_at.map(|at| hours_between(created_at, at)),
        reopen_count,
        final_status: state,
    }
}

pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}
