use std::collections::{BTreeMap, BTreeSet};

use crate::filter::PopulationFilter;
use crate::models::{Analysis, AttachmentCategory, ScoreKind, Ticket};
use crate::text;

pub const WITHOUT_ATTACHMENTS: &str = "Without Attachments";

/// Index-aligned metric and resolution-time series; entry `i` of every
/// vector describes the same ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub analysis: Analysis,
    pub keys: Vec<String>,
    pub metric: Vec<f64>,
    pub resolution_hours: Vec<f64>,
    /// Eligible tickets left out because they carry no score.
    pub skipped_no_score: usize,
}

impl Series {
    fn new(analysis: Analysis) -> Self {
        Self {
            analysis,
            keys: Vec::new(),
            metric: Vec::new(),
            resolution_hours: Vec::new(),
            skipped_no_score: 0,
        }
    }

    fn push(&mut self, key: &str, metric: f64, hours: f64) {
        self.keys.push(key.to_string());
        self.metric.push(metric);
        self.resolution_hours.push(hours);
    }

    pub fn len(&self) -> usize {
        self.metric.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metric.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryStats {
    pub count: usize,
    pub total_hours: f64,
}

impl CategoryStats {
    fn add(&mut self, hours: f64) {
        self.count += 1;
        self.total_hours += hours;
    }

    /// `None` for an empty category rather than NaN.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total_hours / self.count as f64)
        }
    }
}

/// Mean resolution time per category label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeanTable {
    categories: BTreeMap<String, CategoryStats>,
}

impl MeanTable {
    fn declare(&mut self, label: &str) {
        self.categories.entry(label.to_string()).or_default();
    }

    fn add(&mut self, label: &str, hours: f64) {
        self.categories
            .entry(label.to_string())
            .or_default()
            .add(hours);
    }

    #[cfg(test)]
    pub fn mean(&self, label: &str) -> Option<f64> {
        self.categories.get(label).and_then(CategoryStats::mean)
    }

    #[cfg(test)]
    pub fn stats(&self, label: &str) -> Option<&CategoryStats> {
        self.categories.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryStats)> {
        self.categories
            .iter()
            .map(|(label, stats)| (label.as_str(), stats))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub series: Series,
    /// Present for the boolean and categorical analyses.
    pub means: Option<MeanTable>,
}

pub fn run(analysis: Analysis, tickets: &[Ticket], filter: &PopulationFilter) -> Correlation {
    match analysis {
        Analysis::Wordiness(field) => Correlation {
            series: word_series(analysis, tickets, filter, |ticket| {
                text::field_word_count(ticket, field)
            }),
            means: None,
        },
        Analysis::FieldsComplexity => Correlation {
            series: word_series(analysis, tickets, filter, text::summary_description_word_count),
            means: None,
        },
        Analysis::CommentsComplexity => Correlation {
            series: word_series(analysis, tickets, filter, text::comment_word_count),
            means: None,
        },
        Analysis::Sentiment => Correlation {
            series: scores(ScoreKind::Sentiment, tickets, filter),
            means: None,
        },
        Analysis::Grammar => Correlation {
            series: scores(ScoreKind::Grammar, tickets, filter),
            means: None,
        },
        Analysis::Attachments => {
            let (series, means) = attachments(tickets, filter);
            Correlation {
                series,
                means: Some(means),
            }
        }
        Analysis::StepsToReproduce => {
            let (series, means) = presence(
                analysis,
                tickets,
                filter,
                |ticket| ticket.has_steps_to_reproduce,
                ("With Steps to Reproduce", "Without Steps to Reproduce"),
            );
            Correlation {
                series,
                means: Some(means),
            }
        }
        Analysis::StackTraces => {
            let (series, means) = presence(
                analysis,
                tickets,
                filter,
                |ticket| ticket.has_stack_trace,
                ("With Stack Traces", "Without Stack Traces"),
            );
            Correlation {
                series,
                means: Some(means),
            }
        }
    }
}

/// Word count against resolution time; `words` picks the text counted.
fn word_series(
    analysis: Analysis,
    tickets: &[Ticket],
    filter: &PopulationFilter,
    words: impl Fn(&Ticket) -> usize,
) -> Series {
    let mut series = Series::new(analysis);
    for ticket in tickets {
        let Some(hours) = filter.eligible(ticket, analysis) else {
            continue;
        };
        series.push(&ticket.key, words(ticket) as f64, hours);
    }
    series
}

pub fn scores(kind: ScoreKind, tickets: &[Ticket], filter: &PopulationFilter) -> Series {
    let analysis = match kind {
        ScoreKind::Sentiment => Analysis::Sentiment,
        ScoreKind::Grammar => Analysis::Grammar,
    };
    let mut series = Series::new(analysis);
    for ticket in tickets {
        let Some(hours) = filter.eligible(ticket, analysis) else {
            continue;
        };
        match ticket.score(kind) {
            Some(score) => series.push(&ticket.key, score, hours),
            None => series.skipped_no_score += 1,
        }
    }
    series
}

/// Series metric is the number of distinct attachment categories on the
/// ticket. Each ticket counts once per category it carries.
pub fn attachments(tickets: &[Ticket], filter: &PopulationFilter) -> (Series, MeanTable) {
    let mut series = Series::new(Analysis::Attachments);
    let mut means = MeanTable::default();
    means.declare(WITHOUT_ATTACHMENTS);

    for ticket in tickets {
        let Some(hours) = filter.eligible(ticket, Analysis::Attachments) else {
            continue;
        };

        let categories: BTreeSet<AttachmentCategory> = ticket
            .attachments
            .iter()
            .map(|attachment| attachment.category())
            .collect();

        if categories.is_empty() {
            means.add(WITHOUT_ATTACHMENTS, hours);
        }
        for category in &categories {
            means.add(category.label(), hours);
        }
        series.push(&ticket.key, categories.len() as f64, hours);
    }

    (series, means)
}

/// Boolean analyses: metric is 1.0 or 0.0, both labels always reported.
fn presence(
    analysis: Analysis,
    tickets: &[Ticket],
    filter: &PopulationFilter,
    flag: impl Fn(&Ticket) -> bool,
    (with_label, without_label): (&str, &str),
) -> (Series, MeanTable) {
    let mut series = Series::new(analysis);
    let mut means = MeanTable::default();
    means.declare(with_label);
    means.declare(without_label);

    for ticket in tickets {
        let Some(hours) = filter.eligible(ticket, analysis) else {
            continue;
        };
        let present = flag(ticket);
        means.add(if present { with_label } else { without_label }, hours);
        series.push(&ticket.key, if present { 1.0 } else { 0.0 }, hours);
    }

    (series, means)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, Priority, TextField};

    fn ticket(key: &str, hours: Option<f64>) -> Ticket {
        Ticket {
            key: key.to_string(),
            priority: Priority::Critical,
            resolution_hours: hours,
            ..Default::default()
        }
    }

    fn with_attachment(mut ticket: Ticket, filename: &str) -> Ticket {
        ticket.attachments.push(Attachment {
            filename: filename.to_string(),
            size_bytes: 1024,
        });
        ticket
    }

    #[test]
    fn attachment_means_per_category() {
        let tickets = vec![
            with_attachment(ticket("A-1", Some(10.0)), "screen.png"),
            with_attachment(ticket("A-2", Some(20.0)), "trace.JPG"),
            ticket("A-3", Some(5.0)),
        ];
        let (series, means) = attachments(&tickets, &PopulationFilter::default());

        assert_eq!(series.len(), 3);
        assert_eq!(means.iter().count(), 2);
        assert_eq!(means.mean("image"), Some(15.0));
        assert_eq!(means.mean(WITHOUT_ATTACHMENTS), Some(5.0));
    }

    #[test]
    fn a_ticket_counts_once_per_category() {
        let subject = with_attachment(
            with_attachment(with_attachment(ticket("A-1", Some(6.0)), "a.png"), "b.png"),
            "Main.java",
        );
        let (series, means) = attachments(&[subject], &PopulationFilter::default());

        assert_eq!(series.metric, vec![2.0]);
        assert_eq!(means.stats("image").map(|s| s.count), Some(1));
        assert_eq!(means.mean("code"), Some(6.0));
        assert_eq!(means.mean(WITHOUT_ATTACHMENTS), None);
    }

    #[test]
    fn empty_categories_are_undefined() {
        let mut with_steps = ticket("S-1", Some(4.0));
        with_steps.has_steps_to_reproduce = true;
        let correlation = run(
            Analysis::StepsToReproduce,
            &[with_steps],
            &PopulationFilter::default(),
        );
        let means = correlation.means.unwrap();

        assert_eq!(means.mean("With Steps to Reproduce"), Some(4.0));
        assert_eq!(means.mean("Without Steps to Reproduce"), None);
        assert_eq!(means.stats("Without Steps to Reproduce").map(|s| s.count), Some(0));
    }

    #[test]
    fn presence_means_ignore_excluded_tickets() {
        let mut traced = ticket("T-1", Some(30.0));
        traced.has_stack_trace = true;
        let mut low = ticket("T-2", Some(1.0));
        low.priority = Priority::Minor;
        let tickets = vec![traced, ticket("T-3", Some(10.0)), low, ticket("T-4", None)];

        let correlation = run(Analysis::StackTraces, &tickets, &PopulationFilter::default());
        let means = correlation.means.unwrap();

        assert_eq!(correlation.series.metric, vec![1.0, 0.0]);
        assert_eq!(correlation.series.resolution_hours, vec![30.0, 10.0]);
        assert_eq!(means.mean("With Stack Traces"), Some(30.0));
        assert_eq!(means.mean("Without Stack Traces"), Some(10.0));
    }

    #[test]
    fn wordiness_series_is_index_aligned() {
        let mut first = ticket("W-1", Some(3.0));
        first.description = "steps below\nnothing else".to_string();
        let mut second = ticket("W-2", Some(9.0));
        second.description = "one".to_string();
        let unresolved = ticket("W-3", None);

        let series = run(
            Analysis::Wordiness(TextField::Description),
            &[first, unresolved, second],
            &PopulationFilter::default(),
        )
        .series;

        assert_eq!(series.keys, vec!["W-1", "W-2"]);
        assert_eq!(series.metric, vec![4.0, 1.0]);
        assert_eq!(series.resolution_hours, vec![3.0, 9.0]);
    }

    #[test]
    fn unscored_tickets_are_skipped_not_zeroed() {
        let mut scored = ticket("G-1", Some(2.0));
        scored.grammar_score = Some(0.9);
        let unscored = ticket("G-2", Some(4.0));

        let series = scores(ScoreKind::Grammar, &[scored, unscored], &PopulationFilter::default());

        assert_eq!(series.metric, vec![0.9]);
        assert_eq!(series.resolution_hours, vec![2.0]);
        assert_eq!(series.skipped_no_score, 1);
    }

    #[test]
    fn complexity_analyses_count_their_own_text() {
        let mut subject = ticket("C-1", Some(5.0));
        subject.summary = "crash on save".to_string();
        subject.description = "disk full".to_string();
        subject.comments.push(crate::models::Comment {
            body: "seen again today".to_string(),
            ..Default::default()
        });
        let tickets = [subject];
        let filter = PopulationFilter::default();

        let fields = run(Analysis::FieldsComplexity, &tickets, &filter);
        let comments = run(Analysis::CommentsComplexity, &tickets, &filter);
        let summary = run(Analysis::Wordiness(TextField::Summary), &tickets, &filter);

        assert_eq!(fields.series.analysis, Analysis::FieldsComplexity);
        assert_eq!(fields.series.metric, vec![5.0]);
        assert_eq!(comments.series.metric, vec![3.0]);
        assert_eq!(summary.series.metric, vec![3.0]);
        assert!(fields.means.is_none());
    }
}
