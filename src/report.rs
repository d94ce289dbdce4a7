use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::correlation::{self, Correlation, MeanTable, Series};
use crate::filter::{Bounds, PopulationFilter};
use crate::models::{Analysis, Ticket};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationSummary {
    pub total: usize,
    pub high_priority: usize,
    pub resolved: usize,
    pub eligible: usize,
}

pub fn summarize_population(tickets: &[Ticket]) -> PopulationSummary {
    let mut summary = PopulationSummary {
        total: tickets.len(),
        ..Default::default()
    };
    for ticket in tickets {
        let high = ticket.priority.is_high();
        let resolved = ticket.resolution_hours.is_some();
        summary.high_priority += usize::from(high);
        summary.resolved += usize::from(resolved);
        summary.eligible += usize::from(high && resolved);
    }
    summary
}

pub fn run_all(tickets: &[Ticket], bounds: Bounds) -> Vec<Correlation> {
    let filter = PopulationFilter::new(bounds);
    Analysis::ALL
        .into_iter()
        .map(|analysis| correlation::run(analysis, tickets, &filter))
        .collect()
}

pub fn build_report(tickets: &[Ticket], bounds: Bounds) -> String {
    let population = summarize_population(tickets);
    let correlations = run_all(tickets, bounds);

    let mut output = String::new();

    let _ = writeln!(output, "# Ticket Resolution Analysis");
    match bounds.max_resolution_hours {
        Some(max) => {
            let _ = writeln!(
                output,
                "Resolution times bounded to (0, {max}] hours outside wordiness; field complexity below {} words.",
                bounds.max_field_words
            );
        }
        None => {
            let _ = writeln!(
                output,
                "No resolution time bound; field complexity below {} words.",
                bounds.max_field_words
            );
        }
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Population");
    let _ = writeln!(output, "- tickets: {}", population.total);
    let _ = writeln!(output, "- high priority: {}", population.high_priority);
    let _ = writeln!(output, "- resolved (Open -> Closed): {}", population.resolved);
    let _ = writeln!(output, "- eligible: {}", population.eligible);

    for correlation in &correlations {
        let series = &correlation.series;
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", series.analysis.title());

        if series.is_empty() {
            let _ = writeln!(output, "No eligible tickets for this analysis.");
        } else {
            let _ = writeln!(
                output,
                "- paired samples: {} (mean metric {:.2}, mean time-to-close {:.1}h)",
                series.len(),
                mean(&series.metric),
                mean(&series.resolution_hours)
            );
        }
        if series.skipped_no_score > 0 {
            let _ = writeln!(output, "- skipped: no score: {}", series.skipped_no_score);
        }
        if let Some(means) = &correlation.means {
            write_means(&mut output, means);
        }
    }

    output
}

fn write_means(output: &mut String, means: &MeanTable) {
    let _ = writeln!(output);
    let _ = writeln!(output, "| Category | Tickets | Mean time-to-close (h) |");
    let _ = writeln!(output, "|---|---|---|");
    for (label, stats) in means.iter() {
        let mean = stats
            .mean()
            .map_or_else(|| "undefined".to_string(), |hours| format!("{hours:.1}"));
        let _ = writeln!(output, "| {} | {} | {} |", label, stats.count, mean);
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[derive(Serialize)]
struct SeriesRow<'a> {
    key: &'a str,
    metric: f64,
    resolution_hours: f64,
}

pub fn write_series_csv(path: &Path, series: &Series) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("could not create {}", path.display()))?;
    write_series(&mut writer, series)?;
    writer.flush()?;
    Ok(())
}

fn write_series<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    series: &Series,
) -> anyhow::Result<()> {
    for ((key, metric), hours) in series
        .keys
        .iter()
        .zip(&series.metric)
        .zip(&series.resolution_hours)
    {
        writer.serialize(SeriesRow {
            key,
            metric: *metric,
            resolution_hours: *hours,
        })?;
    }
    Ok(())
}
