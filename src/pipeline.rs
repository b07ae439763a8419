//! Publication pipeline: raw weekly counts in, disclosure-safe table out.
//!
//! Stage order is fixed:
//! 1. attach denominators (population rounded up to the rounding base)
//! 2. merge periods into buckets (sums need true values)
//! 3. denominator floor (before any percentage is computed)
//! 4. redact counts (before any percentage is computed)
//! 5. percentages, and cumulative percentages if requested

use std::collections::BTreeSet;

use tracing::{info, info_span, warn};

use crate::privacy::{
    apply_cascade, apply_completion, apply_denominator_floor, apply_propagation, rebucket,
    redact_and_round_column, redact_to_threshold_and_round, round_survivors, round_up, summarize,
    Redaction,
};
use crate::table::{CountsTable, Period, PopulationSizes};
use crate::types::{Cell, Denominator, PublicationReport, RedactionStrategy, Result, SdcConfig};

/// Output of a publication run
#[derive(Debug, Clone)]
pub struct Publication {
    pub table: CountsTable,
    pub redactions: Vec<Redaction>,
    pub report: PublicationReport,
}

/// Set each row's denominator to its period's population, rounded up.
/// Returns the periods that had no population entry.
pub fn attach_denominators(
    table: &mut CountsTable,
    population: &PopulationSizes,
    base: u64,
) -> Vec<Period> {
    let mut missing = BTreeSet::new();
    for row in table.rows.iter_mut() {
        row.denominators = match population.get(&row.period) {
            Some(size) => Denominator::Count(round_up(size, base)),
            None => {
                missing.insert(row.period);
                Denominator::Missing
            }
        };
    }
    missing.into_iter().collect()
}

/// Round to one decimal place, ties to even (12.25 -> 12.2, 12.35 -> 12.4)
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// `round(100 * counts / denominators, 1)`, undefined unless both are numeric.
/// Exact ties round to the even digit.
pub fn percentage(counts: Cell, denominators: Denominator) -> Option<f64> {
    let c = counts.value()?;
    let d = denominators.value().filter(|&d| d > 0)?;
    Some(round_one_decimal(c as f64 * 100.0 / d as f64))
}

pub fn compute_percentages(table: &mut CountsTable) {
    for row in table.rows.iter_mut() {
        row.percentage = percentage(row.counts, row.denominators);
    }
}

/// Running sum of percentages over each period's rows, in table order.
/// Undefined percentages are skipped and get an undefined running value.
pub fn compute_cumulative(table: &mut CountsTable) {
    for (_, indices) in table.period_groups() {
        let mut running = 0.0;
        for idx in indices {
            let row = &mut table.rows[idx];
            row.cumulative_percentage = row.percentage.map(|pct| {
                running += pct;
                round_one_decimal(running)
            });
        }
    }
}

/// Run the full pipeline over a raw counts table
pub fn publish(
    table: &CountsTable,
    population: &PopulationSizes,
    config: &SdcConfig,
) -> Result<Publication> {
    config.validate()?;
    let _span = info_span!("publish", strategy = ?config.strategy).entered();

    let mut report = PublicationReport::new(config.clone());
    let mut working = table.clone();
    report.periods_in = working.periods().len();

    let missing = attach_denominators(&mut working, population, config.rounding_base);
    for period in &missing {
        warn!(%period, "no population size for period; denominators undefined");
        report
            .warnings
            .push(format!("No population size for period {}", period));
    }

    let (mut working, plan) = rebucket(&working, config.periods_per_bucket);
    report.periods_dropped = plan.dropped.len();
    report.buckets = plan.buckets.len();
    if !plan.dropped.is_empty() {
        report.warnings.push(format!(
            "Dropped {} leading period(s) to fill buckets of {}",
            plan.dropped.len(),
            config.periods_per_bucket
        ));
    }

    report.denominators_below_floor = apply_denominator_floor(&mut working, config.denominator_floor);

    let mut redactions = Vec::new();
    match config.strategy {
        RedactionStrategy::Cascade if config.apply_completion => {
            redactions.extend(apply_cascade(&mut working, config.threshold));
            redactions.extend(apply_completion(&mut working));
            round_survivors(&mut working, config.rounding_base);
        }
        RedactionStrategy::Cascade => {
            redactions.extend(redact_to_threshold_and_round(&mut working, config));
        }
        RedactionStrategy::AllOrNothing => {
            redactions.extend(redact_and_round_column(&mut working, config));
            redactions.extend(apply_propagation(&mut working));
        }
    }

    compute_percentages(&mut working);
    if config.cumulative {
        compute_cumulative(&mut working);
    }

    report.rows = working.len();
    report.redactions = summarize(&redactions);
    info!(
        rows = report.rows,
        buckets = report.buckets,
        redacted = report.redactions.total(),
        denominators_below_floor = report.denominators_below_floor,
        "table published"
    );

    Ok(Publication {
        table: working,
        redactions,
        report,
    })
}
