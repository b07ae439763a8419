use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::table::{CountRow, CountsTable, Period};
use crate::types::{Cell, Denominator, MAX_COUNT};

/// Mapping from fine periods to the bucket each one joins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketPlan {
    /// Period -> earliest period of its bucket
    pub mapping: BTreeMap<Period, Period>,
    /// Leading periods left out so the rest divide evenly
    pub dropped: Vec<Period>,
    /// Bucket keys in ascending order
    pub buckets: Vec<Period>,
}

/// Plan buckets of `width` consecutive periods, dropping the earliest
/// `periods.len() % width` periods. `periods` must be sorted and distinct.
pub fn plan_buckets(periods: &[Period], width: usize) -> BucketPlan {
    let remainder = periods.len() % width;
    let (dropped, kept) = periods.split_at(remainder);

    let mut plan = BucketPlan {
        dropped: dropped.to_vec(),
        ..BucketPlan::default()
    };
    for chunk in kept.chunks(width) {
        let key = chunk[0];
        plan.buckets.push(key);
        for &period in chunk {
            plan.mapping.insert(period, key);
        }
    }
    plan
}

/// Sum of two counts, `None` past [`MAX_COUNT`]
fn add_counts(x: u64, y: u64) -> Option<u64> {
    x.checked_add(y).filter(|&sum| sum <= MAX_COUNT)
}

/// Sum two counts cells. A sentinel is never summed back into a number.
/// `None` when the sum is too large to carry.
fn add_cells(a: Cell, b: Cell) -> Option<Cell> {
    match (a, b) {
        (Cell::Redacted, _) | (_, Cell::Redacted) => Some(Cell::Redacted),
        (Cell::Count(x), Cell::Count(y)) => add_counts(x, y).map(Cell::Count),
        (Cell::Count(x), Cell::Missing) | (Cell::Missing, Cell::Count(x)) => Some(Cell::Count(x)),
        (Cell::Missing, Cell::Missing) => Some(Cell::Missing),
    }
}

fn add_denominators(a: Denominator, b: Denominator) -> Option<Denominator> {
    match (a, b) {
        (Denominator::BelowFloor(f), _) | (_, Denominator::BelowFloor(f)) => {
            Some(Denominator::BelowFloor(f))
        }
        (Denominator::Count(x), Denominator::Count(y)) => add_counts(x, y).map(Denominator::Count),
        (Denominator::Count(x), Denominator::Missing)
        | (Denominator::Missing, Denominator::Count(x)) => Some(Denominator::Count(x)),
        (Denominator::Missing, Denominator::Missing) => Some(Denominator::Missing),
    }
}

/// Merge consecutive periods into buckets, summing counts and denominators
/// per (category, bucket). Runs on raw values, before any redaction.
///
/// Fewer periods than `width` yields an empty table.
pub fn rebucket(table: &CountsTable, width: usize) -> (CountsTable, BucketPlan) {
    let periods = table.periods();
    let plan = plan_buckets(&periods, width);

    if !plan.dropped.is_empty() {
        info!(
            dropped = plan.dropped.len(),
            first_kept = ?plan.buckets.first(),
            "dropped leading periods to fill whole buckets"
        );
    }
    if plan.buckets.is_empty() && !periods.is_empty() {
        warn!(
            periods = periods.len(),
            width, "too few periods for a single bucket; table is empty"
        );
    }

    // `None` marks a sum that overflowed; it stays undefined for the rest of the bucket
    let mut sums: BTreeMap<(Period, Option<String>), (Option<Cell>, Option<Denominator>)> =
        BTreeMap::new();
    for row in &table.rows {
        let Some(&bucket) = plan.mapping.get(&row.period) else {
            continue;
        };
        sums.entry((bucket, row.category.clone()))
            .and_modify(|(counts, denominators)| {
                let had_counts = counts.is_some();
                *counts = (*counts).and_then(|c| add_cells(c, row.counts));
                if had_counts && counts.is_none() {
                    warn!(%bucket, "bucket count too large; treated as missing");
                }
                *denominators = (*denominators).and_then(|d| add_denominators(d, row.denominators));
            })
            .or_insert((Some(row.counts), Some(row.denominators)));
    }

    let rows = sums
        .into_iter()
        .map(|((bucket, category), (counts, denominators))| {
            CountRow::new(bucket, category, counts.unwrap_or(Cell::Missing))
                .with_denominator(denominators.unwrap_or(Denominator::Missing))
        })
        .collect();

    (CountsTable::from_rows(rows), plan)
}
