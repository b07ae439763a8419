//! In-memory counts tables.
//!
//! Redaction never mutates a table while scanning it. Each rule takes an
//! owned [`WorkingSet`] for one period, decides on it, and commits it back
//! with [`CountsTable::commit`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::types::{Cell, Denominator, MAX_COUNT};

/// Period key (start date of a week or bucket)
pub type Period = NaiveDate;

/// One (period, category) row of a counts table
#[derive(Debug, Clone, PartialEq)]
pub struct CountRow {
    pub period: Period,
    pub category: Option<String>,
    pub counts: Cell,
    pub denominators: Denominator,
    pub percentage: Option<f64>,
    pub cumulative_percentage: Option<f64>,
}

impl CountRow {
    pub fn new(period: Period, category: Option<String>, counts: Cell) -> Self {
        Self {
            period,
            category,
            counts,
            denominators: Denominator::Missing,
            percentage: None,
            cumulative_percentage: None,
        }
    }

    pub fn with_denominator(mut self, denominators: Denominator) -> Self {
        self.denominators = denominators;
        self
    }
}

/// Owned copy of the counts cells of one period, tagged with their row index
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSet {
    pub period: Period,
    pub cells: Vec<(usize, Cell)>,
}

impl WorkingSet {
    /// Sum of the numeric cells
    pub fn numeric_sum(&self) -> u64 {
        self.cells
            .iter()
            .filter_map(|(_, c)| c.value())
            .fold(0, u64::saturating_add)
    }

    pub fn redacted_count(&self) -> usize {
        self.cells.iter().filter(|(_, c)| c.is_redacted()).count()
    }

    /// Position (within `cells`) of the smallest numeric cell, first one wins ties
    pub fn smallest_numeric(&self) -> Option<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(pos, (_, c))| c.value().map(|v| (pos, v)))
            .min_by_key(|&(pos, v)| (v, pos))
            .map(|(pos, _)| pos)
    }
}

/// A counts table: rows keyed by period and optional category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountsTable {
    pub rows: Vec<CountRow>,
}

impl CountsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<CountRow>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: CountRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct periods in ascending order
    pub fn periods(&self) -> Vec<Period> {
        self.rows
            .iter()
            .map(|r| r.period)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Row indices of each period, periods ascending, rows in table order
    pub fn period_groups(&self) -> BTreeMap<Period, Vec<usize>> {
        let mut groups: BTreeMap<Period, Vec<usize>> = BTreeMap::new();
        for (idx, row) in self.rows.iter().enumerate() {
            groups.entry(row.period).or_default().push(idx);
        }
        groups
    }

    /// Copy out the counts cells of the given rows
    pub fn working_set(&self, period: Period, indices: &[usize]) -> WorkingSet {
        WorkingSet {
            period,
            cells: indices.iter().map(|&i| (i, self.rows[i].counts)).collect(),
        }
    }

    /// Write a working set back. A redacted cell in the table stays redacted.
    pub fn commit(&mut self, set: WorkingSet) {
        for (idx, cell) in set.cells {
            let target = &mut self.rows[idx].counts;
            if target.is_redacted() {
                continue;
            }
            *target = cell;
        }
    }

    /// Copy out, transform and commit every period independently
    pub fn for_each_period<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut WorkingSet),
    {
        for (period, indices) in self.period_groups() {
            let mut set = self.working_set(period, &indices);
            f(&mut set);
            self.commit(set);
        }
    }

    pub fn category(&self, idx: usize) -> Option<&str> {
        self.rows[idx].category.as_deref()
    }
}

/// Population size of each period, the source of denominators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationSizes {
    sizes: BTreeMap<Period, u64>,
}

impl PopulationSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, period: Period, size: u64) {
        self.sizes.insert(period, size);
    }

    pub fn get(&self, period: &Period) -> Option<u64> {
        self.sizes.get(period).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Use the numeric total of each period's category group as its population.
    /// A period whose total passes [`MAX_COUNT`] gets no entry.
    pub fn from_counts(table: &CountsTable) -> Self {
        let mut totals: BTreeMap<Period, Option<u64>> = BTreeMap::new();
        for row in &table.rows {
            let entry = totals.entry(row.period).or_insert(Some(0));
            *entry = (*entry)
                .and_then(|total| total.checked_add(row.counts.value().unwrap_or(0)))
                .filter(|&total| total <= MAX_COUNT);
        }
        totals
            .into_iter()
            .filter_map(|(period, total)| total.map(|size| (period, size)))
            .collect()
    }
}

impl FromIterator<(Period, u64)> for PopulationSizes {
    fn from_iter<I: IntoIterator<Item = (Period, u64)>>(iter: I) -> Self {
        Self {
            sizes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> Period {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    fn row(d: u32, category: &str, counts: Cell) -> CountRow {
        CountRow::new(date(d), Some(category.to_string()), counts)
    }

    #[test]
    fn test_period_groups_sorted() {
        let table = CountsTable::from_rows(vec![
            row(11, "a", Cell::Count(1)),
            row(4, "a", Cell::Count(2)),
            row(11, "b", Cell::Count(3)),
        ]);

        let groups = table.period_groups();
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(keys, vec![date(4), date(11)]);
        assert_eq!(groups[&date(11)], vec![0, 2]);
        assert_eq!(table.periods(), vec![date(4), date(11)]);
    }

    #[test]
    fn test_smallest_numeric_skips_non_numeric() {
        let set = WorkingSet {
            period: date(4),
            cells: vec![
                (0, Cell::Redacted),
                (1, Cell::Count(9)),
                (2, Cell::Missing),
                (3, Cell::Count(7)),
                (4, Cell::Count(7)),
            ],
        };
        assert_eq!(set.smallest_numeric(), Some(3));
        assert_eq!(set.numeric_sum(), 23);
        assert_eq!(set.redacted_count(), 1);
    }

    #[test]
    fn test_commit_never_unredacts() {
        let mut table = CountsTable::from_rows(vec![row(4, "a", Cell::Redacted)]);
        let set = WorkingSet {
            period: date(4),
            cells: vec![(0, Cell::Count(20))],
        };
        table.commit(set);
        assert_eq!(table.rows[0].counts, Cell::Redacted);
    }

    #[test]
    fn test_for_each_period_is_isolated() {
        let mut table = CountsTable::from_rows(vec![
            row(4, "a", Cell::Count(1)),
            row(11, "a", Cell::Count(50)),
        ]);

        table.for_each_period(|set| {
            if set.period == date(4) {
                for (_, cell) in set.cells.iter_mut() {
                    cell.redact();
                }
            }
        });

        assert_eq!(table.rows[0].counts, Cell::Redacted);
        assert_eq!(table.rows[1].counts, Cell::Count(50));
    }

    #[test]
    fn test_population_from_counts() {
        let table = CountsTable::from_rows(vec![
            row(4, "a", Cell::Count(10)),
            row(4, "b", Cell::Count(15)),
            row(4, "c", Cell::Missing),
            row(11, "a", Cell::Count(3)),
        ]);

        let population = PopulationSizes::from_counts(&table);
        assert_eq!(population.get(&date(4)), Some(25));
        assert_eq!(population.get(&date(11)), Some(3));
        assert_eq!(population.get(&date(18)), None);
        assert_eq!(population.len(), 2);
    }

    #[test]
    fn test_population_from_counts_skips_oversized_total() {
        let table = CountsTable::from_rows(vec![
            row(4, "a", Cell::Count(MAX_COUNT)),
            row(4, "b", Cell::Count(MAX_COUNT)),
            row(11, "a", Cell::Count(7)),
        ]);

        let population = PopulationSizes::from_counts(&table);
        assert_eq!(population.get(&date(4)), None);
        assert_eq!(population.get(&date(11)), Some(7));
    }

    #[test]
    fn test_numeric_sum_saturates() {
        let set = WorkingSet {
            period: date(4),
            cells: vec![(0, Cell::Count(u64::MAX)), (1, Cell::Count(9))],
        };
        assert_eq!(set.numeric_sum(), u64::MAX);
    }
}
