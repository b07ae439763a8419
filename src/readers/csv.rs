use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord};
use tracing::warn;

use crate::error::Error;
use crate::inference::{is_missing, parse_count, parse_numeric, parse_period, whole_count};
use crate::table::{CountRow, CountsTable, Period, PopulationSizes};
use crate::types::{Cell, Result};

use super::{CountsColumns, Loaded, RawTable, TableReader};

/// CSV/TSV file reader
pub struct CsvReader {
    path: PathBuf,
    delimiter: u8,
}

impl CsvReader {
    /// Create a new CSV reader
    pub fn new(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            delimiter: b',',
        })
    }

    /// Create a new TSV reader
    pub fn new_tsv(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            delimiter: b'\t',
        })
    }

    fn create_reader(&self) -> Result<Reader<BufReader<File>>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let csv_reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Ok(csv_reader)
    }
}

fn headers_of(reader: &mut Reader<BufReader<File>>) -> Result<Vec<String>> {
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

fn require_column(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
        })
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

/// Line number of a data record, counting the header as line 1
fn line_of(record_idx: usize) -> usize {
    record_idx + 2
}

fn period_of(record: &StringRecord, idx: usize, record_idx: usize) -> Result<Period> {
    let raw = field(record, idx);
    parse_period(raw).ok_or_else(|| {
        Error::InvalidInput(format!(
            "line {}: unrecognised period '{}'",
            line_of(record_idx),
            raw
        ))
    })
}

impl TableReader for CsvReader {
    fn read_counts(&mut self, columns: &CountsColumns) -> Result<Loaded<CountsTable>> {
        let mut reader = self.create_reader()?;
        let headers = headers_of(&mut reader)?;

        let period_idx = require_column(&headers, &columns.period)?;
        let counts_idx = require_column(&headers, &columns.counts)?;
        let category_idx = columns
            .category
            .as_deref()
            .map(|name| require_column(&headers, name))
            .transpose()?;

        let mut table = CountsTable::new();
        let mut warnings = Vec::new();

        for (record_idx, result) in reader.records().enumerate() {
            let record = result?;
            let period = period_of(&record, period_idx, record_idx)?;
            let category = category_idx.map(|idx| field(&record, idx).trim().to_string());

            let raw = field(&record, counts_idx);
            let counts = match parse_count(raw) {
                Some(cell) => cell,
                None => {
                    warn!(line = line_of(record_idx), "malformed count; treated as missing");
                    warnings.push(format!(
                        "Line {}: malformed count treated as missing",
                        line_of(record_idx)
                    ));
                    Cell::Missing
                }
            };

            table.push(CountRow::new(period, category, counts));
        }

        Ok(Loaded {
            value: table,
            warnings,
        })
    }

    fn read_population(
        &mut self,
        period_column: &str,
        population_column: &str,
    ) -> Result<Loaded<PopulationSizes>> {
        let mut reader = self.create_reader()?;
        let headers = headers_of(&mut reader)?;

        let period_idx = require_column(&headers, period_column)?;
        let size_idx = require_column(&headers, population_column)?;

        let mut population = PopulationSizes::new();
        let mut warnings = Vec::new();

        for (record_idx, result) in reader.records().enumerate() {
            let record = result?;
            let period = period_of(&record, period_idx, record_idx)?;
            let raw = field(&record, size_idx);

            let size = if is_missing(raw) {
                None
            } else {
                parse_numeric(raw).and_then(whole_count)
            };
            match size {
                Some(v) => population.insert(period, v),
                None => {
                    warn!(line = line_of(record_idx), %period, "unusable population size; skipped");
                    warnings.push(format!(
                        "Line {}: unusable population size for period {}",
                        line_of(record_idx),
                        period
                    ));
                }
            }
        }

        Ok(Loaded {
            value: population,
            warnings,
        })
    }

    fn read_raw(&mut self) -> Result<RawTable> {
        let mut reader = self.create_reader()?;
        let headers = headers_of(&mut reader)?;

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            records.push(record.iter().map(|f| f.to_string()).collect());
        }

        Ok(RawTable { headers, records })
    }
}
