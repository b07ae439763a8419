use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::info;

use crate::error::Error;
use crate::logging::LogFormat;
use crate::output::{self, TableLayout};
use crate::pipeline::publish;
use crate::privacy::redact_and_round_record;
use crate::readers::{self, compute_file_hash, format_for_path, CountsColumns, RawTable};
use crate::table::{CountsTable, PopulationSizes};
use crate::types::{FileFormat, PublicationReport, RedactionStrategy, Result, SdcConfig};

/// Disclosure-safe publication of aggregated counts
#[derive(Parser, Debug)]
#[command(name = "safe-counts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Re-bucket, redact and publish a weekly counts table
    Publish(PublishArgs),

    /// Redact and round every numeric cell of a table
    Redact(RedactArgs),
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Counts table (csv or tsv)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Population sizes per period (defaults to the per-period counts total)
    #[arg(short, long)]
    pub population: Option<PathBuf>,

    /// Published table path (stdout if not specified or `-`)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// JSON report path (`-` for stdout)
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[arg(long, default_value = "index_date")]
    pub period_column: String,

    #[arg(long)]
    pub category_column: Option<String>,

    /// Counts column to publish (repeatable; each is redacted on its own)
    #[arg(long = "counts-column", default_value = "counts")]
    pub counts_columns: Vec<String>,

    #[arg(long, default_value = "population")]
    pub population_column: String,

    #[arg(long, value_enum)]
    pub strategy: Option<RedactionStrategy>,

    /// Also redact the smallest survivor of a group with one redacted cell
    #[arg(long, default_value_t = false)]
    pub completion: bool,

    /// Add a cumulative percentage column
    #[arg(long, default_value_t = false)]
    pub cumulative: bool,

    /// Counts at or below this are redacted
    #[arg(long)]
    pub threshold: Option<u64>,

    /// Published counts are rounded up to a multiple of this
    #[arg(long)]
    pub rounding_base: Option<u64>,

    /// Denominators below this are replaced with a label
    #[arg(long)]
    pub denominator_floor: Option<u64>,

    /// Consecutive periods merged into one bucket
    #[arg(long)]
    pub periods_per_bucket: Option<usize>,

    /// JSON file with any subset of the settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Record the SHA-256 of the input in the report
    #[arg(long, default_value_t = false)]
    pub hash_file: bool,
}

impl PublishArgs {
    /// Defaults, then the JSON file, then explicit flags
    pub fn config(&self) -> Result<SdcConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text)?
            }
            None => SdcConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(base) = self.rounding_base {
            config.rounding_base = base;
        }
        if let Some(floor) = self.denominator_floor {
            config.denominator_floor = floor;
        }
        if let Some(width) = self.periods_per_bucket {
            config.periods_per_bucket = width;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if self.completion {
            config.apply_completion = true;
        }
        if self.cumulative {
            config.cumulative = true;
        }

        config.validate()?;
        Ok(config)
    }

    fn columns(&self, counts: &str) -> CountsColumns {
        CountsColumns {
            period: self.period_column.clone(),
            category: self.category_column.clone(),
            counts: counts.to_string(),
        }
    }
}

#[derive(Args, Debug)]
pub struct RedactArgs {
    /// Table to redact (csv or tsv)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output path (stdout if not specified)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Column left untouched, e.g. a code column (repeatable)
    #[arg(long = "key-column")]
    pub key_columns: Vec<String>,
}

/// `-` names stdout
fn is_stdout(path: &Path) -> bool {
    path == Path::new("-")
}

/// Delimiter of the output: from its extension, else from the input's
fn output_delimiter(out: Option<&Path>, input: &Path) -> Result<u8> {
    let format = match out.filter(|path| !is_stdout(path)) {
        Some(path) => format_for_path(path).unwrap_or(FileFormat::Csv),
        None => format_for_path(input)?,
    };
    Ok(format.delimiter())
}

pub fn run_publish(args: &PublishArgs) -> Result<()> {
    let config = args.config()?;

    let population = match &args.population {
        Some(path) => {
            let population = readers::create_reader(path)?
                .read_population(&args.period_column, &args.population_column)?;
            info!(periods = population.value.len(), "population sizes read");
            Some(population)
        }
        None => {
            info!("no population file; using per-period counts totals");
            None
        }
    };

    let mut report = PublicationReport::new(config.clone());
    if let Some(population) = &population {
        report.warnings.extend(population.warnings.iter().cloned());
    }

    // Each counts column is redacted on its own
    let mut published = Vec::with_capacity(args.counts_columns.len());
    for measure in &args.counts_columns {
        let loaded = readers::create_reader(&args.input)?.read_counts(&args.columns(measure))?;
        info!(%measure, rows = loaded.value.len(), "counts table read");

        let fallback;
        let sizes = match &population {
            Some(population) => &population.value,
            None => {
                fallback = PopulationSizes::from_counts(&loaded.value);
                &fallback
            }
        };

        let mut publication = publish(&loaded.value, sizes, &config)?;
        let mut warnings = loaded.warnings;
        warnings.append(&mut publication.report.warnings);
        publication.report.warnings = warnings;

        report.merge(measure, publication.report);
        published.push((measure.as_str(), publication.table));
    }

    report.input_file = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    if args.hash_file {
        report.input_hash = Some(compute_file_hash(&args.input)?);
    }

    let tables: Vec<(&str, &CountsTable)> =
        published.iter().map(|(measure, table)| (*measure, table)).collect();
    let layout = TableLayout {
        delimiter: output_delimiter(args.out.as_deref(), &args.input)?,
        period_header: &args.period_column,
        category_header: args.category_column.as_deref(),
        measure_header: (tables.len() > 1).then_some("measure"),
        cumulative: config.cumulative,
    };
    match args.out.as_deref() {
        Some(path) if !is_stdout(path) => {
            output::write_measures_file(&tables, &layout, path)?;
            info!(path = %path.display(), "table written");
        }
        _ => output::write_measures_stdout(&tables, &layout)?,
    }

    match args.report.as_deref() {
        Some(path) if is_stdout(path) => output::write_json_stdout(&report)?,
        Some(path) => {
            output::write_json_file(&report, path)?;
            info!(path = %path.display(), "report written");
        }
        None => {}
    }

    Ok(())
}

/// Apply cellwise redaction to every record of a raw table
pub fn redact_table(raw: &RawTable, key_columns: &[String], config: &SdcConfig) -> Result<(RawTable, usize)> {
    let keys = key_columns
        .iter()
        .map(|name| {
            raw.column_index(name).ok_or_else(|| Error::MissingColumn {
                column: name.clone(),
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut total = 0;
    let records = raw
        .records
        .iter()
        .map(|record| {
            let (out, redacted) = redact_and_round_record(record, &keys, config);
            total += redacted;
            out
        })
        .collect();

    Ok((
        RawTable {
            headers: raw.headers.clone(),
            records,
        },
        total,
    ))
}

pub fn run_redact(args: &RedactArgs) -> Result<()> {
    let raw = readers::create_reader(&args.input)?.read_raw()?;
    let (redacted, total) = redact_table(&raw, &args.key_columns, &SdcConfig::default())?;
    info!(rows = redacted.records.len(), redacted = total, "table redacted");

    let delimiter = output_delimiter(args.out.as_deref(), &args.input)?;
    match &args.out {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            output::write_raw(&redacted, delimiter, std::io::BufWriter::new(file))?;
        }
        None => output::write_raw(&redacted, delimiter, std::io::stdout().lock())?,
    }
    Ok(())
}
