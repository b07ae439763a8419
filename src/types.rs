use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Published placeholder for any suppressed count
pub const REDACTED: &str = "[REDACTED]";

/// Default disclosure threshold: counts at or below this are never published
pub const DEFAULT_THRESHOLD: u64 = 5;

/// Default rounding base: published counts are multiples of this
pub const DEFAULT_ROUNDING_BASE: u64 = 5;

/// Default minimum publishable denominator
pub const DEFAULT_DENOMINATOR_FLOOR: u64 = 100;

/// Default number of weekly periods merged into one bucket
pub const DEFAULT_PERIODS_PER_BUCKET: usize = 4;

/// Largest count or population size carried as a number.
/// Every integer up to it is exact in `f64`; anything larger is undefined.
pub const MAX_COUNT: u64 = 1 << 53;

/// Version of the JSON publication report layout
pub const REPORT_VERSION: &str = "1.0.0";

/// A single counts cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Cell {
    Count(u64),
    Redacted,
    /// Malformed or absent input; never numeric, never summed
    Missing,
}

impl Cell {
    pub fn value(&self) -> Option<u64> {
        match self {
            Cell::Count(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_redacted(&self) -> bool {
        matches!(self, Cell::Redacted)
    }

    /// Replace the cell with the sentinel. Returns false if it already was one.
    pub fn redact(&mut self) -> bool {
        if self.is_redacted() {
            return false;
        }
        *self = Cell::Redacted;
        true
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Count(v) => write!(f, "{}", v),
            Cell::Redacted => f.write_str(REDACTED),
            Cell::Missing => Ok(()),
        }
    }
}

/// A denominators cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Denominator {
    Count(u64),
    /// Replaced because the true value fell below the given floor
    BelowFloor(u64),
    Missing,
}

impl Denominator {
    pub fn value(&self) -> Option<u64> {
        match self {
            Denominator::Count(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Denominator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denominator::Count(v) => write!(f, "{}", v),
            Denominator::BelowFloor(floor) => write!(f, "Less than {}", floor),
            Denominator::Missing => Ok(()),
        }
    }
}

/// Supported delimited-text formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Tsv,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "tsv" | "tab" => Some(FileFormat::Tsv),
            _ => None,
        }
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv => b',',
            FileFormat::Tsv => b'\t',
        }
    }
}

/// How the counts column of a table is redacted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RedactionStrategy {
    /// Redact small cells plus the smallest neighbours until the hidden mass exceeds the threshold
    #[default]
    Cascade,
    /// Redact small cells, then every cell of any period that lost one
    AllOrNothing,
}

/// Disclosure control settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdcConfig {
    /// Counts at or below this value are suppressed
    pub threshold: u64,

    /// Surviving counts are rounded up to a multiple of this
    pub rounding_base: u64,

    /// Denominators below this are replaced with a label
    pub denominator_floor: u64,

    /// Number of consecutive periods merged into one bucket
    pub periods_per_bucket: usize,

    /// Redaction applied to the counts column
    pub strategy: RedactionStrategy,

    /// Also redact the smallest survivor of groups with a single redacted cell
    pub apply_completion: bool,

    /// Add a running percentage over the categories of each period
    pub cumulative: bool,
}

impl Default for SdcConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            rounding_base: DEFAULT_ROUNDING_BASE,
            denominator_floor: DEFAULT_DENOMINATOR_FLOOR,
            periods_per_bucket: DEFAULT_PERIODS_PER_BUCKET,
            strategy: RedactionStrategy::default(),
            apply_completion: false,
            cumulative: false,
        }
    }
}

impl SdcConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rounding_base == 0 {
            return Err(Error::InvalidConfig(
                "rounding_base must be at least 1".to_string(),
            ));
        }
        if self.periods_per_bucket == 0 {
            return Err(Error::InvalidConfig(
                "periods_per_bucket must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Number of redactions made for each reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionSummary {
    pub below_threshold: u64,
    pub group_total: u64,
    pub cascade: u64,
    pub completion: u64,
    pub propagated: u64,
}

impl RedactionSummary {
    pub fn total(&self) -> u64 {
        self.below_threshold + self.group_total + self.cascade + self.completion + self.propagated
    }

    pub fn merge(&mut self, other: &RedactionSummary) {
        self.below_threshold += other.below_threshold;
        self.group_total += other.group_total;
        self.cascade += other.cascade;
        self.completion += other.completion;
        self.propagated += other.propagated;
    }
}

/// Machine-readable record of one publication run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationReport {
    /// Report layout version
    pub version: String,

    /// Input file name (without path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,

    /// Input file hash (SHA-256)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_hash: Option<String>,

    /// Settings in effect for the run
    pub config: SdcConfig,

    /// Counts columns published, each redacted on its own
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<String>,

    /// Distinct periods in the input
    pub periods_in: usize,

    /// Leading periods dropped so the rest divide into whole buckets
    pub periods_dropped: usize,

    /// Buckets in the published table
    pub buckets: usize,

    /// Rows in the published table
    pub rows: usize,

    /// Redactions by reason
    pub redactions: RedactionSummary,

    /// Denominators replaced by the floor label
    pub denominators_below_floor: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PublicationReport {
    pub fn new(config: SdcConfig) -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
            input_file: None,
            input_hash: None,
            config,
            measures: Vec::new(),
            periods_in: 0,
            periods_dropped: 0,
            buckets: 0,
            rows: 0,
            redactions: RedactionSummary::default(),
            denominators_below_floor: 0,
            warnings: Vec::new(),
        }
    }

    /// Fold in the report of one counts column of the same input.
    /// Period and bucket counts are shared by every column and taken as is.
    pub fn merge(&mut self, measure: &str, other: PublicationReport) {
        self.measures.push(measure.to_string());
        self.periods_in = other.periods_in;
        self.periods_dropped = other.periods_dropped;
        self.buckets = other.buckets;
        self.rows += other.rows;
        self.redactions.merge(&other.redactions);
        self.denominators_below_floor += other.denominators_below_floor;
        self.warnings
            .extend(other.warnings.into_iter().map(|w| format!("{}: {}", measure, w)));
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Count(10).to_string(), "10");
        assert_eq!(Cell::Redacted.to_string(), "[REDACTED]");
        assert_eq!(Cell::Missing.to_string(), "");
    }

    #[test]
    fn test_cell_redact_is_one_way() {
        let mut cell = Cell::Count(3);
        assert!(cell.redact());
        assert!(!cell.redact());
        assert_eq!(cell, Cell::Redacted);
        assert_eq!(cell.value(), None);
    }

    #[test]
    fn test_denominator_below_floor_label() {
        assert_eq!(Denominator::BelowFloor(100).to_string(), "Less than 100");
        assert_eq!(Denominator::Count(250).to_string(), "250");
    }

    #[test]
    fn test_default_config() {
        let config = SdcConfig::default();
        assert_eq!(config.threshold, 5);
        assert_eq!(config.rounding_base, 5);
        assert_eq!(config.denominator_floor, 100);
        assert_eq!(config.periods_per_bucket, 4);
        assert_eq!(config.strategy, RedactionStrategy::Cascade);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_rounding_base() {
        let config = SdcConfig {
            rounding_base: 0,
            ..SdcConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_config_rejects_zero_bucket_width() {
        let config = SdcConfig {
            periods_per_bucket: 0,
            ..SdcConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_json() {
        let config: SdcConfig =
            serde_json::from_str(r#"{"threshold": 7, "strategy": "all-or-nothing"}"#).unwrap();
        assert_eq!(config.threshold, 7);
        assert_eq!(config.rounding_base, 5);
        assert_eq!(config.strategy, RedactionStrategy::AllOrNothing);
    }

    #[test]
    fn test_file_format_from_extension() {
        assert_eq!(FileFormat::from_extension("CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("tab"), Some(FileFormat::Tsv));
        assert_eq!(FileFormat::from_extension("xlsx"), None);
        assert_eq!(FileFormat::Tsv.delimiter(), b'\t');
    }

    #[test]
    fn test_summary_total() {
        let summary = RedactionSummary {
            below_threshold: 2,
            cascade: 1,
            propagated: 3,
            ..RedactionSummary::default()
        };
        assert_eq!(summary.total(), 6);
    }

    #[test]
    fn test_report_merge_per_measure() {
        let mut first = PublicationReport::new(SdcConfig::default());
        first.periods_in = 10;
        first.buckets = 2;
        first.rows = 4;
        first.redactions.below_threshold = 1;
        first.warnings.push("No population size for period 2021-01-04".to_string());

        let mut second = first.clone();
        second.redactions.cascade = 2;
        second.warnings.clear();

        let mut report = PublicationReport::new(SdcConfig::default());
        report.merge("oximetry", first);
        report.merge("blood_pressure", second);

        assert_eq!(report.measures, vec!["oximetry", "blood_pressure"]);
        assert_eq!(report.periods_in, 10);
        assert_eq!(report.buckets, 2);
        assert_eq!(report.rows, 8);
        assert_eq!(report.redactions.below_threshold, 2);
        assert_eq!(report.redactions.cascade, 2);
        assert_eq!(
            report.warnings,
            vec!["oximetry: No population size for period 2021-01-04"]
        );
    }
}
