pub mod csv;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::table::{CountsTable, PopulationSizes};
use crate::types::{FileFormat, Result};

/// Names of the columns a counts table is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountsColumns {
    pub period: String,
    pub category: Option<String>,
    pub counts: String,
}

impl Default for CountsColumns {
    fn default() -> Self {
        Self {
            period: "index_date".to_string(),
            category: None,
            counts: "counts".to_string(),
        }
    }
}

/// A value read from a file, with warnings about cells that were degraded
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

/// A delimited table kept as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Common trait for aggregate table readers
pub trait TableReader {
    /// Read a counts table
    fn read_counts(&mut self, columns: &CountsColumns) -> Result<Loaded<CountsTable>>;

    /// Read per-period population sizes
    fn read_population(
        &mut self,
        period_column: &str,
        population_column: &str,
    ) -> Result<Loaded<PopulationSizes>>;

    /// Read the file as text, without interpreting any column
    fn read_raw(&mut self) -> Result<RawTable>;
}

/// Determine the format of a file from its extension
pub fn format_for_path(path: &Path) -> Result<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    FileFormat::from_extension(ext).ok_or_else(|| {
        crate::error::Error::UnsupportedFormat(format!(
            "Unsupported file extension: .{}",
            ext
        ))
    })
}

/// Create a reader for the given file path
pub fn create_reader(path: &Path) -> Result<Box<dyn TableReader>> {
    match format_for_path(path)? {
        FileFormat::Csv => Ok(Box::new(csv::CsvReader::new(path)?)),
        FileFormat::Tsv => Ok(Box::new(csv::CsvReader::new_tsv(path)?)),
    }
}

/// Compute SHA-256 hash of a file (streaming to handle large files)
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let result = hasher.finalize();
    Ok(format!("{:x}", result))
}
