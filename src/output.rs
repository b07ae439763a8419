use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::readers::RawTable;
use crate::table::CountsTable;
use crate::types::{PublicationReport, Result};

/// Column layout of a published table
#[derive(Debug, Clone)]
pub struct TableLayout<'a> {
    pub delimiter: u8,
    pub period_header: &'a str,
    pub category_header: Option<&'a str>,
    /// When set, a column of this name holds each row's counts column
    pub measure_header: Option<&'a str>,
    pub cumulative: bool,
}

impl Default for TableLayout<'_> {
    fn default() -> Self {
        Self {
            delimiter: b',',
            period_header: "index_date",
            category_header: None,
            measure_header: None,
            cumulative: false,
        }
    }
}

fn format_percentage(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_default()
}

/// Write published tables, one per counts column, as one delimited table.
/// Without a measure column a single table is written as is.
pub fn write_measures<W: Write>(
    tables: &[(&str, &CountsTable)],
    layout: &TableLayout<'_>,
    writer: W,
) -> Result<()> {
    let mut out = WriterBuilder::new()
        .delimiter(layout.delimiter)
        .from_writer(writer);

    let mut header = vec![layout.period_header];
    if let Some(category) = layout.category_header {
        header.push(category);
    }
    if let Some(measure) = layout.measure_header {
        header.push(measure);
    }
    header.extend(["counts", "denominators", "percentage"]);
    if layout.cumulative {
        header.push("cumulative_percentage");
    }
    out.write_record(&header)?;

    for (measure, table) in tables {
        for row in &table.rows {
            let mut record = vec![row.period.format("%Y-%m-%d").to_string()];
            if layout.category_header.is_some() {
                record.push(row.category.clone().unwrap_or_default());
            }
            if layout.measure_header.is_some() {
                record.push(measure.to_string());
            }
            record.push(row.counts.to_string());
            record.push(row.denominators.to_string());
            record.push(format_percentage(row.percentage));
            if layout.cumulative {
                record.push(format_percentage(row.cumulative_percentage));
            }
            out.write_record(&record)?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Write published tables to a file
pub fn write_measures_file(
    tables: &[(&str, &CountsTable)],
    layout: &TableLayout<'_>,
    path: &Path,
) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_measures(tables, layout, std::io::BufWriter::new(file))
}

/// Write published tables to stdout
pub fn write_measures_stdout(tables: &[(&str, &CountsTable)], layout: &TableLayout<'_>) -> Result<()> {
    let stdout = std::io::stdout();
    write_measures(tables, layout, stdout.lock())
}

/// Write a text table unchanged in shape
pub fn write_raw<W: Write>(raw: &RawTable, delimiter: u8, writer: W) -> Result<()> {
    let mut out = WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(writer);
    out.write_record(&raw.headers)?;
    for record in &raw.records {
        out.write_record(record)?;
    }
    out.flush()?;
    Ok(())
}

/// Write report to JSON file
pub fn write_json_file(report: &PublicationReport, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Write report to JSON string
pub fn to_json_string(report: &PublicationReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write report to stdout
pub fn write_json_stdout(report: &PublicationReport) -> Result<()> {
    let json = to_json_string(report)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CountRow;
    use crate::types::{Cell, Denominator, SdcConfig};
    use chrono::NaiveDate;

    fn published_table() -> CountsTable {
        let period = NaiveDate::from_ymd_opt(2020, 11, 2).unwrap();
        let mut shown = CountRow::new(period, Some("Female".to_string()), Cell::Count(30))
            .with_denominator(Denominator::Count(400));
        shown.percentage = Some(7.5);
        shown.cumulative_percentage = Some(7.5);
        let hidden = CountRow::new(period, Some("Male".to_string()), Cell::Redacted)
            .with_denominator(Denominator::BelowFloor(100));
        CountsTable::from_rows(vec![shown, hidden])
    }

    fn render(table: &CountsTable, layout: &TableLayout<'_>) -> String {
        let mut buf = Vec::new();
        write_measures(&[("counts", table)], layout, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_table_with_category() {
        let layout = TableLayout {
            category_header: Some("sex"),
            ..TableLayout::default()
        };
        let text = render(&published_table(), &layout);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "index_date,sex,counts,denominators,percentage");
        assert_eq!(lines[1], "2020-11-02,Female,30,400,7.5");
        assert_eq!(lines[2], "2020-11-02,Male,[REDACTED],Less than 100,");
    }

    #[test]
    fn test_write_table_cumulative_tsv() {
        let layout = TableLayout {
            delimiter: b'\t',
            period_header: "week",
            category_header: None,
            measure_header: None,
            cumulative: true,
        };
        let text = render(&published_table(), &layout);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "week\tcounts\tdenominators\tpercentage\tcumulative_percentage"
        );
        assert_eq!(lines[1], "2020-11-02\t30\t400\t7.5\t7.5");
        assert_eq!(lines[2], "2020-11-02\t[REDACTED]\tLess than 100\t\t");
    }

    #[test]
    fn test_write_measures_long_format() {
        let layout = TableLayout {
            category_header: Some("sex"),
            measure_header: Some("measure"),
            ..TableLayout::default()
        };
        let table = published_table();
        let mut buf = Vec::new();
        write_measures(&[("oximetry", &table), ("blood_pressure", &table)], &layout, &mut buf)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "index_date,sex,measure,counts,denominators,percentage");
        assert_eq!(lines[1], "2020-11-02,Female,oximetry,30,400,7.5");
        assert_eq!(lines[4], "2020-11-02,Male,blood_pressure,[REDACTED],Less than 100,");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_percentage_keeps_one_decimal() {
        assert_eq!(format_percentage(Some(12.0)), "12.0");
        assert_eq!(format_percentage(None), "");
    }

    #[test]
    fn test_write_raw_preserves_shape() {
        let raw = RawTable {
            headers: vec!["code".to_string(), "patients".to_string()],
            records: vec![vec!["1325191000000108".to_string(), "[REDACTED]".to_string()]],
        };
        let mut buf = Vec::new();
        write_raw(&raw, b',', &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text, "code,patients\n1325191000000108,[REDACTED]\n");
    }

    #[test]
    fn test_json_serialization() {
        let mut report = PublicationReport::new(SdcConfig::default());
        report.input_file = Some("counts.csv".to_string());
        report.rows = 2;

        let json = to_json_string(&report).unwrap();
        assert!(json.contains("\"input_file\": \"counts.csv\""));
        assert!(json.contains("\"version\": \"1.0.0\""));
        assert!(json.contains("\"strategy\": \"cascade\""));
        assert!(!json.contains("input_hash"));
    }

    #[test]
    fn test_write_measures_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = published_table();
        write_measures_file(&[("counts", &table)], &TableLayout::default(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("index_date,counts,denominators,percentage\n"));
    }
}
