// ============================================================
// CSV PARSER
// ============================================================
// Parse CSV files into a DataTable with encoding detection,
// delimiter detection, and sample-based column type inference.

use csv::{ReaderBuilder, Trim};
use std::path::Path;

use crate::domain::error::{AppError, Result};
use crate::domain::table::{Column, ColumnType, DataTable};

/// CSV parser with encoding and delimiter detection
pub struct CsvParser {
    /// Delimiter character; None means detect from content
    delimiter: Option<u8>,

    /// Whether to trim whitespace from values
    trim: bool,

    /// Number of data rows sampled for column type inference
    type_sample_rows: usize,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: None,
            trim: true,
            type_sample_rows: 1000,
        }
    }
}

impl CsvParser {
    /// Create a new CSV parser with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed delimiter instead of detecting one
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Set whether to trim whitespace
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Parse a CSV file and return a typed table
    pub fn parse_file(&self, path: &Path) -> Result<DataTable> {
        let content = self.read_with_encoding_detection(path)?;
        self.parse_content(&content)
    }

    /// Parse CSV content from string
    pub fn parse_content(&self, content: &str) -> Result<DataTable> {
        let delimiter = self
            .delimiter
            .unwrap_or_else(|| Self::detect_delimiter(content));

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .flexible(true) // Allow rows with different lengths
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AppError::ParseError(format!("Failed to read CSV headers: {}", e)))?
            .clone();

        let names: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        if names.is_empty() || names.iter().all(|n| n.trim().is_empty()) {
            return Err(AppError::ParseError(
                "CSV input has no header row".to_string(),
            ));
        }

        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::ParseError(format!("Failed to parse CSV row {}: {}", index + 1, e))
            })?;

            // Short rows pad with NULL, long rows drop the overflow so the
            // row always matches the header width.
            let mut row: Vec<Option<String>> = Vec::with_capacity(names.len());
            for i in 0..names.len() {
                let cell = record.get(i).unwrap_or("");
                if cell.trim().is_empty() {
                    row.push(None);
                } else {
                    row.push(Some(cell.to_string()));
                }
            }
            rows.push(row);
        }

        let columns = self.infer_columns(&names, &rows);

        Ok(DataTable { columns, rows })
    }

    /// Infer each column's type from the first `type_sample_rows` rows
    fn infer_columns(&self, names: &[String], rows: &[Vec<Option<String>>]) -> Vec<Column> {
        let sample = &rows[..rows.len().min(self.type_sample_rows)];
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Column {
                name: name.clone(),
                ty: ColumnType::infer(
                    sample
                        .iter()
                        .filter_map(|row| row.get(i).and_then(|c| c.as_deref())),
                ),
            })
            .collect()
    }

    /// Detect the most likely delimiter from the first few lines
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];
        let sample_lines: Vec<_> = content.lines().take(10).collect();

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        for &delimiter in &candidates {
            if sample_lines.is_empty() {
                continue;
            }

            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.chars().filter(|&c| c as u8 == delimiter).count())
                .collect();

            // Score by consistency (low standard deviation) and frequency
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;

            let score = avg / (1.0 + variance.sqrt());
            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }

    /// Read file contents, falling back to Windows-1252 for non-UTF-8 input
    fn read_with_encoding_detection(&self, path: &Path) -> Result<String> {
        let buffer = std::fs::read(path)
            .map_err(|e| AppError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;

        if let Ok(content) = std::str::from_utf8(&buffer) {
            return Ok(content.to_string());
        }

        let (content, _, had_errors) = encoding_rs::WINDOWS_1252.decode(&buffer);
        if had_errors {
            return Err(AppError::ParseError(format!(
                "File {} is neither valid UTF-8 nor Windows-1252",
                path.display()
            )));
        }
        Ok(content.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_csv() {
        let content = "name,age,city\nAlice,30,NYC\nBob,25,LA";
        let table = CsvParser::new().parse_content(content).unwrap();

        assert_eq!(table.column_names(), vec!["name", "age", "city"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0][0].as_deref(), Some("Alice"));
        assert_eq!(table.rows[1][2].as_deref(), Some("LA"));
    }

    #[test]
    fn test_column_types_inferred() {
        let content = "id,total,active,note\n1,9.99,true,first\n2,12.50,false,";
        let table = CsvParser::new().parse_content(content).unwrap();

        assert_eq!(table.columns[0].ty, ColumnType::Integer);
        assert_eq!(table.columns[1].ty, ColumnType::Real);
        assert_eq!(table.columns[2].ty, ColumnType::Boolean);
        assert_eq!(table.columns[3].ty, ColumnType::Text);
    }

    #[test]
    fn test_empty_cell_becomes_null() {
        let content = "a,b\n1,\n,2";
        let table = CsvParser::new().parse_content(content).unwrap();

        assert_eq!(table.rows[0][1], None);
        assert_eq!(table.rows[1][0], None);
    }

    #[test]
    fn test_quoted_fields() {
        let content = "name,desc\nwidget,\"small, round\"";
        let table = CsvParser::new().parse_content(content).unwrap();

        assert_eq!(table.rows[0][1].as_deref(), Some("small, round"));
    }

    #[test]
    fn test_short_rows_pad_with_null() {
        let content = "a,b,c\n1,2";
        let table = CsvParser::new().parse_content(content).unwrap();

        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][2], None);
    }

    #[test]
    fn test_detect_semicolon_delimiter() {
        let content = "a;b;c\n1;2;3\n4;5;6";
        assert_eq!(CsvParser::detect_delimiter(content), b';');

        let table = CsvParser::new().parse_content(content).unwrap();
        assert_eq!(table.column_names(), vec!["a", "b", "c"]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_header_only_csv_has_zero_rows() {
        let content = "a,b,c\n";
        let table = CsvParser::new().parse_content(content).unwrap();

        assert_eq!(table.row_count(), 0);
        assert_eq!(table.columns.len(), 3);
        // No sample rows, every column defaults to Text
        assert!(table.columns.iter().all(|c| c.ty == ColumnType::Text));
    }
}
