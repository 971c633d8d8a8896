// ============================================================
// TABLE TYPES
// ============================================================
// Data structures representing parsed CSV content ready for
// loading into a relational store.

use serde::{Deserialize, Serialize};

/// SQL-facing type of a column, inferred from a sample of parsed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Real,
    Boolean,
    Text,
}

impl ColumnType {
    /// Infer a column type from non-empty sample values.
    ///
    /// Order matters: a column is Integer only when every sample value
    /// parses as i64; a mix of integers and decimals degrades to Real.
    /// A column with no non-empty samples stays Text.
    pub fn infer<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut seen_any = false;
        let mut all_int = true;
        let mut all_real = true;
        let mut all_bool = true;

        for value in values {
            let v = value.trim();
            if v.is_empty() {
                continue;
            }
            seen_any = true;

            if all_int && v.parse::<i64>().is_err() {
                all_int = false;
            }
            if all_real && v.parse::<f64>().is_err() {
                all_real = false;
            }
            if all_bool && !v.eq_ignore_ascii_case("true") && !v.eq_ignore_ascii_case("false") {
                all_bool = false;
            }

            if !all_int && !all_real && !all_bool {
                break;
            }
        }

        if !seen_any {
            return ColumnType::Text;
        }
        if all_int {
            ColumnType::Integer
        } else if all_real {
            ColumnType::Real
        } else if all_bool {
            ColumnType::Boolean
        } else {
            ColumnType::Text
        }
    }
}

/// A single column of a target table: header name plus inferred type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// In-memory tabular structure parsed from one CSV file.
///
/// Rows keep the header's column order. A `None` cell becomes SQL NULL.
#[derive(Debug, Clone)]
pub struct DataTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl DataTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Outcome of loading one CSV file: fully-qualified table name and rows written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResult {
    pub table: String,
    pub rows: usize,
}

/// Accumulated outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub tables: Vec<LoadResult>,
    pub total_rows: usize,
}

impl RunSummary {
    pub fn push(&mut self, result: LoadResult) {
        self.total_rows += result.rows;
        self.tables.push(result);
    }

    pub fn tables_loaded(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(values: &[&str]) -> ColumnType {
        ColumnType::infer(values.iter().copied())
    }

    #[test]
    fn test_infer_integer() {
        assert_eq!(infer(&["1", "42", "-7"]), ColumnType::Integer);
    }

    #[test]
    fn test_infer_real_from_mixed_numbers() {
        assert_eq!(infer(&["1", "2.5", "3"]), ColumnType::Real);
    }

    #[test]
    fn test_infer_boolean() {
        assert_eq!(infer(&["true", "FALSE", "True"]), ColumnType::Boolean);
    }

    #[test]
    fn test_infer_text() {
        assert_eq!(infer(&["abc", "1"]), ColumnType::Text);
    }

    #[test]
    fn test_infer_ignores_empty_cells() {
        assert_eq!(infer(&["", "10", ""]), ColumnType::Integer);
    }

    #[test]
    fn test_infer_all_empty_is_text() {
        assert_eq!(infer(&["", "  "]), ColumnType::Text);
        assert_eq!(infer(&[]), ColumnType::Text);
    }

    #[test]
    fn test_summary_accumulates() {
        let mut summary = RunSummary::default();
        summary.push(LoadResult {
            table: "olist_data.orders".to_string(),
            rows: 3,
        });
        summary.push(LoadResult {
            table: "olist_data.customers".to_string(),
            rows: 2,
        });
        assert_eq!(summary.tables_loaded(), 2);
        assert_eq!(summary.total_rows, 5);
    }
}
