use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::error::{AppError, Result};
use crate::domain::table::RunSummary;
use crate::infrastructure::csv::CsvParser;
use crate::infrastructure::db::TableStore;

/// List the `.csv` files in `dir`, sorted lexicographically by path so runs
/// are reproducible. An empty directory yields an empty list, not an error.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        AppError::IoError(format!("Failed to read directory {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            AppError::IoError(format!("Failed to read directory entry: {}", e))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Table-name basis for a CSV file: its stem (file name without extension).
pub fn table_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            AppError::ValidationError(format!(
                "File name {} has no valid UTF-8 stem",
                path.display()
            ))
        })
}

/// Load every CSV file in `data_dir` into `store`, replacing existing tables.
///
/// The whole run happens inside one store transaction: a failure on any file
/// aborts before commit and leaves the database untouched. An empty
/// directory is a failure, reported before anything is written.
pub async fn run<S: TableStore + Send>(data_dir: &Path, store: &mut S) -> Result<RunSummary> {
    let files = discover_csv_files(data_dir)?;
    if files.is_empty() {
        return Err(AppError::NoInputFiles(format!(
            "No CSV files found in {}",
            data_dir.display()
        )));
    }
    info!("Found {} CSV files to load", files.len());

    store.begin().await?;

    let parser = CsvParser::new();
    let mut summary = RunSummary::default();

    for path in &files {
        let stem = table_stem(path)?;
        info!(
            "Loading {} into table {}...",
            path.display(),
            store.qualified_name(&stem)
        );

        let table = parser.parse_file(path)?;
        let result = store.replace_table(&stem, &table).await?;
        info!("Loaded {} rows into {}", result.rows, result.table);
        summary.push(result);
    }

    store.commit().await?;

    info!(
        "Successfully loaded {} tables with {} total rows",
        summary.tables_loaded(),
        summary.total_rows
    );
    Ok(summary)
}
