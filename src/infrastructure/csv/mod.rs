// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// CSV parsing, encoding detection, and column type inference

mod csv_parser;

pub use csv_parser::CsvParser;
