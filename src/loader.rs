//! Dataset file loading.
//!
//! Turns JSON, JSONL, and CSV files into loosely-typed [`Record`]s. CSV
//! cells are typed by shape: empty cells become null, numeric cells become
//! numbers, everything else stays text. Index columns exported by pandas
//! (`Unnamed: 0`, ...) are dropped.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::models::{FieldValue, Record};

/// Load a dataset file into records, dispatching on file extension.
///
/// Supported formats: `.json` (array or single object), `.jsonl`, `.csv`.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => load_json(path),
        "jsonl" => load_jsonl(path),
        "csv" => load_csv(path),
        _ => bail!("Unsupported dataset format: {}", path.display()),
    }
}

fn load_json(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON dataset: {}", path.display()))?;

    match value {
        serde_json::Value::Array(items) => items.into_iter().map(json_record).collect(),
        object @ serde_json::Value::Object(_) => Ok(vec![json_record(object)?]),
        _ => bail!(
            "JSON dataset must be an object or an array of objects: {}",
            path.display()
        ),
    }
}

fn load_jsonl(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line).with_context(|| {
            format!("Failed to parse JSONL line {} in {}", lineno + 1, path.display())
        })?;
        records.push(json_record(value)?);
    }
    Ok(records)
}

fn json_record(value: serde_json::Value) -> Result<Record> {
    let serde_json::Value::Object(map) = value else {
        bail!("dataset rows must be JSON objects");
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| (k, FieldValue::from(v)))
        .collect())
}

fn load_csv(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV dataset: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV headers: {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("Failed to read CSV row: {}", path.display()))?;
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if header.starts_with("Unnamed") || header.is_empty() {
                continue;
            }
            record.insert(header.clone(), parse_cell(cell));
        }
        if !record.is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}

fn parse_cell(cell: &str) -> FieldValue {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        return FieldValue::Num(n);
    }
    FieldValue::Str(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(name: &str, body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn csv_cells_are_typed() {
        let (_dir, path) = write_file(
            "temps.csv",
            "dt,AverageTemperature,Country\n1900-01-01,12.5,France\n1900-02-01,,France\n",
        );
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("AverageTemperature"),
            Some(&FieldValue::Num(12.5))
        );
        assert_eq!(
            records[0].get("Country"),
            Some(&FieldValue::Str("France".to_string()))
        );
        assert_eq!(records[1].get("AverageTemperature"), Some(&FieldValue::Null));
    }

    #[test]
    fn unnamed_index_columns_are_dropped() {
        let (_dir, path) = write_file("indexed.csv", "Unnamed: 0,Country\n0,France\n1,Germany\n");
        let records = load_records(&path).unwrap();
        assert!(!records[0].contains_key("Unnamed: 0"));
        assert!(records[0].contains_key("Country"));
    }

    #[test]
    fn jsonl_rows_load() {
        let (_dir, path) = write_file(
            "rows.jsonl",
            "{\"text\": \"first\", \"n\": 1}\n\n{\"text\": \"second\", \"flag\": true}\n",
        );
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("n"), Some(&FieldValue::Num(1.0)));
        assert_eq!(records[1].get("flag"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn json_array_and_single_object_load() {
        let (_dir, path) = write_file("rows.json", "[{\"text\": \"a\"}, {\"text\": \"b\"}]");
        assert_eq!(load_records(&path).unwrap().len(), 2);

        let (_dir, path) = write_file("one.json", "{\"text\": \"only\"}");
        assert_eq!(load_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let (_dir, path) = write_file("data.parquet", "");
        assert!(load_records(&path).is_err());
    }
}
