use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, City, Direction, MovementDataset, RawRow};
use crate::error::DashboardError;

/// Extensions tried, in order, when resolving a dataset file.
pub const DATASET_EXTENSIONS: [&str; 3] = ["parquet", "json", "csv"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// `<data_dir>/<Direction>_<City>` without extension.
pub fn dataset_stem(data_dir: &Path, direction: Direction, city: City) -> PathBuf {
    data_dir.join(format!("{}_{}", direction.file_prefix(), city.file_stem()))
}

/// Resolve and load the dataset for a (direction, city) pair.
///
/// Every call reads the file again; nothing is cached between requests.
pub fn load_dataset(
    data_dir: &Path,
    direction: Direction,
    city: City,
) -> crate::error::Result<MovementDataset> {
    let stem = dataset_stem(data_dir, direction, city);
    let path = DATASET_EXTENSIONS
        .iter()
        .map(|ext| stem.with_extension(ext))
        .find(|p| p.is_file())
        .ok_or_else(|| DashboardError::DatasetNotFound {
            path: stem.clone(),
            reason: format!("no file with extension {}", DATASET_EXTENSIONS.join(", ")),
        })?;

    let dataset = load_file(&path).map_err(|e| DashboardError::DatasetNotFound {
        path: path.clone(),
        reason: format!("{e:#}"),
    })?;

    log::info!(
        "Loaded {} rows for {direction}_{city} from {}",
        dataset.len(),
        path.display()
    );
    Ok(dataset)
}

/// Load a movement dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – flat columns (recommended)
/// * `.json`    – `[{ "gemeente_code": "GM0363", "year": 2016, ... }, ...]`
/// * `.csv`     – header row, empty cells are missing values
pub fn load_file(path: &Path) -> Result<MovementDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let rows = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    MovementDataset::from_rows(&rows)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, as written by `df.to_json(orient='records')`.
fn load_json(path: &Path) -> Result<Vec<RawRow>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let obj = rec
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            Ok(obj
                .iter()
                .map(|(key, val)| (key.clone(), json_to_cell(val)))
                .collect())
        })
        .collect()
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(col, value)| (col.clone(), guess_cell_type(col, value)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn guess_cell_type(column: &str, s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return CellValue::Null;
    }
    // Codes like `0363` must keep their leading zeros.
    if column == super::model::CODE_COLUMN || column == super::model::NAME_COLUMN {
        return CellValue::Text(s.to_string());
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    CellValue::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let columns: Vec<(String, &Arc<dyn Array>)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(f, c)| (f.name().clone(), c))
            .collect();

        for row in 0..batch.num_rows() {
            let mut cells = RawRow::new();
            for (name, col) in &columns {
                let value = extract_cell(col, row)
                    .with_context(|| format!("Row {row}: failed to read '{name}'"))?;
                cells.insert(name.clone(), value);
            }
            rows.push(cells);
        }
    }

    Ok(rows)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> Result<CellValue> {
    if col.is_null(row) {
        return Ok(CellValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => {
            let s = col
                .as_any()
                .downcast_ref::<StringArray>()
                .context("expected StringArray")?;
            CellValue::Text(s.value(row).to_string())
        }
        DataType::LargeUtf8 => CellValue::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int32Array>()
                .context("expected Int32Array")?;
            CellValue::Integer(i64::from(arr.value(row)))
        }
        DataType::Int64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Int64Array>()
                .context("expected Int64Array")?;
            CellValue::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("expected Float32Array")?;
            CellValue::Float(f64::from(arr.value(row)))
        }
        DataType::Float64 => {
            let arr = col
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array")?;
            CellValue::Float(arr.value(row))
        }
        other => CellValue::Text(format!("{other:?}")),
    };
    Ok(value)
}
