use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::Array;
use arrow::util::display::array_value_to_string;
use log::{debug, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use super::model::{RawSpectrum, Spectrum};
use crate::error::ReadError;

pub const RAMANSHIFT: &str = "ramanshift";
pub const INTENSITY: &str = "intensity";

/// Expected column schema, in positional order.
pub const SPECTRUM_COLUMNS: [&str; 2] = [RAMANSHIFT, INTENSITY];

pub const RAW_LABEL: &str = "raw";

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Every on-disk layout the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumFormat {
    /// Tab or whitespace separated text.
    Text,
    Csv,
    Json,
    /// Columnar tables (the spreadsheet exports of the acquisition software).
    Parquet,
}

impl SpectrumFormat {
    pub const ALL: [SpectrumFormat; 4] = [
        SpectrumFormat::Text,
        SpectrumFormat::Csv,
        SpectrumFormat::Json,
        SpectrumFormat::Parquet,
    ];

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            SpectrumFormat::Text => &["txt", "tsv", "dat"],
            SpectrumFormat::Csv => &["csv"],
            SpectrumFormat::Json => &["json"],
            SpectrumFormat::Parquet => &["parquet", "pq"],
        }
    }

    /// Dispatch by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Dotted suffixes of every supported format, for directory scans.
    pub fn all_suffixes() -> Vec<String> {
        Self::ALL
            .iter()
            .flat_map(|f| f.extensions().iter().map(|e| format!(".{e}")))
            .collect()
    }

    fn load_rows(self, path: &Path) -> Result<Vec<Vec<String>>> {
        match self {
            SpectrumFormat::Text => load_delimited(path, b'\t'),
            SpectrumFormat::Csv => load_delimited(path, b','),
            SpectrumFormat::Json => load_json(path),
            SpectrumFormat::Parquet => load_parquet(path),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read, reshape, clean, sort and validate a two-column spectrum file.
pub fn read_spectrum(path: &Path) -> Result<RawSpectrum, ReadError> {
    if !path.exists() {
        return Err(ReadError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ReadError::NotAFile(path.to_path_buf()));
    }
    let format = SpectrumFormat::from_path(path).ok_or_else(|| ReadError::UnsupportedFormat {
        path: path.to_path_buf(),
        suffix: path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    })?;

    let rows = format
        .load_rows(path)
        .with_context(|| format!("reading {} as {format:?}", path.display()))?;
    let rows = reshape_columns(rows);
    let (mut ramanshift, mut intensity) = numeric_columns(rows);
    if ramanshift.is_empty() {
        return Err(ReadError::NoNumericRows(path.to_path_buf()));
    }
    sort_by_ramanshift(&mut ramanshift, &mut intensity);

    for (key, values) in [(RAMANSHIFT, &ramanshift), (INTENSITY, &intensity)] {
        if let Some(range) = EXPECTED_RANGES.iter().find(|r| r.key == key) {
            if !range.accepts(values) {
                warn!(
                    "{}: the values of {key} fall outside the expected range {range:?}",
                    path.display()
                );
            }
        }
    }

    let spectrum_hash = hash_spectrum(&ramanshift, &intensity);
    debug!("{}: read {} points", path.display(), ramanshift.len());

    Ok(RawSpectrum {
        spectrum: Spectrum {
            ramanshift,
            intensity,
            label: RAW_LABEL.to_string(),
            region_name: None,
            source: path.to_path_buf(),
        },
        spectrum_hash,
    })
}

// ---------------------------------------------------------------------------
// Reshaping
// ---------------------------------------------------------------------------

/// Force the table into the expected two columns.
///
/// The width of the first row decides: one column is split on whitespace, more
/// columns are truncated by position. A leading `[ramanshift, intensity]` header
/// (in either order) selects columns by name; any other first row is data.
fn reshape_columns(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let n_cols = SPECTRUM_COLUMNS.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);

    let mut rows: Vec<Vec<String>> = if width == 1 {
        debug!("data has a single column, splitting into {n_cols}");
        rows.into_iter()
            .map(|row| {
                row.first()
                    .map(|cell| cell.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default()
            })
            .collect()
    } else {
        if width > n_cols {
            debug!("data has too many columns {width}, taking first {n_cols}");
        }
        rows
    };

    let header_order = rows.first().and_then(|first| header_positions(first));
    match header_order {
        Some(order) => {
            rows.remove(0);
            rows.into_iter()
                .map(|row| {
                    order
                        .iter()
                        .map(|&i| row.get(i).cloned().unwrap_or_default())
                        .collect()
                })
                .collect()
        }
        None => rows
            .into_iter()
            .map(|mut row| {
                row.truncate(n_cols);
                row
            })
            .collect(),
    }
}

/// Column positions of the expected keys if `row` is a header naming all of them.
fn header_positions(row: &[String]) -> Option<Vec<usize>> {
    SPECTRUM_COLUMNS
        .iter()
        .map(|key| {
            row.iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(key))
        })
        .collect()
}

/// Keep rows whose every cell is a finite number.
fn numeric_columns(rows: Vec<Vec<String>>) -> (Vec<f64>, Vec<f64>) {
    let mut ramanshift = Vec::with_capacity(rows.len());
    let mut intensity = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        match (parse_cell(row.first()), parse_cell(row.get(1))) {
            (Some(x), Some(y)) => {
                ramanshift.push(x);
                intensity.push(y);
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("dropped {dropped} non-numeric rows");
    }
    (ramanshift, intensity)
}

fn parse_cell(cell: Option<&String>) -> Option<f64> {
    cell?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn sort_by_ramanshift(ramanshift: &mut Vec<f64>, intensity: &mut Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = ramanshift
        .iter()
        .copied()
        .zip(intensity.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
    *ramanshift = xs;
    *intensity = ys;
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Soft bounds of a spectrum column. The lower bound allows a relative slack
/// of `lower_rtol * |min|`.
#[derive(Debug, Clone, Copy)]
struct ExpectedRange {
    key: &'static str,
    min: f64,
    max: f64,
    lower_rtol: f64,
}

const EXPECTED_RANGES: [ExpectedRange; 2] = [
    ExpectedRange {
        key: RAMANSHIFT,
        min: -95.0,
        max: 3650.0,
        lower_rtol: 0.2,
    },
    ExpectedRange {
        key: INTENSITY,
        min: 0.0,
        max: 1e5,
        lower_rtol: 0.2,
    },
];

impl ExpectedRange {
    fn accepts(&self, values: &[f64]) -> bool {
        let lowest = values.iter().copied().fold(f64::INFINITY, f64::min);
        let highest = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        lowest >= self.min - self.lower_rtol * self.min.abs() && highest <= self.max
    }
}

fn hash_spectrum(ramanshift: &[f64], intensity: &[f64]) -> String {
    let mut hasher = Sha256::new();
    for (x, y) in ramanshift.iter().zip(intensity) {
        hasher.update(format!("{x}\t{y}\n").as_bytes());
    }
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Delimited text / CSV loader
// ---------------------------------------------------------------------------

/// Rows of a delimited file, no header handling. `#` starts a comment line.
fn load_delimited(path: &Path, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening delimited file")?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Accepted layouts:
///
/// ```json
/// [[200.0, 12.5], [201.0, 13.1]]
/// [{"ramanshift": 200.0, "intensity": 12.5}, ...]
/// {"ramanshift": [200.0, 201.0], "intensity": [12.5, 13.1]}
/// ```
fn load_json(path: &Path) -> Result<Vec<Vec<String>>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    match root {
        JsonValue::Array(records) => json_records_to_rows(&records),
        JsonValue::Object(columns) => {
            let headers: Vec<String> = columns.keys().cloned().collect();
            let arrays = columns
                .values()
                .map(|v| {
                    v.as_array()
                        .map(Vec::as_slice)
                        .context("column object values must be arrays")
                })
                .collect::<Result<Vec<_>>>()?;
            let n_rows = arrays.iter().map(|a| a.len()).max().unwrap_or(0);
            if arrays.iter().any(|a| a.len() != n_rows) {
                bail!("JSON columns have different lengths");
            }
            let mut rows = vec![headers];
            for i in 0..n_rows {
                rows.push(arrays.iter().map(|a| json_cell(&a[i])).collect());
            }
            Ok(rows)
        }
        other => bail!("Expected top-level JSON array or object, got {other}"),
    }
}

fn json_records_to_rows(records: &[JsonValue]) -> Result<Vec<Vec<String>>> {
    let headers: Option<Vec<String>> = records
        .first()
        .and_then(JsonValue::as_object)
        .map(|obj| obj.keys().cloned().collect());

    let mut rows = Vec::with_capacity(records.len() + 1);
    if let Some(headers) = &headers {
        rows.push(headers.clone());
    }
    for (i, rec) in records.iter().enumerate() {
        let row = match (rec, &headers) {
            (JsonValue::Array(cells), None) => cells.iter().map(json_cell).collect(),
            (JsonValue::Object(obj), Some(headers)) => headers
                .iter()
                .map(|h| obj.get(h).map(json_cell).unwrap_or_default())
                .collect(),
            _ => bail!("Row {i} does not match the layout of the first row"),
        };
        rows.push(row);
    }
    Ok(rows)
}

fn json_cell(val: &JsonValue) -> String {
    match val {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file as rows of cell text; the schema's field names form
/// the first row.
fn load_parquet(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = vec![headers];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|col| {
                    if col.is_null(row) {
                        Ok(String::new())
                    } else {
                        array_value_to_string(col.as_ref(), row)
                    }
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("Row {row}: unreadable cell"))?;
            rows.push(cells);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn tab_separated_text_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "A1_1.txt", "300\t3\n100\t1\n200\t2\n");
        let raw = read_spectrum(&path).unwrap();
        assert_eq!(raw.spectrum.ramanshift, vec![100.0, 200.0, 300.0]);
        assert_eq!(raw.spectrum.intensity, vec![1.0, 2.0, 3.0]);
        assert_eq!(raw.spectrum.region_name, None);
        assert_eq!(raw.spectrum.label, RAW_LABEL);
        assert_eq!(raw.source(), path.as_path());
    }

    #[test]
    fn whitespace_single_column_is_split() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "A1_1.txt", "# exported\n100   1.5\n  200 2.5\n");
        let raw = read_spectrum(&path).unwrap();
        assert_eq!(raw.spectrum.ramanshift, vec![100.0, 200.0]);
        assert_eq!(raw.spectrum.intensity, vec![1.5, 2.5]);
    }

    #[test]
    fn csv_header_maps_columns_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "A1_1.csv", "intensity,ramanshift\n5,200\n4,100\n");
        let raw = read_spectrum(&path).unwrap();
        assert_eq!(raw.spectrum.ramanshift, vec![100.0, 200.0]);
        assert_eq!(raw.spectrum.intensity, vec![4.0, 5.0]);
    }

    #[test]
    fn extra_columns_and_junk_rows_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "A1_1.csv",
            "shift,counts,error\n100,1,0.1\nn/a,2,0.1\n200,nan,0.1\n300,3,0.1\n",
        );
        let raw = read_spectrum(&path).unwrap();
        assert_eq!(raw.spectrum.ramanshift, vec![100.0, 300.0]);
        assert_eq!(raw.spectrum.intensity, vec![1.0, 3.0]);
    }

    #[test]
    fn json_layouts_agree() {
        let dir = tempfile::tempdir().unwrap();
        let rows = write(&dir, "a.json", "[[200, 2], [100, 1]]");
        let records = write(
            &dir,
            "b.json",
            r#"[{"ramanshift": 200, "intensity": 2}, {"ramanshift": 100, "intensity": 1}]"#,
        );
        let columns = write(
            &dir,
            "c.json",
            r#"{"intensity": [2, 1], "ramanshift": [200, 100]}"#,
        );
        let expected = read_spectrum(&rows).unwrap();
        for path in [records, columns] {
            let raw = read_spectrum(&path).unwrap();
            assert_eq!(raw.spectrum.ramanshift, expected.spectrum.ramanshift);
            assert_eq!(raw.spectrum.intensity, expected.spectrum.intensity);
            assert_eq!(raw.spectrum_hash, expected.spectrum_hash);
        }
    }

    #[test]
    fn json_keys_keep_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let columns = write(&dir, "a.json", r#"{"shift": [100, 200], "counts": [5, 6]}"#);
        let records = write(
            &dir,
            "b.json",
            r#"[{"wavenumber": 100, "counts": 5}, {"wavenumber": 200, "counts": 6}]"#,
        );
        for path in [columns, records] {
            let raw = read_spectrum(&path).unwrap();
            assert_eq!(raw.spectrum.ramanshift, vec![100.0, 200.0]);
            assert_eq!(raw.spectrum.intensity, vec![5.0, 6.0]);
        }
    }

    #[test]
    fn lower_bound_has_relative_slack() {
        let shift = EXPECTED_RANGES[0];
        assert!(shift.accepts(&[-110.0, 3000.0]));
        assert!(!shift.accepts(&[-120.0, 3000.0]));
        assert!(!shift.accepts(&[100.0, 4000.0]));
    }

    #[test]
    fn parquet_columns_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A1_1.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("ramanshift", DataType::Float64, false),
            Field::new("intensity", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![200.0, 100.0])),
                Arc::new(Float64Array::from(vec![2.0, 1.0])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let raw = read_spectrum(&path).unwrap();
        assert_eq!(raw.spectrum.ramanshift, vec![100.0, 200.0]);
        assert_eq!(raw.spectrum.intensity, vec![1.0, 2.0]);
    }

    #[test]
    fn structural_failures_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_spectrum(&dir.path().join("missing.txt")),
            Err(ReadError::NotFound(_))
        ));
        assert!(matches!(
            read_spectrum(dir.path()),
            Err(ReadError::NotAFile(_))
        ));
        let empty = write(&dir, "empty.txt", "ramanshift\tintensity\n");
        assert!(matches!(
            read_spectrum(&empty),
            Err(ReadError::NoNumericRows(_))
        ));
        let odd = write(&dir, "A1_1.xyz", "100\t1\n");
        assert!(matches!(
            read_spectrum(&odd),
            Err(ReadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "A1_1.txt", "100\t-50\n5000\t1e7\n");
        let raw = read_spectrum(&path).unwrap();
        assert_eq!(raw.spectrum.len(), 2);
    }

    #[test]
    fn ramanshift_is_non_decreasing() {
        let dir = tempfile::tempdir().unwrap();
        let text: String = (0..200)
            .map(|i| format!("{}\t{}\n", ((i * 37) % 200) as f64 * 1.5, i))
            .collect();
        let raw = read_spectrum(&write(&dir, "A1_1.txt", &text)).unwrap();
        assert!(raw.spectrum.ramanshift.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn suffixes_cover_every_format() {
        let suffixes = SpectrumFormat::all_suffixes();
        assert!(suffixes.contains(&".txt".to_string()));
        assert!(suffixes.contains(&".parquet".to_string()));
        assert_eq!(
            SpectrumFormat::from_path(Path::new("a/B.JSON")),
            Some(SpectrumFormat::Json)
        );
    }
}
