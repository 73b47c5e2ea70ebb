use std::path::{Path, PathBuf};

use polars::prelude::*;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyList};
use tracing::{debug, warn};

use crate::error::QkError;

/// A logical table reachable through range-based selection.
///
/// `select` returns one window of rows as an all-string DataFrame.
/// `Ok(None)` means the source answered with a null window - a hard fetch
/// failure, distinct from an empty window (no more rows).
pub trait TableSource {
    fn select(
        &self,
        table: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Option<DataFrame>, QkError>;
}

/// Retrieve the complete row set for a table, paginating transparently.
///
/// Windows of `page_size` rows are requested at increasing offsets until the
/// source returns an empty window. A null window aborts the fetch with
/// `SourceUnavailable`; the caller decides whether that degrades the table
/// to empty or propagates.
pub fn fetch_table(
    source: &dyn TableSource,
    table: &str,
    columns: &[&str],
    page_size: usize,
) -> Result<DataFrame, QkError> {
    if page_size == 0 {
        return Err(QkError::Validation("page_size must be positive".into()));
    }

    let mut out = empty_string_frame(columns)?;
    let mut offset = 0usize;
    let mut windows = 0usize;

    loop {
        let window = source.select(table, columns, offset, page_size)?;
        let Some(page) = window else {
            return Err(QkError::SourceUnavailable(format!(
                "{table}: source returned a null window at offset {offset}"
            )));
        };
        if page.height() == 0 {
            break;
        }
        offset += page.height();
        windows += 1;
        out.vstack_mut(&page)?;
    }

    debug!(table, windows, rows = out.height(), "fetched table");
    Ok(out)
}

/// Zero-row DataFrame carrying the full requested column schema as String.
pub fn empty_string_frame(columns: &[&str]) -> Result<DataFrame, QkError> {
    let cols: Vec<Column> = columns
        .iter()
        .map(|name| Column::new((*name).into(), Vec::<String>::new()))
        .collect();
    DataFrame::new(cols).map_err(QkError::from)
}

/// Check that every required column is present.
pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), QkError> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(QkError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, QkError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

/// Project `df` onto the requested columns, in order.
///
/// Columns absent from the source materialize as null columns so downstream
/// stages always see the complete schema; only the join key is allowed to
/// fail harder, and that check belongs to the reconciler.
pub fn project_string_columns(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, QkError> {
    let height = df.height();
    let cols: Vec<Column> = columns
        .iter()
        .map(|name| match df.column(name) {
            Ok(col) => col.clone(),
            Err(_) => {
                warn!(column = *name, "source column absent, filling with nulls");
                Series::full_null((*name).into(), height, &DataType::String).into()
            }
        })
        .collect();
    DataFrame::new(cols).map_err(QkError::from)
}

// ── Python-callable source ──────────────────────────────────────────────────

/// Table source backed by a Python callable.
///
/// The callable has the contract
/// `fetch(table, columns, offset, limit) -> list[dict] | None`;
/// the dashboard wraps its remote client (one query per window) in such a
/// closure. A raised exception is a transport failure for the whole table.
pub struct PyCallableSource {
    callable: PyObject,
}

impl PyCallableSource {
    pub fn new(callable: PyObject) -> Self {
        Self { callable }
    }
}

impl TableSource for PyCallableSource {
    fn select(
        &self,
        table: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Option<DataFrame>, QkError> {
        Python::with_gil(|py| {
            let cols: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            let page = self
                .callable
                .call1(py, (table, cols, offset, limit))
                .map_err(|e| QkError::SourceUnavailable(format!("{table}: {e}")))?;

            if page.is_none(py) {
                return Ok(None);
            }

            let rows = page.bind(py).downcast::<PyList>().map_err(|_| {
                QkError::SourceUnavailable(format!("{table}: window is not a list of rows"))
            })?;

            rows_to_frame(rows, columns).map(Some)
        })
    }
}

/// Convert a window of Python dict rows into an all-string DataFrame with
/// the full requested column schema. Missing keys and empty strings become
/// nulls; scalar values are stringified and re-parsed by the reconciler.
fn rows_to_frame(rows: &Bound<'_, PyList>, columns: &[&str]) -> Result<DataFrame, QkError> {
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); columns.len()];

    for item in rows.iter() {
        let row = item
            .downcast::<PyDict>()
            .map_err(|_| QkError::SourceUnavailable("row is not a mapping".into()))?;
        for (slot, name) in cells.iter_mut().zip(columns) {
            let value = row.get_item(*name)?;
            slot.push(value.as_ref().and_then(cell_text));
        }
    }

    let cols: Vec<Column> = columns
        .iter()
        .zip(cells)
        .map(|(name, values)| Column::new((*name).into(), values))
        .collect();
    DataFrame::new(cols).map_err(QkError::from)
}

fn cell_text(value: &Bound<'_, PyAny>) -> Option<String> {
    if value.is_none() {
        return None;
    }
    if let Ok(b) = value.downcast::<PyBool>() {
        return Some(b.is_true().to_string());
    }
    if let Ok(s) = value.extract::<String>() {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        return Some(trimmed.to_string());
    }
    if let Ok(i) = value.extract::<i64>() {
        return Some(i.to_string());
    }
    if let Ok(f) = value.extract::<f64>() {
        return Some(f.to_string());
    }
    value.str().ok().map(|s| s.to_string())
}

// ── Local CSV source ────────────────────────────────────────────────────────

/// Table source reading `<base_path>/<table>.csv`, for offline and dev use.
pub struct CsvSource {
    base_path: PathBuf,
}

impl CsvSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl TableSource for CsvSource {
    fn select(
        &self,
        table: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Option<DataFrame>, QkError> {
        let path = self.base_path.join(format!("{table}.csv"));
        let df = read_csv_as_strings(&path)?;
        let projected = project_string_columns(&df, columns)?;
        Ok(Some(projected.slice(offset as i64, limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write as IoWrite;

    struct MemorySource {
        frame: DataFrame,
        requests: Cell<usize>,
    }

    impl MemorySource {
        fn new(frame: DataFrame) -> Self {
            Self {
                frame,
                requests: Cell::new(0),
            }
        }
    }

    impl TableSource for MemorySource {
        fn select(
            &self,
            _table: &str,
            _columns: &[&str],
            offset: usize,
            limit: usize,
        ) -> Result<Option<DataFrame>, QkError> {
            self.requests.set(self.requests.get() + 1);
            Ok(Some(self.frame.slice(offset as i64, limit)))
        }
    }

    struct NullWindowSource;

    impl TableSource for NullWindowSource {
        fn select(
            &self,
            _table: &str,
            _columns: &[&str],
            _offset: usize,
            _limit: usize,
        ) -> Result<Option<DataFrame>, QkError> {
            Ok(None)
        }
    }

    struct BrokenSource;

    impl TableSource for BrokenSource {
        fn select(
            &self,
            _table: &str,
            _columns: &[&str],
            _offset: usize,
            _limit: usize,
        ) -> Result<Option<DataFrame>, QkError> {
            Err(QkError::SourceUnavailable("connection refused".into()))
        }
    }

    fn five_farmers() -> DataFrame {
        df!(
            "farmer_id" => ["f1", "f2", "f3", "f4", "f5"],
            "max_quota_kg" => ["100", "200", "300", "400", "500"],
        )
        .unwrap()
    }

    #[test]
    fn test_fetch_concatenates_all_windows() {
        let source = MemorySource::new(five_farmers());
        let df = fetch_table(&source, "farmers", &["farmer_id", "max_quota_kg"], 2).unwrap();

        assert_eq!(df.height(), 5);
        // 3 full/partial windows plus the terminating empty one
        assert_eq!(source.requests.get(), 4);
        let ids = df.column("farmer_id").unwrap().str().unwrap();
        assert_eq!(ids.get(4), Some("f5"));
    }

    #[test]
    fn test_fetch_stops_only_on_empty_window() {
        // page_size larger than the table: one data window, one empty window
        let source = MemorySource::new(five_farmers());
        let df = fetch_table(&source, "farmers", &["farmer_id", "max_quota_kg"], 50).unwrap();

        assert_eq!(df.height(), 5);
        assert_eq!(source.requests.get(), 2);
    }

    #[test]
    fn test_empty_source_is_not_an_error() {
        let source = MemorySource::new(five_farmers().slice(0, 0));
        let df = fetch_table(&source, "farmers", &["farmer_id", "max_quota_kg"], 10).unwrap();

        assert_eq!(df.height(), 0);
        assert!(df.column("farmer_id").is_ok());
        assert!(df.column("max_quota_kg").is_ok());
    }

    #[test]
    fn test_null_window_is_a_fetch_failure() {
        let err = fetch_table(&NullWindowSource, "farmers", &["farmer_id"], 10).unwrap_err();
        assert!(matches!(err, QkError::SourceUnavailable(_)));
    }

    #[test]
    fn test_transport_error_propagates() {
        let err = fetch_table(&BrokenSource, "farmers", &["farmer_id"], 10).unwrap_err();
        assert!(matches!(err, QkError::SourceUnavailable(_)));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let source = MemorySource::new(five_farmers());
        let err = fetch_table(&source, "farmers", &["farmer_id"], 0).unwrap_err();
        assert!(matches!(err, QkError::Validation(_)));
    }

    #[test]
    fn test_project_fills_absent_columns_with_nulls() {
        let df = df!("farmer_id" => ["f1", "f2"]).unwrap();
        let projected = project_string_columns(&df, &["farmer_id", "certification"]).unwrap();

        assert_eq!(projected.width(), 2);
        let cert = projected.column("certification").unwrap();
        assert_eq!(cert.null_count(), 2);
    }

    #[test]
    fn test_csv_source_serves_range_windows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traceability.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, " farmer_id ,net_weight_kg,exporter").unwrap();
        writeln!(file, "f1,100,ExportCo").unwrap();
        writeln!(file, "f2,50,TradeHouse").unwrap();
        writeln!(file, "f3,25,ExportCo").unwrap();

        let source = CsvSource::new(dir.path());
        let window = source
            .select("traceability", &["farmer_id", "net_weight_kg"], 1, 2)
            .unwrap()
            .unwrap();

        assert_eq!(window.height(), 2);
        let ids = window.column("farmer_id").unwrap().str().unwrap();
        assert_eq!(ids.get(0), Some("f2"));
    }

    #[test]
    fn test_csv_source_paginates_through_fetch_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farmers.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "farmer_id,max_quota_kg").unwrap();
        for i in 0..7 {
            writeln!(file, "f{i},100").unwrap();
        }

        let source = CsvSource::new(dir.path());
        let df = fetch_table(&source, "farmers", &["farmer_id", "max_quota_kg"], 3).unwrap();
        assert_eq!(df.height(), 7);
    }

    #[test]
    fn test_missing_csv_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::new(dir.path());
        assert!(source.select("farmers", &["farmer_id"], 0, 10).is_err());
    }
}
