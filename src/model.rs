use std::path::PathBuf;

use polars::prelude::*;
use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;
use tracing::warn;

use crate::error::QkError;
use crate::filter::{self, FilterOptions, FilterSpec};
use crate::reconcile::{self, FarmerQuotaRecord};
use crate::schema::{farmer, reconciled, traceability};
use crate::source::{self, PyCallableSource};
use crate::summary::{self, Summary};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Dashboard pipeline entry point.
///
/// Holds the two raw source tables and nothing else: every derived artifact
/// (reconciled records, filtered views, summaries, projections) is
/// recomputed from the raw tables on each call, so repeated invocations
/// with the same inputs are identical.
#[pyclass]
pub struct QuotaModel {
    base_path: PathBuf,
    farmers: Option<DataFrame>,
    traceability: Option<DataFrame>,
    notices: Vec<String>,
}

#[pymethods]
impl QuotaModel {
    #[new]
    #[pyo3(signature = (base_path=None))]
    fn new(base_path: Option<String>) -> Self {
        Self {
            base_path: PathBuf::from(base_path.unwrap_or_else(|| ".".to_string())),
            farmers: None,
            traceability: None,
            notices: Vec::new(),
        }
    }

    // ── Data loading ────────────────────────────────────────────────────────

    /// Load the farmer/quota table from a local CSV (offline/dev source).
    ///
    /// Required column: farmer_id. All columns are read as strings; numeric
    /// coercion happens inside reconciliation.
    #[pyo3(signature = (filename=None))]
    fn load_farmers(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or("farmers.csv");
        let df = self.load_local(fname, &farmer::COLUMNS, farmer::FARMER_ID)?;
        self.farmers = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    /// Load the traceability/export table from a local CSV.
    ///
    /// Required column: farmer_id.
    #[pyo3(signature = (filename=None))]
    fn load_traceability(&mut self, filename: Option<&str>) -> PyResult<PyDataFrame> {
        let fname = filename.unwrap_or("traceability.csv");
        let df = self.load_local(fname, &traceability::COLUMNS, traceability::FARMER_ID)?;
        self.traceability = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    /// Fetch the farmer/quota table through a paginated source callable.
    ///
    /// `source` has the contract
    /// `fetch(table, columns, offset, limit) -> list[dict] | None`.
    /// A source failure degrades this table to empty and records a notice;
    /// it never raises.
    #[pyo3(signature = (source, page_size=None))]
    fn fetch_farmers(&mut self, source: PyObject, page_size: Option<usize>) -> PyResult<PyDataFrame> {
        let df = self.fetch("farmers", &farmer::COLUMNS, source, page_size)?;
        self.farmers = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    /// Fetch the traceability/export table through a paginated source
    /// callable. Same contract and degradation behavior as `fetch_farmers`.
    #[pyo3(signature = (source, page_size=None))]
    fn fetch_traceability(
        &mut self,
        source: PyObject,
        page_size: Option<usize>,
    ) -> PyResult<PyDataFrame> {
        let df = self.fetch("traceability", &traceability::COLUMNS, source, page_size)?;
        self.traceability = Some(df.clone());
        Ok(PyDataFrame(df))
    }

    /// Use an already-materialized farmer/quota frame.
    fn set_farmers(&mut self, df: PyDataFrame) {
        self.farmers = Some(df.0);
    }

    /// Use an already-materialized traceability frame.
    fn set_traceability(&mut self, df: PyDataFrame) {
        self.traceability = Some(df.0);
    }

    // ── Pipeline ────────────────────────────────────────────────────────────

    /// Run reconciliation over the loaded tables and return the tidy
    /// output table. Zero rows in means zero rows out, never an error.
    fn reconcile(&self) -> PyResult<PyDataFrame> {
        let records = self.records()?;
        Ok(PyDataFrame(reconcile::records_to_dataframe(&records)?))
    }

    /// Reconcile two frames without a model instance.
    #[staticmethod]
    fn reconcile_frames(farmers: PyDataFrame, traceability: PyDataFrame) -> PyResult<PyDataFrame> {
        let records = reconcile::reconcile(&farmers.0, &traceability.0)?;
        Ok(PyDataFrame(reconcile::records_to_dataframe(&records)?))
    }

    /// Reconcile, then apply the filter predicate set. An empty result
    /// means "no rows match", which the UI reports as a notice.
    #[pyo3(signature = (filter=None))]
    fn filtered_view(&self, filter: Option<FilterSpec>) -> PyResult<PyDataFrame> {
        let records = self.filtered(filter.as_ref())?;
        Ok(PyDataFrame(reconcile::records_to_dataframe(&records)?))
    }

    /// Key metrics over the filtered records; all zeros on empty input.
    #[pyo3(signature = (filter=None))]
    fn summarize(&self, filter: Option<FilterSpec>) -> PyResult<Summary> {
        let records = self.filtered(filter.as_ref())?;
        Ok(summary::summarize(&records))
    }

    /// Filtered records ordered by quota_used_pct.
    #[pyo3(signature = (descending=false, filter=None))]
    fn sorted_view(&self, descending: bool, filter: Option<FilterSpec>) -> PyResult<PyDataFrame> {
        let records = self.filtered(filter.as_ref())?;
        let sorted = summary::sort_by_quota_pct(&records, descending);
        Ok(PyDataFrame(reconcile::records_to_dataframe(&sorted)?))
    }

    /// Fixed-step histogram over one numeric column of the filtered
    /// records, as a tidy bin table for the charting layer.
    #[pyo3(signature = (column, step, filter=None))]
    fn histogram(
        &self,
        column: &str,
        step: f64,
        filter: Option<FilterSpec>,
    ) -> PyResult<PyDataFrame> {
        let records = self.filtered(filter.as_ref())?;
        let values: Vec<f64> = match column {
            reconciled::QUOTA_USED_PCT => records.iter().map(|r| r.quota_used_pct).collect(),
            reconciled::MAX_QUOTA_KG => records.iter().map(|r| r.max_quota_kg).collect(),
            reconciled::TOTAL_NET_WEIGHT_KG => {
                records.iter().map(|r| r.total_net_weight_kg).collect()
            }
            other => {
                return Err(QkError::Validation(format!(
                    "'{other}' is not a numeric reconciled column"
                ))
                .into())
            }
        };
        let bins = summary::histogram(&values, step)?;
        Ok(PyDataFrame(summary::histogram_frame(&bins)?))
    }

    /// Observed filter options over the full reconciled table, for
    /// multiselect defaults and the quota-pct slider bounds.
    fn filter_options(&self) -> PyResult<FilterOptions> {
        let records = self.records()?;
        Ok(filter::observed_options(&records))
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn farmers_df(&self) -> Option<PyDataFrame> {
        self.farmers.clone().map(PyDataFrame)
    }

    #[getter]
    fn traceability_df(&self) -> Option<PyDataFrame> {
        self.traceability.clone().map(PyDataFrame)
    }

    /// Non-fatal degradation notices accumulated by fetches, for the UI
    /// to render as warnings.
    #[getter]
    fn notices(&self) -> Vec<String> {
        self.notices.clone()
    }
}

// ── Private helpers ─────────────────────────────────────────────────────────

impl QuotaModel {
    fn load_local(&self, filename: &str, columns: &[&str], key: &str) -> Result<DataFrame, QkError> {
        let path = self.base_path.join(filename);
        let raw = source::read_csv_as_strings(&path)?;
        source::require_columns(&raw, &[key])?;
        source::project_string_columns(&raw, columns)
    }

    fn fetch(
        &mut self,
        table: &str,
        columns: &[&str],
        callable: PyObject,
        page_size: Option<usize>,
    ) -> Result<DataFrame, QkError> {
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(QkError::Validation("page_size must be positive".into()));
        }

        let src = PyCallableSource::new(callable);
        match source::fetch_table(&src, table, columns, page_size) {
            Ok(df) => Ok(df),
            Err(e) => {
                warn!(table, error = %e, "table fetch degraded to empty");
                self.notices
                    .push(format!("{table}: {e}; continuing with no rows"));
                source::empty_string_frame(columns)
            }
        }
    }

    fn records(&self) -> Result<Vec<FarmerQuotaRecord>, QkError> {
        let farmers = self
            .farmers
            .as_ref()
            .ok_or_else(|| QkError::NotLoaded("farmers".into()))?;
        let traces = self
            .traceability
            .as_ref()
            .ok_or_else(|| QkError::NotLoaded("traceability".into()))?;
        reconcile::reconcile(farmers, traces)
    }

    fn filtered(&self, spec: Option<&FilterSpec>) -> Result<Vec<FarmerQuotaRecord>, QkError> {
        let records = self.records()?;
        Ok(match spec {
            Some(spec) => filter::apply_filters(&records, spec),
            None => records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with(farmers: Option<DataFrame>, traceability: Option<DataFrame>) -> QuotaModel {
        QuotaModel {
            base_path: PathBuf::from("."),
            farmers,
            traceability,
            notices: Vec::new(),
        }
    }

    #[test]
    fn test_records_requires_loaded_tables() {
        let farmers = df!(
            "farmer_id" => ["f1"],
            "max_quota_kg" => ["100"],
        )
        .unwrap();

        let err = model_with(None, None).records().unwrap_err();
        assert!(matches!(err, QkError::NotLoaded(_)));

        let err = model_with(Some(farmers), None).records().unwrap_err();
        assert!(matches!(err, QkError::NotLoaded(_)));
    }

    #[test]
    fn test_pipeline_recomputes_from_raw_tables() {
        let farmers = df!(
            "farmer_id" => ["f1"],
            "max_quota_kg" => ["200"],
        )
        .unwrap();
        let traces = df!(
            "farmer_id" => ["f1"],
            "net_weight_kg" => ["150"],
            "export_lot" => ["L1"],
            "exporter" => ["ExportCo"],
            "cooperative_name" => ["CoopA"],
            "certification" => ["Organic"],
        )
        .unwrap();

        let model = model_with(Some(farmers), Some(traces));
        let first = model.records().unwrap();
        let second = model.records().unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].quota_used_pct, 0.75);
    }

    #[test]
    fn test_degraded_empty_tables_flow_through() {
        let farmers = source::empty_string_frame(&farmer::COLUMNS).unwrap();
        let traces = source::empty_string_frame(&traceability::COLUMNS).unwrap();

        let model = model_with(Some(farmers), Some(traces));
        assert!(model.records().unwrap().is_empty());
        assert!(model.filtered(None).unwrap().is_empty());
    }
}
