use pyo3::prelude::*;
use pyo3::types::PyModule;

pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod source;
pub mod summary;

use config::SourceConfig;
use filter::{FilterOptions, FilterSpec};
use model::QuotaModel;
use summary::Summary;

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("UNKNOWN", schema::UNKNOWN)?;
    m.add("ALL_OPTION", schema::ALL_OPTION)?;

    // Farmer / quota source
    let farmer = PyModule::new(m.py(), "farmer")?;
    farmer.add("FARMER_ID", schema::farmer::FARMER_ID)?;
    farmer.add("MAX_QUOTA_KG", schema::farmer::MAX_QUOTA_KG)?;
    m.add_submodule(&farmer)?;

    // Traceability source
    let traceability = PyModule::new(m.py(), "traceability")?;
    traceability.add("FARMER_ID", schema::traceability::FARMER_ID)?;
    traceability.add("NET_WEIGHT_KG", schema::traceability::NET_WEIGHT_KG)?;
    traceability.add("EXPORT_LOT", schema::traceability::EXPORT_LOT)?;
    traceability.add("EXPORTER", schema::traceability::EXPORTER)?;
    traceability.add(
        "COOPERATIVE_NAME",
        schema::traceability::COOPERATIVE_NAME,
    )?;
    traceability.add("CERTIFICATION", schema::traceability::CERTIFICATION)?;
    m.add_submodule(&traceability)?;

    // Reconciled output
    let reconciled = PyModule::new(m.py(), "reconciled")?;
    reconciled.add("FARMER_ID", schema::reconciled::FARMER_ID)?;
    reconciled.add("MAX_QUOTA_KG", schema::reconciled::MAX_QUOTA_KG)?;
    reconciled.add(
        "TOTAL_NET_WEIGHT_KG",
        schema::reconciled::TOTAL_NET_WEIGHT_KG,
    )?;
    reconciled.add("QUOTA_USED_PCT", schema::reconciled::QUOTA_USED_PCT)?;
    reconciled.add("QUOTA_STATUS", schema::reconciled::QUOTA_STATUS)?;
    reconciled.add(
        "COOPERATIVE_NAME",
        schema::reconciled::COOPERATIVE_NAME,
    )?;
    reconciled.add("CERTIFICATION", schema::reconciled::CERTIFICATION)?;
    reconciled.add("EXPORTER", schema::reconciled::EXPORTER)?;
    reconciled.add("EXPORT_LOT", schema::reconciled::EXPORT_LOT)?;
    m.add_submodule(&reconciled)?;

    // Quota status values
    let status = PyModule::new(m.py(), "status")?;
    status.add("UNDERUTILIZED", schema::status::UNDERUTILIZED)?;
    status.add("MEETING_QUOTA", schema::status::MEETING_QUOTA)?;
    status.add("EXCEEDING_QUOTA", schema::status::EXCEEDING_QUOTA)?;
    status.add("UNKNOWN", schema::status::UNKNOWN)?;
    m.add_submodule(&status)?;

    // Histogram projection
    let histogram = PyModule::new(m.py(), "histogram")?;
    histogram.add("BIN_LOWER", schema::histogram::BIN_LOWER)?;
    histogram.add("BIN_UPPER", schema::histogram::BIN_UPPER)?;
    histogram.add("COUNT", schema::histogram::COUNT)?;
    m.add_submodule(&histogram)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<QuotaModel>()?;
    m.add_class::<FilterSpec>()?;
    m.add_class::<FilterOptions>()?;
    m.add_class::<Summary>()?;
    m.add_class::<SourceConfig>()?;
    add_schema_exports(m)?;
    Ok(())
}
