use pyo3::prelude::*;

use crate::reconcile::FarmerQuotaRecord;
use crate::schema;

/// Declarative predicate set over the reconciled table.
///
/// Built from Python (one instance per render, mirroring the sidebar
/// widgets) and executed by the Rust engine. `None` on a dimension means
/// "no filtering"; a categorical selection containing the pseudo-option
/// "All" collapses to no filtering on that dimension. All predicates
/// combine with logical AND.
#[pyclass]
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    #[pyo3(get)]
    pub exporters: Option<Vec<String>>,
    #[pyo3(get)]
    pub quota_statuses: Option<Vec<String>>,
    #[pyo3(get)]
    pub cooperatives: Option<Vec<String>>,
    #[pyo3(get)]
    pub certifications: Option<Vec<String>>,
    /// Case-insensitive substring match on farmer_id; empty means off.
    #[pyo3(get)]
    pub farmer_id_search: Option<String>,
    /// Inclusive [min, max] bound on quota_used_pct.
    #[pyo3(get)]
    pub quota_pct_range: Option<(f64, f64)>,
}

#[pymethods]
impl FilterSpec {
    #[new]
    #[pyo3(signature = (
        exporters=None,
        quota_statuses=None,
        cooperatives=None,
        certifications=None,
        farmer_id_search=None,
        quota_pct_range=None
    ))]
    fn new(
        exporters: Option<Vec<String>>,
        quota_statuses: Option<Vec<String>>,
        cooperatives: Option<Vec<String>>,
        certifications: Option<Vec<String>>,
        farmer_id_search: Option<String>,
        quota_pct_range: Option<(f64, f64)>,
    ) -> Self {
        Self {
            exporters,
            quota_statuses,
            cooperatives,
            certifications,
            farmer_id_search,
            quota_pct_range,
        }
    }
}

/// Apply the predicate set. Pure and stateless; an empty result is a
/// legitimate "no rows match" state, not an error.
pub fn apply_filters(records: &[FarmerQuotaRecord], spec: &FilterSpec) -> Vec<FarmerQuotaRecord> {
    let needle = spec
        .farmer_id_search
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    records
        .iter()
        .filter(|rec| row_matches(rec, spec, &needle))
        .cloned()
        .collect()
}

fn row_matches(rec: &FarmerQuotaRecord, spec: &FilterSpec, needle: &str) -> bool {
    selection_allows(&spec.exporters, &rec.exporter)
        && selection_allows(&spec.quota_statuses, rec.quota_status.as_str())
        && selection_allows(&spec.cooperatives, &rec.cooperative_name)
        && selection_allows(&spec.certifications, &rec.certification)
        && (needle.is_empty() || rec.farmer_id.to_lowercase().contains(needle))
        && spec
            .quota_pct_range
            .is_none_or(|(lo, hi)| rec.quota_used_pct >= lo && rec.quota_used_pct <= hi)
}

fn selection_allows(selection: &Option<Vec<String>>, value: &str) -> bool {
    match selection {
        None => true,
        Some(values) if values.iter().any(|v| v == schema::ALL_OPTION) => true,
        Some(values) => values.iter().any(|v| v == value),
    }
}

/// Observed option sets for the UI: first-seen ordered distinct values per
/// categorical dimension plus the quota-pct bounds for the range slider.
#[pyclass]
#[derive(Debug, Clone)]
pub struct FilterOptions {
    #[pyo3(get)]
    pub exporters: Vec<String>,
    #[pyo3(get)]
    pub quota_statuses: Vec<String>,
    #[pyo3(get)]
    pub cooperatives: Vec<String>,
    #[pyo3(get)]
    pub certifications: Vec<String>,
    #[pyo3(get)]
    pub quota_pct_min: f64,
    #[pyo3(get)]
    pub quota_pct_max: f64,
}

pub fn observed_options(records: &[FarmerQuotaRecord]) -> FilterOptions {
    let mut pct_min = f64::INFINITY;
    let mut pct_max = f64::NEG_INFINITY;
    for rec in records {
        pct_min = pct_min.min(rec.quota_used_pct);
        pct_max = pct_max.max(rec.quota_used_pct);
    }
    if records.is_empty() {
        pct_min = 0.0;
        pct_max = 0.0;
    }

    FilterOptions {
        exporters: distinct_in_order(records.iter().map(|r| r.exporter.as_str())),
        quota_statuses: distinct_in_order(records.iter().map(|r| r.quota_status.as_str())),
        cooperatives: distinct_in_order(records.iter().map(|r| r.cooperative_name.as_str())),
        certifications: distinct_in_order(records.iter().map(|r| r.certification.as_str())),
        quota_pct_min: pct_min,
        quota_pct_max: pct_max,
    }
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(|v| v.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::QuotaStatus;

    fn record(id: &str, pct: f64, exporter: &str, coop: &str, cert: &str) -> FarmerQuotaRecord {
        FarmerQuotaRecord {
            farmer_id: id.to_string(),
            max_quota_kg: 100.0,
            total_net_weight_kg: pct * 100.0,
            quota_used_pct: pct,
            quota_status: QuotaStatus::classify(pct),
            cooperative_name: coop.to_string(),
            certification: cert.to_string(),
            exporter: exporter.to_string(),
            export_lot: "L1".to_string(),
        }
    }

    fn sample() -> Vec<FarmerQuotaRecord> {
        vec![
            record("f1", 0.75, "ExportCo", "CoopA", "Organic"),
            record("f2", 0.2, "TradeHouse", "CoopB", "Fairtrade"),
            record("f3", 1.3, "ExportCo", "CoopA", "Unknown"),
        ]
    }

    #[test]
    fn test_no_filters_is_identity() {
        let records = sample();
        let out = apply_filters(&records, &FilterSpec::default());
        assert_eq!(out, records);
    }

    #[test]
    fn test_all_observed_options_behaves_like_no_filter() {
        let records = sample();
        let spec = FilterSpec {
            exporters: Some(vec!["ExportCo".into(), "TradeHouse".into()]),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), records);
    }

    #[test]
    fn test_all_pseudo_option_collapses() {
        let records = sample();
        let spec = FilterSpec {
            exporters: Some(vec!["All".into()]),
            cooperatives: Some(vec!["All".into(), "CoopA".into()]),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), records);
    }

    #[test]
    fn test_categorical_and_status_filters() {
        let records = sample();
        let spec = FilterSpec {
            exporters: Some(vec!["ExportCo".into()]),
            quota_statuses: Some(vec!["Exceeding Quota".into()]),
            ..Default::default()
        };
        let out = apply_filters(&records, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].farmer_id, "f3");
    }

    #[test]
    fn test_substring_search_is_case_insensitive() {
        let records = sample();
        let spec = FilterSpec {
            farmer_id_search: Some("F2".into()),
            ..Default::default()
        };
        let out = apply_filters(&records, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].farmer_id, "f2");

        // empty string means no filtering on this dimension
        let spec = FilterSpec {
            farmer_id_search: Some("".into()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec).len(), 3);
    }

    #[test]
    fn test_pct_range_bounds_inclusive() {
        let records = sample();
        let spec = FilterSpec {
            quota_pct_range: Some((0.2, 0.75)),
            ..Default::default()
        };
        let out = apply_filters(&records, &spec);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].farmer_id, "f1");
        assert_eq!(out[1].farmer_id, "f2");
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let records = sample();
        let spec = FilterSpec {
            exporters: Some(vec!["ExportCo".into()]),
            quota_pct_range: Some((0.0, 1.0)),
            ..Default::default()
        };
        let out = apply_filters(&records, &spec);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].farmer_id, "f1");
    }

    #[test]
    fn test_result_never_grows() {
        let records = sample();
        let specs = [
            FilterSpec::default(),
            FilterSpec {
                certifications: Some(vec!["Organic".into()]),
                ..Default::default()
            },
            FilterSpec {
                exporters: Some(vec![]),
                ..Default::default()
            },
        ];
        for spec in &specs {
            assert!(apply_filters(&records, spec).len() <= records.len());
        }
    }

    #[test]
    fn test_empty_input_and_empty_result_are_fine() {
        assert!(apply_filters(&[], &FilterSpec::default()).is_empty());

        let spec = FilterSpec {
            exporters: Some(vec!["NobodyShipsForThem".into()]),
            ..Default::default()
        };
        assert!(apply_filters(&sample(), &spec).is_empty());
    }

    #[test]
    fn test_observed_options() {
        let options = observed_options(&sample());
        assert_eq!(options.exporters, vec!["ExportCo", "TradeHouse"]);
        assert_eq!(options.cooperatives, vec!["CoopA", "CoopB"]);
        assert_eq!(
            options.quota_statuses,
            vec!["Meeting Quota", "Underutilized", "Exceeding Quota"]
        );
        assert_eq!(options.quota_pct_min, 0.2);
        assert_eq!(options.quota_pct_max, 1.3);

        let empty = observed_options(&[]);
        assert!(empty.exporters.is_empty());
        assert_eq!(empty.quota_pct_min, 0.0);
        assert_eq!(empty.quota_pct_max, 0.0);
    }
}
