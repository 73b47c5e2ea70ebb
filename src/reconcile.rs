use std::collections::{HashMap, HashSet};
use std::fmt;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::QkError;
use crate::schema::{self, farmer, reconciled, traceability};

/// Three-way quota utilization taxonomy, classified on the 0-1 ratio.
/// Lower bounds are closed: 0.5 is Meeting Quota, 1.0 is Exceeding Quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    Underutilized,
    MeetingQuota,
    ExceedingQuota,
    Unknown,
}

impl QuotaStatus {
    /// Total pure function of the utilization ratio.
    pub fn classify(pct: f64) -> Self {
        if !pct.is_finite() {
            QuotaStatus::Unknown
        } else if pct < 0.5 {
            QuotaStatus::Underutilized
        } else if pct < 1.0 {
            QuotaStatus::MeetingQuota
        } else {
            QuotaStatus::ExceedingQuota
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaStatus::Underutilized => schema::status::UNDERUTILIZED,
            QuotaStatus::MeetingQuota => schema::status::MEETING_QUOTA,
            QuotaStatus::ExceedingQuota => schema::status::EXCEEDING_QUOTA,
            QuotaStatus::Unknown => schema::status::UNKNOWN,
        }
    }
}

impl fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One farmer after reconciliation. `farmer_id` is unique across a result
/// set; every field is filled (numeric gaps with 0, categorical gaps with
/// the "Unknown" sentinel).
#[derive(Debug, Clone, PartialEq)]
pub struct FarmerQuotaRecord {
    pub farmer_id: String,
    pub max_quota_kg: f64,
    pub total_net_weight_kg: f64,
    pub quota_used_pct: f64,
    pub quota_status: QuotaStatus,
    pub cooperative_name: String,
    pub certification: String,
    pub exporter: String,
    pub export_lot: String,
}

/// Reconcile the farmer/quota table with the traceability table.
///
/// Identifiers are normalized (trimmed, lower-cased) before any grouping or
/// joining. Traceability rows are aggregated per farmer (weights summed,
/// categoricals reduced to the group mode with first-encountered tie-break),
/// then left-joined against the quota rows: every keyed quota row appears
/// exactly once in the output, trace-only farmers are dropped.
///
/// Never fails on empty or gap-ridden inputs. The one fatal case is a
/// non-empty table whose `farmer_id` column is absent or entirely null.
pub fn reconcile(
    farmers: &DataFrame,
    traces: &DataFrame,
) -> Result<Vec<FarmerQuotaRecord>, QkError> {
    if farmers.height() == 0 {
        return Ok(Vec::new());
    }

    let groups = aggregate_traces(traces)?;

    let id_col = key_column(farmers, "farmers")?;
    let quota_col = farmers.column(farmer::MAX_QUOTA_KG).ok();

    let mut records = Vec::with_capacity(farmers.height());
    let mut seen: HashSet<String> = HashSet::new();
    let mut unkeyed = 0usize;
    let mut duplicates = 0usize;

    for i in 0..farmers.height() {
        let Some(id) = normalized_id(id_col, i) else {
            unkeyed += 1;
            continue;
        };
        if !seen.insert(id.clone()) {
            duplicates += 1;
            continue;
        }

        let max_quota_kg = quota_col.and_then(|c| cell_f64(c, i)).unwrap_or(0.0);
        let agg = groups.get(&id);
        let total_net_weight_kg = agg.map(|a| a.total_net_weight_kg).unwrap_or(0.0);
        let quota_used_pct = if max_quota_kg > 0.0 {
            total_net_weight_kg / max_quota_kg
        } else {
            // zero or missing denominator resolves to the 0 sentinel
            0.0
        };

        records.push(FarmerQuotaRecord {
            farmer_id: id,
            max_quota_kg,
            total_net_weight_kg,
            quota_used_pct,
            quota_status: QuotaStatus::classify(quota_used_pct),
            cooperative_name: resolve_categorical(agg, |a| &a.cooperative_name),
            certification: resolve_categorical(agg, |a| &a.certification),
            exporter: resolve_categorical(agg, |a| &a.exporter),
            export_lot: resolve_categorical(agg, |a| &a.export_lot),
        });
    }

    if unkeyed > 0 {
        warn!(rows = unkeyed, "farmer rows without a usable farmer_id skipped");
    }
    if duplicates > 0 {
        warn!(rows = duplicates, "duplicate farmer_id rows dropped, first occurrence kept");
    }
    debug!(
        farmers = records.len(),
        trace_groups = groups.len(),
        "reconciled"
    );

    Ok(records)
}

/// Project reconciled records into the tidy output table consumed by the
/// UI and charting layer. Always carries the full column set.
pub fn records_to_dataframe(records: &[FarmerQuotaRecord]) -> Result<DataFrame, QkError> {
    let n = records.len();
    let mut farmer_ids = Vec::with_capacity(n);
    let mut max_quotas = Vec::with_capacity(n);
    let mut totals = Vec::with_capacity(n);
    let mut pcts = Vec::with_capacity(n);
    let mut statuses = Vec::with_capacity(n);
    let mut cooperatives = Vec::with_capacity(n);
    let mut certifications = Vec::with_capacity(n);
    let mut exporters = Vec::with_capacity(n);
    let mut lots = Vec::with_capacity(n);

    for rec in records {
        farmer_ids.push(rec.farmer_id.clone());
        max_quotas.push(rec.max_quota_kg);
        totals.push(rec.total_net_weight_kg);
        pcts.push(rec.quota_used_pct);
        statuses.push(rec.quota_status.as_str().to_string());
        cooperatives.push(rec.cooperative_name.clone());
        certifications.push(rec.certification.clone());
        exporters.push(rec.exporter.clone());
        lots.push(rec.export_lot.clone());
    }

    let df = DataFrame::new(vec![
        Column::new(reconciled::FARMER_ID.into(), &farmer_ids),
        Column::new(reconciled::MAX_QUOTA_KG.into(), &max_quotas),
        Column::new(reconciled::TOTAL_NET_WEIGHT_KG.into(), &totals),
        Column::new(reconciled::QUOTA_USED_PCT.into(), &pcts),
        Column::new(reconciled::QUOTA_STATUS.into(), &statuses),
        Column::new(reconciled::COOPERATIVE_NAME.into(), &cooperatives),
        Column::new(reconciled::CERTIFICATION.into(), &certifications),
        Column::new(reconciled::EXPORTER.into(), &exporters),
        Column::new(reconciled::EXPORT_LOT.into(), &lots),
    ])?;

    Ok(df)
}

// ── Traceability aggregation ────────────────────────────────────────────────

#[derive(Default)]
struct TraceAgg {
    total_net_weight_kg: f64,
    export_lot: ModeAccumulator,
    exporter: ModeAccumulator,
    cooperative_name: ModeAccumulator,
    certification: ModeAccumulator,
}

fn aggregate_traces(traces: &DataFrame) -> Result<HashMap<String, TraceAgg>, QkError> {
    let mut groups: HashMap<String, TraceAgg> = HashMap::new();
    if traces.height() == 0 {
        return Ok(groups);
    }

    let ids = key_column(traces, "traceability")?;
    let weights = traces.column(traceability::NET_WEIGHT_KG).ok();
    let lots = traces.column(traceability::EXPORT_LOT).ok();
    let exporters = traces.column(traceability::EXPORTER).ok();
    let cooperatives = traces.column(traceability::COOPERATIVE_NAME).ok();
    let certifications = traces.column(traceability::CERTIFICATION).ok();

    let mut unkeyed = 0usize;
    let mut unusable_weights = 0usize;

    for i in 0..traces.height() {
        let Some(id) = normalized_id(ids, i) else {
            unkeyed += 1;
            continue;
        };
        let agg = groups.entry(id).or_default();

        // Only parseable, non-negative weights contribute to the sum.
        match weights.and_then(|c| cell_f64(c, i)) {
            Some(w) if w >= 0.0 => agg.total_net_weight_kg += w,
            _ => unusable_weights += 1,
        }

        agg.export_lot.observe(lots.and_then(|c| cell_str(c, i)));
        agg.exporter.observe(exporters.and_then(|c| cell_str(c, i)));
        agg.cooperative_name
            .observe(cooperatives.and_then(|c| cell_str(c, i)));
        agg.certification
            .observe(certifications.and_then(|c| cell_str(c, i)));
    }

    if unkeyed > 0 {
        warn!(rows = unkeyed, "traceability rows without a usable farmer_id skipped");
    }
    if unusable_weights > 0 {
        debug!(
            rows = unusable_weights,
            "traceability rows with missing, non-numeric or negative weights excluded from sums"
        );
    }

    Ok(groups)
}

/// Most frequent value in a group, ties broken by first-encountered order.
#[derive(Default)]
struct ModeAccumulator {
    counts: HashMap<String, (usize, usize)>, // value -> (count, first_seen)
    observed: usize,
}

impl ModeAccumulator {
    fn observe(&mut self, value: Option<String>) {
        let Some(value) = value else { return };
        let next = self.observed;
        self.observed += 1;
        self.counts.entry(value).or_insert((0, next)).0 += 1;
    }

    fn resolve(&self) -> Option<String> {
        self.counts
            .iter()
            .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
            .map(|(value, _)| value.clone())
    }
}

fn resolve_categorical(
    agg: Option<&TraceAgg>,
    field: impl Fn(&TraceAgg) -> &ModeAccumulator,
) -> String {
    agg.and_then(|a| field(a).resolve())
        .unwrap_or_else(|| schema::UNKNOWN.to_string())
}

// ── Cell extraction ─────────────────────────────────────────────────────────

fn key_column<'a>(df: &'a DataFrame, table: &str) -> Result<&'a Column, QkError> {
    let col = df.column(farmer::FARMER_ID).map_err(|_| {
        QkError::MissingColumn(format!("{table}.{}", farmer::FARMER_ID))
    })?;
    if col.null_count() == df.height() {
        return Err(QkError::MissingColumn(format!(
            "{table}.{} carries no values",
            farmer::FARMER_ID
        )));
    }
    Ok(col)
}

fn normalized_id(col: &Column, i: usize) -> Option<String> {
    cell_str(col, i).map(|s| s.to_lowercase())
}

fn cell_str(col: &Column, i: usize) -> Option<String> {
    match col.get(i) {
        Ok(AnyValue::Null) | Err(_) => None,
        Ok(AnyValue::String(s)) => non_empty(s),
        Ok(AnyValue::StringOwned(s)) => non_empty(s.as_str()),
        Ok(other) => non_empty(&other.to_string()),
    }
}

fn cell_f64(col: &Column, i: usize) -> Option<f64> {
    match col.get(i) {
        Ok(AnyValue::Float64(v)) => Some(v),
        Ok(AnyValue::Float32(v)) => Some(v as f64),
        Ok(AnyValue::Int64(v)) => Some(v as f64),
        Ok(AnyValue::Int32(v)) => Some(v as f64),
        Ok(AnyValue::UInt64(v)) => Some(v as f64),
        Ok(AnyValue::UInt32(v)) => Some(v as f64),
        Ok(AnyValue::String(s)) => s.trim().parse().ok(),
        Ok(AnyValue::StringOwned(s)) => s.as_str().trim().parse().ok(),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
