use std::cmp::Ordering;

use polars::prelude::*;
use pyo3::prelude::*;

use crate::error::QkError;
use crate::reconcile::FarmerQuotaRecord;
use crate::schema::histogram;

/// Key metrics over a (possibly filtered) record set.
/// Every aggregate degrades to zero on empty input.
#[pyclass]
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    #[pyo3(get)]
    pub total_farmers: usize,
    #[pyo3(get)]
    pub avg_quota_pct: f64,
    #[pyo3(get)]
    pub total_max_quota_kg: f64,
    #[pyo3(get)]
    pub total_net_weight_kg: f64,
}

pub fn summarize(records: &[FarmerQuotaRecord]) -> Summary {
    if records.is_empty() {
        return Summary {
            total_farmers: 0,
            avg_quota_pct: 0.0,
            total_max_quota_kg: 0.0,
            total_net_weight_kg: 0.0,
        };
    }

    let mut pct_sum = 0.0;
    let mut quota_sum = 0.0;
    let mut weight_sum = 0.0;
    for rec in records {
        pct_sum += rec.quota_used_pct;
        quota_sum += rec.max_quota_kg;
        weight_sum += rec.total_net_weight_kg;
    }

    Summary {
        total_farmers: records.len(),
        avg_quota_pct: pct_sum / records.len() as f64,
        total_max_quota_kg: quota_sum,
        total_net_weight_kg: weight_sum,
    }
}

/// Order records by quota_used_pct. The sort is stable, so equal
/// percentages keep their insertion order in either direction.
pub fn sort_by_quota_pct(
    records: &[FarmerQuotaRecord],
    descending: bool,
) -> Vec<FarmerQuotaRecord> {
    let mut out = records.to_vec();
    out.sort_by(|a, b| {
        let ord = a
            .quota_used_pct
            .partial_cmp(&b.quota_used_pct)
            .unwrap_or(Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    out
}

/// One fixed-width histogram bin: [lower, upper), count of values inside.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
}

/// Bin values at a fixed step, aligned to multiples of the step so that
/// bins are comparable across renders. Non-finite values are ignored;
/// empty input yields no bins.
pub fn histogram(values: &[f64], step: f64) -> Result<Vec<HistogramBin>, QkError> {
    if !(step.is_finite() && step > 0.0) {
        return Err(QkError::Validation(format!(
            "histogram step must be positive, got {step}"
        )));
    }

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let Some(min) = finite.iter().copied().reduce(f64::min) else {
        return Ok(Vec::new());
    };
    let max = finite.iter().copied().reduce(f64::max).unwrap_or(min);

    let origin = (min / step).floor() * step;
    let nbins = (((max - origin) / step).floor() as usize) + 1;

    let mut bins: Vec<HistogramBin> = (0..nbins)
        .map(|i| HistogramBin {
            lower: origin + i as f64 * step,
            upper: origin + (i + 1) as f64 * step,
            count: 0,
        })
        .collect();

    for v in finite {
        let idx = (((v - origin) / step).floor() as usize).min(nbins - 1);
        bins[idx].count += 1;
    }

    Ok(bins)
}

/// Histogram bins as a tidy frame for the charting layer.
pub fn histogram_frame(bins: &[HistogramBin]) -> Result<DataFrame, QkError> {
    let lowers: Vec<f64> = bins.iter().map(|b| b.lower).collect();
    let uppers: Vec<f64> = bins.iter().map(|b| b.upper).collect();
    let counts: Vec<u32> = bins.iter().map(|b| b.count).collect();

    let df = DataFrame::new(vec![
        Column::new(histogram::BIN_LOWER.into(), &lowers),
        Column::new(histogram::BIN_UPPER.into(), &uppers),
        Column::new(histogram::COUNT.into(), &counts),
    ])?;
    Ok(df)
}
