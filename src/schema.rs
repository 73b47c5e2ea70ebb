/// Column-name constants for the cocoa-quotakit schema.
/// Single source of truth - exported to Python via PyO3.

/// Sentinel category for categorical values absent from the source.
pub const UNKNOWN: &str = "Unknown";

/// Pseudo-option in a filter selection that collapses to "no filter".
pub const ALL_OPTION: &str = "All";

// ── Farmer / quota source columns ───────────────────────────────────────────
pub mod farmer {
    pub const FARMER_ID: &str = "farmer_id";
    pub const MAX_QUOTA_KG: &str = "max_quota_kg";

    pub const COLUMNS: [&str; 2] = [FARMER_ID, MAX_QUOTA_KG];
}

// ── Traceability source columns ─────────────────────────────────────────────
pub mod traceability {
    pub const FARMER_ID: &str = "farmer_id";
    pub const NET_WEIGHT_KG: &str = "net_weight_kg";
    pub const EXPORT_LOT: &str = "export_lot";
    pub const EXPORTER: &str = "exporter";
    pub const COOPERATIVE_NAME: &str = "cooperative_name";
    pub const CERTIFICATION: &str = "certification";

    pub const COLUMNS: [&str; 6] = [
        FARMER_ID,
        NET_WEIGHT_KG,
        EXPORT_LOT,
        EXPORTER,
        COOPERATIVE_NAME,
        CERTIFICATION,
    ];

    pub const CATEGORICAL: [&str; 4] =
        [EXPORT_LOT, EXPORTER, COOPERATIVE_NAME, CERTIFICATION];
}

// ── Reconciled output columns ───────────────────────────────────────────────
pub mod reconciled {
    pub const FARMER_ID: &str = "farmer_id";
    pub const MAX_QUOTA_KG: &str = "max_quota_kg";
    pub const TOTAL_NET_WEIGHT_KG: &str = "total_net_weight_kg";
    pub const QUOTA_USED_PCT: &str = "quota_used_pct";
    pub const QUOTA_STATUS: &str = "quota_status";
    pub const COOPERATIVE_NAME: &str = "cooperative_name";
    pub const CERTIFICATION: &str = "certification";
    pub const EXPORTER: &str = "exporter";
    pub const EXPORT_LOT: &str = "export_lot";

    pub const COLUMNS: [&str; 9] = [
        FARMER_ID,
        MAX_QUOTA_KG,
        TOTAL_NET_WEIGHT_KG,
        QUOTA_USED_PCT,
        QUOTA_STATUS,
        COOPERATIVE_NAME,
        CERTIFICATION,
        EXPORTER,
        EXPORT_LOT,
    ];
}

// ── Quota status values ─────────────────────────────────────────────────────
pub mod status {
    pub const UNDERUTILIZED: &str = "Underutilized";
    pub const MEETING_QUOTA: &str = "Meeting Quota";
    pub const EXCEEDING_QUOTA: &str = "Exceeding Quota";
    pub const UNKNOWN: &str = "Unknown";
}

// ── Histogram projection columns ────────────────────────────────────────────
pub mod histogram {
    pub const BIN_LOWER: &str = "bin_lower";
    pub const BIN_UPPER: &str = "bin_upper";
    pub const COUNT: &str = "count";
}
