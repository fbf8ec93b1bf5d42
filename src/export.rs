use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LONG_CSV: &str = "data/ark_specs_long.csv";

/// One long-format row: a single spec of a single product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongRecord {
    pub sku: String,
    pub product_name: String,
    pub product_url: String,
    pub category: String,
    pub family: String,
    pub spec_group: String,
    pub spec_name: String,
    pub spec_value: String,
    pub scraped_at: String,
}

/// Metadata columns shared by the wide format, in long-column order.
pub const META_COLUMNS: [&str; 6] = [
    "sku",
    "product_name",
    "product_url",
    "category",
    "family",
    "scraped_at",
];

/// Current UTC time at second precision, RFC 3339.
pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Append records to the long CSV, writing the header only when the
/// file does not exist yet.
pub fn append_records(path: &Path, records: &[LongRecord]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let is_new = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(records.len())
}

/// Read the whole long CSV. A missing or malformed file fails the
/// conversion step; conversions are cheap to re-run, so there is no
/// partial recovery.
pub fn read_records(path: &Path) -> Result<Vec<LongRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open long CSV {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: LongRecord =
            row.with_context(|| format!("Malformed row in {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

// ── Tests ──
