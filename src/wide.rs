use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::export::{self, LongRecord, META_COLUMNS};

pub const DEFAULT_WIDE_CSV: &str = "data/ark_specs_wide.csv";

pub struct WideSummary {
    pub products: usize,
    pub spec_columns: usize,
}

struct WideRow {
    meta: [String; 6],
    cells: HashMap<String, String>,
}

/// Pivot the long CSV into one row per SKU.
///
/// Spec columns are named `"Group: Spec Name"` and ordered by first
/// appearance in the input; rows are ordered by SKU. Duplicate
/// (sku, group, name) rows resolve last-write-wins, so a re-scrape
/// appended after a reset overrides earlier values.
pub fn convert(input: &Path, output: &Path) -> Result<WideSummary> {
    let records = export::read_records(input)?;
    info!("Read {} long rows from {}", records.len(), input.display());

    let mut spec_columns: Vec<String> = Vec::new();
    let mut seen_columns: HashSet<String> = HashSet::new();
    let mut rows: HashMap<String, WideRow> = HashMap::new();
    let mut sku_order: Vec<String> = Vec::new();

    for r in &records {
        let col = column_name(&r.spec_group, &r.spec_name);
        if seen_columns.insert(col.clone()) {
            spec_columns.push(col.clone());
        }

        let row = rows.entry(r.sku.clone()).or_insert_with(|| {
            sku_order.push(r.sku.clone());
            WideRow {
                meta: meta_cells(r),
                cells: HashMap::new(),
            }
        });
        // Last write wins, including the metadata captured alongside it
        row.meta = meta_cells(r);
        row.cells.insert(col, r.spec_value.clone());
    }

    sku_order.sort();

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let header: Vec<&str> = META_COLUMNS
        .iter()
        .copied()
        .chain(spec_columns.iter().map(String::as_str))
        .collect();
    writer.write_record(&header)?;

    for sku in &sku_order {
        let row = &rows[sku];
        let record: Vec<&str> = row
            .meta
            .iter()
            .map(String::as_str)
            .chain(
                spec_columns
                    .iter()
                    .map(|col| row.cells.get(col).map(String::as_str).unwrap_or("")),
            )
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!(
        "Wrote {} wide rows with {} spec columns to {}",
        sku_order.len(),
        spec_columns.len(),
        output.display()
    );
    Ok(WideSummary {
        products: sku_order.len(),
        spec_columns: spec_columns.len(),
    })
}

pub fn column_name(group: &str, name: &str) -> String {
    format!("{}: {}", group, name)
}

fn meta_cells(r: &LongRecord) -> [String; 6] {
    [
        r.sku.clone(),
        r.product_name.clone(),
        r.product_url.clone(),
        r.category.clone(),
        r.family.clone(),
        r.scraped_at.clone(),
    ]
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{append_records, LongRecord};

    fn record(sku: &str, group: &str, name: &str, value: &str) -> LongRecord {
        LongRecord {
            sku: sku.to_string(),
            product_name: format!("Processor {}", sku),
            product_url: format!(
                "https://www.intel.com/products/sku/{}/specifications.html",
                sku
            ),
            category: "Desktop".to_string(),
            family: "Core i7".to_string(),
            spec_group: group.to_string(),
            spec_name: name.to_string(),
            spec_value: value.to_string(),
            scraped_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn write_long(dir: &Path, records: &[LongRecord]) -> std::path::PathBuf {
        let path = dir.join("long.csv");
        append_records(&path, records).unwrap();
        path
    }

    #[test]
    fn pivots_one_row_per_sku() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_long(
            dir.path(),
            &[
                record("BX80684I78700K", "CPU Specifications", "Total Cores", "6"),
                record("BX80684I78700K", "CPU Specifications", "Total Threads", "12"),
            ],
        );
        let output = dir.path().join("wide.csv");
        let summary = convert(&input, &output).unwrap();
        assert_eq!(summary.products, 1);
        assert_eq!(summary.spec_columns, 2);

        let text = std::fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.ends_with(
            "CPU Specifications: Total Cores,CPU Specifications: Total Threads"
        ));
        let row = lines.next().unwrap();
        assert!(row.starts_with("BX80684I78700K,"));
        assert!(row.ends_with(",6,12"));
    }

    #[test]
    fn column_order_is_first_seen() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_long(
            dir.path(),
            &[
                record("200", "Package Specifications", "Sockets Supported", "FCLGA1151"),
                record("100", "CPU Specifications", "Total Cores", "6"),
                record("200", "CPU Specifications", "Total Cores", "8"),
            ],
        );
        let output = dir.path().join("wide.csv");
        convert(&input, &output).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let header = text.lines().next().unwrap();
        let socket_idx = header.find("Package Specifications: Sockets Supported").unwrap();
        let cores_idx = header.find("CPU Specifications: Total Cores").unwrap();
        assert!(socket_idx < cores_idx);

        // Rows sorted by SKU; missing cells are empty
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert!(rows[0].starts_with("100,"));
        assert!(rows[0].ends_with(",,6"));
        assert!(rows[1].starts_with("200,"));
    }

    #[test]
    fn duplicate_rows_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_long(
            dir.path(),
            &[
                record("100", "CPU Specifications", "Total Cores", "6"),
                record("100", "CPU Specifications", "Total Cores", "8"),
            ],
        );
        let output = dir.path().join("wide.csv");
        let summary = convert(&input, &output).unwrap();
        assert_eq!(summary.spec_columns, 1);

        let text = std::fs::read_to_string(&output).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.ends_with(",8"));
    }

    #[test]
    fn conversion_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_long(
            dir.path(),
            &[
                record("100", "CPU Specifications", "Total Cores", "6"),
                record("200", "Memory Specifications", "Max Memory Size", "128 GB"),
                record("100", "Memory Specifications", "Max Memory Size", "64 GB"),
            ],
        );
        let out_a = dir.path().join("wide_a.csv");
        let out_b = dir.path().join("wide_b.csv");
        convert(&input, &out_a).unwrap();
        convert(&input, &out_b).unwrap();
        assert_eq!(
            std::fs::read_to_string(&out_a).unwrap(),
            std::fs::read_to_string(&out_b).unwrap()
        );
    }

    #[test]
    fn missing_input_fails_conversion() {
        let dir = tempfile::tempdir().unwrap();
        assert!(convert(&dir.path().join("nope.csv"), &dir.path().join("wide.csv")).is_err());
    }
}
