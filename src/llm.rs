use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use tracing::info;

use crate::export::{self, LongRecord};

pub const DEFAULT_LLM_BASE: &str = "data/ark_specs_llm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LlmFormat {
    Markdown,
    Json,
    Jsonl,
    Text,
    All,
}

/// Specs of one section, in first-seen order.
pub struct SpecGroup {
    pub name: String,
    pub rows: Vec<(String, String)>,
}

/// All captured data for one product, grouped for rendering.
pub struct ProductDoc {
    pub sku: String,
    pub product_name: String,
    pub product_url: String,
    pub category: String,
    pub family: String,
    pub groups: Vec<SpecGroup>,
}

/// Group long rows into one document per SKU.
///
/// Group and spec order follow first appearance in the input; duplicate
/// (group, name) pairs resolve last-write-wins, matching the wide
/// converter. Documents come back sorted by display name so the rendered
/// outputs read like a catalog.
pub fn group_products(records: &[LongRecord]) -> Vec<ProductDoc> {
    let mut docs: Vec<ProductDoc> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for r in records {
        let i = *index.entry(r.sku.clone()).or_insert_with(|| {
            docs.push(ProductDoc {
                sku: r.sku.clone(),
                product_name: r.product_name.clone(),
                product_url: r.product_url.clone(),
                category: r.category.clone(),
                family: r.family.clone(),
                groups: Vec::new(),
            });
            docs.len() - 1
        });
        let doc = &mut docs[i];
        doc.product_name = r.product_name.clone();
        doc.product_url = r.product_url.clone();
        doc.category = r.category.clone();
        doc.family = r.family.clone();

        let group = match doc.groups.iter_mut().find(|g| g.name == r.spec_group) {
            Some(g) => g,
            None => {
                doc.groups.push(SpecGroup {
                    name: r.spec_group.clone(),
                    rows: Vec::new(),
                });
                doc.groups.last_mut().unwrap()
            }
        };
        match group.rows.iter_mut().find(|(name, _)| *name == r.spec_name) {
            Some((_, value)) => *value = r.spec_value.clone(),
            None => group.rows.push((r.spec_name.clone(), r.spec_value.clone())),
        }
    }

    docs.sort_by(|a, b| {
        a.product_name
            .cmp(&b.product_name)
            .then_with(|| a.sku.cmp(&b.sku))
    });
    docs
}

/// Short model name from the full display name, e.g.
/// "Intel® Core™ i7-8700K Processor (12M Cache, ...)" → "Intel Core i7-8700K".
pub fn extract_model_name(product_name: &str) -> String {
    let name = product_name.replace(['\u{ae}', '\u{2122}'], "");
    let name = match name.find("Processor").or_else(|| name.find("processor")) {
        Some(idx) => &name[..idx],
        None => name.as_str(),
    };
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render the long dataset into the selected format(s). Output paths are
/// `base` with the extension of each format.
pub fn run(input: &Path, output_base: &Path, format: LlmFormat) -> Result<()> {
    let records = export::read_records(input)?;
    let docs = group_products(&records);
    info!(
        "Loaded {} products from {} long rows",
        docs.len(),
        records.len()
    );

    if matches!(format, LlmFormat::Markdown | LlmFormat::All) {
        let path = output_base.with_extension("md");
        write_markdown(&docs, &path)?;
        println!("Written markdown: {}", path.display());
    }
    if matches!(format, LlmFormat::Jsonl | LlmFormat::All) {
        let path = output_base.with_extension("jsonl");
        write_jsonl(&docs, &path)?;
        println!("Written JSONL: {}", path.display());
    }
    if matches!(format, LlmFormat::Text | LlmFormat::All) {
        let path = output_base.with_extension("txt");
        write_text(&docs, &path)?;
        println!("Written text: {}", path.display());
    }
    if matches!(format, LlmFormat::Json | LlmFormat::All) {
        let path = output_base.with_extension("json");
        write_json(&docs, &path)?;
        println!("Written JSON: {}", path.display());
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

pub fn write_markdown(docs: &[ProductDoc], path: &Path) -> Result<()> {
    let mut f = create(path)?;
    writeln!(f, "# Intel Processor Specifications Database\n")?;
    writeln!(
        f,
        "This document contains detailed specifications for Intel processors."
    )?;
    writeln!(
        f,
        "Search by processor model name (e.g. 'i7-8700K', 'Xeon Gold 5118').\n"
    )?;
    writeln!(f, "---\n")?;

    for doc in docs {
        writeln!(f, "## {}\n", extract_model_name(&doc.product_name))?;
        writeln!(f, "**Full Name:** {}", doc.product_name)?;
        writeln!(f, "**SKU:** {}", doc.sku)?;
        writeln!(f, "**Category:** {}", doc.category)?;
        writeln!(f, "**Family:** {}", doc.family)?;
        writeln!(f, "**URL:** {}\n", doc.product_url)?;

        for group in &doc.groups {
            writeln!(f, "### {}\n", group.name)?;
            for (name, value) in &group.rows {
                writeln!(f, "- **{}:** {}", name, value)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "---\n")?;
    }
    f.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonlRecord<'a> {
    model: String,
    full_name: &'a str,
    sku: &'a str,
    category: &'a str,
    family: &'a str,
    url: &'a str,
    specs: serde_json::Map<String, serde_json::Value>,
    text: String,
}

pub fn write_jsonl(docs: &[ProductDoc], path: &Path) -> Result<()> {
    let mut f = create(path)?;
    for doc in docs {
        let model = extract_model_name(&doc.product_name);

        // Flatten to "Group: Name" keys for embedding pipelines
        let mut specs = serde_json::Map::new();
        for group in &doc.groups {
            for (name, value) in &group.rows {
                specs.insert(
                    format!("{}: {}", group.name, name),
                    serde_json::Value::String(value.clone()),
                );
            }
        }

        let record = JsonlRecord {
            text: text_block(doc, &model),
            model,
            full_name: &doc.product_name,
            sku: &doc.sku,
            category: &doc.category,
            family: &doc.family,
            url: &doc.product_url,
            specs,
        };
        serde_json::to_writer(&mut f, &record)?;
        writeln!(f)?;
    }
    f.flush()?;
    Ok(())
}

/// Searchable plain-text block for one product.
fn text_block(doc: &ProductDoc, model: &str) -> String {
    let mut lines = vec![
        format!("Processor: {}", model),
        format!("Full Name: {}", doc.product_name),
        format!("Category: {}", doc.category),
        format!("Family: {}", doc.family),
        String::new(),
    ];
    for group in &doc.groups {
        lines.push(format!("{}:", group.name));
        for (name, value) in &group.rows {
            lines.push(format!("  {}: {}", name, value));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn write_text(docs: &[ProductDoc], path: &Path) -> Result<()> {
    let mut f = create(path)?;
    writeln!(f, "INTEL PROCESSOR SPECIFICATIONS DATABASE")?;
    writeln!(f, "{}\n", "=".repeat(50))?;

    for doc in docs {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "PROCESSOR: {}", extract_model_name(&doc.product_name))?;
        writeln!(f, "{}\n", "=".repeat(60))?;

        writeln!(f, "Full Name: {}", doc.product_name)?;
        writeln!(f, "SKU: {}", doc.sku)?;
        writeln!(f, "Category: {}", doc.category)?;
        writeln!(f, "Family: {}", doc.family)?;
        writeln!(f, "URL: {}\n", doc.product_url)?;

        for group in &doc.groups {
            writeln!(f, "[{}]", group.name)?;
            for (name, value) in &group.rows {
                writeln!(f, "  {}: {}", name, value)?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;
    }
    f.flush()?;
    Ok(())
}

pub fn write_json(docs: &[ProductDoc], path: &Path) -> Result<()> {
    let mut by_model = serde_json::Map::new();

    for doc in docs {
        let model = extract_model_name(&doc.product_name);

        let mut specs = serde_json::Map::new();
        for group in &doc.groups {
            let mut rows = serde_json::Map::new();
            for (name, value) in &group.rows {
                rows.insert(name.clone(), serde_json::Value::String(value.clone()));
            }
            specs.insert(group.name.clone(), serde_json::Value::Object(rows));
        }

        let record = serde_json::json!({
            "model": model,
            "full_name": doc.product_name,
            "sku": doc.sku,
            "category": doc.category,
            "family": doc.family,
            "url": doc.product_url,
            "specs": specs,
        });

        // Model names can collide across SKUs; disambiguate with the SKU
        let key = if by_model.contains_key(&model) {
            format!("{} (SKU {})", model, doc.sku)
        } else {
            model
        };
        by_model.insert(key, record);
    }

    let mut f = create(path)?;
    serde_json::to_writer_pretty(&mut f, &serde_json::Value::Object(by_model))?;
    writeln!(f)?;
    f.flush()?;
    Ok(())
}

// ── Tests ──
