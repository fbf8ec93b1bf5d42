use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::normalize_text;

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section.upe-tech-spec").unwrap());

static SECTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.tech-section[id^=\"specs-\"]").unwrap());

static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());

static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.row.tech-section-row").unwrap());

static LABEL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".tech-label span").unwrap());

static DATA_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".tech-data").unwrap());

/// One extracted spec triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRow {
    pub group: String,
    pub name: String,
    pub value: String,
}

pub struct SpecPage {
    /// Display name from the spec section's title attribute, when present.
    pub product_name: Option<String>,
    pub rows: Vec<SpecRow>,
}

/// Parse a product specification page into grouped spec rows.
///
/// A page with no spec sections parses to zero rows rather than an error.
/// Empty values are kept as empty strings so every product exposes the
/// same schema downstream; rows with an empty label are dropped.
pub fn parse_spec_page(html: &str) -> SpecPage {
    let doc = Html::parse_document(html);

    let product_name = doc
        .select(&TITLE_SEL)
        .next()
        .and_then(|el| el.value().attr("data-title-start"))
        .map(normalize_text)
        .filter(|name| !name.is_empty());

    let mut rows = Vec::new();
    for section in doc.select(&SECTION_SEL) {
        let group = match section.select(&HEADING_SEL).next() {
            Some(h3) => normalize_text(&h3.text().collect::<String>()),
            None => continue,
        };
        if group.is_empty() {
            continue;
        }

        for row in section.select(&ROW_SEL) {
            let name = match row.select(&LABEL_SEL).next() {
                Some(label) => normalize_text(&label.text().collect::<String>()),
                None => continue,
            };
            if name.is_empty() {
                continue;
            }
            let value = row
                .select(&DATA_SEL)
                .next()
                .map(|data| normalize_text(&data.text().collect::<String>()))
                .unwrap_or_default();

            rows.push(SpecRow {
                group: group.clone(),
                name,
                value,
            });
        }
    }

    SpecPage { product_name, rows }
}

// ── Tests ──
