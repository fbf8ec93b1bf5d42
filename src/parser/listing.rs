use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::normalize_text;
use crate::db::{ProductLink, SeriesLink};

pub const BASE_URL: &str = "https://www.intel.com";
pub const ARK_PROCESSORS_URL: &str =
    "https://www.intel.com/content/www/us/en/ark.html#@Processors";

static CATEGORY_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "div.product-categories[data-parent-panel-key=\"Processors\"] \
         div.product-category span.name",
    )
    .unwrap()
});

static SERIES_PANEL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.products.processors").unwrap());

static SERIES_LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.ark-accessible-color").unwrap());

static PRODUCT_ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#product-table tr[data-product-id]").unwrap());

static PRODUCT_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("td.ark-product-name a[href*=\"/products/sku/\"]").unwrap()
});

/// Resolve a possibly-relative href against the Intel base URL.
fn to_abs_url(href: &str) -> Option<String> {
    let base = Url::parse(BASE_URL).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Category tile names under the Processors panel of the ARK landing page.
pub fn parse_categories(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&CATEGORY_SEL)
        .map(|el| normalize_text(&el.text().collect::<String>()))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Series listing links for one category. Panels carry the category in
/// `data-parent-panel-key`; panels without the attribute are taken as-is.
/// Family name is the link text.
pub fn parse_series_links(html: &str, category: &str) -> Vec<SeriesLink> {
    let doc = Html::parse_document(html);
    let mut series = Vec::new();
    for panel in doc.select(&SERIES_PANEL_SEL) {
        if let Some(key) = panel.value().attr("data-parent-panel-key") {
            if key != category {
                continue;
            }
        }
        for el in panel.select(&SERIES_LINK_SEL) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            if !href.contains("/ark/products/series/") {
                continue;
            }
            let family = normalize_text(&el.text().collect::<String>());
            if family.is_empty() {
                continue;
            }
            let Some(url) = to_abs_url(href) else { continue };
            series.push(SeriesLink {
                url,
                category: category.to_string(),
                family,
            });
        }
    }
    series
}

/// Product rows of a series page. SKU comes from the row's
/// `data-product-id`; only links to specification pages count.
pub fn parse_product_rows(html: &str, category: &str, family: &str) -> Vec<ProductLink> {
    let doc = Html::parse_document(html);
    doc.select(&PRODUCT_ROW_SEL)
        .filter_map(|row| {
            let sku = row.value().attr("data-product-id")?.trim();
            if sku.is_empty() {
                return None;
            }
            let link = row.select(&PRODUCT_LINK_SEL).next()?;
            let href = link.value().attr("href")?;
            if !href.contains("specifications.html") {
                return None;
            }
            Some(ProductLink {
                sku: sku.to_string(),
                product_name: normalize_text(&link.text().collect::<String>()),
                category: category.to_string(),
                family: family.to_string(),
                spec_url: to_abs_url(href)?,
            })
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING: &str = r#"
        <div class="product-categories" data-parent-panel-key="Processors">
          <div class="product-category"><span class="name">Intel&#174; Core&#8482; Processors</span></div>
          <div class="product-category"><span class="name"> Intel&#174; Xeon&#174; Processors </span></div>
          <div class="product-category"><span class="name"></span></div>
        </div>
        <div class="product-categories" data-parent-panel-key="Chipsets">
          <div class="product-category"><span class="name">Desktop Chipsets</span></div>
        </div>"#;

    #[test]
    fn categories_only_from_processors_panel() {
        let cats = parse_categories(LANDING);
        assert_eq!(cats.len(), 2);
        assert!(cats[0].contains("Core"));
        assert!(cats[1].contains("Xeon"));
    }

    #[test]
    fn series_links_filtered_and_absolutized() {
        let html = r#"
            <div class="products processors" data-parent-panel-key="Intel Core Processors">
              <a class="ark-accessible-color" href="/content/www/us/en/ark/products/series/230496.html">
                Intel&#174; Core&#8482; i9 Processors (14th gen)</a>
              <a class="ark-accessible-color" href="/content/www/us/en/ark/compare.html">Compare</a>
              <a class="ark-accessible-color" href="/content/www/us/en/ark/products/series/230497.html"></a>
            </div>
            <div class="products processors" data-parent-panel-key="Intel Xeon Processors">
              <a class="ark-accessible-color" href="/content/www/us/en/ark/products/series/230498.html">
                Intel&#174; Xeon&#174; Scalable Processors</a>
            </div>"#;
        let series = parse_series_links(html, "Intel Core Processors");
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].category, "Intel Core Processors");
        assert!(series[0].family.contains("i9"));
        assert!(series[0].url.starts_with("https://www.intel.com/"));

        let xeon = parse_series_links(html, "Intel Xeon Processors");
        assert_eq!(xeon.len(), 1);
        assert!(xeon[0].family.contains("Xeon"));
    }

    #[test]
    fn unkeyed_panel_matches_any_category() {
        let html = r#"
            <div class="products processors">
              <a class="ark-accessible-color" href="/ark/products/series/1.html">Legacy Series</a>
            </div>"#;
        let series = parse_series_links(html, "Anything");
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].family, "Legacy Series");
    }

    #[test]
    fn product_rows_need_sku_and_spec_link() {
        let html = r#"
            <table id="product-table">
              <tr data-product-id="126684">
                <td class="ark-product-name">
                  <a href="/content/www/us/en/products/sku/126684/x/specifications.html">
                    Intel&#174; Core&#8482; i7-8700K Processor</a>
                </td>
              </tr>
              <tr data-product-id="126685">
                <td class="ark-product-name">
                  <a href="/content/www/us/en/products/sku/126685/x/ordering.html">Ordering only</a>
                </td>
              </tr>
              <tr><td class="ark-product-name"><a href="/products/sku/1/specifications.html">No id</a></td></tr>
            </table>"#;
        let rows = parse_product_rows(html, "Desktop", "8th Gen Core");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "126684");
        assert!(rows[0].product_name.contains("i7-8700K"));
        assert_eq!(rows[0].family, "8th Gen Core");
        assert!(rows[0].spec_url.ends_with("specifications.html"));
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse_categories("<html></html>").is_empty());
        assert!(parse_series_links("<html></html>", "c").is_empty());
        assert!(parse_product_rows("<html></html>", "c", "f").is_empty());
    }
}
