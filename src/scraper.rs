use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, ProductLink};
use crate::export::{self, LongRecord};
use crate::parser::{listing, specs};

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const POLITE_DELAY_MS: u64 = 800;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP fetcher with retry/backoff for transient failures.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { client })
    }

    /// GET a page body, retrying on transport errors, 429 and 5xx.
    pub async fn get(&self, url: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 0..=MAX_RETRIES {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < MAX_RETRIES && should_retry(&e) => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "Fetch failed for {} (attempt {}/{}): {}; backing off {:.1}s",
                        url,
                        attempt + 1,
                        MAX_RETRIES,
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("Retries exhausted for {}", url)))
    }

    async fn try_get(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            anyhow::bail!("transient HTTP {} for {}", status.as_u16(), url);
        }
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status.as_u16(), url);
        }
        Ok(resp.text().await?)
    }
}

fn should_retry(e: &anyhow::Error) -> bool {
    if let Some(re) = e.downcast_ref::<reqwest::Error>() {
        return re.is_timeout() || re.is_connect() || re.is_request();
    }
    e.to_string().starts_with("transient")
}

/// Keep a little distance between page loads.
async fn polite_delay() {
    tokio::time::sleep(Duration::from_millis(POLITE_DELAY_MS)).await;
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .expect("static progress template")
            .progress_chars("=> "),
    );
    pb
}

// ── Discovery ──

pub struct DiscoverStats {
    pub categories: usize,
    pub series: usize,
    pub products: usize,
}

/// Walk the catalog: landing page → per-category series panels →
/// per-series product tables, storing everything discovered.
pub async fn discover(conn: &Connection, fetcher: &Fetcher) -> Result<DiscoverStats> {
    info!("Fetching ARK landing page");
    let landing = fetcher.get(listing::ARK_PROCESSORS_URL).await?;

    let categories = listing::parse_categories(&landing);
    info!("Found {} processor categories", categories.len());

    let mut all_series = Vec::new();
    for category in &categories {
        let series = listing::parse_series_links(&landing, category);
        info!("Category {}: {} series", category, series.len());
        db::insert_series(conn, &series)?;
        all_series.extend(series);
    }

    let mut products = 0;
    for s in &all_series {
        polite_delay().await;
        let html = match fetcher.get(&s.url).await {
            Ok(html) => html,
            Err(e) => {
                // One broken series page must not sink the whole walk
                warn!("Skipping series {}: {}", s.family, e);
                continue;
            }
        };
        let rows = listing::parse_product_rows(&html, &s.category, &s.family);
        let inserted = db::insert_products(conn, &rows)?;
        info!(
            "Series {}: {} products ({} new)",
            s.family,
            rows.len(),
            inserted
        );
        products += inserted;
    }

    Ok(DiscoverStats {
        categories: categories.len(),
        series: all_series.len(),
        products,
    })
}

// ── Scraping ──

pub struct ScrapeStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
    pub rows: usize,
}

/// Scrape products one page at a time, appending long rows as each page
/// completes. A failed product is recorded and skipped; the run goes on.
pub async fn scrape_products(
    conn: &Connection,
    fetcher: &Fetcher,
    out_csv: &Path,
    products: &[ProductLink],
) -> Result<ScrapeStats> {
    let total = products.len();
    let pb = progress_bar(total);

    let mut ok = 0usize;
    let mut errors = 0usize;
    let mut rows = 0usize;

    for (idx, product) in products.iter().enumerate() {
        if idx > 0 {
            polite_delay().await;
        }
        match scrape_one(fetcher, out_csv, product).await {
            Ok(written) => {
                db::mark_done(conn, &product.sku)?;
                ok += 1;
                rows += written;
                info!("[{}/{}] OK sku={} rows={}", idx + 1, total, product.sku, written);
            }
            Err(e) => {
                db::mark_failed(conn, &product.sku, &e.to_string())?;
                errors += 1;
                warn!("[{}/{}] ERROR sku={}: {}", idx + 1, total, product.sku, e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Scraped {} products ({} ok, {} errors)", total, ok, errors);

    Ok(ScrapeStats {
        total,
        ok,
        errors,
        rows,
    })
}

/// Fetch one spec page and append its rows to the long CSV. A page with
/// no spec sections writes zero rows and still counts as done.
async fn scrape_one(fetcher: &Fetcher, out_csv: &Path, product: &ProductLink) -> Result<usize> {
    let html = fetcher.get(&product.spec_url).await?;
    let page = specs::parse_spec_page(&html);
    let product_name = page
        .product_name
        .unwrap_or_else(|| product.product_name.clone());

    let scraped_at = export::utc_now_iso();
    let records: Vec<LongRecord> = page
        .rows
        .into_iter()
        .map(|r| LongRecord {
            sku: product.sku.clone(),
            product_name: product_name.clone(),
            product_url: product.spec_url.clone(),
            category: product.category.clone(),
            family: product.family.clone(),
            spec_group: r.group,
            spec_name: r.name,
            spec_value: r.value,
            scraped_at: scraped_at.clone(),
        })
        .collect();

    export::append_records(out_csv, &records)
}
