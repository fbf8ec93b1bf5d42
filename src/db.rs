use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

pub const DEFAULT_DB_PATH: &str = "data/ark.sqlite";

/// A discovered series listing page (one per processor family).
#[derive(Debug, Clone)]
pub struct SeriesLink {
    pub url: String,
    pub category: String,
    pub family: String,
}

/// A discovered product: the unit of scraping, keyed by SKU.
#[derive(Debug, Clone)]
pub struct ProductLink {
    pub sku: String,
    pub product_name: String,
    pub category: String,
    pub family: String,
    pub spec_url: String,
}

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS series (
            url        TEXT PRIMARY KEY,
            category   TEXT NOT NULL,
            family     TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            sku          TEXT PRIMARY KEY,
            product_name TEXT NOT NULL,
            category     TEXT NOT NULL,
            family       TEXT NOT NULL,
            spec_url     TEXT NOT NULL,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);

        CREATE TABLE IF NOT EXISTS scrape_log (
            sku        TEXT PRIMARY KEY REFERENCES products(sku),
            status     TEXT NOT NULL CHECK(status IN ('done','failed')),
            error      TEXT,
            scraped_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_scrape_log_status ON scrape_log(status);
        ",
    )?;
    Ok(())
}

// ── Discovery ──

pub fn insert_series(conn: &Connection, series: &[SeriesLink]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO series (url, category, family) VALUES (?1, ?2, ?3)")?;
        for s in series {
            count += stmt.execute(rusqlite::params![s.url, s.category, s.family])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// A SKU can appear in multiple families; the first seen mapping wins.
pub fn insert_products(conn: &Connection, products: &[ProductLink]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO products (sku, product_name, category, family, spec_url)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for p in products {
            count += stmt.execute(rusqlite::params![
                p.sku, p.product_name, p.category, p.family, p.spec_url,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Progress ──

/// Products not yet scraped successfully. Failed products are skipped
/// unless `retry_failed` is set.
pub fn fetch_pending(
    conn: &Connection,
    category: Option<&str>,
    retry_failed: bool,
    limit: Option<usize>,
) -> Result<Vec<ProductLink>> {
    let mut conditions = vec![if retry_failed {
        "(l.sku IS NULL OR l.status = 'failed')".to_string()
    } else {
        "l.sku IS NULL".to_string()
    }];
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(c) = category {
        conditions.push(format!("p.category = ?{}", params.len() + 1));
        params.push(Box::new(c.to_string()));
    }

    let sql = format!(
        "SELECT p.sku, p.product_name, p.category, p.family, p.spec_url
         FROM products p
         LEFT JOIN scrape_log l ON l.sku = p.sku
         WHERE {}
         ORDER BY p.sku{}",
        conditions.join(" AND "),
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(ProductLink {
                sku: row.get(0)?,
                product_name: row.get(1)?,
                category: row.get(2)?,
                family: row.get(3)?,
                spec_url: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn is_done(conn: &Connection, sku: &str) -> Result<bool> {
    let count: usize = conn.query_row(
        "SELECT COUNT(*) FROM scrape_log WHERE sku = ?1 AND status = 'done'",
        [sku],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub fn mark_done(conn: &Connection, sku: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO scrape_log (sku, status, error, scraped_at)
         VALUES (?1, 'done', NULL, datetime('now'))",
        [sku],
    )?;
    Ok(())
}

pub fn mark_failed(conn: &Connection, sku: &str, reason: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO scrape_log (sku, status, error, scraped_at)
         VALUES (?1, 'failed', ?2, datetime('now'))",
        rusqlite::params![sku, reason],
    )?;
    Ok(())
}

/// Clear all progress records. The discovered catalog is kept, so a
/// reset re-scrape does not need re-discovery.
pub fn reset_progress(conn: &Connection) -> Result<usize> {
    let count = conn.execute("DELETE FROM scrape_log", [])?;
    Ok(count)
}

// ── Stats ──

pub struct Stats {
    pub series: usize,
    pub products: usize,
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let series: usize = conn.query_row("SELECT COUNT(*) FROM series", [], |r| r.get(0))?;
    let products: usize = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
    let done: usize = conn.query_row(
        "SELECT COUNT(*) FROM scrape_log WHERE status = 'done'",
        [],
        |r| r.get(0),
    )?;
    let failed: usize = conn.query_row(
        "SELECT COUNT(*) FROM scrape_log WHERE status = 'failed'",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        series,
        products,
        done,
        failed,
        pending: products - done - failed,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn product(sku: &str) -> ProductLink {
        ProductLink {
            sku: sku.to_string(),
            product_name: format!("Processor {}", sku),
            category: "Desktop".to_string(),
            family: "Core i7".to_string(),
            spec_url: format!(
                "https://www.intel.com/products/sku/{}/specifications.html",
                sku
            ),
        }
    }

    #[test]
    fn insert_products_ignores_duplicate_skus() {
        let conn = test_conn();
        let inserted = insert_products(&conn, &[product("100"), product("100")]).unwrap();
        assert_eq!(inserted, 1);
        // Re-discovery keeps the first mapping
        let mut relisted = product("100");
        relisted.family = "Core i9".to_string();
        assert_eq!(insert_products(&conn, &[relisted]).unwrap(), 0);
    }

    #[test]
    fn done_products_are_not_pending() {
        let conn = test_conn();
        insert_products(&conn, &[product("100"), product("200")]).unwrap();
        mark_done(&conn, "100").unwrap();

        assert!(is_done(&conn, "100").unwrap());
        assert!(!is_done(&conn, "200").unwrap());

        let pending = fetch_pending(&conn, None, false, None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sku, "200");
    }

    #[test]
    fn failed_products_retry_only_on_request() {
        let conn = test_conn();
        insert_products(&conn, &[product("100"), product("200")]).unwrap();
        mark_failed(&conn, "100", "timeout").unwrap();

        let pending = fetch_pending(&conn, None, false, None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sku, "200");

        let with_retry = fetch_pending(&conn, None, true, None).unwrap();
        assert_eq!(with_retry.len(), 2);
    }

    #[test]
    fn category_filter_and_limit() {
        let conn = test_conn();
        let mut server = product("300");
        server.category = "Server".to_string();
        insert_products(&conn, &[product("100"), product("200"), server]).unwrap();

        let desktop = fetch_pending(&conn, Some("Desktop"), false, None).unwrap();
        assert_eq!(desktop.len(), 2);

        let limited = fetch_pending(&conn, None, false, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].sku, "100");
    }

    #[test]
    fn reset_clears_progress_but_keeps_catalog() {
        let conn = test_conn();
        insert_products(&conn, &[product("100")]).unwrap();
        mark_done(&conn, "100").unwrap();
        assert!(fetch_pending(&conn, None, false, None).unwrap().is_empty());

        reset_progress(&conn).unwrap();
        assert!(!is_done(&conn, "100").unwrap());
        let pending = fetch_pending(&conn, None, false, None).unwrap();
        assert_eq!(pending.len(), 1);

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.products, 1);
        assert_eq!(stats.done, 0);
    }

    #[test]
    fn retry_overwrites_failure_record() {
        let conn = test_conn();
        insert_products(&conn, &[product("100")]).unwrap();
        mark_failed(&conn, "100", "http 503").unwrap();
        mark_done(&conn, "100").unwrap();

        assert!(is_done(&conn, "100").unwrap());
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.done, 1);
        assert_eq!(stats.failed, 0);
    }
}
