mod db;
mod export;
mod llm;
mod parser;
mod scraper;
mod wide;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ark_scraper",
    about = "Intel ARK processor spec scraper and format converters"
)]
struct Cli {
    /// SQLite state DB path
    #[arg(long, global = true, default_value = db::DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the catalog and populate the product queue
    Discover,
    /// Scrape pending product pages into the long CSV
    Scrape {
        /// Max products to scrape (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Only scrape products in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Also retry products previously marked failed
        #[arg(long)]
        retry_errors: bool,
        /// Long-format output CSV path
        #[arg(long, default_value = export::DEFAULT_LONG_CSV)]
        out: PathBuf,
    },
    /// Discover + scrape in one pass
    Run {
        /// Max products to scrape
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Only scrape products in this category
        #[arg(short, long)]
        category: Option<String>,
        /// Also retry products previously marked failed
        #[arg(long)]
        retry_errors: bool,
        /// Long-format output CSV path
        #[arg(long, default_value = export::DEFAULT_LONG_CSV)]
        out: PathBuf,
    },
    /// Pivot the long CSV into one row per SKU
    Wide {
        /// Input long-format CSV
        #[arg(short, long, default_value = export::DEFAULT_LONG_CSV)]
        input: PathBuf,
        /// Output wide-format CSV
        #[arg(short, long, default_value = wide::DEFAULT_WIDE_CSV)]
        output: PathBuf,
    },
    /// Render the long CSV into LLM-friendly formats
    Llm {
        /// Input long-format CSV
        #[arg(short, long, default_value = export::DEFAULT_LONG_CSV)]
        input: PathBuf,
        /// Output base path (extension added per format)
        #[arg(short, long, default_value = llm::DEFAULT_LLM_BASE)]
        output: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value = "all")]
        format: llm::LlmFormat,
    },
    /// Show scrape progress counters
    Stats,
    /// Clear scrape progress (discovered catalog is kept)
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Discover => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let fetcher = scraper::Fetcher::new()?;
            let stats = scraper::discover(&conn, &fetcher).await?;
            println!(
                "Discovered {} categories, {} series, {} new products.",
                stats.categories, stats.series, stats.products
            );
            Ok(())
        }
        Commands::Scrape {
            limit,
            category,
            retry_errors,
            out,
        } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            scrape(&conn, limit, category.as_deref(), retry_errors, &out).await
        }
        Commands::Run {
            limit,
            category,
            retry_errors,
            out,
        } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let fetcher = scraper::Fetcher::new()?;
            let d = scraper::discover(&conn, &fetcher).await?;
            println!(
                "Discovered {} categories, {} series, {} new products.",
                d.categories, d.series, d.products
            );
            scrape(&conn, limit, category.as_deref(), retry_errors, &out).await
        }
        Commands::Wide { input, output } => {
            let summary = wide::convert(&input, &output)?;
            println!(
                "Wrote {} products with {} spec columns to {}",
                summary.products,
                summary.spec_columns,
                output.display()
            );
            Ok(())
        }
        Commands::Llm {
            input,
            output,
            format,
        } => llm::run(&input, &output, format),
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Series:   {}", s.series);
            println!("Products: {}", s.products);
            println!("Done:     {}", s.done);
            println!("Failed:   {}", s.failed);
            println!("Pending:  {}", s.pending);
            Ok(())
        }
        Commands::Reset => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let cleared = db::reset_progress(&conn)?;
            println!("Cleared {} progress records.", cleared);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn scrape(
    conn: &rusqlite::Connection,
    limit: Option<usize>,
    category: Option<&str>,
    retry_errors: bool,
    out: &std::path::Path,
) -> anyhow::Result<()> {
    let pending = db::fetch_pending(conn, category, retry_errors, limit)?;
    if pending.is_empty() {
        println!("No pending products. Run 'discover' first, or all products are scraped.");
        return Ok(());
    }

    let done_before = db::get_stats(conn)?.done;
    println!(
        "Scraping {} products (already done: {})...",
        pending.len(),
        done_before
    );

    let fetcher = scraper::Fetcher::new()?;
    let stats = scraper::scrape_products(conn, &fetcher, out, &pending).await?;
    println!(
        "Done: {} scraped ({} ok, {} errors), {} spec rows appended to {}.",
        stats.total,
        stats.ok,
        stats.errors,
        stats.rows,
        out.display()
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
