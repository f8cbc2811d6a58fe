mod config;
mod crawler;
mod db;
mod error;
mod normalize;
mod parser;

use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::crawler::{Crawler, HttpFetcher, RawCrawlRecord};

#[derive(Parser)]
#[command(name = "tvboard_crawler", about = "Collect TV show episodes and video links from a web board")]
struct Cli {
    /// SQLite database path (overrides TVBOARD_DB_PATH)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and seed the channel list
    Init,
    /// Crawl the newest pages and store shows/episodes
    Run {
        /// Older pages to crawl besides the newest one
        #[arg(short, long, default_value = "0")]
        pages: u32,
        /// Max concurrent article fetches
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Crawl and normalize without storing; prints records as JSON
    Crawl {
        /// Older pages to crawl besides the newest one
        #[arg(short, long, default_value = "0")]
        pages: u32,
        /// Max concurrent article fetches
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Show row counts
    Stats,
    /// List stored shows
    Shows {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
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

    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let inserted = db::seed_channels(&conn)?;
            println!(
                "Database ready at {} ({} channels seeded)",
                settings.db_path, inserted
            );
            Ok(())
        }
        Commands::Run { pages, concurrency } => {
            if let Some(n) = concurrency {
                settings.concurrency = n;
            }
            settings.validate()?;

            let mut conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let channels = db::load_channels(&conn)?;
            if channels.is_empty() {
                println!("No channels seeded. Run 'init' first.");
                return Ok(());
            }

            // Phase 1: Crawl
            let t_crawl = Instant::now();
            let raw = crawl(&settings, pages).await?;
            println!(
                "Crawled {} articles in {:.1}s",
                raw.len(),
                t_crawl.elapsed().as_secs_f64()
            );

            // Phase 2: Normalize + store
            let records = normalize::normalize(&raw, &channels)?;
            let stats = db::store(&mut conn, &records).context("Failed to store episodes")?;
            println!(
                "Saved {} episodes ({} new shows), dropped {} unparseable titles.",
                stats.episodes,
                stats.shows_created,
                raw.len() - records.len()
            );
            Ok(())
        }
        Commands::Crawl { pages, concurrency } => {
            if let Some(n) = concurrency {
                settings.concurrency = n;
            }
            settings.validate()?;

            // Dry run: read channels if `init` has run, never touch the file
            let channels = match db::connect_read_only(&settings.db_path)? {
                Some(conn) => db::load_channels(&conn)?,
                None => Vec::new(),
            };
            if channels.is_empty() {
                println!(
                    "No channels seeded in {}. Run 'init' first.",
                    settings.db_path
                );
                return Ok(());
            }

            let raw = crawl(&settings, pages).await?;
            let records = normalize::normalize(&raw, &channels)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Channels: {}", s.channels);
            println!("Shows:    {}", s.shows);
            println!("Episodes: {}", s.episodes);
            Ok(())
        }
        Commands::Shows { json } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::list_shows(&conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("No shows stored.");
                return Ok(());
            }

            println!("{:>3} | {:<30} | {:<10} | {:>8}", "#", "Show", "Channel", "Episodes");
            println!("{}", "-".repeat(60));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<30} | {:<10} | {:>8}",
                    i + 1,
                    truncate(&r.title, 30),
                    r.channel.as_deref().unwrap_or("-"),
                    r.episodes
                );
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

/// One crawler per run; its HTTP session is released when it goes out of scope.
async fn crawl(settings: &Settings, pages: u32) -> anyhow::Result<Vec<RawCrawlRecord>> {
    let fetcher = HttpFetcher::new(&settings.user_agent)?;
    let crawler = Crawler::new(fetcher, settings)?;
    let records = crawler
        .crawl(pages)
        .await
        .with_context(|| format!("Crawl of {} failed", settings.index_url()))?;
    Ok(records)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
