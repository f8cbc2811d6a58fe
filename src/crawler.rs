use std::sync::Arc;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use scraper::Html;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::CrawlError;
use crate::parser::{self, ArticleRef, ListingExtractor};

/// Transport seam: GET a URL, hand back the body of a 2xx response.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, CrawlError>;
}

/// One shared reqwest client, the single HTTP session of a run.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> Result<String, CrawlError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Transport {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// A fetched article before its title is interpreted.
#[derive(Debug, Clone)]
pub struct RawCrawlRecord {
    pub title: String,
    pub article_url: String,
    pub source_links: Vec<String>,
}

pub struct Crawler<F> {
    fetcher: Arc<F>,
    settings: Settings,
    listing: ListingExtractor,
}

impl<F: Fetch + 'static> Crawler<F> {
    pub fn new(fetcher: F, settings: &Settings) -> Result<Self, CrawlError> {
        let listing = ListingExtractor::new(&settings.site_root, &settings.subject_tag)
            .map_err(|e| CrawlError::Parse(format!("invalid subject tag: {}", e)))?;
        Ok(Crawler {
            fetcher: Arc::new(fetcher),
            settings: settings.clone(),
            listing,
        })
    }

    /// Current newest page of the board.
    pub async fn resolve_last_page(&self) -> Result<u32, CrawlError> {
        let url = self.settings.index_url();
        debug!("Fetching board index: {}", url);
        let body = self.fetcher.get(&url).await?;
        parser::last_page(&Html::parse_document(&body))
    }

    /// Crawl the newest page and `page_range` older ones, newest first.
    ///
    /// Pages run one after another; articles within a page are fetched
    /// concurrently and land in completion order. Any failed fetch aborts the
    /// whole crawl.
    pub async fn crawl(&self, page_range: u32) -> Result<Vec<RawCrawlRecord>, CrawlError> {
        let last = self.resolve_last_page().await?;
        let pages = target_pages(last, page_range)?;
        info!("Last page is {}, crawling {} page(s)", last, pages.len());

        let mut records = Vec::new();
        for page in pages {
            let articles = self.fetch_listing(page).await?;
            debug!(page, matched = articles.len(), "Listing parsed");
            let fetched = self.fetch_articles(articles).await?;
            records.extend(fetched);
        }

        info!("Crawled {} articles", records.len());
        Ok(records)
    }

    async fn fetch_listing(&self, page: u32) -> Result<Vec<ArticleRef>, CrawlError> {
        let body = self.fetcher.get(&self.settings.page_url(page)).await?;
        let articles = self.listing.extract(&Html::parse_document(&body));
        Ok(articles)
    }

    async fn fetch_articles(
        &self,
        articles: Vec<ArticleRef>,
    ) -> Result<Vec<RawCrawlRecord>, CrawlError> {
        let total = articles.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let limit = self.settings.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let (tx, mut rx) = mpsc::channel::<Result<RawCrawlRecord, CrawlError>>(limit * 2);

        let mut handles = Vec::with_capacity(total);
        for article in articles {
            let fetcher = Arc::clone(&self.fetcher);
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };
                let result = fetch_article(fetcher.as_ref(), article).await;
                let _ = tx.send(result).await;
            }));
        }

        // Drop our copy of tx so rx closes when all spawned tasks finish
        drop(tx);

        let pb = progress_bar(total);
        let mut records = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            match result {
                Ok(record) => {
                    records.push(record);
                    pb.inc(1);
                }
                Err(e) => {
                    for handle in &handles {
                        handle.abort();
                    }
                    pb.abandon();
                    return Err(e);
                }
            }
        }
        pb.finish_and_clear();

        if records.len() < total {
            return Err(CrawlError::Task(format!(
                "{} of {} article fetches never reported back",
                total - records.len(),
                total
            )));
        }
        Ok(records)
    }
}

async fn fetch_article<F: Fetch + ?Sized>(
    fetcher: &F,
    article: ArticleRef,
) -> Result<RawCrawlRecord, CrawlError> {
    let body = fetcher.get(&article.url).await?;
    let source_links = parser::source_links(&Html::parse_document(&body));
    Ok(RawCrawlRecord {
        title: article.title,
        article_url: article.url,
        source_links,
    })
}

/// `[last, last-1, ..., last-range]`. Fails when the range reaches below page 1.
pub fn target_pages(last: u32, page_range: u32) -> Result<Vec<u32>, CrawlError> {
    if page_range >= last {
        return Err(CrawlError::PageRange { last, page_range });
    }
    Ok((0..=page_range).map(|offset| last - offset).collect())
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} articles")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}
