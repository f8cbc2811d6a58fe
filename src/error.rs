use thiserror::Error;

/// Failures while discovering pages or fetching articles. All of them abort the crawl.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("GET {url} returned HTTP {status}")]
    Transport { url: String, status: u16 },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("board has {last} pages, cannot crawl {page_range} pages back from the newest")]
    PageRange { last: u32, page_range: u32 },
    #[error("Unexpected markup: {0}")]
    Parse(String),
    #[error("Fetch worker failed: {0}")]
    Task(String),
}

/// Reasons a crawled title cannot become a show/episode record.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no known channel in title {0:?}")]
    UnmatchedTitle(String),
    #[error("title {title:?} has {tokens} tokens, need at least 5")]
    MalformedTitle { title: String, tokens: usize },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("channel {0:?} is not seeded")]
    UnknownChannel(String),
}
