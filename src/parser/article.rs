use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// Video hosts whose links are kept as episode sources.
pub const PLATFORMS: [&str; 5] = [
    "youtube.com",
    "youtu.be",
    "dailymotion.com",
    "vimeo.com",
    "tv.naver.com",
];

static PLATFORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = PLATFORMS
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).unwrap()
});

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Every platform link in the article, document order, duplicates kept.
pub fn source_links(doc: &Html) -> Vec<String> {
    doc.select(&LINK_SEL)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| PLATFORM_RE.is_match(href))
        .map(str::to_string)
        .collect()
}
