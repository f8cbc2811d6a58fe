use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::CrawlError;

static PAGING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.btn-group-paging").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Newest page number of the board, read from the index page's paging buttons.
///
/// Buttons are `[oldest, ‹ previous, next ›, newest]`. The index itself has no
/// number in its URL, so the "previous" link (`index{N-1}.html`) is the only
/// place the current number shows up; the result is its digits plus one.
pub fn last_page(doc: &Html) -> Result<u32, CrawlError> {
    let paging = doc
        .select(&PAGING_SEL)
        .next()
        .ok_or_else(|| CrawlError::Parse("pagination control not found".into()))?;

    let href = paging
        .select(&ANCHOR_SEL)
        .nth(1)
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| CrawlError::Parse("previous-page link not found".into()))?;

    let digits = DIGITS_RE
        .find(href)
        .ok_or_else(|| CrawlError::Parse(format!("no page number in {:?}", href)))?;

    let previous: u32 = digits
        .as_str()
        .parse()
        .map_err(|_| CrawlError::Parse(format!("page number out of range in {:?}", href)))?;

    previous
        .checked_add(1)
        .ok_or_else(|| CrawlError::Parse(format!("page number out of range in {:?}", href)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paging(prev_href: &str) -> Html {
        Html::parse_document(&format!(
            r#"<div class="btn-group btn-group-paging">
                <a class="btn wide" href="/bbs/KoreaDrama/index1.html">最舊</a>
                <a class="btn wide" href="{}">‹ 上頁</a>
                <a class="btn wide disabled">下頁 ›</a>
                <a class="btn wide" href="/bbs/KoreaDrama/index.html">最新</a>
            </div>"#,
            prev_href
        ))
    }

    #[test]
    fn previous_link_plus_one() {
        let doc = paging("/bbs/KoreaDrama/index3119.html");
        assert_eq!(last_page(&doc).unwrap(), 3120);
    }

    #[test]
    fn largest_page_number_does_not_overflow() {
        let doc = paging("/bbs/KoreaDrama/index4294967295.html");
        assert!(matches!(last_page(&doc), Err(CrawlError::Parse(_))));
        let doc = paging("/bbs/KoreaDrama/index4294967294.html");
        assert_eq!(last_page(&doc).unwrap(), u32::MAX);
    }

    #[test]
    fn first_digit_run_wins() {
        let doc = paging("/bbs/KoreaDrama/index41.html?from=7");
        assert_eq!(last_page(&doc).unwrap(), 42);
    }

    #[test]
    fn missing_control() {
        let doc = Html::parse_document("<div class=\"r-ent\"></div>");
        assert!(matches!(last_page(&doc), Err(CrawlError::Parse(_))));
    }

    #[test]
    fn missing_second_anchor() {
        let doc = Html::parse_document(
            r#"<div class="btn-group-paging"><a href="/bbs/B/index1.html">最舊</a></div>"#,
        );
        assert!(matches!(last_page(&doc), Err(CrawlError::Parse(_))));
    }

    #[test]
    fn no_digits() {
        let doc = paging("/bbs/KoreaDrama/index.html");
        assert!(matches!(last_page(&doc), Err(CrawlError::Parse(_))));
    }
}
