use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

static ENTRY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.r-ent").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// One listing row that carried the subject tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub title: String,
    pub url: String,
}

/// Picks tagged articles out of a board page.
pub struct ListingExtractor {
    site_root: String,
    subject: Regex,
}

impl ListingExtractor {
    pub fn new(site_root: &str, subject_tag: &str) -> Result<Self, regex::Error> {
        Ok(ListingExtractor {
            site_root: site_root.trim_end_matches('/').to_string(),
            subject: Regex::new(&regex::escape(subject_tag))?,
        })
    }

    /// Tagged rows in document order. Rows without a link (deleted posts) or
    /// without the tag are skipped.
    pub fn extract(&self, doc: &Html) -> Vec<ArticleRef> {
        doc.select(&ENTRY_SEL)
            .filter_map(|entry| {
                let anchor = entry.select(&ANCHOR_SEL).next()?;
                let title = anchor.text().collect::<String>().trim().to_string();
                if !self.subject.is_match(&title) {
                    return None;
                }
                let href = anchor.value().attr("href")?;
                Some(ArticleRef {
                    title,
                    url: format!("{}{}", self.site_root, href),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, href: &str) -> String {
        format!(
            r#"<div class="r-ent">
                <div class="nrec"></div>
                <div class="title"><a href="{}">{}</a></div>
                <div class="meta"><div class="author">someone</div></div>
            </div>"#,
            href, title
        )
    }

    fn extractor() -> ListingExtractor {
        ListingExtractor::new("https://www.ptt.cc", "[影音]").unwrap()
    }

    #[test]
    fn keeps_tagged_rows_in_order() {
        let html = [
            entry("[影音] 2021/05/01 MBC 가요 1회", "/bbs/KoreaDrama/M.1.A.html"),
            entry("[閒聊] 今天的收視率", "/bbs/KoreaDrama/M.2.A.html"),
            entry("Re: [影音] 2021/05/02 SBS 런닝맨 550회", "/bbs/KoreaDrama/M.3.A.html"),
        ]
        .concat();
        let refs = extractor().extract(&Html::parse_document(&html));

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].title, "[影音] 2021/05/01 MBC 가요 1회");
        assert_eq!(refs[0].url, "https://www.ptt.cc/bbs/KoreaDrama/M.1.A.html");
        assert_eq!(refs[1].url, "https://www.ptt.cc/bbs/KoreaDrama/M.3.A.html");
    }

    #[test]
    fn tag_is_literal_not_a_character_class() {
        // "[影音]" must not match a lone 影
        let html = entry("影 2021/05/01 MBC 가요 1회", "/bbs/KoreaDrama/M.1.A.html");
        assert!(extractor().extract(&Html::parse_document(&html)).is_empty());
    }

    #[test]
    fn deleted_rows_skipped() {
        let html = r#"<div class="r-ent"><div class="title">(本文已被刪除) [someone]</div></div>"#;
        assert!(extractor().extract(&Html::parse_document(html)).is_empty());
    }

    #[test]
    fn empty_page() {
        assert!(extractor().extract(&Html::parse_document("")).is_empty());
    }
}
