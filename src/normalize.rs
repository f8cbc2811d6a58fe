use std::collections::HashMap;

use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::crawler::RawCrawlRecord;
use crate::db::Channel;
use crate::error::NormalizeError;

// Token slots after the channel is cut out: [tag, date, (channel), show, episode]
const DATE_IDX: usize = 1;
const SHOW_IDX: usize = 3;
const EPISODE_IDX: usize = 4;
const MIN_TOKENS: usize = EPISODE_IDX + 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    pub show_title: String,
    pub episode_label: String,
    pub publish_date: String,
    pub source_link_csv: String,
    pub description: String,
    pub channel_name: String,
    pub channel_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleFields {
    pub publish_date: String,
    pub show_title: String,
    pub episode_label: String,
}

/// Cut the first occurrence of `channel` out of `title` (the leftmost match,
/// so a show name containing the channel stays whole), upper-case, split on
/// single spaces and read the fields by position.
pub fn parse_title(title: &str, channel: &str) -> Result<TitleFields, NormalizeError> {
    let stripped = title.replacen(channel, "", 1).to_uppercase();
    let tokens: Vec<&str> = stripped.split(' ').collect();
    if tokens.len() < MIN_TOKENS {
        return Err(NormalizeError::MalformedTitle {
            title: title.to_string(),
            tokens: tokens.len(),
        });
    }
    Ok(TitleFields {
        publish_date: tokens[DATE_IDX].to_string(),
        show_title: tokens[SHOW_IDX].to_string(),
        episode_label: tokens[EPISODE_IDX].to_string(),
    })
}

/// Channel matcher compiled once per run from the seeded channel table.
pub struct Normalizer {
    channel_re: Option<Regex>,
    channel_ids: HashMap<String, i64>,
}

impl Normalizer {
    pub fn new(channels: &[Channel]) -> Result<Self, regex::Error> {
        let mut names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
        // Longest first so "CHANNEL S" wins over any shorter name at the same spot
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        let channel_re = if names.is_empty() {
            None
        } else {
            let alternation = names
                .iter()
                .map(|n| regex::escape(n))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&alternation)?)
        };
        let channel_ids = channels.iter().map(|c| (c.name.clone(), c.id)).collect();
        Ok(Normalizer {
            channel_re,
            channel_ids,
        })
    }

    pub fn normalize_one(&self, raw: &RawCrawlRecord) -> Result<NormalizedRecord, NormalizeError> {
        let channel = self
            .channel_re
            .as_ref()
            .and_then(|re| re.find(&raw.title))
            .map(|m| m.as_str())
            .ok_or_else(|| NormalizeError::UnmatchedTitle(raw.title.clone()))?;

        let fields = parse_title(&raw.title, channel)?;

        Ok(NormalizedRecord {
            show_title: fields.show_title,
            episode_label: fields.episode_label,
            publish_date: fields.publish_date,
            source_link_csv: raw.source_links.join(","),
            description: String::new(),
            channel_name: channel.to_string(),
            channel_id: self.channel_ids.get(channel).copied(),
        })
    }
}

/// Turn crawled articles into show/episode records. Titles without a known
/// channel or with too few fields are logged and dropped. Output order is not
/// guaranteed to follow input order.
pub fn normalize(
    records: &[RawCrawlRecord],
    channels: &[Channel],
) -> Result<Vec<NormalizedRecord>, regex::Error> {
    let normalizer = Normalizer::new(channels)?;
    let normalized: Vec<NormalizedRecord> = records
        .par_iter()
        .filter_map(|raw| match normalizer.normalize_one(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Dropping {}: {}", raw.article_url, e);
                None
            }
        })
        .collect();
    info!(
        "Normalized {} of {} articles",
        normalized.len(),
        records.len()
    );
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> Vec<Channel> {
        ["MBC", "SBS", "CHANNEL S", "TV ING"]
            .iter()
            .enumerate()
            .map(|(i, name)| Channel {
                id: i as i64 + 1,
                name: name.to_string(),
            })
            .collect()
    }

    fn raw(title: &str, links: &[&str]) -> RawCrawlRecord {
        RawCrawlRecord {
            title: title.to_string(),
            article_url: "https://www.ptt.cc/bbs/KoreaDrama/M.1.A.html".to_string(),
            source_links: links.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn round_trip_title() {
        let out = normalize(
            &[raw(
                "[影音] 2021/05/01 MBC 가요 1회",
                &["https://youtu.be/a", "https://vimeo.com/b"],
            )],
            &channels(),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![NormalizedRecord {
                show_title: "가요".to_string(),
                episode_label: "1회".to_string(),
                publish_date: "2021/05/01".to_string(),
                source_link_csv: "https://youtu.be/a,https://vimeo.com/b".to_string(),
                description: String::new(),
                channel_name: "MBC".to_string(),
                channel_id: Some(1),
            }]
        );
    }

    #[test]
    fn remainder_is_upper_cased() {
        let n = Normalizer::new(&channels()).unwrap();
        let rec = n
            .normalize_one(&raw("[影音] 2021/05/02 SBS runningman ep550", &[]))
            .unwrap();
        assert_eq!(rec.show_title, "RUNNINGMAN");
        assert_eq!(rec.episode_label, "EP550");
        assert_eq!(rec.channel_id, Some(2));
    }

    #[test]
    fn multi_word_channel() {
        let n = Normalizer::new(&channels()).unwrap();
        let rec = n
            .normalize_one(&raw("[影音] 2021/06/01 CHANNEL S 먹고보자 3회", &[]))
            .unwrap();
        assert_eq!(rec.channel_name, "CHANNEL S");
        assert_eq!(rec.show_title, "먹고보자");
        assert_eq!(rec.episode_label, "3회");
    }

    #[test]
    fn only_matched_channel_is_cut() {
        let n = Normalizer::new(&channels()).unwrap();
        let rec = n
            .normalize_one(&raw("[影音] 2021/05/01 MBC MBC스페셜 10회", &[]))
            .unwrap();
        assert_eq!(rec.channel_name, "MBC");
        assert_eq!(rec.show_title, "MBC스페셜");
        assert_eq!(rec.episode_label, "10회");
    }

    #[test]
    fn channel_match_is_case_sensitive() {
        let n = Normalizer::new(&channels()).unwrap();
        let err = n
            .normalize_one(&raw("[影音] 2021/05/01 mbc 가요 1회", &[]))
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnmatchedTitle(_)));
    }

    #[test]
    fn unmatched_and_short_titles_dropped() {
        let out = normalize(
            &[
                raw("[影音] 2021/05/01 OCN 가요 1회", &[]),
                raw("[影音] MBC 가요", &[]),
                raw("[影音] 2021/05/01 MBC 가요 2회", &[]),
            ],
            &channels(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].episode_label, "2회");
    }

    #[test]
    fn short_title_is_typed_error() {
        assert_eq!(
            parse_title("[影音] MBC 가요", "MBC"),
            Err(NormalizeError::MalformedTitle {
                title: "[影音] MBC 가요".to_string(),
                tokens: 3,
            })
        );
    }

    #[test]
    fn no_channels_drops_everything() {
        let out = normalize(&[raw("[影音] 2021/05/01 MBC 가요 1회", &[])], &[]).unwrap();
        assert!(out.is_empty());
    }
}
