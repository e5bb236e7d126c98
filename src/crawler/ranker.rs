//! Secondary-link ranking
//!
//! Wraps the ranking LLM call and cleans up what it returns: links are made
//! absolute, non-web and binary-document links are dropped, and the list is
//! capped.

use std::collections::HashSet;

use url::Url;

use crate::crawler::parser::resolve_link;
use crate::llm::Extractor;
use crate::url::visit_key;

/// File extensions that never lead to an HTML page worth extracting
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "webp", "svg", "doc", "docx", "xls", "xlsx", "ppt",
    "pptx", "zip", "mp3", "mp4", "mov",
];

/// Orders a page's outbound links by how likely they lead to resource detail
#[derive(Clone)]
pub struct LinkRanker {
    extractor: Extractor,
    max_links: usize,
}

impl LinkRanker {
    pub fn new(extractor: Extractor, max_links: usize) -> Self {
        Self {
            extractor,
            max_links,
        }
    }

    /// Returns up to `max_links` absolute URLs, most promising first
    ///
    /// Empty content and LLM failures both yield an empty list.
    pub async fn rank(&self, content: &str, page_url: &str) -> Vec<String> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        match self.extractor.rank_links(content).await {
            Ok(raw) => {
                let ranked = filter_ranked_links(raw, page_url, self.max_links);
                if ranked.is_empty() {
                    tracing::warn!("Ranker returned no usable links for {}", page_url);
                } else {
                    tracing::info!("Secondary crawl candidates for {}: {:?}", page_url, ranked);
                }
                ranked
            }
            Err(e) => {
                tracing::error!("Error ranking pages for secondary crawl of {}: {}", page_url, e);
                Vec::new()
            }
        }
    }
}

/// Resolves, filters, deduplicates and caps a raw ranked list
///
/// Links pointing back at `page_url` itself are dropped.
pub fn filter_ranked_links(raw: Vec<String>, page_url: &str, max_links: usize) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(visit_key(page_url));

    raw.into_iter()
        .filter_map(|link| match &base {
            Some(base) => resolve_link(&link, base),
            None => Url::parse(link.trim())
                .ok()
                .filter(|u| u.scheme() == "http" || u.scheme() == "https")
                .map(|u| u.to_string()),
        })
        .filter(|link| !is_binary_document(link))
        .filter(|link| seen.insert(visit_key(link)))
        .take(max_links)
        .collect()
}

fn is_binary_document(link: &str) -> bool {
    let Ok(url) = Url::parse(link) else {
        return false;
    };
    url.path()
        .rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://example.org/services";

    fn links(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_relative_links_are_resolved() {
        let ranked = filter_ranked_links(links(&["/programs", "grants"]), PAGE, 5);
        assert_eq!(
            ranked,
            vec!["https://example.org/programs", "https://example.org/grants"]
        );
    }

    #[test]
    fn test_documents_and_non_web_links_dropped() {
        let ranked = filter_ranked_links(
            links(&[
                "https://example.org/brochure.PDF",
                "mailto:help@example.org",
                "https://example.org/photo.jpg",
                "https://example.org/apply",
            ]),
            PAGE,
            5,
        );
        assert_eq!(ranked, vec!["https://example.org/apply"]);
    }

    #[test]
    fn test_duplicates_and_self_links_dropped() {
        let ranked = filter_ranked_links(
            links(&[
                "https://example.org/services/",
                "https://example.org/contact",
                "https://example.org/contact#form",
            ]),
            PAGE,
            5,
        );
        assert_eq!(ranked, vec!["https://example.org/contact"]);
    }

    #[test]
    fn test_cap_applies_after_filtering() {
        let raw: Vec<String> = (0..8).map(|i| format!("https://example.org/p{}", i)).collect();
        assert_eq!(filter_ranked_links(raw, PAGE, 5).len(), 5);
    }
}
