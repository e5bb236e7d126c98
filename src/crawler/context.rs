use std::collections::HashSet;

use crate::output::CrawlStatistics;
use crate::url::visit_key;

/// Mutable state shared by every page processed within one traversal
///
/// Owned by the crawl driver and passed by `&mut` through each recursive
/// call, so sibling branches see each other's visits. URLs are stored by
/// their [`visit_key`]; resource identifiers are stored verbatim.
#[derive(Debug, Default)]
pub struct TraversalContext {
    crawled_urls: HashSet<String>,
    seen_identifiers: HashSet<String>,
    /// Page-level counters for this traversal
    pub stats: CrawlStatistics,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_crawled(&self, url: &str) -> bool {
        self.crawled_urls.contains(&visit_key(url))
    }

    /// Records a URL as crawled; returns false if it already was
    pub fn mark_crawled(&mut self, url: &str) -> bool {
        self.crawled_urls.insert(visit_key(url))
    }

    pub fn crawled_urls(&self) -> &HashSet<String> {
        &self.crawled_urls
    }

    pub fn has_seen(&self, identifier: &str) -> bool {
        self.seen_identifiers.contains(identifier)
    }

    /// Admits an identifier to the flat output; returns false if it was already admitted
    pub fn admit(&mut self, identifier: &str) -> bool {
        self.seen_identifiers.insert(identifier.to_string())
    }

    pub fn seen_identifiers(&self) -> &HashSet<String> {
        &self.seen_identifiers
    }

    pub fn seen_identifiers_mut(&mut self) -> &mut HashSet<String> {
        &mut self.seen_identifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_urls_share_a_visit() {
        let mut ctx = TraversalContext::new();
        assert!(ctx.mark_crawled("https://example.org/groups/"));
        assert!(ctx.is_crawled("https://example.org/groups#tuesday"));
        assert!(!ctx.mark_crawled("https://EXAMPLE.org/groups"));
        assert_eq!(ctx.crawled_urls().len(), 1);
    }

    #[test]
    fn test_identifiers_are_case_sensitive() {
        let mut ctx = TraversalContext::new();
        assert!(ctx.admit("Memory Cafe"));
        assert!(!ctx.admit("Memory Cafe"));
        assert!(ctx.admit("memory cafe"));
        assert!(ctx.has_seen("Memory Cafe"));
    }
}
