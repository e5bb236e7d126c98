//! Crawl statistics
//!
//! Counters collected while a job runs, and a formatted printout for the
//! end of the job.

use crate::llm::UsageReport;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Number of seed URLs the job started from
    pub seeds_total: usize,

    /// Seeds whose subtree produced at least one resource
    pub seeds_with_resources: usize,

    /// Pages fetched successfully, secondary pages included
    pub pages_fetched: usize,

    /// Pages whose fetch failed or returned no text
    pub fetch_failures: usize,

    /// Secondary crawls that were triggered
    pub secondary_crawls: usize,

    /// Checkpoints that could not be written
    pub checkpoint_failures: usize,

    /// Rows in the final export
    pub resources_total: usize,

    /// Providers in the aggregate
    pub providers_total: usize,

    /// Buckets that held more than one observation of a resource
    pub duplicate_buckets: usize,

    /// LLM call counters at the end of the job
    pub llm_usage: Option<UsageReport>,
}

impl CrawlStatistics {
    /// Adds another set of page counters into this one
    pub fn absorb_pages(&mut self, other: &CrawlStatistics) {
        self.pages_fetched += other.pages_fetched;
        self.fetch_failures += other.fetch_failures;
        self.secondary_crawls += other.secondary_crawls;
        self.checkpoint_failures += other.checkpoint_failures;
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Seed URLs: {}", stats.seeds_total);
    println!("  Seeds with resources: {}", stats.seeds_with_resources);
    println!("  Pages fetched: {}", stats.pages_fetched);
    println!("  Fetch failures: {}", stats.fetch_failures);
    println!("  Secondary crawls: {}", stats.secondary_crawls);
    println!();

    println!("Results:");
    println!("  Resources exported: {}", stats.resources_total);
    println!("  Providers: {}", stats.providers_total);
    println!("  Duplicate buckets merged: {}", stats.duplicate_buckets);
    if stats.checkpoint_failures > 0 {
        println!("  Checkpoint write failures: {}", stats.checkpoint_failures);
    }
    println!();

    if let Some(usage) = &stats.llm_usage {
        print!("{}", usage);
        println!();
    }

    let attempted = stats.pages_fetched + stats.fetch_failures;
    let success_rate = if attempted > 0 {
        (stats.pages_fetched as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages fetched)",
        success_rate, stats.pages_fetched, attempted
    );
}
