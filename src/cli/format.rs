//! Human-readable rendering of search results and index stats.

use crate::item::Stats;
use crate::query::RankedItem;

pub fn print_results(results: &[RankedItem]) {
    if results.is_empty() {
        println!("no matches");
        return;
    }

    for result in results {
        println!(
            "{:>5}  {:<8} {}",
            result.score,
            result.item.kind.as_str(),
            result.item.path
        );
    }
}

pub fn print_stats(stats: &Stats) {
    println!("items            : {}", stats.items);
    println!("distinct trigrams: {}", stats.distinct_trigrams);
    println!("distinct tokens  : {}", stats.distinct_tokens);
}
