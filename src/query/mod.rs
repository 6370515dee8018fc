//! Query Engine (spec.md §4.6): turns a raw query into trigram and token
//! probes, merges candidate sets, re-scores by name, ranks, and
//! truncates.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::StorageError;
use crate::item::{Item, ItemId};
use crate::storage::IndexStore;
use crate::text;

const ABBREVIATION_SCORE: u32 = 600;
const TOKEN_HIT_BOOST: u32 = 100;

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct RankedItem {
    pub item: Item,
    pub score: u32,
}

/// Execute the full query pipeline against `store`.
pub fn search(
    store: &dyn IndexStore,
    config: &EngineConfig,
    query: &str,
    limit: usize,
) -> Result<Vec<RankedItem>, StorageError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let mut merged: HashMap<ItemId, RankedItem> = HashMap::new();

    if query.chars().count() >= config.min_trigram_length {
        probe_trigrams(store, config, query, &mut merged)?;
    }

    if config.enable_camelcase {
        probe_tokens(store, config, query, &mut merged)?;
    }

    probe_abbreviations(store, config, query, &mut merged)?;

    let mut ranked: Vec<RankedItem> = merged.into_values().collect();
    ranked.retain(|r| {
        if r.item.kind == crate::item::ItemKind::File {
            config.include_files
        } else {
            config.include_symbols
        }
    });
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.item.name.len().cmp(&b.item.name.len()))
    });
    ranked.truncate(limit.min(config.max_results));

    Ok(ranked)
}

fn merge_keep_max(merged: &mut HashMap<ItemId, RankedItem>, item: Item, score: u32) {
    merged
        .entry(item.id)
        .and_modify(|existing| {
            if score > existing.score {
                existing.score = score;
            }
        })
        .or_insert(RankedItem { item, score });
}

fn probe_trigrams(
    store: &dyn IndexStore,
    config: &EngineConfig,
    query: &str,
    merged: &mut HashMap<ItemId, RankedItem>,
) -> Result<(), StorageError> {
    let terms = text::trigram_set(query, config.case_sensitive);
    if terms.is_empty() {
        return Ok(());
    }

    let counts = store.search_trigrams(&terms)?;
    for item_id in counts.keys() {
        let Some(item) = store.get_item(*item_id)? else {
            continue;
        };
        let score = text::score(query, &item.name, config.case_sensitive);
        if score > 0 {
            merge_keep_max(merged, item, score);
        }
    }

    Ok(())
}

fn probe_tokens(
    store: &dyn IndexStore,
    config: &EngineConfig,
    query: &str,
    merged: &mut HashMap<ItemId, RankedItem>,
) -> Result<(), StorageError> {
    let terms: Vec<String> = text::tokens(query)
        .into_iter()
        .map(|(t, _)| {
            if config.case_sensitive {
                t
            } else {
                t.to_lowercase()
            }
        })
        .collect();
    if terms.is_empty() {
        return Ok(());
    }

    let counts = store.search_tokens(&terms)?;
    for item_id in counts.keys() {
        if merged.contains_key(item_id) {
            continue;
        }
        let Some(item) = store.get_item(*item_id)? else {
            continue;
        };
        let score = text::score(query, &item.name, config.case_sensitive);
        if score > 0 {
            merge_keep_max(merged, item, score + TOKEN_HIT_BOOST);
        }
    }

    Ok(())
}

fn probe_abbreviations(
    store: &dyn IndexStore,
    config: &EngineConfig,
    query: &str,
    merged: &mut HashMap<ItemId, RankedItem>,
) -> Result<(), StorageError> {
    for item in store.all_items()? {
        if merged.contains_key(&item.id) {
            continue;
        }
        if text::abbreviation_matches(query, &item.name, config.case_sensitive) {
            merge_keep_max(merged, item, ABBREVIATION_SCORE);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemKind, NewItem};
    use crate::storage::memory::MemoryStore;

    fn index_name(store: &mut MemoryStore, config: &EngineConfig, path: &str, name: &str) -> ItemId {
        let item = store
            .add_item(NewItem {
                path: path.to_string(),
                name: name.to_string(),
                kind: ItemKind::File,
                parent_id: None,
                metadata: None,
            })
            .unwrap();

        let trigram_postings: Vec<(String, ItemId, u32)> =
            text::trigrams(name, config.case_sensitive)
                .into_iter()
                .map(|(t, p)| (t, item.id, p as u32))
                .collect();
        store.add_trigrams(&trigram_postings).unwrap();

        let token_postings: Vec<(String, ItemId, u32)> = text::tokens(name)
            .into_iter()
            .map(|(t, p)| {
                let folded = if config.case_sensitive {
                    t
                } else {
                    t.to_lowercase()
                };
                (folded, item.id, p as u32)
            })
            .collect();
        store.add_tokens(&token_postings).unwrap();

        item.id
    }

    #[test]
    fn empty_query_returns_nothing() {
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let results = search(&store, &config, "   ", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn exact_and_prefix_outrank_fuzzy() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let config = EngineConfig::default();

        index_name(&mut store, &config, "src/config.rs", "config");
        index_name(&mut store, &config, "src/other.rs", "xonfig");

        let results = search(&store, &config, "config", 10).unwrap();
        assert_eq!(results[0].item.name, "config");
        assert_eq!(results[0].score, 1000);
    }

    #[test]
    fn token_hits_receive_boost_over_plain_score() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let config = EngineConfig::default();

        index_name(&mut store, &config, "src/getUserName.rs", "getUserName");

        let results = search(&store, &config, "getUserName", 10).unwrap();
        assert_eq!(results.len(), 1);
        // exact match (1000) already beats a token hit; verify it wasn't
        // double counted into something absurd.
        assert_eq!(results[0].score, 1000);
    }

    #[test]
    fn abbreviation_fallback_finds_camel_case_initials() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let config = EngineConfig::default();

        index_name(&mut store, &config, "src/getUserName.rs", "getUserName");

        let results = search(&store, &config, "gUN", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 600);
    }

    #[test]
    fn short_query_below_min_trigram_length_still_matches_via_tokens() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let config = EngineConfig::default();

        index_name(&mut store, &config, "src/get.rs", "get");

        let results = search(&store, &config, "ge", 10).unwrap();
        assert!(results.iter().any(|r| r.item.name == "get"));
    }

    #[test]
    fn results_are_sorted_by_score_then_shorter_name() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let config = EngineConfig::default();

        index_name(&mut store, &config, "a.rs", "getUser");
        index_name(&mut store, &config, "b.rs", "getUserExtended");

        let results = search(&store, &config, "getUser", 10).unwrap();
        assert_eq!(results[0].item.name, "getUser");
    }

    #[test]
    fn limit_truncates_result_set() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let config = EngineConfig::default();

        for i in 0..10 {
            index_name(&mut store, &config, &format!("f{i}.rs"), "search");
        }

        let results = search(&store, &config, "search", 3).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn kind_filter_is_applied_before_truncation() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let mut config = EngineConfig::default();
        config.include_symbols = false;

        // Three files and one symbol all share the "search" name; the
        // symbol would out-rank nothing but happens to land in the merged
        // set. With a limit of 3 every file must still appear in the
        // results — filtering by kind must happen before truncation, not
        // after.
        for i in 0..3 {
            index_name(&mut store, &config, &format!("f{i}.rs"), "search");
        }
        let symbol = store
            .add_item(NewItem {
                path: "f0.rs#search".to_string(),
                name: "search".to_string(),
                kind: ItemKind::Function,
                parent_id: None,
                metadata: None,
            })
            .unwrap();
        let trigram_postings: Vec<(String, ItemId, u32)> = text::trigrams("search", false)
            .into_iter()
            .map(|(t, p)| (t, symbol.id, p as u32))
            .collect();
        store.add_trigrams(&trigram_postings).unwrap();

        let results = search(&store, &config, "search", 3).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.item.kind == ItemKind::File));
    }

    #[test]
    fn shared_trigram_scenario_five_counts_distinct_terms() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        let config = EngineConfig::default();

        index_name(&mut store, &config, "a.rs", "getUser");
        index_name(&mut store, &config, "b.rs", "getName");

        let get_only = store.search_trigrams(&["get".to_string()]).unwrap();
        assert_eq!(get_only.len(), 2);

        let get_and_use = store
            .search_trigrams(&["get".to_string(), "use".to_string()])
            .unwrap();
        let user_id = store.get_item_by_path("a.rs").unwrap().unwrap().id;
        let name_id = store.get_item_by_path("b.rs").unwrap().unwrap().id;
        assert_eq!(get_and_use.get(&user_id), Some(&2));
        assert_eq!(get_and_use.get(&name_id), Some(&1));
    }
}
