//! Demo runners paging through an in-memory store.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::paging::{ConcatQueriesPager, LoadState, Pager, PagingSource, QueryPager};
use crate::store::{MemoryQuery, MemoryStore, OrderDirection};

/// How long to wait for a mutation to invalidate the loaded pages.
const INVALIDATION_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct Item {
    rank: u64,
    title: String,
}

fn seed(store: &MemoryStore, collection: &str, prefix: &str, count: usize) {
    for rank in 1..=count {
        store.set(
            collection,
            format!("{prefix}-{rank:04}"),
            json!({ "rank": rank, "title": format!("{prefix} #{rank}") }),
        );
    }
}

fn ranked(store: &MemoryStore, collection: &str) -> MemoryQuery {
    store
        .collection(collection)
        .order_by("rank", OrderDirection::Ascending)
}

fn print_pages<S>(pager: &Pager<S>)
where
    S: PagingSource<Value = Item>,
{
    for (index, page) in pager.pages().enumerate() {
        let titles: Vec<String> = page
            .data
            .iter()
            .map(|item| format!("{} ({})", item.title, item.rank))
            .collect();
        println!(
            "page {:>3}: {:?} prev={} next={}",
            index + 1,
            titles,
            page.prev_key.is_some(),
            page.next_key.is_some()
        );
    }
}

fn print_summary<S: PagingSource>(pager: &Pager<S>) {
    let items = pager.items().count();
    println!("{} item(s) in {} page(s)", items, pager.pages().count());
}

/// Page through one ordered collection, optionally mutating it afterwards.
pub async fn run_single(config: &Config, mutate: bool) -> Result<()> {
    let collection = config.demo.collection.clone();
    let store = MemoryStore::new().with_double_delivery(config.demo.double_delivery);
    seed(&store, &collection, "item", config.demo.documents);

    let query = ranked(&store, &collection);
    let settle = config.settle_policy();
    let mut pager = Pager::new(
        move || {
            let source = QueryPager::<_, Item>::for_type(query.clone());
            Ok(source.with_settle_policy(settle))
        },
        config.paging.page_size,
    )?;

    let state = pager.load_all().await?;
    if state == LoadState::Invalidated {
        warn!(
            "Pages were invalidated while loading; raise the settle emissions above {}",
            settle.emissions()
        );
    }
    print_pages(&pager);
    print_summary(&pager);

    if mutate {
        store.set(
            &collection,
            "item-0000",
            json!({ "rank": 0, "title": "item #0" }),
        );
        let invalidation = pager.invalidation();
        match tokio::time::timeout(INVALIDATION_TIMEOUT, invalidation.invalidated()).await {
            Ok(()) => {
                info!("Loaded pages went stale, reloading");
                pager.load_all().await?;
                println!("-- after mutation --");
                print_pages(&pager);
                print_summary(&pager);
            }
            Err(_) => println!("mutation did not touch any loaded page"),
        }
    }
    Ok(())
}

/// Page through two collections presented as one sequence.
pub async fn run_concat(config: &Config, first: usize, second: usize) -> Result<()> {
    let store = MemoryStore::new().with_double_delivery(config.demo.double_delivery);
    seed(&store, "featured", "featured", first);
    seed(&store, "regular", "regular", second);

    let queries = vec![ranked(&store, "featured"), ranked(&store, "regular")];
    let settle = config.settle_policy();
    let mut pager = Pager::new(
        move || {
            let source = ConcatQueriesPager::<_, Item>::for_type(queries.clone())?;
            Ok(source.with_settle_policy(settle))
        },
        config.paging.page_size,
    )?;

    pager.load_all().await?;
    print_pages(&pager);
    print_summary(&pager);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.paging.page_size = 2;
        config.demo.documents = 5;
        config
    }

    #[tokio::test]
    async fn test_run_single_with_mutation() {
        run_single(&small_config(), true).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_concat() {
        run_concat(&small_config(), 3, 2).await.unwrap();
    }
}
