//! Read strategies over object stores.
//!
//! Every strategy returns the same documents for the same data; they differ
//! in how many engine round trips they take and how much they hold in
//! memory at once.

use std::future::Future;
use std::num::NonZeroUsize;

use futures::future::try_join_all;
use tracing::debug;

use crate::document::{pad_age, Document};
use crate::error::Error;
use crate::storage::{IndexKey, KeyPart, KeyRange, ObjectStore, AGE_INDEX, CUSTOM_AGE_INDEX};

/// Page query accounting for a batched scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Non-empty pages returned.
    pub pages: usize,
    /// Page queries issued, including the final empty one.
    pub queries: usize,
}

/// Every document in the store, in primary key order.
pub async fn read_all(store: &ObjectStore) -> Result<Vec<Document>, Error> {
    store.get_all().await
}

/// Point reads for `ids`, one slot per id.
pub async fn find_by_ids(
    store: &ObjectStore,
    ids: Vec<String>,
) -> Result<Vec<Option<Document>>, Error> {
    store.get_many(ids).await
}

/// Range over `age-index` covering every age up to and including `max_age`.
pub fn age_range(max_age: f64) -> KeyRange {
    KeyRange::bound(
        IndexKey::new(vec![KeyPart::Min, KeyPart::Min]),
        IndexKey::new(vec![KeyPart::Number(max_age), KeyPart::Max]),
        false,
        false,
    )
}

/// Documents with `age <= max_age` via a native cursor, one row per step.
pub async fn find_via_cursor(store: &ObjectStore, max_age: f64) -> Result<Vec<Document>, Error> {
    let mut cursor = store.index(AGE_INDEX)?.open_cursor(&age_range(max_age));
    let mut documents = Vec::new();
    while let Some(doc) = cursor.next().await? {
        documents.push(doc);
    }
    Ok(documents)
}

/// Documents with `age <= max_age` in one bulk index read.
pub async fn find_via_get_all(store: &ObjectStore, max_age: f64) -> Result<Vec<Document>, Error> {
    store.index(AGE_INDEX)?.get_all(&age_range(max_age), None).await
}

/// Page through an index in key order, `page_size` documents per query.
///
/// The upper bound is `[max_key, Max]` on a compound index and `[max_key]`
/// on a single-field one, inclusive. The index key must be unique per
/// document, otherwise documents sharing the page boundary key are skipped.
pub async fn batched_range_scan(
    store: &ObjectStore,
    index_name: &str,
    page_size: NonZeroUsize,
    max_key: KeyPart,
) -> Result<Vec<Document>, Error> {
    let (documents, _) =
        batched_range_scan_with_stats(store, index_name, page_size, max_key).await?;
    Ok(documents)
}

/// [`batched_range_scan`] that also reports page query counts.
pub async fn batched_range_scan_with_stats(
    store: &ObjectStore,
    index_name: &str,
    page_size: NonZeroUsize,
    max_key: KeyPart,
) -> Result<(Vec<Document>, ScanStats), Error> {
    let arity = store.index(index_name)?.definition().arity();
    let mut upper = vec![max_key];
    if arity > 1 {
        upper.push(KeyPart::Max);
    }
    scan_pages(store, index_name, page_size, IndexKey::new(upper), false).await
}

/// Batched scan over `custom-age-index` for `age <= max_age`.
///
/// The index holds `"<padded age>|<id>"` strings, so the upper bound is the
/// padded `max_age + 1`, exclusive.
pub async fn batched_custom_index_scan(
    store: &ObjectStore,
    page_size: NonZeroUsize,
    max_age: f64,
) -> Result<Vec<Document>, Error> {
    let upper = IndexKey::single(pad_age(max_age + 1.0));
    let (documents, _) = scan_pages(store, CUSTOM_AGE_INDEX, page_size, upper, true).await?;
    Ok(documents)
}

async fn scan_pages(
    store: &ObjectStore,
    index_name: &str,
    page_size: NonZeroUsize,
    upper: IndexKey,
    upper_open: bool,
) -> Result<(Vec<Document>, ScanStats), Error> {
    let index = store.index(index_name)?;
    let def = index.definition().clone();

    let mut documents = Vec::new();
    let mut stats = ScanStats::default();
    let mut last: Option<IndexKey> = None;

    loop {
        let range = match &last {
            None => KeyRange::bound(
                IndexKey::new(vec![KeyPart::Min; def.arity()]),
                upper.clone(),
                false,
                upper_open,
            ),
            Some(key) => KeyRange::bound(key.clone(), upper.clone(), true, upper_open),
        };

        let page = index.get_all(&range, Some(page_size)).await?;
        stats.queries += 1;
        debug!(
            store = %store.name(),
            index = %index_name,
            page = stats.queries,
            rows = page.len(),
            "scan page"
        );

        let Some(tail) = page.last() else {
            break;
        };
        last = Some(def.key_for(tail));
        stats.pages += 1;
        documents.extend(page);
    }

    Ok((documents, stats))
}

/// Run `read` against every store concurrently and concatenate the
/// results in store order.
pub async fn scan_partitions<F, Fut>(
    stores: &[ObjectStore],
    read: F,
) -> Result<Vec<Document>, Error>
where
    F: Fn(ObjectStore) -> Fut,
    Fut: Future<Output = Result<Vec<Document>, Error>>,
{
    let results = try_join_all(stores.iter().cloned().map(read)).await?;
    Ok(results.into_iter().flatten().collect())
}
