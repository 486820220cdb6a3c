use crate::{
    error::Result,
    filter::DocumentFilter,
    model::Document,
    store::Store,
};

/// A matched document and how far it is from an exact match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSearchResult {
    pub accuracy: usize,
    pub document: Document,
}

/// Execute the ranked search pipeline.
///
/// 1. Compose every filter into one query
/// 2. Run it once, fetching at most `page_size` documents from `offset`
/// 3. Score each document with the summed filter accuracy
/// 4. Sort ascending by accuracy, keeping store order for ties
pub fn search<S: Store>(
    store: &S,
    filter: &DocumentFilter,
    offset: usize,
    page_size: usize,
) -> Result<Vec<DocumentSearchResult>> {
    let query = filter.to_query();
    let documents = store.query_documents(&query, offset, page_size)?;
    tracing::debug!(
        filters = filter.filters().len(),
        offset,
        found = documents.len(),
        "document query"
    );
    Ok(rank(filter, documents))
}

/// Total number of documents the filter matches, ignoring paging.
pub fn count<S: Store>(store: &S, filter: &DocumentFilter) -> Result<u64> {
    store.count_documents(&filter.to_query())
}

/// Score and stably sort `documents`.
pub fn rank(
    filter: &DocumentFilter,
    documents: Vec<Document>,
) -> Vec<DocumentSearchResult> {
    let mut results: Vec<DocumentSearchResult> = documents
        .into_iter()
        .map(|document| DocumentSearchResult {
            accuracy: filter.accuracy(&document),
            document,
        })
        .collect();
    results.sort_by_key(|r| r.accuracy);
    results
}
