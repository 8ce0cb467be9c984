//! Property tests for the document store and the two index variants.

use std::collections::HashSet;

use densearch::config::{ForestConfig, GraphConfig};
use densearch::{DocumentStore, ForestIndex, GraphIndex, Metric, SearchError, VectorIndex};
use proptest::prelude::*;

const DIM: usize = 8;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// *For any* interleaving of adds and deletes over a small ID pool, the
/// store's length equals the number of IDs whose last operation was an add,
/// and insertion order survives deletes of earlier entries.
mod prop_store_size {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn length_matches_live_adds(ops in proptest::collection::vec((0u8..8, any::<bool>()), 0..60)) {
            let mut store = DocumentStore::new();
            let mut model: HashSet<u8> = HashSet::new();

            for (slot, is_add) in &ops {
                let id = format!("doc-{slot}");
                if *is_add {
                    store.add_document("text", Some(id), None);
                    model.insert(*slot);
                } else {
                    let deleted = store.delete_document(&id);
                    prop_assert_eq!(deleted, model.remove(slot));
                }
            }

            prop_assert_eq!(store.len(), model.len());
            for slot in &model {
                let id = format!("doc-{slot}");
                prop_assert!(store.contains(&id));
            }
        }
    }
}

/// *For any* set of vectors inserted into a graph index and any subset of
/// them deleted, a search SHALL return at most `top_k` live IDs, each at
/// most once, with scores in descending cosine order.
mod prop_graph_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_are_live_unique_and_ordered(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 1..25),
            deletions in proptest::collection::vec(any::<bool>(), 25),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..12,
        ) {
            let config = GraphConfig {
                max_connections: 6,
                ef_construction: 24,
                ef_search: 16,
                rebuild_threshold: 1.0,
            };
            let mut index = GraphIndex::new(DIM, Metric::Cosine, &config);

            let mut live: HashSet<String> = HashSet::new();
            for (i, vector) in vectors.iter().enumerate() {
                let id = format!("doc-{i}");
                index.add_item(&id, vector).unwrap();
                live.insert(id);
            }
            for (i, delete) in deletions.iter().take(vectors.len()).enumerate() {
                if *delete && live.len() > 1 {
                    let id = format!("doc-{i}");
                    prop_assert!(index.delete_item(&id));
                    live.remove(&id);
                }
            }
            prop_assert_eq!(index.len(), live.len());

            let results = index.search(&query, top_k).unwrap();
            prop_assert!(results.len() <= top_k.min(live.len()));

            let mut seen = HashSet::new();
            for window in results.windows(2) {
                prop_assert!(window[0].score >= window[1].score);
            }
            for hit in &results {
                prop_assert!(live.contains(&hit.doc_id));
                prop_assert!(seen.insert(hit.doc_id.clone()));
            }
        }
    }
}

/// *For any* set of vectors accumulated in a forest index, searching before
/// a build SHALL fail with `IndexNotBuilt`; after a rebuild the index SHALL
/// report every item live and return at most `top_k` unique IDs.
mod prop_forest_build_contract {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn search_requires_build_and_rebuild_covers_all_items(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 1..25),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..12,
        ) {
            let config = ForestConfig { tree_count: 4, rebuild_threshold: 0.1, seed: 7 };
            let mut index = ForestIndex::new(DIM, Metric::Cosine, &config);

            for (i, vector) in vectors.iter().enumerate() {
                index.add_item(&format!("doc-{i}"), vector).unwrap();
            }
            prop_assert!(matches!(
                index.search(&query, top_k),
                Err(SearchError::IndexNotBuilt)
            ));

            index.rebuild().unwrap();
            prop_assert!(index.is_searchable());
            prop_assert_eq!(index.len(), vectors.len());

            let results = index.search(&query, top_k).unwrap();
            prop_assert!(results.len() <= top_k.min(vectors.len()));
            let ids: HashSet<&str> = results.iter().map(|r| r.doc_id.as_str()).collect();
            prop_assert_eq!(ids.len(), results.len());
        }
    }
}
