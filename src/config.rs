//! Configuration for the search engine and its index variants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::metric::Metric;

/// Which approximate-nearest-neighbor index variant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Build-once tree forest ([`ForestIndex`](crate::forest::ForestIndex)).
    Forest,
    /// Incremental proximity graph ([`GraphIndex`](crate::graph::GraphIndex)).
    #[default]
    Graph,
}

/// Parameters for the build-once forest index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestConfig {
    /// Number of trees. More trees build slower but recall better.
    pub tree_count: usize,
    /// Tombstone fraction of live items that triggers a rebuild.
    pub rebuild_threshold: f32,
    /// Seed for the tree-splitting RNG, so rebuilds are reproducible.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self { tree_count: 50, rebuild_threshold: 0.1, seed: 42 }
    }
}

/// Parameters for the incremental graph index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// Maximum neighbors kept per node.
    pub max_connections: usize,
    /// Candidate breadth during insertion.
    pub ef_construction: usize,
    /// Candidate breadth during search.
    pub ef_search: usize,
    /// Deleted fraction of live items that triggers a rebuild.
    pub rebuild_threshold: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { max_connections: 16, ef_construction: 200, ef_search: 50, rebuild_threshold: 0.1 }
    }
}

/// Configuration for a [`SearchEngine`](crate::engine::SearchEngine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// The index variant the engine manages.
    pub index: IndexKind,
    /// The similarity metric for scoring and ordering results.
    pub metric: Metric,
    /// Maximum number of documents accepted before adds are rejected.
    pub max_documents: usize,
    /// Upper bound applied to per-query `top_k`.
    pub max_top_k: usize,
    /// Deadline for a single embedding call, in milliseconds.
    pub embed_timeout_ms: u64,
    /// Forest-specific parameters, used when `index` is [`IndexKind::Forest`].
    pub forest: ForestConfig,
    /// Graph-specific parameters, used when `index` is [`IndexKind::Graph`].
    pub graph: GraphConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index: IndexKind::default(),
            metric: Metric::default(),
            max_documents: 100_000,
            max_top_k: 100,
            embed_timeout_ms: 30_000,
            forest: ForestConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new builder for constructing an [`EngineConfig`].
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// The embedding deadline as a [`Duration`].
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }
}

/// Builder for constructing a validated [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the index variant.
    pub fn index(mut self, kind: IndexKind) -> Self {
        self.config.index = kind;
        self
    }

    /// Set the similarity metric.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set the maximum document count.
    pub fn max_documents(mut self, max: usize) -> Self {
        self.config.max_documents = max;
        self
    }

    /// Set the upper bound on per-query `top_k`.
    pub fn max_top_k(mut self, max: usize) -> Self {
        self.config.max_top_k = max;
        self
    }

    /// Set the embedding deadline in milliseconds.
    pub fn embed_timeout_ms(mut self, ms: u64) -> Self {
        self.config.embed_timeout_ms = ms;
        self
    }

    /// Set the forest index parameters.
    pub fn forest(mut self, forest: ForestConfig) -> Self {
        self.config.forest = forest;
        self
    }

    /// Set the graph index parameters.
    pub fn graph(mut self, graph: GraphConfig) -> Self {
        self.config.graph = graph;
        self
    }

    /// Build the [`EngineConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if:
    /// - `max_documents`, `max_top_k`, or `embed_timeout_ms` is zero
    /// - `forest.tree_count` is zero
    /// - `graph.max_connections` or `graph.ef_search` is zero
    /// - `graph.ef_construction < graph.max_connections`
    /// - either `rebuild_threshold` is outside `(0, 1]`
    pub fn build(self) -> Result<EngineConfig> {
        let c = &self.config;
        if c.max_documents == 0 {
            return Err(SearchError::Config("max_documents must be greater than zero".to_string()));
        }
        if c.max_top_k == 0 {
            return Err(SearchError::Config("max_top_k must be greater than zero".to_string()));
        }
        if c.embed_timeout_ms == 0 {
            return Err(SearchError::Config(
                "embed_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if c.forest.tree_count == 0 {
            return Err(SearchError::Config("tree_count must be greater than zero".to_string()));
        }
        if c.graph.max_connections == 0 {
            return Err(SearchError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if c.graph.ef_search == 0 {
            return Err(SearchError::Config("ef_search must be greater than zero".to_string()));
        }
        if c.graph.ef_construction < c.graph.max_connections {
            return Err(SearchError::Config(format!(
                "ef_construction ({}) must be at least max_connections ({})",
                c.graph.ef_construction, c.graph.max_connections
            )));
        }
        for (name, threshold) in [
            ("forest.rebuild_threshold", c.forest.rebuild_threshold),
            ("graph.rebuild_threshold", c.graph.rebuild_threshold),
        ] {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(SearchError::Config(format!("{name} must be in (0, 1], got {threshold}")));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.index, IndexKind::Graph);
        assert_eq!(config.metric, Metric::Cosine);
    }

    #[test]
    fn rejects_zero_tree_count() {
        let result = EngineConfig::builder()
            .forest(ForestConfig { tree_count: 0, ..ForestConfig::default() })
            .build();
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn rejects_ef_construction_below_max_connections() {
        let result = EngineConfig::builder()
            .graph(GraphConfig { max_connections: 32, ef_construction: 16, ..GraphConfig::default() })
            .build();
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let result = EngineConfig::builder()
            .graph(GraphConfig { rebuild_threshold: 1.5, ..GraphConfig::default() })
            .build();
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn rejects_zero_capacity() {
        let result = EngineConfig::builder().max_documents(0).build();
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn serde_round_trip() {
        let config = EngineConfig::builder().index(IndexKind::Forest).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"forest\""));
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
