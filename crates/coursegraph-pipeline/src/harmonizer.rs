//! Concept harmonization: batched synonym clustering over the full
//! concept vocabulary.
//!
//! Large vocabularies cannot fit a single clustering prompt, so the
//! vocabulary is split into token-budget-sized batches, clustered per
//! batch, and the pass-1 canonical names are re-clustered once more to
//! merge synonym groups that were split across batch boundaries. The
//! result is written as CanonicalConcept nodes with `ALIGNS_TO` edges,
//! tuned for precision: singleton clusters and hallucinated source names
//! are dropped rather than written.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use coursegraph_core::chunker::ContextBudget;
use coursegraph_core::defaults::{HARMONIZE_THRESHOLD, MIN_HARMONIZE_BATCH, TOKENS_PER_CONCEPT};
use coursegraph_core::{CompletionBackend, ConceptCluster, GraphStore, Result};
use coursegraph_inference::decode::decode_cluster_set;
use coursegraph_inference::prompts::{clustering_user_prompt, PromptProfile};

/// Batch sizing knobs for harmonization runs.
#[derive(Debug, Clone)]
pub struct HarmonizerConfig {
    pub budget: ContextBudget,
    /// Rough prompt-token cost of one concept name in the vocabulary list.
    pub tokens_per_concept: usize,
    /// Floor on batch size so tiny budgets still make progress.
    pub min_batch: usize,
    /// Unaligned-concept backlog below which `pending` reports no work.
    pub threshold: u64,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        Self {
            budget: ContextBudget::default(),
            tokens_per_concept: TOKENS_PER_CONCEPT,
            min_batch: MIN_HARMONIZE_BATCH,
            threshold: HARMONIZE_THRESHOLD,
        }
    }
}

impl HarmonizerConfig {
    /// Concepts per clustering call under the context budget.
    pub fn batch_size(&self) -> usize {
        let fit = self.budget.usable_tokens() / self.tokens_per_concept.max(1);
        fit.max(self.min_batch)
    }
}

/// Summary of one harmonization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarmonizeReport {
    /// Vocabulary size fed into clustering.
    pub concepts: usize,
    /// Clustering calls made (pass 1 only).
    pub batches: usize,
    /// Final clusters written after merging and filtering.
    pub clusters: usize,
    /// `ALIGNS_TO` edges written.
    pub aligned: usize,
}

/// Batched concept harmonizer over the whole graph vocabulary.
pub struct Harmonizer {
    backend: Arc<dyn CompletionBackend>,
    store: Arc<dyn GraphStore>,
    config: HarmonizerConfig,
    profile: PromptProfile,
}

impl Harmonizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, store: Arc<dyn GraphStore>) -> Self {
        Self {
            backend,
            store,
            config: HarmonizerConfig::default(),
            profile: PromptProfile::clustering(),
        }
    }

    pub fn with_config(mut self, config: HarmonizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether enough unaligned concepts have accumulated to warrant a run.
    pub async fn pending(&self) -> Result<bool> {
        let backlog = self.store.unaligned_concept_count().await?;
        Ok(backlog >= self.config.threshold)
    }

    /// Cluster the full vocabulary and write canonical concepts and
    /// alignments. Re-running is idempotent for an unchanged vocabulary.
    pub async fn run(&self) -> Result<HarmonizeReport> {
        let start = Instant::now();
        let names = self.store.concept_names().await?;
        if names.is_empty() {
            return Ok(HarmonizeReport {
                concepts: 0,
                batches: 0,
                clusters: 0,
                aligned: 0,
            });
        }

        let vocabulary: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let batch_size = self.config.batch_size();

        // Pass 1: per-batch clustering. A failed batch loses only its own
        // concepts.
        let mut clusters: Vec<ConceptCluster> = Vec::new();
        let mut batches = 0usize;
        for batch in names.chunks(batch_size) {
            batches += 1;
            match self.cluster_names(batch).await {
                Ok(found) => clusters.extend(sanitize(found, &vocabulary)),
                Err(e) => {
                    warn!(
                        subsystem = "pipeline",
                        component = "harmonizer",
                        batch = batches,
                        batch_len = batch.len(),
                        error = %e,
                        "Clustering batch failed, skipping"
                    );
                }
            }
        }

        // Pass 2: merge synonym groups split across batch boundaries by
        // clustering the pass-1 canonical names themselves.
        if batches > 1 && clusters.len() > 1 {
            let canonical_names: Vec<String> =
                clusters.iter().map(|c| c.canonical_name.clone()).collect();
            match self.cluster_names(&canonical_names).await {
                Ok(meta) => {
                    let canon_vocab: BTreeSet<&str> =
                        canonical_names.iter().map(String::as_str).collect();
                    let rename = rename_map(sanitize(meta, &canon_vocab));
                    for cluster in &mut clusters {
                        if let Some(merged) = rename.get(cluster.canonical_name.as_str()) {
                            cluster.canonical_name = merged.clone();
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        subsystem = "pipeline",
                        component = "harmonizer",
                        error = %e,
                        "Cross-batch consolidation failed, keeping per-batch clusters"
                    );
                }
            }
        }

        let merged = merge_clusters(clusters);

        let mut aligned = 0usize;
        for cluster in &merged {
            self.store
                .upsert_canonical_concept(&cluster.canonical_name, &cluster.description)
                .await?;
            for source in &cluster.source_concepts {
                self.store
                    .upsert_aligns_to(source, &cluster.canonical_name)
                    .await?;
                aligned += 1;
            }
        }

        let report = HarmonizeReport {
            concepts: names.len(),
            batches,
            clusters: merged.len(),
            aligned,
        };
        info!(
            subsystem = "pipeline",
            component = "harmonizer",
            op = "run",
            concept_count = report.concepts,
            batch_count = report.batches,
            cluster_count = report.clusters,
            aligned = report.aligned,
            duration_ms = start.elapsed().as_millis() as u64,
            "Harmonization complete"
        );
        Ok(report)
    }

    async fn cluster_names(&self, names: &[String]) -> Result<Vec<ConceptCluster>> {
        let raw = self
            .backend
            .complete_json(&self.profile.render(), &clustering_user_prompt(names))
            .await?;
        Ok(decode_cluster_set(&raw)?.clusters)
    }
}

/// Precision filter on model-returned clusters: trim names, drop sources
/// outside the input vocabulary, drop clusters left with fewer than two
/// sources.
fn sanitize(clusters: Vec<ConceptCluster>, vocabulary: &BTreeSet<&str>) -> Vec<ConceptCluster> {
    clusters
        .into_iter()
        .filter_map(|cluster| {
            let canonical_name = cluster.canonical_name.trim().to_string();
            if canonical_name.is_empty() {
                return None;
            }
            let mut seen = BTreeSet::new();
            let source_concepts: Vec<String> = cluster
                .source_concepts
                .iter()
                .map(|s| s.trim())
                .filter(|s| vocabulary.contains(s))
                .filter(|s| seen.insert(s.to_string()))
                .map(str::to_string)
                .collect();
            if source_concepts.len() < 2 {
                return None;
            }
            Some(ConceptCluster {
                canonical_name,
                description: cluster.description.trim().to_string(),
                source_concepts,
            })
        })
        .collect()
}

/// old canonical name → merged canonical name, from pass-2 clusters.
fn rename_map(meta_clusters: Vec<ConceptCluster>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for cluster in meta_clusters {
        for source in cluster.source_concepts {
            map.insert(source, cluster.canonical_name.clone());
        }
    }
    map
}

/// Collapse clusters sharing a canonical name, deduplicating sources and
/// keeping the first non-empty description.
fn merge_clusters(clusters: Vec<ConceptCluster>) -> Vec<ConceptCluster> {
    let mut merged: BTreeMap<String, (String, BTreeSet<String>)> = BTreeMap::new();
    for cluster in clusters {
        let entry = merged
            .entry(cluster.canonical_name)
            .or_insert_with(|| (String::new(), BTreeSet::new()));
        if entry.0.is_empty() {
            entry.0 = cluster.description;
        }
        entry.1.extend(cluster.source_concepts);
    }
    merged
        .into_iter()
        .map(|(canonical_name, (description, sources))| ConceptCluster {
            canonical_name,
            description,
            source_concepts: sources.into_iter().collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(canonical: &str, sources: &[&str]) -> ConceptCluster {
        ConceptCluster {
            canonical_name: canonical.to_string(),
            description: String::new(),
            source_concepts: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_batch_size_from_default_budget() {
        // usable = 8192 - 1500 - 1500 = 5192, / 15 = 346
        let config = HarmonizerConfig::default();
        assert_eq!(config.batch_size(), 346);
    }

    #[test]
    fn test_batch_size_floor() {
        let config = HarmonizerConfig {
            budget: ContextBudget {
                context_size: 2048,
                reserved_prompt: 1500,
                reserved_response: 500,
                ..ContextBudget::default()
            },
            ..HarmonizerConfig::default()
        };
        assert_eq!(config.batch_size(), MIN_HARMONIZE_BATCH);
    }

    #[test]
    fn test_thousand_concepts_split_into_three_batches() {
        let config = HarmonizerConfig::default();
        let names: Vec<String> = (0..1000).map(|i| format!("concept {}", i)).collect();
        let sizes: Vec<usize> = names
            .chunks(config.batch_size())
            .map(<[String]>::len)
            .collect();
        assert_eq!(sizes, vec![346, 346, 308]);
    }

    #[test]
    fn test_sanitize_drops_singletons_and_foreign_sources() {
        let vocab: BTreeSet<&str> = ["tcp", "transmission control protocol", "udp"]
            .into_iter()
            .collect();
        let clusters = vec![
            cluster("TCP", &["tcp", "transmission control protocol", "quic"]),
            cluster("UDP", &["udp"]),
            cluster("", &["tcp", "udp"]),
        ];
        let sane = sanitize(clusters, &vocab);
        assert_eq!(sane.len(), 1);
        assert_eq!(
            sane[0].source_concepts,
            vec!["tcp", "transmission control protocol"]
        );
    }

    #[test]
    fn test_sanitize_dedups_sources() {
        let vocab: BTreeSet<&str> = ["a", "b"].into_iter().collect();
        let sane = sanitize(vec![cluster("AB", &["a", "a", "b"])], &vocab);
        assert_eq!(sane[0].source_concepts, vec!["a", "b"]);
    }

    #[test]
    fn test_merge_clusters_unions_sources() {
        let merged = merge_clusters(vec![
            cluster("HTTP", &["http", "hypertext transfer protocol"]),
            cluster("HTTP", &["http/1.1", "http"]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].source_concepts,
            vec!["http", "http/1.1", "hypertext transfer protocol"]
        );
    }

    #[test]
    fn test_rename_map_points_sources_at_merged_name() {
        let map = rename_map(vec![cluster("Neural Network", &["Neural Net", "ANN"])]);
        assert_eq!(map.get("ANN").unwrap(), "Neural Network");
        assert_eq!(map.get("Neural Net").unwrap(), "Neural Network");
        assert!(map.get("Neural Network").is_none());
    }
}
