//! Pairwise similarity index
//!
//! Directed score map kept symmetric on insert: writing (a, b) also
//! writes (b, a). Export uses the canonical single direction
//! (`from < to` lexically) so a pair is emitted exactly once; import
//! reconstructs the reverse direction.

use crs_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One scored pair, in whatever direction the caller asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPair {
    /// First node
    pub from: String,
    /// Second node
    pub to: String,
    /// Similarity score in [0, 1]
    pub score: f64,
}

/// Owning container for pairwise similarity scores
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    scores: HashMap<String, BTreeMap<String, f64>>,
}

impl SimilarityIndex {
    /// An empty index
    pub fn new() -> Self {
        SimilarityIndex {
            scores: HashMap::new(),
        }
    }

    /// Rebuild from a plain adjacency map (restore path)
    pub fn from_scores(scores: HashMap<String, BTreeMap<String, f64>>) -> Self {
        SimilarityIndex { scores }
    }

    /// Validate a candidate pair without inserting it
    pub fn validate_pair(a: &str, b: &str, score: f64) -> Result<()> {
        if a.is_empty() || b.is_empty() {
            return Err(Error::EmptyId("similarity node id".into()));
        }
        if a == b {
            return Err(Error::SelfSimilarity(a.to_string()));
        }
        if !(0.0..=1.0).contains(&score) || score.is_nan() {
            return Err(Error::InvalidScore {
                from: a.to_string(),
                to: b.to_string(),
                score,
            });
        }
        Ok(())
    }

    /// Insert a pair symmetrically; later writes overwrite
    pub fn insert(&mut self, a: &str, b: &str, score: f64) -> Result<()> {
        Self::validate_pair(a, b, score)?;
        self.scores
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), score);
        self.scores
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string(), score);
        Ok(())
    }

    /// Score between two nodes, if recorded
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        self.scores.get(a).and_then(|m| m.get(b)).copied()
    }

    /// Number of canonical (undirected) pairs
    pub fn size(&self) -> usize {
        self.scores
            .iter()
            .map(|(from, m)| m.keys().filter(|to| from.as_str() < to.as_str()).count())
            .sum()
    }

    /// The backing adjacency map (checkpoint path)
    pub fn scores(&self) -> &HashMap<String, BTreeMap<String, f64>> {
        &self.scores
    }

    /// Freeze into a shareable read view
    pub fn view(&self) -> SimilarityView {
        SimilarityView {
            scores: Arc::new(self.scores.clone()),
        }
    }
}

/// Immutable read view over the similarity index
#[derive(Debug, Clone)]
pub struct SimilarityView {
    scores: Arc<HashMap<String, BTreeMap<String, f64>>>,
}

impl SimilarityView {
    /// Score between two nodes, if recorded
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        self.scores.get(a).and_then(|m| m.get(b)).copied()
    }

    /// The `k` most similar nodes to `node_id`, highest score first.
    ///
    /// Ties break lexically on the neighbor id so results are stable.
    pub fn nearest_neighbors(&self, node_id: &str, k: usize) -> Vec<SimilarityPair> {
        let mut pairs: Vec<SimilarityPair> = match self.scores.get(node_id) {
            Some(neighbors) => neighbors
                .iter()
                .map(|(to, score)| SimilarityPair {
                    from: node_id.to_string(),
                    to: to.clone(),
                    score: *score,
                })
                .collect(),
            None => return Vec::new(),
        };
        pairs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.to.cmp(&b.to))
        });
        pairs.truncate(k);
        pairs
    }

    /// Number of canonical (undirected) pairs
    pub fn size(&self) -> usize {
        self.scores
            .iter()
            .map(|(from, m)| m.keys().filter(|to| from.as_str() < to.as_str()).count())
            .sum()
    }

    /// Every directed pair
    pub fn all_pairs(&self) -> Vec<SimilarityPair> {
        let mut out = Vec::new();
        for (from, neighbors) in self.scores.iter() {
            for (to, score) in neighbors {
                out.push(SimilarityPair {
                    from: from.clone(),
                    to: to.clone(),
                    score: *score,
                });
            }
        }
        out
    }

    /// Canonical single-direction pairs (`from < to`), capped at `max`.
    ///
    /// Negative `max` means unlimited. Returns the pairs, sorted for
    /// deterministic export, and whether truncation occurred.
    pub fn all_pairs_filtered(&self, max: i64) -> (Vec<SimilarityPair>, bool) {
        let mut pairs: Vec<SimilarityPair> = self
            .scores
            .iter()
            .flat_map(|(from, neighbors)| {
                neighbors
                    .iter()
                    .filter(|(to, _)| from.as_str() < to.as_str())
                    .map(|(to, score)| SimilarityPair {
                        from: from.clone(),
                        to: to.clone(),
                        score: *score,
                    })
            })
            .collect();
        pairs.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));

        if max >= 0 && pairs.len() > max as usize {
            pairs.truncate(max as usize);
            (pairs, true)
        } else {
            (pairs, false)
        }
    }

    /// The backing adjacency map, for restore
    pub fn scores(&self) -> &HashMap<String, BTreeMap<String, f64>> {
        &self.scores
    }
}
