//! Optional semantic similarity collaborator.
//!
//! The engine never embeds anything itself; a collaborator implementing
//! [`SemanticIndex`] can contribute similarity rankings, which are merged
//! with lexical results by reciprocal rank fusion. Without a collaborator
//! the lexical ranking stands alone.

use crate::error::Result;

/// One similarity hit from the collaborator.
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub node_id: String,
    pub score: f32,
}

/// A vector-similarity collaborator over the indexed nodes.
pub trait SemanticIndex {
    /// Rank stored nodes by similarity to `query`, best first.
    fn rank(&self, query: &str, limit: usize) -> Result<Vec<SemanticMatch>>;
}

/// Reciprocal rank fusion over two id rankings.
///
/// `score(d) = Σ 1 / (k + rank_i(d))` with the standard `k = 60`; rank
/// positions are 1-based. Score-agnostic, so BM25-ish lexical scores and
/// cosine similarities merge without normalization. Ties break by id.
pub fn fuse_by_reciprocal_rank(lexical: &[String], semantic: &[String], k: f64) -> Vec<String> {
    let mut scores: std::collections::HashMap<&str, f64> = std::collections::HashMap::new();
    for (rank, id) in lexical.iter().enumerate() {
        *scores.entry(id.as_str()).or_default() += 1.0 / (k + rank as f64 + 1.0);
    }
    for (rank, id) in semantic.iter().enumerate() {
        *scores.entry(id.as_str()).or_default() += 1.0 / (k + rank as f64 + 1.0);
    }

    let mut fused: Vec<(&str, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    fused.into_iter().map(|(id, _)| id.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
