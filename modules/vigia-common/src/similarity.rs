//! Fuzzy string similarity for entity resolution.
//!
//! Pluggable via [`Similarity`]; the default is an LCS-based ratio in
//! `[0, 1]` over lowercased, trimmed input.

/// A similarity scorer over two strings. Implementations must be symmetric
/// and return values in `[0, 1]`.
pub trait Similarity: Send + Sync {
    fn ratio(&self, a: &str, b: &str) -> f64;
}

/// Longest-common-subsequence ratio: `2·|LCS(a, b)| / (|a| + |b|)` over
/// chars, after lowercasing and trimming. Either side empty scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LcsSimilarity;

impl Similarity for LcsSimilarity {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.trim().to_lowercase().chars().collect();
        let b: Vec<char> = b.trim().to_lowercase().chars().collect();
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let lcs = lcs_len(&a, &b);
        (2.0 * lcs as f64) / ((a.len() + b.len()) as f64)
    }
}

/// Two-row DP. Quadratic, but the operands here are names, one-line
/// locations, and two-sentence summaries.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
