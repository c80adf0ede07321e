//! Shannon entropy over character frequencies

use std::collections::HashMap;

/// Entropy above which content is flagged as likely encoded or encrypted
pub const HIGH_ENTROPY_THRESHOLD: f64 = 3.5;

/// Compute `-Σ p·log2(p)` over the distribution of characters in `content`.
///
/// Empty content has entropy `0.0`.
pub fn shannon_entropy(content: &str) -> f64 {
    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut length = 0usize;

    for ch in content.chars() {
        *freq.entry(ch).or_insert(0) += 1;
        length += 1;
    }

    if length == 0 {
        return 0.0;
    }

    let length = length as f64;
    freq.values()
        .map(|&count| {
            let p = count as f64 / length;
            -p * p.log2()
        })
        .sum()
}
