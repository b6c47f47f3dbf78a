//! Sequence similarity based on longest matching blocks
//!
//! Ratcliff/Obershelp "gestalt" matching: find the longest common block,
//! recurse on the pieces to its left and right, and score
//! `2 * matched / (len_a + len_b)`. Elements of `b` that occur in more than 1%
//! of a sequence of 200 or more elements are treated as too popular to anchor
//! a match, which keeps long inputs from degenerating into noise matches.

use std::collections::HashMap;

/// Sequences at least this long get the popular-element heuristic.
const AUTOJUNK_MIN_LEN: usize = 200;

/// A run of `size` equal elements at `a[a_start..]` and `b[b_start..]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub size: usize,
}

pub struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    /// Positions of each element of `b`, ascending
    b2j: HashMap<char, Vec<usize>>,
}

impl SequenceMatcher {
    pub fn new(a: &str, b: &str) -> Self {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let threshold = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= threshold);
        }

        Self { a, b, b2j }
    }

    /// Longest matching block in `a[alo..ahi]` and `b[blo..bhi]`.
    ///
    /// Ties go to the block starting earliest in `a`, then earliest in `b`.
    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchingBlock {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0usize);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut new_j2len: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j > 0 {
                        j2len.get(&(j - 1)).copied().unwrap_or(0) + 1
                    } else {
                        1
                    };
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        // Popular elements were left out of b2j; grow the block across them.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        MatchingBlock {
            a_start: best_i,
            b_start: best_j,
            size: best_size,
        }
    }

    /// Non-overlapping matching blocks in increasing order, adjacent blocks merged.
    pub fn matching_blocks(&self) -> Vec<MatchingBlock> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let block = self.find_longest_match(alo, ahi, blo, bhi);
            if block.size == 0 {
                continue;
            }
            let (i, j, k) = (block.a_start, block.b_start, block.size);
            blocks.push(block);
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        blocks.sort_by_key(|b| (b.a_start, b.b_start));

        let mut merged: Vec<MatchingBlock> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match merged.last_mut() {
                Some(last)
                    if last.a_start + last.size == block.a_start
                        && last.b_start + last.size == block.b_start =>
                {
                    last.size += block.size;
                }
                _ => merged.push(block),
            }
        }
        merged
    }

    /// Similarity in `[0.0, 1.0]`; two empty sequences are identical.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matched: usize = self.matching_blocks().iter().map(|b| b.size).sum();
        2.0 * matched as f64 / total as f64
    }
}

/// Shorthand for `SequenceMatcher::new(a, b).ratio()`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    SequenceMatcher::new(a, b).ratio()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_and_disjoint() {
        assert_eq!(similarity_ratio("towerresearch", "towerresearch"), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_suffix_extension_ratio() {
        // 13 matched chars out of 13 + 19
        let ratio = similarity_ratio("towerresearchpvtltd", "towerresearch");
        assert!((ratio - 26.0 / 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_exact_boundary_value() {
        // 8 matched out of 8 + 12: exactly 0.8
        assert_eq!(similarity_ratio("abcdefghwxyz", "abcdefgh"), 0.8);
        assert!(similarity_ratio("abcdefghwxyzq", "abcdefgh") < 0.8);
    }

    #[test]
    fn test_matching_blocks_recurse_both_sides() {
        let matcher = SequenceMatcher::new("qabxcd", "abycdf");
        let blocks = matcher.matching_blocks();
        assert_eq!(
            blocks,
            vec![
                MatchingBlock { a_start: 1, b_start: 0, size: 2 },
                MatchingBlock { a_start: 4, b_start: 3, size: 2 },
            ]
        );
        assert!((matcher.ratio() - 8.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_is_order_sensitive_like_gestalt_matching() {
        // the longest block anchors the match; crossing blocks are not counted
        let forward = similarity_ratio("abcd", "cdab");
        assert!((forward - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_popular_elements_in_long_sequences() {
        let a = "a".repeat(250);
        let b = "a".repeat(250);
        // every element is popular, yet the extension pass still matches them
        assert_eq!(similarity_ratio(&a, &b), 1.0);
    }
}
