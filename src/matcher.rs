use crate::model::Nucleus;
use crate::similarity::similarity_ratio;
use tracing::debug;

/// Default minimum ratio for accepting a fuzzy candidate
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Best-scoring candidate that cleared the threshold
#[derive(Debug, Clone)]
pub struct FuzzyMatch {
    pub nucleus: Nucleus,
    pub score: f64,
}

/// Fuzzy matcher over prefix-narrowed nucleus candidates
pub struct CandidateMatcher {
    pub similarity_threshold: f64,
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl CandidateMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
        }
    }

    /// Pick the candidate most similar to `normalized`.
    ///
    /// Candidates are visited oldest first (`created_at`, then `id`) and only a
    /// strictly higher score replaces the current best, so ties go to the oldest
    /// nucleus regardless of the order the store returned them in.
    pub fn best_match(&self, normalized: &str, mut candidates: Vec<Nucleus>) -> Option<FuzzyMatch> {
        candidates.sort_by(|x, y| {
            x.created_at
                .cmp(&y.created_at)
                .then_with(|| x.id.cmp(&y.id))
        });

        let mut best: Option<FuzzyMatch> = None;
        for candidate in candidates {
            let score = similarity_ratio(normalized, &candidate.canonical_name);
            debug!(
                candidate = %candidate.canonical_name,
                score,
                "scored nucleus candidate"
            );
            if score < self.similarity_threshold {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(FuzzyMatch {
                    nucleus: candidate,
                    score,
                });
            }
        }
        best
    }
}
