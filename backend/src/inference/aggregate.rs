/// A single classification outcome: the binary verdict and the probability
/// the input is synthetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub is_deepfake: bool,
    pub confidence: f32,
}

impl Score {
    /// The fail-open sentinel recorded when an input cannot be scored.
    pub const NEGATIVE: Score = Score {
        is_deepfake: false,
        confidence: 0.0,
    };

    /// The verdict is a strict threshold on the probability: exactly 0.5 is
    /// "not deepfake".
    pub fn from_probability(probability: f32) -> Self {
        Self {
            is_deepfake: probability > 0.5,
            confidence: probability,
        }
    }
}

/// Combines per-frame scores into one verdict (strict majority vote; ties
/// round down to "not deepfake") and one confidence (arithmetic mean).
///
/// Callers guarantee a non-empty input; the extractor reports an empty video
/// as an error before any aggregation happens.
pub fn aggregate(scores: &[Score]) -> Score {
    debug_assert!(!scores.is_empty(), "aggregate requires at least one score");

    let positives = scores.iter().filter(|s| s.is_deepfake).count();
    let mean = scores.iter().map(|s| s.confidence).sum::<f32>() / scores.len() as f32;

    Score {
        is_deepfake: positives * 2 > scores.len(),
        confidence: mean,
    }
}
