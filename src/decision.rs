//! decision.rs: the moderation verdict and the decision shape returned to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict for one submitted comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Block,
}

impl Verdict {
    /// Block iff `score > threshold`. A score equal to the threshold is accepted.
    pub fn for_score(score: f64, threshold: f64) -> Self {
        if score > threshold {
            Verdict::Block
        } else {
            Verdict::Accept
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accept => "accept",
            Verdict::Block => "block",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of moderating one text. Derived, never persisted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModerationDecision {
    /// Probability of offensive content, in <0.0, 1.0>.
    pub score: f64,
    pub verdict: Verdict,
    pub threshold_used: f64,
}

impl ModerationDecision {
    pub fn new(score: f64, threshold: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            verdict: Verdict::for_score(score, threshold),
            threshold_used: threshold,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Block
    }
}
