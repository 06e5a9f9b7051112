//! Fatigue accumulator
//!
//! A single non-negative score. Answer edits and detected signals push it up;
//! dismissing a nudge is the only thing that brings it down.

/// Result of a bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatigueBump {
    pub amount: u32,
    pub fatigue: u32,
    /// Score is at or above the threshold after this bump
    pub threshold_reached: bool,
}

#[derive(Debug, Clone)]
pub struct FatigueAccumulator {
    score: u32,
    threshold: u32,
    decay: u32,
}

impl FatigueAccumulator {
    pub fn new(threshold: u32, decay: u32) -> Self {
        Self {
            score: 0,
            threshold,
            decay,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Add to the score. There is no upper bound.
    pub fn bump(&mut self, amount: u32) -> FatigueBump {
        self.score = self.score.saturating_add(amount);
        FatigueBump {
            amount,
            fatigue: self.score,
            threshold_reached: self.score >= self.threshold,
        }
    }

    /// Subtract the fixed decay, floored at zero. Returns the new score.
    pub fn decay(&mut self) -> u32 {
        self.score = self.score.saturating_sub(self.decay);
        self.score
    }

    pub fn reset(&mut self) {
        self.score = 0;
    }
}
