//! Codebook delay pattern.
//!
//! The decoder predicts all codebooks in parallel, with codebook `k`
//! lagging `k` steps behind codebook 0:
//!
//! ```text
//! step  0 1 2 3 4 5
//! cb 0  a b c d e f
//! cb 1  P a b c d e
//! cb 2  P P a b c d
//! cb 3  P P P a b c
//! ```
//!
//! `P` positions are fed back to the decoder as the pad token. Reading the
//! diagonal recovers aligned frames once `codebooks` steps exist.

use super::backend::Codes;

/// Tokens predicted so far, one row per codebook.
#[derive(Debug, Clone)]
pub struct DelayPattern {
    rows: Vec<Vec<i64>>,
}

impl DelayPattern {
    /// Creates an empty pattern for `codebooks` codebooks (at least one).
    pub fn new(codebooks: usize) -> Self {
        Self {
            rows: vec![Vec::new(); codebooks.max(1)],
        }
    }

    /// Number of codebooks.
    pub fn codebooks(&self) -> usize {
        self.rows.len()
    }

    /// Number of decoder steps recorded.
    pub fn len(&self) -> usize {
        self.rows[0].len()
    }

    /// Returns true if no step has been recorded.
    pub fn is_empty(&self) -> bool {
        self.rows[0].is_empty()
    }

    /// Records one decoder step. Extra tokens are ignored and missing ones
    /// repeat the last given token, so every row stays the same length.
    pub fn push(&mut self, tokens: &[i64]) {
        let fallback = tokens.last().copied().unwrap_or(0);
        for (k, row) in self.rows.iter_mut().enumerate() {
            row.push(tokens.get(k).copied().unwrap_or(fallback));
        }
    }

    /// Decoder input for the next step: the last token of each codebook,
    /// or `pad` where the codebook has not started yet.
    pub fn next_input(&self, pad: i64) -> Vec<i64> {
        let steps = self.len();
        self.rows
            .iter()
            .enumerate()
            .map(|(k, row)| {
                if steps > k {
                    row.last().copied().unwrap_or(pad)
                } else {
                    pad
                }
            })
            .collect()
    }

    /// Every complete frame, as codec codes `[codebook][frame]`.
    ///
    /// `steps - codebooks + 1` frames are available after `steps` steps.
    pub fn frames(&self) -> Codes {
        let n = self.codebooks();
        let frames = (self.len() + 1).saturating_sub(n);
        if frames == 0 {
            return vec![Vec::new(); n];
        }
        self.rows
            .iter()
            .enumerate()
            .map(|(k, row)| row[k..k + frames].to_vec())
            .collect()
    }

    /// Decoder steps needed to produce `frames` complete frames.
    pub fn steps_for_frames(&self, frames: usize) -> usize {
        frames + self.codebooks() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(steps: usize) -> DelayPattern {
        let mut pattern = DelayPattern::new(4);
        for s in 0..steps as i64 {
            pattern.push(&[4 * s + 1, 4 * s + 2, 4 * s + 3, 4 * s + 4]);
        }
        pattern
    }

    #[test]
    fn starts_empty() {
        let pattern = DelayPattern::new(4);
        assert!(pattern.is_empty());
        assert_eq!(pattern.codebooks(), 4);
        assert_eq!(pattern.next_input(2048), vec![2048; 4]);
        assert_eq!(pattern.frames(), vec![Vec::<i64>::new(); 4]);
    }

    #[test]
    fn next_input_pads_late_codebooks() {
        assert_eq!(filled(1).next_input(0), vec![1, 0, 0, 0]);
        assert_eq!(filled(2).next_input(0), vec![5, 6, 0, 0]);
        assert_eq!(filled(3).next_input(0), vec![9, 10, 11, 0]);
        assert_eq!(filled(4).next_input(0), vec![13, 14, 15, 16]);
        assert_eq!(filled(5).next_input(0), vec![17, 18, 19, 20]);
    }

    #[test]
    fn frames_collects_every_diagonal() {
        let codes = filled(5).frames();
        assert_eq!(codes, vec![vec![1, 5], vec![6, 10], vec![11, 15], vec![16, 20]]);
    }

    #[test]
    fn steps_for_frames_adds_lag() {
        let pattern = DelayPattern::new(4);
        assert_eq!(pattern.steps_for_frames(500), 503);
        assert_eq!(filled(pattern.steps_for_frames(7)).frames()[0].len(), 7);
    }

    #[test]
    fn push_pads_short_steps() {
        let mut pattern = DelayPattern::new(3);
        pattern.push(&[7]);
        assert_eq!(pattern.next_input(-1), vec![7, -1, -1]);
        pattern.push(&[1, 2, 3, 4]);
        assert_eq!(pattern.len(), 2);
    }
}
