//! Inside evaluators for the edge processor
//!
//! Property ids are split into two classes: even ids form input "A"
//! (subjects), odd ids form input "B" (intruders).

use std::collections::HashMap;

/// Winding counts per property id at one position of the sweep
#[derive(Debug, Default, Clone)]
pub struct WindingState {
    counts: HashMap<usize, i32>,
    nonzero_even: usize,
    nonzero_odd: usize,
}

impl WindingState {
    pub fn apply(&mut self, prop: usize, delta: i32) {
        let wc = self.counts.entry(prop).or_insert(0);
        let before = *wc != 0;
        *wc += delta;
        let after = *wc != 0;
        if after == before {
            return;
        }
        let counter = if prop % 2 == 0 {
            &mut self.nonzero_even
        } else {
            &mut self.nonzero_odd
        };
        if after {
            *counter += 1;
        } else {
            *counter -= 1;
            self.counts.remove(&prop);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Ids with a nonzero winding count
    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts.keys().copied()
    }

    pub fn winding(&self, prop: usize) -> i32 {
        self.counts.get(&prop).copied().unwrap_or(0)
    }

    pub fn nonzero_even(&self) -> usize {
        self.nonzero_even
    }

    pub fn nonzero_odd(&self) -> usize {
        self.nonzero_odd
    }

    pub fn nonzero_total(&self) -> usize {
        self.nonzero_even + self.nonzero_odd
    }
}

/// Decides whether a sweep position belongs to the output region
pub trait InsideEvaluator: Sync {
    fn is_inside(&self, state: &WindingState) -> bool;
}

/// Boolean between the even (A) and odd (B) inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    ANotB,
    BNotA,
    Xor,
    Or,
}

impl InsideEvaluator for BooleanOp {
    fn is_inside(&self, state: &WindingState) -> bool {
        let a = state.nonzero_even > 0;
        let b = state.nonzero_odd > 0;
        match self {
            BooleanOp::And => a && b,
            BooleanOp::ANotB => a && !b,
            BooleanOp::BNotA => b && !a,
            BooleanOp::Xor => a != b,
            BooleanOp::Or => a || b,
        }
    }
}

/// Merge regardless of the input class: a point is inside if more than
/// `min_wc` distinct inputs cover it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOp {
    min_wc: usize,
}

impl MergeOp {
    pub fn new(min_wc: usize) -> Self {
        Self { min_wc }
    }
}

impl InsideEvaluator for MergeOp {
    fn is_inside(&self, state: &WindingState) -> bool {
        state.nonzero_total() > self.min_wc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winding_counters() {
        let mut s = WindingState::default();
        s.apply(0, 1);
        s.apply(2, 1);
        s.apply(1, 1);
        assert_eq!(s.nonzero_even(), 2);
        assert_eq!(s.nonzero_odd(), 1);
        assert!(BooleanOp::And.is_inside(&s));
        assert!(!BooleanOp::ANotB.is_inside(&s));
        assert!(MergeOp::new(2).is_inside(&s));
        assert!(!MergeOp::new(3).is_inside(&s));

        s.apply(1, -1);
        assert_eq!(s.nonzero_odd(), 0);
        assert_eq!(s.winding(1), 0);
        assert!(BooleanOp::ANotB.is_inside(&s));
        assert!(BooleanOp::Xor.is_inside(&s));
    }
}
