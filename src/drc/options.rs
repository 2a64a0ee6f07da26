//! DRC check options
//!
//! Options are serde-serializable so rule decks can keep them as JSON.

use crate::geometry::Coord;
use crate::ops::PropertyConstraint;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Distance metric of the edge relation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MetricsType {
    /// Real distance, round corner regions
    #[default]
    Euclidean,
    /// Square corner regions extending by the distance beyond the edge ends
    Square,
    /// Only the strip perpendicular to the edge
    Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OppositeFilter {
    #[default]
    NoOppositeFilter,
    /// Keep only errors with a matching error on the opposite side
    OnlyOpposite,
    /// Keep only errors without a matching error on the opposite side
    NotOpposite,
}

/// Rectangle error waiving: which patterns of violated sides may be dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RectFilter(pub u32);

impl RectFilter {
    pub const NO_RECT_FILTER: RectFilter = RectFilter(0);
    pub const ONE_SIDE_ALLOWED: RectFilter = RectFilter(1);
    pub const TWO_CONNECTED_SIDES_ALLOWED: RectFilter = RectFilter(2);
    pub const TWO_OPPOSITE_SIDES_ALLOWED: RectFilter = RectFilter(4);
    pub const THREE_SIDES_ALLOWED: RectFilter = RectFilter(8);
    pub const FOUR_SIDES_ALLOWED: RectFilter = RectFilter(16);
    pub const TWO_SIDES_ALLOWED: RectFilter = RectFilter(6);
    pub const ALWAYS: RectFilter = RectFilter(31);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: RectFilter) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Side patterns (bit 0 = first side, counter-clockwise) that may be waived
    pub fn allowed_patterns(self) -> Vec<u8> {
        let table = [
            (Self::ONE_SIDE_ALLOWED, 0b0001),
            (Self::TWO_CONNECTED_SIDES_ALLOWED, 0b0011),
            (Self::TWO_OPPOSITE_SIDES_ALLOWED, 0b0101),
            (Self::THREE_SIDES_ALLOWED, 0b0111),
            (Self::FOUR_SIDES_ALLOWED, 0b1111),
        ];
        table
            .iter()
            .filter(|(f, _)| self.contains(*f))
            .map(|(_, p)| *p)
            .collect()
    }

    /// Whether an error pattern over the four sides is waived, under any rotation
    pub fn waives(self, pattern: u8) -> bool {
        let pattern = pattern & 0xf;
        if pattern == 0 {
            return false;
        }
        let allowed = self.allowed_patterns();
        (0..4).any(|r| {
            let rotated = ((pattern << r) | (pattern >> (4 - r))) & 0xf;
            allowed.contains(&rotated)
        })
    }
}

impl BitOr for RectFilter {
    type Output = RectFilter;

    fn bitor(self, rhs: RectFilter) -> RectFilter {
        RectFilter(self.0 | rhs.0)
    }
}

/// Options of region checks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionCheckOptions {
    /// Report the full edges instead of the violating parts
    pub whole_edges: bool,
    pub metrics: MetricsType,
    /// Edge pairs enclosing this angle (degree) or more are not checked
    pub ignore_angle: f64,
    pub min_projection: Coord,
    /// Upper projection limit (exclusive); `None` means unlimited
    pub max_projection: Option<Coord>,
    /// Suppress errors hidden behind other edges
    pub shielded: bool,
    pub opposite_filter: OppositeFilter,
    pub rect_filter: RectFilter,
    /// Output the edges not involved in errors
    pub negative: bool,
    pub prop_constraint: PropertyConstraint,
}

impl Default for RegionCheckOptions {
    fn default() -> Self {
        Self {
            whole_edges: false,
            metrics: MetricsType::Euclidean,
            ignore_angle: 90.0,
            min_projection: 0,
            max_projection: None,
            shielded: true,
            opposite_filter: OppositeFilter::NoOppositeFilter,
            rect_filter: RectFilter::NO_RECT_FILTER,
            negative: false,
            prop_constraint: PropertyConstraint::IgnoreProperties,
        }
    }
}

impl RegionCheckOptions {
    /// True if unmerged input could produce spurious or split results
    pub fn needs_merged(&self) -> bool {
        self.negative
            || self.opposite_filter != OppositeFilter::NoOppositeFilter
            || !self.rect_filter.is_empty()
            || self.min_projection > 0
            || self.max_projection.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_filter_patterns() {
        let opposite = 0b0101;
        assert!(RectFilter::TWO_OPPOSITE_SIDES_ALLOWED.waives(opposite));
        assert!(RectFilter::TWO_OPPOSITE_SIDES_ALLOWED.waives(0b1010));
        assert!(!RectFilter::ONE_SIDE_ALLOWED.waives(opposite));
        assert!(!(RectFilter::THREE_SIDES_ALLOWED | RectFilter::FOUR_SIDES_ALLOWED).waives(opposite));
        assert!(RectFilter::TWO_SIDES_ALLOWED.waives(0b1001));
        assert!(RectFilter::ONE_SIDE_ALLOWED.waives(0b0100));
        assert!(!RectFilter::ALWAYS.waives(0));
    }

    #[test]
    fn test_options_from_json() {
        let opts: RegionCheckOptions =
            serde_json::from_str(r#"{"metrics": "Projection", "rect_filter": 4, "negative": true}"#).unwrap();
        assert_eq!(opts.metrics, MetricsType::Projection);
        assert_eq!(opts.rect_filter, RectFilter::TWO_OPPOSITE_SIDES_ALLOWED);
        assert!(opts.shielded);
        assert!(opts.needs_merged());
        assert!(!RegionCheckOptions::default().needs_merged());
    }
}
