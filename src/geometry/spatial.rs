//! Spatial indexing for box scanning
//!
//! This module provides R-tree based box scanners: a set of tagged bounding
//! boxes bulk-loaded into an `rstar::RTree` and queried with a search box
//! expanded by an interaction distance.

use super::types::{BBox, Coord};
use rstar::{RTree, RTreeObject, AABB};

/// Bounding box entry for R-tree indexing, tagged with an index
#[derive(Clone, Debug)]
pub struct BoxEntry {
    pub index: usize,
    pub bounds: AABB<[i64; 2]>,
}

impl BoxEntry {
    pub fn new(index: usize, b: &BBox) -> Self {
        Self {
            index,
            bounds: to_aabb(b),
        }
    }
}

impl RTreeObject for BoxEntry {
    type Envelope = AABB<[i64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

fn to_aabb(b: &BBox) -> AABB<[i64; 2]> {
    AABB::from_corners(
        [b.p1.x as i64, b.p1.y as i64],
        [b.p2.x as i64, b.p2.y as i64],
    )
}

/// Single-layer box scanner over indexed bounding boxes
pub struct BoxScanner {
    tree: RTree<BoxEntry>,
}

impl BoxScanner {
    /// Build the index from `(index, box)` pairs; empty boxes are skipped
    pub fn new<I>(boxes: I) -> Self
    where
        I: IntoIterator<Item = (usize, BBox)>,
    {
        let entries: Vec<BoxEntry> = boxes
            .into_iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(i, b)| BoxEntry::new(i, &b))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Indexes of all boxes touching `b` expanded by `dist`
    pub fn query(&self, b: &BBox, dist: Coord) -> impl Iterator<Item = usize> + '_ {
        if b.is_empty() {
            return Vec::new().into_iter();
        }
        let d = dist.max(0) as i64;
        let search = AABB::from_corners(
            [b.p1.x as i64 - d, b.p1.y as i64 - d],
            [b.p2.x as i64 + d, b.p2.y as i64 + d],
        );
        let hits: Vec<usize> = self.tree.locate_in_envelope_intersecting(&search).map(|e| e.index).collect();
        hits.into_iter()
    }

    /// Report every unordered pair `(i, j)` with `i < j` whose boxes are within `dist`
    pub fn scan_pairs<F>(&self, dist: Coord, mut f: F)
    where
        F: FnMut(usize, usize),
    {
        let d = dist.max(0) as i64;
        for e in self.tree.iter() {
            let lo = e.bounds.lower();
            let hi = e.bounds.upper();
            let search = AABB::from_corners([lo[0] - d, lo[1] - d], [hi[0] + d, hi[1] + d]);
            for other in self.tree.locate_in_envelope_intersecting(&search) {
                if e.index < other.index {
                    f(e.index, other.index);
                }
            }
        }
    }
}

/// Two-layer box scanner: reports (first, second) candidate pairs within a distance
pub fn scan_two_layers<F>(first: &[(usize, BBox)], second: &BoxScanner, dist: Coord, mut f: F)
where
    F: FnMut(usize, usize),
{
    for (i, b) in first {
        for j in second.query(b, dist) {
            f(*i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_with_distance() {
        let scanner = BoxScanner::new(vec![
            (0, BBox::from_coords(0, 0, 10, 10)),
            (1, BBox::from_coords(20, 0, 30, 10)),
            (2, BBox::empty()),
        ]);
        assert_eq!(scanner.len(), 2);

        let window = BBox::from_coords(12, 0, 15, 5);
        let mut hits: Vec<usize> = scanner.query(&window, 0).collect();
        assert!(hits.is_empty());

        hits = scanner.query(&window, 2).collect();
        assert_eq!(hits, vec![0]);

        hits = scanner.query(&window, 5).collect();
        hits.sort();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_scan_pairs() {
        let scanner = BoxScanner::new(vec![
            (0, BBox::from_coords(0, 0, 10, 10)),
            (1, BBox::from_coords(10, 0, 20, 10)),
            (2, BBox::from_coords(50, 0, 60, 10)),
        ]);
        let mut pairs = Vec::new();
        scanner.scan_pairs(0, |a, b| pairs.push((a, b)));
        assert_eq!(pairs, vec![(0, 1)]);
    }
}
