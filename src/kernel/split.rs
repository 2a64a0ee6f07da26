//! Polygon bisection

use super::edge_processor::EdgeProcessor;
use super::ops::BooleanOp;
use crate::geometry::{BBox, Polygon};

/// Cut a polygon in two along the longer side of its bounding box
///
/// Returns the pieces of both halves; a polygon that cannot be cut any
/// further (one database unit wide) comes back unchanged.
pub fn split_polygon(poly: &Polygon) -> Vec<Polygon> {
    let b = poly.bbox();
    if b.is_empty() {
        return Vec::new();
    }
    let (first, second) = if b.width() >= b.height() {
        if b.width() < 2 {
            return vec![poly.clone()];
        }
        let xm = b.center().x;
        (
            BBox::from_coords(b.left(), b.bottom(), xm, b.top()),
            BBox::from_coords(xm, b.bottom(), b.right(), b.top()),
        )
    } else {
        if b.height() < 2 {
            return vec![poly.clone()];
        }
        let ym = b.center().y;
        (
            BBox::from_coords(b.left(), b.bottom(), b.right(), ym),
            BBox::from_coords(b.left(), ym, b.right(), b.top()),
        )
    };

    let mut result = Vec::new();
    for half in [first, second] {
        let mut ep = EdgeProcessor::new();
        ep.insert_polygon(poly, 0);
        ep.insert_polygon(&Polygon::from_box(&half), 1);
        result.extend(ep.process(&BooleanOp::And));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn test_split_keeps_area() {
        let l_shape = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 10),
            Point::new(10, 10),
            Point::new(10, 40),
            Point::new(0, 40),
        ]);
        let parts = split_polygon(&l_shape);
        assert_eq!(parts.len(), 2);
        let total: f64 = parts.iter().map(|p| p.area()).sum();
        assert_eq!(total, l_shape.area());
        assert!(parts.iter().all(|p| p.bbox().width() <= 50));
    }
}
