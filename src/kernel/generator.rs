//! Polygon generator
//!
//! Stitches directed boundary edges (interior on the left) into closed
//! contours. At vertices with several continuations the walk takes the
//! leftmost turn, so polygons touching at a corner come out separately.
//! Counter-clockwise contours become hulls and clockwise ones holes, each
//! hole assigned to the smallest hull containing it.

use crate::geometry::{contour_area2, Edge, Point, Polygon};
use std::collections::HashMap;

fn turn_angle(din: (i64, i64), dout: (i64, i64)) -> f64 {
    let cross = (din.0 * dout.1 - din.1 * dout.0) as f64;
    let dot = (din.0 * dout.0 + din.1 * dout.1) as f64;
    cross.atan2(dot)
}

fn direction(e: &Edge) -> (i64, i64) {
    (e.dx(), e.dy())
}

/// Walk the edge graph into closed point sequences
fn walk_contours(edges: &[Edge]) -> Vec<Vec<Point>> {
    let mut outgoing: HashMap<Point, Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.p1).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut contours = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let origin = edges[start].p1;
        let mut pts = Vec::new();
        let mut cur = start;
        loop {
            used[cur] = true;
            let e = edges[cur];
            pts.push(e.p1);
            if e.p2 == origin {
                break;
            }
            let din = direction(&e);
            let next = outgoing
                .get(&e.p2)
                .into_iter()
                .flatten()
                .copied()
                .filter(|&c| !used[c])
                .max_by(|&a, &b| {
                    turn_angle(din, direction(&edges[a])).total_cmp(&turn_angle(din, direction(&edges[b])))
                });
            match next {
                Some(n) => cur = n,
                None => break,
            }
        }
        contours.push(pts);
    }
    contours
}

/// Build polygons from directed boundary edges
pub fn assemble_polygons(edges: Vec<Edge>) -> Vec<Polygon> {
    let contours = walk_contours(&edges);

    let mut hulls: Vec<(Polygon, i128)> = Vec::new();
    let mut holes: Vec<Vec<Point>> = Vec::new();
    for c in contours {
        let a = contour_area2(&c);
        if a > 0 {
            let p = Polygon::new(c);
            if !p.is_empty() {
                hulls.push((p, a));
            }
        } else if a < 0 {
            holes.push(c);
        }
    }

    let mut hole_lists: Vec<Vec<Vec<Point>>> = vec![Vec::new(); hulls.len()];
    for hole in holes {
        let owner = hulls
            .iter()
            .enumerate()
            .filter(|(_, (h, _))| hole.iter().all(|&p| h.bbox().contains(p)))
            .filter(|(_, (h, _))| {
                hole.iter()
                    .find_map(|&p| h.classify(p))
                    .unwrap_or(true)
            })
            .min_by_key(|(_, (_, a))| *a)
            .map(|(i, _)| i);
        if let Some(i) = owner {
            hole_lists[i].push(hole);
        }
    }

    let mut result: Vec<Polygon> = hulls
        .into_iter()
        .zip(hole_lists)
        .map(|((h, _), hs)| {
            if hs.is_empty() {
                h
            } else {
                Polygon::with_holes(h.hull().to_vec(), hs)
            }
        })
        .filter(|p| !p.is_empty())
        .collect();
    result.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::box_polygon;

    #[test]
    fn test_simple_box() {
        let edges: Vec<Edge> = box_polygon(0, 0, 10, 10).edges().collect();
        assert_eq!(assemble_polygons(edges), vec![box_polygon(0, 0, 10, 10)]);
    }

    #[test]
    fn test_hole_assignment() {
        let outer = box_polygon(0, 0, 100, 100);
        let inner = box_polygon(10, 10, 20, 20);
        let other = box_polygon(200, 0, 210, 10);
        let mut edges: Vec<Edge> = outer.edges().collect();
        edges.extend(inner.edges().map(|e| e.swapped()));
        edges.extend(other.edges());
        let res = assemble_polygons(edges);
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].holes().len(), 1);
        assert_eq!(res[0].area(), 10000.0 - 100.0);
        assert!(res[1].holes().is_empty());
    }
}
