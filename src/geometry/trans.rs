//! Cell instance transformations
//!
//! `ICplxTrans` combines one of the eight orthogonal orientations (rotation by
//! multiples of 90 degree, optionally mirrored at the x axis first), a
//! magnification and a displacement. Applying it to integer points rounds to
//! the database grid when the magnification is not one.

use super::types::{BBox, Coord, Point, Vector};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Fixpoint orientation codes
pub mod orientation {
    pub const R0: u8 = 0;
    pub const R90: u8 = 1;
    pub const R180: u8 = 2;
    pub const R270: u8 = 3;
    pub const M0: u8 = 4;
    pub const M45: u8 = 5;
    pub const M90: u8 = 6;
    pub const M135: u8 = 7;
}

type Matrix = [[i64; 2]; 2];

fn matrix(code: u8) -> Matrix {
    let rot: Matrix = match code % 4 {
        0 => [[1, 0], [0, 1]],
        1 => [[0, -1], [1, 0]],
        2 => [[-1, 0], [0, -1]],
        _ => [[0, 1], [-1, 0]],
    };
    if code >= 4 {
        // mirror at x axis, then rotate
        [[rot[0][0], -rot[0][1]], [rot[1][0], -rot[1][1]]]
    } else {
        rot
    }
}

fn from_matrix(m: &Matrix) -> u8 {
    (0..8u8).find(|&c| &matrix(c) == m).unwrap_or(0)
}

fn mul(a: &Matrix, b: &Matrix) -> Matrix {
    let mut r = [[0i64; 2]; 2];
    for (i, row) in r.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = a[i][0] * b[0][j] + a[i][1] * b[1][j];
        }
    }
    r
}

/// Complex integer transformation: orientation, magnification, displacement
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ICplxTrans {
    rot: u8,
    mag: f64,
    disp: Vector,
}

impl Default for ICplxTrans {
    fn default() -> Self {
        Self::identity()
    }
}

impl PartialEq for ICplxTrans {
    fn eq(&self, other: &Self) -> bool {
        self.rot == other.rot && self.mag.to_bits() == other.mag.to_bits() && self.disp == other.disp
    }
}

impl Eq for ICplxTrans {}

impl Hash for ICplxTrans {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rot.hash(state);
        self.mag.to_bits().hash(state);
        self.disp.hash(state);
    }
}

impl PartialOrd for ICplxTrans {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ICplxTrans {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.rot, self.mag.to_bits(), self.disp).cmp(&(other.rot, other.mag.to_bits(), other.disp))
    }
}

impl ICplxTrans {
    pub const fn identity() -> Self {
        Self {
            rot: 0,
            mag: 1.0,
            disp: Vector::new(0, 0),
        }
    }

    pub fn new(rot: u8, mag: f64, disp: Vector) -> Self {
        assert!(rot < 8, "invalid orientation code {}", rot);
        assert!(mag > 0.0, "magnification must be positive");
        Self { rot, mag, disp }
    }

    pub fn from_disp(disp: Vector) -> Self {
        Self {
            disp,
            ..Self::identity()
        }
    }

    pub fn from_rot(rot: u8) -> Self {
        Self::new(rot, 1.0, Vector::default())
    }

    pub fn from_mag(mag: f64) -> Self {
        Self::new(0, mag, Vector::default())
    }

    pub fn rot(&self) -> u8 {
        self.rot
    }

    pub fn mag(&self) -> f64 {
        self.mag
    }

    pub fn disp(&self) -> Vector {
        self.disp
    }

    pub fn is_mirror(&self) -> bool {
        self.rot >= 4
    }

    pub fn is_identity(&self) -> bool {
        self.rot == 0 && self.mag == 1.0 && self.disp.is_zero()
    }

    /// True if the transformation is a pure shift
    pub fn is_displacement(&self) -> bool {
        self.rot == 0 && self.mag == 1.0
    }

    pub fn has_unit_mag(&self) -> bool {
        self.mag == 1.0
    }

    fn apply_f(&self, x: f64, y: f64) -> (f64, f64) {
        let m = matrix(self.rot);
        (
            (m[0][0] as f64 * x + m[0][1] as f64 * y) * self.mag,
            (m[1][0] as f64 * x + m[1][1] as f64 * y) * self.mag,
        )
    }

    /// Transform a vector (no displacement)
    pub fn apply_vector(&self, v: Vector) -> Vector {
        if self.mag == 1.0 {
            let m = matrix(self.rot);
            let x = m[0][0] * v.x as i64 + m[0][1] * v.y as i64;
            let y = m[1][0] * v.x as i64 + m[1][1] * v.y as i64;
            return Vector::new(x as Coord, y as Coord);
        }
        let (x, y) = self.apply_f(v.x as f64, v.y as f64);
        Vector::new(x.round() as Coord, y.round() as Coord)
    }

    pub fn apply(&self, p: Point) -> Point {
        let v = self.apply_vector(Vector::new(p.x, p.y));
        Point::new(v.x + self.disp.x, v.y + self.disp.y)
    }

    pub fn apply_box(&self, b: &BBox) -> BBox {
        if b.is_empty() {
            return *b;
        }
        BBox::new(self.apply(b.p1), self.apply(b.p2))
    }

    /// Scale a distance by the magnification
    pub fn ctrans(&self, d: Coord) -> Coord {
        (d as f64 * self.mag).round() as Coord
    }

    /// Composition: `(self * other)(p) == self(other(p))`
    pub fn compose(&self, other: &ICplxTrans) -> ICplxTrans {
        let rot = from_matrix(&mul(&matrix(self.rot), &matrix(other.rot)));
        ICplxTrans {
            rot,
            mag: self.mag * other.mag,
            disp: self.apply_vector(other.disp) + self.disp,
        }
    }

    pub fn inverted(&self) -> ICplxTrans {
        let m = matrix(self.rot);
        let mt = [[m[0][0], m[1][0]], [m[0][1], m[1][1]]];
        let rot = from_matrix(&mt);
        let inv = ICplxTrans {
            rot,
            mag: 1.0 / self.mag,
            disp: Vector::default(),
        };
        let d = inv.apply_vector(self.disp);
        ICplxTrans {
            disp: -d,
            ..inv
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation() {
        let t = ICplxTrans::from_rot(orientation::R90);
        assert_eq!(t.apply(Point::new(10, 0)), Point::new(0, 10));
        let m = ICplxTrans::from_rot(orientation::M0);
        assert_eq!(m.apply(Point::new(3, 4)), Point::new(3, -4));
    }

    #[test]
    fn test_compose_and_invert() {
        let a = ICplxTrans::new(orientation::R90, 1.0, Vector::new(100, 0));
        let b = ICplxTrans::new(orientation::M45, 2.0, Vector::new(5, 7));
        let p = Point::new(3, -8);
        assert_eq!(a.compose(&b).apply(p), a.apply(b.apply(p)));

        let inv = a.inverted();
        assert_eq!(inv.apply(a.apply(p)), p);
        assert!(a.compose(&inv).is_identity());
    }

    #[test]
    fn test_magnification_rounds() {
        let t = ICplxTrans::from_mag(0.5);
        assert_eq!(t.apply(Point::new(5, 4)), Point::new(3, 2));
        assert_eq!(t.ctrans(10), 5);
    }
}
