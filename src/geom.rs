//! Geometric helpers for straight edges and polylines.
//!
//! Everything here works on the flattened graph, so edges are always straight. The curved
//! geometry only comes back in [`crate::curve`].

use kurbo::{Point, Vec2};

/// The horizontal position of the straight edge `p0 -- p1` at height `y`.
///
/// The edge must not be horizontal. `y` is allowed to be slightly outside the edge's
/// vertical range; the result is then extrapolated.
pub(crate) fn x_at_y(p0: Point, p1: Point, y: f64) -> f64 {
    debug_assert!(p0.y != p1.y);
    let t = (y - p0.y) / (p1.y - p0.y);
    p0.x + (p1.x - p0.x) * t
}

/// The height of the straight edge `p0 -- p1` at horizontal position `x`.
pub(crate) fn y_at_x(p0: Point, p1: Point, x: f64) -> f64 {
    if p0.x == p1.x {
        return p0.y;
    }
    let t = (x - p0.x) / (p1.x - p0.x);
    p0.y + (p1.y - p0.y) * t
}

/// Where `p` falls along the edge `a -- b`, as a fraction clamped to `[0, 1]`.
pub(crate) fn project_fraction(p: Point, a: Point, b: Point) -> f64 {
    let d = b - a;
    let len2 = d.hypot2();
    if len2 == 0.0 {
        return 0.0;
    }
    ((p - a).dot(d) / len2).clamp(0.0, 1.0)
}

/// Intersects the infinite lines through `a0 -- a1` and `b0 -- b1`.
///
/// Returns `None` if they are parallel (up to `eps`, measured as the sine of the angle
/// between them).
pub(crate) fn line_crossing(a0: Point, a1: Point, b0: Point, b1: Point, eps: f64) -> Option<Point> {
    let da = a1 - a0;
    let db = b1 - b0;
    let denom = da.cross(db);
    if denom.abs() <= eps * da.hypot() * db.hypot() {
        return None;
    }
    let w = b0 - a0;
    let s = w.cross(db) / denom;
    Some(a0 + da * s)
}

/// The shoelace area of a closed polyline.
///
/// The sign follows kurbo's convention: positive means clockwise when `y` points down.
pub(crate) fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        area += p.x * q.y - q.x * p.y;
    }
    area * 0.5
}

/// Even-odd point containment for a closed polyline.
///
/// The horizontal ray test uses half-open intervals in `y`, so a ray passing exactly
/// through a vertex is counted once.
pub(crate) fn contains(points: &[Point], p: Point) -> bool {
    let n = points.len();
    let mut inside = false;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        if (a.y > p.y) != (b.y > p.y) && p.x < x_at_y(a, b, p.y) {
            inside = !inside;
        }
    }
    inside
}

/// The direction angle of `v`, increasing from the positive `x` axis towards the positive `y`
/// axis.
pub(crate) fn angle(v: Vec2) -> f64 {
    v.y.atan2(v.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_of_diagonals() {
        let p = line_crossing(
            Point::new(0.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 2.0),
            1e-9,
        )
        .unwrap();
        assert_eq!(p, Point::new(1.0, 1.0));
    }

    #[test]
    fn parallel_edges_do_not_cross() {
        assert!(line_crossing(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 1.0),
            1e-9,
        )
        .is_none());
    }

    #[test]
    fn square_area_and_containment() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert_eq!(signed_area(&square), 1.0);
        assert!(contains(&square, Point::new(0.5, 0.5)));
        assert!(!contains(&square, Point::new(1.5, 0.5)));
        // The ray from here passes through the vertex at (1, 0).
        assert!(!contains(&square, Point::new(-1.0, 0.0)));
    }

    #[test]
    fn x_at_y_interpolates() {
        let x = x_at_y(Point::new(0.0, 0.0), Point::new(4.0, 2.0), 0.5);
        assert_eq!(x, 1.0);
        assert_eq!(project_fraction(Point::new(1.0, 0.5), Point::new(0.0, 0.0), Point::new(4.0, 2.0)), 0.25);
    }
}
