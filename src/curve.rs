//! Restoring exact curves on output contours.
//!
//! The assembled contours are made of flattened lines, but every line remembers the input
//! segment it approximates and where along that segment it sits. Here we walk each contour,
//! find the maximal runs of lines coming from one segment, and replace each run with the
//! exact piece of the original segment. The pieces are cut at the intersections that the
//! sweep found, which we first move onto the exact curves.

use std::collections::BTreeSet;

use kurbo::{CubicBez, Line, ParamCurve, ParamCurveDeriv, PathSeg, Point, QuadBez, Vec2};

use crate::{
    assemble::Patch,
    graph::{Graph, JointIdx, JointKind, JointVec, PathInfoIdx, PathInfoVec},
    num::CheapOrderedFloat,
    options::ClipOptions,
};

/// The split points of one input segment.
///
/// Every output piece of a segment is cut out between two recorded split points, so two
/// pieces that meet at a split agree exactly on the parameter they meet at.
#[derive(Clone, Debug)]
pub struct CurveSpliter {
    seg: PathSeg,
    splits: BTreeSet<CheapOrderedFloat>,
}

impl CurveSpliter {
    /// A spliter for `seg`, knowing only about its endpoints.
    pub fn new(seg: PathSeg) -> Self {
        CurveSpliter {
            seg,
            splits: [0.0, 1.0].into_iter().map(CheapOrderedFloat::from).collect(),
        }
    }

    /// The recorded split closest to `t`, if there's one within `eps`.
    fn snapped(&self, t: f64, eps: f64) -> Option<f64> {
        let lo = CheapOrderedFloat::from(t - eps);
        let hi = CheapOrderedFloat::from(t + eps);
        self.splits
            .range(lo..=hi)
            .map(|s| s.into_inner())
            .min_by_key(|&s| CheapOrderedFloat::from((s - t).abs()))
    }

    /// Records a split at `t`, returning the parameter that was actually recorded.
    ///
    /// If a split was already recorded within `eps` of `t`, that one is reused.
    pub fn split(&mut self, t: f64, eps: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self.snapped(t, eps) {
            Some(s) => s,
            None => {
                self.splits.insert(t.into());
                t
            }
        }
    }

    /// All recorded splits, in increasing order.
    pub fn splits(&self) -> impl Iterator<Item = f64> + '_ {
        self.splits.iter().map(|s| s.into_inner())
    }

    /// The piece of the segment between parameters `t0` and `t1`, running from `from` to `to`.
    ///
    /// The endpoints of the returned piece are exactly `from` and `to`. If the piece is the
    /// whole segment, its control points are returned untouched.
    pub fn query(&self, t0: f64, t1: f64, from: Point, to: Point, eps: f64) -> PathSeg {
        let t0 = self.snapped(t0, eps).unwrap_or(t0);
        let t1 = self.snapped(t1, eps).unwrap_or(t1);
        let (lo, hi) = (t0.min(t1), t0.max(t1));
        let sub = if lo == 0.0 && hi == 1.0 {
            self.seg
        } else {
            self.seg.subsegment(lo..hi)
        };
        let d_start = sub.start().distance_squared(from);
        let d_end = sub.end().distance_squared(from);
        let backwards = if d_start == d_end {
            t0 > t1
        } else {
            d_start > d_end
        };
        let sub = if backwards { sub.reverse() } else { sub };
        with_endpoints(sub, from, to)
    }
}

fn with_endpoints(seg: PathSeg, p0: Point, p1: Point) -> PathSeg {
    match seg {
        PathSeg::Line(_) => PathSeg::Line(Line::new(p0, p1)),
        PathSeg::Quad(q) => PathSeg::Quad(QuadBez::new(p0, q.p1, p1)),
        PathSeg::Cubic(c) => PathSeg::Cubic(CubicBez::new(p0, c.p1, c.p2, p1)),
    }
}

fn tangent(seg: &PathSeg, t: f64) -> Vec2 {
    match seg {
        PathSeg::Line(l) => l.p1 - l.p0,
        PathSeg::Quad(q) => q.deriv().eval(t).to_vec2(),
        PathSeg::Cubic(c) => c.deriv().eval(t).to_vec2(),
    }
}

/// Newton's method for `a(t) == b(s)`, starting from `(t, s)` and staying within the
/// given parameter ranges.
///
/// Returns `None` if the iteration didn't get any closer than where it started.
pub(crate) fn refine_crossing(
    a: &PathSeg,
    b: &PathSeg,
    (mut t, mut s): (f64, f64),
    t_range: (f64, f64),
    s_range: (f64, f64),
    iterations: usize,
) -> Option<(f64, f64)> {
    let start_err = (a.eval(t) - b.eval(s)).hypot();
    let mut err = start_err;
    for _ in 0..iterations {
        if err == 0.0 {
            break;
        }
        let f = a.eval(t) - b.eval(s);
        let c1 = tangent(a, t);
        let c2 = -tangent(b, s);
        let det = c1.cross(c2);
        if det == 0.0 || !det.is_finite() {
            break;
        }
        t = (t + (-f).cross(c2) / det).clamp(t_range.0, t_range.1);
        s = (s + c1.cross(-f) / det).clamp(s_range.0, s_range.1);
        err = (a.eval(t) - b.eval(s)).hypot();
    }
    (err < start_err || start_err == 0.0).then_some((t, s))
}

/// Intersects a curve with a straight segment, picking the crossing closest to `near`.
///
/// Returns the point (on the curve) along with the curve and line parameters.
fn curve_line(curve: &PathSeg, line: Line, near: Point) -> Option<(Point, f64, f64)> {
    curve
        .intersect_line(line)
        .into_iter()
        .map(|hit| (curve.eval(hit.segment_t), hit.segment_t, hit.line_t))
        .min_by_key(|(p, _, _)| CheapOrderedFloat::from(p.distance_squared(near)))
}

/// An intersection joint moved onto the exact input segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedPoint {
    /// The exact position, shared by both joints of the intersection pair.
    pub point: Point,
    /// The parameter along the joint's own input segment.
    pub t: f64,
}

/// The output of curve restoration: a graph of [`JointKind::Final`] rings.
pub(crate) struct Restored {
    pub graph: Graph,
    /// The first joint of each patch's ring, in the same order as the patches.
    pub starts: Vec<JointIdx>,
}

/// The state of curve restoration, built up lazily as contours are walked.
struct Restorer<'a> {
    graph: &'a Graph,
    options: &'a ClipOptions,
    spliters: PathInfoVec<Option<CurveSpliter>>,
    fixed_points: JointVec<Option<FixedPoint>>,
}

/// Replaces the flattened lines of every patch by exact curve pieces.
pub(crate) fn restore(graph: &Graph, patches: &[Patch], options: &ClipOptions) -> Restored {
    let mut restorer = Restorer {
        graph,
        options,
        spliters: PathInfoVec::filled(graph.infos().len(), None),
        fixed_points: JointVec::filled(graph.joints().len(), None),
    };
    let mut out = Graph {
        infos: graph.infos.clone(),
        ..Graph::default()
    };
    let starts = patches
        .iter()
        .map(|patch| restorer.restore_ring(&mut out, patch.start))
        .collect();
    tracing::debug!(
        spliters = restorer.spliters.iter().filter(|(_, s)| s.is_some()).count(),
        fixed_points = restorer.fixed_points.iter().filter(|(_, f)| f.is_some()).count(),
        "restored curves"
    );
    Restored { graph: out, starts }
}

impl Restorer<'_> {
    fn kind(&self, j: JointIdx) -> JointKind {
        self.graph.joints()[j].kind
    }

    fn spliter(&mut self, info: PathInfoIdx) -> &mut CurveSpliter {
        let seg = self.graph.infos()[info].seg;
        self.spliters[info].get_or_insert_with(|| CurveSpliter::new(seg))
    }

    /// The parameters of the nearest non-intersection joints on either side of `j`.
    fn bracket(&self, j: JointIdx) -> (f64, f64) {
        let graph = self.graph;
        let mut ends = [0.0, 1.0];
        for (dir, end) in ends.iter_mut().enumerate() {
            let mut cur = j;
            for _ in 0..graph.joints().len() {
                let line = if dir == 0 {
                    graph.joints()[cur].prev
                } else {
                    graph.joints()[cur].next
                };
                cur = graph.other_joint(line, cur);
                if !graph.joints()[cur].is_intersect() {
                    *end = graph.param_at(cur, line);
                    break;
                }
            }
        }
        (ends[0].min(ends[1]), ends[0].max(ends[1]))
    }

    /// Moves the intersection pair containing `j` onto the exact segments.
    fn fixed_point(&mut self, j: JointIdx) -> Option<FixedPoint> {
        if let Some(fp) = self.fixed_points[j] {
            return Some(fp);
        }
        let JointKind::Intersect {
            info: info_a,
            t: t_a,
            symmetric,
            ..
        } = self.kind(j)
        else {
            return None;
        };
        let JointKind::Intersect {
            info: info_b,
            t: t_b,
            ..
        } = self.kind(symmetric)
        else {
            return None;
        };
        let approx = self.graph.joints()[j].point;
        let a = self.graph.infos()[info_a].seg;
        let b = self.graph.infos()[info_b].seg;

        let (point, t_a, t_b) = match (a, b) {
            (PathSeg::Line(_), PathSeg::Line(_)) => (approx, t_a, t_b),
            (curve, PathSeg::Line(line)) => match curve_line(&curve, line, approx) {
                Some((p, tc, tl)) => (p, tc, tl),
                None => (approx, t_a, t_b),
            },
            (PathSeg::Line(line), curve) => match curve_line(&curve, line, approx) {
                Some((p, tc, tl)) => (p, tl, tc),
                None => (approx, t_a, t_b),
            },
            (a, b) => {
                let refined = refine_crossing(
                    &a,
                    &b,
                    (t_a, t_b),
                    self.bracket(j),
                    self.bracket(symmetric),
                    self.options.newton_iterations,
                );
                match refined {
                    Some((ta, tb)) => (a.eval(ta).midpoint(b.eval(tb)), ta, tb),
                    None => (approx, t_a, t_b),
                }
            }
        };

        let eps = self.options.param_eps;
        let t_a = self.spliter(info_a).split(t_a, eps);
        let t_b = self.spliter(info_b).split(t_b, eps);
        let fa = FixedPoint { point, t: t_a };
        let fb = FixedPoint { point, t: t_b };
        self.fixed_points[j] = Some(fa);
        self.fixed_points[symmetric] = Some(fb);
        tracing::trace!(?j, ?symmetric, ?point, t_a, t_b, "fixed intersection");
        Some(fa)
    }

    /// Is the mirror joint `m` a place where one exact piece ends and the next begins?
    fn is_anchor(&self, m: JointIdx) -> bool {
        match self.kind(m) {
            JointKind::Mirror {
                of: [arrive, depart],
            } => {
                arrive != depart
                    || matches!(
                        self.kind(depart),
                        JointKind::End { .. } | JointKind::Intersect { .. }
                    )
            }
            _ => true,
        }
    }

    /// The exact position of the anchor `m`.
    fn anchor_point(&mut self, m: JointIdx) -> Point {
        if let JointKind::Mirror { of: [_, depart] } = self.kind(m) {
            if let Some(fp) = self.fixed_point(depart) {
                return fp.point;
            }
        }
        self.graph.joints()[m].point
    }

    /// The exact parameter at which the contour leaves (`side == 1`) or arrives at
    /// (`side == 0`) the anchor `m`, given the flattened parameter `t`.
    fn anchor_param(&mut self, m: JointIdx, side: usize, t: f64) -> f64 {
        if let JointKind::Mirror { of } = self.kind(m) {
            if let Some(fp) = self.fixed_point(of[side]) {
                return fp.t;
            }
        }
        t
    }

    fn restore_ring(&mut self, out: &mut Graph, start: JointIdx) -> JointIdx {
        let graph = self.graph;
        let ring: Vec<JointIdx> = graph.ring(start).collect();
        let n = ring.len();
        let mut anchors: Vec<usize> = (0..n).filter(|&k| self.is_anchor(ring[k])).collect();
        if anchors.is_empty() {
            anchors.push(0);
        }
        let points: Vec<Point> = anchors.iter().map(|&k| self.anchor_point(ring[k])).collect();

        let first = out.push_joint(points[0], JointKind::Final { control: false });
        let mut cur = first;
        for (i, &a) in anchors.iter().enumerate() {
            let next = (i + 1) % anchors.len();
            let b = anchors[next];
            let len = match (b + n - a) % n {
                0 => n,
                len => len,
            };
            let first_line = graph.lines()[graph.joints()[ring[a]].next];
            let last_line = graph.lines()[graph.joints()[ring[(a + len) % n]].prev];
            let info = first_line.info;
            let t0 = self.anchor_param(ring[a], 1, first_line.t[0]);
            let t1 = self.anchor_param(ring[(a + len) % n], 0, last_line.t[1]);
            let (from, to) = (points[i], points[next]);

            let seg = match graph.infos()[info].seg {
                PathSeg::Line(_) => PathSeg::Line(Line::new(from, to)),
                _ => {
                    let eps = self.options.param_eps;
                    self.spliter(info).query(t0, t1, from, to, eps)
                }
            };
            let controls: Vec<Point> = match seg {
                PathSeg::Line(_) => Vec::new(),
                PathSeg::Quad(q) => vec![q.p1],
                PathSeg::Cubic(c) => vec![c.p1, c.p2],
            };
            for p in controls {
                let c = out.push_joint(p, JointKind::Final { control: true });
                out.link(cur, c, info, [t0, t1]);
                cur = c;
            }
            let end = if next == 0 {
                first
            } else {
                out.push_joint(to, JointKind::Final { control: false })
            };
            out.link(cur, end, info, [t0, t1]);
            cur = end;
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch() -> PathSeg {
        PathSeg::Cubic(CubicBez::new(
            (0.0, 0.0),
            (0.0, -1.0),
            (2.0, -1.0),
            (2.0, 0.0),
        ))
    }

    #[test]
    fn whole_segment_is_untouched() {
        let spliter = CurveSpliter::new(arch());
        let seg = spliter.query(0.0, 1.0, Point::new(0.0, 0.0), Point::new(2.0, 0.0), 1e-6);
        assert_eq!(seg, arch());

        let seg = spliter.query(1.0, 0.0, Point::new(2.0, 0.0), Point::new(0.0, 0.0), 1e-6);
        assert_eq!(seg, arch().reverse());
    }

    #[test]
    fn pieces_meet_exactly() {
        let mut spliter = CurveSpliter::new(arch());
        let t = spliter.split(0.3, 1e-6);
        assert_eq!(t, 0.3);
        // Close enough to reuse the existing split.
        assert_eq!(spliter.split(0.3 + 1e-8, 1e-6), 0.3);
        assert_eq!(spliter.splits().collect::<Vec<_>>(), vec![0.0, 0.3, 1.0]);

        let mid = Point::new(0.7, -0.6);
        let left = spliter.query(0.0, 0.3 + 1e-9, Point::new(0.0, 0.0), mid, 1e-6);
        let right = spliter.query(0.3, 1.0, mid, Point::new(2.0, 0.0), 1e-6);
        assert_eq!(left.end(), mid);
        assert_eq!(right.start(), mid);
        let exact = arch().subsegment(0.0..0.3);
        let PathSeg::Cubic(left) = left else {
            panic!("expected a cubic");
        };
        let PathSeg::Cubic(exact) = exact else {
            panic!("expected a cubic");
        };
        assert_eq!(left.p1, exact.p1);
        assert_eq!(left.p2, exact.p2);
    }

    #[test]
    fn backwards_pieces_are_reversed() {
        let spliter = CurveSpliter::new(arch());
        let from = arch().eval(0.5);
        let seg = spliter.query(0.5, 0.0, from, Point::new(0.0, 0.0), 1e-6);
        assert_eq!(seg.start(), from);
        assert_eq!(seg.end(), Point::new(0.0, 0.0));
        assert!((seg.eval(0.5) - arch().eval(0.25)).hypot() < 1e-12);
    }

    #[test]
    fn newton_finds_the_crossing() {
        let a = PathSeg::Quad(QuadBez::new((0.0, 0.0), (1.0, 2.0), (2.0, 0.0)));
        let b = PathSeg::Quad(QuadBez::new((0.0, 1.0), (1.0, -1.0), (2.0, 1.0)));
        let (t, s) = refine_crossing(&a, &b, (0.15, 0.16), (0.0, 0.5), (0.0, 0.5), 24).unwrap();
        let exact = (2.0 - 2f64.sqrt()) / 4.0;
        assert!((t - exact).abs() < 1e-12);
        assert!((s - exact).abs() < 1e-12);
    }

    #[test]
    fn curve_line_crossing_is_on_the_curve() {
        let line = Line::new((-1.0, -0.5), (3.0, -0.5));
        let (p, tc, tl) = curve_line(&arch(), line, Point::new(0.1, -0.5)).unwrap();
        assert!((p.y + 0.5).abs() < 1e-9);
        assert!(p.x < 1.0);
        assert!((arch().eval(tc) - p).hypot() < 1e-12);
        assert!((line.eval(tl) - p).hypot() < 1e-9);
    }
}
