//! Turning input paths into flattened polygons.

use kurbo::{CubicBez, Line, ParamCurve, PathEl, PathSeg, Point, QuadBez};

use crate::{
    error::{Error, InvalidPathError},
    graph::{Graph, JointIdx, JointKind, PathInfoIdx, Polygon},
    options::ClipOptions,
};

/// The segments of one subpath, in drawing order.
struct Subpath {
    start: Point,
    last: Point,
    segs: Vec<PathSeg>,
}

impl Subpath {
    fn new(start: Point) -> Self {
        Subpath {
            start,
            last: start,
            segs: Vec::new(),
        }
    }

    fn push(&mut self, seg: PathSeg, options: &ClipOptions) -> Result<(), InvalidPathError> {
        let p0 = seg_start(&seg);
        let (far, end) = match seg {
            PathSeg::Line(l) => (p0.distance(l.p1), l.p1),
            PathSeg::Quad(q) => (p0.distance(q.p1).max(p0.distance(q.p2)), q.p2),
            PathSeg::Cubic(c) => (
                p0.distance(c.p1)
                    .max(p0.distance(c.p2))
                    .max(p0.distance(c.p3)),
                c.p3,
            ),
        };
        if far <= options.length_eps {
            return Err(InvalidPathError::ZeroLengthSegment { x: p0.x, y: p0.y });
        }
        self.last = end;
        self.segs.push(seg);
        Ok(())
    }

    /// Adds the closing edge, if there's a gap to close.
    fn close(&mut self, options: &ClipOptions) {
        if self.last.distance(self.start) > options.length_eps {
            self.segs.push(PathSeg::Line(Line::new(self.last, self.start)));
        }
        self.last = self.start;
    }
}

fn check_finite(el: &PathEl) -> Result<(), InvalidPathError> {
    let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
    let ok = match el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => finite(p),
        PathEl::QuadTo(p1, p2) => finite(p1) && finite(p2),
        PathEl::CurveTo(p1, p2, p3) => finite(p1) && finite(p2) && finite(p3),
        PathEl::ClosePath => true,
    };
    if ok {
        Ok(())
    } else {
        Err(InvalidPathError::NonFinite)
    }
}

/// Splits a command stream into subpaths, validating it along the way.
fn subpaths(
    elements: impl IntoIterator<Item = PathEl>,
    options: &ClipOptions,
) -> Result<Vec<Subpath>, InvalidPathError> {
    let mut ret = Vec::new();
    let mut cur: Option<Subpath> = None;
    for el in elements {
        check_finite(&el)?;
        match el {
            PathEl::MoveTo(p) => {
                if let Some(mut sub) = cur.take() {
                    sub.close(options);
                    ret.push(sub);
                }
                cur = Some(Subpath::new(p));
            }
            PathEl::ClosePath => {
                let mut sub = cur.take().ok_or(InvalidPathError::MissingMoveTo)?;
                sub.close(options);
                let start = sub.start;
                ret.push(sub);
                // Drawing after a close continues from the start of the closed subpath.
                cur = Some(Subpath::new(start));
            }
            PathEl::LineTo(p) => {
                let sub = cur.as_mut().ok_or(InvalidPathError::MissingMoveTo)?;
                sub.push(PathSeg::Line(Line::new(sub.last, p)), options)?;
            }
            PathEl::QuadTo(p1, p2) => {
                let sub = cur.as_mut().ok_or(InvalidPathError::MissingMoveTo)?;
                sub.push(PathSeg::Quad(QuadBez::new(sub.last, p1, p2)), options)?;
            }
            PathEl::CurveTo(p1, p2, p3) => {
                let sub = cur.as_mut().ok_or(InvalidPathError::MissingMoveTo)?;
                sub.push(PathSeg::Cubic(CubicBez::new(sub.last, p1, p2, p3)), options)?;
            }
        }
    }
    if let Some(mut sub) = cur {
        sub.close(options);
        ret.push(sub);
    }

    ret.retain(|sub| !sub.segs.is_empty());
    for sub in &ret {
        // Two straight edges, or a lone quadratic, can only trace back over themselves.
        let degrees: usize = sub.segs.iter().map(degree).sum();
        if degrees < 3 {
            return Err(InvalidPathError::Collapsed {
                x: sub.start.x,
                y: sub.start.y,
            });
        }
    }
    Ok(ret)
}

fn seg_start(seg: &PathSeg) -> Point {
    match seg {
        PathSeg::Line(l) => l.p0,
        PathSeg::Quad(q) => q.p0,
        PathSeg::Cubic(c) => c.p0,
    }
}

fn degree(seg: &PathSeg) -> usize {
    match seg {
        PathSeg::Line(_) => 1,
        PathSeg::Quad(_) => 2,
        PathSeg::Cubic(_) => 3,
    }
}

/// How many straight pieces to flatten `seg` into.
fn steps(seg: &PathSeg, options: &ClipOptions) -> usize {
    match seg {
        PathSeg::Line(_) => 1,
        PathSeg::Quad(q) => {
            let dd = (q.p0.to_vec2() - 2.0 * q.p1.to_vec2() + q.p2.to_vec2()).hypot();
            options.flatten_steps(2, dd)
        }
        PathSeg::Cubic(c) => {
            let dd0 = (c.p0.to_vec2() - 2.0 * c.p1.to_vec2() + c.p2.to_vec2()).hypot();
            let dd1 = (c.p1.to_vec2() - 2.0 * c.p2.to_vec2() + c.p3.to_vec2()).hypot();
            options.flatten_steps(3, dd0.max(dd1))
        }
    }
}

fn build_polygon(sub: &Subpath, options: &ClipOptions) -> Polygon {
    let mut graph = Graph::default();
    let infos: Vec<PathInfoIdx> = sub.segs.iter().map(|seg| graph.push_info(*seg)).collect();
    let n = infos.len();

    // (joint, info of the line leaving it, parameter of the joint along that info)
    let mut ring: Vec<(JointIdx, PathInfoIdx, f64)> = Vec::new();
    for (i, seg) in sub.segs.iter().enumerate() {
        let info = infos[i];
        let end = graph.push_joint(
            seg_start(seg),
            JointKind::End {
                info: [infos[(i + n - 1) % n], info],
            },
        );
        ring.push((end, info, 0.0));
        let steps = steps(seg, options);
        for k in 1..steps {
            let t = k as f64 / steps as f64;
            let j = graph.push_joint(seg.eval(t), JointKind::Interpolate { info, t });
            ring.push((j, info, t));
        }
    }

    for (k, &(j, info, t)) in ring.iter().enumerate() {
        let (next, _, next_t) = ring[(k + 1) % ring.len()];
        // The next joint starts a new segment, so it sits at the end of this one.
        let next_t = if next_t == 0.0 { 1.0 } else { next_t };
        graph.link(j, next, info, [t, next_t]);
    }

    Polygon {
        graph,
        start: ring[0].0,
    }
}

/// Splits a path into one flattened polygon per subpath.
///
/// Subpaths that aren't explicitly closed are closed with a straight edge. Straight segments
/// become one line each; curves are subdivided uniformly in their parameter, with a step
/// count chosen from the curve's control polygon and `options.flatten_tolerance`.
pub fn create_polygons(
    elements: impl IntoIterator<Item = PathEl>,
    options: &ClipOptions,
) -> Result<Vec<Polygon>, Error> {
    let subs = subpaths(elements, options)?;
    let polys: Vec<Polygon> = subs.iter().map(|sub| build_polygon(sub, options)).collect();
    tracing::debug!(
        subpaths = polys.len(),
        joints = polys.iter().map(|p| p.graph.joints().len()).sum::<usize>(),
        "flattened input"
    );
    Ok(polys)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use kurbo::BezPath;

    use super::*;

    fn polys(path: &BezPath) -> Result<Vec<Polygon>, Error> {
        create_polygons(path.elements().iter().copied(), &ClipOptions::default())
    }

    #[test]
    fn square_is_one_ring() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 0.0));
        path.line_to((1.0, 1.0));
        path.line_to((0.0, 1.0));
        path.close_path();
        let polys = polys(&path).unwrap();
        assert_eq!(polys.len(), 1);
        assert_eq!(polys[0].len(), 4);
        assert!(!polys[0].is_empty());
        assert_eq!(polys[0].graph().infos().len(), 4);
        assert_eq!(polys[0].signed_area(), 1.0);
    }

    #[test]
    fn open_subpaths_get_closed() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 0.0));
        path.line_to((1.0, 1.0));
        path.move_to((5.0, 5.0));
        path.line_to((6.0, 5.0));
        path.line_to((6.0, 6.0));
        let polys = polys(&path).unwrap();
        assert_eq!(polys.len(), 2);
        assert!(polys.iter().all(|p| p.len() == 3));
    }

    #[test]
    fn curves_are_flattened_with_parameters() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.curve_to((0.0, -10.0), (20.0, -10.0), (20.0, 0.0));
        path.close_path();
        let polys = polys(&path).unwrap();
        let poly = &polys[0];
        let graph = poly.graph();
        assert!(poly.len() > 3);

        let mut last_t = 0.0;
        for j in graph.ring(poly.start()).skip(1) {
            if let JointKind::Interpolate { info, t } = graph.joints()[j].kind {
                assert!(t > last_t);
                last_t = t;
                let exact = graph.infos()[info].eval(t);
                assert_eq!(exact, graph.joints()[j].point);
            }
        }

        // Every line remembers where it sits on its curve.
        for (_, line) in graph.lines().iter() {
            assert!(line.t[0] < line.t[1]);
        }
    }

    #[test]
    fn malformed_paths() {
        let opts = ClipOptions::default();
        assert_matches!(
            create_polygons([PathEl::LineTo((1.0, 1.0).into())], &opts),
            Err(Error::InvalidPath(InvalidPathError::MissingMoveTo))
        );

        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((0.0, 0.0));
        path.line_to((1.0, 1.0));
        assert_matches!(
            polys(&path),
            Err(Error::InvalidPath(InvalidPathError::ZeroLengthSegment { .. }))
        );

        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 1.0));
        path.close_path();
        assert_matches!(
            polys(&path),
            Err(Error::InvalidPath(InvalidPathError::Collapsed { .. }))
        );

        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((f64::NAN, 1.0));
        path.line_to((1.0, 1.0));
        assert_matches!(
            polys(&path),
            Err(Error::InvalidPath(InvalidPathError::NonFinite))
        );
    }

    #[test]
    fn drawing_after_close_starts_where_the_subpath_did() {
        let els = [
            PathEl::MoveTo((0.0, 0.0).into()),
            PathEl::LineTo((1.0, 0.0).into()),
            PathEl::LineTo((1.0, 1.0).into()),
            PathEl::ClosePath,
            PathEl::LineTo((-1.0, 0.0).into()),
            PathEl::LineTo((-1.0, -1.0).into()),
        ];
        let polys = create_polygons(els, &ClipOptions::default()).unwrap();
        assert_eq!(polys.len(), 2);
        let second = &polys[1];
        assert_eq!(second.len(), 3);
        assert_eq!(
            second.graph().joints()[second.start()].point,
            Point::new(0.0, 0.0)
        );
    }

    #[test]
    fn lone_move_to_is_ignored() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 0.0));
        path.line_to((1.0, 1.0));
        path.close_path();
        path.move_to((3.0, 3.0));
        assert_eq!(polys(&path).unwrap().len(), 1);
    }
}
