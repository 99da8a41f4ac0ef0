//! The flattened path graph.
//!
//! A closed contour is stored as a ring of [`Joint`]s connected by straight [`Line`]s. Curved
//! input segments are flattened into chains of lines, but every joint and line remembers the
//! [`PathInfo`] it came from (and the curve parameter it sits at), so that the exact curve can
//! be recovered at output time.
//!
//! Joints and lines live in index-typed arenas owned by a [`Graph`]. Following `next` from
//! any joint of a finished ring gets back to that joint.

use kurbo::{ParamCurve, PathSeg, Point};

impl_typed_vec!(
    /// An index into the joints of a [`Graph`].
    JointVec,
    JointIdx,
    "j"
);
impl_typed_vec!(
    /// An index into the lines of a [`Graph`].
    LineVec,
    LineIdx,
    "l"
);
impl_typed_vec!(
    /// An index into the path infos of a [`Graph`].
    PathInfoVec,
    PathInfoIdx,
    "p"
);

/// Placeholder link for a joint that hasn't been put into a ring yet.
const UNLINKED: LineIdx = LineIdx(usize::MAX);

/// One segment of the original input path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathInfo {
    /// The exact segment.
    pub seg: PathSeg,
}

impl PathInfo {
    /// The degree of the segment: 1 for lines, 2 for quadratics and 3 for cubics.
    pub fn order(&self) -> usize {
        match self.seg {
            PathSeg::Line(_) => 1,
            PathSeg::Quad(_) => 2,
            PathSeg::Cubic(_) => 3,
        }
    }

    /// Evaluates the original segment at parameter `t`.
    pub fn eval(&self, t: f64) -> Point {
        self.seg.eval(t)
    }
}

/// What kind of vertex a joint is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointKind {
    /// An anchor point of the input path.
    ///
    /// `info[0]` is the segment ending here and `info[1]` is the segment starting here.
    End {
        /// The adjacent input segments.
        info: [PathInfoIdx; 2],
    },
    /// A sample point in the middle of a flattened curve.
    Interpolate {
        /// The curve this point was sampled from.
        info: PathInfoIdx,
        /// The curve parameter of the sample.
        t: f64,
    },
    /// A synthetic vertex where two edges cross.
    ///
    /// Intersections always come in pairs: one joint on each of the crossing edges, at the
    /// same position.
    Intersect {
        /// The input segment of the edge this joint splits.
        info: PathInfoIdx,
        /// The approximate curve parameter, interpolated along the flattened edge.
        t: f64,
        /// The other joint of the pair.
        symmetric: JointIdx,
        /// The nearest non-intersection joints before and after this one, along its own ring.
        orient: [JointIdx; 2],
        /// The `orient` joints of `symmetric`.
        cut: [JointIdx; 2],
    },
    /// A vertex of an assembled output contour, copied from the intersected graph.
    ///
    /// `of[0]` is the joint the contour arrives at and `of[1]` is the joint it leaves from.
    /// They are different joints (at the same place) where the contour switches from one
    /// input ring to another.
    Mirror {
        /// The joints this copies.
        of: [JointIdx; 2],
    },
    /// A point of a restored output contour.
    Final {
        /// Control points are off-curve; the rest are on-curve anchors.
        control: bool,
    },
}

/// A vertex in the path graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Joint {
    /// Where it is.
    pub point: Point,
    /// What it is.
    pub kind: JointKind,
    /// The line ending at this joint.
    pub prev: LineIdx,
    /// The line starting at this joint.
    pub next: LineIdx,
}

impl Joint {
    /// Is this a synthetic intersection vertex?
    pub fn is_intersect(&self) -> bool {
        matches!(self.kind, JointKind::Intersect { .. })
    }

    fn offset(mut self, joints: usize, lines: usize, infos: usize) -> Self {
        if self.prev != UNLINKED {
            self.prev = self.prev.offset(lines);
        }
        if self.next != UNLINKED {
            self.next = self.next.offset(lines);
        }
        self.kind = match self.kind {
            JointKind::End { info } => JointKind::End {
                info: info.map(|i| i.offset(infos)),
            },
            JointKind::Interpolate { info, t } => JointKind::Interpolate {
                info: info.offset(infos),
                t,
            },
            JointKind::Intersect {
                info,
                t,
                symmetric,
                orient,
                cut,
            } => JointKind::Intersect {
                info: info.offset(infos),
                t,
                symmetric: symmetric.offset(joints),
                orient: orient.map(|j| j.offset(joints)),
                cut: cut.map(|j| j.offset(joints)),
            },
            JointKind::Mirror { of } => JointKind::Mirror {
                of: of.map(|j| j.offset(joints)),
            },
            k @ JointKind::Final { .. } => k,
        };
        self
    }
}

/// A directed straight edge between two joints.
///
/// Invariant: `joints[1]`'s `prev` is this line and `joints[0]`'s `next` is this line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    /// Start and end.
    pub joints: [JointIdx; 2],
    /// The input segment this edge approximates.
    pub info: PathInfoIdx,
    /// The parameters along `info` of the two endpoints.
    pub t: [f64; 2],
}

/// An arena of joints, lines and path infos.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub(crate) joints: JointVec<Joint>,
    pub(crate) lines: LineVec<Line>,
    pub(crate) infos: PathInfoVec<PathInfo>,
}

impl Graph {
    /// All the joints.
    pub fn joints(&self) -> &JointVec<Joint> {
        &self.joints
    }

    /// All the lines.
    pub fn lines(&self) -> &LineVec<Line> {
        &self.lines
    }

    /// All the path infos.
    pub fn infos(&self) -> &PathInfoVec<PathInfo> {
        &self.infos
    }

    /// The joint after `j` in its ring.
    pub fn next_joint(&self, j: JointIdx) -> JointIdx {
        self.lines[self.joints[j].next].joints[1]
    }

    /// The joint before `j` in its ring.
    pub fn prev_joint(&self, j: JointIdx) -> JointIdx {
        self.lines[self.joints[j].prev].joints[0]
    }

    /// Walks the ring starting at `start`, yielding each joint once.
    ///
    /// The walk gives up after visiting as many joints as the graph has, so it terminates
    /// even if the ring is broken.
    pub fn ring(&self, start: JointIdx) -> impl Iterator<Item = JointIdx> + '_ {
        let mut cur = Some(start);
        let mut remaining = self.joints.len();
        std::iter::from_fn(move || {
            let j = cur?;
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let next = self.next_joint(j);
            cur = (next != start).then_some(next);
            Some(j)
        })
    }

    /// The points of the ring starting at `start`.
    pub fn ring_points(&self, start: JointIdx) -> Vec<Point> {
        self.ring(start).map(|j| self.joints[j].point).collect()
    }

    /// The endpoint of `line` that isn't `j`.
    pub fn other_joint(&self, line: LineIdx, j: JointIdx) -> JointIdx {
        let [a, b] = self.lines[line].joints;
        if a == j {
            b
        } else {
            a
        }
    }

    /// The parameter along `line`'s path info at its endpoint `j`.
    pub fn param_at(&self, j: JointIdx, line: LineIdx) -> f64 {
        let l = &self.lines[line];
        if l.joints[0] == j {
            l.t[0]
        } else {
            debug_assert_eq!(l.joints[1], j);
            l.t[1]
        }
    }

    pub(crate) fn push_info(&mut self, seg: PathSeg) -> PathInfoIdx {
        self.infos.push(PathInfo { seg })
    }

    pub(crate) fn push_joint(&mut self, point: Point, kind: JointKind) -> JointIdx {
        self.joints.push(Joint {
            point,
            kind,
            prev: UNLINKED,
            next: UNLINKED,
        })
    }

    /// Adds a line from `a` to `b` and links both joints to it.
    pub(crate) fn link(
        &mut self,
        a: JointIdx,
        b: JointIdx,
        info: PathInfoIdx,
        t: [f64; 2],
    ) -> LineIdx {
        let line = self.lines.push(Line {
            joints: [a, b],
            info,
            t,
        });
        self.joints[a].next = line;
        self.joints[b].prev = line;
        line
    }

    /// Splits `line` at the (unlinked) joint `mid`, whose parameter along the line's path
    /// info is `t`.
    ///
    /// `line` keeps its index and becomes the first half; the returned line is the second half.
    pub(crate) fn split_line(&mut self, line: LineIdx, mid: JointIdx, t: f64) -> LineIdx {
        let Line {
            joints: [_, end],
            info,
            t: [_, t_end],
        } = self.lines[line];
        self.lines[line].joints[1] = mid;
        self.lines[line].t[1] = t;
        self.joints[mid].prev = line;
        self.link(mid, end, info, [t, t_end])
    }

    /// Moves everything in `other` into this graph, returning the index offsets that were
    /// applied to `other`'s joints.
    pub(crate) fn adopt(&mut self, other: Graph) -> usize {
        let (jo, lo, io) = (self.joints.len(), self.lines.len(), self.infos.len());
        let mut joints = other.joints.map(|j| j.offset(jo, lo, io));
        let mut lines = other.lines.map(|l| Line {
            joints: l.joints.map(|j| j.offset(jo)),
            info: l.info.offset(io),
            t: l.t,
        });
        let mut infos = other.infos;
        self.joints.append(&mut joints);
        self.lines.append(&mut lines);
        self.infos.append(&mut infos);
        jo
    }

    /// Reverses the direction of every line in the ring through `start`.
    pub(crate) fn reverse_ring(&mut self, start: JointIdx) {
        let ring: Vec<JointIdx> = self.ring(start).collect();
        for &j in &ring {
            let line = self.joints[j].next;
            let l = &mut self.lines[line];
            l.joints.swap(0, 1);
            l.t.swap(0, 1);
        }
        for &j in &ring {
            let joint = &mut self.joints[j];
            std::mem::swap(&mut joint.prev, &mut joint.next);
            if let JointKind::End { info } = &mut joint.kind {
                info.swap(0, 1);
            }
        }
    }
}

/// One closed contour, together with the arena that holds it.
#[derive(Clone, Debug)]
pub struct Polygon {
    pub(crate) graph: Graph,
    pub(crate) start: JointIdx,
}

impl Polygon {
    /// The arena holding this polygon's ring.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Some joint on the ring.
    pub fn start(&self) -> JointIdx {
        self.start
    }

    /// The number of joints on the ring.
    pub fn len(&self) -> usize {
        self.graph.ring(self.start).count()
    }

    /// Always false: a polygon's ring has at least one joint.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The area enclosed by the flattened ring, positive if it's clockwise in y-down
    /// coordinates.
    pub fn signed_area(&self) -> f64 {
        crate::geom::signed_area(&self.graph.ring_points(self.start))
    }

    /// Flips the orientation of the ring.
    pub fn reverse_direction(&mut self) {
        self.graph.reverse_ring(self.start);
    }
}
