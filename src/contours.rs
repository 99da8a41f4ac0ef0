//! The output of a clip: a tree of closed contours.

use arrayvec::ArrayVec;
use kurbo::{BezPath, Point};

use crate::{
    assemble::Patch,
    curve::Restored,
    graph::{Graph, JointIdx, JointKind},
};

impl_typed_vec!(
    /// An index into the contours of a [`ClipResult`].
    ContourVec,
    ContourIdx,
    "c"
);

/// One closed output contour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    /// The first joint of the contour's ring in [`ClipResult::graph`]. It is always an
    /// on-curve point.
    pub start: JointIdx,

    /// A contour can have a parent, so that sets with holes can be represented as nested
    /// contours. The parent is the smallest contour containing this one.
    pub parent: Option<ContourIdx>,

    /// The contours whose parent is this one.
    pub children: Vec<ContourIdx>,

    /// The number of contours containing this one. Contours at even depth are outlines and
    /// run clockwise (in y-down coordinates); contours at odd depth are holes and run the
    /// other way.
    pub depth: usize,
}

impl Contour {
    /// Is this an outline rather than a hole?
    pub fn outer(&self) -> bool {
        self.depth % 2 == 0
    }
}

/// The result of a clip.
///
/// Can be indexed with a [`ContourIdx`].
#[derive(Clone, Debug)]
pub struct ClipResult {
    graph: Graph,
    contours: ContourVec<Contour>,
}

impl ClipResult {
    pub(crate) fn new(restored: Restored, patches: &[Patch]) -> Self {
        let mut contours = ContourVec::with_capacity(patches.len());
        for (patch, &start) in patches.iter().zip(&restored.starts) {
            contours.push(Contour {
                start,
                parent: patch.parent.map(ContourIdx),
                children: Vec::new(),
                depth: patch.depth,
            });
        }
        for idx in contours.indices() {
            if let Some(parent) = contours[idx].parent {
                contours[parent].children.push(idx);
            }
        }
        ClipResult {
            graph: restored.graph,
            contours,
        }
    }

    /// The graph holding every contour's ring of [`JointKind::Final`] joints.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The number of contours.
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    /// Did the clip produce nothing at all?
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// The contour at `idx`.
    pub fn contour(&self, idx: ContourIdx) -> &Contour {
        &self.contours[idx]
    }

    /// The contours that have no parent.
    pub fn roots(&self) -> impl Iterator<Item = ContourIdx> + '_ {
        self.contours
            .iter()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(idx, _)| idx)
    }

    /// All of the contour indices, in depth-first order: every contour comes immediately
    /// before its children (and their children, and so on).
    pub fn contours(&self) -> impl Iterator<Item = ContourIdx> + '_ {
        self.grouped().into_iter().flatten()
    }

    /// Returns all of the contour indices, grouped by containment.
    ///
    /// For each of the inner vecs, the first element is an outer contour with
    /// no parent. All of the other contours in that inner vec lie inside that
    /// outer contour.
    pub fn grouped(&self) -> Vec<Vec<ContourIdx>> {
        fn visit(idx: ContourIdx, contours: &ContourVec<Contour>, acc: &mut Vec<ContourIdx>) {
            acc.push(idx);
            for &child in &contours[idx].children {
                visit(child, contours, acc);
            }
        }

        self.roots()
            .map(|root| {
                let mut tree = Vec::new();
                visit(root, &self.contours, &mut tree);
                tree
            })
            .collect()
    }

    /// Renders one contour (without its children) as a closed path.
    pub fn contour_path(&self, idx: ContourIdx) -> BezPath {
        let mut path = BezPath::new();
        self.append_contour(idx, &mut path);
        path
    }

    fn append_contour(&self, idx: ContourIdx, path: &mut BezPath) {
        let start = self.contours[idx].start;
        let joints = self.graph.joints();
        path.move_to(joints[start].point);

        let mut controls: ArrayVec<Point, 2> = ArrayVec::new();
        for j in self.graph.ring(start).skip(1).chain(std::iter::once(start)) {
            let p = joints[j].point;
            if let JointKind::Final { control: true } = joints[j].kind {
                let pushed = controls.try_push(p);
                debug_assert!(pushed.is_ok(), "more than two control points in a row");
                continue;
            }
            match controls.as_slice() {
                [] => path.line_to(p),
                [c] => path.quad_to(*c, p),
                [c1, c2] => path.curve_to(*c1, *c2, p),
                _ => unreachable!(),
            }
            controls.clear();
        }
        path.close_path();
    }
}

impl std::ops::Index<ContourIdx> for ClipResult {
    type Output = Contour;

    fn index(&self, index: ContourIdx) -> &Self::Output {
        &self.contours[index]
    }
}

/// Renders every contour of `result` into one path.
///
/// Contours come in depth-first order, so each hole immediately follows the outline
/// containing it. Every contour starts with a `MoveTo` and ends with a `ClosePath`.
pub fn compile_path(result: &ClipResult) -> BezPath {
    let mut path = BezPath::new();
    for idx in result.contours() {
        result.append_contour(idx, &mut path);
    }
    path
}

#[cfg(test)]
mod tests {
    use kurbo::{PathEl, PathSeg, QuadBez};

    use super::*;
    use crate::graph::PathInfoIdx;

    // (x, y, is_control) triples.
    fn ring(graph: &mut Graph, points: &[(f64, f64, bool)]) -> JointIdx {
        let joints: Vec<JointIdx> = points
            .iter()
            .map(|&(x, y, control)| graph.push_joint(Point::new(x, y), JointKind::Final { control }))
            .collect();
        for k in 0..joints.len() {
            graph.link(joints[k], joints[(k + 1) % joints.len()], PathInfoIdx(0), [0.0, 1.0]);
        }
        joints[0]
    }

    fn result() -> ClipResult {
        let mut graph = Graph::default();
        graph.push_info(PathSeg::Quad(QuadBez::new((0.0, 0.0), (1.0, 1.0), (2.0, 0.0))));
        let starts = vec![
            ring(
                &mut graph,
                &[(10.0, 0.0, false), (11.0, 0.0, false), (11.0, 1.0, false)],
            ),
            ring(
                &mut graph,
                &[
                    (0.0, 0.0, false),
                    (4.0, 0.0, false),
                    (4.0, 4.0, false),
                    (2.0, 5.0, true),
                    (0.0, 4.0, false),
                ],
            ),
            ring(
                &mut graph,
                &[(1.0, 1.0, false), (1.0, 2.0, false), (2.0, 2.0, false)],
            ),
        ];
        let patches = [
            Patch {
                start: JointIdx(0),
                parent: None,
                depth: 0,
            },
            Patch {
                start: JointIdx(0),
                parent: None,
                depth: 0,
            },
            Patch {
                start: JointIdx(0),
                parent: Some(1),
                depth: 1,
            },
        ];
        ClipResult::new(Restored { graph, starts }, &patches)
    }

    #[test]
    fn children_follow_parents() {
        let result = result();
        assert_eq!(
            result.grouped(),
            vec![
                vec![ContourIdx(0)],
                vec![ContourIdx(1), ContourIdx(2)]
            ]
        );
        assert_eq!(result[ContourIdx(1)].children, vec![ContourIdx(2)]);
        assert!(result[ContourIdx(1)].outer());
        assert!(!result[ContourIdx(2)].outer());
        assert_eq!(result.roots().count(), 2);
    }

    #[test]
    fn control_points_become_curves() {
        let result = result();
        let path = result.contour_path(ContourIdx(1));
        assert_eq!(
            path.elements(),
            &[
                PathEl::MoveTo(Point::new(0.0, 0.0)),
                PathEl::LineTo(Point::new(4.0, 0.0)),
                PathEl::LineTo(Point::new(4.0, 4.0)),
                PathEl::QuadTo(Point::new(2.0, 5.0), Point::new(0.0, 4.0)),
                PathEl::LineTo(Point::new(0.0, 0.0)),
                PathEl::ClosePath,
            ]
        );
    }

    #[test]
    fn compiled_path_has_every_contour() {
        let path = compile_path(&result());
        let moves = path
            .elements()
            .iter()
            .filter(|el| matches!(el, PathEl::MoveTo(_)))
            .count();
        let closes = path
            .elements()
            .iter()
            .filter(|el| matches!(el, PathEl::ClosePath))
            .count();
        assert_eq!((moves, closes), (3, 3));
    }
}
