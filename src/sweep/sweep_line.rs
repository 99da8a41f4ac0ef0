//! The per-height index of vertices and edge crossings.

use crate::{
    geom::x_at_y,
    graph::{Graph, JointIdx, JointVec, LineIdx},
};

/// The height of the sweep line that each joint was assigned to.
///
/// Joints whose heights differ by less than the coincidence tolerance share a sweep line, and
/// all of the sweep's "is this edge horizontal" and "does this edge cross that height"
/// questions are answered with these snapped heights rather than the joints' true positions.
pub type Levels = JointVec<f64>;

/// Something that a sweep line passes through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SweepJoint {
    /// A joint lying on the sweep line.
    Endpoint(JointIdx),
    /// A line crossing the sweep line between its endpoints.
    Relay {
        /// The crossing line.
        line: LineIdx,
    },
}

/// A [`SweepJoint`] together with its horizontal position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepEntry {
    /// The horizontal position of the joint or crossing.
    pub x: f64,
    /// What's there.
    pub joint: SweepJoint,
}

/// A horizontal line through the input, with everything it touches sorted by `x`.
#[derive(Clone, Debug)]
pub struct SweepLine {
    y: f64,
    entries: Vec<SweepEntry>,
}

impl SweepLine {
    /// Creates an empty sweep line at height `y`.
    pub fn new(y: f64) -> Self {
        SweepLine {
            y,
            entries: Vec::new(),
        }
    }

    /// The height of this sweep line.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Everything on this sweep line, in increasing `x`.
    pub fn entries(&self) -> &[SweepEntry] {
        &self.entries
    }

    /// The joints lying on this sweep line, in increasing `x`.
    pub fn endpoints(&self) -> impl Iterator<Item = (JointIdx, f64)> + '_ {
        self.entries.iter().filter_map(|e| match e.joint {
            SweepJoint::Endpoint(j) => Some((j, e.x)),
            SweepJoint::Relay { .. } => None,
        })
    }

    /// The lines crossing this sweep line, in increasing `x`.
    pub fn relays(&self) -> impl Iterator<Item = (LineIdx, f64)> + '_ {
        self.entries.iter().filter_map(|e| match e.joint {
            SweepJoint::Relay { line } => Some((line, e.x)),
            SweepJoint::Endpoint(_) => None,
        })
    }

    fn insert(&mut self, entry: SweepEntry) -> usize {
        let idx = self.entries.partition_point(|e| e.x <= entry.x);
        self.entries.insert(idx, entry);
        idx
    }

    /// Registers a joint at its own position.
    pub fn create_joint(&mut self, graph: &Graph, joint: JointIdx) -> usize {
        let x = graph.joints()[joint].point.x;
        self.insert(SweepEntry {
            x,
            joint: SweepJoint::Endpoint(joint),
        })
    }

    /// Registers the place where `line` crosses this sweep line.
    ///
    /// Returns `None` (and registers nothing) unless this sweep line lies strictly between
    /// the levels of the line's endpoints. In particular, horizontal lines never get relays.
    pub fn create_relay(&mut self, graph: &Graph, levels: &Levels, line: LineIdx) -> Option<usize> {
        let [j0, j1] = graph.lines()[line].joints;
        let (lo, hi) = (levels[j0].min(levels[j1]), levels[j0].max(levels[j1]));
        if !(lo < self.y && self.y < hi) {
            return None;
        }
        let joints = graph.joints();
        let x = x_at_y(joints[j0].point, joints[j1].point, self.y);
        Some(self.insert(SweepEntry {
            x,
            joint: SweepJoint::Relay { line },
        }))
    }

    /// Registers a joint unless it's already on this sweep line.
    pub fn ensure_unique_create(&mut self, graph: &Graph, joint: JointIdx) -> usize {
        let existing = self
            .entries
            .iter()
            .position(|e| e.joint == SweepJoint::Endpoint(joint));
        match existing {
            Some(idx) => idx,
            None => self.create_joint(graph, joint),
        }
    }

    /// Points every relay of `from` at `to` instead. Returns true if there was one.
    pub(crate) fn rename_relay(&mut self, from: LineIdx, to: LineIdx) -> bool {
        for e in &mut self.entries {
            if e.joint == (SweepJoint::Relay { line: from }) {
                e.joint = SweepJoint::Relay { line: to };
                return true;
            }
        }
        false
    }

    /// Replaces the relay of `line` by the joint that now splits it here.
    pub(crate) fn replace_relay(&mut self, graph: &Graph, line: LineIdx, joint: JointIdx) {
        self.entries
            .retain(|e| e.joint != (SweepJoint::Relay { line }));
        self.create_joint(graph, joint);
    }
}

#[cfg(test)]
mod tests {
    use kurbo::BezPath;

    use super::*;
    use crate::{flatten::create_polygons, options::ClipOptions};

    // A diamond with vertices at heights 0, 1 and 2.
    fn diamond() -> Graph {
        let mut path = BezPath::new();
        path.move_to((1.0, 0.0));
        path.line_to((2.0, 1.0));
        path.line_to((1.0, 2.0));
        path.line_to((0.0, 1.0));
        path.close_path();
        let mut polys =
            create_polygons(path.elements().iter().copied(), &ClipOptions::default()).unwrap();
        polys.remove(0).graph
    }

    fn levels(graph: &Graph) -> Levels {
        let mut levels = Levels::filled(graph.joints().len(), f64::NAN);
        for (j, joint) in graph.joints().iter() {
            levels[j] = joint.point.y;
        }
        levels
    }

    #[test]
    fn relays_only_for_straddling_lines() {
        let graph = diamond();
        let levels = levels(&graph);
        let mut line = SweepLine::new(0.5);
        for (l, _) in graph.lines().iter() {
            line.create_relay(&graph, &levels, l);
        }
        let xs: Vec<f64> = line.relays().map(|(_, x)| x).collect();
        assert_eq!(xs, vec![0.5, 1.5]);

        // At the height of the side vertices, nothing strictly straddles.
        let mut line = SweepLine::new(1.0);
        for (l, _) in graph.lines().iter() {
            assert!(line.create_relay(&graph, &levels, l).is_none());
        }
    }

    #[test]
    fn joints_stay_sorted_and_unique() {
        let graph = diamond();
        let mut line = SweepLine::new(1.0);
        line.create_joint(&graph, JointIdx(1));
        line.create_joint(&graph, JointIdx(3));
        assert_eq!(line.ensure_unique_create(&graph, JointIdx(1)), 1);
        let joints: Vec<_> = line.endpoints().map(|(j, _)| j).collect();
        assert_eq!(joints, vec![JointIdx(3), JointIdx(1)]);
    }

    #[test]
    fn relays_can_be_renamed_and_replaced() {
        let graph = diamond();
        let levels = levels(&graph);
        let mut line = SweepLine::new(0.5);
        line.create_relay(&graph, &levels, LineIdx(0));
        assert!(line.rename_relay(LineIdx(0), LineIdx(7)));
        assert!(!line.rename_relay(LineIdx(0), LineIdx(8)));
        line.replace_relay(&graph, LineIdx(7), JointIdx(1));
        assert_eq!(line.entries().len(), 1);
        assert_eq!(line.entries()[0].joint, SweepJoint::Endpoint(JointIdx(1)));
    }
}
