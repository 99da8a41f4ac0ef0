//! Assembling output contours from a fully intersected graph.
//!
//! Once the sweep has split every edge at every crossing, the edges of all the input rings
//! form a planar graph: edges only meet at joints, and joints that are at the same place
//! (an intersection pair, or two input vertices that happen to coincide) form one
//! *location*. Under the exclude rule every edge separates an inside region from an outside
//! one, so the output contours are obtained by walking the edges and, at each location,
//! turning onto the edge that keeps the inside on the same side.
//!
//! We do this in four passes:
//!
//! 1. Classify every edge: using the sweepers of a slab it crosses, decide which of its two
//!    sides is inside.
//! 2. At every location, sort the edge ends by angle and pair up the two ends bounding each
//!    outside sector.
//! 3. Follow the pairings to trace closed rings, and split any ring that visits one location
//!    twice.
//! 4. Nest the rings by containment, orient them by depth, and copy them into the graph as
//!    rings of [`JointKind::Mirror`] joints.

use std::collections::HashMap;

use kurbo::{Point, Vec2};

use crate::{
    error::Error,
    geom,
    graph::{Graph, JointIdx, JointKind, JointVec, LineIdx, LineVec},
    num::CheapOrderedFloat,
    options::ClipOptions,
    sweep::{Side, SweepState, Sweeper},
};

/// One end of a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EdgeEnd {
    line: LineIdx,
    /// Which of the line's joints this end is at.
    side: usize,
}

/// Walking `line` from `from` to `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Step {
    line: LineIdx,
    from: JointIdx,
    to: JointIdx,
}

/// A closed output contour, before its curves are restored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Patch {
    /// The first joint of the contour's ring of mirror joints.
    pub start: JointIdx,
    /// The smallest patch containing this one, as an index into the assembled patches.
    pub parent: Option<usize>,
    /// The number of patches containing this one.
    pub depth: usize,
}

/// A traced ring, along with the things nesting needs to know about it.
struct Traced {
    steps: Vec<Step>,
    points: Vec<Point>,
    area: f64,
}

impl Traced {
    fn new(graph: &Graph, steps: Vec<Step>) -> Self {
        let points: Vec<Point> = steps.iter().map(|s| graph.joints()[s.from].point).collect();
        let area = geom::signed_area(&points);
        Traced {
            steps,
            points,
            area,
        }
    }

    /// A point that's on this ring but (barring coincidences) not on any other one.
    fn probe(&self) -> Point {
        let n = self.points.len();
        let (a, b) = (0..n)
            .map(|i| (self.points[i], self.points[(i + 1) % n]))
            .max_by_key(|(a, b)| CheapOrderedFloat::from(a.distance(*b)))
            .unwrap_or_default();
        a.midpoint(b)
    }

    fn reverse(&mut self, graph: &Graph) {
        self.steps.reverse();
        for step in &mut self.steps {
            std::mem::swap(&mut step.from, &mut step.to);
        }
        self.points = self
            .steps
            .iter()
            .map(|s| graph.joints()[s.from].point)
            .collect();
        self.area = -self.area;
    }
}

struct Assembler<'a> {
    graph: &'a mut Graph,
    state: &'a SweepState,
    options: &'a ClipOptions,
    /// For non-horizontal lines, whether the region just to their left is inside. For
    /// horizontal lines, whether the region just beneath them (larger `y`) is inside.
    inside: LineVec<Option<bool>>,
    /// Which location each joint belongs to.
    location: JointVec<usize>,
    /// The joints at each location.
    locations: Vec<Vec<JointIdx>>,
    /// For each end of each line, the end of the line that the output contour continues on.
    partner: LineVec<[Option<EdgeEnd>; 2]>,
}

/// Assembles the exclude contours of a graph that has been through [`crate::sweep::sweep`].
///
/// The contours are added to `graph` as rings of mirror joints. The returned patches have
/// parents before children; top-level patches have positive signed area and the orientation
/// alternates with depth.
pub fn assemble(
    graph: &mut Graph,
    state: &SweepState,
    options: &ClipOptions,
) -> Result<Vec<Patch>, Error> {
    let lines = graph.lines().len();
    let joints = graph.joints().len();
    let mut asm = Assembler {
        graph,
        state,
        options,
        inside: LineVec::filled(lines, None),
        location: JointVec::filled(joints, usize::MAX),
        locations: Vec::new(),
        partner: LineVec::filled(lines, [None; 2]),
    };
    asm.proceed_sweepers()?;
    asm.locate();
    for loc in 0..asm.locations.len() {
        asm.proceed_patches(loc)?;
    }
    let rings = asm.trace()?;
    let rings: Vec<Vec<Step>> = rings
        .into_iter()
        .flat_map(|ring| asm.split_touching(ring))
        .collect();
    let patches = asm.nest(rings);
    tracing::debug!(contours = patches.len(), "assembled");
    Ok(patches)
}

impl Assembler<'_> {
    fn point(&self, j: JointIdx) -> Point {
        self.graph.joints()[j].point
    }

    fn is_horizontal(&self, line: LineIdx) -> bool {
        let [j0, j1] = self.graph.lines()[line].joints;
        self.state.levels[j0] == self.state.levels[j1]
    }

    /// Decides which side of every line is inside.
    fn proceed_sweepers(&mut self) -> Result<(), Error> {
        let eps = self.options.coincidence_eps;
        let n = self.state.lines.len();
        let slabs: Vec<Vec<Sweeper>> = (0..n.saturating_sub(1))
            .map(|a| self.state.sweepers(self.graph, a, a + 1, Side::Up, eps))
            .collect();

        // In every slab, the region left of the k-th edge is crossed by k edges.
        for slab in &slabs {
            for (k, s) in slab.iter().enumerate() {
                let slot = &mut self.inside[s.line];
                if slot.is_none() {
                    *slot = Some(k % 2 == 1);
                }
            }
        }

        for l in self.graph.lines().indices() {
            if !self.is_horizontal(l) {
                continue;
            }
            let [j0, j1] = self.graph.lines()[l].joints;
            let y = self.state.levels[j0];
            let x_mid = (self.point(j0).x + self.point(j1).x) / 2.0;
            let idx = self.state.lines.partition_point(|line| line.y() < y);
            let crossed = slabs
                .get(idx)
                .map_or(0, |slab| slab.iter().filter(|s| s.x < x_mid).count());
            self.inside[l] = Some(crossed % 2 == 1);
        }

        for (l, side) in self.inside.iter() {
            if side.is_none() {
                let j = self.graph.lines()[l].joints[0];
                return Err(Error::degenerate(self.point(j)));
            }
        }
        Ok(())
    }

    /// Groups the joints on each sweep line into locations.
    fn locate(&mut self) {
        let eps = self.options.coincidence_eps;
        for line in &self.state.lines {
            let mut last_x = f64::NEG_INFINITY;
            for (j, x) in line.endpoints() {
                if x - last_x > eps {
                    self.locations.push(Vec::new());
                }
                let loc = self.locations.len() - 1;
                self.locations[loc].push(j);
                self.location[j] = loc;
                last_x = x;
            }
        }
    }

    /// Pairs up the edge ends at one location.
    fn proceed_patches(&mut self, loc: usize) -> Result<(), Error> {
        let levels = &self.state.levels;
        // (angle, end, whether the sector counter-clockwise from the end is inside)
        let mut ends: Vec<(f64, EdgeEnd, bool)> = Vec::new();
        for &j in &self.locations[loc] {
            let joint = &self.graph.joints()[j];
            for (line, side) in [(joint.prev, 1), (joint.next, 0)] {
                let other = self.graph.lines()[line].joints[1 - side];
                // Directions use snapped heights, so that horizontal lines are exactly
                // horizontal here too.
                let dir = Vec2::new(
                    self.graph.joints()[other].point.x - joint.point.x,
                    levels[other] - levels[j],
                );
                let inside = self.inside[line].unwrap_or(false);
                let sector_inside = if dir.y == 0.0 {
                    (dir.x > 0.0) == inside
                } else {
                    (dir.y > 0.0) == inside
                };
                ends.push((geom::angle(dir), EdgeEnd { line, side }, sector_inside));
            }
        }
        ends.sort_by_key(|(angle, end, _)| (CheapOrderedFloat::from(*angle), end.line));

        let n = ends.len();
        let alternating = n % 2 == 0 && (0..n).all(|i| ends[i].2 != ends[(i + 1) % n].2);
        if !alternating {
            let j = self.locations[loc][0];
            tracing::trace!(loc, ?ends, "inconsistent sectors");
            return Err(Error::degenerate(self.point(j)));
        }

        for i in 0..n {
            if ends[i].2 {
                continue;
            }
            let (a, b) = (ends[i].1, ends[(i + 1) % n].1);
            self.partner[a.line][a.side] = Some(b);
            self.partner[b.line][b.side] = Some(a);
        }
        Ok(())
    }

    /// Follows the pairings around every ring.
    fn trace(&self) -> Result<Vec<Vec<Step>>, Error> {
        let lines = self.graph.lines();
        let mut visited = LineVec::filled(lines.len(), false);
        let mut rings = Vec::new();
        for start in lines.indices() {
            if visited[start] {
                continue;
            }
            let mut ring = Vec::new();
            let mut cur = EdgeEnd {
                line: start,
                side: 0,
            };
            loop {
                let [j0, j1] = lines[cur.line].joints;
                let (from, to) = if cur.side == 0 { (j0, j1) } else { (j1, j0) };
                visited[cur.line] = true;
                ring.push(Step {
                    line: cur.line,
                    from,
                    to,
                });
                let next = self.partner[cur.line][1 - cur.side]
                    .ok_or_else(|| Error::degenerate(self.point(to)))?;
                if next.line == start {
                    debug_assert_eq!(next.side, 0);
                    break;
                }
                if ring.len() > lines.len() {
                    return Err(Error::degenerate(self.point(to)));
                }
                cur = next;
            }
            tracing::trace!(?ring, "traced ring");
            rings.push(ring);
        }
        Ok(rings)
    }

    /// Splits a ring that passes through some location more than once into simple rings.
    fn split_touching(&self, ring: Vec<Step>) -> Vec<Vec<Step>> {
        let mut done = Vec::new();
        let mut todo = vec![ring];
        while let Some(ring) = todo.pop() {
            let mut seen: HashMap<usize, usize> = HashMap::new();
            let mut repeat = None;
            for (k, step) in ring.iter().enumerate() {
                let loc = self.location[step.from];
                if let Some(&i) = seen.get(&loc) {
                    repeat = Some((i, k));
                    break;
                }
                seen.insert(loc, k);
            }
            match repeat {
                Some((i, k)) => {
                    tracing::trace!(at = ?self.point(ring[k].from), "splitting touching ring");
                    let inner = ring[i..k].to_vec();
                    let mut outer = ring[k..].to_vec();
                    outer.extend_from_slice(&ring[..i]);
                    todo.push(inner);
                    todo.push(outer);
                }
                None => done.push(ring),
            }
        }
        done
    }

    /// Nests rings by containment, fixes their orientation, and adds them to the graph.
    fn nest(&mut self, rings: Vec<Vec<Step>>) -> Vec<Patch> {
        let mut traced: Vec<Traced> = rings
            .into_iter()
            .map(|steps| Traced::new(self.graph, steps))
            .collect();
        traced.sort_by_key(|t| std::cmp::Reverse(CheapOrderedFloat::from(t.area.abs())));

        let mut patches: Vec<Patch> = Vec::with_capacity(traced.len());
        for k in 0..traced.len() {
            let probe = traced[k].probe();
            // Containing rings are nested in one another, and the smallest one was placed last.
            let parent = (0..k)
                .rev()
                .find(|&p| geom::contains(&traced[p].points, probe));
            let depth = parent.map_or(0, |p| patches[p].depth + 1);
            let clockwise = depth % 2 == 0;
            if (traced[k].area > 0.0) != clockwise {
                traced[k].reverse(self.graph);
            }
            let start = self.materialize(&traced[k].steps);
            patches.push(Patch {
                start,
                parent,
                depth,
            });
        }
        patches
    }

    /// Copies a ring into the graph as mirror joints, returning the first of them.
    fn materialize(&mut self, steps: &[Step]) -> JointIdx {
        let n = steps.len();
        let mut mirrors: Vec<JointIdx> = Vec::with_capacity(n);
        for k in 0..n {
            let arrive = steps[(k + n - 1) % n].to;
            let depart = steps[k].from;
            let point = self.point(depart);
            mirrors.push(self.graph.push_joint(
                point,
                JointKind::Mirror {
                    of: [arrive, depart],
                },
            ));
        }
        for (k, step) in steps.iter().enumerate() {
            let line = self.graph.lines()[step.line];
            let t = if line.joints[0] == step.from {
                line.t
            } else {
                [line.t[1], line.t[0]]
            };
            self.graph
                .link(mirrors[k], mirrors[(k + 1) % n], line.info, t);
        }
        mirrors[0]
    }
}

#[cfg(test)]
mod tests {
    use kurbo::BezPath;

    use super::*;
    use crate::{flatten::create_polygons, sweep::sweep};

    fn assembled(path: &BezPath) -> (Graph, Vec<Patch>) {
        let opts = ClipOptions::default();
        let mut graph = Graph::default();
        for poly in create_polygons(path.elements().iter().copied(), &opts).unwrap() {
            graph.adopt(poly.graph);
        }
        let state = sweep(&mut graph, &opts).unwrap();
        let patches = assemble(&mut graph, &state, &opts).unwrap();
        (graph, patches)
    }

    fn rect(path: &mut BezPath, x0: f64, y0: f64, x1: f64, y1: f64) {
        path.move_to((x0, y0));
        path.line_to((x1, y0));
        path.line_to((x1, y1));
        path.line_to((x0, y1));
        path.close_path();
    }

    #[test]
    fn overlapping_squares() {
        let mut path = BezPath::new();
        rect(&mut path, 0.0, 0.0, 1.0, 1.0);
        rect(&mut path, 0.5, 0.5, 1.5, 1.5);
        let (graph, patches) = assembled(&path);
        assert_eq!(patches.len(), 2);

        let outer = &patches[0];
        assert_eq!(outer.depth, 0);
        assert_eq!(graph.ring(outer.start).count(), 8);
        let area = geom::signed_area(&graph.ring_points(outer.start));
        assert!((area - 1.75).abs() < 1e-12);

        let hole = &patches[1];
        assert_eq!(hole.parent, Some(0));
        assert_eq!(hole.depth, 1);
        assert_eq!(graph.ring(hole.start).count(), 4);
        let area = geom::signed_area(&graph.ring_points(hole.start));
        assert!((area + 0.25).abs() < 1e-12);
    }

    #[test]
    fn figure_eight_splits_at_the_crossing() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((2.0, 2.0));
        path.line_to((2.0, 0.0));
        path.line_to((0.0, 2.0));
        path.close_path();
        let (graph, patches) = assembled(&path);
        assert_eq!(patches.len(), 2);
        for patch in &patches {
            assert_eq!(patch.depth, 0);
            let points = graph.ring_points(patch.start);
            assert_eq!(points.len(), 3);
            assert!(points.contains(&Point::new(1.0, 1.0)));
            assert!((geom::signed_area(&points) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn nested_squares_alternate() {
        let mut path = BezPath::new();
        rect(&mut path, 0.0, 0.0, 4.0, 4.0);
        rect(&mut path, 1.0, 1.0, 3.0, 3.0);
        rect(&mut path, 1.5, 1.5, 2.5, 2.5);
        let (graph, patches) = assembled(&path);
        let summary: Vec<(usize, Option<usize>, f64)> = patches
            .iter()
            .map(|p| {
                let area = geom::signed_area(&graph.ring_points(p.start));
                (p.depth, p.parent, area)
            })
            .collect();
        assert_eq!(
            summary,
            vec![(0, None, 16.0), (1, Some(0), -4.0), (2, Some(1), 1.0)]
        );
    }

    #[test]
    fn mirrors_remember_where_they_came_from() {
        let mut path = BezPath::new();
        rect(&mut path, 0.0, 0.0, 1.0, 1.0);
        rect(&mut path, 0.5, 0.5, 1.5, 1.5);
        let (graph, patches) = assembled(&path);
        let mut switches = 0;
        for j in graph.ring(patches[0].start) {
            let JointKind::Mirror { of } = graph.joints()[j].kind else {
                panic!("not a mirror");
            };
            assert_eq!(graph.joints()[of[0]].point, graph.joints()[j].point);
            assert_eq!(graph.joints()[of[1]].point, graph.joints()[j].point);
            if of[0] != of[1] {
                switches += 1;
            }
        }
        // The outline switches squares at both crossings.
        assert_eq!(switches, 2);
    }
}
