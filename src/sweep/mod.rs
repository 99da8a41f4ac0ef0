//! The sweep-line intersection search.
//!
//! The sweep runs in three phases:
//!
//! 1. **Prepare**: every joint is assigned to a sweep line (joints within the coincidence
//!    tolerance of one another in `y` share one), and every sweep line records where the
//!    edges that cross it are.
//! 2. **Intersect**: for each pair of consecutive sweep lines, compare the left-to-right
//!    order of the edges in the slab between them, as seen from the upper line and from the
//!    lower line. If the orders disagree, two edges cross inside the slab; we add a sweep
//!    line at the crossing, split both edges there, and look at the two smaller slabs.
//!    Crossings that happen exactly on a sweep line (for example, an edge crossing a
//!    horizontal edge) are split directly on that line.
//! 3. **Finish**: every intersection joint learns its nearest original neighbors.
//!
//! When we're done, no two edges cross except at shared joints, which is what the
//! assembler needs.

mod sweep_line;

use arrayvec::ArrayVec;
use kurbo::Point;

pub use sweep_line::{Levels, SweepEntry, SweepJoint, SweepLine};

use crate::{
    error::{Error, Unimplemented},
    geom::{line_crossing, project_fraction, x_at_y, y_at_x},
    graph::{Graph, JointIdx, JointKind, LineIdx},
    num::CheapOrderedFloat,
    options::ClipOptions,
};

/// One edge of a slab, as seen from one of the slab's two sweep lines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sweeper {
    /// The joint the edge touches the sweep line at, or `None` if it passes through.
    pub joint: Option<JointIdx>,
    /// The edge.
    pub line: LineIdx,
    /// Where the edge meets the sweep line.
    pub x: f64,
    /// Where the edge is halfway down the slab. This breaks ties between edges that meet
    /// the sweep line at the same place.
    pub x_mid: f64,
}

/// Which side of a slab to collect sweepers from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The slab's upper sweep line, looking down.
    Up,
    /// The slab's lower sweep line, looking up.
    Down,
}

/// The result of a sweep.
#[derive(Clone, Debug, Default)]
pub struct SweepState {
    /// The sweep lines, sorted by height once the sweep has finished.
    pub lines: Vec<SweepLine>,
    /// The level of each joint that took part in the sweep.
    pub levels: Levels,
    /// Every intersection joint that was created.
    pub intersections: Vec<JointIdx>,
}

impl SweepState {
    fn is_horizontal(&self, graph: &Graph, line: LineIdx) -> bool {
        let [j0, j1] = graph.lines()[line].joints;
        self.levels[j0] == self.levels[j1]
    }

    /// The edges that cross the slab between sweep lines `a` and `b` (with `a` above `b`), in
    /// left-to-right order as seen from `side`.
    pub fn sweepers(&self, graph: &Graph, a: usize, b: usize, side: Side, eps: f64) -> Vec<Sweeper> {
        let (ya, yb) = (self.lines[a].y(), self.lines[b].y());
        let y_mid = (ya + yb) / 2.0;
        let line = match side {
            Side::Up => &self.lines[a],
            Side::Down => &self.lines[b],
        };
        let joints = graph.joints();
        let x_mid = |l: LineIdx| {
            let [j0, j1] = graph.lines()[l].joints;
            x_at_y(joints[j0].point, joints[j1].point, y_mid)
        };

        let mut ret = Vec::new();
        for entry in line.entries() {
            match entry.joint {
                SweepJoint::Relay { line } => ret.push(Sweeper {
                    joint: None,
                    line,
                    x: entry.x,
                    x_mid: x_mid(line),
                }),
                SweepJoint::Endpoint(j) => {
                    let incident: ArrayVec<LineIdx, 2> =
                        [joints[j].prev, joints[j].next].into_iter().collect();
                    for l in incident {
                        if self.is_horizontal(graph, l) {
                            continue;
                        }
                        let other = self.levels[graph.other_joint(l, j)];
                        let wanted = match side {
                            Side::Up => other > ya,
                            Side::Down => other < yb,
                        };
                        if wanted {
                            ret.push(Sweeper {
                                joint: Some(j),
                                line: l,
                                x: entry.x,
                                x_mid: x_mid(l),
                            });
                        }
                    }
                }
            }
        }
        sort_clusters(&mut ret, eps);
        ret
    }
}

/// Sorts runs of sweepers that meet the sweep line at the same place by where they go next.
fn sort_clusters(sweepers: &mut [Sweeper], eps: f64) {
    let mut start = 0;
    while start < sweepers.len() {
        let mut end = start + 1;
        while end < sweepers.len() && sweepers[end].x - sweepers[end - 1].x <= eps {
            end += 1;
        }
        sweepers[start..end].sort_by_key(|s| (CheapOrderedFloat::from(s.x_mid), s.line));
        start = end;
    }
}

struct Driver<'a> {
    graph: &'a mut Graph,
    options: &'a ClipOptions,
    state: SweepState,
}

/// Runs the sweep over every joint in `graph`, splitting edges at all of their crossings.
pub fn sweep(graph: &mut Graph, options: &ClipOptions) -> Result<SweepState, Error> {
    let mut driver = Driver {
        graph,
        options,
        state: SweepState::default(),
    };
    driver.prepare_sweep_lines();
    for idx in 0..driver.state.lines.len() {
        driver.proceed_overlapped_intersection(idx)?;
    }
    driver.proceed_intersections()?;
    driver.finish_intersections();

    let mut state = driver.state;
    state
        .lines
        .sort_by_key(|line| CheapOrderedFloat::from(line.y()));
    tracing::debug!(
        sweep_lines = state.lines.len(),
        intersections = state.intersections.len(),
        "sweep finished"
    );
    for line in &state.lines {
        tracing::trace!(y = line.y(), entries = ?line.entries(), "sweep line");
    }
    Ok(state)
}

impl Driver<'_> {
    fn eps(&self) -> f64 {
        self.options.coincidence_eps
    }

    fn point(&self, j: JointIdx) -> Point {
        self.graph.joints()[j].point
    }

    fn prepare_sweep_lines(&mut self) {
        let eps = self.eps();
        let joints = self.graph.joints();
        let mut sorted: Vec<JointIdx> = joints
            .iter()
            .filter(|(_, j)| {
                !matches!(j.kind, JointKind::Mirror { .. } | JointKind::Final { .. })
            })
            .map(|(idx, _)| idx)
            .collect();
        sorted.sort_by_key(|&j| {
            let p = joints[j].point;
            (CheapOrderedFloat::from(p.y), CheapOrderedFloat::from(p.x))
        });

        self.state.levels = Levels::filled(joints.len(), f64::NAN);
        let mut groups: Vec<(f64, Vec<JointIdx>)> = Vec::new();
        for j in sorted {
            let y = joints[j].point.y;
            match groups.last_mut() {
                Some((group_y, members)) if y - *group_y <= eps => members.push(j),
                _ => groups.push((y, vec![j])),
            }
        }

        // Relays compare the levels of both ends of a line, so every joint needs its level
        // before any sweep line is built.
        for (y, members) in &groups {
            for &j in members {
                self.state.levels[j] = *y;
            }
        }

        for (y, members) in groups {
            let mut line = SweepLine::new(y);
            for &j in &members {
                line.ensure_unique_create(self.graph, j);
            }
            if let Some(last) = self.state.lines.last() {
                // Everything that was active on the previous line and still straddles this
                // one gets carried over.
                let mut carried: Vec<LineIdx> = Vec::new();
                for entry in last.entries() {
                    match entry.joint {
                        SweepJoint::Endpoint(j) => {
                            let joint = &self.graph.joints()[j];
                            carried.push(joint.prev);
                            carried.push(joint.next);
                        }
                        SweepJoint::Relay { line } => carried.push(line),
                    }
                }
                for l in carried {
                    line.create_relay(self.graph, &self.state.levels, l);
                }
            }
            self.state.lines.push(line);
        }
    }

    /// Splits `line` at `point`, which lies on sweep line level `level`.
    ///
    /// The new joint is an intersection joint whose partner still needs to be filled in by
    /// [`Driver::pair`].
    fn split_at(&mut self, line: LineIdx, point: Point, level: f64) -> JointIdx {
        let l = self.graph.lines()[line];
        let [j0, j1] = l.joints;
        let f = project_fraction(point, self.point(j0), self.point(j1));
        let t = l.t[0] + (l.t[1] - l.t[0]) * f;

        let mid = self.graph.joints().next_idx();
        let mid = self.graph.push_joint(
            point,
            JointKind::Intersect {
                info: l.info,
                t,
                symmetric: mid,
                orient: [mid; 2],
                cut: [mid; 2],
            },
        );
        self.state.levels.resize(self.graph.joints().len(), f64::NAN);
        self.state.levels[mid] = level;
        let second = self.graph.split_line(line, mid, t);

        // Relays between the new joint and the far end now belong to the second half.
        let far = self.state.levels[j1];
        let (lo, hi) = (level.min(far), level.max(far));
        for sweep_line in &mut self.state.lines {
            if lo < sweep_line.y() && sweep_line.y() < hi {
                sweep_line.rename_relay(line, second);
            }
        }
        self.state.intersections.push(mid);
        mid
    }

    fn pair(&mut self, a: JointIdx, b: JointIdx) {
        for (j, other) in [(a, b), (b, a)] {
            if let JointKind::Intersect { symmetric, .. } = &mut self.graph.joints[j].kind {
                *symmetric = other;
            }
        }
        tracing::trace!(?a, ?b, point = ?self.point(a), "intersection");
    }

    /// Handles everything that crosses at the height of sweep line `idx` itself: edges
    /// crossing horizontal edges, and pairs of edges crossing exactly on the line.
    fn proceed_overlapped_intersection(&mut self, idx: usize) -> Result<(), Error> {
        let eps = self.eps();
        let y = self.state.lines[idx].y();
        let endpoints: Vec<(JointIdx, f64)> = self.state.lines[idx].endpoints().collect();
        let relays: Vec<(LineIdx, f64)> = self.state.lines[idx].relays().collect();

        let mut horizontals: Vec<LineIdx> = endpoints
            .iter()
            .flat_map(|&(j, _)| {
                let joint = &self.graph.joints()[j];
                [joint.prev, joint.next]
            })
            .filter(|&l| self.state.is_horizontal(self.graph, l))
            .collect();
        horizontals.sort();
        horizontals.dedup();

        let range = |l: LineIdx| {
            let [j0, j1] = self.graph.lines()[l].joints;
            let (x0, x1) = (self.point(j0).x, self.point(j1).x);
            (x0.min(x1), x0.max(x1))
        };

        for (i, &h0) in horizontals.iter().enumerate() {
            let (lo0, hi0) = range(h0);
            for &h1 in &horizontals[i + 1..] {
                let (lo1, hi1) = range(h1);
                if hi0.min(hi1) - lo0.max(lo1) > eps {
                    return Err(Error::NotImplemented(Unimplemented::Overlap));
                }
            }
            if endpoints
                .iter()
                .any(|&(_, x)| lo0 + eps < x && x < hi0 - eps)
            {
                return Err(Error::NotImplemented(Unimplemented::Touching));
            }
        }

        for &(_, xr) in &relays {
            if endpoints.iter().any(|&(_, xe)| (xr - xe).abs() <= eps) {
                return Err(Error::NotImplemented(Unimplemented::Touching));
            }
        }

        // Relays are already sorted by x, so coincident ones are adjacent.
        let mut coincident: Vec<(LineIdx, LineIdx, f64)> = Vec::new();
        for w in relays.windows(2) {
            let ((l0, x0), (l1, x1)) = (w[0], w[1]);
            if x1 - x0 <= eps {
                if coincident.last().is_some_and(|&(_, last, _)| last == l0) {
                    return Err(Error::NotImplemented(Unimplemented::Touching));
                }
                coincident.push((l0, l1, (x0 + x1) / 2.0));
            }
        }

        let mut crossings: Vec<(LineIdx, Vec<(LineIdx, f64)>)> = Vec::new();
        for &h in &horizontals {
            let (lo, hi) = range(h);
            let inside: Vec<(LineIdx, f64)> = relays
                .iter()
                .copied()
                .filter(|&(_, x)| lo + eps < x && x < hi - eps)
                .collect();
            if inside.is_empty() {
                continue;
            }
            if inside
                .iter()
                .any(|&(l, _)| coincident.iter().any(|&(a, b, _)| a == l || b == l))
            {
                return Err(Error::NotImplemented(Unimplemented::Touching));
            }
            crossings.push((h, inside));
        }

        for (l0, l1, x) in coincident {
            let point = Point::new(x, y);
            let a = self.split_at(l0, point, y);
            let b = self.split_at(l1, point, y);
            self.pair(a, b);
            let line = &mut self.state.lines[idx];
            line.replace_relay(self.graph, l0, a);
            line.replace_relay(self.graph, l1, b);
        }

        for (h, mut inside) in crossings {
            let [j0, j1] = self.graph.lines()[h].joints;
            let (p0, p1) = (self.point(j0), self.point(j1));
            // Split from the start of the edge towards its end, so that each split lands on
            // the remaining second half.
            if p1.x < p0.x {
                inside.reverse();
            }
            let mut rest = h;
            for (r, x) in inside {
                let point = Point::new(x, y_at_x(p0, p1, x));
                let on_relay = self.split_at(r, point, y);
                let on_horizontal = self.split_at(rest, point, y);
                rest = self.graph.joints()[on_horizontal].next;
                self.pair(on_relay, on_horizontal);
                let line = &mut self.state.lines[idx];
                line.replace_relay(self.graph, r, on_relay);
                line.create_joint(self.graph, on_horizontal);
            }
        }
        Ok(())
    }

    fn proceed_intersections(&mut self) -> Result<(), Error> {
        let n = self.state.lines.len();
        let mut work: Vec<(usize, usize)> = (1..n).rev().map(|i| (i - 1, i)).collect();
        let mut found = 0;
        while let Some((a, b)) = work.pop() {
            let Some(new) = self.proceed_intersection(a, b)? else {
                continue;
            };
            found += 1;
            if found > self.options.max_intersections {
                return Err(Error::BudgetExhausted(self.options.max_intersections));
            }
            work.push((new, b));
            work.push((a, new));
        }
        Ok(())
    }

    /// Looks for a crossing strictly inside the slab between sweep lines `a` and `b`.
    ///
    /// If there is one, a new sweep line is created at the crossing and its index returned.
    fn proceed_intersection(&mut self, a: usize, b: usize) -> Result<Option<usize>, Error> {
        let eps = self.eps();
        let up = self.state.sweepers(self.graph, a, b, Side::Up, eps);
        let down = self.state.sweepers(self.graph, a, b, Side::Down, eps);
        let (ya, yb) = (self.state.lines[a].y(), self.state.lines[b].y());
        if up.len() != down.len() {
            let x = up.first().or(down.first()).map_or(0.0, |s| s.x);
            return Err(Error::degenerate(Point::new(x, ya)));
        }
        let Some(k) = (0..up.len()).find(|&k| up[k].line != down[k].line) else {
            return Ok(None);
        };

        let (p, q) = (up[k].line, down[k].line);
        let [p0, p1] = self.graph.lines()[p].joints;
        let [q0, q1] = self.graph.lines()[q].joints;
        let point = line_crossing(
            self.point(p0),
            self.point(p1),
            self.point(q0),
            self.point(q1),
            self.options.length_eps * self.options.length_eps,
        )
        .ok_or(Error::NotImplemented(Unimplemented::Overlap))?;
        if !(ya + eps < point.y && point.y < yb - eps) {
            return Err(Error::degenerate(point));
        }

        let mut line = SweepLine::new(point.y);
        for s in &up {
            if s.line != p && s.line != q {
                line.create_relay(self.graph, &self.state.levels, s.line);
            }
        }
        let new = self.state.lines.len();
        self.state.lines.push(line);

        let x_p = self.split_at(p, point, point.y);
        let x_q = self.split_at(q, point, point.y);
        self.pair(x_p, x_q);
        self.state.lines[new].create_joint(self.graph, x_p);
        self.state.lines[new].create_joint(self.graph, x_q);

        self.proceed_overlapped_intersection(new)?;
        Ok(Some(new))
    }

    /// The nearest joint in direction `dir` (0 for backwards, 1 for forwards) from `j` that
    /// isn't an intersection.
    fn skip_intersections(&self, j: JointIdx, dir: usize) -> JointIdx {
        let mut cur = j;
        for _ in 0..self.graph.joints().len() {
            cur = if dir == 0 {
                self.graph.prev_joint(cur)
            } else {
                self.graph.next_joint(cur)
            };
            if !self.graph.joints()[cur].is_intersect() {
                break;
            }
        }
        cur
    }

    fn finish_intersections(&mut self) {
        let orients: Vec<(JointIdx, [JointIdx; 2])> = self
            .state
            .intersections
            .iter()
            .map(|&j| (j, [self.skip_intersections(j, 0), self.skip_intersections(j, 1)]))
            .collect();
        for &(j, o) in &orients {
            if let JointKind::Intersect { orient, .. } = &mut self.graph.joints[j].kind {
                *orient = o;
            }
        }
        for &(j, _) in &orients {
            let JointKind::Intersect { symmetric, .. } = self.graph.joints()[j].kind else {
                continue;
            };
            let JointKind::Intersect { orient: theirs, .. } = self.graph.joints()[symmetric].kind
            else {
                continue;
            };
            if let JointKind::Intersect { cut, .. } = &mut self.graph.joints[j].kind {
                *cut = theirs;
            }
        }
    }
}
