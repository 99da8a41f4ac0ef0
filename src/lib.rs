#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod typed_vec;

mod assemble;
mod contours;
pub mod curve;
mod error;
mod flatten;
mod geom;
pub mod graph;
mod num;
mod options;
pub mod sweep;

pub use contours::{compile_path, ClipResult, Contour, ContourIdx};
pub use error::{Error, InvalidPathError, Unimplemented};
pub use flatten::create_polygons;
pub use graph::{Graph, JointIdx, JointKind, LineIdx, PathInfoIdx, Polygon};
pub use options::ClipOptions;

use kurbo::BezPath;
use sweep::SweepState;

/// The set operations.
///
/// All three share one driver; the operation only matters when the output is assembled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ClipOp {
    /// A point is in the union if it is inside any input contour.
    ///
    /// Not implemented: [`Clipper::output`] returns [`Unimplemented::Union`].
    Union,
    /// A point is in the intersection if it is inside every input contour.
    ///
    /// Not implemented: [`Clipper::output`] returns [`Unimplemented::Intersect`].
    Intersect,
    /// A point is in the exclusion if it is inside an odd number of input contours.
    Exclude,
}

/// One clip request.
///
/// Add the input polygons with [`Clipper::add_polygon`], run the intersection search with
/// [`Clipper::proceed`], and then assemble the result with [`Clipper::output`]. Everything
/// the clip allocates lives here and is dropped along with it.
#[derive(Clone, Debug)]
pub struct Clipper {
    op: ClipOp,
    options: ClipOptions,
    graph: Graph,
    polygons: Vec<JointIdx>,
    state: Option<SweepState>,
}

impl Clipper {
    /// Creates a clipper with no input.
    pub fn new(op: ClipOp, options: ClipOptions) -> Self {
        Clipper {
            op,
            options,
            graph: Graph::default(),
            polygons: Vec::new(),
            state: None,
        }
    }

    /// Adds one input contour.
    ///
    /// Adding a polygon after [`Clipper::proceed`] means that the search has to run again.
    pub fn add_polygon(&mut self, polygon: Polygon) {
        let offset = self.graph.adopt(polygon.graph);
        self.polygons.push(polygon.start.offset(offset));
        self.state = None;
    }

    /// The number of input contours.
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// The graph of all input contours, including any intersections found so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The sweep lines of the last intersection search, if it has run.
    pub fn sweep_state(&self) -> Option<&SweepState> {
        self.state.as_ref()
    }

    /// Finds every crossing between the input contours and splits the edges there.
    pub fn proceed(&mut self) -> Result<(), Error> {
        if self.state.is_some() {
            return Ok(());
        }
        tracing::debug!(
            op = ?self.op,
            polygons = self.polygons.len(),
            joints = self.graph.joints().len(),
            "clipping"
        );
        self.state = Some(sweep::sweep(&mut self.graph, &self.options)?);
        Ok(())
    }

    /// Assembles the output contours, restoring the exact input curves on them.
    pub fn output(mut self) -> Result<ClipResult, Error> {
        let state = match self.state.take() {
            Some(state) => state,
            None => sweep::sweep(&mut self.graph, &self.options)?,
        };
        match self.op {
            ClipOp::Union => return Err(Error::NotImplemented(Unimplemented::Union)),
            ClipOp::Intersect => return Err(Error::NotImplemented(Unimplemented::Intersect)),
            ClipOp::Exclude => {}
        }
        let patches = assemble::assemble(&mut self.graph, &state, &self.options)?;
        let restored = curve::restore(&self.graph, &patches, &self.options);
        Ok(ClipResult::new(restored, &patches))
    }
}

fn clip(
    op: ClipOp,
    polygons: impl IntoIterator<Item = Polygon>,
    options: &ClipOptions,
) -> Result<ClipResult, Error> {
    let mut clipper = Clipper::new(op, *options);
    for polygon in polygons {
        clipper.add_polygon(polygon);
    }
    clipper.proceed()?;
    clipper.output()
}

/// Computes the region covered by an odd number of the input polygons.
pub fn exclude(
    polygons: impl IntoIterator<Item = Polygon>,
    options: &ClipOptions,
) -> Result<ClipResult, Error> {
    clip(ClipOp::Exclude, polygons, options)
}

/// Computes the region covered by any of the input polygons.
///
/// This always fails with [`Unimplemented::Union`] (after validating and intersecting the
/// input).
pub fn union(
    polygons: impl IntoIterator<Item = Polygon>,
    options: &ClipOptions,
) -> Result<ClipResult, Error> {
    clip(ClipOp::Union, polygons, options)
}

/// Computes the region covered by all of the input polygons.
///
/// This always fails with [`Unimplemented::Intersect`] (after validating and intersecting
/// the input).
pub fn intersect(
    polygons: impl IntoIterator<Item = Polygon>,
    options: &ClipOptions,
) -> Result<ClipResult, Error> {
    clip(ClipOp::Intersect, polygons, options)
}

/// Splits `path` into subpaths, excludes them against one another, and renders the result.
pub fn exclude_path(path: &BezPath, options: &ClipOptions) -> Result<BezPath, Error> {
    let polygons = create_polygons(path.elements().iter().copied(), options)?;
    Ok(compile_path(&exclude(polygons, options)?))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use kurbo::{PathEl, Point};

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Polygon {
        let mut path = BezPath::new();
        path.move_to((x, y));
        path.line_to((x + size, y));
        path.line_to((x + size, y + size));
        path.line_to((x, y + size));
        path.close_path();
        create_polygons(path.elements().iter().copied(), &ClipOptions::default())
            .unwrap()
            .remove(0)
    }

    #[test]
    fn clipper_phases() {
        let mut clipper = Clipper::new(ClipOp::Exclude, ClipOptions::default());
        clipper.add_polygon(square(0.0, 0.0, 1.0));
        clipper.add_polygon(square(0.5, 0.5, 1.0));
        assert_eq!(clipper.polygon_count(), 2);
        assert!(clipper.sweep_state().is_none());

        clipper.proceed().unwrap();
        assert_eq!(clipper.sweep_state().unwrap().intersections.len(), 4);
        // Running again is a no-op.
        clipper.proceed().unwrap();
        assert_eq!(clipper.graph().joints().len(), 12);

        let result = clipper.output().unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn output_runs_the_search_if_needed() {
        let mut clipper = Clipper::new(ClipOp::Exclude, ClipOptions::default());
        clipper.add_polygon(square(0.0, 0.0, 1.0));
        let result = clipper.output().unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn union_and_intersect_are_unimplemented() {
        let polys = || [square(0.0, 0.0, 1.0), square(0.5, 0.5, 1.0)];
        let opts = ClipOptions::default();
        assert_matches!(
            union(polys(), &opts),
            Err(Error::NotImplemented(Unimplemented::Union))
        );
        assert_matches!(
            intersect(polys(), &opts),
            Err(Error::NotImplemented(Unimplemented::Intersect))
        );
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let result = exclude([], &ClipOptions::default()).unwrap();
        assert!(result.is_empty());
        assert!(compile_path(&result).elements().is_empty());
    }

    #[test]
    fn single_square_round_trips() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((1.0, 0.0));
        path.line_to((1.0, 1.0));
        path.line_to((0.0, 1.0));
        path.close_path();
        let out = exclude_path(&path, &ClipOptions::default()).unwrap();
        assert_eq!(
            out.elements(),
            &[
                PathEl::MoveTo(Point::new(0.0, 0.0)),
                PathEl::LineTo(Point::new(1.0, 0.0)),
                PathEl::LineTo(Point::new(1.0, 1.0)),
                PathEl::LineTo(Point::new(0.0, 1.0)),
                PathEl::LineTo(Point::new(0.0, 0.0)),
                PathEl::ClosePath,
            ]
        );
    }
}
