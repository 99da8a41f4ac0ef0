//! Errors returned by clipping.

use thiserror::Error;

/// The input path was malformed.
///
/// These are all detected while building polygons, before any sweeping happens.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum InvalidPathError {
    /// A drawing command came before any `MoveTo`.
    #[error("path segment before any move-to")]
    MissingMoveTo,

    /// A segment whose control points all coincide with its start point.
    #[error("zero-length segment at ({x}, {y})")]
    ZeroLengthSegment {
        /// Horizontal position of the segment.
        x: f64,
        /// Vertical position of the segment.
        y: f64,
    },

    /// A subpath that cannot enclose any area, even after closing it.
    #[error("subpath starting at ({x}, {y}) encloses no area")]
    Collapsed {
        /// Horizontal position of the subpath's start.
        x: f64,
        /// Vertical position of the subpath's start.
        y: f64,
    },

    /// A coordinate was infinite or NaN.
    #[error("non-finite coordinate in path")]
    NonFinite,
}

/// Situations that the clipper recognizes but has no rules for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum Unimplemented {
    /// Assembling a union.
    #[error("union assembly")]
    Union,
    /// Assembling an intersection.
    #[error("intersect assembly")]
    Intersect,
    /// Two distinct edges that coincide along a stretch of a sweep line.
    #[error("overlapping edges")]
    Overlap,
    /// A vertex lying in the interior of another edge.
    #[error("vertex touching an edge interior")]
    Touching,
}

/// Everything that can go wrong while clipping.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum Error {
    /// The input path was malformed.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] InvalidPathError),

    /// The input hit a case that isn't supported.
    #[error("not implemented: {0}")]
    NotImplemented(Unimplemented),

    /// The floating-point tolerances couldn't make sense of the geometry near this point.
    #[error("numerical degeneracy near ({x}, {y})")]
    Degenerate {
        /// Horizontal position of the trouble.
        x: f64,
        /// Vertical position of the trouble.
        y: f64,
    },

    /// The intersection search ran past its iteration budget.
    #[error("intersection budget of {0} exhausted")]
    BudgetExhausted(usize),
}

impl Error {
    pub(crate) fn degenerate(p: kurbo::Point) -> Self {
        Error::Degenerate { x: p.x, y: p.y }
    }
}
