//! Tolerances and limits.
//!
//! All of the floating-point slop used by the clipper lives here, so that every phase agrees
//! on what "the same point" means.

/// Options controlling a clip.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClipOptions {
    /// Two heights closer than this share a sweep line, and two positions on one sweep line
    /// closer than this are considered coincident.
    pub coincidence_eps: f64,

    /// Segments shorter than this are rejected as zero-length.
    pub length_eps: f64,

    /// The maximum distance between a curve and its flattened polyline.
    pub flatten_tolerance: f64,

    /// The fewest straight pieces a curve is flattened into.
    pub min_flatten_steps: usize,

    /// The most straight pieces a curve is flattened into.
    pub max_flatten_steps: usize,

    /// How many intersections the sweep may insert before giving up.
    pub max_intersections: usize,

    /// Iteration limit when refining curve/curve intersections.
    pub newton_iterations: usize,

    /// Two curve parameters closer than this are the same split point.
    pub param_eps: f64,
}

impl Default for ClipOptions {
    fn default() -> Self {
        ClipOptions {
            coincidence_eps: 1e-5,
            length_eps: 1e-4,
            flatten_tolerance: 0.01,
            min_flatten_steps: 3,
            max_flatten_steps: 256,
            max_intersections: 1 << 20,
            newton_iterations: 24,
            param_eps: 1e-6,
        }
    }
}

impl ClipOptions {
    /// The number of straight pieces to flatten a curve of the given degree into.
    ///
    /// `second_diff` is the length of the largest second difference of the control polygon.
    /// This is the usual bound for uniform subdivision: with `n` pieces, the polyline
    /// stays within `d (d - 1) / 8 * second_diff / n^2` of the curve.
    pub fn flatten_steps(&self, degree: usize, second_diff: f64) -> usize {
        let d = degree as f64;
        let bound = d * (d - 1.0) / 8.0 * second_diff / self.flatten_tolerance;
        let n = bound.sqrt().ceil();
        if n.is_finite() && n >= 0.0 {
            (n as usize).clamp(self.min_flatten_steps, self.max_flatten_steps)
        } else {
            self.max_flatten_steps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_steps_are_clamped() {
        let opts = ClipOptions::default();
        assert_eq!(opts.flatten_steps(3, 0.0), opts.min_flatten_steps);
        assert_eq!(opts.flatten_steps(3, 1e12), opts.max_flatten_steps);
        // A quarter circle of radius 1 has a second difference of about 0.46.
        assert_eq!(opts.flatten_steps(3, 0.46), 6);
    }
}
