#![no_main]

use arbitrary::Arbitrary;
use kurbo::{BezPath, Point};

use libfuzzer_sys::fuzz_target;
use sweepclip::{ClipOptions, exclude_path};

// Small integer coordinates make coincidences (shared vertices, overlapping edges,
// crossings at the same height) common, which is where the clipper has to be careful.
#[derive(Arbitrary, Debug)]
enum Seg {
    Line(i8, i8),
    Quad(i8, i8, i8, i8),
    Cubic(i8, i8, i8, i8, i8, i8),
}

#[derive(Arbitrary, Debug)]
struct Contour {
    start: (i8, i8),
    segs: Vec<Seg>,
}

fn pt(x: i8, y: i8) -> Point {
    Point::new(x as f64 / 4.0, y as f64 / 4.0)
}

fn to_path(contours: &[Contour]) -> BezPath {
    let mut path = BezPath::new();
    for c in contours.iter().take(4) {
        path.move_to(pt(c.start.0, c.start.1));
        for seg in c.segs.iter().take(8) {
            match *seg {
                Seg::Line(x, y) => path.line_to(pt(x, y)),
                Seg::Quad(x0, y0, x1, y1) => path.quad_to(pt(x0, y0), pt(x1, y1)),
                Seg::Cubic(x0, y0, x1, y1, x2, y2) => {
                    path.curve_to(pt(x0, y0), pt(x1, y1), pt(x2, y2))
                }
            }
        }
        path.close_path();
    }
    path
}

fuzz_target!(|contours: Vec<Contour>| {
    let path = to_path(&contours);
    // Degenerate inputs are allowed to fail, but they have to fail with an error.
    if let Ok(out) = exclude_path(&path, &ClipOptions::default()) {
        let moves = out
            .elements()
            .iter()
            .filter(|el| matches!(el, kurbo::PathEl::MoveTo(_)))
            .count();
        let closes = out
            .elements()
            .iter()
            .filter(|el| matches!(el, kurbo::PathEl::ClosePath))
            .count();
        assert_eq!(moves, closes);
    }
});
