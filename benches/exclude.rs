use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kurbo::{BezPath, Circle, Shape};

use sweepclip::{create_polygons, exclude, ClipOp, ClipOptions, Clipper};

// Overlapping circles, with offsets chosen so that no two crossings share a height.
fn circle_grid(n: usize) -> BezPath {
    let mut path = BezPath::new();
    for i in 0..n {
        for j in 0..n {
            let center = (i as f64 * 1.37 + j as f64 * 0.011, j as f64 * 1.29);
            path.extend(Circle::new(center, 1.0).path_elements(0.1));
        }
    }
    path
}

fn just_the_sweep(c: &mut Criterion) {
    let path = circle_grid(6);
    let opts = ClipOptions::default();
    let polys = create_polygons(path.elements().iter().copied(), &opts).unwrap();

    c.bench_function("just the sweep", |b| {
        b.iter(|| {
            let mut clipper = Clipper::new(ClipOp::Exclude, opts);
            for poly in polys.clone() {
                clipper.add_polygon(poly);
            }
            black_box(clipper.proceed())
        })
    });
}

fn exclude_circles(c: &mut Criterion) {
    let path = circle_grid(6);
    let opts = ClipOptions::default();

    c.bench_function("exclude circles", |b| {
        b.iter(|| {
            let polys = create_polygons(path.elements().iter().copied(), &opts);
            black_box(polys.map(|polys| exclude(polys, &opts)))
        })
    });
}

criterion_group!(benches, just_the_sweep, exclude_circles);
criterion_main!(benches);
