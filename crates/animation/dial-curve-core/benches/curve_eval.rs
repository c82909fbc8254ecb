use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dial_curve_core::{Curve, Interpolation, KeyFrame};

fn build_curve(keys: usize, interpolation: Interpolation) -> Curve {
    let mut curve = Curve::new();
    for i in 0..keys {
        let t = i as f64 * 4.0;
        let v = (t * 0.1).sin() * 10.0;
        curve.add_keyframe(KeyFrame::new(t, v).with_interpolation(interpolation));
    }
    curve
}

fn bench_evaluate(c: &mut Criterion) {
    let smooth = build_curve(256, Interpolation::Smooth);
    let linear = build_curve(256, Interpolation::Linear);
    c.bench_function("curve_evaluate_smooth_256", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for f in 0..1024 {
                acc += smooth.evaluate(black_box(f as f64)).unwrap_or(0.0);
            }
            acc
        })
    });
    c.bench_function("curve_evaluate_linear_256", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for f in 0..1024 {
                acc += linear.evaluate(black_box(f as f64)).unwrap_or(0.0);
            }
            acc
        })
    });
    c.bench_function("curve_integrate_smooth_256", |b| {
        b.iter(|| smooth.integrate(black_box(0.0), black_box(1000.0)))
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
