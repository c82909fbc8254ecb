use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dial_knob_core::{
    BasicHolder, Document, KnobHandle, KnobKind, KnobSpec, ValueChangedReason, ViewId,
};

const MAIN: ViewId = ViewId::MAIN;

fn animated_knob(doc: &Document, holder: &str, keys: usize) -> KnobHandle {
    let h = doc
        .create_holder(holder, Arc::new(BasicHolder::new()))
        .unwrap();
    let k = doc
        .create_knob(h, KnobSpec::new("size", KnobKind::Double).animated(true))
        .unwrap();
    for i in 0..keys {
        let t = i as f64 * 4.0;
        doc.set_value_at_time(k, t, (t * 0.1).sin(), 0, MAIN, ValueChangedReason::UserEdited)
            .unwrap();
    }
    k
}

fn bench_values(c: &mut Criterion) {
    let doc = Document::new();
    let h = doc
        .create_holder("Grade1", Arc::new(BasicHolder::new()))
        .unwrap();
    let gain = doc
        .create_knob(h, KnobSpec::new("gain", KnobKind::Double))
        .unwrap();
    c.bench_function("knob_set_value", |b| {
        let mut v = 0.0;
        b.iter(|| {
            v += 1.0;
            doc.set_value(gain, black_box(v), 0, MAIN, ValueChangedReason::UserEdited)
                .unwrap()
        })
    });

    let size = animated_knob(&doc, "Blur1", 128);
    c.bench_function("knob_value_at_time_128_keys", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for f in 0..256 {
                acc += doc
                    .get_value_at_time(size, black_box(f as f64), 0, MAIN)
                    .unwrap()
                    .as_f64()
                    .unwrap_or(0.0);
            }
            acc
        })
    });

    // eight slaves chained behind the animated knob
    let mut master = size;
    for i in 0..8 {
        let h = doc
            .create_holder(&format!("Link{i}"), Arc::new(BasicHolder::new()))
            .unwrap();
        let slave = doc
            .create_knob(h, KnobSpec::new("size", KnobKind::Double))
            .unwrap();
        doc.link_to(slave, 0, MAIN, master, 0, MAIN).unwrap();
        master = slave;
    }
    c.bench_function("knob_value_through_8_links", |b| {
        b.iter(|| doc.get_value_at_time(master, black_box(17.0), 0, MAIN).unwrap())
    });
}

criterion_group!(benches, bench_values);
criterion_main!(benches);
