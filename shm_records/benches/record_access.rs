//! Record get/set/borrow performance benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use shm_records::{FieldValue, Record, RecordLayout, RecordView, Scalar, ShmConfig};
use std::hint::black_box;

const RECORDS: usize = 4096;

fn bench_config() -> (tempfile::TempDir, ShmConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = ShmConfig::with_dir(dir.path());
    (dir, config)
}

/// Benchmark single-primitive access through the scalar codec
fn bench_scalar_access(c: &mut Criterion) {
    let (_dir, config) = bench_config();
    let mut view = RecordView::create_in(&config, RECORDS, Scalar::<f64>::new()).unwrap();

    c.bench_function("scalar_set_at", |b| {
        let mut index = 0;
        b.iter(|| {
            view.set_at(black_box(index), &1.5).unwrap();
            index = (index + 1) % RECORDS;
        });
    });

    c.bench_function("scalar_get_at", |b| {
        let mut index = 0;
        b.iter(|| {
            black_box(view.get_at(black_box(index)).unwrap());
            index = (index + 1) % RECORDS;
        });
    });

    view.teardown().unwrap();
}

/// Benchmark multi-field records through the layout codec
fn bench_layout_access(c: &mut Criterion) {
    let (_dir, config) = bench_config();
    let layout = RecordLayout::parse("<qdI8s").unwrap();
    let mut view = RecordView::create_in(&config, RECORDS, layout).unwrap();
    let record = Record::new(vec![
        FieldValue::I64(42),
        FieldValue::F64(0.25),
        FieldValue::U32(7),
        FieldValue::Bytes(b"sensor01".to_vec()),
    ]);

    c.bench_function("layout_set_at", |b| {
        b.iter(|| view.set_at(black_box(17), &record).unwrap());
    });

    c.bench_function("layout_get_at", |b| {
        b.iter(|| black_box(view.get_at(black_box(17)).unwrap()));
    });

    c.bench_function("layout_iter_all", |b| {
        b.iter(|| {
            for entry in view.iter().unwrap() {
                black_box(entry.unwrap());
            }
        });
    });

    view.teardown().unwrap();
}

/// Benchmark borrow token issue/release against a full copy
fn bench_borrow(c: &mut Criterion) {
    let (_dir, config) = bench_config();
    let mut view = RecordView::create_in(&config, RECORDS, Scalar::<u64>::new()).unwrap();

    c.bench_function("borrow_single_record", |b| {
        b.iter(|| {
            let bytes = view.borrow(black_box(100)).unwrap();
            black_box(bytes[0]);
        });
    });

    c.bench_function("borrow_full_range_sum", |b| {
        b.iter(|| {
            let bytes = view.borrow(..).unwrap();
            black_box(bytes.iter().map(|&byte| byte as u64).sum::<u64>());
        });
    });

    view.teardown().unwrap();
}

criterion_group!(
    benches,
    bench_scalar_access,
    bench_layout_access,
    bench_borrow
);
criterion_main!(benches);
