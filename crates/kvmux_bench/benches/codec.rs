//! Value packing benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvmux_bench::{int_set, kv_object, random_string, string_int_map, string_list};
use kvmux_codec::{pack, pack_attributes, unpack, unpack_attributes, Value};

/// Benchmark packing primitives.
fn bench_pack_primitive(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_primitive");

    group.bench_function("int", |b| {
        let value = Value::Int(42);
        b.iter(|| black_box(pack(black_box(&value)).unwrap()));
    });

    group.bench_function("float", |b| {
        let value = Value::Float(3.25);
        b.iter(|| black_box(pack(black_box(&value)).unwrap()));
    });

    group.bench_function("string_64", |b| {
        let value = Value::String(random_string(64));
        b.iter(|| black_box(pack(black_box(&value)).unwrap()));
    });

    group.finish();
}

/// Benchmark packing and unpacking containers of growing size.
fn bench_containers(c: &mut Criterion) {
    let mut group = c.benchmark_group("containers");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        let list = string_list(*size, 16);
        group.bench_with_input(BenchmarkId::new("pack_list", size), &list, |b, v| {
            b.iter(|| black_box(pack(black_box(v)).unwrap()));
        });

        // Sets are sorted while packing.
        let set = int_set(*size);
        group.bench_with_input(BenchmarkId::new("pack_set", size), &set, |b, v| {
            b.iter(|| black_box(pack(black_box(v)).unwrap()));
        });

        let map = string_int_map(*size);
        let packed = pack(&map).unwrap();
        group.bench_with_input(BenchmarkId::new("unpack_map", size), &packed, |b, p| {
            b.iter(|| black_box(unpack(p.datatype, black_box(&p.bytes)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark whole-object attribute packing.
fn bench_attributes(c: &mut Criterion) {
    let mut group = c.benchmark_group("attributes");

    for elements in [4, 64].iter() {
        let attrs = kv_object(*elements);
        group.bench_with_input(BenchmarkId::new("pack", elements), &attrs, |b, a| {
            b.iter(|| black_box(pack_attributes(black_box(a)).unwrap()));
        });

        let packed = pack_attributes(&attrs).unwrap();
        group.bench_with_input(BenchmarkId::new("unpack", elements), &packed, |b, p| {
            b.iter(|| black_box(unpack_attributes(black_box(p)).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pack_primitive, bench_containers, bench_attributes);
criterion_main!(benches);
