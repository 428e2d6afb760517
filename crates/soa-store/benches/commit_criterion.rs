//! Store benchmarks using criterion for historical comparison.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use soa_store::prelude::*;

const POSITION: ComponentId = ComponentId::from_raw(1);
const HEALTH: ComponentId = ComponentId::from_raw(2);
const X: FieldId = FieldId::from_raw(0);
const Y: FieldId = FieldId::from_raw(1);
const HP: FieldId = FieldId::from_raw(0);

fn defs() -> [ComponentDef; 2] {
    [
        ComponentDef::new(
            POSITION,
            [
                FieldDef::new(X, ElementType::I64),
                FieldDef::new(Y, ElementType::I64),
            ],
        ),
        ComponentDef::scalar(HEALTH, HP, ElementType::U32),
    ]
}

fn populated(count: u64) -> (ArchetypeStore, ArchetypeId) {
    let mut store = ArchetypeStore::new();
    let arch = store
        .add_archetype(&defs(), count as usize)
        .expect("valid layout");
    for i in 0..count {
        store
            .insert_entity(arch, EntityId::from_raw(i))
            .expect("fresh entity");
    }
    for (component, field) in [(POSITION, X), (POSITION, Y), (HEALTH, HP)] {
        store
            .set_access_rule(arch, component, field, AccessMode::all())
            .expect("registered");
    }
    (store, arch)
}

fn insert_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count));

        group.bench_with_input(BenchmarkId::new("grow", count), &count, |b, &count| {
            b.iter(|| {
                let mut store = ArchetypeStore::new();
                let arch = store.add_archetype(&defs(), 0).expect("valid layout");
                for i in 0..count {
                    black_box(store.insert_entity(arch, EntityId::from_raw(i)).ok());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("reserved", count), &count, |b, &count| {
            b.iter(|| {
                let mut store = ArchetypeStore::new();
                let arch = store
                    .add_archetype(&defs(), count as usize)
                    .expect("valid layout");
                for i in 0..count {
                    black_box(store.insert_entity(arch, EntityId::from_raw(i)).ok());
                }
            });
        });
    }

    group.finish();
}

fn commit_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_writes");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count));

        let xs: Vec<i64> = (0..count as i64).collect();
        let hp: Vec<u32> = vec![1; count as usize];

        group.bench_with_input(BenchmarkId::new("write", count), &count, |b, &count| {
            let (mut store, arch) = populated(count);
            let range = EntityRange::new(arch, 0, count as usize);
            let buffer: WriteBuffer<'_> = std::iter::once(WriteOp::write_slice(
                CommitKey::default(),
                range,
                POSITION,
                X,
                ElementType::I64,
                &xs,
            ))
            .collect();

            b.iter(|| {
                let mut context = CommitContext::default();
                black_box(store.apply_writes(&buffer, &mut context).ok());
            });
        });

        group.bench_with_input(BenchmarkId::new("sum", count), &count, |b, &count| {
            let (mut store, arch) = populated(count);
            let range = EntityRange::new(arch, 0, count as usize);
            let buffer: WriteBuffer<'_> = std::iter::once(WriteOp::reduce_slice(
                CommitKey::default(),
                range,
                HEALTH,
                HP,
                ElementType::U32,
                ReductionOp::Sum,
                &hp,
            ))
            .collect();

            b.iter(|| {
                let mut context = CommitContext::default();
                black_box(store.apply_writes(&buffer, &mut context).ok());
            });
        });

        // Many small ops keyed in reverse so the sort does real work.
        group.bench_with_input(BenchmarkId::new("sorted_ops", count), &count, |b, &count| {
            let (mut store, arch) = populated(count);
            let buffer: WriteBuffer<'_> = (0..count as usize)
                .rev()
                .map(|row| {
                    WriteOp::write_slice(
                        CommitKey::new(0, row as u64, 0),
                        EntityRange::single(arch, row),
                        HEALTH,
                        HP,
                        ElementType::U32,
                        &hp[row..=row],
                    )
                })
                .collect();

            b.iter(|| {
                let mut context = CommitContext::default();
                black_box(store.apply_writes(&buffer, &mut context).ok());
            });
        });
    }

    group.finish();
}

fn view_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("view");

    for count in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(count));

        group.bench_with_input(BenchmarkId::new("read_all", count), &count, |b, &count| {
            let (store, arch) = populated(count);
            b.iter(|| {
                let view = store.get_view(arch, POSITION, X);
                black_box(read_all::<i64>(&store, &view));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    insert_benchmarks,
    commit_benchmarks,
    view_benchmarks
);
criterion_main!(benches);
