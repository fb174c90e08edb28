//! # Query Benchmark
//!
//! Compares a cached query update against a full rebuild, and measures a
//! linear Position += Velocity pass over the matched arrays.

#![allow(missing_docs)]

use bytemuck::{Pod, Zeroable};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_core::{ComponentType, EntityManager, EntityQueryCache};

const ENTITY_COUNT: usize = 100_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Mass(f32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Charge(f32);

/// Spreads entities over four archetypes, three of which match the query.
fn world() -> EntityManager {
    let mut manager = EntityManager::new();
    let registry = manager.archetypes().clone();
    let shapes = [
        registry.intern_bundle::<(Position, Velocity)>().unwrap(),
        registry.intern_bundle::<(Position, Velocity, Mass)>().unwrap(),
        registry.intern_bundle::<(Position, Velocity, Charge)>().unwrap(),
        registry.intern_bundle::<(Mass, Charge)>().unwrap(),
    ];
    for i in 0..ENTITY_COUNT {
        let e = manager.create_entity(&shapes[i % shapes.len()]).unwrap();
        if let Ok(v) = manager.get_component_mut::<Velocity>(e) {
            *v = Velocity { x: 1.0, y: 0.5, z: 0.25 };
        }
    }
    manager
}

fn required() -> [ComponentType; 2] {
    [
        ComponentType::of::<Position>().unwrap(),
        ComponentType::of::<Velocity>().unwrap(),
    ]
}

fn bench_update(c: &mut Criterion) {
    let manager = world();

    let mut cached = EntityQueryCache::requiring(&manager, &required());
    cached.update(&manager).unwrap();
    c.bench_function("query_update_cached", |b| {
        b.iter(|| black_box(cached.update(&manager).unwrap()));
    });

    c.bench_function("query_update_rebuild", |b| {
        b.iter(|| {
            let mut fresh = EntityQueryCache::requiring(&manager, &required());
            black_box(fresh.update(&manager).unwrap())
        });
    });
}

fn bench_apply_velocity(c: &mut Criterion) {
    let mut manager = world();
    let mut query = EntityQueryCache::requiring(&manager, &required());
    query.update(&manager).unwrap();

    c.bench_function("apply_velocity_100k", |b| {
        b.iter(|| {
            for mut array in query.iter_mut(&mut manager).unwrap() {
                let (positions, velocities) = array.get_span_pair::<Position, Velocity>().unwrap();
                for (p, v) in positions.iter_mut().zip(velocities.iter()) {
                    p.x += v.x * 0.016;
                    p.y += v.y * 0.016;
                    p.z += v.z * 0.016;
                }
            }
            black_box(manager.len())
        });
    });
}

criterion_group!(benches, bench_update, bench_apply_velocity);
criterion_main!(benches);
