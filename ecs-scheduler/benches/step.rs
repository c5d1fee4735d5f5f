// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Benchmarks for whole steps
//!
//! Measures step latency for a small movement pipeline under different inner
//! parallelism strategies, and the pure dispatch overhead of wide and deep
//! graphs of empty systems.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ecs_scheduler::{Context, PoolConfig, SignatureList, Strategy, SystemId, SystemSignature};

#[derive(Debug, Clone, Copy)]
struct Position(f64, f64);
#[derive(Debug, Clone, Copy)]
struct Velocity(f64, f64);
#[derive(Debug, Clone, Copy)]
struct Acceleration(f64, f64);

fn movement_context(n_entities: usize, strategy: Strategy) -> Context {
    let mut list = SignatureList::new();
    let pos = list.component::<Position>("position");
    let vel = list.component::<Velocity>("velocity");
    let acc = list.component::<Acceleration>("acceleration");

    let accelerate = list.system(
        SystemSignature::new("accelerate")
            .read(acc)
            .mutate(vel)
            .strategy(strategy.clone()),
        move |data| {
            data.for_entities(|data, e| {
                let a = *data.get::<Acceleration>(acc, e)?;
                let mut v = data.get_mut::<Velocity>(vel, e)?;
                v.0 += a.0 * 0.01;
                v.1 += a.1 * 0.01;
                Ok(())
            })
        },
    );
    list.system(
        SystemSignature::new("integrate")
            .depends_on(accelerate)
            .read(vel)
            .mutate(pos)
            .strategy(strategy),
        move |data| {
            data.for_entities(|data, e| {
                let v = *data.get::<Velocity>(vel, e)?;
                let mut p = data.get_mut::<Position>(pos, e)?;
                p.0 += v.0 * 0.01;
                p.1 += v.1 * 0.01;
                Ok(())
            })
        },
    );

    let mut context = Context::new(list, PoolConfig::from_env()).unwrap();
    context
        .step(|proxy| {
            for i in 0..n_entities {
                let e = proxy.create_entity();
                proxy.add_component(pos, e, Position(i as f64, 0.0)).unwrap();
                proxy.add_component(vel, e, Velocity(1.0, 0.0)).unwrap();
                proxy.add_component(acc, e, Acceleration(0.0, -9.81)).unwrap();
            }
        })
        .unwrap();
    context
}

fn bench_movement_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_step");

    for n_entities in [1_000, 10_000, 100_000].iter() {
        let strategies = [
            ("serial", Strategy::Serial),
            ("per_worker", Strategy::SplitEvenlyPerWorker),
            ("every_1024", Strategy::split_every_n(1024)),
        ];
        for (label, strategy) in strategies {
            let mut context = movement_context(*n_entities, strategy);
            group.bench_with_input(BenchmarkId::new(label, n_entities), n_entities, |b, _| {
                b.iter(|| black_box(context.step(|_| ()).unwrap()));
            });
        }
    }

    group.finish();
}

fn empty_graph(width: usize, depth: usize) -> Context {
    let mut list = SignatureList::new();
    let mut previous_layer: Vec<SystemId> = Vec::new();
    for layer in 0..depth {
        let mut current = Vec::with_capacity(width);
        for column in 0..width {
            let mut signature = SystemSignature::new(format!("s{}_{}", layer, column));
            for &dep in &previous_layer {
                signature = signature.depends_on(dep);
            }
            current.push(list.system(signature, |_| Ok(())));
        }
        previous_layer = current;
    }
    Context::new(list, PoolConfig::from_env()).unwrap()
}

fn bench_dispatch_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_overhead");

    for (width, depth) in [(1, 32), (32, 1), (8, 8)] {
        let mut context = empty_graph(width, depth);
        group.bench_function(BenchmarkId::new("empty_systems", format!("{}x{}", width, depth)), |b| {
            b.iter(|| black_box(context.step(|_| ()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_movement_strategies, bench_dispatch_overhead);
criterion_main!(benches);
