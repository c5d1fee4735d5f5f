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
//! Particle fountain example
//!
//! Spawns particles every step, moves them under gravity and retires them
//! when their lifetime runs out. Four systems run per step:
//!
//! - `accelerate` and `age` have no dependencies and start together
//! - `move` waits for `accelerate`
//! - `count` waits for `move` and tallies particles above the ground
//!
//! Run with `RUST_LOG=ecs_scheduler=debug` to see step phases, and set
//! `ECS_SCHEDULER_THREADS` to change the worker count.

use ecs_scheduler::{Context, PoolConfig, SignatureList, Strategy, SystemSignature};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Velocity {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Acceleration {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Life(f32);

const DT: f32 = 1.0 / 60.0;
const SPAWN_PER_STEP: usize = 500;
const STEPS: usize = 300;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("ECS Scheduler - Particle Fountain Example");
    println!("=========================================\n");

    let airborne = Arc::new(AtomicUsize::new(0));

    let mut list = SignatureList::new();
    let pos = list.component::<Position>("position");
    let vel = list.component::<Velocity>("velocity");
    let acc = list.component::<Acceleration>("acceleration");
    let life = list.component::<Life>("life");

    let accelerate = list.system(
        SystemSignature::new("accelerate")
            .read(acc)
            .mutate(vel)
            .strategy(Strategy::split_every_n(1024)),
        move |data| {
            data.for_entities(|data, e| {
                let a = *data.get::<Acceleration>(acc, e)?;
                let mut v = data.get_mut::<Velocity>(vel, e)?;
                v.x += a.x * DT;
                v.y += a.y * DT;
                Ok(())
            })
        },
    );
    let movement = list.system(
        SystemSignature::new("move")
            .depends_on(accelerate)
            .read(vel)
            .mutate(pos)
            .strategy(Strategy::SplitEvenlyPerWorker),
        move |data| {
            data.for_entities(|data, e| {
                let v = *data.get::<Velocity>(vel, e)?;
                let mut p = data.get_mut::<Position>(pos, e)?;
                p.x += v.x * DT;
                p.y += v.y * DT;
                Ok(())
            })
        },
    );
    list.system(
        SystemSignature::new("age")
            .mutate(life)
            .strategy(Strategy::serial_below(2048, Strategy::split_evenly(4))),
        move |data| {
            data.for_entities(|data, e| {
                let mut remaining = data.get_mut::<Life>(life, e)?;
                remaining.0 -= DT;
                if remaining.0 <= 0.0 {
                    data.kill_entity(e);
                }
                Ok(())
            })
        },
    );
    let tally = Arc::clone(&airborne);
    list.system(
        SystemSignature::new("count")
            .depends_on(movement)
            .read(pos)
            .strategy(Strategy::split_every_n(2048)),
        move |data| {
            let mut above = 0;
            data.for_entities(|data, e| {
                if data.get::<Position>(pos, e)?.y > 0.0 {
                    above += 1;
                }
                Ok(())
            })?;
            tally.fetch_add(above, Ordering::Relaxed);
            Ok(())
        },
    );

    let mut context = match Context::new(list, PoolConfig::from_env()) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("Failed to build context: {}", err);
            std::process::exit(1);
        }
    };
    println!(
        "Running {} steps on {} worker thread(s)",
        STEPS,
        context.scheduler().pool().thread_count()
    );
    println!("Topological order:");
    for id in context.scheduler().task_group().topological_order() {
        let signature = &context.world().signatures().systems()[id.index()];
        println!("  {} {} ({:?})", id, signature.name(), signature.parallelism());
    }
    println!();

    let start = Instant::now();
    for step in 0..STEPS {
        airborne.store(0, Ordering::Relaxed);
        let result = context.step(|proxy| {
            for i in 0..SPAWN_PER_STEP {
                let angle = (i as f32 / SPAWN_PER_STEP as f32) * std::f32::consts::PI;
                let e = proxy.create_entity();
                let spawned = proxy
                    .add_component(pos, e, Position { x: 0.0, y: 0.0 })
                    .and_then(|()| {
                        proxy.add_component(
                            vel,
                            e,
                            Velocity {
                                x: angle.cos() * 4.0,
                                y: angle.sin() * 12.0,
                            },
                        )
                    })
                    .and_then(|()| proxy.add_component(acc, e, Acceleration { x: 0.0, y: -9.81 }))
                    .and_then(|()| proxy.add_component(life, e, Life(1.0 + (i % 60) as f32 * DT)));
                if let Err(err) = spawned {
                    eprintln!("Failed to spawn particle: {}", err);
                }
            }
        });
        if let Err(err) = result {
            eprintln!("Step {} failed: {}", step, err);
            std::process::exit(1);
        }

        if step % 50 == 0 {
            println!(
                "  step {:>3}: {:>6} particles, {:>6} airborne",
                step,
                context.world().entity_count(),
                airborne.load(Ordering::Relaxed)
            );
        }
    }
    let elapsed = start.elapsed();

    let stats = context.pool_stats();
    println!("\nFinished {} steps in {:.2?}", context.step_count(), elapsed);
    println!("  average step: {:.2?}", elapsed / STEPS as u32);
    println!("  live particles: {}", context.world().entity_count());
    println!(
        "  pool: {} batches, {} units ({:.1} units/batch)",
        stats.batches,
        stats.units,
        stats.units_per_batch()
    );
}
