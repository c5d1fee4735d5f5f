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
//! # ECS Scheduler
//!
//! A dependency-aware parallel scheduler for entity-component simulations.
//!
//! ## Features
//!
//! - **Static configuration**: components and systems are declared once in a
//!   [`SignatureList`], validated for cycles and unordered access conflicts
//!   before the first step
//! - **Fine-grained dispatch**: every system starts as soon as its own
//!   dependencies are done, driven by per-system atomic counters
//! - **Inner parallelism**: each system splits its entities into slices by a
//!   [`Strategy`] and runs them concurrently on the worker pool
//! - **Deferred structure changes**: entities created, changed or killed
//!   during a step reach systems at the next step edge
//!
//! ## Example
//!
//! ```rust
//! use ecs_scheduler::{Context, PoolConfig, SignatureList, Strategy, SystemSignature};
//!
//! #[derive(Debug, Clone, Copy)]
//! struct Position(f64);
//! #[derive(Debug, Clone, Copy)]
//! struct Velocity(f64);
//!
//! let mut list = SignatureList::new();
//! let pos = list.component::<Position>("position");
//! let vel = list.component::<Velocity>("velocity");
//! list.system(
//!     SystemSignature::new("movement")
//!         .read(vel)
//!         .mutate(pos)
//!         .strategy(Strategy::split_evenly(4)),
//!     move |data| {
//!         data.for_entities(|data, e| {
//!             let v = data.get::<Velocity>(vel, e)?.0;
//!             data.get_mut::<Position>(pos, e)?.0 += v;
//!             Ok(())
//!         })
//!     },
//! );
//!
//! let mut context = Context::new(list, PoolConfig::new(2)).unwrap();
//! let e = context
//!     .step(|proxy| {
//!         let e = proxy.create_entity();
//!         proxy.add_component(pos, e, Position(0.0)).unwrap();
//!         proxy.add_component(vel, e, Velocity(1.5)).unwrap();
//!         e
//!     })
//!     .unwrap();
//! context.step(|_| ()).unwrap();
//! assert_eq!(context.world().get::<Position>(pos, e).unwrap().0, 1.5);
//! ```

#![warn(missing_docs)]

/// Entity Component System storage and the step executor
pub mod ecs;

/// Step entry point
pub mod context;

/// Error types
pub mod error;

/// Task groups built from system dependencies
pub mod graph;

/// Worker pool adapter
pub mod pool;

/// Component and system declarations
pub mod signature;

/// Inner parallelism strategies
pub mod strategy;

/// Atomic counters and the step blocker
pub mod sync;

pub use context::{Context, StepProxy};
pub use ecs::{Entity, Scheduler, SliceData, StepPhase, System, World};
pub use error::{BuildError, ConfigError, StepError, SystemError, WorldError};
pub use pool::{PoolConfig, WorkerPool};
pub use signature::{AccessMode, ComponentId, SignatureList, SystemId, SystemSignature};
pub use strategy::{Slice, Strategy};
