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
//! Entity Component System (ECS) core implementation
//!
//! This module provides the storage the scheduler runs over:
//! - Generational entity handles
//! - Per-component columns with cell-level locking
//! - System bodies and their per-slice view of the world
//! - The dependency-driven step executor

mod component;
mod entity;
mod scheduler;
mod system;
mod world;

pub use component::{CellError, Component, ComponentColumn, ComponentMut, ComponentRef, ErasedColumn};
pub use entity::{Entity, EntityId};
pub use scheduler::{Scheduler, StepPhase};
pub use system::{SliceData, System};
pub use world::World;
