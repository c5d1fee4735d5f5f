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
//! Simulation context
//!
//! The [`Context`] ties the world, the worker pool and the scheduler together
//! and is the only way to advance the simulation. A step is:
//!
//! 1. the caller's body, with exclusive access to the world through a
//!    [`StepProxy`];
//! 2. one wave of every system;
//! 3. deferred component removals and kills;
//! 4. a subscription refresh.
//!
//! Entities and components added in the body are visible to the body
//! immediately but reach systems only on the following step.

use crate::ecs::{Component, ComponentRef, Entity, Scheduler, World};
use crate::error::{BuildError, StepError, WorldError};
use crate::pool::{PoolConfig, PoolStats, WorkerPool};
use crate::signature::{ComponentId, SignatureList, SystemId};
use std::sync::Arc;
use tracing::{debug, info};

/// Owner of the world and the scheduler
#[derive(Debug)]
pub struct Context {
    world: World,
    scheduler: Scheduler,
    edited: bool,
}

impl Context {
    /// Validate the signatures, start the worker pool and create an empty
    /// world
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Config`] if the signatures are rejected and
    /// [`BuildError::Pool`] if the worker threads cannot be started.
    pub fn new(signatures: SignatureList, config: PoolConfig) -> Result<Self, BuildError> {
        let signatures = Arc::new(signatures);
        let pool = WorkerPool::with_config(config)?;
        let scheduler = Scheduler::new(Arc::clone(&signatures), pool)?;
        let world = World::new(signatures);
        info!(
            components = world.signatures().component_count(),
            systems = world.signatures().system_count(),
            threads = scheduler.pool().thread_count(),
            "context ready"
        );
        Ok(Context {
            world,
            scheduler,
            edited: false,
        })
    }

    /// Run one step
    ///
    /// `body` runs first on the calling thread. Component removals and kills
    /// requested by the body, and kills requested by systems, are applied
    /// after the wave, followed by a refresh. This happens even when the wave
    /// fails.
    ///
    /// Changes made through [`Context::world_mut`] since the last step are
    /// folded into the subscriptions before the body runs.
    ///
    /// Must not be called from inside a system.
    ///
    /// # Errors
    ///
    /// Returns the first [`StepError`] raised by a system. The body's value
    /// is dropped in that case.
    pub fn step<R>(&mut self, body: impl FnOnce(&mut StepProxy<'_>) -> R) -> Result<R, StepError> {
        if self.edited {
            self.world.refresh();
            self.edited = false;
        }
        let mut proxy = StepProxy {
            world: &mut self.world,
            removed: Vec::new(),
            doomed: Vec::new(),
        };
        let value = body(&mut proxy);
        let StepProxy {
            removed, mut doomed, ..
        } = proxy;

        let result = self.scheduler.execute(&self.world, &mut doomed);

        for (component, entity) in removed {
            // Validated when queued and kills have not been applied yet.
            let _ = self.world.remove_component(component, entity);
        }
        let killed = doomed
            .into_iter()
            .filter(|&entity| self.world.destroy_entity(entity))
            .count();
        self.world.refresh();
        debug!(killed, entities = self.world.entity_count(), "step edge applied");

        result.map(|()| value)
    }

    /// The world, as of the last step edge
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access between steps
    ///
    /// Subscriptions are refreshed at the start of the next step, so systems
    /// never see entities destroyed or components removed here.
    pub fn world_mut(&mut self) -> &mut World {
        self.edited = true;
        &mut self.world
    }

    /// The scheduler running the systems
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether an entity is alive
    pub fn alive(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    /// Whether an entity was subscribed to a system at the last step edge
    pub fn is_in_system(&self, system: SystemId, entity: Entity) -> bool {
        self.world.is_in_system(system, entity)
    }

    /// Number of steps started
    pub fn step_count(&self) -> usize {
        self.scheduler.step_count()
    }

    /// Worker pool usage counters
    pub fn pool_stats(&self) -> PoolStats {
        self.scheduler.pool().stats()
    }
}

/// Exclusive access to the world before a step's wave
pub struct StepProxy<'w> {
    world: &'w mut World,
    removed: Vec<(ComponentId, Entity)>,
    doomed: Vec<Entity>,
}

impl StepProxy<'_> {
    /// Create an entity; systems see it from the next step
    pub fn create_entity(&mut self) -> Entity {
        self.world.create_entity()
    }

    /// Attach a component; subscriptions follow at the step edge
    pub fn add_component<T: Component>(
        &mut self,
        component: ComponentId,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        self.world.add_component(component, entity, value)
    }

    /// Queue a component for removal once this step's wave is over
    ///
    /// Systems still see the component during this step. Returns whether
    /// the entity currently holds it.
    pub fn remove_component(&mut self, component: ComponentId, entity: Entity) -> Result<bool, WorldError> {
        if !self.world.is_alive(entity) {
            return Err(WorldError::DeadEntity(entity));
        }
        if component.index() >= self.world.signatures().component_count() {
            return Err(WorldError::UnknownComponent(component));
        }
        let held = self.world.has_component(component, entity);
        if held {
            self.removed.push((component, entity));
        }
        Ok(held)
    }

    /// Queue an entity for destruction once this step's wave is over
    pub fn kill_entity(&mut self, entity: Entity) {
        self.doomed.push(entity);
    }

    /// Whether an entity is alive
    pub fn alive(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    /// Whether an entity was subscribed to a system at the last step edge
    pub fn is_in_system(&self, system: SystemId, entity: Entity) -> bool {
        self.world.is_in_system(system, entity)
    }

    /// Shared borrow of a component value
    pub fn get<T: Component>(&self, component: ComponentId, entity: Entity) -> Result<ComponentRef<'_, T>, WorldError> {
        self.world.get(component, entity)
    }

    /// Exclusive borrow of a component value
    pub fn get_mut<T: Component>(&mut self, component: ComponentId, entity: Entity) -> Result<&mut T, WorldError> {
        self.world.get_mut(component, entity)
    }

    /// Read-only view of the world
    pub fn world(&self) -> &World {
        self.world
    }
}

impl std::fmt::Debug for StepProxy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepProxy")
            .field("world", &self.world)
            .field("removed", &self.removed.len())
            .field("doomed", &self.doomed.len())
            .finish()
    }
}
