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
//! System bodies and the data they see
//!
//! A system body is called once per slice per step with a [`SliceData`]:
//! the slice's entities plus typed component access restricted to what the
//! system's signature declares. Slices of the same system may run on
//! different threads at the same time.

use crate::ecs::component::{CellError, ComponentMut, ComponentRef};
use crate::ecs::{Component, Entity, World};
use crate::error::{SystemError, WorldError};
use crate::signature::{AccessMode, ComponentId, SystemId, SystemSignature};
use crate::strategy::Slice;
use std::ops::Range;
use std::sync::{Mutex, PoisonError};

/// Per-slice logic of a system
///
/// Implemented for any `Fn(&SliceData<'_>) -> Result<(), SystemError>`
/// closure that is `Send + Sync`. State shared between slices needs
/// interior mutability.
pub trait System: Send + Sync {
    /// Process one slice of the subscribed entities
    fn run(&self, data: &SliceData<'_>) -> Result<(), SystemError>;
}

impl<F> System for F
where
    F: Fn(&SliceData<'_>) -> Result<(), SystemError> + Send + Sync,
{
    fn run(&self, data: &SliceData<'_>) -> Result<(), SystemError> {
        self(data)
    }
}

/// Component access bound to one slice of one system
pub struct SliceData<'a> {
    world: &'a World,
    signature: &'a SystemSignature,
    slice: Slice,
    entities: &'a [Entity],
    doomed: &'a Mutex<Vec<Entity>>,
}

impl<'a> SliceData<'a> {
    pub(crate) fn new(
        world: &'a World,
        signature: &'a SystemSignature,
        slice: Slice,
        doomed: &'a Mutex<Vec<Entity>>,
    ) -> Self {
        let entities = &world.subscribed(slice.system)[slice.range.clone()];
        SliceData {
            world,
            signature,
            slice,
            entities,
            doomed,
        }
    }

    /// System being run
    pub fn system(&self) -> SystemId {
        self.slice.system
    }

    /// Name of the system being run
    pub fn system_name(&self) -> &'a str {
        self.signature.name()
    }

    /// Position of this slice within the system's partition
    pub fn slice_index(&self) -> usize {
        self.slice.index
    }

    /// Range of subscription indices covered by this slice
    pub fn range(&self) -> Range<usize> {
        self.slice.range.clone()
    }

    /// Entities covered by this slice
    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    /// Total number of entities subscribed to the system this step
    pub fn subscribed_count(&self) -> usize {
        self.world.subscribed_count(self.slice.system)
    }

    /// Call `f` for every entity of the slice, stopping at the first error
    pub fn for_entities<F>(&self, mut f: F) -> Result<(), SystemError>
    where
        F: FnMut(&Self, Entity) -> Result<(), SystemError>,
    {
        for &entity in self.entities {
            f(self, entity)?;
        }
        Ok(())
    }

    /// Shared borrow of a component the system reads or mutates
    ///
    /// Fails with [`SystemError::AlreadyBorrowed`] while the same slice
    /// still holds a [`SliceData::get_mut`] guard on the value.
    pub fn get<T: Component>(&self, component: ComponentId, entity: Entity) -> Result<ComponentRef<'a, T>, SystemError> {
        self.check(component, AccessMode::Read)?;
        let column = self
            .world
            .column::<T>(component)
            .map_err(|e| into_system_error(e, entity))?;
        if !self.world.is_alive(entity) {
            return Err(SystemError::MissingComponent { entity, component });
        }
        column
            .try_read(entity.index())
            .map_err(|e| cell_error(e, entity, component))
    }

    /// Exclusive borrow of a component the system mutates
    ///
    /// Fails with [`SystemError::AlreadyBorrowed`] while any other guard on
    /// the value is alive, including one from [`SliceData::get`].
    pub fn get_mut<T: Component>(&self, component: ComponentId, entity: Entity) -> Result<ComponentMut<'a, T>, SystemError> {
        self.check(component, AccessMode::Mutate)?;
        let column = self
            .world
            .column::<T>(component)
            .map_err(|e| into_system_error(e, entity))?;
        if !self.world.is_alive(entity) {
            return Err(SystemError::MissingComponent { entity, component });
        }
        column
            .try_write(entity.index())
            .map_err(|e| cell_error(e, entity, component))
    }

    /// Queue an entity for destruction at the end of the step
    pub fn kill_entity(&self, entity: Entity) {
        self.doomed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entity);
    }

    fn check(&self, component: ComponentId, mode: AccessMode) -> Result<(), SystemError> {
        match (self.signature.access().mode_of(component), mode) {
            (Some(AccessMode::Mutate), _) | (Some(AccessMode::Read), AccessMode::Read) => Ok(()),
            _ => Err(SystemError::UndeclaredAccess { component, mode }),
        }
    }
}

fn cell_error(error: CellError, entity: Entity, component: ComponentId) -> SystemError {
    match error {
        CellError::Vacant => SystemError::MissingComponent { entity, component },
        CellError::Borrowed => SystemError::AlreadyBorrowed { entity, component },
    }
}

fn into_system_error(error: WorldError, entity: Entity) -> SystemError {
    match error {
        WorldError::TypeMismatch { component, requested } => SystemError::TypeMismatch { component, requested },
        WorldError::UnknownComponent(component) | WorldError::MissingComponent { component, .. } => {
            SystemError::MissingComponent { entity, component }
        }
        WorldError::DeadEntity(dead) => SystemError::custom(format!("{} is not alive", dead)),
    }
}

impl std::fmt::Debug for SliceData<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceData")
            .field("system", &self.signature.name())
            .field("slice", &self.slice)
            .finish()
    }
}
