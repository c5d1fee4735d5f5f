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
//! World management
//!
//! The World owns entity slots, one column per declared component and the
//! per-system subscription lists the scheduler iterates over. An entity is
//! subscribed to a system when it holds every component the system reads or
//! mutates.
//!
//! Subscription lists only change in [`World::refresh`]. Entities created or
//! given components in the middle of a step become visible to systems at the
//! next step edge, never while systems are running.

use crate::ecs::component::{ComponentColumn, ComponentRef, ErasedColumn};
use crate::ecs::{Component, Entity};
use crate::error::WorldError;
use crate::signature::{ComponentId, SignatureList, SystemId};
use std::sync::Arc;

/// The entity and component container
pub struct World {
    signatures: Arc<SignatureList>,
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_slots: Vec<u32>,
    alive_count: usize,
    columns: Vec<Box<dyn ErasedColumn>>,
    subscriptions: Vec<Vec<Entity>>,
}

impl World {
    /// Create an empty world for the given signatures
    pub fn new(signatures: Arc<SignatureList>) -> Self {
        let columns = signatures
            .components()
            .iter()
            .map(|component| component.make_column())
            .collect();
        let subscriptions = vec![Vec::new(); signatures.system_count()];
        World {
            signatures,
            generations: Vec::new(),
            alive: Vec::new(),
            free_slots: Vec::new(),
            alive_count: 0,
            columns,
            subscriptions,
        }
    }

    /// Signatures this world was built for
    pub fn signatures(&self) -> &Arc<SignatureList> {
        &self.signatures
    }

    /// Create a new entity, reusing a free slot when one is available
    pub fn create_entity(&mut self) -> Entity {
        let slot = match self.free_slots.pop() {
            Some(slot) => slot,
            None => {
                let slot = self.generations.len() as u32;
                self.generations.push(0);
                self.alive.push(false);
                slot
            }
        };
        self.alive[slot as usize] = true;
        self.alive_count += 1;
        Entity::new(slot, self.generations[slot as usize])
    }

    /// Destroy an entity and drop all of its components
    ///
    /// The slot's generation is bumped so older handles stop resolving.
    /// Returns `false` if the entity was not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.index();
        for column in &mut self.columns {
            column.remove(slot);
        }
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free_slots.push(entity.id().raw());
        self.alive_count -= 1;
        true
    }

    /// Whether the handle refers to a live entity
    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.index();
        slot < self.alive.len() && self.alive[slot] && self.generations[slot] == entity.generation()
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.alive_count
    }

    /// Iterate over live entities in slot order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, &alive)| alive)
            .map(|(slot, _)| Entity::new(slot as u32, self.generations[slot]))
    }

    /// Attach a component value to an entity, replacing any previous value
    pub fn add_component<T: Component>(
        &mut self,
        component: ComponentId,
        entity: Entity,
        value: T,
    ) -> Result<(), WorldError> {
        if !self.is_alive(entity) {
            return Err(WorldError::DeadEntity(entity));
        }
        self.column_mut::<T>(component)?.insert(entity.index(), value);
        Ok(())
    }

    /// Detach a component from an entity
    ///
    /// Returns `Ok(false)` if the entity did not hold the component.
    pub fn remove_component(&mut self, component: ComponentId, entity: Entity) -> Result<bool, WorldError> {
        if !self.is_alive(entity) {
            return Err(WorldError::DeadEntity(entity));
        }
        let column = self
            .columns
            .get_mut(component.index())
            .ok_or(WorldError::UnknownComponent(component))?;
        Ok(column.remove(entity.index()))
    }

    /// Whether a live entity holds a component
    pub fn has_component(&self, component: ComponentId, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .columns
                .get(component.index())
                .map_or(false, |column| column.contains(entity.index()))
    }

    /// Shared borrow of a component value
    pub fn get<T: Component>(
        &self,
        component: ComponentId,
        entity: Entity,
    ) -> Result<ComponentRef<'_, T>, WorldError> {
        if !self.is_alive(entity) {
            return Err(WorldError::DeadEntity(entity));
        }
        self.column::<T>(component)?
            .read(entity.index())
            .ok_or(WorldError::MissingComponent { entity, component })
    }

    /// Exclusive borrow of a component value
    pub fn get_mut<T: Component>(&mut self, component: ComponentId, entity: Entity) -> Result<&mut T, WorldError> {
        if !self.is_alive(entity) {
            return Err(WorldError::DeadEntity(entity));
        }
        self.column_mut::<T>(component)?
            .get_mut(entity.index())
            .ok_or(WorldError::MissingComponent { entity, component })
    }

    /// Number of entities subscribed to a system as of the last refresh
    ///
    /// # Panics
    ///
    /// Panics if `system` was not declared.
    pub fn subscribed_count(&self, system: SystemId) -> usize {
        self.subscriptions[system.index()].len()
    }

    /// Entity at a position of a system's subscription list
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn entity_at(&self, system: SystemId, index: usize) -> Entity {
        self.subscriptions[system.index()][index]
    }

    /// A system's subscription list, in slot order
    pub fn subscribed(&self, system: SystemId) -> &[Entity] {
        &self.subscriptions[system.index()]
    }

    /// Whether an entity was subscribed to a system at the last refresh
    pub fn is_in_system(&self, system: SystemId, entity: Entity) -> bool {
        self.subscriptions
            .get(system.index())
            .map_or(false, |list| {
                list.binary_search_by_key(&entity.index(), Entity::index)
                    .map_or(false, |position| list[position] == entity)
            })
    }

    /// Rebuild every system's subscription list from current component
    /// membership
    pub fn refresh(&mut self) {
        for (index, signature) in self.signatures.systems().iter().enumerate() {
            let required: Vec<usize> = signature.access().all().map(|c| c.index()).collect();
            let list = &mut self.subscriptions[index];
            list.clear();
            for (slot, &alive) in self.alive.iter().enumerate() {
                if alive && required.iter().all(|&c| self.columns[c].contains(slot)) {
                    list.push(Entity::new(slot as u32, self.generations[slot]));
                }
            }
        }
    }

    /// Destroy every entity and empty every subscription
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        for list in &mut self.subscriptions {
            list.clear();
        }
        self.generations.clear();
        self.alive.clear();
        self.free_slots.clear();
        self.alive_count = 0;
    }

    pub(crate) fn column<T: Component>(&self, component: ComponentId) -> Result<&ComponentColumn<T>, WorldError> {
        self.columns
            .get(component.index())
            .ok_or(WorldError::UnknownComponent(component))?
            .as_any()
            .downcast_ref::<ComponentColumn<T>>()
            .ok_or(WorldError::TypeMismatch {
                component,
                requested: std::any::type_name::<T>(),
            })
    }

    fn column_mut<T: Component>(&mut self, component: ComponentId) -> Result<&mut ComponentColumn<T>, WorldError> {
        self.columns
            .get_mut(component.index())
            .ok_or(WorldError::UnknownComponent(component))?
            .as_any_mut()
            .downcast_mut::<ComponentColumn<T>>()
            .ok_or(WorldError::TypeMismatch {
                component,
                requested: std::any::type_name::<T>(),
            })
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.alive_count)
            .field("components", &self.columns.len())
            .field("systems", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SystemSignature;
    use crate::ecs::SliceData;
    use crate::error::SystemError;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(i32);

    fn noop(_: &SliceData<'_>) -> Result<(), SystemError> {
        Ok(())
    }

    fn setup() -> (World, ComponentId, ComponentId, SystemId) {
        let mut list = SignatureList::new();
        let pos = list.component::<Position>("position");
        let vel = list.component::<Velocity>("velocity");
        let movement = list.system(SystemSignature::new("movement").read(vel).mutate(pos), noop);
        (World::new(Arc::new(list)), pos, vel, movement)
    }

    #[test]
    fn test_world_entity_lifecycle() {
        let (mut world, ..) = setup();
        let e1 = world.create_entity();
        let e2 = world.create_entity();
        assert_eq!(world.entity_count(), 2);

        assert!(world.destroy_entity(e1));
        assert!(!world.destroy_entity(e1));
        assert_eq!(world.entity_count(), 1);
        assert!(!world.is_alive(e1));
        assert!(world.is_alive(e2));
        assert_eq!(world.entities().collect::<Vec<_>>(), vec![e2]);
    }

    #[test]
    fn test_slot_recycling_bumps_generation() {
        let (mut world, ..) = setup();
        let e1 = world.create_entity();
        world.destroy_entity(e1);
        let e2 = world.create_entity();
        assert_eq!(e2.id(), e1.id());
        assert_ne!(e2.generation(), e1.generation());
        assert!(!world.is_alive(e1));
    }

    #[test]
    fn test_components_roundtrip() {
        let (mut world, pos, vel, _) = setup();
        let e = world.create_entity();
        world.add_component(pos, e, Position(1)).unwrap();
        assert!(world.has_component(pos, e));
        assert!(!world.has_component(vel, e));

        world.get_mut::<Position>(pos, e).unwrap().0 += 4;
        assert_eq!(*world.get::<Position>(pos, e).unwrap(), Position(5));
        assert_eq!(world.remove_component(pos, e), Ok(true));
        assert!(matches!(
            world.get::<Position>(pos, e),
            Err(WorldError::MissingComponent { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_and_unknown_component() {
        let (mut world, pos, ..) = setup();
        let e = world.create_entity();
        assert!(matches!(
            world.add_component(pos, e, 7u8),
            Err(WorldError::TypeMismatch { .. })
        ));
        assert_eq!(
            world.add_component(ComponentId::new(9), e, Position(0)),
            Err(WorldError::UnknownComponent(ComponentId::new(9)))
        );
    }

    #[test]
    fn test_dead_entity_rejected() {
        let (mut world, pos, ..) = setup();
        let e = world.create_entity();
        world.destroy_entity(e);
        assert_eq!(world.add_component(pos, e, Position(0)), Err(WorldError::DeadEntity(e)));
    }

    #[test]
    fn test_subscriptions_change_only_on_refresh() {
        let (mut world, pos, vel, movement) = setup();
        let moving = world.create_entity();
        world.add_component(pos, moving, Position(0)).unwrap();
        world.add_component(vel, moving, Velocity(1)).unwrap();
        let still = world.create_entity();
        world.add_component(pos, still, Position(0)).unwrap();

        assert_eq!(world.subscribed_count(movement), 0);
        world.refresh();
        assert_eq!(world.subscribed_count(movement), 1);
        assert_eq!(world.entity_at(movement, 0), moving);
        assert!(world.is_in_system(movement, moving));
        assert!(!world.is_in_system(movement, still));

        world.destroy_entity(moving);
        assert!(world.is_in_system(movement, moving));
        world.refresh();
        assert!(!world.is_in_system(movement, moving));
        assert!(world.subscribed(movement).is_empty());
    }

    #[test]
    fn test_clear() {
        let (mut world, pos, _, movement) = setup();
        let e = world.create_entity();
        world.add_component(pos, e, Position(0)).unwrap();
        world.refresh();
        world.clear();
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.subscribed_count(movement), 0);
    }
}
