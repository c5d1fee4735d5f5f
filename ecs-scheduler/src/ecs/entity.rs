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
//! Entity handles
//!
//! An entity is a slot index plus a generation. Slots are recycled after an
//! entity is destroyed; the generation is bumped at the same time so stale
//! handles to the old occupant stop resolving.

use std::fmt;

/// Slot index of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u32);

impl EntityId {
    /// Create an id from a raw slot index
    pub fn new(id: u32) -> Self {
        EntityId(id)
    }

    /// Raw slot index
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Slot index usable for indexing storage
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generational entity handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    id: EntityId,
    generation: u32,
}

impl Entity {
    /// Create a handle from a slot index and generation
    pub fn new(id: u32, generation: u32) -> Self {
        Entity {
            id: EntityId::new(id),
            generation,
        }
    }

    /// Slot of this entity
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Slot index usable for indexing storage
    pub fn index(&self) -> usize {
        self.id.index()
    }

    /// Generation of the slot when this handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.id.0, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_parts() {
        let entity = Entity::new(42, 1);
        assert_eq!(entity.id().raw(), 42);
        assert_eq!(entity.index(), 42);
        assert_eq!(entity.generation(), 1);
        assert_eq!(entity.to_string(), "Entity(42v1)");
    }

    #[test]
    fn test_generation_distinguishes_handles() {
        assert_eq!(Entity::new(1, 0), Entity::new(1, 0));
        assert_ne!(Entity::new(1, 0), Entity::new(1, 1));
    }
}
