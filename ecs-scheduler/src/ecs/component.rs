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
//! Component storage
//!
//! Each declared component gets one column: a dense vector indexed by entity
//! slot, where every occupied cell sits behind its own `RwLock`. Systems that
//! run concurrently therefore only ever contend on the same cell when the
//! signatures allow it (shared reads), and slices of one system never
//! contend at all because they cover disjoint entities.

use std::any::Any;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

/// Marker for types that can be stored as components
///
/// Implemented for every `Send + Sync + 'static` type.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Shared borrow of a component value
pub type ComponentRef<'a, T> = RwLockReadGuard<'a, T>;

/// Exclusive borrow of a component value
pub type ComponentMut<'a, T> = RwLockWriteGuard<'a, T>;

/// Why a non-blocking borrow of a cell failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellError {
    /// The slot holds no value
    Vacant,
    /// The value is already borrowed in a conflicting mode
    Borrowed,
}

/// Type-erased view of a [`ComponentColumn`]
pub trait ErasedColumn: Send + Sync {
    /// Whether the slot holds a value
    fn contains(&self, slot: usize) -> bool;

    /// Drop the value in a slot, if any
    fn remove(&mut self, slot: usize) -> bool;

    /// Number of occupied slots
    fn len(&self) -> usize;

    /// Whether no slot is occupied
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every value
    fn clear(&mut self);

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage for one component type, indexed by entity slot
#[derive(Debug)]
pub struct ComponentColumn<T: Component> {
    cells: Vec<Option<RwLock<T>>>,
    occupied: usize,
}

impl<T: Component> ComponentColumn<T> {
    /// Create an empty column
    pub fn new() -> Self {
        ComponentColumn {
            cells: Vec::new(),
            occupied: 0,
        }
    }

    pub(crate) fn boxed() -> Box<dyn ErasedColumn> {
        Box::new(Self::new())
    }

    /// Store a value, replacing any previous one
    pub fn insert(&mut self, slot: usize, value: T) {
        if slot >= self.cells.len() {
            self.cells.resize_with(slot + 1, || None);
        }
        if self.cells[slot].is_none() {
            self.occupied += 1;
        }
        self.cells[slot] = Some(RwLock::new(value));
    }

    /// Shared borrow of a slot's value
    ///
    /// Blocks while another thread holds an exclusive borrow of the same slot.
    pub fn read(&self, slot: usize) -> Option<ComponentRef<'_, T>> {
        self.cells
            .get(slot)?
            .as_ref()
            .map(|cell| cell.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Exclusive borrow of a slot's value through a shared column
    pub fn write(&self, slot: usize) -> Option<ComponentMut<'_, T>> {
        self.cells
            .get(slot)?
            .as_ref()
            .map(|cell| cell.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Shared borrow of a slot's value that fails instead of blocking
    pub fn try_read(&self, slot: usize) -> Result<ComponentRef<'_, T>, CellError> {
        let cell = self.cell(slot)?;
        match cell.try_read() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(CellError::Borrowed),
        }
    }

    /// Exclusive borrow of a slot's value that fails instead of blocking
    pub fn try_write(&self, slot: usize) -> Result<ComponentMut<'_, T>, CellError> {
        let cell = self.cell(slot)?;
        match cell.try_write() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(CellError::Borrowed),
        }
    }

    fn cell(&self, slot: usize) -> Result<&RwLock<T>, CellError> {
        self.cells
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(CellError::Vacant)
    }

    /// Exclusive borrow of a slot's value without locking
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.cells
            .get_mut(slot)?
            .as_mut()
            .map(|cell| cell.get_mut().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<T: Component> Default for ComponentColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ErasedColumn for ComponentColumn<T> {
    fn contains(&self, slot: usize) -> bool {
        matches!(self.cells.get(slot), Some(Some(_)))
    }

    fn remove(&mut self, slot: usize) -> bool {
        match self.cells.get_mut(slot).and_then(Option::take) {
            Some(_) => {
                self.occupied -= 1;
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.occupied
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.occupied = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
