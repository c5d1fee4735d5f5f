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
//! Component and system signatures
//!
//! A [`SignatureList`] is the static description of a simulation: which
//! components exist, which systems exist, what each system reads and
//! mutates, which systems it must wait for and how its entities are split
//! across worker threads. It is built once at startup, validated when the
//! task group is constructed and then shared read-only by the scheduler and
//! the world.

use crate::ecs::{Component, ComponentColumn, ErasedColumn, SliceData, System};
use crate::error::SystemError;
use crate::strategy::Strategy;
use std::any::TypeId;
use std::collections::BTreeSet;
use std::fmt;

/// Index of a component within its [`SignatureList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(usize);

impl ComponentId {
    /// Create a component id from its declaration index
    pub const fn new(index: usize) -> Self {
        ComponentId(index)
    }

    /// Declaration index of this component
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.0)
    }
}

/// Index of a system within its [`SignatureList`]
///
/// Ids are plain indices so dependencies can name systems that are declared
/// later in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(usize);

impl SystemId {
    /// Create a system id from its declaration index
    pub const fn new(index: usize) -> Self {
        SystemId(index)
    }

    /// Declaration index of this system
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System({})", self.0)
    }
}

/// How a system uses a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Shared, read-only access
    Read,
    /// Exclusive, mutable access
    Mutate,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => f.write_str("read"),
            AccessMode::Mutate => f.write_str("mutate"),
        }
    }
}

/// Components a system reads and mutates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentAccess {
    reads: BTreeSet<ComponentId>,
    mutates: BTreeSet<ComponentId>,
}

impl ComponentAccess {
    /// Empty access set
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare shared access to a component
    pub fn read(mut self, component: ComponentId) -> Self {
        self.reads.insert(component);
        self
    }

    /// Declare exclusive access to a component
    pub fn mutate(mut self, component: ComponentId) -> Self {
        self.mutates.insert(component);
        self
    }

    /// Components declared as read
    pub fn reads(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.reads.iter().copied()
    }

    /// Components declared as mutated
    pub fn mutates(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.mutates.iter().copied()
    }

    /// Every component this access set touches, in id order
    pub fn all(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.reads.union(&self.mutates).copied()
    }

    /// Strongest declared mode for a component, if any
    pub fn mode_of(&self, component: ComponentId) -> Option<AccessMode> {
        if self.mutates.contains(&component) {
            Some(AccessMode::Mutate)
        } else if self.reads.contains(&component) {
            Some(AccessMode::Read)
        } else {
            None
        }
    }

    /// Whether a component appears in both the read and mutate set
    pub fn overlap(&self) -> Option<ComponentId> {
        self.reads.intersection(&self.mutates).next().copied()
    }

    /// First component on which two access sets cannot run concurrently
    ///
    /// Two readers never conflict. A mutation conflicts with any other
    /// access to the same component.
    pub fn conflicts_with(&self, other: &ComponentAccess) -> Option<ComponentId> {
        self.mutates
            .iter()
            .find(|c| other.reads.contains(c) || other.mutates.contains(c))
            .or_else(|| self.reads.iter().find(|c| other.mutates.contains(c)))
            .copied()
    }
}

/// Static description of one system
#[derive(Debug, Clone)]
pub struct SystemSignature {
    name: String,
    dependencies: Vec<SystemId>,
    access: ComponentAccess,
    strategy: Strategy,
}

impl SystemSignature {
    /// A serial system with no dependencies and no component access
    pub fn new(name: impl Into<String>) -> Self {
        SystemSignature {
            name: name.into(),
            dependencies: Vec::new(),
            access: ComponentAccess::new(),
            strategy: Strategy::Serial,
        }
    }

    /// Require `system` to finish before this one starts
    ///
    /// Repeated dependencies are ignored.
    pub fn depends_on(mut self, system: SystemId) -> Self {
        if !self.dependencies.contains(&system) {
            self.dependencies.push(system);
        }
        self
    }

    /// Declare shared access to a component
    pub fn read(mut self, component: ComponentId) -> Self {
        self.access = self.access.read(component);
        self
    }

    /// Declare exclusive access to a component
    pub fn mutate(mut self, component: ComponentId) -> Self {
        self.access = self.access.mutate(component);
        self
    }

    /// Choose how the subscribed entities are split across workers
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// System name, used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared predecessors, in declaration order
    pub fn dependencies(&self) -> &[SystemId] {
        &self.dependencies
    }

    /// Declared component access
    pub fn access(&self) -> &ComponentAccess {
        &self.access
    }

    /// Configured parallelism strategy
    pub fn parallelism(&self) -> &Strategy {
        &self.strategy
    }
}

/// Static description of one component type
pub struct ComponentSignature {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    make_column: fn() -> Box<dyn ErasedColumn>,
}

impl ComponentSignature {
    fn of<T: Component>(name: String) -> Self {
        ComponentSignature {
            name,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            make_column: ComponentColumn::<T>::boxed,
        }
    }

    /// Component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type stored by this component
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name stored by this component
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn make_column(&self) -> Box<dyn ErasedColumn> {
        (self.make_column)()
    }
}

impl fmt::Debug for ComponentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSignature")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// The full static configuration of a simulation
///
/// # Examples
///
/// ```
/// use ecs_scheduler::{SignatureList, SliceData, Strategy, SystemSignature};
///
/// #[derive(Debug, Clone, Copy)]
/// struct Velocity(f32);
/// #[derive(Debug, Clone, Copy)]
/// struct Position(f32);
///
/// let mut list = SignatureList::new();
/// let pos = list.component::<Position>("position");
/// let vel = list.component::<Velocity>("velocity");
///
/// list.system(
///     SystemSignature::new("movement")
///         .read(vel)
///         .mutate(pos)
///         .strategy(Strategy::split_every_n(256)),
///     move |data: &SliceData<'_>| {
///         data.for_entities(|data, entity| {
///             let v = data.get::<Velocity>(vel, entity)?.0;
///             data.get_mut::<Position>(pos, entity)?.0 += v;
///             Ok(())
///         })
///     },
/// );
/// assert_eq!(list.system_count(), 1);
/// ```
#[derive(Default)]
pub struct SignatureList {
    components: Vec<ComponentSignature>,
    systems: Vec<SystemSignature>,
    bodies: Vec<Box<dyn System>>,
}

impl SignatureList {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a component type and return its id
    pub fn component<T: Component>(&mut self, name: impl Into<String>) -> ComponentId {
        let id = ComponentId::new(self.components.len());
        self.components.push(ComponentSignature::of::<T>(name.into()));
        id
    }

    /// Declare a system whose body is a closure and return its id
    pub fn system<F>(&mut self, signature: SystemSignature, body: F) -> SystemId
    where
        F: Fn(&SliceData<'_>) -> Result<(), SystemError> + Send + Sync + 'static,
    {
        self.system_with(signature, body)
    }

    /// Declare a system with any [`System`] implementation as its body
    pub fn system_with<S: System + 'static>(&mut self, signature: SystemSignature, body: S) -> SystemId {
        let id = SystemId::new(self.systems.len());
        self.systems.push(signature);
        self.bodies.push(Box::new(body));
        id
    }

    /// Number of declared components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of declared systems
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Declared components, indexed by [`ComponentId`]
    pub fn components(&self) -> &[ComponentSignature] {
        &self.components
    }

    /// Declared systems, indexed by [`SystemId`]
    pub fn systems(&self) -> &[SystemSignature] {
        &self.systems
    }

    /// Signature of a component
    pub fn component_signature(&self, id: ComponentId) -> Option<&ComponentSignature> {
        self.components.get(id.index())
    }

    /// Signature of a system
    pub fn system_signature(&self, id: SystemId) -> Option<&SystemSignature> {
        self.systems.get(id.index())
    }

    pub(crate) fn body(&self, id: SystemId) -> &dyn System {
        self.bodies[id.index()].as_ref()
    }
}

impl fmt::Debug for SignatureList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureList")
            .field("components", &self.components)
            .field("systems", &self.systems)
            .finish()
    }
}
