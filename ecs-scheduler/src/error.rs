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
//! Error types
//!
//! Errors fall into three groups:
//! - [`ConfigError`]: the signature list cannot be turned into a task group.
//!   Raised once, before any step runs.
//! - [`SystemError`] / [`StepError`]: a system body failed during a step. The
//!   step is aborted and the first failure is reported to the caller.
//! - [`WorldError`]: misuse of the entity/component storage between steps.
//!
//! Synchronization invariant violations (a task running before its
//! predecessors, a task arriving twice) are not represented here. They are
//! internal consistency failures and panic.

use crate::ecs::Entity;
use crate::signature::{AccessMode, ComponentId, SystemId};
use thiserror::Error;

/// Configuration error detected while building the task group
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A system depends on a system id that was never declared
    #[error("system '{system}' depends on unknown system {dependency}")]
    UnknownDependency {
        /// Name of the declaring system
        system: String,
        /// The missing dependency
        dependency: SystemId,
    },

    /// A system accesses a component id that was never declared
    #[error("system '{system}' accesses unknown component {component}")]
    UnknownComponent {
        /// Name of the declaring system
        system: String,
        /// The missing component
        component: ComponentId,
    },

    /// A system both reads and mutates the same component
    #[error("system '{system}' both reads and mutates component {component}")]
    ReadAndMutate {
        /// Name of the declaring system
        system: String,
        /// The doubly declared component
        component: ComponentId,
    },

    /// The dependency graph contains at least one cycle
    #[error("dependency cycle between systems: {}", .systems.join(", "))]
    Cycle {
        /// Names of every system that could not be ordered
        systems: Vec<String>,
    },

    /// Two systems with no ordering path between them conflict on a component
    #[error(
        "systems '{first}' and '{second}' may run concurrently but both access component {component} and at least one mutates it"
    )]
    AccessConflict {
        /// Name of the first system
        first: String,
        /// Name of the second system
        second: String,
        /// The contended component
        component: ComponentId,
    },

    /// A parallelism strategy was configured with a zero-sized parameter
    #[error("system '{system}' has an invalid parallelism strategy: {reason}")]
    InvalidStrategy {
        /// Name of the declaring system
        system: String,
        /// What is wrong with the strategy
        reason: &'static str,
    },
}

/// Error returned while constructing a [`Context`](crate::Context)
#[derive(Debug, Error)]
pub enum BuildError {
    /// The signature list is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker pool could not be started
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure raised by a system body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SystemError {
    /// The system touched a component in a mode its signature does not declare
    #[error("component {component} is not declared for {mode} access")]
    UndeclaredAccess {
        /// The accessed component
        component: ComponentId,
        /// The attempted access mode
        mode: AccessMode,
    },

    /// The entity does not hold the requested component
    #[error("{entity} has no component {component}")]
    MissingComponent {
        /// The entity being processed
        entity: Entity,
        /// The requested component
        component: ComponentId,
    },

    /// The value is already borrowed by this slice in a conflicting mode
    #[error("component {component} of {entity} is already borrowed")]
    AlreadyBorrowed {
        /// The entity being processed
        entity: Entity,
        /// The requested component
        component: ComponentId,
    },

    /// The component was requested with a Rust type other than its declared one
    #[error("component {component} is not of type {requested}")]
    TypeMismatch {
        /// The requested component
        component: ComponentId,
        /// The Rust type that was requested
        requested: &'static str,
    },

    /// Application-defined failure
    #[error("{0}")]
    Custom(String),
}

impl SystemError {
    /// Create an application-defined failure
    pub fn custom(message: impl Into<String>) -> Self {
        SystemError::Custom(message.into())
    }
}

/// Failure of a whole step
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    /// A system body returned an error
    #[error("system '{name}' ({system}) failed: {source}")]
    SystemFailed {
        /// Id of the failing system
        system: SystemId,
        /// Name of the failing system
        name: String,
        /// The reported failure
        source: SystemError,
    },

    /// A system body panicked
    #[error("system '{name}' ({system}) panicked: {message}")]
    SystemPanicked {
        /// Id of the failing system
        system: SystemId,
        /// Name of the failing system
        name: String,
        /// Panic payload, when it was a string
        message: String,
    },
}

impl StepError {
    /// Id of the system that aborted the step
    pub fn system(&self) -> SystemId {
        match self {
            StepError::SystemFailed { system, .. } | StepError::SystemPanicked { system, .. } => {
                *system
            }
        }
    }
}

/// Misuse of the entity/component storage
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorldError {
    /// The entity handle is stale or was never created
    #[error("{0} is not alive")]
    DeadEntity(Entity),

    /// The component id was never declared
    #[error("unknown component {0}")]
    UnknownComponent(ComponentId),

    /// The component was accessed with a Rust type other than its declared one
    #[error("component {component} is not of type {requested}")]
    TypeMismatch {
        /// The accessed component
        component: ComponentId,
        /// The Rust type that was requested
        requested: &'static str,
    },

    /// The entity does not hold the requested component
    #[error("{entity} has no component {component}")]
    MissingComponent {
        /// The accessed entity
        entity: Entity,
        /// The requested component
        component: ComponentId,
    },
}
