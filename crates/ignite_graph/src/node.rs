//! Graph nodes.
//!
//! A [`Node`] wraps one registered system together with everything declared
//! about it before the graph is built: dependencies, removals, criticality and
//! start/complete callbacks. It is also the handle returned by
//! [`GraphBuilder::register`](crate::builder::GraphBuilder::register).
//!
//! Nodes carry a one-way lock. Once [`GraphBuilder::build`](crate::builder::GraphBuilder::build)
//! has frozen a node, every mutator fails with [`BuildError::Lifecycle`].
//!
//! # Example
//!
//! ```ignore
//! builder
//!     .register(Database::default())?
//!     .depends_on::<Config>()?
//!     .depends_on_capability::<Telemetry>()?
//!     .set_critical()?
//!     .on_complete(|id| tracing::info!(%id, "database ready"));
//! ```

use core::fmt;
use core::future::Future;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use ignite_system::CancellationToken;
use ignite_system::id::{Capability, SystemId};
use ignite_system::system::{InitError, Initializable};

use crate::error::BuildError;

/// Single-shot observer invoked with the node's identity.
pub type NodeCallback = Box<dyn FnOnce(SystemId) + Send + 'static>;

/// A registered system and its declarations.
pub struct Node {
    id: SystemId,
    system: Arc<dyn Initializable>,
    dependencies: IndexSet<SystemId>,
    removed: IndexSet<SystemId>,
    critical: bool,
    on_start: Vec<NodeCallback>,
    on_complete: Vec<NodeCallback>,
    frozen: bool,
}

impl Node {
    /// Wraps a system in a new, unfrozen node.
    #[must_use]
    pub fn new<S: Initializable>(system: S) -> Self {
        Self::shared(Arc::new(system))
    }

    /// Wraps a shared system, letting the caller keep its own handle to it.
    #[must_use]
    pub fn shared<S: Initializable>(system: Arc<S>) -> Self {
        Self {
            id: SystemId::of::<S>(),
            system,
            dependencies: IndexSet::new(),
            removed: IndexSet::new(),
            critical: false,
            on_start: Vec::new(),
            on_complete: Vec::new(),
            frozen: false,
        }
    }

    /// Returns the system's identity.
    #[must_use]
    pub fn id(&self) -> SystemId {
        self.id
    }

    /// Returns the system's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.system.name()
    }

    /// Returns true if the node was marked critical.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Returns true once the graph builder has frozen this node.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────────────

    /// Declares a dependency on the system type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] if the node is frozen.
    pub fn depends_on<S: Initializable>(&mut self) -> Result<&mut Self, BuildError> {
        self.declare_dependency(SystemId::of::<S>())
    }

    /// Declares a dependency on every system providing capability `C`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] if the node is frozen.
    pub fn depends_on_capability<C: Capability>(&mut self) -> Result<&mut Self, BuildError> {
        self.declare_dependency(SystemId::capability::<C>())
    }

    /// Declares a dependency by identity.
    ///
    /// # Errors
    ///
    /// - [`BuildError::Lifecycle`] if the node is frozen
    /// - [`BuildError::ConstraintViolation`] if `dependency` is neither a
    ///   system nor a capability
    pub fn declare_dependency(&mut self, dependency: SystemId) -> Result<&mut Self, BuildError> {
        self.declare_dependencies([dependency])
    }

    /// Declares several dependencies by identity.
    ///
    /// The list is validated as a whole; nothing is recorded if any entry is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Same as [`declare_dependency`](Self::declare_dependency).
    pub fn declare_dependencies(
        &mut self,
        dependencies: impl IntoIterator<Item = SystemId>,
    ) -> Result<&mut Self, BuildError> {
        self.ensure_unfrozen("declare_dependencies")?;

        let dependencies: Vec<SystemId> = dependencies.into_iter().collect();
        if let Some(invalid) = dependencies.iter().find(|dep| !dep.is_initializable()) {
            return Err(BuildError::ConstraintViolation {
                system: self.id,
                dependency: *invalid,
            });
        }

        for dependency in dependencies {
            if self.dependencies.insert(dependency) {
                debug!(system = %self.id, %dependency, "dependency declared");
            }
        }
        Ok(self)
    }

    /// Excludes the system type `S` from the resolved dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] if the node is frozen.
    pub fn removes<S: Initializable>(&mut self) -> Result<&mut Self, BuildError> {
        self.remove_dependency(SystemId::of::<S>())
    }

    /// Excludes every dependency providing capability `C`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] if the node is frozen.
    pub fn removes_capability<C: Capability>(&mut self) -> Result<&mut Self, BuildError> {
        self.remove_dependency(SystemId::capability::<C>())
    }

    /// Records an identity to subtract at resolution time.
    ///
    /// The removal applies to every declared dependency assignable to it, so
    /// naming a capability once removes all of its providers. Removals
    /// accumulate and are idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] if the node is frozen.
    pub fn remove_dependency(&mut self, removal: SystemId) -> Result<&mut Self, BuildError> {
        self.remove_dependencies([removal])
    }

    /// Records several identities to subtract at resolution time.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] if the node is frozen.
    pub fn remove_dependencies(
        &mut self,
        removals: impl IntoIterator<Item = SystemId>,
    ) -> Result<&mut Self, BuildError> {
        self.ensure_unfrozen("remove_dependencies")?;
        self.removed.extend(removals);
        Ok(self)
    }

    /// Marks the node critical.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] if the node is frozen.
    pub fn set_critical(&mut self) -> Result<&mut Self, BuildError> {
        self.ensure_unfrozen("set_critical")?;
        self.critical = true;
        Ok(self)
    }

    /// Registers a callback fired when this system starts initializing.
    ///
    /// Callbacks fire once, in registration order.
    pub fn on_start(&mut self, callback: impl FnOnce(SystemId) + Send + 'static) -> &mut Self {
        self.on_start.push(Box::new(callback));
        self
    }

    /// Registers a callback fired when this system finishes initializing.
    ///
    /// Callbacks fire once, in registration order, and only on success.
    pub fn on_complete(&mut self, callback: impl FnOnce(SystemId) + Send + 'static) -> &mut Self {
        self.on_complete.push(Box::new(callback));
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the effective dependency set.
    ///
    /// Declared dependencies minus every dependency assignable to a removal.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Lifecycle`] once the node is frozen; use
    /// [`declared_dependencies`](Self::declared_dependencies) for a read-only
    /// view after build.
    pub fn resolve_dependencies(&self) -> Result<IndexSet<SystemId>, BuildError> {
        self.ensure_unfrozen("resolve_dependencies")?;
        Ok(self
            .dependencies
            .iter()
            .filter(|dep| !self.removed.iter().any(|removal| removal.is_assignable_from(dep)))
            .copied()
            .collect())
    }

    /// Returns the declared dependencies, before removals.
    #[must_use]
    pub fn declared_dependencies(&self) -> &IndexSet<SystemId> {
        &self.dependencies
    }

    /// Returns the recorded removals.
    #[must_use]
    pub fn removed_dependencies(&self) -> &IndexSet<SystemId> {
        &self.removed
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    fn ensure_unfrozen(&self, operation: &'static str) -> Result<(), BuildError> {
        if self.frozen {
            return Err(BuildError::Lifecycle {
                system: self.id,
                operation,
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs the system's initialization, firing start and complete callbacks.
    ///
    /// All registered callbacks are discarded afterwards, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`InitError`] reported by the system.
    pub async fn run_initialize(&mut self, cancel: &CancellationToken) -> Result<(), InitError> {
        self.initialize_task(cancel.clone()).await
    }

    /// Detaches the initialization into a `'static` future suitable for spawning.
    ///
    /// Callback lists move into the future, leaving the node with none.
    pub(crate) fn initialize_task(
        &mut self,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<(), InitError>> + Send + 'static {
        let id = self.id;
        let system = Arc::clone(&self.system);
        let on_start = core::mem::take(&mut self.on_start);
        let on_complete = core::mem::take(&mut self.on_complete);

        async move {
            for callback in on_start {
                callback(id);
            }
            system.initialize(&cancel).await?;
            for callback in on_complete {
                callback(id);
            }
            Ok(())
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("removed", &self.removed)
            .field("critical", &self.critical)
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}
