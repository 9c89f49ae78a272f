//! Graph construction and batch planning.
//!
//! The [`GraphBuilder`] collects systems, lets callers declare dependencies
//! through the [`Node`] handles it returns, then freezes everything into an
//! [`ExecutionContext`] holding an ordered list of batches.
//!
//! # Batching
//!
//! Batches are computed with a level-synchronous variant of Kahn's algorithm:
//! every node with no outstanding dependency forms the current batch, the whole
//! batch is drained at once, and the nodes it unblocks form the next batch.
//! Each node therefore lands in the earliest batch its dependencies allow.
//!
//! ```text
//!   Config ──▶ Database ──▶ Api
//!   Metrics ───────────────▲
//!
//!   batch 0: [Config, Metrics]
//!   batch 1: [Database]
//!   batch 2: [Api]
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut builder = GraphBuilder::new();
//! builder.register(Config::default())?;
//! builder.register(Metrics::default())?;
//! builder.register(Database::default())?.depends_on::<Config>()?.set_critical()?;
//! builder.register(Api::default())?.depends_on::<Database>()?.depends_on::<Metrics>()?;
//!
//! let mut context = builder.build()?;
//! context.run(&CancellationToken::new()).await?;
//! ```

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use indexmap::IndexSet;
use indexmap::map::Entry;
use tracing::{debug, info, warn};

use ignite_system::id::SystemId;
use ignite_system::system::{DeclareDependencies, Initializable};

use crate::context::ExecutionContext;
use crate::error::BuildError;
use crate::node::Node;

/// How [`GraphBuilder::build`] treats a dependency no registered system satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    /// Fail the build with [`BuildError::UnresolvedDependency`] (default).
    #[default]
    Strict,
    /// Drop the ordering constraint and log a warning.
    Ignore,
}

/// Collects systems and freezes them into an execution plan.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Registered nodes, in registration order.
    nodes: IndexMap<SystemId, Node>,
    /// Treatment of dependencies that match no registered node.
    unresolved_policy: UnresolvedPolicy,
}

impl GraphBuilder {
    /// Creates an empty builder with the strict unresolved-dependency policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how dependencies without a registered provider are treated.
    #[must_use]
    pub fn with_unresolved_policy(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved_policy = policy;
        self
    }

    /// Returns the configured unresolved-dependency policy.
    #[must_use]
    pub fn unresolved_policy(&self) -> UnresolvedPolicy {
        self.unresolved_policy
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a system and returns its node handle.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateSystem`] if a system of the same type is
    /// already registered.
    pub fn register<S: Initializable>(&mut self, system: S) -> Result<&mut Node, BuildError> {
        self.insert(Node::new(system))
    }

    /// Registers a shared system, letting the caller keep a handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateSystem`] if a system of the same type is
    /// already registered.
    pub fn register_shared<S: Initializable>(
        &mut self,
        system: Arc<S>,
    ) -> Result<&mut Node, BuildError> {
        self.insert(Node::shared(system))
    }

    /// Registers a system and applies the dependencies it declares itself.
    ///
    /// # Errors
    ///
    /// - [`BuildError::DuplicateSystem`] if the type is already registered
    /// - [`BuildError::ConstraintViolation`] if a declared identity is not an
    ///   initializable system or capability
    ///
    /// The declarations are checked before the system is inserted, so a
    /// failed call leaves the builder unchanged.
    pub fn register_declared<S>(&mut self, system: S) -> Result<&mut Node, BuildError>
    where
        S: Initializable + DeclareDependencies,
    {
        let declared = system.declared_dependencies();
        if let Some(invalid) = declared.iter().find(|dep| !dep.is_initializable()) {
            return Err(BuildError::ConstraintViolation {
                system: SystemId::of::<S>(),
                dependency: *invalid,
            });
        }
        self.register(system)?.declare_dependencies(declared)
    }

    fn insert(&mut self, node: Node) -> Result<&mut Node, BuildError> {
        let id = node.id();
        match self.nodes.entry(id) {
            Entry::Occupied(_) => Err(BuildError::DuplicateSystem { system: id }),
            Entry::Vacant(slot) => {
                debug!(system = %id, "system registered");
                Ok(slot.insert(node))
            }
        }
    }

    /// Returns the handle of an already registered system type.
    #[must_use]
    pub fn node_mut<S: Initializable>(&mut self) -> Option<&mut Node> {
        self.nodes.get_mut(&SystemId::of::<S>())
    }

    /// Returns the node registered under `id`.
    #[must_use]
    pub fn get(&self, id: &SystemId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns true if a system of type `S` is registered.
    #[must_use]
    pub fn contains<S: Initializable>(&self) -> bool {
        self.nodes.contains_key(&SystemId::of::<S>())
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Build
    // ─────────────────────────────────────────────────────────────────────────

    /// Freezes every node and computes the batch plan.
    ///
    /// Consumes the builder, so node handles cannot outlive the freeze.
    ///
    /// # Errors
    ///
    /// - [`BuildError::UnresolvedDependency`] if a dependency matches no
    ///   registered system (strict policy only)
    /// - [`BuildError::CyclicDependency`] if some nodes can never become ready
    pub fn build(mut self) -> Result<ExecutionContext, BuildError> {
        let mut resolved: Vec<IndexSet<SystemId>> = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.values_mut() {
            resolved.push(node.resolve_dependencies()?);
            node.freeze();
        }

        let ids: Vec<SystemId> = self.nodes.keys().copied().collect();
        let (in_degree, dependents) = self.link(&ids, &resolved)?;
        let levels = batch_levels(&ids, in_degree, &dependents)?;

        let critical: HashSet<SystemId> = self
            .nodes
            .values()
            .filter(|node| node.is_critical())
            .map(Node::id)
            .collect();

        let mut slots: Vec<Option<Node>> = self.nodes.into_values().map(Some).collect();
        let batches: Vec<Vec<Node>> = levels
            .iter()
            .map(|level| level.iter().filter_map(|&idx| slots[idx].take()).collect())
            .collect();

        info!(
            systems = ids.len(),
            batches = batches.len(),
            critical = critical.len(),
            "initialization graph built"
        );
        for (index, batch) in batches.iter().enumerate() {
            debug!(
                index,
                systems = ?batch.iter().map(|node| node.id().short_name()).collect::<Vec<_>>(),
                "batch planned"
            );
        }

        Ok(ExecutionContext::new(batches, critical))
    }

    /// Matches resolved dependencies to registered nodes.
    ///
    /// Returns the in-degree of every node and, for every node, the indices of
    /// the nodes that wait on it. A dependency on a capability links to every
    /// registered provider; repeated links between the same pair collapse.
    ///
    /// A system that provides a capability and also depends on it waits on
    /// the other providers only. If it is the sole provider, the dependency
    /// is handled by the unresolved policy. A dependency on a system's own
    /// type still links to itself and is reported as a cycle.
    fn link(
        &self,
        ids: &[SystemId],
        resolved: &[IndexSet<SystemId>],
    ) -> Result<(Vec<usize>, Vec<Vec<usize>>), BuildError> {
        // identity or provided capability -> providers
        let mut providers: HashMap<SystemId, Vec<usize>> = HashMap::new();
        for (idx, id) in ids.iter().enumerate() {
            providers.entry(*id).or_default().push(idx);
            for capability in id.provided_capabilities() {
                providers.entry(capability).or_default().push(idx);
            }
        }

        let mut in_degree = vec![0usize; ids.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];

        for (idx, dependencies) in resolved.iter().enumerate() {
            let mut waits_on: IndexSet<usize> = IndexSet::new();
            for dependency in dependencies {
                let own_type = *dependency == ids[idx];
                let matches: Vec<usize> = providers
                    .get(dependency)
                    .into_iter()
                    .flatten()
                    .copied()
                    .filter(|&provider| provider != idx || own_type)
                    .collect();
                if !matches.is_empty() {
                    waits_on.extend(matches);
                    continue;
                }
                match self.unresolved_policy {
                    UnresolvedPolicy::Strict => {
                        return Err(BuildError::UnresolvedDependency {
                            system: ids[idx],
                            dependency: *dependency,
                        });
                    }
                    UnresolvedPolicy::Ignore => {
                        warn!(
                            system = %ids[idx],
                            %dependency,
                            "dropping dependency with no registered provider"
                        );
                    }
                }
            }

            for provider in waits_on {
                dependents[provider].push(idx);
                in_degree[idx] += 1;
            }
        }

        Ok((in_degree, dependents))
    }
}

/// Partitions nodes into batches, level by level.
///
/// Within a level, indices stay in registration order.
fn batch_levels(
    ids: &[SystemId],
    mut in_degree: Vec<usize>,
    dependents: &[Vec<usize>],
) -> Result<Vec<Vec<usize>>, BuildError> {
    let mut levels: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..ids.len()).filter(|&idx| in_degree[idx] == 0).collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &idx in &current {
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        levels.push(current);
        current = next;
    }

    let blocked: Vec<SystemId> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree > 0)
        .map(|(idx, _)| ids[idx])
        .collect();

    if !blocked.is_empty() {
        return Err(BuildError::CyclicDependency { systems: blocked });
    }

    Ok(levels)
}
