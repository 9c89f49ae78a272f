//! Identities for systems and capabilities.
//!
//! A [`SystemId`] names a system *type*, never an instance. The same vocabulary
//! is used to register a system and to reference it from another system's
//! dependency declarations.
//!
//! Rust has no subtyping, so "interface" identities are modelled as
//! [`Capability`] marker types. A system lists the capabilities it provides via
//! [`Initializable::capabilities`](crate::system::Initializable::capabilities),
//! and the [`is_assignable_from`](SystemId::is_assignable_from) relation treats
//! a system as assignable to each capability it provides.
//!
//! # Example
//!
//! ```
//! use ignite_system::id::{Capability, SystemId};
//! use ignite_system::system::{BoxFuture, InitError, Initializable};
//! use ignite_system::CancellationToken;
//!
//! struct Storage;
//! impl Capability for Storage {}
//!
//! struct SqliteStore;
//!
//! impl Initializable for SqliteStore {
//!     fn initialize<'a>(
//!         &'a self,
//!         _cancel: &'a CancellationToken,
//!     ) -> BoxFuture<'a, Result<(), InitError>> {
//!         Box::pin(async { Ok(()) })
//!     }
//!
//!     fn capabilities() -> Vec<SystemId> {
//!         vec![SystemId::capability::<Storage>()]
//!     }
//! }
//!
//! let storage = SystemId::capability::<Storage>();
//! let sqlite = SystemId::of::<SqliteStore>();
//! assert!(storage.is_assignable_from(&sqlite));
//! assert!(!sqlite.is_assignable_from(&storage));
//! ```

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::system::Initializable;

/// Marker trait for capability identities.
///
/// A capability is a zero-sized "interface" type that several systems may
/// provide. Depending on a capability waits for every registered provider;
/// removing a capability drops every declared dependency that provides it.
pub trait Capability: 'static {}

/// What an identity denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// A concrete type implementing [`Initializable`].
    System,
    /// A marker type implementing [`Capability`].
    Capability,
    /// Any other type. Not a valid dependency target.
    Opaque,
}

/// Unique identifier for a system type or capability.
///
/// Equality and hashing only consider the underlying [`TypeId`]; the type name
/// is carried for logs and error messages.
#[derive(Clone, Copy)]
pub struct SystemId {
    type_id: TypeId,
    type_name: &'static str,
    kind: IdKind,
    provides: fn() -> Vec<SystemId>,
}

impl SystemId {
    /// Creates the identity of the system type `S`.
    #[must_use]
    pub fn of<S: Initializable>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            type_name: core::any::type_name::<S>(),
            kind: IdKind::System,
            provides: S::capabilities,
        }
    }

    /// Creates the identity of the capability `C`.
    #[must_use]
    pub fn capability<C: Capability>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: core::any::type_name::<C>(),
            kind: IdKind::Capability,
            provides: Vec::new,
        }
    }

    /// Creates an identity for an arbitrary type.
    ///
    /// Such identities appear when dependency lists come from an external
    /// declaration source. Declaring one as a dependency is rejected.
    #[must_use]
    pub fn opaque<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            kind: IdKind::Opaque,
            provides: Vec::new,
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the short type name (last path segment).
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        // Generic arguments may contain `::`, so only split the head.
        let head = self.type_name.split('<').next().unwrap_or(self.type_name);
        let start = head.rfind("::").map_or(0, |idx| idx + 2);
        &self.type_name[start..]
    }

    /// Returns what this identity denotes.
    #[must_use]
    pub fn kind(&self) -> IdKind {
        self.kind
    }

    /// Returns true if this identity may be used as a dependency.
    #[must_use]
    pub fn is_initializable(&self) -> bool {
        matches!(self.kind, IdKind::System | IdKind::Capability)
    }

    /// Returns the capabilities provided by this identity.
    ///
    /// Always empty for capabilities and opaque identities.
    #[must_use]
    pub fn provided_capabilities(&self) -> Vec<SystemId> {
        (self.provides)()
    }

    /// Returns true if `other` can stand in for `self`.
    ///
    /// That is the case when both are the same identity, or when `other`
    /// provides `self` as a capability.
    #[must_use]
    pub fn is_assignable_from(&self, other: &SystemId) -> bool {
        self == other || other.provided_capabilities().contains(self)
    }
}

impl PartialEq for SystemId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for SystemId {}

impl Hash for SystemId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemId")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
