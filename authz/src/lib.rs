//! Ownership-based authorization engine for the telemetry platform.
//!
//! This crate decides whether a credential controls an object in the
//! Project → Zone → Node → Sensor hierarchy. It defines the credential and
//! target types, the [`ContainmentGraph`] read interface it walks, the ownership
//! index that computes what a credential owns, and the [`AuthzEngine`] that
//! evaluates checks.
//!
//! # Architecture Overview
//!
//! The authorization flow follows this pattern:
//!
//! 1. **Request arrives** at the API layer
//! 2. **Credential resolution** turns headers into a [`Credential`]
//! 3. **Snapshot** of the containment graph is loaded for the operation
//! 4. **OperationScope** resolves the ownership set once and answers every check
//! 5. **Decision** is returned: allow, deny, or unrecognized target
//!
//! # Security Architecture
//!
//! - Deny by default: anonymous credentials own nothing.
//! - Superuser bypass applies only to a superuser acting without a token.
//! - Token requests never inherit the holder's own projects.
//! - Unrecognized targets are errors, never silent passes.
//! - Batch checks are all-or-nothing.

pub mod error;
pub mod graph;
pub mod ownership;
pub mod scope;
pub mod types;

pub use error::{AuthzError, Result};
pub use graph::{ContainmentGraph, InMemoryGraph};
pub use ownership::{resolve, OwnershipSet};
pub use scope::OperationScope;
pub use types::{
    Credential, EntityKind, NodeId, ProjectId, SensorId, Target, TokenId, UserId, UserIdentity,
    ZoneId,
};

use std::collections::BTreeSet;
use tracing::{debug, warn};

/// The core authorization engine.
///
/// The engine owns (or borrows) a containment graph snapshot and answers
/// permission checks against it. It keeps no state between calls; use
/// [`AuthzEngine::begin_operation`] to memoize the ownership set across the
/// checks of a single operation.
///
/// # Example
///
/// ```rust
/// use authz::{AuthzEngine, Credential, EntityKind, InMemoryGraph, ProjectId, Target, UserId, UserIdentity, ZoneId};
///
/// let mut graph = InMemoryGraph::new();
/// graph.add_project(ProjectId(1), UserId(1)).add_zone(ZoneId(1), ProjectId(1));
///
/// let engine = AuthzEngine::new(graph);
/// let owner = Credential::user(UserIdentity::new(UserId(1)));
///
/// match engine.authorize(&owner, EntityKind::Zone, &Target::Zone(ZoneId(1))) {
///     Ok(true) => println!("Access granted"),
///     Ok(false) => println!("Access denied"),
///     Err(e) => eprintln!("Authorization error: {}", e),
/// }
/// ```
pub struct AuthzEngine<G> {
    graph: G,
}

impl<G: ContainmentGraph> AuthzEngine<G> {
    /// Creates a new engine over the given graph snapshot.
    pub fn new(graph: G) -> Self {
        Self { graph }
    }

    /// The graph this engine evaluates against.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Compute the ownership set of `credential`.
    pub fn resolve(&self, credential: &Credential) -> OwnershipSet {
        ownership::resolve(&self.graph, credential)
    }

    /// Evaluate a single permission check.
    ///
    /// # Arguments
    ///
    /// * `credential` - The resolved credential making the request
    /// * `checker` - The kind of check the caller asks for
    /// * `target` - The object being accessed
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the credential controls the target
    /// - `Ok(false)` if it does not (deny)
    /// - `Err(AuthzError::UnrecognizedTarget)` if `checker` has no case for
    ///   `target` and no narrower delegation applies
    pub fn authorize(
        &self,
        credential: &Credential,
        checker: EntityKind,
        target: &Target,
    ) -> Result<bool> {
        if credential.bypasses_checks() {
            debug!("Superuser bypass for {} on {}", credential, target);
            return Ok(true);
        }
        let target = dispatch(checker, target)?;
        Ok(self.resolve(credential).contains(&target))
    }

    /// Sensor ids visible to `credential`, for reporting collaborators that
    /// filter data in bulk instead of checking objects one by one.
    pub fn owned_sensor_ids(&self, credential: &Credential) -> BTreeSet<SensorId> {
        self.resolve(credential).sensors
    }

    /// Open a scope for one operation. The ownership set is resolved at most
    /// once for the lifetime of the scope.
    pub fn begin_operation<'a>(&'a self, credential: &'a Credential) -> OperationScope<'a, G> {
        OperationScope::new(self, credential)
    }
}

/// Map a (checker, target) pair onto the target the ownership set is checked
/// against.
///
/// | checker | Project | Zone | Node | Sensor |
/// |---------|---------|------|------|--------|
/// | Project | own     | Zone | Node | -      |
/// | Zone    | -       | own  | -    | Sensor |
/// | Node    | -       | -    | own  | -      |
/// | Sensor  | -       | -    | -    | own    |
///
/// `-` is [`AuthzError::UnrecognizedTarget`].
pub fn dispatch(checker: EntityKind, target: &Target) -> Result<Target> {
    match (checker, target) {
        (EntityKind::Project, Target::Project(_))
        | (EntityKind::Zone, Target::Zone(_))
        | (EntityKind::Node, Target::Node(_))
        | (EntityKind::Sensor, Target::Sensor(_)) => Ok(*target),
        (EntityKind::Project, Target::Zone(_)) => dispatch(EntityKind::Zone, target),
        (EntityKind::Project, Target::Node(_)) => dispatch(EntityKind::Node, target),
        (EntityKind::Zone, Target::Sensor(_)) => dispatch(EntityKind::Sensor, target),
        (checker, target) => {
            warn!(
                "Unrecognized target: {} check was handed {}; the caller is wired to the wrong checker",
                checker, target
            );
            Err(AuthzError::UnrecognizedTarget {
                checker,
                target: *target,
            })
        }
    }
}

impl OwnershipSet {
    /// Whether the set contains `target` under its own kind.
    pub fn contains(&self, target: &Target) -> bool {
        match target {
            Target::Project(id) => self.owns_project(*id),
            Target::Zone(id) => self.owns_zone(*id),
            Target::Node(id) => self.owns_node(*id),
            Target::Sensor(id) => self.owns_sensor(*id),
        }
    }
}
