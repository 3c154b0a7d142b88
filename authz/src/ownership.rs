//! Ownership index: the transitive closure of what a credential owns.
//!
//! Resolution seeds from direct ownership (a user's projects) or direct grants
//! (a token's projects, zones and nodes), then walks containment downward once:
//!
//! - zones   = seeded zones ∪ zones of owned projects
//! - nodes   = seeded nodes ∪ nodes of owned zones
//! - sensors = ambiental sensors of owned zones ∪ sensors of owned nodes
//!
//! A node grant therefore never reaches the ambiental sensors of its zone, while
//! a zone grant reaches every node and sensor beneath it.

use crate::graph::ContainmentGraph;
use crate::types::{Credential, NodeId, ProjectId, SensorId, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// The effective owned set of a credential, per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipSet {
    pub projects: BTreeSet<ProjectId>,
    pub zones: BTreeSet<ZoneId>,
    pub nodes: BTreeSet<NodeId>,
    pub sensors: BTreeSet<SensorId>,
}

impl OwnershipSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.zones.is_empty()
            && self.nodes.is_empty()
            && self.sensors.is_empty()
    }

    pub fn owns_project(&self, id: ProjectId) -> bool {
        self.projects.contains(&id)
    }

    pub fn owns_zone(&self, id: ZoneId) -> bool {
        self.zones.contains(&id)
    }

    pub fn owns_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn owns_sensor(&self, id: SensorId) -> bool {
        self.sensors.contains(&id)
    }
}

/// Compute the owned set of `credential` over `graph`.
///
/// Anonymous credentials resolve to the empty set; this never fails.
pub fn resolve<G: ContainmentGraph + ?Sized>(graph: &G, credential: &Credential) -> OwnershipSet {
    let (projects, zones, nodes) = match credential {
        Credential::Anonymous => return OwnershipSet::empty(),
        Credential::User(user) => (
            graph.projects_owned_by_user(user.id),
            BTreeSet::new(),
            BTreeSet::new(),
        ),
        Credential::Token { token, .. } => (
            graph.projects_granted_to_token(*token),
            graph.zones_granted_to_token(*token),
            graph.nodes_granted_to_token(*token),
        ),
    };

    let set = close_downward(graph, projects, zones, nodes);
    debug!(
        "Resolved ownership for {}: {} projects, {} zones, {} nodes, {} sensors",
        credential,
        set.projects.len(),
        set.zones.len(),
        set.nodes.len(),
        set.sensors.len()
    );
    set
}

fn close_downward<G: ContainmentGraph + ?Sized>(
    graph: &G,
    projects: BTreeSet<ProjectId>,
    mut zones: BTreeSet<ZoneId>,
    mut nodes: BTreeSet<NodeId>,
) -> OwnershipSet {
    for project in &projects {
        zones.extend(graph.zones_of_project(*project));
    }

    for zone in &zones {
        nodes.extend(graph.nodes_of_zone(*zone));
    }

    let mut sensors = BTreeSet::new();
    for zone in &zones {
        sensors.extend(graph.ambiental_sensors_of_zone(*zone));
    }
    for node in &nodes {
        sensors.extend(graph.sensors_of_node(*node));
    }

    OwnershipSet {
        projects,
        zones,
        nodes,
        sensors,
    }
}
