//! Read interface over the containment graph.
//!
//! The authorization core never talks to storage directly. It walks a
//! [`ContainmentGraph`], which the persistence layer provides as a read-only
//! snapshot taken at the start of an operation.

use crate::types::{NodeId, ProjectId, SensorId, TokenId, UserId, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Downward containment edges plus direct token grants.
///
/// Implementations return identifiers only. Unknown ids yield empty sets.
pub trait ContainmentGraph {
    fn projects_owned_by_user(&self, user: UserId) -> BTreeSet<ProjectId>;

    fn zones_of_project(&self, project: ProjectId) -> BTreeSet<ZoneId>;

    fn nodes_of_zone(&self, zone: ZoneId) -> BTreeSet<NodeId>;

    /// Sensors attached directly to the zone, without a node.
    fn ambiental_sensors_of_zone(&self, zone: ZoneId) -> BTreeSet<SensorId>;

    fn sensors_of_node(&self, node: NodeId) -> BTreeSet<SensorId>;

    fn projects_granted_to_token(&self, token: TokenId) -> BTreeSet<ProjectId>;

    fn zones_granted_to_token(&self, token: TokenId) -> BTreeSet<ZoneId>;

    fn nodes_granted_to_token(&self, token: TokenId) -> BTreeSet<NodeId>;
}

impl<G: ContainmentGraph + ?Sized> ContainmentGraph for &G {
    fn projects_owned_by_user(&self, user: UserId) -> BTreeSet<ProjectId> {
        (**self).projects_owned_by_user(user)
    }

    fn zones_of_project(&self, project: ProjectId) -> BTreeSet<ZoneId> {
        (**self).zones_of_project(project)
    }

    fn nodes_of_zone(&self, zone: ZoneId) -> BTreeSet<NodeId> {
        (**self).nodes_of_zone(zone)
    }

    fn ambiental_sensors_of_zone(&self, zone: ZoneId) -> BTreeSet<SensorId> {
        (**self).ambiental_sensors_of_zone(zone)
    }

    fn sensors_of_node(&self, node: NodeId) -> BTreeSet<SensorId> {
        (**self).sensors_of_node(node)
    }

    fn projects_granted_to_token(&self, token: TokenId) -> BTreeSet<ProjectId> {
        (**self).projects_granted_to_token(token)
    }

    fn zones_granted_to_token(&self, token: TokenId) -> BTreeSet<ZoneId> {
        (**self).zones_granted_to_token(token)
    }

    fn nodes_granted_to_token(&self, token: TokenId) -> BTreeSet<NodeId> {
        (**self).nodes_granted_to_token(token)
    }
}

/// In-memory containment graph.
///
/// Built by the persistence layer as a per-operation snapshot, and by tests as a
/// fixture. Parent links are recorded once per child, so a child can never sit
/// under two parents. Children are indexed by parent, so every downward lookup
/// is a single map access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryGraph {
    project_owner: BTreeMap<ProjectId, UserId>,
    zone_project: BTreeMap<ZoneId, ProjectId>,
    node_zone: BTreeMap<NodeId, ZoneId>,
    sensor_parent: BTreeMap<SensorId, (ZoneId, Option<NodeId>)>,
    user_projects: BTreeMap<UserId, BTreeSet<ProjectId>>,
    project_zones: BTreeMap<ProjectId, BTreeSet<ZoneId>>,
    zone_nodes: BTreeMap<ZoneId, BTreeSet<NodeId>>,
    zone_ambiental: BTreeMap<ZoneId, BTreeSet<SensorId>>,
    node_sensors: BTreeMap<NodeId, BTreeSet<SensorId>>,
    project_grants: BTreeMap<TokenId, BTreeSet<ProjectId>>,
    zone_grants: BTreeMap<TokenId, BTreeSet<ZoneId>>,
    node_grants: BTreeMap<TokenId, BTreeSet<NodeId>>,
}

fn unlink<P: Ord, C: Ord>(index: &mut BTreeMap<P, BTreeSet<C>>, parent: &P, child: &C) {
    if let Some(children) = index.get_mut(parent) {
        children.remove(child);
    }
}

/// Move `child` from the index entry of its old parent to that of `parent`.
fn relink<P: Ord + Copy, C: Ord + Copy>(
    index: &mut BTreeMap<P, BTreeSet<C>>,
    old: Option<P>,
    parent: P,
    child: C,
) {
    if let Some(old) = old {
        unlink(index, &old, &child);
    }
    index.entry(parent).or_default().insert(child);
}

fn children<P: Ord, C: Ord + Copy>(index: &BTreeMap<P, BTreeSet<C>>, parent: &P) -> BTreeSet<C> {
    index.get(parent).cloned().unwrap_or_default()
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&mut self, project: ProjectId, owner: UserId) -> &mut Self {
        let old = self.project_owner.insert(project, owner);
        relink(&mut self.user_projects, old, owner, project);
        self
    }

    pub fn add_zone(&mut self, zone: ZoneId, project: ProjectId) -> &mut Self {
        let old = self.zone_project.insert(zone, project);
        relink(&mut self.project_zones, old, project, zone);
        self
    }

    pub fn add_node(&mut self, node: NodeId, zone: ZoneId) -> &mut Self {
        let old = self.node_zone.insert(node, zone);
        relink(&mut self.zone_nodes, old, zone, node);
        self
    }

    /// Record a sensor. `node == None` makes it ambiental.
    pub fn add_sensor(
        &mut self,
        sensor: SensorId,
        zone: ZoneId,
        node: Option<NodeId>,
    ) -> &mut Self {
        match self.sensor_parent.insert(sensor, (zone, node)) {
            Some((_, Some(old_node))) => unlink(&mut self.node_sensors, &old_node, &sensor),
            Some((old_zone, None)) => unlink(&mut self.zone_ambiental, &old_zone, &sensor),
            None => {}
        }
        match node {
            Some(node) => self.node_sensors.entry(node).or_default().insert(sensor),
            None => self.zone_ambiental.entry(zone).or_default().insert(sensor),
        };
        self
    }

    pub fn grant_project(&mut self, token: TokenId, project: ProjectId) -> &mut Self {
        self.project_grants.entry(token).or_default().insert(project);
        self
    }

    pub fn grant_zone(&mut self, token: TokenId, zone: ZoneId) -> &mut Self {
        self.zone_grants.entry(token).or_default().insert(zone);
        self
    }

    pub fn grant_node(&mut self, token: TokenId, node: NodeId) -> &mut Self {
        self.node_grants.entry(token).or_default().insert(node);
        self
    }

    pub fn project_count(&self) -> usize {
        self.project_owner.len()
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_parent.len()
    }
}

impl ContainmentGraph for InMemoryGraph {
    fn projects_owned_by_user(&self, user: UserId) -> BTreeSet<ProjectId> {
        children(&self.user_projects, &user)
    }

    fn zones_of_project(&self, project: ProjectId) -> BTreeSet<ZoneId> {
        children(&self.project_zones, &project)
    }

    fn nodes_of_zone(&self, zone: ZoneId) -> BTreeSet<NodeId> {
        children(&self.zone_nodes, &zone)
    }

    fn ambiental_sensors_of_zone(&self, zone: ZoneId) -> BTreeSet<SensorId> {
        children(&self.zone_ambiental, &zone)
    }

    fn sensors_of_node(&self, node: NodeId) -> BTreeSet<SensorId> {
        children(&self.node_sensors, &node)
    }

    fn projects_granted_to_token(&self, token: TokenId) -> BTreeSet<ProjectId> {
        children(&self.project_grants, &token)
    }

    fn zones_granted_to_token(&self, token: TokenId) -> BTreeSet<ZoneId> {
        children(&self.zone_grants, &token)
    }

    fn nodes_granted_to_token(&self, token: TokenId) -> BTreeSet<NodeId> {
        children(&self.node_grants, &token)
    }
}
