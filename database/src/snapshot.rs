//! Loading the containment graph the authorization core evaluates against.
//!
//! The core is synchronous and never touches the database. Each request loads a
//! fresh [`InMemoryGraph`] holding only what its credential can reach: the
//! user's projects, or the token's granted projects, zones and nodes, plus
//! everything below them. Checks within one operation see one consistent view.

use crate::storage::IotStorage;
use crate::Result;
use authz::{Credential, InMemoryGraph, NodeId, ProjectId, SensorId, TokenId, UserId, ZoneId};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Sqlite};
use std::collections::BTreeSet;
use tracing::debug;

/// Ids bound per `IN (...)` list, below SQLite's host parameter limit
const BIND_CHUNK: usize = 500;

impl<'a> IotStorage<'a> {
    /// Snapshot of the part of the hierarchy `credential` can reach, with the
    /// grants of its active token. Anonymous credentials get an empty graph.
    pub async fn load_snapshot(&self, credential: &Credential) -> Result<InMemoryGraph> {
        let pool = self.database().pool();
        let mut graph = InMemoryGraph::new();
        let mut zones = BTreeSet::new();
        let mut nodes = BTreeSet::new();

        let projects: Vec<(i64, i64)> = match credential {
            Credential::Anonymous => Vec::new(),
            Credential::User(user) => {
                sqlx::query_as("SELECT id, user_id FROM projects WHERE user_id = ?")
                    .bind(user.id.get())
                    .fetch_all(pool)
                    .await?
            }
            Credential::Token { token, .. } => {
                self.load_token_grants(*token, &mut graph, &mut zones, &mut nodes)
                    .await?
            }
        };
        let project_ids: BTreeSet<i64> = projects.iter().map(|(project, _)| *project).collect();
        for (project, owner) in projects {
            graph.add_project(ProjectId(project), UserId(owner));
        }

        let project_zones: Vec<(i64, i64)> = self
            .fetch_in("SELECT id, project_id FROM zones WHERE project_id", &project_ids)
            .await?;
        for (zone, project) in project_zones {
            graph.add_zone(ZoneId(zone), ProjectId(project));
            zones.insert(zone);
        }

        let zone_nodes: Vec<(i64, i64)> = self
            .fetch_in("SELECT id, zone_id FROM nodes WHERE zone_id", &zones)
            .await?;
        for (node, zone) in zone_nodes {
            graph.add_node(NodeId(node), ZoneId(zone));
            nodes.insert(node);
        }

        let ambiental: Vec<(i64, i64, Option<i64>)> = self
            .fetch_in(
                "SELECT id, zone_id, node_id FROM sensors WHERE node_id IS NULL AND zone_id",
                &zones,
            )
            .await?;
        let on_nodes: Vec<(i64, i64, Option<i64>)> = self
            .fetch_in("SELECT id, zone_id, node_id FROM sensors WHERE node_id", &nodes)
            .await?;
        for (sensor, zone, node) in ambiental.into_iter().chain(on_nodes) {
            graph.add_sensor(SensorId(sensor), ZoneId(zone), node.map(NodeId));
        }

        debug!(
            "Loaded snapshot for {} with {} project(s) and {} sensor(s)",
            credential,
            graph.project_count(),
            graph.sensor_count()
        );
        Ok(graph)
    }

    /// Record the direct grants of `token` and return its granted projects.
    /// Granted zones and nodes are added to `zones` and `nodes`.
    async fn load_token_grants(
        &self,
        token: TokenId,
        graph: &mut InMemoryGraph,
        zones: &mut BTreeSet<i64>,
        nodes: &mut BTreeSet<i64>,
    ) -> Result<Vec<(i64, i64)>> {
        let pool = self.database().pool();

        let projects: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT projects.id, projects.user_id FROM project_access_keys
            JOIN projects ON projects.id = project_access_keys.project_id
            WHERE project_access_keys.token_id = ?
            "#,
        )
        .bind(token.get())
        .fetch_all(pool)
        .await?;
        for (project, _) in &projects {
            graph.grant_project(token, ProjectId(*project));
        }

        let granted_zones: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT zones.id, zones.project_id FROM zone_access_keys
            JOIN zones ON zones.id = zone_access_keys.zone_id
            WHERE zone_access_keys.token_id = ?
            "#,
        )
        .bind(token.get())
        .fetch_all(pool)
        .await?;
        for (zone, project) in granted_zones {
            graph
                .add_zone(ZoneId(zone), ProjectId(project))
                .grant_zone(token, ZoneId(zone));
            zones.insert(zone);
        }

        let granted_nodes: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT nodes.id, nodes.zone_id FROM node_access_keys
            JOIN nodes ON nodes.id = node_access_keys.node_id
            WHERE node_access_keys.token_id = ?
            "#,
        )
        .bind(token.get())
        .fetch_all(pool)
        .await?;
        for (node, zone) in granted_nodes {
            graph
                .add_node(NodeId(node), ZoneId(zone))
                .grant_node(token, NodeId(node));
            nodes.insert(node);
        }

        Ok(projects)
    }

    /// Run `select` followed by `IN (...)` over `ids`, in chunks.
    async fn fetch_in<T>(&self, select: &str, ids: &BTreeSet<i64>) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let ids: Vec<i64> = ids.iter().copied().collect();
        let mut rows = Vec::new();
        for chunk in ids.chunks(BIND_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new(select);
            query.push(" IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            rows.extend(
                query
                    .build_query_as::<T>()
                    .fetch_all(self.database().pool())
                    .await?,
            );
        }
        Ok(rows)
    }

    /// Ids of every sensor, for callers that bypass ownership checks
    pub async fn all_sensor_ids(&self) -> Result<BTreeSet<SensorId>> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM sensors")
            .fetch_all(self.database().pool())
            .await?;
        Ok(ids.into_iter().map(|(id,)| SensorId(id)).collect())
    }

    /// Every sensor located in any zone of `project`, node sensors included
    pub async fn project_sensor_ids(&self, project: ProjectId) -> Result<BTreeSet<SensorId>> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT sensors.id FROM sensors
            JOIN zones ON zones.id = sensors.zone_id
            WHERE zones.project_id = ?
            "#,
        )
        .bind(project.get())
        .fetch_all(self.database().pool())
        .await?;
        Ok(ids.into_iter().map(|(id,)| SensorId(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewGroup, NewProject, SensorType};
    use crate::test_support::migrated_db;
    use authz::{AuthzEngine, Credential, EntityKind, Target};

    fn group(name: &str) -> NewGroup {
        NewGroup {
            name: name.into(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_drives_authorization() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();

        let owner = storage.create_user("owner", "hash", false).await.unwrap();
        let device = storage.create_access_token(owner.id, "devicehash").await.unwrap();
        let project = storage
            .create_project(
                owner.id,
                &NewProject {
                    name: "farm".into(),
                    ..NewProject::default()
                },
            )
            .await
            .unwrap();

        // Created under the device token, so the token is granted the zone
        let granted = storage
            .create_zone(project.id, &group("granted"), Some(device.id))
            .await
            .unwrap();
        let other = storage
            .create_zone(project.id, &group("other"), None)
            .await
            .unwrap();
        let node = storage
            .create_node(granted.id, &group("n"), None)
            .await
            .unwrap();
        let sensor = storage
            .create_node_sensor(node.id, SensorType::Dht22)
            .await
            .unwrap();
        let foreign_sensor = storage
            .create_ambiental_sensor(other.id, SensorType::Ldr)
            .await
            .unwrap();

        let as_owner = Credential::user(owner.identity());
        let engine = AuthzEngine::new(storage.load_snapshot(&as_owner).await.unwrap());
        assert_eq!(
            engine.authorize(&as_owner, EntityKind::Zone, &Target::Zone(other.id)),
            Ok(true)
        );

        let as_token = Credential::token(owner.identity(), device.id);
        let engine = AuthzEngine::new(storage.load_snapshot(&as_token).await.unwrap());
        assert_eq!(
            engine.authorize(&as_token, EntityKind::Sensor, &Target::Sensor(sensor.id)),
            Ok(true)
        );
        assert_eq!(
            engine.authorize(
                &as_token,
                EntityKind::Sensor,
                &Target::Sensor(foreign_sensor.id)
            ),
            Ok(false)
        );
        assert_eq!(
            engine.authorize(&as_token, EntityKind::Project, &Target::Project(project.id)),
            Ok(false)
        );
    }

    #[tokio::test]
    async fn test_snapshot_is_limited_to_reachable_hierarchy() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();

        let mut tenants = Vec::new();
        for index in 0..6 {
            let user = storage
                .create_user(&format!("tenant{}", index), "hash", false)
                .await
                .unwrap();
            let project = storage
                .create_project(user.id, &NewProject::default())
                .await
                .unwrap();
            let zone = storage
                .create_zone(project.id, &group("z"), None)
                .await
                .unwrap();
            let node = storage.create_node(zone.id, &group("n"), None).await.unwrap();
            storage
                .create_ambiental_sensor(zone.id, SensorType::Ldr)
                .await
                .unwrap();
            let sensor = storage
                .create_node_sensor(node.id, SensorType::Dht11)
                .await
                .unwrap();
            tenants.push((user, zone, node, sensor));
        }

        let (owner, _, _, _) = &tenants[0];
        let graph = storage
            .load_snapshot(&Credential::user(owner.identity()))
            .await
            .unwrap();
        assert_eq!(graph.project_count(), 1);
        assert_eq!(graph.sensor_count(), 2);

        // A node grant reaches the node's sensors but not its zone's ambiental ones
        let (holder, _, node, sensor) = &tenants[1];
        let token = storage.create_access_token(holder.id, "node-token").await.unwrap();
        storage.grant_node(token.id, node.id).await.unwrap();
        let credential = Credential::token(holder.identity(), token.id);
        let graph = storage.load_snapshot(&credential).await.unwrap();
        assert_eq!(graph.project_count(), 0);
        assert_eq!(graph.sensor_count(), 1);
        let engine = AuthzEngine::new(graph);
        assert_eq!(
            engine.owned_sensor_ids(&credential),
            BTreeSet::from([sensor.id])
        );

        let graph = storage.load_snapshot(&Credential::Anonymous).await.unwrap();
        assert_eq!(graph.project_count(), 0);
        assert_eq!(graph.sensor_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_includes_explicit_grants() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();

        let owner = storage.create_user("owner", "hash", false).await.unwrap();
        let token = storage.create_access_token(owner.id, "t").await.unwrap();
        let project = storage
            .create_project(owner.id, &NewProject::default())
            .await
            .unwrap();
        let zone = storage
            .create_zone(project.id, &group("z"), None)
            .await
            .unwrap();
        storage.grant_project(token.id, project.id).await.unwrap();
        // Granting twice is harmless
        storage.grant_project(token.id, project.id).await.unwrap();

        let credential = Credential::token(owner.identity(), token.id);
        let engine = AuthzEngine::new(storage.load_snapshot(&credential).await.unwrap());
        assert!(engine.resolve(&credential).owns_zone(zone.id));
    }

    #[tokio::test]
    async fn test_project_sensor_ids() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();

        let owner = storage.create_user("owner", "hash", false).await.unwrap();
        let project = storage
            .create_project(owner.id, &NewProject::default())
            .await
            .unwrap();
        let zone = storage
            .create_zone(project.id, &group("z"), None)
            .await
            .unwrap();
        let node = storage.create_node(zone.id, &group("n"), None).await.unwrap();
        let ambiental = storage
            .create_ambiental_sensor(zone.id, SensorType::Cms)
            .await
            .unwrap();
        let on_node = storage
            .create_node_sensor(node.id, SensorType::Sm150)
            .await
            .unwrap();

        let ids = storage.project_sensor_ids(project.id).await.unwrap();
        assert_eq!(ids, BTreeSet::from([ambiental.id, on_node.id]));
        assert_eq!(storage.all_sensor_ids().await.unwrap(), ids);
        assert!(storage
            .project_sensor_ids(ProjectId(99))
            .await
            .unwrap()
            .is_empty());
    }
}
