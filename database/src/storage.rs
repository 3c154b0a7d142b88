use crate::models::{
    AccessTokenRecord, GroupUpdate, NewGroup, NewProject, Node, NodeTree, Project, ProjectTree,
    Sensor, SensorType, UserRecord, Zone, ZoneTree,
};
use crate::{Database, DatabaseError, Result};
use authz::{NodeId, ProjectId, SensorId, TokenId, UserId, ZoneId};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info};

/// Longest project name, in characters
pub const PROJECT_NAME_MAX: usize = 20;
/// Longest project snippet title, in characters
pub const SNIPPET_TITLE_MAX: usize = 30;
/// Longest zone name, in characters
pub const ZONE_NAME_MAX: usize = 30;
/// Longest node name, in characters
pub const NODE_NAME_MAX: usize = 20;

/// CRUD operations over the telemetry hierarchy
pub struct IotStorage<'a> {
    db: &'a Database,
}

impl<'a> IotStorage<'a> {
    /// Create a new IotStorage instance
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &'a Database {
        self.db
    }

    // ---- users and tokens ----

    /// Create a user with an already hashed password
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        is_superuser: bool,
    ) -> Result<UserRecord> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, is_superuser, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(is_superuser)
        .bind(created_at)
        .execute(self.db.pool())
        .await?;

        info!("Created user {} ({})", username, result.last_insert_rowid());

        Ok(UserRecord {
            id: UserId(result.last_insert_rowid()),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_superuser,
            created_at,
        })
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.get())
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Store the hash of a token already handed to `user`
    pub async fn create_access_token(
        &self,
        user: UserId,
        token_hash: &str,
    ) -> Result<AccessTokenRecord> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO access_tokens (user_id, token_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(user.get())
        .bind(token_hash)
        .bind(created_at)
        .execute(self.db.pool())
        .await?;

        debug!("Stored access token {} for {}", result.last_insert_rowid(), user);

        Ok(AccessTokenRecord {
            id: TokenId(result.last_insert_rowid()),
            user_id: user,
            token_hash: token_hash.to_string(),
            created_at,
        })
    }

    pub async fn find_token_by_hash(&self, token_hash: &str) -> Result<Option<AccessTokenRecord>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    // ---- projects ----

    pub async fn create_project(&self, owner: UserId, project: &NewProject) -> Result<Project> {
        check_length("project name", &project.name, PROJECT_NAME_MAX)?;
        check_length("snippet title", &project.snippet_title, SNIPPET_TITLE_MAX)?;
        let result = sqlx::query(
            r#"
            INSERT INTO projects (user_id, name, description, snippet_title, snippet_image)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner.get())
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.snippet_title)
        .bind(&project.snippet_image)
        .execute(self.db.pool())
        .await?;

        info!("Created project {} for {}", result.last_insert_rowid(), owner);

        Ok(Project {
            id: ProjectId(result.last_insert_rowid()),
            user_id: owner,
            name: project.name.clone(),
            description: project.description.clone(),
            snippet_title: project.snippet_title.clone(),
            snippet_image: project.snippet_image.clone(),
        })
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
            .bind(id.get())
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(project_from_row).collect()
    }

    pub async fn list_projects_for_user(&self, user: UserId) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM projects WHERE user_id = ? ORDER BY id")
            .bind(user.get())
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(project_from_row).collect()
    }

    /// Delete a project together with its whole hierarchy
    pub async fn delete_project(&self, id: ProjectId) -> Result<()> {
        self.delete_batch("projects", "project", &[id.get()], None).await
    }

    /// Load a project with its zones, nodes and sensors
    pub async fn project_tree(&self, id: ProjectId) -> Result<Option<ProjectTree>> {
        let project = match self.get_project(id).await? {
            Some(project) => project,
            None => return Ok(None),
        };

        let mut zones = Vec::new();
        for zone in self.list_zones(id).await? {
            zones.push(self.zone_tree(zone).await?);
        }

        Ok(Some(ProjectTree { project, zones }))
    }

    /// A zone with its nodes and ambiental sensors
    pub async fn zone_tree(&self, zone: Zone) -> Result<ZoneTree> {
        let mut nodes = Vec::new();
        for node in self.list_nodes(zone.id).await? {
            nodes.push(self.node_tree(node).await?);
        }
        let ambiental = self.list_ambiental_sensors(zone.id).await?;
        Ok(ZoneTree {
            zone,
            nodes,
            ambiental,
        })
    }

    pub async fn node_tree(&self, node: Node) -> Result<NodeTree> {
        let sensors = self.list_node_sensors(node.id).await?;
        Ok(NodeTree { node, sensors })
    }

    // ---- zones ----

    pub async fn create_zone(
        &self,
        project: ProjectId,
        zone: &NewGroup,
        granting_token: Option<TokenId>,
    ) -> Result<Zone> {
        let mut created = self
            .create_zones(project, std::slice::from_ref(zone), granting_token)
            .await?;
        created
            .pop()
            .ok_or_else(|| DatabaseError::Other("zone insert returned no row".into()))
    }

    /// Create zones under `project`. When the request runs under a token, the
    /// token is granted control of every new zone.
    pub async fn create_zones(
        &self,
        project: ProjectId,
        zones: &[NewGroup],
        granting_token: Option<TokenId>,
    ) -> Result<Vec<Zone>> {
        for zone in zones {
            check_length("zone name", &zone.name, ZONE_NAME_MAX)?;
        }
        let mut tx = self.db.pool().begin().await?;
        ensure_exists(&mut tx, "projects", project.get(), &project.to_string()).await?;

        let mut created = Vec::with_capacity(zones.len());
        for zone in zones {
            let result =
                sqlx::query("INSERT INTO zones (project_id, name, description) VALUES (?, ?, ?)")
                    .bind(project.get())
                    .bind(&zone.name)
                    .bind(&zone.description)
                    .execute(&mut *tx)
                    .await?;
            let id = ZoneId(result.last_insert_rowid());

            if let Some(token) = granting_token {
                sqlx::query(
                    "INSERT OR IGNORE INTO zone_access_keys (zone_id, token_id) VALUES (?, ?)",
                )
                .bind(id.get())
                .bind(token.get())
                .execute(&mut *tx)
                .await?;
            }

            created.push(Zone {
                id,
                project_id: project,
                name: zone.name.clone(),
                description: zone.description.clone(),
            });
        }
        tx.commit().await?;

        info!("Created {} zone(s) in {}", created.len(), project);
        Ok(created)
    }

    pub async fn get_zone(&self, id: ZoneId) -> Result<Option<Zone>> {
        let row = sqlx::query("SELECT * FROM zones WHERE id = ?")
            .bind(id.get())
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(zone_from_row).transpose()
    }

    pub async fn list_zones(&self, project: ProjectId) -> Result<Vec<Zone>> {
        let rows = sqlx::query("SELECT * FROM zones WHERE project_id = ? ORDER BY id")
            .bind(project.get())
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(zone_from_row).collect()
    }

    /// Update name and description; the parent project never changes
    pub async fn update_zone(&self, id: ZoneId, update: &GroupUpdate) -> Result<Zone> {
        if let Some(name) = &update.name {
            check_length("zone name", name, ZONE_NAME_MAX)?;
        }
        self.update_group("zones", "zone", id.get(), update).await?;
        self.get_zone(id)
            .await?
            .ok_or_else(|| DatabaseError::EntityNotFound(id.to_string()))
    }

    pub async fn delete_zone(&self, id: ZoneId) -> Result<()> {
        self.delete_batch("zones", "zone", &[id.get()], None).await
    }

    /// Delete zones of `project`: every zone or none of them. A zone of
    /// another project fails the batch with a validation error.
    pub async fn delete_project_zones(&self, project: ProjectId, ids: &[ZoneId]) -> Result<()> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let parent = ParentFilter {
            condition: "project_id = ?",
            id: project.get(),
            label: project.to_string(),
        };
        self.delete_batch("zones", "zone", &ids, Some(parent)).await
    }

    // ---- nodes ----

    pub async fn create_node(
        &self,
        zone: ZoneId,
        node: &NewGroup,
        granting_token: Option<TokenId>,
    ) -> Result<Node> {
        let mut created = self
            .create_nodes(zone, std::slice::from_ref(node), granting_token)
            .await?;
        created
            .pop()
            .ok_or_else(|| DatabaseError::Other("node insert returned no row".into()))
    }

    /// Create nodes under `zone`, granting the creating token like zones do
    pub async fn create_nodes(
        &self,
        zone: ZoneId,
        nodes: &[NewGroup],
        granting_token: Option<TokenId>,
    ) -> Result<Vec<Node>> {
        for node in nodes {
            check_length("node name", &node.name, NODE_NAME_MAX)?;
        }
        let mut tx = self.db.pool().begin().await?;
        ensure_exists(&mut tx, "zones", zone.get(), &zone.to_string()).await?;

        let mut created = Vec::with_capacity(nodes.len());
        for node in nodes {
            let result =
                sqlx::query("INSERT INTO nodes (zone_id, name, description) VALUES (?, ?, ?)")
                    .bind(zone.get())
                    .bind(&node.name)
                    .bind(&node.description)
                    .execute(&mut *tx)
                    .await?;
            let id = NodeId(result.last_insert_rowid());

            if let Some(token) = granting_token {
                sqlx::query(
                    "INSERT OR IGNORE INTO node_access_keys (node_id, token_id) VALUES (?, ?)",
                )
                .bind(id.get())
                .bind(token.get())
                .execute(&mut *tx)
                .await?;
            }

            created.push(Node {
                id,
                zone_id: zone,
                name: node.name.clone(),
                description: node.description.clone(),
            });
        }
        tx.commit().await?;

        info!("Created {} node(s) in {}", created.len(), zone);
        Ok(created)
    }

    pub async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        let row = sqlx::query("SELECT * FROM nodes WHERE id = ?")
            .bind(id.get())
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(node_from_row).transpose()
    }

    pub async fn list_nodes(&self, zone: ZoneId) -> Result<Vec<Node>> {
        let rows = sqlx::query("SELECT * FROM nodes WHERE zone_id = ? ORDER BY id")
            .bind(zone.get())
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(node_from_row).collect()
    }

    pub async fn update_node(&self, id: NodeId, update: &GroupUpdate) -> Result<Node> {
        if let Some(name) = &update.name {
            check_length("node name", name, NODE_NAME_MAX)?;
        }
        self.update_group("nodes", "node", id.get(), update).await?;
        self.get_node(id)
            .await?
            .ok_or_else(|| DatabaseError::EntityNotFound(id.to_string()))
    }

    pub async fn delete_node(&self, id: NodeId) -> Result<()> {
        self.delete_batch("nodes", "node", &[id.get()], None).await
    }

    /// Delete nodes of `zone`, all or nothing
    pub async fn delete_zone_nodes(&self, zone: ZoneId, ids: &[NodeId]) -> Result<()> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let parent = ParentFilter {
            condition: "zone_id = ?",
            id: zone.get(),
            label: zone.to_string(),
        };
        self.delete_batch("nodes", "node", &ids, Some(parent)).await
    }

    // ---- sensors ----

    pub async fn create_ambiental_sensor(
        &self,
        zone: ZoneId,
        sensor_type: SensorType,
    ) -> Result<Sensor> {
        let mut created = self.create_ambiental_sensors(zone, &[sensor_type]).await?;
        created
            .pop()
            .ok_or_else(|| DatabaseError::Other("sensor insert returned no row".into()))
    }

    pub async fn create_node_sensor(
        &self,
        node: NodeId,
        sensor_type: SensorType,
    ) -> Result<Sensor> {
        let mut created = self.create_node_sensors(node, &[sensor_type]).await?;
        created
            .pop()
            .ok_or_else(|| DatabaseError::Other("sensor insert returned no row".into()))
    }

    /// Attach sensors directly to a zone
    pub async fn create_ambiental_sensors(
        &self,
        zone: ZoneId,
        sensor_types: &[SensorType],
    ) -> Result<Vec<Sensor>> {
        let mut tx = self.db.pool().begin().await?;
        ensure_exists(&mut tx, "zones", zone.get(), &zone.to_string()).await?;
        let created = insert_sensors(&mut tx, zone, None, sensor_types).await?;
        tx.commit().await?;

        info!("Created {} ambiental sensor(s) in {}", created.len(), zone);
        Ok(created)
    }

    /// Attach sensors to a node. The sensors belong to the node's zone.
    pub async fn create_node_sensors(
        &self,
        node: NodeId,
        sensor_types: &[SensorType],
    ) -> Result<Vec<Sensor>> {
        let mut tx = self.db.pool().begin().await?;
        let zone: Option<(i64,)> = sqlx::query_as("SELECT zone_id FROM nodes WHERE id = ?")
            .bind(node.get())
            .fetch_optional(&mut *tx)
            .await?;
        let zone = match zone {
            Some((zone,)) => ZoneId(zone),
            None => return Err(DatabaseError::EntityNotFound(node.to_string())),
        };
        let created = insert_sensors(&mut tx, zone, Some(node), sensor_types).await?;
        tx.commit().await?;

        info!("Created {} sensor(s) on {}", created.len(), node);
        Ok(created)
    }

    pub async fn get_sensor(&self, id: SensorId) -> Result<Option<Sensor>> {
        let row = sqlx::query("SELECT * FROM sensors WHERE id = ?")
            .bind(id.get())
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(sensor_from_row).transpose()
    }

    pub async fn list_ambiental_sensors(&self, zone: ZoneId) -> Result<Vec<Sensor>> {
        let rows =
            sqlx::query("SELECT * FROM sensors WHERE zone_id = ? AND node_id IS NULL ORDER BY id")
                .bind(zone.get())
                .fetch_all(self.db.pool())
                .await?;
        rows.iter().map(sensor_from_row).collect()
    }

    pub async fn list_node_sensors(&self, node: NodeId) -> Result<Vec<Sensor>> {
        let rows = sqlx::query("SELECT * FROM sensors WHERE node_id = ? ORDER BY id")
            .bind(node.get())
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(sensor_from_row).collect()
    }

    pub async fn delete_sensor(&self, id: SensorId) -> Result<()> {
        self.delete_batch("sensors", "sensor", &[id.get()], None).await
    }

    /// Delete ambiental sensors of `zone`, all or nothing. Node sensors are
    /// not ambiental and fail the batch.
    pub async fn delete_ambiental_sensors(&self, zone: ZoneId, ids: &[SensorId]) -> Result<()> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let parent = ParentFilter {
            condition: "zone_id = ? AND node_id IS NULL",
            id: zone.get(),
            label: format!("ambiental sensors of {}", zone),
        };
        self.delete_batch("sensors", "sensor", &ids, Some(parent)).await
    }

    /// Delete sensors of `node`, all or nothing
    pub async fn delete_node_sensors(&self, node: NodeId, ids: &[SensorId]) -> Result<()> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let parent = ParentFilter {
            condition: "node_id = ?",
            id: node.get(),
            label: node.to_string(),
        };
        self.delete_batch("sensors", "sensor", &ids, Some(parent)).await
    }

    // ---- grants ----

    pub async fn grant_project(&self, token: TokenId, project: ProjectId) -> Result<()> {
        self.grant("project_access_keys", "project_id", token, project.get())
            .await
    }

    pub async fn grant_zone(&self, token: TokenId, zone: ZoneId) -> Result<()> {
        self.grant("zone_access_keys", "zone_id", token, zone.get())
            .await
    }

    pub async fn grant_node(&self, token: TokenId, node: NodeId) -> Result<()> {
        self.grant("node_access_keys", "node_id", token, node.get())
            .await
    }

    async fn grant(&self, table: &str, column: &str, token: TokenId, id: i64) -> Result<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}, token_id) VALUES (?, ?)",
            table, column
        );
        debug!("Executing SQL: {}", sql);
        sqlx::query(&sql)
            .bind(id)
            .bind(token.get())
            .execute(self.db.pool())
            .await?;
        info!("Granted {} on {} {}", token, column, id);
        Ok(())
    }

    async fn update_group(
        &self,
        table: &str,
        label: &str,
        id: i64,
        update: &GroupUpdate,
    ) -> Result<()> {
        if update.is_empty() {
            return match self.exists(table, id).await? {
                true => Ok(()),
                false => Err(DatabaseError::EntityNotFound(format!("{}#{}", label, id))),
            };
        }

        let mut set_clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(name) = &update.name {
            set_clauses.push("name = ?");
            values.push(name);
        }
        if let Some(description) = &update.description {
            set_clauses.push("description = ?");
            values.push(description);
        }

        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, set_clauses.join(", "));
        debug!("Executing SQL: {}", sql);

        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value);
        }
        let result = query.bind(id).execute(self.db.pool()).await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::EntityNotFound(format!("{}#{}", label, id)));
        }

        info!("Updated {}#{}", label, id);
        Ok(())
    }

    async fn exists(&self, table: &str, id: i64) -> Result<bool> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count > 0)
    }

    /// Delete rows in one transaction; a missing id rolls back the whole batch
    async fn delete_batch(
        &self,
        table: &str,
        label: &str,
        ids: &[i64],
        parent: Option<ParentFilter<'_>>,
    ) -> Result<()> {
        let sql = match &parent {
            Some(parent) => format!("DELETE FROM {} WHERE id = ? AND {}", table, parent.condition),
            None => format!("DELETE FROM {} WHERE id = ?", table),
        };
        let mut tx = self.db.pool().begin().await?;

        // Any error drops the transaction, which rolls it back
        for id in ids {
            let what = format!("{}#{}", label, id);
            ensure_exists(&mut tx, table, *id, &what).await?;

            let mut query = sqlx::query(&sql).bind(id);
            if let Some(parent) = &parent {
                query = query.bind(parent.id);
            }
            if query.execute(&mut *tx).await?.rows_affected() == 0 {
                let parent = parent.as_ref().map_or("its parent", |p| p.label.as_str());
                return Err(DatabaseError::Validation(format!(
                    "{} does not belong to {}",
                    what, parent
                )));
            }
        }
        tx.commit().await?;

        info!("Deleted {} {}(s): {:?}", ids.len(), label, ids);
        Ok(())
    }
}

/// Restricts a batch delete to the children of one parent
struct ParentFilter<'f> {
    condition: &'f str,
    id: i64,
    label: String,
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    let length = value.chars().count();
    if length > max {
        return Err(DatabaseError::Validation(format!(
            "{} is {} characters long, at most {} allowed",
            field, length, max
        )));
    }
    Ok(())
}

async fn ensure_exists(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    id: i64,
    label: &str,
) -> Result<()> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);
    let (count,): (i64,) = sqlx::query_as(&sql).bind(id).fetch_one(&mut **tx).await?;
    if count == 0 {
        return Err(DatabaseError::EntityNotFound(label.to_string()));
    }
    Ok(())
}

async fn insert_sensors(
    tx: &mut Transaction<'_, Sqlite>,
    zone: ZoneId,
    node: Option<NodeId>,
    sensor_types: &[SensorType],
) -> Result<Vec<Sensor>> {
    let ambiental = node.is_none();
    let mut created = Vec::with_capacity(sensor_types.len());

    for sensor_type in sensor_types {
        let result = sqlx::query(
            "INSERT INTO sensors (zone_id, node_id, ambiental, sensor_type) VALUES (?, ?, ?, ?)",
        )
        .bind(zone.get())
        .bind(node.map(NodeId::get))
        .bind(ambiental)
        .bind(sensor_type.as_str())
        .execute(&mut **tx)
        .await?;

        created.push(Sensor {
            id: SensorId(result.last_insert_rowid()),
            zone_id: zone,
            node_id: node,
            ambiental,
            sensor_type: *sensor_type,
        });
    }

    Ok(created)
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    Ok(UserRecord {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        is_superuser: row.try_get("is_superuser")?,
        created_at: row.try_get("created_at")?,
    })
}

fn token_from_row(row: &SqliteRow) -> Result<AccessTokenRecord> {
    Ok(AccessTokenRecord {
        id: TokenId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        token_hash: row.try_get("token_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: ProjectId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        snippet_title: row.try_get("snippet_title")?,
        snippet_image: row.try_get("snippet_image")?,
    })
}

fn zone_from_row(row: &SqliteRow) -> Result<Zone> {
    Ok(Zone {
        id: ZoneId(row.try_get("id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn node_from_row(row: &SqliteRow) -> Result<Node> {
    Ok(Node {
        id: NodeId(row.try_get("id")?),
        zone_id: ZoneId(row.try_get("zone_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

fn sensor_from_row(row: &SqliteRow) -> Result<Sensor> {
    let node_id: Option<i64> = row.try_get("node_id")?;
    let sensor_type: String = row.try_get("sensor_type")?;
    Ok(Sensor {
        id: SensorId(row.try_get("id")?),
        zone_id: ZoneId(row.try_get("zone_id")?),
        node_id: node_id.map(NodeId),
        ambiental: row.try_get("ambiental")?,
        sensor_type: sensor_type.parse()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::migrated_db;

    async fn seed_project(storage: &IotStorage<'_>) -> (UserRecord, Project) {
        let user = storage.create_user("owner", "hash", false).await.unwrap();
        let project = storage
            .create_project(
                user.id,
                &NewProject {
                    name: "greenhouse".into(),
                    description: "tomatoes".into(),
                    ..NewProject::default()
                },
            )
            .await
            .unwrap();
        (user, project)
    }

    fn group(name: &str) -> NewGroup {
        NewGroup {
            name: name.into(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_users_and_tokens() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();

        let user = storage.create_user("alice", "phc", true).await.unwrap();
        let found = storage.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(found.is_superuser);
        assert!(storage.get_user(UserId(999)).await.unwrap().is_none());

        let token = storage.create_access_token(user.id, "abc123").await.unwrap();
        let found = storage.find_token_by_hash("abc123").await.unwrap().unwrap();
        assert_eq!(found.id, token.id);
        assert_eq!(found.user_id, user.id);
        assert!(storage.find_token_by_hash("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        storage.create_user("bob", "x", false).await.unwrap();
        assert!(storage.create_user("bob", "y", false).await.is_err());
    }

    #[tokio::test]
    async fn test_zone_crud() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (_, project) = seed_project(&storage).await;

        let zones = storage
            .create_zones(project.id, &[group("north"), group("south")], None)
            .await
            .unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(storage.list_zones(project.id).await.unwrap().len(), 2);

        let updated = storage
            .update_zone(
                zones[0].id,
                &GroupUpdate {
                    name: Some("north-east".into()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "north-east");
        assert_eq!(updated.project_id, project.id);

        storage.delete_zone(zones[1].id).await.unwrap();
        assert!(storage.get_zone(zones[1].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_zone_in_missing_project() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let err = storage
            .create_zones(ProjectId(42), &[group("ghost")], None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_missing_zone() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let err = storage
            .update_zone(ZoneId(7), &GroupUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_name_length_limits() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (user, project) = seed_project(&storage).await;

        let long_project = NewProject {
            name: "p".repeat(PROJECT_NAME_MAX + 1),
            ..NewProject::default()
        };
        assert!(matches!(
            storage.create_project(user.id, &long_project).await,
            Err(DatabaseError::Validation(_))
        ));

        // The limit counts characters, not bytes
        let zone = storage
            .create_zone(project.id, &group(&"é".repeat(ZONE_NAME_MAX)), None)
            .await
            .unwrap();
        let too_long = [group("ok"), group(&"z".repeat(ZONE_NAME_MAX + 1))];
        assert!(matches!(
            storage.create_zones(project.id, &too_long, None).await,
            Err(DatabaseError::Validation(_))
        ));
        assert_eq!(storage.list_zones(project.id).await.unwrap().len(), 1);

        let rename = GroupUpdate {
            name: Some("z".repeat(ZONE_NAME_MAX + 1)),
            description: None,
        };
        assert!(matches!(
            storage.update_zone(zone.id, &rename).await,
            Err(DatabaseError::Validation(_))
        ));

        let long_node = group(&"n".repeat(NODE_NAME_MAX + 1));
        assert!(matches!(
            storage.create_node(zone.id, &long_node, None).await,
            Err(DatabaseError::Validation(_))
        ));
        let node = storage
            .create_node(zone.id, &group(&"n".repeat(NODE_NAME_MAX)), None)
            .await
            .unwrap();
        let rename = GroupUpdate {
            name: Some("n".repeat(NODE_NAME_MAX + 1)),
            description: None,
        };
        assert!(matches!(
            storage.update_node(node.id, &rename).await,
            Err(DatabaseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_projects_for_user() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (owner, project) = seed_project(&storage).await;
        let other = storage.create_user("other", "hash", false).await.unwrap();
        storage
            .create_project(other.id, &NewProject::default())
            .await
            .unwrap();

        let owned = storage.list_projects_for_user(owner.id).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, project.id);
        assert_eq!(storage.list_projects().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_delete_is_atomic() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (_, project) = seed_project(&storage).await;
        let zones = storage
            .create_zones(project.id, &[group("a"), group("b")], None)
            .await
            .unwrap();

        let err = storage
            .delete_project_zones(project.id, &[zones[0].id, ZoneId(999), zones[1].id])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(storage.list_zones(project.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_delete_rejects_children_of_other_parents() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (user, project) = seed_project(&storage).await;
        let second = storage
            .create_project(user.id, &NewProject::default())
            .await
            .unwrap();
        let zone = storage.create_zone(project.id, &group("a"), None).await.unwrap();
        let foreign_zone = storage.create_zone(second.id, &group("b"), None).await.unwrap();

        let err = storage
            .delete_project_zones(project.id, &[zone.id, foreign_zone.id])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
        assert!(storage.get_zone(zone.id).await.unwrap().is_some());
        assert!(storage.get_zone(foreign_zone.id).await.unwrap().is_some());

        let node = storage.create_node(zone.id, &group("n"), None).await.unwrap();
        let foreign_node = storage
            .create_node(foreign_zone.id, &group("m"), None)
            .await
            .unwrap();
        assert!(matches!(
            storage.delete_zone_nodes(zone.id, &[foreign_node.id]).await,
            Err(DatabaseError::Validation(_))
        ));

        let ambiental = storage
            .create_ambiental_sensor(zone.id, SensorType::Ldr)
            .await
            .unwrap();
        let on_node = storage
            .create_node_sensor(node.id, SensorType::Dht11)
            .await
            .unwrap();
        // A node sensor sits in the zone but is not ambiental
        assert!(matches!(
            storage.delete_ambiental_sensors(zone.id, &[ambiental.id, on_node.id]).await,
            Err(DatabaseError::Validation(_))
        ));
        assert!(matches!(
            storage.delete_node_sensors(node.id, &[ambiental.id]).await,
            Err(DatabaseError::Validation(_))
        ));
        assert!(storage.get_sensor(ambiental.id).await.unwrap().is_some());

        storage.delete_ambiental_sensors(zone.id, &[ambiental.id]).await.unwrap();
        storage.delete_node_sensors(node.id, &[on_node.id]).await.unwrap();
        storage.delete_zone_nodes(zone.id, &[node.id]).await.unwrap();
        storage.delete_project_zones(project.id, &[zone.id]).await.unwrap();
        assert!(storage.list_zones(project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_node_sensors_take_zone_from_node() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (_, project) = seed_project(&storage).await;
        let zone = storage
            .create_zones(project.id, &[group("z")], None)
            .await
            .unwrap()
            .remove(0);
        let node = storage
            .create_nodes(zone.id, &[group("n")], None)
            .await
            .unwrap()
            .remove(0);

        let sensors = storage
            .create_node_sensors(node.id, &[SensorType::Dht22, SensorType::Sm150])
            .await
            .unwrap();
        assert!(sensors.iter().all(|s| s.zone_id == zone.id && !s.ambiental));

        let ambiental = storage
            .create_ambiental_sensors(zone.id, &[SensorType::Ldr])
            .await
            .unwrap();
        assert!(ambiental[0].ambiental);
        assert!(ambiental[0].node_id.is_none());

        assert_eq!(storage.list_node_sensors(node.id).await.unwrap().len(), 2);
        assert_eq!(storage.list_ambiental_sensors(zone.id).await.unwrap().len(), 1);

        let err = storage
            .create_node_sensors(NodeId(500), &[SensorType::Cms])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_project_delete_cascades() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (_, project) = seed_project(&storage).await;
        let zone = storage
            .create_zones(project.id, &[group("z")], None)
            .await
            .unwrap()
            .remove(0);
        let node = storage
            .create_nodes(zone.id, &[group("n")], None)
            .await
            .unwrap()
            .remove(0);
        let sensor = storage
            .create_node_sensors(node.id, &[SensorType::Bme280])
            .await
            .unwrap()
            .remove(0);

        storage.delete_project(project.id).await.unwrap();

        assert!(storage.get_zone(zone.id).await.unwrap().is_none());
        assert!(storage.get_node(node.id).await.unwrap().is_none());
        assert!(storage.get_sensor(sensor.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_node_delete_cascades_to_its_sensors_only() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (_, project) = seed_project(&storage).await;
        let zone = storage
            .create_zones(project.id, &[group("z")], None)
            .await
            .unwrap()
            .remove(0);
        let node = storage
            .create_nodes(zone.id, &[group("n")], None)
            .await
            .unwrap()
            .remove(0);
        let on_node = storage
            .create_node_sensors(node.id, &[SensorType::Dht11])
            .await
            .unwrap()
            .remove(0);
        let ambiental = storage
            .create_ambiental_sensors(zone.id, &[SensorType::Ldr])
            .await
            .unwrap()
            .remove(0);

        storage.delete_node(node.id).await.unwrap();

        assert!(storage.get_sensor(on_node.id).await.unwrap().is_none());
        assert!(storage.get_sensor(ambiental.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_project_tree() {
        let (_dir, db) = migrated_db().await;
        let storage = db.storage();
        let (_, project) = seed_project(&storage).await;
        let zone = storage
            .create_zones(project.id, &[group("z")], None)
            .await
            .unwrap()
            .remove(0);
        let node = storage
            .create_nodes(zone.id, &[group("n")], None)
            .await
            .unwrap()
            .remove(0);
        storage
            .create_node_sensors(node.id, &[SensorType::Dht11])
            .await
            .unwrap();
        storage
            .create_ambiental_sensors(zone.id, &[SensorType::Ldr, SensorType::Cms])
            .await
            .unwrap();

        let tree = storage.project_tree(project.id).await.unwrap().unwrap();
        assert_eq!(tree.zones.len(), 1);
        assert_eq!(tree.zones[0].nodes.len(), 1);
        assert_eq!(tree.zones[0].nodes[0].sensors.len(), 1);
        assert_eq!(tree.zones[0].ambiental.len(), 2);

        assert!(storage.project_tree(ProjectId(77)).await.unwrap().is_none());
    }
}
