use chrono::{DateTime, Utc};
use database::{
    Measurement, MeasurementPoint, MeasurementSeries, Node, NodeTree, Project, ProjectTree, Sensor,
    ZoneTree,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A project with its zones
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub snippet_title: String,
    pub snippet_image: String,
    pub zones: Vec<ZoneResponse>,
}

impl From<ProjectTree> for ProjectResponse {
    fn from(tree: ProjectTree) -> Self {
        let Project {
            id,
            name,
            description,
            snippet_title,
            snippet_image,
            ..
        } = tree.project;
        Self {
            id: id.get(),
            name,
            description,
            snippet_title,
            snippet_image,
            zones: tree.zones.into_iter().map(ZoneResponse::from).collect(),
        }
    }
}

/// A zone with its nodes and ambiental sensors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ZoneResponse {
    pub id: i64,
    pub id_project: i64,
    pub name: String,
    pub description: String,
    pub nodes: Vec<NodeResponse>,
    pub ambiental: Vec<SensorResponse>,
}

impl From<ZoneTree> for ZoneResponse {
    fn from(tree: ZoneTree) -> Self {
        Self {
            id: tree.zone.id.get(),
            id_project: tree.zone.project_id.get(),
            name: tree.zone.name,
            description: tree.zone.description,
            nodes: tree.nodes.into_iter().map(NodeResponse::from).collect(),
            ambiental: tree.ambiental.into_iter().map(SensorResponse::from).collect(),
        }
    }
}

/// A node with its sensors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NodeResponse {
    pub id: i64,
    pub id_zone: i64,
    pub name: String,
    pub description: String,
    pub sensors: Vec<SensorResponse>,
}

impl From<NodeTree> for NodeResponse {
    fn from(tree: NodeTree) -> Self {
        let Node {
            id,
            zone_id,
            name,
            description,
        } = tree.node;
        Self {
            id: id.get(),
            id_zone: zone_id.get(),
            name,
            description,
            sensors: tree.sensors.into_iter().map(SensorResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorResponse {
    pub id: i64,
    pub id_zone: i64,
    pub id_node: Option<i64>,
    pub ambiental: bool,
    pub sensor_type: String,
    pub label: String,
}

impl From<Sensor> for SensorResponse {
    fn from(sensor: Sensor) -> Self {
        Self {
            id: sensor.id.get(),
            id_zone: sensor.zone_id.get(),
            id_node: sensor.node_id.map(|node| node.get()),
            ambiental: sensor.ambiental,
            sensor_type: sensor.sensor_type.as_str().to_string(),
            label: sensor.sensor_type.label().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeasurementResponse {
    pub id: i64,
    pub id_sensor: i64,
    pub measurement_type: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Measurement> for MeasurementResponse {
    fn from(measurement: Measurement) -> Self {
        Self {
            id: measurement.id,
            id_sensor: measurement.sensor_id.get(),
            measurement_type: measurement.measurement_type.as_str().to_string(),
            value: measurement.value,
            created_at: measurement.created_at,
        }
    }
}

/// Readings of one measurement kind
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SeriesResponse {
    pub measurement_type: String,
    pub label: String,
    pub points: Vec<PointResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PointResponse {
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

impl From<MeasurementSeries> for SeriesResponse {
    fn from(series: MeasurementSeries) -> Self {
        Self {
            measurement_type: series.measurement_type.as_str().to_string(),
            label: series.label,
            points: series
                .points
                .into_iter()
                .map(|MeasurementPoint { value, created_at }| PointResponse { value, created_at })
                .collect(),
        }
    }
}

// ---- response envelopes ----

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectsResponse {
    pub status: String,
    pub projects: Vec<ProjectResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ZonesResponse {
    pub status: String,
    pub zones: Vec<ZoneResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NodesResponse {
    pub status: String,
    pub nodes: Vec<NodeResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorsResponse {
    pub status: String,
    pub sensors: Vec<SensorResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeasurementsResponse {
    pub status: String,
    pub measurements: Vec<MeasurementResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorSeriesResponse {
    pub status: String,
    pub id_sensor: i64,
    pub series: Vec<SeriesResponse>,
}

/// Sensor ids reachable by the caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorIdsResponse {
    pub status: String,
    pub sensors: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub status: String,
    pub deleted: Vec<i64>,
}

// ---- requests ----

/// Name and description of a zone or node to create
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateZonesRequest {
    pub zones: Vec<GroupRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateNodesRequest {
    pub nodes: Vec<GroupRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorRequest {
    pub sensor_type: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSensorsRequest {
    pub sensors: Vec<SensorRequest>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct GroupUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateZoneRequest {
    pub zone: GroupUpdateRequest,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateNodeRequest {
    pub node: GroupUpdateRequest,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ZoneRef {
    pub id_zone: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NodeRef {
    pub id_node: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorRef {
    pub id_sensor: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteZonesRequest {
    pub zones: Vec<ZoneRef>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteNodesRequest {
    pub nodes: Vec<NodeRef>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteSensorsRequest {
    pub sensors: Vec<SensorRef>,
}

/// One reading submitted by a device
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeasurementRequest {
    pub id_sensor: i64,
    pub measurement_type: String,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeasureRequest {
    pub sensors: Vec<MeasurementRequest>,
}

// ---- health ----

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub message: String,
}

/// Pluralized status line, e.g. "Created zones"
pub fn status_line(verb: &str, noun: &str, count: usize) -> String {
    if count == 1 {
        format!("{} {}", verb, noun)
    } else {
        format!("{} {}s", verb, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::{NodeId, SensorId, ZoneId};
    use database::SensorType;

    #[test]
    fn test_status_line() {
        assert_eq!(status_line("Created", "zone", 1), "Created zone");
        assert_eq!(status_line("Created", "zone", 3), "Created zones");
        assert_eq!(status_line("Deleted", "sensor", 0), "Deleted sensors");
    }

    #[test]
    fn test_sensor_response_carries_label() {
        let response = SensorResponse::from(Sensor {
            id: SensorId(5),
            zone_id: ZoneId(2),
            node_id: Some(NodeId(3)),
            ambiental: false,
            sensor_type: SensorType::Sm150,
        });
        assert_eq!(response.id_node, Some(3));
        assert_eq!(response.sensor_type, "SM150");
        assert_eq!(response.label, "Moisture sensor");
    }

    #[test]
    fn test_group_request_description_defaults() {
        let request: CreateZonesRequest =
            serde_json::from_str(r#"{"zones":[{"name":"north"}]}"#).unwrap();
        assert_eq!(request.zones[0].description, "");
    }
}
