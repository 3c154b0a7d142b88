use authz::{EntityKind, NodeId, SensorId, Target, ZoneId};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use database::{GroupUpdate, NewGroup, SensorType};
use tracing::info;

use crate::{
    auth::Caller,
    error::{ApiErrorResponse, ApiResult},
    handlers::{found, non_empty},
    models::{
        status_line, CreateNodesRequest, CreateSensorsRequest, DeleteNodesRequest, DeleteResponse,
        DeleteSensorsRequest, NodeResponse, NodesResponse, SensorResponse, SensorsResponse,
        UpdateZoneRequest, ZoneResponse,
    },
    AppState,
};

async fn authorize_zone(state: &AppState, caller: &Caller, id: ZoneId) -> ApiResult<()> {
    caller
        .authorize(state, |scope| scope.require(EntityKind::Zone, &Target::Zone(id)))
        .await
}

/// Zone details with nodes and ambiental sensors
///
/// GET /api/v1/iot/zone/{id}
#[utoipa::path(
    get,
    path = "/api/v1/iot/zone/{id}",
    params(("id" = i64, Path, description = "Zone id")),
    responses(
        (status = 200, description = "Zone with its hierarchy", body = ZoneResponse),
        (status = 403, description = "Zone not owned", body = ApiErrorResponse),
        (status = 404, description = "Unknown zone", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn get_zone(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let storage = state.db.storage();
    let zone = found(storage.get_zone(id).await?, id)?;
    authorize_zone(&state, &caller, id).await?;

    Ok(Json(ZoneResponse::from(storage.zone_tree(zone).await?)))
}

/// Rename or describe a zone
///
/// PUT /api/v1/iot/zone/{id}
#[utoipa::path(
    put,
    path = "/api/v1/iot/zone/{id}",
    params(("id" = i64, Path, description = "Zone id")),
    request_body = UpdateZoneRequest,
    responses(
        (status = 200, description = "Zone updated", body = ZoneResponse),
        (status = 403, description = "Zone not owned", body = ApiErrorResponse),
        (status = 404, description = "Unknown zone", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn update_zone(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<UpdateZoneRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let Json(request) = payload?;
    let storage = state.db.storage();
    found(storage.get_zone(id).await?, id)?;
    authorize_zone(&state, &caller, id).await?;

    let update = GroupUpdate {
        name: request.zone.name,
        description: request.zone.description,
    };
    let zone = storage.update_zone(id, &update).await?;

    info!("Zone {} updated by {}", id, caller.credential);
    Ok(Json(ZoneResponse::from(storage.zone_tree(zone).await?)))
}

/// Delete a zone with everything below it
///
/// DELETE /api/v1/iot/zone/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/iot/zone/{id}",
    params(("id" = i64, Path, description = "Zone id")),
    responses(
        (status = 200, description = "Zone deleted", body = DeleteResponse),
        (status = 403, description = "Zone not owned", body = ApiErrorResponse),
        (status = 404, description = "Unknown zone", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn delete_zone(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let storage = state.db.storage();
    found(storage.get_zone(id).await?, id)?;
    authorize_zone(&state, &caller, id).await?;

    storage.delete_zone(id).await?;

    Ok(Json(DeleteResponse {
        status: "Zone deletion successful".to_string(),
        deleted: vec![id.get()],
    }))
}

/// Nodes of a zone
///
/// GET /api/v1/iot/zone/{id}/nodes
#[utoipa::path(
    get,
    path = "/api/v1/iot/zone/{id}/nodes",
    params(("id" = i64, Path, description = "Zone id")),
    responses(
        (status = 200, description = "Nodes of the zone", body = NodesResponse),
        (status = 403, description = "Zone not owned", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn list_zone_nodes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let storage = state.db.storage();
    found(storage.get_zone(id).await?, id)?;
    authorize_zone(&state, &caller, id).await?;

    let mut nodes = Vec::new();
    for node in storage.list_nodes(id).await? {
        nodes.push(NodeResponse::from(storage.node_tree(node).await?));
    }

    Ok(Json(NodesResponse {
        status: "Search successful".to_string(),
        nodes,
    }))
}

/// Add nodes to a zone. A token caller is granted every new node.
///
/// POST /api/v1/iot/zone/{id}/nodes
#[utoipa::path(
    post,
    path = "/api/v1/iot/zone/{id}/nodes",
    params(("id" = i64, Path, description = "Zone id")),
    request_body = CreateNodesRequest,
    responses(
        (status = 201, description = "Nodes created", body = NodesResponse),
        (status = 403, description = "Zone not owned", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn create_zone_nodes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<CreateNodesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let Json(request) = payload?;
    non_empty(&request.nodes, "nodes")?;

    let storage = state.db.storage();
    found(storage.get_zone(id).await?, id)?;
    authorize_zone(&state, &caller, id).await?;

    let groups: Vec<NewGroup> = request
        .nodes
        .into_iter()
        .map(|node| NewGroup {
            name: node.name,
            description: node.description,
        })
        .collect();
    let created = storage
        .create_nodes(id, &groups, caller.credential.active_token())
        .await?;

    let nodes: Vec<NodeResponse> = created
        .into_iter()
        .map(|node| {
            NodeResponse::from(database::NodeTree {
                node,
                sensors: Vec::new(),
            })
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(NodesResponse {
            status: status_line("Created", "node", nodes.len()),
            nodes,
        }),
    ))
}

/// Delete nodes of a zone; every node must pass or none is deleted
///
/// DELETE /api/v1/iot/zone/{id}/nodes
#[utoipa::path(
    delete,
    path = "/api/v1/iot/zone/{id}/nodes",
    params(("id" = i64, Path, description = "Zone id")),
    request_body = DeleteNodesRequest,
    responses(
        (status = 200, description = "Nodes deleted", body = DeleteResponse),
        (status = 403, description = "A node is not owned", body = ApiErrorResponse),
        (status = 400, description = "A listed item belongs to another parent", body = ApiErrorResponse),
        (status = 404, description = "A node does not exist", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn delete_zone_nodes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<DeleteNodesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let Json(request) = payload?;
    non_empty(&request.nodes, "nodes")?;

    let nodes: Vec<NodeId> = request.nodes.iter().map(|node| NodeId(node.id_node)).collect();
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Zone, &Target::Zone(id))?;
            scope.require_all(EntityKind::Node, nodes.iter().copied().map(Target::Node))
        })
        .await?;

    state.db.storage().delete_zone_nodes(id, &nodes).await?;

    Ok(Json(DeleteResponse {
        status: status_line("Deleted", "node", nodes.len()),
        deleted: nodes.iter().map(|node| node.get()).collect(),
    }))
}

/// Ambiental sensors of a zone
///
/// GET /api/v1/iot/zone/{id}/sensors
#[utoipa::path(
    get,
    path = "/api/v1/iot/zone/{id}/sensors",
    params(("id" = i64, Path, description = "Zone id")),
    responses(
        (status = 200, description = "Ambiental sensors", body = SensorsResponse),
        (status = 403, description = "Zone not owned", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn list_zone_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let storage = state.db.storage();
    found(storage.get_zone(id).await?, id)?;
    authorize_zone(&state, &caller, id).await?;

    let sensors = storage.list_ambiental_sensors(id).await?;
    Ok(Json(SensorsResponse {
        status: "Search successful".to_string(),
        sensors: sensors.into_iter().map(SensorResponse::from).collect(),
    }))
}

/// Attach ambiental sensors to a zone
///
/// POST /api/v1/iot/zone/{id}/sensors
#[utoipa::path(
    post,
    path = "/api/v1/iot/zone/{id}/sensors",
    params(("id" = i64, Path, description = "Zone id")),
    request_body = CreateSensorsRequest,
    responses(
        (status = 201, description = "Sensors created", body = SensorsResponse),
        (status = 400, description = "Unknown sensor type", body = ApiErrorResponse),
        (status = 403, description = "Zone not owned", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn create_zone_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<CreateSensorsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let Json(request) = payload?;
    non_empty(&request.sensors, "sensors")?;
    let sensor_types = request
        .sensors
        .iter()
        .map(|sensor| sensor.sensor_type.parse::<SensorType>())
        .collect::<Result<Vec<_>, _>>()?;

    let storage = state.db.storage();
    found(storage.get_zone(id).await?, id)?;
    authorize_zone(&state, &caller, id).await?;

    let sensors = storage.create_ambiental_sensors(id, &sensor_types).await?;

    Ok((
        StatusCode::CREATED,
        Json(SensorsResponse {
            status: status_line("Created", "sensor", sensors.len()),
            sensors: sensors.into_iter().map(SensorResponse::from).collect(),
        }),
    ))
}

/// Delete sensors of a zone; every sensor must pass or none is deleted
///
/// DELETE /api/v1/iot/zone/{id}/sensors
#[utoipa::path(
    delete,
    path = "/api/v1/iot/zone/{id}/sensors",
    params(("id" = i64, Path, description = "Zone id")),
    request_body = DeleteSensorsRequest,
    responses(
        (status = 200, description = "Sensors deleted", body = DeleteResponse),
        (status = 403, description = "A sensor is not owned", body = ApiErrorResponse),
        (status = 400, description = "A listed item belongs to another parent", body = ApiErrorResponse)
    ),
    tag = "zones"
)]
pub async fn delete_zone_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<DeleteSensorsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = ZoneId(id);
    let Json(request) = payload?;
    non_empty(&request.sensors, "sensors")?;

    let sensors: Vec<SensorId> = request
        .sensors
        .iter()
        .map(|sensor| SensorId(sensor.id_sensor))
        .collect();
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Zone, &Target::Zone(id))?;
            // A zone check on a sensor delegates to the sensor check
            scope.require_all(EntityKind::Zone, sensors.iter().copied().map(Target::Sensor))
        })
        .await?;

    state.db.storage().delete_ambiental_sensors(id, &sensors).await?;

    Ok(Json(DeleteResponse {
        status: status_line("Deleted", "sensor", sensors.len()),
        deleted: sensors.iter().map(|sensor| sensor.get()).collect(),
    }))
}
