use authz::{EntityKind, NodeId, SensorId, Target};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use database::{GroupUpdate, SensorType};
use tracing::info;

use crate::{
    auth::Caller,
    error::{ApiErrorResponse, ApiResult},
    handlers::{found, non_empty},
    models::{
        status_line, CreateSensorsRequest, DeleteResponse, DeleteSensorsRequest, NodeResponse,
        SensorResponse, SensorsResponse, UpdateNodeRequest,
    },
    AppState,
};

async fn authorize_node(state: &AppState, caller: &Caller, id: NodeId) -> ApiResult<()> {
    caller
        .authorize(state, |scope| scope.require(EntityKind::Node, &Target::Node(id)))
        .await
}

/// Node details with its sensors
///
/// GET /api/v1/iot/node/{id}
#[utoipa::path(
    get,
    path = "/api/v1/iot/node/{id}",
    params(("id" = i64, Path, description = "Node id")),
    responses(
        (status = 200, description = "Node with its sensors", body = NodeResponse),
        (status = 403, description = "Node not owned", body = ApiErrorResponse),
        (status = 404, description = "Unknown node", body = ApiErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = NodeId(id);
    let storage = state.db.storage();
    let node = found(storage.get_node(id).await?, id)?;
    authorize_node(&state, &caller, id).await?;

    Ok(Json(NodeResponse::from(storage.node_tree(node).await?)))
}

/// Rename or describe a node
///
/// PUT /api/v1/iot/node/{id}
#[utoipa::path(
    put,
    path = "/api/v1/iot/node/{id}",
    params(("id" = i64, Path, description = "Node id")),
    request_body = UpdateNodeRequest,
    responses(
        (status = 200, description = "Node updated", body = NodeResponse),
        (status = 403, description = "Node not owned", body = ApiErrorResponse),
        (status = 404, description = "Unknown node", body = ApiErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<UpdateNodeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = NodeId(id);
    let Json(request) = payload?;
    let storage = state.db.storage();
    found(storage.get_node(id).await?, id)?;
    authorize_node(&state, &caller, id).await?;

    let update = GroupUpdate {
        name: request.node.name,
        description: request.node.description,
    };
    let node = storage.update_node(id, &update).await?;

    info!("Node {} updated by {}", id, caller.credential);
    Ok(Json(NodeResponse::from(storage.node_tree(node).await?)))
}

/// Delete a node with its sensors
///
/// DELETE /api/v1/iot/node/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/iot/node/{id}",
    params(("id" = i64, Path, description = "Node id")),
    responses(
        (status = 200, description = "Node deleted", body = DeleteResponse),
        (status = 403, description = "Node not owned", body = ApiErrorResponse),
        (status = 404, description = "Unknown node", body = ApiErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = NodeId(id);
    let storage = state.db.storage();
    found(storage.get_node(id).await?, id)?;
    authorize_node(&state, &caller, id).await?;

    storage.delete_node(id).await?;

    Ok(Json(DeleteResponse {
        status: "Node deletion successful".to_string(),
        deleted: vec![id.get()],
    }))
}

/// Sensors attached to a node
///
/// GET /api/v1/iot/node/{id}/sensors
#[utoipa::path(
    get,
    path = "/api/v1/iot/node/{id}/sensors",
    params(("id" = i64, Path, description = "Node id")),
    responses(
        (status = 200, description = "Sensors of the node", body = SensorsResponse),
        (status = 403, description = "Node not owned", body = ApiErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn list_node_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = NodeId(id);
    let storage = state.db.storage();
    found(storage.get_node(id).await?, id)?;
    authorize_node(&state, &caller, id).await?;

    let sensors = storage.list_node_sensors(id).await?;
    Ok(Json(SensorsResponse {
        status: "Search successful".to_string(),
        sensors: sensors.into_iter().map(SensorResponse::from).collect(),
    }))
}

/// Attach sensors to a node
///
/// POST /api/v1/iot/node/{id}/sensors
#[utoipa::path(
    post,
    path = "/api/v1/iot/node/{id}/sensors",
    params(("id" = i64, Path, description = "Node id")),
    request_body = CreateSensorsRequest,
    responses(
        (status = 201, description = "Sensors created", body = SensorsResponse),
        (status = 400, description = "Unknown sensor type", body = ApiErrorResponse),
        (status = 403, description = "Node not owned", body = ApiErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn create_node_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<CreateSensorsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = NodeId(id);
    let Json(request) = payload?;
    non_empty(&request.sensors, "sensors")?;
    let sensor_types = request
        .sensors
        .iter()
        .map(|sensor| sensor.sensor_type.parse::<SensorType>())
        .collect::<Result<Vec<_>, _>>()?;

    let storage = state.db.storage();
    found(storage.get_node(id).await?, id)?;
    authorize_node(&state, &caller, id).await?;

    let sensors = storage.create_node_sensors(id, &sensor_types).await?;

    Ok((
        StatusCode::CREATED,
        Json(SensorsResponse {
            status: status_line("Created", "sensor", sensors.len()),
            sensors: sensors.into_iter().map(SensorResponse::from).collect(),
        }),
    ))
}

/// Delete sensors of a node; every sensor must pass or none is deleted
///
/// DELETE /api/v1/iot/node/{id}/sensors
#[utoipa::path(
    delete,
    path = "/api/v1/iot/node/{id}/sensors",
    params(("id" = i64, Path, description = "Node id")),
    request_body = DeleteSensorsRequest,
    responses(
        (status = 200, description = "Sensors deleted", body = DeleteResponse),
        (status = 403, description = "A sensor is not owned", body = ApiErrorResponse),
        (status = 400, description = "A listed item belongs to another parent", body = ApiErrorResponse)
    ),
    tag = "nodes"
)]
pub async fn delete_node_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<DeleteSensorsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = NodeId(id);
    let Json(request) = payload?;
    non_empty(&request.sensors, "sensors")?;

    let sensors: Vec<SensorId> = request
        .sensors
        .iter()
        .map(|sensor| SensorId(sensor.id_sensor))
        .collect();
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Node, &Target::Node(id))?;
            scope.require_all(EntityKind::Sensor, sensors.iter().copied().map(Target::Sensor))
        })
        .await?;

    state.db.storage().delete_node_sensors(id, &sensors).await?;

    Ok(Json(DeleteResponse {
        status: status_line("Deleted", "sensor", sensors.len()),
        deleted: sensors.iter().map(|sensor| sensor.get()).collect(),
    }))
}
