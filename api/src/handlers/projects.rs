use authz::{EntityKind, ProjectId, Target, ZoneId};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use database::NewGroup;
use tracing::info;

use crate::{
    auth::Caller,
    error::{ApiErrorResponse, ApiResult},
    handlers::{found, non_empty},
    models::{
        status_line, CreateZonesRequest, DeleteResponse, DeleteZonesRequest, ProjectResponse,
        ProjectsResponse, SensorIdsResponse, ZoneResponse, ZonesResponse,
    },
    AppState,
};

/// Projects reachable by the caller, with their full hierarchy
///
/// GET /api/v1/iot/projects
#[utoipa::path(
    get,
    path = "/api/v1/iot/projects",
    responses(
        (status = 200, description = "Projects of the caller", body = ProjectsResponse),
        (status = 401, description = "Not authenticated", body = ApiErrorResponse)
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    // None lists everything
    let visible: Option<Vec<ProjectId>> = caller
        .authorize(&state, |scope| {
            Ok(if scope.credential().bypasses_checks() {
                None
            } else {
                Some(scope.owned().projects.iter().copied().collect())
            })
        })
        .await?;

    let storage = state.db.storage();
    let ids = match visible {
        Some(ids) => ids,
        None => storage
            .list_projects()
            .await?
            .into_iter()
            .map(|project| project.id)
            .collect(),
    };

    let mut projects = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(tree) = storage.project_tree(id).await? {
            projects.push(ProjectResponse::from(tree));
        }
    }

    info!("Listed {} project(s) for {}", projects.len(), caller.credential);
    Ok(Json(ProjectsResponse {
        status: "Information shown".to_string(),
        projects,
    }))
}

/// Project details
///
/// GET /api/v1/iot/project/{id}
#[utoipa::path(
    get,
    path = "/api/v1/iot/project/{id}",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project with its hierarchy", body = ProjectResponse),
        (status = 403, description = "Not an owner", body = ApiErrorResponse),
        (status = 404, description = "Unknown project", body = ApiErrorResponse)
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = ProjectId(id);
    let tree = found(state.db.storage().project_tree(id).await?, id)?;
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Project, &Target::Project(id))
        })
        .await?;

    Ok(Json(ProjectResponse::from(tree)))
}

/// Zones of a project
///
/// GET /api/v1/iot/project/{id}/zones
#[utoipa::path(
    get,
    path = "/api/v1/iot/project/{id}/zones",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Zones of the project", body = ZonesResponse),
        (status = 403, description = "Not an owner", body = ApiErrorResponse),
        (status = 404, description = "Unknown project", body = ApiErrorResponse)
    ),
    tag = "projects"
)]
pub async fn list_project_zones(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = ProjectId(id);
    let storage = state.db.storage();
    found(storage.get_project(id).await?, id)?;
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Project, &Target::Project(id))
        })
        .await?;

    let mut zones = Vec::new();
    for zone in storage.list_zones(id).await? {
        zones.push(ZoneResponse::from(storage.zone_tree(zone).await?));
    }

    Ok(Json(ZonesResponse {
        status: "Search successful".to_string(),
        zones,
    }))
}

/// Add zones to a project. A token caller is granted every new zone.
///
/// POST /api/v1/iot/project/{id}/zones
#[utoipa::path(
    post,
    path = "/api/v1/iot/project/{id}/zones",
    params(("id" = i64, Path, description = "Project id")),
    request_body = CreateZonesRequest,
    responses(
        (status = 201, description = "Zones created", body = ZonesResponse),
        (status = 400, description = "Malformed body", body = ApiErrorResponse),
        (status = 403, description = "Not an owner", body = ApiErrorResponse)
    ),
    tag = "projects"
)]
pub async fn create_project_zones(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<CreateZonesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = ProjectId(id);
    let Json(request) = payload?;
    non_empty(&request.zones, "zones")?;

    let storage = state.db.storage();
    found(storage.get_project(id).await?, id)?;
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Project, &Target::Project(id))
        })
        .await?;

    let groups: Vec<NewGroup> = request
        .zones
        .into_iter()
        .map(|zone| NewGroup {
            name: zone.name,
            description: zone.description,
        })
        .collect();
    let created = storage
        .create_zones(id, &groups, caller.credential.active_token())
        .await?;

    let mut zones = Vec::with_capacity(created.len());
    for zone in created {
        zones.push(ZoneResponse::from(storage.zone_tree(zone).await?));
    }

    Ok((
        StatusCode::CREATED,
        Json(ZonesResponse {
            status: status_line("Created", "zone", zones.len()),
            zones,
        }),
    ))
}

/// Delete zones of a project; every zone must pass or none is deleted
///
/// DELETE /api/v1/iot/project/{id}/zones
#[utoipa::path(
    delete,
    path = "/api/v1/iot/project/{id}/zones",
    params(("id" = i64, Path, description = "Project id")),
    request_body = DeleteZonesRequest,
    responses(
        (status = 200, description = "Zones deleted", body = DeleteResponse),
        (status = 403, description = "A zone is not owned", body = ApiErrorResponse),
        (status = 400, description = "A listed item belongs to another parent", body = ApiErrorResponse),
        (status = 404, description = "A zone does not exist", body = ApiErrorResponse)
    ),
    tag = "projects"
)]
pub async fn delete_project_zones(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
    payload: Result<Json<DeleteZonesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let id = ProjectId(id);
    let Json(request) = payload?;
    non_empty(&request.zones, "zones")?;

    let zones: Vec<ZoneId> = request.zones.iter().map(|zone| ZoneId(zone.id_zone)).collect();
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Project, &Target::Project(id))?;
            // A project check on a zone delegates to the zone check
            scope.require_all(EntityKind::Project, zones.iter().copied().map(Target::Zone))
        })
        .await?;

    state.db.storage().delete_project_zones(id, &zones).await?;

    Ok(Json(DeleteResponse {
        status: status_line("Deleted", "zone", zones.len()),
        deleted: zones.iter().map(|zone| zone.get()).collect(),
    }))
}

/// Every sensor placed anywhere in the project
///
/// GET /api/v1/iot/project/{id}/sensors
#[utoipa::path(
    get,
    path = "/api/v1/iot/project/{id}/sensors",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Sensor ids of the project", body = SensorIdsResponse),
        (status = 403, description = "Not an owner", body = ApiErrorResponse)
    ),
    tag = "projects"
)]
pub async fn project_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = ProjectId(id);
    let storage = state.db.storage();
    found(storage.get_project(id).await?, id)?;
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Project, &Target::Project(id))
        })
        .await?;

    let sensors = storage.project_sensor_ids(id).await?;
    Ok(Json(SensorIdsResponse {
        status: "Search successful".to_string(),
        sensors: sensors.into_iter().map(|sensor| sensor.get()).collect(),
    }))
}
