use authz::{EntityKind, SensorId, Target};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use database::{MeasurementKind, NewMeasurement};
use tracing::info;

use crate::{
    auth::Caller,
    error::{ApiErrorResponse, ApiResult},
    handlers::{found, non_empty},
    models::{
        status_line, MeasureRequest, MeasurementResponse, MeasurementsResponse, SensorIdsResponse,
        SensorSeriesResponse, SeriesResponse,
    },
    AppState,
};

/// Append readings for one or more sensors. The caller must control every
/// sensor of the batch or nothing is stored.
///
/// POST /api/v1/iot/measure
#[utoipa::path(
    post,
    path = "/api/v1/iot/measure",
    request_body = MeasureRequest,
    responses(
        (status = 201, description = "Readings stored", body = MeasurementsResponse),
        (status = 400, description = "Invalid reading", body = ApiErrorResponse),
        (status = 403, description = "A sensor is not controlled by the caller", body = ApiErrorResponse)
    ),
    tag = "measurements"
)]
pub async fn measure(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<MeasureRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    non_empty(&request.sensors, "measurements")?;

    let readings = request
        .sensors
        .into_iter()
        .map(|reading| -> ApiResult<NewMeasurement> {
            Ok(NewMeasurement {
                sensor_id: SensorId(reading.id_sensor),
                measurement_type: reading.measurement_type.parse::<MeasurementKind>()?,
                value: reading.value,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    caller
        .authorize(&state, |scope| {
            scope.require_all(
                EntityKind::Sensor,
                readings.iter().map(|reading| Target::Sensor(reading.sensor_id)),
            )
        })
        .await?;

    let stored = state.db.storage().append_measurements(&readings).await?;

    info!("{} stored {} reading(s)", caller.credential, stored.len());
    Ok((
        StatusCode::CREATED,
        Json(MeasurementsResponse {
            status: status_line("Stored", "measurement", stored.len()),
            measurements: stored.into_iter().map(MeasurementResponse::from).collect(),
        }),
    ))
}

/// Readings of a sensor grouped by measurement kind
///
/// GET /api/v1/iot/sensor/{id}/measurements
#[utoipa::path(
    get,
    path = "/api/v1/iot/sensor/{id}/measurements",
    params(("id" = i64, Path, description = "Sensor id")),
    responses(
        (status = 200, description = "Readings by kind", body = SensorSeriesResponse),
        (status = 403, description = "Sensor not controlled by the caller", body = ApiErrorResponse),
        (status = 404, description = "Unknown sensor", body = ApiErrorResponse)
    ),
    tag = "measurements"
)]
pub async fn sensor_measurements(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    let id = SensorId(id);
    let storage = state.db.storage();
    found(storage.get_sensor(id).await?, id)?;
    caller
        .authorize(&state, |scope| {
            scope.require(EntityKind::Sensor, &Target::Sensor(id))
        })
        .await?;

    let series = storage.measurement_series(id).await?;
    Ok(Json(SensorSeriesResponse {
        status: "Sensor found".to_string(),
        id_sensor: id.get(),
        series: series.into_iter().map(SeriesResponse::from).collect(),
    }))
}

/// Ids of every sensor the caller controls
///
/// GET /api/v1/iot/sensors
#[utoipa::path(
    get,
    path = "/api/v1/iot/sensors",
    responses(
        (status = 200, description = "Controlled sensor ids", body = SensorIdsResponse),
        (status = 401, description = "Not authenticated", body = ApiErrorResponse)
    ),
    tag = "measurements"
)]
pub async fn owned_sensors(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    // None means every sensor
    let owned = caller
        .authorize(&state, |scope| {
            Ok(if scope.credential().bypasses_checks() {
                None
            } else {
                Some(scope.owned_sensor_ids().clone())
            })
        })
        .await?;
    let owned = match owned {
        Some(owned) => owned,
        None => state.db.storage().all_sensor_ids().await?,
    };
    let sensors = owned.into_iter().map(|sensor| sensor.get()).collect();

    Ok(Json(SensorIdsResponse {
        status: "Search successful".to_string(),
        sensors,
    }))
}
