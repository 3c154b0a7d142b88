use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use user::CredentialResolver;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod server;

pub use server::{start_server_with_config, ApiConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<database::Database>,
    pub resolver: Arc<CredentialResolver>,
}

impl AppState {
    pub fn new(db: Arc<database::Database>) -> Self {
        let resolver = Arc::new(CredentialResolver::new(db.clone()));
        Self { db, resolver }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::projects::list_projects,
        handlers::projects::get_project,
        handlers::projects::list_project_zones,
        handlers::projects::create_project_zones,
        handlers::projects::delete_project_zones,
        handlers::projects::project_sensors,
        handlers::zones::get_zone,
        handlers::zones::update_zone,
        handlers::zones::delete_zone,
        handlers::zones::list_zone_nodes,
        handlers::zones::create_zone_nodes,
        handlers::zones::delete_zone_nodes,
        handlers::zones::list_zone_sensors,
        handlers::zones::create_zone_sensors,
        handlers::zones::delete_zone_sensors,
        handlers::nodes::get_node,
        handlers::nodes::update_node,
        handlers::nodes::delete_node,
        handlers::nodes::list_node_sensors,
        handlers::nodes::create_node_sensors,
        handlers::nodes::delete_node_sensors,
        handlers::measurements::measure,
        handlers::measurements::sensor_measurements,
        handlers::measurements::owned_sensors,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::ProjectResponse,
            models::ZoneResponse,
            models::NodeResponse,
            models::SensorResponse,
            models::MeasurementResponse,
            models::SeriesResponse,
            models::PointResponse,
            models::ProjectsResponse,
            models::ZonesResponse,
            models::NodesResponse,
            models::SensorsResponse,
            models::MeasurementsResponse,
            models::SensorSeriesResponse,
            models::SensorIdsResponse,
            models::DeleteResponse,
            models::GroupRequest,
            models::CreateZonesRequest,
            models::CreateNodesRequest,
            models::SensorRequest,
            models::CreateSensorsRequest,
            models::GroupUpdateRequest,
            models::UpdateZoneRequest,
            models::UpdateNodeRequest,
            models::ZoneRef,
            models::NodeRef,
            models::SensorRef,
            models::DeleteZonesRequest,
            models::DeleteNodesRequest,
            models::DeleteSensorsRequest,
            models::MeasurementRequest,
            models::MeasureRequest,
            models::HealthResponse,
            models::DatabaseHealth,
            error::ApiErrorResponse,
            error::ErrorDetail,
        )
    ),
    tags(
        (name = "projects", description = "Projects and their zones"),
        (name = "zones", description = "Zones, their nodes and ambiental sensors"),
        (name = "nodes", description = "Nodes and their sensors"),
        (name = "measurements", description = "Sensor readings"),
        (name = "health", description = "Health check endpoints"),
    ),
    info(
        title = "Telemetry Platform API",
        version = "1.0.0",
        description = "IoT project hierarchy and measurement API",
    ),
)]
pub struct ApiDoc;

/// Create the main API router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    use handlers::{health, measurements, nodes, projects, zones};

    let iot = Router::new()
        .route("/projects", get(projects::list_projects))
        .route("/project/:id", get(projects::get_project))
        .route(
            "/project/:id/zones",
            get(projects::list_project_zones)
                .post(projects::create_project_zones)
                .delete(projects::delete_project_zones),
        )
        .route("/project/:id/sensors", get(projects::project_sensors))
        .route(
            "/zone/:id",
            get(zones::get_zone)
                .put(zones::update_zone)
                .delete(zones::delete_zone),
        )
        .route(
            "/zone/:id/nodes",
            get(zones::list_zone_nodes)
                .post(zones::create_zone_nodes)
                .delete(zones::delete_zone_nodes),
        )
        .route(
            "/zone/:id/sensors",
            get(zones::list_zone_sensors)
                .post(zones::create_zone_sensors)
                .delete(zones::delete_zone_sensors),
        )
        .route(
            "/node/:id",
            get(nodes::get_node)
                .put(nodes::update_node)
                .delete(nodes::delete_node),
        )
        .route(
            "/node/:id/sensors",
            get(nodes::list_node_sensors)
                .post(nodes::create_node_sensors)
                .delete(nodes::delete_node_sensors),
        )
        .route("/measure", axum::routing::post(measurements::measure))
        .route(
            "/sensor/:id/measurements",
            get(measurements::sensor_measurements),
        )
        .route("/sensors", get(measurements::owned_sensors))
        .route("/health", get(health::health_check));

    Router::new()
        .nest("/api/v1/iot", iot)
        .merge(SwaggerUi::new("/api/v1/swagger").url("/api/v1/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::{ContainmentGraph, Credential, NodeId, ProjectId, SensorId, ZoneId};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use database::{NewGroup, NewProject, SensorType};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const DEVICE_TOKEN: &str = "device-token-1";
    const PROJECT_TOKEN: &str = "project-token-1";
    const ADMIN_TOKEN: &str = "admin-token-1";

    /// Owner with one project, two zones, a node with a sensor in the first
    /// zone and an ambiental sensor in the second. The device token is granted
    /// the first zone only.
    struct Fixture {
        _dir: TempDir,
        state: AppState,
        project: ProjectId,
        granted_zone: ZoneId,
        other_zone: ZoneId,
        node: NodeId,
        node_sensor: SensorId,
        foreign_sensor: SensorId,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("api.db");
        let db = database::Database::new(db_path.to_str().unwrap()).await.unwrap();
        db.migrate().await.unwrap();
        let state = AppState::new(Arc::new(db));

        let owner = state
            .resolver
            .register_user("owner", "owner-pw", false)
            .await
            .unwrap();
        let admin = state
            .resolver
            .register_user("admin", "admin-pw", true)
            .await
            .unwrap();
        state.resolver.register_user("stranger", "pw", false).await.unwrap();
        let device = state
            .resolver
            .store_token(owner.id, DEVICE_TOKEN)
            .await
            .unwrap();
        let project_token = state
            .resolver
            .store_token(owner.id, PROJECT_TOKEN)
            .await
            .unwrap();
        state.resolver.store_token(admin.id, ADMIN_TOKEN).await.unwrap();

        let storage = state.db.storage();
        let project = storage
            .create_project(
                owner.id,
                &NewProject {
                    name: "greenhouse".into(),
                    ..NewProject::default()
                },
            )
            .await
            .unwrap();
        let group = |name: &str| NewGroup {
            name: name.into(),
            description: String::new(),
        };
        let granted_zone = storage
            .create_zone(project.id, &group("granted"), Some(device.id))
            .await
            .unwrap();
        let other_zone = storage
            .create_zone(project.id, &group("other"), None)
            .await
            .unwrap();
        let node = storage
            .create_node(granted_zone.id, &group("node"), None)
            .await
            .unwrap();
        let node_sensor = storage
            .create_node_sensor(node.id, SensorType::Dht22)
            .await
            .unwrap();
        let foreign_sensor = storage
            .create_ambiental_sensor(other_zone.id, SensorType::Ldr)
            .await
            .unwrap();
        storage
            .grant_project(project_token.id, project.id)
            .await
            .unwrap();

        Fixture {
            _dir: dir,
            state,
            project: project.id,
            granted_zone: granted_zone.id,
            other_zone: other_zone.id,
            node: node.id,
            node_sensor: node_sensor.id,
            foreign_sensor: foreign_sensor.id,
        }
    }

    enum Auth<'a> {
        None,
        Token(&'a str),
        Basic(&'a str, &'a str),
    }

    async fn send(
        fixture: &Fixture,
        method: Method,
        uri: &str,
        auth: Auth<'_>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        request = match auth {
            Auth::None => request,
            Auth::Token(token) => request.header(auth::TOKEN_HEADER, token),
            Auth::Basic(username, password) => request.header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password))),
            ),
        };
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = create_router(fixture.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn measurement_count(fixture: &Fixture) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM measurements")
            .fetch_one(fixture.state.db.pool())
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_health_needs_no_credential() {
        let fx = fixture().await;
        let (status, body) = send(&fx, Method::GET, "/api/v1/iot/health", Auth::None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["connected"], true);
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized() {
        let fx = fixture().await;
        let (status, body) =
            send(&fx, Method::GET, "/api/v1/iot/projects", Auth::None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = send(
            &fx,
            Method::GET,
            "/api/v1/iot/projects",
            Auth::Token("not-a-token"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_owner_lists_nested_projects() {
        let fx = fixture().await;
        let (status, body) = send(
            &fx,
            Method::GET,
            "/api/v1/iot/projects",
            Auth::Basic("owner", "owner-pw"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let projects = body["projects"].as_array().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0]["zones"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &fx,
            Method::GET,
            "/api/v1/iot/projects",
            Auth::Basic("stranger", "pw"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["projects"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zone_token_is_confined_to_its_zone() {
        let fx = fixture().await;
        let token = Auth::Token(DEVICE_TOKEN);

        let uri = format!("/api/v1/iot/zone/{}", fx.granted_zone.get());
        let (status, body) = send(&fx, Method::GET, &uri, token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes"][0]["sensors"][0]["sensor_type"], "DHT22");

        let uri = format!("/api/v1/iot/zone/{}", fx.other_zone.get());
        let (status, body) = send(&fx, Method::GET, &uri, Auth::Token(DEVICE_TOKEN), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        // The holder owns the project, the token does not
        let uri = format!("/api/v1/iot/project/{}", fx.project.get());
        let (status, _) = send(&fx, Method::GET, &uri, Auth::Token(DEVICE_TOKEN), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&fx, Method::GET, "/api/v1/iot/sensors", Auth::Token(DEVICE_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sensors"], json!([fx.node_sensor.get()]));
    }

    #[tokio::test]
    async fn test_superuser_bypass_only_without_token() {
        let fx = fixture().await;
        let uri = format!("/api/v1/iot/zone/{}", fx.other_zone.get());

        let (status, _) =
            send(&fx, Method::GET, &uri, Auth::Basic("admin", "admin-pw"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&fx, Method::GET, &uri, Auth::Token(ADMIN_TOKEN), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &fx,
            Method::GET,
            "/api/v1/iot/projects",
            Auth::Basic("admin", "admin-pw"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projects"].as_array().unwrap().len(), 1);
        let (status, body) = send(
            &fx,
            Method::GET,
            "/api/v1/iot/sensors",
            Auth::Basic("admin", "admin-pw"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["sensors"],
            json!([fx.node_sensor.get(), fx.foreign_sensor.get()])
        );

        let (status, body) =
            send(&fx, Method::GET, "/api/v1/iot/sensors", Auth::Token(ADMIN_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["sensors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_created_zone_is_granted_to_token() {
        let fx = fixture().await;
        let uri = format!("/api/v1/iot/project/{}/zones", fx.project.get());
        let (status, body) = send(
            &fx,
            Method::POST,
            &uri,
            Auth::Token(PROJECT_TOKEN),
            Some(json!({ "zones": [{ "name": "east" }, { "name": "west", "description": "w" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "Created zones");
        let created: Vec<ZoneId> = body["zones"]
            .as_array()
            .unwrap()
            .iter()
            .map(|zone| ZoneId(zone["id"].as_i64().unwrap()))
            .collect();

        let storage = fx.state.db.storage();
        let project_token = storage
            .find_token_by_hash(&user::hash_token(PROJECT_TOKEN))
            .await
            .unwrap()
            .unwrap();
        let owner = storage.find_user_by_username("owner").await.unwrap().unwrap();
        let snapshot = storage
            .load_snapshot(&Credential::token(owner.identity(), project_token.id))
            .await
            .unwrap();
        let granted = snapshot.zones_granted_to_token(project_token.id);
        assert!(created.iter().all(|zone| granted.contains(zone)));
    }

    #[tokio::test]
    async fn test_device_token_cannot_add_zones_to_project() {
        let fx = fixture().await;
        let uri = format!("/api/v1/iot/project/{}/zones", fx.project.get());
        let (status, _) = send(
            &fx,
            Method::POST,
            &uri,
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "zones": [{ "name": "sneaky" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            fx.state.db.storage().list_zones(fx.project).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_batch_delete_is_all_or_nothing() {
        let fx = fixture().await;
        let uri = format!("/api/v1/iot/zone/{}/sensors", fx.granted_zone.get());
        let (status, _) = send(
            &fx,
            Method::DELETE,
            &uri,
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "sensors": [
                { "id_sensor": fx.node_sensor.get() },
                { "id_sensor": fx.foreign_sensor.get() }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let storage = fx.state.db.storage();
        assert!(storage.get_sensor(fx.node_sensor).await.unwrap().is_some());
        assert!(storage.get_sensor(fx.foreign_sensor).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_batch_delete_is_limited_to_the_path_parent() {
        let fx = fixture().await;

        // The node sensor lives in the granted zone but is not ambiental
        let uri = format!("/api/v1/iot/zone/{}/sensors", fx.granted_zone.get());
        let (status, body) = send(
            &fx,
            Method::DELETE,
            &uri,
            Auth::Basic("owner", "owner-pw"),
            Some(json!({ "sensors": [{ "id_sensor": fx.node_sensor.get() }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        // Owned by the caller, but ambiental in the other zone
        let uri = format!("/api/v1/iot/node/{}/sensors", fx.node.get());
        let (status, _) = send(
            &fx,
            Method::DELETE,
            &uri,
            Auth::Basic("owner", "owner-pw"),
            Some(json!({ "sensors": [
                { "id_sensor": fx.node_sensor.get() },
                { "id_sensor": fx.foreign_sensor.get() }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/iot/zone/{}/nodes", fx.other_zone.get());
        let (status, _) = send(
            &fx,
            Method::DELETE,
            &uri,
            Auth::Basic("owner", "owner-pw"),
            Some(json!({ "nodes": [{ "id_node": fx.node.get() }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let storage = fx.state.db.storage();
        assert!(storage.get_node(fx.node).await.unwrap().is_some());
        assert!(storage.get_sensor(fx.node_sensor).await.unwrap().is_some());
        assert!(storage.get_sensor(fx.foreign_sensor).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_owner_deletes_zones_by_batch() {
        let fx = fixture().await;
        let uri = format!("/api/v1/iot/project/{}/zones", fx.project.get());
        let (status, body) = send(
            &fx,
            Method::DELETE,
            &uri,
            Auth::Basic("owner", "owner-pw"),
            Some(json!({ "zones": [
                { "id_zone": fx.granted_zone.get() },
                { "id_zone": fx.other_zone.get() }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Deleted zones");

        let storage = fx.state.db.storage();
        assert!(storage.list_zones(fx.project).await.unwrap().is_empty());
        assert!(storage.get_node(fx.node).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_measure_rejects_whole_batch_on_foreign_sensor() {
        let fx = fixture().await;
        let (status, _) = send(
            &fx,
            Method::POST,
            "/api/v1/iot/measure",
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "sensors": [
                { "id_sensor": fx.node_sensor.get(), "measurement_type": "A_TEMPERATURE", "value": 21.5 },
                { "id_sensor": fx.foreign_sensor.get(), "measurement_type": "LDR_LIGHT", "value": 3.0 }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(measurement_count(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_measure_and_read_series() {
        let fx = fixture().await;
        let (status, body) = send(
            &fx,
            Method::POST,
            "/api/v1/iot/measure",
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "sensors": [
                { "id_sensor": fx.node_sensor.get(), "measurement_type": "A_TEMPERATURE", "value": 21.456 },
                { "id_sensor": fx.node_sensor.get(), "measurement_type": "R_HUMIDITY", "value": 60.0 }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["measurements"][0]["value"], 21.46);
        assert_eq!(measurement_count(&fx).await, 2);

        let uri = format!("/api/v1/iot/sensor/{}/measurements", fx.node_sensor.get());
        let (status, body) = send(&fx, Method::GET, &uri, Auth::Token(DEVICE_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["series"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_bodies_are_rejected() {
        let fx = fixture().await;
        let (status, _) = send(
            &fx,
            Method::POST,
            "/api/v1/iot/measure",
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "readings": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &fx,
            Method::POST,
            "/api/v1/iot/measure",
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "sensors": [
                { "id_sensor": fx.node_sensor.get(), "measurement_type": "WIND", "value": 1.0 }
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/iot/node/{}/sensors", fx.node.get());
        let (status, _) = send(
            &fx,
            Method::POST,
            &uri,
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "sensors": [{ "sensor_type": "DHT99" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/iot/project/{}/zones", fx.project.get());
        let (status, body) = send(
            &fx,
            Method::POST,
            &uri,
            Auth::Basic("owner", "owner-pw"),
            Some(json!({ "zones": [{ "name": "z".repeat(31) }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let uri = format!("/api/v1/iot/node/{}", fx.node.get());
        let (status, _) = send(
            &fx,
            Method::PUT,
            &uri,
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "node": { "name": "n".repeat(21) } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_objects_are_not_found() {
        let fx = fixture().await;
        for uri in [
            "/api/v1/iot/project/999",
            "/api/v1/iot/zone/999",
            "/api/v1/iot/node/999",
            "/api/v1/iot/sensor/999/measurements",
        ] {
            let (status, _) =
                send(&fx, Method::GET, uri, Auth::Basic("owner", "owner-pw"), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_update_zone_keeps_project() {
        let fx = fixture().await;
        let uri = format!("/api/v1/iot/zone/{}", fx.granted_zone.get());
        let (status, body) = send(
            &fx,
            Method::PUT,
            &uri,
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "zone": { "name": "renamed" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "renamed");
        assert_eq!(body["id_project"], fx.project.get());
    }

    #[tokio::test]
    async fn test_node_sensors_created_in_node_zone() {
        let fx = fixture().await;
        let uri = format!("/api/v1/iot/node/{}/sensors", fx.node.get());
        let (status, body) = send(
            &fx,
            Method::POST,
            &uri,
            Auth::Token(DEVICE_TOKEN),
            Some(json!({ "sensors": [{ "sensor_type": "SM150" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sensors"][0]["id_zone"], fx.granted_zone.get());
        assert_eq!(body["sensors"][0]["ambiental"], false);
    }
}
