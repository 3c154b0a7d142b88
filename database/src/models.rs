use authz::{NodeId, ProjectId, SensorId, TokenId, UserId, UserIdentity, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DatabaseError;

/// A platform user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// The identity the authorization core sees for this user
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id,
            is_superuser: self.is_superuser,
        }
    }
}

/// A stored access token. Only the SHA-256 hash of the token is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub id: TokenId,
    pub user_id: UserId,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub snippet_title: String,
    pub snippet_image: String,
}

/// Data for a new project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub snippet_title: String,
    #[serde(default)]
    pub snippet_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    #[serde(rename = "id_project")]
    pub project_id: ProjectId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "id_zone")]
    pub zone_id: ZoneId,
    pub name: String,
    pub description: String,
}

/// Name and description of a new zone or node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Partial update of a zone or node. Parents are immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl GroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    #[serde(rename = "id_zone")]
    pub zone_id: ZoneId,
    #[serde(rename = "id_node")]
    pub node_id: Option<NodeId>,
    pub ambiental: bool,
    pub sensor_type: SensorType,
}

/// An immutable reading. `created_at` is always assigned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    #[serde(rename = "id_sensor")]
    pub sensor_id: SensorId,
    pub measurement_type: MeasurementKind,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

/// A reading as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeasurement {
    #[serde(rename = "id_sensor")]
    pub sensor_id: SensorId,
    pub measurement_type: MeasurementKind,
    pub value: f64,
}

/// Readings of one sensor for one measurement kind, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementSeries {
    pub measurement_type: MeasurementKind,
    pub label: String,
    pub points: Vec<MeasurementPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementPoint {
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

/// A node with its sensors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTree {
    #[serde(flatten)]
    pub node: Node,
    pub sensors: Vec<Sensor>,
}

/// A zone with its nodes and ambiental sensors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneTree {
    #[serde(flatten)]
    pub zone: Zone,
    pub nodes: Vec<NodeTree>,
    pub ambiental: Vec<Sensor>,
}

/// A project with its full hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTree {
    #[serde(flatten)]
    pub project: Project,
    pub zones: Vec<ZoneTree>,
}

/// Supported sensor hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensorType {
    #[serde(rename = "DHT11")]
    Dht11,
    #[serde(rename = "DHT22")]
    Dht22,
    #[serde(rename = "MCP9701A")]
    Mcp9701a,
    #[serde(rename = "LDR")]
    Ldr,
    #[serde(rename = "BME280")]
    Bme280,
    #[serde(rename = "BMP180")]
    Bmp180,
    #[serde(rename = "SM150")]
    Sm150,
    #[serde(rename = "CMS")]
    Cms,
}

impl SensorType {
    pub const ALL: [SensorType; 8] = [
        SensorType::Dht11,
        SensorType::Dht22,
        SensorType::Mcp9701a,
        SensorType::Ldr,
        SensorType::Bme280,
        SensorType::Bmp180,
        SensorType::Sm150,
        SensorType::Cms,
    ];

    /// Stored code
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Dht11 => "DHT11",
            SensorType::Dht22 => "DHT22",
            SensorType::Mcp9701a => "MCP9701A",
            SensorType::Ldr => "LDR",
            SensorType::Bme280 => "BME280",
            SensorType::Bmp180 => "BMP180",
            SensorType::Sm150 => "SM150",
            SensorType::Cms => "CMS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SensorType::Dht11 => "Multisensor DHT11",
            SensorType::Dht22 => "Multisensor DHT22",
            SensorType::Mcp9701a => "Temperature sensor MCP9701A",
            SensorType::Ldr => "Photoresistor",
            SensorType::Bme280 => "Pressure temperature humidity sensor BME280",
            SensorType::Bmp180 => "Pressure temperature altitude sensor BMP180",
            SensorType::Sm150 => "Moisture sensor",
            SensorType::Cms => "Cable moisture sensor",
        }
    }
}

impl FromStr for SensorType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DatabaseError::Validation(format!("Unknown sensor type: {}", s)))
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of measurement a sensor can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MeasurementKind {
    #[serde(rename = "A_TEMPERATURE")]
    AmbientTemperature,
    #[serde(rename = "R_HUMIDITY")]
    RelativeHumidity,
    #[serde(rename = "B_PRESSURE")]
    BarometricPressure,
    #[serde(rename = "B_ALTITUDE")]
    BarometricAltitude,
    // Stored as A_HUMIDITY for compatibility with existing data
    #[serde(rename = "A_HUMIDITY")]
    BarometricHumidity,
    #[serde(rename = "S_MOISTURE")]
    SoilMoisture,
    #[serde(rename = "LDR_LIGHT")]
    LdrLight,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 7] = [
        MeasurementKind::AmbientTemperature,
        MeasurementKind::RelativeHumidity,
        MeasurementKind::BarometricPressure,
        MeasurementKind::BarometricAltitude,
        MeasurementKind::BarometricHumidity,
        MeasurementKind::SoilMoisture,
        MeasurementKind::LdrLight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::AmbientTemperature => "A_TEMPERATURE",
            MeasurementKind::RelativeHumidity => "R_HUMIDITY",
            MeasurementKind::BarometricPressure => "B_PRESSURE",
            MeasurementKind::BarometricAltitude => "B_ALTITUDE",
            MeasurementKind::BarometricHumidity => "A_HUMIDITY",
            MeasurementKind::SoilMoisture => "S_MOISTURE",
            MeasurementKind::LdrLight => "LDR_LIGHT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeasurementKind::AmbientTemperature => "Ambiental Temperature",
            MeasurementKind::RelativeHumidity => "Relative Humidity",
            MeasurementKind::BarometricPressure => "Barometric Pressure",
            MeasurementKind::BarometricAltitude => "Barometric Altitude",
            MeasurementKind::BarometricHumidity => "Barometric Humidity",
            MeasurementKind::SoilMoisture => "Soil Moisture",
            MeasurementKind::LdrLight => "LDR Light Index",
        }
    }
}

impl FromStr for MeasurementKind {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeasurementKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DatabaseError::Validation(format!("Unknown measurement type: {}", s)))
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
