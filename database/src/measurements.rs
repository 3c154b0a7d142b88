use crate::models::{
    Measurement, MeasurementKind, MeasurementPoint, MeasurementSeries, NewMeasurement,
};
use crate::storage::IotStorage;
use crate::{DatabaseError, Result};
use authz::SensorId;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Values are stored with at most 8 digits, 2 of them decimals
const MAX_ABS_VALUE: f64 = 1_000_000.0;

/// Round to two decimals and reject values that do not fit the stored precision
pub fn normalize_value(value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(DatabaseError::Validation(format!(
            "Measurement value {} is not a number",
            value
        )));
    }
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.abs() >= MAX_ABS_VALUE {
        return Err(DatabaseError::Validation(format!(
            "Measurement value {} exceeds 8 digits",
            value
        )));
    }
    Ok(rounded)
}

impl<'a> IotStorage<'a> {
    /// Append a batch of readings in one transaction. Either every reading is
    /// stored or none is.
    pub async fn append_measurements(
        &self,
        readings: &[NewMeasurement],
    ) -> Result<Vec<Measurement>> {
        let values = readings
            .iter()
            .map(|reading| normalize_value(reading.value))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.database().pool().begin().await?;
        let mut stored = Vec::with_capacity(readings.len());

        for (reading, value) in readings.iter().zip(values) {
            let (exists,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensors WHERE id = ?")
                .bind(reading.sensor_id.get())
                .fetch_one(&mut *tx)
                .await?;
            if exists == 0 {
                return Err(DatabaseError::EntityNotFound(reading.sensor_id.to_string()));
            }

            let created_at = Utc::now();
            let result = sqlx::query(
                "INSERT INTO measurements (sensor_id, measurement_type, value, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(reading.sensor_id.get())
            .bind(reading.measurement_type.as_str())
            .bind(value)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            stored.push(Measurement {
                id: result.last_insert_rowid(),
                sensor_id: reading.sensor_id,
                measurement_type: reading.measurement_type,
                value,
                created_at,
            });
        }
        tx.commit().await?;

        info!("Appended {} measurement(s)", stored.len());
        Ok(stored)
    }

    /// Every reading of a sensor, oldest first
    pub async fn list_measurements(&self, sensor: SensorId) -> Result<Vec<Measurement>> {
        let rows = sqlx::query(
            "SELECT * FROM measurements WHERE sensor_id = ? ORDER BY created_at, id",
        )
        .bind(sensor.get())
        .fetch_all(self.database().pool())
        .await?;
        debug!("Loaded {} measurement(s) for {}", rows.len(), sensor);
        rows.iter().map(measurement_from_row).collect()
    }

    /// Readings of a sensor grouped by measurement kind
    pub async fn measurement_series(&self, sensor: SensorId) -> Result<Vec<MeasurementSeries>> {
        let mut grouped: BTreeMap<MeasurementKind, Vec<MeasurementPoint>> = BTreeMap::new();
        for measurement in self.list_measurements(sensor).await? {
            grouped
                .entry(measurement.measurement_type)
                .or_default()
                .push(MeasurementPoint {
                    value: measurement.value,
                    created_at: measurement.created_at,
                });
        }

        Ok(grouped
            .into_iter()
            .map(|(kind, points)| MeasurementSeries {
                measurement_type: kind,
                label: kind.label().to_string(),
                points,
            })
            .collect())
    }
}

fn measurement_from_row(row: &SqliteRow) -> Result<Measurement> {
    let kind: String = row.try_get("measurement_type")?;
    Ok(Measurement {
        id: row.try_get("id")?,
        sensor_id: SensorId(row.try_get("sensor_id")?),
        measurement_type: kind.parse()?,
        value: row.try_get("value")?,
        created_at: row.try_get("created_at")?,
    })
}
