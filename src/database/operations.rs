/// Database operations for the latest-state record and reading history
use tokio_postgres::Client;

use crate::models::{HistoryRecord, LatestUpdate};

/// Overwrite the measurements of the device record called `device_name`
///
/// # Returns
/// Number of rows updated; zero means no such record exists
pub async fn update_latest(
    client: &Client,
    device_name: &str,
    update: &LatestUpdate,
) -> Result<u64, tokio_postgres::Error> {
    client
        .execute(
            "UPDATE devices
             SET humidity = $1, temperature = $2, pressure = $3, last_updated = $4
             WHERE name = $5",
            &[
                &update.data.humidity,
                &update.data.temperature,
                &update.data.pressure,
                &update.last_updated,
                &device_name,
            ],
        )
        .await
}

/// Append one reading to the history table
pub async fn insert_history(
    client: &Client,
    record: &HistoryRecord,
) -> Result<u64, tokio_postgres::Error> {
    client
        .execute(
            "INSERT INTO ruuvis(humidity, temperature, pressure, device_id, timestamp)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &record.data.humidity,
                &record.data.temperature,
                &record.data.pressure,
                &record.data.device_id,
                &record.timestamp,
            ],
        )
        .await
}
