/// PostgreSQL-backed reading sink
use log::{debug, warn};
use tokio::sync::Mutex;
use tokio_postgres::Client;

use crate::database::connection::connect;
use crate::database::operations::{insert_history, update_latest};
use crate::error::SinkError;
use crate::models::{HistoryRecord, LatestUpdate};
use crate::sink::ReadingSink;

/// Writes readings to PostgreSQL over a single shared connection.
///
/// The connection is opened on first use and reopened on the next call
/// after it closes. A failed call is not retried.
pub struct PostgresSink {
    database_url: String,
    latest_device_name: String,
    client: Mutex<Option<Client>>,
}

impl PostgresSink {
    pub fn new(database_url: impl Into<String>, latest_device_name: impl Into<String>) -> Self {
        PostgresSink {
            database_url: database_url.into(),
            latest_device_name: latest_device_name.into(),
            client: Mutex::new(None),
        }
    }

    async fn with_client<'a>(
        &self,
        slot: &'a mut Option<Client>,
    ) -> Result<&'a Client, SinkError> {
        if slot.as_ref().map_or(true, Client::is_closed) {
            if slot.is_some() {
                warn!("Database connection closed, reconnecting");
            }
            *slot = Some(connect(&self.database_url).await?);
        }
        slot.as_ref()
            .ok_or_else(|| SinkError::Unavailable("no database connection".to_string()))
    }
}

impl ReadingSink for PostgresSink {
    async fn upsert_latest(&self, update: LatestUpdate) -> Result<(), SinkError> {
        let mut slot = self.client.lock().await;
        let client = self.with_client(&mut slot).await?;

        let result = update_latest(client, &self.latest_device_name, &update).await;
        match result {
            Ok(0) => Err(SinkError::Rejected(format!(
                "no device record named '{}'",
                self.latest_device_name
            ))),
            Ok(_) => {
                debug!("Updated latest data for '{}'", self.latest_device_name);
                Ok(())
            }
            Err(e) => {
                let err = SinkError::from(e);
                if err.is_unavailable() {
                    *slot = None;
                }
                Err(err)
            }
        }
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<(), SinkError> {
        let mut slot = self.client.lock().await;
        let client = self.with_client(&mut slot).await?;

        let result = insert_history(client, &record).await;
        match result {
            Ok(_) => {
                debug!("Inserted history row for {}", record.data.device_id);
                Ok(())
            }
            Err(e) => {
                let err = SinkError::from(e);
                if err.is_unavailable() {
                    *slot = None;
                }
                Err(err)
            }
        }
    }
}
