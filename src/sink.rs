/// Destination for flushed readings
use std::future::Future;

use crate::error::SinkError;
use crate::models::{HistoryRecord, LatestUpdate};

/// Backend that receives flushed readings, one call per reading.
pub trait ReadingSink: Send + Sync + 'static {
    /// Overwrite the sensor's "current state" record.
    fn upsert_latest(
        &self,
        update: LatestUpdate,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Append one historical reading.
    fn append_history(
        &self,
        record: HistoryRecord,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}
