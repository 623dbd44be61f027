//! Periodic draining of the reading buffer into the sink.
//!
//! Two jobs share one buffer: `UpdateLatest` overwrites the current-state
//! record and `PersistAll` appends history rows. Each job takes the whole
//! buffer when it fires. Readings whose sink call fails are logged and
//! dropped.

use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::buffer::ReadingBuffer;
use crate::config::FlushPolicy;
use crate::models::{HistoryRecord, LatestUpdate, SensorReading};
use crate::sink::ReadingSink;
use crate::utils::format_datetime;

/// Drained batches waiting for the delivery task
const DELIVERY_QUEUE_LEN: usize = 16;

type Batch = (FlushKind, Vec<SensorReading>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    UpdateLatest,
    PersistAll,
}

impl fmt::Display for FlushKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushKind::UpdateLatest => write!(f, "update-latest"),
            FlushKind::PersistAll => write!(f, "persist-all"),
        }
    }
}

/// Outcome of one flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub kind: FlushKind,
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct PeriodicJob {
    kind: FlushKind,
    interval: Duration,
    next_due: Instant,
}

pub struct FlushScheduler<S> {
    buffer: Arc<ReadingBuffer>,
    sink: Arc<S>,
    jobs: Vec<PeriodicJob>,
}

impl<S: ReadingSink> FlushScheduler<S> {
    /// Both jobs first become due one interval after `start`.
    pub fn new(
        buffer: Arc<ReadingBuffer>,
        sink: Arc<S>,
        policy: FlushPolicy,
        start: Instant,
    ) -> Self {
        let job = |kind, interval| PeriodicJob {
            kind,
            interval,
            next_due: start + interval,
        };

        FlushScheduler {
            buffer,
            sink,
            jobs: vec![
                job(FlushKind::UpdateLatest, policy.interval_latest),
                job(FlushKind::PersistAll, policy.interval_history),
            ],
        }
    }

    /// Jobs due at `now`, the one that became due first leading. Each
    /// returned job is rescheduled one interval after `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<FlushKind> {
        let mut due: Vec<&mut PeriodicJob> = self
            .jobs
            .iter_mut()
            .filter(|job| now >= job.next_due)
            .collect();
        due.sort_by_key(|job| job.next_due);

        due.into_iter()
            .map(|job| {
                job.next_due = now + job.interval;
                job.kind
            })
            .collect()
    }

    /// Drive both jobs forever, checking for due work every `tick`.
    ///
    /// The buffer is drained on the driver itself. Drained batches go to a
    /// single delivery task in drain order, so a slow backend never delays
    /// the next tick and never reorders readings.
    pub async fn run(mut self, tick: Duration) {
        let batches = spawn_delivery(Arc::clone(&self.sink));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            for kind in self.take_due(Instant::now()) {
                if self.buffer.is_empty() {
                    debug!("{} flush: buffer empty", kind);
                    continue;
                }

                let batch = self.buffer.drain();
                match batches.try_send((kind, batch)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full((kind, batch))) => {
                        warn!(
                            "{} flush: delivery backlog full, dropping {} readings",
                            kind,
                            batch.len()
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed((kind, batch))) => {
                        error!(
                            "{} flush: delivery task gone, dropping {} readings",
                            kind,
                            batch.len()
                        );
                    }
                }
            }
        }
    }
}

/// Start the task that delivers drained batches one after another.
///
/// It finishes the queued batches and exits once the sender is dropped.
fn spawn_delivery<S: ReadingSink>(sink: Arc<S>) -> mpsc::Sender<Batch> {
    let (tx, mut rx) = mpsc::channel::<Batch>(DELIVERY_QUEUE_LEN);

    tokio::spawn(async move {
        while let Some((kind, batch)) = rx.recv().await {
            let report = deliver(sink.as_ref(), kind, batch).await;
            log_report(&report);
        }
    });

    tx
}

/// Send every reading of `batch` to the sink, in order.
///
/// A failed call is logged and the remaining readings are still sent.
pub async fn deliver<S: ReadingSink>(
    sink: &S,
    kind: FlushKind,
    batch: Vec<SensorReading>,
) -> FlushReport {
    let mut report = FlushReport {
        kind,
        attempted: batch.len(),
        delivered: 0,
        failed: 0,
    };

    for reading in batch {
        let now = OffsetDateTime::now_utc();
        let result = match kind {
            FlushKind::UpdateLatest => {
                sink.upsert_latest(LatestUpdate {
                    data: reading.measurements(),
                    last_updated: now,
                })
                .await
            }
            FlushKind::PersistAll => {
                sink.append_history(HistoryRecord {
                    data: reading,
                    timestamp: now,
                })
                .await
            }
        };

        match result {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(
                    "{} flush: dropping reading sent at {}: {}",
                    kind,
                    format_datetime(&now),
                    e
                );
                report.failed += 1;
            }
        }
    }

    report
}

fn log_report(report: &FlushReport) {
    info!(
        "{} flush: {} readings, {} delivered, {} failed",
        report.kind, report.attempted, report.delivered, report.failed
    );
}
