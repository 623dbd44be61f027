/// In-memory buffer of readings waiting to be flushed
use std::sync::{Mutex, MutexGuard};

use crate::models::SensorReading;

/// Ordered, unbounded list of pending readings.
///
/// Shared between the scan callback and the flush scheduler. The only
/// mutating operations are `append` and `drain`; both take the same lock,
/// so a reading is either in the drained batch or left for the next one.
#[derive(Debug, Default)]
pub struct ReadingBuffer {
    readings: Mutex<Vec<SensorReading>>,
}

impl ReadingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, reading: SensorReading) {
        self.lock().push(reading);
    }

    /// Take every buffered reading in insertion order, leaving the buffer empty.
    pub fn drain(&self) -> Vec<SensorReading> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SensorReading>> {
        // A panic while holding the lock cannot leave a Vec half-written
        self.readings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
