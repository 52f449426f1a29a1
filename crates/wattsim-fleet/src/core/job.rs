//! Units of work processed by servers.

use serde::Serialize;

/// Job identifier, unique within a simulation run.
pub type JobId = u64;

/// A unit of work with a fixed service-time requirement.
///
/// A job is owned by exactly one container at a time: a server's wait queue,
/// a core's in-service slot, or a core's pending-wake slot.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    /// Amount of work in seconds at DVFS speed 1.0.
    pub service_time: f64,
    /// Time the job arrived at the cluster.
    pub arrival_time: f64,
    /// Time the job was first dispatched to a socket, unset until then.
    pub start_time: Option<f64>,
}

impl Job {
    pub fn new(id: JobId, service_time: f64, arrival_time: f64) -> Self {
        Self {
            id,
            service_time,
            arrival_time,
            start_time: None,
        }
    }

    /// Records the service start time. Only the first call takes effect.
    pub fn mark_start(&mut self, time: f64) {
        if self.start_time.is_none() {
            self.start_time = Some(time);
        }
    }
}
