//! Sockets and cores, the execution resources of a server.
//!
//! These are passive structures: servers drive all transitions and own the
//! event scheduling, cores and sockets only keep the per-resource state
//! (running job, remaining work, park/wake status).

use wattsim_core::EventId;

use crate::core::job::Job;

/// Power state of a single core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreState {
    /// Powered and able to run a job immediately.
    Active,
    /// Powered down while idle, must wake before serving.
    Parked,
    /// Waking up with a job already committed to it.
    Waking,
}

/// A single execution unit running at most one job at a time.
#[derive(Debug)]
pub struct CpuCore {
    pub state: CoreState,
    /// The job running on (or committed to) this core.
    pub job: Option<Job>,
    /// Work left in seconds at DVFS speed 1.0. Only meaningful while busy.
    pub remaining_work: f64,
    /// Time of the last remaining-work update.
    pub last_update: f64,
    /// Pending finish event for the running job.
    pub finish_event: Option<EventId>,
    /// Progress is frozen while the owning server is paused.
    pub suspended: bool,
}

impl CpuCore {
    pub fn new() -> Self {
        Self {
            state: CoreState::Active,
            job: None,
            remaining_work: 0.,
            last_update: 0.,
            finish_event: None,
            suspended: false,
        }
    }

    /// Running a job right now (not merely committed to one while waking).
    pub fn is_busy(&self) -> bool {
        self.state == CoreState::Active && self.job.is_some()
    }

    /// Can accept a job, possibly after a wake transition.
    pub fn is_free(&self) -> bool {
        self.job.is_none() && self.state != CoreState::Waking
    }

    /// Places a job on an active idle core and initializes its work counter.
    pub fn assign(&mut self, job: Job, time: f64) {
        debug_assert!(self.state == CoreState::Active && self.job.is_none());
        self.remaining_work = job.service_time;
        self.last_update = time;
        self.job = Some(job);
    }

    /// Commits a job to a parked core; the core serves it once awake.
    pub fn begin_wake(&mut self, job: Job) {
        debug_assert!(self.state == CoreState::Parked && self.job.is_none());
        self.state = CoreState::Waking;
        self.job = Some(job);
    }

    /// Finishes the wake transition. Returns false on a stale completion.
    pub fn complete_wake(&mut self, time: f64) -> bool {
        if self.state != CoreState::Waking || self.job.is_none() {
            return false;
        }
        self.state = CoreState::Active;
        self.remaining_work = self.job.as_ref().map(|j| j.service_time).unwrap_or(0.);
        self.last_update = time;
        true
    }

    /// Folds elapsed progress at the given speed into the work counter.
    pub fn advance(&mut self, time: f64, speed: f64) {
        if self.is_busy() && !self.suspended {
            self.remaining_work -= (time - self.last_update) * speed;
            if self.remaining_work < 0. {
                self.remaining_work = 0.;
            }
        }
        self.last_update = time;
    }

    /// Removes the finished (or displaced) job, optionally parking the core.
    pub fn release(&mut self, park: bool) -> Option<Job> {
        let job = self.job.take();
        self.finish_event = None;
        self.remaining_work = 0.;
        self.state = if park { CoreState::Parked } else { CoreState::Active };
        job
    }
}

impl Default for CpuCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A group of cores sharing an enable/disable switch.
///
/// Disabled sockets keep running nothing (only idle sockets get disabled)
/// and are skipped by job placement until re-enabled.
#[derive(Debug)]
pub struct Socket {
    pub cores: Vec<CpuCore>,
    pub enabled: bool,
}

impl Socket {
    pub fn new(core_count: u32) -> Self {
        Self {
            cores: (0..core_count).map(|_| CpuCore::new()).collect(),
            enabled: true,
        }
    }

    /// Number of cores that could take a job (active idle or parked).
    pub fn free_cores(&self) -> usize {
        self.cores.iter().filter(|c| c.is_free()).count()
    }

    pub fn jobs_in_service(&self) -> usize {
        self.cores.iter().filter(|c| c.is_busy()).count()
    }

    /// Jobs committed to cores that are still waking up.
    pub fn jobs_waking(&self) -> usize {
        self.cores
            .iter()
            .filter(|c| c.state == CoreState::Waking)
            .count()
    }

    /// Fraction of this socket's cores running a job.
    pub fn utilization(&self) -> f64 {
        self.jobs_in_service() as f64 / self.cores.len() as f64
    }

    /// Index of a core to serve the next job: active idle cores are
    /// preferred over parked ones to avoid paying a wake transition.
    pub fn pick_core(&self) -> Option<usize> {
        let mut parked = None;
        for (i, core) in self.cores.iter().enumerate() {
            if !core.is_free() {
                continue;
            }
            match core.state {
                CoreState::Active => return Some(i),
                CoreState::Parked => {
                    if parked.is_none() {
                        parked = Some(i);
                    }
                }
                CoreState::Waking => {}
            }
        }
        parked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: u64, service_time: f64) -> Job {
        Job::new(id, service_time, 0.)
    }

    #[test]
    fn assign_and_release() {
        let mut socket = Socket::new(2);
        assert_eq!(socket.free_cores(), 2);
        socket.cores[0].assign(job(1, 10.), 0.);
        assert_eq!(socket.jobs_in_service(), 1);
        assert_eq!(socket.utilization(), 0.5);
        let released = socket.cores[0].release(false);
        assert_eq!(released.unwrap().id, 1);
        assert_eq!(socket.free_cores(), 2);
    }

    #[test]
    fn pick_prefers_active_over_parked() {
        let mut socket = Socket::new(3);
        socket.cores[0].state = CoreState::Parked;
        socket.cores[1].assign(job(1, 5.), 0.);
        assert_eq!(socket.pick_core(), Some(2));
        socket.cores[2].assign(job(2, 5.), 0.);
        assert_eq!(socket.pick_core(), Some(0));
    }

    #[test]
    fn waking_core_counts_committed_job() {
        let mut socket = Socket::new(1);
        socket.cores[0].state = CoreState::Parked;
        socket.cores[0].begin_wake(job(1, 5.));
        assert_eq!(socket.jobs_in_service(), 0);
        assert_eq!(socket.jobs_waking(), 1);
        assert_eq!(socket.free_cores(), 0);
        assert!(socket.cores[0].complete_wake(3.));
        assert_eq!(socket.jobs_in_service(), 1);
        // A second completion for the same core is stale.
        assert!(!socket.cores[0].complete_wake(3.));
    }

    #[test]
    fn advance_tracks_remaining_work() {
        let mut core = CpuCore::new();
        core.assign(job(1, 10.), 0.);
        core.advance(4., 1.);
        assert!((core.remaining_work - 6.).abs() < 1e-12);
        core.advance(6., 0.5);
        assert!((core.remaining_work - 5.).abs() < 1e-12);
    }
}
