//! Event payloads exchanged within the cluster.
//!
//! All events are addressed to the cluster component and reference servers
//! by their index in the cluster's server list, so payloads stay plain data
//! and stale deliveries can be detected by checking current server state.

/// Workload lifecycle events.
pub mod job {
    use serde::Serialize;

    use crate::core::job::{Job, JobId};

    /// A job reaches the cluster, addressed to its origin server's scheduler.
    #[derive(Clone, Serialize)]
    pub struct JobArrival {
        /// Server whose workload generator produced the job.
        pub origin: usize,
        pub job: Job,
    }

    /// A running job's service requirement is exhausted.
    #[derive(Clone, Serialize)]
    pub struct JobFinished {
        pub server: usize,
        pub job_id: JobId,
    }

    /// A parked core finished waking and can start its committed job.
    #[derive(Clone, Serialize)]
    pub struct CoreWakeComplete {
        pub server: usize,
        pub socket: usize,
        pub core: usize,
    }
}

/// Server power-state transition events.
pub mod power {
    use serde::Serialize;

    /// Zero-delay request to evaluate whether an idle server should nap.
    /// Conditions are rechecked at delivery time, not at scheduling time.
    #[derive(Clone, Serialize)]
    pub struct NapTransitionRequest {
        pub server: usize,
    }

    /// The transition into the nap state completes.
    #[derive(Clone, Serialize)]
    pub struct NapTransitionComplete {
        pub server: usize,
    }

    /// A napping server finishes waking back to active.
    #[derive(Clone, Serialize)]
    pub struct NapWakeComplete {
        pub server: usize,
    }

    /// The transition into the low-power knight state completes.
    #[derive(Clone, Serialize)]
    pub struct KnightTransitionComplete {
        pub server: usize,
    }

    /// A knight server finishes restoring full capacity.
    #[derive(Clone, Serialize)]
    pub struct KnightWakeComplete {
        pub server: usize,
    }
}

/// Periodic statistics sampling.
pub mod monitoring {
    use serde::Serialize;

    /// Self-message driving periodic collection of power and utilization.
    #[derive(Clone, Serialize)]
    pub struct MonitoringTick {}
}
