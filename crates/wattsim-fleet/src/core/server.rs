//! A single server: sockets, wait queue, and power management.
//!
//! The server is a passive member of the cluster component. It owns a
//! simulation context for scheduling and logging, but every event it emits
//! is addressed to the cluster, which routes it back by server index.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use wattsim_core::{log_debug, log_trace, log_warn};
use wattsim_core::{FatalError, Id, SimulationContext};

use crate::core::events::job::{CoreWakeComplete, JobArrival, JobFinished};
use crate::core::events::power::{
    KnightTransitionComplete, KnightWakeComplete, NapTransitionComplete, NapTransitionRequest,
    NapWakeComplete,
};
use crate::core::generator::Generator;
use crate::core::job::{Job, JobId};
use crate::core::power::ServerPowerModel;
use crate::core::power_state::{
    KnightState, NapState, PendingTransition, PowerStateMachine,
};
use crate::core::socket::{CoreState, Socket};

/// How a server picks a socket for the next job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocketSchedPolicy {
    /// Highest-utilization socket with free capacity (consolidate load).
    BinPack,
    /// Lowest-utilization socket with free capacity (spread load).
    LoadBalance,
}

/// Whether idle cores power down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorePowerPolicy {
    /// Cores stay powered while idle.
    NoManagement,
    /// Idle cores park immediately and pay a wake delay on the next job.
    CoreParking,
}

pub struct Server {
    index: usize,
    cluster_id: Id,
    ctx: SimulationContext,
    sockets: Vec<Socket>,
    queue: VecDeque<Job>,
    job_to_socket: HashMap<JobId, usize>,
    scheduler: SocketSchedPolicy,
    core_policy: CorePowerPolicy,
    core_transition_time: f64,
    dvfs_speed: f64,
    paused: bool,
    /// Running job count, cross-checked against actual contents after every
    /// insert and remove. A mismatch is a fatal simulation error.
    jobs_in_server: i64,
    power_model: Box<dyn ServerPowerModel>,
    peak_efficiency: f64,
    peak_efficiency_utilization: f64,
    power_state: PowerStateMachine,
    arrival_generator: Box<dyn Generator>,
    service_generator: Box<dyn Generator>,
}

enum InsertPath {
    Direct,
    Enqueue { wake: bool },
    WakeThenInsert,
}

impl Server {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        sockets: u32,
        cores_per_socket: u32,
        scheduler: SocketSchedPolicy,
        core_policy: CorePowerPolicy,
        core_transition_time: f64,
        power_model: Box<dyn ServerPowerModel>,
        power_state: PowerStateMachine,
        arrival_generator: Box<dyn Generator>,
        service_generator: Box<dyn Generator>,
        cluster_id: Id,
        ctx: SimulationContext,
    ) -> Self {
        assert!(
            sockets > 0 && cores_per_socket > 0,
            "a server needs at least one socket and one core per socket"
        );
        let (peak_efficiency_utilization, peak_efficiency) = power_model.peak_efficiency_scan();
        Self {
            index,
            cluster_id,
            ctx,
            sockets: (0..sockets).map(|_| Socket::new(cores_per_socket)).collect(),
            queue: VecDeque::new(),
            job_to_socket: HashMap::new(),
            scheduler,
            core_policy,
            core_transition_time,
            dvfs_speed: 1.,
            paused: false,
            jobs_in_server: 0,
            power_model,
            peak_efficiency,
            peak_efficiency_utilization,
            power_state,
            arrival_generator,
            service_generator,
        }
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sockets(&self) -> &[Socket] {
        &self.sockets
    }

    pub fn total_capacity(&self) -> usize {
        self.sockets.iter().map(|s| s.cores.len()).sum()
    }

    /// Free cores on enabled sockets.
    pub fn remaining_capacity(&self) -> usize {
        self.sockets
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.free_cores())
            .sum()
    }

    pub fn jobs_in_service(&self) -> usize {
        self.sockets.iter().map(|s| s.jobs_in_service()).sum()
    }

    /// Jobs committed to cores that are still waking up.
    pub fn jobs_waking(&self) -> usize {
        self.sockets.iter().map(|s| s.jobs_waking()).sum()
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    /// Every job currently owned by this server: queued, in service,
    /// or committed to a waking core.
    pub fn jobs_in_system(&self) -> usize {
        self.queue.len() + self.jobs_in_service() + self.jobs_waking()
    }

    pub fn instant_utilization(&self) -> f64 {
        self.jobs_in_service() as f64 / self.total_capacity() as f64
    }

    pub fn instant_utilization_with_queue(&self) -> f64 {
        (self.jobs_in_service() + self.queue.len()) as f64 / self.total_capacity() as f64
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Idle for placement purposes: nothing to do and able to accept work.
    pub fn is_idle(&self) -> bool {
        self.jobs_in_system() == 0 && !self.paused
    }

    pub fn peak_efficiency(&self) -> f64 {
        self.peak_efficiency
    }

    pub fn is_above_peak_efficiency_utilization(&self) -> bool {
        self.instant_utilization() > self.peak_efficiency_utilization
    }

    /// Instantaneous power draw, combining the primary model with the
    /// power-state machine. A fully napping server draws only its nap
    /// figure; a knight server's low-power unit stays on in every state
    /// and is the sole draw once the transition finishes.
    pub fn power(&self) -> f64 {
        let base = self.power_model.power(self.instant_utilization());
        match &self.power_state {
            PowerStateMachine::AlwaysOn => base,
            PowerStateMachine::Nap(unit) => match unit.state {
                NapState::Napping => unit.nap_power,
                NapState::Active => base,
                NapState::TransitioningToNap | NapState::TransitioningToActive => {
                    base + unit.nap_power
                }
            },
            PowerStateMachine::Knight(unit) => match unit.state {
                KnightState::Knight => unit.knight_power,
                _ => base + unit.knight_power,
            },
        }
    }

    pub fn sample_interarrival(&mut self) -> f64 {
        self.arrival_generator.next_sample()
    }

    pub fn sample_service(&mut self) -> f64 {
        self.service_generator.next_sample()
    }

    /// Schedules the arrival of a freshly generated job at this server.
    pub fn schedule_arrival(&mut self, job: Job, delay: f64) {
        self.ctx
            .emit(JobArrival { origin: self.index, job }, self.cluster_id, delay);
    }

    /// Accepts a job, routing it through the server's power-state machine.
    pub fn insert_job(&mut self, time: f64, job: Job) -> Result<(), FatalError> {
        let path = match &self.power_state {
            PowerStateMachine::AlwaysOn => InsertPath::Direct,
            PowerStateMachine::Nap(unit) => match unit.state {
                NapState::Active => InsertPath::Direct,
                NapState::TransitioningToActive => InsertPath::Enqueue { wake: false },
                NapState::Napping | NapState::TransitioningToNap => {
                    InsertPath::Enqueue { wake: true }
                }
            },
            PowerStateMachine::Knight(unit) => {
                // One job's worth of utilization, projected onto full capacity.
                let projected =
                    self.instant_utilization() + 1. / self.total_capacity() as f64;
                match unit.state {
                    KnightState::Active => InsertPath::Direct,
                    KnightState::TransitioningToActive => InsertPath::Direct,
                    KnightState::Knight | KnightState::TransitioningToKnight => {
                        if projected <= unit.capability {
                            InsertPath::Direct
                        } else {
                            InsertPath::WakeThenInsert
                        }
                    }
                }
            }
        };
        match path {
            InsertPath::Direct => self.base_insert(time, job),
            InsertPath::Enqueue { wake } => {
                log_debug!(self.ctx, "queueing job {} while unavailable", job.id);
                self.queue.push_back(job);
                self.jobs_in_server += 1;
                if wake {
                    self.begin_nap_wake(time)?;
                }
                self.check_invariants(time)
            }
            InsertPath::WakeThenInsert => {
                self.transition_to_active(time)?;
                self.base_insert(time, job)
            }
        }
    }

    fn base_insert(&mut self, time: f64, job: Job) -> Result<(), FatalError> {
        self.jobs_in_server += 1;
        if self.paused || self.remaining_capacity() == 0 {
            self.queue.push_back(job);
        } else {
            self.start_service(time, job)?;
        }
        self.check_invariants(time)
    }

    /// Dispatches a job to a socket and core, scheduling its finish event
    /// (or a core wake if the chosen core is parked).
    fn start_service(&mut self, time: f64, mut job: Job) -> Result<(), FatalError> {
        let socket_idx = match self.pick_socket() {
            Some(i) => i,
            None => return Err(self.fatal(time, "no socket with free capacity")),
        };
        let core_idx = match self.sockets[socket_idx].pick_core() {
            Some(i) => i,
            None => return Err(self.fatal(time, "picked socket has no free core")),
        };
        job.mark_start(time);
        let job_id = job.id;
        self.job_to_socket.insert(job_id, socket_idx);
        log_trace!(
            self.ctx,
            "job {} starts on socket {} core {}",
            job_id,
            socket_idx,
            core_idx
        );
        match self.sockets[socket_idx].cores[core_idx].state {
            CoreState::Active => {
                let delay = job.service_time / self.dvfs_speed;
                self.sockets[socket_idx].cores[core_idx].assign(job, time);
                let event = self.ctx.emit(
                    JobFinished { server: self.index, job_id },
                    self.cluster_id,
                    delay,
                );
                self.sockets[socket_idx].cores[core_idx].finish_event = Some(event);
            }
            CoreState::Parked => {
                self.sockets[socket_idx].cores[core_idx].begin_wake(job);
                self.ctx.emit(
                    CoreWakeComplete {
                        server: self.index,
                        socket: socket_idx,
                        core: core_idx,
                    },
                    self.cluster_id,
                    self.core_transition_time,
                );
            }
            CoreState::Waking => {
                return Err(self.fatal(time, "picked a core that is mid-wake"));
            }
        }
        Ok(())
    }

    /// Socket choice per the scheduling policy; ties go to the lowest index.
    fn pick_socket(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, socket) in self.sockets.iter().enumerate() {
            if !socket.enabled || socket.free_cores() == 0 {
                continue;
            }
            let util = socket.utilization();
            let better = match best {
                None => true,
                Some((_, best_util)) => match self.scheduler {
                    SocketSchedPolicy::BinPack => util > best_util,
                    SocketSchedPolicy::LoadBalance => util < best_util,
                },
            };
            if better {
                best = Some((i, util));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Takes a finished job off its core and starts the oldest queued job
    /// if one is waiting.
    pub fn remove_job(&mut self, time: f64, job_id: JobId) -> Result<Job, FatalError> {
        let socket_idx = match self.job_to_socket.remove(&job_id) {
            Some(i) => i,
            None => {
                return Err(
                    self.fatal(time, format!("job {} has no socket mapping", job_id))
                )
            }
        };
        let core_idx = match self.sockets[socket_idx]
            .cores
            .iter()
            .position(|c| c.job.as_ref().map_or(false, |j| j.id == job_id))
        {
            Some(i) => i,
            None => {
                return Err(self.fatal(
                    time,
                    format!("job {} is not on its mapped socket {}", job_id, socket_idx),
                ))
            }
        };
        let job_waiting = !self.queue.is_empty();
        let park = self.core_policy == CorePowerPolicy::CoreParking && !job_waiting;
        let job = match self.sockets[socket_idx].cores[core_idx].release(park) {
            Some(job) => job,
            None => return Err(self.fatal(time, "core lost its job before removal")),
        };
        self.jobs_in_server -= 1;
        log_trace!(self.ctx, "job {} finished", job_id);
        if job_waiting {
            if let Some(next) = self.queue.pop_front() {
                self.start_service(time, next)?;
            }
        }
        self.check_invariants(time)?;
        Ok(job)
    }

    /// Power-state hook after a removal: an idle nap server asks the cluster
    /// to evaluate a nap, a lightly loaded knight server sheds capacity.
    pub fn on_job_removed(&mut self, time: f64) -> Result<(), FatalError> {
        let nap_request = matches!(
            &self.power_state,
            PowerStateMachine::Nap(u) if u.state == NapState::Active && u.pending_request.is_none()
        ) && self.jobs_in_system() == 0;
        if nap_request {
            let event =
                self.ctx
                    .emit(NapTransitionRequest { server: self.index }, self.cluster_id, 0.);
            if let PowerStateMachine::Nap(unit) = &mut self.power_state {
                unit.pending_request = Some(event);
            }
        }
        let knight_down = matches!(
            &self.power_state,
            PowerStateMachine::Knight(u)
                if u.state == KnightState::Active && self.instant_utilization() < u.capability
        );
        if knight_down {
            self.transition_to_knight(time)?;
        }
        Ok(())
    }

    /// Delivery of a nap request. All conditions are rechecked here because
    /// the server's situation may have changed since the request was made.
    pub fn fire_nap_request(&mut self, time: f64, idle_servers: usize) -> Result<(), FatalError> {
        let in_system = self.jobs_in_system();
        let paused = self.paused;
        let index = self.index;
        let cluster_id = self.cluster_id;
        let unit = match &mut self.power_state {
            PowerStateMachine::Nap(u) => u,
            _ => return Err(self.fatal(time, "nap request on a server without nap management")),
        };
        unit.pending_request = None;
        if unit.state != NapState::Active || paused || in_system > 0 {
            return Ok(());
        }
        // Keep at least one other idle server awake as standby, unless this
        // server wakes up in under a second anyway.
        if idle_servers <= 1 && unit.transition_time >= 1. {
            return Ok(());
        }
        unit.state = NapState::TransitioningToNap;
        let delay = unit.transition_time;
        let event = self
            .ctx
            .emit(NapTransitionComplete { server: index }, cluster_id, delay);
        if let PowerStateMachine::Nap(unit) = &mut self.power_state {
            unit.pending_transition = Some(PendingTransition {
                event,
                fire_time: time + delay,
            });
        }
        log_debug!(self.ctx, "starting nap transition");
        self.pause_processing(time);
        Ok(())
    }

    /// An arrival found the server napping or on its way there: queue stays
    /// as is, the server starts waking. An in-flight transition into nap is
    /// cancelled and its remaining delay is paid ahead of the wake.
    fn begin_nap_wake(&mut self, time: f64) -> Result<(), FatalError> {
        let index = self.index;
        let cluster_id = self.cluster_id;
        let (state, transition_time, pending) = match &mut self.power_state {
            PowerStateMachine::Nap(u) => (u.state, u.transition_time, u.pending_transition.take()),
            _ => return Err(self.fatal(time, "nap wake on a server without nap management")),
        };
        let mut extra = 0.;
        match state {
            NapState::Napping => {}
            NapState::TransitioningToNap => {
                if let Some(p) = pending {
                    self.ctx.cancel_event(p.event);
                    extra = p.fire_time - time;
                }
            }
            NapState::Active | NapState::TransitioningToActive => {
                return Err(self.fatal(time, "nap wake requested while not napping"));
            }
        }
        if let PowerStateMachine::Nap(unit) = &mut self.power_state {
            unit.state = NapState::TransitioningToActive;
        }
        log_debug!(self.ctx, "waking from nap, ready in {:.3}", extra + transition_time);
        self.ctx
            .emit(NapWakeComplete { server: index }, cluster_id, extra + transition_time);
        Ok(())
    }

    /// The transition into nap completes. Stale completions (the server was
    /// woken meanwhile) are ignored.
    pub fn fire_nap_complete(&mut self, time: f64) -> Result<(), FatalError> {
        match &mut self.power_state {
            PowerStateMachine::Nap(unit) => {
                if unit.state == NapState::TransitioningToNap {
                    unit.state = NapState::Napping;
                    unit.pending_transition = None;
                    log_debug!(self.ctx, "entered nap state");
                }
                Ok(())
            }
            _ => Err(self.fatal(time, "nap completion on a server without nap management")),
        }
    }

    /// The wake from nap completes: resume processing and drain the queue.
    pub fn fire_nap_wake_complete(&mut self, time: f64) -> Result<(), FatalError> {
        let transitioning = matches!(
            &self.power_state,
            PowerStateMachine::Nap(u) if u.state == NapState::TransitioningToActive
        );
        if !transitioning {
            return Ok(());
        }
        if let PowerStateMachine::Nap(unit) = &mut self.power_state {
            unit.state = NapState::Active;
        }
        log_debug!(self.ctx, "awake after nap");
        self.resume_processing(time)
    }

    /// Drops to knight mode: disable a capability-proportional share of
    /// sockets, slow the remaining cores down, and schedule the transition
    /// completion. Most of the capacity reduction comes from the slowdown.
    pub fn transition_to_knight(&mut self, time: f64) -> Result<(), FatalError> {
        let (capability, transition_time, speed, busy) = match &self.power_state {
            PowerStateMachine::Knight(u) => (
                u.capability,
                u.transition_time,
                u.speed,
                u.state != KnightState::Active,
            ),
            _ => {
                return Err(
                    self.fatal(time, "knight transition on a server without knight management")
                )
            }
        };
        if busy {
            return Err(self.fatal(time, "knight transition while already leaving active state"));
        }
        let shed = (self.sockets.len() as f64 * capability) as usize;
        self.disable_sockets(shed);
        self.set_dvfs_speed(time, speed);
        let event = self.ctx.emit(
            KnightTransitionComplete { server: self.index },
            self.cluster_id,
            transition_time,
        );
        if let PowerStateMachine::Knight(unit) = &mut self.power_state {
            unit.state = KnightState::TransitioningToKnight;
            unit.pending_transition = Some(PendingTransition {
                event,
                fire_time: time + transition_time,
            });
        }
        log_debug!(self.ctx, "starting knight transition, disabling {} sockets", shed);
        Ok(())
    }

    /// Restores full capacity from knight mode. An in-flight transition into
    /// knight is cancelled and its remaining delay is paid ahead of the wake.
    pub fn transition_to_active(&mut self, time: f64) -> Result<(), FatalError> {
        let index = self.index;
        let cluster_id = self.cluster_id;
        let (state, transition_time, pending) = match &mut self.power_state {
            PowerStateMachine::Knight(u) => {
                (u.state, u.transition_time, u.pending_transition.take())
            }
            _ => return Err(self.fatal(time, "knight wake on a server without knight management")),
        };
        match state {
            KnightState::Active => {
                return Err(self.fatal(time, "knight wake while fully active"));
            }
            KnightState::TransitioningToActive => return Ok(()),
            KnightState::Knight | KnightState::TransitioningToKnight => {}
        }
        let mut extra = 0.;
        if state == KnightState::TransitioningToKnight {
            if let Some(p) = pending {
                self.ctx.cancel_event(p.event);
                extra = p.fire_time - time;
            }
        }
        if let PowerStateMachine::Knight(unit) = &mut self.power_state {
            unit.state = KnightState::TransitioningToActive;
        }
        log_debug!(
            self.ctx,
            "leaving knight mode, full capacity in {:.3}",
            extra + transition_time
        );
        self.ctx.emit(
            KnightWakeComplete { server: index },
            cluster_id,
            extra + transition_time,
        );
        Ok(())
    }

    /// The transition into knight completes. Stale completions are ignored.
    pub fn fire_knight_complete(&mut self, time: f64) -> Result<(), FatalError> {
        match &mut self.power_state {
            PowerStateMachine::Knight(unit) => {
                if unit.state == KnightState::TransitioningToKnight {
                    unit.state = KnightState::Knight;
                    unit.pending_transition = None;
                    log_debug!(self.ctx, "entered knight state");
                }
                Ok(())
            }
            _ => Err(self.fatal(time, "knight completion on a server without knight management")),
        }
    }

    /// The wake from knight completes: re-enable sockets, restore full
    /// speed, and start queued jobs on the recovered capacity.
    pub fn fire_knight_wake_complete(&mut self, time: f64) -> Result<(), FatalError> {
        let transitioning = matches!(
            &self.power_state,
            PowerStateMachine::Knight(u) if u.state == KnightState::TransitioningToActive
        );
        if !transitioning {
            return Ok(());
        }
        if let PowerStateMachine::Knight(unit) = &mut self.power_state {
            unit.state = KnightState::Active;
        }
        log_debug!(self.ctx, "back to full capacity");
        self.enable_sockets();
        self.set_dvfs_speed(time, 1.);
        self.drain_queue(time)
    }

    /// A parked core finished waking: start serving its committed job.
    pub fn fire_core_wake(&mut self, time: f64, socket: usize, core: usize) -> Result<(), FatalError> {
        if socket >= self.sockets.len() || core >= self.sockets[socket].cores.len() {
            return Err(self.fatal(time, "core wake for an unknown core"));
        }
        if !self.sockets[socket].cores[core].complete_wake(time) {
            return Ok(());
        }
        if let Some(job_id) = self.sockets[socket].cores[core].job.as_ref().map(|j| j.id) {
            if self.paused {
                self.sockets[socket].cores[core].suspended = true;
            } else {
                let delay = self.sockets[socket].cores[core].remaining_work / self.dvfs_speed;
                let event = self.ctx.emit(
                    JobFinished { server: self.index, job_id },
                    self.cluster_id,
                    delay,
                );
                self.sockets[socket].cores[core].finish_event = Some(event);
            }
        }
        Ok(())
    }

    /// Freezes all job progress: running cores bank their remaining work and
    /// their finish events are cancelled. Arrivals keep queueing meanwhile.
    pub fn pause_processing(&mut self, time: f64) {
        if self.paused {
            return;
        }
        self.paused = true;
        let speed = self.dvfs_speed;
        for socket in self.sockets.iter_mut() {
            for core in socket.cores.iter_mut() {
                if core.is_busy() && !core.suspended {
                    core.advance(time, speed);
                    core.suspended = true;
                    if let Some(event) = core.finish_event.take() {
                        self.ctx.cancel_event(event);
                    }
                }
            }
        }
    }

    /// Thaws suspended cores, rescheduling their finishes from the banked
    /// remaining work, then dispatches queued jobs onto free capacity.
    pub fn resume_processing(&mut self, time: f64) -> Result<(), FatalError> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        let speed = self.dvfs_speed;
        for s in 0..self.sockets.len() {
            for c in 0..self.sockets[s].cores.len() {
                if !self.sockets[s].cores[c].suspended {
                    continue;
                }
                self.sockets[s].cores[c].suspended = false;
                self.sockets[s].cores[c].last_update = time;
                if let Some(job_id) = self.sockets[s].cores[c].job.as_ref().map(|j| j.id) {
                    let delay = self.sockets[s].cores[c].remaining_work / speed;
                    let event = self.ctx.emit(
                        JobFinished { server: self.index, job_id },
                        self.cluster_id,
                        delay,
                    );
                    self.sockets[s].cores[c].finish_event = Some(event);
                }
            }
        }
        self.drain_queue(time)
    }

    fn drain_queue(&mut self, time: f64) -> Result<(), FatalError> {
        while !self.paused && self.remaining_capacity() > 0 {
            match self.queue.pop_front() {
                Some(job) => self.start_service(time, job)?,
                None => break,
            }
        }
        Ok(())
    }

    /// Rescales in-flight work to a new DVFS speed, rescheduling every
    /// running core's finish event.
    pub fn set_dvfs_speed(&mut self, time: f64, speed: f64) {
        let old = self.dvfs_speed;
        for s in 0..self.sockets.len() {
            for c in 0..self.sockets[s].cores.len() {
                if !self.sockets[s].cores[c].is_busy() {
                    continue;
                }
                self.sockets[s].cores[c].advance(time, old);
                if self.sockets[s].cores[c].suspended {
                    continue;
                }
                if let Some(event) = self.sockets[s].cores[c].finish_event.take() {
                    self.ctx.cancel_event(event);
                }
                if let Some(job_id) = self.sockets[s].cores[c].job.as_ref().map(|j| j.id) {
                    let delay = self.sockets[s].cores[c].remaining_work / speed;
                    let event = self.ctx.emit(
                        JobFinished { server: self.index, job_id },
                        self.cluster_id,
                        delay,
                    );
                    self.sockets[s].cores[c].finish_event = Some(event);
                }
            }
        }
        self.dvfs_speed = speed;
    }

    /// Disables up to `count` fully idle sockets, lowest index first.
    pub fn disable_sockets(&mut self, count: usize) {
        let mut disabled = 0;
        for socket in self.sockets.iter_mut() {
            if disabled == count {
                break;
            }
            if socket.enabled && socket.jobs_in_service() == 0 && socket.jobs_waking() == 0 {
                socket.enabled = false;
                disabled += 1;
            }
        }
        if disabled < count {
            log_warn!(
                self.ctx,
                "only {} of {} sockets were idle and could be disabled",
                disabled,
                count
            );
        }
    }

    pub fn enable_sockets(&mut self) {
        for socket in self.sockets.iter_mut() {
            socket.enabled = true;
        }
    }

    fn check_invariants(&self, time: f64) -> Result<(), FatalError> {
        let actual = self.jobs_in_system() as i64;
        if actual != self.jobs_in_server {
            return Err(self.fatal(
                time,
                format!(
                    "job accounting broken: counter {} but found {} (queued {}, in service {}, waking {})",
                    self.jobs_in_server,
                    actual,
                    self.queue.len(),
                    self.jobs_in_service(),
                    self.jobs_waking()
                ),
            ));
        }
        Ok(())
    }

    fn fatal(&self, time: f64, message: impl Into<String>) -> FatalError {
        FatalError::new(
            time,
            self.ctx.id(),
            format!("server '{}': {}", self.ctx.name(), message.into()),
        )
    }
}
