//! The cluster: job placement across servers and event dispatch.
//!
//! The cluster is the single event-handling component of the simulation.
//! It owns every server, routes arrivals to a target server according to
//! the placement policy, and relays power-state and finish events back to
//! the server they reference.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use wattsim_core::cast;
use wattsim_core::log_trace;
use wattsim_core::{Event, EventHandler, FatalError, SimulationContext};

use crate::core::events::job::{CoreWakeComplete, JobArrival, JobFinished};
use crate::core::events::monitoring::MonitoringTick;
use crate::core::events::power::{
    KnightTransitionComplete, KnightWakeComplete, NapTransitionComplete, NapTransitionRequest,
    NapWakeComplete,
};
use crate::core::job::{Job, JobId};
use crate::core::server::Server;
use crate::core::stats::{Metric, StatsSink, TimeWeightedMetric};

/// How arrivals are placed across servers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterSchedPolicy {
    /// Every job stays on the server whose generator produced it.
    Uniform,
    /// Consolidate onto the most loaded servers first.
    Pack,
    /// Prefer servers below their peak-efficiency utilization, most
    /// efficient first.
    Peak,
}

pub struct DataCenter {
    servers: Vec<Server>,
    scheduler: ClusterSchedPolicy,
    stats: Rc<RefCell<dyn StatsSink>>,
    next_job_id: JobId,
    stats_interval: f64,
    ctx: SimulationContext,
}

impl DataCenter {
    pub fn new(
        scheduler: ClusterSchedPolicy,
        stats: Rc<RefCell<dyn StatsSink>>,
        stats_interval: f64,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            servers: Vec::new(),
            scheduler,
            stats,
            next_job_id: 0,
            stats_interval,
            ctx,
        }
    }

    /// Adds a server and returns its index. Indices are stable for the
    /// lifetime of the simulation since events refer to servers by index.
    pub fn add_server(&mut self, server: Server) -> usize {
        self.servers.push(server);
        self.servers.len() - 1
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn server(&self, index: usize) -> &Server {
        &self.servers[index]
    }

    pub fn server_mut(&mut self, index: usize) -> &mut Server {
        &mut self.servers[index]
    }

    /// Schedules the first arrival for every server and the first
    /// monitoring tick. Call once before running the simulation.
    pub fn start(&mut self) {
        for origin in 0..self.servers.len() {
            self.create_new_arrival(origin);
        }
        if self.stats_interval > 0. {
            self.ctx.emit_self(MonitoringTick {}, self.stats_interval);
        }
    }

    /// Draws the next interarrival and service time from the origin
    /// server's generators and schedules the arrival.
    pub fn create_new_arrival(&mut self, origin: usize) {
        let interarrival = self.servers[origin].sample_interarrival();
        let service_time = self.servers[origin].sample_service();
        {
            let mut stats = self.stats.borrow_mut();
            stats.add_sample(Metric::GeneratedInterarrivalTime, interarrival);
            stats.add_sample(Metric::GeneratedServiceTime, service_time);
        }
        let id = self.next_job_id;
        self.next_job_id += 1;
        let job = Job::new(id, service_time, self.ctx.time() + interarrival);
        self.servers[origin].schedule_arrival(job, interarrival);
    }

    /// Replaces the placement policy. Takes effect from the next arrival.
    pub fn set_scheduler(&mut self, scheduler: ClusterSchedPolicy) {
        self.scheduler = scheduler;
    }

    /// Servers with nothing to do that are able to accept work.
    pub fn num_idle_servers(&self) -> usize {
        self.servers.iter().filter(|s| s.is_idle()).count()
    }

    /// True when every server runs above its peak-efficiency utilization.
    pub fn all_servers_above_peak(&self) -> bool {
        self.servers
            .iter()
            .all(|s| s.is_above_peak_efficiency_utilization())
    }

    fn on_job_arrival(&mut self, time: f64, origin: usize, job: Job) -> Result<(), FatalError> {
        self.check_server(time, origin)?;
        let target = self.target_server(origin);
        log_trace!(
            self.ctx,
            "job {} from {} placed on {}",
            job.id,
            self.servers[origin].name(),
            self.servers[target].name()
        );
        self.servers[target].insert_job(time, job)?;
        self.create_new_arrival(origin);
        Ok(())
    }

    fn on_job_finished(&mut self, time: f64, server: usize, job_id: JobId) -> Result<(), FatalError> {
        self.check_server(time, server)?;
        let job = self.servers[server].remove_job(time, job_id)?;
        self.stats
            .borrow_mut()
            .add_sample(Metric::SojournTime, time - job.arrival_time);
        self.servers[server].on_job_removed(time)
    }

    fn target_server(&self, origin: usize) -> usize {
        match self.scheduler {
            ClusterSchedPolicy::Uniform => origin,
            ClusterSchedPolicy::Pack => self.pack_target(origin),
            ClusterSchedPolicy::Peak => self.peak_target(origin),
        }
    }

    /// Server indices ordered for packing: utilization (including queued
    /// jobs) descending, index ascending on ties.
    fn utilization_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.servers.len()).collect();
        order.sort_by(|&a, &b| {
            self.servers[b]
                .instant_utilization_with_queue()
                .total_cmp(&self.servers[a].instant_utilization_with_queue())
        });
        order
    }

    /// If no server is idle, wake a paused idle server to keep standby
    /// capacity: the first paused server in placement order gets the job
    /// (queued behind its wake-up). A paused server that already holds work
    /// is being woken anyway, so nothing is picked then.
    fn standby_target(&self, order: &[usize]) -> Option<usize> {
        for &i in order {
            let server = &self.servers[i];
            if server.is_paused() {
                if server.jobs_in_service() > 0 || server.queue_length() > 0 {
                    return None;
                }
                return Some(i);
            }
        }
        None
    }

    fn pack_target(&self, origin: usize) -> usize {
        let order = self.utilization_order();
        if self.num_idle_servers() == 0 {
            if let Some(target) = self.standby_target(&order) {
                return target;
            }
        }
        let mut last_active = origin;
        for &i in &order {
            let server = &self.servers[i];
            if !server.is_paused() {
                last_active = i;
                if server.remaining_capacity() > 0 {
                    return i;
                }
            }
        }
        // Everything is saturated: overflow onto the last unpaused server.
        last_active
    }

    fn peak_target(&self, origin: usize) -> usize {
        let mut order: Vec<usize> = (0..self.servers.len()).collect();
        order.sort_by(|&a, &b| {
            self.servers[b]
                .peak_efficiency()
                .total_cmp(&self.servers[a].peak_efficiency())
                .then_with(|| {
                    self.servers[b]
                        .instant_utilization_with_queue()
                        .total_cmp(&self.servers[a].instant_utilization_with_queue())
                })
        });
        if self.num_idle_servers() == 0 {
            if let Some(target) = self.standby_target(&order) {
                return target;
            }
        }
        let mut last_active = origin;
        // Least-loaded server already past its efficiency point, kept as a
        // fallback when every server is above peak.
        let mut lowest_above_peak = None;
        for &i in &order {
            let server = &self.servers[i];
            if server.is_paused() {
                continue;
            }
            last_active = i;
            if server.is_above_peak_efficiency_utilization() {
                if server.remaining_capacity() > 0 {
                    lowest_above_peak = Some(i);
                }
                continue;
            }
            if server.remaining_capacity() > 0 {
                return i;
            }
        }
        lowest_above_peak.unwrap_or(last_active)
    }

    fn update_statistics(&mut self, time: f64) {
        let mut stats = self.stats.borrow_mut();
        let mut total_power = 0.;
        for server in &self.servers {
            let power = server.power();
            total_power += power;
            stats.add_sample(Metric::ServerPower, power);
            stats.add_sample(Metric::ServerUtilization, server.instant_utilization());
            stats.add_sample(
                Metric::ServerIdleFraction,
                if server.is_idle() { 1. } else { 0. },
            );
        }
        stats.add_time_weighted(TimeWeightedMetric::ClusterPower, total_power, time);
    }

    fn check_server(&self, time: f64, index: usize) -> Result<(), FatalError> {
        if index >= self.servers.len() {
            return Err(FatalError::new(
                time,
                self.ctx.id(),
                format!("event references unknown server {}", index),
            ));
        }
        Ok(())
    }
}

impl EventHandler for DataCenter {
    fn on(&mut self, event: Event) -> Result<(), FatalError> {
        let time = event.time;
        cast!(match event.data {
            JobArrival { origin, job } => {
                self.on_job_arrival(time, origin, job)?;
            }
            JobFinished { server, job_id } => {
                self.on_job_finished(time, server, job_id)?;
            }
            CoreWakeComplete { server, socket, core } => {
                self.check_server(time, server)?;
                self.servers[server].fire_core_wake(time, socket, core)?;
            }
            NapTransitionRequest { server } => {
                self.check_server(time, server)?;
                let idle_servers = self.num_idle_servers();
                self.servers[server].fire_nap_request(time, idle_servers)?;
            }
            NapTransitionComplete { server } => {
                self.check_server(time, server)?;
                self.servers[server].fire_nap_complete(time)?;
            }
            NapWakeComplete { server } => {
                self.check_server(time, server)?;
                self.servers[server].fire_nap_wake_complete(time)?;
            }
            KnightTransitionComplete { server } => {
                self.check_server(time, server)?;
                self.servers[server].fire_knight_complete(time)?;
            }
            KnightWakeComplete { server } => {
                self.check_server(time, server)?;
                self.servers[server].fire_knight_wake_complete(time)?;
            }
            MonitoringTick {} => {
                self.update_statistics(time);
                let interval = self.stats_interval;
                self.ctx.emit_self(MonitoringTick {}, interval);
            }
        });
        Ok(())
    }
}
