//! Top-level facade gluing the cluster, servers and statistics together.

use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use wattsim_core::{FatalError, Id, Simulation};

use crate::core::cluster::{ClusterSchedPolicy, DataCenter};
use crate::core::config::{PowerStateConfig, ServerConfig, SimulationConfig};
use crate::core::generator::{ExponentialGenerator, Generator};
use crate::core::power::{LinearPowerModel, ServerPowerModel};
use crate::core::power_state::{KnightUnit, NapUnit, PowerStateMachine};
use crate::core::server::Server;
use crate::core::stats::RunStats;

/// A configured fleet simulation ready to run.
///
/// Owns the simulation engine, the cluster component and the statistics
/// store, and exposes stepping methods that surface fatal errors from the
/// cluster's invariant checks.
pub struct FleetSimulation {
    cluster: Rc<RefCell<DataCenter>>,
    cluster_id: Id,
    stats: Rc<RefCell<RunStats>>,
    sim: Simulation,
}

impl FleetSimulation {
    /// Creates the cluster and one server per configured group entry.
    /// Generator seeds are derived from the simulation-wide seed, so runs
    /// with the same configuration and seed are identical.
    pub fn new(mut sim: Simulation, config: SimulationConfig) -> Self {
        let stats = rc!(refcell!(RunStats::new()));
        let cluster_ctx = sim.create_context("cluster");
        let cluster = rc!(refcell!(DataCenter::new(
            config.scheduler,
            stats.clone(),
            config.stats_interval,
            cluster_ctx,
        )));
        let cluster_id = sim.add_handler("cluster", cluster.clone());
        let mut fleet = Self {
            cluster,
            cluster_id,
            stats,
            sim,
        };
        for group in &config.servers {
            for _ in 0..group.count {
                fleet.add_server(group);
            }
        }
        fleet
    }

    /// Adds a server with exponential workload generators and a linear
    /// power model built from the group configuration. Returns its index.
    pub fn add_server(&mut self, config: &ServerConfig) -> usize {
        let index = self.cluster.borrow().server_count();
        let name = format!("{}-{}", config.name_prefix, index);
        let arrival_seed = self.sim.gen_range(0..u64::MAX);
        let service_seed = self.sim.gen_range(0..u64::MAX);
        let arrival = Box::new(ExponentialGenerator::new(config.arrival_rate, arrival_seed));
        let service = Box::new(ExponentialGenerator::new(
            1. / config.mean_service_time,
            service_seed,
        ));
        let model = Box::new(LinearPowerModel::new(config.idle_power, config.max_power));
        self.add_server_custom(&name, config, arrival, service, model)
    }

    /// Adds a server with caller-supplied generators and power model.
    pub fn add_server_custom(
        &mut self,
        name: &str,
        config: &ServerConfig,
        arrival_generator: Box<dyn Generator>,
        service_generator: Box<dyn Generator>,
        power_model: Box<dyn ServerPowerModel>,
    ) -> usize {
        let power_state = match &config.power_state {
            PowerStateConfig::AlwaysOn => PowerStateMachine::AlwaysOn,
            PowerStateConfig::Nap {
                transition_time,
                nap_power,
            } => PowerStateMachine::Nap(NapUnit::new(*transition_time, *nap_power)),
            PowerStateConfig::Knight {
                transition_time,
                knight_power,
                capability,
                speed,
            } => PowerStateMachine::Knight(KnightUnit::new(
                *transition_time,
                *knight_power,
                *capability,
                *speed,
            )),
        };
        let ctx = self.sim.create_context(name);
        let index = self.cluster.borrow().server_count();
        let server = Server::new(
            index,
            config.sockets,
            config.cores_per_socket,
            config.socket_scheduler,
            config.core_power_policy,
            config.core_transition_time,
            power_model,
            power_state,
            arrival_generator,
            service_generator,
            self.cluster_id,
            ctx,
        );
        self.cluster.borrow_mut().add_server(server)
    }

    /// Replaces the cluster placement policy.
    pub fn set_cluster_policy(&mut self, scheduler: ClusterSchedPolicy) {
        self.cluster.borrow_mut().set_scheduler(scheduler);
    }

    /// Schedules the first arrival on every server and the first monitoring
    /// tick. Call once before stepping.
    pub fn start(&mut self) {
        self.cluster.borrow_mut().start();
    }

    /// Processes one event. See [`Simulation::step`].
    pub fn step(&mut self) -> Result<bool, FatalError> {
        self.sim.step()
    }

    /// Processes up to the given number of events.
    pub fn steps(&mut self, step_count: u64) -> Result<bool, FatalError> {
        self.sim.steps(step_count)
    }

    /// Runs the simulation until the queue is empty.
    pub fn step_until_no_events(&mut self) -> Result<(), FatalError> {
        self.sim.step_until_no_events()
    }

    /// Runs the simulation forward by the given amount of simulated time.
    pub fn step_for_duration(&mut self, duration: f64) -> Result<bool, FatalError> {
        self.sim.step_for_duration(duration)
    }

    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn stats(&self) -> Rc<RefCell<RunStats>> {
        self.stats.clone()
    }

    pub fn cluster(&self) -> Rc<RefCell<DataCenter>> {
        self.cluster.clone()
    }
}
