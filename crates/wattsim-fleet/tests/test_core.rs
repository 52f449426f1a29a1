use wattsim_core::Simulation;

use wattsim_fleet::core::cluster::ClusterSchedPolicy;
use wattsim_fleet::core::config::{PowerStateConfig, ServerConfig, SimulationConfig};
use wattsim_fleet::core::generator::ConstantGenerator;
use wattsim_fleet::core::job::Job;
use wattsim_fleet::core::power::{LinearPowerModel, UtilizationTablePowerModel, POWER_TABLE_LEN};
use wattsim_fleet::core::server::{CorePowerPolicy, SocketSchedPolicy};
use wattsim_fleet::core::stats::{Metric, TimeWeightedMetric};
use wattsim_fleet::simulation::FleetSimulation;

fn config(scheduler: ClusterSchedPolicy, stats_interval: f64) -> SimulationConfig {
    SimulationConfig {
        stats_interval,
        scheduler,
        servers: vec![],
    }
}

/// Adds a server with constant-valued workload generators and a linear
/// 100 W idle / 200 W peak power model.
fn add_const_server(
    fleet: &mut FleetSimulation,
    name: &str,
    cfg: &ServerConfig,
    interarrival: f64,
    service_time: f64,
) -> usize {
    fleet.add_server_custom(
        name,
        cfg,
        Box::new(ConstantGenerator::new(interarrival)),
        Box::new(ConstantGenerator::new(service_time)),
        Box::new(LinearPowerModel::new(100., 200.)),
    )
}

// Interarrival time far beyond any test horizon, for servers that must not
// generate their own load.
const NEVER: f64 = 1e9;

#[test]
// One server, two cores, a job every 10 seconds taking 4 seconds: each job
// is served immediately and leaves after exactly its service time.
fn test_job_lifecycle() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 1.));
    let cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 2,
        ..ServerConfig::default()
    };
    let s = add_const_server(&mut fleet, "s", &cfg, 10., 4.);
    fleet.start();
    fleet.step_for_duration(25.).unwrap();

    assert_eq!(fleet.current_time(), 25.);
    let stats = fleet.stats();
    let stats = stats.borrow();
    assert_eq!(stats.samples(Metric::SojournTime), &[4., 4.]);
    let cluster = fleet.cluster();
    let cluster = cluster.borrow();
    assert_eq!(cluster.server(s).jobs_in_system(), 0);
    assert_eq!(cluster.server(s).instant_utilization(), 0.);
}

#[test]
// A single-core server receiving three simultaneous jobs serves them in
// FIFO order, one at a time.
fn test_queueing_and_fifo_order() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 1,
        ..ServerConfig::default()
    };
    let s = add_const_server(&mut fleet, "s", &cfg, NEVER, 1.);

    {
        let cluster = fleet.cluster();
        let mut cluster = cluster.borrow_mut();
        for id in 0..3 {
            cluster.server_mut(s).insert_job(0., Job::new(id, 5., 0.)).unwrap();
        }
        assert_eq!(cluster.server(s).jobs_in_service(), 1);
        assert_eq!(cluster.server(s).queue_length(), 2);
        assert_eq!(cluster.server(s).remaining_capacity(), 0);
    }

    fleet.step_until_no_events().unwrap();
    let stats = fleet.stats();
    let stats = stats.borrow();
    assert_eq!(stats.samples(Metric::SojournTime), &[5., 10., 15.]);
}

#[test]
// Bin-pack stacks jobs onto the most loaded socket, load-balance spreads
// them onto the least loaded one. Ties go to the lowest socket index.
fn test_socket_scheduling_policies() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let pack_cfg = ServerConfig {
        sockets: 2,
        cores_per_socket: 5,
        socket_scheduler: SocketSchedPolicy::BinPack,
        ..ServerConfig::default()
    };
    let spread_cfg = ServerConfig {
        socket_scheduler: SocketSchedPolicy::LoadBalance,
        ..pack_cfg.clone()
    };
    let pack = add_const_server(&mut fleet, "pack", &pack_cfg, NEVER, 1.);
    let spread = add_const_server(&mut fleet, "spread", &spread_cfg, NEVER, 1.);

    let cluster = fleet.cluster();
    let mut cluster = cluster.borrow_mut();
    for id in 0..3 {
        cluster.server_mut(pack).insert_job(0., Job::new(id, 100., 0.)).unwrap();
        cluster.server_mut(spread).insert_job(0., Job::new(10 + id, 100., 0.)).unwrap();
    }

    let pack_sockets = cluster.server(pack).sockets();
    assert_eq!(pack_sockets[0].jobs_in_service(), 3);
    assert_eq!(pack_sockets[1].jobs_in_service(), 0);

    let spread_sockets = cluster.server(spread).sockets();
    assert_eq!(spread_sockets[0].jobs_in_service(), 2);
    assert_eq!(spread_sockets[1].jobs_in_service(), 1);
}

#[test]
// A nap server goes to sleep once idle (another idle server is present),
// draws only its nap power, and an arrival wakes it back up: the queued job
// waits out the wake transition before being served.
fn test_nap_cycle() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 2,
        power_state: PowerStateConfig::Nap {
            transition_time: 2.,
            nap_power: 5.,
        },
        ..ServerConfig::default()
    };
    let a = add_const_server(&mut fleet, "a", &cfg, NEVER, 1.);
    let _b = add_const_server(&mut fleet, "b", &cfg, NEVER, 1.);

    fleet
        .cluster()
        .borrow_mut()
        .server_mut(a)
        .insert_job(0., Job::new(0, 3., 0.))
        .unwrap();
    // Finish at 3, nap transition from 3 to 5.
    fleet.step_until_no_events().unwrap();
    assert_eq!(fleet.current_time(), 5.);
    {
        let cluster = fleet.cluster();
        let cluster = cluster.borrow();
        assert!(cluster.server(a).is_paused());
        assert_eq!(cluster.server(a).power(), 5.);
        assert_eq!(cluster.server(_b).power(), 100.);
    }

    // Arrival at 5 queues and starts the wake; during the transition both
    // the primary model and the nap unit draw power.
    fleet
        .cluster()
        .borrow_mut()
        .server_mut(a)
        .insert_job(5., Job::new(1, 3., 5.))
        .unwrap();
    {
        let cluster = fleet.cluster();
        let cluster = cluster.borrow();
        assert_eq!(cluster.server(a).queue_length(), 1);
        assert_eq!(cluster.server(a).power(), 105.);
    }
    // Awake at 7, service from 7 to 10, sojourn 10 - 5 = 5.
    fleet.step_until_no_events().unwrap();
    let stats = fleet.stats();
    let stats = stats.borrow();
    assert_eq!(stats.samples(Metric::SojournTime), &[3., 5.]);
}

#[test]
// The last idle server of the cluster refuses to nap (standby guarantee),
// unless its transition is faster than a second.
fn test_nap_standby_exception() {
    for (transition_time, should_nap) in [(2., false), (0.5, true)] {
        let sim = Simulation::new(123);
        let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
        let cfg = ServerConfig {
            sockets: 1,
            cores_per_socket: 1,
            power_state: PowerStateConfig::Nap {
                transition_time,
                nap_power: 5.,
            },
            ..ServerConfig::default()
        };
        let s = add_const_server(&mut fleet, "s", &cfg, NEVER, 1.);
        fleet
            .cluster()
            .borrow_mut()
            .server_mut(s)
            .insert_job(0., Job::new(0, 1., 0.))
            .unwrap();
        fleet.step_until_no_events().unwrap();
        let cluster = fleet.cluster();
        let cluster = cluster.borrow();
        assert_eq!(cluster.server(s).is_paused(), should_nap);
    }
}

#[test]
// An arrival mid-way into the nap transition cancels it and pays the time
// left on it ahead of the wake: transition runs from 1 to 3, the arrival at
// 1 restarts the clock, so the server is back up at 1 + 2 + 2 = 5.
fn test_nap_wake_credits_remaining_transition() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 2,
        power_state: PowerStateConfig::Nap {
            transition_time: 2.,
            nap_power: 5.,
        },
        ..ServerConfig::default()
    };
    let a = add_const_server(&mut fleet, "a", &cfg, NEVER, 1.);
    let _b = add_const_server(&mut fleet, "b", &cfg, NEVER, 1.);

    fleet
        .cluster()
        .borrow_mut()
        .server_mut(a)
        .insert_job(0., Job::new(0, 1., 0.))
        .unwrap();
    // Process the finish at 1 and the nap request, leaving the transition
    // into nap scheduled for 3.
    fleet.step_for_duration(1.2).unwrap();
    assert_eq!(fleet.current_time(), 1.);

    fleet
        .cluster()
        .borrow_mut()
        .server_mut(a)
        .insert_job(1., Job::new(1, 1., 1.))
        .unwrap();
    fleet.step_until_no_events().unwrap();

    // Served from 5 to 6: sojourn 5.
    let stats = fleet.stats();
    let stats = stats.borrow();
    assert_eq!(stats.samples(Metric::SojournTime), &[1., 5.]);
}

#[test]
// A knight server drops to its low-power mode after the load clears: a
// capability share of sockets is disabled, and while fully in the knight
// state the low-power unit is the only draw.
fn test_knight_cycle() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig {
        sockets: 10,
        cores_per_socket: 1,
        idle_power: 15.,
        max_power: 17.,
        power_state: PowerStateConfig::Knight {
            transition_time: 5.,
            knight_power: 20.,
            capability: 0.15,
            speed: 0.3,
        },
        ..ServerConfig::default()
    };
    let s = fleet.add_server_custom(
        "s",
        &cfg,
        Box::new(ConstantGenerator::new(NEVER)),
        Box::new(ConstantGenerator::new(1.)),
        Box::new(LinearPowerModel::new(15., 17.)),
    );

    fleet
        .cluster()
        .borrow_mut()
        .server_mut(s)
        .insert_job(0., Job::new(0, 3., 0.))
        .unwrap();
    // Finish at 3 leaves utilization below capability: knight transition
    // runs from 3 to 8 and disables floor(10 * 0.15) = 1 socket, leaving 9.
    fleet.step_until_no_events().unwrap();
    assert_eq!(fleet.current_time(), 8.);
    {
        let cluster = fleet.cluster();
        let cluster = cluster.borrow();
        assert_eq!(cluster.server(s).power(), 20.);
        assert_eq!(cluster.server(s).remaining_capacity(), 9);
        assert!(!cluster.server(s).is_paused());
    }

    // One job projects to 10% utilization, at or below capability: it is
    // served in knight mode at reduced speed without waking the server.
    fleet
        .cluster()
        .borrow_mut()
        .server_mut(s)
        .insert_job(8., Job::new(1, 3., 8.))
        .unwrap();
    {
        let cluster = fleet.cluster();
        let cluster = cluster.borrow();
        assert_eq!(cluster.server(s).jobs_in_service(), 1);
        assert_eq!(cluster.server(s).power(), 20.);
    }

    // A second job projects above capability and forces a wake. It still
    // starts immediately on the retained capacity; when the wake completes
    // at 13 both jobs are re-timed to full speed and finish at 14.5.
    fleet
        .cluster()
        .borrow_mut()
        .server_mut(s)
        .insert_job(8., Job::new(2, 3., 8.))
        .unwrap();
    fleet.step_until_no_events().unwrap();

    let stats = fleet.stats();
    let stats = stats.borrow();
    let sojourns = stats.samples(Metric::SojournTime);
    assert_eq!(sojourns.len(), 3);
    assert!((sojourns[1] - 6.5).abs() < 1e-9);
    assert!((sojourns[2] - 6.5).abs() < 1e-9);
}

#[test]
// An arrival mid-way into the knight transition cancels it and pays the
// time left on it ahead of the wake: the transition runs from 1 to 5, the
// arrival at 1 restarts the clock, so full capacity is back at 1 + 4 + 4 = 9.
fn test_knight_wake_credits_remaining_transition() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig {
        sockets: 2,
        cores_per_socket: 1,
        power_state: PowerStateConfig::Knight {
            transition_time: 4.,
            knight_power: 20.,
            capability: 0.15,
            speed: 0.5,
        },
        ..ServerConfig::default()
    };
    let s = add_const_server(&mut fleet, "s", &cfg, NEVER, 1.);

    fleet
        .cluster()
        .borrow_mut()
        .server_mut(s)
        .insert_job(0., Job::new(0, 1., 0.))
        .unwrap();
    // Process the finish at 1, which starts the transition into knight.
    fleet.step_for_duration(2.).unwrap();
    assert_eq!(fleet.current_time(), 1.);

    // One job projects to 50% utilization, above capability: the server
    // starts waking but serves the job at knight speed meanwhile.
    fleet
        .cluster()
        .borrow_mut()
        .server_mut(s)
        .insert_job(1., Job::new(1, 10., 1.))
        .unwrap();
    fleet.step_until_no_events().unwrap();

    // At the wake at 9 the job has done 8 * 0.5 = 4 of its 10 seconds; the
    // remaining 6 run at full speed, finishing at 15: sojourn 14.
    let stats = fleet.stats();
    let stats = stats.borrow();
    assert_eq!(stats.samples(Metric::SojournTime), &[1., 14.]);
}

#[test]
// With pack placement and no idle server left, a paused idle server is
// woken by sending it the job, which queues behind the wake transition.
fn test_pack_wakes_paused_server_as_standby() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Pack, 0.));
    let busy_cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 1,
        ..ServerConfig::default()
    };
    let nap_cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 2,
        power_state: PowerStateConfig::Nap {
            transition_time: 2.,
            nap_power: 5.,
        },
        ..ServerConfig::default()
    };
    // Server a generates one arrival at 4; server b only serves.
    let a = add_const_server(&mut fleet, "a", &busy_cfg, 4., 1.);
    let b = add_const_server(&mut fleet, "b", &nap_cfg, NEVER, 1.);
    fleet.start();

    // Let b serve a job and fall asleep (a is idle, so napping is allowed).
    fleet
        .cluster()
        .borrow_mut()
        .server_mut(b)
        .insert_job(0., Job::new(100, 1., 0.))
        .unwrap();
    fleet.step_for_duration(3.5).unwrap();
    assert!(fleet.cluster().borrow().server(b).is_paused());

    // Occupy a completely, so no server is idle when the arrival fires.
    fleet
        .cluster()
        .borrow_mut()
        .server_mut(a)
        .insert_job(fleet.current_time(), Job::new(101, 100., fleet.current_time()))
        .unwrap();

    // The arrival at 4 goes to the paused b, wakes it at 6, and is served
    // from 6 to 7: sojourn 3.
    fleet.step_for_duration(4.).unwrap();
    let cluster = fleet.cluster();
    let cluster = cluster.borrow();
    assert_eq!(cluster.server(a).jobs_in_service(), 1);
    assert_eq!(cluster.server(b).jobs_in_system(), 0);
    assert!(!cluster.server(b).is_paused());
    let stats = fleet.stats();
    let stats = stats.borrow();
    assert_eq!(stats.samples(Metric::SojournTime), &[1., 3.]);
}

#[test]
// Peak placement fills the most efficient server up to its peak-efficiency
// utilization before spilling onto less efficient ones.
fn test_peak_placement() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 5,
        ..ServerConfig::default()
    };
    // Origin server: linear model, most efficient at full load.
    let origin = add_const_server(&mut fleet, "origin", &cfg, 1., 10.);
    // Efficient server: measured curve with a sharp dip at 40% utilization,
    // so its peak-efficiency utilization is 0.4 and its efficiency tops the
    // linear server's.
    let mut table = vec![100.; POWER_TABLE_LEN];
    table[40] = 10.;
    let efficient = fleet.add_server_custom(
        "efficient",
        &cfg,
        Box::new(ConstantGenerator::new(NEVER)),
        Box::new(ConstantGenerator::new(10.)),
        Box::new(UtilizationTablePowerModel::new(table)),
    );
    fleet.set_cluster_policy(ClusterSchedPolicy::Peak);
    fleet.start();

    // Arrivals at 1, 2, 3 land on the efficient server (utilization 0.2,
    // 0.4, 0.6); by the arrival at 4 it is above peak, so the job spills
    // onto the origin server.
    fleet.step_for_duration(4.5).unwrap();
    let cluster = fleet.cluster();
    let cluster = cluster.borrow();
    assert_eq!(cluster.server(efficient).jobs_in_service(), 3);
    assert_eq!(cluster.server(origin).jobs_in_service(), 1);
    // The origin server is still below its own peak point.
    assert!(!cluster.all_servers_above_peak());
}

#[test]
// With core parking, an idle core powers down and the next job waits out
// the core's wake transition.
fn test_core_parking() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 1,
        core_power_policy: CorePowerPolicy::CoreParking,
        core_transition_time: 0.5,
        ..ServerConfig::default()
    };
    let s = add_const_server(&mut fleet, "s", &cfg, NEVER, 1.);

    fleet
        .cluster()
        .borrow_mut()
        .server_mut(s)
        .insert_job(0., Job::new(0, 1., 0.))
        .unwrap();
    fleet.step_until_no_events().unwrap();

    // The job is committed to the parked core but not yet in service.
    fleet
        .cluster()
        .borrow_mut()
        .server_mut(s)
        .insert_job(1., Job::new(1, 1., 1.))
        .unwrap();
    {
        let cluster = fleet.cluster();
        let cluster = cluster.borrow();
        assert_eq!(cluster.server(s).jobs_waking(), 1);
        assert_eq!(cluster.server(s).jobs_in_service(), 0);
        assert_eq!(cluster.server(s).jobs_in_system(), 1);
    }

    // Wake at 1.5, service until 2.5.
    fleet.step_until_no_events().unwrap();
    let stats = fleet.stats();
    let stats = stats.borrow();
    assert_eq!(stats.samples(Metric::SojournTime), &[1., 1.5]);
}

#[test]
// Removing a job the server does not hold is a fatal accounting error.
fn test_unknown_job_removal_is_fatal() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 0.));
    let cfg = ServerConfig::default();
    let s = add_const_server(&mut fleet, "s", &cfg, NEVER, 1.);

    let cluster = fleet.cluster();
    let mut cluster = cluster.borrow_mut();
    let err = cluster.server_mut(s).remove_job(0., 99).unwrap_err();
    assert!(err.to_string().contains("no socket mapping"));
}

#[test]
// Periodic monitoring records per-server power at every tick and the
// cluster total as a time-weighted series.
fn test_monitoring() {
    let sim = Simulation::new(123);
    let mut fleet = FleetSimulation::new(sim, config(ClusterSchedPolicy::Uniform, 1.));
    let cfg = ServerConfig {
        sockets: 1,
        cores_per_socket: 1,
        ..ServerConfig::default()
    };
    let _s = add_const_server(&mut fleet, "s", &cfg, NEVER, 1.);
    fleet.start();
    fleet.step_for_duration(10.).unwrap();

    let stats = fleet.stats();
    let stats = stats.borrow();
    let power = stats.samples(Metric::ServerPower);
    assert_eq!(power.len(), 10);
    assert!(power.iter().all(|&p| p == 100.));
    assert_eq!(stats.samples(Metric::ServerIdleFraction).iter().sum::<f64>(), 10.);
    assert_eq!(
        stats.time_weighted_mean(TimeWeightedMetric::ClusterPower),
        Some(100.)
    );
}

#[test]
// Two runs with the same seed and configuration produce identical results.
fn test_reproducibility() {
    let run = || {
        let sim = Simulation::new(42);
        let mut config = config(ClusterSchedPolicy::Pack, 1.);
        config.servers = vec![ServerConfig {
            count: 4,
            sockets: 2,
            cores_per_socket: 4,
            arrival_rate: 2.,
            mean_service_time: 0.5,
            ..ServerConfig::default()
        }];
        let mut fleet = FleetSimulation::new(sim, config);
        fleet.start();
        fleet.step_for_duration(100.).unwrap();
        let stats = fleet.stats();
        let count = stats.borrow().sample_count(Metric::SojournTime);
        let mean = stats.borrow().mean(Metric::SojournTime);
        (fleet.event_count(), count, mean)
    };
    assert_eq!(run(), run());
}
