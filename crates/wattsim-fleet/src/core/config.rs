//! Simulation configuration loaded from YAML.
//!
//! The file format mirrors the resolved structures but with every field
//! optional; unset fields fall back to defaults during resolution.

use serde::{Deserialize, Serialize};

use crate::core::cluster::ClusterSchedPolicy;
use crate::core::server::{CorePowerPolicy, SocketSchedPolicy};

/// Power-management discipline of a server, as configured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum PowerStateConfig {
    AlwaysOn,
    Nap {
        transition_time: f64,
        nap_power: f64,
    },
    Knight {
        transition_time: f64,
        knight_power: f64,
        capability: f64,
        speed: f64,
    },
}

impl Default for PowerStateConfig {
    fn default() -> Self {
        PowerStateConfig::AlwaysOn
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RawServerConfig {
    pub name_prefix: Option<String>,
    pub count: Option<u32>,
    pub sockets: Option<u32>,
    pub cores_per_socket: Option<u32>,
    pub socket_scheduler: Option<SocketSchedPolicy>,
    pub core_power_policy: Option<CorePowerPolicy>,
    pub core_transition_time: Option<f64>,
    pub arrival_rate: Option<f64>,
    pub mean_service_time: Option<f64>,
    pub idle_power: Option<f64>,
    pub max_power: Option<f64>,
    pub power_state: Option<PowerStateConfig>,
}

/// Resolved description of a group of identical servers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name_prefix: String,
    pub count: u32,
    pub sockets: u32,
    pub cores_per_socket: u32,
    pub socket_scheduler: SocketSchedPolicy,
    pub core_power_policy: CorePowerPolicy,
    /// Seconds for a parked core to wake.
    pub core_transition_time: f64,
    /// Rate of the exponential interarrival distribution, jobs per second.
    pub arrival_rate: f64,
    /// Mean of the exponential service-time distribution, seconds.
    pub mean_service_time: f64,
    /// Power draw at zero utilization, watts.
    pub idle_power: f64,
    /// Power draw at full utilization, watts.
    pub max_power: f64,
    pub power_state: PowerStateConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name_prefix: "server".to_string(),
            count: 1,
            sockets: 1,
            cores_per_socket: 1,
            socket_scheduler: SocketSchedPolicy::BinPack,
            core_power_policy: CorePowerPolicy::NoManagement,
            core_transition_time: 0.1,
            arrival_rate: 1.,
            mean_service_time: 1.,
            idle_power: 100.,
            max_power: 200.,
            power_state: PowerStateConfig::AlwaysOn,
        }
    }
}

impl ServerConfig {
    fn from_raw(raw: RawServerConfig) -> Self {
        let default = Self::default();
        let resolved = Self {
            name_prefix: raw.name_prefix.unwrap_or(default.name_prefix),
            count: raw.count.unwrap_or(default.count),
            sockets: raw.sockets.unwrap_or(default.sockets),
            cores_per_socket: raw.cores_per_socket.unwrap_or(default.cores_per_socket),
            socket_scheduler: raw.socket_scheduler.unwrap_or(default.socket_scheduler),
            core_power_policy: raw.core_power_policy.unwrap_or(default.core_power_policy),
            core_transition_time: raw.core_transition_time.unwrap_or(default.core_transition_time),
            arrival_rate: raw.arrival_rate.unwrap_or(default.arrival_rate),
            mean_service_time: raw.mean_service_time.unwrap_or(default.mean_service_time),
            idle_power: raw.idle_power.unwrap_or(default.idle_power),
            max_power: raw.max_power.unwrap_or(default.max_power),
            power_state: raw.power_state.unwrap_or(default.power_state),
        };
        assert!(
            resolved.sockets > 0 && resolved.cores_per_socket > 0,
            "server group '{}' needs at least one socket and one core per socket",
            resolved.name_prefix
        );
        resolved
    }
}

#[derive(Default, Clone, Debug, Deserialize)]
struct RawSimulationConfig {
    pub stats_interval: Option<f64>,
    pub scheduler: Option<ClusterSchedPolicy>,
    pub servers: Option<Vec<RawServerConfig>>,
}

/// Resolved simulation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seconds between monitoring ticks, 0 disables periodic sampling.
    pub stats_interval: f64,
    pub scheduler: ClusterSchedPolicy,
    pub servers: Vec<ServerConfig>,
}

impl SimulationConfig {
    /// Creates a configuration with the default values.
    pub fn new() -> Self {
        Self::from_raw(RawSimulationConfig::default())
    }

    /// Loads a configuration from a YAML file, panicking on unreadable or
    /// malformed input.
    pub fn from_file(file_name: &str) -> Self {
        let raw: RawSimulationConfig = serde_yaml::from_str(
            &std::fs::read_to_string(file_name)
                .unwrap_or_else(|_| panic!("Can't read file {}", file_name)),
        )
        .unwrap_or_else(|err| panic!("Can't parse YAML from file {}: {}", file_name, err));
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSimulationConfig) -> Self {
        Self {
            stats_interval: raw.stats_interval.unwrap_or(1.),
            scheduler: raw.scheduler.unwrap_or(ClusterSchedPolicy::Uniform),
            servers: raw
                .servers
                .unwrap_or_default()
                .into_iter()
                .map(ServerConfig::from_raw)
                .collect(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
stats_interval: 0.5
scheduler: pack
servers:
  - name_prefix: knight
    count: 4
    sockets: 32
    cores_per_socket: 1
    socket_scheduler: bin-pack
    arrival_rate: 8.
    mean_service_time: 2.
    idle_power: 15.
    max_power: 17.
    power_state:
      policy: knight
      transition_time: 5.
      knight_power: 20.
      capability: 0.15
      speed: 0.3
"#;
        let raw: RawSimulationConfig = serde_yaml::from_str(yaml).unwrap();
        let config = SimulationConfig::from_raw(raw);
        assert_eq!(config.stats_interval, 0.5);
        assert_eq!(config.scheduler, ClusterSchedPolicy::Pack);
        assert_eq!(config.servers.len(), 1);
        let server = &config.servers[0];
        assert_eq!(server.count, 4);
        assert_eq!(server.sockets, 32);
        assert_eq!(
            server.power_state,
            PowerStateConfig::Knight {
                transition_time: 5.,
                knight_power: 20.,
                capability: 0.15,
                speed: 0.3,
            }
        );
    }

    #[test]
    #[should_panic(expected = "at least one socket")]
    fn zero_socket_count_is_rejected() {
        let yaml = "servers:\n  - sockets: 0\n";
        let raw: RawSimulationConfig = serde_yaml::from_str(yaml).unwrap();
        SimulationConfig::from_raw(raw);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let yaml = "servers:\n  - sockets: 2\n";
        let raw: RawSimulationConfig = serde_yaml::from_str(yaml).unwrap();
        let config = SimulationConfig::from_raw(raw);
        assert_eq!(config.scheduler, ClusterSchedPolicy::Uniform);
        let server = &config.servers[0];
        assert_eq!(server.sockets, 2);
        assert_eq!(server.count, 1);
        assert_eq!(server.power_state, PowerStateConfig::AlwaysOn);
    }
}
