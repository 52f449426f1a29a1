//! Building blocks of the fleet simulator.

pub mod cluster;
pub mod config;
pub mod events;
pub mod generator;
pub mod job;
pub mod power;
pub mod power_state;
pub mod server;
pub mod socket;
pub mod stats;
