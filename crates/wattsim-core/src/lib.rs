#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod component;
pub mod context;
pub mod error;
pub mod event;
pub mod handler;
pub mod log;
pub mod simulation;
mod state;

pub use colored;
pub use component::Id;
pub use context::SimulationContext;
pub use error::FatalError;
pub use event::{Event, EventData, EventId};
pub use handler::EventHandler;
pub use simulation::Simulation;
pub use state::EPSILON;
