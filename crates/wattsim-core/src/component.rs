//! Simulation component identifiers.

/// Identifier of a simulation component.
///
/// Identifiers are assigned sequentially starting from 0 when components are registered.
pub type Id = u32;
