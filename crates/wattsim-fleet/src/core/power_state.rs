//! Server-level power-state machines.
//!
//! This module holds only the state data; the transition logic lives in the
//! server, which owns the event scheduling. Each unit keeps at most one
//! pending transition event together with its scheduled fire time, so a
//! wake request arriving mid-transition can cancel the event and credit the
//! time left on it.

use wattsim_core::EventId;

/// A scheduled transition-completion event and when it will fire.
#[derive(Clone, Copy, Debug)]
pub struct PendingTransition {
    pub event: EventId,
    pub fire_time: f64,
}

/// States of a server that naps when the whole machine is idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NapState {
    Active,
    TransitioningToNap,
    Napping,
    TransitioningToActive,
}

/// Nap bookkeeping: the server suspends entirely while idle and must wake
/// before serving again. Job processing is paused during the transition in
/// and while asleep.
#[derive(Debug)]
pub struct NapUnit {
    pub state: NapState,
    /// Seconds to enter or leave the nap state.
    pub transition_time: f64,
    /// Watts drawn while napping.
    pub nap_power: f64,
    /// Outstanding zero-delay request to evaluate nap conditions.
    pub pending_request: Option<EventId>,
    /// Outstanding transition into nap, cancellable by a wake request.
    pub pending_transition: Option<PendingTransition>,
}

impl NapUnit {
    pub fn new(transition_time: f64, nap_power: f64) -> Self {
        Self {
            state: NapState::Active,
            transition_time,
            nap_power,
            pending_request: None,
            pending_transition: None,
        }
    }
}

/// States of a server that sheds capacity instead of sleeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnightState {
    Active,
    TransitioningToKnight,
    Knight,
    TransitioningToActive,
}

/// Knight bookkeeping: under light load the server disables a share of its
/// sockets and drops to a slow low-power mode, but keeps serving. It
/// restores full capacity when projected load would exceed the capability.
#[derive(Debug)]
pub struct KnightUnit {
    pub state: KnightState,
    /// Seconds to enter or leave the knight state.
    pub transition_time: f64,
    /// Watts drawn by the low-power unit. While fully in the knight state
    /// it is the only draw; during transitions and active operation it is
    /// added on top of the primary model.
    pub knight_power: f64,
    /// Utilization threshold that triggers entering and leaving knight
    /// mode, also the fraction of sockets disabled while in it.
    pub capability: f64,
    /// DVFS speed applied while in knight mode.
    pub speed: f64,
    /// Outstanding transition into knight, cancellable by a wake request.
    pub pending_transition: Option<PendingTransition>,
}

impl KnightUnit {
    pub fn new(transition_time: f64, knight_power: f64, capability: f64, speed: f64) -> Self {
        Self {
            state: KnightState::Active,
            transition_time,
            knight_power,
            capability,
            speed,
            pending_transition: None,
        }
    }
}

/// Which power-management discipline a server runs.
#[derive(Debug)]
pub enum PowerStateMachine {
    /// No server-level power management, the server is always ready.
    AlwaysOn,
    Nap(NapUnit),
    Knight(KnightUnit),
}
