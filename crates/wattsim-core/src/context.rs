//! Per-component access to the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::Distribution;

use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::state::SimulationState;

/// A component's handle on the simulation: scheduling and cancelling
/// events, reading the clock, and drawing from the shared random number
/// generator.
///
/// Contexts are created by [`Simulation::create_context`](crate::Simulation::create_context)
/// and carry the identity under which all emitted events are sourced.
pub struct SimulationContext {
    id: Id,
    name: String,
    state: Rc<RefCell<SimulationState>>,
    names: Rc<RefCell<Vec<String>>>,
}

impl SimulationContext {
    pub(crate) fn new(
        id: Id,
        name: &str,
        state: Rc<RefCell<SimulationState>>,
        names: Rc<RefCell<Vec<String>>>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            state,
            names,
        }
    }

    /// Identifier of the component owning this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Name of the component owning this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a component identifier back to its name.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.state.borrow().time()
    }

    /// Schedules an event with the given payload to fire at component
    /// `dest` after `delay`, returning its cancellation handle.
    pub fn emit<T>(&mut self, data: T, dest: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.state.borrow_mut().add_event(data, self.id, dest, delay)
    }

    /// Schedules a zero-delay event to component `dest`.
    pub fn emit_now<T>(&mut self, data: T, dest: Id) -> EventId
    where
        T: EventData,
    {
        self.emit(data, dest, 0.)
    }

    /// Schedules an event addressed back to this component.
    pub fn emit_self<T>(&mut self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        let id = self.id;
        self.emit(data, id, delay)
    }

    /// Schedules a zero-delay event addressed back to this component.
    pub fn emit_self_now<T>(&mut self, data: T) -> EventId
    where
        T: EventData,
    {
        self.emit_self(data, 0.)
    }

    /// Cancels a scheduled event by its handle.
    ///
    /// Cancellation is idempotent: cancelling an already-fired or
    /// already-cancelled handle is a no-op.
    pub fn cancel_event(&mut self, id: EventId) {
        self.state.borrow_mut().cancel_event(id);
    }

    /// Returns a random float in the range _[0, 1)_
    /// from the simulation-wide random number generator.
    pub fn rand(&mut self) -> f64 {
        self.state.borrow_mut().rand()
    }

    /// Returns a random number in the given range
    /// from the simulation-wide random number generator.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.state.borrow_mut().gen_range(range)
    }

    /// Returns a random value drawn from the given distribution
    /// using the simulation-wide random number generator.
    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&mut self, dist: &Dist) -> T {
        self.state.borrow_mut().sample_from_distribution(dist)
    }
}
