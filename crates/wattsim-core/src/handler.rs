//! Event handling.

use crate::error::FatalError;
use crate::event::Event;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes an event.
    ///
    /// Returning an error halts the simulation run: it is reserved for invariant
    /// violations that must never be silently corrected (see [`FatalError`]).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use serde::Serialize;
    /// use wattsim_core::{cast, Event, EventHandler, FatalError, Simulation, SimulationContext};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct SomeEvent {
    ///     some_field: u32,
    /// }
    ///
    /// pub struct Component {
    ///     state: u32,
    /// }
    ///
    /// impl EventHandler for Component {
    ///     fn on(&mut self, event: Event) -> Result<(), FatalError> {
    ///         cast!(match event.data {
    ///             SomeEvent { some_field } => {
    ///                 self.state = some_field;
    ///             }
    ///         });
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut client_ctx = sim.create_context("client");
    /// let comp = Rc::new(RefCell::new(Component { state: 0 }));
    /// let comp_id = sim.add_handler("comp", comp.clone());
    /// client_ctx.emit(SomeEvent { some_field: 16 }, comp_id, 1.2);
    /// sim.step().unwrap();
    /// assert_eq!(comp.borrow().state, 16);
    /// ```
    fn on(&mut self, event: Event) -> Result<(), FatalError>;
}

/// Enables pattern-matching syntax for processing different event types
/// by downcasting the payload from [`EventData`](crate::event::EventData) to user-defined types.
///
/// Match arms need not be exhaustive; an event payload that matches no arm is
/// logged as unhandled at `ERROR` level. Arms may use `?` when the enclosing
/// handler returns `Result`.
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
