//! Time-stamped, component-tagged logging.
//!
//! Every message is prefixed with the simulation time, a colored level tag
//! and the name of the emitting component, so interleaved logs from many
//! components stay readable. Event payloads are rendered as JSON.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::error;
use serde_json::json;
use serde_type_name::type_name;

use crate::event::Event;

/// Colors the level tag when stderr goes to a console, leaves it plain otherwise.
pub fn colored_level(tag: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        tag.color(color)
    } else {
        tag.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_tag {
    ($level:ident, $tag:expr, $color:ident, $ctx:expr, $($arg:tt)+) => (
        log::$level!(
            target: $ctx.name(),
            "[{:.3} {} {}] {}",
            $ctx.time(),
            $crate::log::colored_level($tag, $crate::colored::Color::$color),
            $ctx.name(),
            format_args!($($arg)+)
        )
    );
}

/// Logs a message at the info level, prefixed with the simulation time and
/// the name of the component behind `$ctx`.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_tag!(info, "INFO ", Green, $ctx, $($arg)+));
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_tag!(debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_tag!(trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_tag!(error, "ERROR", Red, $ctx, $($arg)+));
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__log_with_tag!(warn, "WARN ", Yellow, $ctx, $($arg)+));
}

fn event_json(event: &Event) -> serde_json::Value {
    json!({
        "type": type_name(&event.data).unwrap(),
        "data": event.data,
        "src": event.src,
        "dest": event.dest,
    })
}

fn log_event_error(kind: &str, event: &Event) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] {}: {}",
        event.time,
        colored_level("ERROR", Color::Red),
        kind,
        event_json(event)
    );
}

/// Logs an event whose type is not matched by the destination's handler.
///
/// This function is used internally by the [`cast!`](crate::cast!) macro.
pub fn log_unhandled_event(event: Event) {
    log_event_error("Unhandled event", &event);
}

// An event addressed to a component with no registered handler.
pub(crate) fn log_undelivered_event(event: Event) {
    log_event_error("Undelivered event", &event);
}

pub(crate) fn log_incorrect_event(event: Event, msg: &str) {
    log_event_error(&format!("Incorrect event ({})", msg), &event);
}
