//! Daemon for controlling Onkyo A/V receivers over a serial line
//!
//! Onkyo receivers speak the ISCP text protocol over a slow 9600-baud
//! serial connection. This crate mediates between that link and any number
//! of local clients speaking a simpler line-oriented protocol over TCP or
//! UNIX-domain sockets. It supports:
//!
//! - High-level commands (`power on`, `volume 42`, `zone2input cd`)
//!   translated to the receiver's opcode strings
//! - Asynchronous status fan-out: every receiver reply, solicited or not,
//!   is normalized to an `OK:key:value` line and broadcast to all clients
//! - Per-receiver command queueing with duplicate suppression, power
//!   gating and 80 ms pacing so the receiver is never overrun
//! - Virtual sleep timers for zones 2 and 3, which the hardware lacks
//! - Multiple receivers, multiple listeners, up to 200 simultaneous
//!   clients
//!
//! # Architecture
//!
//! The crate is organized into several layers:
//!
//! - **Daemon**: the single-task event loop owning all state
//! - **Receiver**: per-device power bits, pacing and the command queue
//! - **Command / Status**: the two directions of protocol translation
//! - **Protocol**: ISCP wire framing
//! - **Connection**: client-side line assembly
//! - **Codes**: the static translation tables, hashed once at startup
//!
//! The binary in `src/main.rs` wires a serial port and the configured
//! listeners into a [`Daemon`] and runs it until SIGINT.

pub mod codes;
pub mod command;
pub mod connection;
pub mod daemon;
pub mod error;
pub mod hash;
pub mod protocol;
pub mod receiver;
pub mod status;
pub mod timing;

// Public exports
pub use daemon::{Daemon, MAX_CONNECTIONS, STARTUP_MSG};
pub use error::{OnkyoError, Result};
pub use receiver::{Receiver, Transport};
