//! # Observer events.
//!
//! The lifecycle core publishes its observable side effects here: registry
//! membership changes and per-instance status trajectories. The RPC layer
//! subscribes and forwards to clients; the core never knows who listens.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
