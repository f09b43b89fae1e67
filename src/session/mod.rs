//! Publisher session management
//!
//! The publisher side of the relay: the single-active-publisher slot
//! ([`slot`]), the broadcast engine that runs while a session holds it
//! ([`broadcast`]), and the per-connection session runner ([`publisher`]).

pub(crate) mod broadcast;
pub(crate) mod publisher;
pub mod slot;

pub use slot::{PublisherGuard, PublisherSlot, Rejected, SlotState};
