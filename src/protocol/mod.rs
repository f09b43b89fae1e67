//! Wire protocol
//!
//! A connection goes through two phases:
//!
//! 1. **Handshake**: one greeting line declaring the client id and role
//!    ([`handshake`]).
//! 2. **Data**: length-prefixed binary frames until the stream closes
//!    ([`frame`]).

pub mod frame;
pub mod handshake;

pub use frame::{encode, read_frame, read_frame_or_idle, write_frame, FrameRead, DEFAULT_MAX_FRAME_SIZE};
pub use handshake::{read_greeting, Greeting, Role, MAX_GREETING_SIZE};
