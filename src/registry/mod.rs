//! Subscriber registry
//!
//! Tracks the set of live subscriber connections and hands the broadcast
//! engine a stable snapshot per round.
//!
//! ```text
//!                    Arc<SubscriberRegistry>
//!                 ┌──────────────────────────┐
//!   Dispatcher ──►│ subscribers:             │◄── Broadcast Engine
//!     add()       │   RwLock<HashMap<u64,    │    snapshot() / remove()
//!                 │     Arc<Subscriber>>>    │
//!                 └──────────────────────────┘
//! ```
//!
//! Each `Subscriber` owns the write half of its socket behind an async
//! mutex; the registry clones `Arc`s, never sockets.

pub mod entry;
pub mod store;

pub use entry::{Subscriber, SubscriberWriter};
pub use store::SubscriberRegistry;
