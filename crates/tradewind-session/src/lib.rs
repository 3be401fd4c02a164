//! Connection sessions and message dispatch for Tradewind.
//!
//! This crate sits between the transport (frames) and the server or client
//! logic (typed messages):
//!
//! 1. **Reading**: one thread per connection decodes frames and calls a
//!    [`Handler`] ([`spawn_reader`])
//! 2. **Routing**: a [`RoutingTable`] says which message types are handled
//!    directly, queued, or dropped
//! 3. **Queues**: a [`CappedQueue`] hands messages to a slower consumer
//!    with backpressure
//! 4. **Peers**: the [`ConnectionRegistry`] remembers each connection's
//!    version, nickname, robot flag and games
//! 5. **Authentication**: the [`Authenticator`] trait
//!
//! ```text
//! Server / Client logic (above)  ← Handler callbacks, queue consumers
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol + Transport (below)
//! ```

mod auth;
mod error;
mod queue;
mod reader;
mod registry;
mod routing;

pub use auth::{AccountAuthenticator, Authenticator, OpenAuthenticator};
pub use error::SessionError;
pub use queue::{CappedQueue, QueueError};
pub use reader::{Handler, spawn_reader};
pub use registry::{ConnectionRegistry, PeerInfo};
pub use routing::{Route, RoutingTable};
