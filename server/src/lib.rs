//! # Pong Relay Server Library
//!
//! A store-and-forward relay for two-player Pong. The server never simulates
//! the game: clients run the physics themselves and reconcile through the
//! `sync` counter in each state update. The relay only
//!
//! - assigns roles by arrival order (`left`, `right`, then spectators)
//! - holds every connection at a start gate until both players are present
//! - forwards each well-formed line verbatim to every other connection
//! - counts rematch votes and broadcasts a single approval per round
//!
//! ## Concurrency
//!
//! One tokio task reads each connection and a second drains its bounded
//! outbox onto the socket. Forwarding never waits on a slow peer; control
//! messages wait at most a short, configured time. The registry, roles and
//! votes share one `RwLock` inside [`session::RelaySession`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::session::RelayConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:65432", RelayConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
pub mod session;
pub mod utils;
