//! # Pong Client Library
//!
//! Client side of the relayed two-player Pong. Each client runs the full game
//! simulation locally at a fixed tick rate and exchanges state snapshots with
//! its opponent through the relay server.
//!
//! ## Reconciliation
//!
//! There is no authoritative simulation anywhere. Every snapshot carries a
//! `sync` counter, a tick count that both players advance while the ball is in
//! play. When a snapshot arrives:
//!
//! - the sender's paddle is always adopted
//! - ball position and scores are adopted only if the sender's `sync` is
//!   strictly ahead of ours, in which case we jump to their counter
//!
//! Whoever is ahead therefore drives the ball, and both peers converge.
//!
//! ## Module Organization
//!
//! - [`session`]: match lifecycle (countdown, play, win banner, rematch)
//! - [`reconcile`]: merging a peer snapshot into the local world
//! - [`network`]: line connection on a background tokio runtime and the frame loop
//! - [`audio`]: bounce and point sounds
//! - [`input`]: keyboard sampling with edge detection
//! - [`rendering`]: court, paddles, ball, scores and banners
//! - [`sync_graph`]: optional overlay plotting how far peers lead us

pub mod audio;
pub mod input;
pub mod network;
pub mod reconcile;
pub mod rendering;
pub mod session;
pub mod sync_graph;
