//! Workspace root for the Pong relay.
//!
//! The code lives in the `shared`, `server` and `client` crates; this package
//! only hosts the end-to-end tests under `tests/`.
