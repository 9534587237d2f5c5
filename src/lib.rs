//! Blob Arena Server Library
//!
//! Authoritative simulation core for a real-time "eat to grow" arena game:
//! players steer circles around a bounded map, eat food pellets and smaller
//! players, and shelter in safe zones. A uniform spatial grid keeps collision
//! detection close to linear in the number of entities.
//!
//! The transport layer is not part of this crate. It feeds `ClientMessage`s
//! into a [`net::game_session::SessionHandle`] and forwards the
//! `ServerMessage` broadcast to its clients.

pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;
