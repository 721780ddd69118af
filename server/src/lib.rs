//! Live location sharing for LinknGo rooms.
//!
//! Clients connect over WebSocket, join a room by code and stream their
//! position; everyone in the room sees everyone else move.

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod outbox;
pub mod registry;
pub mod room;
pub mod socket;
