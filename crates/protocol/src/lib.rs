//! Battlegrid Protocol - Shared types for Engine and client communication
//!
//! This crate contains all types that cross the WebSocket boundary:
//! - The `ClientMessage` / `ServerMessage` envelopes
//! - The combat action envelope (`CombatAction`)
//! - Per-viewer filtered view DTOs (`RoomView` and friends)
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - serde, serde_json, uuid, chrono and the
//!    domain vocabulary types only
//! 2. **No business logic** - pure data types and serialization
//! 3. **Forward compatible** - new variants are added at the end; removing
//!    or renaming variants is a breaking change

pub mod messages;
pub mod types;
pub mod views;

pub use messages::{ClientMessage, CombatAction, HpChangeKind, ServerMessage};
pub use types::{ErrorCode, ParticipantRole};
pub use views::{CellStatus, CellView, MapView, RoomView};
