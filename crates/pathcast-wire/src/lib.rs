//! # pathcast-wire
//!
//! Wire format and routing state for the pathcast route gossip protocol.
//!
//! ## Crate structure
//!
//! - [`message`]: update message serialization, hop path handling
//! - [`table`]: per-node routing table with add/withdraw rules

pub mod message;
pub mod table;

pub use message::{DecodeError, UpdateKind, UpdateMessage};
pub use table::{AddOutcome, RouteEntry, RoutingTable, WithdrawOutcome};
