//! # Convex Peer - Peer Runtime
//!
//! The cooperating long-lived tasks of one peer and the wire message
//! layer. The deterministic core (types, CVM, transition, consensus
//! merge) is strictly synchronous; everything asynchronous lives here,
//! communicating over bounded channels with cooperative shutdown.
//!
//! ## Tasks
//!
//! | Loop | Purpose |
//! |------|---------|
//! | belief propagator | merge incoming beliefs, rate-limited rebroadcast |
//! | connection manager | stake-weighted outbound connection set |
//! | transaction handler | buffer signed transactions into proposed blocks |
//! | executor | apply newly committed blocks to the state |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod loops;
pub mod message;

pub use config::PeerConfig;
pub use core::{PeerCore, PeerData};
pub use loops::{
    now_millis, run_belief_propagator, run_connection_manager, run_executor,
    run_transaction_handler, Connections, Transport,
};
pub use message::{Message, MessageType};
