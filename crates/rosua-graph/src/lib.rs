//! `rosua-graph` – the robot-graph side of the mirror.
//!
//! Everything the reconciler needs to know about the live ROS graph comes
//! through the [`GraphSource`] trait defined here.
//!
//! # Modules
//!
//! - [`source`] – [`GraphSource`]: enumeration, ping, purge, and parameter
//!   reads, specified at the collaborator boundary.
//! - [`rosbridge`] – [`RosbridgeGraph`][rosbridge::RosbridgeGraph]: wire
//!   implementation speaking rosbridge `call_service` frames against the
//!   `/rosapi/*` services over a WebSocket.
//! - [`sim`] – [`SimGraph`][sim::SimGraph]: in-memory graph fixture for
//!   tests and offline runs.
//! - [`sweeper`] – [`LivenessSweeper`][sweeper::LivenessSweeper]: periodic
//!   ping-and-purge of stale graph processes.

pub mod rosbridge;
pub mod sim;
pub mod source;
pub mod sweeper;

pub use rosbridge::RosbridgeGraph;
pub use sim::SimGraph;
pub use source::GraphSource;
pub use sweeper::{LivenessSweeper, SweepReport};
