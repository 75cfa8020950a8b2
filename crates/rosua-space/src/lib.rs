//! `rosua-space` – the protocol-server side of the mirror.
//!
//! # Modules
//!
//! - [`space`] – [`AddressSpace`]: namespace registration, the Objects
//!   root, and node creation with explicit string ids;
//!   [`InMemorySpace`][space::InMemorySpace] is the reference
//!   implementation behind the [`SharedSpace`] handle.
//! - [`server`] – [`SpaceServer`][server::SpaceServer]: read-only
//!   WebSocket browse endpoint bound to a configurable address, with a
//!   stop handle for shutdown.

pub mod server;
pub mod space;

pub use server::{SpaceServer, SpaceServerHandle};
pub use space::{AddressSpace, InMemorySpace, SharedSpace, shared};
