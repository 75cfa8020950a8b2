//! rosua-sync — the synchronisation core of rosua.
//!
//! Keeps a protocol-server address space in step with a live robot
//! communication graph: enumerate, filter, resolve into the name
//! hierarchy, then create the nodes that are missing.  Nodes are never
//! retracted once mirrored.
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`filter`] | Allow/exclude scope policy with allow-over-exclude precedence |
//! | [`hierarchy`] | Slash-delimited name decomposition and label derivation |
//! | [`registry`] | Per-kind entity-to-node bookkeeping |
//! | [`mirror`] | The [`Reconciler`] driving scan cycles |
//! | [`telemetry`] | `tracing` + OpenTelemetry pipeline initialisation |

pub mod filter;
pub mod hierarchy;
pub mod mirror;
pub mod registry;
pub mod telemetry;

pub use filter::{RawScopeLists, ScopeConfig};
pub use hierarchy::{remaining_hierarchy, split_name};
pub use mirror::{CycleReport, Reconciler, ReconcilerConfig, DEFAULT_SCAN_INTERVAL};
pub use registry::EntityRegistry;
