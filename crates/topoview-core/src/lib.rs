#![forbid(unsafe_code)]

//! Topology dashboard engine (headless).
//!
//! Keeps a client-side copy of an SDN controller's topology in sync with the controller's event
//! log, lays out switch ports, and lets a user assemble route paths between switches.
//!
//! Design goals:
//! - one explicit [`Dashboard`] context object, no process-wide state
//! - no I/O of its own: every controller exchange goes through a [`Transport`]
//! - time is passed in, so polling and retry schedules are testable without waiting

pub mod config;
pub mod dashboard;
pub mod error;
pub mod flows;
pub mod outbox;
pub mod path;
pub mod routes;
pub mod snapshot;
pub mod sync;
pub mod timer;
pub mod transport;
pub mod wire;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, TickReport};
pub use error::{Error, PathError, Result, TransportError};
pub use flows::FlowTable;
pub use outbox::{Outbox, Pending, SideRequest};
pub use path::{PathMode, PathParams, PathRequest, PathSelector};
pub use routes::{Hop, Route, RoutePath};
pub use snapshot::Snapshot;
pub use sync::{ApplyReport, EventSyncLoop, Resolution, SyncContext, SyncState};
pub use timer::{TickHandle, Ticker};
pub use transport::{Method, ReplayTransport, Request, Session, Transport, TransportResult};
pub use wire::PollResponse;

pub use topoview_graph as graph;
pub use topoview_layout as layout;

#[cfg(test)]
mod tests;
