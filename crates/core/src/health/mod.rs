//! Backend health monitoring.
//!
//! A [`HealthMonitor`] runs a [`HealthProbe`] on demand or periodically and
//! publishes the latest [`HealthStatus`] on a watch channel. It implements
//! [`ReadinessGate`], which the orchestrator consults before accepting work.

mod gate;
mod monitor;
mod probe;
mod types;

pub use gate::{ReadinessGate, StaticGate};
pub use monitor::HealthMonitor;
pub use probe::{DirectHealthProbe, HealthProbe, RemoteHealthProbe};
pub use types::{HealthState, HealthStatus};
