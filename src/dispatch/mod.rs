//! Coordinator side: snapshot aggregation, telemetry push, planning, execution.

pub mod coordinator;
pub mod executor;
pub mod planner;
pub mod ports;
pub mod snapshot;
pub mod telemetry;

pub use coordinator::{CoordinationReport, CoordinatorService};
pub use executor::ActionExecutor;
pub use planner::{DispatchPlan, DispatchPlanner, DispatchStep, StepRecord};
pub use ports::{AgentPorts, DEFAULT_TIMEOUT, LocalAgents};
pub use snapshot::{SystemSnapshot, aggregate_status};
pub use telemetry::{TelemetryPayload, push_measurements};
