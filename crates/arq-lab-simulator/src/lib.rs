pub mod engine;
pub mod scenario;
pub mod trace;

pub use engine::{LinkEventSummary, NodeId, Simulator};
pub use scenario::{ArqScenario, ScenarioAction, ScenarioAssertion, run_scenario};
pub use trace::SimulationReport;
