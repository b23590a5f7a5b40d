//! sim-core: the discrete-step digital-twin simulation kernel.
//!
//! Owns the Twin Graph, the State Store, the Event Processor, the
//! Propagator, the Simulation Driver, the optional Prediction Adapter, and
//! the external-interface traits the rest of the system plugs into (§6).
//! The kernel is deterministic given explicit inputs: it holds no global
//! state and performs no I/O of its own.

pub mod constants;
pub mod driver;
pub mod errors;
pub mod graph;
pub mod hashing;
pub mod interfaces;
pub mod metrics;
pub mod prediction;
pub mod processor;
pub mod propagator;
pub mod state;

pub use driver::{CancellationToken, EngineBuilder, EngineConfig, SimulationEngine};
pub use errors::SimError;
pub use graph::TwinGraph;
pub use interfaces::{InMemorySnapshotSink, NoopSnapshotSink, PredictionAdapter, ScenarioSource, SnapshotSink, TwinSource};
pub use processor::{EventProcessor, CANONICAL_EVENT_TYPES};
pub use state::StateStore;
