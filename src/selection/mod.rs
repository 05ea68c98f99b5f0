pub mod engine;
pub mod state_machine;

pub use engine::{Edge, OverlapGraph, ProbeRecord, ScanOutcome, SelectionEngine, SelectionStats};
pub use state_machine::{ScanAction, ScanConfig, ScanState};
