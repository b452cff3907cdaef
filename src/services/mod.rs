// Scan verification and sequencing engine
pub mod config_registry;
pub mod progress;
pub mod sequencer;
pub mod verifier;

// Completion, rework, and the operator-facing command facade
pub mod assembly_scan;
pub mod finalizer;
pub mod rework;
