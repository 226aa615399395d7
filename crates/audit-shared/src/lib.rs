//! Deterministic core of the tariff auditor.
//!
//! Everything here is I/O-free: the code grammar, run state, the verification
//! gates, the consensus vote and the final report.

pub mod codes;
pub mod consensus;
pub mod error;
pub mod evidence;
pub mod evidence_gate;
pub mod final_gate;
pub mod report;
pub mod review;
pub mod stage;
pub mod state;

pub use consensus::{consensus_code, CodeDepth, Consensus};
pub use error::AuditError;
pub use evidence_gate::review_evidence;
pub use final_gate::{faithfulness_decision, verify_final_code, DEFAULT_FAITHFULNESS_THRESHOLD};
pub use report::Report;
pub use review::{FailureKind, GateOutcome};
pub use stage::{Stage, Termination, Transition};
pub use state::{Confidence, RunState, StateDelta, Status};
