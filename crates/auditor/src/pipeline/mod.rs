//! Stages of one classification cycle.
//!
//! Every stage reads a `&RunState` snapshot and returns a `StateDelta`; the
//! orchestrator alone applies deltas. The rule-based gates are pure functions
//! in `audit_shared` and need no wrapper here.

pub mod aggregator;
pub mod faithfulness;
pub mod pacer;
pub mod planner;
pub mod worker;

pub use aggregator::{Aggregator, INSUFFICIENT_DATA};
pub use faithfulness::FaithfulnessAuditor;
pub use pacer::Pacer;
pub use planner::Planner;
pub use worker::ClassifierWorker;
