//! Email triage pipeline.
//!
//! Data flows one way:
//! analyzers → audit records → aggregated scores → risk score →
//! classification → action → verdict.
//!
//! - `types`: wire-level data model and the analyzer signal contract
//! - `email`: validated intake of the email under triage
//! - `audit`: one execution record per analyzer invocation
//! - `scoring`: weighted risk score
//! - `policy`: classification bands and action table
//! - `reasoning`: human-readable explanation
//! - `coordinator`: concurrent fan-out and verdict assembly

pub mod audit;
pub mod coordinator;
pub mod email;
pub mod policy;
pub mod reasoning;
pub mod scoring;
pub mod types;

pub use coordinator::TriageCoordinator;
pub use email::{EmailContext, TriageRequest};
pub use types::{
    AggregatedScores, AttachmentDescriptor, ExecutionRecord, RecommendedAction, RiskVerdict,
    Signal, SignalKind, ThreatClassification,
};
