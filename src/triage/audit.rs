//! Audit trail construction.
//!
//! Every analyzer the coordinator starts becomes exactly one
//! [`ExecutionRecord`], whatever happened to it. Summaries are single-line
//! and capped so raw analyzer payloads never end up in the trail.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::analyzers::AnalyzerInput;
use crate::error::{AnalyzerError, SummaryError};
use crate::triage::types::{ExecutionRecord, RecordStatus, Signal, clamp_score};

/// Summary used when the summarizer itself fails.
pub const SUMMARY_UNAVAILABLE: &str = "summary unavailable";

/// Longest output summary kept in a record.
pub const MAX_SUMMARY_CHARS: usize = 160;

/// Turns an analyzer's raw output into a short human-readable line.
pub trait OutputSummarizer: Send + Sync {
    fn summarize(&self, tool_name: &str, signal: &Signal) -> Result<String, SummaryError>;
}

/// Default summarizer: `score N/100: <evidence>`.
#[derive(Debug, Default)]
pub struct EvidenceSummarizer;

impl OutputSummarizer for EvidenceSummarizer {
    fn summarize(&self, _tool_name: &str, signal: &Signal) -> Result<String, SummaryError> {
        let score = clamp_score(signal.score);
        let mut head = format!("score {score}/100");
        if i64::from(score) != signal.score {
            head.push_str(&format!(" (reported {})", signal.score));
        }

        let evidence = one_line(&signal.evidence);
        Ok(if evidence.is_empty() {
            format!("{head} (no evidence reported)")
        } else {
            format!("{head}: {evidence}")
        })
    }
}

/// An analyzer call as it was issued: who, when, with what.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub tool_name: String,
    pub called_at: DateTime<Utc>,
    pub input_params: Map<String, Value>,
}

impl Invocation {
    /// Stamp an invocation of the analyzer for this input, now.
    pub fn begin(input: &AnalyzerInput) -> Self {
        Self {
            tool_name: input.kind().tool_name().to_string(),
            called_at: Utc::now(),
            input_params: input.audit_params(),
        }
    }
}

/// How an invocation settled.
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed { signal: Signal, elapsed: Duration },
    Failed {
        error: AnalyzerError,
        elapsed: Option<Duration>,
    },
    Cancelled { error: AnalyzerError },
}

impl Outcome {
    /// Score this outcome contributes: the signal's on success, zero otherwise.
    pub fn score(&self) -> i64 {
        match self {
            Self::Completed { signal, .. } => signal.score,
            Self::Failed { .. } | Self::Cancelled { .. } => 0,
        }
    }
}

/// Append-only builder for one run's audit trail.
pub struct AuditTrailBuilder {
    summarizer: Arc<dyn OutputSummarizer>,
    records: Vec<ExecutionRecord>,
}

impl AuditTrailBuilder {
    pub fn new(summarizer: Arc<dyn OutputSummarizer>) -> Self {
        Self {
            summarizer,
            records: Vec::new(),
        }
    }

    /// Convert one settled invocation into a record and append it.
    pub fn push(&mut self, invocation: Invocation, outcome: &Outcome) -> &ExecutionRecord {
        let record = self.record(invocation, outcome);
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Build a record without appending it.
    pub fn record(&self, invocation: Invocation, outcome: &Outcome) -> ExecutionRecord {
        let (status, output_summary, elapsed) = match outcome {
            Outcome::Completed { signal, elapsed } => {
                let summarized = catch_unwind(AssertUnwindSafe(|| {
                    self.summarizer.summarize(&invocation.tool_name, signal)
                }));
                let summary = match summarized {
                    Ok(Ok(text)) => cap(&one_line(&text)),
                    Ok(Err(e)) => {
                        warn!(tool = %invocation.tool_name, error = %e, "Output summarization failed");
                        SUMMARY_UNAVAILABLE.to_string()
                    }
                    Err(_) => {
                        warn!(tool = %invocation.tool_name, "Output summarizer panicked");
                        SUMMARY_UNAVAILABLE.to_string()
                    }
                };
                (RecordStatus::Completed, summary, Some(*elapsed))
            }
            Outcome::Failed { error, elapsed } => (
                RecordStatus::Failed,
                cap(&one_line(&format!("failed: {error}"))),
                *elapsed,
            ),
            Outcome::Cancelled { error } => (
                RecordStatus::Cancelled,
                cap(&one_line(&format!("cancelled: {error}"))),
                None,
            ),
        };

        ExecutionRecord {
            tool_name: invocation.tool_name,
            called_at: invocation.called_at,
            input_params: invocation.input_params,
            output_summary,
            execution_time_ms: elapsed.map(|d| d.as_millis() as u64),
            status,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The finished trail, in the order records were pushed.
    pub fn finish(self) -> Vec<ExecutionRecord> {
        self.records
    }
}

impl Default for AuditTrailBuilder {
    fn default() -> Self {
        Self::new(Arc::new(EvidenceSummarizer))
    }
}

/// Collapse all whitespace runs (including newlines) into single spaces.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cap(text: &str) -> String {
    if text.chars().count() <= MAX_SUMMARY_CHARS {
        return text.to_string();
    }
    let mut capped: String = text.chars().take(MAX_SUMMARY_CHARS - 3).collect();
    capped.push_str("...");
    capped
}
