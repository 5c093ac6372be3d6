//! Triage coordinator: fan out to analyzers, join, score, decide.
//!
//! Flow for one email:
//! 1. Pick the applicable analyzers (attachments only when present)
//! 2. Spawn one task per analyzer, each with its own timeout
//! 3. Join until every task settles, the run deadline fires, or the caller
//!    cancels; whatever settled is kept
//! 4. Build the audit trail in invocation order and aggregate scores
//! 5. Score → classify → recommend, explain, stamp metadata
//!
//! Analyzer trouble of any kind only shows up inside the trail. The only
//! errors a caller sees are input validation and invariant violations.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzers::{Analyzer, AnalyzerInput, AnalyzerSet};
use crate::config::{RUNTIME_NAME, TriageConfig};
use crate::error::{AnalyzerError, Error, Result};
use crate::triage::audit::{AuditTrailBuilder, EvidenceSummarizer, Invocation, Outcome, OutputSummarizer};
use crate::triage::email::EmailContext;
use crate::triage::policy::{classify, recommend_action};
use crate::triage::reasoning::{ReasoningSummarizer, TemplateSummarizer};
use crate::triage::scoring::{MAX_RISK, calculate_risk};
use crate::triage::types::{
    AggregatedScores, Assessment, AttachmentDescriptor, RecordStatus, RiskVerdict, SignalKind,
};

/// Why the join stopped before every analyzer settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

/// One issued analyzer call, filled in as it settles.
struct Slot {
    kind: SignalKind,
    name: String,
    invocation: Invocation,
    outcome: Option<Outcome>,
}

/// Drives a triage run. Holds no per-run state, so one coordinator can serve
/// many concurrent runs.
pub struct TriageCoordinator {
    analyzers: AnalyzerSet,
    config: TriageConfig,
    reasoning: Arc<dyn ReasoningSummarizer>,
    output_summarizer: Arc<dyn OutputSummarizer>,
}

impl TriageCoordinator {
    /// Create a coordinator with the template reasoning and evidence summarizers.
    pub fn new(analyzers: AnalyzerSet, config: TriageConfig) -> Self {
        Self {
            analyzers,
            config,
            reasoning: Arc::new(TemplateSummarizer),
            output_summarizer: Arc::new(EvidenceSummarizer),
        }
    }

    /// Replace the reasoning summarizer.
    pub fn with_reasoning(mut self, reasoning: Arc<dyn ReasoningSummarizer>) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Replace the per-record output summarizer.
    pub fn with_output_summarizer(mut self, summarizer: Arc<dyn OutputSummarizer>) -> Self {
        self.output_summarizer = summarizer;
        self
    }

    /// Entry point from raw fields. Fails only on malformed sender or
    /// attachment descriptors.
    pub async fn analyze_email(
        &self,
        sender_email: &str,
        subject: &str,
        body: &str,
        attachments: Option<Vec<AttachmentDescriptor>>,
    ) -> Result<RiskVerdict> {
        let context =
            EmailContext::new(sender_email, subject, body, attachments.unwrap_or_default())?;
        self.run_triage(context).await
    }

    /// Triage a validated email.
    pub async fn run_triage(&self, context: EmailContext) -> Result<RiskVerdict> {
        self.run_triage_until(context, std::future::pending()).await
    }

    /// Triage a validated email, stopping early when `cancel` resolves.
    ///
    /// On cancellation in-flight analyzers are aborted, completed results are
    /// kept, and a verdict is still produced.
    pub async fn run_triage_until<F>(&self, context: EmailContext, cancel: F) -> Result<RiskVerdict>
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let execution_id = format!("exec-{}", Uuid::new_v4());

        info!(
            execution_id = %execution_id,
            sender = %context.sender(),
            attachments = context.attachments().len(),
            "Triage started"
        );

        let (slots, interruption) = self.fan_out(&context, cancel).await;
        let invoked = slots.len();

        let mut scores = AggregatedScores::default();
        let mut audit = AuditTrailBuilder::new(Arc::clone(&self.output_summarizer));
        for slot in slots {
            let outcome = slot.outcome.unwrap_or_else(|| match interruption {
                Some(Interruption::DeadlineExceeded) => Outcome::Failed {
                    error: AnalyzerError::Timeout {
                        name: slot.name.clone(),
                        timeout: self.config.run_timeout,
                    },
                    elapsed: None,
                },
                _ => Outcome::Cancelled {
                    error: AnalyzerError::Cancelled {
                        name: slot.name.clone(),
                    },
                },
            });
            scores = scores.with(slot.kind, outcome.score());
            audit.push(slot.invocation, &outcome);
        }
        let trace = audit.finish();

        let final_risk_score = calculate_risk(&scores);
        if final_risk_score > MAX_RISK {
            return Err(Error::Invariant(format!(
                "risk score {final_risk_score} exceeds {MAX_RISK}"
            )));
        }
        let classification = classify(final_risk_score);
        let action = recommend_action(classification, &scores);
        let assessment = Assessment {
            scores,
            final_risk_score,
            classification,
            action,
        };

        let reasoning_summary = self.reasoning.summarize(&assessment, &trace);

        let completed = trace.iter().filter(|r| r.is_completed()).count();
        let failed = trace
            .iter()
            .filter(|r| r.status == RecordStatus::Failed)
            .count();
        let confidence_percentage = confidence(self.config.base_confidence, completed, invoked);
        let completed_at = Utc::now();

        let mut email_metadata = BTreeMap::new();
        email_metadata.insert("sender".to_string(), context.sender().to_string());
        email_metadata.insert("subject".to_string(), context.subject().to_string());
        email_metadata.insert("received_at".to_string(), context.received_at().to_rfc3339());
        email_metadata.insert("analyzed_at".to_string(), completed_at.to_rfc3339());
        email_metadata.insert(
            "attachment_count".to_string(),
            context.attachments().len().to_string(),
        );

        let mut run_metadata = Map::new();
        run_metadata.insert("execution_id".into(), json!(execution_id));
        run_metadata.insert("engine_version".into(), json!(self.config.engine_version));
        run_metadata.insert("runtime".into(), json!(RUNTIME_NAME));
        run_metadata.insert("started_at".into(), json!(started_at.to_rfc3339()));
        run_metadata.insert("completed_at".into(), json!(completed_at.to_rfc3339()));
        run_metadata.insert("analyzers_invoked".into(), json!(invoked));
        run_metadata.insert("analyzers_failed".into(), json!(failed));
        run_metadata.insert(
            "requires_escalation".into(),
            Value::Bool(action.requires_escalation()),
        );
        run_metadata.insert(
            "cancelled".into(),
            Value::Bool(interruption == Some(Interruption::Cancelled)),
        );
        run_metadata.insert(
            "deadline_exceeded".into(),
            Value::Bool(interruption == Some(Interruption::DeadlineExceeded)),
        );

        info!(
            execution_id = %execution_id,
            risk_score = final_risk_score,
            classification = %classification,
            action = %action,
            analyzers_invoked = invoked,
            analyzers_failed = failed,
            "Triage completed"
        );

        Ok(RiskVerdict {
            email_metadata,
            tool_execution_trace: trace,
            aggregated_scores: scores,
            final_risk_score,
            classification,
            recommended_action: action,
            reasoning_summary,
            confidence_percentage,
            run_metadata,
        })
    }

    /// Spawn every applicable analyzer and join them.
    ///
    /// Slots come back in invocation order. A slot whose outcome is still
    /// `None` never settled because the join was interrupted.
    async fn fan_out<F>(
        &self,
        context: &EmailContext,
        cancel: F,
    ) -> (Vec<Slot>, Option<Interruption>)
    where
        F: Future<Output = ()>,
    {
        let mut slots = Vec::new();
        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::new();

        for (index, analyzer) in self.analyzers.applicable(context).into_iter().enumerate() {
            let kind = analyzer.kind();
            let input = AnalyzerInput::for_signal(kind, context);
            let timeout = analyzer.timeout().unwrap_or(self.config.analyzer_timeout);
            slots.push(Slot {
                kind,
                name: analyzer.name().to_string(),
                invocation: Invocation::begin(&input),
                outcome: None,
            });
            let handle = tasks.spawn(invoke(analyzer, input, timeout));
            task_slots.insert(handle.id(), index);
        }

        let deadline = tokio::time::sleep(self.config.run_timeout);
        tokio::pin!(deadline);
        tokio::pin!(cancel);

        let mut interruption = None;
        while !tasks.is_empty() {
            tokio::select! {
                biased;
                joined = tasks.join_next_with_id() => {
                    let (id, outcome) = match joined {
                        Some(Ok((id, outcome))) => (id, outcome),
                        Some(Err(e)) => {
                            let id = e.id();
                            let name = task_slots
                                .get(&id)
                                .map(|&i| slots[i].name.clone())
                                .unwrap_or_default();
                            let error = if e.is_panic() {
                                AnalyzerError::Panicked { name }
                            } else {
                                AnalyzerError::Cancelled { name }
                            };
                            warn!(error = %error, "Analyzer task ended abnormally");
                            (id, Outcome::Failed { error, elapsed: None })
                        }
                        None => break,
                    };
                    if let Some(&index) = task_slots.get(&id) {
                        slots[index].outcome = Some(outcome);
                    }
                }
                _ = &mut cancel => {
                    warn!(pending = tasks.len(), "Triage cancelled by caller, keeping settled results");
                    interruption = Some(Interruption::Cancelled);
                    break;
                }
                _ = &mut deadline => {
                    warn!(
                        pending = tasks.len(),
                        run_timeout_ms = self.config.run_timeout.as_millis() as u64,
                        "Triage deadline reached, keeping settled results"
                    );
                    interruption = Some(Interruption::DeadlineExceeded);
                    break;
                }
            }
        }

        tasks.abort_all();
        (slots, interruption)
    }
}

/// Run one analyzer under its timeout.
async fn invoke(analyzer: Arc<dyn Analyzer>, input: AnalyzerInput, timeout: Duration) -> Outcome {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, analyzer.analyze(&input)).await;
    let elapsed = start.elapsed();

    match result {
        Ok(Ok(signal)) => {
            debug!(
                analyzer = %analyzer.name(),
                score = signal.score,
                elapsed_ms = elapsed.as_millis() as u64,
                "Analyzer succeeded"
            );
            Outcome::Completed { signal, elapsed }
        }
        Ok(Err(error)) => {
            warn!(
                analyzer = %analyzer.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                "Analyzer failed"
            );
            Outcome::Failed {
                error,
                elapsed: Some(elapsed),
            }
        }
        Err(_) => {
            warn!(
                analyzer = %analyzer.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Analyzer timed out"
            );
            Outcome::Failed {
                error: AnalyzerError::Timeout {
                    name: analyzer.name().to_string(),
                    timeout,
                },
                elapsed: Some(elapsed),
            }
        }
    }
}

/// Base confidence scaled by the share of analyzers that completed.
fn confidence(base: u8, completed: usize, invoked: usize) -> u8 {
    if invoked == 0 {
        return 0;
    }
    (usize::from(base) * completed / invoked) as u8
}
