//! Reasoning summary for a verdict.
//!
//! The summary is the only free text in a verdict. It sits behind
//! [`ReasoningSummarizer`] so a generative backend can replace the template
//! without touching scoring. Implementations must only restate what the
//! scores and the audit trail contain.

use crate::triage::policy::BLOCK_THRESHOLD;
use crate::triage::scoring::contributions;
use crate::triage::types::{Assessment, ExecutionRecord, RecordStatus, SignalKind, ThreatClassification};

/// Produces the human-readable explanation attached to a verdict.
pub trait ReasoningSummarizer: Send + Sync {
    fn summarize(&self, assessment: &Assessment, trace: &[ExecutionRecord]) -> String;
}

/// Deterministic sentence template over scores and trace.
#[derive(Debug, Default)]
pub struct TemplateSummarizer;

impl ReasoningSummarizer for TemplateSummarizer {
    fn summarize(&self, assessment: &Assessment, trace: &[ExecutionRecord]) -> String {
        let scores = &assessment.scores;
        let mut sentences = vec![format!(
            "Risk score {}/100 ({}).",
            assessment.final_risk_score, assessment.classification
        )];

        let weighted = contributions(scores);
        if weighted.is_empty() {
            sentences.push("No analyzer reported risk.".to_string());
        } else {
            let parts: Vec<String> = weighted
                .iter()
                .map(|(kind, hundredths)| {
                    let evidence = record_for(trace, *kind)
                        .map(|r| format!("; {}", r.output_summary))
                        .unwrap_or_default();
                    format!(
                        "{} {}/100 (+{}.{:02} pts{})",
                        kind,
                        scores.get(*kind),
                        hundredths / 100,
                        hundredths % 100,
                        evidence
                    )
                })
                .collect();
            sentences.push(format!("Contributing signals: {}.", parts.join(", ")));
        }

        let quiet: Vec<&str> = trace
            .iter()
            .filter(|r| r.is_completed())
            .filter_map(|r| r.signal())
            .filter(|kind| scores.get(*kind) == 0)
            .map(SignalKind::label)
            .collect();
        if !quiet.is_empty() {
            sentences.push(format!("No risk found by: {}.", quiet.join(", ")));
        }

        let unavailable: Vec<String> = trace
            .iter()
            .filter(|r| !r.is_completed())
            .map(|r| {
                let state = match r.status {
                    RecordStatus::Cancelled => "cancelled",
                    _ => "failed",
                };
                format!("{} ({state})", r.tool_name)
            })
            .collect();
        if !unavailable.is_empty() {
            sentences.push(format!(
                "Unavailable analyzers, counted as no evidence: {}.",
                unavailable.join(", ")
            ));
        }

        if assessment.classification == ThreatClassification::Safe {
            let hot: Vec<String> = scores
                .contributing()
                .into_iter()
                .filter(|(_, score)| *score > BLOCK_THRESHOLD)
                .map(|(kind, score)| format!("{kind} {score}/100"))
                .collect();
            if !hot.is_empty() {
                sentences.push(format!(
                    "Note: {} alone does not lift the weighted total out of the safe band.",
                    hot.join(" and ")
                ));
            }
        }

        let mut closing = format!("Recommended action: {}", assessment.action);
        if assessment.action.requires_escalation() {
            closing.push_str(" (requires analyst confirmation)");
        }
        closing.push('.');
        sentences.push(closing);

        sentences.join(" ")
    }
}

fn record_for(trace: &[ExecutionRecord], kind: SignalKind) -> Option<&ExecutionRecord> {
    trace
        .iter()
        .find(|r| r.is_completed() && r.signal() == Some(kind))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Map;

    use super::*;
    use crate::triage::types::{AggregatedScores, RecommendedAction};

    fn record(kind: SignalKind, status: RecordStatus, summary: &str) -> ExecutionRecord {
        ExecutionRecord {
            tool_name: kind.tool_name().to_string(),
            called_at: Utc::now(),
            input_params: Map::new(),
            output_summary: summary.to_string(),
            execution_time_ms: Some(1),
            status,
        }
    }

    #[test]
    fn all_quiet_run() {
        let assessment = Assessment {
            scores: AggregatedScores::default(),
            final_risk_score: 0,
            classification: ThreatClassification::Safe,
            action: RecommendedAction::Allow,
        };
        let trace = vec![
            record(SignalKind::Url, RecordStatus::Completed, "score 0/100: no URLs found"),
            record(SignalKind::Domain, RecordStatus::Completed, "score 0/100: clean"),
        ];
        let text = TemplateSummarizer.summarize(&assessment, &trace);
        assert_eq!(
            text,
            "Risk score 0/100 (safe). No analyzer reported risk. \
             No risk found by: URL, sender domain. Recommended action: allow."
        );
    }

    #[test]
    fn contributing_signals_and_failures_are_named() {
        let scores = AggregatedScores::new(0, 100, 100, 0);
        let assessment = Assessment {
            scores,
            final_risk_score: 65,
            classification: ThreatClassification::Malicious,
            action: RecommendedAction::BlockSender,
        };
        let trace = vec![
            record(SignalKind::Url, RecordStatus::Failed, "failed: timed out"),
            record(SignalKind::Domain, RecordStatus::Completed, "score 100/100: blocklisted"),
            record(SignalKind::Attachment, RecordStatus::Completed, "score 100/100: exe"),
            record(SignalKind::SocialEngineering, RecordStatus::Cancelled, "cancelled"),
        ];
        let text = TemplateSummarizer.summarize(&assessment, &trace);
        assert!(text.starts_with("Risk score 65/100 (malicious)."));
        assert!(text.contains("sender domain 100/100 (+30.00 pts; score 100/100: blocklisted)"));
        assert!(text.contains("attachment 100/100 (+35.00 pts; score 100/100: exe)"));
        assert!(text.contains(
            "Unavailable analyzers, counted as no evidence: scan_urls (failed), detect_social_engineering (cancelled)."
        ));
        assert!(text.ends_with("Recommended action: block_sender (requires analyst confirmation)."));
        assert!(!text.contains("No risk found by"));
    }

    #[test]
    fn safe_band_with_hot_component_is_explained() {
        let assessment = Assessment {
            scores: AggregatedScores::new(0, 90, 0, 0),
            final_risk_score: 27,
            classification: ThreatClassification::Safe,
            action: RecommendedAction::Allow,
        };
        let trace = vec![record(
            SignalKind::Domain,
            RecordStatus::Completed,
            "score 90/100: lookalike",
        )];
        let text = TemplateSummarizer.summarize(&assessment, &trace);
        assert!(text.contains("sender domain 90/100 (+27.00 pts"));
        assert!(text.contains("Note: sender domain 90/100 alone"));
    }
}
