//! Shared types for the triage pipeline.
//!
//! Everything here that appears in a [`RiskVerdict`] is part of the wire
//! contract: field names and enum string values must not change.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Signals ─────────────────────────────────────────────────────────

/// The four independent risk signals an email is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Url,
    Domain,
    Attachment,
    SocialEngineering,
}

impl SignalKind {
    /// Invocation order used by the coordinator and the audit trail.
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Url,
        SignalKind::Domain,
        SignalKind::Attachment,
        SignalKind::SocialEngineering,
    ];

    /// Tool name recorded in the execution trace.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Url => "scan_urls",
            Self::Domain => "check_domain_reputation",
            Self::Attachment => "analyze_attachments",
            Self::SocialEngineering => "detect_social_engineering",
        }
    }

    /// Reverse of [`SignalKind::tool_name`].
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tool_name() == name)
    }

    /// Human-readable label for reasoning text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Url => "URL",
            Self::Domain => "sender domain",
            Self::Attachment => "attachment",
            Self::SocialEngineering => "social engineering",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What an analyzer returns: a raw score plus a short evidence string.
///
/// The score is nominally 0–100; anything outside is clamped when the
/// coordinator aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub score: i64,
    pub evidence: String,
}

impl Signal {
    pub fn new(score: i64, evidence: impl Into<String>) -> Self {
        Self {
            score,
            evidence: evidence.into(),
        }
    }

    /// Zero score with an explanation, for inputs with nothing to inspect.
    pub fn clean(evidence: impl Into<String>) -> Self {
        Self::new(0, evidence)
    }
}

/// Clamp a raw analyzer score into [0, 100].
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

// ── Email ───────────────────────────────────────────────────────────

/// An attachment as declared by the message: name and MIME type only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub filename: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

impl AttachmentDescriptor {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

pub(crate) fn default_mime_type() -> String {
    "application/octet-stream".to_string()
}

// ── Audit trail ─────────────────────────────────────────────────────

/// How an analyzer invocation ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Completed,
    Failed,
    Cancelled,
}

/// One analyzer invocation in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_name: String,
    pub called_at: DateTime<Utc>,
    pub input_params: serde_json::Map<String, serde_json::Value>,
    pub output_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub status: RecordStatus,
}

impl ExecutionRecord {
    /// The signal this record belongs to, if the tool name is a known one.
    pub fn signal(&self) -> Option<SignalKind> {
        SignalKind::from_tool_name(&self.tool_name)
    }

    pub fn is_completed(&self) -> bool {
        self.status == RecordStatus::Completed
    }
}

// ── Scores ──────────────────────────────────────────────────────────

/// Per-signal risk, each in [0, 100]. Signals that were not collected stay 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregatedScores {
    #[serde(default)]
    pub url_risk: u8,
    #[serde(default)]
    pub domain_risk: u8,
    #[serde(default)]
    pub attachment_risk: u8,
    #[serde(default)]
    pub social_engineering_risk: u8,
}

impl AggregatedScores {
    /// Build from raw values, clamping each into [0, 100].
    pub fn new(url: i64, domain: i64, attachment: i64, social_engineering: i64) -> Self {
        Self {
            url_risk: clamp_score(url),
            domain_risk: clamp_score(domain),
            attachment_risk: clamp_score(attachment),
            social_engineering_risk: clamp_score(social_engineering),
        }
    }

    pub fn get(&self, kind: SignalKind) -> u8 {
        match kind {
            SignalKind::Url => self.url_risk,
            SignalKind::Domain => self.domain_risk,
            SignalKind::Attachment => self.attachment_risk,
            SignalKind::SocialEngineering => self.social_engineering_risk,
        }
    }

    /// Copy with one signal replaced (clamped).
    pub fn with(mut self, kind: SignalKind, raw: i64) -> Self {
        let value = clamp_score(raw);
        match kind {
            SignalKind::Url => self.url_risk = value,
            SignalKind::Domain => self.domain_risk = value,
            SignalKind::Attachment => self.attachment_risk = value,
            SignalKind::SocialEngineering => self.social_engineering_risk = value,
        }
        self
    }

    /// Signals with a non-zero score, in invocation order.
    pub fn contributing(&self) -> Vec<(SignalKind, u8)> {
        SignalKind::ALL
            .into_iter()
            .map(|k| (k, self.get(k)))
            .filter(|(_, score)| *score > 0)
            .collect()
    }
}

// ── Classification & action ─────────────────────────────────────────

/// Threat tier derived from the final risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatClassification {
    Safe,
    Suspicious,
    Malicious,
}

impl ThreatClassification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Suspicious => "suspicious",
            Self::Malicious => "malicious",
        }
    }
}

impl fmt::Display for ThreatClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single security action recommended for an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Allow,
    WarnUser,
    Quarantine,
    BlockSender,
    EscalateToSoc,
}

impl RecommendedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::WarnUser => "warn_user",
            Self::Quarantine => "quarantine",
            Self::BlockSender => "block_sender",
            Self::EscalateToSoc => "escalate_to_soc",
        }
    }

    /// High-stakes actions that a human should confirm before they are
    /// carried out.
    pub fn requires_escalation(self) -> bool {
        matches!(self, Self::BlockSender | Self::EscalateToSoc)
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score, tier and action for one email, before reasoning text is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub scores: AggregatedScores,
    pub final_risk_score: u8,
    pub classification: ThreatClassification,
    pub action: RecommendedAction,
}

// ── Verdict ─────────────────────────────────────────────────────────

/// Terminal output of one triage run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub email_metadata: BTreeMap<String, String>,
    pub tool_execution_trace: Vec<ExecutionRecord>,
    pub aggregated_scores: AggregatedScores,
    pub final_risk_score: u8,
    pub classification: ThreatClassification,
    pub recommended_action: RecommendedAction,
    pub reasoning_summary: String,
    pub confidence_percentage: u8,
    #[serde(rename = "archestra_metadata", default)]
    pub run_metadata: serde_json::Map<String, serde_json::Value>,
}

impl RiskVerdict {
    /// Execution id stamped by the coordinator.
    pub fn execution_id(&self) -> Option<&str> {
        self.run_metadata
            .get("execution_id")
            .and_then(|v| v.as_str())
    }
}
