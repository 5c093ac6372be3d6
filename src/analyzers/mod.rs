//! Analyzer capability contract.
//!
//! Each analyzer sees only the slice of the email it needs
//! ([`AnalyzerInput`]) and answers with a [`Signal`]. How it decides is its
//! own business: the built-in [`heuristic`] analyzers match patterns locally,
//! [`remote`] analyzers call an external tool server.

pub mod heuristic;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, ConfigError};
use crate::triage::email::EmailContext;
use crate::triage::types::{AttachmentDescriptor, Signal, SignalKind};

/// Longest text preview kept in audit parameters.
const AUDIT_PREVIEW_CHARS: usize = 80;

/// The narrow view of an email handed to one analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerInput {
    Url { body: String },
    Domain { sender: String },
    Attachment { attachments: Vec<AttachmentDescriptor> },
    SocialEngineering { subject: String, body: String },
}

impl AnalyzerInput {
    /// Slice the context for the given signal.
    pub fn for_signal(kind: SignalKind, context: &EmailContext) -> Self {
        match kind {
            SignalKind::Url => Self::Url {
                body: context.body().to_string(),
            },
            SignalKind::Domain => Self::Domain {
                sender: context.sender().to_string(),
            },
            SignalKind::Attachment => Self::Attachment {
                attachments: context.attachments().to_vec(),
            },
            SignalKind::SocialEngineering => Self::SocialEngineering {
                subject: context.subject().to_string(),
                body: context.body().to_string(),
            },
        }
    }

    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Url { .. } => SignalKind::Url,
            Self::Domain { .. } => SignalKind::Domain,
            Self::Attachment { .. } => SignalKind::Attachment,
            Self::SocialEngineering { .. } => SignalKind::SocialEngineering,
        }
    }

    /// Full arguments, as sent to a remote tool.
    pub fn arguments(&self) -> Value {
        match self {
            Self::Url { body } => json!({ "email_body": body }),
            Self::Domain { sender } => json!({ "sender_email": sender }),
            Self::Attachment { attachments } => json!({ "attachments": attachments }),
            Self::SocialEngineering { subject, body } => {
                json!({ "subject": subject, "email_body": body })
            }
        }
    }

    /// Parameters recorded in the audit trail. Long text is reduced to its
    /// length and a short preview.
    pub fn audit_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            Self::Url { body } => {
                insert_text_digest(&mut params, "email_body", body);
            }
            Self::Domain { sender } => {
                params.insert("sender_email".into(), json!(sender));
            }
            Self::Attachment { attachments } => {
                params.insert("attachments".into(), json!(attachments));
            }
            Self::SocialEngineering { subject, body } => {
                params.insert("subject".into(), json!(subject));
                insert_text_digest(&mut params, "email_body", body);
            }
        }
        params
    }
}

fn insert_text_digest(params: &mut Map<String, Value>, key: &str, text: &str) {
    let chars = text.chars().count();
    let preview: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(AUDIT_PREVIEW_CHARS)
        .collect();
    params.insert(format!("{key}_chars"), json!(chars));
    params.insert(format!("{key}_preview"), json!(preview));
}

/// One independent risk analyzer.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Which signal this analyzer produces.
    fn kind(&self) -> SignalKind;

    /// Identifier for logs. Defaults to the signal's tool name.
    fn name(&self) -> &str {
        self.kind().tool_name()
    }

    /// Analyzer-specific timeout. `None` uses the coordinator default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Score the input. Failures are absorbed by the coordinator.
    async fn analyze(&self, input: &AnalyzerInput) -> Result<Signal, AnalyzerError>;
}

/// The analyzers available to a coordinator, one slot per signal.
///
/// Built explicitly and handed to the coordinator, so independent runs can
/// use different sets side by side.
#[derive(Clone, Default)]
pub struct AnalyzerSet {
    url: Option<Arc<dyn Analyzer>>,
    domain: Option<Arc<dyn Analyzer>>,
    attachment: Option<Arc<dyn Analyzer>>,
    social_engineering: Option<Arc<dyn Analyzer>>,
}

impl AnalyzerSet {
    /// An empty set. Every run against it produces an all-zero verdict.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an analyzer in the slot for its signal, replacing any previous one.
    pub fn with(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.insert(analyzer);
        self
    }

    pub fn insert(&mut self, analyzer: Arc<dyn Analyzer>) {
        let slot = match analyzer.kind() {
            SignalKind::Url => &mut self.url,
            SignalKind::Domain => &mut self.domain,
            SignalKind::Attachment => &mut self.attachment,
            SignalKind::SocialEngineering => &mut self.social_engineering,
        };
        if let Some(previous) = slot.replace(analyzer) {
            tracing::debug!(analyzer = %previous.name(), "Replaced analyzer");
        }
    }

    pub fn get(&self, kind: SignalKind) -> Option<&Arc<dyn Analyzer>> {
        match kind {
            SignalKind::Url => self.url.as_ref(),
            SignalKind::Domain => self.domain.as_ref(),
            SignalKind::Attachment => self.attachment.as_ref(),
            SignalKind::SocialEngineering => self.social_engineering.as_ref(),
        }
    }

    /// Number of configured analyzers.
    pub fn count(&self) -> usize {
        SignalKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_some())
            .count()
    }

    /// Names of the configured analyzers, in invocation order.
    pub fn names(&self) -> Vec<&str> {
        SignalKind::ALL
            .into_iter()
            .filter_map(|k| self.get(k).map(|a| a.name()))
            .collect()
    }

    /// Analyzers that apply to this email, in invocation order. The
    /// attachment analyzer only applies when there are attachments.
    pub fn applicable(&self, context: &EmailContext) -> Vec<Arc<dyn Analyzer>> {
        SignalKind::ALL
            .into_iter()
            .filter(|kind| *kind != SignalKind::Attachment || context.has_attachments())
            .filter_map(|kind| self.get(kind).cloned())
            .collect()
    }

    /// All four built-in heuristic analyzers.
    pub fn heuristic(domain_blocklist: Vec<String>) -> Self {
        Self::new()
            .with(Arc::new(heuristic::UrlHeuristics::new()))
            .with(Arc::new(heuristic::DomainHeuristics::new(domain_blocklist)))
            .with(Arc::new(heuristic::AttachmentHeuristics::new()))
            .with(Arc::new(heuristic::SocialEngineeringHeuristics::new()))
    }

    /// Build from configuration: a remote analyzer where an endpoint is set,
    /// the heuristic one otherwise.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, ConfigError> {
        let mut set = Self::heuristic(config.domain_blocklist.clone());
        let endpoints = [
            (SignalKind::Url, &config.url_endpoint),
            (SignalKind::Domain, &config.domain_endpoint),
            (SignalKind::Attachment, &config.attachment_endpoint),
            (SignalKind::SocialEngineering, &config.social_endpoint),
        ];
        for (kind, endpoint) in endpoints {
            if let Some(endpoint) = endpoint {
                let mut analyzer =
                    remote::RemoteAnalyzer::new(kind, endpoint.clone(), config.api_key.clone())?;
                if let Some(timeout) = config.remote_timeout {
                    analyzer = analyzer.with_timeout(timeout);
                }
                tracing::info!(signal = %kind, endpoint = %endpoint, "Using remote analyzer");
                set.insert(Arc::new(analyzer));
            }
        }
        Ok(set)
    }
}

impl std::fmt::Debug for AnalyzerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerSet")
            .field("analyzers", &self.names())
            .finish()
    }
}
