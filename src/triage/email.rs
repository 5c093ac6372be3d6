//! Email intake: validated construction of an [`EmailContext`].
//!
//! Three entry points feed the coordinator:
//! - [`EmailContext::new`] from explicit fields
//! - [`TriageRequest`] from a JSON API body
//! - [`EmailContext::from_rfc822`] from a raw message
//!
//! Only the sender address and attachment names are validated. Subject and
//! body may be empty.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::triage::types::{AttachmentDescriptor, default_mime_type};

/// An inbound email under triage. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContext {
    sender: String,
    subject: String,
    body: String,
    attachments: Vec<AttachmentDescriptor>,
    received_at: DateTime<Utc>,
}

impl EmailContext {
    /// Validate and build a context received now.
    pub fn new(
        sender: &str,
        subject: impl Into<String>,
        body: impl Into<String>,
        attachments: Vec<AttachmentDescriptor>,
    ) -> Result<Self, InputError> {
        let sender = normalize_sender(sender)?;
        for (index, attachment) in attachments.iter().enumerate() {
            if attachment.filename.trim().is_empty() {
                return Err(InputError::InvalidAttachment {
                    index,
                    reason: "empty filename".into(),
                });
            }
        }

        Ok(Self {
            sender,
            subject: subject.into(),
            body: body.into(),
            attachments,
            received_at: Utc::now(),
        })
    }

    /// Override the receipt timestamp (e.g. from a parsed `Date:` header).
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Parse a raw RFC 822 message.
    pub fn from_rfc822(raw: &[u8]) -> Result<Self, InputError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| InputError::UnparsableMessage("not an RFC 822 message".into()))?;

        let sender = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .ok_or(InputError::MissingSender)?
            .to_string();

        let subject = parsed.subject().unwrap_or_default().to_string();
        let body = parsed
            .body_text(0)
            .map(|text| text.into_owned())
            .unwrap_or_default();

        let attachments = parsed
            .attachments()
            .map(|part| {
                let filename = MimeHeaders::attachment_name(part)
                    .unwrap_or("unnamed")
                    .to_string();
                let mime_type = MimeHeaders::content_type(part)
                    .map(|ct| match ct.subtype() {
                        Some(sub) => format!("{}/{}", ct.ctype(), sub),
                        None => ct.ctype().to_string(),
                    })
                    .unwrap_or_else(default_mime_type);
                AttachmentDescriptor::new(filename, mime_type)
            })
            .collect();

        let context = Self::new(&sender, subject, body, attachments)?;
        let received_at = parsed
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));

        Ok(match received_at {
            Some(ts) => context.with_received_at(ts),
            None => context,
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Domain part of the sender address, lowercased.
    pub fn sender_domain(&self) -> &str {
        self.sender
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachments(&self) -> &[AttachmentDescriptor] {
        &self.attachments
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// JSON body of a triage request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRequest {
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Option<Vec<AttachmentDescriptor>>,
}

impl TriageRequest {
    pub fn into_context(self) -> Result<EmailContext, InputError> {
        EmailContext::new(
            &self.sender_email,
            self.subject,
            self.body,
            self.attachments.unwrap_or_default(),
        )
    }
}

/// Validate a sender address and reduce it to lowercase `local@domain`.
///
/// Accepts a bare address or a display form like `Alice <alice@example.com>`.
pub fn normalize_sender(raw: &str) -> Result<String, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InputError::MissingSender);
    }

    let address = match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => trimmed[open + 1..close].trim(),
        _ => trimmed,
    };

    let invalid = |reason: &str| InputError::InvalidSender {
        address: raw.to_string(),
        reason: reason.to_string(),
    };

    if address.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    let Some((local, domain)) = address.split_once('@') else {
        return Err(invalid("missing '@'"));
    };
    if domain.contains('@') {
        return Err(invalid("more than one '@'"));
    }
    if local.is_empty() {
        return Err(invalid("empty local part"));
    }
    if !domain.contains('.') {
        return Err(invalid("domain has no dot"));
    }
    if domain.split('.').any(str::is_empty) {
        return Err(invalid("empty domain label"));
    }

    Ok(format!("{}@{}", local, domain.to_lowercase()))
}
