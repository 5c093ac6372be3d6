//! Built-in pattern analyzers.
//!
//! Cheap local checks, one per signal, used whenever no remote analyzer is
//! configured. Each finding adds a fixed number of points; a signal's score is
//! the sum for its riskiest item, capped at 100.
//!
//! - URLs: IP-literal hosts, plain http, embedded credentials, punycode,
//!   shorteners, high-risk TLDs, credential-themed paths
//! - Sender domain: blocklist, high-risk TLDs, punycode, brand lookalikes
//! - Attachments: executables, macro documents, archives, double
//!   extensions, executable MIME types on innocuous names
//! - Social engineering: urgency, credential requests, threats, money,
//!   authority

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{Analyzer, AnalyzerInput};
use crate::error::AnalyzerError;
use crate::triage::types::{AttachmentDescriptor, Signal, SignalKind};

const HIGH_RISK_TLDS: &[&str] = &[
    "zip", "xyz", "top", "click", "work", "country", "gq", "tk", "ml", "cf", "loan", "mov",
];

const URL_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "t.co",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "rebrand.ly",
];

const IMPERSONATED_BRANDS: &[&str] = &[
    "paypal",
    "microsoft",
    "office365",
    "apple",
    "amazon",
    "google",
    "netflix",
    "docusign",
];

/// Second-level labels that sit under a country code as part of the suffix,
/// as in `co.uk` or `com.au`.
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "net", "org", "gov", "ac", "edu", "ne", "or"];

const EXECUTABLE_EXTENSIONS: &[&str] = &[
    "exe", "scr", "com", "pif", "bat", "cmd", "js", "jse", "vbs", "vbe", "wsf", "ps1", "jar",
    "msi", "hta", "lnk", "dll", "cpl",
];

const MACRO_EXTENSIONS: &[&str] = &["docm", "xlsm", "pptm", "dotm", "xlam"];

const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "iso", "img", "gz", "ace", "cab"];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "jpg", "jpeg", "png",
];

const EXECUTABLE_MIME_TYPES: &[&str] = &[
    "application/x-msdownload",
    "application/x-dosexec",
    "application/x-msdos-program",
    "application/vnd.microsoft.portable-executable",
    "application/x-sh",
    "application/hta",
    "application/javascript",
];

/// Longest URL echoed back in evidence.
const EVIDENCE_URL_CHARS: usize = 60;

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("built-in pattern must compile")
}

/// Points and descriptions accumulated for one inspected item.
#[derive(Debug, Default)]
struct Findings {
    points: i64,
    reasons: Vec<String>,
}

impl Findings {
    fn add(&mut self, points: i64, reason: impl Into<String>) {
        self.points += points;
        self.reasons.push(reason.into());
    }

    fn score(&self) -> i64 {
        self.points.min(100)
    }

    fn describe(&self) -> String {
        self.reasons.join(", ")
    }
}

fn tld(host: &str) -> &str {
    host.rsplit('.').next().unwrap_or_default()
}

/// The label a domain was registered under: `paypal` for both
/// `mail.paypal.com` and `paypal.co.uk`.
fn registrable_label(domain: &str) -> &str {
    let labels: Vec<&str> = domain.split('.').collect();
    let n = labels.len();
    if n >= 3 && labels[n - 1].len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&labels[n - 2]) {
        labels[n - 3]
    } else if n >= 2 {
        labels[n - 2]
    } else {
        labels.first().copied().unwrap_or_default()
    }
}

// ── URL ─────────────────────────────────────────────────────────────

/// Flags risky links in the message body.
pub struct UrlHeuristics {
    url: Regex,
    ip_host: Regex,
    lure_path: Regex,
}

impl UrlHeuristics {
    pub fn new() -> Self {
        Self {
            url: pattern(r#"(?i)\bhttps?://[^\s<>"'()\[\]]+"#),
            ip_host: pattern(r"^\d{1,3}(\.\d{1,3}){3}$"),
            lure_path: pattern(
                r"(?i)(login|log-in|signin|sign-in|verify|account|secure|update|password|phish|wallet)",
            ),
        }
    }

    fn inspect(&self, url: &str) -> Findings {
        let mut findings = Findings::default();
        let lower = url.to_lowercase();

        let (plain_http, rest) = match lower.strip_prefix("https://") {
            Some(rest) => (false, rest),
            None => (true, lower.strip_prefix("http://").unwrap_or(&lower)),
        };
        let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, path) = rest.split_at(split);

        let host_port = match authority.rsplit_once('@') {
            Some((_, host)) => {
                findings.add(30, "credentials embedded in URL");
                host
            }
            None => authority,
        };
        let host = host_port.split(':').next().unwrap_or_default();

        if self.ip_host.is_match(host) {
            findings.add(40, "IP-literal host");
        }
        if plain_http {
            findings.add(10, "unencrypted http");
        }
        if host.contains("xn--") {
            findings.add(25, "punycode host");
        }
        if URL_SHORTENERS.contains(&host) {
            findings.add(25, "URL shortener");
        }
        let tld = tld(host);
        if HIGH_RISK_TLDS.contains(&tld) {
            findings.add(20, format!("high-risk TLD .{tld}"));
        }
        if self.lure_path.is_match(path) {
            findings.add(15, "credential-themed path");
        }
        findings
    }

    fn scan(&self, body: &str) -> Signal {
        let urls: Vec<&str> = self
            .url
            .find_iter(body)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']))
            .collect();

        if urls.is_empty() {
            return Signal::clean("no URLs found");
        }

        let riskiest = urls
            .iter()
            .map(|url| (*url, self.inspect(url)))
            .max_by_key(|(_, findings)| findings.score());

        match riskiest {
            Some((url, findings)) if findings.score() > 0 => {
                let shown: String = url.chars().take(EVIDENCE_URL_CHARS).collect();
                Signal::new(
                    findings.score(),
                    format!(
                        "{} URL(s) found; riskiest {}: {}",
                        urls.len(),
                        shown,
                        findings.describe()
                    ),
                )
            }
            _ => Signal::clean(format!("{} URL(s) found, no risk indicators", urls.len())),
        }
    }
}

impl Default for UrlHeuristics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for UrlHeuristics {
    fn kind(&self) -> SignalKind {
        SignalKind::Url
    }

    async fn analyze(&self, input: &AnalyzerInput) -> Result<Signal, AnalyzerError> {
        match input {
            AnalyzerInput::Url { body } => Ok(self.scan(body)),
            other => Err(mismatched(self.name(), other)),
        }
    }
}

// ── Domain ──────────────────────────────────────────────────────────

/// Scores the sender's domain.
pub struct DomainHeuristics {
    blocklist: Vec<String>,
}

impl DomainHeuristics {
    pub fn new(blocklist: Vec<String>) -> Self {
        Self {
            blocklist: blocklist.into_iter().map(|d| d.to_lowercase()).collect(),
        }
    }

    fn is_blocked(&self, domain: &str) -> bool {
        self.blocklist
            .iter()
            .any(|entry| domain == entry || domain.ends_with(&format!(".{entry}")))
    }

    fn check(&self, sender: &str) -> Signal {
        let domain = sender
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or(sender)
            .to_lowercase();

        if self.is_blocked(&domain) {
            return Signal::new(100, format!("{domain} is on the domain blocklist"));
        }

        let mut findings = Findings::default();
        let registrable = registrable_label(&domain);

        let tld = tld(&domain);
        if HIGH_RISK_TLDS.contains(&tld) {
            findings.add(30, format!("high-risk TLD .{tld}"));
        }
        if domain.contains("xn--") {
            findings.add(30, "punycode domain");
        }
        if let Some(brand) = IMPERSONATED_BRANDS
            .iter()
            .find(|brand| domain.contains(*brand) && registrable != **brand)
        {
            findings.add(40, format!("lookalike of {brand}"));
        }
        if registrable.matches('-').count() >= 2 {
            findings.add(15, "heavily hyphenated name");
        }
        if registrable.chars().filter(char::is_ascii_digit).count() >= 3 {
            findings.add(15, "numeric-heavy name");
        }

        if findings.points == 0 {
            Signal::clean(format!("no reputation indicators for {domain}"))
        } else {
            Signal::new(
                findings.score(),
                format!("{domain}: {}", findings.describe()),
            )
        }
    }
}

#[async_trait]
impl Analyzer for DomainHeuristics {
    fn kind(&self) -> SignalKind {
        SignalKind::Domain
    }

    async fn analyze(&self, input: &AnalyzerInput) -> Result<Signal, AnalyzerError> {
        match input {
            AnalyzerInput::Domain { sender } => Ok(self.check(sender)),
            other => Err(mismatched(self.name(), other)),
        }
    }
}

// ── Attachments ─────────────────────────────────────────────────────

/// Judges attachments by declared name and MIME type.
#[derive(Debug, Default)]
pub struct AttachmentHeuristics;

impl AttachmentHeuristics {
    pub fn new() -> Self {
        Self
    }

    fn inspect(attachment: &AttachmentDescriptor) -> Findings {
        let mut findings = Findings::default();
        let name = attachment.filename.trim().to_lowercase();
        let mime = attachment.mime_type.trim().to_lowercase();
        let segments: Vec<&str> = name.split('.').collect();
        let ext = if segments.len() > 1 {
            segments[segments.len() - 1]
        } else {
            ""
        };

        let executable = EXECUTABLE_EXTENSIONS.contains(&ext);
        let risky = if executable {
            findings.add(80, format!("executable .{ext}"));
            true
        } else if MACRO_EXTENSIONS.contains(&ext) {
            findings.add(60, format!("macro-enabled .{ext}"));
            true
        } else if ARCHIVE_EXTENSIONS.contains(&ext) {
            findings.add(30, format!("archive .{ext}"));
            true
        } else {
            false
        };

        if risky
            && segments.len() > 2
            && DOCUMENT_EXTENSIONS.contains(&segments[segments.len() - 2])
        {
            findings.add(20, "double extension");
        }

        if !executable && EXECUTABLE_MIME_TYPES.contains(&mime.as_str()) {
            findings.add(40, format!("declared as {mime}"));
        }
        findings
    }

    fn analyze_all(attachments: &[AttachmentDescriptor]) -> Signal {
        if attachments.is_empty() {
            return Signal::clean("no attachments");
        }

        let riskiest = attachments
            .iter()
            .map(|a| (a, Self::inspect(a)))
            .max_by_key(|(_, findings)| findings.score());

        match riskiest {
            Some((attachment, findings)) if findings.score() > 0 => Signal::new(
                findings.score(),
                format!(
                    "{} attachment(s); {}: {}",
                    attachments.len(),
                    attachment.filename,
                    findings.describe()
                ),
            ),
            _ => Signal::clean(format!(
                "{} attachment(s), no risky file types",
                attachments.len()
            )),
        }
    }
}

#[async_trait]
impl Analyzer for AttachmentHeuristics {
    fn kind(&self) -> SignalKind {
        SignalKind::Attachment
    }

    async fn analyze(&self, input: &AnalyzerInput) -> Result<Signal, AnalyzerError> {
        match input {
            AnalyzerInput::Attachment { attachments } => Ok(Self::analyze_all(attachments)),
            other => Err(mismatched(self.name(), other)),
        }
    }
}

// ── Social engineering ──────────────────────────────────────────────

/// Points per manipulation category present in subject or body.
const CUE_POINTS: i64 = 20;

/// Looks for manipulation cues in subject and body.
pub struct SocialEngineeringHeuristics {
    cues: Vec<(&'static str, Regex)>,
}

impl SocialEngineeringHeuristics {
    pub fn new() -> Self {
        let cues = vec![
            (
                "urgency",
                pattern(
                    r"(?i)\b(urgent|immediately|right away|as soon as possible|asap|within 24 hours|act now|final notice|expires? today)\b",
                ),
            ),
            (
                "credential request",
                pattern(
                    r"(?i)\b(verify your (account|identity|email)|confirm your (account|identity|password)|(enter|update|reset) your password|log ?in to (restore|verify|unlock))\b",
                ),
            ),
            (
                "threat of consequences",
                pattern(
                    r"(?i)\b(suspended|locked|disabled|terminated|legal action|penalty|unauthori[sz]ed (access|activity)|closed permanently)\b",
                ),
            ),
            (
                "financial request",
                pattern(
                    r"(?i)\b(wire transfer|gift cards?|bank details|payment (is )?overdue|outstanding invoice|bitcoin|crypto ?wallet)\b",
                ),
            ),
            (
                "authority impersonation",
                pattern(
                    r"(?i)\b(ceo|cfo|it (department|support|helpdesk)|security team|system administrator|irs|hr department)\b",
                ),
            ),
        ];
        Self { cues }
    }

    fn detect(&self, subject: &str, body: &str) -> Signal {
        let text = format!("{subject}\n{body}");
        let matched: Vec<&str> = self
            .cues
            .iter()
            .filter(|(_, re)| re.is_match(&text))
            .map(|(name, _)| *name)
            .collect();

        debug!(cues = matched.len(), "Social engineering scan complete");

        if matched.is_empty() {
            Signal::clean("no manipulation cues")
        } else {
            Signal::new(
                (matched.len() as i64 * CUE_POINTS).min(100),
                format!("matched cues: {}", matched.join(", ")),
            )
        }
    }
}

impl Default for SocialEngineeringHeuristics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for SocialEngineeringHeuristics {
    fn kind(&self) -> SignalKind {
        SignalKind::SocialEngineering
    }

    async fn analyze(&self, input: &AnalyzerInput) -> Result<Signal, AnalyzerError> {
        match input {
            AnalyzerInput::SocialEngineering { subject, body } => Ok(self.detect(subject, body)),
            other => Err(mismatched(self.name(), other)),
        }
    }
}

fn mismatched(name: &str, input: &AnalyzerInput) -> AnalyzerError {
    AnalyzerError::InvalidResponse {
        name: name.to_string(),
        reason: format!("received {} input", input.kind()),
    }
}
