use crate::source_location::SourceSpan;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn penalty(&self) -> u32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 15,
            Severity::Medium => 8,
            Severity::Info => 3,
        }
    }

    /// One level up, never past `High`.
    pub fn escalate_capped(&self) -> Severity {
        match self {
            Severity::Info => Severity::Medium,
            Severity::Medium | Severity::High => Severity::High,
            Severity::Critical => Severity::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" | "informational" => Ok(Severity::Info),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Convention,
    Cost,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Security => "security",
            Category::Convention => "convention",
            Category::Cost => "cost",
        };
        f.write_str(s)
    }
}

/// Shape of the fix a finding asks for. Correlation compares these when two
/// passes disagree about the same location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    AddConstraint,
    RemoveConstraint,
    ReplaceConstraint,
    ReplaceType,
    RewriteExpression,
    InsertGuard,
    InsertComment,
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FindingLocation {
    pub instruction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip)]
    pub span: Option<SourceSpan>,
}

impl FindingLocation {
    pub fn instruction(name: impl Into<String>) -> Self {
        Self {
            instruction: name.into(),
            account: None,
            line: None,
            span: None,
        }
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn at(mut self, span: SourceSpan, line: u32) -> Self {
        self.span = Some(span);
        self.line = Some(line);
        self
    }

    /// (instruction, account) pair used for cross-pass comparisons.
    pub fn same_site(&self, other: &FindingLocation) -> bool {
        self.instruction == other.instruction && self.account == other.account
    }

    fn discovery_key(&self) -> u32 {
        self.span.map(|s| s.start).unwrap_or(0)
    }
}

impl fmt::Display for FindingLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instruction)?;
        if let Some(account) = &self.account {
            write!(f, ".{}", account)?;
        }
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingId(pub String);

impl FindingId {
    /// Readable id of a raw finding; identity is rule plus location.
    pub fn raw(rule_id: &str, location: &FindingLocation) -> Self {
        let mut id = format!("{}@{}", rule_id, location.instruction);
        if let Some(account) = &location.account {
            id.push('.');
            id.push_str(account);
        }
        if let Some(span) = location.span {
            id.push_str(&format!(":{}", span.start));
        }
        FindingId(id)
    }

    /// Content hash over the correlation rule and its sorted sources, so a
    /// re-run over the same inputs yields the same id.
    pub fn compound(rule: &str, sources: &[FindingId]) -> Self {
        let mut sorted: Vec<&str> = sources.iter().map(|s| s.0.as_str()).collect();
        sorted.sort_unstable();
        let mut hasher = Sha256::new();
        hasher.update(rule.as_bytes());
        for source in sorted {
            hasher.update(b"|");
            hasher.update(source.as_bytes());
        }
        let digest = hasher.finalize();
        let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
        FindingId(format!("cf-{}", hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum Origin {
    Raw,
    Derived {
        correlation_rule: String,
        sources: Vec<FindingId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub rule_id: String,
    pub title: String,
    pub category: Category,
    pub severity: Severity,
    pub base_severity: Severity,
    pub location: FindingLocation,
    pub description: String,
    pub recommendation: String,
    pub fix: RecommendationKind,
    /// Secondary identifier the fix needs (seed parameter, sibling account).
    pub subject: Option<String>,
    pub origin: Origin,
}

impl Finding {
    pub fn is_derived(&self) -> bool {
        matches!(self.origin, Origin::Derived { .. })
    }

    pub fn sources(&self) -> &[FindingId] {
        match &self.origin {
            Origin::Derived { sources, .. } => sources,
            Origin::Raw => &[],
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Ordering used for every finding list: discovery location, then rule id.
    pub fn discovery_cmp(&self, other: &Finding) -> std::cmp::Ordering {
        self.location
            .discovery_key()
            .cmp(&other.location.discovery_key())
            .then_with(|| self.rule_id.cmp(&other.rule_id))
            .then_with(|| self.id.cmp(&other.id))
    }
}

pub fn sort_by_discovery(findings: &mut [Finding]) {
    findings.sort_by(Finding::discovery_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_penalty() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Info);
        assert_eq!(Severity::High.penalty(), 15);
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("low".parse::<Severity>().is_err());
    }

    #[test]
    fn test_escalation_caps_at_high() {
        assert_eq!(Severity::Info.escalate_capped(), Severity::Medium);
        assert_eq!(Severity::Medium.escalate_capped(), Severity::High);
        assert_eq!(Severity::High.escalate_capped(), Severity::High);
    }

    #[test]
    fn test_raw_id_is_readable() {
        let location = FindingLocation::instruction("withdraw")
            .with_account("authority")
            .at(SourceSpan::new(120, 4), 7);
        assert_eq!(
            FindingId::raw("missing-signer-check", &location).as_str(),
            "missing-signer-check@withdraw.authority:120"
        );
    }

    #[test]
    fn test_compound_id_ignores_source_order() {
        let a = FindingId("a".into());
        let b = FindingId("b".into());
        let first = FindingId::compound("event-escalation", &[a.clone(), b.clone()]);
        let second = FindingId::compound("event-escalation", &[b, a]);
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("cf-"));
        assert_eq!(first.as_str().len(), 19);
    }
}
