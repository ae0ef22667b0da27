//! Core record types for the substrate.

use crate::error::MyceliumError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain assigned to entries written without one.
pub const DEFAULT_DOMAIN: &str = "general";

/// Second-precision UTC timestamp format used on disk.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format an instant the way entries and the ledger store it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the native format and any RFC 3339 form.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Trim tags, drop empty ones, and fall back to [`DEFAULT_DOMAIN`].
pub fn normalize_domains<I, S>(domains: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags: Vec<String> = domains
        .into_iter()
        .map(|d| d.as_ref().trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();
    if tags.is_empty() {
        vec![DEFAULT_DOMAIN.to_string()]
    } else {
        tags
    }
}

/// What sort of record an entry is.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Lesson,
    Question,
    Ghost,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Lesson => "lesson",
            Kind::Question => "question",
            Kind::Ghost => "ghost",
        }
    }
}

/// How loudly an entry asks to be surfaced.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Routine,
    Notable,
    Critical,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Routine => "routine",
            Urgency::Notable => "notable",
            Urgency::Critical => "critical",
        }
    }

    /// Fixed score contribution.
    pub fn weight(self) -> f64 {
        match self {
            Urgency::Critical => 4.0,
            Urgency::Notable => 2.0,
            Urgency::Routine => 0.0,
        }
    }
}

/// How sure the writer was.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Speculation,
    #[default]
    Observation,
    Hypothesis,
    Proven,
    Canonical,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Speculation => "speculation",
            Confidence::Observation => "observation",
            Confidence::Hypothesis => "hypothesis",
            Confidence::Proven => "proven",
            Confidence::Canonical => "canonical",
        }
    }

    /// Fixed score contribution.
    pub fn weight(self) -> f64 {
        match self {
            Confidence::Canonical => 5.0,
            Confidence::Proven => 3.0,
            Confidence::Hypothesis => 2.0,
            Confidence::Observation => 1.0,
            Confidence::Speculation => 0.5,
        }
    }
}

macro_rules! str_enum_impls {
    ($ty:ident, $label:literal, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = MyceliumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                $(
                    if lower == $ty::$variant.as_str() {
                        return Ok($ty::$variant);
                    }
                )+
                Err(MyceliumError::InvalidEntry(format!(
                    concat!("unknown ", $label, ": '{}'"),
                    s
                )))
            }
        }
    };
}

str_enum_impls!(Kind, "kind", [Lesson, Question, Ghost]);
str_enum_impls!(Urgency, "urgency", [Routine, Notable, Critical]);
str_enum_impls!(
    Confidence,
    "confidence",
    [Speculation, Observation, Hypothesis, Proven, Canonical]
);

/// One alternative considered during a deliberation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub label: String,
    pub weight: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Branch {
    pub fn new(label: impl Into<String>, weight: f64, reasoning: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            weight,
            reasoning: reasoning.into(),
        }
    }
}

/// A pre-decision deliberation: the branches weighed and the one chosen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GhostTrace {
    pub branches: Vec<Branch>,
    pub collapsed_to: String,
    pub collapse_reason: String,
}

impl GhostTrace {
    /// Build a trace with branch weights normalized to sum to 1.0,
    /// each rounded to three decimals. A zero or negative total leaves
    /// the weights untouched.
    pub fn normalized(
        mut branches: Vec<Branch>,
        collapsed_to: impl Into<String>,
        collapse_reason: impl Into<String>,
    ) -> Self {
        let total: f64 = branches.iter().map(|b| b.weight).sum();
        if total > 0.0 && total.is_finite() {
            for branch in &mut branches {
                branch.weight = (branch.weight / total * 1000.0).round() / 1000.0;
            }
        }
        Self {
            branches,
            collapsed_to: collapsed_to.into(),
            collapse_reason: collapse_reason.into(),
        }
    }

    /// Generated prose stored as the ghost entry's content.
    pub fn summary(&self) -> String {
        format!(
            "Ghost: {} branches → collapsed to '{}'",
            self.branches.len(),
            self.collapsed_to
        )
    }

    /// Branches sorted by weight, heaviest first.
    pub fn ranked_branches(&self) -> Vec<&Branch> {
        let mut sorted: Vec<&Branch> = self.branches.iter().collect();
        sorted.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }
}

/// Kind-specific payload of an entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EntryBody {
    #[default]
    Lesson,
    Question,
    Ghost(GhostTrace),
}

impl EntryBody {
    pub fn kind(&self) -> Kind {
        match self {
            EntryBody::Lesson => Kind::Lesson,
            EntryBody::Question => Kind::Question,
            EntryBody::Ghost(_) => Kind::Ghost,
        }
    }
}

/// A stored observation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub struct MemoryEntry {
    /// Creation instant, `%Y-%m-%dT%H:%M:%SZ`. Kept as text so a bad value
    /// degrades to age zero instead of failing the read.
    pub timestamp: String,
    pub agent: String,
    /// Topic tags; the first one is the partition key.
    pub domain: Vec<String>,
    pub urgency: Urgency,
    pub confidence: Confidence,
    pub content: String,
    /// Fingerprint of the entry this one threads from.
    pub reference: Option<String>,
    /// Timestamp of the entry this one replaces.
    pub supersedes: Option<String>,
    pub body: EntryBody,
}

impl MemoryEntry {
    /// A new entry stamped with the current time.
    pub fn new(
        agent: impl Into<String>,
        domains: Vec<String>,
        content: impl Into<String>,
        body: EntryBody,
    ) -> Self {
        Self {
            timestamp: format_timestamp(Utc::now()),
            agent: agent.into(),
            domain: normalize_domains(domains),
            urgency: Urgency::default(),
            confidence: Confidence::default(),
            content: content.into(),
            reference: None,
            supersedes: None,
            body,
        }
    }

    pub fn kind(&self) -> Kind {
        self.body.kind()
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self.body, EntryBody::Ghost(_))
    }

    pub fn ghost(&self) -> Option<&GhostTrace> {
        match &self.body {
            EntryBody::Ghost(trace) => Some(trace),
            _ => None,
        }
    }

    /// First domain tag, used as the partition key.
    pub fn primary_domain(&self) -> &str {
        self.domain
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_DOMAIN)
    }

    /// True when `requested` is empty or shares at least one tag.
    pub fn matches_domains(&self, requested: &[String]) -> bool {
        requested.is_empty() || requested.iter().any(|d| self.domain.contains(d))
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Fractional days since creation. Unparseable or future timestamps
    /// count as age zero.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        match self.created_at() {
            Some(ts) => ((now - ts).num_seconds() as f64 / 86_400.0).max(0.0),
            None => 0.0,
        }
    }

    /// Stable key into the resonance ledger.
    pub fn fingerprint(&self) -> String {
        crate::fingerprint::entry_fingerprint(self)
    }
}

/// On-disk shape of an entry. Accepts the older `ts` and `type` spellings.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEntry {
    #[serde(alias = "ts")]
    timestamp: String,
    agent: String,
    #[serde(default)]
    domain: Vec<String>,
    #[serde(default, alias = "type")]
    kind: Kind,
    #[serde(default)]
    urgency: Urgency,
    #[serde(default)]
    confidence: Confidence,
    content: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    supersedes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branches: Option<Vec<Branch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collapsed_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collapse_reason: Option<String>,
}

impl TryFrom<RawEntry> for MemoryEntry {
    type Error = MyceliumError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        if raw.agent.trim().is_empty() {
            return Err(MyceliumError::InvalidEntry(format!(
                "entry at {} has no agent",
                raw.timestamp
            )));
        }

        let body = match raw.kind {
            Kind::Lesson => EntryBody::Lesson,
            Kind::Question => EntryBody::Question,
            Kind::Ghost => EntryBody::Ghost(GhostTrace {
                branches: raw.branches.unwrap_or_default(),
                collapsed_to: raw.collapsed_to.unwrap_or_default(),
                collapse_reason: raw.collapse_reason.unwrap_or_default(),
            }),
        };

        Ok(MemoryEntry {
            timestamp: raw.timestamp,
            agent: raw.agent,
            domain: normalize_domains(raw.domain),
            urgency: raw.urgency,
            confidence: raw.confidence,
            content: raw.content,
            reference: raw.reference,
            supersedes: raw.supersedes,
            body,
        })
    }
}

impl From<MemoryEntry> for RawEntry {
    fn from(entry: MemoryEntry) -> Self {
        let kind = entry.kind();
        let (branches, collapsed_to, collapse_reason) = match entry.body {
            EntryBody::Ghost(trace) => (
                Some(trace.branches),
                Some(trace.collapsed_to),
                Some(trace.collapse_reason),
            ),
            EntryBody::Lesson | EntryBody::Question => (None, None, None),
        };

        RawEntry {
            timestamp: entry.timestamp,
            agent: entry.agent,
            domain: entry.domain,
            kind,
            urgency: entry.urgency,
            confidence: entry.confidence,
            content: entry.content,
            reference: entry.reference,
            supersedes: entry.supersedes,
            branches,
            collapsed_to,
            collapse_reason,
        }
    }
}

/// An entry handed back by a retrieval, with its read-time staleness.
#[derive(Debug, Clone, PartialEq)]
pub struct Tasted {
    pub entry: MemoryEntry,
    /// A newer candidate in the same retrieval declared it replaced.
    pub stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(content: &str) -> MemoryEntry {
        MemoryEntry {
            timestamp: "2026-01-10T12:00:00Z".to_string(),
            agent: "forge".to_string(),
            domain: vec!["code".to_string(), "infra".to_string()],
            urgency: Urgency::Notable,
            confidence: Confidence::Proven,
            content: content.to_string(),
            reference: Some("abc123".to_string()),
            supersedes: None,
            body: EntryBody::Lesson,
        }
    }

    #[test]
    fn lesson_json_uses_documented_field_names() {
        let json = serde_json::to_value(lesson("Never force-push.")).unwrap();
        assert_eq!(json["timestamp"], "2026-01-10T12:00:00Z");
        assert_eq!(json["kind"], "lesson");
        assert_eq!(json["urgency"], "notable");
        assert_eq!(json["confidence"], "proven");
        assert_eq!(json["ref"], "abc123");
        assert!(json.get("supersedes").is_none());
        assert!(json.get("branches").is_none());
    }

    #[test]
    fn ghost_roundtrip_keeps_branches() {
        let trace = GhostTrace::normalized(
            vec![Branch::new("a", 1.0, "x"), Branch::new("b", 3.0, "y")],
            "b",
            "heavier",
        );
        let entry = MemoryEntry::new("swiv", vec!["trading".into()], trace.summary(), EntryBody::Ghost(trace));
        let line = serde_json::to_string(&entry).unwrap();
        let back: MemoryEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.ghost().unwrap().branches[1].weight, 0.75);
    }

    #[test]
    fn legacy_spellings_are_accepted() {
        let line = r#"{"ts":"2025-03-01T00:00:00Z","agent":"swiv","domain":["trading"],"type":"ghost","branches":[{"label":"go","weight":0.5,"reasoning":"r"}],"collapsed_to":"go","collapse_reason":"why","content":"Ghost","urgency":"routine","confidence":"observation"}"#;
        let entry: MemoryEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.timestamp, "2025-03-01T00:00:00Z");
        assert_eq!(entry.kind(), Kind::Ghost);
        assert_eq!(entry.ghost().unwrap().collapsed_to, "go");
    }

    #[test]
    fn missing_kind_and_domain_default() {
        let line = r#"{"ts":"2025-03-01T00:00:00Z","agent":"a","content":"c"}"#;
        let entry: MemoryEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.kind(), Kind::Lesson);
        assert_eq!(entry.domain, vec![DEFAULT_DOMAIN.to_string()]);
        assert_eq!(entry.confidence, Confidence::Observation);
        assert_eq!(entry.urgency, Urgency::Routine);
    }

    #[test]
    fn empty_agent_is_rejected() {
        let line = r#"{"timestamp":"2025-03-01T00:00:00Z","agent":" ","content":"c"}"#;
        assert!(serde_json::from_str::<MemoryEntry>(line).is_err());
    }

    #[test]
    fn branch_weights_normalize_to_one() {
        let trace = GhostTrace::normalized(
            vec![
                Branch::new("go live now", 0.25, ""),
                Branch::new("shadow first", 0.65, ""),
                Branch::new("abort", 0.10, ""),
            ],
            "shadow first",
            "",
        );
        let sum: f64 = trace.branches.iter().map(|b| b.weight).sum();
        assert!((sum - 1.0).abs() <= 0.001, "sum was {sum}");
        assert_eq!(trace.ranked_branches()[0].label, "shadow first");
    }

    #[test]
    fn unnormalizable_weights_are_left_alone() {
        let trace = GhostTrace::normalized(vec![Branch::new("a", 0.0, "")], "a", "");
        assert_eq!(trace.branches[0].weight, 0.0);
    }

    #[test]
    fn domains_normalize_to_general() {
        assert_eq!(normalize_domains(Vec::<String>::new()), vec!["general"]);
        assert_eq!(normalize_domains([" code ", ""]), vec!["code"]);
    }

    #[test]
    fn domain_membership_is_any_tag() {
        let entry = lesson("x");
        assert!(entry.matches_domains(&[]));
        assert!(entry.matches_domains(&["infra".to_string()]));
        assert!(!entry.matches_domains(&["trading".to_string()]));
        assert_eq!(entry.primary_domain(), "code");
    }

    #[test]
    fn age_is_zero_for_bad_or_future_timestamps() {
        let now = parse_timestamp("2026-01-20T12:00:00Z").unwrap();
        let mut entry = lesson("x");
        assert!((entry.age_days(now) - 10.0).abs() < 1e-9);
        entry.timestamp = "yesterday-ish".to_string();
        assert_eq!(entry.age_days(now), 0.0);
        entry.timestamp = "2027-01-01T00:00:00Z".to_string();
        assert_eq!(entry.age_days(now), 0.0);
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("Canonical".parse::<Confidence>().unwrap(), Confidence::Canonical);
        assert_eq!("critical".parse::<Urgency>().unwrap(), Urgency::Critical);
        assert_eq!("question".parse::<Kind>().unwrap(), Kind::Question);
        assert!("loud".parse::<Urgency>().is_err());
    }
}
