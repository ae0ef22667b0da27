//! Turning prose into candidate entries.
//!
//! `digest` reads a markdown context drop: a `last_conversation:` field plus
//! bullets under decision or lesson headings. `distill` splits free text into
//! sentences and keeps the ones carrying a signal word.

use mycelium_core::{Confidence, Urgency};
use regex::Regex;
use std::sync::LazyLock;

/// Domain used by `digest` when none is given.
pub const DIGEST_DOMAIN: &str = "context";

/// Items of this many characters or fewer are dropped by `digest`.
const DIGEST_MIN_CHARS: usize = 20;
/// Sentences shorter than this are dropped by `distill`.
const DISTILL_MIN_CHARS: usize = 20;

static LAST_CONVERSATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)last_conversation:[ \t]*(.+)$").unwrap());
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)##\s*(?:decisions?|lessons?|learnings?|key\s+takeaways?|what\s+we\s+learned)[^\n]*\n")
        .unwrap()
});
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[-*•]\s+(.+)$").unwrap());
static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

const SIGNAL_KEYWORDS: &[&str] = &[
    "fixed", "learned", "discovered", "rule", "never", "always", "critical", "key",
    "important", "broke", "works", "lesson", "pattern", "bug", "warning", "required",
    "must", "confirmed", "insight", "found", "realized", "hard rule", "do not", "don't",
];

/// Something worth exuding, with the weights its source implies.
#[derive(Debug, Clone, PartialEq)]
pub struct Learning {
    pub content: String,
    pub urgency: Urgency,
    pub confidence: Confidence,
}

/// Learnings from a markdown context drop, in document order.
pub fn digest_markdown(text: &str) -> Vec<Learning> {
    let mut out = Vec::new();

    if let Some(caps) = LAST_CONVERSATION_RE.captures(text) {
        let summary = caps[1].trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if summary.chars().count() > DIGEST_MIN_CHARS {
            out.push(Learning {
                content: summary.to_string(),
                urgency: Urgency::Notable,
                confidence: Confidence::Observation,
            });
        }
    }

    for heading in SECTION_RE.find_iter(text) {
        let rest = &text[heading.end()..];
        let section = rest.find("##").map_or(rest, |end| &rest[..end]);
        for caps in BULLET_RE.captures_iter(section) {
            let bullet = caps[1].trim();
            if bullet.chars().count() > DIGEST_MIN_CHARS {
                out.push(Learning {
                    content: bullet.to_string(),
                    urgency: Urgency::Notable,
                    confidence: Confidence::Hypothesis,
                });
            }
        }
    }
    out
}

/// Split on `.`, `!` or `?` followed by whitespace. Punctuation stays with
/// its sentence.
pub fn sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut out = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_END_RE.find_iter(text) {
        out.push(text[start..boundary.start() + 1].trim());
        start = boundary.end();
    }
    if start < text.len() {
        out.push(text[start..].trim());
    }
    out.retain(|s| !s.is_empty());
    out
}

pub fn has_signal(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    SIGNAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Signal-bearing sentences from free text.
pub fn distill_text(text: &str) -> Vec<Learning> {
    sentences(text)
        .into_iter()
        .filter(|s| s.chars().count() >= DISTILL_MIN_CHARS && has_signal(s))
        .map(|s| Learning {
            content: s.to_string(),
            urgency: Urgency::Notable,
            confidence: Confidence::Observation,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DROP: &str = r#"---
agent: forge
last_conversation: "Migrated the CI runners to the new cluster and pinned images"
---

## Status
- this bullet is not under a learning heading at all

## Decisions made
- Keep the old runners alive until Friday as fallback
- short one
* Tag every image with the commit sha going forward

## Lessons
- Never rotate registry credentials mid-deploy, it stalls the queue
"#;

    #[test]
    fn digest_finds_summary_and_bullets() {
        let items = digest_markdown(DROP);
        let contents: Vec<&str> = items.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Migrated the CI runners to the new cluster and pinned images",
                "Keep the old runners alive until Friday as fallback",
                "Tag every image with the commit sha going forward",
                "Never rotate registry credentials mid-deploy, it stalls the queue",
            ]
        );
        assert_eq!(items[0].confidence, Confidence::Observation);
        assert!(items[1..].iter().all(|l| l.confidence == Confidence::Hypothesis));
        assert!(items.iter().all(|l| l.urgency == Urgency::Notable));
    }

    #[test]
    fn digest_skips_short_summary() {
        assert!(digest_markdown("last_conversation: hi there\n").is_empty());
    }

    #[test]
    fn headings_are_case_insensitive() {
        let items = digest_markdown("## KEY TAKEAWAYS\n- Budget an extra day for vendor reviews\n");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn sentence_split_keeps_punctuation() {
        assert_eq!(
            sentences("First one. Second one!  Third?\nFourth"),
            vec!["First one.", "Second one!", "Third?", "Fourth"]
        );
        assert!(sentences("   ").is_empty());
    }

    #[test]
    fn distill_keeps_signal_sentences() {
        let text = "We had lunch. The flaky test was fixed by seeding the RNG. \
                    Always run migrations before deploying the API. Nice.";
        let items = distill_text(text);
        let contents: Vec<&str> = items.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "The flaky test was fixed by seeding the RNG.",
                "Always run migrations before deploying the API.",
            ]
        );
    }

    #[test]
    fn short_signal_sentence_is_dropped() {
        assert!(distill_text("Bug fixed.").is_empty());
    }
}
