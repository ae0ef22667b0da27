//! Plain-text rendering for the CLI.

use mycelium_core::{
    Confidence, MemoryEntry, PruneReport, ResonanceOrder, ResonanceRow, Stats, Tasted, Urgency,
};
use std::collections::BTreeMap;
use std::fmt::Write;

const PREVIEW_CHARS: usize = 90;
const PRUNE_LISTED: usize = 5;

/// Date part of a stored timestamp.
fn day(ts: &str) -> &str {
    ts.get(..10).unwrap_or(ts)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}

fn badge(entry: &MemoryEntry) -> &'static str {
    if entry.urgency == Urgency::Critical {
        "⚠️ "
    } else if entry.confidence == Confidence::Canonical {
        "✅ "
    } else if entry.confidence == Confidence::Proven {
        "🔬 "
    } else {
        ""
    }
}

/// Context block injected at agent startup. Empty when there is nothing
/// to show.
pub fn format_for_context(memories: &[Tasted], ghosts: &[Tasted]) -> String {
    if memories.is_empty() && ghosts.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Mycelium — Inherited Fleet Knowledge\n\n");
    for tasted in memories.iter().filter(|t| !t.entry.is_ghost()) {
        let e = &tasted.entry;
        let stale = if tasted.stale { " [stale]" } else { "" };
        let _ = writeln!(
            out,
            "{}[{}] {} ({}){stale}: {}",
            badge(e),
            day(&e.timestamp),
            e.agent.to_uppercase(),
            e.domain.join(", "),
            e.content
        );
    }

    if !ghosts.is_empty() {
        out.push_str("\n### Ghost Traces — How the Fleet Has Thought\n\n");
        out.push_str("*(Past deliberations in similar domains. Use as priors, not rules.)*\n\n");
        for tasted in ghosts {
            let e = &tasted.entry;
            let Some(trace) = e.ghost() else { continue };
            let _ = writeln!(
                out,
                "👻 [{}] {} ({}) deliberation:",
                day(&e.timestamp),
                e.agent.to_uppercase(),
                e.domain.join(", ")
            );
            for branch in trace.ranked_branches() {
                let chosen = if branch.label == trace.collapsed_to { " ◀ CHOSEN" } else { "" };
                let _ = writeln!(out, "   {:.0}% → {}{chosen}", branch.weight * 100.0, branch.label);
                if !branch.reasoning.is_empty() {
                    let _ = writeln!(out, "       reason: {}", branch.reasoning);
                }
            }
            if !trace.collapse_reason.is_empty() {
                let _ = writeln!(out, "   collapse reason: {}", trace.collapse_reason);
            }
            out.push('\n');
        }
    }

    out.push_str("\n---\n");
    out
}

pub fn format_resonance(rows: &[ResonanceRow], order: ResonanceOrder, top: usize) -> String {
    let label = match order {
        ResonanceOrder::MostResonant => "MOST",
        ResonanceOrder::LeastResonant => "LEAST",
    };
    let mut out = format!("── {label} RESONANT MEMORIES (top {top}) ──\n\n");
    if rows.is_empty() {
        out.push_str("Mycelium is empty.\n");
        return out;
    }
    for row in rows {
        let e = &row.entry;
        let last = row.last_tasted.as_deref().map_or("never", day);
        let stale = if row.stale { " [stale]" } else { "" };
        let _ = writeln!(
            out,
            "  score={:.2} | tasted={}x | last={last}{stale}",
            row.score, row.taste_count
        );
        let _ = writeln!(out, "  [{}] {} ({})", day(&e.timestamp), e.agent, e.domain.join(", "));
        let _ = writeln!(out, "  {}\n", truncate(&e.content, PREVIEW_CHARS));
    }
    out
}

pub fn format_prune(report: &PruneReport) -> String {
    let mode = if report.applied { "(LIVE)" } else { "(DRY RUN)" };
    let mut out = format!("── PRUNE PREVIEW {mode} ──\n\n");
    let _ = writeln!(out, "  Would keep:  {} memories", report.kept);
    let _ = writeln!(out, "  Would prune: {} memories\n", report.removed.len());

    for pruned in report.removed.iter().take(PRUNE_LISTED) {
        let e = &pruned.entry;
        let _ = writeln!(
            out,
            "  🗑  [{}] {} | score={:.2} | {}",
            day(&e.timestamp),
            e.agent,
            pruned.score,
            truncate(&e.content, 60)
        );
    }
    if report.removed.len() > PRUNE_LISTED {
        let _ = writeln!(out, "  ... and {} more", report.removed.len() - PRUNE_LISTED);
    }

    if report.applied && !report.removed.is_empty() {
        let _ = writeln!(
            out,
            "\n✅ Pruned {} memories. Substrate now has {} entries.",
            report.removed.len(),
            report.kept
        );
    } else if !report.applied {
        out.push_str("\n  Run with --execute to apply. Canonical and critical memories are never pruned.\n");
    }
    out
}

/// Counts, largest first, ties by name.
fn by_count(counts: &BTreeMap<String, usize>) -> String {
    let mut pairs: Vec<(&String, &usize)> = counts.iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    pairs
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_stats(stats: &Stats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total memories:     {}", stats.total_entries);
    let _ = writeln!(out, "Ghost traces:       {}", stats.ghosts);
    let _ = writeln!(out, "Total taste events: {}", stats.total_tastes);
    let _ = writeln!(out, "Resonance entries:  {}", stats.ledger_entries);
    let _ = writeln!(out, "Partitions:         {}", stats.partitions);
    let _ = writeln!(out, "By agent:  {}", by_count(&stats.by_agent));
    let _ = writeln!(out, "By domain: {}", by_count(&stats.by_domain));
    out
}

/// One-line listing used by `dump`.
pub fn format_dump_line(entry: &MemoryEntry) -> String {
    format!(
        "[{}] {:8} {:<30} {}",
        day(&entry.timestamp),
        entry.agent,
        format!("{:?}", entry.domain),
        truncate(&entry.content, 60)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mycelium_core::{Branch, EntryBody, GhostTrace, PrunedEntry};
    use std::path::PathBuf;

    fn entry(content: &str, urgency: Urgency, confidence: Confidence) -> MemoryEntry {
        MemoryEntry {
            timestamp: "2026-02-03T04:05:06Z".to_string(),
            agent: "forge".to_string(),
            domain: vec!["code".to_string(), "git".to_string()],
            urgency,
            confidence,
            content: content.to_string(),
            reference: None,
            supersedes: None,
            body: EntryBody::Lesson,
        }
    }

    fn tasted(entry: MemoryEntry, stale: bool) -> Tasted {
        Tasted { entry, stale }
    }

    #[test]
    fn empty_context_is_empty() {
        assert_eq!(format_for_context(&[], &[]), "");
    }

    #[test]
    fn context_lines_carry_badges_and_stale_marker() {
        let block = format_for_context(
            &[
                tasted(entry("Never force-push.", Urgency::Routine, Confidence::Canonical), false),
                tasted(entry("Prod is down on Fridays", Urgency::Critical, Confidence::Canonical), false),
                tasted(entry("Old advice", Urgency::Routine, Confidence::Observation), true),
            ],
            &[],
        );
        assert!(block.starts_with("## Mycelium"));
        assert!(block.contains("✅ [2026-02-03] FORGE (code, git): Never force-push."));
        assert!(block.contains("⚠️ [2026-02-03] FORGE"));
        assert!(block.contains("FORGE (code, git) [stale]: Old advice"));
        assert!(!block.contains("Ghost Traces"));
    }

    #[test]
    fn ghost_section_marks_chosen_branch() {
        let trace = GhostTrace::normalized(
            vec![
                Branch::new("go live", 0.1, "EV math looks solid"),
                Branch::new("shadow first", 0.75, "hard rule"),
                Branch::new("abort", 0.15, ""),
            ],
            "shadow first",
            "shadow before live",
        );
        let mut ghost = entry(&trace.summary(), Urgency::Routine, Confidence::Observation);
        ghost.body = EntryBody::Ghost(trace);

        let block = format_for_context(&[], &[tasted(ghost, false)]);
        let shadow = block.find("75% → shadow first ◀ CHOSEN").unwrap();
        let abort = block.find("15% → abort").unwrap();
        assert!(shadow < abort);
        assert!(block.contains("collapse reason: shadow before live"));
        assert!(block.contains("reason: EV math looks solid"));
    }

    #[test]
    fn prune_preview_lists_and_hints() {
        let report = PruneReport {
            kept: 4,
            removed: (0..7)
                .map(|i| PrunedEntry {
                    entry: entry(&format!("noise {i}"), Urgency::Routine, Confidence::Speculation),
                    score: -1.0,
                    partition: PathBuf::from("code.jsonl"),
                })
                .collect(),
            applied: false,
        };
        let text = format_prune(&report);
        assert!(text.contains("(DRY RUN)"));
        assert!(text.contains("Would prune: 7 memories"));
        assert!(text.contains("... and 2 more"));
        assert!(text.contains("--execute"));
    }

    #[test]
    fn stats_sort_by_count() {
        let mut stats = Stats::default();
        stats.by_agent.insert("alpha".into(), 1);
        stats.by_agent.insert("forge".into(), 3);
        let text = format_stats(&stats);
        assert!(text.contains("By agent:  forge: 3, alpha: 1"));
    }

    #[test]
    fn long_content_is_truncated() {
        let long = "x".repeat(100);
        assert_eq!(truncate(&long, 90).chars().count(), 93);
        assert_eq!(truncate("short", 90), "short");
    }
}
