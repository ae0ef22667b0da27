//! CLI subcommands over the substrate.
//!
//! Provides `mycelium taste`, `exude`, `superpose`, `digest`, `distill`,
//! `resonance`, `prune`, `stats` and `dump`.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use mycelium_core::{
    Branch, Confidence, Exude, Kind, MemoryEntry, Mycelium, MyceliumConfig, ResonanceOrder,
    Superpose, Urgency,
};
use std::path::PathBuf;

use crate::digest::{digest_markdown, distill_text, Learning, DIGEST_DOMAIN};
use crate::format;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read relevant memories (records resonance)
    Taste {
        #[arg(long)]
        agent: String,
        /// Domains to read from; all when omitted
        #[arg(long, num_args = 0..)]
        domain: Vec<String>,
        /// Maximum memories returned (default from config)
        #[arg(long)]
        limit: Option<usize>,
        /// One JSON entry per line instead of the context block
        #[arg(long)]
        raw: bool,
        /// Read without recording resonance
        #[arg(long)]
        no_record: bool,
        /// Also surface ghost traces
        #[arg(long)]
        ghosts: bool,
        /// Ghost context keywords; the domains are used when omitted
        #[arg(long, num_args = 0..)]
        keyword: Vec<String>,
    },
    /// Write a memory
    Exude {
        #[arg(long)]
        agent: String,
        #[arg(long, num_args = 0..)]
        domain: Vec<String>,
        #[arg(long)]
        content: String,
        /// lesson or question
        #[arg(long, default_value = "lesson")]
        kind: Kind,
        /// routine, notable, critical
        #[arg(long, default_value = "routine")]
        urgency: Urgency,
        /// speculation, observation, hypothesis, proven, canonical
        #[arg(long, default_value = "observation")]
        confidence: Confidence,
        /// Fingerprint of the entry this one threads from
        #[arg(long = "ref")]
        reference: Option<String>,
        /// Timestamp of the entry this one replaces
        #[arg(long)]
        supersedes: Option<String>,
    },
    /// Write a ghost trace of a deliberation
    Superpose {
        #[arg(long)]
        agent: String,
        #[arg(long, num_args = 0..)]
        domain: Vec<String>,
        /// Branch as 'label:weight:reasoning' (repeat for each branch)
        #[arg(long = "branch", value_name = "LABEL:WEIGHT:REASONING")]
        branches: Vec<String>,
        #[arg(long)]
        collapsed_to: String,
        #[arg(long, default_value = "")]
        collapse_reason: String,
        #[arg(long, default_value = "routine")]
        urgency: Urgency,
    },
    /// Exude learnings from a markdown context drop
    Digest {
        #[arg(long)]
        agent: String,
        /// Markdown file to read
        #[arg(long)]
        file: PathBuf,
        #[arg(long, num_args = 0.., default_values_t = vec![DIGEST_DOMAIN.to_string()])]
        domain: Vec<String>,
    },
    /// Exude signal-bearing sentences from free text
    Distill {
        #[arg(long)]
        agent: String,
        #[arg(long, num_args = 0..)]
        domain: Vec<String>,
        #[arg(long)]
        content: String,
    },
    /// Show the most (or least) resonant memories
    Resonance {
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Least resonant first
        #[arg(long)]
        bottom: bool,
    },
    /// Remove low-scoring old memories (dry run unless --execute)
    Prune {
        /// Score threshold (default from config)
        #[arg(long, alias = "min-resonance")]
        min_score: Option<f64>,
        /// Age cutoff in days (default from config)
        #[arg(long)]
        older_than: Option<u32>,
        #[arg(long)]
        execute: bool,
    },
    /// Print substrate totals
    Stats,
    /// Print every stored memory
    Dump,
}

/// Parse `label:weight:reasoning`. A missing weight is 1.0; reasoning may
/// itself contain colons.
pub fn parse_branch(arg: &str) -> Result<Branch> {
    let mut parts = arg.splitn(3, ':');
    let label = parts.next().unwrap_or_default().trim();
    if label.is_empty() {
        bail!("branch '{arg}' has no label");
    }
    let weight = match parts.next().map(str::trim) {
        None | Some("") => 1.0,
        Some(raw) => raw
            .parse::<f64>()
            .with_context(|| format!("branch '{label}' has a bad weight '{raw}'"))?,
    };
    let reasoning = parts.next().unwrap_or_default().trim();
    Ok(Branch::new(label, weight, reasoning))
}

fn exude_learnings(
    myc: &mut Mycelium,
    agent: &str,
    domains: &[String],
    learnings: Vec<Learning>,
    label: &str,
) -> Result<usize> {
    let mut stored = 0;
    for learning in learnings {
        let preview: String = learning.content.chars().take(60).collect();
        let written = myc.exude(Exude {
            urgency: learning.urgency,
            confidence: learning.confidence,
            ..Exude::new(agent, domains.to_vec(), learning.content)
        })?;
        match written {
            Some(_) => {
                stored += 1;
                println!("  📝 {label}: {preview}");
            }
            None => println!("  ↺ already known: {preview}"),
        }
    }
    Ok(stored)
}

fn print_raw(entries: &[MemoryEntry]) -> Result<()> {
    for entry in entries {
        println!("{}", serde_json::to_string(entry)?);
    }
    Ok(())
}

pub fn handle_command(cmd: Commands, config: MyceliumConfig) -> Result<()> {
    let data_dir = config.data_path();
    let mut myc = Mycelium::open(config)
        .with_context(|| format!("Failed to open mycelium at {}", data_dir.display()))?;

    match cmd {
        Commands::Taste {
            agent,
            domain,
            limit,
            raw,
            no_record,
            ghosts,
            keyword,
        } => {
            let limit = limit.unwrap_or(myc.config().taste_limit);
            let memories = myc.taste(&agent, &domain, limit, !no_record)?;
            let ghost_traces = if ghosts {
                let keywords: &[String] = if keyword.is_empty() { &domain } else { &keyword };
                myc.taste_ghosts(&agent, &domain, Some(keywords), myc.config().ghost_limit)?
            } else {
                Vec::new()
            };

            if raw {
                let entries: Vec<MemoryEntry> = memories
                    .iter()
                    .chain(&ghost_traces)
                    .map(|t| t.entry.clone())
                    .collect();
                print_raw(&entries)?;
            } else {
                println!("{}", format::format_for_context(&memories, &ghost_traces));
                let ghost_note = if ghost_traces.is_empty() {
                    String::new()
                } else {
                    format!(" + {} ghost traces", ghost_traces.len())
                };
                let scope = if domain.is_empty() { "all".to_string() } else { domain.join(", ") };
                println!(
                    "[{} memories{ghost_note} surfaced for {agent} in domains: {scope}]",
                    memories.len()
                );
            }
        }

        Commands::Exude {
            agent,
            domain,
            content,
            kind,
            urgency,
            confidence,
            reference,
            supersedes,
        } => {
            let written = myc.exude(Exude {
                agent,
                domains: domain,
                content,
                kind,
                urgency,
                confidence,
                reference,
                supersedes,
            })?;
            match written {
                Some(entry) => {
                    println!(
                        "✅ Exuded to mycelium: [{}] {} → {}",
                        entry.timestamp,
                        entry.agent,
                        entry.domain.join(", ")
                    );
                    println!("   fingerprint: {}", entry.fingerprint());
                }
                None => println!("↺ Already in the recent window, nothing written."),
            }
        }

        Commands::Superpose {
            agent,
            domain,
            branches,
            collapsed_to,
            collapse_reason,
            urgency,
        } => {
            if branches.is_empty() {
                bail!("no branches provided; use --branch 'label:weight:reasoning'");
            }
            let branches = branches
                .iter()
                .map(|b| parse_branch(b))
                .collect::<Result<Vec<_>>>()?;
            let written = myc.superpose(Superpose {
                agent,
                domains: domain,
                branches,
                collapsed_to,
                collapse_reason,
                urgency,
            })?;
            match written {
                Some(entry) => {
                    println!(
                        "👻 Ghost trace written: [{}] {} → {}",
                        entry.timestamp,
                        entry.agent,
                        entry.domain.join(", ")
                    );
                    if let Some(trace) = entry.ghost() {
                        println!("   {}", trace.summary());
                        for branch in trace.ranked_branches() {
                            let chosen = if branch.label == trace.collapsed_to { " ◀" } else { "" };
                            println!("   {:.0}% {}{chosen}", branch.weight * 100.0, branch.label);
                        }
                    }
                }
                None => println!("↺ Same deliberation already recorded, nothing written."),
            }
        }

        Commands::Digest { agent, file, domain } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let stored = exude_learnings(&mut myc, &agent, &domain, digest_markdown(&text), "Digested")?;
            println!("\n✅ digest complete: {stored} learnings exuded from {}", file.display());
        }

        Commands::Distill { agent, domain, content } => {
            let stored = exude_learnings(&mut myc, &agent, &domain, distill_text(&content), "Distilled")?;
            println!("\n✅ distill complete: {stored} learnings exuded");
        }

        Commands::Resonance { top, bottom } => {
            let order = if bottom {
                ResonanceOrder::LeastResonant
            } else {
                ResonanceOrder::MostResonant
            };
            let rows = myc.resonance(order, top)?;
            print!("{}", format::format_resonance(&rows, order, top));
        }

        Commands::Prune {
            min_score,
            older_than,
            execute,
        } => {
            let min_score = min_score.unwrap_or(myc.config().prune_min_score);
            let older_than = older_than.unwrap_or(myc.config().prune_older_than_days);
            let report = myc.prune(min_score, older_than, execute)?;
            print!("{}", format::format_prune(&report));
        }

        Commands::Stats => {
            print!("{}", format::format_stats(&myc.stats()?));
        }

        Commands::Dump => {
            let mut any = false;
            for entry in myc.store().scan(&[], true)? {
                any = true;
                println!("{}", format::format_dump_line(&entry));
            }
            if !any {
                println!("Mycelium is empty.");
            }
        }
    }

    Ok(())
}
