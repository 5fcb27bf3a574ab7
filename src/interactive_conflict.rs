use anyhow::{Context, Result};
use colored::Colorize;
use inquire::{InquireError, Select};
use std::collections::BTreeMap;

use crate::conflict::{Conflict, Resolution, Side};
use crate::detector::ENTRY_TYPE_FIELD;
use crate::entry::Entry;
use crate::session::LibrarySession;

/// Choice offered for a pending pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    KeepA,
    KeepB,
    KeepBoth,
    PerField,
    ViewDetails,
    /// Leave the pair pending
    Skip,
}

impl std::fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionAction::KeepA => write!(f, "Keep A (library values win)"),
            ResolutionAction::KeepB => write!(f, "Keep B (incoming values win)"),
            ResolutionAction::KeepBoth => write!(f, "Keep Both (store B under its own key)"),
            ResolutionAction::PerField => write!(f, "Choose Field by Field"),
            ResolutionAction::ViewDetails => write!(f, "View Both Entries"),
            ResolutionAction::Skip => write!(f, "Skip (decide later)"),
        }
    }
}

/// Tally of an interactive run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InteractiveSummary {
    pub resolved: usize,
    pub skipped: usize,
}

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

fn value_of(entry: &Entry, field: &str) -> String {
    if field == ENTRY_TYPE_FIELD {
        entry.entry_type.clone()
    } else {
        entry.get(field).unwrap_or_default().to_string()
    }
}

fn print_entry(label: &str, entry: &Entry) {
    println!("\n{} {}", label.bold(), entry.citation_key.cyan());
    println!("  {:<12} {}", "type", entry.entry_type);
    for (name, value) in entry.fields() {
        println!("  {name:<12} {value}");
    }
}

fn display_conflict_details(conflict: &Conflict) {
    println!("\n{}", "=".repeat(72).cyan());
    println!("{}", format!("Conflict #{}", conflict.id).bold().cyan());
    println!("{}", "=".repeat(72).cyan());

    print_entry("A (library):", conflict.existing());
    print_entry("B (incoming):", conflict.incoming());

    if let Some(score) = conflict.pair.similarity.title {
        println!("\n{} title similarity {:.2}", "→".cyan(), score);
    }
    println!("{}", "=".repeat(72).cyan());
}

/// Ask for a side on every conflicting field
fn choose_per_field(conflict: &Conflict) -> Result<Resolution> {
    let mut choices = BTreeMap::new();

    for field in &conflict.pair.conflicting_fields {
        let a = value_of(conflict.existing(), field);
        let b = value_of(conflict.incoming(), field);
        let options = vec![format!("A: {a}"), format!("B: {b}")];

        let picked = Select::new(&format!("Value for '{field}'"), options)
            .prompt()
            .context("Failed to read field choice")?;

        let side = if picked.starts_with("B:") { Side::B } else { Side::A };
        choices.insert(field.clone(), side);
    }

    Ok(Resolution::PerField(choices))
}

/// Prompt for one pair; `None` means the user skipped it
pub fn prompt_resolution(conflict: &Conflict) -> Result<Option<Resolution>> {
    loop {
        println!("\n{}", "Conflict Detected!".yellow().bold());
        println!("  {}", conflict.description().dimmed());
        for field in &conflict.pair.conflicting_fields {
            println!(
                "  {} {}: {} {} {}",
                "•".yellow(),
                field.bold(),
                value_of(conflict.existing(), field).green(),
                "vs".dimmed(),
                value_of(conflict.incoming(), field).yellow()
            );
        }

        let options = vec![
            ResolutionAction::KeepA,
            ResolutionAction::KeepB,
            ResolutionAction::KeepBoth,
            ResolutionAction::PerField,
            ResolutionAction::ViewDetails,
            ResolutionAction::Skip,
        ];

        let action = Select::new("How would you like to resolve this conflict?", options)
            .with_help_message("Use arrow keys to navigate, Enter to select")
            .prompt()
            .context("Failed to get resolution action")?;

        return Ok(Some(match action {
            ResolutionAction::ViewDetails => {
                display_conflict_details(conflict);
                continue;
            }
            ResolutionAction::Skip => return Ok(None),
            ResolutionAction::KeepA => Resolution::KeepA,
            ResolutionAction::KeepB => Resolution::KeepB,
            ResolutionAction::KeepBoth => Resolution::KeepBoth,
            ResolutionAction::PerField => choose_per_field(conflict)?,
        }));
    }
}

/// Whether `err` comes from the user pressing Esc or Ctrl-C at a prompt
pub fn is_cancellation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<InquireError>(),
        Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
    )
}

/// Walk through every pending pair and apply the chosen resolutions
pub fn resolve_pending_interactive(session: &mut LibrarySession) -> Result<InteractiveSummary> {
    resolve_pending_with(session, prompt_resolution)
}

/// Resolve pending pairs with decisions from `prompt`
///
/// Cancelling a prompt stops the walk; the pairs not yet decided stay
/// pending and everything applied so far is kept.
pub fn resolve_pending_with<F>(session: &mut LibrarySession, mut prompt: F) -> Result<InteractiveSummary>
where
    F: FnMut(&Conflict) -> Result<Option<Resolution>>,
{
    let ids: Vec<u64> = session.pending().iter().map(|c| c.id).collect();
    let mut summary = InteractiveSummary::default();

    if ids.is_empty() {
        return Ok(summary);
    }

    println!(
        "\n{}",
        format!("{} conflict(s) to resolve", ids.len()).yellow().bold()
    );

    for (i, id) in ids.iter().enumerate() {
        let Some(conflict) = session.conflict(*id).cloned() else {
            continue;
        };

        println!("\n{}", format!("[{}/{}]", i + 1, ids.len()).cyan());
        let choice = match prompt(&conflict) {
            Ok(choice) => choice,
            Err(e) if is_cancellation(&e) => {
                let left = ids.len() - i;
                println!("\n{} Cancelled; {} conflict(s) left pending", "→".yellow(), left);
                summary.skipped += left;
                break;
            }
            Err(e) => return Err(e),
        };

        match choice {
            Some(resolution) => {
                let outcome = session.resolve_conflict(*id, &resolution)?;
                println!(
                    "  {} {} → {}",
                    "✓".green(),
                    resolution,
                    outcome.committed_keys.join(", ")
                );
                summary.resolved += 1;
            }
            None => {
                println!("  {} left pending", "→".yellow());
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
