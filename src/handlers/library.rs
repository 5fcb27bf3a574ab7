//! Library command handlers
//!
//! Import, conflict handling, search, listing, export and editing.

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::AppContext;
use crate::codec;
use crate::conflict::{Conflict, Resolution, Side};
use crate::detector::MergeStats;
use crate::interactive_conflict;
use crate::report;
use crate::session::{EntryEdit, ImportReport};

pub(crate) fn print_stats(source: &str, stats: &MergeStats) {
    println!(
        "  {} {}: {} added, {} merged, {} unchanged, {} conflicts",
        "✓".green(),
        source.cyan(),
        stats.added.to_string().green(),
        stats.auto_merged.to_string().green(),
        stats.unchanged,
        stats.conflicts.to_string().yellow()
    );
    if stats.skipped > 0 {
        println!("    {} {} entries skipped", "!".yellow(), stats.skipped);
    }
}

pub(crate) fn print_conflict_line(conflict: &Conflict) {
    println!(
        "  {} {} vs {} {}",
        format!("#{}", conflict.id).cyan().bold(),
        conflict.existing().citation_key.yellow(),
        conflict.incoming().citation_key.yellow(),
        format!("[{}]", conflict.pair.conflicting_fields.join(", ")).dimmed()
    );
}

/// Offer interactive resolution for whatever is pending, when on a terminal
pub(crate) fn resolve_if_interactive(ctx: &mut AppContext, interactive: bool) -> Result<()> {
    if ctx.session.pending().is_empty() {
        return Ok(());
    }

    if interactive && interactive_conflict::is_interactive() {
        // Imported state must survive whatever happens at the prompts
        ctx.persist("conflicts recorded before interactive resolution")?;
        let summary = interactive_conflict::resolve_pending_interactive(&mut ctx.session)?;
        println!(
            "\n{} {} resolved, {} left pending",
            "Conflicts:".bold(),
            summary.resolved.to_string().green(),
            summary.skipped.to_string().yellow()
        );
    } else {
        println!(
            "\n{} {} conflict(s) pending. Run 'paperref conflicts' to review and 'paperref resolve' to decide.",
            "!".yellow().bold(),
            ctx.session.pending().len()
        );
    }
    Ok(())
}

pub(crate) fn print_import_report(report: &ImportReport) {
    print_stats(&report.source, &report.stats);
    for conflict in &report.conflicts {
        print_conflict_line(conflict);
    }
}

/// Handle `import <files...>`
pub fn handle_import(ctx: &mut AppContext, paths: &[PathBuf], interactive: bool) -> Result<()> {
    println!("{}", "Importing BibTeX files...".cyan().bold());

    let batch = ctx
        .session
        .import_files(paths)
        .context("Import rejected")?;

    for report in &batch.reports {
        print_import_report(report);
    }
    for (path, error) in &batch.failures {
        println!("  {} {}: {}", "✗".red(), path.display(), error);
    }

    resolve_if_interactive(ctx, interactive)?;

    println!(
        "\n{} Library now holds {} entries",
        "✓".green().bold(),
        ctx.session.store().len()
    );

    ctx.persist(&format!(
        "import: {} file(s), {} failed, {} conflict(s)",
        paths.len(),
        batch.failures.len(),
        batch.total_conflicts()
    ))?;

    if !paths.is_empty() && batch.failures.len() == paths.len() {
        bail!("None of the {} file(s) could be imported", paths.len());
    }
    Ok(())
}

/// Handle `conflicts`
pub fn handle_conflicts(ctx: &AppContext, verbose: bool) -> Result<()> {
    let pending = ctx.session.pending();
    if pending.is_empty() {
        println!("{}", "No pending conflicts.".green());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} pending conflict(s):", pending.len()).yellow().bold()
    );
    for conflict in pending {
        print_conflict_line(conflict);
        if verbose {
            println!("      A: {}", conflict.existing().summary());
            println!("      B: {}", conflict.incoming().summary());
            println!("      {}", format!("from {}", conflict.source).dimmed());
        }
    }
    Ok(())
}

/// Parse `field=a` / `field=b` choices
fn parse_field_choices(fields: &[String]) -> Result<BTreeMap<String, Side>> {
    fields
        .iter()
        .map(|item| {
            let (field, side) = item
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected FIELD=SIDE, got '{}'", item))?;
            let side: Side = side.parse()?;
            Ok((field.trim().to_lowercase(), side))
        })
        .collect()
}

/// Handle `resolve [ID] [--choice ...] [--field f=a ...]`
pub fn handle_resolve(
    ctx: &mut AppContext,
    pair_id: Option<u64>,
    choice: Option<String>,
    fields: &[String],
) -> Result<()> {
    let Some(pair_id) = pair_id else {
        if !interactive_conflict::is_interactive() {
            bail!("Interactive resolution needs a terminal; pass a conflict id and --choice instead");
        }
        let summary = interactive_conflict::resolve_pending_interactive(&mut ctx.session)?;
        ctx.persist(&format!(
            "resolve: {} resolved interactively, {} skipped",
            summary.resolved, summary.skipped
        ))?;
        return Ok(());
    };

    let resolution = if !fields.is_empty() {
        Resolution::PerField(parse_field_choices(fields)?)
    } else if let Some(choice) = choice {
        choice.parse::<Resolution>()?
    } else {
        let conflict = ctx
            .session
            .conflict(pair_id)
            .cloned()
            .ok_or_else(|| anyhow!("No pending conflict with id {}", pair_id))?;
        match interactive_conflict::prompt_resolution(&conflict) {
            Ok(Some(resolution)) => resolution,
            Ok(None) => {
                println!("{}", "Left pending.".yellow());
                return Ok(());
            }
            Err(e) if interactive_conflict::is_cancellation(&e) => {
                println!("{}", "Cancelled; left pending.".yellow());
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    };

    let outcome = ctx
        .session
        .resolve_conflict(pair_id, &resolution)
        .with_context(|| format!("Failed to resolve conflict #{pair_id}"))?;

    println!(
        "{} Conflict #{} resolved ({}): {}",
        "✓".green(),
        pair_id,
        resolution,
        outcome.committed_keys.join(", ").cyan()
    );
    let remaining = ctx.session.pending().len();
    if remaining > 0 {
        println!("  {} conflict(s) still pending", remaining.to_string().yellow());
    }

    ctx.persist(&format!("resolve: #{pair_id} {resolution}"))
}

/// Handle `discard [ID]`
pub fn handle_discard(ctx: &mut AppContext, pair_id: Option<u64>) -> Result<()> {
    match pair_id {
        Some(id) => {
            ctx.session.discard_conflict(id)?;
            println!("{} Discarded conflict #{}", "✓".green(), id);
            ctx.persist(&format!("discard: #{id}"))
        }
        None => {
            let count = ctx.session.discard_conflicts();
            println!("{} Discarded {} pending conflict(s)", "✓".green(), count);
            ctx.persist(&format!("discard: {count} conflict(s)"))
        }
    }
}

/// Handle `search <query>`
pub fn handle_search(ctx: &AppContext, query: &str) -> Result<()> {
    let hits = ctx.session.search(query);
    if hits.is_empty() {
        println!("{}", format!("No entries match '{query}'").yellow());
        return Ok(());
    }

    println!("{}", format!("{} match(es):", hits.len()).bold());
    for entry in hits {
        println!("  {}", entry.summary());
    }
    Ok(())
}

/// Handle `list`
pub fn handle_list(ctx: &AppContext) -> Result<()> {
    let store = ctx.session.store();
    if store.is_empty() {
        println!("{}", "Library is empty.".yellow());
        return Ok(());
    }

    println!("{}", format!("{} entries:", store.len()).bold());
    for entry in store.iter() {
        println!("  {}", entry.summary());
    }
    Ok(())
}

/// Handle `export <keys...> --output file.bib`
pub fn handle_export(ctx: &AppContext, keys: &[String], output: &Path) -> Result<()> {
    let entries = ctx.session.export(keys)?;
    codec::write_file(output, &entries)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Exported {} entries to {}",
        "✓".green(),
        entries.len(),
        output.display().to_string().cyan()
    );
    Ok(())
}

/// Handle `edit <key> [--title] [--author] [--key]`
pub fn handle_edit(ctx: &mut AppContext, key: &str, edit: EntryEdit) -> Result<()> {
    if edit.is_empty() {
        bail!("Nothing to change: pass --title, --author or --new-key");
    }

    let new_key = ctx
        .session
        .edit_entry(key, &edit)
        .with_context(|| format!("Failed to edit '{key}'"))?;

    if let Some(entry) = ctx.session.store().get(&new_key) {
        println!("{} {}", "✓".green(), entry.summary());
    }
    ctx.persist(&format!("edit: {key} -> {new_key}"))
}

/// Handle `status`
pub fn handle_status(ctx: &AppContext) -> Result<()> {
    let session = &ctx.session;

    println!("{}", "=== Library Status ===".bold().cyan());
    println!("{}: {}", "Workspace".bold(), ctx.workspace.root().display());
    println!("{}: {}", "Entries".bold(), session.store().len());
    println!("{}: {}", "Phase".bold(), session.phase());

    let pending = session.pending().len();
    let pending_text = if pending == 0 {
        "none".green()
    } else {
        pending.to_string().yellow()
    };
    println!("{}: {}", "Pending conflicts".bold(), pending_text);

    match session.snapshot() {
        Some(snapshot) => println!(
            "{}: {} ({:?}, {})",
            "Last sync".bold(),
            snapshot.filename,
            snapshot.origin,
            snapshot.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("{}: {}", "Last sync".bold(), "never".dimmed()),
    }

    match &ctx.settings.webdav {
        Some(webdav) => println!("{}: {}/{}", "Remote".bold(), webdav.url.trim_end_matches('/'), webdav.filename),
        None => println!("{}: {}", "Remote".bold(), "not configured".dimmed()),
    }
    Ok(())
}

/// Handle `report`
pub fn handle_report(ctx: &AppContext, format: &str, output: Option<&Path>) -> Result<()> {
    report::generate_report(&ctx.session, format, output)
}
