//! WebDAV pull and push handlers.

use anyhow::{Context, Result};
use colored::Colorize;
use inquire::Confirm;

use super::library::{print_conflict_line, print_stats, resolve_if_interactive};
use super::AppContext;
use crate::error::LibraryError;
use crate::interactive_conflict;
use crate::sync::WebDavStore;

fn open_remote(ctx: &AppContext) -> Result<WebDavStore> {
    let config = ctx.settings.require_webdav()?;
    Ok(WebDavStore::new(config)?)
}

/// Handle `pull [--dry-run]`
pub fn handle_pull(ctx: &mut AppContext, dry_run: bool, interactive: bool) -> Result<()> {
    let remote = open_remote(ctx)?;
    println!("{} {}...", "Pulling".cyan().bold(), remote.url());

    let proposal = match ctx.session.pull(&remote) {
        Ok(proposal) => proposal,
        Err(LibraryError::RemoteNotFound(name)) => {
            println!(
                "{} Remote file '{}' does not exist yet; nothing to pull",
                "→".yellow(),
                name
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Pull failed"),
    };

    if dry_run {
        print_stats(remote.url().as_str(), &proposal.proposal.stats);
        for pair in &proposal.proposal.conflicts {
            println!(
                "  {} {} vs {} [{}]",
                "?".yellow(),
                pair.existing.citation_key,
                pair.incoming.citation_key,
                pair.conflicting_fields.join(", ")
            );
        }
        println!("\n{}", "Dry run: nothing was changed.".dimmed());
        return Ok(());
    }

    let report = ctx.session.commit_pull(proposal)?;
    print_stats(&report.source, &report.stats);
    for conflict in &report.conflicts {
        print_conflict_line(conflict);
    }

    resolve_if_interactive(ctx, interactive)?;

    println!(
        "\n{} Library now holds {} entries",
        "✓".green().bold(),
        ctx.session.store().len()
    );
    ctx.persist(&format!(
        "pull: {} entries fetched, {} conflict(s)",
        report.stats.incoming, report.stats.conflicts
    ))
}

/// Handle `push [--yes]`
///
/// Warns when the remote changed since the last sync; the push itself always
/// overwrites the remote file.
pub fn handle_push(ctx: &mut AppContext, assume_yes: bool) -> Result<()> {
    if !ctx.session.pending().is_empty() {
        return Err(LibraryError::ConflictPending(ctx.session.pending().len()))
            .context("Resolve or discard pending conflicts before pushing");
    }
    if ctx.session.store().is_empty() {
        return Err(LibraryError::EmptyLibrary.into());
    }

    let remote = open_remote(ctx)?;

    match ctx.session.remote_changed(&remote) {
        Ok(true) => {
            println!(
                "{} The remote file changed since the last sync and will be overwritten.",
                "!".yellow().bold()
            );
            if !assume_yes && interactive_conflict::is_interactive() {
                let proceed = Confirm::new("Push anyway?")
                    .with_default(false)
                    .with_help_message("Run 'paperref pull' first to merge the remote changes")
                    .prompt()
                    .context("Failed to get confirmation")?;
                if !proceed {
                    println!("{}", "Push cancelled.".yellow());
                    return Ok(());
                }
            }
        }
        Ok(false) => {}
        Err(e) => log::warn!("Could not compare with remote before push: {}", e),
    }

    println!("{} {}...", "Pushing".cyan().bold(), remote.url());
    let snapshot = ctx.session.push(&remote).context("Push failed")?;

    println!(
        "{} Pushed {} entries ({} bytes) to {}",
        "✓".green(),
        ctx.session.store().len(),
        snapshot.content.len(),
        snapshot.filename.cyan()
    );
    ctx.persist(&format!("push: {} entries", ctx.session.store().len()))
}
