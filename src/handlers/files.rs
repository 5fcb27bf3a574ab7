//! Local file handlers: saving, cached libraries and share copies.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use super::library::{print_import_report, resolve_if_interactive};
use super::AppContext;

pub const DEFAULT_LIBRARY_NAME: &str = "my_library";

/// Handle `save [NAME] [--output FILE]`
///
/// Without `--output` the library is cached under `libraries/NAME.bib`.
pub fn handle_save(ctx: &AppContext, name: Option<&str>, output: Option<&Path>) -> Result<()> {
    let path = match output {
        Some(path) => {
            ctx.session.save(path)?;
            path.to_path_buf()
        }
        None => ctx
            .workspace
            .save_library(name.unwrap_or(DEFAULT_LIBRARY_NAME), ctx.session.store().entries())?,
    };

    if !ctx.session.pending().is_empty() {
        println!(
            "{} {} conflict(s) are still pending; their incoming entries are not included",
            "!".yellow().bold(),
            ctx.session.pending().len()
        );
    }
    println!(
        "{} Saved {} entries to {}",
        "✓".green(),
        ctx.session.store().len(),
        path.display().to_string().cyan()
    );
    Ok(())
}

/// Handle `load NAME [--merge]`
///
/// Replaces the library with a cached one, or merges it in with `--merge`.
pub fn handle_load(ctx: &mut AppContext, name: &str, merge: bool, interactive: bool) -> Result<()> {
    let entries = ctx.workspace.load_library(name)?;
    let count = entries.len();

    if merge {
        let report = ctx
            .session
            .import_entries(entries, name)
            .context("Merge rejected")?;
        print_import_report(&report);
        resolve_if_interactive(ctx, interactive)?;
    } else {
        ctx.session
            .load(entries)
            .context("Cannot replace the library")?;
        println!("{} Loaded {} entries from '{}'", "✓".green(), count, name.cyan());
    }

    ctx.persist(&format!("load: {name} ({count} entries, merge={merge})"))
}

/// Handle `libraries`
pub fn handle_libraries(ctx: &AppContext) -> Result<()> {
    let libraries = ctx.workspace.list_libraries()?;
    if libraries.is_empty() {
        println!("{}", "No saved libraries.".yellow());
        return Ok(());
    }

    println!("{}", "Saved libraries:".bold());
    for library in libraries {
        let modified = library
            .modified
            .map(|t| {
                chrono::DateTime::<chrono::Local>::from(t)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_else(|| "unknown".to_string());
        println!("  {} {}", library.name.cyan(), modified.dimmed());
    }
    Ok(())
}

/// Handle `share [BASE]`
pub fn handle_share(ctx: &AppContext, base_name: Option<&str>) -> Result<()> {
    let path = ctx
        .workspace
        .share(&ctx.session, base_name.unwrap_or(DEFAULT_LIBRARY_NAME))?;

    println!(
        "{} Share copy written to {}",
        "✓".green(),
        path.display().to_string().cyan()
    );
    Ok(())
}
