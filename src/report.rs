use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::conflict::Conflict;
use crate::session::LibrarySession;

/// Report of the duplicate pairs waiting for a decision
#[derive(Debug, Serialize, Deserialize)]
pub struct ConflictReport {
    /// RFC 3339 time the report was generated
    pub timestamp: String,

    pub total_conflicts: usize,

    pub conflicts: Vec<ConflictDetail>,
}

/// One pending pair
#[derive(Debug, Serialize, Deserialize)]
pub struct ConflictDetail {
    pub pair_id: u64,

    /// File or remote the incoming entry came from
    pub source: String,

    pub existing_key: String,
    pub incoming_key: String,

    /// Title token overlap, absent when a title is missing
    pub title_similarity: Option<f64>,

    pub fields: Vec<FieldDifference>,

    pub detected_at: String,
}

/// Both values of a conflicting field
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldDifference {
    pub field: String,
    pub existing: String,
    pub incoming: String,
}

fn field_value(conflict: &Conflict, field: &str, incoming: bool) -> String {
    let entry = if incoming {
        conflict.incoming()
    } else {
        conflict.existing()
    };
    if field == crate::detector::ENTRY_TYPE_FIELD {
        return entry.entry_type.clone();
    }
    entry.get(field).unwrap_or_default().to_string()
}

impl ConflictReport {
    pub fn from_conflicts(conflicts: &[Conflict]) -> Self {
        let details = conflicts
            .iter()
            .map(|c| ConflictDetail {
                pair_id: c.id,
                source: c.source.clone(),
                existing_key: c.existing().citation_key.clone(),
                incoming_key: c.incoming().citation_key.clone(),
                title_similarity: c.pair.similarity.title,
                fields: c
                    .pair
                    .conflicting_fields
                    .iter()
                    .map(|field| FieldDifference {
                        field: field.clone(),
                        existing: field_value(c, field, false),
                        incoming: field_value(c, field, true),
                    })
                    .collect(),
                detected_at: c.detected_at.to_rfc3339(),
            })
            .collect();

        ConflictReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_conflicts: conflicts.len(),
            conflicts: details,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Library Conflict Report\n\n");
        output.push_str(&format!("**Generated:** {}\n", self.timestamp));
        output.push_str(&format!("**Pending Conflicts:** {}\n\n", self.total_conflicts));

        if self.conflicts.is_empty() {
            output.push_str("No conflicts pending.\n");
            return output;
        }

        for conflict in &self.conflicts {
            output.push_str(&format!(
                "## #{} `{}` vs `{}`\n\n",
                conflict.pair_id, conflict.existing_key, conflict.incoming_key
            ));
            output.push_str(&format!("- **Source:** {}\n", conflict.source));
            if let Some(score) = conflict.title_similarity {
                output.push_str(&format!("- **Title similarity:** {score:.2}\n"));
            }
            output.push_str(&format!("- **Detected:** {}\n\n", conflict.detected_at));

            output.push_str("| Field | A (library) | B (incoming) |\n");
            output.push_str("|---|---|---|\n");
            for diff in &conflict.fields {
                output.push_str(&format!(
                    "| {} | {} | {} |\n",
                    diff.field,
                    diff.existing.replace('|', "\\|"),
                    diff.incoming.replace('|', "\\|")
                ));
            }
            output.push('\n');
        }

        output
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")
    }

    /// Print a colored console summary
    pub fn print_summary(&self) {
        println!("\n{}", "=== Conflict Report ===".bold().cyan());
        println!(
            "{}: {}",
            "Pending".bold(),
            self.total_conflicts.to_string().yellow()
        );

        if self.conflicts.is_empty() {
            println!("\n{}", "No conflicts pending!".green());
            return;
        }

        for conflict in &self.conflicts {
            println!(
                "\n{} {} vs {} {}",
                format!("#{}", conflict.pair_id).cyan(),
                conflict.existing_key.yellow(),
                conflict.incoming_key.yellow(),
                format!("(from {})", conflict.source).dimmed()
            );
            for diff in &conflict.fields {
                println!("   {}:", diff.field.bold());
                println!("     A: {}", diff.existing);
                println!("     B: {}", diff.incoming);
            }
        }
        println!();
    }

    pub fn save(&self, path: &Path, format: &str) -> Result<()> {
        let content = match format.to_lowercase().as_str() {
            "json" => self.to_json()?,
            "markdown" | "md" => self.to_markdown(),
            _ => return Err(anyhow::anyhow!("Unsupported format: {format}")),
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        Ok(())
    }
}

/// Build a report from the session's pending pairs and print or save it
pub fn generate_report(session: &LibrarySession, format: &str, output: Option<&Path>) -> Result<()> {
    let report = ConflictReport::from_conflicts(session.pending());

    match output {
        Some(path) => {
            report.save(path, format)?;
            println!(
                "{} {}",
                "Report saved to:".green().bold(),
                path.display().to_string().cyan()
            );
        }
        None => match format.to_lowercase().as_str() {
            "json" => println!("{}", report.to_json()?),
            "markdown" | "md" => println!("{}", report.to_markdown()),
            _ => report.print_summary(),
        },
    }

    Ok(())
}
