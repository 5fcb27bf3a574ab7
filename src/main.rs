use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use paperref::handlers::{self, AppContext, ConfigUpdate};
use paperref::logger;
use paperref::session::EntryEdit;
use paperref::workspace::Workspace;

#[derive(Parser)]
#[command(name = "paperref")]
#[command(about = "Merge, deduplicate and sync BibTeX libraries with a WebDAV store", long_about = None)]
#[command(version)]
struct Cli {
    /// Use this directory for settings, session state and saved libraries
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one or more .bib files into the library
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Never prompt; leave conflicts pending
        #[arg(long)]
        no_interactive: bool,
    },

    /// List pending conflicts
    Conflicts {
        /// Show both entries of each pair
        #[arg(short, long)]
        detail: bool,
    },

    /// Resolve a pending conflict (all of them interactively when no id is given)
    Resolve {
        /// Conflict id as shown by `conflicts`
        id: Option<u64>,

        /// keep_a, keep_b or keep_both
        #[arg(short, long)]
        choice: Option<String>,

        /// Per-field choice, e.g. --field author=b (repeatable)
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// Drop pending conflicts, discarding their incoming entries
    Discard {
        /// Only this conflict
        id: Option<u64>,
    },

    /// Fetch the remote library and merge it in
    Pull {
        /// Show what would happen without changing anything
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        no_interactive: bool,
    },

    /// Upload the library, replacing the remote file
    Push {
        /// Do not ask when the remote changed since the last sync
        #[arg(short, long)]
        yes: bool,
    },

    /// Save the library to the cache (or to a file with --output)
    Save {
        name: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a saved library
    Load {
        name: String,

        /// Merge into the current library instead of replacing it
        #[arg(long)]
        merge: bool,

        #[arg(long)]
        no_interactive: bool,
    },

    /// List saved libraries
    Libraries,

    /// Write a timestamped copy of the library for sharing
    Share { base_name: Option<String> },

    /// Search titles, authors, years, journals and keywords
    Search { query: String },

    /// List every entry
    List,

    /// Write selected entries to a .bib file
    Export {
        #[arg(required = true)]
        keys: Vec<String>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Edit an entry's title, author or citation key
    Edit {
        key: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        new_key: Option<String>,
    },

    /// Show or change configuration
    Config {
        /// WebDAV collection URL
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        username: Option<String>,

        /// WebDAV app password
        #[arg(long)]
        password: Option<String>,

        /// Remote file name
        #[arg(long)]
        filename: Option<String>,

        /// Request timeout in seconds (0 for the client default)
        #[arg(long)]
        timeout: Option<u64>,

        /// Minimum title similarity for duplicates (0-1]
        #[arg(long)]
        threshold: Option<f64>,

        #[arg(long)]
        show: bool,

        /// Step through the settings interactively
        #[arg(long)]
        wizard: bool,
    },

    /// Report pending conflicts
    Report {
        /// Output format: json, markdown or text
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file (default: print to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show library and sync status
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(home) = &cli.home {
        std::env::set_var("PAPERREF_HOME", home);
    }
    logger::init_logger(cli.verbose)?;

    let mut ctx = AppContext::open(Workspace::open_default()?)?;

    match cli.command {
        Commands::Import {
            files,
            no_interactive,
        } => handlers::handle_import(&mut ctx, &files, !no_interactive)?,
        Commands::Conflicts { detail } => handlers::handle_conflicts(&ctx, detail)?,
        Commands::Resolve { id, choice, fields } => {
            handlers::handle_resolve(&mut ctx, id, choice, &fields)?
        }
        Commands::Discard { id } => handlers::handle_discard(&mut ctx, id)?,
        Commands::Pull {
            dry_run,
            no_interactive,
        } => handlers::handle_pull(&mut ctx, dry_run, !no_interactive)?,
        Commands::Push { yes } => handlers::handle_push(&mut ctx, yes)?,
        Commands::Save { name, output } => {
            handlers::handle_save(&ctx, name.as_deref(), output.as_deref())?
        }
        Commands::Load {
            name,
            merge,
            no_interactive,
        } => handlers::handle_load(&mut ctx, &name, merge, !no_interactive)?,
        Commands::Libraries => handlers::handle_libraries(&ctx)?,
        Commands::Share { base_name } => handlers::handle_share(&ctx, base_name.as_deref())?,
        Commands::Search { query } => handlers::handle_search(&ctx, &query)?,
        Commands::List => handlers::handle_list(&ctx)?,
        Commands::Export { keys, output } => handlers::handle_export(&ctx, &keys, &output)?,
        Commands::Edit {
            key,
            title,
            author,
            new_key,
        } => handlers::handle_edit(
            &mut ctx,
            &key,
            EntryEdit {
                title,
                author,
                new_key,
            },
        )?,
        Commands::Config {
            url,
            username,
            password,
            filename,
            timeout,
            threshold,
            show,
            wizard,
        } => {
            if show {
                handlers::handle_config_show(&ctx)?;
            } else if wizard {
                handlers::handle_config_wizard(&mut ctx)?;
            } else {
                let update = ConfigUpdate {
                    url,
                    username,
                    password,
                    filename,
                    timeout_secs: timeout,
                    title_threshold: threshold,
                };
                handlers::handle_config_update(&mut ctx, &update)?;
            }
        }
        Commands::Report { format, output } => {
            handlers::handle_report(&ctx, &format, output.as_deref())?
        }
        Commands::Status => handlers::handle_status(&ctx)?,
    }

    Ok(())
}
