use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc2dash::config::Config;
use doc2dash::convert::{ConvertContext, ConvertOptions, convert};
use doc2dash::docset::FullTextSearch;
use doc2dash::init::init_config;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "doc2dash")]
#[command(about = "Create Dash docsets from Sphinx documentation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show every entry and patched file
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a documentation directory into a docset
    Convert {
        /// Directory containing the built documentation (with objects.inv)
        source: PathBuf,

        /// Directory the docset is created in (overrides doc2dash.toml)
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Docset name (defaults to the project name)
        #[arg(short, long)]
        name: Option<String>,

        /// Replace an existing docset
        #[arg(short, long)]
        force: bool,

        /// PNG icon to add to the docset
        #[arg(short, long)]
        icon: Option<PathBuf>,

        /// 2x-sized PNG icon for high resolution displays
        #[arg(long)]
        icon_2x: Option<PathBuf>,

        /// Page Dash opens first, relative to the source directory
        #[arg(short = 'I', long)]
        index_page: Option<String>,

        /// Base URL of the online documentation
        #[arg(short = 'u', long)]
        online_redirect_url: Option<String>,

        /// URL of a playground for the documented project
        #[arg(long)]
        playground_url: Option<String>,

        /// Allow JavaScript in the docset
        #[arg(short = 'j', long)]
        enable_js: bool,

        /// Full-text search setting for the docset
        #[arg(long, value_enum, default_value_t = FullTextSearch::Off)]
        full_text_search: FullTextSearch,
    },
    /// Initialize a new doc2dash.toml configuration file
    Init {
        /// Overwrite existing doc2dash.toml if present
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "doc2dash=debug"
    } else {
        "doc2dash=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Convert {
            source,
            destination,
            name,
            force,
            icon,
            icon_2x,
            index_page,
            online_redirect_url,
            playground_url,
            enable_js,
            full_text_search,
        } => {
            let ctx = ConvertContext {
                config: Config::load(),
                options: ConvertOptions {
                    destination,
                    name,
                    force,
                    icon,
                    icon_2x,
                    index_page,
                    online_redirect_url,
                    playground_url,
                    enable_js,
                    full_text_search,
                },
                verbose: cli.verbose,
                quiet: cli.quiet,
            };
            convert(&ctx, &source)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
        Commands::Init { force } => init_config(force),
    };

    if let Err(e) = result {
        eprintln!("\n{} {}", "❌".red(), e.red());
        std::process::exit(1);
    }
}
