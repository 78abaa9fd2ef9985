//! quill publishes a directory of Markdown posts to a blog platform.
//!
//! # Usage
//!
//! ```text
//! quill [--root DIR] [-v...] [--log-json] init
//! quill new <post-id> --title <title>
//! quill publish <post-id> [--dry-run]
//! quill publish --all [--dry-run]
//! quill status [--json]
//! quill diff <post-id>
//! quill pull [<post-id>]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, init::InitArgs, new::NewArgs, publish::PublishArgs, pull::PullArgs,
    status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "quill",
    version,
    about = "Publish Markdown posts and their images to a blog platform",
    long_about = None,
)]
struct Cli {
    /// Corpus root holding quill.yaml.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a commented quill.yaml and the posts directory.
    Init(InitArgs),

    /// Create a new draft post.
    New(NewArgs),

    /// Upload changed images and create or update remote posts.
    Publish(PublishArgs),

    /// Show what a publish would do for every post.
    Status(StatusArgs),

    /// Show the body rewrite a publish would send for a post.
    Diff(DiffArgs),

    /// Align local status with the platform's visibility.
    Pull(PullArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);
    let root = cli.root;
    match cli.command {
        Commands::Init(args) => args.run(&root),
        Commands::New(args) => args.run(&root),
        Commands::Publish(args) => args.run(&root),
        Commands::Status(args) => args.run(&root),
        Commands::Diff(args) => args.run(&root),
        Commands::Pull(args) => args.run(&root),
    }
}
