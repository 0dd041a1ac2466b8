//! CLI entry point for quill

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill::commands::build::{self, BuildOptions};
use quill::commands::new::Kind;

#[derive(Parser)]
#[command(name = "quill")]
#[command(version)]
#[command(about = "A small static site generator for a Markdown personal blog", long_about = None)]
struct Cli {
    /// Set the site directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to the site directory)
        folder: Option<PathBuf>,
    },

    /// Create a new post (as a draft) or page
    New {
        /// Title of the new post
        title: String,

        /// Create a standalone page instead of a post
        #[arg(long)]
        page: bool,

        /// File path without extension, relative to the posts or content directory
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Build the site into the public directory
    #[command(alias = "b")]
    Build {
        /// Include drafts
        #[arg(long)]
        drafts: bool,

        /// Include posts dated in the future
        #[arg(long)]
        future: bool,

        /// Rebuild on file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Build, then serve the site locally with live reload
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "1313")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "127.0.0.1")]
        ip: String,

        /// Include drafts
        #[arg(long)]
        drafts: bool,

        /// Include posts dated in the future
        #[arg(long)]
        future: bool,

        /// Serve only, no file watching
        #[arg(long)]
        r#static: bool,
    },

    /// List site content
    List {
        /// posts, drafts, pages, tags or photos
        #[arg(default_value = "posts")]
        r#type: String,
    },

    /// Remove the public directory
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "quill=debug,info"
    } else {
        "quill=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read the current directory")?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = match folder {
                Some(folder) if folder.is_absolute() => folder,
                Some(folder) => base_dir.join(folder),
                None => base_dir,
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            quill::commands::init::init_site(&target_dir)?;
            println!("Initialized site in {:?}", target_dir);
        }

        Commands::New { title, page, path } => {
            let site = quill::Site::new(&base_dir)?;
            let kind = if page { Kind::Page } else { Kind::Post };
            let file = quill::commands::new::create(&site, &title, kind, path.as_deref())?;
            println!("Created: {}", file.display());
        }

        Commands::Build {
            drafts,
            future,
            watch,
        } => {
            let options = BuildOptions { drafts, future };
            let site = build::open_site(&base_dir, options)?;
            let report = site.build()?;

            for failure in &report.failures {
                eprintln!("error: {}", failure);
            }
            println!("Wrote {} files to {}", report.written, site.public_dir.display());

            if watch {
                tokio::task::spawn_blocking(move || build::watch(&base_dir, options)).await??;
            } else if !report.is_clean() {
                bail!("{} file(s) failed to build", report.failures.len());
            }
        }

        Commands::Serve {
            port,
            ip,
            drafts,
            future,
            r#static,
        } => {
            let options = BuildOptions { drafts, future };
            let site = build::open_site(&base_dir, options)?;

            let report = site.build()?;
            for failure in &report.failures {
                eprintln!("error: {}", failure);
            }

            tracing::info!("Starting server at http://{}:{}", ip, port);
            quill::server::start(&site, options, &ip, port, !r#static).await?;
        }

        Commands::List { r#type } => {
            let site = quill::Site::new(&base_dir)?;
            quill::commands::list::run(&site, &r#type)?;
        }

        Commands::Clean => {
            let site = quill::Site::new(&base_dir)?;
            site.clean()?;
            println!("Cleaned successfully!");
        }
    }

    Ok(())
}
