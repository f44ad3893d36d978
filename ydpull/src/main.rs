use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ydnote_core::{CookieSession, YdnoteClient};

use ydpull::config::PullConfig;
use ydpull::dedupe;
use ydpull::export::{GithubTarget, PlatformExporter};
use ydpull::media::migrate::MediaMigrator;
use ydpull::media::smms::SmmsClient;
use ydpull::sync::engine::Puller;

/// One-way mirror of a Youdao Note account as local Markdown.
#[derive(Parser)]
#[command(name = "ydpull", about = "Mirror Youdao Note into local Markdown")]
struct Cli {
    /// Path to the pull configuration.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Path to the saved login cookies.
    #[arg(long, default_value = "cookies.json")]
    cookies: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the remote tree into the local mirror (the default).
    Pull,

    /// Rewrite mirrored documents for paste-and-publish platforms.
    Export {
        /// GitHub account hosting the mirror repository.
        #[arg(long)]
        github_user: String,

        /// Repository the mirrored assets are pushed to.
        #[arg(long)]
        github_repo: String,

        /// Branch the raw CDN should read from.
        #[arg(long, default_value = "main")]
        github_branch: String,
    },

    /// Copy a media tree with files renamed to their content hash.
    Dedupe {
        /// Media tree to read.
        source: PathBuf,

        /// Where the deduplicated copies land.
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ydpull=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let started = Instant::now();
    match run(cli).await {
        Ok(()) => {
            tracing::info!(elapsed_secs = started.elapsed().as_secs(), "finished");
        }
        Err(err) => {
            tracing::error!("{err:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Pull) {
        Commands::Pull => run_pull(&cli.config, &cli.cookies).await,
        Commands::Export {
            github_user,
            github_repo,
            github_branch,
        } => run_export(&cli.config, github_user, github_repo, github_branch),
        Commands::Dedupe { source, output } => run_dedupe(&source, &output),
    }
}

async fn run_pull(config_path: &Path, cookies_path: &Path) -> Result<()> {
    let config = PullConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let mirror_root = config
        .resolve_mirror_root()
        .context("preparing the mirror root")?;
    let session = CookieSession::from_file(cookies_path)
        .with_context(|| format!("loading {}", cookies_path.display()))?;
    let api = YdnoteClient::new(&session).context("building the API client")?;

    let smms = if config.smms_secret_token.is_empty() {
        None
    } else {
        Some(SmmsClient::new(&config.smms_secret_token).context("building the SM.MS client")?)
    };
    let migrator = MediaMigrator::new(api.clone(), smms, config.is_relative_path);

    let mut puller = Puller::new(api, migrator, mirror_root.clone(), config.ydnote_dir.clone());
    let report = puller.run().await?;
    tracing::info!(
        added = report.added,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        reaped_documents = report.reaped_documents,
        reaped_media_dirs = report.reaped_media_dirs,
        root = %mirror_root.display(),
        "mirror complete"
    );
    Ok(())
}

fn run_export(config_path: &Path, user: String, repo: String, branch: String) -> Result<()> {
    let config = PullConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let mirror_root = config
        .resolve_mirror_root()
        .context("preparing the mirror root")?;
    let exporter = PlatformExporter::new(mirror_root, GithubTarget { user, repo, branch });
    let report = exporter.run()?;
    tracing::info!(
        converted = report.converted,
        failed = report.failed,
        "export complete"
    );
    Ok(())
}

fn run_dedupe(source: &Path, output: &Path) -> Result<()> {
    let report = dedupe::dedupe_images(source, output)?;
    tracing::info!(
        total = report.total,
        processed = report.processed,
        skipped = report.skipped,
        "dedupe complete"
    );
    Ok(())
}
