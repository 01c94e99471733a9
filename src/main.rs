use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use appcast::{package_metadata, BuildMetadata, Config, FeedSource, StaticMetadata, Updater};

#[derive(Parser, Debug)]
#[command(name = "appcast", about = "Check a Sparkle appcast for application updates")]
struct Args {
    /// Config file (defaults to ~/.config/appcast/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Appcast location (https://... or file://...)
    #[arg(long, value_name = "URL")]
    feed: Option<String>,

    /// Application name reported with the release
    #[arg(long, value_name = "NAME")]
    app_name: Option<String>,

    /// Installed version to compare against (e.g. 1.2.3.4)
    #[arg(long, value_name = "VERSION")]
    installed_version: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => Config::default(),
    };

    let location = args
        .feed
        .clone()
        .or_else(|| config.feed_url.clone())
        .context("No appcast location given: pass --feed or set feed_url in the config file")?;
    let source = FeedSource::parse(&location)
        .with_context(|| format!("Invalid appcast location: {}", location))?;

    // Flags override config, config overrides the binary's own package metadata
    let package = package_metadata!();
    let metadata = StaticMetadata::new(
        args.app_name
            .or(config.application_name.clone())
            .unwrap_or_else(|| package.application_name().to_string()),
        args.installed_version
            .or(config.installed_version.clone())
            .unwrap_or_else(|| package.installed_version().to_string()),
    );

    let updater = Updater::new(source, metadata).with_options(config.fetch_options());
    let release = updater
        .check_for_update()
        .await
        .with_context(|| format!("Update check against {} failed", updater.source()))?;

    if args.json {
        let output = serde_json::json!({
            "update_available": release.is_some(),
            "release": release,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize result")?
        );
        return Ok(());
    }

    match release {
        Some(release) => {
            println!(
                "{} {} is available (installed: {})",
                release.app_name,
                release.version(),
                release.installed_version
            );
            println!("Download: {}", release.download_link());
            if let Some(notes) = release.release_notes_link() {
                println!("Release notes: {}", notes);
            }
            if let Some(signature) = release.signature() {
                println!("DSA signature: {}", signature);
            }
        }
        None => {
            let metadata = updater.metadata();
            println!(
                "{} {} is up to date",
                metadata.application_name(),
                metadata.installed_version()
            );
        }
    }

    Ok(())
}
