use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use model_thumbnailer::{uploads, viewer, RenderRequest, ThumbnailConfig, ThumbnailService};

#[derive(Parser)]
#[command(name = "thumbnailer", version, about = "Render 3D model thumbnails with headless Chrome")]
struct Cli {
    /// JSON config file; THUMBNAIL_* environment variables apply on top
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root of the uploads tree
    #[arg(long, global = true)]
    uploads_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one thumbnail and print its uploads-relative path
    Render {
        /// Public URL of the stored model (must contain /uploads/)
        #[arg(long)]
        model_url: String,
        /// Owner directory the thumbnail goes under
        #[arg(long)]
        owner: String,
        /// Origin serving /isolated-viewer
        #[arg(long, default_value = "http://localhost:3000")]
        base_url: String,
        /// Output file name; defaults to <model stem>_thumbnail.png
        #[arg(long)]
        output: Option<String>,
        /// Navigation timeout in milliseconds
        #[arg(long)]
        navigation_timeout_ms: Option<u64>,
        /// Model load timeout in milliseconds
        #[arg(long)]
        load_timeout_ms: Option<u64>,
        /// Browser binary to launch
        #[arg(long)]
        chrome_path: Option<PathBuf>,
    },
    /// Delete a stored thumbnail by its uploads-relative path
    Remove { relative_path: String },
    /// Print the isolated-viewer URL a render would navigate to
    ViewerUrl {
        #[arg(long)]
        model_url: String,
        #[arg(long, default_value = "http://localhost:3000")]
        base_url: String,
    },
}

fn load_config(cli: &Cli) -> model_thumbnailer::Result<ThumbnailConfig> {
    let base = match &cli.config {
        Some(path) => ThumbnailConfig::from_json_file(path)?,
        None => ThumbnailConfig::default(),
    };
    let mut config = base.overlay(|key| std::env::var(key).ok())?;
    if let Some(root) = &cli.uploads_root {
        config.uploads_root = root.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Render {
            model_url,
            owner,
            base_url,
            output,
            navigation_timeout_ms,
            load_timeout_ms,
            chrome_path,
        } => {
            if let Some(ms) = navigation_timeout_ms {
                config.navigation_timeout_ms = ms;
            }
            if let Some(ms) = load_timeout_ms {
                config.load_timeout_ms = Some(ms);
            }
            if chrome_path.is_some() {
                config.chrome_path = chrome_path;
            }

            let output = output.unwrap_or_else(|| {
                let stored = model_url.rsplit('/').next().unwrap_or(&model_url);
                uploads::thumbnail_filename(stored)
            });

            let service = match ThumbnailService::with_chrome(config) {
                Ok(s) => s,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };

            match service.generate(RenderRequest::new(model_url, output, owner, base_url)).await {
                Some(relative) => {
                    println!("{}", relative);
                    ExitCode::SUCCESS
                }
                None => ExitCode::FAILURE,
            }
        }
        Command::Remove { relative_path } => match config.layout().remove(&relative_path) {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        },
        Command::ViewerUrl { model_url, base_url } => match viewer::isolated_viewer_url(&model_url, &base_url) {
            Ok(url) => {
                println!("{}", url);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}
