// Echoir - Music Catalog Downloader
// Copyright (C) 2025 Echoir contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use clap::{Parser, Subcommand};
use echoir_core::api::{CatalogClient, ClientConfig, PlaybackRequest};
use echoir_core::audio::FfmpegPostProcessor;
use echoir_core::download::{DownloadRepository, RepositoryConfig};
use echoir_core::storage::{Database, Download, DownloadStore, Quality};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "echoir-cli")]
#[command(about = "Echoir CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// Catalog service base URL
    #[arg(long, env = "ECHOIR_CATALOG_URL")]
    catalog_url: String,

    /// Bearer token for the catalog service
    #[arg(long, env = "ECHOIR_CATALOG_TOKEN")]
    token: Option<String>,

    /// Music library root
    #[arg(long, default_value = "./library")]
    library: PathBuf,

    /// Database file
    #[arg(long, default_value = "./echoir.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve playback streams for a track without downloading
    Resolve {
        /// Catalog track id
        track_id: i64,
        /// Quality tier (HI_RES_LOSSLESS, LOSSLESS, DOLBY_ATMOS, HIGH, LOW)
        #[arg(short, long, default_value = "LOSSLESS")]
        quality: String,
        /// Request AC-4 for Dolby Atmos
        #[arg(long)]
        ac4: bool,
        /// Request the immersive variant
        #[arg(long)]
        immersive: bool,
    },
    /// Download a track into the library
    Download {
        /// Catalog track id
        track_id: i64,
        #[arg(short, long, default_value = "LOSSLESS")]
        quality: String,
        #[arg(long)]
        ac4: bool,
        #[arg(long)]
        immersive: bool,
        /// Display title for the record
        #[arg(long, default_value = "Unknown Track")]
        title: String,
        /// Display artist for the record
        #[arg(long, default_value = "Unknown Artist")]
        artist: String,
        /// Album title (directory name)
        #[arg(long)]
        album: Option<String>,
        /// Mark the track as explicit
        #[arg(long)]
        explicit: bool,
    },
    /// List stored download attempts
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echoir_core=info,echoir_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::builder().base_url(cli.catalog_url.clone());
    if let Some(token) = &cli.token {
        config = config.auth_token(token.clone());
    }
    let client = Arc::new(CatalogClient::new(config.build()?)?);

    let db = Database::new(&cli.database).await?;
    let store = Arc::new(DownloadStore::new(db));
    store.requeue_interrupted().await?;
    store.refresh_feeds().await?;

    let staging = std::env::temp_dir().join("echoir-staging");
    let repo = DownloadRepository::new(
        Arc::clone(&store),
        client,
        Arc::new(FfmpegPostProcessor::new()),
        RepositoryConfig::new(cli.library.clone(), staging),
    )?;

    match cli.command {
        Commands::Resolve {
            track_id,
            quality,
            ac4,
            immersive,
        } => {
            let quality = Quality::parse(&quality)?;
            let request = PlaybackRequest::new(track_id, quality, ac4, immersive);
            let (response, headers) = repo.get_download_info(&request).await?;

            println!("codec: {}", response.codec);
            for (i, url) in response.urls.iter().enumerate() {
                let size = response
                    .sizes
                    .get(i)
                    .copied()
                    .flatten()
                    .map(|s| format!("{} bytes", s))
                    .unwrap_or_else(|| "unknown size".to_string());
                println!("stream {}: {} ({})", i, url, size);
            }
            if !headers.is_empty() {
                println!("headers: {}", headers.len());
            }
        }
        Commands::Download {
            track_id,
            quality,
            ac4,
            immersive,
            title,
            artist,
            album,
            explicit,
        } => {
            let quality = Quality::parse(&quality)?;
            let download = Download::new(
                track_id, None, title, artist, album, None, 0, explicit, quality, ac4, immersive,
            );
            let download_id = download.id.clone();
            repo.save_download(&download).await?;

            let sink: echoir_core::download::ProgressSink =
                Arc::new(|percent| println!("  {}%", percent));

            let path = repo
                .process_download(&download_id, track_id, quality, ac4, immersive, sink)
                .await?;
            println!("completed: {}", path);
        }
        Commands::List => {
            let history = repo.get_download_history();
            for download in history.borrow().iter() {
                println!(
                    "{}  [{}] {} - {} ({}%)",
                    download.id,
                    download.status.as_str(),
                    download.artist,
                    download.title,
                    download.progress,
                );
            }
        }
    }

    Ok(())
}
