//! Stowage CLI: derive thumbnails, inspect link placement and fix JPEG
//! orientation from the command line.
//!
//! `derive` reads the same environment as the API server (UPLOAD_BASE_PATH,
//! ORIGINAL_FOLDER, THUMBNAIL_SIZES, ...).

use anyhow::Context;
use clap::{Parser, Subcommand};
use stowage_cli::{init_tracing, link_folder, print_json};
use stowage_core::Config;
use stowage_processing::{ImageOrientation, ThumbnailDeriver};
use stowage_storage::create_storage;

#[derive(Parser)]
#[command(name = "stowage", about = "Stowage upload and thumbnail tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive a thumbnail of a stored original
    Derive {
        /// Width in pixels, 0 to derive it from the height
        width: u32,
        /// Height in pixels, 0 to derive it from the width
        height: u32,
        /// Link of the original, relative to the original folder
        link: String,
    },
    /// Print the shard folder of a record id
    Shard {
        /// Numeric record id
        id: u64,
        /// Model name, e.g. BlogPost
        #[arg(long)]
        model: Option<String>,
        /// Attribute name, e.g. image
        #[arg(long)]
        attribute: Option<String>,
    },
    /// Rotate a JPEG upright according to its EXIF orientation, in place
    FixOrientation {
        /// Path to the JPEG file
        path: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Derive {
            width,
            height,
            link,
        } => {
            let config = Config::from_env().context("Failed to load configuration")?;
            config.validate()?;
            let storage = create_storage(&config).await?;
            let deriver = ThumbnailDeriver::from_config(storage, &config);

            let thumbnail = deriver.derive(width, height, &link).await?;
            print_json(&serde_json::json!({
                "path": thumbnail.path,
                "content_type": thumbnail.content_type,
                "generated": thumbnail.generated,
                "size_bytes": thumbnail.bytes.len(),
            }))?;
        }
        Commands::Shard {
            id,
            model,
            attribute,
        } => {
            print_json(&serde_json::json!({
                "id": id,
                "shard": stowage_storage::shard_folder(id),
                "folder": link_folder(id, model.as_deref(), attribute.as_deref()),
            }))?;
        }
        Commands::FixOrientation { path } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let fixed = tokio::task::spawn_blocking(move || {
                ImageOrientation::fix_jpeg_orientation(&data)
            })
            .await??;

            let changed = match fixed {
                Some(bytes) => {
                    tokio::fs::write(&path, bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    true
                }
                None => false,
            };

            tracing::info!(path = %path.display(), changed, "Orientation checked");
            print_json(&serde_json::json!({ "path": path, "changed": changed }))?;
        }
    }

    Ok(())
}
