//! LamaImage CLI — run the image tools and manage the saved library from the
//! command line.
//!
//! Set LAMAIMAGE_BACKEND_URL and LAMAIMAGE_BACKEND_ANON_KEY for the backend,
//! LAMAIMAGE_API_KEY for the generative tools, and LAMAIMAGE_EMAIL plus
//! LAMAIMAGE_PASSWORD to sign in for library operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use lamaimage_backend::{BackendService, RestBackend};
use lamaimage_cli::{content_type_for, extension_for, init_tracing};
use lamaimage_core::constants::PUBLIC_REVIEW_FEED_LIMIT;
use lamaimage_core::{AppConfig, ReviewSubmission, ToolKind};
use lamaimage_pipeline::{
    AssetPipeline, LocalCompressExecutor, PipelineState, RemoteExecutor, TransformExecutor,
};
use lamaimage_services::{LibraryView, ModerationView, ReviewService};
use lamaimage_transform::{GenerativeImageClient, ToolProfile};

#[derive(Parser)]
#[command(name = "lamaimage", about = "LamaImage tools CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image (local JPEG re-encode)
    Compress {
        /// Path to the image file
        file: PathBuf,
        /// JPEG quality percentage (5-95)
        #[arg(long, value_parser = clap::value_parser!(u8).range(5..=95))]
        quality: Option<u8>,
        /// Save the result to your library
        #[arg(long)]
        save: bool,
    },
    /// Enhance an image via the generative endpoint
    Enhance {
        /// Path to the image file
        file: PathBuf,
        /// Restoration intensity (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        intensity: Option<u8>,
        /// Save the result to your library
        #[arg(long)]
        save: bool,
    },
    /// Remove an image's background via the generative endpoint
    RemoveBg {
        /// Path to the image file
        file: PathBuf,
        /// Save the result to your library
        #[arg(long)]
        save: bool,
    },
    /// Saved image library operations
    Library {
        #[command(subcommand)]
        sub: LibraryCommands,
    },
    /// Review operations
    Reviews {
        #[command(subcommand)]
        sub: ReviewCommands,
    },
    /// Create an account
    SignUp {
        email: String,
        password: String,
        /// Display name
        #[arg(long, default_value = "")]
        name: String,
    },
}

#[derive(Subcommand)]
enum LibraryCommands {
    /// List your saved images, newest first
    List,
    /// Delete a saved image by record id
    Delete {
        /// Record id
        id: String,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Submit a review (stored unapproved, pending moderation)
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: String,
    },
    /// Show the public (approved) review feed
    List,
    /// Approve a review (admin)
    Approve {
        /// Review id
        id: String,
    },
    /// Revoke a review's approval (admin)
    Reject {
        /// Review id
        id: String,
    },
    /// Delete a review (admin)
    Delete {
        /// Review id
        id: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Sign in when credentials are present in the environment. Library and
/// moderation commands need a session; the tools work without one.
async fn sign_in_if_configured(backend: &dyn BackendService) -> anyhow::Result<()> {
    let email = std::env::var("LAMAIMAGE_EMAIL").ok();
    let password = std::env::var("LAMAIMAGE_PASSWORD").ok();
    if let (Some(email), Some(password)) = (email, password) {
        backend
            .sign_in_with_password(&email, &password)
            .await
            .context("Sign-in failed")?;
    }
    Ok(())
}

fn output_path(input: &Path, tag: &str, content_type: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_{}.{}", stem, tag, extension_for(content_type)))
}

async fn run_tool(
    tool: ToolKind,
    file: PathBuf,
    param: Option<u8>,
    save: bool,
    config: &AppConfig,
    backend: Arc<dyn BackendService>,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let content_type = content_type_for(&file);

    let executor: Arc<dyn TransformExecutor> = if tool.is_remote() {
        let profile =
            ToolProfile::for_tool(tool).context("No generative profile for this tool")?;
        let client = Arc::new(GenerativeImageClient::new(&config.transform, &profile)?);
        Arc::new(RemoteExecutor::new(client, profile))
    } else {
        Arc::new(LocalCompressExecutor)
    };

    let pipeline = AssetPipeline::new(tool, executor, backend, &config.backend.bucket);
    pipeline.select(data, content_type, filename);
    if let Some(param) = param {
        pipeline.set_param(param)?;
    }
    pipeline.process().await?;

    match pipeline.state() {
        PipelineState::Succeeded => {}
        PipelineState::Failed(kind) => {
            let message = pipeline
                .last_error()
                .map(|e| e.message)
                .unwrap_or_default();
            anyhow::bail!("Transform failed ({}): {}", kind, message);
        }
        other => anyhow::bail!("Unexpected pipeline state: {:?}", other),
    }

    let result = pipeline.result().context("No result after transform")?;
    let out_path = output_path(&file, tool.tag(), &result.content_type);
    tokio::fs::write(&out_path, &result.data)
        .await
        .with_context(|| format!("Write {}", out_path.display()))?;

    let mut summary = serde_json::json!({
        "output": out_path.to_string_lossy(),
        "content_type": result.content_type,
        "bytes": result.size(),
    });
    if let Some(metrics) = result.metrics {
        summary["original_bytes"] = metrics.original_size.into();
        summary["reduction_percent"] = metrics.reduction_ratio.into();
    }

    if save {
        pipeline.save_to_library().await?;
        if let Some(record) = pipeline.saved_record() {
            summary["saved"] = serde_json::to_value(&record)?;
        }
    }
    print_json(&summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    let backend: Arc<dyn BackendService> = Arc::new(RestBackend::new(&config.backend)?);
    sign_in_if_configured(backend.as_ref()).await?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Compress {
            file,
            quality,
            save,
        } => {
            run_tool(ToolKind::Compress, file, quality, save, &config, backend).await?;
        }
        Commands::Enhance {
            file,
            intensity,
            save,
        } => {
            run_tool(ToolKind::Enhance, file, intensity, save, &config, backend).await?;
        }
        Commands::RemoveBg { file, save } => {
            run_tool(
                ToolKind::RemoveBackground,
                file,
                None,
                save,
                &config,
                backend,
            )
            .await?;
        }
        Commands::Library { sub } => {
            let library = LibraryView::new(backend, &config.backend.bucket);
            match sub {
                LibraryCommands::List => {
                    let images = library.load().await?;
                    print_json(&images)?;
                }
                LibraryCommands::Delete { id } => {
                    let images = library.load().await?;
                    let image = images
                        .iter()
                        .find(|img| img.id.as_deref() == Some(id.as_str()))
                        .with_context(|| format!("No saved image with id {}", id))?;
                    library.delete(image).await?;
                    print_json(&serde_json::json!({
                        "success": true,
                        "message": format!("Image {} deleted", id),
                    }))?;
                }
            }
        }
        Commands::Reviews { sub } => match sub {
            ReviewCommands::Submit {
                name,
                email,
                rating,
                comment,
            } => {
                let service = ReviewService::new(backend);
                let review = service
                    .submit(ReviewSubmission {
                        name,
                        email,
                        rating,
                        comment,
                    })
                    .await?;
                print_json(&review)?;
            }
            ReviewCommands::List => {
                let service = ReviewService::new(backend);
                print_json(&service.public_feed(PUBLIC_REVIEW_FEED_LIMIT).await)?;
            }
            ReviewCommands::Approve { id } => {
                let moderation = ModerationView::new(backend);
                moderation.load().await?;
                moderation.set_approved(&id, true).await?;
                print_json(&serde_json::json!({ "success": true, "id": id, "approved": true }))?;
            }
            ReviewCommands::Reject { id } => {
                let moderation = ModerationView::new(backend);
                moderation.load().await?;
                moderation.set_approved(&id, false).await?;
                print_json(&serde_json::json!({ "success": true, "id": id, "approved": false }))?;
            }
            ReviewCommands::Delete { id } => {
                let moderation = ModerationView::new(backend);
                moderation.load().await?;
                moderation.remove(&id).await?;
                print_json(&serde_json::json!({ "success": true, "id": id, "deleted": true }))?;
            }
        },
        Commands::SignUp {
            email,
            password,
            name,
        } => {
            let session = backend.sign_up(&email, &password, &name).await?;
            print_json(&session)?;
        }
    }

    Ok(())
}
