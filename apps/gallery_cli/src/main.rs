use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gallery_core::{
    BulkEditWorkflow, Connectivity, ConnectivityGate, ConnectivityState, EditSession,
    HttpPhotoStore, SessionError, UploadPolicy, WorkflowEvent,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod edits;
mod source;

use config::{load_settings, normalize_api_base_url, Settings};
use edits::{apply_edits, parse_edit, Edit};
use source::{assets_from_files, JsonFilePhotoSource};

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `api_base_url` from gallery.toml and the environment.
    #[arg(long)]
    api_url: Option<String>,
    /// `all` or `edited`.
    #[arg(long)]
    policy: Option<UploadPolicy>,
    #[arg(long)]
    offline: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists the photos of a catalog export in display order.
    Preview { photos: PathBuf },
    /// Edits photos from a catalog export and submits them.
    Upload {
        photos: PathBuf,
        /// `TARGET:field=value`, where TARGET is a photo id or `#position`.
        #[arg(long = "set", value_parser = parse_edit)]
        edits: Vec<Edit>,
        /// Resubmit failed photos once after the first pass.
        #[arg(long)]
        retry: bool,
    },
    /// Creates catalog photos from local image files.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long = "set", value_parser = parse_edit)]
        edits: Vec<Edit>,
        #[arg(long)]
        retry: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let settings = resolve_settings(load_settings(), &cli);

    let initial = if settings.start_offline {
        Connectivity::Offline
    } else {
        Connectivity::Online
    };
    let connectivity = ConnectivityState::new(initial);
    let gate = ConnectivityGate::new(&connectivity);
    if let Some(banner) = gate.banner() {
        warn!("{banner}");
    }

    let store = HttpPhotoStore::with_timeout(
        &settings.api_base_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?;
    info!(api = %settings.api_base_url, policy = ?settings.upload_policy, "gallery cli ready");
    let mut workflow =
        BulkEditWorkflow::new(Arc::new(store), &connectivity, settings.upload_policy);

    match cli.command {
        Command::Preview { photos } => {
            workflow
                .load_from(&JsonFilePhotoSource::new(photos))
                .await?;
            print_preview(&mut workflow)?;
            workflow.cancel()?;
        }
        Command::Upload {
            photos,
            edits,
            retry,
        } => {
            workflow
                .load_from(&JsonFilePhotoSource::new(photos))
                .await?;
            run_upload(workflow, edits, retry).await?;
        }
        Command::Import {
            files,
            edits,
            retry,
        } => {
            workflow.assets_ready(&assets_from_files(&files)?)?;
            run_upload(workflow, edits, retry).await?;
        }
    }

    Ok(())
}

fn resolve_settings(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(api_url) = &cli.api_url {
        settings.api_base_url = normalize_api_base_url(api_url);
    }
    if let Some(policy) = cli.policy {
        settings.upload_policy = policy;
    }
    if cli.offline {
        settings.start_offline = true;
    }
    settings
}

fn print_preview(workflow: &mut BulkEditWorkflow) -> Result<()> {
    let total = workflow.session().map_or(0, EditSession::len);
    for index in 0..total {
        workflow.go_to(index)?;
        if let Some(session) = workflow.session() {
            let item = session.current();
            let price = item
                .draft_price()
                .map_or_else(|| "-".to_string(), |price| format!("{price:.2}"));
            println!(
                "{}  {}  {}  {}  {}",
                session.progress_label(),
                item.photo_id(),
                item.draft_title(),
                price,
                item.draft_stock_status()
            );
        }
    }
    Ok(())
}

async fn run_upload(mut workflow: BulkEditWorkflow, edits: Vec<Edit>, retry: bool) -> Result<()> {
    workflow.begin_editing()?;
    apply_edits(&mut workflow, edits)?;
    if let Some(session) = workflow.session() {
        info!(
            edited = session.edited_count(),
            total = session.len(),
            "drafts ready"
        );
    }

    let reporter = tokio::spawn(report_progress(workflow.subscribe_events()));
    let mut summary = workflow.start_upload().await?;
    if retry && !summary.is_clean() {
        match workflow.retry_failed().await {
            Ok(retried) => summary = retried,
            Err(SessionError::Offline) => warn!("still offline; skipping retry"),
            Err(err) => return Err(err.into()),
        }
    }
    workflow.cancel()?;
    drop(workflow);
    reporter.await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.is_clean() {
        bail!("{} photo(s) failed to upload", summary.failed_count);
    }
    Ok(())
}

async fn report_progress(mut events: broadcast::Receiver<WorkflowEvent>) {
    loop {
        match events.recv().await {
            Ok(WorkflowEvent::TaskResolved(update)) => info!(
                photo_id = %update.photo_id,
                state = ?update.state,
                progress = %update.progress,
                "upload resolved"
            ),
            Ok(WorkflowEvent::SessionClosed { catalog_changed }) => {
                if catalog_changed {
                    info!("catalog changed; reload the gallery");
                }
                return;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "progress reporter fell behind"),
            Err(RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
