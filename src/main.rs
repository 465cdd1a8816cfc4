use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sheetbridge::{
    config::{Args, Backend, Config},
    files::{DriveStore, FileStore, FolderRouter, MemoryFileStore},
    gateway::SheetGateway,
    server::{self, AppState},
    store::{MemoryStore, SheetsStore, TableStore},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) config & logging ─────────────────────────────────────────
    let config = Config::from_args(Args::parse())?;
    telemetry::init(&config.log_level);

    // ─── 2) collaborators ────────────────────────────────────────────
    let (store, files): (Arc<dyn TableStore>, Arc<dyn FileStore>) = match &config.backend {
        Backend::Google {
            spreadsheet_id,
            access_token,
        } => {
            let client = Client::builder()
                .user_agent(concat!("sheetbridge/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(60))
                .build()
                .context("building HTTP client")?;
            let sheets = SheetsStore::new(client.clone(), spreadsheet_id.as_str(), access_token.clone())
                .context("building Sheets API root")?;
            info!(spreadsheet = %spreadsheet_id, "using Google Sheets and Drive");
            (
                Arc::new(sheets),
                Arc::new(DriveStore::new(client, access_token.clone())),
            )
        }
        Backend::InMemory => {
            warn!("serving from in-memory stores; nothing is persisted");
            let store = MemoryStore::new()
                .with_table(&config.tables.sandbox, Vec::new())
                .with_table(&config.tables.log, Vec::new())
                .with_table(&config.tables.integration_log, Vec::new());
            (Arc::new(store), Arc::new(MemoryFileStore::new()))
        }
    };

    let gateway = SheetGateway::new(store)
        .with_policy(config.header_policy)
        .with_serialized_writes(config.serialize_appends);

    let state = Arc::new(AppState {
        gateway,
        files,
        folders: FolderRouter::new(config.default_folder_id.clone()),
        write_key: config.write_key,
        tables: config.tables,
        max_upload_bytes: config.max_upload_bytes,
    });

    // ─── 3) serve until ctrl-c ───────────────────────────────────────
    let (addr, serving) = warp::serve(server::routes(state))
        .try_bind_with_graceful_shutdown(config.listen, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for shutdown signal");
            }
        })
        .with_context(|| format!("binding {}", config.listen))?;

    info!(
        %addr,
        policy = ?config.header_policy,
        serialize_appends = config.serialize_appends,
        "sheetbridge listening"
    );
    serving.await;
    info!("shut down");
    Ok(())
}
