//! # colloquy
//!
//! Agent execution server binary — opens the session store, wires the run
//! coordinator to a reasoning engine, and starts the HTTP server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colloquy_runtime::EchoEngine;
use colloquy_server::{ColloquyServer, ServerConfig};
use colloquy_store::{connection, migrations, ConnectionConfig, SessionStore};
use tracing_subscriber::EnvFilter;

/// Agent execution server.
#[derive(Parser, Debug)]
#[command(name = "colloquy", about = "Session-oriented agent execution server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Keep sessions in memory only (no file on disk).
    #[arg(long)]
    in_memory: bool,
}

impl Cli {
    fn default_db_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".colloquy").join("colloquy.db")
    }
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_store(args: &Cli) -> Result<Arc<SessionStore>> {
    let config = ConnectionConfig::default();
    let pool = if args.in_memory {
        // A single shared connection, or each pooled connection would get its
        // own private database.
        let config = ConnectionConfig {
            pool_size: 1,
            ..config
        };
        connection::new_in_memory(&config).context("Failed to open in-memory database")?
    } else {
        let db_path = args.db_path.clone().unwrap_or_else(Cli::default_db_path);
        ensure_parent_dir(&db_path)?;
        tracing::info!(path = %db_path.display(), "opening database");
        connection::new_file(&db_path.to_string_lossy(), &config)
            .context("Failed to open database")?
    };

    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let _ = migrations::run_migrations(&conn).context("Failed to run migrations")?;
    }

    Ok(Arc::new(SessionStore::new(pool)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = open_store(&args)?;

    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        ..ServerConfig::default()
    };
    let server = Arc::new(ColloquyServer::new(config, store, Arc::new(EchoEngine)));

    let shutdown = Arc::clone(server.shutdown());
    let serve_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = server.serve().await {
                tracing::error!(error = %e, "server exited with error");
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");
    shutdown
        .graceful_shutdown(server.coordinator(), vec![serve_handle], None)
        .await;

    Ok(())
}
