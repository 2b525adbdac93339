//! `brokerd-gatewayd` — standalone binary for the brokerd agent gateway.
//!
//! Bootstraps configuration, persistence, and the two external
//! collaborators the session layer treats as out of scope (a worktree
//! manager and an SDK client), then serves [`brokerd_gateway::router`]
//! until a shutdown signal arrives.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use tokio::net::TcpListener;

use brokerd_config::{resolve, ProcessEnv};
use brokerd_crypto::MasterKey;
use brokerd_gateway::{router, AppState, KvCredentialStore};
use brokerd_sdk::{PermissionCallback, SdkClient, SdkError, SdkQuery, SdkQueryOptions, SdkResult};
use brokerd_session::{SessionManager, SessionManagerDeps};
use brokerd_storage::adapter::KvPersistenceAdapter;
use brokerd_storage::kv::{KvStore, SurrealKvStore};
use brokerd_telemetry::{setup_logging, LogConfig, LogFormat};
use brokerd_workspace::{WorkspaceResult, WorktreeManager};

/// Binary names this build recognises as ACP-conformant subprocess
/// backends when `BROKERD_AUTO_DISCOVER_BACKENDS=true` (spec §6).
const KNOWN_BACKEND_BINARIES: &[&str] = &["claude-code-acp"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = LogConfig::new("info").with_format(LogFormat::Json);
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {e}");
    }

    let config = resolve(&ProcessEnv).context("failed to resolve configuration from environment")?;
    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir).context("failed to create data directory")?;

    let kv: Arc<dyn KvStore> =
        Arc::new(SurrealKvStore::open(data_dir.join("state")).context("failed to open state store")?);
    let persistence = Arc::new(KvPersistenceAdapter::new(Arc::clone(&kv)));
    let master_key = Arc::new(MasterKey::new(config.credential_master_key.expose()));
    let credentials = Arc::new(KvCredentialStore::new(Arc::clone(&kv), Arc::clone(&master_key)));
    let worktree_manager = Arc::new(LocalWorktreeManager::new(data_dir.join("worktrees")));
    let sdk_client = Arc::new(UnconfiguredSdkClient);

    let discovered_backends =
        if config.auto_discover_backends { discover_backends() } else { Vec::new() };

    let mut deps = SessionManagerDeps::new(persistence, credentials.clone(), master_key, worktree_manager, sdk_client);
    deps.max_concurrent_sessions = config.max_concurrent_sessions;
    deps.idle_timeout = config.idle_timeout;
    deps.request_timeout = config.rpc_timeout;
    if config.hosted_mode {
        deps.auth_policy = brokerd_approval::HostedAuthPolicy::hosted();
    }

    let sessions = Arc::new(SessionManager::new(deps));
    sessions.mark_all_idle_on_startup().await.context("failed to recover persisted sessions")?;

    let state = AppState {
        sessions,
        config: Arc::new(config.clone()),
        credentials,
        started_at: Instant::now(),
        discovered_backends: Arc::new(discovered_backends),
    };

    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await.context("failed to bind listener")?;
    tracing::info!(port = config.port, "brokerd-gatewayd listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("server terminated with an error")?;

    tracing::info!("brokerd-gatewayd stopped");
    Ok(())
}

fn data_dir() -> PathBuf {
    std::env::var("BROKERD_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./brokerd-data"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut signal) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            return;
        };
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}

fn discover_backends() -> Vec<String> {
    let Some(path_var) = std::env::var_os("PATH") else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for dir in std::env::split_paths(&path_var) {
        for name in KNOWN_BACKEND_BINARIES {
            if dir.join(name).is_file() && !found.contains(&(*name).to_string()) {
                found.push((*name).to_string());
            }
        }
    }
    found
}

/// Prepares working directories under the gateway's own data directory.
/// Real git-worktree checkout lives outside this crate (spec §1
/// Non-goals); this only guarantees the directory a `workspaceId`
/// names actually exists, so local/single-tenant deployments work
/// without a separate worktree service.
struct LocalWorktreeManager {
    root: PathBuf,
}

impl LocalWorktreeManager {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl WorktreeManager for LocalWorktreeManager {
    async fn prepare(&self, workspace_id: &str) -> WorkspaceResult<PathBuf> {
        let dir = self.root.join(workspace_id);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            brokerd_workspace::WorkspaceError::WorktreePreparationFailed {
                workspace_id: workspace_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(dir)
    }
}

/// Placeholder [`SdkClient`] for deployments that have not wired in a
/// real in-process agent SDK yet. Every `sendPrompt` on an `in-process`
/// session fails immediately with a clear error rather than hanging;
/// subprocess-backed sessions are unaffected.
struct UnconfiguredSdkClient;

#[async_trait]
impl SdkClient for UnconfiguredSdkClient {
    async fn query(&self, _prompt: String, _options: SdkQueryOptions, _on_permission_request: PermissionCallback) -> SdkResult<SdkQuery> {
        Err(SdkError::QueryStartFailed("no in-process agent SDK is configured for this deployment".to_string()))
    }
}
