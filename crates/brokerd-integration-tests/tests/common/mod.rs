//! Shared setup for the end-to-end scenario tests in this crate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use brokerd_config::{GatewayConfig, RateLimitConfig};
use brokerd_core::Secret;
use brokerd_crypto::MasterKey;
use brokerd_gateway::state::AppState;
use brokerd_sdk::SdkClient;
use brokerd_session::{SessionManager, SessionManagerDeps};
use brokerd_storage::adapter::KvPersistenceAdapter;
use brokerd_storage::kv::MemoryKvStore;
use brokerd_test::{AlwaysCwdWorktreeManager, NoopCredentialStore};

pub const BEARER_TOKEN: &str = "integration-test-token";

/// A full [`AppState`] wired to an in-memory store, for driving the
/// router end to end the way [`brokerd_gateway::server`]'s own tests
/// do (`tower::ServiceExt::oneshot` against `router(state)`).
pub fn gateway_state(sdk_client: Arc<dyn SdkClient>) -> AppState {
    let config = GatewayConfig {
        port: 0,
        bearer_token: Secret::new(BEARER_TOKEN),
        hosted_mode: false,
        credential_master_key: Secret::new("integration-test-master-key"),
        idle_timeout: Duration::from_secs(600),
        rpc_timeout: Duration::from_secs(300),
        max_concurrent_sessions: 50,
        max_message_size: 1_000_000,
        rate_limit: RateLimitConfig { requests_per_second: 100, burst: 200 },
        auto_discover_backends: false,
    };
    let master_key = Arc::new(MasterKey::new("integration-test-master-key"));
    let kv = Arc::new(MemoryKvStore::new());
    let credentials = Arc::new(brokerd_gateway::credentials::KvCredentialStore::new(kv.clone(), master_key.clone()));
    let deps = SessionManagerDeps::new(
        Arc::new(KvPersistenceAdapter::new(kv)),
        Arc::new(NoopCredentialStore),
        master_key,
        Arc::new(AlwaysCwdWorktreeManager),
        sdk_client,
    );
    AppState {
        sessions: Arc::new(SessionManager::new(deps)),
        config: Arc::new(config),
        credentials,
        started_at: Instant::now(),
        discovered_backends: Arc::new(Vec::new()),
    }
}
