use crate::auth::TokenRegistry;
use crate::commands::{
    Command, CommandDispatcher, CommandHandler, CommandResult, CommandType,
};
use crate::config::ServerConfig;
use crate::model::{Cdr, Location, PartyRef, Session, Tariff, Token};
use crate::store::ModuleStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared state for the party server: one store per module, the access
/// binding registry, and the command dispatcher. Stores are independently
/// locked; nothing here holds a lock across an await.
pub struct AppState {
    config: Arc<ServerConfig>,
    locations: ModuleStore<Location>,
    tariffs: ModuleStore<Tariff>,
    sessions: Arc<ModuleStore<Session>>,
    cdrs: ModuleStore<Cdr>,
    tokens: ModuleStore<Token>,
    bindings: TokenRegistry,
    dispatcher: CommandDispatcher,
    shutdown_token: CancellationToken,
    requests: AtomicU64,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>, shutdown_token: CancellationToken) -> Result<Self> {
        let bindings = match config.tokens_file.as_ref() {
            Some(path) => TokenRegistry::load_file(path)
                .with_context(|| format!("loading access bindings from {:?}", path))?,
            None => TokenRegistry::new(),
        };

        let sessions = Arc::new(ModuleStore::new());
        let dispatcher =
            CommandDispatcher::new(Duration::from_secs(config.command_timeout_secs));
        dispatcher.register(
            CommandType::StopSession,
            Arc::new(StopSessionHandler {
                sessions: sessions.clone(),
            }),
        );

        Ok(Self {
            config,
            locations: ModuleStore::new(),
            tariffs: ModuleStore::new(),
            sessions,
            cdrs: ModuleStore::new(),
            tokens: ModuleStore::new(),
            bindings,
            dispatcher,
            shutdown_token,
            requests: AtomicU64::new(0),
            started_at: Instant::now(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn locations(&self) -> &ModuleStore<Location> {
        &self.locations
    }

    pub fn tariffs(&self) -> &ModuleStore<Tariff> {
        &self.tariffs
    }

    pub fn sessions(&self) -> &ModuleStore<Session> {
        &self.sessions
    }

    pub fn cdrs(&self) -> &ModuleStore<Cdr> {
        &self.cdrs
    }

    pub fn tokens(&self) -> &ModuleStore<Token> {
        &self.tokens
    }

    pub fn bindings(&self) -> &TokenRegistry {
        &self.bindings
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Per-request cancellation token, tied to process shutdown.
    pub fn request_token(&self) -> CancellationToken {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.shutdown_token.child_token()
    }

    /// Effective downgrade policy for one call: the request-level override
    /// wins, the configured default applies otherwise.
    pub fn allow_downgrades(&self, request_override: Option<bool>) -> bool {
        request_override.unwrap_or(self.config.allow_downgrades)
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn stored_resource_count(&self) -> usize {
        self.locations.len()
            + self.tariffs.len()
            + self.sessions.len()
            + self.cdrs.len()
            + self.tokens.len()
    }
}

/// Built-in STOP_SESSION handler: acknowledges when the session exists in
/// the canonical store, answers UNKNOWN_SESSION otherwise. Runs without any
/// lock held by the dispatcher, so the store read here cannot deadlock.
struct StopSessionHandler {
    sessions: Arc<ModuleStore<Session>>,
}

#[async_trait]
impl CommandHandler for StopSessionHandler {
    async fn handle(&self, command: Command, from: PartyRef) -> Result<CommandResult> {
        let Command::StopSession(stop) = command else {
            anyhow::bail!("handler registered for STOP_SESSION got {:?}", command);
        };
        let known = self
            .sessions
            .find(|session| session.id == stop.session_id)
            .is_some();
        debug!(session_id = %stop.session_id, from = %from, known, "stop session requested");
        Ok(if known {
            CommandResult::Accepted
        } else {
            CommandResult::UnknownSession
        })
    }
}
