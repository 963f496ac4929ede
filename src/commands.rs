//! Asynchronous command dispatch.
//!
//! A command is an ephemeral request one party submits against another
//! party's infrastructure (start a session, unlock a connector). The
//! dispatcher invokes the single registered handler for the command type
//! under a hard timeout and always answers: NOT_SUPPORTED when nothing is
//! registered, TIMEOUT when the handler does not respond in time (the late
//! result is discarded). The response is an acknowledgement that dispatch
//! happened, not a guarantee the physical action completed; the timeout
//! value is echoed so the caller knows how long any out-of-band follow-up
//! may take.

use crate::model::{ConnectorId, EvseUid, LocationId, PartyRef, SessionId, TokenUid};
use crate::utils::make_short_random_id;
use ahash::AHashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    StartSession,
    StopSession,
    ReserveNow,
    CancelReservation,
    UnlockConnector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSession {
    pub token_uid: TokenUid,
    pub location_id: LocationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_uid: Option<EvseUid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopSession {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveNow {
    pub token_uid: TokenUid,
    pub expiry_date: DateTime<Utc>,
    pub reservation_id: String,
    pub location_id: LocationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evse_uid: Option<EvseUid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelReservation {
    pub reservation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockConnector {
    pub location_id: LocationId,
    pub evse_uid: EvseUid,
    pub connector_id: ConnectorId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartSession(StartSession),
    StopSession(StopSession),
    ReserveNow(ReserveNow),
    CancelReservation(CancelReservation),
    UnlockConnector(UnlockConnector),
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::StartSession(_) => CommandType::StartSession,
            Command::StopSession(_) => CommandType::StopSession,
            Command::ReserveNow(_) => CommandType::ReserveNow,
            Command::CancelReservation(_) => CommandType::CancelReservation,
            Command::UnlockConnector(_) => CommandType::UnlockConnector,
        }
    }

    /// Parse the type-specific payload. A failure here is answered with a
    /// REJECTED response carrying the diagnostic; dispatch never happens.
    pub fn parse(command_type: CommandType, body: Value) -> Result<Self, String> {
        let result = match command_type {
            CommandType::StartSession => {
                serde_json::from_value(body).map(Command::StartSession)
            }
            CommandType::StopSession => serde_json::from_value(body).map(Command::StopSession),
            CommandType::ReserveNow => serde_json::from_value(body).map(Command::ReserveNow),
            CommandType::CancelReservation => {
                serde_json::from_value(body).map(Command::CancelReservation)
            }
            CommandType::UnlockConnector => {
                serde_json::from_value(body).map(Command::UnlockConnector)
            }
        };
        result.map_err(|e| format!("invalid {command_type} payload: {e}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandResult {
    Accepted,
    Rejected,
    NotSupported,
    UnknownSession,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub result: CommandResult,
    /// Seconds the caller should wait for any out-of-band follow-up.
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResponse {
    fn new(result: CommandResult, timeout: Duration) -> Self {
        Self {
            result,
            timeout: timeout.as_secs(),
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One handler per command type. The handler owns any outbound work (e.g.
/// forwarding to the charge point); everything it does is bounded by the
/// dispatch timeout.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command, from: PartyRef) -> anyhow::Result<CommandResult>;
}

pub struct CommandDispatcher {
    handlers: RwLock<AHashMap<CommandType, Arc<dyn CommandHandler>>>,
    timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            handlers: RwLock::new(AHashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register the handler for a command type, replacing any previous one.
    pub fn register(&self, command_type: CommandType, handler: Arc<dyn CommandHandler>) {
        let mut handlers = self.handlers.write();
        if handlers.insert(command_type, handler).is_some() {
            info!(command = %command_type, "command handler replaced");
        } else {
            debug!(command = %command_type, "command handler registered");
        }
    }

    pub async fn dispatch(&self, command: Command, from: PartyRef) -> CommandResponse {
        let command_type = command.command_type();
        let reference = make_short_random_id("cmd", 8);

        // Clone the handler out so no registry lock is held across the
        // await; the handler may itself need the resource store.
        let handler = {
            let handlers = self.handlers.read();
            handlers.get(&command_type).cloned()
        };

        let Some(handler) = handler else {
            debug!(command = %command_type, reference, "no handler registered");
            crate::metrics::METRICS.record_command(command_type, "not_supported");
            return CommandResponse::new(CommandResult::NotSupported, self.timeout);
        };

        debug!(command = %command_type, from = %from, reference, "dispatching");
        match tokio::time::timeout(self.timeout, handler.handle(command, from)).await {
            Ok(Ok(result)) => {
                debug!(command = %command_type, reference, ?result, "handler responded");
                crate::metrics::METRICS.record_command(command_type, "responded");
                CommandResponse::new(result, self.timeout)
            }
            Ok(Err(error)) => {
                warn!(command = %command_type, reference, %error, "handler failed");
                crate::metrics::METRICS.record_command(command_type, "failed");
                CommandResponse::new(CommandResult::Rejected, self.timeout)
                    .with_message(error.to_string())
            }
            Err(_elapsed) => {
                // Distinct from NOT_SUPPORTED in the logs; the late handler
                // result, if any, is dropped with the future.
                warn!(
                    command = %command_type,
                    reference,
                    timeout_secs = self.timeout.as_secs(),
                    "handler timed out"
                );
                crate::metrics::METRICS.record_command(command_type, "timeout");
                CommandResponse::new(CommandResult::Timeout, self.timeout)
            }
        }
    }

    pub fn rejected(&self, diagnostic: impl Into<String>) -> CommandResponse {
        CommandResponse::new(CommandResult::Rejected, self.timeout).with_message(diagnostic)
    }
}
