//! Command dispatcher: handler timeout, fallback synthesis, and the
//! built-in STOP_SESSION wiring.

mod common;

use async_trait::async_trait;
use common::{party, seed, session, state, ts};
use ocpi_node::commands::{
    Command, CommandDispatcher, CommandHandler, CommandResult, CommandType, StopSession,
    UnlockConnector,
};
use ocpi_node::model::{ConnectorId, EvseUid, LocationId, PartyRef, SessionId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

struct SlowAccept {
    completed: Arc<AtomicBool>,
    delay: Duration,
}

#[async_trait]
impl CommandHandler for SlowAccept {
    async fn handle(&self, _: Command, _: PartyRef) -> anyhow::Result<CommandResult> {
        tokio::time::sleep(self.delay).await;
        self.completed.store(true, Ordering::SeqCst);
        Ok(CommandResult::Accepted)
    }
}

fn unlock() -> Command {
    Command::UnlockConnector(UnlockConnector {
        location_id: LocationId("LOC1".into()),
        evse_uid: EvseUid("E1".into()),
        connector_id: ConnectorId("1".into()),
    })
}

#[tokio::test(start_paused = true)]
async fn late_handler_result_is_discarded() {
    let completed = Arc::new(AtomicBool::new(false));
    let dispatcher = CommandDispatcher::new(Duration::from_secs(1));
    dispatcher.register(
        CommandType::UnlockConnector,
        Arc::new(SlowAccept {
            completed: completed.clone(),
            delay: Duration::from_secs(10),
        }),
    );

    let response = dispatcher.dispatch(unlock(), party("NL", "EMS")).await;
    assert_eq!(response.result, CommandResult::Timeout);
    assert_eq!(response.timeout, 1);

    // The handler future was dropped at the deadline; its work never ran to
    // completion even after the original delay would have elapsed.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!completed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn timeout_is_echoed_on_not_supported() {
    let dispatcher = CommandDispatcher::new(Duration::from_secs(42));
    let response = dispatcher.dispatch(unlock(), party("NL", "EMS")).await;
    assert_eq!(response.result, CommandResult::NotSupported);
    assert_eq!(response.timeout, 42);
    assert!(response.message.is_none());
}

#[tokio::test]
async fn replacing_a_handler_keeps_one_per_type() {
    struct Fixed(CommandResult);

    #[async_trait]
    impl CommandHandler for Fixed {
        async fn handle(&self, _: Command, _: PartyRef) -> anyhow::Result<CommandResult> {
            Ok(self.0)
        }
    }

    let dispatcher = CommandDispatcher::new(Duration::from_secs(30));
    dispatcher.register(
        CommandType::UnlockConnector,
        Arc::new(Fixed(CommandResult::Rejected)),
    );
    dispatcher.register(
        CommandType::UnlockConnector,
        Arc::new(Fixed(CommandResult::Accepted)),
    );

    let response = dispatcher.dispatch(unlock(), party("NL", "EMS")).await;
    assert_eq!(response.result, CommandResult::Accepted);
}

#[tokio::test]
async fn builtin_stop_session_checks_the_store() {
    let state = state();
    seed(
        state.sessions(),
        session("DE", "ABC", "S1", ts("2024-01-01T00:00:00Z")),
    );

    let known = state
        .dispatcher()
        .dispatch(
            Command::StopSession(StopSession {
                session_id: SessionId("S1".into()),
            }),
            party("NL", "EMS"),
        )
        .await;
    assert_eq!(known.result, CommandResult::Accepted);

    let unknown = state
        .dispatcher()
        .dispatch(
            Command::StopSession(StopSession {
                session_id: SessionId("S404".into()),
            }),
            party("NL", "EMS"),
        )
        .await;
    assert_eq!(unknown.result, CommandResult::UnknownSession);
}

#[test]
fn rejected_synthesis_carries_the_diagnostic() {
    let dispatcher = CommandDispatcher::new(Duration::from_secs(30));
    let response = dispatcher.rejected("invalid START_SESSION payload: missing token_uid");
    assert_eq!(response.result, CommandResult::Rejected);
    assert_eq!(
        response.message.as_deref(),
        Some("invalid START_SESSION payload: missing token_uid")
    );
}
