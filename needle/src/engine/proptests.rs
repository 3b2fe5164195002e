//! Property-based tests for the dialog engine
//!
//! Random interleavings of starts, answers, button presses and cancels from
//! a few owners must keep the session and commit invariants.

use super::*;
use crate::error::StoreResult;
use crate::flow::project_photo_seed;
use crate::record::Record;
use crate::store::MemoryRecordStore;
use crate::testing::{FixedClock, RecordingTransport};
use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Default)]
struct CountingStore {
    inner: MemoryRecordStore,
    saves: AtomicUsize,
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn save(&self, owner: OwnerId, record: Record) -> StoreResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(owner, record).await
    }

    async fn list(&self, owner: OwnerId, kind: RecordKind) -> StoreResult<Vec<Record>> {
        self.inner.list(owner, kind).await
    }
}

#[derive(Debug, Clone)]
enum Action {
    Start(OwnerId, FlowType),
    Event(InboundEvent),
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn engine(records: Arc<CountingStore>) -> DialogEngine {
    DialogEngine::builder()
        .records(records)
        .transport(Arc::new(RecordingTransport::new()))
        .clock(Arc::new(FixedClock::at_noon(2025, 3, 10)))
        .build()
        .unwrap()
}

async fn start(engine: &DialogEngine, owner: OwnerId, flow: FlowType) {
    let router = engine.router();
    let started = if flow == FlowType::ReplaceProjectPhoto {
        router
            .start_with(owner, flow, project_photo_seed("project-1"))
            .await
    } else {
        router.start(owner, flow).await
    };
    assert!(matches!(started, Ok(Outcome::Started { .. })));
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_owner() -> impl Strategy<Value = OwnerId> {
    1i64..4
}

fn arb_flow() -> impl Strategy<Value = FlowType> {
    proptest::sample::select(FlowType::ALL.to_vec())
}

fn arb_text() -> BoxedStrategy<String> {
    prop_oneof![
        proptest::sample::select(vec![
            "сегодня",
            "вчера",
            "300",
            "254.5",
            "-5",
            "0",
            "#fox",
            "skip",
            "пропустить",
            "10.03.2025",
            "31.02.2025",
            "www.ozon.ru/item",
            "/start",
            "",
        ])
        .prop_map(String::from),
        "[a-z0-9 .#-]{0,12}",
    ]
    .boxed()
}

fn arb_token() -> impl Strategy<Value = String> {
    proptest::sample::select(vec![
        "entry_date_today",
        "entry_date_yesterday",
        "entry_hashtag_skip",
        "project_photo_skip",
        "project_hashtag_skip",
        "delete_date_today",
        "wishlist_link_skip",
        "plan_hashtag_skip",
        "plan_target_date_skip",
        "main_menu",
    ])
    .prop_map(String::from)
}

fn arb_event() -> impl Strategy<Value = InboundEvent> {
    prop_oneof![
        4 => (arb_owner(), arb_text()).prop_map(|(o, t)| InboundEvent::text(o, t)),
        2 => (arb_owner(), arb_token()).prop_map(|(o, t)| InboundEvent::button(o, t)),
        1 => arb_owner().prop_map(|o| InboundEvent::photo(o, "file-1")),
        1 => arb_owner().prop_map(|o| InboundEvent::button(o, CANCEL_TOKEN)),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        1 => (arb_owner(), arb_flow()).prop_map(|(o, f)| Action::Start(o, f)),
        5 => arb_event().prop_map(Action::Event),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Rejected and foreign inputs leave the session untouched; accepted ones
    // move it exactly one step.
    #[test]
    fn prop_session_changes_only_on_accepted_input(
        actions in proptest::collection::vec(arb_action(), 0..40)
    ) {
        runtime().block_on(async {
            let engine = engine(Arc::new(CountingStore::default()));
            for action in actions {
                match action {
                    Action::Start(owner, flow) => {
                        start(&engine, owner, flow).await;
                        let session = engine.session(owner).await.unwrap().unwrap();
                        prop_assert_eq!(session.step, 0);
                        prop_assert_eq!(session.flow, flow);
                    }
                    Action::Event(event) => {
                        let owner = event.owner;
                        let before = engine.session(owner).await.unwrap();
                        let outcome = engine.handle(event).await.unwrap();
                        let after = engine.session(owner).await.unwrap();
                        match outcome {
                            Outcome::Unhandled | Outcome::Retry { .. } => {
                                prop_assert_eq!(before, after);
                            }
                            Outcome::Advanced { step, .. } => {
                                let before = before.unwrap();
                                let after = after.unwrap();
                                prop_assert_eq!(after.step, before.step + 1);
                                prop_assert_eq!(after.step, step);
                                prop_assert_eq!(after.flow, before.flow);
                            }
                            Outcome::Completed { .. }
                            | Outcome::CommitFailed { .. }
                            | Outcome::Cancelled { .. } => {
                                prop_assert!(after.is_none());
                            }
                            Outcome::Started { .. } => {
                                prop_assert!(false, "handle never starts a session");
                            }
                        }
                    }
                }
            }
            Ok(())
        })?;
    }

    // Cancel succeeds from any reachable state and always clears the session.
    #[test]
    fn prop_cancel_always_succeeds(
        actions in proptest::collection::vec(arb_action(), 0..30),
        owner in arb_owner(),
        by_command in any::<bool>()
    ) {
        runtime().block_on(async {
            let engine = engine(Arc::new(CountingStore::default()));
            for action in actions {
                match action {
                    Action::Start(o, flow) => start(&engine, o, flow).await,
                    Action::Event(event) => {
                        engine.handle(event).await.unwrap();
                    }
                }
            }
            let active = engine.session(owner).await.unwrap().map(|s| s.flow);
            let event = if by_command {
                InboundEvent::text(owner, "/cancel")
            } else {
                InboundEvent::button(owner, CANCEL_TOKEN)
            };
            let outcome = engine.handle(event).await.unwrap();
            prop_assert!(
                matches!(outcome, Outcome::Cancelled { flow } if flow == active),
                "unexpected outcome {:?}",
                outcome
            );
            prop_assert!(engine.session(owner).await.unwrap().is_none());
            Ok(())
        })?;
    }

    // Every completion saves exactly once; nothing else touches the store.
    #[test]
    fn prop_one_save_per_completion(
        actions in proptest::collection::vec(arb_action(), 0..60)
    ) {
        runtime().block_on(async {
            let records = Arc::new(CountingStore::default());
            let engine = engine(records.clone());
            let mut finished = 0;
            for action in actions {
                match action {
                    Action::Start(o, flow) => start(&engine, o, flow).await,
                    Action::Event(event) => match engine.handle(event).await.unwrap() {
                        Outcome::Completed { .. }
                        | Outcome::CommitFailed { error: CommitError::Store(_), .. } => {
                            finished += 1;
                        }
                        _ => {}
                    },
                }
            }
            prop_assert_eq!(records.saves.load(Ordering::SeqCst), finished);
            Ok(())
        })?;
    }

    // An owner never holds more than one session, and no session points past
    // the end of its flow.
    #[test]
    fn prop_single_session_per_owner(
        actions in proptest::collection::vec(arb_action(), 0..40)
    ) {
        runtime().block_on(async {
            let engine = engine(Arc::new(CountingStore::default()));
            for action in actions {
                match action {
                    Action::Start(o, flow) => start(&engine, o, flow).await,
                    Action::Event(event) => {
                        engine.handle(event).await.unwrap();
                    }
                }
                let mut live = 0;
                for owner in 1..4 {
                    if let Some(session) = engine.session(owner).await.unwrap() {
                        live += 1;
                        let definition = engine.registry().get(session.flow).unwrap();
                        prop_assert!(!definition.is_complete(session.step));
                    }
                }
                prop_assert_eq!(engine.sessions().len().await.unwrap(), live);
            }
            Ok(())
        })?;
    }
}
