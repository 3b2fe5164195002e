//! End-to-end dialog scenarios against in-memory collaborators.

use super::*;
use crate::error::{HookError, StoreResult};
use crate::record::{Project, Record};
use crate::store::MemoryRecordStore;
use crate::testing::{
    FailingTransport, FixedClock, RecordingTransport, SentKind, UnavailableRecordStore,
};
use crate::value::PhotoRef;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const OWNER: OwnerId = 42;

/// Record store counting saves.
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

/// Hook that acknowledges through the same transport, to check ordering.
struct CongratulatingHook {
    transport: Arc<RecordingTransport>,
}

#[async_trait]
impl CommitHook for CongratulatingHook {
    fn name(&self) -> &str {
        "congratulating"
    }

    async fn on_record_committed(
        &self,
        owner: OwnerId,
        _kind: RecordKind,
        _record: &Record,
    ) -> Result<(), HookError> {
        self.transport.acknowledge(owner, "🎉").await?;
        Ok(())
    }
}

struct Harness {
    engine: DialogEngine,
    transport: Arc<RecordingTransport>,
    records: Arc<CountingStore>,
}

impl Harness {
    fn new() -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let records = Arc::new(CountingStore::default());
        let engine = DialogEngine::builder()
            .records(records.clone())
            .transport(transport.clone())
            .clock(Arc::new(FixedClock::at_noon(2025, 3, 10)))
            .build()
            .unwrap();
        Self {
            engine,
            transport,
            records,
        }
    }

    async fn text(&self, content: &str) -> Outcome {
        self.engine
            .handle(InboundEvent::text(OWNER, content))
            .await
            .unwrap()
    }

    async fn button(&self, token: &str) -> Outcome {
        self.engine
            .handle(InboundEvent::button(OWNER, token))
            .await
            .unwrap()
    }

    async fn session(&self) -> Option<Session> {
        self.engine.session(OWNER).await.unwrap()
    }

    async fn stored(&self, kind: RecordKind) -> Vec<Record> {
        self.records.list(OWNER, kind).await.unwrap()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

// ============================================================================
// AddEntry walk-through
// ============================================================================

#[tokio::test]
async fn test_free_text_without_session_is_unhandled() {
    let h = Harness::new();
    assert!(matches!(h.text("254.5").await, Outcome::Unhandled));
    assert!(h.transport.sent().is_empty());
    assert!(h.session().await.is_none());
}

#[tokio::test]
async fn test_date_answer_advances_to_count() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddEntry).await.unwrap();

    let outcome = h.text("сегодня").await;
    assert!(matches!(
        outcome,
        Outcome::Advanced {
            flow: FlowType::AddEntry,
            step: 1
        }
    ));
    let session = h.session().await.unwrap();
    assert_eq!(session.fields.date("date").unwrap(), today());

    let prompt = h.transport.last().unwrap();
    assert_eq!(prompt.kind, SentKind::Prompt);
    assert!(prompt.text.starts_with("✅ Дата: 10 марта 2025"));
}

#[tokio::test]
async fn test_negative_count_is_rejected_without_mutation() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddEntry).await.unwrap();
    h.text("сегодня").await;
    let before = h.session().await.unwrap();

    let outcome = h.text("-5").await;
    let Outcome::Retry { step, hint, .. } = outcome else {
        panic!("expected retry, got {outcome:?}");
    };
    assert_eq!(step, 1);
    assert!(hint.contains("положительное"));
    assert_eq!(h.session().await.unwrap(), before);

    let reprompt = h.transport.last().unwrap();
    assert!(reprompt.text.starts_with("❌ Введите положительное число"));
    assert!(reprompt.text.contains("Введите количество крестиков"));
    assert!(reprompt.has_button(CANCEL_TOKEN));
}

#[tokio::test]
async fn test_skipping_hashtag_commits_once() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddEntry).await.unwrap();
    h.text("сегодня").await;
    assert!(matches!(h.text("300").await, Outcome::Advanced { step: 2, .. }));
    assert!(h.transport.last().unwrap().has_button("entry_hashtag_skip"));

    let outcome = h.button("entry_hashtag_skip").await;
    assert!(matches!(
        outcome,
        Outcome::Completed {
            flow: FlowType::AddEntry,
            kind: RecordKind::Entry
        }
    ));
    assert_eq!(h.records.saves.load(Ordering::SeqCst), 1);
    assert!(h.session().await.is_none());

    let stored = h.stored(RecordKind::Entry).await;
    let [Record::Entry(entry)] = stored.as_slice() else {
        panic!("expected one entry, got {stored:?}");
    };
    assert_eq!(entry.date, today());
    assert!((entry.count - 300.0).abs() < f64::EPSILON);
    assert_eq!(entry.hashtag, None);

    let ack = h.transport.last().unwrap();
    assert_eq!(ack.kind, SentKind::Ack);
    assert_eq!(ack.text, "✅ Записано: 300 за 10 марта 2025");
}

#[tokio::test]
async fn test_typed_skip_and_hashtag_normalization() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddEntry).await.unwrap();
    h.button("entry_date_yesterday").await;
    h.text("254.5").await;
    h.text("#Fox").await;

    let stored = h.stored(RecordKind::Entry).await;
    let [Record::Entry(entry)] = stored.as_slice() else {
        panic!("expected one entry, got {stored:?}");
    };
    assert_eq!(entry.date, NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
    assert_eq!(entry.hashtag.as_deref(), Some("fox"));
}

#[tokio::test]
async fn test_starting_another_flow_discards_fields() {
    let h = Harness::new();
    let router = h.engine.router();
    router.start(OWNER, FlowType::AddEntry).await.unwrap();
    h.text("сегодня").await;

    router.start(OWNER, FlowType::AddProject).await.unwrap();
    let outcome = h.text("300").await;
    assert!(matches!(
        outcome,
        Outcome::Advanced {
            flow: FlowType::AddProject,
            step: 1
        }
    ));
    let session = h.session().await.unwrap();
    assert_eq!(session.fields.text("name").unwrap(), "300");
    assert!(!session.fields.contains("date"));
}

// ============================================================================
// Cancel
// ============================================================================

#[tokio::test]
async fn test_cancel_from_every_step() {
    let h = Harness::new();
    let router = h.engine.router();
    for flow in FlowType::ALL {
        if flow == FlowType::ReplaceProjectPhoto {
            continue;
        }
        router.start(OWNER, flow).await.unwrap();
        let outcome = h.button(CANCEL_TOKEN).await;
        assert!(matches!(outcome, Outcome::Cancelled { flow: Some(f) } if f == flow));
        assert!(h.session().await.is_none());
        assert_eq!(h.transport.last().unwrap().text, CANCELLED_TEXT);
    }
    assert_eq!(h.records.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_command_mid_dialog() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddPlan).await.unwrap();
    h.text("Лиса").await;
    let outcome = h.text("/cancel").await;
    assert!(matches!(
        outcome,
        Outcome::Cancelled {
            flow: Some(FlowType::AddPlan)
        }
    ));
    assert!(h.session().await.is_none());
}

// ============================================================================
// Other flows
// ============================================================================

#[tokio::test]
async fn test_project_with_photo_and_hashtag() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddProject).await.unwrap();
    h.text("Лиса").await;

    // Text on a photo step is not consumed unless it is the skip word
    assert!(matches!(h.text("красивая").await, Outcome::Unhandled));
    let outcome = h
        .engine
        .handle(InboundEvent::photo(OWNER, "file-7"))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Advanced { step: 2, .. }));
    h.text("#Fox").await;

    let stored = h.stored(RecordKind::Project).await;
    let [Record::Project(project)] = stored.as_slice() else {
        panic!("expected one project, got {stored:?}");
    };
    assert_eq!(project.name, "Лиса");
    assert_eq!(project.photo, Some(PhotoRef::new("file-7")));
    assert_eq!(project.hashtag.as_deref(), Some("Fox"));
}

#[tokio::test]
async fn test_project_photo_skipped_by_word() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddProject).await.unwrap();
    h.text("Лиса").await;
    assert!(matches!(h.text("Пропустить").await, Outcome::Advanced { step: 2, .. }));
    assert!(matches!(h.text("skip").await, Outcome::Completed { .. }));

    let stored = h.stored(RecordKind::Project).await;
    let [Record::Project(project)] = stored.as_slice() else {
        panic!("expected one project, got {stored:?}");
    };
    assert_eq!(project.photo, None);
    assert_eq!(project.hashtag, None);
}

#[tokio::test]
async fn test_delete_entry_requires_existing_day() {
    let h = Harness::new();
    let router = h.engine.router();
    router.start(OWNER, FlowType::AddEntry).await.unwrap();
    h.text("сегодня").await;
    h.text("10").await;
    h.button("entry_hashtag_skip").await;

    router.start(OWNER, FlowType::DeleteEntry).await.unwrap();
    let outcome = h.text("09.03.2025").await;
    let Outcome::Retry { hint, .. } = outcome else {
        panic!("expected retry, got {outcome:?}");
    };
    assert_eq!(hint, "Нет записи за 09.03.2025");

    let outcome = h.button("delete_date_today").await;
    assert!(matches!(
        outcome,
        Outcome::Completed {
            kind: RecordKind::EntryRemoval,
            ..
        }
    ));
    assert!(h.stored(RecordKind::Entry).await.is_empty());
}

#[tokio::test]
async fn test_wishlist_link_is_normalized() {
    let h = Harness::new();
    h.engine
        .router()
        .start(OWNER, FlowType::AddWishlistItem)
        .await
        .unwrap();
    h.text("Пяльцы").await;
    assert!(matches!(h.text("не ссылка").await, Outcome::Retry { .. }));
    h.text("www.ozon.ru/item").await;

    let stored = h.stored(RecordKind::WishlistItem).await;
    let [Record::WishlistItem(item)] = stored.as_slice() else {
        panic!("expected one item, got {stored:?}");
    };
    assert_eq!(item.link.as_deref(), Some("https://www.ozon.ru/item"));
    assert_eq!(item.created_on, today());
    assert!(!item.completed);
}

#[tokio::test]
async fn test_note_flow() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddNote).await.unwrap();
    assert!(matches!(h.text("   ").await, Outcome::Retry { step: 0, .. }));
    h.text("Идея").await;
    assert!(matches!(
        h.text("Вышить лису").await,
        Outcome::Completed {
            kind: RecordKind::Note,
            ..
        }
    ));
    assert_eq!(
        h.transport.last().unwrap().text,
        "✅ Заметка «Идея» сохранена"
    );
}

#[tokio::test]
async fn test_plan_flow_with_all_fields() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddPlan).await.unwrap();
    h.text("Лиса").await;
    assert!(matches!(h.text("10.5").await, Outcome::Retry { step: 1, .. }));
    h.text("5000").await;
    h.text("#Fox").await;
    h.text("31.12.2025").await;

    let stored = h.stored(RecordKind::Plan).await;
    let [Record::Plan(plan)] = stored.as_slice() else {
        panic!("expected one plan, got {stored:?}");
    };
    assert_eq!(plan.target_count, 5000);
    assert_eq!(plan.hashtag.as_deref(), Some("fox"));
    assert_eq!(plan.target_date, NaiveDate::from_ymd_opt(2025, 12, 31));
}

#[tokio::test]
async fn test_replace_project_photo() {
    let h = Harness::new();
    h.records
        .save(
            OWNER,
            Record::Project(Project {
                id: "project-1".into(),
                name: "Лиса".into(),
                photo: None,
                hashtag: None,
            }),
        )
        .await
        .unwrap();

    h.engine
        .router()
        .start_with(
            OWNER,
            FlowType::ReplaceProjectPhoto,
            crate::flow::project_photo_seed("project-1"),
        )
        .await
        .unwrap();
    let outcome = h
        .engine
        .handle(InboundEvent::photo(OWNER, "file-9"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Completed {
            kind: RecordKind::ProjectPhoto,
            ..
        }
    ));

    let stored = h.stored(RecordKind::Project).await;
    let [Record::Project(project)] = stored.as_slice() else {
        panic!("expected one project, got {stored:?}");
    };
    assert_eq!(project.photo, Some(PhotoRef::new("file-9")));
}

#[tokio::test]
async fn test_replace_photo_of_missing_project_fails_commit() {
    let h = Harness::new();
    h.engine
        .router()
        .start_with(
            OWNER,
            FlowType::ReplaceProjectPhoto,
            crate::flow::project_photo_seed("project-404"),
        )
        .await
        .unwrap();
    let outcome = h
        .engine
        .handle(InboundEvent::photo(OWNER, "file-9"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::CommitFailed {
            error: CommitError::Store(_),
            ..
        }
    ));
    assert!(h.session().await.is_none());
    assert_eq!(h.transport.last().unwrap().text, COMMIT_FAILED_TEXT);
}

// ============================================================================
// Failures and hooks
// ============================================================================

#[tokio::test]
async fn test_commit_failure_clears_session_and_informs_user() {
    let transport = Arc::new(RecordingTransport::new());
    let engine = DialogEngine::builder()
        .records(Arc::new(UnavailableRecordStore))
        .transport(transport.clone())
        .build()
        .unwrap();

    engine.router().start(OWNER, FlowType::AddNote).await.unwrap();
    engine.handle(InboundEvent::text(OWNER, "Идея")).await.unwrap();
    let outcome = engine
        .handle(InboundEvent::text(OWNER, "Текст"))
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::CommitFailed { .. }));
    assert!(engine.session(OWNER).await.unwrap().is_none());
    let ack = transport.last().unwrap();
    assert_eq!(ack.kind, SentKind::Ack);
    assert_eq!(ack.text, COMMIT_FAILED_TEXT);
}

#[tokio::test]
async fn test_delivery_failure_does_not_roll_back() {
    let engine = DialogEngine::builder()
        .records(Arc::new(MemoryRecordStore::new()))
        .transport(Arc::new(FailingTransport))
        .build()
        .unwrap();

    let outcome = engine.router().start(OWNER, FlowType::AddNote).await.unwrap();
    assert!(matches!(outcome, Outcome::Started { .. }));
    let outcome = engine
        .handle(InboundEvent::text(OWNER, "Идея"))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Advanced { step: 1, .. }));
    assert_eq!(engine.session(OWNER).await.unwrap().unwrap().step, 1);

    let outcome = engine
        .handle(InboundEvent::text(OWNER, "/cancel"))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Cancelled { .. }));
    assert!(engine.session(OWNER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_hooks_run_after_summary_for_entries_only() {
    let transport = Arc::new(RecordingTransport::new());
    let engine = DialogEngine::builder()
        .records(Arc::new(MemoryRecordStore::new()))
        .transport(transport.clone())
        .hook(Arc::new(CongratulatingHook {
            transport: transport.clone(),
        }))
        .build()
        .unwrap();

    engine.router().start(OWNER, FlowType::AddEntry).await.unwrap();
    for text in ["сегодня", "100", "skip"] {
        engine.handle(InboundEvent::text(OWNER, text)).await.unwrap();
    }
    let acks: Vec<_> = transport
        .sent()
        .into_iter()
        .filter(|s| s.kind == SentKind::Ack)
        .map(|s| s.text)
        .collect();
    assert_eq!(acks.len(), 2);
    assert!(acks[0].starts_with("✅ Записано: 100"));
    assert_eq!(acks[1], "🎉");

    transport.clear();
    engine.router().start(OWNER, FlowType::AddNote).await.unwrap();
    for text in ["Идея", "Текст"] {
        engine.handle(InboundEvent::text(OWNER, text)).await.unwrap();
    }
    assert!(!transport.sent().iter().any(|s| s.text == "🎉"));
}

#[tokio::test]
async fn test_owners_are_independent() {
    let h = Harness::new();
    let router = h.engine.router();
    router.start(1, FlowType::AddNote).await.unwrap();
    router.start(2, FlowType::AddEntry).await.unwrap();

    h.engine.handle(InboundEvent::text(1, "Идея")).await.unwrap();
    let outcome = h.engine.handle(InboundEvent::text(2, "Идея")).await.unwrap();
    assert!(matches!(outcome, Outcome::Retry { .. }));

    assert_eq!(h.engine.session(1).await.unwrap().unwrap().step, 1);
    assert_eq!(h.engine.session(2).await.unwrap().unwrap().step, 0);
}

#[tokio::test]
async fn test_concurrent_events_of_one_owner_are_ordered() {
    let h = Harness::new();
    h.engine.router().start(OWNER, FlowType::AddNote).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();
    for text in ["Идея", "Текст"] {
        let engine = h.engine.clone();
        let seen = Arc::clone(&seen);
        tasks.push(tokio::spawn(async move {
            let outcome = engine.handle(InboundEvent::text(OWNER, text)).await.unwrap();
            seen.lock().unwrap().push(outcome.is_handled());
        }));
        tokio::task::yield_now().await;
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(*seen.lock().unwrap(), [true, true]);
    assert_eq!(h.records.saves.load(Ordering::SeqCst), 1);
    assert!(h.session().await.is_none());
}
