use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use protocol_seating::config::SeatingConfig;
use protocol_seating::layout::{AssignError, ShapeSource};
use protocol_seating::models::{Event, EventPatch, Guest, GuestPatch, GuestStatus, NewEvent, NewGuest};
use protocol_seating::services::{SeatingService, ServiceError};
use protocol_seating::session::SessionError;
use protocol_seating::storage::{DynStorage, EventStore, GuestStore, MemoryStore, StorageError, StorageResult};

struct Fixture {
    store: Arc<MemoryStore>,
    service: SeatingService,
    event_id: String,
}

fn forum(title: &str) -> NewEvent {
    NewEvent {
        title: title.into(),
        date: Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap(),
        location: "Seoul".into(),
        description: None,
        status: Default::default(),
    }
}

async fn fixture(config: SeatingConfig) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: DynStorage = store.clone();
    let service = SeatingService::new(dyn_store, &config);
    let event = service.create_event(forum("Korea-Kazakhstan Business Forum")).await.unwrap();
    Fixture { store, service, event_id: event.id }
}

/// Хранилище в памяти с медленной записью гостей и (по флагу) медленным чтением мероприятий.
struct SlowStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
    slow_reads: AtomicBool,
}

#[async_trait]
impl GuestStore for SlowStore {
    async fn list_guests(&self, event_id: &str) -> StorageResult<Vec<Guest>> {
        self.inner.list_guests(event_id).await
    }

    async fn create_guest(&self, guest: &Guest) -> StorageResult<()> {
        self.inner.create_guest(guest).await
    }

    async fn create_guests(&self, guests: &[Guest]) -> StorageResult<()> {
        self.inner.create_guests(guests).await
    }

    async fn update_guest(&self, id: &str, patch: &GuestPatch) -> StorageResult<Guest> {
        tokio::time::sleep(self.delay).await;
        self.inner.update_guest(id, patch).await
    }

    async fn delete_guest(&self, id: &str) -> StorageResult<()> {
        self.inner.delete_guest(id).await
    }
}

#[async_trait]
impl EventStore for SlowStore {
    async fn list_events(&self) -> StorageResult<Vec<Event>> {
        self.inner.list_events().await
    }

    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>> {
        if self.slow_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.get_event(id).await
    }

    async fn create_event(&self, event: &Event) -> StorageResult<()> {
        self.inner.create_event(event).await
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> StorageResult<Event> {
        self.inner.update_event(id, patch).await
    }

    async fn delete_event(&self, id: &str) -> StorageResult<()> {
        self.inner.delete_event(id).await
    }
}

struct SlowFixture {
    memory: Arc<MemoryStore>,
    store: Arc<SlowStore>,
    service: Arc<SeatingService>,
    event_id: String,
}

async fn slow_fixture() -> SlowFixture {
    let memory = Arc::new(MemoryStore::new());
    let store = Arc::new(SlowStore {
        inner: memory.clone(),
        delay: Duration::from_millis(200),
        slow_reads: AtomicBool::new(false),
    });
    let dyn_store: DynStorage = store.clone();
    let service = Arc::new(SeatingService::new(dyn_store, &SeatingConfig::default()));
    let event = service.create_event(forum("Korea-Kazakhstan Business Forum")).await.unwrap();
    SlowFixture { memory, store, service, event_id: event.id }
}

fn is_conflict(err: &ServiceError) -> bool {
    matches!(err, ServiceError::Session(SessionError::Assign(AssignError::Conflict { .. })))
}

async fn stored_at(store: &MemoryStore, event_id: &str, seat: &str) -> usize {
    let stored = store.list_guests(event_id).await.unwrap();
    stored.iter().filter(|g| g.seat_number.as_deref() == Some(seat)).count()
}

fn new_guest(name: &str, seat: Option<&str>) -> NewGuest {
    NewGuest {
        name: name.into(),
        seat_number: seat.map(str::to_string),
        ..NewGuest::default()
    }
}

#[tokio::test]
async fn assigned_seat_is_persisted_and_shown_in_layout() {
    let f = fixture(SeatingConfig::default()).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();
    let kim = f.service.add_guest(&f.event_id, new_guest("김철수", None)).await.unwrap();
    assert!(hong.persisted);

    let moved = f.service.assign_seat(&f.event_id, &kim.data.id, Some("B3")).await.unwrap();
    assert_eq!(moved.data.seat_number.as_deref(), Some("B-3"));
    assert!(moved.entry_id.is_some());

    let stored = f.store.list_guests(&f.event_id).await.unwrap();
    let stored_kim = stored.iter().find(|g| g.id == kim.data.id).unwrap();
    assert_eq!(stored_kim.seat_number.as_deref(), Some("B-3"));

    let view = f.service.layout(&f.event_id).await.unwrap();
    assert_eq!(view.row_labels, vec!["A", "B"]);
    assert_eq!(view.cols, 3);
    assert_eq!(view.source, ShapeSource::Inferred);
    assert_eq!(view.occupied, 2);
}

#[tokio::test]
async fn taken_seat_is_refused_with_occupant() {
    let f = fixture(SeatingConfig::default()).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();
    let kim = f.service.add_guest(&f.event_id, new_guest("김철수", Some("A-2"))).await.unwrap();

    let err = f.service.assign_seat(&f.event_id, &kim.data.id, Some("A-1")).await.unwrap_err();
    match err {
        ServiceError::Session(SessionError::Assign(AssignError::Conflict { occupant_id, .. })) => {
            assert_eq!(occupant_id, hong.data.id);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let kim_now = f.service.get_guest(&f.event_id, &kim.data.id).await.unwrap();
    assert_eq!(kim_now.seat_number.as_deref(), Some("A-2"));
}

#[tokio::test]
async fn failed_write_keeps_local_change_by_default() {
    let f = fixture(SeatingConfig::default()).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", None)).await.unwrap();

    f.store.set_fail_writes(true);
    let outcome = f.service.assign_seat(&f.event_id, &hong.data.id, Some("C-4")).await.unwrap();
    assert!(!outcome.persisted);
    assert!(outcome.warning.is_some());

    let local = f.service.get_guest(&f.event_id, &hong.data.id).await.unwrap();
    assert_eq!(local.seat_number.as_deref(), Some("C-4"));
    let stored = f.store.list_guests(&f.event_id).await.unwrap();
    assert_eq!(stored[0].seat_number, None);
}

#[tokio::test]
async fn failed_write_is_rolled_back_when_configured() {
    let config = SeatingConfig { rollback_on_persist_failure: true, ..SeatingConfig::default() };
    let f = fixture(config).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", None)).await.unwrap();

    f.store.set_fail_writes(true);
    let err = f.service.assign_seat(&f.event_id, &hong.data.id, Some("C-4")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(StorageError::Unavailable(_))));

    let local = f.service.get_guest(&f.event_id, &hong.data.id).await.unwrap();
    assert_eq!(local.seat_number, None);
    let view = f.service.layout(&f.event_id).await.unwrap();
    assert!(view.empty);
}

#[tokio::test]
async fn user_rollback_restores_previous_seat_in_storage() {
    let f = fixture(SeatingConfig::default()).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();
    let moved = f.service.assign_seat(&f.event_id, &hong.data.id, Some("A-5")).await.unwrap();

    let rolled = f
        .service
        .rollback(&f.event_id, moved.entry_id.unwrap())
        .await
        .unwrap();
    assert!(rolled.persisted);

    let stored = f.store.list_guests(&f.event_id).await.unwrap();
    assert_eq!(stored[0].seat_number.as_deref(), Some("A-1"));
    let commands = f.service.commands(&f.event_id).await.unwrap();
    assert!(commands.iter().all(|c| Some(c.id) != moved.entry_id));
}

#[tokio::test]
async fn cancelled_guest_frees_seat_on_request() {
    let f = fixture(SeatingConfig::default()).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();

    let outcome = f
        .service
        .update_status(&f.event_id, &hong.data.id, GuestStatus::Cancelled, true)
        .await
        .unwrap();
    assert_eq!(outcome.data.seat_number, None);

    let available = f
        .service
        .list_guests(&f.event_id, None, Default::default(), true)
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
}

#[tokio::test]
async fn csv_import_can_fix_the_layout() {
    let f = fixture(SeatingConfig::default()).await;
    let csv = "이름,소속,구분,좌석번호\n홍길동,외교부,VIP,A-2\n김철수,산업부,일반,B-4\n,빈 줄,,\n";

    let outcome = f.service.import_csv(&f.event_id, csv.as_bytes(), true).await.unwrap();
    assert_eq!(outcome.data.imported, 2);
    assert!(outcome.data.layout_applied);

    let view = f.service.layout(&f.event_id).await.unwrap();
    assert_eq!(view.source, ShapeSource::Explicit);
    assert_eq!(view.cols, 4);

    // явная схема не растёт от новых мест
    f.service
        .add_guest(&f.event_id, new_guest("이영희", Some("C-9")))
        .await
        .unwrap();
    let view = f.service.layout(&f.event_id).await.unwrap();
    assert_eq!(view.row_labels, vec!["A", "B"]);
    assert_eq!(view.occupied, 2);

    let event = f.service.get_event(&f.event_id).await.unwrap();
    assert_eq!(event.seat_layout.map(|l| l.cols), Some(4));
}

#[tokio::test]
async fn idle_sessions_are_evicted_and_reloaded() {
    let f = fixture(SeatingConfig::default()).await;
    f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();

    assert_eq!(f.service.evict_idle(Duration::ZERO).await, 1);
    let guests = f
        .service
        .list_guests(&f.event_id, Some("ㅎㄱ"), Default::default(), false)
        .await
        .unwrap();
    assert_eq!(guests.len(), 1);
}

#[tokio::test]
async fn unknown_event_is_reported() {
    let f = fixture(SeatingConfig::default()).await;
    let err = f.service.layout("missing").await.unwrap_err();
    assert!(matches!(err, ServiceError::EventNotFound(_)));
}

#[tokio::test]
async fn reload_waits_for_write_in_flight() {
    let f = slow_fixture().await;
    let x = f.service.add_guest(&f.event_id, new_guest("홍길동", None)).await.unwrap();
    let y = f.service.add_guest(&f.event_id, new_guest("김철수", None)).await.unwrap();

    let service = f.service.clone();
    let (event_id, x_id) = (f.event_id.clone(), x.data.id.clone());
    let first = tokio::spawn(async move { service.assign_seat(&event_id, &x_id, Some("A-1")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(f.service.reload(&f.event_id).await.unwrap(), 2);
    let err = f.service.assign_seat(&f.event_id, &y.data.id, Some("A-1")).await.unwrap_err();
    assert!(is_conflict(&err), "unexpected error: {err:?}");

    assert!(first.await.unwrap().unwrap().persisted);
    assert_eq!(stored_at(&f.memory, &f.event_id, "A-1").await, 1);
}

#[tokio::test]
async fn eviction_keeps_session_with_write_in_flight() {
    let f = slow_fixture().await;
    let x = f.service.add_guest(&f.event_id, new_guest("홍길동", None)).await.unwrap();
    let y = f.service.add_guest(&f.event_id, new_guest("김철수", None)).await.unwrap();

    let service = f.service.clone();
    let (event_id, x_id) = (f.event_id.clone(), x.data.id.clone());
    let first = tokio::spawn(async move { service.assign_seat(&event_id, &x_id, Some("A-1")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(f.service.evict_idle(Duration::ZERO).await, 0);
    let err = f.service.assign_seat(&f.event_id, &y.data.id, Some("A-1")).await.unwrap_err();
    assert!(is_conflict(&err), "unexpected error: {err:?}");

    first.await.unwrap().unwrap();
    assert_eq!(stored_at(&f.memory, &f.event_id, "A-1").await, 1);

    // после записи сессия свободна и выгружается, а новая читает место из хранилища
    assert_eq!(f.service.evict_idle(Duration::ZERO).await, 1);
    let err = f.service.assign_seat(&f.event_id, &y.data.id, Some("A-1")).await.unwrap_err();
    assert!(is_conflict(&err));
}

#[tokio::test]
async fn slow_load_does_not_block_other_events() {
    let f = slow_fixture().await;
    let other = f.service.create_event(forum("Astana Investment Round")).await.unwrap();
    f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();

    f.store.slow_reads.store(true, Ordering::SeqCst);
    let service = f.service.clone();
    let other_id = other.id.clone();
    let loading = tokio::spawn(async move { service.layout(&other_id).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let view = tokio::time::timeout(Duration::from_millis(100), f.service.layout(&f.event_id))
        .await
        .expect("loaded event must not wait for another event's load")
        .unwrap();
    assert_eq!(view.occupied, 1);
    assert!(loading.await.unwrap().unwrap().empty);
}

#[tokio::test]
async fn failed_load_leaves_no_session_behind() {
    let f = fixture(SeatingConfig::default()).await;
    assert!(f.service.layout("missing").await.is_err());
    assert_eq!(f.service.evict_idle(Duration::ZERO).await, 0);
}

#[tokio::test]
async fn deleted_event_is_not_served_from_memory() {
    let f = fixture(SeatingConfig::default()).await;
    f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();

    f.service.delete_event(&f.event_id).await.unwrap();
    let err = f.service.layout(&f.event_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::EventNotFound(_)));
}

#[tokio::test]
async fn layout_version_changes_with_every_change() {
    let f = fixture(SeatingConfig::default()).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", Some("A-1"))).await.unwrap();
    let kim = f.service.add_guest(&f.event_id, new_guest("김철수", None)).await.unwrap();

    let first = f.service.layout_version(&f.event_id).await.unwrap();
    let (served, _) = f.service.versioned_layout(&f.event_id).await.unwrap();
    assert_eq!(served, first);

    // отказ не меняет состояние и версию
    let err = f.service.assign_seat(&f.event_id, &kim.data.id, Some("A-1")).await.unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(f.service.layout_version(&f.event_id).await.unwrap(), first);

    let moved = f.service.assign_seat(&f.event_id, &hong.data.id, Some("B-2")).await.unwrap();
    let after_move = f.service.layout_version(&f.event_id).await.unwrap();
    assert_ne!(after_move, first);

    f.service.rollback(&f.event_id, moved.entry_id.unwrap()).await.unwrap();
    let after_rollback = f.service.layout_version(&f.event_id).await.unwrap();
    assert_ne!(after_rollback, after_move);

    f.service.reload(&f.event_id).await.unwrap();
    let after_reload = f.service.layout_version(&f.event_id).await.unwrap();
    assert_ne!(after_reload, after_rollback);

    // другой процесс на том же хранилище не совпадает по версии
    let dyn_store: DynStorage = f.store.clone();
    let restarted = SeatingService::new(dyn_store, &SeatingConfig::default());
    assert_ne!(restarted.layout_version(&f.event_id).await.unwrap(), after_reload);
}

#[tokio::test]
async fn refused_write_rolled_back_still_changes_version() {
    let config = SeatingConfig { rollback_on_persist_failure: true, ..SeatingConfig::default() };
    let f = fixture(config).await;
    let hong = f.service.add_guest(&f.event_id, new_guest("홍길동", None)).await.unwrap();
    let before = f.service.layout_version(&f.event_id).await.unwrap();

    f.store.set_fail_writes(true);
    f.service.assign_seat(&f.event_id, &hong.data.id, Some("C-4")).await.unwrap_err();

    assert_ne!(f.service.layout_version(&f.event_id).await.unwrap(), before);
    let (_, view) = f.service.versioned_layout(&f.event_id).await.unwrap();
    assert!(view.empty);
}
