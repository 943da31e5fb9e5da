//! seating.rs
//!
//! Сервисный слой рассадки.
//!
//! Для каждого мероприятия держится одна [`SeatingSession`] за `tokio::sync::Mutex`.
//! Блокировка держится от применения команды до конца записи в хранилище, поэтому
//! команды одного мероприятия выполняются строго по очереди.
//!
//! Сессия загружается и выгружается под той же блокировкой. Выгруженная сессия
//! помечается как списанная: кто ждал её блокировку, берёт из карты новую.
//!
//! Если запись в хранилище не удалась, локальное изменение остаётся, ответ помечается
//! `persisted: false`. С `rollback_on_persist_failure` изменение вместо этого
//! откатывается через журнал команд и возвращается ошибка.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SeatingConfig;
use crate::layout::{self, Grid, GridLayout, GridShape, LayoutError, LayoutSummary, SeatCell, SeatConflict, ShapeSource};
use crate::models::{Event, EventPatch, Guest, GuestPatch, GuestStatus, GuestType, NewEvent, NewGuest};
use crate::search::{self, GuestFilter};
use crate::session::{Applied, ImportReport, LogEntry, PendingWrite, SeatingSession, SessionError, SessionOptions};
use crate::spreadsheet::{self, TransferError};
use crate::storage::{DynStorage, StorageError, StorageResult};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("event {0} not found")]
    EventNotFound(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Результат команды, изменяющей состояние.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome<T> {
    pub data: T,
    /// Запись журнала, по которой команду можно откатить.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<u64>,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Сетка в виде для клиента: ряды с ячейками.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutView {
    pub row_labels: Vec<String>,
    pub cols: u32,
    pub source: ShapeSource,
    pub rows: Vec<RowView>,
    pub conflicts: Vec<SeatConflict>,
    pub occupied: usize,
    /// Схему вывести нельзя: ни у кого нет разбираемого номера места.
    pub empty: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub label: String,
    pub cells: Vec<SeatCell>,
}

impl From<&Grid> for LayoutView {
    fn from(grid: &Grid) -> Self {
        Self {
            row_labels: grid.shape().row_labels.clone(),
            cols: grid.shape().cols,
            source: grid.source(),
            rows: grid
                .rows()
                .map(|(label, cells)| RowView { label: label.to_string(), cells: cells.to_vec() })
                .collect(),
            conflicts: grid.conflicts().cloned().collect(),
            occupied: grid.occupied_count(),
            empty: grid.is_empty(),
        }
    }
}

/// Статистика по гостям с назначенным местом.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestStats {
    pub total_guests: usize,
    pub seated: usize,
    pub arrived: usize,
    pub vip: usize,
    pub vip_arrived: usize,
}

impl GuestStats {
    pub fn collect(guests: &[Guest]) -> Self {
        let mut stats = GuestStats { total_guests: guests.len(), ..Self::default() };
        for guest in guests.iter().filter(|g| g.is_seated()) {
            let arrived = guest.status == GuestStatus::Arrived;
            let vip = guest.guest_type == GuestType::Vip;
            stats.seated += 1;
            stats.arrived += usize::from(arrived);
            stats.vip += usize::from(vip);
            stats.vip_arrived += usize::from(vip && arrived);
        }
        stats
    }
}

#[derive(Default)]
enum Slot {
    /// Место в карте занято, сессия ещё не загружена.
    #[default]
    Empty,
    Live(SeatingSession),
    /// Сессия выгружена или удалена вместе с мероприятием.
    Retired,
}

type SessionHandle = Arc<Mutex<Slot>>;
type SessionGuard = OwnedMappedMutexGuard<Slot, SeatingSession>;

pub struct SeatingService {
    store: DynStorage,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    options: SessionOptions,
    rollback_on_failure: bool,
    instance: Uuid,
    revisions: AtomicU64,
}

impl SeatingService {
    pub fn new(store: DynStorage, config: &SeatingConfig) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            options: SessionOptions {
                log_capacity: config.command_log_capacity,
                max_grid_cells: config.max_grid_cells,
            },
            rollback_on_failure: config.rollback_on_persist_failure,
            instance: Uuid::new_v4(),
            revisions: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &DynStorage {
        &self.store
    }

    // === Сессии ===

    async fn load_session(&self, event_id: &str) -> Result<SeatingSession, ServiceError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| ServiceError::EventNotFound(event_id.to_string()))?;
        let guests = self.store.list_guests(event_id).await?;

        let layout = match event.seat_layout.as_ref().map(GridLayout::to_shape).transpose() {
            Ok(layout) => layout,
            Err(e) => {
                warn!(event = %event_id, error = %e, "Stored seat layout is invalid, falling back to inference");
                None
            }
        };

        info!(
            event = %event_id,
            guests = guests.len(),
            explicit_layout = layout.is_some(),
            "Seating session loaded"
        );
        let mut session = SeatingSession::new(event_id, guests, layout, self.options);
        session.set_revision(self.next_revision());
        Ok(session)
    }

    fn next_revision(&self) -> u64 {
        self.revisions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Версия состояния: уникальна в пределах процесса и между перезапусками.
    fn version_of(&self, session: &SeatingSession) -> String {
        format!("{}:{}", self.instance, session.revision())
    }

    /// Карта блокируется только на время поиска, без обращений к хранилищу.
    async fn handle(&self, event_id: &str) -> SessionHandle {
        self.sessions
            .lock()
            .await
            .entry(event_id.to_string())
            .or_default()
            .clone()
    }

    async fn detach(&self, event_id: &str, handle: &SessionHandle) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(event_id).is_some_and(|current| Arc::ptr_eq(current, handle)) {
            sessions.remove(event_id);
        }
    }

    /// Блокирует место сессии, пропуская списанные.
    async fn lock_slot(&self, event_id: &str) -> (SessionHandle, OwnedMutexGuard<Slot>) {
        loop {
            let handle = self.handle(event_id).await;
            let slot = Arc::clone(&handle).lock_owned().await;
            if !matches!(*slot, Slot::Retired) {
                return (handle, slot);
            }
        }
    }

    async fn session(&self, event_id: &str) -> Result<SessionGuard, ServiceError> {
        loop {
            let (handle, mut slot) = self.lock_slot(event_id).await;
            if matches!(*slot, Slot::Empty) {
                match self.load_session(event_id).await {
                    Ok(session) => *slot = Slot::Live(session),
                    Err(e) => {
                        *slot = Slot::Retired;
                        self.detach(event_id, &handle).await;
                        return Err(e);
                    }
                }
            }
            let live = OwnedMutexGuard::try_map(slot, |slot| match slot {
                Slot::Live(session) => Some(session),
                _ => None,
            });
            if let Ok(mut session) = live {
                session.mark_used();
                return Ok(session);
            }
        }
    }

    /// Перечитывает мероприятие из хранилища; журнал команд при этом теряется.
    ///
    /// Старая сессия заменяется под своей блокировкой: команда, которая ещё пишет
    /// в хранилище, успевает закончить, а новые команды ждут свежую сессию.
    pub async fn reload(&self, event_id: &str) -> Result<usize, ServiceError> {
        let (handle, mut slot) = self.lock_slot(event_id).await;
        match self.load_session(event_id).await {
            Ok(session) => {
                let guests = session.guests().len();
                *slot = Slot::Live(session);
                Ok(guests)
            }
            Err(e) => {
                *slot = Slot::Retired;
                self.detach(event_id, &handle).await;
                Err(e)
            }
        }
    }

    /// Выгружает сессии, к которым давно не обращались. Занятые сессии не трогает.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, handle| {
            let Ok(mut slot) = handle.try_lock() else {
                return true;
            };
            let expired = match &*slot {
                Slot::Live(session) => session.last_used().elapsed() >= idle,
                Slot::Empty | Slot::Retired => true,
            };
            if expired {
                *slot = Slot::Retired;
            }
            !expired
        });
        before - sessions.len()
    }

    pub fn spawn_eviction(self: &Arc<Self>, interval: Duration, idle: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let evicted = service.evict_idle(idle).await;
                if evicted > 0 {
                    debug!(evicted, "Idle seating sessions evicted");
                }
            }
        })
    }

    // === Запись ===

    async fn persist(&self, writes: &[PendingWrite]) -> StorageResult<()> {
        for write in writes {
            match write {
                PendingWrite::CreateGuest(guest) => self.store.create_guest(guest).await?,
                PendingWrite::CreateGuests(guests) => self.store.create_guests(guests).await?,
                PendingWrite::UpdateGuest { id, patch } => {
                    self.store.update_guest(id, patch).await?;
                }
                PendingWrite::DeleteGuest(id) => self.store.delete_guest(id).await?,
                PendingWrite::UpdateEvent { id, patch } => {
                    self.store.update_event(id, patch).await?;
                }
            }
        }
        Ok(())
    }

    async fn commit<T>(&self, session: &mut SeatingSession, applied: Applied<T>) -> Result<Outcome<T>, ServiceError> {
        let Applied { value, entry_id, writes } = applied;
        let Err(e) = self.persist(&writes).await else {
            return Ok(Outcome { data: value, entry_id, persisted: true, warning: None });
        };

        if self.rollback_on_failure {
            warn!(event = %session.event_id(), entry = ?entry_id, error = %e, "Persisting command failed, rolling back");
            if let Some(id) = entry_id {
                if let Err(rollback) = session.rollback(id) {
                    warn!(event = %session.event_id(), entry = id, error = %rollback, "Rollback after failed persist was refused");
                }
            }
            return Err(e.into());
        }

        warn!(event = %session.event_id(), entry = ?entry_id, error = %e, "Persisting command failed, local change kept");
        Ok(Outcome {
            data: value,
            entry_id,
            persisted: false,
            warning: Some(format!("change applied locally but not saved: {e}")),
        })
    }

    async fn apply<T, F>(&self, event_id: &str, command: F) -> Result<Outcome<T>, ServiceError>
    where
        F: FnOnce(&mut SeatingSession) -> Result<Applied<T>, SessionError>,
    {
        let mut session = self.session(event_id).await?;
        let applied = command(&mut *session)?;
        let outcome = self.commit(&mut *session, applied).await;
        session.set_revision(self.next_revision());
        outcome
    }

    // === Мероприятия ===

    pub async fn list_events(&self) -> Result<Vec<Event>, ServiceError> {
        Ok(self.store.list_events().await?)
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Event, ServiceError> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| ServiceError::EventNotFound(event_id.to_string()))
    }

    pub async fn create_event(&self, new: NewEvent) -> Result<Event, ServiceError> {
        let event = new.into_event();
        self.store.create_event(&event).await?;
        info!(event = %event.id, title = %event.title, "Event created");
        Ok(event)
    }

    /// Схема зала в патче идёт через сессию, чтобы сетка и журнал были согласованы.
    pub async fn update_event(&self, event_id: &str, mut patch: EventPatch) -> Result<Event, ServiceError> {
        if let Some(layout) = patch.seat_layout.take() {
            let shape = layout.as_ref().map(GridLayout::to_shape).transpose()?;
            self.set_layout(event_id, shape).await?;
        }
        patch.updated_at = Some(chrono::Utc::now());
        Ok(self.store.update_event(event_id, &patch).await?)
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), ServiceError> {
        let (handle, mut slot) = self.lock_slot(event_id).await;
        let deleted = self.store.delete_event(event_id).await;
        if deleted.is_ok() || !matches!(*slot, Slot::Live(_)) {
            *slot = Slot::Retired;
            self.detach(event_id, &handle).await;
        }
        deleted.map_err(|e| match e {
            StorageError::NotFound { .. } => ServiceError::EventNotFound(event_id.to_string()),
            other => other.into(),
        })?;
        info!(event = %event_id, "Event deleted");
        Ok(())
    }

    // === Гости ===

    pub async fn list_guests(
        &self,
        event_id: &str,
        query: Option<&str>,
        filter: GuestFilter,
        available_only: bool,
    ) -> Result<Vec<Guest>, ServiceError> {
        let session = self.session(event_id).await?;
        Ok(if available_only {
            search::filter_guests(session.available_guests(), query, filter)
        } else {
            search::filter_guests(session.guests(), query, filter)
        })
    }

    pub async fn get_guest(&self, event_id: &str, guest_id: &str) -> Result<Guest, ServiceError> {
        let session = self.session(event_id).await?;
        session
            .guest(guest_id)
            .cloned()
            .ok_or_else(|| SessionError::GuestNotFound(guest_id.to_string()).into())
    }

    pub async fn add_guest(&self, event_id: &str, new: NewGuest) -> Result<Outcome<Guest>, ServiceError> {
        let guest = new.into_guest(event_id);
        self.apply(event_id, move |session| session.add_guest(guest)).await
    }

    pub async fn update_guest(
        &self,
        event_id: &str,
        guest_id: &str,
        patch: GuestPatch,
        expected_version: Option<u64>,
    ) -> Result<Outcome<Guest>, ServiceError> {
        self.apply(event_id, |session| session.update_guest(guest_id, patch, expected_version))
            .await
    }

    pub async fn assign_seat(
        &self,
        event_id: &str,
        guest_id: &str,
        seat: Option<&str>,
    ) -> Result<Outcome<Guest>, ServiceError> {
        self.apply(event_id, |session| session.assign_seat(guest_id, seat)).await
    }

    pub async fn update_status(
        &self,
        event_id: &str,
        guest_id: &str,
        status: GuestStatus,
        free_seat: bool,
    ) -> Result<Outcome<Guest>, ServiceError> {
        self.apply(event_id, |session| session.update_status(guest_id, status, free_seat))
            .await
    }

    pub async fn delete_guest(&self, event_id: &str, guest_id: &str) -> Result<Outcome<Guest>, ServiceError> {
        self.apply(event_id, |session| session.delete_guest(guest_id)).await
    }

    pub async fn add_guests(
        &self,
        event_id: &str,
        guests: Vec<NewGuest>,
        apply_layout: bool,
    ) -> Result<Outcome<ImportReport>, ServiceError> {
        let guests = guests.into_iter().map(|g| g.into_guest(event_id)).collect();
        self.import(event_id, guests, apply_layout).await
    }

    pub async fn import_csv(
        &self,
        event_id: &str,
        data: &[u8],
        apply_layout: bool,
    ) -> Result<Outcome<ImportReport>, ServiceError> {
        let guests = spreadsheet::read_guests(data, event_id)?;
        self.import(event_id, guests, apply_layout).await
    }

    async fn import(
        &self,
        event_id: &str,
        guests: Vec<Guest>,
        apply_layout: bool,
    ) -> Result<Outcome<ImportReport>, ServiceError> {
        let outcome = self
            .apply(event_id, move |session| session.import_guests(guests, apply_layout))
            .await?;
        info!(
            event = %event_id,
            imported = outcome.data.imported,
            layout_applied = outcome.data.layout_applied,
            "Guests imported"
        );
        Ok(outcome)
    }

    pub async fn export_csv(&self, event_id: &str) -> Result<Vec<u8>, ServiceError> {
        let session = self.session(event_id).await?;
        Ok(spreadsheet::write_guests(session.guests())?)
    }

    // === Схема зала ===

    pub async fn layout(&self, event_id: &str) -> Result<LayoutView, ServiceError> {
        Ok(self.versioned_layout(event_id).await?.1)
    }

    /// Текущая версия состояния мероприятия; меняется после каждой команды,
    /// отката и перечитывания.
    pub async fn layout_version(&self, event_id: &str) -> Result<String, ServiceError> {
        let session = self.session(event_id).await?;
        Ok(self.version_of(&session))
    }

    /// Сетка вместе с версией, из которой она построена.
    pub async fn versioned_layout(&self, event_id: &str) -> Result<(String, LayoutView), ServiceError> {
        let mut session = self.session(event_id).await?;
        let version = self.version_of(&session);
        let grid = session.grid()?;
        Ok((version, LayoutView::from(grid)))
    }

    pub async fn layout_summary(&self, event_id: &str) -> Result<LayoutSummary, ServiceError> {
        let session = self.session(event_id).await?;
        Ok(layout::summarize(session.guests()))
    }

    pub async fn stats(&self, event_id: &str) -> Result<GuestStats, ServiceError> {
        let session = self.session(event_id).await?;
        Ok(GuestStats::collect(session.guests()))
    }

    fn check_size(&self, shape: &GridShape) -> Result<(), LayoutError> {
        let limit = self.options.max_grid_cells;
        if shape.cell_count() > limit {
            return Err(LayoutError::TooLarge { cells: shape.cell_count(), limit });
        }
        Ok(())
    }

    /// Явная схема зала; `None` возвращает вывод схемы из номеров мест.
    pub async fn set_layout(
        &self,
        event_id: &str,
        shape: Option<GridShape>,
    ) -> Result<Outcome<Option<GridShape>>, ServiceError> {
        if let Some(shape) = &shape {
            self.check_size(shape)?;
        }
        self.apply(event_id, move |session| Ok(session.set_layout(shape))).await
    }

    pub async fn import_layout(
        &self,
        event_id: &str,
        layout: GridLayout,
    ) -> Result<Outcome<Option<GridShape>>, ServiceError> {
        let shape = layout.to_shape()?;
        self.set_layout(event_id, Some(shape)).await
    }

    pub async fn manual_layout(
        &self,
        event_id: &str,
        rows: usize,
        cols: u32,
    ) -> Result<Outcome<Option<GridShape>>, ServiceError> {
        self.set_layout(event_id, Some(GridShape::manual(rows, cols))).await
    }

    // === Журнал команд ===

    pub async fn commands(&self, event_id: &str) -> Result<Vec<LogEntry>, ServiceError> {
        let session = self.session(event_id).await?;
        Ok(session.log().entries().cloned().collect())
    }

    /// Откат команды по запросу пользователя: обратные записи тоже уходят в хранилище.
    pub async fn rollback(&self, event_id: &str, entry_id: u64) -> Result<Outcome<u64>, ServiceError> {
        let mut session = self.session(event_id).await?;
        let writes = session.rollback(entry_id)?;
        session.set_revision(self.next_revision());
        info!(event = %event_id, entry = entry_id, "Command rolled back");

        match self.persist(&writes).await {
            Ok(()) => Ok(Outcome { data: entry_id, entry_id: None, persisted: true, warning: None }),
            Err(e) => {
                warn!(event = %event_id, entry = entry_id, error = %e, "Persisting rollback failed, local change kept");
                Ok(Outcome {
                    data: entry_id,
                    entry_id: None,
                    persisted: false,
                    warning: Some(format!("rollback applied locally but not saved: {e}")),
                })
            }
        }
    }
}
