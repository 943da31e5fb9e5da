//! Сессия редактирования одного мероприятия.
//!
//! Держит коллекцию гостей в порядке добавления (он же порядок "кто первый, того и
//! место"), явную схему зала, если она задана, и материализованную сетку как кеш.
//! Каждая команда применяется локально сразу и возвращает список записей для
//! хранилища; журнал команд позволяет откатить локальное изменение, если запись
//! не прошла.

pub mod command;

pub use command::{CommandKind, CommandLog, LogEntry, PendingWrite};

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::layout::{
    self, canonical_seat_number, find_occupant, AssignError, Grid, GridLayout, GridShape,
    LayoutError, SeatChange,
};
use crate::models::{EventPatch, Guest, GuestPatch, GuestStatus};
use command::Undo;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Assign(#[from] AssignError),
    #[error("guest {0} not found")]
    GuestNotFound(String),
    #[error("guest {0} already exists")]
    DuplicateGuest(String),
    #[error("guest {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionMismatch { id: String, expected: u64, actual: u64 },
    #[error("command {0} is not in the log")]
    UnknownEntry(u64),
    #[error("command {entry} can no longer be rolled back: guest {guest} changed since")]
    StaleRollback { entry: u64, guest: String },
}

/// Результат применённой команды.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub value: T,
    /// `None` для команд, которые ничего не изменили.
    pub entry_id: Option<u64>,
    pub writes: Vec<PendingWrite>,
}

impl<T> Applied<T> {
    fn noop(value: T) -> Self {
        Self { value, entry_id: None, writes: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    /// Форма, выведенная только из импортированных гостей.
    pub shape: GridShape,
    pub layout_applied: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub log_capacity: usize,
    pub max_grid_cells: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { log_capacity: 256, max_grid_cells: 20_000 }
    }
}

pub struct SeatingSession {
    event_id: String,
    guests: Vec<Guest>,
    layout: Option<GridShape>,
    grid: Option<Grid>,
    log: CommandLog,
    options: SessionOptions,
    last_used: Instant,
    // метка состояния, которую выдаёт сервис; меняется при каждом изменении
    revision: u64,
}

impl SeatingSession {
    pub fn new(
        event_id: impl Into<String>,
        guests: Vec<Guest>,
        layout: Option<GridShape>,
        options: SessionOptions,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            guests,
            layout,
            grid: None,
            log: CommandLog::new(options.log_capacity),
            options,
            last_used: Instant::now(),
            revision: 0,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn guests(&self) -> &[Guest] {
        &self.guests
    }

    pub fn guest(&self, id: &str) -> Option<&Guest> {
        self.guests.iter().find(|g| g.id == id)
    }

    /// Явная схема зала, если задана.
    pub fn layout(&self) -> Option<&GridShape> {
        self.layout.as_ref()
    }

    /// Текущая форма: явная или выведенная из гостей.
    pub fn shape(&self) -> GridShape {
        match &self.layout {
            Some(shape) => shape.clone(),
            None => layout::compute_grid_size(&self.guests),
        }
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn mark_used(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Материализованная сетка; строится лениво и дальше сверяется инкрементально.
    pub fn grid(&mut self) -> Result<&Grid, LayoutError> {
        let grid = match self.grid.take() {
            Some(grid) => grid,
            None => {
                let shape = self.shape();
                let limit = self.options.max_grid_cells;
                if shape.cell_count() > limit {
                    return Err(LayoutError::TooLarge { cells: shape.cell_count(), limit });
                }
                match &self.layout {
                    Some(shape) => Grid::materialize_with(shape.clone(), &self.guests),
                    None => Grid::materialize(&self.guests),
                }
            }
        };
        Ok(self.grid.insert(grid))
    }

    /// Гости, которых можно посадить: без места или отменившие участие.
    pub fn available_guests(&self) -> impl Iterator<Item = &Guest> {
        self.guests
            .iter()
            .filter(|g| !g.is_seated() || g.status == GuestStatus::Cancelled)
    }

    fn position(&self, id: &str) -> Result<usize, SessionError> {
        self.guests
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| SessionError::GuestNotFound(id.to_string()))
    }

    fn reconcile(&mut self, change: SeatChange) {
        let Some(grid) = self.grid.as_mut() else {
            return;
        };
        // не даём инкрементальной сверке раздуть сетку сверх лимита
        if let Some(next) = layout::seat_id::parse_seat_number(change.next.as_deref()) {
            let shape = grid.shape();
            let rows = shape.rows() as u64 + 1;
            let cols = u64::from(shape.cols.max(next.index));
            if rows * cols > self.options.max_grid_cells {
                self.grid = None;
                return;
            }
        }
        let outcome = grid.reconcile(&change, &self.guests);
        debug!(event = %self.event_id, guest = %change.guest_id, ?outcome, "Grid reconciled");
    }

    fn ensure_seat_free(&self, seat: &str, guest_id: &str) -> Result<(), SessionError> {
        match find_occupant(seat, guest_id, &self.guests) {
            Some(occupant) => Err(AssignError::Conflict {
                seat: seat.to_string(),
                occupant_id: occupant.id.clone(),
                occupant_name: occupant.name.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Записывает новую версию гостя на позиции `pos`, сверяет сетку и журнал.
    fn commit_guest(&mut self, kind: CommandKind, pos: usize, mut after: Guest) -> Applied<Guest> {
        let before = self.guests[pos].clone();
        if after == before {
            return Applied::noop(before);
        }
        after.touch();
        self.guests[pos] = after.clone();

        let entry_id = self.log.record(
            kind,
            Undo::RestoreGuest { before: before.clone(), version_after: after.version },
        );
        if before.seat_number != after.seat_number {
            self.reconcile(SeatChange::new(
                &after.id,
                before.seat_number.clone(),
                after.seat_number.clone(),
            ));
        }

        let patch = GuestPatch::diff(&before, &after);
        Applied {
            writes: vec![PendingWrite::UpdateGuest { id: after.id.clone(), patch }],
            value: after,
            entry_id: Some(entry_id),
        }
    }

    pub fn add_guest(&mut self, mut guest: Guest) -> Result<Applied<Guest>, SessionError> {
        if self.guest(&guest.id).is_some() {
            return Err(SessionError::DuplicateGuest(guest.id));
        }
        guest.event_id = self.event_id.clone();
        guest.seat_number = guest.seat_number.as_deref().and_then(canonical_seat_number);
        if let Some(seat) = &guest.seat_number {
            self.ensure_seat_free(seat, &guest.id)?;
        }
        guest.updated_at = Utc::now();

        self.guests.push(guest.clone());
        let entry_id = self.log.record(
            CommandKind::AddGuest,
            Undo::RemoveGuest { id: guest.id.clone(), version: guest.version },
        );
        if guest.seat_number.is_some() {
            self.reconcile(SeatChange::new(&guest.id, None, guest.seat_number.clone()));
        }

        Ok(Applied {
            writes: vec![PendingWrite::CreateGuest(guest.clone())],
            value: guest,
            entry_id: Some(entry_id),
        })
    }

    /// Частичное обновление. Смена места внутри патча проходит ту же проверку, что и
    /// [`Self::assign_seat`]. `expected_version` защищает от потерянных обновлений.
    pub fn update_guest(
        &mut self,
        id: &str,
        mut patch: GuestPatch,
        expected_version: Option<u64>,
    ) -> Result<Applied<Guest>, SessionError> {
        let pos = self.position(id)?;
        let current = &self.guests[pos];
        if let Some(expected) = expected_version {
            if current.version != expected {
                return Err(SessionError::VersionMismatch {
                    id: id.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }

        // служебные поля ставит только сессия
        patch.updated_at = None;
        patch.version = None;

        let seat = match patch.seat_number.take() {
            Some(target) => Some(layout::assign(id, target.as_deref(), &self.guests)?),
            None => None,
        };

        let mut after = self.guests[pos].clone();
        patch.apply_to(&mut after);
        if let Some(change) = seat {
            after.seat_number = change.next;
        }
        Ok(self.commit_guest(CommandKind::UpdateGuest, pos, after))
    }

    /// Назначение или снятие места. Занятое другим гостем место отклоняется
    /// без каких-либо изменений.
    pub fn assign_seat(&mut self, id: &str, target: Option<&str>) -> Result<Applied<Guest>, SessionError> {
        let pos = self.position(id)?;
        let change = layout::assign(id, target, &self.guests)?;
        if change.is_noop() {
            return Ok(Applied::noop(self.guests[pos].clone()));
        }
        let mut after = self.guests[pos].clone();
        after.seat_number = change.next;
        Ok(self.commit_guest(CommandKind::AssignSeat, pos, after))
    }

    /// Смена статуса прибытия. Место освобождается только при отмене и явной просьбе.
    pub fn update_status(
        &mut self,
        id: &str,
        status: GuestStatus,
        free_seat: bool,
    ) -> Result<Applied<Guest>, SessionError> {
        let pos = self.position(id)?;
        let mut after = self.guests[pos].clone();
        after.status = status;
        if status == GuestStatus::Cancelled && free_seat {
            after.seat_number = None;
        }
        Ok(self.commit_guest(CommandKind::UpdateStatus, pos, after))
    }

    pub fn delete_guest(&mut self, id: &str) -> Result<Applied<Guest>, SessionError> {
        let pos = self.position(id)?;
        let guest = self.guests.remove(pos);

        let entry_id = self.log.record(
            CommandKind::DeleteGuest,
            Undo::ReinsertGuest { position: pos, guest: guest.clone() },
        );
        if guest.seat_number.is_some() {
            self.reconcile(SeatChange::new(&guest.id, guest.seat_number.clone(), None));
        }

        Ok(Applied {
            writes: vec![PendingWrite::DeleteGuest(guest.id.clone())],
            value: guest,
            entry_id: Some(entry_id),
        })
    }

    /// Массовый импорт. Номера мест сохраняются как есть, дубли не отклоняются:
    /// их разрешает материализация. С `apply_layout` форма, выведенная из
    /// импортированных гостей, становится явной схемой зала.
    pub fn import_guests(
        &mut self,
        imported: Vec<Guest>,
        apply_layout: bool,
    ) -> Result<Applied<ImportReport>, SessionError> {
        let mut known: HashSet<String> = self.guests.iter().map(|g| g.id.clone()).collect();
        let mut batch = Vec::with_capacity(imported.len());
        for mut guest in imported {
            if !known.insert(guest.id.clone()) {
                return Err(SessionError::DuplicateGuest(guest.id));
            }
            guest.event_id = self.event_id.clone();
            batch.push(guest);
        }

        let shape = layout::compute_grid_size(&batch);
        let too_large = shape.cell_count() > self.options.max_grid_cells;
        if apply_layout && too_large {
            warn!(
                event = %self.event_id,
                cells = shape.cell_count(),
                limit = self.options.max_grid_cells,
                "Imported seats give an oversized layout, keeping layout unchanged"
            );
        }
        let layout_applied = apply_layout && !shape.is_empty() && !too_large;

        let mut writes = vec![PendingWrite::CreateGuests(batch.clone())];
        let previous_layout = if layout_applied {
            writes.push(self.layout_write(Some(&shape)));
            Some(std::mem::replace(&mut self.layout, Some(shape.clone())))
        } else {
            None
        };

        let report = ImportReport { imported: batch.len(), shape, layout_applied };
        let ids = batch.iter().map(|g| (g.id.clone(), g.version)).collect();
        self.guests.extend(batch);
        self.grid = None;

        let entry_id = self.log.record(
            CommandKind::ImportGuests,
            Undo::Import { guests: ids, layout: previous_layout },
        );
        Ok(Applied { value: report, entry_id: Some(entry_id), writes })
    }

    /// Задаёт явную схему зала или (с `None`) возвращает вывод схемы из гостей.
    pub fn set_layout(&mut self, layout: Option<GridShape>) -> Applied<Option<GridShape>> {
        if layout == self.layout {
            return Applied::noop(layout);
        }
        let write = self.layout_write(layout.as_ref());
        let previous = std::mem::replace(&mut self.layout, layout.clone());
        self.grid = None;
        let entry_id = self.log.record(CommandKind::SetLayout, Undo::RestoreLayout(previous));
        Applied { value: layout, entry_id: Some(entry_id), writes: vec![write] }
    }

    fn layout_write(&self, layout: Option<&GridShape>) -> PendingWrite {
        PendingWrite::UpdateEvent {
            id: self.event_id.clone(),
            patch: EventPatch::layout(layout.map(GridLayout::from)),
        }
    }

    fn check_version(&self, entry: u64, id: &str, version: u64) -> Result<usize, SessionError> {
        let stale = || SessionError::StaleRollback { entry, guest: id.to_string() };
        let pos = self.guests.iter().position(|g| g.id == id).ok_or_else(stale)?;
        if self.guests[pos].version != version {
            return Err(stale());
        }
        Ok(pos)
    }

    /// Откатывает команду журнала в памяти.
    ///
    /// Возвращает записи, которые вернут хранилище в прежнее состояние; вызывающий
    /// решает, выполнять ли их (после неудачной записи они не нужны).
    /// Если затронутый гость с тех пор менялся, откат отклоняется.
    pub fn rollback(&mut self, entry_id: u64) -> Result<Vec<PendingWrite>, SessionError> {
        let undo = self
            .log
            .get(entry_id)
            .map(|entry| entry.undo.clone())
            .ok_or(SessionError::UnknownEntry(entry_id))?;

        let writes = match undo {
            Undo::RemoveGuest { id, version } => {
                let pos = self.check_version(entry_id, &id, version)?;
                let guest = self.guests.remove(pos);
                if guest.seat_number.is_some() {
                    self.reconcile(SeatChange::new(&guest.id, guest.seat_number, None));
                }
                vec![PendingWrite::DeleteGuest(id)]
            }
            Undo::RestoreGuest { before, version_after } => {
                let pos = self.check_version(entry_id, &before.id, version_after)?;
                if let Some(seat) = &before.seat_number {
                    self.ensure_seat_free(seat, &before.id)?;
                }
                let current = self.guests[pos].clone();
                let mut restored = before;
                restored.version = current.version;
                restored.touch();
                self.guests[pos] = restored.clone();
                if current.seat_number != restored.seat_number {
                    self.reconcile(SeatChange::new(
                        &restored.id,
                        current.seat_number.clone(),
                        restored.seat_number.clone(),
                    ));
                }
                vec![PendingWrite::UpdateGuest {
                    id: restored.id.clone(),
                    patch: GuestPatch::diff(&current, &restored),
                }]
            }
            Undo::ReinsertGuest { position, mut guest } => {
                if self.guest(&guest.id).is_some() {
                    return Err(SessionError::StaleRollback { entry: entry_id, guest: guest.id });
                }
                if let Some(seat) = &guest.seat_number {
                    self.ensure_seat_free(seat, &guest.id)?;
                }
                guest.touch();
                let position = position.min(self.guests.len());
                self.guests.insert(position, guest.clone());
                if guest.seat_number.is_some() {
                    self.reconcile(SeatChange::new(&guest.id, None, guest.seat_number.clone()));
                }
                vec![PendingWrite::CreateGuest(guest)]
            }
            Undo::Import { guests, layout } => {
                for (id, version) in &guests {
                    self.check_version(entry_id, id, *version)?;
                }
                let ids: HashSet<&str> = guests.iter().map(|(id, _)| id.as_str()).collect();
                self.guests.retain(|g| !ids.contains(g.id.as_str()));
                let mut writes: Vec<PendingWrite> = guests
                    .iter()
                    .map(|(id, _)| PendingWrite::DeleteGuest(id.clone()))
                    .collect();
                if let Some(previous) = layout {
                    writes.push(self.layout_write(previous.as_ref()));
                    self.layout = previous;
                }
                self.grid = None;
                writes
            }
            Undo::RestoreLayout(previous) => {
                let write = self.layout_write(previous.as_ref());
                self.layout = previous;
                self.grid = None;
                vec![write]
            }
        };

        self.log.remove(entry_id);
        debug!(event = %self.event_id, entry = entry_id, "Command rolled back");
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SeatingSession {
        let guests = vec![
            Guest::new("ev-1", "Hong Gildong").with_id("x").with_seat("A-1"),
            Guest::new("ev-1", "Kim Cheolsu").with_id("y").with_seat("A-2"),
            Guest::new("ev-1", "Lee Younghee").with_id("z"),
        ];
        SeatingSession::new("ev-1", guests, None, SessionOptions::default())
    }

    fn assert_grid_consistent(session: &mut SeatingSession) {
        let expected = match session.layout().cloned() {
            Some(shape) => Grid::materialize_with(shape, session.guests()),
            None => Grid::materialize(session.guests()),
        };
        assert_eq!(session.grid().unwrap(), &expected);
    }

    #[test]
    fn conflicting_assignment_changes_nothing() {
        let mut session = session();
        session.grid().unwrap();
        let before = session.guests().to_vec();

        let err = session.assign_seat("z", Some("A-1")).unwrap_err();
        match err {
            SessionError::Assign(AssignError::Conflict { occupant_name, .. }) => {
                assert_eq!(occupant_name, "Hong Gildong")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session.guests(), before.as_slice());
        assert!(session.log().is_empty());
    }

    #[test]
    fn assigning_own_seat_is_noop() {
        let mut session = session();
        let applied = session.assign_seat("x", Some("A1")).unwrap();
        assert_eq!(applied.entry_id, None);
        assert!(applied.writes.is_empty());
        assert_eq!(applied.value.version, 0);
    }

    #[test]
    fn move_updates_grid_incrementally() {
        let mut session = session();
        session.grid().unwrap();

        let applied = session.assign_seat("x", Some("A-3")).unwrap();
        assert_eq!(applied.value.seat_number.as_deref(), Some("A-3"));
        assert_eq!(applied.value.version, 1);
        match applied.writes.as_slice() {
            [PendingWrite::UpdateGuest { id, patch }] => {
                assert_eq!(id, "x");
                assert_eq!(patch.seat_number, Some(Some("A-3".into())));
                assert_eq!(patch.version, Some(1));
                assert_eq!(patch.name, None);
            }
            other => panic!("unexpected writes: {other:?}"),
        }

        let grid = session.grid().unwrap();
        assert_eq!(grid.occupant("A1"), None);
        assert_eq!(grid.occupant("A3"), Some("x"));
        assert_grid_consistent(&mut session);
    }

    #[test]
    fn cancellation_frees_seat_only_on_request() {
        let mut session = session();
        let kept = session.update_status("x", GuestStatus::Cancelled, false).unwrap();
        assert_eq!(kept.value.seat_number.as_deref(), Some("A-1"));

        let freed = session.update_status("y", GuestStatus::Cancelled, true).unwrap();
        assert_eq!(freed.value.seat_number, None);
        assert_grid_consistent(&mut session);

        let available: Vec<_> = session.available_guests().map(|g| g.id.as_str()).collect();
        assert_eq!(available, vec!["x", "y", "z"]);
    }

    #[test]
    fn delete_and_rollback_restores_position() {
        let mut session = session();
        session.grid().unwrap();

        let applied = session.delete_guest("x").unwrap();
        assert_eq!(session.grid().unwrap().occupant("A1"), None);

        let writes = session.rollback(applied.entry_id.unwrap()).unwrap();
        assert!(matches!(writes.as_slice(), [PendingWrite::CreateGuest(g)] if g.id == "x"));
        assert_eq!(session.guests()[0].id, "x");
        assert_eq!(session.grid().unwrap().occupant("A1"), Some("x"));
        assert_grid_consistent(&mut session);
    }

    #[test]
    fn rollback_of_update_is_refused_after_later_edit() {
        let mut session = session();
        let first = session.assign_seat("z", Some("B-1")).unwrap();
        session.assign_seat("z", Some("B-2")).unwrap();

        let err = session.rollback(first.entry_id.unwrap()).unwrap_err();
        assert!(matches!(err, SessionError::StaleRollback { .. }));
    }

    #[test]
    fn rollback_of_update_restores_seat() {
        let mut session = session();
        session.grid().unwrap();
        let applied = session.assign_seat("z", Some("B-1")).unwrap();

        session.rollback(applied.entry_id.unwrap()).unwrap();
        assert_eq!(session.guest("z").unwrap().seat_number, None);
        assert_eq!(session.guest("z").unwrap().version, 2);
        assert!(session.rollback(applied.entry_id.unwrap()).is_err());
        assert_grid_consistent(&mut session);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut session = session();
        let patch = GuestPatch { name: Some("Hong".into()), ..GuestPatch::default() };
        let err = session.update_guest("x", patch, Some(5)).unwrap_err();
        assert!(matches!(err, SessionError::VersionMismatch { expected: 5, actual: 0, .. }));
    }

    #[test]
    fn patch_seat_goes_through_conflict_check() {
        let mut session = session();
        let patch = GuestPatch::seat(Some("A-2".into()));
        assert!(matches!(
            session.update_guest("z", patch, None),
            Err(SessionError::Assign(AssignError::Conflict { .. }))
        ));
    }

    #[test]
    fn add_guest_rejects_taken_seat() {
        let mut session = session();
        let guest = Guest::new("other-event", "Park").with_seat("A2");
        assert!(session.add_guest(guest).is_err());

        let guest = Guest::new("other-event", "Park").with_seat("C3");
        let applied = session.add_guest(guest).unwrap();
        assert_eq!(applied.value.event_id, "ev-1");
        assert_eq!(applied.value.seat_number.as_deref(), Some("C-3"));
    }

    #[test]
    fn import_with_layout_and_rollback() {
        let mut session = session();
        let imported = vec![
            Guest::new("ev-1", "Choi").with_seat("C-5"),
            Guest::new("ev-1", "Jung").with_seat("C-5"),
        ];
        let applied = session.import_guests(imported, true).unwrap();
        assert_eq!(applied.value.imported, 2);
        assert!(applied.value.layout_applied);
        assert_eq!(session.layout().unwrap().row_labels, vec!["C"]);
        assert_eq!(applied.writes.len(), 2);

        let grid = session.grid().unwrap();
        assert_eq!(grid.cells().len(), 5);
        assert_eq!(grid.conflicts().count(), 1);

        session.rollback(applied.entry_id.unwrap()).unwrap();
        assert_eq!(session.guests().len(), 3);
        assert!(session.layout().is_none());
    }

    #[test]
    fn oversized_layout_is_refused() {
        let guests = vec![Guest::new("ev-1", "Far").with_seat("A-4000000000")];
        let mut session = SeatingSession::new("ev-1", guests, None, SessionOptions::default());
        assert!(matches!(session.grid(), Err(LayoutError::TooLarge { .. })));
    }

    #[test]
    fn oversized_import_keeps_inferred_layout() {
        let mut session = session();
        let imported = vec![Guest::new("ev-1", "Far").with_seat("A-4000000000")];
        let applied = session.import_guests(imported, true).unwrap();

        assert_eq!(applied.value.imported, 1);
        assert!(!applied.value.layout_applied);
        assert!(session.layout().is_none());
        // записывается только сам список гостей, без схемы мероприятия
        assert_eq!(applied.writes.len(), 1);
        assert!(matches!(applied.writes[0], PendingWrite::CreateGuests(_)));

        // неверное место можно исправить, и сетка снова строится
        let far = session.guests().last().unwrap().id.clone();
        session.assign_seat(&far, Some("A-3")).unwrap();
        assert_eq!(session.grid().unwrap().shape().cols, 3);
    }
}
