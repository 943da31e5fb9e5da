use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::layout::GridShape;
use crate::models::{EventPatch, Guest, GuestPatch};

/// Вид команды в журнале сессии.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    AddGuest,
    UpdateGuest,
    AssignSeat,
    UpdateStatus,
    DeleteGuest,
    ImportGuests,
    SetLayout,
}

/// Как откатить команду в памяти.
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    /// Откат добавления; `version` - версия гостя сразу после команды.
    RemoveGuest { id: String, version: u64 },
    /// Откат изменения.
    RestoreGuest { before: Guest, version_after: u64 },
    /// Откат удаления: вернуть гостя на прежнюю позицию.
    ReinsertGuest { position: usize, guest: Guest },
    /// Откат импорта: убрать импортированных и вернуть прежнюю схему, если её меняли.
    Import {
        guests: Vec<(String, u64)>,
        layout: Option<Option<GridShape>>,
    },
    RestoreLayout(Option<GridShape>),
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: u64,
    pub kind: CommandKind,
    pub at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) undo: Undo,
}

/// Запись в хранилище, которую нужно выполнить после локального применения команды.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    CreateGuest(Guest),
    CreateGuests(Vec<Guest>),
    UpdateGuest { id: String, patch: GuestPatch },
    DeleteGuest(String),
    UpdateEvent { id: String, patch: EventPatch },
}

/// Ограниченный журнал команд: старые записи вытесняются и больше не откатываются.
#[derive(Debug, Clone)]
pub struct CommandLog {
    entries: VecDeque<LogEntry>,
    next_id: u64,
    capacity: usize,
}

impl CommandLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            next_id: 1,
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn record(&mut self, kind: CommandKind, undo: Undo) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry { id, kind, at: Utc::now(), undo });
        id
    }

    pub fn get(&self, id: u64) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<LogEntry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(pos)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
