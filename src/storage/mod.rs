//! Хранилище гостей и мероприятий.
//!
//! Сервис рассадки работает только через трейты [`GuestStore`] и [`EventStore`];
//! реализации: PostgreSQL ([`postgres`]), Google Sheets ([`sheets`]) и память ([`memory`]).

pub mod circuit_breaker;
pub mod memory;
pub mod postgres;
pub mod sheets;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Event, EventPatch, Guest, GuestPatch};

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use sheets::SheetsStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("circuit breaker is open - storage temporarily unavailable")]
    CircuitOpen,
    #[error("sheets api returned {status}: {message}")]
    Sheets { status: u16, message: String },
    #[error("cannot decode stored {kind}: {message}")]
    Decode { kind: &'static str, message: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn guest_not_found(id: &str) -> Self {
        StorageError::NotFound { kind: "guest", id: id.to_string() }
    }

    pub fn event_not_found(id: &str) -> Self {
        StorageError::NotFound { kind: "event", id: id.to_string() }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait GuestStore: Send + Sync {
    /// Гости мероприятия в порядке хранения.
    async fn list_guests(&self, event_id: &str) -> StorageResult<Vec<Guest>>;
    async fn create_guest(&self, guest: &Guest) -> StorageResult<()>;
    async fn create_guests(&self, guests: &[Guest]) -> StorageResult<()>;
    async fn update_guest(&self, id: &str, patch: &GuestPatch) -> StorageResult<Guest>;
    async fn delete_guest(&self, id: &str) -> StorageResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn list_events(&self) -> StorageResult<Vec<Event>>;
    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>>;
    async fn create_event(&self, event: &Event) -> StorageResult<()>;
    async fn update_event(&self, id: &str, patch: &EventPatch) -> StorageResult<Event>;
    /// Удаляет мероприятие вместе с его гостями.
    async fn delete_event(&self, id: &str) -> StorageResult<()>;
}

pub trait Storage: GuestStore + EventStore {}

impl<T: GuestStore + EventStore> Storage for T {}

pub type DynStorage = Arc<dyn Storage>;
