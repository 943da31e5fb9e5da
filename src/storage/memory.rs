//! Хранилище в памяти: для разработки без внешних сервисов и для тестов.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{EventStore, GuestStore, StorageError, StorageResult};
use crate::models::{Event, EventPatch, Guest, GuestPatch};

#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<Vec<Event>>,
    guests: RwLock<Vec<Guest>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_data(events: Vec<Event>, guests: Vec<Guest>) -> Self {
        let store = Self::new();
        *store.events.write().await = events;
        *store.guests.write().await = guests;
        store
    }

    /// Все последующие записи завершаются ошибкой, пока флаг не снят.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes are disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GuestStore for MemoryStore {
    async fn list_guests(&self, event_id: &str) -> StorageResult<Vec<Guest>> {
        let guests = self.guests.read().await;
        Ok(guests.iter().filter(|g| g.event_id == event_id).cloned().collect())
    }

    async fn create_guest(&self, guest: &Guest) -> StorageResult<()> {
        self.check_writable()?;
        self.guests.write().await.push(guest.clone());
        Ok(())
    }

    async fn create_guests(&self, guests: &[Guest]) -> StorageResult<()> {
        self.check_writable()?;
        self.guests.write().await.extend_from_slice(guests);
        Ok(())
    }

    async fn update_guest(&self, id: &str, patch: &GuestPatch) -> StorageResult<Guest> {
        self.check_writable()?;
        let mut guests = self.guests.write().await;
        let guest = guests
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| StorageError::guest_not_found(id))?;
        patch.apply_to(guest);
        Ok(guest.clone())
    }

    async fn delete_guest(&self, id: &str) -> StorageResult<()> {
        self.check_writable()?;
        let mut guests = self.guests.write().await;
        let pos = guests
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| StorageError::guest_not_found(id))?;
        guests.remove(pos);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list_events(&self) -> StorageResult<Vec<Event>> {
        Ok(self.events.read().await.clone())
    }

    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>> {
        Ok(self.events.read().await.iter().find(|e| e.id == id).cloned())
    }

    async fn create_event(&self, event: &Event) -> StorageResult<()> {
        self.check_writable()?;
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> StorageResult<Event> {
        self.check_writable()?;
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StorageError::event_not_found(id))?;
        patch.apply_to(event);
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> StorageResult<()> {
        self.check_writable()?;
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(StorageError::event_not_found(id));
        }
        self.guests.write().await.retain(|g| g.event_id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewEvent;
    use chrono::Utc;

    #[tokio::test]
    async fn delete_event_cascades_to_guests() {
        let event = NewEvent {
            title: "Forum".into(),
            date: Utc::now(),
            location: String::new(),
            description: None,
            status: Default::default(),
        }
        .into_event();
        let guests = vec![Guest::new(&event.id, "Hong"), Guest::new("other", "Kim")];
        let store = MemoryStore::with_data(vec![event.clone()], guests).await;

        store.delete_event(&event.id).await.unwrap();
        assert!(store.list_guests(&event.id).await.unwrap().is_empty());
        assert_eq!(store.list_guests("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_rejects_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let guest = Guest::new("ev", "Hong");
        assert!(matches!(store.create_guest(&guest).await, Err(StorageError::Unavailable(_))));
        store.set_fail_writes(false);
        store.create_guest(&guest).await.unwrap();
        assert_eq!(store.list_guests("ev").await.unwrap().len(), 1);
    }
}
