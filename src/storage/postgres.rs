//! postgres.rs
//!
//! Хранилище в PostgreSQL. Схема зала мероприятия лежит в JSONB, пометки протокола
//! в TEXT[]. Порядок гостей задаётся `position_no` (порядок добавления).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use tracing::debug;

use super::{EventStore, GuestStore, StorageError, StorageResult};
use crate::database::Database;
use crate::layout::GridLayout;
use crate::models::{Event, EventPatch, Guest, GuestPatch};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(db: &Database) -> Self {
        Self { pool: db.pool.clone() }
    }
}

#[derive(sqlx::FromRow)]
struct GuestRow {
    id: String,
    event_id: String,
    name: String,
    organization: String,
    position: String,
    seat_number: Option<String>,
    status: String,
    guest_type: String,
    biography: Option<String>,
    protocol_notes: Vec<String>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<GuestRow> for Guest {
    type Error = StorageError;

    fn try_from(row: GuestRow) -> Result<Self, Self::Error> {
        let decode = |message: String| StorageError::Decode { kind: "guest", message };
        Ok(Guest {
            status: row.status.parse().map_err(|e| decode(format!("{e}")))?,
            guest_type: row.guest_type.parse().map_err(|e| decode(format!("{e}")))?,
            version: u64::try_from(row.version).map_err(|e| decode(e.to_string()))?,
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            organization: row.organization,
            position: row.position,
            seat_number: row.seat_number,
            biography: row.biography,
            protocol_notes: row.protocol_notes,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    title: String,
    date: DateTime<Utc>,
    location: String,
    description: Option<String>,
    status: String,
    seat_layout: Option<Json<GridLayout>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StorageError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            status: row.status.parse().map_err(|e| StorageError::Decode {
                kind: "event",
                message: format!("{e}"),
            })?,
            id: row.id,
            title: row.title,
            date: row.date,
            location: row.location,
            description: row.description,
            seat_layout: row.seat_layout.map(|Json(layout)| layout),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const GUEST_COLUMNS: &str = "id, event_id, name, organization, position, seat_number, status, \
     guest_type, biography, protocol_notes, updated_at, version";

const EVENT_COLUMNS: &str =
    "id, title, date, location, description, status, seat_layout, created_at, updated_at";

fn db_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

async fn insert_guest(tx: &mut Transaction<'_, Postgres>, guest: &Guest) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO guests (id, event_id, name, organization, position, seat_number, status,
                            guest_type, biography, protocol_notes, updated_at, version)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(&guest.id)
    .bind(&guest.event_id)
    .bind(&guest.name)
    .bind(&guest.organization)
    .bind(&guest.position)
    .bind(&guest.seat_number)
    .bind(guest.status.as_str())
    .bind(guest.guest_type.as_str())
    .bind(&guest.biography)
    .bind(&guest.protocol_notes)
    .bind(guest.updated_at)
    .bind(db_version(guest.version))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl GuestStore for PgStore {
    async fn list_guests(&self, event_id: &str) -> StorageResult<Vec<Guest>> {
        let rows = sqlx::query_as::<_, GuestRow>(&format!(
            "SELECT {GUEST_COLUMNS} FROM guests WHERE event_id = $1 ORDER BY position_no"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Guest::try_from).collect()
    }

    async fn create_guest(&self, guest: &Guest) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_guest(&mut tx, guest).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_guests(&self, guests: &[Guest]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for guest in guests {
            insert_guest(&mut tx, guest).await?;
        }
        tx.commit().await?;
        debug!(count = guests.len(), "Guests inserted");
        Ok(())
    }

    async fn update_guest(&self, id: &str, patch: &GuestPatch) -> StorageResult<Guest> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, GuestRow>(&format!(
            "SELECT {GUEST_COLUMNS} FROM guests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StorageError::guest_not_found(id))?;

        let mut guest = Guest::try_from(row)?;
        patch.apply_to(&mut guest);

        sqlx::query(
            r#"
            UPDATE guests
            SET name = $2, organization = $3, position = $4, seat_number = $5, status = $6,
                guest_type = $7, biography = $8, protocol_notes = $9, updated_at = $10, version = $11
            WHERE id = $1
            "#,
        )
        .bind(&guest.id)
        .bind(&guest.name)
        .bind(&guest.organization)
        .bind(&guest.position)
        .bind(&guest.seat_number)
        .bind(guest.status.as_str())
        .bind(guest.guest_type.as_str())
        .bind(&guest.biography)
        .bind(&guest.protocol_notes)
        .bind(guest.updated_at)
        .bind(db_version(guest.version))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(guest)
    }

    async fn delete_guest(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM guests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::guest_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn list_events(&self) -> StorageResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY date, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }

    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Event::try_from).transpose()
    }

    async fn create_event(&self, event: &Event) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, title, date, location, description, status, seat_layout,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.status.as_str())
        .bind(event.seat_layout.as_ref().map(Json))
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> StorageResult<Event> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StorageError::event_not_found(id))?;

        let mut event = Event::try_from(row)?;
        patch.apply_to(&mut event);

        sqlx::query(
            r#"
            UPDATE events
            SET title = $2, date = $3, location = $4, description = $5, status = $6,
                seat_layout = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.status.as_str())
        .bind(event.seat_layout.as_ref().map(Json))
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(event)
    }

    async fn delete_event(&self, id: &str) -> StorageResult<()> {
        // гости удаляются каскадом (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::event_not_found(id));
        }
        Ok(())
    }
}
