//! sheets.rs
//!
//! Хранилище поверх Google Sheets v4 (values API).
//!
//! Вкладка `Events` (A:I): id, title, date, location, description, status, createdAt,
//! updatedAt, seatLayout (JSON). Вкладка `Guests` (A:L): id, eventId, name, organization,
//! position, seatNumber, status, type, biography, protocolNotes (через запятую),
//! updatedAt, version. Первая строка каждой вкладки - заголовок.
//!
//! Все вызовы идут через [`CircuitBreaker`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CircuitBreaker, EventStore, GuestStore, StorageError, StorageResult};
use crate::config::{CircuitBreakerConfig, SheetsConfig};
use crate::layout::GridLayout;
use crate::models::{Event, EventPatch, Guest, GuestPatch};

const EVENTS_TAB: &str = "Events";
const GUESTS_TAB: &str = "Guests";
const EVENT_COLUMNS: &str = "A:I";
const GUEST_COLUMNS: &str = "A:L";
const EVENT_LAST_COLUMN: char = 'I';
const GUEST_LAST_COLUMN: char = 'L';

pub struct SheetsStore {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    access_token: Option<String>,
    breaker: CircuitBreaker,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

/// Строка вкладки вместе с её номером в таблице (с единицы, заголовок - строка 1).
struct Located<T> {
    row: usize,
    item: T,
}

impl SheetsStore {
    pub fn new(config: &SheetsConfig, breaker: &CircuitBreakerConfig) -> StorageResult<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| StorageError::Unavailable("GOOGLE_SHEETS_ID is not configured".into()))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| StorageError::Unavailable(format!("invalid sheets base url: {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id,
            access_token: config.access_token.clone(),
            breaker: CircuitBreaker::new(
                breaker.failure_threshold,
                Duration::from_secs(breaker.timeout_seconds),
            ),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// `{base}/v4/spreadsheets/{id}/...segments`
    fn url(&self, segments: &[&str]) -> StorageResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Unavailable("sheets base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> StorageResult<Response> {
        if !self.breaker.can_execute() {
            warn!("Sheets request rejected by circuit breaker");
            return Err(StorageError::CircuitOpen);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.breaker.record_failure();
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            self.breaker.record_failure();
        } else {
            self.breaker.record_success();
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Sheets { status: status.as_u16(), message });
        }
        Ok(response)
    }

    async fn read_range(&self, range: &str) -> StorageResult<Vec<Vec<Value>>> {
        let url = self.url(&["values", range])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.json::<ValueRange>().await?.values)
    }

    async fn append_rows(&self, tab: &str, columns: &str, rows: Vec<Vec<Value>>) -> StorageResult<()> {
        let range = format!("{tab}!{columns}:append");
        let mut url = self.url(&["values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let request = self.request(Method::POST, url).json(&json!({ "values": rows }));
        self.send(request).await?;
        Ok(())
    }

    async fn write_row(&self, tab: &str, last: char, row: usize, values: Vec<Value>) -> StorageResult<()> {
        let range = format!("{tab}!A{row}:{last}{row}");
        let mut url = self.url(&["values", range.as_str()])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let request = self.request(Method::PUT, url).json(&json!({ "values": [values] }));
        self.send(request).await?;
        Ok(())
    }

    async fn sheet_id(&self, tab: &str) -> StorageResult<i64> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        let response = self.send(self.request(Method::GET, url)).await?;
        let spreadsheet: Spreadsheet = response.json().await?;
        spreadsheet
            .sheets
            .into_iter()
            .find(|s| s.properties.title == tab)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| StorageError::Unavailable(format!("sheet {tab} not found")))
    }

    /// Удаляет строки вкладки одним batchUpdate, снизу вверх, чтобы номера не сдвигались.
    async fn delete_rows(&self, tab: &str, mut rows: Vec<usize>) -> StorageResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        rows.sort_unstable_by(|a, b| b.cmp(a));
        let sheet_id = self.sheet_id(tab).await?;
        let requests: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": row - 1,
                            "endIndex": row,
                        }
                    }
                })
            })
            .collect();

        let batch = format!("{}:batchUpdate", self.spreadsheet_id);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Unavailable("sheets base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", batch.as_str()]);
        let request = self.request(Method::POST, url).json(&json!({ "requests": requests }));
        self.send(request).await?;
        Ok(())
    }

    async fn located_guests(&self) -> StorageResult<Vec<Located<Guest>>> {
        let rows = self.read_range(&format!("{GUESTS_TAB}!{GUEST_COLUMNS}")).await?;
        Ok(rows
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, row)| guest_from_row(row).map(|item| Located { row: i + 1, item }))
            .collect())
    }

    async fn located_events(&self) -> StorageResult<Vec<Located<Event>>> {
        let rows = self.read_range(&format!("{EVENTS_TAB}!{EVENT_COLUMNS}")).await?;
        Ok(rows
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, row)| event_from_row(row).map(|item| Located { row: i + 1, item }))
            .collect())
    }
}

fn cell(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn guest_from_row(row: &[Value]) -> Option<Guest> {
    let id = non_empty(cell(row, 0))?;
    let event_id = non_empty(cell(row, 1))?;
    let name = non_empty(cell(row, 2))?;

    Some(Guest {
        id,
        event_id,
        name,
        organization: cell(row, 3),
        position: cell(row, 4),
        seat_number: non_empty(cell(row, 5)),
        status: cell(row, 6).parse().unwrap_or_default(),
        guest_type: cell(row, 7).parse().unwrap_or_default(),
        biography: non_empty(cell(row, 8)),
        protocol_notes: cell(row, 9)
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
        updated_at: timestamp(&cell(row, 10)),
        version: cell(row, 11).trim().parse().unwrap_or(0),
    })
}

fn guest_to_row(guest: &Guest) -> Vec<Value> {
    vec![
        json!(guest.id),
        json!(guest.event_id),
        json!(guest.name),
        json!(guest.organization),
        json!(guest.position),
        json!(guest.seat_number.as_deref().unwrap_or_default()),
        json!(guest.status.as_str()),
        json!(guest.guest_type.as_str()),
        json!(guest.biography.as_deref().unwrap_or_default()),
        json!(guest.protocol_notes.join(", ")),
        json!(guest.updated_at.to_rfc3339()),
        json!(guest.version.to_string()),
    ]
}

fn event_from_row(row: &[Value]) -> Option<Event> {
    let id = non_empty(cell(row, 0))?;
    let title = non_empty(cell(row, 1))?;

    let seat_layout = non_empty(cell(row, 8)).and_then(|raw| {
        serde_json::from_str::<GridLayout>(&raw)
            .map_err(|e| warn!(event = %id, error = %e, "Cannot parse stored seat layout"))
            .ok()
    });

    Some(Event {
        date: timestamp(&cell(row, 2)),
        location: cell(row, 3),
        description: non_empty(cell(row, 4)),
        status: cell(row, 5).parse().unwrap_or_default(),
        created_at: timestamp(&cell(row, 6)),
        updated_at: timestamp(&cell(row, 7)),
        seat_layout,
        id,
        title,
    })
}

fn event_to_row(event: &Event) -> Vec<Value> {
    let layout = event
        .seat_layout
        .as_ref()
        .and_then(|layout| serde_json::to_string(layout).ok())
        .unwrap_or_default();
    vec![
        json!(event.id),
        json!(event.title),
        json!(event.date.to_rfc3339()),
        json!(event.location),
        json!(event.description.as_deref().unwrap_or_default()),
        json!(event.status.as_str()),
        json!(event.created_at.to_rfc3339()),
        json!(event.updated_at.to_rfc3339()),
        json!(layout),
    ]
}

#[async_trait]
impl GuestStore for SheetsStore {
    async fn list_guests(&self, event_id: &str) -> StorageResult<Vec<Guest>> {
        let guests: Vec<Guest> = self
            .located_guests()
            .await?
            .into_iter()
            .map(|l| l.item)
            .filter(|g| g.event_id == event_id)
            .collect();
        debug!(event = %event_id, count = guests.len(), "Guests loaded from sheet");
        Ok(guests)
    }

    async fn create_guest(&self, guest: &Guest) -> StorageResult<()> {
        self.append_rows(GUESTS_TAB, GUEST_COLUMNS, vec![guest_to_row(guest)]).await
    }

    async fn create_guests(&self, guests: &[Guest]) -> StorageResult<()> {
        if guests.is_empty() {
            return Ok(());
        }
        let rows = guests.iter().map(guest_to_row).collect();
        self.append_rows(GUESTS_TAB, GUEST_COLUMNS, rows).await?;
        info!(count = guests.len(), "Guests appended to sheet");
        Ok(())
    }

    async fn update_guest(&self, id: &str, patch: &GuestPatch) -> StorageResult<Guest> {
        let Located { row, item: mut guest } = self
            .located_guests()
            .await?
            .into_iter()
            .find(|l| l.item.id == id)
            .ok_or_else(|| StorageError::guest_not_found(id))?;

        patch.apply_to(&mut guest);
        self.write_row(GUESTS_TAB, GUEST_LAST_COLUMN, row, guest_to_row(&guest)).await?;
        Ok(guest)
    }

    async fn delete_guest(&self, id: &str) -> StorageResult<()> {
        let row = self
            .located_guests()
            .await?
            .into_iter()
            .find(|l| l.item.id == id)
            .map(|l| l.row)
            .ok_or_else(|| StorageError::guest_not_found(id))?;
        self.delete_rows(GUESTS_TAB, vec![row]).await
    }
}

#[async_trait]
impl EventStore for SheetsStore {
    async fn list_events(&self) -> StorageResult<Vec<Event>> {
        Ok(self.located_events().await?.into_iter().map(|l| l.item).collect())
    }

    async fn get_event(&self, id: &str) -> StorageResult<Option<Event>> {
        Ok(self
            .located_events()
            .await?
            .into_iter()
            .map(|l| l.item)
            .find(|e| e.id == id))
    }

    async fn create_event(&self, event: &Event) -> StorageResult<()> {
        self.append_rows(EVENTS_TAB, EVENT_COLUMNS, vec![event_to_row(event)]).await
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> StorageResult<Event> {
        let Located { row, item: mut event } = self
            .located_events()
            .await?
            .into_iter()
            .find(|l| l.item.id == id)
            .ok_or_else(|| StorageError::event_not_found(id))?;

        patch.apply_to(&mut event);
        self.write_row(EVENTS_TAB, EVENT_LAST_COLUMN, row, event_to_row(&event)).await?;
        Ok(event)
    }

    async fn delete_event(&self, id: &str) -> StorageResult<()> {
        let (events, guests) = futures::try_join!(self.located_events(), self.located_guests())?;
        let event_row = events
            .into_iter()
            .find(|l| l.item.id == id)
            .map(|l| l.row)
            .ok_or_else(|| StorageError::event_not_found(id))?;

        let guest_rows: Vec<usize> = guests
            .into_iter()
            .filter(|l| l.item.event_id == id)
            .map(|l| l.row)
            .collect();
        let guest_count = guest_rows.len();

        self.delete_rows(GUESTS_TAB, guest_rows).await?;
        self.delete_rows(EVENTS_TAB, vec![event_row]).await?;
        info!(event = %id, guests = guest_count, "Event and its guests deleted from sheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_row_tolerates_missing_trailing_cells() {
        let row = vec![json!("g-1"), json!("ev-1"), json!("Hong"), json!("MOFA")];
        let guest = guest_from_row(&row).unwrap();
        assert_eq!(guest.organization, "MOFA");
        assert_eq!(guest.seat_number, None);
        assert_eq!(guest.version, 0);
        assert!(guest.protocol_notes.is_empty());
    }

    #[test]
    fn guest_row_without_name_is_skipped() {
        let row = vec![json!("g-1"), json!("ev-1"), json!("")];
        assert!(guest_from_row(&row).is_none());
    }

    #[test]
    fn guest_row_keeps_notes_and_version() {
        let guest = Guest {
            protocol_notes: vec!["wheelchair".into(), "halal".into()],
            version: 7,
            ..Guest::new("ev-1", "Hong").with_seat("A-3")
        };
        let parsed = guest_from_row(&guest_to_row(&guest)).unwrap();
        assert_eq!(parsed.protocol_notes, guest.protocol_notes);
        assert_eq!(parsed.version, 7);
        assert_eq!(parsed.seat_number.as_deref(), Some("A-3"));
    }

    #[test]
    fn broken_layout_json_is_dropped() {
        let row = vec![
            json!("ev-1"),
            json!("Forum"),
            json!("2025-10-01T09:00:00Z"),
            json!("Seoul"),
            json!(""),
            json!("ongoing"),
            json!(""),
            json!(""),
            json!("{not json"),
        ];
        let event = event_from_row(&row).unwrap();
        assert!(event.seat_layout.is_none());
        assert_eq!(event.status.as_str(), "ongoing");
    }
}
