//! spreadsheet.rs
//!
//! Импорт и экспорт списка гостей в CSV.
//!
//! Заголовки - как в исходных таблицах организаторов (이름, 소속, ...), английские
//! синонимы тоже принимаются. Номер места переносится как есть, без разбора.

use chrono::Utc;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use thiserror::Error;
use tracing::debug;

use crate::models::{Guest, GuestStatus, GuestType};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const NAME: &[&str] = &["이름", "name"];
const ORGANIZATION: &[&str] = &["소속", "organization"];
const POSITION: &[&str] = &["직함", "position"];
const GUEST_TYPE: &[&str] = &["구분", "VIP 여부", "type"];
const SEAT: &[&str] = &["좌석번호", "seat", "seatNumber", "seat number"];
const STATUS: &[&str] = &["상태", "status"];
const BIOGRAPHY: &[&str] = &["내빈정보", "biography"];
const NOTES: &[&str] = &["의전특이사항", "protocol notes", "protocolNotes"];

const EXPORT_HEADERS: [&str; 8] = ["이름", "소속", "직함", "구분", "좌석번호", "상태", "내빈정보", "의전특이사항"];
const TEMPLATE_HEADERS: [&str; 7] = ["이름", "소속", "직함", "구분", "좌석번호", "내빈정보", "의전특이사항"];

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("guest list has no name column (이름)")]
    MissingNameColumn,
    #[error("cannot write guest list: {0}")]
    Write(String),
}

struct Columns {
    name: usize,
    organization: Option<usize>,
    position: Option<usize>,
    guest_type: Option<usize>,
    seat: Option<usize>,
    status: Option<usize>,
    biography: Option<usize>,
    notes: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, TransferError> {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
        };
        Ok(Self {
            name: find(NAME).ok_or(TransferError::MissingNameColumn)?,
            organization: find(ORGANIZATION),
            position: find(POSITION),
            guest_type: find(GUEST_TYPE),
            seat: find(SEAT),
            status: find(STATUS),
            biography: find(BIOGRAPHY),
            notes: find(NOTES),
        })
    }
}

fn field(row: &StringRecord, column: Option<usize>) -> String {
    column
        .and_then(|idx| row.get(idx))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn parse_status(raw: &str) -> GuestStatus {
    match raw {
        "도착" => GuestStatus::Arrived,
        "불참" => GuestStatus::Cancelled,
        other => other.to_ascii_lowercase().parse().unwrap_or_default(),
    }
}

fn status_label(status: GuestStatus) -> &'static str {
    match status {
        GuestStatus::Arrived => "도착",
        GuestStatus::Cancelled => "불참",
        GuestStatus::NotArrived => "미도착",
    }
}

/// Читает список гостей из CSV. Строки без имени пропускаются.
pub fn read_guests(data: &[u8], event_id: &str) -> Result<Vec<Guest>, TransferError> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(data);
    let columns = Columns::resolve(reader.headers()?)?;

    let mut guests = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let row = record?;
        let name = field(&row, Some(columns.name));
        if name.is_empty() {
            skipped += 1;
            continue;
        }

        let guest_type = if field(&row, columns.guest_type).to_uppercase().contains("VIP") {
            GuestType::Vip
        } else {
            GuestType::Regular
        };
        let seat = field(&row, columns.seat);
        let biography = field(&row, columns.biography);

        guests.push(Guest {
            organization: field(&row, columns.organization),
            position: field(&row, columns.position),
            guest_type,
            status: parse_status(&field(&row, columns.status)),
            seat_number: (!seat.is_empty()).then_some(seat),
            biography: (!biography.is_empty()).then_some(biography),
            protocol_notes: field(&row, columns.notes)
                .split('|')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect(),
            updated_at: Utc::now(),
            ..Guest::new(event_id, name)
        });
    }

    debug!(imported = guests.len(), skipped, "Guest list parsed");
    Ok(guests)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, TransferError> {
    let body = writer.into_inner().map_err(|e| TransferError::Write(e.to_string()))?;
    let mut out = Vec::with_capacity(UTF8_BOM.len() + body.len());
    out.extend_from_slice(UTF8_BOM);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Экспорт в CSV с BOM, чтобы Excel правильно открыл хангыль.
pub fn write_guests(guests: &[Guest]) -> Result<Vec<u8>, TransferError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;
    for guest in guests {
        let guest_type = if guest.guest_type == GuestType::Vip { "VIP" } else { "일반" };
        writer.write_record([
            guest.name.as_str(),
            guest.organization.as_str(),
            guest.position.as_str(),
            guest_type,
            guest.seat_number.as_deref().unwrap_or_default(),
            status_label(guest.status),
            guest.biography.as_deref().unwrap_or_default(),
            guest.protocol_notes.join(" | ").as_str(),
        ])?;
    }
    finish(writer)
}

/// Шаблон для заполнения: заголовки и две строки-примера.
pub fn template() -> Result<Vec<u8>, TransferError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(TEMPLATE_HEADERS)?;
    writer.write_record(["홍길동", "경기도청", "국장", "VIP", "A-1", "경기도청 총무국장을 역임하고 있으며...", "휠체어 사용|좌석 앞쪽 배치 필요"])?;
    writer.write_record(["김철수", "수원시청", "과장", "일반", "B-3", "", ""])?;
    finish(writer)
}
