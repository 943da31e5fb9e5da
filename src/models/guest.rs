use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::{double_option, UnknownVariant};
use crate::layout::seat_id::{self, SeatIdentifier};

/// Статус прибытия гостя
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestStatus {
    Arrived,
    #[default]
    NotArrived,
    Cancelled,
}

impl GuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuestStatus::Arrived => "arrived",
            GuestStatus::NotArrived => "not_arrived",
            GuestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for GuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arrived" => Ok(GuestStatus::Arrived),
            "not_arrived" => Ok(GuestStatus::NotArrived),
            "cancelled" => Ok(GuestStatus::Cancelled),
            other => Err(UnknownVariant { kind: "guest status", value: other.to_string() }),
        }
    }
}

/// Категория гостя (VIP, обычный и т.д.)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestType {
    Vip,
    #[default]
    Regular,
    Staff,
    Press,
}

impl GuestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuestType::Vip => "vip",
            GuestType::Regular => "regular",
            GuestType::Staff => "staff",
            GuestType::Press => "press",
        }
    }
}

impl fmt::Display for GuestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuestType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vip" => Ok(GuestType::Vip),
            "regular" => Ok(GuestType::Regular),
            "staff" => Ok(GuestType::Staff),
            "press" => Ok(GuestType::Press),
            other => Err(UnknownVariant { kind: "guest type", value: other.to_string() }),
        }
    }
}

/// Гость мероприятия.
///
/// `seat_number` хранится как есть: строка, не подходящая под формат `GROUP-INDEX`,
/// сохраняется, но при выводе схемы зала считается "без места".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: String,
    pub event_id: String,
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub seat_number: Option<String>,
    #[serde(default)]
    pub status: GuestStatus,
    #[serde(rename = "type", default)]
    pub guest_type: GuestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(default)]
    pub protocol_notes: Vec<String>,
    pub updated_at: DateTime<Utc>,
    /// Растёт на каждом принятом изменении; нужен для обнаружения потерянных обновлений.
    #[serde(default)]
    pub version: u64,
}

impl Guest {
    pub fn new(event_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: event_id.into(),
            name: name.into(),
            organization: String::new(),
            position: String::new(),
            seat_number: None,
            status: GuestStatus::default(),
            guest_type: GuestType::default(),
            biography: None,
            protocol_notes: Vec::new(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_seat(mut self, seat: impl Into<String>) -> Self {
        self.seat_number = Some(seat.into());
        self
    }

    /// Разобранный номер места или `None`, если места нет или формат не распознан.
    pub fn seat(&self) -> Option<SeatIdentifier> {
        seat_id::parse_seat_number(self.seat_number.as_deref())
    }

    /// Номер места без разделителя, для сравнения с идентификатором ячейки.
    pub fn normalized_seat(&self) -> Option<String> {
        self.seat_number
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(seat_id::normalize)
    }

    pub fn is_seated(&self) -> bool {
        self.seat_number.as_deref().is_some_and(|raw| !raw.is_empty())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

/// Запрос на создание гостя.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGuest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub organization: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub position: String,
    #[serde(default)]
    pub seat_number: Option<String>,
    #[serde(default)]
    pub status: GuestStatus,
    #[serde(rename = "type", default)]
    pub guest_type: GuestType,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub protocol_notes: Vec<String>,
}

impl NewGuest {
    /// Номер места здесь не проверяется: это делает сессия при назначении.
    pub fn into_guest(self, event_id: &str) -> Guest {
        Guest {
            organization: self.organization,
            position: self.position,
            seat_number: self.seat_number,
            status: self.status,
            guest_type: self.guest_type,
            biography: self.biography,
            protocol_notes: self.protocol_notes,
            ..Guest::new(event_id, self.name)
        }
    }
}

/// Частичное обновление гостя.
///
/// `seat_number` и `biography` трёхзначные: поле отсутствует - не менять,
/// `null` - очистить, значение - установить.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuestPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GuestStatus>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub guest_type: Option<GuestType>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub biography: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_notes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl GuestPatch {
    pub fn seat(seat_number: Option<String>) -> Self {
        Self { seat_number: Some(seat_number), ..Self::default() }
    }

    /// Патч, переводящий `before` в `after` (только изменившиеся поля).
    pub fn diff(before: &Guest, after: &Guest) -> Self {
        fn changed<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
            (a != b).then(|| b.clone())
        }

        Self {
            name: changed(&before.name, &after.name),
            organization: changed(&before.organization, &after.organization),
            position: changed(&before.position, &after.position),
            seat_number: changed(&before.seat_number, &after.seat_number),
            status: changed(&before.status, &after.status),
            guest_type: changed(&before.guest_type, &after.guest_type),
            biography: changed(&before.biography, &after.biography),
            protocol_notes: changed(&before.protocol_notes, &after.protocol_notes),
            updated_at: changed(&before.updated_at, &after.updated_at),
            version: changed(&before.version, &after.version),
        }
    }

    pub fn apply_to(&self, guest: &mut Guest) {
        if let Some(name) = &self.name {
            guest.name = name.clone();
        }
        if let Some(organization) = &self.organization {
            guest.organization = organization.clone();
        }
        if let Some(position) = &self.position {
            guest.position = position.clone();
        }
        if let Some(seat_number) = &self.seat_number {
            guest.seat_number = seat_number.clone();
        }
        if let Some(status) = self.status {
            guest.status = status;
        }
        if let Some(guest_type) = self.guest_type {
            guest.guest_type = guest_type;
        }
        if let Some(biography) = &self.biography {
            guest.biography = biography.clone();
        }
        if let Some(notes) = &self.protocol_notes {
            guest.protocol_notes = notes.clone();
        }
        if let Some(updated_at) = self.updated_at {
            guest.updated_at = updated_at;
        }
        if let Some(version) = self.version {
            guest.version = version;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
