pub mod event;
pub mod guest;

pub use event::{Event, EventPatch, EventStatus, NewEvent};
pub use guest::{Guest, GuestPatch, GuestStatus, GuestType, NewGuest};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Неизвестное строковое значение перечисления (статус, тип гостя и т.п.)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// Трёхзначное поле патча: отсутствует -> None, null -> Some(None), значение -> Some(Some(v))
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
