//! assign.rs
//!
//! Проверка назначения места: у места не больше одного живого владельца.
//!
//! Проверка и запись не атомарны относительно внешних правок хранилища;
//! внутри сервиса команды одного мероприятия сериализуются сессией.

use thiserror::Error;

use super::grid::SeatChange;
use super::seat_id::{canonical_seat_number, normalize};
use crate::models::Guest;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssignError {
    #[error("guest {0} not found")]
    UnknownGuest(String),
    #[error("seat {seat} is already taken by {occupant_name}")]
    Conflict {
        seat: String,
        occupant_id: String,
        occupant_name: String,
    },
}

/// Гость, кроме `exclude`, чей номер места совпадает с `seat` после нормализации.
pub fn find_occupant<'a>(seat: &str, exclude: &str, guests: &'a [Guest]) -> Option<&'a Guest> {
    let key = normalize(seat);
    guests
        .iter()
        .find(|g| g.id != exclude && g.normalized_seat().as_deref() == Some(key.as_str()))
}

/// Назначает гостю место `target` (или снимает его, если `target` пустой).
///
/// Ничего не меняет, только вычисляет переход. Прежнее место гостя освобождается
/// тем же переходом. Новое место записывается в форме `GROUP-INDEX`, даже если
/// пришло как идентификатор ячейки (`A2`).
pub fn assign(guest_id: &str, target: Option<&str>, guests: &[Guest]) -> Result<SeatChange, AssignError> {
    let guest = guests
        .iter()
        .find(|g| g.id == guest_id)
        .ok_or_else(|| AssignError::UnknownGuest(guest_id.to_string()))?;
    let previous = guest.seat_number.clone();

    let Some(next) = target.and_then(canonical_seat_number) else {
        return Ok(SeatChange::new(guest_id, previous, None));
    };

    // уже сидит на этом месте
    if guest.normalized_seat() == Some(normalize(&next)) {
        return Ok(SeatChange::new(guest_id, previous.clone(), previous));
    }

    if let Some(occupant) = find_occupant(&next, guest_id, guests) {
        return Err(AssignError::Conflict {
            seat: next,
            occupant_id: occupant.id.clone(),
            occupant_name: occupant.name.clone(),
        });
    }

    Ok(SeatChange::new(guest_id, previous, Some(next)))
}
