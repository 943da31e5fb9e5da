//! seat_id.rs
//!
//! Разбор номера места вида `GROUP-INDEX` ("A-1", "B-12").
//!
//! У номера места две текстовые формы:
//! - хранимая у гостя: с дефисом (`A-1`);
//! - идентификатор ячейки сетки: без разделителя (`A1`).
//! Сопоставление между ними идёт через [`normalize`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Разобранный номер места: группа (ряд/стол) и позиция внутри группы.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatIdentifier {
    pub group: String,
    pub index: u32,
}

impl SeatIdentifier {
    pub fn new(group: impl Into<String>, index: u32) -> Self {
        Self { group: group.into(), index }
    }

    /// Разбирает строку строго по шаблону `^[A-Z]+-[0-9]+$`.
    ///
    /// Никогда не паникует: всё, что не подходит под шаблон (включая пустую строку,
    /// строчные буквы, пробелы по краям и индекс, не влезающий в `u32`), даёт `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (group, index) = raw.split_once('-')?;
        Self::from_parts(group, index)
    }

    /// Разбирает идентификатор ячейки без разделителя: `^[A-Z]+[0-9]+$`.
    pub fn parse_cell_id(raw: &str) -> Option<Self> {
        let split = raw.find(|c: char| !c.is_ascii_uppercase())?;
        let (group, index) = raw.split_at(split);
        Self::from_parts(group, index)
    }

    fn from_parts(group: &str, index: &str) -> Option<Self> {
        if group.is_empty() || !group.bytes().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        // `u32::from_str` принимает ведущий '+', поэтому цифры проверяем сами
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index = index.parse::<u32>().ok()?;
        Some(Self::new(group, index))
    }

    /// Идентификатор ячейки в сетке: `A1`.
    pub fn cell_id(&self) -> String {
        format!("{}{}", self.group, self.index)
    }
}

impl fmt::Display for SeatIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.group, self.index)
    }
}

/// Разбор необязательного номера места гостя.
pub fn parse_seat_number(raw: Option<&str>) -> Option<SeatIdentifier> {
    raw.and_then(SeatIdentifier::parse)
}

/// Убирает первый дефис: `A-1` -> `A1`.
///
/// Это ключ, по которому хранимый номер места сравнивается с идентификатором ячейки.
pub fn normalize(raw: &str) -> String {
    raw.replacen('-', "", 1)
}

/// Приводит номер места к хранимой форме `GROUP-INDEX`.
///
/// Принимает обе формы (`A-2` и `A2`); прочие строки возвращаются как есть,
/// только без пробелов по краям. Пустая строка означает "без места".
pub fn canonical_seat_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let canonical = SeatIdentifier::parse(trimmed)
        .or_else(|| SeatIdentifier::parse_cell_id(trimmed))
        .map(|seat| seat.to_string())
        .unwrap_or_else(|| trimmed.to_string());
    Some(canonical)
}
