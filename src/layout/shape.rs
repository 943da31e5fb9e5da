//! shape.rs
//!
//! Вывод формы сетки (ряды и число колонок) из номеров мест гостей.
//!
//! Форма целиком определяется максимальным индексом в каждой группе:
//! ряды - группы в порядке ASCII, колонки - наибольший индекс среди всех групп.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::seat_id::SeatIdentifier;
use super::LayoutError;
use crate::models::Guest;

/// Группа -> наибольший встреченный индекс.
pub type GroupMaxima = BTreeMap<String, u32>;

/// Максимальный индекс по каждой группе.
///
/// Гости без места или с нераспознанным номером ничего не вносят.
/// Результат не зависит от порядка гостей.
pub fn analyze(guests: &[Guest]) -> GroupMaxima {
    let mut maxima = GroupMaxima::new();
    for seat in guests.iter().filter_map(Guest::seat) {
        let max = maxima.entry(seat.group).or_insert(0);
        *max = (*max).max(seat.index);
    }
    maxima
}

/// Размер сетки по номерам мест гостей.
pub fn compute_grid_size(guests: &[Guest]) -> GridShape {
    GridShape::from_maxima(&analyze(guests))
}

/// Форма сетки: упорядоченные метки рядов и общее число колонок.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridShape {
    pub row_labels: Vec<String>,
    pub cols: u32,
}

impl GridShape {
    pub fn new(row_labels: Vec<String>, cols: u32) -> Self {
        Self { row_labels, cols }
    }

    /// BTreeMap уже отсортирован побайтово, т.е. "AA" стоит между "A" и "B".
    pub fn from_maxima(maxima: &GroupMaxima) -> Self {
        Self {
            row_labels: maxima.keys().cloned().collect(),
            cols: maxima.values().copied().max().unwrap_or(0),
        }
    }

    /// Ручная схема `rows x cols`: ряды A..Z, дальше R27, R28, ...
    pub fn manual(rows: usize, cols: u32) -> Self {
        let row_labels = (0..rows)
            .map(|r| match u8::try_from(r) {
                Ok(r) if r < 26 => char::from(b'A' + r).to_string(),
                _ => format!("R{}", r + 1),
            })
            .collect();
        Self { row_labels, cols }
    }

    pub fn rows(&self) -> usize {
        self.row_labels.len()
    }

    /// Пустая форма означает "схему вывести нельзя": рисовать и материализовать нечего.
    pub fn is_empty(&self) -> bool {
        self.row_labels.is_empty()
    }

    pub fn cell_count(&self) -> u64 {
        self.row_labels.len() as u64 * u64::from(self.cols)
    }

    pub fn contains(&self, seat: &SeatIdentifier) -> bool {
        seat.index >= 1 && seat.index <= self.cols && self.row_labels.iter().any(|r| *r == seat.group)
    }
}

/// Явно импортированная схема зала: `{ rows, cols, rowLabels }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    pub rows: usize,
    pub cols: u32,
    pub row_labels: Vec<String>,
}

impl GridLayout {
    /// Проверяет импорт и превращает его в форму сетки.
    ///
    /// Меток должно быть не меньше `rows` (лишние отбрасываются), метки непустые и уникальные.
    pub fn to_shape(&self) -> Result<GridShape, LayoutError> {
        if self.row_labels.len() < self.rows {
            return Err(LayoutError::MissingRowLabels {
                rows: self.rows,
                labels: self.row_labels.len(),
            });
        }
        let labels: Vec<String> = self.row_labels.iter().take(self.rows).cloned().collect();
        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(LayoutError::EmptyRowLabel);
            }
            if !seen.insert(label.as_str()) {
                return Err(LayoutError::DuplicateRowLabel(label.clone()));
            }
        }
        Ok(GridShape::new(labels, self.cols))
    }
}

impl From<&GridShape> for GridLayout {
    fn from(shape: &GridShape) -> Self {
        Self {
            rows: shape.rows(),
            cols: shape.cols,
            row_labels: shape.row_labels.clone(),
        }
    }
}

/// Инкрементальный индекс формы: мультимножество индексов по группам.
///
/// Позволяет узнать, изменилась ли форма после смены места одного гостя,
/// не перебирая всех гостей заново.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeIndex {
    groups: BTreeMap<String, BTreeMap<u32, usize>>,
}

impl ShapeIndex {
    pub fn from_guests(guests: &[Guest]) -> Self {
        let mut index = Self::default();
        for seat in guests.iter().filter_map(Guest::seat) {
            index.insert(&seat);
        }
        index
    }

    pub fn insert(&mut self, seat: &SeatIdentifier) {
        *self
            .groups
            .entry(seat.group.clone())
            .or_default()
            .entry(seat.index)
            .or_insert(0) += 1;
    }

    pub fn remove(&mut self, seat: &SeatIdentifier) {
        let Some(indices) = self.groups.get_mut(&seat.group) else {
            return;
        };
        if let Some(count) = indices.get_mut(&seat.index) {
            *count -= 1;
            if *count == 0 {
                indices.remove(&seat.index);
            }
        }
        if indices.is_empty() {
            self.groups.remove(&seat.group);
        }
    }

    pub fn maxima(&self) -> GroupMaxima {
        self.groups
            .iter()
            .filter_map(|(group, indices)| {
                indices.last_key_value().map(|(max, _)| (group.clone(), *max))
            })
            .collect()
    }

    pub fn shape(&self) -> GridShape {
        GridShape::from_maxima(&self.maxima())
    }
}

/// Сводка по схеме зала.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSummary {
    pub total_tables: usize,
    /// Сумма максимальных индексов по группам, а не rows * cols.
    pub total_seats: u64,
    /// Гости с любым непустым номером места, включая нераспознанные.
    pub assigned_seats: usize,
    pub table_details: Vec<TableDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDetail {
    pub table_id: String,
    pub max_seat: u32,
}

pub fn summarize(guests: &[Guest]) -> LayoutSummary {
    let maxima = analyze(guests);
    LayoutSummary {
        total_tables: maxima.len(),
        total_seats: maxima.values().map(|max| u64::from(*max)).sum(),
        assigned_seats: guests.iter().filter(|g| g.is_seated()).count(),
        table_details: maxima
            .into_iter()
            .map(|(table_id, max_seat)| TableDetail { table_id, max_seat })
            .collect(),
    }
}
