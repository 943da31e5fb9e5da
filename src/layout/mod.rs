//! Вывод схемы зала из номеров мест гостей.
//!
//! - [`seat_id`] - разбор номера места `GROUP-INDEX`;
//! - [`shape`] - форма сетки (операции A и B);
//! - [`grid`] - материализация и инкрементальная сверка (операция C);
//! - [`assign`] - проверка конфликтов при назначении.

pub mod assign;
pub mod grid;
pub mod seat_id;
pub mod shape;

pub use assign::{assign, find_occupant, AssignError};
pub use grid::{Grid, Reconciliation, SeatCell, SeatChange, SeatConflict, ShapeSource};
pub use seat_id::{canonical_seat_number, normalize, SeatIdentifier};
pub use shape::{analyze, compute_grid_size, summarize, GridLayout, GridShape, LayoutSummary, ShapeIndex};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout declares {rows} rows but only {labels} row labels")]
    MissingRowLabels { rows: usize, labels: usize },
    #[error("row label must not be empty")]
    EmptyRowLabel,
    #[error("duplicate row label {0:?}")]
    DuplicateRowLabel(String),
    #[error("grid of {cells} cells exceeds the limit of {limit}")]
    TooLarge { cells: u64, limit: u64 },
}
