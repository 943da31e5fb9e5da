//! grid.rs
//!
//! Материализация сетки мест и её инкрементальная сверка с коллекцией гостей.
//!
//! Ячейка адресуется как `<ряд><колонка>` без разделителя (`A1`), а у гостя номер
//! хранится с дефисом (`A-1`); сопоставление идёт через [`normalize`].
//! Если на одну ячейку претендуют несколько гостей, место получает первый по порядку
//! коллекции, остальные попадают в список конфликтов.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::seat_id::{normalize, parse_seat_number};
use super::shape::{GridShape, ShapeIndex};
use crate::models::Guest;

/// Одна ячейка сетки.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatCell {
    pub row: String,
    pub col: u32,
    pub id: String,
    pub guest_id: Option<String>,
}

/// Откуда взялась форма сетки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSource {
    /// Выведена из номеров мест гостей; меняется вместе с ними.
    Inferred,
    /// Задана явно (импорт или ручная схема); не меняется от правок гостей.
    Explicit,
}

/// Несколько гостей претендуют на одну ячейку.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatConflict {
    pub cell_id: String,
    pub occupant_id: String,
    pub displaced: Vec<String>,
}

/// Смена места одного гостя (назначение, снятие или удаление гостя).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatChange {
    pub guest_id: String,
    pub previous: Option<String>,
    pub next: Option<String>,
}

impl SeatChange {
    pub fn new(guest_id: impl Into<String>, previous: Option<String>, next: Option<String>) -> Self {
        Self { guest_id: guest_id.into(), previous, next }
    }

    pub fn is_noop(&self) -> bool {
        self.previous == self.next
    }
}

/// Результат инкрементальной сверки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    /// Пересчитаны только перечисленные ячейки.
    Cells(Vec<String>),
    /// Форма изменилась, сетка построена заново.
    Reshaped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    shape: GridShape,
    source: ShapeSource,
    cells: Vec<SeatCell>,
    // при явных метках вида "A" и "A1" один id может встретиться дважды
    positions: HashMap<String, Vec<usize>>,
    conflicts: BTreeMap<String, SeatConflict>,
    index: ShapeIndex,
}

impl Grid {
    /// Сетка, выведенная из самих гостей.
    pub fn materialize(guests: &[Guest]) -> Self {
        let index = ShapeIndex::from_guests(guests);
        Self::build(index.shape(), ShapeSource::Inferred, guests, index)
    }

    /// Сетка заданной извне формы. Гости вне её не размещаются.
    pub fn materialize_with(shape: GridShape, guests: &[Guest]) -> Self {
        Self::build(shape, ShapeSource::Explicit, guests, ShapeIndex::from_guests(guests))
    }

    fn build(shape: GridShape, source: ShapeSource, guests: &[Guest], index: ShapeIndex) -> Self {
        let mut claims: HashMap<String, Vec<&str>> = HashMap::new();
        for guest in guests {
            if let Some(key) = guest.normalized_seat() {
                claims.entry(key).or_default().push(guest.id.as_str());
            }
        }

        let capacity = usize::try_from(shape.cell_count()).unwrap_or(0);
        let mut cells = Vec::with_capacity(capacity);
        let mut positions: HashMap<String, Vec<usize>> = HashMap::with_capacity(capacity);
        let mut conflicts = BTreeMap::new();

        for row in &shape.row_labels {
            for col in 1..=shape.cols {
                let id = format!("{row}{col}");
                let claimants = claims.get(&id).map(Vec::as_slice).unwrap_or_default();
                let occupant = claimants.first().map(|id| id.to_string());

                if let [first, rest @ ..] = claimants {
                    if !rest.is_empty() {
                        let conflict = SeatConflict {
                            cell_id: id.clone(),
                            occupant_id: first.to_string(),
                            displaced: rest.iter().map(|id| id.to_string()).collect(),
                        };
                        warn!(
                            cell = %conflict.cell_id,
                            occupant = %conflict.occupant_id,
                            displaced = ?conflict.displaced,
                            "Duplicate seat occupancy, first guest keeps the seat"
                        );
                        conflicts.insert(id.clone(), conflict);
                    }
                }

                positions.entry(id.clone()).or_default().push(cells.len());
                cells.push(SeatCell { row: row.clone(), col, id, guest_id: occupant });
            }
        }

        debug!(rows = shape.rows(), cols = shape.cols, ?source, "Grid materialized");

        Self { shape, source, cells, positions, conflicts, index }
    }

    /// Применяет смену места одного гостя.
    ///
    /// `guests` - коллекция уже после изменения. Для выведенной сетки при смене формы
    /// (новая группа, новый максимум или исчезнувший максимум) сетка строится заново,
    /// иначе пересчитываются только старая и новая ячейки. Итог всегда совпадает с
    /// `materialize` по тем же гостям.
    pub fn reconcile(&mut self, change: &SeatChange, guests: &[Guest]) -> Reconciliation {
        if change.is_noop() {
            return Reconciliation::Unchanged;
        }

        if let Some(previous) = parse_seat_number(change.previous.as_deref()) {
            self.index.remove(&previous);
        }
        if let Some(next) = parse_seat_number(change.next.as_deref()) {
            self.index.insert(&next);
        }

        if self.source == ShapeSource::Inferred {
            let shape = self.index.shape();
            if shape != self.shape {
                debug!(guest = %change.guest_id, "Seat change alters grid shape, rebuilding");
                let index = std::mem::take(&mut self.index);
                *self = Self::build(shape, ShapeSource::Inferred, guests, index);
                return Reconciliation::Reshaped;
            }
        }

        let mut touched: Vec<String> = Vec::with_capacity(2);
        for raw in [&change.previous, &change.next].into_iter().flatten() {
            if raw.is_empty() {
                continue;
            }
            let key = normalize(raw);
            if touched.contains(&key) {
                continue;
            }
            if let Some(positions) = self.positions.get(&key).cloned() {
                self.resolve_cell(&key, &positions, guests);
                touched.push(key);
            }
        }
        Reconciliation::Cells(touched)
    }

    fn resolve_cell(&mut self, key: &str, positions: &[usize], guests: &[Guest]) {
        let mut claimants = guests
            .iter()
            .filter(|g| g.normalized_seat().as_deref() == Some(key))
            .map(|g| g.id.clone());
        let occupant = claimants.next();
        let displaced: Vec<String> = claimants.collect();

        for &pos in positions {
            self.cells[pos].guest_id = occupant.clone();
        }

        match occupant {
            Some(occupant_id) if !displaced.is_empty() => {
                warn!(cell = %key, occupant = %occupant_id, displaced = ?displaced, "Duplicate seat occupancy, first guest keeps the seat");
                self.conflicts.insert(
                    key.to_string(),
                    SeatConflict { cell_id: key.to_string(), occupant_id, displaced },
                );
            }
            _ => {
                self.conflicts.remove(key);
            }
        }
    }

    pub fn shape(&self) -> &GridShape {
        &self.shape
    }

    pub fn source(&self) -> ShapeSource {
        self.source
    }

    pub fn cells(&self) -> &[SeatCell] {
        &self.cells
    }

    /// Ряды сетки по порядку.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[SeatCell])> {
        // при cols == 0 ячеек нет, и chunks(1) просто ничего не отдаст
        let width = (self.shape.cols as usize).max(1);
        self.shape
            .row_labels
            .iter()
            .map(String::as_str)
            .zip(self.cells.chunks(width))
    }

    pub fn cell(&self, id: &str) -> Option<&SeatCell> {
        self.positions
            .get(id)
            .and_then(|positions| positions.first())
            .map(|&pos| &self.cells[pos])
    }

    pub fn occupant(&self, id: &str) -> Option<&str> {
        self.cell(id).and_then(|cell| cell.guest_id.as_deref())
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &SeatConflict> {
        self.conflicts.values()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.guest_id.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(id: &str, seat: Option<&str>) -> Guest {
        let guest = Guest::new("ev", id).with_id(id);
        match seat {
            Some(seat) => guest.with_seat(seat),
            None => guest,
        }
    }

    fn move_guest(guests: &mut [Guest], id: &str, seat: Option<&str>) -> SeatChange {
        let g = guests.iter_mut().find(|g| g.id == id).unwrap();
        let previous = g.seat_number.take();
        g.seat_number = seat.map(str::to_string);
        SeatChange::new(id, previous, g.seat_number.clone())
    }

    #[test]
    fn materializes_every_cell_of_the_rectangle() {
        let guests = vec![
            guest("x", Some("A-1")),
            guest("y", Some("A-2")),
            guest("z", Some("B-3")),
        ];
        let grid = Grid::materialize(&guests);

        assert_eq!(grid.cells().len(), 6);
        assert_eq!(grid.occupant("A1"), Some("x"));
        assert_eq!(grid.occupant("A2"), Some("y"));
        assert_eq!(grid.occupant("A3"), None);
        assert!(grid.cell("A3").is_some());
        assert_eq!(grid.occupant("B3"), Some("z"));
        assert_eq!(grid.occupied_count(), 3);

        let rows: Vec<_> = grid.rows().map(|(label, cells)| (label, cells.len())).collect();
        assert_eq!(rows, vec![("A", 3), ("B", 3)]);
    }

    #[test]
    fn empty_collection_gives_empty_grid() {
        let guests = vec![guest("x", None), guest("y", Some("lobby"))];
        let grid = Grid::materialize(&guests);
        assert!(grid.is_empty());
        assert!(grid.shape().is_empty());
        assert_eq!(grid.rows().count(), 0);
    }

    #[test]
    fn duplicate_claims_first_seen_wins() {
        let guests = vec![
            guest("first", Some("A-1")),
            guest("second", Some("A-1")),
            guest("third", Some("A1")),
        ];
        let grid = Grid::materialize(&guests);

        assert_eq!(grid.occupant("A1"), Some("first"));
        let conflicts: Vec<_> = grid.conflicts().collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].displaced, vec!["second", "third"]);
    }

    #[test]
    fn reassignment_touches_only_old_and_new_cells() {
        let mut guests = vec![
            guest("x", Some("A-1")),
            guest("y", Some("A-3")),
            guest("z", Some("B-2")),
        ];
        let mut grid = Grid::materialize(&guests);
        let before = grid.clone();

        let change = move_guest(&mut guests, "x", Some("A-2"));
        let outcome = grid.reconcile(&change, &guests);

        assert_eq!(outcome, Reconciliation::Cells(vec!["A1".into(), "A2".into()]));
        assert_eq!(grid.occupant("A1"), None);
        assert_eq!(grid.occupant("A2"), Some("x"));
        for (old, new) in before.cells().iter().zip(grid.cells()) {
            if old.id != "A1" && old.id != "A2" {
                assert_eq!(old, new);
            }
        }
        assert_eq!(grid, Grid::materialize(&guests));
    }

    #[test]
    fn deleting_a_guest_frees_the_seat() {
        let mut guests = vec![
            guest("x", Some("A-1")),
            guest("y", Some("A-2")),
            guest("z", Some("B-2")),
        ];
        let mut grid = Grid::materialize(&guests);

        let removed = guests.remove(0);
        let change = SeatChange::new(removed.id, removed.seat_number, None);
        let outcome = grid.reconcile(&change, &guests);

        assert_eq!(outcome, Reconciliation::Cells(vec!["A1".into()]));
        assert_eq!(grid.occupant("A1"), None);
        assert_eq!(grid.occupant("A2"), Some("y"));
    }

    #[test]
    fn vacated_duplicate_passes_to_next_claimant() {
        let mut guests = vec![guest("first", Some("A-1")), guest("second", Some("A-1"))];
        let mut grid = Grid::materialize(&guests);
        assert_eq!(grid.conflicts().count(), 1);

        let change = move_guest(&mut guests, "first", None);
        grid.reconcile(&change, &guests);

        assert_eq!(grid.occupant("A1"), Some("second"));
        assert_eq!(grid.conflicts().count(), 0);
    }

    #[test]
    fn new_group_reshapes_inferred_grid() {
        let mut guests = vec![guest("x", Some("A-1")), guest("y", None)];
        let mut grid = Grid::materialize(&guests);

        let change = move_guest(&mut guests, "y", Some("C-4"));
        assert_eq!(grid.reconcile(&change, &guests), Reconciliation::Reshaped);
        assert_eq!(grid.shape().row_labels, vec!["A", "C"]);
        assert_eq!(grid.shape().cols, 4);
        assert_eq!(grid.occupant("C4"), Some("y"));
    }

    #[test]
    fn explicit_grid_keeps_its_shape() {
        let mut guests = vec![guest("x", Some("A-1")), guest("y", Some("Z-9"))];
        let mut grid = Grid::materialize_with(GridShape::manual(2, 3), &guests);

        assert_eq!(grid.source(), ShapeSource::Explicit);
        assert_eq!(grid.cells().len(), 6);
        assert_eq!(grid.occupant("A1"), Some("x"));
        assert_eq!(grid.occupied_count(), 1);

        let change = move_guest(&mut guests, "y", Some("B-3"));
        assert_eq!(grid.reconcile(&change, &guests), Reconciliation::Cells(vec!["B3".into()]));
        assert_eq!(grid.occupant("B3"), Some("y"));
        assert_eq!(grid.shape(), &GridShape::manual(2, 3));
    }

    #[test]
    fn noop_change_is_unchanged() {
        let guests = vec![guest("x", Some("A-1"))];
        let mut grid = Grid::materialize(&guests);
        let change = SeatChange::new("x", Some("A-1".into()), Some("A-1".into()));
        assert_eq!(grid.reconcile(&change, &guests), Reconciliation::Unchanged);
    }
}
