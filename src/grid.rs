//! The editable height map: normalized cell values plus derived colors.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use error_stack::Report;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{clamp_unit, round_external, Color, HueRamp, ValueRange};
use crate::{ChartError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    pub col: usize,
    pub row: usize,
}

impl CellCoord {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    value: f64,
    color: Color,
    faded: Color,
}

impl Cell {
    fn new(value: f64, ramp: &HueRamp) -> Self {
        let value = clamp_unit(value);
        Self {
            value,
            color: ramp.sample(value),
            faded: ramp.faded(value),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn faded(&self) -> Color {
        self.faded
    }
}

/// Payload handed to the change observer after a cell edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellChange {
    pub col: usize,
    pub row: usize,
    /// New value in the external domain.
    pub value: f64,
    /// The whole grid in the external domain, `grid[row][col]`.
    pub grid: Vec<Vec<f64>>,
}

type ChangeFn = dyn FnMut(&CellChange) -> anyhow::Result<()> + Send + Sync;

/// Best-effort change observer.
///
/// The grid commits an edit before notifying, and whatever the observer does
/// (returns an error, or panics when built with unwinding) is logged and
/// dropped. A broken observer never rolls back or blocks an edit.
pub struct ChangeCallback(Box<ChangeFn>);

impl ChangeCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&CellChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }

    pub(crate) fn notify(&mut self, change: &CellChange) {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.0)(change))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                col = change.col,
                row = change.row,
                "change callback failed: {e:#}"
            ),
            Err(_) => warn!(
                col = change.col,
                row = change.row,
                "change callback panicked"
            ),
        }
    }
}

impl fmt::Debug for ChangeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangeCallback(..)")
    }
}

/// When the observer hears about an edit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChangeDispatch {
    /// Inside `set_cell_value`, before it returns.
    #[default]
    Immediate,
    /// Queued until [`GridModel::take_pending_changes`]. The queue keeps
    /// only the latest edit per cell.
    Deferred,
}

#[derive(Debug)]
pub struct GridModel {
    width: usize,
    height: usize,
    /// Row-major, `row * width + col`.
    cells: Vec<Cell>,
    range: ValueRange,
    ramp: HueRamp,
    on_change: Option<ChangeCallback>,
    dispatch: ChangeDispatch,
    /// Deferred edits, at most one per cell, oldest first.
    pending: Vec<(CellCoord, f64)>,
}

impl GridModel {
    /// Allocate `width * height` cells from optional external-domain values
    /// (`initial[row][col]`); missing data means every cell starts at 0.
    pub fn initialize(
        width: usize,
        height: usize,
        range: ValueRange,
        ramp: HueRamp,
        initial: Option<&[Vec<f64>]>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Report::new(ChartError::Configuration(format!(
                "grid needs at least one cell, got {width}x{height}"
            ))));
        }

        let mut grid = Self {
            width,
            height,
            cells: vec![Cell::new(0.0, &ramp); width * height],
            range,
            ramp,
            on_change: None,
            dispatch: ChangeDispatch::Immediate,
            pending: Vec::new(),
        };
        if let Some(values) = initial {
            grid.replace_values(values)?;
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn range(&self) -> &ValueRange {
        &self.range
    }

    pub fn ramp(&self) -> &HueRamp {
        &self.ramp
    }

    pub fn set_on_change(&mut self, callback: Option<ChangeCallback>) {
        self.on_change = callback;
    }

    pub fn take_on_change(&mut self) -> Option<ChangeCallback> {
        self.on_change.take()
    }

    /// Put a taken observer back, unless another one was installed since.
    pub fn restore_on_change(&mut self, callback: ChangeCallback) {
        if self.on_change.is_none() {
            self.on_change = Some(callback);
        }
    }

    pub fn dispatch(&self) -> ChangeDispatch {
        self.dispatch
    }

    pub fn set_dispatch(&mut self, dispatch: ChangeDispatch) {
        self.dispatch = dispatch;
    }

    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// Drain the deferred queue. Every payload carries the grid as it is now.
    pub fn take_pending_changes(&mut self) -> Vec<CellChange> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let grid = self.to_external_grid();
        self.pending
            .drain(..)
            .map(|(coord, value)| CellChange {
                col: coord.col,
                row: coord.row,
                value,
                grid: grid.clone(),
            })
            .collect()
    }

    pub fn index_of(&self, coord: CellCoord) -> Option<usize> {
        (coord.col < self.width && coord.row < self.height)
            .then_some(coord.row * self.width + coord.col)
    }

    pub fn coord_of(&self, index: usize) -> Option<CellCoord> {
        (index < self.cells.len())
            .then(|| CellCoord::new(index % self.width, index / self.width))
    }

    pub fn cell(&self, coord: CellCoord) -> Result<&Cell> {
        let index = self.checked_index(coord)?;
        Ok(&self.cells[index])
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, &Cell)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (CellCoord::new(i % width, i / width), c))
    }

    pub fn normalized(&self, coord: CellCoord) -> Result<f64> {
        Ok(self.cell(coord)?.value)
    }

    pub fn color(&self, coord: CellCoord) -> Result<Color> {
        Ok(self.cell(coord)?.color)
    }

    pub fn faded(&self, coord: CellCoord) -> Result<Color> {
        Ok(self.cell(coord)?.faded)
    }

    pub fn external_value(&self, coord: CellCoord) -> Result<f64> {
        Ok(round_external(self.range.to_external(self.normalized(coord)?)))
    }

    /// Store a normalized value (clamped), refresh that cell's colors, then
    /// notify the observer or queue the edit. Returns the new external value.
    pub fn set_cell_value(&mut self, coord: CellCoord, normalized: f64) -> Result<f64> {
        let index = self.checked_index(coord)?;
        self.cells[index] = Cell::new(normalized, &self.ramp);

        let value = round_external(self.range.to_external(self.cells[index].value));
        if self.dispatch == ChangeDispatch::Deferred {
            self.pending.retain(|(c, _)| *c != coord);
            self.pending.push((coord, value));
        } else if self.on_change.is_some() {
            let change = CellChange {
                col: coord.col,
                row: coord.row,
                value,
                grid: self.to_external_grid(),
            };
            if let Some(cb) = self.on_change.as_mut() {
                cb.notify(&change);
            }
        }
        Ok(value)
    }

    /// Replace every cell from external-domain values. Nothing changes unless
    /// the payload matches the grid's dimensions exactly.
    pub fn replace_values(&mut self, values: &[Vec<f64>]) -> Result<()> {
        let rows_match = values.len() == self.height;
        let cols_match = values.iter().all(|row| row.len() == self.width);
        if !rows_match || !cols_match {
            return Err(Report::new(ChartError::DimensionMismatch {
                expected_rows: self.height,
                expected_cols: self.width,
                rows: values.len(),
                cols: values.iter().map(Vec::len).collect(),
            }));
        }

        self.cells = values
            .iter()
            .flatten()
            .map(|&v| Cell::new(self.range.to_normalized(v), &self.ramp))
            .collect();
        Ok(())
    }

    /// External-domain snapshot, `grid[row][col]`, rounded to five decimals.
    pub fn to_external_grid(&self) -> Vec<Vec<f64>> {
        self.cells
            .chunks(self.width)
            .map(|row| {
                row.iter()
                    .map(|c| round_external(self.range.to_external(c.value)))
                    .collect()
            })
            .collect()
    }

    fn checked_index(&self, coord: CellCoord) -> Result<usize> {
        self.index_of(coord).ok_or_else(|| {
            Report::new(ChartError::OutOfRange {
                col: coord.col,
                row: coord.row,
                width: self.width,
                height: self.height,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn grid(width: usize, height: usize) -> GridModel {
        let range = ValueRange::new(0.0, 100.0).unwrap();
        GridModel::initialize(width, height, range, HueRamp::default(), None).unwrap()
    }

    #[test]
    fn starts_at_zero_without_data() {
        let g = grid(2, 2);
        assert_eq!(g.to_external_grid(), vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
        let ramp = HueRamp::default();
        assert!(g.cells().all(|(_, c)| c.color() == ramp.sample(0.0)));
    }

    #[test]
    fn initial_data_is_normalized_and_clamped() {
        let range = ValueRange::new(0.0, 100.0).unwrap();
        let data = vec![vec![25.0, 200.0], vec![-5.0, 100.0]];
        let g = GridModel::initialize(2, 2, range, HueRamp::default(), Some(&data)).unwrap();
        assert_eq!(g.normalized(CellCoord::new(0, 0)).unwrap(), 0.25);
        assert_eq!(g.normalized(CellCoord::new(1, 0)).unwrap(), 1.0);
        assert_eq!(g.normalized(CellCoord::new(0, 1)).unwrap(), 0.0);
        assert_eq!(g.to_external_grid(), vec![vec![25.0, 100.0], vec![0.0, 100.0]]);
    }

    #[test]
    fn set_cell_value_clamps_and_recolors() {
        let mut g = grid(3, 2);
        let c = CellCoord::new(2, 1);
        assert_eq!(g.set_cell_value(c, 1.7).unwrap(), 100.0);
        assert_eq!(g.normalized(c).unwrap(), 1.0);
        assert_eq!(g.color(c).unwrap(), HueRamp::default().sample(1.0));
        assert_eq!(g.faded(c).unwrap(), HueRamp::default().faded(1.0));

        assert_eq!(g.set_cell_value(c, -0.5).unwrap(), 0.0);
        assert_eq!(g.color(c).unwrap(), HueRamp::default().sample(0.0));
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut g = grid(2, 3);
        let err = g.set_cell_value(CellCoord::new(2, 0), 0.5).unwrap_err();
        assert_eq!(
            err.current_context(),
            &ChartError::OutOfRange {
                col: 2,
                row: 0,
                width: 2,
                height: 3
            }
        );
        assert!(g.normalized(CellCoord::new(0, 3)).is_err());
        assert!(g.cells().all(|(_, c)| c.value() == 0.0));
    }

    #[test]
    fn index_mapping_is_row_major() {
        let g = grid(4, 3);
        assert_eq!(g.index_of(CellCoord::new(1, 2)), Some(9));
        assert_eq!(g.coord_of(9), Some(CellCoord::new(1, 2)));
        assert_eq!(g.coord_of(12), None);
        assert_eq!(g.index_of(CellCoord::new(4, 0)), None);
    }

    #[test]
    fn notifies_with_full_grid() {
        let mut g = grid(2, 2);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        g.set_on_change(Some(ChangeCallback::new(move |change| {
            sink.lock().push(change.clone());
            Ok(())
        })));

        g.set_cell_value(CellCoord::new(0, 1), 0.5).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            CellChange {
                col: 0,
                row: 1,
                value: 50.0,
                grid: vec![vec![0.0, 0.0], vec![50.0, 0.0]],
            }
        );
    }

    #[test]
    fn failing_callback_does_not_undo_the_edit() {
        let mut g = grid(2, 2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        g.set_on_change(Some(ChangeCallback::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("observer is broken")
        })));

        assert_eq!(g.set_cell_value(CellCoord::new(1, 1), 0.3).unwrap(), 30.0);
        assert_eq!(g.set_cell_value(CellCoord::new(1, 0), 0.4).unwrap(), 40.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(g.to_external_grid(), vec![vec![0.0, 40.0], vec![0.0, 30.0]]);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let mut g = grid(1, 1);
        g.set_on_change(Some(ChangeCallback::new(|_| panic!("observer exploded"))));
        assert_eq!(g.set_cell_value(CellCoord::new(0, 0), 0.9).unwrap(), 90.0);
        assert_eq!(g.set_cell_value(CellCoord::new(0, 0), 0.1).unwrap(), 10.0);
    }

    #[test]
    fn deferred_edits_wait_and_coalesce_per_cell() {
        let mut g = grid(2, 2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        g.set_on_change(Some(ChangeCallback::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));
        g.set_dispatch(ChangeDispatch::Deferred);

        g.set_cell_value(CellCoord::new(0, 0), 0.2).unwrap();
        g.set_cell_value(CellCoord::new(1, 1), 0.7).unwrap();
        g.set_cell_value(CellCoord::new(0, 0), 0.4).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(g.pending_changes(), 2);

        let changes = g.take_pending_changes();
        let edits: Vec<_> = changes.iter().map(|c| (c.col, c.row, c.value)).collect();
        assert_eq!(edits, vec![(1, 1, 70.0), (0, 0, 40.0)]);
        assert!(changes.iter().all(|c| c.grid == vec![vec![40.0, 0.0], vec![0.0, 70.0]]));
        assert!(g.take_pending_changes().is_empty());
    }

    #[test]
    fn restoring_an_observer_keeps_a_newer_one() {
        let mut g = grid(1, 1);
        g.set_on_change(Some(ChangeCallback::new(|_| Ok(()))));
        let old = g.take_on_change().unwrap();
        assert!(g.take_on_change().is_none());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        g.set_on_change(Some(ChangeCallback::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));
        g.restore_on_change(old);
        g.set_cell_value(CellCoord::new(0, 0), 0.5).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn replace_rejects_mismatched_dimensions() {
        let mut g = grid(2, 2);
        g.set_cell_value(CellCoord::new(0, 0), 0.5).unwrap();

        let err = g.replace_values(&[vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ChartError::DimensionMismatch {
                expected_rows: 2,
                rows: 1,
                ..
            }
        ));
        assert!(g.replace_values(&[vec![1.0, 2.0], vec![3.0]]).is_err());
        assert_eq!(g.to_external_grid(), vec![vec![50.0, 0.0], vec![0.0, 0.0]]);

        g.replace_values(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(g.to_external_grid(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn zero_sized_grid_is_a_configuration_error() {
        let range = ValueRange::new(0.0, 1.0).unwrap();
        let err = GridModel::initialize(0, 3, range, HueRamp::default(), None).unwrap_err();
        assert!(matches!(err.current_context(), ChartError::Configuration(_)));
    }
}
