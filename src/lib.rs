pub mod chart;
pub mod container;
pub mod core;
pub mod grid;
pub mod interaction;
pub mod render;
pub mod runtime;
#[cfg(target_arch = "wasm32")]
pub mod wasm_api;

use thiserror::Error;

/// Failures surfaced synchronously by the chart API.
///
/// A failing change observer is not one of them: the grid logs and
/// discards it (see [`grid::ChangeCallback`]).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("cell ({col}, {row}) is outside the {width}x{height} grid")]
    OutOfRange {
        col: usize,
        row: usize,
        width: usize,
        height: usize,
    },

    #[error("expected {expected_rows}x{expected_cols} values, got {rows} rows (row widths: {cols:?})")]
    DimensionMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: Vec<usize>,
    },
}

pub type Result<T> = std::result::Result<T, error_stack::Report<ChartError>>;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

pub mod prelude {
    pub use crate::chart::*;
    pub use crate::container::*;
    pub use crate::core::*;
    pub use crate::grid::*;
    pub use crate::interaction::*;
    pub use crate::render::*;
    pub use crate::runtime::*;
    pub use crate::{ChartError, Result};
}
