//! WASM API exports for JavaScript interop
//!
//! `#[wasm_bindgen]` wrapper around [`SurfaceChart`]. Only compiled when
//! targeting wasm32.
//!
//! JS functions are not `Send`, so an `onChange` function lives outside the
//! chart. Edits queue inside the chart (one entry per cell at most) and are
//! handed to the function right after a JS call that made them, or once per
//! frame for edits made by dragging. Without a function, JS can poll with
//! [`JsSurfaceChart::drain_changes`].

#![cfg(target_arch = "wasm32")]

use bevy::prelude::{NonSend, Res, Update};
use tracing::warn;
use wasm_bindgen::prelude::*;

use crate::chart::SurfaceChart;
use crate::container::CanvasContainer;
use crate::core::SurfaceConfig;
use crate::grid::CellChange;
use crate::render::SharedChart;
use crate::runtime::surface_app;

fn js_error(report: error_stack::Report<crate::ChartError>) -> JsValue {
    JsValue::from_str(&report.current_context().to_string())
}

/// The page's `onChange` function, kept on the main thread.
#[derive(Clone)]
struct JsChangeListener(js_sys::Function);

impl JsChangeListener {
    /// Call the function once per change. A throwing listener is logged and
    /// the remaining changes are still delivered.
    fn notify(&self, changes: &[CellChange]) {
        for change in changes {
            let payload = match serde_json::to_string(change) {
                Ok(json) => js_sys::JSON::parse(&json),
                Err(e) => Err(JsValue::from_str(&e.to_string())),
            };
            let result = payload.and_then(|value| self.0.call1(&JsValue::NULL, &value));
            if let Err(e) = result {
                warn!(col = change.col, row = change.row, "onChange listener failed: {e:?}");
            }
        }
    }
}

fn notify_js_listener(chart: Res<SharedChart>, listener: NonSend<JsChangeListener>) {
    let changes = chart.lock().take_pending_changes();
    listener.notify(&changes);
}

/// JavaScript-accessible surface chart
#[wasm_bindgen]
pub struct JsSurfaceChart {
    chart: SharedChart,
    listener: Option<JsChangeListener>,
    canvas_id: String,
    started: bool,
}

#[wasm_bindgen]
impl JsSurfaceChart {
    /// Create a chart from a JSON config
    ///
    /// # Arguments
    /// * `json` - `{ min, max, axis: { x: [...], y: [...] }, data?, colors?, pan_modifier? }`
    /// * `canvas_id` - HTML canvas element ID (without #)
    /// * `on_change` - optional `({ col, row, value, grid }) => void`
    #[wasm_bindgen(constructor)]
    pub fn new(
        json: &str,
        canvas_id: &str,
        on_change: Option<js_sys::Function>,
    ) -> Result<JsSurfaceChart, JsValue> {
        let config: SurfaceConfig = serde_json::from_str(json)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse chart JSON: {}", e)))?;

        let chart = SurfaceChart::new(config, CanvasContainer::new(canvas_id)).map_err(js_error)?;
        Ok(JsSurfaceChart {
            chart: SharedChart::new(chart),
            listener: on_change.map(JsChangeListener),
            canvas_id: canvas_id.to_string(),
            started: false,
        })
    }

    /// Start the Bevy render loop. Only the first call has any effect.
    #[wasm_bindgen]
    pub fn start(&mut self) {
        if self.started {
            web_sys::console::warn_1(&"Surface chart already started".into());
            return;
        }
        self.started = true;

        let mut app = surface_app(self.chart.clone(), &self.canvas_id);
        if let Some(listener) = self.listener.clone() {
            app.insert_non_send_resource(listener)
                .add_systems(Update, notify_js_listener);
        }
        app.run();
    }

    /// Replace every value; `json` is a `number[][]` indexed `[row][col]`.
    #[wasm_bindgen]
    pub fn set_data(&mut self, json: &str) -> Result<(), JsValue> {
        let data: Vec<Vec<f64>> = serde_json::from_str(json)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse grid JSON: {}", e)))?;
        self.chart.lock().set_data(&data).map_err(js_error)
    }

    /// Set one cell; returns the stored (clamped) value. `onChange` has been
    /// called by the time this returns.
    #[wasm_bindgen]
    pub fn set_value(&mut self, col: usize, row: usize, value: f64) -> Result<f64, JsValue> {
        let stored = self.chart.lock().set_value(col, row, value).map_err(js_error)?;
        self.notify_listener();
        Ok(stored)
    }

    /// Call after the canvas' container changed size.
    #[wasm_bindgen]
    pub fn resize(&mut self) -> Result<(), JsValue> {
        self.chart.lock().resize().map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn reset_view(&mut self) {
        self.chart.lock().reset_view();
    }

    #[wasm_bindgen]
    pub fn dispose(&mut self) {
        self.chart.lock().dispose();
    }

    /// Current grid as JSON, `[row][col]`.
    #[wasm_bindgen]
    pub fn data_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.chart.lock().data())
            .map_err(|e| JsValue::from_str(&format!("Failed to serialize grid: {}", e)))
    }

    /// Current grid as an array of `Float64Array` rows, without the JSON
    /// round trip.
    #[wasm_bindgen]
    pub fn data_rows(&self) -> js_sys::Array {
        self.chart
            .lock()
            .data()
            .iter()
            .map(|row| js_sys::Float64Array::from(row.as_slice()))
            .collect()
    }

    /// Queued edits as a JSON array of `{ col, row, value, grid }`, oldest
    /// first, at most one per cell. The queue is emptied. With an `onChange`
    /// function the queue is normally empty already.
    #[wasm_bindgen]
    pub fn drain_changes(&mut self) -> Result<String, JsValue> {
        let drained = self.chart.lock().take_pending_changes();
        serde_json::to_string(&drained)
            .map_err(|e| JsValue::from_str(&format!("Failed to serialize changes: {}", e)))
    }

    /// Get the canvas ID
    #[wasm_bindgen(getter)]
    pub fn canvas_id(&self) -> String {
        self.canvas_id.clone()
    }

    /// Check if the render loop has been started
    #[wasm_bindgen(getter)]
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl JsSurfaceChart {
    fn notify_listener(&self) {
        if let Some(listener) = &self.listener {
            let changes = self.chart.lock().take_pending_changes();
            listener.notify(&changes);
        }
    }
}
