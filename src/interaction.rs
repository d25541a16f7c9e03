//! Pointer and keyboard state machine for hovering, dragging and camera
//! gestures. Pure state: ray casting and value edits are applied by the
//! chart, which owns the grid and the pivots.

use bevy::input::keyboard::KeyCode;
use bevy_math::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::CellCoord;

/// Normalized value change per pixel of vertical pointer travel. Negative
/// because screen y grows downward and dragging up should raise a point.
pub const DRAG_SENSITIVITY: f64 = -0.001;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Hover(CellCoord),
    Dragging(CellCoord),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Rotate,
    Pan,
}

/// Key that switches camera drags from rotating to panning while held.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PanModifier {
    #[default]
    Shift,
    Control,
    Alt,
}

impl PanModifier {
    pub fn keys(self) -> [KeyCode; 2] {
        match self {
            PanModifier::Shift => [KeyCode::ShiftLeft, KeyCode::ShiftRight],
            PanModifier::Control => [KeyCode::ControlLeft, KeyCode::ControlRight],
            PanModifier::Alt => [KeyCode::AltLeft, KeyCode::AltRight],
        }
    }
}

/// What a pointer move asks the chart to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerAction {
    None,
    /// Add `delta` to the normalized value of `coord`.
    Drag { coord: CellCoord, delta: f64 },
    /// Orbit the camera by a screen-space delta.
    Orbit(Vec2),
    /// Pan the camera by a screen-space delta.
    Pan(Vec2),
}

#[derive(Clone, Debug, Default)]
pub struct InteractionController {
    state: InteractionState,
    pointer: Option<Vec2>,
    pointer_down: bool,
    /// Screen position of the previous drag or gesture sample.
    last: Vec2,
    mode: CameraMode,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn active(&self) -> Option<CellCoord> {
        match self.state {
            InteractionState::Idle => None,
            InteractionState::Hover(c) | InteractionState::Dragging(c) => Some(c),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, InteractionState::Dragging(_))
    }

    pub fn is_pointer_down(&self) -> bool {
        self.pointer_down
    }

    pub fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }

    pub fn camera_mode(&self) -> CameraMode {
        self.mode
    }

    /// Record this frame's ray-cast result. Ignored while the pointer is down
    /// so hover never fights an active drag or camera gesture.
    /// Returns true when the active pivot changed.
    pub fn apply_hover(&mut self, hit: Option<CellCoord>) -> bool {
        if self.pointer_down {
            return false;
        }
        let next = match hit {
            Some(c) => InteractionState::Hover(c),
            None => InteractionState::Idle,
        };
        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Primary button went down. Returns true when a pivot drag started.
    pub fn pointer_pressed(&mut self, pos: Vec2) -> bool {
        if self.pointer_down {
            return false;
        }
        self.pointer = Some(pos);
        self.pointer_down = true;
        self.last = pos;

        if let InteractionState::Hover(c) = self.state {
            self.state = InteractionState::Dragging(c);
            debug!(col = c.col, row = c.row, "drag started");
            return true;
        }
        false
    }

    pub fn pointer_moved(&mut self, pos: Vec2) -> PointerAction {
        self.pointer = Some(pos);
        if !self.pointer_down {
            return PointerAction::None;
        }

        let delta = pos - self.last;
        self.last = pos;
        if delta == Vec2::ZERO {
            return PointerAction::None;
        }

        match self.state {
            InteractionState::Dragging(coord) => PointerAction::Drag {
                coord,
                delta: f64::from(delta.y) * DRAG_SENSITIVITY,
            },
            _ => match self.mode {
                CameraMode::Rotate => PointerAction::Orbit(delta),
                CameraMode::Pan => PointerAction::Pan(delta),
            },
        }
    }

    /// Primary button released. Returns the cell whose drag just ended.
    pub fn pointer_released(&mut self) -> Option<CellCoord> {
        if !self.pointer_down {
            return None;
        }
        self.pointer_down = false;
        match self.state {
            InteractionState::Dragging(c) => {
                self.state = InteractionState::Hover(c);
                debug!(col = c.col, row = c.row, "drag ended");
                Some(c)
            }
            _ => None,
        }
    }

    /// Pointer left the surface. Returns true when a hover was dropped; an
    /// active drag or gesture keeps going until release.
    pub fn pointer_left(&mut self) -> bool {
        if self.pointer_down {
            return false;
        }
        self.pointer = None;
        let changed = self.state != InteractionState::Idle;
        self.state = InteractionState::Idle;
        changed
    }

    /// Track the pan modifier; independent of the pivot state machine.
    pub fn set_modifier(&mut self, held: bool) -> CameraMode {
        self.mode = if held { CameraMode::Pan } else { CameraMode::Rotate };
        self.mode
    }

    /// Forget everything, e.g. after the grid was replaced.
    pub fn reset(&mut self) {
        let mode = self.mode;
        *self = Self {
            mode,
            ..Self::default()
        };
    }
}
