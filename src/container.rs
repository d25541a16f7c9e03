//! Host surfaces the chart renders into.
//!
//! The chart only ever asks a container for its current on-screen size, on
//! construction and on explicit `resize()` calls. Nothing here observes size
//! changes; the host is responsible for calling `resize()`.

use std::sync::Arc;

use bevy_math::UVec2;
use parking_lot::Mutex;

pub trait SurfaceContainer: Send + Sync {
    /// Current size in logical pixels, or `None` when the surface cannot be
    /// resolved to something displayable.
    fn resolve(&self) -> Option<UVec2>;

    /// Human readable description for error messages.
    fn describe(&self) -> String {
        "surface container".to_string()
    }
}

/// Container of a fixed size, for offscreen use and tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedContainer(pub UVec2);

impl FixedContainer {
    pub fn new(width: u32, height: u32) -> Self {
        Self(UVec2::new(width, height))
    }
}

impl SurfaceContainer for FixedContainer {
    fn resolve(&self) -> Option<UVec2> {
        displayable(self.0)
    }

    fn describe(&self) -> String {
        format!("fixed {}x{} surface", self.0.x, self.0.y)
    }
}

/// Container whose size is pushed in by the host, e.g. from window resize
/// messages. Clones share the same size cell.
#[derive(Clone, Debug, Default)]
pub struct SharedContainer {
    size: Arc<Mutex<Option<UVec2>>>,
}

impl SharedContainer {
    pub fn new(size: UVec2) -> Self {
        Self {
            size: Arc::new(Mutex::new(Some(size))),
        }
    }

    pub fn set_size(&self, size: UVec2) {
        *self.size.lock() = Some(size);
    }

    /// Mark the surface as gone (e.g. window closed).
    pub fn detach(&self) {
        *self.size.lock() = None;
    }
}

impl SurfaceContainer for SharedContainer {
    fn resolve(&self) -> Option<UVec2> {
        (*self.size.lock()).and_then(displayable)
    }

    fn describe(&self) -> String {
        "shared host surface".to_string()
    }
}

/// DOM element looked up by id on every query.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug)]
pub struct CanvasContainer {
    id: String,
}

#[cfg(target_arch = "wasm32")]
impl CanvasContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(target_arch = "wasm32")]
impl SurfaceContainer for CanvasContainer {
    fn resolve(&self) -> Option<UVec2> {
        let element = web_sys::window()?
            .document()?
            .get_element_by_id(&self.id)?;
        let w = u32::try_from(element.client_width()).ok()?;
        let h = u32::try_from(element.client_height()).ok()?;
        displayable(UVec2::new(w, h))
    }

    fn describe(&self) -> String {
        format!("element #{}", self.id)
    }
}

fn displayable(size: UVec2) -> Option<UVec2> {
    (size.x > 0 && size.y > 0).then_some(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_is_not_displayable() {
        assert_eq!(FixedContainer::new(0, 300).resolve(), None);
        assert_eq!(FixedContainer::new(640, 480).resolve(), Some(UVec2::new(640, 480)));
    }

    #[test]
    fn shared_container_follows_the_host() {
        let host = SharedContainer::new(UVec2::new(800, 600));
        let chart_side = host.clone();
        host.set_size(UVec2::new(1024, 768));
        assert_eq!(chart_side.resolve(), Some(UVec2::new(1024, 768)));
        host.detach();
        assert_eq!(chart_side.resolve(), None);
        assert_eq!(SharedContainer::default().resolve(), None);
    }
}
