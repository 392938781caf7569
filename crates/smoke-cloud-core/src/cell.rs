use crate::config::CloudConfig;
use crate::constants::CELL_VISUAL_SHRINK;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only view of a cell's "touching a foreign object" state.
pub trait BlockSignal {
    fn is_blocked(&self) -> bool;
}

/// Host-side visual/collider provider. Every handle returned by `instantiate`
/// is passed back to `destroy` exactly once.
pub trait CellFactory {
    type Handle: BlockSignal;

    fn instantiate(&mut self, template: &CellTemplate, position: [f64; 3]) -> Self::Handle;

    fn destroy(&mut self, handle: Self::Handle);

    /// Called once when the cloud no longer needs its template.
    fn release_template(&mut self) {}
}

/// Shared contact flag. The collision side holds a clone and raises it; the
/// growth engine only reads it.
#[derive(Clone, Debug, Default)]
pub struct ContactFlag(Arc<AtomicBool>);

impl ContactFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl BlockSignal for ContactFlag {
    fn is_blocked(&self) -> bool {
        self.is_raised()
    }
}

/// Appearance every cell instance is cloned from.
#[derive(Clone, Debug, PartialEq)]
pub struct CellTemplate {
    /// Edge length of the cell's visual and collider box.
    pub extent: f64,
    pub layer: u32,
    pub material: Option<String>,
    /// Invisible templates still collide.
    pub visible: bool,
}

impl CellTemplate {
    pub fn from_config(config: &CloudConfig) -> Self {
        Self {
            extent: config.scale * CELL_VISUAL_SHRINK,
            layer: config.layer,
            material: config.material.clone(),
            visible: config.debug_visible,
        }
    }

    pub fn half_extent(&self) -> f64 {
        self.extent / 2.0
    }
}
