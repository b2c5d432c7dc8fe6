//! The device-dependent resource lifecycle shared by every overlay primitive,
//! plus the fixed logical-space scaling contract.
//!
//! The host's device layer drives the four operations on device acquisition
//! (`bind_device`), reset completion (`restore`), pre-reset (`invalidate`),
//! and shutdown (`destroy`). All four are idempotent: calling one on a
//! resource already in or below the target state is a no-op.

use crate::error::OverlayError;
use crate::font::FontPool;
use crate::gpu::Device;

/// Logical design-space width. All object coordinates live in this space.
pub const DESIGN_WIDTH: u32 = 800;
/// Logical design-space height.
pub const DESIGN_HEIGHT: u32 = 600;

/// Horizontal scale from design space to a device viewport.
pub fn scale_x(device_width: u32) -> f32 {
    device_width as f32 / DESIGN_WIDTH as f32
}

/// Vertical scale from design space to a device viewport.
pub fn scale_y(device_height: u32) -> f32 {
    device_height as f32 / DESIGN_HEIGHT as f32
}

/// Map a logical x coordinate to device pixels, snapped to a whole pixel.
pub fn scaled_x(x: i32, device_width: u32) -> f32 {
    (x as f32 * scale_x(device_width)).floor()
}

/// Map a logical y coordinate (or vertical extent) to device pixels,
/// snapped to a whole pixel.
pub fn scaled_y(y: i32, device_height: u32) -> f32 {
    (y as f32 * scale_y(device_height)).floor()
}

/// Where a resource stands in the device lifecycle.
///
/// `Lost` holds the same resources as `DeviceBound` — size-dependent objects
/// released, device binding retained — and exists so state reflects *why*
/// the resource got there (a reset, not initial setup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// No device seen yet.
    Uninitialized,
    /// Device captured, size-independent resources created.
    DeviceBound,
    /// Size-dependent resources (vertex buffer, state snapshots) live;
    /// the resource is drawable.
    Restored,
    /// Size-dependent resources released ahead of a device reset.
    Lost,
    /// Everything released. Terminal.
    Destroyed,
}

impl ResourceState {
    /// Whether draw calls may be issued in this state.
    pub fn is_drawable(self) -> bool {
        matches!(self, Self::Restored)
    }

    /// Whether `restore` may run from this state.
    pub(crate) fn can_restore(self) -> bool {
        matches!(self, Self::DeviceBound | Self::Lost)
    }
}

/// Everything a lifecycle operation may touch: the host device and the
/// process-wide font pool service.
pub struct OverlayContext<'a> {
    pub device: &'a mut dyn Device,
    pub fonts: &'a mut FontPool,
}

/// The four-phase device-resource contract.
pub trait DeviceResource {
    fn state(&self) -> ResourceState;

    /// `Uninitialized` → `DeviceBound`. Captures the device and creates
    /// size-independent resources, failing fast where possible.
    fn bind_device(&mut self, ctx: &mut OverlayContext<'_>) -> Result<(), OverlayError>;

    /// `DeviceBound`/`Lost` → `Restored`. Creates size- and format-dependent
    /// resources.
    fn restore(&mut self, ctx: &mut OverlayContext<'_>) -> Result<(), OverlayError>;

    /// `Restored` → `Lost`. Releases size-dependent resources. Safe to call
    /// even if `restore` never ran or never completed.
    fn invalidate(&mut self, ctx: &mut OverlayContext<'_>);

    /// Any state → `Destroyed`. Releases everything exactly once.
    fn destroy(&mut self, ctx: &mut OverlayContext<'_>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_scale_at_design_resolution() {
        assert_eq!(scale_x(800), 1.0);
        assert_eq!(scale_y(600), 1.0);
        assert_eq!(scaled_x(123, 800), 123.0);
        assert_eq!(scaled_y(45, 600), 45.0);
    }

    #[test]
    fn doubled_viewport_doubles_positions() {
        assert_eq!(scaled_x(100, 1600), 200.0);
        assert_eq!(scaled_y(100, 1200), 200.0);
    }

    #[test]
    fn fractional_scales_snap_to_whole_pixels() {
        // 1024/800 = 1.28; 10 * 1.28 = 12.8 → 12
        assert_eq!(scaled_x(10, 1024), 12.0);
        // 768/600 = 1.28; 7 * 1.28 = 8.96 → 8
        assert_eq!(scaled_y(7, 768), 8.0);
    }

    #[test]
    fn drawable_only_when_restored() {
        assert!(ResourceState::Restored.is_drawable());
        for s in [
            ResourceState::Uninitialized,
            ResourceState::DeviceBound,
            ResourceState::Lost,
            ResourceState::Destroyed,
        ] {
            assert!(!s.is_drawable());
        }
    }
}
