//! The overlay text object: host-visible attributes, a shared font
//! reference, and the device lifecycle that keeps both valid across resets.

use crate::color::Argb;
use crate::config::OverlayConfig;
use crate::error::OverlayError;
use crate::font::{FontDesc, FontHandle};
use crate::gpu::{Device, DrawFlags, TextBatch};
use crate::lifecycle::{scale_y, scaled_x, scaled_y, DeviceResource, OverlayContext, ResourceState};

const SPACE: u16 = 0x20;

/// One transient text overlay.
///
/// All coordinates and the font height live in the 800×600 design space;
/// scaling to the device viewport happens at draw and bind time only. The
/// registry that owns the object drives its lifecycle and draw order.
pub struct TextObject {
    desc: FontDesc,
    x: i32,
    y: i32,
    color: Argb,
    shadow: bool,
    visible: bool,
    filtered: bool,
    priority: i32,
    text: String,
    handle: Option<FontHandle>,
    batch: TextBatch,
    state: ResourceState,
}

impl TextObject {
    pub fn new(
        desc: FontDesc,
        x: i32,
        y: i32,
        color: Argb,
        text: impl Into<String>,
        shadow: bool,
        visible: bool,
    ) -> Self {
        Self {
            desc,
            x,
            y,
            color,
            shadow,
            visible,
            filtered: false,
            priority: 0,
            text: text.into(),
            handle: None,
            batch: TextBatch::new(),
            state: ResourceState::Uninitialized,
        }
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub fn set_color(&mut self, color: Argb) {
        self.color = color;
    }

    pub fn set_string(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_shown(&mut self, shown: bool) {
        self.visible = shown;
    }

    pub fn show(&mut self) {
        self.set_shown(true);
    }

    pub fn hide(&mut self) {
        self.set_shown(false);
    }

    pub fn set_shadow(&mut self, shadow: bool) {
        self.shadow = shadow;
    }

    pub fn set_filtered(&mut self, filtered: bool) {
        self.filtered = filtered;
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn is_shown(&self) -> bool {
        self.visible
    }

    pub fn desc(&self) -> &FontDesc {
        &self.desc
    }

    /// Swap the logical font. The old pool reference is released and a new
    /// one acquired immediately when a device is bound; otherwise the next
    /// `bind_device` picks the new identity up.
    pub fn update_font(
        &mut self,
        ctx: &mut OverlayContext<'_>,
        desc: FontDesc,
    ) -> Result<(), OverlayError> {
        self.desc = desc;
        let Some(old) = self.handle.take() else {
            return Ok(());
        };
        ctx.fonts.release(ctx.device, old);
        self.acquire_font(ctx)
    }

    /// Extent of the current string in device pixels.
    pub fn measure(&mut self, dev: &mut dyn Device) -> Result<(f32, f32), OverlayError> {
        let handle = self.handle.as_ref().ok_or(OverlayError::DeviceUnavailable)?;
        super::layout::measure(&mut handle.cache(), dev, &self.text)
    }

    /// Draw the object for this frame: shadow passes first (left, right,
    /// up, down, solid black), then the colored main pass with markup
    /// colors applied.
    pub fn draw(
        &mut self,
        dev: &mut dyn Device,
        config: &OverlayConfig,
    ) -> Result<(), OverlayError> {
        if !self.visible {
            return Ok(());
        }
        if !self.state.is_drawable() {
            return Err(OverlayError::DeviceUnavailable);
        }
        let handle = self.handle.as_ref().ok_or(OverlayError::DeviceUnavailable)?;

        let (device_w, device_h) = dev.viewport();
        let x = scaled_x(self.x, device_w);
        let y = scaled_y(self.y, device_h);

        let mut flags = DrawFlags::empty();
        if self.filtered {
            flags |= DrawFlags::FILTERED;
        }

        let mut cache = handle.cache();
        if self.shadow {
            let offset = config.text.shadow_offset as f32;
            for (dx, dy) in [(-offset, 0.0), (offset, 0.0), (0.0, -offset), (0.0, offset)] {
                self.batch
                    .draw_text(dev, &mut cache, x + dx, y + dy, Argb::BLACK, &self.text, flags)?;
            }
        }
        self.batch.draw_text(
            dev,
            &mut cache,
            x,
            y,
            self.color,
            &self.text,
            flags | DrawFlags::COLOR_TABLE,
        )
    }

    /// The pool identity for the current viewport: the requested height
    /// scaled into device pixels, so text keeps its on-screen proportion at
    /// any resolution.
    fn scaled_desc(&self, device_h: u32) -> FontDesc {
        let height = ((self.desc.height as f32) * scale_y(device_h)).floor().max(1.0) as u32;
        self.desc.with_height(height)
    }

    /// Acquire the pool entry and rasterize the reference glyph so an
    /// unusable font fails here, not mid-frame.
    fn acquire_font(&mut self, ctx: &mut OverlayContext<'_>) -> Result<(), OverlayError> {
        let (_, device_h) = ctx.device.viewport();
        let handle = ctx.fonts.acquire(&self.scaled_desc(device_h))?;
        let probe = handle.cache().glyph(ctx.device, SPACE).map(|_| ());
        if let Err(err) = probe {
            ctx.fonts.release(ctx.device, handle);
            return Err(err);
        }
        self.handle = Some(handle);
        Ok(())
    }
}

impl DeviceResource for TextObject {
    fn state(&self) -> ResourceState {
        self.state
    }

    fn bind_device(&mut self, ctx: &mut OverlayContext<'_>) -> Result<(), OverlayError> {
        if self.state != ResourceState::Uninitialized {
            return Ok(());
        }
        self.acquire_font(ctx)?;
        self.state = ResourceState::DeviceBound;
        Ok(())
    }

    fn restore(&mut self, ctx: &mut OverlayContext<'_>) -> Result<(), OverlayError> {
        match self.state {
            ResourceState::Restored => Ok(()),
            state if state.can_restore() => {
                self.batch.restore(ctx.device)?;
                self.state = ResourceState::Restored;
                Ok(())
            }
            _ => Err(OverlayError::DeviceUnavailable),
        }
    }

    fn invalidate(&mut self, ctx: &mut OverlayContext<'_>) {
        self.batch.invalidate(ctx.device);
        if self.state == ResourceState::Restored {
            self.state = ResourceState::Lost;
        }
    }

    fn destroy(&mut self, ctx: &mut OverlayContext<'_>) {
        if self.state == ResourceState::Destroyed {
            return;
        }
        self.batch.invalidate(ctx.device);
        if let Some(handle) = self.handle.take() {
            ctx.fonts.release(ctx.device, handle);
        }
        self.state = ResourceState::Destroyed;
    }
}
