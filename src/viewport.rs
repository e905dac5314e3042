//! Window size, pixel density and fullscreen handling.
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, TouchPhase, WindowEvent},
    window::Window,
};

/// Pixel ratios above this are clamped. Rendering at more than twice the
/// logical resolution costs a lot of fill rate for little visible gain.
pub const MAX_PIXEL_RATIO: f64 = 2.0;

/// Two presses closer together than this count as a double click.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(300);

/// Clamp a device pixel ratio reported by the host to `(0, MAX_PIXEL_RATIO]`.
/// Nonsense values fall back to one.
pub fn clamp_pixel_ratio(device_pixel_ratio: f64) -> f64 {
    if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio.min(MAX_PIXEL_RATIO)
    } else {
        1.0
    }
}

/// The area the scene is presented in.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Width in logical pixels.
    pub width: u32,
    /// Height in logical pixels.
    pub height: u32,
    /// Physical pixels rendered per logical pixel.
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio: clamp_pixel_ratio(device_pixel_ratio),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size of the render target in physical pixels. Never zero.
    pub fn drawing_buffer_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f64 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

/// How the render surface is sized relative to the viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SurfaceSizing {
    /// The surface backs a canvas whose backing store is resized to the
    /// clamped drawing buffer and stretched to its CSS size by the browser.
    DrawingBuffer,
    /// The surface belongs to a native window and must match the window's
    /// physical size. The pixel ratio clamp only affects the camera there.
    WindowPixels,
}

impl SurfaceSizing {
    pub const fn for_target() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::DrawingBuffer
        } else {
            Self::WindowPixels
        }
    }

    /// Surface size in physical pixels for `viewport` shown in a window that
    /// is `window_size` physical pixels large. Never zero.
    pub fn surface_size(self, viewport: &Viewport, window_size: PhysicalSize<u32>) -> (u32, u32) {
        match self {
            Self::DrawingBuffer => viewport.drawing_buffer_size(),
            Self::WindowPixels => (window_size.width.max(1), window_size.height.max(1)),
        }
    }
}

/// Device pixel ratio the host reports for `window`.
pub fn host_pixel_ratio(window: &Window) -> f64 {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            let _ = window;
            crate::wasm_support::device_pixel_ratio()
        } else {
            window.scale_factor()
        }
    }
}

/// Logical viewport of `window` using the host's pixel ratio.
pub fn window_viewport(window: &Window) -> Viewport {
    let pixel_ratio = host_pixel_ratio(window);
    let logical_size = window.inner_size().to_logical::<u32>(pixel_ratio);
    Viewport::new(logical_size.width, logical_size.height, pixel_ratio)
}

/// Size the render surface for `viewport` and return it. On the web this
/// also resizes the canvas backing store to match.
pub fn fit_surface(window: &Window, viewport: &Viewport) -> (u32, u32) {
    let size = SurfaceSizing::for_target().surface_size(viewport, window.inner_size());

    #[cfg(target_arch = "wasm32")]
    crate::wasm_support::resize_canvas(window, size);

    debug!("render surface is {} x {}", size.0, size.1);
    size
}

#[derive(Debug, Error, PartialEq)]
pub enum FullscreenError {
    #[error("fullscreen presentation is not supported by this host")]
    Unsupported,
}

/// Something that can switch between windowed and fullscreen presentation.
pub trait FullscreenSurface {
    fn is_fullscreen(&self) -> bool;
    fn enter_fullscreen(&self) -> Result<(), FullscreenError>;
    fn exit_fullscreen(&self);
}

impl FullscreenSurface for winit::window::Window {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen().is_some()
    }

    fn enter_fullscreen(&self) -> Result<(), FullscreenError> {
        #[cfg(target_arch = "wasm32")]
        let supported = crate::wasm_support::fullscreen_supported();
        #[cfg(not(target_arch = "wasm32"))]
        let supported = self.current_monitor().is_some();

        if !supported {
            return Err(FullscreenError::Unsupported);
        }

        // Borderless lets winit pick the host's fullscreen mechanism, which
        // includes the prefixed variants some browsers still need.
        self.set_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
        Ok(())
    }

    fn exit_fullscreen(&self) {
        self.set_fullscreen(None);
    }
}

/// Switch `surface` between fullscreen and windowed presentation. Returns
/// whether the surface is now fullscreen.
///
/// A host without fullscreen support stays windowed with a warning.
pub fn toggle_fullscreen(surface: &dyn FullscreenSurface) -> bool {
    if surface.is_fullscreen() {
        info!("leaving fullscreen");
        surface.exit_fullscreen();
        false
    } else {
        match surface.enter_fullscreen() {
            Ok(()) => {
                info!("entering fullscreen");
                true
            }
            Err(e) => {
                warn!("staying windowed: {e}");
                false
            }
        }
    }
}

/// Turns a stream of button presses into double clicks.
#[derive(Debug)]
pub struct DoubleClickDetector {
    window: Duration,
    last_press: Option<Duration>,
}

impl DoubleClickDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: None,
        }
    }

    /// Record a press at time `at` and return true if it completes a double
    /// click. A third quick press starts a new pair.
    pub fn register_press(&mut self, at: Duration) -> bool {
        match self.last_press {
            Some(last) if at >= last && at - last <= self.window => {
                debug!("double click after {:?}", at - last);
                self.last_press = None;
                true
            }
            _ => {
                self.last_press = Some(at);
                false
            }
        }
    }
}

impl Default for DoubleClickDetector {
    fn default() -> Self {
        Self::new(DOUBLE_CLICK_WINDOW)
    }
}

/// Toggles fullscreen when the user double clicks or double taps.
#[derive(Debug, Default)]
pub struct FullscreenGesture {
    presses: DoubleClickDetector,
}

impl FullscreenGesture {
    pub fn new(window: Duration) -> Self {
        Self {
            presses: DoubleClickDetector::new(window),
        }
    }

    /// Feed a window event received `at` since the scene started. Left button
    /// presses and new touches count as presses. Returns whether `surface` is
    /// fullscreen afterwards when the event completed a double click.
    pub fn handle_event(
        &mut self,
        event: &WindowEvent,
        at: Duration,
        surface: &dyn FullscreenSurface,
    ) -> Option<bool> {
        let is_press = match event {
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => true,
            WindowEvent::Touch(touch) => touch.phase == TouchPhase::Started,
            _ => false,
        };

        if is_press && self.presses.register_press(at) {
            Some(toggle_fullscreen(surface))
        } else {
            None
        }
    }
}
