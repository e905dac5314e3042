use std::sync::Arc;

use glam::Vec2;
use tracing::debug;
use winit::{
    event::{MouseScrollDelta, WindowEvent},
    window::Window,
};

use crate::{
    assets::TextureProvider,
    context::SceneContext,
    frame::{Clock, FrameScheduler, FrameState, SceneClock},
    renderer::Renderer,
    viewport::{fit_surface, window_viewport, FullscreenGesture, DOUBLE_CLICK_WINDOW},
};

/// Dispatches events coming from the underlying platform to the scene and
/// drives the frame loop.
pub struct HauntedHouseApp {
    renderer: Renderer,
    textures: TextureProvider,
    context: SceneContext,
    scheduler: FrameScheduler,
    clock: SceneClock,
    fullscreen_gesture: FullscreenGesture,
    window: Arc<Window>,
}

impl HauntedHouseApp {
    pub fn new(
        window: Arc<Window>,
        renderer: Renderer,
        textures: TextureProvider,
        context: SceneContext,
    ) -> Self {
        Self {
            renderer,
            textures,
            context,
            scheduler: FrameScheduler::new(),
            clock: SceneClock::new(),
            fullscreen_gesture: FullscreenGesture::new(DOUBLE_CLICK_WINDOW),
            window,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Called anytime there is a new input event from the host. Returns true
    /// if the event was consumed.
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        self.fullscreen_gesture
            .handle_event(event, self.clock.elapsed(), self.window.as_ref());

        match event {
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y),
                    MouseScrollDelta::PixelDelta(p) => Vec2::new(p.x as f32, p.y as f32),
                };

                self.context.controls.process_mouse_wheel(delta);
                return true;
            }
            _ => {}
        }

        self.context.controls.process_input(event)
    }

    /// Handles when the mouse moves.
    pub fn mouse_motion(&mut self, delta_x: f64, delta_y: f64) {
        self.context
            .controls
            .process_mouse_motion(Vec2::new(delta_x as f32, delta_y as f32));
    }

    /// Handles when the window is resized or moved to a display with a
    /// different scale factor.
    pub fn window_resized(&mut self) {
        let viewport = window_viewport(&self.window);

        if self
            .context
            .resize(viewport.width, viewport.height, viewport.pixel_ratio)
            .is_some()
        {
            let (width, height) = fit_surface(&self.window, &self.context.viewport());
            self.renderer.resize(width, height);
        }
    }

    /// Apply finished texture loads and then run one frame.
    pub fn redraw(&mut self) {
        let loaded = self.textures.poll();

        if loaded > 0 {
            debug!(
                "{loaded} textures finished loading, {} pending",
                self.textures.pending()
            );
        }

        self.scheduler.tick(FrameState {
            clock: &self.clock,
            context: &mut self.context,
            renderer: &mut self.renderer,
            host: self.window.as_ref(),
        });
    }
}
