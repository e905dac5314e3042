use std::{f32::consts::PI, time::Duration};

use glam::{Vec2, Vec3};
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};

use crate::camera::Camera;

pub trait CameraController {
    /// Updates the camera controller state with the given input event. This
    /// method returns `true` if `event` was used by this update method, other
    /// -wise false is returned.
    fn process_input(&mut self, event: &WindowEvent) -> bool;

    /// Accumulates mouse motion deltas until camera updates are applied in
    /// `update_camera`.
    fn process_mouse_motion(&mut self, delta: Vec2);

    /// Accumulates mouse scroll wheel deltas until camera updates are applied in
    /// `update_camera`. Positive `y` scrolls away from the user.
    fn process_mouse_wheel(&mut self, delta: Vec2);

    /// Applies updates to the camera that reflect the current state of this
    /// controller.
    fn update_camera(&mut self, camera: &mut Camera, delta: Duration);
}

/// Keeps the polar angle this far away from the poles so the view direction
/// never lines up with the camera's up vector.
const POLE_EPSILON: f32 = 1e-6;

/// Orbits the camera around its target with inertia.
///
/// Dragging with the left mouse button (or one finger) rotates around the
/// target and the scroll wheel moves towards or away from it. Rotation input
/// is not applied all at once; each update applies `damping_factor` of the
/// remaining rotation so the camera glides to a stop after input ends.
#[derive(Debug)]
pub struct OrbitCameraController {
    /// Fraction of the pending rotation applied per update. Values closer to
    /// zero glide for longer.
    damping_factor: f32,
    rotate_speed: f32,
    /// Distance multiplier for one step of the scroll wheel towards the target.
    zoom_step: f32,
    min_distance: f32,
    max_distance: f32,
    /// Rotation (azimuth, polar) still to be applied, in radians.
    spherical_delta: Vec2,
    /// Pointer motion in pixels that has not been converted to rotation yet.
    pending_motion: Vec2,
    /// Scale applied to the distance from the target on the next update.
    scale: f32,
    rotating: bool,
    last_touch: Option<(u64, Vec2)>,
}

impl OrbitCameraController {
    pub const DEFAULT_DAMPING_FACTOR: f32 = 0.05;
    pub const DEFAULT_ZOOM_STEP: f32 = 0.95;

    pub fn new() -> Self {
        Self {
            damping_factor: Self::DEFAULT_DAMPING_FACTOR,
            rotate_speed: 1.0,
            zoom_step: Self::DEFAULT_ZOOM_STEP,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            spherical_delta: Vec2::ZERO,
            pending_motion: Vec2::ZERO,
            scale: 1.0,
            rotating: false,
            last_touch: None,
        }
    }

    /// Limit how close to and far from the target the camera can move.
    pub fn with_distance_limits(self, min_distance: f32, max_distance: f32) -> Self {
        Self {
            min_distance,
            max_distance,
            ..self
        }
    }

    /// True while rotation from earlier input is still being applied.
    pub fn is_moving(&self) -> bool {
        self.spherical_delta.length_squared() > 1e-12 || self.pending_motion != Vec2::ZERO
    }
}

impl Default for OrbitCameraController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraController for OrbitCameraController {
    fn process_input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.rotating = state == &ElementState::Pressed;
                true
            }
            WindowEvent::Touch(touch) => {
                let location = Vec2::new(touch.location.x as f32, touch.location.y as f32);

                match touch.phase {
                    TouchPhase::Started => {
                        self.last_touch = Some((touch.id, location));
                    }
                    TouchPhase::Moved => match self.last_touch {
                        Some((id, last)) if id == touch.id => {
                            self.pending_motion += location - last;
                            self.last_touch = Some((id, location));
                        }
                        _ => {}
                    },
                    TouchPhase::Ended | TouchPhase::Cancelled => {
                        if matches!(self.last_touch, Some((id, _)) if id == touch.id) {
                            self.last_touch = None;
                        }
                    }
                }

                true
            }
            _ => false,
        }
    }

    fn process_mouse_motion(&mut self, delta: Vec2) {
        if self.rotating {
            self.pending_motion += delta;
        }
    }

    fn process_mouse_wheel(&mut self, delta: Vec2) {
        if delta.y > 0.0 {
            self.scale *= self.zoom_step;
        } else if delta.y < 0.0 {
            self.scale /= self.zoom_step;
        }
    }

    fn update_camera(&mut self, camera: &mut Camera, _delta: Duration) {
        // Dragging across the full height of the viewport rotates a full turn.
        let height = camera.viewport_height().max(1.0);
        let rotation = 2.0 * PI * self.rotate_speed * self.pending_motion / height;
        self.spherical_delta -= rotation;
        self.pending_motion = Vec2::ZERO;

        let target = camera.target();
        let offset = camera.eye() - target;
        let radius = offset.length();

        let (mut theta, mut phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        theta += self.spherical_delta.x * self.damping_factor;
        phi += self.spherical_delta.y * self.damping_factor;
        phi = phi.clamp(POLE_EPSILON, PI - POLE_EPSILON);

        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let sin_phi_radius = phi.sin() * radius;
        let offset = Vec3::new(
            sin_phi_radius * theta.sin(),
            phi.cos() * radius,
            sin_phi_radius * theta.cos(),
        );

        camera.reorient(target + offset, target);

        self.spherical_delta *= 1.0 - self.damping_factor;
        self.scale = 1.0;
    }
}
