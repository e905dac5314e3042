use glam::{Mat4, Vec3};
use thiserror::Error;

/// A perspective camera in a right-handed system with +Y up and the camera
/// looking down its local -Z axis.
///
/// The following transforms points from local space to clip space:
///  `V_clip = M_projection * M_view * M_model * M_local`
///
/// The projection matrix only changes when the viewport is resized so it is
/// cached rather than rebuilt every frame.
#[derive(Clone, Debug)]
pub struct Camera {
    /// The position of the camera in world space.
    eye: Vec3,
    /// The target position the camera should look at.
    target: Vec3,
    /// A world space direction vector indicating which direction is considered
    /// straight up.
    up: Vec3,
    /// The ratio of the viewport width to its height.
    aspect: f32,
    /// The vertical field of view in radians.
    fov_y: f32,
    z_near: f32,
    z_far: f32,
    viewport_width: f32,
    viewport_height: f32,
    projection: Mat4,
}

impl Camera {
    /// Create a new camera at `eye` aiming at `target`.
    ///
    /// The aspect ratio falls back to one if either the viewport width or
    /// height is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        z_near: f32,
        z_far: f32,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Self {
        assert!(fov_y > 0.0);
        assert!(z_near > 0.0);
        assert!(z_far > z_near);

        let aspect = if viewport_width > 0 && viewport_height > 0 {
            viewport_width as f32 / viewport_height as f32
        } else {
            1.0
        };

        Self {
            eye,
            target,
            up: up.normalize(),
            aspect,
            fov_y,
            z_near,
            z_far,
            viewport_width: viewport_width as f32,
            viewport_height: viewport_height as f32,
            projection: Mat4::perspective_rh(fov_y, aspect, z_near, z_far),
        }
    }

    /// Move the camera to `eye` and aim it at `target`.
    pub fn reorient(&mut self, eye: Vec3, target: Vec3) {
        self.eye = eye;
        self.target = target;
    }

    /// Get the camera's view matrix, which transforms world space to view
    /// space.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the camera's projection matrix, which transforms view space to clip
    /// space.
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    /// Get the camera's view projection matrix. The view projection matrix will
    /// transform points from world space to clip space.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    /// Resize the camera's viewport and rebuild the projection to match.
    pub fn set_viewport_size(
        &mut self,
        new_width: u32,
        new_height: u32,
    ) -> Result<(), InvalidCameraSize> {
        if new_width > 0 && new_height > 0 {
            self.aspect = new_width as f32 / new_height as f32;
            self.viewport_width = new_width as f32;
            self.viewport_height = new_height as f32;
            self.projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
            Ok(())
        } else {
            Err(InvalidCameraSize(new_width, new_height))
        }
    }

    /// Get the position of the camera in world space.
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Get the point at which the camera is focused on.
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Get the world up axis.
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Unit vector pointing from the eye towards the target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    /// Get the camera viewport width in logical pixels.
    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    /// Get the camera viewport height in logical pixels.
    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("camera viewport width and height must be larger than zero but width was {} and height was {}", .0, .1)]
pub struct InvalidCameraSize(pub u32, pub u32);
