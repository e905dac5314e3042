use glam::Vec3;
use tracing::debug;

use crate::{
    camera::Camera,
    controls::{CameraController, OrbitCameraController},
    ghosts::GhostLights,
    haunted_house::HauntedHouse,
    scene::Scene,
    viewport::Viewport,
};

pub const CAMERA_FOV_Y_DEGREES: f32 = 75.0;
pub const CAMERA_Z_NEAR: f32 = 0.1;
pub const CAMERA_Z_FAR: f32 = 100.0;
pub const CAMERA_START_EYE: Vec3 = Vec3::new(1.0, 1.0, 3.0);

/// Everything the frame loop reads and mutates: the scene, the camera looking
/// at it and the controls steering that camera.
pub struct SceneContext {
    pub scene: Scene,
    pub ghosts: GhostLights,
    pub camera: Camera,
    pub controls: Box<dyn CameraController>,
    viewport: Viewport,
}

impl SceneContext {
    /// Put a camera in front of the house and hook it up to orbit controls.
    pub fn new(house: HauntedHouse, viewport: Viewport) -> Self {
        let camera = Camera::new(
            CAMERA_START_EYE,
            Vec3::ZERO,
            Vec3::Y,
            CAMERA_FOV_Y_DEGREES.to_radians(),
            CAMERA_Z_NEAR,
            CAMERA_Z_FAR,
            viewport.width,
            viewport.height,
        );

        Self::with_controls(house, camera, Box::new(OrbitCameraController::new()), viewport)
    }

    pub fn with_controls(
        house: HauntedHouse,
        camera: Camera,
        controls: Box<dyn CameraController>,
        viewport: Viewport,
    ) -> Self {
        Self {
            scene: house.scene,
            ghosts: house.ghosts,
            camera,
            controls,
            viewport,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Apply a new logical size and device pixel ratio. Returns the size the
    /// render target should be in physical pixels, or `None` when the new size
    /// is empty (eg the window was minimized) and was ignored.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f64) -> Option<(u32, u32)> {
        let viewport = Viewport::new(width, height, device_pixel_ratio);

        if let Err(e) = self.camera.set_viewport_size(width, height) {
            debug!("ignoring resize: {e}");
            return None;
        }

        self.viewport = viewport;
        Some(viewport.drawing_buffer_size())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        assets::{tests::ManualLoader, TextureProvider},
        haunted_house::SceneSettings,
    };

    pub fn test_context(viewport: Viewport) -> SceneContext {
        let mut textures = TextureProvider::with_loader(ManualLoader::default());
        let house =
            HauntedHouse::build(&SceneSettings::default().with_seed(7), &mut textures).unwrap();

        SceneContext::new(house, viewport)
    }

    #[test]
    fn camera_starts_in_front_of_the_house() {
        let context = test_context(Viewport::new(800, 600, 1.0));

        assert_eq!(CAMERA_START_EYE, context.camera.eye());
        assert_eq!(Vec3::ZERO, context.camera.target());
        assert!((context.camera.aspect() - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(3, context.ghosts.len());
    }

    #[test]
    fn resize_updates_aspect_and_pixel_ratio() {
        let mut context = test_context(Viewport::new(800, 600, 1.0));

        assert_eq!(Some((2048, 1536)), context.resize(1024, 768, 2.0));
        assert!((context.camera.aspect() - 1024.0 / 768.0).abs() < 1e-6);
        assert_eq!(2.0, context.viewport().pixel_ratio);

        assert_eq!(Some((1280, 720)), context.resize(640, 360, 3.5));
        assert_eq!(2.0, context.viewport().pixel_ratio);
        assert!((context.camera.aspect() - 640.0 / 360.0).abs() < 1e-6);
    }

    #[test]
    fn empty_resize_is_ignored() {
        let mut context = test_context(Viewport::new(800, 600, 1.5));

        assert_eq!(None, context.resize(0, 600, 1.0));
        assert_eq!(Viewport::new(800, 600, 1.5), context.viewport());
        assert!((context.camera.aspect() - 800.0 / 600.0).abs() < 1e-6);
    }
}
