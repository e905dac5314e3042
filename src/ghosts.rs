//! Colored point lights that circle the house.
//!
//! Ghost positions are closed form functions of the time since the scene
//! started, so any frame can be computed without replaying earlier ones. Time
//! stays in f64 until the final position since the clock is never reset.
use glam::{DVec2, DVec3, Vec3};

use crate::{
    math_utils::{elliptical_orbit, rotate_around_pivot},
    scene::{NodeId, PointLight, Scene, SceneError},
};

/// Intensity shared by every ghost light.
pub const GHOST_INTENSITY: f32 = 0.5;

/// The path a ghost light follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GhostOrbit {
    /// Circles at radius 4 while bobbing once every `2π/3` seconds.
    Inner,
    /// Circles the other way at radius 5 with an irregular bob.
    Middle,
    /// Slow wobbling ellipse between radius 6 and 8. The x and z radii wobble
    /// at different rates so the path is not a circle.
    Outer,
}

impl GhostOrbit {
    pub const ALL: [GhostOrbit; 3] = [GhostOrbit::Inner, GhostOrbit::Middle, GhostOrbit::Outer];

    /// Packed `0xRRGGBB` color of the ghost's light.
    pub fn color(&self) -> u32 {
        match self {
            GhostOrbit::Inner => 0xff00ff,
            GhostOrbit::Middle => 0xffff00,
            GhostOrbit::Outer => 0x00ffff,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GhostOrbit::Inner => "ghost1",
            GhostOrbit::Middle => "ghost2",
            GhostOrbit::Outer => "ghost3",
        }
    }

    /// World position of the ghost `elapsed_seconds` after the scene started.
    pub fn position_at(&self, elapsed_seconds: f64) -> Vec3 {
        let t = elapsed_seconds;

        // The orbit helpers work in a 2D plane whose y axis maps onto world z.
        let (ground, height) = match self {
            GhostOrbit::Inner => (
                rotate_around_pivot(DVec2::ZERO, 4.0, t * 0.5),
                (t * 3.0).sin(),
            ),
            GhostOrbit::Middle => (
                rotate_around_pivot(DVec2::ZERO, 5.0, -t * 0.32),
                (t * 4.0).sin() + (t * 2.5).sin(),
            ),
            GhostOrbit::Outer => (
                elliptical_orbit(
                    DVec2::ZERO,
                    DVec2::new(7.0 + (t * 0.32).sin(), 7.0 + (t * 0.5).sin()),
                    -t * 0.18,
                ),
                (t * 4.0).sin() + (t * 2.5).sin(),
            ),
        };

        DVec3::new(ground.x, height, ground.y).as_vec3()
    }

    /// The light placed into the scene for this ghost.
    pub fn light(&self) -> PointLight {
        PointLight::new(self.color(), GHOST_INTENSITY)
    }
}

/// The ghost light nodes of a scene.
#[derive(Clone, Debug)]
pub struct GhostLights {
    ghosts: Vec<(GhostOrbit, NodeId)>,
}

impl GhostLights {
    pub fn new(ghosts: Vec<(GhostOrbit, NodeId)>) -> Self {
        Self { ghosts }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(GhostOrbit, NodeId)> {
        self.ghosts.iter()
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    /// Move every ghost to where its orbit puts it at `elapsed_seconds`.
    pub fn update(&self, scene: &mut Scene, elapsed_seconds: f64) -> Result<(), SceneError> {
        for (orbit, node) in &self.ghosts {
            scene.set_position(*node, orbit.position_at(elapsed_seconds))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Light;

    fn horizontal_radius(p: Vec3) -> f32 {
        (p.x * p.x + p.z * p.z).sqrt()
    }

    #[test]
    fn inner_ghost_stays_on_its_circle() {
        for i in 0..200 {
            let p = GhostOrbit::Inner.position_at(i as f64 * 0.37);

            assert!((horizontal_radius(p) - 4.0).abs() < 1e-4);
            assert!(p.y.abs() <= 1.0);
        }
    }

    #[test]
    fn ghosts_start_on_the_positive_x_axis() {
        assert_eq!(Vec3::new(4.0, 0.0, 0.0), GhostOrbit::Inner.position_at(0.0));
        assert_eq!(Vec3::new(5.0, 0.0, 0.0), GhostOrbit::Middle.position_at(0.0));
        assert_eq!(Vec3::new(7.0, 0.0, 0.0), GhostOrbit::Outer.position_at(0.0));
    }

    #[test]
    fn middle_ghost_circles_clockwise() {
        // A small step forward in time moves towards -z.
        let p = GhostOrbit::Middle.position_at(0.1);
        assert!(p.z < 0.0);
        assert!((horizontal_radius(p) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn outer_ghost_orbit_is_not_circular() {
        let t = 3.0_f64;
        let p = GhostOrbit::Outer.position_at(t).as_dvec3();
        let a = -t * 0.18;

        let x_radius = p.x / a.cos();
        let z_radius = p.z / a.sin();

        assert!((x_radius - (7.0 + (t * 0.32).sin())).abs() < 1e-4);
        assert!((z_radius - (7.0 + (t * 0.5).sin())).abs() < 1e-4);
        assert!((x_radius - z_radius).abs() > 1e-3);
    }

    #[test]
    fn outer_ghost_stays_between_six_and_eight() {
        for i in 0..500 {
            let p = GhostOrbit::Outer.position_at(i as f64 * 0.61);
            let r = horizontal_radius(p);

            assert!((6.0 - 1e-4..=8.0 + 1e-4).contains(&r), "radius {r}");
            assert!(p.y.abs() <= 2.0);
        }
    }

    #[test]
    fn positions_only_depend_on_time() {
        for orbit in GhostOrbit::ALL {
            assert_eq!(orbit.position_at(12.5), orbit.position_at(12.5));
        }
    }

    #[test]
    fn motion_stays_smooth_after_days_of_uptime() {
        // Two days in, one 16ms frame apart.
        let t = 172_800.0;
        let dt = 0.016;

        for orbit in GhostOrbit::ALL {
            let before = orbit.position_at(t);
            let after = orbit.position_at(t + dt);

            let height = |t: f64| match orbit {
                GhostOrbit::Inner => (t * 3.0).sin(),
                GhostOrbit::Middle | GhostOrbit::Outer => (t * 4.0).sin() + (t * 2.5).sin(),
            };

            assert!((before.y as f64 - height(t)).abs() < 1e-5);
            assert!((after.y as f64 - height(t + dt)).abs() < 1e-5);
        }
    }

    #[test]
    fn update_moves_light_nodes() {
        let mut scene = Scene::new();
        let ghosts = GhostLights::new(
            GhostOrbit::ALL
                .iter()
                .map(|orbit| {
                    let node = scene
                        .add_light(scene.root(), orbit.name(), Light::Point(orbit.light()))
                        .unwrap();
                    (*orbit, node)
                })
                .collect(),
        );

        ghosts.update(&mut scene, 2.0).unwrap();

        for (orbit, node) in ghosts.iter() {
            let position = scene.node(*node).unwrap().transform.position;
            assert_eq!(orbit.position_at(2.0), position);
        }
    }
}
