//! Builds the haunted house scene: a grassy floor, a small house, a field of
//! graves and the lights that illuminate them.
//!
//! Construction runs in two phases. `SceneBuilder::assemble` creates every
//! node, geometry and material. `SceneAssembly::finalize` then validates the
//! result and configures shadows.
use std::{
    f32::consts::{FRAC_PI_2, FRAC_PI_4, SQRT_2, TAU},
    ops::Range,
    rc::Rc,
};

use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    assets::{TextureHandle, TextureProvider, TextureSettings},
    ghosts::{GhostLights, GhostOrbit},
    math_utils::rgb_hex,
    scene::{
        DirectionalLight, Fog, Geometry, Light, MaterialBuilder, NodeId, NodeKind, PointLight,
        Scene, SceneError, Transform,
    },
};

/// Environment variable holding a fixed seed for grave placement.
pub const SEED_ENV_VAR: &str = "HAUNTED_HOUSE_SEED";

pub const FOG_COLOR: u32 = 0x262837;
pub const FOG_NEAR: f32 = 1.0;
pub const FOG_FAR: f32 = 15.0;

const WALL_SIZE: Vec3 = Vec3::new(4.0, 2.5, 4.0);

/// Distance from the center of the house to the corners of its walls.
pub const HOUSE_FOOTPRINT_RADIUS: f32 = WALL_SIZE.x / 2.0 * SQRT_2;

const SHADOW_MAP_SIZE: u32 = 256;
const SHADOW_FAR: f32 = 7.0;

/// (position, uniform scale) of each bush around the door.
const BUSHES: [(Vec3, f32); 4] = [
    (Vec3::new(0.8, 0.2, 2.2), 0.5),
    (Vec3::new(1.4, 0.1, 2.1), 0.25),
    (Vec3::new(-0.8, 0.2, 2.2), 0.4),
    (Vec3::new(-1.0, 0.05, 2.6), 0.15),
];

#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("grave radius range {min}..{max} is empty")]
    EmptyGraveRange { min: f32, max: f32 },
    #[error("graves at radius {min_radius} would overlap the house, use at least {house_radius}")]
    GravesOverlapHouse { min_radius: f32, house_radius: f32 },
}

/// Tunable parts of the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSettings {
    pub grave_count: usize,
    /// Distance from the center of the house graves are placed at.
    pub grave_radius: Range<f32>,
    /// Seed for grave placement. A random seed is picked when `None`.
    pub grave_seed: Option<u64>,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            grave_count: 50,
            grave_radius: 3.0..9.0,
            grave_seed: None,
        }
    }
}

impl SceneSettings {
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            grave_seed: Some(seed),
            ..self
        }
    }

    /// Default settings with the grave seed taken from `HAUNTED_HOUSE_SEED`
    /// when it is set.
    pub fn from_env() -> Self {
        let settings = Self::default();

        match std::env::var(SEED_ENV_VAR) {
            Ok(value) => match value.trim().parse::<u64>() {
                Ok(seed) => settings.with_seed(seed),
                Err(e) => {
                    warn!("ignoring {SEED_ENV_VAR}={value:?}: {e}");
                    settings
                }
            },
            Err(_) => settings,
        }
    }

    fn validate(&self) -> Result<(), BuildError> {
        let Range { start, end } = self.grave_radius;

        if start.is_nan() || end.is_nan() || start >= end {
            return Err(BuildError::EmptyGraveRange {
                min: start,
                max: end,
            });
        }

        if start <= HOUSE_FOOTPRINT_RADIUS {
            return Err(BuildError::GravesOverlapHouse {
                min_radius: start,
                house_radius: HOUSE_FOOTPRINT_RADIUS,
            });
        }

        Ok(())
    }
}

/// Lights that stay where they were placed.
#[derive(Copy, Clone, Debug)]
pub struct StaticLights {
    pub ambient: NodeId,
    pub moon: NodeId,
    pub door: NodeId,
}

/// Nodes making up the house group.
#[derive(Clone, Debug)]
pub struct HouseNodes {
    pub group: NodeId,
    pub walls: NodeId,
    pub roof: NodeId,
    pub door: NodeId,
    pub bushes: [NodeId; 4],
}

#[derive(Clone, Debug)]
pub struct GraveField {
    pub group: NodeId,
    pub markers: Vec<NodeId>,
    /// Seed the markers were placed with.
    pub seed: u64,
}

/// Creates the nodes of the haunted house scene.
pub struct SceneBuilder<'a> {
    settings: &'a SceneSettings,
    textures: &'a mut TextureProvider,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(settings: &'a SceneSettings, textures: &'a mut TextureProvider) -> Self {
        Self { settings, textures }
    }

    /// Create every node of the scene. Texture loads are started here and
    /// complete in the background.
    pub fn assemble(mut self) -> Result<SceneAssembly, BuildError> {
        self.settings.validate()?;

        let mut scene = Scene::new();
        scene.set_background(rgb_hex(FOG_COLOR));
        scene.set_fog(Some(Fog::new(rgb_hex(FOG_COLOR), FOG_NEAR, FOG_FAR)));

        let lights = add_static_lights(&mut scene)?;
        let ghosts = add_ghosts(&mut scene)?;
        let floor = self.add_floor(&mut scene)?;
        let house = self.add_house(&mut scene)?;
        let graves = self.add_graves(&mut scene)?;

        Ok(SceneAssembly {
            scene,
            lights,
            ghosts,
            floor,
            house,
            graves,
        })
    }

    fn texture(&mut self, path: &str, settings: TextureSettings) -> TextureHandle {
        self.textures.load(path, settings)
    }

    fn add_floor(&mut self, scene: &mut Scene) -> Result<NodeId, BuildError> {
        let tiled = TextureSettings::default().tiled(8.0, 8.0);
        let material = MaterialBuilder::new()
            .map(self.texture("textures/grass/color.png", TextureSettings::srgb().tiled(8.0, 8.0)))
            .ao_map(self.texture("textures/grass/ambientOcclusion.png", tiled))
            .normal_map(self.texture("textures/grass/normal.png", tiled))
            .roughness_map(self.texture("textures/grass/roughness.png", tiled))
            .build();

        let floor = scene.add_mesh(
            scene.root(),
            "floor",
            Rc::new(Geometry::plane(20.0, 20.0, 1, 1).with_uv2()),
            Rc::new(material),
        )?;
        scene.try_node_mut(floor)?.transform =
            Transform::default().with_rotation(Vec3::new(-FRAC_PI_2, 0.0, 0.0));

        Ok(floor)
    }

    fn add_house(&mut self, scene: &mut Scene) -> Result<HouseNodes, BuildError> {
        let group = scene.add_group(scene.root(), "house")?;

        let linear = TextureSettings::default();
        let wall_material = MaterialBuilder::new()
            .map(self.texture("textures/bricks/color.png", TextureSettings::srgb()))
            .ao_map(self.texture("textures/bricks/ambientOcclusion.png", linear))
            .normal_map(self.texture("textures/bricks/normal.png", linear))
            .roughness_map(self.texture("textures/bricks/roughness.png", linear))
            .build();

        let walls = scene.add_mesh(
            group,
            "walls",
            Rc::new(Geometry::cuboid(WALL_SIZE.x, WALL_SIZE.y, WALL_SIZE.z).with_uv2()),
            Rc::new(wall_material),
        )?;
        scene.set_position(walls, Vec3::new(0.0, WALL_SIZE.y / 2.0, 0.0))?;

        let roof = scene.add_mesh(
            group,
            "roof",
            Rc::new(Geometry::cone(3.5, 1.5, 4)),
            Rc::new(MaterialBuilder::new().color_hex(0xb35f45).build()),
        )?;
        scene.try_node_mut(roof)?.transform =
            Transform::from_position(Vec3::new(0.0, WALL_SIZE.y + 0.5, 0.0))
                .with_rotation(Vec3::new(0.0, FRAC_PI_4, 0.0));

        let door_material = MaterialBuilder::new()
            .map(self.texture("textures/door/color.png", TextureSettings::srgb()))
            .alpha_map(self.texture("textures/door/alpha.png", linear))
            .transparent(true)
            .ao_map(self.texture("textures/door/ambientOcclusion.png", linear))
            .displacement_map(self.texture("textures/door/height.png", linear))
            .displacement_scale(0.1)
            .normal_map(self.texture("textures/door/normal.png", linear))
            .metalness_map(self.texture("textures/door/metalness.png", linear))
            .roughness_map(self.texture("textures/door/roughness.png", linear))
            .build();

        let door = scene.add_mesh(
            group,
            "door",
            Rc::new(Geometry::plane(2.2, 2.2, 100, 100).with_uv2()),
            Rc::new(door_material),
        )?;
        // Sits just in front of the wall to avoid z-fighting.
        scene.set_position(door, Vec3::new(0.0, 1.0, WALL_SIZE.z / 2.0 + 0.001))?;

        let bush_geometry = Rc::new(Geometry::sphere(1.0, 16, 16));
        let bush_material = Rc::new(MaterialBuilder::new().color_hex(0x89c854).build());
        let mut bushes = Vec::with_capacity(BUSHES.len());

        for (i, (position, scale)) in BUSHES.iter().enumerate() {
            let bush = scene.add_mesh(
                group,
                &format!("bush{}", i + 1),
                bush_geometry.clone(),
                bush_material.clone(),
            )?;
            scene.try_node_mut(bush)?.transform =
                Transform::from_position(*position).with_scale(Vec3::splat(*scale));
            bushes.push(bush);
        }

        Ok(HouseNodes {
            group,
            walls,
            roof,
            door,
            bushes: [bushes[0], bushes[1], bushes[2], bushes[3]],
        })
    }

    fn add_graves(&mut self, scene: &mut Scene) -> Result<GraveField, BuildError> {
        let seed = self.settings.grave_seed.unwrap_or_else(rand::random);
        info!(seed, count = self.settings.grave_count, "placing graves");

        let mut rng = StdRng::seed_from_u64(seed);
        let group = scene.add_group(scene.root(), "graves")?;
        let geometry = Rc::new(Geometry::cuboid(0.6, 0.8, 0.2));
        let material = Rc::new(MaterialBuilder::new().color_hex(0xb2b6b1).build());

        let mut markers = Vec::with_capacity(self.settings.grave_count);

        for i in 0..self.settings.grave_count {
            let angle = rng.gen::<f32>() * TAU;
            let radius = rng.gen_range(self.settings.grave_radius.clone());
            let yaw = (rng.gen::<f32>() - 0.5) * 0.4;
            let roll = (rng.gen::<f32>() - 0.5) * 0.2;

            let grave = scene.add_mesh(
                group,
                &format!("grave{i}"),
                geometry.clone(),
                material.clone(),
            )?;
            scene.try_node_mut(grave)?.transform = Transform::from_position(Vec3::new(
                angle.sin() * radius,
                0.4,
                angle.cos() * radius,
            ))
            .with_rotation(Vec3::new(0.0, yaw, roll));

            markers.push(grave);
        }

        Ok(GraveField {
            group,
            markers,
            seed,
        })
    }
}

fn add_static_lights(scene: &mut Scene) -> Result<StaticLights, SceneError> {
    let root = scene.root();
    let ambient = scene.add_light(root, "ambient", Light::ambient(0xffffff, 0.12))?;

    let moon = scene.add_light(
        root,
        "moon",
        Light::Directional(DirectionalLight::new(0xffffff, 0.12)),
    )?;
    scene.set_position(moon, Vec3::new(4.0, 5.0, -2.0))?;

    let door = scene.add_light(
        root,
        "door_light",
        Light::Point(PointLight::new(0xff7d46, 1.0).with_distance(7.0)),
    )?;
    scene.set_position(door, Vec3::new(0.0, 2.2, 2.7))?;

    Ok(StaticLights {
        ambient,
        moon,
        door,
    })
}

fn add_ghosts(scene: &mut Scene) -> Result<GhostLights, SceneError> {
    let mut ghosts = Vec::with_capacity(GhostOrbit::ALL.len());

    for orbit in GhostOrbit::ALL {
        let node = scene.add_light(scene.root(), orbit.name(), Light::Point(orbit.light()))?;
        scene.set_position(node, orbit.position_at(0.0))?;
        ghosts.push((orbit, node));
    }

    Ok(GhostLights::new(ghosts))
}

/// A scene whose nodes exist but have not been validated or had shadows
/// configured.
pub struct SceneAssembly {
    scene: Scene,
    lights: StaticLights,
    ghosts: GhostLights,
    floor: NodeId,
    house: HouseNodes,
    graves: GraveField,
}

impl SceneAssembly {
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Check every mesh can be drawn with its material, then turn on shadow
    /// casting and receiving.
    pub fn finalize(mut self) -> Result<HauntedHouse, BuildError> {
        check_uv2(&self.scene)?;

        let casters = [self.house.walls, self.house.door]
            .into_iter()
            .chain(self.house.bushes)
            .chain(self.graves.markers.iter().copied());

        for id in casters {
            self.scene.try_node_mut(id)?.cast_shadow = true;
        }

        self.scene.try_node_mut(self.floor)?.receive_shadow = true;

        let shadow_lights = [self.lights.moon, self.lights.door]
            .into_iter()
            .chain(self.ghosts.iter().map(|(_, node)| *node));

        for id in shadow_lights {
            let node = self.scene.try_node_mut(id)?;
            node.cast_shadow = true;

            if let Some(shadow) = node.as_light_mut().and_then(|l| l.shadow_mut()) {
                shadow.map_size = SHADOW_MAP_SIZE;
                shadow.far = SHADOW_FAR;
            }
        }

        info!(nodes = self.scene.len(), "haunted house scene ready");

        Ok(HauntedHouse {
            scene: self.scene,
            lights: self.lights,
            ghosts: self.ghosts,
            floor: self.floor,
            house: self.house,
            graves: self.graves,
        })
    }
}

/// Reject meshes that sample an ambient occlusion map without a second uv
/// channel.
fn check_uv2(scene: &Scene) -> Result<(), SceneError> {
    let mut missing = None;

    scene.traverse(|_, node, _| {
        if let NodeKind::Mesh(mesh) = node.kind() {
            if missing.is_none() && mesh.material.requires_uv2() && !mesh.geometry.has_uv2() {
                missing = Some(node.name.clone());
            }
        }
    });

    match missing {
        Some(name) => Err(SceneError::MissingUv2(name)),
        None => Ok(()),
    }
}

/// The finished scene along with handles to its interesting nodes.
pub struct HauntedHouse {
    pub scene: Scene,
    pub lights: StaticLights,
    pub ghosts: GhostLights,
    pub floor: NodeId,
    pub house: HouseNodes,
    pub graves: GraveField,
}

impl HauntedHouse {
    /// Assemble and finalize the scene in one go.
    pub fn build(
        settings: &SceneSettings,
        textures: &mut TextureProvider,
    ) -> Result<Self, BuildError> {
        SceneBuilder::new(settings, textures).assemble()?.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::ManualLoader;

    fn build(settings: &SceneSettings) -> HauntedHouse {
        let mut textures = TextureProvider::with_loader(ManualLoader::default());
        HauntedHouse::build(settings, &mut textures).unwrap()
    }

    fn seeded() -> SceneSettings {
        SceneSettings::default().with_seed(1234)
    }

    fn grave_positions(house: &HauntedHouse) -> Vec<Vec3> {
        house
            .graves
            .markers
            .iter()
            .map(|id| house.scene.node(*id).unwrap().transform.position)
            .collect()
    }

    #[test]
    fn house_group_has_walls_roof_door_and_bushes() {
        let house = build(&seeded());
        let children = house.scene.children(house.house.group);

        assert_eq!(7, children.len());
        assert_eq!(
            vec!["walls", "roof", "door", "bush1", "bush2", "bush3", "bush4"],
            children
                .iter()
                .map(|id| house.scene.node(*id).unwrap().name.as_str())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn door_sits_in_front_of_the_wall() {
        let house = build(&seeded());
        let door = house.scene.node(house.house.door).unwrap();

        assert!((door.transform.position - Vec3::new(0.0, 1.0, 2.001)).length() < 1e-6);

        let material = &door.as_mesh().unwrap().material;
        assert!(material.transparent);
        assert_eq!(0.1, material.displacement_scale);
    }

    #[test]
    fn fifty_graves_cast_shadows() {
        let house = build(&seeded());

        assert_eq!(50, house.graves.markers.len());
        assert_eq!(50, house.scene.children(house.graves.group).len());

        for id in &house.graves.markers {
            let grave = house.scene.node(*id).unwrap();
            assert!(grave.cast_shadow);
            assert!(!grave.receive_shadow);
            assert_eq!(0.4, grave.transform.position.y);
            assert!(grave.transform.rotation.y.abs() <= 0.2);
            assert!(grave.transform.rotation.z.abs() <= 0.1);
        }
    }

    #[test]
    fn graves_stay_inside_their_ring() {
        let house = build(&seeded());

        for p in grave_positions(&house) {
            let r = glam::DVec2::new(p.x as f64, p.z as f64).length();
            // The far edge is exclusive. Only the near edge needs slack for
            // the sin/cos rounding.
            assert!(r >= 3.0 - 1e-4 && r < 9.0, "grave at radius {r}");
        }
    }

    #[test]
    fn same_seed_places_graves_identically() {
        let a = build(&seeded());
        let b = build(&seeded());
        let c = build(&SceneSettings::default().with_seed(99));

        assert_eq!(grave_positions(&a), grave_positions(&b));
        assert_ne!(grave_positions(&a), grave_positions(&c));
        assert_eq!(1234, a.graves.seed);
    }

    #[test]
    fn only_the_floor_receives_shadows() {
        let house = build(&seeded());
        let mut receivers = Vec::new();

        house.scene.traverse(|id, node, _| {
            if node.receive_shadow {
                receivers.push(id);
            }
        });

        assert_eq!(vec![house.floor], receivers);
    }

    #[test]
    fn roof_does_not_cast_shadows() {
        let house = build(&seeded());

        assert!(!house.scene.node(house.house.roof).unwrap().cast_shadow);
        assert!(house.scene.node(house.house.walls).unwrap().cast_shadow);
        assert!(house
            .house
            .bushes
            .iter()
            .all(|id| house.scene.node(*id).unwrap().cast_shadow));
    }

    #[test]
    fn shadow_casting_lights_use_small_maps() {
        let house = build(&seeded());
        let ambient = house.scene.node(house.lights.ambient).unwrap();
        assert!(!ambient.cast_shadow);

        let lights = [house.lights.moon, house.lights.door]
            .into_iter()
            .chain(house.ghosts.iter().map(|(_, id)| *id));

        for id in lights {
            let node = house.scene.node(id).unwrap();
            let shadow = node.as_light().unwrap().shadow().unwrap();

            assert!(node.cast_shadow);
            assert_eq!(256, shadow.map_size);
            assert_eq!(7.0, shadow.far);
        }
    }

    #[test]
    fn scene_has_fog_and_three_ghosts() {
        let house = build(&seeded());
        let fog = house.scene.fog().unwrap();

        assert_eq!(rgb_hex(0x262837), fog.color);
        assert_eq!((1.0, 15.0), (fog.near, fog.far));
        assert_eq!(rgb_hex(0x262837), house.scene.background());
        assert_eq!(3, house.ghosts.len());
    }

    #[test]
    fn every_texture_is_requested_once() {
        let loader = ManualLoader::default();
        let mut textures = TextureProvider::with_loader(loader.clone());
        HauntedHouse::build(&seeded(), &mut textures).unwrap();

        assert_eq!(15, loader.started.borrow().len());
        assert_eq!(15, textures.pending());
    }

    #[test]
    fn ao_map_without_uv2_is_rejected() {
        let mut textures = TextureProvider::with_loader(ManualLoader::default());
        let mut assembly = SceneBuilder::new(&seeded(), &mut textures)
            .assemble()
            .unwrap();

        let ao = textures.load("textures/bricks/ambientOcclusion.png", Default::default());
        let scene = assembly.scene_mut();
        scene
            .add_mesh(
                scene.root(),
                "shed",
                Rc::new(Geometry::cuboid(1.0, 1.0, 1.0)),
                Rc::new(MaterialBuilder::new().ao_map(ao).build()),
            )
            .unwrap();

        assert_eq!(
            Some(BuildError::Scene(SceneError::MissingUv2("shed".to_owned()))),
            assembly.finalize().err()
        );
    }

    #[test]
    fn graves_may_not_overlap_the_house() {
        let mut textures = TextureProvider::with_loader(ManualLoader::default());
        let settings = SceneSettings {
            grave_radius: 2.0..9.0,
            ..seeded()
        };

        assert!(matches!(
            SceneBuilder::new(&settings, &mut textures).assemble().err(),
            Some(BuildError::GravesOverlapHouse { .. })
        ));

        let settings = SceneSettings {
            grave_radius: 9.0..3.0,
            ..seeded()
        };

        assert!(matches!(
            SceneBuilder::new(&settings, &mut textures).assemble().err(),
            Some(BuildError::EmptyGraveRange { .. })
        ));
    }
}
