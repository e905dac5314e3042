//! Per-frame preparation that does not touch the GPU: collecting lights,
//! placing shadow cameras and ordering draws.
use std::cmp::Ordering;

use glam::{Mat4, Vec3};
use tracing::warn;

use super::shaders::{
    packed_structs::{PackedDirectionalLight, PackedPointLight},
    MAX_POINT_LIGHTS, SHADOW_LAYERS,
};
use crate::{
    math_utils::srgb_to_linear,
    scene::{DirectionalLight, Light, Mesh, NodeId, PointLight, Scene, ShadowConfig},
};

/// Look direction and up vector of each cube face, in the order the shader
/// picks faces: +X, -X, +Y, -Y, +Z, -Z.
pub const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Orthographic light camera covering `shadow_extent` around the light's
/// target.
pub fn directional_shadow_matrix(light: &DirectionalLight, position: Vec3) -> Mat4 {
    let direction = light.direction_from(position);
    let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };

    let e = light.shadow_extent;
    let projection =
        Mat4::orthographic_rh(-e, e, -e, e, light.shadow.near, light.shadow.far);

    projection * Mat4::look_at_rh(position, light.target, up)
}

/// One 90 degree perspective camera per cube face around a point light.
pub fn point_shadow_matrices(shadow: &ShadowConfig, position: Vec3) -> [Mat4; 6] {
    let projection =
        Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, shadow.near, shadow.far);

    CUBE_FACES.map(|(forward, up)| projection * Mat4::look_at_rh(position, position + forward, up))
}

/// The light camera used to render one layer of the shadow map array.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowView {
    pub layer: u32,
    pub view_projection: Mat4,
}

/// Every light in a scene, packed for the standard shader.
#[derive(Clone, Debug, Default)]
pub struct FrameLights {
    /// Sum of all ambient lights in linear color.
    pub ambient: Vec3,
    pub directional: Option<PackedDirectionalLight>,
    pub point_lights: Vec<PackedPointLight>,
    pub shadow_views: Vec<ShadowView>,
    /// Size of the largest shadow map requested by a shadow casting light.
    pub shadow_map_size: Option<u32>,
}

impl FrameLights {
    /// Collect the lights of `scene` at their current world positions.
    ///
    /// The first directional light owns shadow layer 0 and point light `i`
    /// owns the six layers starting at `1 + 6 * i`. Lights past what the
    /// shader supports are skipped with a warning.
    pub fn gather(scene: &Scene) -> Self {
        let mut frame = Self::default();

        scene.traverse(|_, node, world| {
            let Some(light) = node.as_light() else {
                return;
            };

            let position = world.transform_point3(Vec3::ZERO);

            match light {
                Light::Ambient(ambient) => {
                    frame.ambient += srgb_to_linear(ambient.color) * ambient.intensity;
                }
                Light::Directional(directional) => {
                    frame.add_directional(&node.name, directional, position, node.cast_shadow)
                }
                Light::Point(point) => {
                    frame.add_point(&node.name, point, position, node.cast_shadow)
                }
            }
        });

        debug_assert!(frame.shadow_views.len() <= SHADOW_LAYERS);
        frame
    }

    fn add_directional(
        &mut self,
        name: &str,
        light: &DirectionalLight,
        position: Vec3,
        cast_shadow: bool,
    ) {
        if self.directional.is_some() {
            warn!("ignoring directional light {name}, only one is supported");
            return;
        }

        let layer = cast_shadow.then_some(0);

        if let Some(layer) = layer {
            self.add_shadow_size(&light.shadow);
            self.shadow_views.push(ShadowView {
                layer,
                view_projection: directional_shadow_matrix(light, position),
            });
        }

        self.directional = Some(PackedDirectionalLight::new(light, position, layer));
    }

    fn add_point(&mut self, name: &str, light: &PointLight, position: Vec3, cast_shadow: bool) {
        let index = self.point_lights.len();

        if index >= MAX_POINT_LIGHTS {
            warn!("ignoring point light {name}, at most {MAX_POINT_LIGHTS} are supported");
            return;
        }

        let first_layer = 1 + 6 * index as u32;
        let layer = cast_shadow.then_some(first_layer);

        if cast_shadow {
            self.add_shadow_size(&light.shadow);

            for (face, view_projection) in point_shadow_matrices(&light.shadow, position)
                .into_iter()
                .enumerate()
            {
                self.shadow_views.push(ShadowView {
                    layer: first_layer + face as u32,
                    view_projection,
                });
            }
        }

        self.point_lights
            .push(PackedPointLight::new(light, position, layer));
    }

    fn add_shadow_size(&mut self, shadow: &ShadowConfig) {
        self.shadow_map_size = Some(
            self.shadow_map_size
                .map_or(shadow.map_size, |size| size.max(shadow.map_size)),
        );
    }
}

/// A mesh node to draw this frame.
#[derive(Clone, Debug)]
pub struct DrawItem<'a> {
    pub node: NodeId,
    pub name: &'a str,
    pub mesh: &'a Mesh,
    pub local_to_world: Mat4,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    /// Distance in front of the camera.
    pub view_depth: f32,
}

/// Mesh nodes split by blending and sorted for drawing.
#[derive(Clone, Debug, Default)]
pub struct DrawList<'a> {
    /// Nearest first so the depth test rejects hidden fragments early.
    pub opaque: Vec<DrawItem<'a>>,
    /// Farthest first so blending composites correctly.
    pub transparent: Vec<DrawItem<'a>>,
}

impl<'a> DrawList<'a> {
    pub fn gather(scene: &'a Scene, view: Mat4) -> Self {
        let mut meshes = Vec::new();
        scene.traverse(|id, node, world| {
            if node.as_mesh().is_some() {
                meshes.push((id, world));
            }
        });

        let mut list = Self::default();

        for (id, local_to_world) in meshes {
            let Some(node) = scene.node(id) else {
                continue;
            };
            let Some(mesh) = node.as_mesh() else {
                continue;
            };

            let center = view.transform_point3(local_to_world.transform_point3(Vec3::ZERO));
            let item = DrawItem {
                node: id,
                name: &node.name,
                mesh,
                local_to_world,
                cast_shadow: node.cast_shadow,
                receive_shadow: node.receive_shadow,
                view_depth: -center.z,
            };

            if mesh.material.transparent {
                list.transparent.push(item);
            } else {
                list.opaque.push(item);
            }
        }

        let by_depth =
            |a: &DrawItem, b: &DrawItem| a.view_depth.partial_cmp(&b.view_depth).unwrap_or(Ordering::Equal);

        // Stable sorts keep scene order between items at equal depth.
        list.opaque.sort_by(by_depth);
        list.transparent.sort_by(|a, b| by_depth(b, a));

        list
    }

    /// Every item that renders into shadow maps.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &DrawItem<'a>> {
        self.opaque
            .iter()
            .chain(self.transparent.iter())
            .filter(|item| item.cast_shadow)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawItem<'a>> {
        self.opaque.iter().chain(self.transparent.iter())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::Vec4;

    use super::*;
    use crate::{
        assets::{tests::ManualLoader, TextureProvider},
        haunted_house::{HauntedHouse, SceneSettings},
        math_utils::rgb_hex,
        scene::{Geometry, MaterialBuilder, Transform},
    };

    /// Mirrors `cube_face` in standard.wgsl: the index into `CUBE_FACES` of the
    /// face a vector pointing in `direction` from the cube's center passes
    /// through.
    fn cube_face(direction: Vec3) -> usize {
        let abs = direction.abs();

        if abs.x >= abs.y && abs.x >= abs.z {
            if direction.x >= 0.0 {
                0
            } else {
                1
            }
        } else if abs.y >= abs.z {
            if direction.y >= 0.0 {
                2
            } else {
                3
            }
        } else if direction.z >= 0.0 {
            4
        } else {
            5
        }
    }

    fn test_house() -> HauntedHouse {
        let mut textures = TextureProvider::with_loader(ManualLoader::default());
        HauntedHouse::build(&SceneSettings::default().with_seed(3), &mut textures).unwrap()
    }

    fn to_ndc(matrix: Mat4, point: Vec3) -> Vec3 {
        let clip = matrix * point.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn cube_faces_match_dominant_axis() {
        assert_eq!(0, cube_face(Vec3::new(2.0, 1.0, -1.0)));
        assert_eq!(1, cube_face(Vec3::new(-2.0, 1.0, -1.0)));
        assert_eq!(2, cube_face(Vec3::new(0.1, 3.0, -1.0)));
        assert_eq!(3, cube_face(Vec3::new(0.1, -3.0, -1.0)));
        assert_eq!(4, cube_face(Vec3::new(0.1, 0.2, 1.0)));
        assert_eq!(5, cube_face(Vec3::new(0.1, 0.2, -1.0)));
    }

    #[test]
    fn point_shadow_faces_see_their_direction() {
        let shadow = ShadowConfig {
            far: 7.0,
            ..Default::default()
        };
        let position = Vec3::new(0.0, 2.2, 2.7);
        let matrices = point_shadow_matrices(&shadow, position);

        for (index, (forward, _)) in CUBE_FACES.iter().enumerate() {
            let ndc = to_ndc(matrices[index], position + *forward * 3.0);
            assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "face {index}: {ndc}");
            assert!((0.0..=1.0).contains(&ndc.z));

            // Points just off axis stay inside the frustum of the face picked
            // for them.
            let off_axis = *forward * 3.0 + Vec3::splat(0.4);
            let ndc = to_ndc(matrices[cube_face(off_axis)], position + off_axis);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
        }
    }

    #[test]
    fn directional_shadow_covers_its_target() {
        let mut light = DirectionalLight::new(0xffffff, 0.12);
        light.shadow.far = 7.0;

        let matrix = directional_shadow_matrix(&light, Vec3::new(4.0, 5.0, -2.0));
        let ndc = to_ndc(matrix, Vec3::ZERO);

        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);

        // Beyond the far plane nothing is covered.
        let far = to_ndc(matrix, Vec3::new(-4.0, -5.0, 2.0));
        assert!(far.z > 1.0);
    }

    #[test]
    fn house_lights_fill_every_shadow_layer() {
        let house = test_house();
        let lights = FrameLights::gather(&house.scene);

        assert_eq!(4, lights.point_lights.len());
        assert_eq!(SHADOW_LAYERS, lights.shadow_views.len());
        assert_eq!(Some(256), lights.shadow_map_size);

        let mut layers: Vec<u32> = lights.shadow_views.iter().map(|v| v.layer).collect();
        layers.sort();
        assert_eq!((0..SHADOW_LAYERS as u32).collect::<Vec<_>>(), layers);

        let directional = lights.directional.unwrap();
        assert_eq!(0.0, directional.direction.w);
        assert_eq!(
            vec![1.0, 7.0, 13.0, 19.0],
            lights
                .point_lights
                .iter()
                .map(|l| l.shadow.x)
                .collect::<Vec<_>>()
        );

        let expected_ambient = srgb_to_linear(rgb_hex(0xffffff)) * 0.12;
        assert!((lights.ambient - expected_ambient).length() < 1e-6);
    }

    #[test]
    fn point_lights_are_packed_at_world_positions() {
        let mut scene = Scene::new();
        let group = scene.add_group(scene.root(), "group").unwrap();
        scene.set_position(group, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        let light = scene
            .add_light(group, "lamp", Light::Point(PointLight::new(0xffffff, 1.0)))
            .unwrap();
        scene.set_position(light, Vec3::new(0.0, 2.0, 0.0)).unwrap();

        let lights = FrameLights::gather(&scene);

        assert_eq!(Vec4::new(1.0, 2.0, 0.0, 0.0), lights.point_lights[0].position);
        assert!(lights.shadow_views.is_empty());
        assert_eq!(None, lights.shadow_map_size);
    }

    #[test]
    fn extra_lights_are_skipped() {
        let mut scene = Scene::new();

        for i in 0..MAX_POINT_LIGHTS + 2 {
            scene
                .add_light(
                    scene.root(),
                    &format!("point{i}"),
                    Light::Point(PointLight::new(0xffffff, 1.0)),
                )
                .unwrap();
        }
        for i in 0..2 {
            scene
                .add_light(
                    scene.root(),
                    &format!("sun{i}"),
                    Light::Directional(DirectionalLight::new(0xffffff, 1.0)),
                )
                .unwrap();
        }

        let lights = FrameLights::gather(&scene);
        assert_eq!(MAX_POINT_LIGHTS, lights.point_lights.len());
        assert!(lights.directional.is_some());
    }

    #[test]
    fn draws_are_sorted_by_blending_and_depth() {
        let mut scene = Scene::new();
        let geometry = Rc::new(Geometry::cuboid(1.0, 1.0, 1.0));
        let opaque = Rc::new(MaterialBuilder::new().build());
        let glass = Rc::new(MaterialBuilder::new().transparent(true).build());

        for (name, z, material) in [
            ("near opaque", -2.0, &opaque),
            ("far opaque", -8.0, &opaque),
            ("near glass", -3.0, &glass),
            ("far glass", -6.0, &glass),
        ] {
            let id = scene
                .add_mesh(scene.root(), name, geometry.clone(), material.clone())
                .unwrap();
            scene.node_mut(id).unwrap().transform = Transform::from_position(Vec3::new(0.0, 0.0, z));
        }

        let list = DrawList::gather(&scene, Mat4::IDENTITY);

        let names = |items: &[DrawItem]| items.iter().map(|i| i.name.to_owned()).collect::<Vec<_>>();
        assert_eq!(vec!["near opaque", "far opaque"], names(&list.opaque));
        assert_eq!(vec!["far glass", "near glass"], names(&list.transparent));
        assert_eq!(2.0, list.opaque[0].view_depth);
    }

    #[test]
    fn only_casters_render_into_shadow_maps() {
        let house = test_house();
        let list = DrawList::gather(&house.scene, Mat4::IDENTITY);

        let casters: Vec<&str> = list.shadow_casters().map(|item| item.name).collect();

        assert!(casters.contains(&"walls"));
        assert!(casters.contains(&"door"));
        assert!(!casters.contains(&"roof"));
        assert!(!casters.contains(&"floor"));
        assert_eq!(1, list.iter().filter(|item| item.receive_shadow).count());
    }
}
