//! A small scene graph of groups, meshes and lights.
//!
//! Nodes live in an arena owned by `Scene` and refer to each other with
//! `NodeId` keys. Every node has a local transform that is relative to its
//! parent; world transforms are computed by walking down from the root.
mod geometry;
mod lights;
mod material;

use std::rc::Rc;

use glam::{EulerRot, Mat4, Quat, Vec3};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

pub use geometry::*;
pub use lights::*;
pub use material::*;

new_key_type! {
    /// Key of a node stored in a `Scene`.
    pub struct NodeId;
}

#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("scene node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("mesh `{0}` samples an ambient occlusion map but has no second uv channel")]
    MissingUv2(String),
}

/// Position, rotation and scale of a node relative to its parent.
///
/// `rotation` holds Euler angles in radians that are applied in X, Y, Z order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_rotation(self, rotation: Vec3) -> Self {
        Self { rotation, ..self }
    }

    pub fn with_scale(self, scale: Vec3) -> Self {
        Self { scale, ..self }
    }

    /// The rotation as a quaternion.
    pub fn quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    /// Matrix transforming this node's local space into its parent's space.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }
}

/// A shared geometry paired with a shared material.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Rc<Geometry>,
    pub material: Rc<StandardMaterial>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
}

/// An entry in the scene graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    /// Draw this node into the shadow maps of shadow casting lights. For a
    /// light node this enables the light's shadow map.
    pub cast_shadow: bool,
    /// Darken this node where shadow maps say it is occluded.
    pub receive_shadow: bool,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(name: &str, kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_owned(),
            transform: Default::default(),
            cast_shadow: false,
            receive_shadow: false,
            kind,
            parent,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }
}

/// Linear distance fog applied to everything drawn in a scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    /// sRGB color that distant fragments fade towards.
    pub color: Vec3,
    /// View depth where fog starts.
    pub near: f32,
    /// View depth where fog completely hides geometry.
    pub far: f32,
}

impl Fog {
    pub fn new(color: Vec3, near: f32, far: f32) -> Self {
        Self { color, near, far }
    }

    /// Fraction of the fog color blended into a fragment at `depth` units in
    /// front of the camera.
    pub fn factor(&self, depth: f32) -> f32 {
        let t = ((depth - self.near) / (self.far - self.near)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }
}

/// The full set of nodes drawn by the renderer, plus scene wide settings.
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    fog: Option<Fog>,
    background: Vec3,
}

impl Scene {
    /// Create an empty scene containing only the root group.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new("scene", NodeKind::Group, None));

        Self {
            nodes,
            root,
            fog: None,
            background: Vec3::ZERO,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn add_group(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SceneError> {
        self.insert(parent, name, NodeKind::Group)
    }

    pub fn add_mesh(
        &mut self,
        parent: NodeId,
        name: &str,
        geometry: Rc<Geometry>,
        material: Rc<StandardMaterial>,
    ) -> Result<NodeId, SceneError> {
        self.insert(parent, name, NodeKind::Mesh(Mesh { geometry, material }))
    }

    pub fn add_light(
        &mut self,
        parent: NodeId,
        name: &str,
        light: Light,
    ) -> Result<NodeId, SceneError> {
        self.insert(parent, name, NodeKind::Light(light))
    }

    fn insert(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::UnknownNode(parent));
        }

        let id = self.nodes.insert(Node::new(name, kind, Some(parent)));
        self.nodes[parent].children.push(id);

        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Like `node_mut` but reports a missing node as an error.
    pub fn try_node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::UnknownNode(id))
    }

    /// Children of `id` in insertion order. Unknown nodes have no children.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Move a node to `position` in its parent's space.
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.try_node_mut(id)?.transform.position = position;
        Ok(())
    }

    /// Local to world matrix of a node.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(id)?;
        let mut matrix = node.transform.local_matrix();

        while let Some(parent) = node.parent {
            node = self.nodes.get(parent)?;
            matrix = node.transform.local_matrix() * matrix;
        }

        Some(matrix)
    }

    /// Visit every node reachable from the root (root first, then depth first
    /// in child order) along with its local to world matrix.
    pub fn traverse<F>(&self, mut visit: F)
    where
        F: FnMut(NodeId, &Node, Mat4),
    {
        let mut stack = vec![(self.root, Mat4::IDENTITY)];

        while let Some((id, parent_matrix)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };

            let world = parent_matrix * node.transform.local_matrix();
            visit(id, node, world);

            // Reverse so children pop off the stack in insertion order.
            stack.extend(node.children.iter().rev().map(|child| (*child, world)));
        }
    }

    pub fn fog(&self) -> Option<&Fog> {
        self.fog.as_ref()
    }

    pub fn set_fog(&mut self, fog: Option<Fog>) {
        self.fog = fog;
    }

    /// sRGB color the frame is cleared to before drawing.
    pub fn background(&self) -> Vec3 {
        self.background
    }

    pub fn set_background(&mut self, color: Vec3) {
        self.background = color;
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn test_mesh() -> (Rc<Geometry>, Rc<StandardMaterial>) {
        (
            Rc::new(Geometry::cuboid(1.0, 1.0, 1.0)),
            Rc::new(MaterialBuilder::new().build()),
        )
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut scene = Scene::new();
        let group = scene.add_group(scene.root(), "group").unwrap();
        let (geometry, material) = test_mesh();

        let a = scene
            .add_mesh(group, "a", geometry.clone(), material.clone())
            .unwrap();
        let b = scene.add_mesh(group, "b", geometry, material).unwrap();

        assert_eq!(&[a, b], scene.children(group));
        assert_eq!(Some(group), scene.node(a).unwrap().parent());
        assert_eq!(4, scene.len());
    }

    #[test]
    fn adding_to_a_missing_parent_fails() {
        let mut scene = Scene::new();
        let mut other = Scene::new();
        let foreign = other.add_group(other.root(), "elsewhere").unwrap();

        assert_eq!(
            Err(SceneError::UnknownNode(foreign)),
            scene.add_group(foreign, "orphan")
        );
    }

    #[test]
    fn world_matrix_includes_parents() {
        let mut scene = Scene::new();
        let group = scene.add_group(scene.root(), "group").unwrap();
        scene.set_position(group, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        let (geometry, material) = test_mesh();
        let mesh = scene.add_mesh(group, "mesh", geometry, material).unwrap();
        scene.set_position(mesh, Vec3::new(0.0, 2.0, 0.0)).unwrap();

        let world = scene.world_matrix(mesh).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);

        assert!((origin - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn traverse_visits_every_node_with_world_transform() {
        let mut scene = Scene::new();
        let group = scene.add_group(scene.root(), "group").unwrap();
        scene.set_position(group, Vec3::new(0.0, 0.0, 5.0)).unwrap();
        let light = scene
            .add_light(group, "light", Light::Point(PointLight::new(0xffffff, 1.0)))
            .unwrap();

        let mut visited = Vec::new();
        scene.traverse(|id, _, world| visited.push((id, world.transform_point3(Vec3::ZERO))));

        assert_eq!(3, visited.len());
        assert_eq!(scene.root(), visited[0].0);
        assert_eq!(light, visited[2].0);
        assert!((visited[2].1 - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-6);
    }

    #[test]
    fn rotating_a_plane_normal_to_face_up() {
        let transform = Transform::default().with_rotation(Vec3::new(-FRAC_PI_2, 0.0, 0.0));
        let normal = transform.local_matrix().transform_vector3(Vec3::Z);

        assert!((normal - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn fog_factor_ramps_between_near_and_far() {
        let fog = Fog::new(Vec3::ZERO, 1.0, 15.0);

        assert_eq!(0.0, fog.factor(0.5));
        assert_eq!(1.0, fog.factor(20.0));
        assert!((fog.factor(8.0) - 0.5).abs() < 1e-6);
    }
}
