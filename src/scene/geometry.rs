use std::{
    f32::consts::{PI, TAU},
    sync::atomic::{AtomicU64, Ordering},
};

use glam::{Vec2, Vec3};

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process unique identifier for a `Geometry`. The renderer uses it to cache
/// uploaded vertex buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u64);

impl GeometryId {
    fn next() -> Self {
        Self(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The primitive a geometry was generated from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    Plane {
        width: f32,
        height: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Cuboid {
        width: f32,
        height: f32,
        depth: f32,
    },
    Cone {
        radius: f32,
        height: f32,
        radial_segments: u32,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
}

/// Indexed triangle list with per vertex normals and texture coordinates.
///
/// Triangles wind counter clockwise when viewed from the side their normals
/// point towards.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    shape: Shape,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    uv2: Option<Vec<Vec2>>,
    indices: Vec<u32>,
}

impl Geometry {
    /// A flat rectangle in the XY plane facing +Z, centered on the origin and
    /// subdivided into a grid of `width_segments` by `height_segments` quads.
    pub fn plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> Self {
        let mut builder = GeometryBuilder::default();
        builder.grid(
            [0, 1, 2],
            Vec2::new(1.0, -1.0),
            Vec3::new(width, height, 0.0),
            Vec3::Z,
            width_segments.max(1),
            height_segments.max(1),
        );

        builder.finish(Shape::Plane {
            width,
            height,
            width_segments,
            height_segments,
        })
    }

    /// An axis aligned box centered on the origin. Every face has its own
    /// vertices so edges stay sharp.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        // (u axis, v axis, w axis), (u dir, v dir), face size, normal.
        let faces = [
            ([2, 1, 0], Vec2::new(-1.0, -1.0), Vec3::new(depth, height, width), Vec3::X),
            ([2, 1, 0], Vec2::new(1.0, -1.0), Vec3::new(depth, height, width), -Vec3::X),
            ([0, 2, 1], Vec2::new(1.0, 1.0), Vec3::new(width, depth, height), Vec3::Y),
            ([0, 2, 1], Vec2::new(1.0, -1.0), Vec3::new(width, depth, height), -Vec3::Y),
            ([0, 1, 2], Vec2::new(1.0, -1.0), Vec3::new(width, height, depth), Vec3::Z),
            ([0, 1, 2], Vec2::new(-1.0, -1.0), Vec3::new(width, height, depth), -Vec3::Z),
        ];

        let mut builder = GeometryBuilder::default();

        for (axes, dirs, size, normal) in faces {
            builder.grid(axes, dirs, size, normal, 1, 1);
        }

        builder.finish(Shape::Cuboid {
            width,
            height,
            depth,
        })
    }

    /// A closed cone centered on the origin with its apex pointing up +Y. Four
    /// radial segments produce a square pyramid.
    pub fn cone(radius: f32, height: f32, radial_segments: u32) -> Self {
        let radial_segments = radial_segments.max(3);
        let half_height = height / 2.0;
        let slope = radius / height;

        let mut builder = GeometryBuilder::default();

        // Side: an apex ring and a base ring so each segment gets its own
        // normal and texture coordinate.
        let ring_len = radial_segments + 1;

        for ring in 0..2 {
            let v = ring as f32;
            let ring_radius = v * radius;

            for x in 0..=radial_segments {
                let u = x as f32 / radial_segments as f32;
                let (sin, cos) = (u * TAU).sin_cos();

                builder.push_vertex(
                    Vec3::new(ring_radius * sin, -v * height + half_height, ring_radius * cos),
                    Vec3::new(sin, slope, cos).normalize(),
                    Vec2::new(u, 1.0 - v),
                );
            }
        }

        for x in 0..radial_segments {
            let b = ring_len + x;
            let c = ring_len + x + 1;
            let d = x + 1;

            // The apex triangle of each quad collapses to nothing so only
            // one triangle per segment is emitted.
            builder.indices.extend_from_slice(&[b, c, d]);
        }

        // Base cap facing -Y.
        let center_start = builder.vertex_count();

        for _ in 0..radial_segments {
            builder.push_vertex(
                Vec3::new(0.0, -half_height, 0.0),
                -Vec3::Y,
                Vec2::splat(0.5),
            );
        }

        let rim_start = builder.vertex_count();

        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let (sin, cos) = (u * TAU).sin_cos();

            builder.push_vertex(
                Vec3::new(radius * sin, -half_height, radius * cos),
                -Vec3::Y,
                Vec2::new(cos * 0.5 + 0.5, -sin * 0.5 + 0.5),
            );
        }

        for x in 0..radial_segments {
            let center = center_start + x;
            let rim = rim_start + x;
            builder.indices.extend_from_slice(&[rim + 1, rim, center]);
        }

        builder.finish(Shape::Cone {
            radius,
            height,
            radial_segments,
        })
    }

    /// A UV sphere centered on the origin.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let row_len = width_segments + 1;

        let mut builder = GeometryBuilder::default();

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;

            // Shift pole texture coordinates to the middle of their segment.
            let u_offset = if iy == 0 {
                0.5 / width_segments as f32
            } else if iy == height_segments {
                -0.5 / width_segments as f32
            } else {
                0.0
            };

            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let (sin_phi, cos_phi) = (u * TAU).sin_cos();
                let (sin_theta, cos_theta) = (v * PI).sin_cos();

                let position = Vec3::new(
                    -radius * cos_phi * sin_theta,
                    radius * cos_theta,
                    radius * sin_phi * sin_theta,
                );

                builder.push_vertex(
                    position,
                    position.normalize_or_zero(),
                    Vec2::new(u + u_offset, 1.0 - v),
                );
            }
        }

        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row_len + ix + 1;
                let b = iy * row_len + ix;
                let c = (iy + 1) * row_len + ix;
                let d = (iy + 1) * row_len + ix + 1;

                if iy != 0 {
                    builder.indices.extend_from_slice(&[a, b, d]);
                }

                if iy != height_segments - 1 {
                    builder.indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        builder.finish(Shape::Sphere {
            radius,
            width_segments,
            height_segments,
        })
    }

    /// Copy the primary texture coordinates into a second channel, which is
    /// what ambient occlusion maps are sampled with.
    pub fn with_uv2(mut self) -> Self {
        self.uv2 = Some(self.uvs.clone());
        self
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn uv2(&self) -> Option<&[Vec2]> {
        self.uv2.as_deref()
    }

    pub fn has_uv2(&self) -> bool {
        self.uv2.is_some()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Default)]
struct GeometryBuilder {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
}

impl GeometryBuilder {
    fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
    }

    /// Emit a subdivided rectangle. `axes` maps the grid's (u, v, w) axes to
    /// (x, y, z) components, `dirs` flips u and v, `size` is the extent along
    /// u and v with the offset along w given as `size.z / 2`.
    fn grid(&mut self, axes: [usize; 3], dirs: Vec2, size: Vec3, normal: Vec3, nx: u32, ny: u32) {
        let [u_axis, v_axis, w_axis] = axes;
        let offset = self.vertex_count();
        let half = size / 2.0;
        let w = if normal.dot(Vec3::ONE) < 0.0 {
            -half.z
        } else {
            half.z
        };

        for iy in 0..=ny {
            let y = iy as f32 * size.y / ny as f32 - half.y;

            for ix in 0..=nx {
                let x = ix as f32 * size.x / nx as f32 - half.x;

                let mut position = [0.0; 3];
                position[u_axis] = x * dirs.x;
                position[v_axis] = y * dirs.y;
                position[w_axis] = w;

                self.push_vertex(
                    Vec3::from_array(position),
                    normal,
                    Vec2::new(ix as f32 / nx as f32, 1.0 - iy as f32 / ny as f32),
                );
            }
        }

        let row_len = nx + 1;

        for iy in 0..ny {
            for ix in 0..nx {
                let a = offset + ix + row_len * iy;
                let b = offset + ix + row_len * (iy + 1);
                let c = offset + ix + 1 + row_len * (iy + 1);
                let d = offset + ix + 1 + row_len * iy;

                self.indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }
    }

    fn finish(self, shape: Shape) -> Geometry {
        Geometry {
            id: GeometryId::next(),
            shape,
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            uv2: None,
            indices: self.indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks that every triangle winds counter clockwise around the normal of
    /// its first vertex.
    fn assert_front_faces_outward(geometry: &Geometry) {
        for tri in geometry.indices().chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| geometry.positions()[tri[i] as usize]);
            let face_normal = (b - a).cross(c - a);
            let vertex_normal = geometry.normals()[tri[0] as usize];

            assert!(
                face_normal.dot(vertex_normal) > 0.0,
                "triangle {tri:?} faces away from its normal"
            );
        }
    }

    #[test]
    fn door_plane_is_finely_subdivided() {
        let plane = Geometry::plane(2.2, 2.2, 100, 100);

        assert_eq!(101 * 101, plane.vertex_count());
        assert_eq!(100 * 100 * 6, plane.indices().len());
        assert!(plane.normals().iter().all(|n| *n == Vec3::Z));
        assert_front_faces_outward(&plane);
    }

    #[test]
    fn plane_uvs_cover_unit_square() {
        let plane = Geometry::plane(20.0, 20.0, 1, 1);
        let uvs = plane.uvs();

        assert_eq!(Vec2::new(0.0, 1.0), uvs[0]);
        assert_eq!(Vec2::new(1.0, 0.0), uvs[3]);
        assert_eq!(Vec3::new(-10.0, 10.0, 0.0), plane.positions()[0]);
    }

    #[test]
    fn cuboid_has_separate_faces() {
        let walls = Geometry::cuboid(4.0, 2.5, 4.0);

        assert_eq!(24, walls.vertex_count());
        assert_eq!(36, walls.indices().len());
        assert_front_faces_outward(&walls);

        for (p, n) in walls.positions().iter().zip(walls.normals()) {
            assert!(p.x.abs() <= 2.0 && p.y.abs() <= 1.25 && p.z.abs() <= 2.0);
            // Each face sits on the half extent along its own normal.
            let extent = Vec3::new(2.0, 1.25, 2.0);
            assert!((p.dot(*n) - extent.dot(n.abs())).abs() < 1e-6);
        }
    }

    #[test]
    fn four_sided_cone_is_a_pyramid() {
        let roof = Geometry::cone(3.5, 1.5, 4);
        let top = roof.positions().iter().map(|p| p.y).fold(f32::MIN, f32::max);
        let bottom = roof.positions().iter().map(|p| p.y).fold(f32::MAX, f32::min);

        assert_eq!(0.75, top);
        assert_eq!(-0.75, bottom);
        assert_eq!(4 * 2, roof.indices().len() / 3);
        assert_front_faces_outward(&roof);
    }

    #[test]
    fn sphere_vertices_lie_on_the_surface() {
        let bush = Geometry::sphere(1.0, 16, 16);

        assert_eq!(17 * 17, bush.vertex_count());
        assert!(bush
            .positions()
            .iter()
            .all(|p| (p.length() - 1.0).abs() < 1e-5));
        assert!(bush
            .normals()
            .iter()
            .all(|n| (n.length() - 1.0).abs() < 1e-5));
        assert_front_faces_outward(&bush);
    }

    #[test]
    fn uv2_copies_primary_coordinates() {
        let plane = Geometry::plane(1.0, 1.0, 2, 2);
        assert!(!plane.has_uv2());

        let plane = plane.with_uv2();
        assert_eq!(Some(plane.uvs()), plane.uv2());
    }

    #[test]
    fn every_geometry_gets_its_own_id() {
        let a = Geometry::cuboid(1.0, 1.0, 1.0);
        let b = Geometry::cuboid(1.0, 1.0, 1.0);

        assert_ne!(a.id(), b.id());
    }
}
