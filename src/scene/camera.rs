//! Cameras and the culling frustum.

use cgmath::{Deg, InnerSpace, Matrix4, SquareMatrix, Vector3};

use crate::scene::transform::Transform;

/// One half-space boundary of the camera's visible volume: a unit normal
/// plus a signed offset, so a point's signed distance is `normal · p +
/// constant` in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub constant: f32,
}

impl Plane {
    /// Signed distance of `point` to the plane; negative is outside.
    pub fn distance(&self, point: Vector3<f32>) -> f32 {
        self.normal.dot(point) + self.constant
    }
}

/// The projection a camera applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view.
        fov: Deg<f32>,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
        /// Divides the extents, so larger zoom means a tighter view.
        zoom: f32,
    },
}

/// A camera: a transform plus a projection, with the derived view,
/// projection-view and frustum state the render pass consumes.
///
/// Cameras are standalone values rather than scene nodes: the renderer
/// updates the camera's world matrix separately each frame, so a camera
/// works identically whether or not the application keeps it near a scene.
pub struct Camera {
    pub transform: Transform,
    /// Reference up vector for [`look_at`](Self::look_at).
    pub up: Vector3<f32>,
    projection: Projection,
    pub projection_matrix: Matrix4<f32>,
    /// Inverse of the camera's world matrix; refreshed whenever the world
    /// matrix is.
    pub view_matrix: Matrix4<f32>,
    /// `projection * view`, the matrix depth keys and frustum planes come
    /// from.
    pub projection_view_matrix: Matrix4<f32>,
    pub world_position: Vector3<f32>,
    frustum: [Plane; 6],
}

impl Camera {
    /// A perspective camera. `fov` is the vertical field of view.
    pub fn perspective(fov: Deg<f32>, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::with_projection(Projection::Perspective {
            fov,
            aspect,
            near,
            far,
        });
        camera.rebuild_projection();
        camera
    }

    /// An orthographic camera over the given extents.
    pub fn orthographic(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
        zoom: f32,
    ) -> Self {
        let mut camera = Self::with_projection(Projection::Orthographic {
            left,
            right,
            bottom,
            top,
            near,
            far,
            zoom,
        });
        camera.rebuild_projection();
        camera
    }

    fn with_projection(projection: Projection) -> Self {
        Self {
            transform: Transform::new(),
            up: Vector3::new(0.0, 1.0, 0.0),
            projection,
            projection_matrix: Matrix4::identity(),
            view_matrix: Matrix4::identity(),
            projection_view_matrix: Matrix4::identity(),
            world_position: Vector3::new(0.0, 0.0, 0.0),
            frustum: [Plane {
                normal: Vector3::new(0.0, 0.0, 1.0),
                constant: 0.0,
            }; 6],
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Swap in a new projection and rebuild the projection matrix.
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.rebuild_projection();
    }

    fn rebuild_projection(&mut self) {
        self.projection_matrix = match self.projection {
            Projection::Perspective {
                fov,
                aspect,
                near,
                far,
            } => cgmath::perspective(fov, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
                zoom,
            } => cgmath::ortho(
                left / zoom,
                right / zoom,
                bottom / zoom,
                top / zoom,
                near,
                far,
            ),
        };
    }

    /// Point the camera at `target` using the camera's up vector.
    pub fn look_at(&mut self, target: Vector3<f32>) {
        self.transform.look_at(target, self.up);
    }

    /// Update the camera's world matrix and re-derive view, world position
    /// and projection-view. Called once per frame by the renderer; the view
    /// matrix is refreshed whenever the world matrix is.
    pub fn update_world_matrix(&mut self) {
        self.transform.update_world(None, false);
        self.view_matrix = self
            .transform
            .world_matrix
            .invert()
            .unwrap_or_else(Matrix4::identity);
        self.world_position = self.transform.world_position();
        self.projection_view_matrix = self.projection_matrix * self.view_matrix;
    }

    /// Re-extract the six frustum planes from the projection-view matrix.
    /// Called on demand, so the render pass only pays for this when frustum
    /// culling is requested.
    ///
    /// Planes come out in the fixed order left, right, bottom, top, far,
    /// near, each normalised so signed distances are in world units.
    pub fn update_frustum(&mut self) {
        let m = &self.projection_view_matrix;
        // Row sums/differences of the combined matrix: row 4 ± rows 1..3.
        let rows = [
            [m.x.w - m.x.x, m.y.w - m.y.x, m.z.w - m.z.x, m.w.w - m.w.x], // -x
            [m.x.w + m.x.x, m.y.w + m.y.x, m.z.w + m.z.x, m.w.w + m.w.x], // +x
            [m.x.w + m.x.y, m.y.w + m.y.y, m.z.w + m.z.y, m.w.w + m.w.y], // +y
            [m.x.w - m.x.y, m.y.w - m.y.y, m.z.w - m.z.y, m.w.w - m.w.y], // -y
            [m.x.w - m.x.z, m.y.w - m.y.z, m.z.w - m.z.z, m.w.w - m.w.z], // +z (far)
            [m.x.w + m.x.z, m.y.w + m.y.z, m.z.w + m.z.z, m.w.w + m.w.z], // -z (near)
        ];
        for (plane, row) in self.frustum.iter_mut().zip(rows) {
            let normal = Vector3::new(row[0], row[1], row[2]);
            let inv_len = 1.0 / normal.magnitude();
            plane.normal = normal * inv_len;
            plane.constant = row[3] * inv_len;
        }
    }

    pub fn frustum(&self) -> &[Plane; 6] {
        &self.frustum
    }

    /// Conservative six-plane sphere test: false as soon as the sphere lies
    /// entirely outside one plane, true otherwise. Near frustum edges this
    /// may accept a sphere that is actually outside, but it never rejects
    /// one that is visible.
    pub fn intersects_sphere(&self, center: Vector3<f32>, radius: f32) -> bool {
        for plane in &self.frustum {
            if plane.distance(center) < -radius {
                return false;
            }
        }
        true
    }

    /// Project a world-space point into normalised device coordinates.
    pub fn project(&self, point: Vector3<f32>) -> Vector3<f32> {
        project_point(&self.projection_matrix, project_point(&self.view_matrix, point))
    }

    /// Unproject a normalised-device-coordinate point back into world space.
    pub fn unproject(&self, point: Vector3<f32>) -> Vector3<f32> {
        let inverse_projection = self
            .projection_matrix
            .invert()
            .unwrap_or_else(Matrix4::identity);
        project_point(
            &self.transform.world_matrix,
            project_point(&inverse_projection, point),
        )
    }
}

/// Transform a point by a matrix with a perspective divide.
pub(crate) fn project_point(m: &Matrix4<f32>, point: Vector3<f32>) -> Vector3<f32> {
    let v = m * point.extend(1.0);
    let w = if v.w != 0.0 { v.w } else { 1.0 };
    v.truncate() / w
}
