//! Local and world transforms.
//!
//! A [`Transform`] carries the position / orientation / scale of one scene
//! node together with its composed local matrix and its world matrix. World
//! matrices are recomputed lazily: mutating the transform only marks it
//! stale, and the scene's single top-to-bottom update pass recomputes
//! exactly the stale subtrees.

use cgmath::{Euler, InnerSpace, Matrix3, Matrix4, One, Quaternion, Rad, SquareMatrix, Vector3};

/// Position, orientation and scale with lazily composed matrices.
///
/// Orientation is stored twice, as a quaternion and as Euler angles. The two
/// are kept consistent through the paired setters: writing one representation
/// immediately regenerates the other through the same conversion routine, so
/// reads never observe a stale pairing.
#[derive(Debug, Clone)]
pub struct Transform {
    pub position: Vector3<f32>,
    quaternion: Quaternion<f32>,
    rotation: Euler<Rad<f32>>,
    pub scale: Vector3<f32>,
    /// Composed local matrix. Recomposed from TRS by
    /// [`update_local_matrix`](Self::update_local_matrix), which runs once
    /// per update pass while `auto_update` is set.
    pub matrix: Matrix4<f32>,
    /// Cumulative transform into world space. Valid after the owning
    /// scene's update pass (or [`update_world`](Self::update_world)).
    pub world_matrix: Matrix4<f32>,
    /// When set, the update pass recomposes the local matrix from TRS each
    /// frame. Turn off to drive `matrix` directly.
    pub auto_update: bool,
    world_dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    /// The identity transform.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            quaternion: Quaternion::one(),
            rotation: Euler::new(Rad(0.0), Rad(0.0), Rad(0.0)),
            scale: Vector3::new(1.0, 1.0, 1.0),
            matrix: Matrix4::identity(),
            world_matrix: Matrix4::identity(),
            auto_update: true,
            world_dirty: true,
        }
    }

    pub fn quaternion(&self) -> Quaternion<f32> {
        self.quaternion
    }

    pub fn rotation(&self) -> Euler<Rad<f32>> {
        self.rotation
    }

    /// Set the orientation from a quaternion, regenerating the Euler
    /// representation.
    pub fn set_quaternion(&mut self, quaternion: Quaternion<f32>) {
        self.quaternion = quaternion;
        self.rotation = Euler::from(quaternion);
    }

    /// Set the orientation from Euler angles, regenerating the quaternion.
    pub fn set_rotation(&mut self, rotation: Euler<Rad<f32>>) {
        self.rotation = rotation;
        self.quaternion = Quaternion::from(rotation);
    }

    /// Mark the world matrix stale. Needed after writing `matrix` directly
    /// with `auto_update` off; the TRS setters and the update pass handle it
    /// otherwise.
    pub fn mark_world_dirty(&mut self) {
        self.world_dirty = true;
    }

    /// Recompose the local matrix from position, orientation and scale and
    /// mark the world matrix stale.
    pub fn update_local_matrix(&mut self) {
        self.matrix = Matrix4::from_translation(self.position)
            * Matrix4::from(self.quaternion)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z);
        self.world_dirty = true;
    }

    /// One step of the top-to-bottom world update. Recomposes the local
    /// matrix when `auto_update` is set, then recomputes the world matrix if
    /// this transform is stale or an ancestor was just recomputed
    /// (`forced`). Returns the `forced` flag for this node's descendants, so
    /// a subtree below a moved ancestor updates even when its own local
    /// transforms did not change.
    pub fn update_world(&mut self, parent_world: Option<&Matrix4<f32>>, forced: bool) -> bool {
        if self.auto_update {
            self.update_local_matrix();
        }
        if self.world_dirty || forced {
            self.world_matrix = match parent_world {
                Some(parent) => parent * self.matrix,
                None => self.matrix,
            };
            self.world_dirty = false;
            return true;
        }
        forced
    }

    /// Translation component of the world matrix.
    pub fn world_position(&self) -> Vector3<f32> {
        self.world_matrix.w.truncate()
    }

    /// Overwrite position, orientation and scale from the local matrix.
    pub fn decompose(&mut self) {
        self.position = self.matrix.w.truncate();
        let x = self.matrix.x.truncate();
        let y = self.matrix.y.truncate();
        let z = self.matrix.z.truncate();
        self.scale = Vector3::new(x.magnitude(), y.magnitude(), z.magnitude());
        let rotation = Matrix3::from_cols(x / self.scale.x, y / self.scale.y, z / self.scale.z);
        self.set_quaternion(Quaternion::from(rotation));
    }

    /// Orient the transform so its -Z axis points from `position` at
    /// `target`.
    pub fn look_at(&mut self, target: Vector3<f32>, up: Vector3<f32>) {
        let mut z = self.position - target;
        if z.magnitude2() == 0.0 {
            z.z = 1.0;
        }
        z = z.normalize();
        let mut x = up.cross(z);
        if x.magnitude2() == 0.0 {
            // up and z are parallel; nudge z off-axis and rebuild
            z.z += 1e-4;
            z = z.normalize();
            x = up.cross(z);
        }
        x = x.normalize();
        let y = z.cross(x);
        self.set_quaternion(Quaternion::from(Matrix3::from_cols(x, y, z)));
    }
}

/// The largest per-axis scale factor a matrix applies, used to scale
/// bounding-sphere radii into world space.
pub fn max_scale_on_axis(m: &Matrix4<f32>) -> f32 {
    let x = m.x.truncate().magnitude2();
    let y = m.y.truncate().magnitude2();
    let z = m.z.truncate().magnitude2();
    x.max(y).max(z).sqrt()
}
