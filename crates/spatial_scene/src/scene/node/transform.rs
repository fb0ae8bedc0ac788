//! Local TRS and the lazily recomputed world-space cache
//!
//! Six dirty bits gate six cached values. Mutating a local component marks
//! every bit on the node and its whole subtree in one recursive pass; getters
//! recompute only what they need, pulling the parent's world matrix first.

use std::rc::Rc;

use log::warn;

use crate::foundation::math::{
    decompose_rotation, decompose_scale, decompose_translation, directions, look_rotation, Mat4,
    Point3, Quat, Transform, Vec3,
};
use crate::scene::dirty::DirtyFlags;
use crate::scene::error::SceneError;
use crate::scene::listeners::TransformChangedListener;

use super::Node;

const MIN_LOOK_LENGTH_SQUARED: f32 = 1e-12;

pub(super) struct TransformCache {
    local: Transform,
    local_matrix: Mat4,
    world_matrix: Mat4,
    world_inverse: Mat4,
    world_position: Vec3,
    world_rotation: Quat,
    world_scale: Vec3,
    dirty: DirtyFlags,
}

impl Default for TransformCache {
    fn default() -> Self {
        Self {
            local: Transform::identity(),
            local_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
            world_inverse: Mat4::identity(),
            world_position: Vec3::zeros(),
            world_rotation: Quat::identity(),
            world_scale: Vec3::new(1.0, 1.0, 1.0),
            dirty: DirtyFlags::all(),
        }
    }
}

impl Node {
    /// Position relative to the parent
    pub fn local_position(&self) -> Vec3 {
        self.inner.transform.borrow().local.position
    }

    /// Rotation relative to the parent
    pub fn local_rotation(&self) -> Quat {
        self.inner.transform.borrow().local.rotation
    }

    /// Scale relative to the parent
    pub fn local_scale(&self) -> Vec3 {
        self.inner.transform.borrow().local.scale
    }

    /// Full local TRS
    pub fn local_transform(&self) -> Transform {
        self.inner.transform.borrow().local
    }

    /// Set the position relative to the parent
    pub fn set_local_position(&self, position: Vec3) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;
        self.write_local(|local| local.position = position);
        Ok(())
    }

    /// Set the rotation relative to the parent
    pub fn set_local_rotation(&self, rotation: Quat) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;
        self.write_local(|local| local.rotation = rotation);
        Ok(())
    }

    /// Set the scale relative to the parent
    pub fn set_local_scale(&self, scale: Vec3) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;
        self.write_local(|local| local.scale = scale);
        Ok(())
    }

    /// Replace the whole local TRS with a single notification
    pub fn set_local_transform(&self, transform: Transform) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;
        self.write_local(|local| *local = transform);
        Ok(())
    }

    /// Local model matrix (T * R * S)
    pub fn local_matrix(&self) -> Mat4 {
        let mut cache = self.inner.transform.borrow_mut();
        if cache.dirty.contains(DirtyFlags::LOCAL_MATRIX) {
            cache.local_matrix = cache.local.to_matrix();
            cache.dirty.remove(DirtyFlags::LOCAL_MATRIX);
        }
        cache.local_matrix
    }

    /// World model matrix (parent world * local)
    pub fn world_matrix(&self) -> Mat4 {
        if let Some(matrix) = self.cached(DirtyFlags::WORLD_MATRIX, |cache| cache.world_matrix) {
            return matrix;
        }

        let local = self.local_matrix();
        let world = match self.parent() {
            Some(parent) => parent.world_matrix() * local,
            None => local,
        };
        self.store(DirtyFlags::WORLD_MATRIX, |cache| cache.world_matrix = world);
        world
    }

    /// Inverse of the world model matrix.
    ///
    /// When the world matrix is singular the last invertible result is
    /// returned and the value stays dirty.
    pub fn world_matrix_inverse(&self) -> Mat4 {
        if let Some(inverse) = self.cached(DirtyFlags::WORLD_INVERSE, |cache| cache.world_inverse) {
            return inverse;
        }

        match self.world_matrix().try_inverse() {
            Some(inverse) => {
                self.store(DirtyFlags::WORLD_INVERSE, |cache| cache.world_inverse = inverse);
                inverse
            }
            None => {
                warn!("World matrix of '{}' is singular", self.name());
                self.inner.transform.borrow().world_inverse
            }
        }
    }

    /// World-space position; the local position for parentless nodes
    pub fn world_position(&self) -> Vec3 {
        if let Some(position) = self.cached(DirtyFlags::WORLD_POSITION, |cache| cache.world_position) {
            return position;
        }

        let position = match self.parent() {
            Some(_) => decompose_translation(&self.world_matrix()),
            None => self.local_position(),
        };
        self.store(DirtyFlags::WORLD_POSITION, |cache| cache.world_position = position);
        position
    }

    /// World-space rotation; the local rotation for parentless nodes
    pub fn world_rotation(&self) -> Quat {
        if let Some(rotation) = self.cached(DirtyFlags::WORLD_ROTATION, |cache| cache.world_rotation) {
            return rotation;
        }

        let rotation = match self.parent() {
            Some(_) => decompose_rotation(&self.world_matrix(), &self.world_scale()),
            None => self.local_rotation(),
        };
        self.store(DirtyFlags::WORLD_ROTATION, |cache| cache.world_rotation = rotation);
        rotation
    }

    /// World-space scale; the local scale for parentless nodes
    pub fn world_scale(&self) -> Vec3 {
        if let Some(scale) = self.cached(DirtyFlags::WORLD_SCALE, |cache| cache.world_scale) {
            return scale;
        }

        let scale = match self.parent() {
            Some(_) => decompose_scale(&self.world_matrix()),
            None => self.local_scale(),
        };
        self.store(DirtyFlags::WORLD_SCALE, |cache| cache.world_scale = scale);
        scale
    }

    /// Move the node so that its world position becomes `position`
    pub fn set_world_position(&self, position: Vec3) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;
        self.write_world_position(position);
        Ok(())
    }

    /// Rotate the node so that its world rotation becomes `rotation`
    pub fn set_world_rotation(&self, rotation: Quat) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;
        self.write_world_rotation(rotation);
        Ok(())
    }

    /// Scale the node so that its world scale becomes `scale`.
    ///
    /// The local scale is solved from the parent's world matrix composed with
    /// the node's unscaled local matrix. If that product is singular the call
    /// fails with [`SceneError::SingularTransform`] and nothing changes.
    pub fn set_world_scale(&self, scale: Vec3) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;

        match self.parent() {
            Some(parent) => {
                let unscaled = parent.world_matrix() * self.local_transform().to_unscaled_matrix();
                let Some(inverse) = unscaled.try_inverse() else {
                    warn!("Cannot solve world scale of '{}': singular parent chain", self.name());
                    return Err(SceneError::SingularTransform { node: self.name() });
                };
                let local_scale = decompose_scale(&(inverse * Mat4::new_nonuniform_scaling(&scale)));
                self.write_local(|local| local.scale = local_scale);
            }
            None => self.write_local(|local| local.scale = scale),
        }

        self.store(DirtyFlags::WORLD_SCALE, |cache| cache.world_scale = scale);
        Ok(())
    }

    /// Drive the node from an external pose, bypassing any transform lock
    pub fn apply_tracked_pose(&self, position: Vec3, rotation: Quat) -> Result<(), SceneError> {
        self.ensure_alive()?;

        let (local_position, local_rotation) = match self.parent() {
            Some(parent) => (
                parent.world_to_local_point(&position),
                parent.world_rotation().inverse() * rotation,
            ),
            None => (position, rotation),
        };
        self.write_local(|local| {
            local.position = local_position;
            local.rotation = local_rotation;
        });

        self.store(DirtyFlags::WORLD_POSITION, |cache| cache.world_position = position);
        self.store(DirtyFlags::WORLD_ROTATION, |cache| cache.world_rotation = rotation);
        Ok(())
    }

    /// Convert a point from this node's space to world space
    pub fn local_to_world_point(&self, point: &Vec3) -> Vec3 {
        self.world_matrix().transform_point(&Point3::from(*point)).coords
    }

    /// Convert a world-space point into this node's space
    pub fn world_to_local_point(&self, point: &Vec3) -> Vec3 {
        self.world_matrix_inverse().transform_point(&Point3::from(*point)).coords
    }

    /// Rotate a direction from this node's space to world space (scale ignored)
    pub fn local_to_world_direction(&self, direction: &Vec3) -> Vec3 {
        self.world_rotation() * direction
    }

    /// Rotate a world-space direction into this node's space (scale ignored)
    pub fn world_to_local_direction(&self, direction: &Vec3) -> Vec3 {
        self.world_rotation().inverse() * direction
    }

    /// World-space -Z of the node
    pub fn forward(&self) -> Vec3 {
        self.local_to_world_direction(&directions::forward())
    }

    /// World-space +Z of the node
    pub fn back(&self) -> Vec3 {
        self.local_to_world_direction(&directions::back())
    }

    /// World-space +X of the node
    pub fn right(&self) -> Vec3 {
        self.local_to_world_direction(&directions::right())
    }

    /// World-space -X of the node
    pub fn left(&self) -> Vec3 {
        self.local_to_world_direction(&directions::left())
    }

    /// World-space +Y of the node
    pub fn up(&self) -> Vec3 {
        self.local_to_world_direction(&directions::up())
    }

    /// World-space -Y of the node
    pub fn down(&self) -> Vec3 {
        self.local_to_world_direction(&directions::down())
    }

    /// Rotate the node so its forward axis points along `look`
    pub fn set_look_direction(&self, look: &Vec3, up: &Vec3) -> Result<(), SceneError> {
        self.ensure_transform_mutable()?;
        if look.norm_squared() < MIN_LOOK_LENGTH_SQUARED {
            warn!("Ignoring zero look direction for '{}'", self.name());
            return Ok(());
        }
        self.write_world_rotation(look_rotation(look, up));
        Ok(())
    }

    /// [`Node::set_look_direction`] with +Y as up, or +Z when `look` is nearly vertical
    pub fn set_look_direction_auto(&self, look: &Vec3) -> Result<(), SceneError> {
        if look.norm_squared() < MIN_LOOK_LENGTH_SQUARED {
            return self.set_look_direction(look, &directions::up());
        }

        let epsilon = self.with_config(|config| config.look_direction_up_epsilon);
        let up = if look.normalize().dot(&directions::up()).abs() > epsilon {
            directions::back()
        } else {
            directions::up()
        };
        self.set_look_direction(look, &up)
    }

    /// Register a transform listener; returns false if it was already registered.
    ///
    /// The node only keeps a weak reference.
    pub fn add_transform_changed_listener<L>(&self, listener: &Rc<L>) -> bool
    where
        L: TransformChangedListener + 'static,
    {
        let weak = Rc::downgrade(listener);
        self.inner.transform_listeners.borrow_mut().add(weak)
    }

    /// Unregister a transform listener
    pub fn remove_transform_changed_listener<L>(&self, listener: &Rc<L>) -> bool
    where
        L: TransformChangedListener + 'static,
    {
        let weak = Rc::downgrade(listener) as std::rc::Weak<dyn TransformChangedListener>;
        self.inner.transform_listeners.borrow_mut().remove(&weak)
    }

    /// Set `flags` on this node and its subtree, notifying transform listeners.
    ///
    /// Recursion stops at a node whose flags already cover `flags`, unless
    /// notifications are enabled on `originating`.
    pub(crate) fn mark_transform_changed_recursively(&self, flags: DirtyFlags, originating: &Node) {
        let mut needs_recursion = false;

        let newly_dirty = {
            let mut cache = self.inner.transform.borrow_mut();
            if cache.dirty.contains(flags) {
                None
            } else {
                cache.dirty.insert(flags);
                Some(cache.dirty)
            }
        };

        if let Some(dirty) = newly_dirty {
            if dirty.contains(DirtyFlags::WORLD_MATRIX) {
                self.with_attachments(|attachments| attachments.mark_collider_dirty());
            }
            needs_recursion = true;
        }

        if originating.inner.dispatch_transform_events.get() {
            self.dispatch_transform_changed(originating);
            needs_recursion = true;
        }

        if needs_recursion {
            for child in self.inner.children.to_vec() {
                child.mark_transform_changed_recursively(flags, originating);
            }
        }
    }

    fn dispatch_transform_changed(&self, originating: &Node) {
        if let Some(behavior) = self.behavior() {
            behavior.on_transform_change(self, originating);
        }

        let listeners = self.inner.transform_listeners.borrow_mut().snapshot();
        for listener in listeners {
            listener.on_transform_changed(self, originating);
        }
    }

    fn ensure_transform_mutable(&self) -> Result<(), SceneError> {
        self.ensure_alive()?;
        if let Some(lock) = self.transform_lock() {
            warn!("Transform of '{}' is locked ({lock:?})", self.name());
            return Err(SceneError::TransformLocked { node: self.name(), lock });
        }
        Ok(())
    }

    fn write_local(&self, update: impl FnOnce(&mut Transform)) {
        update(&mut self.inner.transform.borrow_mut().local);
        self.mark_transform_changed_recursively(DirtyFlags::LOCAL, self);
    }

    fn write_world_position(&self, position: Vec3) {
        let local_position = match self.parent() {
            Some(parent) => parent.world_to_local_point(&position),
            None => position,
        };
        self.write_local(|local| local.position = local_position);
        self.store(DirtyFlags::WORLD_POSITION, |cache| cache.world_position = position);
    }

    fn write_world_rotation(&self, rotation: Quat) {
        let local_rotation = match self.parent() {
            Some(parent) => parent.world_rotation().inverse() * rotation,
            None => rotation,
        };
        self.write_local(|local| local.rotation = local_rotation);
        self.store(DirtyFlags::WORLD_ROTATION, |cache| cache.world_rotation = rotation);
    }

    fn cached<T>(&self, flag: DirtyFlags, read: impl FnOnce(&TransformCache) -> T) -> Option<T> {
        let cache = self.inner.transform.borrow();
        (!cache.dirty.contains(flag)).then(|| read(&cache))
    }

    fn store(&self, flag: DirtyFlags, write: impl FnOnce(&mut TransformCache)) {
        let mut cache = self.inner.transform.borrow_mut();
        write(&mut cache);
        cache.dirty.remove(flag);
    }
}
