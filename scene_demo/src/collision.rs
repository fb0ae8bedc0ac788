//! Sphere collision world backed by a slot map
//!
//! Shape handles carry the slot key in FFI form so the scene can hold them
//! as plain ids.

use std::cell::RefCell;

use slotmap::{new_key_type, Key, KeyData, SlotMap};
use spatial_scene::foundation::math::Ray;
use spatial_scene::prelude::*;

new_key_type! {
    struct ShapeKey;
}

struct Sphere {
    radius: f32,
    owner: Option<WeakNode>,
}

/// Bounding spheres around node origins
#[derive(Default)]
pub struct SphereWorld {
    shapes: RefCell<SlotMap<ShapeKey, Sphere>>,
}

impl SphereWorld {
    /// Allocate a sphere of `radius` in the owner's local units
    pub fn create_sphere(&self, radius: f32) -> CollisionShapeHandle {
        let key = self.shapes.borrow_mut().insert(Sphere { radius, owner: None });
        CollisionShapeHandle::new(key.data().as_ffi())
    }

    /// Number of allocated shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.borrow().len()
    }

    fn key(shape: &CollisionShapeHandle) -> ShapeKey {
        KeyData::from_ffi(shape.id()).into()
    }

    fn intersect(ray: &Ray, sphere: &Sphere) -> Option<RayHit> {
        let node = sphere.owner.as_ref()?.upgrade()?;
        let center = node.world_position();
        let scale = node.world_scale();
        let radius = sphere.radius * scale.x.abs().max(scale.y.abs()).max(scale.z.abs());

        let to_center = ray.origin - center;
        let b = to_center.dot(&ray.direction);
        let c = to_center.norm_squared() - radius * radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }

        let root = discriminant.sqrt();
        let distance = if -b - root >= 0.0 { -b - root } else { -b + root };
        if distance < 0.0 {
            return None;
        }

        Some(RayHit {
            node: node.downgrade(),
            distance,
            point: ray.point_at(distance),
        })
    }
}

impl CollisionSystem for SphereWorld {
    fn attach_collider(&self, shape: &CollisionShapeHandle, node: WeakNode) {
        if let Some(sphere) = self.shapes.borrow_mut().get_mut(Self::key(shape)) {
            sphere.owner = Some(node);
        }
    }

    fn detach_collider(&self, shape: &CollisionShapeHandle) {
        if let Some(sphere) = self.shapes.borrow_mut().get_mut(Self::key(shape)) {
            sphere.owner = None;
        }
    }

    fn release_shape(&self, shape: CollisionShapeHandle) {
        self.shapes.borrow_mut().remove(Self::key(&shape));
    }

    fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.raycast_all(ray).into_iter().next()
    }

    fn raycast_all(&self, ray: &Ray) -> Vec<RayHit> {
        let mut hits: Vec<RayHit> = self
            .shapes
            .borrow()
            .values()
            .filter_map(|sphere| Self::intersect(ray, sphere))
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}
