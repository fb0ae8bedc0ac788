//! Renderer and collision collaborators, and the handles a node hands to them
//!
//! The scene graph never renders or collides anything itself. A node owns at
//! most one renderable, one light and one collision shape, each as an opaque
//! handle. While the node is active those handles are attached to the
//! scene's [`Renderer`] and [`CollisionSystem`]; on deactivation they are
//! detached again, and on replacement or destruction they are released.

use std::rc::Rc;

use crate::foundation::math::{Ray, Vec3};

use super::node::{Node, WeakNode};

macro_rules! attachment_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// Handles are exclusively owned: they are neither `Clone` nor `Copy`,
        /// so exactly one node (or one pending caller) holds each.
        #[derive(Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            id: u64,
        }

        impl $name {
            /// Wrap a collaborator-side identifier
            pub fn new(id: u64) -> Self {
                Self { id }
            }

            /// Collaborator-side identifier
            pub fn id(&self) -> u64 {
                self.id
            }
        }
    };
}

attachment_handle!(
    /// Renderable instance owned by a node
    RenderableHandle
);
attachment_handle!(
    /// Light instance owned by a node
    LightHandle
);
attachment_handle!(
    /// Collision shape owned by a node
    CollisionShapeHandle
);

/// External renderer the scene attaches renderables and lights to
pub trait Renderer {
    /// Start drawing `handle`
    fn attach_renderable(&self, handle: &RenderableHandle);

    /// Stop drawing `handle`
    fn detach_renderable(&self, handle: &RenderableHandle);

    /// Start lighting with `handle`
    fn attach_light(&self, handle: &LightHandle);

    /// Stop lighting with `handle`
    fn detach_light(&self, handle: &LightHandle);

    /// Free a renderable the owning node no longer needs
    fn release_renderable(&self, handle: RenderableHandle) {
        let _ = handle;
    }

    /// Free a light the owning node no longer needs
    fn release_light(&self, handle: LightHandle) {
        let _ = handle;
    }
}

/// One intersection reported by a [`CollisionSystem`] raycast
#[derive(Debug, Clone)]
pub struct RayHit {
    /// Node whose collider was hit
    pub node: WeakNode,
    /// Distance along the ray
    pub distance: f32,
    /// World-space hit point
    pub point: Vec3,
}

/// External collision world the scene registers colliders with
pub trait CollisionSystem {
    /// Register `shape` for `node`; the shape follows the node's world transform
    fn attach_collider(&self, shape: &CollisionShapeHandle, node: WeakNode);

    /// Unregister `shape`
    fn detach_collider(&self, shape: &CollisionShapeHandle);

    /// The owner's world transform changed; cached world bounds are stale
    fn mark_shape_dirty(&self, shape: &CollisionShapeHandle) {
        let _ = shape;
    }

    /// Free a shape the owning node no longer needs
    fn release_shape(&self, shape: CollisionShapeHandle) {
        let _ = shape;
    }

    /// Closest hit along `ray`
    fn raycast(&self, ray: &Ray) -> Option<RayHit>;

    /// Every hit along `ray`, nearest first
    fn raycast_all(&self, ray: &Ray) -> Vec<RayHit> {
        self.raycast(ray).into_iter().collect()
    }
}

/// Collision world that never reports anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCollision;

impl CollisionSystem for NoCollision {
    fn attach_collider(&self, _shape: &CollisionShapeHandle, _node: WeakNode) {}

    fn detach_collider(&self, _shape: &CollisionShapeHandle) {}

    fn raycast(&self, _ray: &Ray) -> Option<RayHit> {
        None
    }
}

/// Handles owned by one node plus the collaborators they are currently attached to.
///
/// `renderer` and `collision` are `Some` exactly while the node is active, so
/// a detach always reaches the collaborator the handle was attached to.
#[derive(Default)]
pub(crate) struct Attachments {
    renderable: Option<RenderableHandle>,
    light: Option<LightHandle>,
    collider: Option<CollisionShapeHandle>,
    renderer: Option<Rc<dyn Renderer>>,
    collision: Option<Rc<dyn CollisionSystem>>,
}

impl Attachments {
    pub(crate) fn renderable_id(&self) -> Option<u64> {
        self.renderable.as_ref().map(RenderableHandle::id)
    }

    pub(crate) fn light_id(&self) -> Option<u64> {
        self.light.as_ref().map(LightHandle::id)
    }

    pub(crate) fn collider_id(&self) -> Option<u64> {
        self.collider.as_ref().map(CollisionShapeHandle::id)
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.renderer.is_some()
    }

    /// Renderable, then light, then collider
    pub(crate) fn attach_all(
        &mut self,
        renderer: Rc<dyn Renderer>,
        collision: Rc<dyn CollisionSystem>,
        owner: &Node,
    ) {
        if let Some(renderable) = &self.renderable {
            renderer.attach_renderable(renderable);
        }
        if let Some(light) = &self.light {
            renderer.attach_light(light);
        }
        if let Some(shape) = &self.collider {
            collision.attach_collider(shape, owner.downgrade());
        }
        self.renderer = Some(renderer);
        self.collision = Some(collision);
    }

    /// Collider, then light, then renderable
    pub(crate) fn detach_all(&mut self) {
        if let Some(collision) = self.collision.take() {
            if let Some(shape) = &self.collider {
                collision.detach_collider(shape);
            }
        }
        if let Some(renderer) = self.renderer.take() {
            if let Some(light) = &self.light {
                renderer.detach_light(light);
            }
            if let Some(renderable) = &self.renderable {
                renderer.detach_renderable(renderable);
            }
        }
    }

    /// Swap the renderable, attaching the new one if the node is live.
    ///
    /// The previous handle is detached and released through `release_to`.
    pub(crate) fn replace_renderable(
        &mut self,
        renderable: Option<RenderableHandle>,
        release_to: Option<Rc<dyn Renderer>>,
    ) {
        if let Some(old) = self.renderable.take() {
            if let Some(renderer) = &self.renderer {
                renderer.detach_renderable(&old);
            }
            if let Some(renderer) = self.renderer.clone().or(release_to) {
                renderer.release_renderable(old);
            }
        }
        if let (Some(renderer), Some(new)) = (&self.renderer, &renderable) {
            renderer.attach_renderable(new);
        }
        self.renderable = renderable;
    }

    pub(crate) fn replace_light(&mut self, light: Option<LightHandle>, release_to: Option<Rc<dyn Renderer>>) {
        if let Some(old) = self.light.take() {
            if let Some(renderer) = &self.renderer {
                renderer.detach_light(&old);
            }
            if let Some(renderer) = self.renderer.clone().or(release_to) {
                renderer.release_light(old);
            }
        }
        if let (Some(renderer), Some(new)) = (&self.renderer, &light) {
            renderer.attach_light(new);
        }
        self.light = light;
    }

    pub(crate) fn replace_collider(
        &mut self,
        shape: Option<CollisionShapeHandle>,
        release_to: Option<Rc<dyn CollisionSystem>>,
        owner: &Node,
    ) {
        if let Some(old) = self.collider.take() {
            if let Some(collision) = &self.collision {
                collision.detach_collider(&old);
            }
            if let Some(collision) = self.collision.clone().or(release_to) {
                collision.release_shape(old);
            }
        }
        if let (Some(collision), Some(new)) = (&self.collision, &shape) {
            collision.attach_collider(new, owner.downgrade());
        }
        self.collider = shape;
    }

    /// Release every handle; the node must already be detached
    pub(crate) fn release_all(
        &mut self,
        renderer: Option<Rc<dyn Renderer>>,
        collision: Option<Rc<dyn CollisionSystem>>,
    ) {
        if let Some(renderer) = renderer {
            if let Some(light) = self.light.take() {
                renderer.release_light(light);
            }
            if let Some(renderable) = self.renderable.take() {
                renderer.release_renderable(renderable);
            }
        }
        if let Some(collision) = collision {
            if let Some(shape) = self.collider.take() {
                collision.release_shape(shape);
            }
        }
        self.light = None;
        self.renderable = None;
        self.collider = None;
    }

    /// Tell the collision world the collider's world bounds are stale
    pub(crate) fn mark_collider_dirty(&self) {
        if let (Some(collision), Some(shape)) = (&self.collision, &self.collider) {
            collision.mark_shape_dirty(shape);
        }
    }
}
