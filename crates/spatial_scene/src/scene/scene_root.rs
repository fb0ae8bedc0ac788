//! Scene root: the top of the hierarchy
//!
//! A [`Scene`] owns its top-level nodes, a camera node, the touch router and
//! handles to the external renderer and collision system. It is the single
//! entry point of the per-frame update pump and of pointer input.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, error, warn};

use crate::config::SceneConfig;
use crate::foundation::math::{Mat4, Ray};
use crate::foundation::time::FrameTime;
use crate::input::{HitTestResult, PeekTouchListener, PointerEvent, SceneTouchListener, TouchRouter};

use super::attachments::{CollisionSystem, Renderer};
use super::error::SceneError;
use super::hierarchy::{ChildList, HierarchyContainer};
use super::node::{Node, TransformLock};

/// Turns a screen position into a world-space ray from the camera
pub trait CameraProjection {
    /// Ray through pixel `(x, y)` for a camera with world matrix `camera_world`
    fn screen_point_to_ray(&self, camera_world: &Mat4, x: f32, y: f32) -> Option<Ray>;
}

/// Scene-wide per-frame callback, run before any node is updated
pub trait SceneUpdateListener {
    /// Called once per frame
    fn on_update(&self, frame_time: &FrameTime);
}

impl<F> SceneUpdateListener for F
where
    F: Fn(&FrameTime),
{
    fn on_update(&self, frame_time: &FrameTime) {
        self(frame_time)
    }
}

pub(crate) struct SceneInner {
    pub(crate) children: ChildList,
    config: SceneConfig,
    renderer: Rc<dyn Renderer>,
    collision: Rc<dyn CollisionSystem>,
    camera: Node,
    router: TouchRouter,
    update_listeners: RefCell<Vec<Rc<dyn SceneUpdateListener>>>,
    projection: RefCell<Option<Rc<dyn CameraProjection>>>,
}

impl Drop for SceneInner {
    fn drop(&mut self) {
        for child in self.children.to_vec() {
            child.detach_from_dropped_scene();
        }
    }
}

/// Handle to a scene
#[derive(Clone)]
pub struct Scene {
    inner: Rc<SceneInner>,
}

impl Scene {
    /// Create a scene bound to a renderer and a collision system.
    ///
    /// The scene starts with a single child: its camera node, whose parent
    /// can never change.
    pub fn new(config: SceneConfig, renderer: Rc<dyn Renderer>, collision: Rc<dyn CollisionSystem>) -> Self {
        if let Err(err) = config.validate() {
            warn!("Scene created with invalid config: {err}");
        }

        let scene = Self {
            inner: Rc::new(SceneInner {
                children: ChildList::new(),
                config,
                renderer,
                collision,
                camera: Node::with_name("Camera"),
                router: TouchRouter::new(),
                update_listeners: RefCell::new(Vec::new()),
                projection: RefCell::new(None),
            }),
        };

        let camera = scene.camera();
        if let Err(err) = camera.set_parent(&scene) {
            error!("Failed to attach camera to its scene: {err}");
        }
        camera.lock_parent();

        debug!("Created scene");
        scene
    }

    pub(crate) fn from_inner(inner: Rc<SceneInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<SceneInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn is_same_inner(&self, other: &Weak<SceneInner>) -> bool {
        std::ptr::eq(other.as_ptr(), Rc::as_ptr(&self.inner))
    }

    /// Scene tunables
    pub fn config(&self) -> &SceneConfig {
        &self.inner.config
    }

    /// External renderer
    pub fn renderer(&self) -> Rc<dyn Renderer> {
        Rc::clone(&self.inner.renderer)
    }

    /// External collision system
    pub fn collision_system(&self) -> Rc<dyn CollisionSystem> {
        Rc::clone(&self.inner.collision)
    }

    /// The scene's camera node
    pub fn camera(&self) -> Node {
        self.inner.camera.clone()
    }

    /// Bind the camera to (or release it from) an externally tracked pose.
    ///
    /// A bound camera rejects direct transform mutation; feed it with
    /// [`Node::apply_tracked_pose`].
    pub fn set_camera_tracked(&self, tracked: bool) {
        let lock = tracked.then_some(TransformLock::TrackedPose);
        self.inner.camera.set_transform_lock(lock);
    }

    /// Install the projection used to turn screen touches into rays
    pub fn set_camera_projection<P: CameraProjection + 'static>(&self, projection: Rc<P>) {
        *self.inner.projection.borrow_mut() = Some(projection);
    }

    /// Remove the projection; screen touches then hit nothing
    pub fn clear_camera_projection(&self) {
        self.inner.projection.borrow_mut().take();
    }

    /// Pointer routing state of this scene
    pub fn touch_router(&self) -> &TouchRouter {
        &self.inner.router
    }

    /// Install the fallback listener offered gestures no node consumed
    pub fn set_on_touch_listener<L: SceneTouchListener + 'static>(&self, listener: Rc<L>) {
        self.inner.router.set_scene_listener(Some(listener));
    }

    /// Remove the fallback touch listener
    pub fn clear_on_touch_listener(&self) {
        self.inner.router.set_scene_listener(None);
    }

    /// Observe every pointer event before it is routed
    pub fn add_on_peek_touch_listener<L: PeekTouchListener + 'static>(&self, listener: &Rc<L>) -> bool {
        let listener: Rc<dyn PeekTouchListener> = listener.clone();
        self.inner.router.add_peek_listener(listener)
    }

    /// Stop observing pointer events
    pub fn remove_on_peek_touch_listener<L: PeekTouchListener + 'static>(&self, listener: &Rc<L>) -> bool {
        let listener: Rc<dyn PeekTouchListener> = listener.clone();
        self.inner.router.remove_peek_listener(&listener)
    }

    /// Register a per-frame callback; returns false if already registered
    pub fn add_on_update_listener<L: SceneUpdateListener + 'static>(&self, listener: &Rc<L>) -> bool {
        let listener: Rc<dyn SceneUpdateListener> = listener.clone();
        let mut listeners = self.inner.update_listeners.borrow_mut();
        if listeners.iter().any(|existing| same_listener(existing, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a per-frame callback
    pub fn remove_on_update_listener<L: SceneUpdateListener + 'static>(&self, listener: &Rc<L>) -> bool {
        let listener: Rc<dyn SceneUpdateListener> = listener.clone();
        let mut listeners = self.inner.update_listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|existing| !same_listener(existing, &listener));
        before != listeners.len()
    }

    /// Run one frame: scene update listeners, then every active node depth-first
    pub fn dispatch_update(&self, frame_time: &FrameTime) {
        let listeners = self.inner.update_listeners.borrow().clone();
        for listener in listeners {
            listener.on_update(frame_time);
        }

        self.call_on_hierarchy(&mut |node| node.dispatch_update(frame_time));
    }

    /// Closest node whose collider the ray hits
    pub fn hit_test(&self, ray: &Ray) -> HitTestResult {
        match self.inner.collision.raycast(ray) {
            Some(hit) => HitTestResult::from_ray_hit(&hit),
            None => HitTestResult::empty(),
        }
    }

    /// Every node whose collider the ray hits, nearest first
    pub fn hit_test_all(&self, ray: &Ray) -> Vec<HitTestResult> {
        self.inner
            .collision
            .raycast_all(ray)
            .iter()
            .map(HitTestResult::from_ray_hit)
            .collect()
    }

    /// Hit test through the camera at screen position `(x, y)`
    pub fn hit_test_screen(&self, x: f32, y: f32) -> HitTestResult {
        let projection = self.inner.projection.borrow().clone();
        let ray = projection.and_then(|projection| {
            projection.screen_point_to_ray(&self.inner.camera.world_matrix(), x, y)
        });
        match ray {
            Some(ray) => self.hit_test(&ray),
            None => HitTestResult::empty(),
        }
    }

    /// Hit test the event's primary pointer and route the event
    pub fn on_touch_event(&self, event: &PointerEvent) {
        let hit = self.hit_test_screen(event.x(), event.y());
        self.on_touch_event_with_hit(&hit, event);
    }

    /// Route an event for which the caller already has a hit test result
    pub fn on_touch_event_with_hit(&self, hit: &HitTestResult, event: &PointerEvent) {
        self.inner.router.on_touch_event(hit, event);
    }
}

fn same_listener(a: &Rc<dyn SceneUpdateListener>, b: &Rc<dyn SceneUpdateListener>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

impl HierarchyContainer for Scene {
    fn child_list(&self) -> &ChildList {
        &self.inner.children
    }

    fn add_child(&self, child: &Node) -> Result<(), SceneError> {
        child.set_parent(self)
    }

    fn remove_child(&self, child: &Node) -> Result<(), SceneError> {
        if !self.inner.children.contains(child) {
            return Ok(());
        }
        child.clear_parent()
    }
}

impl PartialEq for Scene {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("children", &self.inner.children.len())
            .field("camera", &self.inner.camera.id())
            .finish()
    }
}
